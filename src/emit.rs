//! The emitter: mnemonic + typed operands → instruction record.
//!
//! One typed-operand enum dispatched by the `(mnemonic, shape)` table in
//! `opcode`, rather than a separate emit path per shape.

use crate::error::AssembleError;
use crate::opcode::{self, Mnemonic, OperandShape, RegName};

/// Typed operand list for one instruction, one variant per operand shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    Nil,
    R(RegName),
    B(u8),
    W(u16),
    P(u16),
    M(u16),
    Rr(RegName, RegName),
    Rm(RegName, u16),
    Mr(u16, RegName),
    Rw(RegName, u16),
    Rb(RegName, u8),
    Rrr(RegName, RegName, RegName),
    Bb(u8, u8),
    Bw(u8, u16),
    Wb(u16, u8),
    Bbb(u8, u8, u8),
}

impl Operands {
    pub fn shape(&self) -> OperandShape {
        match self {
            Operands::Nil => OperandShape::Nil,
            Operands::R(_) => OperandShape::R,
            Operands::B(_) => OperandShape::B,
            Operands::W(_) => OperandShape::W,
            Operands::P(_) => OperandShape::P,
            Operands::M(_) => OperandShape::M,
            Operands::Rr(_, _) => OperandShape::Rr,
            Operands::Rm(_, _) => OperandShape::Rm,
            Operands::Mr(_, _) => OperandShape::Mr,
            Operands::Rw(_, _) => OperandShape::Rw,
            Operands::Rb(_, _) => OperandShape::Rb,
            Operands::Rrr(_, _, _) => OperandShape::Rrr,
            Operands::Bb(_, _) => OperandShape::Bb,
            Operands::Bw(_, _) => OperandShape::Bw,
            Operands::Wb(_, _) => OperandShape::Wb,
            Operands::Bbb(_, _, _) => OperandShape::Bbb,
        }
    }
}

/// A fully encoded instruction: opcode byte plus up to three payload bytes.
/// `len` bytes of `bytes` (opcode included) are meaningful; the rest is padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrRecord {
    pub opcode: opcode::Opcode,
    pub payload: [u8; 3],
    pub len: usize,
}

impl InstrRecord {
    /// The `len` meaningful bytes of this record, opcode first.
    pub fn encoded(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        out.push(self.opcode.to_byte());
        out.extend_from_slice(&self.payload[..self.len - 1]);
        out
    }
}

/// Resolve `mnemonic` + `operands` to an encoded instruction record. Pure:
/// performs no ROM writes.
pub fn emit(mnemonic: Mnemonic, operands: Operands) -> Result<InstrRecord, AssembleError> {
    let shape = operands.shape();
    let op = opcode::lookup(mnemonic, shape)
        .ok_or_else(|| AssembleError::EmitRejected(mnemonic.as_str().to_string()))?;

    let mut payload = [0u8; 3];
    match operands {
        Operands::Nil => {}
        Operands::R(r) => payload[0] = r.index() as u8,
        Operands::B(b) => payload[0] = b,
        Operands::W(w) | Operands::P(w) | Operands::M(w) => {
            let le = w.to_le_bytes();
            payload[0] = le[0];
            payload[1] = le[1];
        }
        Operands::Rr(r1, r2) => {
            payload[0] = r1.index() as u8;
            payload[1] = r2.index() as u8;
        }
        Operands::Rm(r, addr) => {
            payload[0] = r.index() as u8;
            let le = addr.to_le_bytes();
            payload[1] = le[0];
            payload[2] = le[1];
        }
        Operands::Mr(addr, r) => {
            let le = addr.to_le_bytes();
            payload[0] = le[0];
            payload[1] = le[1];
            payload[2] = r.index() as u8;
        }
        Operands::Rw(r, w) => {
            payload[0] = r.index() as u8;
            let le = w.to_le_bytes();
            payload[1] = le[0];
            payload[2] = le[1];
        }
        Operands::Rb(r, b) => {
            payload[0] = r.index() as u8;
            payload[1] = b;
        }
        Operands::Rrr(r1, r2, r3) => {
            payload[0] = r1.index() as u8;
            payload[1] = r2.index() as u8;
            payload[2] = r3.index() as u8;
        }
        Operands::Bb(b1, b2) => {
            payload[0] = b1;
            payload[1] = b2;
        }
        Operands::Bw(b, w) => {
            payload[0] = b;
            let le = w.to_le_bytes();
            payload[1] = le[0];
            payload[2] = le[1];
        }
        Operands::Wb(w, b) => {
            let le = w.to_le_bytes();
            payload[0] = le[0];
            payload[1] = le[1];
            payload[2] = b;
        }
        Operands::Bbb(b1, b2, b3) => {
            payload[0] = b1;
            payload[1] = b2;
            payload[2] = b3;
        }
    }

    let len = opcode::shape_length(shape);
    Ok(InstrRecord {
        opcode: op,
        payload,
        len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::RegName;

    #[test]
    fn emit_nop_is_one_byte() {
        let rec = emit(Mnemonic::Nop, Operands::Nil).unwrap();
        assert_eq!(rec.len, 1);
        assert_eq!(rec.encoded(), vec![opcode::Opcode::Nop.to_byte()]);
    }

    #[test]
    fn emit_mov_rw_packs_register_then_little_endian_word() {
        let rec = emit(Mnemonic::Mov, Operands::Rw(RegName::R1, 0x1234)).unwrap();
        assert_eq!(rec.len, 4);
        assert_eq!(rec.encoded(), vec![opcode::Opcode::MovRw.to_byte(), 0, 0x34, 0x12]);
    }

    #[test]
    fn emit_rejects_mnemonic_shape_mismatch() {
        // NEG only accepts R, not RR.
        let err = emit(Mnemonic::Neg, Operands::Rr(RegName::R1, RegName::R2)).unwrap_err();
        assert!(matches!(err, AssembleError::EmitRejected(_)));
    }

    #[test]
    fn emit_recv_always_rejected() {
        let err = emit(Mnemonic::Recv, Operands::Rb(RegName::R1, 3)).unwrap_err();
        assert!(matches!(err, AssembleError::EmitRejected(_)));
    }

    #[test]
    fn emit_bc_rrr_packs_three_registers() {
        let rec = emit(
            Mnemonic::Bc,
            Operands::Rrr(RegName::R1, RegName::R2, RegName::R3),
        )
        .unwrap();
        assert_eq!(rec.len, 4);
        assert_eq!(rec.encoded(), vec![opcode::Opcode::BcRrr.to_byte(), 0, 1, 2]);
    }
}
