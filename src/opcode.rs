//! Instruction encoding model: registers, opcodes, operand shapes, and the
//! three static tables that tie human mnemonics to concrete machine opcodes.
//!
//! The tables are built once, lazily, behind a memoizing guard (per the
//! "static global tables" design note): `shape_length`, `opcode_shape`, and
//! `mnemonic_table` are the public lookup entry points; nothing outside this
//! module touches the backing `OnceLock`s directly.

use std::sync::OnceLock;

/// One of the seven machine registers. Discriminants are the exact indices
/// used inside encoded instruction bytes; `R1..R4` are general-purpose,
/// `Pc`/`Sp`/`Ix` are special-purpose but share the same register space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegName {
    R1 = 0,
    R2 = 1,
    R3 = 2,
    R4 = 3,
    Pc = 4,
    Sp = 5,
    Ix = 6,
}

const REGISTER_NAMES: [&str; 7] = ["R1", "R2", "R3", "R4", "PC", "SP", "IX"];

impl RegName {
    pub fn index(self) -> usize {
        self as u8 as usize
    }

    pub fn from_index(idx: u8) -> Option<RegName> {
        match idx {
            0 => Some(RegName::R1),
            1 => Some(RegName::R2),
            2 => Some(RegName::R3),
            3 => Some(RegName::R4),
            4 => Some(RegName::Pc),
            5 => Some(RegName::Sp),
            6 => Some(RegName::Ix),
            _ => None,
        }
    }

    /// Case-sensitive exact match against a register name.
    pub fn from_str_exact(s: &str) -> Option<RegName> {
        REGISTER_NAMES
            .iter()
            .position(|&name| name == s)
            .map(|idx| RegName::from_index(idx as u8).unwrap())
    }

    pub fn as_str(self) -> &'static str {
        REGISTER_NAMES[self.index()]
    }

    /// `true` for `R1..R4`; the four registers `DUP` is allowed to touch.
    pub fn is_general(self) -> bool {
        self.index() < 4
    }
}

/// Human-facing instruction name, as written in source. Deliberately omits
/// any pseudo-instruction (`ORG`/`BYTE`/`WORD`) since those are unimplemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Nop,
    Mov,
    Movb,
    Movrp,
    Movpr,
    Swap,
    Zero,
    Dup,
    Add,
    Sub,
    Mul,
    Neg,
    Jmp,
    Jneg,
    Jpos,
    Jzero,
    Jnzero,
    Halt,
    And,
    Or,
    Xor,
    Not,
    Bsl,
    Bsr,
    Rol,
    Ror,
    Push,
    Popb,
    Popw,
    Bc,
    Recv,
    Send,
}

const MNEMONIC_NAMES: [(&str, Mnemonic); 31] = [
    ("NOP", Mnemonic::Nop),
    ("MOV", Mnemonic::Mov),
    ("MOVB", Mnemonic::Movb),
    ("MOVRP", Mnemonic::Movrp),
    ("MOVPR", Mnemonic::Movpr),
    ("SWAP", Mnemonic::Swap),
    ("ZERO", Mnemonic::Zero),
    ("DUP", Mnemonic::Dup),
    ("ADD", Mnemonic::Add),
    ("SUB", Mnemonic::Sub),
    ("MUL", Mnemonic::Mul),
    ("NEG", Mnemonic::Neg),
    ("JMP", Mnemonic::Jmp),
    ("JNEG", Mnemonic::Jneg),
    ("JPOS", Mnemonic::Jpos),
    ("JZERO", Mnemonic::Jzero),
    ("JNZERO", Mnemonic::Jnzero),
    ("HALT", Mnemonic::Halt),
    ("AND", Mnemonic::And),
    ("OR", Mnemonic::Or),
    ("XOR", Mnemonic::Xor),
    ("NOT", Mnemonic::Not),
    ("BSL", Mnemonic::Bsl),
    ("BSR", Mnemonic::Bsr),
    ("ROL", Mnemonic::Rol),
    ("ROR", Mnemonic::Ror),
    ("PUSH", Mnemonic::Push),
    ("POPB", Mnemonic::Popb),
    ("POPW", Mnemonic::Popw),
    ("BC", Mnemonic::Bc),
    ("RECV", Mnemonic::Recv),
    ("SEND", Mnemonic::Send),
];

impl Mnemonic {
    /// Case-insensitive lookup.
    pub fn from_str_ci(s: &str) -> Option<Mnemonic> {
        let upper = s.to_ascii_uppercase();
        MNEMONIC_NAMES
            .iter()
            .find(|(name, _)| *name == upper)
            .map(|(_, m)| *m)
    }

    pub fn as_str(self) -> &'static str {
        MNEMONIC_NAMES
            .iter()
            .find(|(_, m)| *m == self)
            .map(|(name, _)| *name)
            .expect("every Mnemonic variant has a name")
    }
}

/// Concrete, machine-level opcode byte. One variant per entry in the
/// original VM's opcode enumeration; `Recv`/`Send` exist here (the decoder
/// must assign them a length) but have no entry in the mnemonic table, so
/// source code can never assemble them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    MovRm,
    MovMr,
    MovRr,
    MovRw,
    MovrpRr,
    MovprRr,
    MovbRm,
    SwapRr,
    SwapRm,
    ZeroNil,
    DupR,
    AddRw,
    AddRr,
    AddRrr,
    SubRr,
    MulRw,
    MulRr,
    NegR,
    JmpW,
    JnegRw,
    JposRw,
    JzeroRw,
    JnzeroRw,
    HaltNil,
    AndRr,
    AndRw,
    OrRr,
    OrRw,
    XorRr,
    XorRw,
    NotR,
    BslR,
    BsrR,
    RolR,
    RorR,
    PushR,
    PushW,
    PushB,
    PopbR,
    PopwR,
    RecvRb,
    SendRb,
    BcRrr,
}

pub const NUM_OPCODES: usize = 44;

const ALL_OPCODES: [Opcode; NUM_OPCODES] = [
    Opcode::Nop,
    Opcode::MovRm,
    Opcode::MovMr,
    Opcode::MovRr,
    Opcode::MovRw,
    Opcode::MovrpRr,
    Opcode::MovprRr,
    Opcode::MovbRm,
    Opcode::SwapRr,
    Opcode::SwapRm,
    Opcode::ZeroNil,
    Opcode::DupR,
    Opcode::AddRw,
    Opcode::AddRr,
    Opcode::AddRrr,
    Opcode::SubRr,
    Opcode::MulRw,
    Opcode::MulRr,
    Opcode::NegR,
    Opcode::JmpW,
    Opcode::JnegRw,
    Opcode::JposRw,
    Opcode::JzeroRw,
    Opcode::JnzeroRw,
    Opcode::HaltNil,
    Opcode::AndRr,
    Opcode::AndRw,
    Opcode::OrRr,
    Opcode::OrRw,
    Opcode::XorRr,
    Opcode::XorRw,
    Opcode::NotR,
    Opcode::BslR,
    Opcode::BsrR,
    Opcode::RolR,
    Opcode::RorR,
    Opcode::PushR,
    Opcode::PushW,
    Opcode::PushB,
    Opcode::PopbR,
    Opcode::PopwR,
    Opcode::RecvRb,
    Opcode::SendRb,
    Opcode::BcRrr,
];

impl Opcode {
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Opcode> {
        ALL_OPCODES.get(byte as usize).copied()
    }

    /// Opcodes that exist in the machine's dispatch table but can never be
    /// emitted from source text; the VM treats them as illegal at runtime.
    pub fn is_reserved(self) -> bool {
        matches!(self, Opcode::RecvRb | Opcode::SendRb)
    }
}

/// Abstract operand-layout classification. Each shape has a fixed encoded
/// length (see `shape_length`) independent of which opcode carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandShape {
    Nil,
    R,
    B,
    W,
    P,
    M,
    Rr,
    Rm,
    Mr,
    Rw,
    Rb,
    Rrr,
    Bb,
    Bw,
    Wb,
    Bbb,
}

pub fn shape_length(shape: OperandShape) -> usize {
    match shape {
        OperandShape::Nil => 1,
        OperandShape::R => 2,
        OperandShape::B => 2,
        OperandShape::W => 3,
        OperandShape::P => 3,
        OperandShape::M => 3,
        OperandShape::Rr => 3,
        OperandShape::Rb => 3,
        OperandShape::Bb => 3,
        OperandShape::Rm => 4,
        OperandShape::Mr => 4,
        OperandShape::Rw => 4,
        OperandShape::Rrr => 4,
        OperandShape::Bw => 4,
        OperandShape::Wb => 4,
        OperandShape::Bbb => 4,
    }
}

fn opcode_shape_table() -> &'static [OperandShape; NUM_OPCODES] {
    static TABLE: OnceLock<[OperandShape; NUM_OPCODES]> = OnceLock::new();
    TABLE.get_or_init(|| {
        use OperandShape::*;
        [
            Nil, // Nop
            Rm,  // MovRm
            Mr,  // MovMr
            Rr,  // MovRr
            Rw,  // MovRw
            Rr,  // MovrpRr
            Rr,  // MovprRr
            Rm,  // MovbRm
            Rr,  // SwapRr
            Rm,  // SwapRm
            Nil, // ZeroNil
            R,   // DupR
            Rw,  // AddRw
            Rr,  // AddRr
            Rrr, // AddRrr
            Rr,  // SubRr
            Rw,  // MulRw
            Rr,  // MulRr
            R,   // NegR
            W,   // JmpW
            Rw,  // JnegRw
            Rw,  // JposRw
            Rw,  // JzeroRw
            Rw,  // JnzeroRw
            Nil, // HaltNil
            Rr,  // AndRr
            Rw,  // AndRw
            Rr,  // OrRr
            Rw,  // OrRw
            Rr,  // XorRr
            Rw,  // XorRw
            R,   // NotR
            R,   // BslR
            R,   // BsrR
            R,   // RolR
            R,   // RorR
            R,   // PushR
            W,   // PushW
            B,   // PushB
            R,   // PopbR
            R,   // PopwR
            Rb,  // RecvRb
            Rb,  // SendRb
            Rrr, // BcRrr
        ]
    })
}

/// Operand shape of a decoded opcode; used by the VM's fetch stage to know
/// the instruction's encoded length without consulting the mnemonic table.
pub fn opcode_shape(opcode: Opcode) -> OperandShape {
    opcode_shape_table()[opcode.to_byte() as usize]
}

type MnemonicTable = std::collections::HashMap<Mnemonic, Vec<(OperandShape, Opcode)>>;

fn mnemonic_table() -> &'static MnemonicTable {
    static TABLE: OnceLock<MnemonicTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        use OperandShape::*;
        let mut t: MnemonicTable = std::collections::HashMap::new();
        t.insert(Mnemonic::Nop, vec![(Nil, Opcode::Nop)]);
        t.insert(
            Mnemonic::Mov,
            vec![
                (Rm, Opcode::MovRm),
                (Mr, Opcode::MovMr),
                (Rr, Opcode::MovRr),
                (Rw, Opcode::MovRw),
            ],
        );
        t.insert(Mnemonic::Movb, vec![(Rm, Opcode::MovbRm)]);
        t.insert(Mnemonic::Movrp, vec![(Rr, Opcode::MovrpRr)]);
        t.insert(Mnemonic::Movpr, vec![(Rr, Opcode::MovprRr)]);
        t.insert(Mnemonic::Swap, vec![(Rr, Opcode::SwapRr), (Rm, Opcode::SwapRm)]);
        t.insert(Mnemonic::Zero, vec![(Nil, Opcode::ZeroNil)]);
        t.insert(Mnemonic::Dup, vec![(R, Opcode::DupR)]);
        t.insert(
            Mnemonic::Add,
            vec![(Rw, Opcode::AddRw), (Rr, Opcode::AddRr), (Rrr, Opcode::AddRrr)],
        );
        t.insert(Mnemonic::Sub, vec![(Rr, Opcode::SubRr)]);
        t.insert(Mnemonic::Mul, vec![(Rw, Opcode::MulRw), (Rr, Opcode::MulRr)]);
        t.insert(Mnemonic::Neg, vec![(R, Opcode::NegR)]);
        t.insert(Mnemonic::Jmp, vec![(W, Opcode::JmpW)]);
        t.insert(Mnemonic::Jneg, vec![(Rw, Opcode::JnegRw)]);
        t.insert(Mnemonic::Jpos, vec![(Rw, Opcode::JposRw)]);
        t.insert(Mnemonic::Jzero, vec![(Rw, Opcode::JzeroRw)]);
        t.insert(Mnemonic::Jnzero, vec![(Rw, Opcode::JnzeroRw)]);
        t.insert(Mnemonic::Halt, vec![(Nil, Opcode::HaltNil)]);
        t.insert(Mnemonic::And, vec![(Rr, Opcode::AndRr), (Rw, Opcode::AndRw)]);
        t.insert(Mnemonic::Or, vec![(Rr, Opcode::OrRr), (Rw, Opcode::OrRw)]);
        t.insert(Mnemonic::Xor, vec![(Rr, Opcode::XorRr), (Rw, Opcode::XorRw)]);
        t.insert(Mnemonic::Not, vec![(R, Opcode::NotR)]);
        t.insert(Mnemonic::Bsl, vec![(R, Opcode::BslR)]);
        t.insert(Mnemonic::Bsr, vec![(R, Opcode::BsrR)]);
        t.insert(Mnemonic::Rol, vec![(R, Opcode::RolR)]);
        t.insert(Mnemonic::Ror, vec![(R, Opcode::RorR)]);
        t.insert(
            Mnemonic::Push,
            vec![(R, Opcode::PushR), (W, Opcode::PushW), (B, Opcode::PushB)],
        );
        t.insert(Mnemonic::Popb, vec![(R, Opcode::PopbR)]);
        t.insert(Mnemonic::Popw, vec![(R, Opcode::PopwR)]);
        t.insert(Mnemonic::Bc, vec![(Rrr, Opcode::BcRrr)]);
        // Recv/Send intentionally absent: reserved mnemonics with no
        // assemblable shape.
        t
    })
}

/// Resolve a mnemonic + operand shape to a concrete opcode, or `None` if
/// that combination is not assemblable (including `RECV`/`SEND`, which have
/// no entry at all).
pub fn lookup(mnemonic: Mnemonic, shape: OperandShape) -> Option<Opcode> {
    mnemonic_table()
        .get(&mnemonic)
        .and_then(|alts| alts.iter().find(|(s, _)| *s == shape))
        .map(|(_, op)| *op)
}

/// The ordered list of candidate shapes for a mnemonic, in declaration
/// order. Used by the assembler to report a diagnostic naming every shape
/// it tried when none of them matched.
pub fn candidate_shapes(mnemonic: Mnemonic) -> &'static [(OperandShape, Opcode)] {
    mnemonic_table()
        .get(&mnemonic)
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_indices_are_fixed() {
        assert_eq!(RegName::R1.index(), 0);
        assert_eq!(RegName::R4.index(), 3);
        assert_eq!(RegName::Pc.index(), 4);
        assert_eq!(RegName::Sp.index(), 5);
        assert_eq!(RegName::Ix.index(), 6);
    }

    #[test]
    fn register_names_round_trip() {
        for &name in &["R1", "R2", "R3", "R4", "PC", "SP", "IX"] {
            let reg = RegName::from_str_exact(name).unwrap();
            assert_eq!(reg.as_str(), name);
        }
        assert!(RegName::from_str_exact("r1").is_none());
        assert!(RegName::from_str_exact("XX").is_none());
    }

    #[test]
    fn mnemonic_lookup_is_case_insensitive() {
        assert_eq!(Mnemonic::from_str_ci("mov"), Some(Mnemonic::Mov));
        assert_eq!(Mnemonic::from_str_ci("MOV"), Some(Mnemonic::Mov));
        assert_eq!(Mnemonic::from_str_ci("MoV"), Some(Mnemonic::Mov));
        assert_eq!(Mnemonic::from_str_ci("bogus"), None);
    }

    #[test]
    fn every_opcode_has_a_shape() {
        for &op in &ALL_OPCODES {
            // must not panic
            let _ = opcode_shape(op);
        }
    }

    #[test]
    fn opcode_byte_round_trips() {
        for &op in &ALL_OPCODES {
            assert_eq!(Opcode::from_byte(op.to_byte()), Some(op));
        }
        assert_eq!(Opcode::from_byte(255), None);
    }

    #[test]
    fn recv_send_are_reserved_and_unassemblable() {
        assert!(Opcode::RecvRb.is_reserved());
        assert!(Opcode::SendRb.is_reserved());
        assert_eq!(lookup(Mnemonic::Recv, OperandShape::Rb), None);
        assert_eq!(lookup(Mnemonic::Send, OperandShape::Rb), None);
    }

    #[test]
    fn ambiguous_add_prefers_rr_register_register_order() {
        // ADD's candidate list is [RW, RR, RRR]; RR must resolve before RRR.
        let shapes: Vec<_> = candidate_shapes(Mnemonic::Add).iter().map(|(s, _)| *s).collect();
        assert_eq!(shapes, vec![OperandShape::Rw, OperandShape::Rr, OperandShape::Rrr]);
    }

    #[test]
    fn shape_lengths_match_spec_table() {
        assert_eq!(shape_length(OperandShape::Nil), 1);
        assert_eq!(shape_length(OperandShape::R), 2);
        assert_eq!(shape_length(OperandShape::B), 2);
        assert_eq!(shape_length(OperandShape::Rr), 3);
        assert_eq!(shape_length(OperandShape::Rb), 3);
        assert_eq!(shape_length(OperandShape::Bb), 3);
        assert_eq!(shape_length(OperandShape::W), 3);
        assert_eq!(shape_length(OperandShape::P), 3);
        assert_eq!(shape_length(OperandShape::M), 3);
        assert_eq!(shape_length(OperandShape::Rm), 4);
        assert_eq!(shape_length(OperandShape::Mr), 4);
        assert_eq!(shape_length(OperandShape::Rw), 4);
        assert_eq!(shape_length(OperandShape::Rrr), 4);
        assert_eq!(shape_length(OperandShape::Bbb), 4);
        assert_eq!(shape_length(OperandShape::Bw), 4);
        assert_eq!(shape_length(OperandShape::Wb), 4);
    }
}
