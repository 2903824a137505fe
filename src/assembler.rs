//! Two-pass assembler: walks lexed lines twice, first to build the label
//! table against a simulated ROM write pointer, then to burn encoded
//! instructions into a `Vm`'s ROM at the real write pointer.

use std::collections::HashMap;

use log::{debug, trace};

use crate::emit::{self, Operands};
use crate::error::AssembleError;
use crate::lexer::{self, LexedLine, Param};
use crate::opcode::{self, Mnemonic, OperandShape, RegName};
use crate::vm::Vm;

#[derive(Debug, Clone)]
struct Record {
    label: Option<String>,
    mnemonic: Mnemonic,
    params: Vec<Param>,
}

/// Owns the label table and pass-1 record list for one assembly run.
/// `reset` clears both, matching the VM's own "not tied to a source"
/// lifecycle — an `Assembler` can be reused across multiple `compile` calls.
#[derive(Default)]
pub struct Assembler {
    records: Vec<Record>,
    labels: HashMap<String, u16>,
    pass1_lengths: Vec<usize>,
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler::default()
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.labels.clear();
        self.pass1_lengths.clear();
    }

    /// Lex every line of `source`, appending pass-1 records. Blank lines
    /// are silently skipped.
    pub fn parse_text(&mut self, source: &str) -> Result<(), AssembleError> {
        for line in source.lines() {
            if let Some(LexedLine {
                label,
                mnemonic,
                params,
            }) = lexer::lex_line(line)?
            {
                self.records.push(Record {
                    label,
                    mnemonic,
                    params,
                });
            }
        }
        Ok(())
    }

    /// Walk records, assigning label addresses against a simulated RWP and
    /// validating every label reference resolves to a defined label.
    pub fn first_pass(&mut self) -> Result<(), AssembleError> {
        self.labels.clear();
        self.pass1_lengths.clear();
        let mut simulated_rwp: usize = 0;

        for rec in &self.records {
            if let Some(label) = &rec.label {
                if self.labels.contains_key(label) {
                    return Err(AssembleError::DuplicateLabel(label.clone()));
                }
                self.labels.insert(label.clone(), simulated_rwp as u16);
                trace!("label '{}' at {}", label, simulated_rwp);
            }

            let shape = resolve_shape(rec.mnemonic, &rec.params)?;
            let len = opcode::shape_length(shape);
            self.pass1_lengths.push(len);
            simulated_rwp += len;
        }

        for rec in &self.records {
            for param in &rec.params {
                if let Some(name) = param.label_name() {
                    if !self.labels.contains_key(name) {
                        return Err(AssembleError::UndefinedLabel(name.to_string()));
                    }
                }
            }
        }

        debug!(
            "first pass complete: {} records, {} labels, {} bytes simulated",
            self.records.len(),
            self.labels.len(),
            simulated_rwp
        );
        Ok(())
    }

    /// Re-deduce shapes, resolve label references, emit, and burn into
    /// `vm`'s ROM. Requires `first_pass` to have already run.
    pub fn second_pass(&mut self, vm: &mut Vm) -> Result<(), AssembleError> {
        for (i, rec) in self.records.iter().enumerate() {
            let shape = resolve_shape(rec.mnemonic, &rec.params)?;
            let operands = build_operands(&rec.params, shape, &self.labels);
            let instr = emit::emit(rec.mnemonic, operands)?;

            let expected = self.pass1_lengths[i];
            if instr.len != expected {
                return Err(AssembleError::RwpMismatch {
                    expected,
                    actual: instr.len,
                });
            }

            let rwp = vm.burn_instruction(&instr)?;
            trace!("burned {:?} at rwp {}", rec.mnemonic, rwp);
        }
        Ok(())
    }

    /// Run `parse_text`, `first_pass`, and `second_pass` in sequence,
    /// writing the assembled program into `vm`'s ROM.
    pub fn compile(&mut self, source: &str, vm: &mut Vm) -> Result<(), AssembleError> {
        self.reset();
        self.parse_text(source)?;
        self.first_pass()?;
        self.second_pass(vm)
    }

    pub fn label_address(&self, name: &str) -> Option<u16> {
        self.labels.get(name).copied()
    }
}

/// Deduce candidate shapes for `params` and return the first that the
/// mnemonic table accepts.
fn resolve_shape(mnemonic: Mnemonic, params: &[Param]) -> Result<OperandShape, AssembleError> {
    let candidates = lexer::deduce_shapes(params).ok_or_else(|| AssembleError::NoMatchingShape {
        mnemonic: mnemonic.as_str().to_string(),
        operands: describe_params(params),
    })?;

    candidates
        .into_iter()
        .find(|shape| opcode::lookup(mnemonic, *shape).is_some())
        .ok_or_else(|| AssembleError::NoMatchingShape {
            mnemonic: mnemonic.as_str().to_string(),
            operands: describe_tried_shapes(mnemonic, params),
        })
}

fn describe_params(params: &[Param]) -> String {
    format!("{:?}", params)
}

/// Operand description for a failed resolution, naming every shape this
/// mnemonic accepts so the error points at what would have worked.
fn describe_tried_shapes(mnemonic: Mnemonic, params: &[Param]) -> String {
    let tried: Vec<_> = opcode::candidate_shapes(mnemonic)
        .iter()
        .map(|(shape, _)| format!("{shape:?}"))
        .collect();
    if tried.is_empty() {
        describe_params(params)
    } else {
        format!("{} (tried shapes: {})", describe_params(params), tried.join(", "))
    }
}

fn param_as_reg(param: &Param) -> RegName {
    match param {
        Param::Register(r) | Param::BracketedRegister(r) => *r,
        other => unreachable!("shape deduction guarantees a register operand here: {other:?}"),
    }
}

/// A parameter's value when it must be packed into a byte/word payload
/// slot. A register used in this position packs as its numeric index
/// (this is how the source's `RP`/`PR` shape-deduction overloads behave).
fn param_as_word(param: &Param, labels: &HashMap<String, u16>) -> u16 {
    match param {
        Param::Number(v) | Param::BracketedNumber(v) => *v as u16,
        Param::Label(name) | Param::BracketedLabel(name) => *labels
            .get(name)
            .expect("first_pass validated every label reference resolves"),
        Param::Register(r) | Param::BracketedRegister(r) => r.index() as u16,
    }
}

fn build_operands(params: &[Param], shape: OperandShape, labels: &HashMap<String, u16>) -> Operands {
    use OperandShape::*;
    match shape {
        Nil => Operands::Nil,
        R => Operands::R(param_as_reg(&params[0])),
        B => Operands::B(param_as_word(&params[0], labels) as u8),
        W => Operands::W(param_as_word(&params[0], labels)),
        P => Operands::P(param_as_word(&params[0], labels)),
        M => Operands::M(param_as_word(&params[0], labels)),
        Rr => Operands::Rr(param_as_reg(&params[0]), param_as_reg(&params[1])),
        Rm => Operands::Rm(param_as_reg(&params[0]), param_as_word(&params[1], labels)),
        Mr => Operands::Mr(param_as_word(&params[0], labels), param_as_reg(&params[1])),
        Rw => Operands::Rw(param_as_reg(&params[0]), param_as_word(&params[1], labels)),
        Rb => Operands::Rb(param_as_reg(&params[0]), param_as_word(&params[1], labels) as u8),
        Rrr => Operands::Rrr(
            param_as_reg(&params[0]),
            param_as_reg(&params[1]),
            param_as_reg(&params[2]),
        ),
        Bb => Operands::Bb(
            param_as_word(&params[0], labels) as u8,
            param_as_word(&params[1], labels) as u8,
        ),
        Bw => Operands::Bw(
            param_as_word(&params[0], labels) as u8,
            param_as_word(&params[1], labels),
        ),
        Wb => Operands::Wb(
            param_as_word(&params[0], labels),
            param_as_word(&params[1], labels) as u8,
        ),
        Bbb => Operands::Bbb(
            param_as_word(&params[0], labels) as u8,
            param_as_word(&params[1], labels) as u8,
            param_as_word(&params[2], labels) as u8,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_label_is_rejected() {
        let mut asm = Assembler::new();
        asm.parse_text("a: NOP\na: NOP\n").unwrap();
        let err = asm.first_pass().unwrap_err();
        assert!(matches!(err, AssembleError::DuplicateLabel(ref l) if l == "a"));
    }

    #[test]
    fn undefined_label_reference_is_rejected() {
        let mut asm = Assembler::new();
        asm.parse_text("JMP nowhere\n").unwrap();
        let err = asm.first_pass().unwrap_err();
        assert!(matches!(err, AssembleError::UndefinedLabel(ref l) if l == "nowhere"));
    }

    #[test]
    fn compile_countdown_assigns_expected_addresses() {
        let source = "start: MOV R1,40\nloop:  ADD R1,-1\n       JNZERO R1,loop\n       HALT\n";
        let mut vm = Vm::new();
        let mut asm = Assembler::new();
        asm.compile(source, &mut vm).unwrap();
        assert_eq!(asm.label_address("start"), Some(0));
        assert_eq!(asm.label_address("loop"), Some(4));
        assert_eq!(vm.rom_size(), 13);
    }
}
