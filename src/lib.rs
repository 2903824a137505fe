//! robobrain: a toy 16-bit bytecode virtual machine and two-pass assembler
//! for programmable robot brains.
//!
//! A program is plain-text assembly: one label, mnemonic, and parameter
//! block per line. [`assembler::Assembler`] lexes it via [`lexer`], resolves
//! operand shapes and label addresses across two passes, and burns the
//! encoded bytes into a [`vm::Vm`]'s ROM through [`emit`]. From there the VM
//! fetches, decodes, and executes one instruction at a time with
//! [`vm::Vm::step`], or runs to completion with [`vm::Vm::run`].
//!
//! Three disjoint memory arenas back every `Vm` ([`memory`]): ROM for
//! burned-in program bytes, RAM for general read/write data, and a small
//! stack for `PUSH`/`POP`. None of them are reinterpreted through raw
//! pointers; words are always read and written through explicit
//! little-endian helpers.
//!
//! Runtime failures (illegal opcodes, out-of-range block copies) never
//! unwind — they set sticky flags on the `Vm` ([`vm::ErrorState`]) that a
//! host keeps observing across calls to `step`. Assembly-time failures
//! ([`error::AssembleError`]) do return `Result`, since a bad program should
//! fail to assemble rather than fail at some unpredictable point at runtime.

pub mod assembler;
pub mod emit;
pub mod error;
pub mod lexer;
pub mod memory;
pub mod opcode;
pub mod vm;

pub use assembler::Assembler;
pub use error::{AssembleError, LexError};
pub use vm::Vm;
