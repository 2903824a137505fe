//! The bytecode interpreter: register file, memory arenas, and the
//! fetch-decode-execute loop.

use log::{trace, warn};

use crate::emit::InstrRecord;
use crate::error::AssembleError;
use crate::memory::{Ram, Rom, Stack, RAM_SIZE, ROM_SIZE, STACK_SIZE};
use crate::opcode::{self, Opcode, RegName};

/// Snapshot of the register file, for host introspection. Cheap to clone;
/// does not borrow from the `Vm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterSnapshot {
    pub r1: i16,
    pub r2: i16,
    pub r3: i16,
    pub r4: i16,
    pub pc: u16,
    pub sp: u16,
    pub ix: u16,
}

/// The two sticky error bits. Never cleared by `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorState {
    pub illegal_instruction: bool,
    pub on_fire: bool,
}

/// One robot brain: register file, ROM/RAM/stack, and the halt/error bits.
pub struct Vm {
    regs: [i16; 7],
    rom: Rom,
    ram: Ram,
    stack: Stack,
    rwp: u16,
    halt: bool,
    errors: ErrorState,
}

fn reg_from_byte(byte: u8) -> RegName {
    RegName::from_index(byte).unwrap_or(RegName::R1)
}

fn word_from_bytes(lo: u8, hi: u8) -> u16 {
    u16::from_le_bytes([lo, hi])
}

impl Vm {
    pub fn new() -> Vm {
        Vm {
            regs: [0; 7],
            rom: Rom::new(),
            ram: Ram::new(),
            stack: Stack::new(),
            rwp: 0,
            halt: false,
            errors: ErrorState::default(),
        }
    }

    /// Zeroes general registers, PC, and RWP, and clears the halt bit.
    /// Does *not* touch RAM, the stack, ROM contents, SP, or sticky error
    /// flags — to fully reinitialize, construct a new `Vm`.
    pub fn reset(&mut self) {
        self.regs[RegName::R1.index()] = 0;
        self.regs[RegName::R2.index()] = 0;
        self.regs[RegName::R3.index()] = 0;
        self.regs[RegName::R4.index()] = 0;
        self.set_pc(0);
        self.rwp = 0;
        self.halt = false;
    }

    pub fn get_reg(&self, reg: RegName) -> i16 {
        self.regs[reg.index()]
    }

    pub fn set_reg(&mut self, reg: RegName, value: i16) {
        self.regs[reg.index()] = value;
    }

    pub fn pc(&self) -> u16 {
        self.regs[RegName::Pc.index()] as u16
    }

    pub fn set_pc(&mut self, addr: u16) {
        self.regs[RegName::Pc.index()] = addr as i16;
    }

    pub fn sp(&self) -> u16 {
        self.regs[RegName::Sp.index()] as u16
    }

    fn set_sp(&mut self, sp: u16) {
        self.regs[RegName::Sp.index()] = sp as i16;
    }

    pub fn is_halted(&self) -> bool {
        self.halt
    }

    pub fn errors(&self) -> ErrorState {
        self.errors
    }

    pub fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            r1: self.get_reg(RegName::R1),
            r2: self.get_reg(RegName::R2),
            r3: self.get_reg(RegName::R3),
            r4: self.get_reg(RegName::R4),
            pc: self.pc(),
            sp: self.sp(),
            ix: self.regs[RegName::Ix.index()] as u16,
        }
    }

    /// Bytes burned into ROM so far (the ROM write pointer), not ROM's
    /// total capacity.
    pub fn rom_size(&self) -> u16 {
        self.rwp
    }

    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    /// Hex dump of the bytes burned into ROM so far, one 16-byte row per
    /// line.
    pub fn print_rom(&self) -> String {
        let mut out = String::new();
        let bytes = &self.rom.as_slice()[..self.rwp as usize];
        for (i, chunk) in bytes.chunks(16).enumerate() {
            out.push_str(&format!("{:04X}: ", i * 16));
            for b in chunk {
                out.push_str(&format!("{:02X} ", b));
            }
            out.push('\n');
        }
        out
    }

    /// Patch a single raw ROM byte, bypassing the assembler. For debugger
    /// breakpoint patches and tests that need to drive the decoder with a
    /// byte no mnemonic can produce (e.g. an opcode past `NUM_OPCODES`).
    pub fn poke_rom(&mut self, addr: u16, byte: u8) {
        self.rom.burn(addr as usize, &[byte]);
        if addr >= self.rwp {
            self.rwp = addr + 1;
        }
    }

    /// Write `bytes` into RAM starting at `addr`, truncating silently at
    /// the end of the RAM arena.
    pub fn put_str(&mut self, addr: u16, bytes: &[u8]) {
        let start = addr as usize;
        let end = (start + bytes.len()).min(RAM_SIZE);
        if start >= RAM_SIZE {
            return;
        }
        self.ram.as_mut_slice()[start..end].copy_from_slice(&bytes[..end - start]);
    }

    /// Burn one encoded instruction at the current RWP, advancing it.
    /// Returns the RWP the instruction was burned at.
    pub fn burn_instruction(&mut self, instr: &InstrRecord) -> Result<u16, AssembleError> {
        let addr = self.rwp as usize;
        if addr + instr.len > ROM_SIZE {
            return Err(AssembleError::RomOverflow {
                rwp: addr,
                len: instr.len,
                capacity: ROM_SIZE,
            });
        }
        self.rom.burn(addr, &instr.encoded());
        let burned_at = self.rwp;
        self.rwp += instr.len as u16;
        Ok(burned_at)
    }

    /// Fetch-decode-execute one instruction. Ignores the halt bit.
    pub fn step(&mut self) {
        let old_pc = self.pc();
        let window = self.rom.fetch_window(old_pc);
        let opcode_byte = window[0];
        let payload = [window[1], window[2], window[3]];

        match Opcode::from_byte(opcode_byte).filter(|op| !op.is_reserved()) {
            Some(op) => {
                trace!("pc={:04X} opcode={:?}", old_pc, op);
                self.execute(op, payload);
                if self.pc() == old_pc {
                    let len = opcode::shape_length(opcode::opcode_shape(op));
                    self.set_pc(old_pc.wrapping_add(len as u16));
                }
                if self.pc() > self.rwp {
                    self.halt = true;
                }
            }
            None => {
                warn!("illegal opcode {:#04x} at pc={:04X}", opcode_byte, old_pc);
                self.errors.illegal_instruction = true;
                self.errors.on_fire = true;
                self.halt = true;
            }
        }
    }

    /// Clear halt, then `step` until it is set again.
    pub fn run(&mut self) {
        self.halt = false;
        while !self.halt {
            self.step();
        }
    }

    fn execute(&mut self, op: Opcode, payload: [u8; 3]) {
        match op {
            Opcode::Nop => {}

            Opcode::MovRm => {
                let r = reg_from_byte(payload[0]);
                let addr = word_from_bytes(payload[1], payload[2]);
                let v = self.ram.read_word(addr);
                self.set_reg(r, v as i16);
            }
            Opcode::MovMr => {
                let addr = word_from_bytes(payload[0], payload[1]);
                let r = reg_from_byte(payload[2]);
                self.ram.write_word(addr, self.get_reg(r) as u16);
            }
            Opcode::MovRr => {
                let (r1, r2) = (reg_from_byte(payload[0]), reg_from_byte(payload[1]));
                self.set_reg(r1, self.get_reg(r2));
            }
            Opcode::MovRw => {
                let r = reg_from_byte(payload[0]);
                let w = word_from_bytes(payload[1], payload[2]);
                self.set_reg(r, w as i16);
            }
            Opcode::MovrpRr => {
                let (r1, r2) = (reg_from_byte(payload[0]), reg_from_byte(payload[1]));
                let addr = self.get_reg(r1) as u16;
                self.ram.write_word(addr, self.get_reg(r2) as u16);
            }
            Opcode::MovprRr => {
                let (r1, r2) = (reg_from_byte(payload[0]), reg_from_byte(payload[1]));
                let addr = self.get_reg(r2) as u16;
                let v = self.ram.read_word(addr);
                self.set_reg(r1, v as i16);
            }
            Opcode::MovbRm => {
                let r = reg_from_byte(payload[0]);
                let addr = word_from_bytes(payload[1], payload[2]);
                let v = self.ram.read_byte(addr);
                self.set_reg(r, v as i16);
            }

            Opcode::SwapRr => {
                let (r1, r2) = (reg_from_byte(payload[0]), reg_from_byte(payload[1]));
                let (a, b) = (self.get_reg(r1), self.get_reg(r2));
                self.set_reg(r1, b);
                self.set_reg(r2, a);
            }
            Opcode::SwapRm => {
                let r = reg_from_byte(payload[0]);
                let addr = word_from_bytes(payload[1], payload[2]);
                let (rv, mv) = (self.get_reg(r) as u16, self.ram.read_word(addr));
                self.ram.write_word(addr, rv);
                self.set_reg(r, mv as i16);
            }

            Opcode::ZeroNil => {
                for r in [RegName::R1, RegName::R2, RegName::R3, RegName::R4] {
                    self.set_reg(r, 0);
                }
            }
            Opcode::DupR => {
                let r = reg_from_byte(payload[0]);
                if r.is_general() {
                    let v = self.get_reg(r);
                    for idx in r.index()..4 {
                        self.set_reg(RegName::from_index(idx as u8).unwrap(), v);
                    }
                }
            }

            Opcode::AddRw => {
                let r = reg_from_byte(payload[0]);
                let w = word_from_bytes(payload[1], payload[2]);
                self.set_reg(r, self.get_reg(r).wrapping_add(w as i16));
            }
            Opcode::AddRr => {
                let (r1, r2) = (reg_from_byte(payload[0]), reg_from_byte(payload[1]));
                self.set_reg(r1, self.get_reg(r1).wrapping_add(self.get_reg(r2)));
            }
            Opcode::AddRrr => {
                let (r1, r2, r3) = (
                    reg_from_byte(payload[0]),
                    reg_from_byte(payload[1]),
                    reg_from_byte(payload[2]),
                );
                let sum = self
                    .get_reg(r1)
                    .wrapping_add(self.get_reg(r2))
                    .wrapping_add(self.get_reg(r3));
                self.set_reg(r1, sum);
            }
            Opcode::SubRr => {
                let (r1, r2) = (reg_from_byte(payload[0]), reg_from_byte(payload[1]));
                self.set_reg(r1, self.get_reg(r1).wrapping_sub(self.get_reg(r2)));
            }
            Opcode::MulRw => {
                let r = reg_from_byte(payload[0]);
                let w = word_from_bytes(payload[1], payload[2]);
                self.set_reg(r, self.get_reg(r).wrapping_mul(w as i16));
            }
            Opcode::MulRr => {
                let (r1, r2) = (reg_from_byte(payload[0]), reg_from_byte(payload[1]));
                self.set_reg(r1, self.get_reg(r1).wrapping_mul(self.get_reg(r2)));
            }
            Opcode::NegR => {
                let r = reg_from_byte(payload[0]);
                self.set_reg(r, self.get_reg(r).wrapping_neg());
            }

            Opcode::JmpW => {
                self.set_pc(word_from_bytes(payload[0], payload[1]));
            }
            Opcode::JnegRw => {
                let r = reg_from_byte(payload[0]);
                let addr = word_from_bytes(payload[1], payload[2]);
                if self.get_reg(r) < 0 {
                    self.set_pc(addr);
                }
            }
            Opcode::JposRw => {
                let r = reg_from_byte(payload[0]);
                let addr = word_from_bytes(payload[1], payload[2]);
                // Preserved as observed: fires when REG > 1, not REG > 0.
                if self.get_reg(r) > 1 {
                    self.set_pc(addr);
                }
            }
            Opcode::JzeroRw => {
                let r = reg_from_byte(payload[0]);
                let addr = word_from_bytes(payload[1], payload[2]);
                if self.get_reg(r) == 0 {
                    self.set_pc(addr);
                }
            }
            Opcode::JnzeroRw => {
                let r = reg_from_byte(payload[0]);
                let addr = word_from_bytes(payload[1], payload[2]);
                if self.get_reg(r) != 0 {
                    self.set_pc(addr);
                }
            }

            Opcode::HaltNil => {
                self.halt = true;
            }

            Opcode::AndRr => {
                let (r1, r2) = (reg_from_byte(payload[0]), reg_from_byte(payload[1]));
                let v = (self.get_reg(r1) as u16) & (self.get_reg(r2) as u16);
                self.set_reg(r1, v as i16);
            }
            Opcode::AndRw => {
                let r = reg_from_byte(payload[0]);
                let w = word_from_bytes(payload[1], payload[2]);
                let v = (self.get_reg(r) as u16) & w;
                self.set_reg(r, v as i16);
            }
            Opcode::OrRr => {
                let (r1, r2) = (reg_from_byte(payload[0]), reg_from_byte(payload[1]));
                let v = (self.get_reg(r1) as u16) | (self.get_reg(r2) as u16);
                self.set_reg(r1, v as i16);
            }
            Opcode::OrRw => {
                let r = reg_from_byte(payload[0]);
                let w = word_from_bytes(payload[1], payload[2]);
                let v = (self.get_reg(r) as u16) | w;
                self.set_reg(r, v as i16);
            }
            Opcode::XorRr => {
                let (r1, r2) = (reg_from_byte(payload[0]), reg_from_byte(payload[1]));
                let v = (self.get_reg(r1) as u16) ^ (self.get_reg(r2) as u16);
                self.set_reg(r1, v as i16);
            }
            Opcode::XorRw => {
                let r = reg_from_byte(payload[0]);
                let w = word_from_bytes(payload[1], payload[2]);
                let v = (self.get_reg(r) as u16) ^ w;
                self.set_reg(r, v as i16);
            }
            Opcode::NotR => {
                let r = reg_from_byte(payload[0]);
                let v = !(self.get_reg(r) as u16);
                self.set_reg(r, v as i16);
            }

            Opcode::BslR => {
                let r = reg_from_byte(payload[0]);
                let v = (self.get_reg(r) as u16) << 1;
                self.set_reg(r, v as i16);
            }
            Opcode::BsrR => {
                let r = reg_from_byte(payload[0]);
                let v = (self.get_reg(r) as u16) >> 1;
                self.set_reg(r, v as i16);
            }
            Opcode::RolR => {
                let r = reg_from_byte(payload[0]);
                let v = (self.get_reg(r) as u16).rotate_left(1);
                self.set_reg(r, v as i16);
            }
            Opcode::RorR => {
                let r = reg_from_byte(payload[0]);
                let v = (self.get_reg(r) as u16).rotate_right(1);
                self.set_reg(r, v as i16);
            }

            Opcode::PushR => {
                let r = reg_from_byte(payload[0]);
                self.push_word(self.get_reg(r) as u16);
            }
            Opcode::PushW => {
                let w = word_from_bytes(payload[0], payload[1]);
                self.push_word(w);
            }
            Opcode::PushB => {
                self.push_byte(payload[0]);
            }
            Opcode::PopbR => {
                let r = reg_from_byte(payload[0]);
                if let Some(b) = self.pop_byte() {
                    self.set_reg(r, b as i16);
                }
            }
            Opcode::PopwR => {
                let r = reg_from_byte(payload[0]);
                if let Some(w) = self.pop_word() {
                    self.set_reg(r, w as i16);
                }
            }

            Opcode::RecvRb | Opcode::SendRb => {
                unreachable!("reserved opcodes are intercepted before dispatch")
            }

            Opcode::BcRrr => {
                let (r1, r2, r3) = (
                    reg_from_byte(payload[0]),
                    reg_from_byte(payload[1]),
                    reg_from_byte(payload[2]),
                );
                let src = self.get_reg(r1) as u16 as usize;
                let dst = self.get_reg(r2) as u16 as usize;
                let amt = self.get_reg(r3).max(0) as usize;

                let src_end = src + amt;
                let dst_end = dst + amt;
                if src_end > RAM_SIZE - 1 || dst_end > RAM_SIZE - 1 {
                    warn!("block copy out of range: src {}..{} dst {}..{}", src, src_end, dst, dst_end);
                    self.errors.illegal_instruction = true;
                    self.halt = true;
                    return;
                }

                let ram = self.ram.as_mut_slice();
                ram.copy_within(src..src_end, dst);
            }
        }
    }

    fn push_word(&mut self, value: u16) {
        let sp = self.sp();
        if sp as usize >= STACK_SIZE - 2 {
            return;
        }
        self.stack.write_word(sp, value);
        self.set_sp(sp + 2);
    }

    fn push_byte(&mut self, value: u8) {
        let sp = self.sp();
        if sp as usize >= STACK_SIZE - 1 {
            return;
        }
        self.stack.write_byte(sp, value);
        self.set_sp(sp + 1);
    }

    fn pop_word(&mut self) -> Option<u16> {
        let sp = self.sp();
        if sp == 0 {
            return None;
        }
        let new_sp = if sp == 1 { sp - 1 } else { sp - 2 };
        self.set_sp(new_sp);
        Some(self.stack.read_word(new_sp))
    }

    fn pop_byte(&mut self) -> Option<u8> {
        let sp = self.sp();
        if sp == 0 {
            return None;
        }
        let new_sp = sp - 1;
        self.set_sp(new_sp);
        Some(self.stack.read_byte(new_sp))
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::Assembler;

    fn compiled(source: &str) -> Vm {
        let mut vm = Vm::new();
        let mut asm = Assembler::new();
        asm.compile(source, &mut vm).unwrap();
        vm
    }

    #[test]
    fn countdown_runs_exactly_forty_one_times_through_loop() {
        let mut vm = compiled("start: MOV R1,40\nloop:  ADD R1,-1\n       JNZERO R1,loop\n       HALT\n");
        vm.run();
        assert_eq!(vm.get_reg(RegName::R1), 0);
        assert!(vm.is_halted());
    }

    #[test]
    fn indirect_store_via_movrp() {
        let mut vm = compiled(
            "start: MOV R1,200\n       MOV R2,1\nloop:  ADD R2,R2\n       MOVRP R1,R2\n       ADD R1,2\n       MOV R3,216\n       SUB R3,R1\n       JNZERO R3,loop\n       HALT\n",
        );
        vm.run();
        assert!(vm.is_halted());
        // R2 doubled eight times from 1: 2,4,8,...,256.
        assert_eq!(vm.get_reg(RegName::R2), 256);
    }

    #[test]
    fn stack_round_trip_push_pop_word() {
        let mut vm = compiled("MOV R1,4660\nPUSH R1\nZERO\nPOPW R2\nHALT\n");
        vm.run();
        assert_eq!(vm.get_reg(RegName::R2), 4660);
        assert_eq!(vm.sp(), 0);
    }

    #[test]
    fn jump_never_taken_falls_through_to_first_halt() {
        let mut vm = compiled("MOV R1,5\nJZERO R1,target\nHALT\ntarget: HALT\n");
        vm.run();
        assert!(vm.is_halted());
        assert_eq!(vm.pc(), 9); // one past the first HALT, at address 8
    }

    #[test]
    fn bit_rotate_left_wraps_top_bit_to_bottom() {
        let mut vm = compiled("MOV R1,32769\nROL R1\nHALT\n");
        vm.run();
        assert_eq!(vm.get_reg(RegName::R1), 3);
    }

    #[test]
    fn illegal_opcode_sets_sticky_flags_and_halts() {
        let mut vm = Vm::new();
        // burn a single raw invalid byte directly; 0xFE is past NUM_OPCODES.
        vm.rom.burn(0, &[0xFE, 0, 0, 0]);
        vm.rwp = 1;
        vm.step();
        assert!(vm.errors().illegal_instruction);
        assert!(vm.errors().on_fire);
        assert!(vm.is_halted());
    }

    #[test]
    fn reset_clears_general_registers_pc_and_rwp_but_not_sp() {
        let mut vm = compiled("PUSH R1\nHALT\n");
        vm.set_reg(RegName::R1, 99);
        vm.step();
        vm.reset();
        assert_eq!(vm.get_reg(RegName::R1), 0);
        assert_eq!(vm.pc(), 0);
        assert_eq!(vm.rom_size(), 0);
        // SP survived the push from before reset.
        assert_eq!(vm.sp(), 2);
    }

    #[test]
    fn recv_and_send_are_treated_as_illegal_opcodes() {
        let mut vm = Vm::new();
        vm.rom.burn(0, &[Opcode::RecvRb.to_byte(), 0, 3, 0]);
        vm.rwp = 1;
        vm.step();
        assert!(vm.errors().illegal_instruction);
        assert!(vm.is_halted());
    }
}
