//! Opcode dispatch: the 256-entry primary map and the 256-entry CB-prefixed
//! map, both realised as exhaustive matches. The undefined opcodes and
//! `STOP` surface as a [`CpuFault`] instead of ending the process.
use crate::error::CpuFault;
use crate::hardware::cpu::Cpu;
use crate::hardware::mmu::MemoryBus;
use crate::hardware::registers::Reg8;

/// The memory-operand addressing modes instructions come in.
#[derive(Debug, Copy, Clone)]
pub enum InstructionAddress {
    BcIndirect,
    DeIndirect,
    HlIndirect,
    /// `(HL+)`
    HlIncrement,
    /// `(HL-)`
    HlDecrement,
    /// 8- or 16-bit immediate, depending on the consuming trait.
    Immediate,
    /// `(a16)`
    ImmediateAddress,
    /// `(0xFF00 + a8)`
    HighImmediate,
    /// `(0xFF00 + C)`
    HighC,
}

/// A register or memory operand, as encoded in an opcode's low three bits.
#[derive(Debug, Copy, Clone)]
pub enum Operand {
    Reg8(Reg8),
    Address(InstructionAddress),
}

/// Decodes the `[B, C, D, E, H, L, (HL), A]` column an opcode's low three
/// bits select.
pub fn decode_operand(bits: u8) -> Operand {
    match bits & 0x07 {
        0 => Operand::Reg8(Reg8::B),
        1 => Operand::Reg8(Reg8::C),
        2 => Operand::Reg8(Reg8::D),
        3 => Operand::Reg8(Reg8::E),
        4 => Operand::Reg8(Reg8::H),
        5 => Operand::Reg8(Reg8::L),
        6 => Operand::Address(InstructionAddress::HlIndirect),
        _ => Operand::Reg8(Reg8::A),
    }
}

#[derive(Debug, Copy, Clone)]
pub enum JumpCondition {
    NotZero,
    Zero,
    NotCarry,
    Carry,
    Always,
}

impl<M: MemoryBus> Cpu<M> {
    pub(crate) fn execute(&mut self, opcode: u8) -> Result<(), CpuFault> {
        use InstructionAddress::*;
        use JumpCondition::*;
        use crate::hardware::registers::Reg16::*;
        use crate::hardware::registers::Reg8::*;

        match opcode {
            0x00 => self.nop(),
            0x01 => self.load_16bit(BC, Immediate),
            0x02 => self.load_8bit(BcIndirect, A),
            0x03 => self.increment16(BC),
            0x04 => self.increment(B),
            0x05 => self.decrement(B),
            0x06 => self.load_8bit(B, Immediate),
            0x07 => self.rlca(),
            0x08 => self.load_16bit(ImmediateAddress, SP),
            0x09 => self.add16(BC),
            0x0A => self.load_8bit(A, BcIndirect),
            0x0B => self.decrement16(BC),
            0x0C => self.increment(C),
            0x0D => self.decrement(C),
            0x0E => self.load_8bit(C, Immediate),
            0x0F => self.rrca(),
            0x10 => return Err(CpuFault::Stop),
            0x11 => self.load_16bit(DE, Immediate),
            0x12 => self.load_8bit(DeIndirect, A),
            0x13 => self.increment16(DE),
            0x14 => self.increment(D),
            0x15 => self.decrement(D),
            0x16 => self.load_8bit(D, Immediate),
            0x17 => self.rla(),
            0x18 => self.relative_jump(Always),
            0x19 => self.add16(DE),
            0x1A => self.load_8bit(A, DeIndirect),
            0x1B => self.decrement16(DE),
            0x1C => self.increment(E),
            0x1D => self.decrement(E),
            0x1E => self.load_8bit(E, Immediate),
            0x1F => self.rra(),
            0x20 => self.relative_jump(NotZero),
            0x21 => self.load_16bit(HL, Immediate),
            0x22 => self.load_8bit(HlIncrement, A),
            0x23 => self.increment16(HL),
            0x24 => self.increment(H),
            0x25 => self.decrement(H),
            0x26 => self.load_8bit(H, Immediate),
            0x27 => self.daa(),
            0x28 => self.relative_jump(Zero),
            0x29 => self.add16(HL),
            0x2A => self.load_8bit(A, HlIncrement),
            0x2B => self.decrement16(HL),
            0x2C => self.increment(L),
            0x2D => self.decrement(L),
            0x2E => self.load_8bit(L, Immediate),
            0x2F => self.cpl(),
            0x30 => self.relative_jump(NotCarry),
            0x31 => self.load_16bit(SP, Immediate),
            0x32 => self.load_8bit(HlDecrement, A),
            0x33 => self.increment16(SP),
            0x34 => self.increment(InstructionAddress::HlIndirect),
            0x35 => self.decrement(InstructionAddress::HlIndirect),
            0x36 => self.load_8bit(InstructionAddress::HlIndirect, Immediate),
            0x37 => self.scf(),
            0x38 => self.relative_jump(Carry),
            0x39 => self.add16(SP),
            0x3A => self.load_8bit(A, HlDecrement),
            0x3B => self.decrement16(SP),
            0x3C => self.increment(A),
            0x3D => self.decrement(A),
            0x3E => self.load_8bit(A, Immediate),
            0x3F => self.ccf(),
            0x76 => self.halt(),
            // The 8x8 register-to-register load block (HALT punches the
            // (HL),(HL) hole above).
            0x40..=0x7F => {
                let source = decode_operand(opcode);
                let destination = decode_operand(opcode >> 3);
                self.load_8bit(destination, source);
            }
            0x80..=0x87 => self.add(decode_operand(opcode)),
            0x88..=0x8F => self.adc(decode_operand(opcode)),
            0x90..=0x97 => self.sub(decode_operand(opcode)),
            0x98..=0x9F => self.sbc(decode_operand(opcode)),
            0xA0..=0xA7 => self.and(decode_operand(opcode)),
            0xA8..=0xAF => self.xor(decode_operand(opcode)),
            0xB0..=0xB7 => self.or(decode_operand(opcode)),
            0xB8..=0xBF => self.compare(decode_operand(opcode)),
            0xC0 => self.ret(NotZero),
            0xC1 => self.pop(BC),
            0xC2 => self.jump(NotZero),
            0xC3 => self.jump(Always),
            0xC4 => self.call(NotZero),
            0xC5 => self.push(BC),
            0xC6 => self.add(Immediate),
            0xC7 => self.rst(0x00),
            0xC8 => self.ret(Zero),
            0xC9 => self.ret(Always),
            0xCA => self.jump(Zero),
            0xCB => {
                let prefixed = self.get_instr_u8();
                self.execute_prefix(prefixed);
            }
            0xCC => self.call(Zero),
            0xCD => self.call(Always),
            0xCE => self.adc(Immediate),
            0xCF => self.rst(0x08),
            0xD0 => self.ret(NotCarry),
            0xD1 => self.pop(DE),
            0xD2 => self.jump(NotCarry),
            0xD4 => self.call(NotCarry),
            0xD5 => self.push(DE),
            0xD6 => self.sub(Immediate),
            0xD7 => self.rst(0x10),
            0xD8 => self.ret(Carry),
            0xD9 => self.reti(),
            0xDA => self.jump(Carry),
            0xDC => self.call(Carry),
            0xDE => self.sbc(Immediate),
            0xDF => self.rst(0x18),
            0xE0 => self.load_8bit(HighImmediate, A),
            0xE1 => self.pop(HL),
            0xE2 => self.load_8bit(HighC, A),
            0xE5 => self.push(HL),
            0xE6 => self.and(Immediate),
            0xE7 => self.rst(0x20),
            0xE8 => self.add_sp(),
            0xE9 => self.jump_hl(),
            0xEA => self.load_8bit(ImmediateAddress, A),
            0xEE => self.xor(Immediate),
            0xEF => self.rst(0x28),
            0xF0 => self.load_8bit(A, HighImmediate),
            0xF1 => self.pop(AF),
            0xF2 => self.load_8bit(A, HighC),
            0xF3 => self.di(),
            0xF5 => self.push(AF),
            0xF6 => self.or(Immediate),
            0xF7 => self.rst(0x30),
            0xF8 => self.load_hl_sp_offset(),
            0xF9 => self.load_sp_hl(),
            0xFA => self.load_8bit(A, ImmediateAddress),
            0xFB => self.ei(),
            0xFE => self.compare(Immediate),
            0xFF => self.rst(0x38),
            0xD3 | 0xDB | 0xDD | 0xE3 | 0xE4 | 0xEB | 0xEC | 0xED | 0xF4 | 0xFC | 0xFD => {
                return Err(CpuFault::UndefinedOpcode(opcode));
            }
        }

        Ok(())
    }

    pub(crate) fn execute_prefix(&mut self, opcode: u8) {
        let target = decode_operand(opcode);
        let bit = (opcode >> 3) & 0x07;

        match opcode {
            0x00..=0x07 => self.rotate_left(target),
            0x08..=0x0F => self.rotate_right(target),
            0x10..=0x17 => self.rotate_left_through_carry(target),
            0x18..=0x1F => self.rotate_right_through_carry(target),
            0x20..=0x27 => self.shift_left_arithmetic(target),
            0x28..=0x2F => self.shift_right_arithmetic(target),
            0x30..=0x37 => self.swap(target),
            0x38..=0x3F => self.shift_right_logical(target),
            0x40..=0x7F => self.bit(bit, target),
            0x80..=0xBF => self.res(bit, target),
            0xC0..=0xFF => self.set(bit, target),
        }
    }
}
