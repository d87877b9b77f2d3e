//! Memory access, cycle accounting, interrupt dispatch, and the operand
//! resolution impls that map [`execute`](super::execute)'s addressing-mode
//! enums onto actual reads and writes.
use crate::hardware::cpu::execute::{InstructionAddress, Operand};
use crate::hardware::cpu::traits::{SetU16, SetU8, ToU16, ToU8};
use crate::hardware::cpu::Cpu;
use crate::hardware::mmu::MemoryBus;
use crate::hardware::registers::{Reg16, Reg8};

impl<M: MemoryBus> Cpu<M> {
    /// One internal machine cycle: time passes, no bus traffic.
    pub(crate) fn internal_cycle(&mut self) {
        self.bus.tick(4);
    }

    /// Reads a byte, costing the 4 T-states every memory access takes. The
    /// clock moves first so the access observes fully caught-up device state.
    pub(crate) fn read_byte_cycle(&mut self, address: u16) -> u8 {
        self.bus.tick(4);
        self.bus.read_byte(address)
    }

    pub(crate) fn write_byte_cycle(&mut self, address: u16, value: u8) {
        self.bus.tick(4);
        self.bus.write_byte(address, value);
    }

    /// Fetches the byte at PC and advances it.
    pub(crate) fn get_instr_u8(&mut self) -> u8 {
        let value = self.read_byte_cycle(self.registers.pc);
        self.registers.pc = self.registers.pc.wrapping_add(1);
        value
    }

    /// Fetches a little-endian 16-bit immediate.
    pub(crate) fn get_instr_u16(&mut self) -> u16 {
        let low = self.get_instr_u8() as u16;
        let high = self.get_instr_u8() as u16;
        (high << 8) | low
    }

    /// Pushes high byte first, mirroring hardware's stack write order.
    pub(crate) fn push_word(&mut self, value: u16) {
        self.registers.sp = self.registers.sp.wrapping_sub(1);
        self.write_byte_cycle(self.registers.sp, (value >> 8) as u8);
        self.registers.sp = self.registers.sp.wrapping_sub(1);
        self.write_byte_cycle(self.registers.sp, value as u8);
    }

    pub(crate) fn pop_word(&mut self) -> u16 {
        let low = self.read_byte_cycle(self.registers.sp) as u16;
        self.registers.sp = self.registers.sp.wrapping_add(1);
        let high = self.read_byte_cycle(self.registers.sp) as u16;
        self.registers.sp = self.registers.sp.wrapping_add(1);
        (high << 8) | low
    }

    /// Any requested-and-enabled interrupt lifts HALT, even with IME clear.
    /// With IME set, the highest-priority one is dispatched: 12 T-states of
    /// internal work, the PC pushed, the IF bit acknowledged, and execution
    /// resumed at the fixed vector.
    pub(crate) fn service_interrupts(&mut self) {
        let pending =
            self.bus.interrupts().flags.bits() & self.bus.interrupts().enable.bits() & 0x1F;
        if pending == 0 {
            return;
        }

        self.halted = false;

        if !self.ime {
            return;
        }

        if let Some(interrupt) = self.bus.interrupts().next_pending() {
            self.ime = false;
            self.pending_ime = false;

            self.bus.tick(12);
            self.push_word(self.registers.pc);
            self.bus.interrupts_mut().clear(interrupt);
            self.registers.pc = interrupt.vector();
        }
    }

    fn resolve_address(&mut self, target: InstructionAddress) -> u16 {
        match target {
            InstructionAddress::BcIndirect => self.registers.bc(),
            InstructionAddress::DeIndirect => self.registers.de(),
            InstructionAddress::HlIndirect => self.registers.hl(),
            InstructionAddress::HlIncrement => {
                let address = self.registers.hl();
                self.registers.set_hl(address.wrapping_add(1));
                address
            }
            InstructionAddress::HlDecrement => {
                let address = self.registers.hl();
                self.registers.set_hl(address.wrapping_sub(1));
                address
            }
            InstructionAddress::Immediate => {
                let address = self.registers.pc;
                self.registers.pc = self.registers.pc.wrapping_add(1);
                address
            }
            InstructionAddress::ImmediateAddress => self.get_instr_u16(),
            InstructionAddress::HighImmediate => 0xFF00 | self.get_instr_u8() as u16,
            InstructionAddress::HighC => 0xFF00 | self.registers.c as u16,
        }
    }
}

impl<M: MemoryBus> ToU8<Reg8> for Cpu<M> {
    fn read_u8_value(&mut self, target: Reg8) -> u8 {
        match target {
            Reg8::A => self.registers.a,
            Reg8::B => self.registers.b,
            Reg8::C => self.registers.c,
            Reg8::D => self.registers.d,
            Reg8::E => self.registers.e,
            Reg8::H => self.registers.h,
            Reg8::L => self.registers.l,
        }
    }
}

impl<M: MemoryBus> SetU8<Reg8> for Cpu<M> {
    fn set_u8_value(&mut self, target: Reg8, value: u8) {
        match target {
            Reg8::A => self.registers.a = value,
            Reg8::B => self.registers.b = value,
            Reg8::C => self.registers.c = value,
            Reg8::D => self.registers.d = value,
            Reg8::E => self.registers.e = value,
            Reg8::H => self.registers.h = value,
            Reg8::L => self.registers.l = value,
        }
    }
}

impl<M: MemoryBus> ToU8<InstructionAddress> for Cpu<M> {
    fn read_u8_value(&mut self, target: InstructionAddress) -> u8 {
        let address = self.resolve_address(target);
        self.read_byte_cycle(address)
    }
}

impl<M: MemoryBus> SetU8<InstructionAddress> for Cpu<M> {
    fn set_u8_value(&mut self, target: InstructionAddress, value: u8) {
        let address = self.resolve_address(target);
        self.write_byte_cycle(address, value);
    }
}

impl<M: MemoryBus> ToU8<Operand> for Cpu<M> {
    fn read_u8_value(&mut self, target: Operand) -> u8 {
        match target {
            Operand::Reg8(register) => self.read_u8_value(register),
            Operand::Address(address) => self.read_u8_value(address),
        }
    }
}

impl<M: MemoryBus> SetU8<Operand> for Cpu<M> {
    fn set_u8_value(&mut self, target: Operand, value: u8) {
        match target {
            Operand::Reg8(register) => self.set_u8_value(register, value),
            Operand::Address(address) => self.set_u8_value(address, value),
        }
    }
}

impl<M: MemoryBus> ToU16<Reg16> for Cpu<M> {
    fn read_u16_value(&mut self, target: Reg16) -> u16 {
        match target {
            Reg16::AF => self.registers.af(),
            Reg16::BC => self.registers.bc(),
            Reg16::DE => self.registers.de(),
            Reg16::HL => self.registers.hl(),
            Reg16::SP => self.registers.sp,
        }
    }
}

impl<M: MemoryBus> SetU16<Reg16> for Cpu<M> {
    fn set_u16_value(&mut self, target: Reg16, value: u16) {
        match target {
            Reg16::AF => self.registers.set_af(value),
            Reg16::BC => self.registers.set_bc(value),
            Reg16::DE => self.registers.set_de(value),
            Reg16::HL => self.registers.set_hl(value),
            Reg16::SP => self.registers.sp = value,
        }
    }
}

impl<M: MemoryBus> ToU16<InstructionAddress> for Cpu<M> {
    fn read_u16_value(&mut self, target: InstructionAddress) -> u16 {
        match target {
            InstructionAddress::Immediate => self.get_instr_u16(),
            _ => {
                let address = self.resolve_address(target);
                let low = self.read_byte_cycle(address) as u16;
                let high = self.read_byte_cycle(address.wrapping_add(1)) as u16;
                (high << 8) | low
            }
        }
    }
}

impl<M: MemoryBus> SetU16<InstructionAddress> for Cpu<M> {
    /// Only used by `LD (a16),SP`.
    fn set_u16_value(&mut self, target: InstructionAddress, value: u16) {
        let address = self.resolve_address(target);
        self.write_byte_cycle(address, value as u8);
        self.write_byte_cycle(address.wrapping_add(1), (value >> 8) as u8);
    }
}
