//! Rotate and shift helpers shared between the accumulator shorthand
//! opcodes and their CB-prefixed generalisations.
use crate::hardware::cpu::traits::{SetU8, ToU8};
use crate::hardware::cpu::Cpu;
use crate::hardware::mmu::MemoryBus;

impl<M: MemoryBus> Cpu<M> {
    /// `RLC`: bit 7 moves into both the carry and bit 0.
    pub(crate) fn rotate_left<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T> + SetU8<T>,
    {
        let value = self.read_u8_value(target);
        let result = value.rotate_left(1);
        self.set_rotate_flags(result, value & 0x80 != 0);
        self.set_u8_value(target, result);
    }

    /// `RL`: rotate left through the carry flag.
    pub(crate) fn rotate_left_through_carry<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T> + SetU8<T>,
    {
        let value = self.read_u8_value(target);
        let result = (value << 1) | self.registers.cf() as u8;
        self.set_rotate_flags(result, value & 0x80 != 0);
        self.set_u8_value(target, result);
    }

    /// `RRC`: bit 0 moves into both the carry and bit 7.
    pub(crate) fn rotate_right<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T> + SetU8<T>,
    {
        let value = self.read_u8_value(target);
        let result = value.rotate_right(1);
        self.set_rotate_flags(result, value & 0x01 != 0);
        self.set_u8_value(target, result);
    }

    /// `RR`: rotate right through the carry flag.
    pub(crate) fn rotate_right_through_carry<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T> + SetU8<T>,
    {
        let value = self.read_u8_value(target);
        let result = ((self.registers.cf() as u8) << 7) | (value >> 1);
        self.set_rotate_flags(result, value & 0x01 != 0);
        self.set_u8_value(target, result);
    }

    /// `SLA`: arithmetic shift left, bit 7 into carry.
    pub(crate) fn shift_left_arithmetic<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T> + SetU8<T>,
    {
        let value = self.read_u8_value(target);
        let result = value << 1;
        self.set_rotate_flags(result, value & 0x80 != 0);
        self.set_u8_value(target, result);
    }

    /// `SRA`: shift right preserving the sign bit.
    pub(crate) fn shift_right_arithmetic<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T> + SetU8<T>,
    {
        let value = self.read_u8_value(target);
        let result = (value & 0x80) | (value >> 1);
        self.set_rotate_flags(result, value & 0x01 != 0);
        self.set_u8_value(target, result);
    }

    /// `SRL`: logical shift right, zero into bit 7.
    pub(crate) fn shift_right_logical<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T> + SetU8<T>,
    {
        let value = self.read_u8_value(target);
        let result = value >> 1;
        self.set_rotate_flags(result, value & 0x01 != 0);
        self.set_u8_value(target, result);
    }

    /// `SWAP`: exchange the nibbles.
    pub(crate) fn swap<T: Copy>(&mut self, target: T)
    where
        Self: ToU8<T> + SetU8<T>,
    {
        let value = self.read_u8_value(target);
        let result = value.rotate_left(4);
        self.set_rotate_flags(result, false);
        self.set_u8_value(target, result);
    }

    /// `BIT n`: Z reflects the tested bit; the operand is never written back.
    pub(crate) fn bit<T: Copy>(&mut self, bit: u8, target: T)
    where
        Self: ToU8<T>,
    {
        let value = self.read_u8_value(target);
        self.registers.set_zf(value & (1 << bit) == 0);
        self.registers.set_n(false);
        self.registers.set_h(true);
    }

    /// `SET n`.
    pub(crate) fn set<T: Copy>(&mut self, bit: u8, target: T)
    where
        Self: ToU8<T> + SetU8<T>,
    {
        let value = self.read_u8_value(target);
        self.set_u8_value(target, value | (1 << bit));
    }

    /// `RES n`.
    pub(crate) fn res<T: Copy>(&mut self, bit: u8, target: T)
    where
        Self: ToU8<T> + SetU8<T>,
    {
        let value = self.read_u8_value(target);
        self.set_u8_value(target, value & !(1 << bit));
    }

    #[inline]
    fn set_rotate_flags(&mut self, result: u8, carry: bool) {
        self.registers.set_zf(result == 0);
        self.registers.set_n(false);
        self.registers.set_h(false);
        self.registers.set_cf(carry);
    }
}
