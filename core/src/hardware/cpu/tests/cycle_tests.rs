//! Per-opcode cycle costs: four T-states per memory access plus the
//! documented internal cycles, measured through the test bus's counter.
use pretty_assertions::assert_eq;

use crate::hardware::cpu::tests::with_code;

/// Runs the single instruction in `code` and returns its total T-state cost.
fn cycles_of(code: &[u8]) -> i32 {
    let mut cpu = with_code(code);
    cpu.registers.set_hl(0xC000);
    cpu.registers.sp = 0xD000;
    cpu.step(i32::MAX).unwrap();
    cpu.bus.cycles
}

#[test]
fn loads_and_arithmetic() {
    assert_eq!(cycles_of(&[0x00]), 4); // NOP
    assert_eq!(cycles_of(&[0x06, 0x12]), 8); // LD B,n
    assert_eq!(cycles_of(&[0x41]), 4); // LD B,C
    assert_eq!(cycles_of(&[0x46]), 8); // LD B,(HL)
    assert_eq!(cycles_of(&[0x36, 0x55]), 12); // LD (HL),n
    assert_eq!(cycles_of(&[0x34]), 12); // INC (HL)
    assert_eq!(cycles_of(&[0x3C]), 4); // INC A
    assert_eq!(cycles_of(&[0x03]), 8); // INC BC
    assert_eq!(cycles_of(&[0x09]), 8); // ADD HL,BC
    assert_eq!(cycles_of(&[0x86]), 8); // ADD A,(HL)
    assert_eq!(cycles_of(&[0xC6, 0x01]), 8); // ADD A,n
    assert_eq!(cycles_of(&[0x01, 0x34, 0x12]), 12); // LD BC,d16
    assert_eq!(cycles_of(&[0x08, 0x00, 0xC1]), 20); // LD (a16),SP
    assert_eq!(cycles_of(&[0xF9]), 8); // LD SP,HL
    assert_eq!(cycles_of(&[0xF8, 0x01]), 12); // LD HL,SP+i8
    assert_eq!(cycles_of(&[0xE8, 0x01]), 16); // ADD SP,i8
    assert_eq!(cycles_of(&[0xE0, 0x80]), 12); // LDH (a8),A
    assert_eq!(cycles_of(&[0xF0, 0x80]), 12); // LDH A,(a8)
    assert_eq!(cycles_of(&[0xE2]), 8); // LD (C),A
    assert_eq!(cycles_of(&[0xEA, 0x00, 0xC0]), 16); // LD (a16),A
}

#[test]
fn jumps_and_calls() {
    // Flags are all clear after reset, so NZ is taken and Z is not.
    assert_eq!(cycles_of(&[0xC3, 0x00, 0xC0]), 16); // JP a16
    assert_eq!(cycles_of(&[0xC2, 0x00, 0xC0]), 16); // JP NZ taken
    assert_eq!(cycles_of(&[0xCA, 0x00, 0xC0]), 12); // JP Z not taken
    assert_eq!(cycles_of(&[0xE9]), 4); // JP HL
    assert_eq!(cycles_of(&[0x18, 0x02]), 12); // JR taken
    assert_eq!(cycles_of(&[0x28, 0x02]), 8); // JR Z not taken
    assert_eq!(cycles_of(&[0xCD, 0x00, 0xC0]), 24); // CALL a16
    assert_eq!(cycles_of(&[0xC4, 0x00, 0xC0]), 24); // CALL NZ taken
    assert_eq!(cycles_of(&[0xCC, 0x00, 0xC0]), 12); // CALL Z not taken
    assert_eq!(cycles_of(&[0xC9]), 16); // RET
    assert_eq!(cycles_of(&[0xC0]), 20); // RET NZ taken
    assert_eq!(cycles_of(&[0xC8]), 8); // RET Z not taken
    assert_eq!(cycles_of(&[0xD9]), 16); // RETI
    assert_eq!(cycles_of(&[0xC7]), 16); // RST 00
    assert_eq!(cycles_of(&[0xC5]), 16); // PUSH BC
    assert_eq!(cycles_of(&[0xC1]), 12); // POP BC
}

#[test]
fn prefixed_operations() {
    assert_eq!(cycles_of(&[0xCB, 0x11]), 8); // RL C
    assert_eq!(cycles_of(&[0xCB, 0x46]), 12); // BIT 0,(HL): read only
    assert_eq!(cycles_of(&[0xCB, 0x16]), 16); // RL (HL): read-modify-write
    assert_eq!(cycles_of(&[0xCB, 0xC6]), 16); // SET 0,(HL)
}

#[test]
fn interrupt_master_enable_opcodes() {
    assert_eq!(cycles_of(&[0xF3]), 4); // DI
    assert_eq!(cycles_of(&[0xFB]), 4); // EI
}
