use pretty_assertions::assert_eq;

use crate::error::CpuFault;
use crate::hardware::cpu::tests::{initial_cpu, read_short, with_code};
use crate::io::interrupts::{Interrupt, InterruptFlags};

#[test]
fn xor_a_clears_a_and_sets_only_zero() {
    let mut cpu = with_code(&[0xAF]);
    cpu.registers.a = 0x5A;

    cpu.step(i32::MAX).unwrap();

    assert_eq!(cpu.registers.a, 0);
    assert!(cpu.registers.zf());
    assert!(!cpu.registers.n());
    assert!(!cpu.registers.h());
    assert!(!cpu.registers.cf());
}

#[test]
fn add_a_a_with_0x80_wraps_to_zero_with_carry() {
    let mut cpu = with_code(&[0x87]);
    cpu.registers.a = 0x80;

    cpu.step(i32::MAX).unwrap();

    assert_eq!(cpu.registers.a, 0);
    assert!(cpu.registers.zf());
    assert!(!cpu.registers.n());
    assert!(!cpu.registers.h());
    assert!(cpu.registers.cf());
}

#[test]
fn cp_a_a_leaves_a_and_sets_zero_and_subtract() {
    let mut cpu = with_code(&[0xBF]);
    cpu.registers.a = 0x3C;

    cpu.step(i32::MAX).unwrap();

    assert_eq!(cpu.registers.a, 0x3C);
    assert!(cpu.registers.zf());
    assert!(cpu.registers.n());
    assert!(!cpu.registers.h());
    assert!(!cpu.registers.cf());
}

#[test]
fn daa_adjusts_bcd_addition() {
    // 0x45 + 0x45 = 0x8A, decimal-adjusted to 0x90.
    let mut cpu = with_code(&[0x87, 0x27]);
    cpu.registers.a = 0x45;

    cpu.step(i32::MAX).unwrap();
    assert_eq!(cpu.registers.a, 0x8A);

    cpu.step(i32::MAX).unwrap();
    assert_eq!(cpu.registers.a, 0x90);
    assert!(!cpu.registers.cf());
}

#[test]
fn half_carry_uses_the_xor_formula() {
    // 0x0F + 0x01 carries from bit 3 into bit 4.
    let mut cpu = with_code(&[0xC6, 0x01]);
    cpu.registers.a = 0x0F;
    cpu.step(i32::MAX).unwrap();
    assert!(cpu.registers.h());
    assert!(!cpu.registers.cf());

    // 0x10 - 0x01 borrows back across the nibble.
    let mut cpu = with_code(&[0xD6, 0x01]);
    cpu.registers.a = 0x10;
    cpu.step(i32::MAX).unwrap();
    assert!(cpu.registers.h());
    assert_eq!(cpu.registers.a, 0x0F);
}

#[test]
fn sbc_chains_the_carry_into_the_subtraction() {
    let mut cpu = with_code(&[0xDE, 0x00]);
    cpu.registers.a = 0x00;
    cpu.registers.set_cf(true);

    cpu.step(i32::MAX).unwrap();

    assert_eq!(cpu.registers.a, 0xFF);
    assert!(cpu.registers.n());
    assert!(cpu.registers.h());
    assert!(cpu.registers.cf());
}

#[test]
fn add_sp_uses_low_byte_carries_and_clears_zero() {
    let mut cpu = with_code(&[0xE8, 0x01]);
    cpu.registers.sp = 0xFFFF;

    cpu.step(i32::MAX).unwrap();

    assert_eq!(cpu.registers.sp, 0x0000);
    assert!(!cpu.registers.zf());
    assert!(!cpu.registers.n());
    assert!(cpu.registers.h());
    assert!(cpu.registers.cf());
}

#[test]
fn ld_hl_sp_with_negative_offset() {
    let mut cpu = with_code(&[0xF8, 0xFE]); // HL = SP - 2
    cpu.registers.sp = 0xC000;

    cpu.step(i32::MAX).unwrap();

    assert_eq!(cpu.registers.hl(), 0xBFFE);
    assert!(!cpu.registers.zf());
    assert!(!cpu.registers.n());
}

#[test]
fn push_then_pop_round_trips_and_preserves_sp() {
    let mut cpu = initial_cpu();
    cpu.registers.sp = 0xC100;

    cpu.push_word(0x1234);
    assert_eq!(cpu.registers.sp, 0xC0FE);
    assert_eq!(cpu.pop_word(), 0x1234);
    assert_eq!(cpu.registers.sp, 0xC100);
}

#[test]
fn rotates_through_a_clear_zero() {
    // RLA with A = 0x80 and no carry in: A becomes 0, but Z stays clear.
    let mut cpu = with_code(&[0x17]);
    cpu.registers.a = 0x80;

    cpu.step(i32::MAX).unwrap();

    assert_eq!(cpu.registers.a, 0x00);
    assert!(!cpu.registers.zf());
    assert!(cpu.registers.cf());
}

#[test]
fn cb_rotates_set_zero_from_the_result() {
    // RLC B with B = 0.
    let mut cpu = with_code(&[0xCB, 0x00]);

    cpu.step(i32::MAX).unwrap();

    assert!(cpu.registers.zf());
}

#[test]
fn ld_a16_sp_stores_both_bytes() {
    let mut cpu = with_code(&[0x08, 0x00, 0xC1]); // LD (0xC100),SP
    cpu.registers.sp = 0xBEEF;

    cpu.step(i32::MAX).unwrap();

    assert_eq!(read_short(&cpu, 0xC100), 0xBEEF);
}

#[test]
fn hl_increment_and_decrement_loads_move_hl() {
    let mut cpu = with_code(&[0x22, 0x3A]); // LD (HL+),A ; LD A,(HL-)
    cpu.registers.a = 0x77;
    cpu.registers.set_hl(0xC000);

    cpu.step(i32::MAX).unwrap();
    assert_eq!(cpu.registers.hl(), 0xC001);
    assert_eq!(cpu.bus.mem[0xC000], 0x77);

    cpu.bus.mem[0xC001] = 0x55;
    cpu.step(i32::MAX).unwrap();
    assert_eq!(cpu.registers.a, 0x55);
    assert_eq!(cpu.registers.hl(), 0xC000);
}

#[test]
fn relative_jump_takes_negative_offsets() {
    let mut cpu = with_code(&[0x00, 0x18, 0xFD]); // NOP; JR -3
    cpu.step(i32::MAX).unwrap();
    cpu.step(i32::MAX).unwrap();

    assert_eq!(cpu.registers.pc, 0x0000);
}

#[test]
fn stop_and_undefined_opcodes_are_recoverable_faults() {
    let mut cpu = with_code(&[0x10]);
    assert_eq!(cpu.step(i32::MAX), Err(CpuFault::Stop));

    let mut cpu = with_code(&[0xDD]);
    assert_eq!(cpu.step(i32::MAX), Err(CpuFault::UndefinedOpcode(0xDD)));
}

#[test]
fn interrupt_dispatch_pushes_pc_and_jumps_to_the_vector() {
    let mut cpu = with_code(&[0x00]);
    cpu.registers.pc = 0x0150;
    cpu.registers.sp = 0xC100;
    cpu.ime = true;
    cpu.pending_ime = true;
    cpu.bus.interrupts.write_ie(0x1F);
    cpu.bus.interrupts.request(Interrupt::Timer);

    cpu.step(i32::MAX).unwrap();

    assert_eq!(read_short(&cpu, 0xC0FE), 0x0150);
    assert!(!cpu.ime);
    assert!(!cpu.bus.interrupts.flags.contains(InterruptFlags::TIMER));
    // The dispatch itself costs 20 T-states; the NOP then fetched at the
    // vector costs 4 more.
    assert_eq!(cpu.bus.cycles, 24);
    assert_eq!(cpu.registers.pc, 0x0051);
}

#[test]
fn priority_picks_the_lowest_pending_vector() {
    let mut cpu = initial_cpu();
    cpu.registers.sp = 0xC100;
    cpu.ime = true;
    cpu.pending_ime = true;
    cpu.bus.interrupts.write_ie(0x1F);
    cpu.bus.interrupts.request(Interrupt::Joypad);
    cpu.bus.interrupts.request(Interrupt::VBlank);

    cpu.step(i32::MAX).unwrap();

    assert_eq!(cpu.registers.pc, 0x0041); // vector 0x40 plus the executed NOP
    assert!(cpu.bus.interrupts.flags.contains(InterruptFlags::JOYPAD));
}

#[test]
fn pending_interrupt_lifts_halt_even_without_ime() {
    let mut cpu = with_code(&[0x76, 0x00]);
    cpu.step(i32::MAX).unwrap();
    assert!(cpu.is_halted());

    cpu.bus.interrupts.write_ie(0x1F);
    cpu.bus.interrupts.request(Interrupt::Timer);

    cpu.step(i32::MAX).unwrap();
    assert!(!cpu.is_halted());
    // IME is clear, so no dispatch happened; the next instruction ran.
    assert_eq!(cpu.registers.pc, 0x0002);
}

#[test]
fn ei_takes_effect_one_instruction_late() {
    let mut cpu = with_code(&[0xFB, 0x00, 0x00]);
    cpu.registers.sp = 0xC100;
    cpu.bus.interrupts.write_ie(0x1F);
    cpu.bus.interrupts.request(Interrupt::VBlank);

    // EI itself.
    cpu.step(i32::MAX).unwrap();
    assert!(!cpu.ime);

    // The shadow instruction still runs with interrupts effectively off at
    // its own dispatch check, but IME latches before it executes.
    cpu.step(i32::MAX).unwrap();
    assert_eq!(cpu.registers.pc, 0x0002);

    // Now the dispatch fires.
    cpu.step(i32::MAX).unwrap();
    assert_eq!(cpu.registers.pc, 0x0041);
}

#[test]
fn set_and_res_flip_single_bits_in_memory() {
    let mut cpu = with_code(&[0xCB, 0xC6, 0xCB, 0x86]); // SET 0,(HL); RES 0,(HL)
    cpu.registers.set_hl(0xC000);

    cpu.step(i32::MAX).unwrap();
    assert_eq!(cpu.bus.mem[0xC000], 0x01);

    cpu.step(i32::MAX).unwrap();
    assert_eq!(cpu.bus.mem[0xC000], 0x00);
}

#[test]
fn conditional_call_and_ret_follow_the_stack() {
    let mut cpu = initial_cpu();
    cpu.bus.mem[0] = 0xCD; // CALL 0xC000
    cpu.bus.mem[1] = 0x00;
    cpu.bus.mem[2] = 0xC0;
    cpu.bus.mem[0xC000] = 0xC9; // RET
    cpu.registers.sp = 0xD000;

    cpu.step(i32::MAX).unwrap();
    assert_eq!(cpu.registers.pc, 0xC000);
    assert_eq!(read_short(&cpu, 0xCFFE), 0x0003);

    cpu.step(i32::MAX).unwrap();
    assert_eq!(cpu.registers.pc, 0x0003);
    assert_eq!(cpu.registers.sp, 0xD000);
}
