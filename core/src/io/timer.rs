//! The programmable timer (DIV/TIMA/TMA/TAC). Nothing here ticks per
//! T-state: the bus hands the module a whole elapsed-cycle window and the
//! number of TIMA increments inside it is computed in closed form from the
//! divider phase, with overflows (possibly several, for a large window)
//! reloading from the modulo and raising the TIMER interrupt. After a
//! catch-up the module can say exactly how many cycles remain until the
//! next overflow, which is what the scheduler is armed with.
use crate::io::interrupts::InterruptFlags;
use crate::scheduler::NEVER;

pub const DIVIDER_REGISTER: u16 = 0xFF04;
pub const TIMER_COUNTER: u16 = 0xFF05;
pub const TIMER_MODULO: u16 = 0xFF06;
pub const TIMER_CONTROL: u16 = 0xFF07;

/// TAC bits 0-1: T-states per TIMA increment.
#[derive(Debug, Copy, Clone)]
enum InputClock {
    C16 = 0x1,
    C64 = 0x2,
    C256 = 0x3,
    C1024 = 0x0,
}

impl InputClock {
    fn period(self) -> i32 {
        match self {
            InputClock::C16 => 16,
            InputClock::C64 => 64,
            InputClock::C256 => 256,
            InputClock::C1024 => 1024,
        }
    }
}

impl From<u8> for InputClock {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0x1 => InputClock::C16,
            0x2 => InputClock::C64,
            0x3 => InputClock::C256,
            _ => InputClock::C1024,
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct TimerControl {
    started: bool,
    input_select: InputClock,
}

impl Default for TimerControl {
    fn default() -> Self {
        TimerControl {
            started: false,
            input_select: InputClock::C1024,
        }
    }
}

impl From<u8> for TimerControl {
    fn from(value: u8) -> Self {
        TimerControl {
            started: value & 0x04 != 0,
            input_select: InputClock::from(value),
        }
    }
}

impl TimerControl {
    fn to_bits(self) -> u8 {
        (if self.started { 0x4 } else { 0 }) | self.input_select as u8
    }
}

#[derive(Debug, Default)]
pub struct TimerRegisters {
    /// Free-running 16-bit counter, one per T-state; DIV is its upper byte.
    divider_counter: u16,
    counter: u8,
    modulo: u8,
    control: TimerControl,
}

impl TimerRegisters {
    pub fn divider_register(&self) -> u8 {
        (self.divider_counter >> 8) as u8
    }

    pub fn timer_counter(&self) -> u8 {
        self.counter
    }

    pub fn timer_modulo(&self) -> u8 {
        self.modulo
    }

    pub fn control_bits(&self) -> u8 {
        0xF8 | self.control.to_bits()
    }

    /// Applies `elapsed` T-states: advances the divider and folds the whole
    /// window's worth of TIMA increments in at once, reloading from the
    /// modulo on each overflow. Returns the TIMER interrupt if any overflow
    /// occurred.
    pub fn catch_up(&mut self, elapsed: i32) -> Option<InterruptFlags> {
        let div = self.control.input_select.period();
        // Increments since last sync, accounting for the partial period the
        // divider was already into.
        let ticks = (elapsed + self.divider_counter as i32 % div) / div;
        self.divider_counter = self.divider_counter.wrapping_add(elapsed as u16);

        if !self.control.started {
            return None;
        }

        let mut count = self.counter as i32 + ticks;
        let mut overflowed = false;

        while count > 0xFF {
            count -= 0x100;
            count += self.modulo as i32;
            overflowed = true;
        }

        self.counter = count as u8;
        if overflowed {
            Some(InterruptFlags::TIMER)
        } else {
            None
        }
    }

    /// T-states until the next TIMA overflow, phase-aligned to the divider.
    /// Only meaningful right after [`TimerRegisters::catch_up`].
    pub fn cycles_until_next_event(&self) -> i32 {
        if !self.control.started {
            return NEVER;
        }

        let div = self.control.input_select.period();
        (0x100 - self.counter as i32) * div - self.divider_counter as i32 % div
    }

    pub fn set_timer_counter(&mut self, value: u8) {
        self.counter = value;
    }

    pub fn set_modulo(&mut self, value: u8) {
        self.modulo = value;
    }

    pub fn reset_divider(&mut self) {
        self.divider_counter = 0;
    }

    pub fn set_control(&mut self, value: u8) {
        self.control = TimerControl::from(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn overflow_fires_timer_interrupt_and_reloads_modulo() {
        let mut timer = TimerRegisters::default();
        timer.set_modulo(0xFE);
        timer.set_control(0x05); // started, 16-cycle input
        timer.set_timer_counter(0xFE);

        // Two increments in 32 cycles carry TIMA past 0xFF once.
        assert_eq!(timer.catch_up(32), Some(InterruptFlags::TIMER));
        assert_eq!(timer.timer_counter(), 0xFE);

        // The next full period only brings it to 0xFF.
        assert_eq!(timer.catch_up(16), None);
        assert_eq!(timer.timer_counter(), 0xFF);
    }

    #[test]
    fn large_windows_fold_multiple_overflows_into_one_catch_up() {
        let mut timer = TimerRegisters::default();
        timer.set_control(0x05);

        // 512 increments with modulo 0 wrap TIMA exactly twice.
        assert_eq!(timer.catch_up(512 * 16), Some(InterruptFlags::TIMER));
        assert_eq!(timer.timer_counter(), 0);
    }

    #[test]
    fn stopped_timer_still_advances_the_divider() {
        let mut timer = TimerRegisters::default();
        assert_eq!(timer.catch_up(0x300), None);

        assert_eq!(timer.divider_register(), 0x03);
        assert_eq!(timer.timer_counter(), 0);
        assert_eq!(timer.cycles_until_next_event(), crate::scheduler::NEVER);
    }

    #[test]
    fn next_event_is_phase_aligned_to_the_divider() {
        let mut timer = TimerRegisters::default();
        timer.set_control(0x05);
        timer.set_timer_counter(0xFE);

        timer.catch_up(8);
        assert_eq!(timer.timer_counter(), 0xFE);
        // Two periods remain, less the 8 cycles the divider is already in.
        assert_eq!(timer.cycles_until_next_event(), 24);
    }

    #[test]
    fn writing_divider_resets_to_zero() {
        let mut timer = TimerRegisters::default();
        timer.catch_up(1000);
        timer.reset_divider();

        assert_eq!(timer.divider_register(), 0);
    }
}
