//! The interrupt controller: IE/IF and the fixed VBLANK < LCD-STAT < TIMER <
//! SERIAL < JOYPAD priority order the CPU's interrupt dispatch relies on.
use bitflags::*;

#[derive(Debug, Copy, Clone, PartialOrd, PartialEq, Eq)]
pub enum Interrupt {
    VBlank = 0b0000_0001,
    LcdStat = 0b0000_0010,
    Timer = 0b0000_0100,
    Serial = 0b0000_1000,
    Joypad = 0b0001_0000,
}

impl Interrupt {
    /// Fixed hardware priority, lowest vector address first.
    pub fn iter() -> impl Iterator<Item = Interrupt> {
        use Interrupt::*;
        [VBlank, LcdStat, Timer, Serial, Joypad].iter().copied()
    }

    pub fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x0040,
            Interrupt::LcdStat => 0x0048,
            Interrupt::Timer => 0x0050,
            Interrupt::Serial => 0x0058,
            Interrupt::Joypad => 0x0060,
        }
    }
}

bitflags! {
    #[derive(Default)]
    pub struct InterruptFlags: u8 {
        const VBLANK = 0b0000_0001;
        const LCD    = 0b0000_0010;
        const TIMER  = 0b0000_0100;
        const SERIAL = 0b0000_1000;
        const JOYPAD = 0b0001_0000;
        /// IE/IF's upper three bits always read back as 1.
        const UNUSED = 0b1110_0000;
    }
}

impl InterruptFlags {
    pub fn contains_interrupt(&self, interrupt: Interrupt) -> bool {
        self.contains(InterruptFlags::from_bits_truncate(interrupt as u8))
    }
}

/// Owns IE and IF and decides which interrupt, if any, should be serviced
/// next. Requesting an interrupt never blocks on IME or IE; those gates are
/// applied only at dispatch time, matching real hardware (a masked interrupt
/// still latches its IF bit).
#[derive(Default, Debug, Clone)]
pub struct InterruptController {
    pub enable: InterruptFlags,
    pub flags: InterruptFlags,
}

impl InterruptController {
    pub fn request(&mut self, interrupt: Interrupt) {
        self.flags.insert(InterruptFlags::from_bits_truncate(interrupt as u8));
    }

    pub fn clear(&mut self, interrupt: Interrupt) {
        self.flags.remove(InterruptFlags::from_bits_truncate(interrupt as u8));
    }

    pub fn has_pending(&self) -> bool {
        !(self.enable & self.flags).is_empty()
    }

    /// The highest-priority interrupt that is both enabled and requested.
    pub fn next_pending(&self) -> Option<Interrupt> {
        Interrupt::iter().find(|i| self.enable.contains_interrupt(*i) && self.flags.contains_interrupt(*i))
    }

    pub fn read_if(&self) -> u8 {
        self.flags.bits | InterruptFlags::UNUSED.bits
    }

    pub fn write_if(&mut self, value: u8) {
        self.flags = InterruptFlags::from_bits_truncate(value & 0b0001_1111);
    }

    pub fn read_ie(&self) -> u8 {
        self.enable.bits
    }

    pub fn write_ie(&mut self, value: u8) {
        self.enable = InterruptFlags::from_bits_truncate(value);
    }
}

#[cfg(test)]
mod tests {
    use super::Interrupt::*;
    use super::*;

    #[test]
    fn priority_order_is_fixed() {
        let ordered = [VBlank, LcdStat, Timer, Serial, Joypad];
        for (i, interrupt) in Interrupt::iter().enumerate() {
            assert_eq!(ordered[i], interrupt);
        }
    }

    #[test]
    fn highest_priority_enabled_and_requested_wins() {
        let mut controller = InterruptController::default();
        controller.enable = InterruptFlags::TIMER | InterruptFlags::JOYPAD;
        controller.request(Joypad);
        controller.request(Timer);

        assert_eq!(controller.next_pending(), Some(Timer));
    }

    #[test]
    fn masked_interrupt_still_latches_but_is_not_selected() {
        let mut controller = InterruptController::default();
        controller.request(VBlank);

        assert!(!controller.has_pending());
        assert!(controller.flags.contains_interrupt(VBlank));
    }
}
