//! MBC3's battery-backed real-time clock. Current date is derived from the
//! host wallclock relative to an epoch `base`, rather than being ticked
//! cycle-by-cycle, since the cartridge only ever observes it through
//! `latch`/register reads.
use std::time::{SystemTime, UNIX_EPOCH};

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;
const SECONDS_PER_DAY: u64 = 86_400;

/// The five latched date registers, exactly as exposed at `0xA008..=0xA00C`.
#[derive(Debug, Default, Copy, Clone)]
struct LatchedDate {
    seconds: u8,
    minutes: u8,
    hours: u8,
    days_low: u8,
    days_high: u8,
}

#[derive(Debug)]
pub struct Rtc {
    base: u64,
    halt_date: u64,
    prev_latch_write: bool,
    latched: LatchedDate,
}

impl Rtc {
    pub fn new() -> Self {
        let mut rtc = Rtc { base: now(), halt_date: 0, prev_latch_write: false, latched: LatchedDate::default() };
        rtc.latch_date();
        rtc
    }

    fn halted(&self) -> bool {
        self.latched.days_high & 0x40 != 0
    }

    fn current_timestamp(&self) -> u64 {
        if self.halted() { self.halt_date } else { now() }
    }

    /// Recaptures `latched` from the elapsed time since `base`, preserving
    /// the halt bit. Called on a 0->1 latch edge and after any register
    /// write (mirroring the reference implementation's write-then-relatch).
    fn latch_date(&mut self) {
        let timestamp = self.current_timestamp();
        if timestamp < self.base {
            self.base = timestamp;
        }

        let elapsed = timestamp - self.base;
        let days = elapsed / SECONDS_PER_DAY;
        let halted = self.halted();
        // The day-counter carry is sticky: once set it survives relatching
        // until software clears it through a days-high write.
        let carry = self.latched.days_high & 0x80 != 0 || days > 0x1FF;

        self.latched = LatchedDate {
            seconds: (elapsed % SECONDS_PER_MINUTE) as u8,
            minutes: ((elapsed / SECONDS_PER_MINUTE) % SECONDS_PER_MINUTE) as u8,
            hours: ((elapsed / SECONDS_PER_HOUR) % 24) as u8,
            days_low: (days & 0xFF) as u8,
            days_high: (((days >> 8) & 1) as u8)
                | if halted { 0x40 } else { 0 }
                | if carry { 0x80 } else { 0 },
        };
    }

    /// Recomputes `base` so that the currently-latched fields describe
    /// "now" again, pinning a date written by the CPU.
    fn set_date(&mut self) {
        let days = ((self.latched.days_high as u64 & 0x01) << 8) | self.latched.days_low as u64;
        let elapsed = self.latched.seconds as u64
            + self.latched.minutes as u64 * SECONDS_PER_MINUTE
            + self.latched.hours as u64 * SECONDS_PER_HOUR
            + days * SECONDS_PER_DAY;

        self.base = self.current_timestamp().saturating_sub(elapsed);
    }

    /// Writes to `0x6000..=0x7FFF` latch the clock on a 0->1 transition of
    /// the low bit.
    pub fn write_latch_trigger(&mut self, value: u8) {
        let bit = value & 0x01 != 0;
        if !self.prev_latch_write && bit {
            self.latch_date();
        }
        self.prev_latch_write = bit;
    }

    /// `ram_bank` in `0x08..=0x0C`.
    pub fn read(&self, ram_bank: u8) -> u8 {
        match ram_bank {
            0x08 => self.latched.seconds,
            0x09 => self.latched.minutes,
            0x0A => self.latched.hours,
            0x0B => self.latched.days_low,
            0x0C => self.latched.days_high,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, ram_bank: u8, value: u8) {
        match ram_bank {
            0x08 => self.latched.seconds = value & 0x3F,
            0x09 => self.latched.minutes = value & 0x3F,
            0x0A => self.latched.hours = value & 0x1F,
            0x0B => self.latched.days_low = value,
            0x0C => {
                let was_halted = self.halted();
                // Bits: 0 = day MSB, 6 = halt, 7 = (sticky) day carry.
                self.latched.days_high = value & 0xC1;
                if !was_halted && self.halted() {
                    self.halt_date = now();
                }
            }
            _ => return,
        }

        self.set_date();
        self.latch_date();
    }

    /// Big-endian `base` (u64), big-endian `halt_date` (u64), `latch` (u8),
    /// then seconds/minutes/hours/days-low/days-high (u8 each). 22 bytes.
    pub fn dump(&self) -> [u8; 22] {
        let mut out = [0u8; 22];
        out[0..8].copy_from_slice(&self.base.to_be_bytes());
        out[8..16].copy_from_slice(&self.halt_date.to_be_bytes());
        out[16] = self.prev_latch_write as u8;
        out[17] = self.latched.seconds;
        out[18] = self.latched.minutes;
        out[19] = self.latched.hours;
        out[20] = self.latched.days_low;
        out[21] = self.latched.days_high;
        out
    }

    pub fn load(bytes: &[u8; 22]) -> Self {
        let mut base_bytes = [0u8; 8];
        base_bytes.copy_from_slice(&bytes[0..8]);
        let mut halt_bytes = [0u8; 8];
        halt_bytes.copy_from_slice(&bytes[8..16]);

        Rtc {
            base: u64::from_be_bytes(base_bytes),
            halt_date: u64::from_be_bytes(halt_bytes),
            prev_latch_write: bytes[16] != 0,
            latched: LatchedDate {
                seconds: bytes[17],
                minutes: bytes[18],
                hours: bytes[19],
                days_low: bytes[20],
                days_high: bytes[21],
            },
        }
    }
}

impl Default for Rtc {
    fn default() -> Self {
        Rtc::new()
    }
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_then_load_round_trips() {
        let mut rtc = Rtc::new();
        rtc.write(0x0B, 5); // days_low
        rtc.write(0x0A, 3); // hours

        let dump = rtc.dump();
        let reloaded = Rtc::load(&dump);

        assert_eq!(reloaded.dump(), dump);
    }

    #[test]
    fn halting_records_halt_date() {
        let mut rtc = Rtc::new();
        assert!(!rtc.halted());

        rtc.write(0x0C, 0x40);
        assert!(rtc.halted());
        assert_ne!(rtc.halt_date, 0);
    }
}
