//! Voices 1 and 2: rectangle waves with an envelope and a length counter.
//! The two share one implementation; voice 2 simply never has a sweep
//! programmed into its copy.
use crate::emulator::EmulatorMode;
use crate::hardware::apu::channel_features::{EnvelopeFeature, LengthFeature, SweepFeature};
use crate::hardware::apu::{no_length_tick_next_step, test_bit};
use crate::hardware::mmu::INVALID_READ;

/// The four duty patterns of NRx1 bits 6-7, one phase step per entry.
const DUTY_PATTERNS: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1], // 12.5%
    [1, 0, 0, 0, 0, 0, 0, 1], // 25%
    [1, 0, 0, 0, 0, 1, 1, 1], // 50%
    [0, 1, 1, 1, 1, 1, 1, 0], // 75%
];

#[derive(Default, Debug)]
pub struct SquareWaveChannel {
    length: LengthFeature,
    envelope: EnvelopeFeature,
    sweep: SweepFeature,
    running: bool,
    output_volume: u8,
    frequency: u16,
    timer: u16,
    duty_index: usize,
    duty_select: usize,
}

impl SquareWaveChannel {
    pub fn output_volume(&self) -> u8 {
        self.output_volume * self.running as u8
    }

    pub fn triggered(&self) -> bool {
        self.running
    }

    /// Advances the frequency divider by `cycles` T-states, stepping the duty
    /// phase every time it expires.
    pub fn tick_timer(&mut self, mut cycles: u16) {
        while cycles > 0 {
            if self.timer > cycles {
                self.timer -= cycles;
                break;
            }
            cycles -= self.timer;
            self.timer = self.period();
            self.duty_index = (self.duty_index + 1) % 8;
        }
        self.output_volume = self.envelope.volume * DUTY_PATTERNS[self.duty_select][self.duty_index];
    }

    fn period(&self) -> u16 {
        (0x800 - self.frequency) * 4
    }

    pub fn read_register(&self, address: u16) -> u8 {
        match address {
            0x10 => self.sweep.read_register(),
            0x11 | 0x16 => 0x3F | ((self.duty_select as u8) << 6),
            0x12 | 0x17 => self.envelope.read_register(),
            // Frequency registers are write-only; voice 2 has no sweep slot.
            0x13 | 0x15 | 0x18 => INVALID_READ,
            0x14 | 0x19 => 0xBF | if self.length.length_enable { 0x40 } else { 0 },
            _ => {
                log::debug!("square channel read of unmapped register 0xFF{:02X}", address);
                INVALID_READ
            }
        }
    }

    pub fn write_register(&mut self, address: u16, value: u8, next_frame_sequencer_step: u8) {
        match address {
            0x10 | 0x15 => self.sweep.write_register(value, &mut self.running),
            0x11 | 0x16 => {
                self.duty_select = ((value & 0xC0) >> 6) as usize;
                self.length.write_register(value);
            }
            0x12 | 0x17 => {
                self.envelope.write_register(value);
                if self.envelope.volume_load == 0 {
                    // The envelope doubles as the DAC power switch.
                    self.running = false;
                }
            }
            0x13 | 0x18 => self.frequency = (self.frequency & 0x0700) | value as u16,
            0x14 | 0x19 => {
                let old_length_enable = self.length.length_enable;
                let no_length_next = no_length_tick_next_step(next_frame_sequencer_step);

                self.length.length_enable = test_bit(value, 6);
                self.frequency = (self.frequency & 0xFF) | (((value & 0x07) as u16) << 8);

                if no_length_next {
                    self.length.second_half_enable_tick(&mut self.running, old_length_enable);
                }

                if test_bit(value, 7) {
                    self.trigger(no_length_next);
                }
            }
            _ => log::debug!("square channel write of unmapped register 0xFF{:02X}", address),
        }
    }

    fn trigger(&mut self, next_step_no_length: bool) {
        self.running = true;
        self.length.trigger(next_step_no_length);
        self.envelope.trigger();
        self.timer = self.period();
        self.sweep.trigger_sweep(&mut self.running, self.frequency);

        // A silent, non-incrementing envelope means the DAC is off; the
        // trigger is then ignored.
        if self.envelope.volume_load == 0 && !self.envelope.envelope_add_mode {
            self.running = false;
        }
    }

    pub fn reset(&mut self, mode: EmulatorMode) {
        // The monochrome system keeps length counters across a power cycle;
        // Color clears everything.
        *self = if mode.is_cgb() {
            Self::default()
        } else {
            Self { length: self.length, ..Default::default() }
        };
        self.length.length_enable = false;
    }

    pub fn tick_envelope(&mut self) {
        self.envelope.tick();
    }

    pub fn tick_length(&mut self) {
        self.length.tick(&mut self.running);
    }

    pub fn tick_sweep(&mut self) {
        self.sweep.tick(&mut self.running, &mut self.frequency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_decrementing_envelope_stops_the_channel_on_trigger() {
        let mut channel = SquareWaveChannel::default();
        channel.write_register(0x12, 0x00, 0); // volume 0, decrement
        channel.write_register(0x14, 0x80, 0); // trigger

        assert!(!channel.triggered());
        assert_eq!(channel.output_volume(), 0);
    }

    #[test]
    fn duty_phase_advances_once_per_period() {
        let mut channel = SquareWaveChannel::default();
        channel.write_register(0x12, 0xF0, 0); // full volume, no envelope
        channel.write_register(0x13, 0xFF, 0);
        channel.write_register(0x14, 0x87, 0); // trigger, frequency 0x7FF

        // Period is (0x800 - 0x7FF) * 4 = 4 cycles; duty 12.5% emits one
        // high sample out of eight.
        let mut highs = 0;
        for _ in 0..8 {
            channel.tick_timer(4);
            if channel.output_volume() > 0 {
                highs += 1;
            }
        }
        assert_eq!(highs, 1);
    }
}
