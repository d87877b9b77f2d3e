//! The sound processing unit: four voices, a 512 Hz frame sequencer, and a
//! sample generator that hands filled stereo buffers to the host audio
//! thread. Like the PPU the unit is lazily caught up: it only advances when
//! a register access or the scheduler's dispatch loop demands it, never on
//! every T-state.
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::emulator::EmulatorMode;
use crate::hardware::apu::noise_channel::NoiseChannel;
use crate::hardware::apu::square_channel::SquareWaveChannel;
use crate::hardware::apu::wave_channel::WaveformChannel;
use crate::hardware::mmu::INVALID_READ;
use crate::scheduler::{Scheduler, SyncToken};

mod channel_features;
mod noise_channel;
mod square_channel;
mod wave_channel;

/// One sample is produced every 64 T-states, for a 65,536 Hz sample rate at
/// the base clock.
pub const CYCLES_PER_SAMPLE: i32 = 64;
pub const FRAME_SEQUENCE_CYCLES: i32 = 8192;
/// Frames (stereo sample pairs) per handed-off buffer.
pub const SAMPLES_PER_BUFFER: usize = 2048;
const BUFFER_LEN: usize = SAMPLES_PER_BUFFER * 2;

pub const APU_MEM_START: u16 = 0xFF10;
pub const APU_MEM_END: u16 = 0xFF2F;
pub const WAVE_SAMPLE_START: u16 = 0xFF30;
pub const WAVE_SAMPLE_END: u16 = 0xFF3F;

/// The consumer side of the sample hand-off: a bounded queue of filled
/// buffers to drain and a bounded pool to return drained buffers to, so the
/// producer never allocates after startup. An audio callback that finds
/// `ready` empty should emit silence; the emulation core blocks on `ready`
/// having room, which is the back-pressure that keeps emulated time aligned
/// with wall-clock playback.
pub struct AudioConsumer {
    pub ready: Receiver<Vec<i16>>,
    pub free: Sender<Vec<i16>>,
}

fn new_handoff() -> (Sender<Vec<i16>>, Receiver<Vec<i16>>, AudioConsumer) {
    let (ready_tx, ready_rx) = bounded(2);
    let (free_tx, free_rx) = bounded(2);
    free_tx.send(vec![0i16; BUFFER_LEN]).expect("fresh channel");
    free_tx.send(vec![0i16; BUFFER_LEN]).expect("fresh channel");
    (ready_tx, free_rx, AudioConsumer { ready: ready_rx, free: free_tx })
}

pub struct Apu {
    voice1: SquareWaveChannel,
    voice2: SquareWaveChannel,
    voice3: WaveformChannel,
    voice4: NoiseChannel,
    highpass: HighpassFilter,

    vin_l_enable: bool,
    vin_r_enable: bool,
    left_volume: u8,
    right_volume: u8,
    left_channel_enable: [bool; 4],
    right_channel_enable: [bool; 4],
    global_sound_enable: bool,

    frame_sequencer_step: u8,
    frame_sequence_counter: i32,
    sample_remainder: i32,

    active_buffer: Vec<i16>,
    ready_tx: Sender<Vec<i16>>,
    free_rx: Receiver<Vec<i16>>,
}

impl Apu {
    pub fn new() -> (Self, AudioConsumer) {
        let (ready_tx, free_rx, consumer) = new_handoff();

        let apu = Apu {
            voice1: SquareWaveChannel::default(),
            voice2: SquareWaveChannel::default(),
            voice3: WaveformChannel::new(),
            voice4: NoiseChannel::default(),
            highpass: HighpassFilter::default(),
            vin_l_enable: false,
            vin_r_enable: false,
            left_volume: 7,
            right_volume: 7,
            left_channel_enable: [true; 4],
            right_channel_enable: [true, true, false, false],
            global_sound_enable: true,
            frame_sequencer_step: 0,
            frame_sequence_counter: 0,
            sample_remainder: 0,
            active_buffer: Vec::with_capacity(BUFFER_LEN),
            ready_tx,
            free_rx,
        };
        (apu, consumer)
    }

    /// Brings the unit up to the scheduler's current timestamp, generating
    /// every sample that falls inside the elapsed window, then asks to be
    /// woken when the active buffer would fill up.
    pub fn catch_up(&mut self, scheduler: &mut Scheduler) {
        let elapsed = scheduler.resync(SyncToken::Spu);
        self.advance(elapsed);
        self.schedule_next(scheduler);
    }

    fn schedule_next(&self, scheduler: &mut Scheduler) {
        let frames_remaining = (BUFFER_LEN - self.active_buffer.len()) / 2;
        let delay = frames_remaining as i32 * CYCLES_PER_SAMPLE - self.sample_remainder;
        scheduler.schedule(SyncToken::Spu, delay.max(1));
    }

    /// Samples are produced even while the master enable is off; the cleared
    /// voices all output zero then, so the host keeps receiving silence at
    /// the steady rate it expects.
    fn advance(&mut self, mut cycles: i32) {
        while cycles > 0 {
            let step = cycles.min(CYCLES_PER_SAMPLE - self.sample_remainder);
            self.tick_channels(step as u16);
            self.sample_remainder += step;
            cycles -= step;

            if self.sample_remainder >= CYCLES_PER_SAMPLE {
                self.sample_remainder -= CYCLES_PER_SAMPLE;
                self.tick_frame_sequencer();
                self.generate_sample();
            }
        }
    }

    fn tick_channels(&mut self, cycles: u16) {
        self.voice1.tick_timer(cycles);
        self.voice2.tick_timer(cycles);
        self.voice3.tick_timer(cycles);
        self.voice4.tick_timer(cycles as u32);
    }

    fn tick_frame_sequencer(&mut self) {
        // The frame sequencer clocks at 512 Hz; `advance` calls this once per
        // sample period, so count sample periods rather than raw cycles.
        const SAMPLES_PER_STEP: i32 = FRAME_SEQUENCE_CYCLES / CYCLES_PER_SAMPLE;
        self.frame_sequence_counter += 1;
        if self.frame_sequence_counter < SAMPLES_PER_STEP {
            return;
        }
        self.frame_sequence_counter = 0;

        if !self.global_sound_enable {
            return;
        }

        match self.frame_sequencer_step {
            0 | 4 => self.tick_length(),
            2 | 6 => {
                self.tick_length();
                self.tick_sweep();
            }
            7 => self.tick_envelope(),
            _ => {}
        }
        self.frame_sequencer_step = (self.frame_sequencer_step + 1) % 8;
    }

    fn generate_sample(&mut self) {
        // NR50 selects one of eight amplification steps, 1 through 8; level
        // zero attenuates to 1/8 rather than muting. Only NR52 silences.
        let left_volume = (1.0 + self.left_volume as f32) / 8.0;
        let right_volume = (1.0 + self.right_volume as f32) / 8.0;

        let left = self.mix(self.left_channel_enable) * left_volume;
        let right = self.mix(self.right_channel_enable) * right_volume;
        let (left, right) = self.highpass.apply(left, right);

        self.active_buffer.push(to_i16_sample(left));
        self.active_buffer.push(to_i16_sample(right));

        if self.active_buffer.len() >= BUFFER_LEN {
            self.flush_buffer();
        }
    }

    fn flush_buffer(&mut self) {
        let next = self.free_rx.try_recv().unwrap_or_else(|_| Vec::with_capacity(BUFFER_LEN));
        let filled = std::mem::replace(&mut self.active_buffer, next);
        self.active_buffer.clear();
        // A stalled audio consumer stalls emulation here rather than dropping
        // audio, keeping wall-clock and emulated time aligned.
        let _ = self.ready_tx.send(filled);
    }

    fn mix(&self, enabled: [bool; 4]) -> f32 {
        let mut result = 0.0;
        if enabled[0] {
            result += self.voice1.output_volume() as f32;
        }
        if enabled[1] {
            result += self.voice2.output_volume() as f32;
        }
        if enabled[2] {
            result += self.voice3.output_volume() as f32;
        }
        if enabled[3] {
            result += self.voice4.output_volume() as f32;
        }
        result / 60.0
    }

    pub fn read_register(&mut self, address: u16, scheduler: &mut Scheduler) -> u8 {
        self.catch_up(scheduler);
        let address = address & 0xFF;
        match address {
            0x10..=0x14 => self.voice1.read_register(address),
            0x15..=0x19 => self.voice2.read_register(address),
            0x1A..=0x1E => self.voice3.read_register(address),
            0x1F..=0x23 => self.voice4.read_register(address),
            0x24 => {
                let mut output = (self.left_volume << 4) | self.right_volume;
                set_bit(&mut output, 7, self.vin_l_enable);
                set_bit(&mut output, 3, self.vin_r_enable);
                output
            }
            0x25 => {
                let mut output = 0;
                for i in 0..4 {
                    set_bit(&mut output, i as u8, self.right_channel_enable[i]);
                    set_bit(&mut output, i as u8 + 4, self.left_channel_enable[i]);
                }
                output
            }
            0x26 => {
                let mut output = 0x70;
                set_bit(&mut output, 7, self.global_sound_enable);
                set_bit(&mut output, 3, self.voice4.triggered());
                set_bit(&mut output, 2, self.voice3.enabled());
                set_bit(&mut output, 1, self.voice2.triggered());
                set_bit(&mut output, 0, self.voice1.triggered());
                output
            }
            _ => INVALID_READ,
        }
    }

    pub fn write_register(&mut self, address: u16, value: u8, scheduler: &mut Scheduler, mode: EmulatorMode) {
        self.catch_up(scheduler);
        let address = address & 0xFF;

        // With the master enable off only NR52 is writable; the monochrome
        // system additionally lets length registers through.
        if !self.global_sound_enable && address != 0x26 && (mode.is_cgb() || ![0x20, 0x1B].contains(&address)) {
            log::debug!("write to SPU register 0xFF{:02X} while powered down", address);
            return;
        }

        match address {
            0x10..=0x14 => self.voice1.write_register(address, value, self.frame_sequencer_step),
            0x15..=0x19 => self.voice2.write_register(address, value, self.frame_sequencer_step),
            0x1A..=0x1E => self.voice3.write_register(address, value),
            0x1F..=0x23 => self.voice4.write_register(address, value, self.frame_sequencer_step),
            0x24 => {
                self.vin_l_enable = test_bit(value, 7);
                self.vin_r_enable = test_bit(value, 3);
                self.right_volume = value & 0x07;
                self.left_volume = (value & 0x70) >> 4;
            }
            0x25 => {
                for i in 0..4 {
                    self.right_channel_enable[i] = test_bit(value, i as u8);
                    self.left_channel_enable[i] = test_bit(value, i as u8 + 4);
                }
            }
            0x26 => {
                let was_enabled = self.global_sound_enable;
                self.global_sound_enable = test_bit(value, 7);
                if !self.global_sound_enable {
                    self.power_off(mode);
                } else if !was_enabled {
                    self.frame_sequencer_step = 0;
                    self.frame_sequence_counter = 0;
                }
            }
            _ => {}
        }
    }

    pub fn read_wave_sample(&mut self, address: u16, scheduler: &mut Scheduler) -> u8 {
        self.catch_up(scheduler);
        self.voice3.read_register(address & 0xFF)
    }

    pub fn write_wave_sample(&mut self, address: u16, value: u8, scheduler: &mut Scheduler) {
        self.catch_up(scheduler);
        self.voice3.write_register(address & 0xFF, value);
    }

    fn tick_length(&mut self) {
        self.voice1.tick_length();
        self.voice2.tick_length();
        self.voice3.tick_length();
        self.voice4.tick_length();
    }

    fn tick_envelope(&mut self) {
        self.voice1.tick_envelope();
        self.voice2.tick_envelope();
        self.voice4.tick_envelope();
    }

    fn tick_sweep(&mut self) {
        self.voice1.tick_sweep();
    }

    fn power_off(&mut self, mode: EmulatorMode) {
        self.voice1.reset(mode);
        self.voice2.reset(mode);
        self.voice3.power_off();
        self.voice4.reset(mode);
        self.vin_l_enable = false;
        self.vin_r_enable = false;
        self.right_volume = 0;
        self.left_volume = 0;
        self.left_channel_enable = [false; 4];
        self.right_channel_enable = [false; 4];
        self.frame_sequencer_step = 0;
    }
}

#[derive(Debug, Default)]
struct HighpassFilter {
    rate: f32,
    diff: (f32, f32),
}

impl HighpassFilter {
    /// Credit to SameBoy, whose highpass coefficient formula this mirrors.
    fn apply(&mut self, left_in: f32, right_in: f32) -> (f32, f32) {
        if self.rate == 0.0 {
            self.rate = 0.999958f32.powf(CYCLES_PER_SAMPLE as f32);
        }
        let (high_left, high_right) = self.diff;
        let (filtered_left, filtered_right) = (left_in - high_left, right_in - high_right);
        self.diff = (left_in - filtered_left * self.rate, right_in - filtered_right * self.rate);
        (filtered_left, filtered_right)
    }
}

fn to_i16_sample(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn set_bit(output: &mut u8, bit: u8, set: bool) {
    if set {
        *output |= 1 << bit;
    }
}

fn test_bit(value: u8, bit: u8) -> bool {
    value & (1 << bit) != 0
}

/// Length counters only clock on even frame-sequencer steps; because the
/// step is advanced before this is consulted, the "next step skips length"
/// condition is tested one value ahead.
fn no_length_tick_next_step(next_frame_sequence_val: u8) -> bool {
    [1, 3, 5, 7].contains(&next_frame_sequence_val)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;

    #[test]
    fn power_off_clears_master_volume() {
        let (mut apu, _consumer) = Apu::new();
        apu.left_volume = 5;
        apu.power_off(EmulatorMode::Dmg);

        assert_eq!(apu.left_volume, 0);
    }

    #[test]
    fn buffer_flush_hands_off_exactly_one_buffer_per_fill() {
        let (mut apu, consumer) = Apu::new();
        for _ in 0..BUFFER_LEN {
            apu.active_buffer.push(0);
        }
        apu.flush_buffer();

        assert!(consumer.ready.try_recv().is_ok());
        assert_eq!(apu.active_buffer.len(), 0);
    }

    #[test]
    fn one_buffer_of_cycles_produces_one_buffer_of_silence() {
        let (mut apu, consumer) = Apu::new();
        apu.write_register(0x26, 0x00, &mut Scheduler::new(), EmulatorMode::Dmg);

        let mut scheduler = Scheduler::new();
        scheduler.tick(SAMPLES_PER_BUFFER as i32 * CYCLES_PER_SAMPLE);
        apu.catch_up(&mut scheduler);

        let buffer = consumer.ready.try_recv().expect("buffer should be ready");
        assert!(buffer.iter().all(|&sample| sample == 0));
    }

    #[test]
    fn master_volume_zero_attenuates_rather_than_mutes() {
        let (mut apu, _consumer) = Apu::new();
        let mut scheduler = Scheduler::new();
        apu.write_register(0x24, 0x00, &mut scheduler, EmulatorMode::Dmg); // NR50 level 0
        apu.write_register(0x12, 0xF0, &mut scheduler, EmulatorMode::Dmg); // full envelope
        apu.write_register(0x11, 0xC0, &mut scheduler, EmulatorMode::Dmg); // 75% duty
        apu.write_register(0x13, 0xFF, &mut scheduler, EmulatorMode::Dmg);
        apu.write_register(0x14, 0x87, &mut scheduler, EmulatorMode::Dmg); // trigger, top frequency

        scheduler.tick(CYCLES_PER_SAMPLE * 64);
        apu.catch_up(&mut scheduler);

        assert!(apu.active_buffer.iter().any(|&sample| sample != 0));
    }

    #[test]
    fn catch_up_schedules_the_buffer_completion() {
        let (mut apu, _consumer) = Apu::new();
        let mut scheduler = Scheduler::new();
        apu.catch_up(&mut scheduler);

        assert_eq!(
            scheduler.next_event_for(SyncToken::Spu),
            SAMPLES_PER_BUFFER as i32 * CYCLES_PER_SAMPLE
        );
    }
}
