//! Core emulation library for the `pocketemu` handheld-console emulator.
//! The [`emulator::Emulator`] aggregate owns every device and is driven in
//! frame-sized batches by a host front end implementing
//! [`emulator::GameboyUi`].
pub mod emulator;
pub mod error;
pub mod hardware;
mod io;
mod scheduler;

pub use crate::emulator::{
    AudioConsumer, Emulator, EmulatorMode, GameboyUi, GamepadHandle, AUDIO_SAMPLE_RATE_HZ, CPU_FREQUENCY_HZ,
    CYCLES_PER_FRAME,
};
pub use crate::error::{CpuFault, EmulatorError, LoadError};
pub use crate::hardware::apu::SAMPLES_PER_BUFFER;
pub use crate::hardware::ppu::palette::DmgColor;
pub use crate::hardware::ppu::{RESOLUTION_HEIGHT, RESOLUTION_WIDTH};
pub use crate::io::joypad::Button;

/// Everything configurable about a new [`Emulator`] instance.
#[derive(Debug, Default)]
pub struct EmulatorOptions {
    /// A previously persisted save image (cartridge RAM, optionally followed
    /// by the RTC dump) to restore battery-backed state from.
    pub saved_ram: Option<Vec<u8>>,
    /// Overrides the hardware variant instead of deriving it from the
    /// cartridge header.
    pub forced_mode: Option<EmulatorMode>,
}

#[derive(Debug, Default)]
pub struct EmulatorOptionsBuilder {
    saved_ram: Option<Vec<u8>>,
    forced_mode: Option<EmulatorMode>,
}

impl EmulatorOptionsBuilder {
    pub fn new() -> Self {
        EmulatorOptionsBuilder::default()
    }

    pub fn save_data(mut self, saved_ram: Option<Vec<u8>>) -> Self {
        self.saved_ram = saved_ram;
        self
    }

    pub fn with_mode(mut self, mode: EmulatorMode) -> Self {
        self.forced_mode = Some(mode);
        self
    }

    pub fn build(self) -> EmulatorOptions {
        EmulatorOptions {
            saved_ram: self.saved_ram,
            forced_mode: self.forced_mode,
        }
    }
}
