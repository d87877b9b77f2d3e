//! The owning aggregate: one CPU driving one bus, stepped in frame-sized
//! batches. All device state lives behind the bus; the host talks to the
//! emulator through this module's [`GameboyUi`] contract and a handful of
//! accessors.
use crate::error::EmulatorError;
use crate::hardware::cartridge::Cartridge;
use crate::hardware::cpu::Cpu;
use crate::hardware::mmu::{Bus, MemoryBus};
use crate::hardware::ppu::palette::DmgColor;
use crate::hardware::ppu::RESOLUTION_WIDTH;
use crate::io::interrupts::{Interrupt, InterruptController};
use crate::io::joypad::{Button, Joypad};
use crate::EmulatorOptions;

pub use crate::hardware::apu::AudioConsumer;

/// Master clock rate in T-states per second.
pub const CPU_FREQUENCY_HZ: u32 = 4_194_304;
/// T-states per displayed frame (154 lines of 456 cycles).
pub const CYCLES_PER_FRAME: i32 = 70_224;
/// The SPU emits one stereo frame every 64 T-states.
pub const AUDIO_SAMPLE_RATE_HZ: u32 = CPU_FREQUENCY_HZ / 64;

/// Which hardware variant is being emulated. Derived from the cartridge
/// header unless the host forces one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EmulatorMode {
    Dmg,
    Cgb,
}

impl EmulatorMode {
    pub fn is_cgb(self) -> bool {
        matches!(self, EmulatorMode::Cgb)
    }

    pub fn is_dmg(self) -> bool {
        matches!(self, EmulatorMode::Dmg)
    }
}

/// What the core needs from a host front end. Lines arrive one at a time as
/// they are composed; `flip` marks the end of a frame.
pub trait GameboyUi {
    /// A finished visible line in monochrome gradations.
    fn draw_line_dmg(&mut self, ly: u8, line: &[DmgColor; RESOLUTION_WIDTH]);
    /// A finished visible line in 15-bit xBBBBBGGGGGRRRRR color.
    fn draw_line_gbc(&mut self, ly: u8, line: &[u16; RESOLUTION_WIDTH]);
    /// The frame just entered vertical blank.
    fn flip(&mut self);
    /// Called once per frame batch; drain host input events into `gamepad`.
    fn refresh_gamepad(&mut self, gamepad: &mut GamepadHandle<'_>);
    /// The emulator is shutting down.
    fn destroy(&mut self);
}

/// Short-lived view the UI gets during [`GameboyUi::refresh_gamepad`]:
/// report button edges and, if the host wants to exit, request it here.
pub struct GamepadHandle<'a> {
    pub(crate) joypad: &'a mut Joypad,
    pub(crate) interrupts: &'a mut InterruptController,
    pub(crate) quit: &'a mut bool,
}

impl GamepadHandle<'_> {
    pub fn set_gamepad(&mut self, button: Button, pressed: bool) {
        if self.joypad.set_button(button, pressed) {
            self.interrupts.request(Interrupt::Joypad);
        }
    }

    pub fn request_quit(&mut self) {
        *self.quit = true;
    }
}

pub struct Emulator<U: GameboyUi> {
    cpu: Cpu<Bus<U>>,
}

impl<U: GameboyUi> Emulator<U> {
    /// Builds the aggregate from a raw ROM image. Returns the emulator and
    /// the consumer half of the audio hand-off, which the host must keep
    /// draining (or drop) to avoid stalling the core.
    pub fn new(rom: Vec<u8>, options: EmulatorOptions, ui: U) -> Result<(Self, AudioConsumer), EmulatorError> {
        let cartridge = Cartridge::new(rom, options.saved_ram)?;
        let mode = options.forced_mode.unwrap_or(if cartridge.is_cgb() {
            EmulatorMode::Cgb
        } else {
            EmulatorMode::Dmg
        });

        let (bus, audio_consumer) = Bus::new(cartridge, mode, ui);
        Ok((Emulator { cpu: Cpu::new(bus) }, audio_consumer))
    }

    /// Runs one frame's worth of cycles, then polls the host for input.
    pub fn run_frame(&mut self) -> Result<(), EmulatorError> {
        self.run_cycles(CYCLES_PER_FRAME)?;
        self.cpu.bus.poll_gamepad();
        Ok(())
    }

    /// Executes instructions until at least `cycles` T-states have passed.
    /// The scheduler is rebased first, so `cycles` is relative to "now"; the
    /// batch may overshoot by at most one instruction.
    pub fn run_cycles(&mut self, cycles: i32) -> Result<(), EmulatorError> {
        self.cpu.bus.scheduler.rebase();
        while self.cpu.bus.timestamp() < cycles {
            self.cpu.step(cycles)?;
        }
        Ok(())
    }

    pub fn set_gamepad(&mut self, button: Button, pressed: bool) {
        self.cpu.bus.set_button(button, pressed);
    }

    pub fn quit_requested(&self) -> bool {
        self.cpu.bus.quit_requested()
    }

    pub fn request_quit(&mut self) {
        self.cpu.bus.request_quit();
    }

    /// The periodic battery-backed flush, if one has come due.
    pub fn take_dirty_save(&mut self) -> Option<Vec<u8>> {
        self.cpu.bus.take_dirty_save()
    }

    /// The full battery-backed image for the shutdown flush.
    pub fn save_blob(&self) -> Option<Vec<u8>> {
        self.cpu.bus.cartridge().save_blob()
    }

    pub fn title(&self) -> &str {
        self.cpu.bus.cartridge().title()
    }

    pub fn mode(&self) -> EmulatorMode {
        self.cpu.bus.mode()
    }

    pub fn ui_mut(&mut self) -> &mut U {
        self.cpu.bus.ui_mut()
    }

    /// Tears the aggregate down, notifying the UI, and hands it back to the
    /// host together with the final save image.
    pub fn shutdown(mut self) -> (U, Option<Vec<u8>>) {
        let save = self.save_blob();
        self.cpu.bus.ui_mut().destroy();
        (self.cpu.bus.into_ui(), save)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EmulatorOptionsBuilder;

    #[derive(Default)]
    struct CountingUi {
        lines: usize,
        flips: usize,
        polls: usize,
    }

    impl GameboyUi for CountingUi {
        fn draw_line_dmg(&mut self, _ly: u8, _line: &[DmgColor; RESOLUTION_WIDTH]) {
            self.lines += 1;
        }

        fn draw_line_gbc(&mut self, _ly: u8, _line: &[u16; RESOLUTION_WIDTH]) {
            self.lines += 1;
        }

        fn flip(&mut self) {
            self.flips += 1;
        }

        fn refresh_gamepad(&mut self, gamepad: &mut GamepadHandle<'_>) {
            self.polls += 1;
            gamepad.set_gamepad(Button::Start, true);
        }

        fn destroy(&mut self) {}
    }

    fn nop_rom() -> Vec<u8> {
        // An all-zero image executes as an endless run of NOPs; the header
        // declares the smallest Simple cartridge.
        vec![0u8; 0x8000]
    }

    #[test]
    fn a_frame_of_nops_draws_a_full_screen() {
        let options = EmulatorOptionsBuilder::new().build();
        let (mut emulator, _audio) = Emulator::new(nop_rom(), options, CountingUi::default()).unwrap();

        emulator.run_frame().unwrap();

        let ui = emulator.ui_mut();
        assert_eq!(ui.lines, 144);
        assert_eq!(ui.flips, 1);
        assert_eq!(ui.polls, 1);
    }

    #[test]
    fn forced_cgb_mode_wins_over_the_header() {
        let options = EmulatorOptionsBuilder::new().with_mode(EmulatorMode::Cgb).build();
        let (emulator, _audio) = Emulator::new(nop_rom(), options, CountingUi::default()).unwrap();

        assert_eq!(emulator.mode(), EmulatorMode::Cgb);
    }

    #[test]
    fn timestamp_advances_by_the_documented_instruction_cost() {
        let options = EmulatorOptionsBuilder::new().build();
        let (mut emulator, _audio) = Emulator::new(nop_rom(), options, CountingUi::default()).unwrap();

        // A single NOP per step; each costs exactly 4 T-states.
        emulator.cpu.bus.scheduler.rebase();
        let before = emulator.cpu.bus.timestamp();
        emulator.cpu.step(i32::MAX).unwrap();
        assert_eq!(emulator.cpu.bus.timestamp() - before, 4);
    }
}
