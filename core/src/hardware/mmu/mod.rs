//! The memory bus: decodes every 16-bit address into its backing region and,
//! for device registers, synchronises the owning device through the
//! scheduler first, so reads observe post-catch-up state and writes land at
//! the correct point on the shared timeline. The bus also owns the two DMA
//! engines and the cooperative dispatch loop that drives every device's
//! catch-up in a fixed order.
use log::debug;

use crate::emulator::{EmulatorMode, GameboyUi, GamepadHandle, CPU_FREQUENCY_HZ};
use crate::hardware::apu::{Apu, AudioConsumer, APU_MEM_END, APU_MEM_START, WAVE_SAMPLE_END, WAVE_SAMPLE_START};
use crate::hardware::cartridge::Cartridge;
use crate::hardware::mmu::dma::OamDma;
use crate::hardware::mmu::hdma::Hdma;
use crate::hardware::mmu::hram::Hram;
use crate::hardware::mmu::wram::Wram;
use crate::hardware::ppu::*;
use crate::io::interrupts::InterruptController;
use crate::io::io_registers::IoRegisters;
use crate::io::joypad::{Button, Joypad, JOYPAD_REGISTER};
use crate::io::timer::{TimerRegisters, DIVIDER_REGISTER, TIMER_CONTROL, TIMER_COUNTER, TIMER_MODULO};
use crate::scheduler::{Scheduler, SyncToken, NEVER};

pub mod dma;
pub mod hdma;
mod hram;
mod wram;

pub const ROM_START: u16 = 0x0000;
pub const ROM_END: u16 = 0x7FFF;
pub const VRAM_START: u16 = 0x8000;
pub const VRAM_END: u16 = 0x9FFF;
pub const EXTERNAL_RAM_START: u16 = 0xA000;
pub const EXTERNAL_RAM_END: u16 = 0xBFFF;
pub const WRAM_BANK_00_START: u16 = 0xC000;
pub const WRAM_BANK_00_END: u16 = 0xCFFF;
pub const WRAM_BANK_NN_START: u16 = 0xD000;
pub const WRAM_BANK_NN_END: u16 = 0xDFFF;
pub const ECHO_RAM_START: u16 = 0xE000;
pub const ECHO_RAM_END: u16 = 0xFDFF;
/// Subtract this from an echo-RAM address to reach the mirrored WRAM.
pub const ECHO_RAM_OFFSET: u16 = 0x2000;
pub const OAM_ATTRIBUTE_START: u16 = 0xFE00;
pub const OAM_ATTRIBUTE_END: u16 = 0xFE9F;
pub const NOT_USABLE_START: u16 = 0xFEA0;
pub const NOT_USABLE_END: u16 = 0xFEFF;
pub const IO_START: u16 = 0xFF00;
pub const IO_END: u16 = 0xFF7F;
pub const HRAM_START: u16 = 0xFF80;
pub const HRAM_END: u16 = 0xFFFE;

pub const SIO_DATA: u16 = 0xFF01;
pub const SIO_CONTROL: u16 = 0xFF02;
pub const INTERRUPTS_FLAG: u16 = 0xFF0F;
pub const DMA_TRANSFER: u16 = 0xFF46;
pub const CGB_HDMA_SOURCE_HIGH: u16 = 0xFF51;
pub const CGB_HDMA_SOURCE_LOW: u16 = 0xFF52;
pub const CGB_HDMA_DEST_HIGH: u16 = 0xFF53;
pub const CGB_HDMA_DEST_LOW: u16 = 0xFF54;
pub const CGB_HDMA_CONTROL: u16 = 0xFF55;
pub const CGB_WRAM_BANK: u16 = 0xFF70;
pub const INTERRUPTS_ENABLE: u16 = 0xFFFF;

/// The value an open-bus or write-only register read returns.
pub const INVALID_READ: u8 = 0xFF;

/// Battery-backed saves are flushed three seconds after the last write.
const CART_FLUSH_DELAY: i32 = 3 * CPU_FREQUENCY_HZ as i32;

/// What the CPU needs from the memory system. The production implementation
/// is [`Bus`]; CPU tests substitute a flat array that never advances time.
pub trait MemoryBus {
    fn read_byte(&mut self, address: u16) -> u8;
    fn write_byte(&mut self, address: u16, value: u8);
    /// Advances the shared clock, running any device catch-ups that come due.
    fn tick(&mut self, t_states: i32);
    fn timestamp(&self) -> i32;
    /// Skips a halted CPU forward to the next scheduled event, but no
    /// further than `target`.
    fn halt_skip(&mut self, target: i32);
    fn interrupts(&self) -> &InterruptController;
    fn interrupts_mut(&mut self) -> &mut InterruptController;
    fn mode(&self) -> EmulatorMode;
}

pub struct Bus<U: GameboyUi> {
    pub scheduler: Scheduler,
    mode: EmulatorMode,

    cartridge: Cartridge,
    pub ppu: Ppu,
    apu: Apu,
    wram: Wram,
    hram: Hram,
    io_registers: IoRegisters,
    joypad: Joypad,
    timer: TimerRegisters,
    pub interrupts: InterruptController,
    dma: OamDma,
    hdma: Hdma,

    ui: U,
    quit: bool,
    save_requested: bool,
}

impl<U: GameboyUi> Bus<U> {
    pub fn new(cartridge: Cartridge, mode: EmulatorMode, ui: U) -> (Self, AudioConsumer) {
        let (apu, audio_consumer) = Apu::new();
        let bus = Bus {
            scheduler: Scheduler::new(),
            mode,
            ppu: Ppu::new(mode.is_cgb()),
            apu,
            cartridge,
            wram: Wram::new(),
            hram: Hram::new(),
            io_registers: IoRegisters::new(),
            joypad: Joypad::new(),
            timer: TimerRegisters::default(),
            interrupts: InterruptController::default(),
            dma: OamDma::new(),
            hdma: Hdma::new(),
            ui,
            quit: false,
            save_requested: false,
        };
        (bus, audio_consumer)
    }

    // -- Scheduler plumbing --

    /// Runs every due device catch-up in the fixed order PPU, DMA, TIMER,
    /// SPU, CART until the cached first-event lies in the future again.
    /// Each catch-up reschedules its device before returning, so the loop
    /// always terminates.
    pub fn dispatch_due(&mut self) {
        while self.scheduler.timestamp >= self.scheduler.first_event() {
            if self.scheduler.is_due(SyncToken::Ppu) {
                self.sync_ppu();
            }
            if self.scheduler.is_due(SyncToken::Dma) {
                self.sync_dma();
            }
            if self.scheduler.is_due(SyncToken::Timer) {
                self.sync_timer();
            }
            if self.scheduler.is_due(SyncToken::Spu) {
                self.apu.catch_up(&mut self.scheduler);
            }
            if self.scheduler.is_due(SyncToken::Cart) {
                self.sync_cart();
            }
        }
    }

    fn sync_ppu(&mut self) {
        let hdma_armed = self.hdma.is_running() && self.hdma.runs_on_hblank();
        let blocks = self
            .ppu
            .catch_up(&mut self.scheduler, &mut self.interrupts, &mut self.ui, hdma_armed);
        for _ in 0..blocks {
            self.run_hdma_block();
        }
    }

    fn sync_dma(&mut self) {
        let elapsed = self.scheduler.resync(SyncToken::Dma);

        if !self.dma.is_running() {
            self.scheduler.schedule(SyncToken::Dma, NEVER);
            return;
        }

        // One byte lands every four T-states.
        let mut budget = elapsed / 4;
        while budget > 0 {
            match self.dma.next_source() {
                Some(source) => {
                    let value = self.read_raw(source);
                    let offset = self.dma.advance();
                    self.ppu.oam_dma_write_byte(offset, value);
                }
                None => break,
            }
            budget -= 1;
        }

        if self.dma.is_running() {
            self.scheduler.schedule(SyncToken::Dma, 4);
        } else {
            self.scheduler.schedule(SyncToken::Dma, NEVER);
        }
    }

    fn sync_timer(&mut self) {
        let elapsed = self.scheduler.resync(SyncToken::Timer);
        if let Some(flags) = self.timer.catch_up(elapsed) {
            self.interrupts.flags.insert(flags);
        }
        self.scheduler.schedule(SyncToken::Timer, self.timer.cycles_until_next_event());
    }

    /// Fires a few seconds after the last battery-backed write (and at the
    /// idle cadence otherwise); the host picks the flushed image up through
    /// [`Bus::take_dirty_save`].
    fn sync_cart(&mut self) {
        self.scheduler.resync(SyncToken::Cart);
        self.scheduler.schedule(SyncToken::Cart, NEVER);
        if self.cartridge.has_battery() {
            self.save_requested = true;
        }
    }

    // -- DMA engines --

    fn start_oam_dma(&mut self, page: u8) {
        self.sync_dma();
        self.dma.start(page, self.mode.is_cgb());
        self.sync_dma();
    }

    fn run_hdma_block(&mut self) {
        if let Some((source, destination)) = self.hdma.begin_block() {
            for i in 0..16u16 {
                let value = self.read_raw(source.wrapping_add(i));
                self.ppu
                    .write_vram_byte(VRAM_START + (destination.wrapping_add(i) & 0x1FFF), value);
            }
            self.hdma.advance_block();
        }
    }

    /// The immediate (general-purpose) HDMA variant: a blocking copy costing
    /// two T-states per byte.
    fn run_gdma(&mut self, total: usize) {
        let source = self.hdma.source_address();
        let destination = self.hdma.destination_offset();
        for i in 0..total as u16 {
            let value = self.read_raw(source.wrapping_add(i));
            self.ppu
                .write_vram_byte(VRAM_START + (destination.wrapping_add(i) & 0x1FFF), value);
        }
        self.hdma.advance_bytes(total);
        self.tick(total as i32 * 2);
    }

    /// Reads memory without synchronising any device; only used by the DMA
    /// engines, whose legal source regions are all plain storage.
    fn read_raw(&self, address: u16) -> u8 {
        match address {
            ROM_START..=ROM_END => self.cartridge.read_rom(address),
            VRAM_START..=VRAM_END => self.ppu.read_vram_byte(address),
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self.cartridge.read_ram(address),
            WRAM_BANK_00_START..=WRAM_BANK_00_END => self.wram.read_bank_0(address - WRAM_BANK_00_START),
            WRAM_BANK_NN_START..=WRAM_BANK_NN_END => self.wram.read_banked(address - WRAM_BANK_NN_START),
            _ => INVALID_READ,
        }
    }

    // -- Host-facing plumbing --

    /// Lets the host drain its input events into the joypad while the device
    /// state is borrowed out for it.
    pub fn poll_gamepad(&mut self) {
        let Bus { ui, joypad, interrupts, quit, .. } = self;
        let mut handle = GamepadHandle { joypad, interrupts, quit };
        ui.refresh_gamepad(&mut handle);
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        if self.joypad.set_button(button, pressed) {
            self.interrupts.request(crate::io::interrupts::Interrupt::Joypad);
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    /// The battery-backed image, if the periodic flush has come due since
    /// the last call and anything actually changed.
    pub fn take_dirty_save(&mut self) -> Option<Vec<u8>> {
        if !self.save_requested {
            return None;
        }
        self.save_requested = false;
        self.cartridge.take_dirty_save()
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    pub fn into_ui(self) -> U {
        self.ui
    }

    // -- MMIO decode --

    fn read_io_byte(&mut self, address: u16) -> u8 {
        match address {
            JOYPAD_REGISTER => self.joypad.read_register(),
            SIO_DATA | SIO_CONTROL => self.io_registers.read_byte(address),
            DIVIDER_REGISTER => {
                self.sync_timer();
                self.timer.divider_register()
            }
            TIMER_COUNTER => {
                self.sync_timer();
                self.timer.timer_counter()
            }
            TIMER_MODULO => self.timer.timer_modulo(),
            TIMER_CONTROL => self.timer.control_bits(),
            INTERRUPTS_FLAG => self.interrupts.read_if(),
            APU_MEM_START..=APU_MEM_END => self.apu.read_register(address, &mut self.scheduler),
            WAVE_SAMPLE_START..=WAVE_SAMPLE_END => self.apu.read_wave_sample(address, &mut self.scheduler),
            LCD_CONTROL_REGISTER => self.ppu.read_lcd_control(),
            LCD_STATUS_REGISTER => {
                self.sync_ppu();
                self.ppu.read_lcd_status()
            }
            SCY_REGISTER => self.ppu.scy(),
            SCX_REGISTER => self.ppu.scx(),
            LY_REGISTER => {
                self.sync_ppu();
                self.ppu.ly()
            }
            LYC_REGISTER => self.ppu.lyc(),
            DMA_TRANSFER => self.io_registers.read_byte(address),
            BG_PALETTE => self.ppu.read_bg_palette(),
            OB_PALETTE_0 => self.ppu.read_obj_palette_0(),
            OB_PALETTE_1 => self.ppu.read_obj_palette_1(),
            WY_REGISTER => self.ppu.wy(),
            WX_REGISTER => self.ppu.wx(),
            CGB_VRAM_BANK if self.mode.is_cgb() => self.ppu.vram_bank_bits(),
            CGB_HDMA_SOURCE_HIGH..=CGB_HDMA_DEST_LOW => INVALID_READ,
            CGB_HDMA_CONTROL if self.mode.is_cgb() => self.hdma.read_control(),
            CGB_BG_PALETTE_INDEX if self.mode.is_cgb() => self.ppu.bg_color_palettes().read_index_register(),
            CGB_BG_PALETTE_DATA if self.mode.is_cgb() => {
                self.sync_ppu();
                self.ppu.bg_color_palettes().read_data()
            }
            CGB_OBJ_PALETTE_INDEX if self.mode.is_cgb() => self.ppu.obj_color_palettes().read_index_register(),
            CGB_OBJ_PALETTE_DATA if self.mode.is_cgb() => {
                self.sync_ppu();
                self.ppu.obj_color_palettes().read_data()
            }
            CGB_WRAM_BANK if self.mode.is_cgb() => self.wram.bank_select_bits(),
            _ => {
                debug!("read of unmapped I/O register 0x{:04X}", address);
                INVALID_READ
            }
        }
    }

    fn write_io_byte(&mut self, address: u16, value: u8) {
        match address {
            JOYPAD_REGISTER => self.joypad.write_register(value),
            SIO_DATA | SIO_CONTROL => self.io_registers.write_byte(address, value),
            DIVIDER_REGISTER => {
                self.sync_timer();
                self.timer.reset_divider();
                self.reschedule_timer();
            }
            TIMER_COUNTER => {
                self.sync_timer();
                self.timer.set_timer_counter(value);
                self.reschedule_timer();
            }
            TIMER_MODULO => {
                self.sync_timer();
                self.timer.set_modulo(value);
                self.reschedule_timer();
            }
            TIMER_CONTROL => {
                self.sync_timer();
                self.timer.set_control(value);
                self.reschedule_timer();
            }
            INTERRUPTS_FLAG => self.interrupts.write_if(value),
            APU_MEM_START..=APU_MEM_END => self.apu.write_register(address, value, &mut self.scheduler, self.mode),
            WAVE_SAMPLE_START..=WAVE_SAMPLE_END => self.apu.write_wave_sample(address, value, &mut self.scheduler),
            LCD_CONTROL_REGISTER => {
                self.sync_ppu();
                {
                    let Bus { ppu, scheduler, ui, .. } = self;
                    ppu.write_lcd_control(value, scheduler, ui);
                }
                // Re-derive the next wake-up with the HDMA state in view.
                self.sync_ppu();
            }
            LCD_STATUS_REGISTER => {
                self.sync_ppu();
                self.ppu.write_lcd_status(value, &mut self.scheduler);
                self.sync_ppu();
            }
            SCY_REGISTER => {
                self.sync_ppu();
                self.ppu.set_scy(value);
            }
            SCX_REGISTER => {
                self.sync_ppu();
                self.ppu.set_scx(value);
            }
            LY_REGISTER => debug!("write to read-only LY register"),
            LYC_REGISTER => {
                self.sync_ppu();
                self.ppu.set_lyc(value);
            }
            DMA_TRANSFER => {
                self.io_registers.write_byte(address, value);
                self.start_oam_dma(value);
            }
            BG_PALETTE => {
                self.sync_ppu();
                self.ppu.write_bg_palette(value);
            }
            OB_PALETTE_0 => {
                self.sync_ppu();
                self.ppu.write_obj_palette_0(value);
            }
            OB_PALETTE_1 => {
                self.sync_ppu();
                self.ppu.write_obj_palette_1(value);
            }
            WY_REGISTER => {
                self.sync_ppu();
                self.ppu.set_wy(value);
            }
            WX_REGISTER => {
                self.sync_ppu();
                self.ppu.set_wx(value);
            }
            CGB_VRAM_BANK if self.mode.is_cgb() => self.ppu.select_vram_bank(value),
            CGB_HDMA_SOURCE_HIGH if self.mode.is_cgb() => self.hdma.write_source_high(value),
            CGB_HDMA_SOURCE_LOW if self.mode.is_cgb() => self.hdma.write_source_low(value),
            CGB_HDMA_DEST_HIGH if self.mode.is_cgb() => self.hdma.write_destination_high(value),
            CGB_HDMA_DEST_LOW if self.mode.is_cgb() => self.hdma.write_destination_low(value),
            CGB_HDMA_CONTROL if self.mode.is_cgb() => {
                self.sync_ppu();
                if let Some(total) = self.hdma.write_control(value) {
                    self.run_gdma(total);
                } else {
                    // Arming (or cancelling) HBLANK mode changes when the PPU
                    // next needs to be observed.
                    self.sync_ppu();
                }
            }
            CGB_BG_PALETTE_INDEX if self.mode.is_cgb() => self.ppu.bg_color_palettes_mut().write_index_register(value),
            CGB_BG_PALETTE_DATA if self.mode.is_cgb() => {
                self.sync_ppu();
                self.ppu.bg_color_palettes_mut().write_data(value);
            }
            CGB_OBJ_PALETTE_INDEX if self.mode.is_cgb() => self.ppu.obj_color_palettes_mut().write_index_register(value),
            CGB_OBJ_PALETTE_DATA if self.mode.is_cgb() => {
                self.sync_ppu();
                self.ppu.obj_color_palettes_mut().write_data(value);
            }
            CGB_WRAM_BANK if self.mode.is_cgb() => self.wram.select_bank(value),
            _ => debug!("write of 0x{:02X} to unmapped I/O register 0x{:04X}", value, address),
        }
    }

    fn reschedule_timer(&mut self) {
        self.scheduler.schedule(SyncToken::Timer, self.timer.cycles_until_next_event());
    }

    fn schedule_cart_flush(&mut self) {
        if self.cartridge.has_battery() {
            self.scheduler.schedule(SyncToken::Cart, CART_FLUSH_DELAY);
        }
    }
}

impl<U: GameboyUi> MemoryBus for Bus<U> {
    fn read_byte(&mut self, address: u16) -> u8 {
        match address {
            ROM_START..=ROM_END => self.cartridge.read_rom(address),
            VRAM_START..=VRAM_END => {
                self.sync_ppu();
                self.ppu.read_vram_byte(address)
            }
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self.cartridge.read_ram(address),
            WRAM_BANK_00_START..=WRAM_BANK_00_END => self.wram.read_bank_0(address - WRAM_BANK_00_START),
            WRAM_BANK_NN_START..=WRAM_BANK_NN_END => self.wram.read_banked(address - WRAM_BANK_NN_START),
            ECHO_RAM_START..=ECHO_RAM_END => self.read_byte(address - ECHO_RAM_OFFSET),
            OAM_ATTRIBUTE_START..=OAM_ATTRIBUTE_END => {
                self.sync_ppu();
                self.sync_dma();
                self.ppu.read_oam_byte(address)
            }
            NOT_USABLE_START..=NOT_USABLE_END => {
                debug!("read of unusable memory 0x{:04X}", address);
                INVALID_READ
            }
            IO_START..=IO_END => self.read_io_byte(address),
            HRAM_START..=HRAM_END => self.hram.read_byte(address - HRAM_START),
            INTERRUPTS_ENABLE => self.interrupts.read_ie(),
        }
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        match address {
            ROM_START..=ROM_END => self.cartridge.write_control(address, value),
            VRAM_START..=VRAM_END => {
                self.sync_ppu();
                self.ppu.write_vram_byte(address, value);
            }
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => {
                self.cartridge.write_ram(address, value);
                self.schedule_cart_flush();
            }
            WRAM_BANK_00_START..=WRAM_BANK_00_END => self.wram.write_bank_0(address - WRAM_BANK_00_START, value),
            WRAM_BANK_NN_START..=WRAM_BANK_NN_END => self.wram.write_banked(address - WRAM_BANK_NN_START, value),
            ECHO_RAM_START..=ECHO_RAM_END => self.write_byte(address - ECHO_RAM_OFFSET, value),
            OAM_ATTRIBUTE_START..=OAM_ATTRIBUTE_END => {
                self.sync_ppu();
                self.sync_dma();
                self.ppu.write_oam_byte(address, value);
            }
            NOT_USABLE_START..=NOT_USABLE_END => {
                debug!("write of 0x{:02X} to unusable memory 0x{:04X}", value, address)
            }
            IO_START..=IO_END => self.write_io_byte(address, value),
            HRAM_START..=HRAM_END => self.hram.write_byte(address - HRAM_START, value),
            INTERRUPTS_ENABLE => self.interrupts.write_ie(value),
        }
    }

    fn tick(&mut self, t_states: i32) {
        self.scheduler.tick(t_states);
        if self.scheduler.timestamp >= self.scheduler.first_event() {
            self.dispatch_due();
        }
    }

    fn timestamp(&self) -> i32 {
        self.scheduler.timestamp
    }

    fn halt_skip(&mut self, target: i32) {
        let until = target.min(self.scheduler.first_event());
        let skip = until - self.scheduler.timestamp;
        if skip > 0 {
            self.scheduler.tick(skip);
        }
        self.dispatch_due();
    }

    fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }

    fn interrupts_mut(&mut self) -> &mut InterruptController {
        &mut self.interrupts
    }

    fn mode(&self) -> EmulatorMode {
        self.mode
    }
}
