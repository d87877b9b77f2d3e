//! The picture processing unit: a scanline state machine that is only ever
//! advanced lazily, either because the bus touched one of its registers or
//! because the scheduler reached the next mode boundary it asked to be woken
//! at. Rendering happens a full line at a time when the machine crosses the
//! mode 3 -> mode 0 boundary; the composed line goes straight to the host
//! through the UI contract rather than into an internal framebuffer.
use itertools::Itertools;
use tinyvec::ArrayVec;

use crate::emulator::GameboyUi;
use crate::hardware::ppu::color_palette::{ColorPaletteRam, ColorRgb15};
use crate::hardware::ppu::palette::{DmgColor, Palette};
use crate::hardware::ppu::register_flags::{AttributeFlags, LcdControl, StatInterrupts};
use crate::hardware::ppu::tiledata::*;
use crate::io::interrupts::{Interrupt, InterruptController};
use crate::scheduler::{Scheduler, SyncToken, NEVER};

pub mod color_palette;
pub mod palette;
pub mod register_flags;
pub mod tiledata;

pub const RESOLUTION_WIDTH: usize = 160;
pub const RESOLUTION_HEIGHT: usize = 144;

pub const MODE_2_CYCLES: i32 = 80;
pub const MODE_3_CYCLES: i32 = 172;
pub const MODE_0_CYCLES: i32 = 204;
pub const CYCLES_PER_LINE: i32 = MODE_2_CYCLES + MODE_3_CYCLES + MODE_0_CYCLES;
pub const VISIBLE_LINES: u8 = 144;
pub const TOTAL_LINES: u8 = 154;

pub const LCD_CONTROL_REGISTER: u16 = 0xFF40;
pub const LCD_STATUS_REGISTER: u16 = 0xFF41;
pub const SCY_REGISTER: u16 = 0xFF42;
pub const SCX_REGISTER: u16 = 0xFF43;
pub const LY_REGISTER: u16 = 0xFF44;
pub const LYC_REGISTER: u16 = 0xFF45;
pub const BG_PALETTE: u16 = 0xFF47;
pub const OB_PALETTE_0: u16 = 0xFF48;
pub const OB_PALETTE_1: u16 = 0xFF49;
pub const WY_REGISTER: u16 = 0xFF4A;
pub const WX_REGISTER: u16 = 0xFF4B;
pub const CGB_VRAM_BANK: u16 = 0xFF4F;
pub const CGB_BG_PALETTE_INDEX: u16 = 0xFF68;
pub const CGB_BG_PALETTE_DATA: u16 = 0xFF69;
pub const CGB_OBJ_PALETTE_INDEX: u16 = 0xFF6A;
pub const CGB_OBJ_PALETTE_DATA: u16 = 0xFF6B;

const MAX_SPRITES_PER_LINE: usize = 10;
const WHITE_RGB15: ColorRgb15 = 0x7FFF;

#[derive(Debug, PartialOrd, PartialEq, Copy, Clone)]
pub enum Mode {
    HBlank,
    VBlank,
    OamSearch,
    LcdTransfer,
}

pub struct Ppu {
    cgb: bool,

    lcd_control: LcdControl,
    stat_interrupts: StatInterrupts,

    /// Cycle offset within the current 456-cycle line; always `< 456`.
    line_position: i32,
    ly: u8,
    lyc: u8,

    scroll_x: u8,
    scroll_y: u8,
    window_x: u8,
    window_y: u8,
    /// Which row of the window is drawn next. Advances only on lines where
    /// the window actually contributed pixels, independently of `ly`.
    window_line: u8,

    bg_palette: Palette,
    obj_palette_0: Palette,
    obj_palette_1: Palette,
    bg_color_palettes: ColorPaletteRam,
    obj_color_palettes: ColorPaletteRam,

    vram_bank: u8,
    tiles: Box<[Tile; TILES_PER_BANK * 2]>,
    tile_map_9800: TileMap,
    tile_map_9c00: TileMap,
    oam: [SpriteAttribute; 40],
}

impl Ppu {
    pub fn new(cgb: bool) -> Self {
        Ppu {
            cgb,
            lcd_control: LcdControl::from_bits_truncate(0x91),
            stat_interrupts: StatInterrupts::empty(),
            line_position: 0,
            ly: 0,
            lyc: 0,
            scroll_x: 0,
            scroll_y: 0,
            window_x: 0,
            window_y: 0,
            window_line: 0,
            bg_palette: Palette::default(),
            obj_palette_0: Palette::default(),
            obj_palette_1: Palette::default(),
            bg_color_palettes: ColorPaletteRam::new(),
            obj_color_palettes: ColorPaletteRam::new(),
            vram_bank: 0,
            tiles: Box::new([Tile::default(); TILES_PER_BANK * 2]),
            tile_map_9800: TileMap::new(),
            tile_map_9c00: TileMap::new(),
            oam: [SpriteAttribute::default(); 40],
        }
    }

    pub fn mode(&self) -> Mode {
        if !self.lcd_control.contains(LcdControl::LCD_DISPLAY) {
            return Mode::HBlank;
        }
        if self.ly >= VISIBLE_LINES {
            Mode::VBlank
        } else if self.line_position < MODE_2_CYCLES {
            Mode::OamSearch
        } else if self.line_position < MODE_2_CYCLES + MODE_3_CYCLES {
            Mode::LcdTransfer
        } else {
            Mode::HBlank
        }
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    /// Advances the scanline machine over the window since the last sync,
    /// drawing any lines whose mode 3 -> 0 boundary falls inside it and
    /// raising the STAT/VBLANK interrupts that come due. Returns how many
    /// HBLANK entries an armed HDMA should copy a block for; the bus performs
    /// the actual copies once this borrow ends.
    pub fn catch_up<U: GameboyUi>(
        &mut self,
        scheduler: &mut Scheduler,
        interrupts: &mut InterruptController,
        ui: &mut U,
        hdma_armed: bool,
    ) -> u8 {
        let mut elapsed = scheduler.resync(SyncToken::Ppu);

        if !self.lcd_control.contains(LcdControl::LCD_DISPLAY) {
            scheduler.schedule(SyncToken::Ppu, NEVER);
            return 0;
        }

        let mut hdma_blocks = 0;
        let mut line_remaining = CYCLES_PER_LINE - self.line_position;

        while elapsed > 0 {
            let prev_mode = self.mode();

            if elapsed < line_remaining {
                self.line_position += elapsed;
                line_remaining -= elapsed;
                elapsed = 0;

                if prev_mode != Mode::HBlank && self.mode() == Mode::HBlank {
                    // Crossed the mode 3 -> 0 boundary mid-line.
                    self.draw_current_line(ui);
                    if self.stat_interrupts.contains(StatInterrupts::MODE_0) {
                        interrupts.request(Interrupt::LcdStat);
                    }
                    if hdma_armed {
                        hdma_blocks += 1;
                    }
                }
            } else {
                elapsed -= line_remaining;

                if matches!(prev_mode, Mode::OamSearch | Mode::LcdTransfer) {
                    // The line ends inside this window but its mode 0 entry
                    // was never observed; draw it before moving on.
                    self.draw_current_line(ui);
                    if self.stat_interrupts.contains(StatInterrupts::MODE_0) {
                        interrupts.request(Interrupt::LcdStat);
                    }
                    if hdma_armed {
                        hdma_blocks += 1;
                    }
                }

                self.ly += 1;
                self.line_position = 0;
                line_remaining = CYCLES_PER_LINE;

                if self.ly == VISIBLE_LINES {
                    ui.flip();
                    self.window_line = 0;
                    interrupts.request(Interrupt::VBlank);
                    if self.stat_interrupts.contains(StatInterrupts::MODE_1) {
                        interrupts.request(Interrupt::LcdStat);
                    }
                }

                if self.ly >= TOTAL_LINES {
                    self.ly = 0;
                }

                if self.stat_interrupts.contains(StatInterrupts::LYC) && self.ly == self.lyc {
                    interrupts.request(Interrupt::LcdStat);
                }

                if self.stat_interrupts.contains(StatInterrupts::MODE_2) && self.ly < VISIBLE_LINES {
                    interrupts.request(Interrupt::LcdStat);
                }
            }
        }

        self.schedule_next(scheduler, hdma_armed);
        hdma_blocks
    }

    /// Asks to be woken at the end of the current line, or already at its
    /// mode 0 entry when something (STAT selector or an armed HDMA) needs to
    /// observe that boundary on time.
    fn schedule_next(&self, scheduler: &mut Scheduler, hdma_armed: bool) {
        let mut next_event = CYCLES_PER_LINE - self.line_position;

        if (self.stat_interrupts.contains(StatInterrupts::MODE_0) || hdma_armed)
            && matches!(self.mode(), Mode::OamSearch | Mode::LcdTransfer)
        {
            next_event -= MODE_0_CYCLES;
        }

        scheduler.schedule(SyncToken::Ppu, next_event);
    }

    // -- Line composition --

    fn draw_current_line<U: GameboyUi>(&mut self, ui: &mut U) {
        let y = self.ly;
        let mut index_buf = [0u8; RESOLUTION_WIDTH];
        let mut priority_buf = [false; RESOLUTION_WIDTH];
        let mut dmg_line = [DmgColor::White; RESOLUTION_WIDTH];
        let mut gbc_line = [WHITE_RGB15; RESOLUTION_WIDTH];

        // On the monochrome system LCDC bit 0 blanks both background and
        // window; on Color it only demotes their priority (handled in the
        // sprite pass), so they are always fetched there.
        let bg_enabled = self.cgb || self.lcd_control.contains(LcdControl::BG_WINDOW_PRIORITY);
        let window_enabled = bg_enabled && self.lcd_control.contains(LcdControl::WINDOW_DISPLAY);

        let window_start_x = self.window_x as i32 - 7;
        let window_reached = window_enabled && y >= self.window_y;
        let mut window_used = false;

        for x in 0..RESOLUTION_WIDTH {
            let (index, attributes) = if window_reached && x as i32 >= window_start_x {
                window_used = true;
                let wx = (x as i32 - window_start_x) as u8;
                self.fetch_map_pixel(LcdControl::WINDOW_MAP_SELECT, wx, self.window_line)
            } else if bg_enabled {
                let bx = (x as u8).wrapping_add(self.scroll_x);
                let by = y.wrapping_add(self.scroll_y);
                self.fetch_map_pixel(LcdControl::BG_TILE_MAP_SELECT, bx, by)
            } else {
                (0, AttributeFlags::empty())
            };

            index_buf[x] = index;
            priority_buf[x] = attributes.contains(AttributeFlags::PRIORITY);
            if self.cgb {
                gbc_line[x] = self.bg_color_palettes.color(attributes.cgb_palette_number(), index);
            } else {
                dmg_line[x] = self.bg_palette.color(index);
            }
        }

        if self.lcd_control.contains(LcdControl::SPRITE_DISPLAY_ENABLE) {
            self.draw_line_sprites(y, &index_buf, &priority_buf, &mut dmg_line, &mut gbc_line);
        }

        if self.cgb {
            ui.draw_line_gbc(y, &gbc_line);
        } else {
            ui.draw_line_dmg(y, &dmg_line);
        }

        if window_used {
            self.window_line = self.window_line.wrapping_add(1);
        }
    }

    fn draw_line_sprites(
        &self,
        y: u8,
        index_buf: &[u8; RESOLUTION_WIDTH],
        priority_buf: &[bool; RESOLUTION_WIDTH],
        dmg_line: &mut [DmgColor; RESOLUTION_WIDTH],
        gbc_line: &mut [ColorRgb15; RESOLUTION_WIDTH],
    ) {
        let tall_sprites = self.lcd_control.contains(LcdControl::SPRITE_SIZE);
        let height = if tall_sprites { 16i32 } else { 8 };
        // On Color hardware LCDC bit 0 clear overrides every priority bit:
        // sprites always win over the background and window.
        let bg_may_win = !self.cgb || self.lcd_control.contains(LcdControl::BG_WINDOW_PRIORITY);

        let mut line_sprites: ArrayVec<[SpriteAttribute; MAX_SPRITES_PER_LINE]> = ArrayVec::new();
        for sprite in self.oam.iter() {
            let top = sprite.y_pos as i32 - 16;
            if (y as i32) >= top && (y as i32) < top + height {
                line_sprites.push(*sprite);
                if line_sprites.len() == MAX_SPRITES_PER_LINE {
                    break;
                }
            }
        }

        // Monochrome priority is ascending X (ties by OAM slot, which the
        // stable sort preserves); Color keeps plain OAM order.
        let ordered = if self.cgb {
            line_sprites.iter().collect_vec()
        } else {
            line_sprites.iter().sorted_by_key(|sprite| sprite.x_pos).collect_vec()
        };

        let mut covered = [false; RESOLUTION_WIDTH];

        for sprite in ordered {
            let flags = sprite.attribute_flags;
            let screen_x = sprite.x_pos as i32 - 8;
            let top = sprite.y_pos as i32 - 16;

            let mut row = (y as i32 - top) as u8;
            if flags.contains(AttributeFlags::Y_FLIP) {
                row = (height - 1) as u8 - row;
            }

            let tile_index = if tall_sprites {
                (sprite.tile_number & 0xFE) as usize + (row >= 8) as usize
            } else {
                sprite.tile_number as usize
            };
            let bank = if self.cgb { flags.vram_bank() } else { 0 };
            let (low, high) = self.tiles[bank * TILES_PER_BANK + tile_index].pixel_line(row % 8);

            for px in 0..8i32 {
                let x = screen_x + px;
                if !(0..RESOLUTION_WIDTH as i32).contains(&x) || covered[x as usize] {
                    continue;
                }
                let x = x as usize;

                let bit = if flags.contains(AttributeFlags::X_FLIP) { px } else { 7 - px };
                let index = ((low >> bit) & 1) | (((high >> bit) & 1) << 1);
                if index == 0 {
                    // Sprite color 0 is always transparent.
                    continue;
                }

                let behind_bg = flags.contains(AttributeFlags::PRIORITY);
                let bg_opaque = index_buf[x] != 0;
                let hidden = bg_may_win && bg_opaque && (behind_bg || (self.cgb && priority_buf[x]));
                if hidden {
                    continue;
                }

                covered[x] = true;
                if self.cgb {
                    gbc_line[x] = self.obj_color_palettes.color(flags.cgb_palette_number(), index);
                } else {
                    let palette = if flags.contains(AttributeFlags::PALETTE_NUMBER) {
                        self.obj_palette_1
                    } else {
                        self.obj_palette_0
                    };
                    dmg_line[x] = palette.color(index);
                }
            }
        }
    }

    /// Samples one background/window pixel: `map_select` picks which LCDC bit
    /// chooses the 0x9C00 map, `(x, y)` are coordinates into the 256x256
    /// pixel plane.
    fn fetch_map_pixel(&self, map_select: LcdControl, x: u8, y: u8) -> (u8, AttributeFlags) {
        let map = if self.lcd_control.contains(map_select) {
            &self.tile_map_9c00
        } else {
            &self.tile_map_9800
        };

        let map_index = (y as usize / 8) * 32 + (x as usize / 8);
        let tile_number = map.tiles[map_index];
        let attributes = if self.cgb { map.attributes[map_index] } else { AttributeFlags::empty() };

        let mut px = x % 8;
        let mut py = y % 8;
        if attributes.contains(AttributeFlags::X_FLIP) {
            px = 7 - px;
        }
        if attributes.contains(AttributeFlags::Y_FLIP) {
            py = 7 - py;
        }

        let tile = self.tiles[attributes.vram_bank() * TILES_PER_BANK + self.tile_data_index(tile_number)];
        let (low, high) = tile.pixel_line(py);
        let bit = 7 - px;
        let index = ((low >> bit) & 1) | (((high >> bit) & 1) << 1);

        (index, attributes)
    }

    /// Resolves a background/window tile number to a flat tile slot, applying
    /// the signed 0x9000-based addressing when LCDC bit 4 is clear.
    fn tile_data_index(&self, tile_number: u8) -> usize {
        if self.lcd_control.contains(LcdControl::BG_WINDOW_TILE_SELECT) {
            tile_number as usize
        } else {
            (256 + (tile_number as i8 as i32)) as usize
        }
    }

    // -- MMIO accessors; the bus syncs this PPU before calling any of these. --

    pub fn read_lcd_control(&self) -> u8 {
        self.lcd_control.bits()
    }

    pub fn write_lcd_control<U: GameboyUi>(&mut self, value: u8, scheduler: &mut Scheduler, ui: &mut U) {
        let was_on = self.lcd_control.contains(LcdControl::LCD_DISPLAY);
        self.lcd_control = LcdControl::from_bits_truncate(value);
        let is_on = self.lcd_control.contains(LcdControl::LCD_DISPLAY);

        if was_on != is_on {
            if !is_on {
                self.blank_display(ui);
                self.ly = 0;
                self.line_position = 0;
                self.window_line = 0;
                scheduler.schedule(SyncToken::Ppu, NEVER);
            } else {
                self.schedule_next(scheduler, false);
            }
        }
    }

    /// An LCD that has just been switched off shows the lightest color on
    /// every line.
    fn blank_display<U: GameboyUi>(&mut self, ui: &mut U) {
        let dmg_line = [DmgColor::White; RESOLUTION_WIDTH];
        let gbc_line = [WHITE_RGB15; RESOLUTION_WIDTH];
        for line in 0..VISIBLE_LINES {
            if self.cgb {
                ui.draw_line_gbc(line, &gbc_line);
            } else {
                ui.draw_line_dmg(line, &dmg_line);
            }
        }
    }

    pub fn read_lcd_status(&self) -> u8 {
        0x80 | self.stat_interrupts.bits()
            | (((self.ly == self.lyc) as u8) << 2)
            | self.mode().stat_bits()
    }

    pub fn write_lcd_status(&mut self, value: u8, scheduler: &mut Scheduler) {
        self.stat_interrupts = StatInterrupts::from_bits_truncate(value & 0x78);
        // Enabling the mode 0 selector may move up the next wanted wake-up.
        if self.lcd_control.contains(LcdControl::LCD_DISPLAY) {
            self.schedule_next(scheduler, false);
        }
    }

    pub fn scy(&self) -> u8 {
        self.scroll_y
    }

    pub fn set_scy(&mut self, value: u8) {
        self.scroll_y = value;
    }

    pub fn scx(&self) -> u8 {
        self.scroll_x
    }

    pub fn set_scx(&mut self, value: u8) {
        self.scroll_x = value;
    }

    pub fn lyc(&self) -> u8 {
        self.lyc
    }

    pub fn set_lyc(&mut self, value: u8) {
        self.lyc = value;
    }

    pub fn wy(&self) -> u8 {
        self.window_y
    }

    pub fn set_wy(&mut self, value: u8) {
        self.window_y = value;
    }

    pub fn wx(&self) -> u8 {
        self.window_x
    }

    pub fn set_wx(&mut self, value: u8) {
        self.window_x = value;
    }

    pub fn read_bg_palette(&self) -> u8 {
        self.bg_palette.read()
    }

    pub fn write_bg_palette(&mut self, value: u8) {
        self.bg_palette.write(value);
    }

    pub fn read_obj_palette_0(&self) -> u8 {
        self.obj_palette_0.read()
    }

    pub fn write_obj_palette_0(&mut self, value: u8) {
        self.obj_palette_0.write(value);
    }

    pub fn read_obj_palette_1(&self) -> u8 {
        self.obj_palette_1.read()
    }

    pub fn write_obj_palette_1(&mut self, value: u8) {
        self.obj_palette_1.write(value);
    }

    pub fn vram_bank_bits(&self) -> u8 {
        0xFE | self.vram_bank
    }

    pub fn select_vram_bank(&mut self, value: u8) {
        self.vram_bank = value & 0x01;
    }

    pub fn bg_color_palettes(&self) -> &ColorPaletteRam {
        &self.bg_color_palettes
    }

    pub fn bg_color_palettes_mut(&mut self) -> &mut ColorPaletteRam {
        &mut self.bg_color_palettes
    }

    pub fn obj_color_palettes(&self) -> &ColorPaletteRam {
        &self.obj_color_palettes
    }

    pub fn obj_color_palettes_mut(&mut self) -> &mut ColorPaletteRam {
        &mut self.obj_color_palettes
    }

    /// Reads a byte from the CPU-visible VRAM window (`0x8000..=0x9FFF`),
    /// honouring the selected bank.
    pub fn read_vram_byte(&self, address: u16) -> u8 {
        match address {
            TILE_BLOCK_0_START..=TILE_BLOCK_2_END => {
                let relative = address - TILE_BLOCK_0_START;
                let slot = self.vram_bank as usize * TILES_PER_BANK + (relative / 16) as usize;
                self.tiles[slot].read_byte(relative % 16)
            }
            TILEMAP_9800_START..=TILEMAP_9800_END => {
                self.read_map_byte(&self.tile_map_9800, address - TILEMAP_9800_START)
            }
            _ => self.read_map_byte(&self.tile_map_9c00, address - TILEMAP_9C00_START),
        }
    }

    pub fn write_vram_byte(&mut self, address: u16, value: u8) {
        match address {
            TILE_BLOCK_0_START..=TILE_BLOCK_2_END => {
                let relative = address - TILE_BLOCK_0_START;
                let slot = self.vram_bank as usize * TILES_PER_BANK + (relative / 16) as usize;
                self.tiles[slot].write_byte(relative % 16, value);
            }
            TILEMAP_9800_START..=TILEMAP_9800_END => {
                let offset = address - TILEMAP_9800_START;
                Self::write_map_byte(&mut self.tile_map_9800, offset, value, self.vram_bank)
            }
            _ => {
                let offset = address - TILEMAP_9C00_START;
                Self::write_map_byte(&mut self.tile_map_9c00, offset, value, self.vram_bank)
            }
        }
    }

    fn read_map_byte(&self, map: &TileMap, offset: u16) -> u8 {
        if self.vram_bank == 0 {
            map.tiles[offset as usize]
        } else {
            map.attributes[offset as usize].bits()
        }
    }

    fn write_map_byte(map: &mut TileMap, offset: u16, value: u8, bank: u8) {
        if bank == 0 {
            map.tiles[offset as usize] = value;
        } else {
            map.attributes[offset as usize] = AttributeFlags::from_bits_truncate(value);
        }
    }

    /// Reads a byte from OAM (`0xFE00..=0xFE9F`).
    pub fn read_oam_byte(&self, address: u16) -> u8 {
        let relative = address & 0xFF;
        self.oam[(relative / 4) as usize].read_byte(relative % 4)
    }

    pub fn write_oam_byte(&mut self, address: u16, value: u8) {
        let relative = address & 0xFF;
        self.oam[(relative / 4) as usize].write_byte(relative % 4, value);
    }

    /// Used by OAM-DMA, which addresses OAM by linear byte offset rather than
    /// through the 0xFE00-based window.
    pub fn oam_dma_write_byte(&mut self, offset: u8, value: u8) {
        self.oam[(offset / 4) as usize].write_byte((offset % 4) as u16, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::interrupts::InterruptFlags;

    #[derive(Default)]
    struct RecordingUi {
        lines_drawn: Vec<u8>,
        flips: usize,
    }

    impl GameboyUi for RecordingUi {
        fn draw_line_dmg(&mut self, ly: u8, _line: &[DmgColor; RESOLUTION_WIDTH]) {
            self.lines_drawn.push(ly);
        }

        fn draw_line_gbc(&mut self, ly: u8, _line: &[ColorRgb15; RESOLUTION_WIDTH]) {
            self.lines_drawn.push(ly);
        }

        fn flip(&mut self) {
            self.flips += 1;
        }

        fn refresh_gamepad(&mut self, _gamepad: &mut crate::emulator::GamepadHandle<'_>) {}

        fn destroy(&mut self) {}
    }

    fn run_ppu(ppu: &mut Ppu, cycles: i32) -> (RecordingUi, InterruptController) {
        let mut scheduler = Scheduler::new();
        let mut interrupts = InterruptController::default();
        let mut ui = RecordingUi::default();

        scheduler.tick(cycles);
        ppu.catch_up(&mut scheduler, &mut interrupts, &mut ui, false);
        (ui, interrupts)
    }

    #[test]
    fn one_frame_draws_every_visible_line_and_flips_once() {
        let mut ppu = Ppu::new(false);
        let (ui, interrupts) = run_ppu(&mut ppu, 70_224);

        assert_eq!(ui.lines_drawn.len(), 144);
        assert_eq!(ui.lines_drawn[0], 0);
        assert_eq!(ui.lines_drawn[143], 143);
        assert_eq!(ui.flips, 1);
        assert!(interrupts.flags.contains(InterruptFlags::VBLANK));
        assert_eq!(ppu.ly(), 0);
        assert!(ppu.line_position < CYCLES_PER_LINE);
    }

    #[test]
    fn mode_follows_the_line_position_timeline() {
        let mut ppu = Ppu::new(false);
        assert_eq!(ppu.mode(), Mode::OamSearch);

        run_ppu(&mut ppu, MODE_2_CYCLES);
        assert_eq!(ppu.mode(), Mode::LcdTransfer);

        let mut ppu = Ppu::new(false);
        run_ppu(&mut ppu, MODE_2_CYCLES + MODE_3_CYCLES);
        assert_eq!(ppu.mode(), Mode::HBlank);
    }

    #[test]
    fn lyc_interrupt_fires_when_reaching_the_compare_line() {
        let mut ppu = Ppu::new(false);
        ppu.set_lyc(2);
        ppu.stat_interrupts = StatInterrupts::LYC;

        let (_, interrupts) = run_ppu(&mut ppu, CYCLES_PER_LINE * 2 + 4);
        assert!(interrupts.flags.contains(InterruptFlags::LCD));
    }

    #[test]
    fn disabling_the_lcd_blanks_and_resets_the_line_counters() {
        let mut ppu = Ppu::new(false);
        run_ppu(&mut ppu, CYCLES_PER_LINE * 3);
        assert_eq!(ppu.ly(), 3);

        let mut scheduler = Scheduler::new();
        let mut ui = RecordingUi::default();
        ppu.write_lcd_control(0x11, &mut scheduler, &mut ui);

        assert_eq!(ui.lines_drawn.len(), 144);
        assert_eq!(ppu.ly(), 0);
        assert_eq!(ppu.line_position, 0);
        assert_eq!(scheduler.next_event_for(SyncToken::Ppu), NEVER);
    }

    #[test]
    fn window_line_advances_only_when_the_window_is_drawn() {
        let mut ppu = Ppu::new(false);
        // Window enabled from line 0, background enabled, LCD on.
        ppu.lcd_control = LcdControl::from_bits_truncate(0xB1);
        ppu.window_x = 7;
        ppu.window_y = 100;

        run_ppu(&mut ppu, CYCLES_PER_LINE * 99);
        assert_eq!(ppu.window_line, 0);

        // Lines 99 and 100 get drawn next; only line 100 reaches the window.
        run_ppu(&mut ppu, CYCLES_PER_LINE * 2);
        assert_eq!(ppu.window_line, 1);
    }

    #[test]
    fn stat_read_recomposes_mode_and_coincidence() {
        let mut ppu = Ppu::new(false);
        ppu.stat_interrupts = StatInterrupts::MODE_1;
        ppu.set_lyc(0);

        // ly == lyc == 0, mode 2 at reset.
        assert_eq!(ppu.read_lcd_status(), 0x80 | 0x10 | 0x04 | 0x02);
    }
}
