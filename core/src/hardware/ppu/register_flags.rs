use bitflags::bitflags;

use crate::hardware::ppu::Mode;

bitflags! {
    /// LCDC (0xFF40). Unlike VRAM the PPU never locks this register, so any
    /// bit can change mid-scanline.
    #[derive(Default)]
    pub struct LcdControl: u8 {
        /// On the monochrome system this blanks background and window when
        /// clear. On Color it instead demotes background/window priority so
        /// sprites always win, regardless of per-tile or per-sprite flags.
        const BG_WINDOW_PRIORITY    = 0b0000_0001;
        const SPRITE_DISPLAY_ENABLE = 0b0000_0010;
        /// 0 = 8x8 sprites, 1 = 8x16.
        const SPRITE_SIZE           = 0b0000_0100;
        /// 0 = background map at 0x9800, 1 = 0x9C00.
        const BG_TILE_MAP_SELECT    = 0b0000_1000;
        /// 0 = signed 0x8800 tile addressing for BG/window, 1 = unsigned
        /// 0x8000 addressing. Sprites always use the unsigned space.
        const BG_WINDOW_TILE_SELECT = 0b0001_0000;
        const WINDOW_DISPLAY        = 0b0010_0000;
        /// 0 = window map at 0x9800, 1 = 0x9C00.
        const WINDOW_MAP_SELECT     = 0b0100_0000;
        const LCD_DISPLAY           = 0b1000_0000;
    }
}

bitflags! {
    /// The writable half of STAT (0xFF41): the four interrupt selectors.
    /// Mode and the LY=LYC coincidence bit are derived state and recomposed
    /// on read.
    #[derive(Default)]
    pub struct StatInterrupts: u8 {
        const MODE_0 = 0b0000_1000;
        const MODE_1 = 0b0001_0000;
        const MODE_2 = 0b0010_0000;
        const LYC    = 0b0100_0000;
    }
}

bitflags! {
    /// A sprite's OAM attribute byte; the low six bits double as the
    /// background/window tile attributes on Color.
    #[derive(Default)]
    pub struct AttributeFlags: u8 {
        /// Color only: palette 0..=7.
        const PALETTE_NUMBER_CGB = 0b0000_0111;
        /// Color only: which VRAM bank holds the tile data.
        const TILE_VRAM_BANK     = 0b0000_1000;
        /// Monochrome only: 0 = OBP0, 1 = OBP1.
        const PALETTE_NUMBER     = 0b0001_0000;
        const X_FLIP             = 0b0010_0000;
        const Y_FLIP             = 0b0100_0000;
        /// For sprites: hide behind opaque background pixels. For Color
        /// background tiles: this tile's pixels beat sprites when opaque.
        const PRIORITY           = 0b1000_0000;
    }
}

impl AttributeFlags {
    pub fn cgb_palette_number(&self) -> usize {
        (self.bits & 0x07) as usize
    }

    pub fn vram_bank(&self) -> usize {
        self.contains(AttributeFlags::TILE_VRAM_BANK) as usize
    }
}

impl Mode {
    /// The low two STAT bits.
    pub fn stat_bits(self) -> u8 {
        match self {
            Mode::HBlank => 0,
            Mode::VBlank => 1,
            Mode::OamSearch => 2,
            Mode::LcdTransfer => 3,
        }
    }
}
