//! Cartridge ROM/RAM access, dispatched through whichever [`MbcModel`] the
//! header declares.
pub mod header;
mod mbc;
mod rtc;

use crate::error::LoadError;
use header::CartridgeHeader;
use mbc::MbcModel;

pub struct Cartridge {
    header: CartridgeHeader,
    rom: Vec<u8>,
    ram: Vec<u8>,
    rom_banks: u16,
    model: MbcModel,
    has_battery: bool,
    dirty: bool,
}

impl Cartridge {
    pub fn new(rom: Vec<u8>, save_data: Option<Vec<u8>>) -> Result<Self, LoadError> {
        let header = CartridgeHeader::parse(&rom)?;
        let rom_banks = header::rom_bank_count(header.rom_size)?;
        let expected_rom_len = rom_banks as usize * mbc::ROM_BANK_SIZE;
        if rom.len() < expected_rom_len {
            return Err(LoadError::RomTooSmall { expected_banks: rom_banks, declared_size: rom.len() });
        }

        let (mut model, has_battery) = MbcModel::for_cartridge_type(header.cartridge_type)?;
        // MBC2 has 512x4-bit RAM built into the controller; the header's RAM
        // size byte doesn't describe it.
        let ram_len = if matches!(model, MbcModel::Mbc2 { .. }) { 512 } else { header::ram_byte_size(header.ram_size)? };

        let ram = match save_data {
            Some(save) => {
                if let MbcModel::Mbc3 { rtc, .. } = &mut model {
                    if save.len() < ram_len + 22 {
                        return Err(LoadError::SaveFileTooSmall { expected: ram_len + 22, actual: save.len() });
                    }
                    let mut rtc_bytes = [0u8; 22];
                    rtc_bytes.copy_from_slice(&save[ram_len..ram_len + 22]);
                    *rtc = rtc::Rtc::load(&rtc_bytes);
                } else if save.len() < ram_len {
                    return Err(LoadError::SaveFileTooSmall { expected: ram_len, actual: save.len() });
                }
                save[..ram_len].to_vec()
            }
            None => vec![0u8; ram_len],
        };

        Ok(Cartridge { header, rom, ram, rom_banks, model, has_battery, dirty: false })
    }

    pub fn title(&self) -> &str {
        &self.header.title
    }

    pub fn is_cgb(&self) -> bool {
        self.header.cgb_flag
    }

    pub fn read_rom(&self, address: u16) -> u8 {
        let offset = self.model.rom_offset(address, self.rom_banks);
        self.rom.get(offset).copied().unwrap_or(0xFF)
    }

    pub fn write_control(&mut self, address: u16, value: u8) {
        self.model.write_control(address, value);
    }

    pub fn read_ram(&self, address: u16) -> u8 {
        if !self.model.has_ram_access() || self.ram.is_empty() {
            return 0xFF;
        }
        if self.model.ram_bank_is_rtc_register() {
            return self.model.read_rtc();
        }
        // Undersized RAM (the 2KiB configuration) is mirrored across its
        // 8KiB window.
        let offset = self.model.ram_offset(address) % self.ram.len();
        if matches!(self.model, MbcModel::Mbc2 { .. }) {
            // The built-in 512x4-bit RAM only drives the low nibble.
            0xF0 | self.ram[offset]
        } else {
            self.ram[offset]
        }
    }

    pub fn write_ram(&mut self, address: u16, value: u8) {
        if !self.model.has_ram_access() || self.ram.is_empty() {
            return;
        }
        if self.model.ram_bank_is_rtc_register() {
            self.model.write_rtc(value);
            self.dirty |= self.has_battery;
            return;
        }
        let offset = self.model.ram_offset(address) % self.ram.len();
        self.ram[offset] = if matches!(self.model, MbcModel::Mbc2 { .. }) { value & 0x0F } else { value };
        self.dirty |= self.has_battery;
    }

    pub fn has_battery(&self) -> bool {
        self.has_battery
    }

    /// Returns the blob to persist to disk if the battery-backed state has
    /// changed since the last call, clearing the dirty flag. `None` for
    /// battery-less cartridges or when nothing has changed.
    pub fn take_dirty_save(&mut self) -> Option<Vec<u8>> {
        if !self.has_battery || !self.dirty {
            return None;
        }
        self.dirty = false;
        self.save_blob()
    }

    /// The full battery-backed image (RAM, then the RTC dump when present),
    /// regardless of the dirty flag. Used for the shutdown flush.
    pub fn save_blob(&self) -> Option<Vec<u8>> {
        if !self.has_battery {
            return None;
        }

        let mut blob = self.ram.clone();
        if let MbcModel::Mbc3 { rtc, .. } = &self.model {
            blob.extend_from_slice(&rtc.dump());
        }
        Some(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_rom(cartridge_type: u8, rom_size_code: u8, ram_size_code: u8) -> Vec<u8> {
        let banks = header::rom_bank_count(rom_size_code).unwrap();
        let mut rom = vec![0u8; banks as usize * mbc::ROM_BANK_SIZE];
        rom[0x147] = cartridge_type;
        rom[0x148] = rom_size_code;
        rom[0x149] = ram_size_code;
        rom
    }

    #[test]
    fn simple_cartridge_reads_rom_directly() {
        let mut rom = blank_rom(0x00, 0x00, 0x00);
        rom[0x1234] = 0x42;
        let cart = Cartridge::new(rom, None).unwrap();

        assert_eq!(cart.read_rom(0x1234), 0x42);
    }

    #[test]
    fn mbc1_switches_rom_bank_on_control_write() {
        let mut rom = blank_rom(0x01, 0x01, 0x00);
        rom[0x4000] = 0xAB; // bank 1, offset 0 of the switchable window
        let mut cart = Cartridge::new(rom, None).unwrap();

        assert_eq!(cart.read_rom(0x4000), 0xAB);
        cart.write_control(0x2000, 1);
        assert_eq!(cart.read_rom(0x4000), 0xAB);
    }

    #[test]
    fn mbc1_zero_select_rewrites_to_bank_one_modulo_bank_count() {
        let mut rom = blank_rom(0x01, 0x04, 0x00); // 32 banks
        rom[0x4000] = 0x11; // marker at the start of bank 1
        let mut cart = Cartridge::new(rom, None).unwrap();

        // Selecting "bank 0x20": low five bits are zero (rewritten to 1),
        // the upper-bits window contributes 0x20, and 0x21 mod 32 = 1.
        cart.write_control(0x2000, 0x00);
        cart.write_control(0x4000, 0x01);

        assert_eq!(cart.read_rom(0x4000), 0x11);
    }

    #[test]
    fn ram_disabled_by_default_reads_high() {
        let rom = blank_rom(0x03, 0x00, 0x02);
        let cart = Cartridge::new(rom, None).unwrap();

        assert_eq!(cart.read_ram(0xA000), 0xFF);
    }

    #[test]
    fn dirty_save_round_trips_through_new() {
        let rom = blank_rom(0x03, 0x00, 0x02);
        let mut cart = Cartridge::new(rom.clone(), None).unwrap();
        cart.write_control(0x0000, 0x0A);
        cart.write_ram(0xA000, 0x7F);

        let saved = cart.take_dirty_save().expect("battery-backed cartridge should be dirty");
        assert!(cart.take_dirty_save().is_none());

        let mut reloaded = Cartridge::new(rom, Some(saved)).unwrap();
        reloaded.write_control(0x0000, 0x0A);
        assert_eq!(reloaded.read_ram(0xA000), 0x7F);
    }
}
