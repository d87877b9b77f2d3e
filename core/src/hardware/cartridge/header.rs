//! Cartridge header parsing (`0x0100..=0x014F`). Only the fields the
//! emulator acts on are decoded; checksums are carried through untouched
//! since real hardware never verifies the global one either.
use crate::error::LoadError;

pub const HEADER_END: usize = 0x0150;

#[derive(Debug, Default)]
pub struct CartridgeHeader {
    /// Upper-case ASCII, up to 16 bytes on monochrome carts. Color carts
    /// reuse the tail of the field, leaving at most 11 title bytes.
    pub title: String,
    /// Byte 0x143: 0x80 (dual) or 0xC0 (Color-only) marks a Color cartridge.
    pub cgb_flag: bool,
    /// Byte 0x147: which MBC (and extra hardware) the cartridge carries.
    pub cartridge_type: u8,
    /// Byte 0x148: ROM size class, decoded through [`rom_bank_count`].
    pub rom_size: u8,
    /// Byte 0x149: external RAM size class, decoded through [`ram_byte_size`].
    pub ram_size: u8,
}

impl CartridgeHeader {
    pub fn parse(rom: &[u8]) -> Result<Self, LoadError> {
        if rom.len() < HEADER_END {
            return Err(LoadError::RomTooSmall { expected_banks: 2, declared_size: rom.len() });
        }

        let cgb_flag = matches!(rom[0x143], 0x80 | 0xC0);
        Ok(CartridgeHeader {
            title: read_title(rom, cgb_flag),
            cgb_flag,
            cartridge_type: rom[0x147],
            rom_size: rom[0x148],
            ram_size: rom[0x149],
        })
    }
}

fn read_title(rom: &[u8], cgb: bool) -> String {
    // Color carts may use up to 5 trailing title bytes for other purposes;
    // take the pessimistic 11-byte window there.
    let slice = if cgb { &rom[0x134..=0x13E] } else { &rom[0x134..=0x143] };

    slice
        .iter()
        .take_while(|&&byte| byte != 0)
        .map(|&byte| if byte.is_ascii() { byte as char } else { '?' })
        .collect()
}

/// Number of 16KiB ROM banks declared by header byte 0x148.
pub fn rom_bank_count(code: u8) -> Result<u16, LoadError> {
    match code {
        0x00..=0x08 => Ok(2u16 << code),
        0x52 => Ok(72),
        0x53 => Ok(80),
        0x54 => Ok(96),
        _ => Err(LoadError::UnknownRomSizeCode(code)),
    }
}

/// External RAM size in bytes declared by header byte 0x149.
pub fn ram_byte_size(code: u8) -> Result<usize, LoadError> {
    match code {
        0x00 => Ok(0),
        0x01 => Ok(2 * 1024),
        0x02 => Ok(8 * 1024),
        0x03 => Ok(32 * 1024),
        0x04 => Ok(128 * 1024),
        _ => Err(LoadError::UnknownRamSizeCode(code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rom_with_title(title: &[u8], cgb_flag: u8) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x134..0x134 + title.len()].copy_from_slice(title);
        rom[0x143] = cgb_flag;
        rom
    }

    #[test]
    fn title_stops_at_the_first_nul() {
        let rom = rom_with_title(b"HELLO WOR\x00\x00", 0x00);
        let header = CartridgeHeader::parse(&rom).unwrap();

        assert_eq!(header.title, "HELLO WOR");
        assert!(!header.cgb_flag);
    }

    #[test]
    fn cgb_flag_values_are_recognised() {
        for (value, expected) in [(0x80u8, true), (0xC0, true), (0x00, false)] {
            let rom = rom_with_title(b"X", value);
            assert_eq!(CartridgeHeader::parse(&rom).unwrap().cgb_flag, expected);
        }
    }

    #[test]
    fn rom_bank_count_covers_the_oddball_codes() {
        assert_eq!(rom_bank_count(0x00).unwrap(), 2);
        assert_eq!(rom_bank_count(0x08).unwrap(), 512);
        assert_eq!(rom_bank_count(0x52).unwrap(), 72);
        assert!(rom_bank_count(0x09).is_err());
    }
}
