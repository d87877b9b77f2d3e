//! Typed error values the core surfaces instead of panicking on end-user or
//! cartridge-author mistakes. Hardware anomalies that are themselves part of
//! normal operation (unmapped reads, negative scheduler drift) are logged
//! rather than modeled here.
use std::fmt;

#[derive(Debug)]
pub enum EmulatorError {
    Load(LoadError),
    CpuFault(CpuFault),
}

impl fmt::Display for EmulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmulatorError::Load(e) => write!(f, "{}", e),
            EmulatorError::CpuFault(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EmulatorError {}

impl From<LoadError> for EmulatorError {
    fn from(e: LoadError) -> Self {
        EmulatorError::Load(e)
    }
}

impl From<CpuFault> for EmulatorError {
    fn from(e: CpuFault) -> Self {
        EmulatorError::CpuFault(e)
    }
}

/// Failures that can occur while parsing a ROM image or an accompanying save
/// file, before the emulator aggregate exists.
#[derive(Debug)]
pub enum LoadError {
    RomTooSmall { expected_banks: u16, declared_size: usize },
    UnknownMbcType(u8),
    UnknownRomSizeCode(u8),
    UnknownRamSizeCode(u8),
    SaveFileTooSmall { expected: usize, actual: usize },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::RomTooSmall { expected_banks, declared_size } => write!(
                f,
                "ROM file ({} bytes) is too small to hold the declared {} banks",
                declared_size, expected_banks
            ),
            LoadError::UnknownMbcType(byte) => write!(f, "unrecognised cartridge MBC type byte: {:#04X}", byte),
            LoadError::UnknownRomSizeCode(byte) => write!(f, "unrecognised ROM size code: {:#04X}", byte),
            LoadError::UnknownRamSizeCode(byte) => write!(f, "unrecognised RAM size code: {:#04X}", byte),
            LoadError::SaveFileTooSmall { expected, actual } => write!(
                f,
                "save file is too small: expected at least {} bytes, found {}",
                expected, actual
            ),
        }
    }
}

impl std::error::Error for LoadError {}

/// Raised by the CPU interpreter instead of terminating the process. `Stop`
/// is raised by the `STOP` instruction; `UndefinedOpcode` by any of the
/// handful of bytes with no defined behaviour on this CPU.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CpuFault {
    Stop,
    UndefinedOpcode(u8),
}

impl fmt::Display for CpuFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuFault::Stop => write!(f, "CPU executed STOP"),
            CpuFault::UndefinedOpcode(op) => write!(f, "CPU encountered undefined opcode {:#04X}", op),
        }
    }
}

impl std::error::Error for CpuFault {}
