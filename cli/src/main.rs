//! Thin host binary: loads a cartridge image and its save file, then runs
//! the core in frame-sized batches paced against the wall clock, flushing
//! battery-backed saves as the core requests.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use gumdrop::Options;
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use pocketemu_core::emulator::{Emulator, CPU_FREQUENCY_HZ, CYCLES_PER_FRAME};
use pocketemu_core::{EmulatorError, EmulatorOptionsBuilder};

use crate::frontend::{AudioPump, HeadlessUi};
use crate::options::AppOptions;

mod frontend;
mod options;

fn main() {
    let options: AppOptions = AppOptions::parse_args_default_or_exit();

    let level = if options.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto);

    if let Err(error) = run(&options) {
        eprintln!("error: {:#}", error);
        std::process::exit(1);
    }
}

fn run(options: &AppOptions) -> Result<()> {
    let rom_path = Path::new(&options.rom_path);
    let rom = fs::read(rom_path).with_context(|| format!("could not read ROM {}", rom_path.display()))?;

    let save_path = save_path_for(rom_path);
    let saved_ram = match fs::read(&save_path) {
        Ok(data) => {
            log::info!("loaded save file {}", save_path.display());
            Some(data)
        }
        Err(_) => None,
    };

    let emulator_options = EmulatorOptionsBuilder::new().save_data(saved_ram).build();
    let (mut emulator, audio_consumer) =
        Emulator::new(rom, emulator_options, HeadlessUi::new()).map_err(anyhow::Error::new)?;
    log::info!("running \"{}\" in {:?} mode", emulator.title(), emulator.mode());

    let audio_pump = AudioPump::start(audio_consumer);
    let result = main_loop(&mut emulator, &save_path);

    // Flush battery-backed state regardless of how the loop ended, unless
    // the failure happened before anything could have been written.
    let (_ui, final_save) = emulator.shutdown();
    if let Some(blob) = final_save {
        write_save(&save_path, &blob)?;
    }
    audio_pump.stop();

    result
}

fn main_loop(emulator: &mut Emulator<HeadlessUi>, save_path: &Path) -> Result<()> {
    let frame_duration =
        Duration::from_nanos(1_000_000_000u64 * CYCLES_PER_FRAME as u64 / CPU_FREQUENCY_HZ as u64);
    let mut next_frame = Instant::now() + frame_duration;

    loop {
        match emulator.run_frame() {
            Ok(()) => {}
            Err(EmulatorError::CpuFault(fault)) => {
                return Err(anyhow::Error::new(fault)).context("emulation stopped");
            }
            Err(other) => return Err(anyhow::Error::new(other)),
        }

        if let Some(blob) = emulator.take_dirty_save() {
            write_save(save_path, &blob)?;
        }

        if emulator.quit_requested() {
            return Ok(());
        }

        let now = Instant::now();
        if next_frame > now {
            std::thread::sleep(next_frame - now);
        }
        next_frame += frame_duration;
    }
}

/// `<rom-path>` with its extension (if any) replaced by `.sav`.
fn save_path_for(rom_path: &Path) -> PathBuf {
    rom_path.with_extension("sav")
}

fn write_save(path: &Path, blob: &[u8]) -> Result<()> {
    fs::write(path, blob).with_context(|| format!("could not write save file {}", path.display()))?;
    log::debug!("flushed {} bytes of save data", blob.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_path_replaces_the_rom_extension() {
        assert_eq!(save_path_for(Path::new("games/tetris.gb")), PathBuf::from("games/tetris.sav"));
        assert_eq!(save_path_for(Path::new("tetris")), PathBuf::from("tetris.sav"));
    }
}
