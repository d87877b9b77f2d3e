use criterion::{criterion_group, criterion_main, Criterion};
use criterion_cycles_per_byte::CyclesPerByte;

use pocketemu_core::emulator::Emulator;
use pocketemu_core::{DmgColor, EmulatorOptionsBuilder, GameboyUi, GamepadHandle, RESOLUTION_WIDTH};

struct BenchUi;

impl GameboyUi for BenchUi {
    fn draw_line_dmg(&mut self, _ly: u8, _line: &[DmgColor; RESOLUTION_WIDTH]) {}
    fn draw_line_gbc(&mut self, _ly: u8, _line: &[u16; RESOLUTION_WIDTH]) {}
    fn flip(&mut self) {}
    fn refresh_gamepad(&mut self, _gamepad: &mut GamepadHandle<'_>) {}
    fn destroy(&mut self) {}
}

/// A Simple-mapper image whose instruction stream is an endless run of NOPs
/// with an occasional busy loop, enough to exercise the fetch/dispatch path
/// and the PPU/APU catch-up machinery without external ROM files.
fn synthetic_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    // Entry point jumps to a page of NOPs, which ends by jumping back.
    rom[0x100] = 0xC3;
    rom[0x101] = 0x50;
    rom[0x102] = 0x01;
    rom[0x250] = 0xC3;
    rom[0x251] = 0x50;
    rom[0x252] = 0x01;
    rom
}

fn frame_benchmark(c: &mut Criterion<CyclesPerByte>) {
    let options = EmulatorOptionsBuilder::new().build();
    let (mut emulator, consumer) = Emulator::new(synthetic_rom(), options, BenchUi).unwrap();

    // Keep the audio hand-off drained so the producer never blocks.
    std::thread::spawn(move || {
        while let Ok(buffer) = consumer.ready.recv() {
            let _ = consumer.free.send(buffer);
        }
    });

    c.bench_function("run one frame", |b| b.iter(|| emulator.run_frame().unwrap()));
}

criterion_group!(
    name = benches;
    config = Criterion::default().with_measurement(CyclesPerByte);
    targets = frame_benchmark
);
criterion_main!(benches);
