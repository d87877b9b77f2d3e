//! The headless front end: a [`GameboyUi`] implementation that keeps the
//! most recent frame in memory (for tests, benchmarks, or a future window
//! to pick up) and an audio pump that keeps the core's sample hand-off
//! drained so emulation never stalls on a missing sound device.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use pocketemu_core::{AudioConsumer, DmgColor, GameboyUi, GamepadHandle, RESOLUTION_HEIGHT, RESOLUTION_WIDTH};

/// Four-gradation index of a monochrome pixel, or a 15-bit RGB word on the
/// Color variant, widened to one u16 per pixel either way.
pub struct HeadlessUi {
    pub framebuffer: Vec<u16>,
    pub frames_presented: u64,
}

impl HeadlessUi {
    pub fn new() -> Self {
        HeadlessUi {
            framebuffer: vec![0; RESOLUTION_WIDTH * RESOLUTION_HEIGHT],
            frames_presented: 0,
        }
    }
}

impl GameboyUi for HeadlessUi {
    fn draw_line_dmg(&mut self, ly: u8, line: &[DmgColor; RESOLUTION_WIDTH]) {
        let row = &mut self.framebuffer[ly as usize * RESOLUTION_WIDTH..][..RESOLUTION_WIDTH];
        for (slot, color) in row.iter_mut().zip(line.iter()) {
            *slot = *color as u16;
        }
    }

    fn draw_line_gbc(&mut self, ly: u8, line: &[u16; RESOLUTION_WIDTH]) {
        let row = &mut self.framebuffer[ly as usize * RESOLUTION_WIDTH..][..RESOLUTION_WIDTH];
        row.copy_from_slice(line);
    }

    fn flip(&mut self) {
        self.frames_presented += 1;
    }

    fn refresh_gamepad(&mut self, _gamepad: &mut GamepadHandle<'_>) {
        // No input source without a window; ctrl-c handling lives in main.
    }

    fn destroy(&mut self) {
        log::info!("presented {} frames", self.frames_presented);
    }
}

/// Drains filled sample buffers and immediately recycles them. Without a
/// real audio sink this is pure back-pressure relief: the core blocks on the
/// hand-off once both buffers are filled, so somebody must keep consuming.
pub struct AudioPump {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AudioPump {
    pub fn start(consumer: AudioConsumer) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                match consumer.ready.recv_timeout(std::time::Duration::from_millis(50)) {
                    Ok(buffer) => {
                        // Hand the buffer straight back to the producer pool.
                        let _ = consumer.free.send(buffer);
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        AudioPump { stop, handle: Some(handle) }
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
