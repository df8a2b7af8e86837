//! Real and logical frame rate measurement

use serde::{Deserialize, Serialize};
use virtual_time::VirtualTime;

/// One measurement over the last window
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FpsSample {
    /// Drawn frames per real second
    pub fps: f32,
    /// Drawn frames per virtual second
    pub logical_fps: f32,
}

/// Counts drawn frames and measures them every `window` rendezvous.
#[derive(Debug)]
pub struct FpsCounter {
    window: u64,
    rendezvous: u64,
    drawn_frames: u64,
    last_drawn_frames: u64,
    last_time: VirtualTime,
    last_ticks: VirtualTime,
}

fn per_second(frames: u64, elapsed: VirtualTime) -> f32 {
    let nanos = elapsed.as_nanos();
    if nanos <= 0 {
        return 0.0;
    }
    (frames as f64 * 1e9 / nanos as f64) as f32
}

impl FpsCounter {
    pub fn new(window: u64, real_now: VirtualTime, ticks_now: VirtualTime) -> Self {
        Self {
            window: window.max(1),
            rendezvous: 0,
            drawn_frames: 0,
            last_drawn_frames: 0,
            last_time: real_now,
            last_ticks: ticks_now,
        }
    }

    /// Count one rendezvous. Every `window`-th call returns a sample.
    pub fn record(&mut self, drawing: bool, real_now: VirtualTime, ticks_now: VirtualTime) -> Option<FpsSample> {
        if drawing {
            self.drawn_frames += 1;
        }
        self.rendezvous += 1;
        if self.rendezvous < self.window {
            return None;
        }
        self.rendezvous = 0;

        let frames = self.drawn_frames - self.last_drawn_frames;
        let sample = FpsSample {
            fps: per_second(frames, real_now - self.last_time),
            logical_fps: per_second(frames, ticks_now - self.last_ticks),
        };
        self.last_time = real_now;
        self.last_ticks = ticks_now;
        self.last_drawn_frames = self.drawn_frames;
        Some(sample)
    }
}
