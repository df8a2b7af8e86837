//! Audio capture: digest of every frame's mix plus an optional WAV dump

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use audio_mixer::{ReferenceSink, SampleFormat, WavSink};
use frame_scheduler::{CaptureError, FrameCapture};
use parking_lot::Mutex;
use virtual_time::FrameIndex;
use xxhash_rust::xxh3::Xxh3;

struct CaptureTotals {
    hasher: Xxh3,
    frames: u64,
    bytes: u64,
}

/// Read side of an [`AudioCapture`], valid after the capture is dropped.
#[derive(Clone)]
pub struct CaptureHandle {
    totals: Arc<Mutex<CaptureTotals>>,
    wav_path: Option<PathBuf>,
}

impl CaptureHandle {
    /// xxh3 of all captured audio, in capture order
    pub fn digest(&self) -> u64 {
        self.totals.lock().hasher.digest()
    }

    pub fn frames(&self) -> u64 {
        self.totals.lock().frames
    }

    pub fn bytes(&self) -> u64 {
        self.totals.lock().bytes
    }

    pub fn wav_path(&self) -> Option<&Path> {
        self.wav_path.as_deref()
    }
}

pub struct AudioCapture {
    totals: Arc<Mutex<CaptureTotals>>,
    wav: Option<WavSink>,
}

impl AudioCapture {
    /// Create a capture; with `wav_dir` set, the mix is also written there.
    pub fn new(format: SampleFormat, wav_dir: Option<&Path>) -> Result<(Self, CaptureHandle)> {
        let wav = wav_dir.map(|dir| WavSink::create(dir, format)).transpose()?;
        let wav_path = wav.as_ref().map(|sink| sink.path().to_path_buf());
        if let Some(path) = &wav_path {
            tracing::info!(path = %path.display(), "Writing mixed audio");
        }

        let totals =
            Arc::new(Mutex::new(CaptureTotals { hasher: Xxh3::new(), frames: 0, bytes: 0 }));
        let handle = CaptureHandle { totals: totals.clone(), wav_path };
        Ok((Self { totals, wav }, handle))
    }
}

impl FrameCapture for AudioCapture {
    fn capture_frame(&mut self, frame: FrameIndex, audio: &[u8]) -> Result<(), CaptureError> {
        {
            let mut totals = self.totals.lock();
            totals.hasher.update(audio);
            totals.frames += 1;
            totals.bytes += audio.len() as u64;
        }
        if let Some(wav) = self.wav.as_mut() {
            wav.write_samples(audio)?;
        }
        tracing::trace!(frame, bytes = audio.len(), "Captured frame audio");
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut wav) = self.wav.take() {
            match wav.finalize() {
                Ok(()) => tracing::info!(path = %wav.path().display(), "Finalized mixed audio"),
                Err(e) => tracing::warn!("Failed to finalize mixed audio: {}", e),
            }
        }
    }
}
