//! Outside parties the scheduler reports to each frame

use virtual_time::FrameIndex;

use crate::fps::FpsSample;

/// Error produced by a capture collaborator
pub type CaptureError = Box<dyn std::error::Error + Send + Sync>;

/// Receives every frame's mixed audio for encoding or dumping.
pub trait FrameCapture: Send {
    fn capture_frame(&mut self, frame: FrameIndex, audio: &[u8]) -> Result<(), CaptureError>;

    /// Called once when capture stops for good.
    fn close(&mut self) {}
}

/// Shows the periodic frame rate measurements.
pub trait TitleDisplay: Send {
    fn update_fps(&mut self, sample: FpsSample);
}

/// Writes FPS samples to the log
#[derive(Debug, Default)]
pub struct LogTitleDisplay;

impl TitleDisplay for LogTitleDisplay {
    fn update_fps(&mut self, sample: FpsSample) {
        tracing::info!("fps: {:.1} lfps: {:.1}", sample.fps, sample.logical_fps);
    }
}
