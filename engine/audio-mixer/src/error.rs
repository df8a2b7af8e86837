//! Error types for the audio mixer

use thiserror::Error;

use crate::format::SampleFormat;
use crate::source::SourceId;

/// Result type alias for mixer operations
pub type Result<T> = std::result::Result<T, MixerError>;

/// Errors that can occur while creating or mixing audio sources
#[derive(Error, Debug)]
pub enum MixerError {
    #[error("Unsupported sample format: {bit_depth}-bit, {channels} channel(s), {sample_rate} Hz")]
    UnsupportedFormat { bit_depth: u16, channels: u16, sample_rate: u32 },

    #[error("Buffer format {found:?} does not match queue format {expected:?}")]
    FormatMismatch { expected: SampleFormat, found: SampleFormat },

    #[error("Buffer of {len} bytes is not a whole number of {frame_size}-byte frames")]
    MisalignedBuffer { len: usize, frame_size: usize },

    #[error("Audio source {0} does not exist")]
    UnknownSource(SourceId),

    #[error("Reference sink error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
