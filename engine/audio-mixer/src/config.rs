//! Configuration for the audio mixer

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::format::SampleFormat;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Listener gain applied on top of each source's volume
    pub master_volume: f32,

    /// Directory for per-source WAV reference sinks (None disables them)
    pub reference_sink_dir: Option<PathBuf>,

    /// Format of the shared output buffer
    pub output_format: SampleFormat,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self { master_volume: 1.0, reference_sink_dir: None, output_format: SampleFormat::default() }
    }
}
