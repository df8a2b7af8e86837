//! # AudioMixer
//!
//! Sample-accurate audio mixing paced by virtual time.
//!
//! Every rendezvous the frame scheduler hands the elapsed tick delta to
//! [`AudioContext::mix_all_sources`]. Each playing source advances its cursor
//! by exactly the bytes that delta covers, converts them into the output
//! format, and adds them into one shared output buffer. Output is a pure
//! function of the source state and the tick sequence, so replays stay
//! bit-identical.

pub mod buffer;
pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod format;
pub mod sink;
pub mod source;


pub use buffer::{AudioBuffer, BufferId};
pub use config::MixerConfig;
pub use context::{AudioContext, MixReport};
pub use error::{MixerError, Result};
pub use format::SampleFormat;
pub use sink::{
    MemorySink, MemorySinkFactory, NullSink, ReferenceSink, SinkFactory, WavSink, WavSinkFactory,
};
pub use source::{AudioSource, MixOutcome, SourceId, SourceKind, SourceState};
