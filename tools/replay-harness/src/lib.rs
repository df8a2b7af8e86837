//! # Replay harness
//!
//! Runs a scripted input movie through the whole stack: an emulated game
//! loop queries time and sleeps on the virtual clock, an in-process
//! controller answers every rendezvous with the movie's input, and the
//! mixed audio is digested (and optionally written to a WAV file). Two
//! runs of the same movie with the same configuration print the same
//! digest.

pub mod capture;
pub mod config;
pub mod logging;
pub mod movie;
pub mod replay;

pub use capture::{AudioCapture, CaptureHandle};
pub use config::{HarnessConfig, LoggingConfig, ReplaySettings};
pub use logging::initialize_logging;
pub use movie::{Movie, MovieFrame};
pub use replay::{run_replay, ReplaySummary};
