//! # FrameScheduler
//!
//! The single synchronization point executed once per logical frame.
//!
//! Each rendezvous enters the virtual clock's frame boundary (which also
//! mixes audio), hands the frame to the capture collaborator, exchanges
//! commands with the controller until it signals the end of the frame,
//! turns the new input snapshot into edge-triggered events, and exits the
//! clock's frame boundary. Rendezvous never overlap.

pub mod channel;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod events;
pub mod fps;
pub mod inputs;
pub mod messages;
pub mod scheduler;

#[cfg(test)]
mod tests;

pub use channel::{ChannelController, ControllerChannel, ControllerEndpoint, StreamChannel};
pub use collaborators::{CaptureError, FrameCapture, LogTitleDisplay, TitleDisplay};
pub use config::SchedulerConfig;
pub use error::{ProtocolError, Result, SchedulerError};
pub use events::{EventQueue, EventSink, InputEvent, InputTracker, NullEventSink, TimedEvent};
pub use fps::{FpsCounter, FpsSample};
pub use inputs::{InputSnapshot, KeySym, PointerState};
pub use messages::{ControllerMessage, MessageTag, RuntimeFlags};
pub use scheduler::{FrameReport, FrameScheduler};
