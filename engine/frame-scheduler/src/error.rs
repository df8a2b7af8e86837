//! Error types for FrameScheduler

use std::io;

use thiserror::Error;

/// Result type alias for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors on the controller channel
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Controller I/O error: {0}")]
    Io(io::Error),

    #[error("Controller disconnected")]
    Disconnected,

    #[error("Unknown message tag {0:#x}")]
    UnknownTag(u32),

    #[error("Expected message tag {expected:#x}, got {found:#x}")]
    UnexpectedTag { expected: u32, found: u32 },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<io::Error> for ProtocolError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => ProtocolError::Disconnected,
            _ => ProtocolError::Io(e),
        }
    }
}

/// Errors that can occur in the FrameScheduler
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(String),
}
