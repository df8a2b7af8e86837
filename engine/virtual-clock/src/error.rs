//! Error types for VirtualClock

use thiserror::Error;

use crate::hook::HookError;

/// Result type alias for clock operations
pub type Result<T> = std::result::Result<T, ClockError>;

/// Errors that can occur in the VirtualClock
#[derive(Error, Debug)]
pub enum ClockError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read or write configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Synthetic rendezvous failed: {0}")]
    Rendezvous(#[source] HookError),
}

impl ClockError {
    pub fn config(msg: impl Into<String>) -> Self {
        ClockError::Config(msg.into())
    }
}
