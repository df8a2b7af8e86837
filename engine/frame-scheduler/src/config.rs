//! Configuration for FrameScheduler

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::inputs::MAX_CONTROLLERS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Rendezvous between two FPS measurements
    pub fps_window: u64,

    /// Game controllers announced to the hosted process
    pub num_controllers: u8,

    /// Hand each frame's mixed audio to the capture collaborator
    pub capture_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { fps_window: 60, num_controllers: 0, capture_enabled: false }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fps_window == 0 {
            return Err(SchedulerError::Config("fps_window must be positive".to_string()));
        }
        if self.num_controllers as usize > MAX_CONTROLLERS {
            return Err(SchedulerError::Config(format!(
                "at most {} controllers are supported, got {}",
                MAX_CONTROLLERS, self.num_controllers
            )));
        }
        Ok(())
    }
}
