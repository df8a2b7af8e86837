//! Configuration for VirtualClock

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use virtual_time::VirtualTime;

use crate::error::{ClockError, Result};
use crate::kinds::TimeCallKind;
use crate::{
    DEFAULT_CALL_KIND_LIMIT, DEFAULT_FORCED_ADVANCE_QUANTUM_NS, DEFAULT_FRAMERATE,
    DEFAULT_MAX_DEFERRED_FRAMES, DEFAULT_NON_OWNER_CALL_THRESHOLD,
};

/// Configuration for the VirtualClock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Frames per second; 0 hands every call to the fallback timer
    pub framerate: u32,

    /// Skip frame pacing sleeps and scheduler yields
    pub fast_forward: bool,

    /// Tracked calls of one kind allowed per frame before a forced advance
    pub call_kind_limit: u32,

    /// Tracked calls from non-owner threads per frame before the caller is
    /// treated as the frame owner
    pub non_owner_call_threshold: u32,

    /// Size of one forced advance in nanoseconds
    pub forced_advance_quantum_ns: u64,

    /// Deferred delay bound, in frame increments
    pub max_deferred_frames: u32,

    /// Count forced-advanced ticks as already taken when topping up at the
    /// next frame boundary
    pub count_forced_ticks_as_taken: bool,

    /// Per-kind replacements for `call_kind_limit`
    pub call_kind_limits: BTreeMap<TimeCallKind, u32>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            framerate: DEFAULT_FRAMERATE,
            fast_forward: false,
            call_kind_limit: DEFAULT_CALL_KIND_LIMIT,
            non_owner_call_threshold: DEFAULT_NON_OWNER_CALL_THRESHOLD,
            forced_advance_quantum_ns: DEFAULT_FORCED_ADVANCE_QUANTUM_NS,
            max_deferred_frames: DEFAULT_MAX_DEFERRED_FRAMES,
            count_forced_ticks_as_taken: false,
            call_kind_limits: BTreeMap::new(),
        }
    }
}

impl ClockConfig {
    /// Limit for one tracked call kind
    pub fn limit_for(&self, kind: TimeCallKind) -> u32 {
        self.call_kind_limits.get(&kind).copied().unwrap_or(self.call_kind_limit)
    }

    /// Limits for every tracked kind, in counter order
    pub fn limits(&self) -> [u32; TimeCallKind::TRACKED] {
        TimeCallKind::ALL_TRACKED.map(|kind| self.limit_for(kind))
    }

    /// Get the forced advance quantum as VirtualTime
    pub fn forced_advance_quantum(&self) -> VirtualTime {
        VirtualTime::from_nanos(self.forced_advance_quantum_ns as i128)
    }

    /// Whether the deterministic path is enabled
    pub fn is_deterministic(&self) -> bool {
        self.framerate > 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.framerate > 1_000_000_000 {
            return Err(ClockError::config(format!(
                "framerate {} exceeds one frame per nanosecond",
                self.framerate
            )));
        }
        if self.call_kind_limit == 0 {
            return Err(ClockError::config("call_kind_limit must be positive"));
        }
        if let Some((kind, _)) = self.call_kind_limits.iter().find(|(_, &limit)| limit == 0) {
            return Err(ClockError::config(format!("call limit for {:?} must be positive", kind)));
        }
        if self.call_kind_limits.contains_key(&TimeCallKind::Untracked) {
            return Err(ClockError::config("untracked calls cannot carry a limit"));
        }
        if self.non_owner_call_threshold == 0 {
            return Err(ClockError::config("non_owner_call_threshold must be positive"));
        }
        if self.forced_advance_quantum_ns == 0 {
            return Err(ClockError::config("forced_advance_quantum_ns must be positive"));
        }
        if self.max_deferred_frames == 0 {
            return Err(ClockError::config("max_deferred_frames must be positive"));
        }
        Ok(())
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClockConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
