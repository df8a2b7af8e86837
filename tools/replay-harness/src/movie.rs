//! Scripted input movies
//!
//! A movie is a TOML list of input frames. Each entry holds for `hold`
//! rendezvous; rendezvous past the end of the movie see no input.
//!
//! ```toml
//! [[frames]]
//! hold = 30
//!
//! [[frames]]
//! keys = [97, 32]
//! pointer = { x = 120, y = 80, buttons = 1 }
//! controller_buttons = [5]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use frame_scheduler::inputs::{CONTROLLER_AXES, MAX_CONTROLLERS};
use frame_scheduler::{InputSnapshot, KeySym, PointerState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieFrame {
    /// Rendezvous this input is held for
    pub hold: u32,
    pub keys: Vec<KeySym>,
    pub pointer: PointerState,
    /// Button mask per controller
    pub controller_buttons: Vec<u16>,
    pub controller_axes: Vec<[i16; CONTROLLER_AXES]>,
}

impl Default for MovieFrame {
    fn default() -> Self {
        Self {
            hold: 1,
            keys: Vec::new(),
            pointer: PointerState::default(),
            controller_buttons: Vec::new(),
            controller_axes: Vec::new(),
        }
    }
}

impl MovieFrame {
    pub fn to_snapshot(&self) -> InputSnapshot {
        let mut snapshot = InputSnapshot::new();
        for &key in &self.keys {
            if !snapshot.press_key(key) && !snapshot.is_key_pressed(key) {
                tracing::warn!(key, "Movie frame holds more keys than a snapshot can carry, dropping key");
            }
        }
        snapshot.pointer = self.pointer;
        for (c, &mask) in self.controller_buttons.iter().take(MAX_CONTROLLERS).enumerate() {
            snapshot.controller_buttons[c] = mask;
        }
        for (c, axes) in self.controller_axes.iter().take(MAX_CONTROLLERS).enumerate() {
            snapshot.controller_axes[c] = *axes;
        }
        snapshot
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Movie {
    pub frames: Vec<MovieFrame>,
}

impl Movie {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read movie {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse movie {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let movie: Self = toml::from_str(content)?;
        tracing::info!(entries = movie.frames.len(), length = movie.len(), "Loaded movie");
        Ok(movie)
    }

    /// Rendezvous covered by the movie
    pub fn len(&self) -> u64 {
        self.frames.iter().map(|f| f.hold as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One snapshot per rendezvous, holds expanded.
    pub fn expand(&self) -> Vec<InputSnapshot> {
        self.frames
            .iter()
            .flat_map(|frame| std::iter::repeat(frame.to_snapshot()).take(frame.hold as usize))
            .collect()
    }
}
