//! Harness configuration management

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use audio_mixer::MixerConfig;
use frame_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use virtual_clock::ClockConfig;

/// Main harness configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// VirtualClock configuration
    pub clock: ClockConfig,

    /// AudioContext configuration
    pub mixer: MixerConfig,

    /// FrameScheduler configuration
    pub scheduler: SchedulerConfig,

    /// What to replay and where to put the results
    pub replay: ReplaySettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Replay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Input movie (None replays with no input at all)
    pub movie: Option<PathBuf>,

    /// Drawing frames to run
    pub frames: u64,

    /// Directory for the mixed WAV
    pub output_dir: PathBuf,

    /// Write every frame's mixed audio to a WAV file
    pub write_wav: bool,

    /// Time queries the emulated game makes per frame
    pub queries_per_frame: u32,

    /// Sleep the emulated game requests per frame, in microseconds
    pub delay_per_frame_us: u64,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            movie: None,
            frames: 600,
            output_dir: PathBuf::from("replay-out"),
            write_wav: true,
            queries_per_frame: 8,
            delay_per_frame_us: 4_000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.clock.validate().context("Invalid clock configuration")?;
        self.mixer.output_format.validate().context("Invalid mixer output format")?;
        self.scheduler.validate().context("Invalid scheduler configuration")?;
        if self.replay.frames == 0 {
            anyhow::bail!("replay.frames must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.toml");
        std::fs::write(
            &path,
            r#"
[clock]
framerate = 30
fast_forward = true

[replay]
frames = 90
write_wav = false

[mixer.output_format]
bit_depth = 16
channels = 1
sample_rate = 22050
"#,
        )
        .unwrap();

        let config = HarnessConfig::from_file(&path).unwrap();
        assert_eq!(config.clock.framerate, 30);
        assert!(config.clock.fast_forward);
        assert_eq!(config.clock.max_deferred_frames, 6);
        assert_eq!(config.replay.frames, 90);
        assert_eq!(config.replay.queries_per_frame, 8);
        assert_eq!(config.mixer.output_format.sample_rate, 22_050);
        assert_eq!(config.mixer.master_volume, 1.0);
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.toml");
        let mut config = HarnessConfig::default();
        config.replay.movie = Some(PathBuf::from("movies/intro.toml"));
        config.scheduler.num_controllers = 2;
        config.to_file(&path).unwrap();

        assert_eq!(HarnessConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.toml");
        std::fs::write(&path, "[replay]\nframes = 0\n").unwrap();
        assert!(HarnessConfig::from_file(&path).is_err());

        std::fs::write(&path, "[scheduler]\nnum_controllers = 9\n").unwrap();
        let err = HarnessConfig::from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("controllers"));

        assert!(HarnessConfig::from_file(dir.path().join("missing.toml")).is_err());
    }
}
