//! Replay harness entry point

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use replay_harness::{initialize_logging, run_replay, HarnessConfig, Movie, ReplaySummary};

#[derive(Parser)]
#[command(name = "replay-harness")]
#[command(about = "Replay an input movie on the virtual clock and print a determinism digest")]
#[command(version)]
struct Cli {
    /// Harness configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input movie (TOML), overrides the configured one
    #[arg(short, long)]
    movie: Option<PathBuf>,

    /// Drawing frames to run
    #[arg(short, long)]
    frames: Option<u64>,

    /// Frames per virtual second (0 disables time virtualization)
    #[arg(long)]
    framerate: Option<u32>,

    /// Do not pace frames against real time
    #[arg(long)]
    fast_forward: bool,

    /// Directory for the mixed WAV
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Skip writing the mixed WAV
    #[arg(long)]
    no_wav: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (json, pretty, compact)
    #[arg(long)]
    log_format: Option<String>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(movie) = &self.movie {
            config.replay.movie = Some(movie.clone());
        }
        if let Some(frames) = self.frames {
            config.replay.frames = frames;
        }
        if let Some(framerate) = self.framerate {
            config.clock.framerate = framerate;
        }
        if self.fast_forward {
            config.clock.fast_forward = true;
        }
        if let Some(dir) = &self.output_dir {
            config.replay.output_dir = dir.clone();
        }
        if self.no_wav {
            config.replay.write_wav = false;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
    }
}

fn summary_lines(summary: &ReplaySummary) -> Vec<String> {
    let mut rows = vec![
        ("frames:", summary.frames.to_string()),
        ("rendezvous:", summary.rendezvous.to_string()),
        ("virtual time:", summary.final_time.to_string()),
        ("input events:", summary.input_events.to_string()),
        ("audio bytes:", summary.audio_bytes.to_string()),
        ("audio digest:", summary.audio_digest.clone()),
    ];
    if let Some(path) = &summary.wav_path {
        rows.push(("wav:", path.clone()));
    }
    rows.push(("forced adv.:", summary.metrics.forced_advances.to_string()));
    rows.push(("pacing sleep:", format!("{} ns", summary.metrics.total_pacing_sleep_ns)));
    rows.into_iter().map(|(label, value)| format!("{:<15} {}", label, value)).collect()
}

fn print_summary(summary: &ReplaySummary) {
    for line in summary_lines(summary) {
        println!("{}", line);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    initialize_logging(&config.logging)?;
    info!("Starting replay harness v{}", env!("CARGO_PKG_VERSION"));

    let movie = match &config.replay.movie {
        Some(path) => Movie::from_file(path)?,
        None => {
            info!("No movie given, replaying without input");
            Movie::default()
        }
    };

    let summary = run_replay(&config, &movie).context("Replay failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}
