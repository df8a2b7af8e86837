//! Drives one replay: emulated game loop, in-process controller, capture

use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use audio_mixer::{AudioContext, SampleFormat, SourceId};
use frame_scheduler::{
    ChannelController, ControllerEndpoint, EventQueue, FrameScheduler, InputEvent, InputSnapshot,
    RuntimeFlags, SchedulerConfig,
};
use serde::Serialize;
use virtual_clock::{CallerRole, ClockMetrics, TimeCallKind, VirtualClock};
use virtual_time::VirtualTime;

use crate::capture::AudioCapture;
use crate::config::HarnessConfig;
use crate::movie::Movie;

/// Result of a replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub frames: u64,
    /// Rendezvous including non-drawing ones
    pub rendezvous: u64,
    pub final_time: VirtualTime,
    /// xxh3 of all mixed audio, hex
    pub audio_digest: String,
    pub audio_bytes: u64,
    pub input_events: u64,
    pub wav_path: Option<String>,
    pub metrics: ClockMetrics,
}

const MUSIC_FORMAT: SampleFormat = SampleFormat::new(8, 1, 22_050);
const BLIP_FORMAT: SampleFormat = SampleFormat::new(16, 1, 44_100);

/// Square wave of `samples` samples with the given period.
fn square_wave(format: SampleFormat, samples: usize, period: usize, amplitude: i16) -> Vec<u8> {
    let high = |i: usize| (i % period) < period / 2;
    if format.bit_depth == 8 {
        let level = (amplitude >> 8) as u8;
        (0..samples).map(|i| if high(i) { 0x80 + level } else { 0x80 - level }).collect()
    } else {
        (0..samples)
            .flat_map(|i| {
                let sample = if high(i) { amplitude } else { -amplitude };
                sample.to_le_bytes()
            })
            .collect()
    }
}

/// The hosted game's audio: looping background music plus a blip played
/// on every key press.
struct GameAudio {
    audio: Arc<AudioContext>,
    blip: SourceId,
}

impl GameAudio {
    fn start(audio: Arc<AudioContext>) -> Result<Self> {
        let music = audio.create_source();
        for period in [100, 50] {
            let buffer =
                audio.create_buffer(MUSIC_FORMAT, square_wave(MUSIC_FORMAT, 11_025, period, 0x1000))?;
            audio.with_source(music, |s| s.queue_buffer(buffer))??;
        }
        audio.with_source(music, |s| {
            s.set_looping(true);
            s.set_volume(0.5);
            s.play();
        })?;

        let blip = audio.create_source();
        let buffer = audio.create_buffer(BLIP_FORMAT, square_wave(BLIP_FORMAT, 2_205, 50, 0x2000))?;
        audio.with_source(blip, |s| s.set_buffer(buffer))?;

        Ok(Self { audio, blip })
    }

    fn handle_event(&self, event: InputEvent) -> Result<()> {
        if let InputEvent::KeyDown { .. } = event {
            self.audio.with_source(self.blip, |s| {
                s.stop();
                s.play();
            })?;
        }
        Ok(())
    }
}

/// Answer every rendezvous with the movie's input for that frame until the
/// scheduler hangs up. Returns the number of rendezvous served.
fn run_controller(endpoint: ControllerEndpoint, inputs: Vec<InputSnapshot>, flags: RuntimeFlags) -> u64 {
    let idle = InputSnapshot::new();
    let mut served = 0u64;
    while let Ok(frame) = endpoint.wait_frame() {
        let snapshot = inputs.get(frame as usize).unwrap_or(&idle);
        let first = (served == 0).then_some(flags);
        if let Err(e) = endpoint.respond(first, snapshot) {
            tracing::debug!("Controller stopped: {}", e);
            break;
        }
        served += 1;
    }
    tracing::debug!(served, "Controller finished");
    served
}

/// Replay `movie` for `config.replay.frames` drawing frames.
pub fn run_replay(config: &HarnessConfig, movie: &Movie) -> Result<ReplaySummary> {
    config.validate()?;
    if config.clock.framerate == 0 {
        tracing::warn!("framerate is 0, time is not virtualized and the digest will not be reproducible");
    }

    let settings = &config.replay;
    let wav_dir = settings.write_wav.then_some(settings.output_dir.as_path());
    if let Some(dir) = wav_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let audio = Arc::new(AudioContext::new(config.mixer.clone()).context("Failed to create AudioContext")?);
    let game = GameAudio::start(audio.clone())?;

    let clock = Arc::new(
        VirtualClock::system(config.clock.clone())
            .context("Failed to create VirtualClock")?
            .with_audio(audio.clone()),
    );

    let (channel, endpoint) = ChannelController::pair();
    let scheduler_config = SchedulerConfig { capture_enabled: true, ..config.scheduler.clone() };
    let scheduler = FrameScheduler::new(clock.clone(), scheduler_config, Box::new(channel))
        .context("Failed to create FrameScheduler")?;

    let events = EventQueue::new();
    scheduler.set_event_sink(Box::new(events.clone()));
    let (capture, capture_handle) = AudioCapture::new(audio.output_format(), wav_dir)?;
    scheduler.set_capture(Box::new(capture));

    let flags = RuntimeFlags {
        framerate: config.clock.framerate,
        fast_forward: config.clock.fast_forward,
        num_controllers: config.scheduler.num_controllers,
        capture_enabled: true,
    };
    let inputs = movie.expand();
    let controller = thread::Builder::new()
        .name("controller".to_string())
        .spawn(move || run_controller(endpoint, inputs, flags))
        .context("Failed to spawn controller thread")?;

    tracing::info!(frames = settings.frames, movie_length = movie.len(), "Starting replay");

    let delay = VirtualTime::from_nanos(settings.delay_per_frame_us as i128 * 1_000);
    let mut input_events = 0u64;
    for frame in 0..settings.frames {
        for i in 0..settings.queries_per_frame as usize {
            let kind = TimeCallKind::ALL_TRACKED[i % TimeCallKind::TRACKED];
            clock.get_ticks(kind, CallerRole::FrameOwner);
        }
        clock
            .add_delay(delay, CallerRole::FrameOwner)
            .with_context(|| format!("Delay failed in frame {}", frame))?;

        scheduler
            .frame_boundary(true)
            .with_context(|| format!("Frame boundary {} failed", frame))?;

        for event in events.drain() {
            input_events += 1;
            game.handle_event(event.event)?;
        }
    }

    let final_time = clock.get_ticks(TimeCallKind::Untracked, CallerRole::Internal);
    let rendezvous = scheduler.frame();
    let metrics = clock.metrics();

    // Dropping the scheduler closes the capture and hangs up on the controller.
    drop(scheduler);
    let served = controller.join().map_err(|_| anyhow!("Controller thread panicked"))?;
    audio.close_sinks().context("Failed to finalize reference sinks")?;

    let audio_digest = format!("{:016x}", capture_handle.digest());
    tracing::info!(rendezvous, served, final_time = %final_time, digest = %audio_digest, "Replay complete");

    Ok(ReplaySummary {
        frames: settings.frames,
        rendezvous,
        final_time,
        audio_digest,
        audio_bytes: capture_handle.bytes(),
        input_events,
        wav_path: capture_handle.wav_path().map(|p| p.display().to_string()),
        metrics,
    })
}
