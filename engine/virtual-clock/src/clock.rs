//! Core VirtualClock implementation

use std::sync::{Arc, Weak};

use audio_mixer::{AudioContext, MixReport};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use virtual_time::{VirtualTime, NANOS_PER_SEC};

use crate::config::ClockConfig;
use crate::error::{ClockError, Result};
use crate::fallback::{FallbackTimer, NonDeterministicTimer};
use crate::hook::RendezvousHook;
use crate::host::{HostClock, SystemHostClock};
use crate::kinds::{CallerRole, TimeCallKind};
use crate::metrics::{ClockMetrics, MetricsCollector};

/// All mutable clock state. [`VirtualClock::snapshot`] returns a copy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClockState {
    pub framerate: u32,
    pub fast_forward: bool,

    /// Authoritative virtual time
    pub ticks: VirtualTime,
    /// Provisional offset added to every reported value
    pub fake_extra_ticks: VirtualTime,

    /// Increment applied at the most recent frame boundary
    pub frame_increment: VirtualTime,
    /// Carry of the `1e9 % framerate` remainder, in units of 1/framerate ns
    pub fractional_part: u32,

    pub last_enter_ticks: VirtualTime,
    /// Host monotonic time at the end of the last boundary; None before the first
    pub last_enter_time: Option<VirtualTime>,

    /// Delay not yet absorbed by a frame boundary
    pub deferred_delay: VirtualTime,
    /// Delay added since the last drawing frame
    pub forced_advance_ticks: VirtualTime,

    pub call_counts: [u32; TimeCallKind::TRACKED],
    pub non_owner_calls: u32,
}

impl ClockState {
    fn new(framerate: u32, fast_forward: bool) -> Self {
        Self {
            framerate,
            fast_forward,
            ticks: VirtualTime::ZERO,
            fake_extra_ticks: VirtualTime::ZERO,
            frame_increment: base_increment(framerate),
            fractional_part: 0,
            last_enter_ticks: VirtualTime::ZERO,
            last_enter_time: None,
            deferred_delay: VirtualTime::ZERO,
            forced_advance_ticks: VirtualTime::ZERO,
            call_counts: [0; TimeCallKind::TRACKED],
            non_owner_calls: 0,
        }
    }

    /// Next frame increment: `1e9 / framerate` ns plus one ns whenever the
    /// accumulated remainder reaches a full nanosecond.
    fn next_increment(&mut self) -> VirtualTime {
        let rate = self.framerate;
        let mut nanos = NANOS_PER_SEC / rate;
        self.fractional_part += NANOS_PER_SEC % rate;
        if self.fractional_part >= rate {
            nanos += 1;
            self.fractional_part -= rate;
        }
        VirtualTime::new(0, nanos)
    }
}

fn base_increment(framerate: u32) -> VirtualTime {
    if framerate == 0 {
        VirtualTime::ZERO
    } else {
        VirtualTime::new(0, NANOS_PER_SEC / framerate)
    }
}

/// What happened while entering one frame boundary
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTiming {
    pub drawing: bool,
    /// Increment applied to virtual time (zero in non-deterministic mode)
    pub increment: VirtualTime,
    /// Virtual time after the top-up
    pub ticks: VirtualTime,
    /// Real time slept to pace the frame
    pub slept: VirtualTime,
    /// Audio mixed with `increment`, if an audio context is attached
    pub mix: Option<MixReport>,
}

impl FrameTiming {
    fn delegated(drawing: bool) -> Self {
        Self {
            drawing,
            increment: VirtualTime::ZERO,
            ticks: VirtualTime::ZERO,
            slept: VirtualTime::ZERO,
            mix: None,
        }
    }
}

/// The deterministic clock.
///
/// One instance lives for the whole replay and is shared by handle. Time
/// queries may come from any thread; frame boundaries come from the frame
/// owner, serialized by the scheduler.
pub struct VirtualClock {
    config: ClockConfig,
    limits: [u32; TimeCallKind::TRACKED],
    state: Mutex<ClockState>,

    host: Arc<dyn HostClock>,
    fallback: Arc<dyn FallbackTimer>,
    audio: Option<Arc<AudioContext>>,
    hook: RwLock<Option<Weak<dyn RendezvousHook>>>,

    metrics: MetricsCollector,
}

impl VirtualClock {
    /// Create a new VirtualClock
    pub fn new(
        config: ClockConfig,
        host: Arc<dyn HostClock>,
        fallback: Arc<dyn FallbackTimer>,
    ) -> Result<Self> {
        config.validate()?;

        tracing::info!(
            framerate = config.framerate,
            fast_forward = config.fast_forward,
            "Creating VirtualClock"
        );

        Ok(Self {
            limits: config.limits(),
            state: Mutex::new(ClockState::new(config.framerate, config.fast_forward)),
            config,
            host,
            fallback,
            audio: None,
            hook: RwLock::new(None),
            metrics: MetricsCollector::new(),
        })
    }

    /// Create a clock on the operating system's clocks with the real-time fallback
    pub fn system(config: ClockConfig) -> Result<Self> {
        let host: Arc<dyn HostClock> = Arc::new(SystemHostClock::new());
        let fallback = Arc::new(NonDeterministicTimer::new(host.clone()));
        Self::new(config, host, fallback)
    }

    /// Mix this context at every frame boundary
    pub fn with_audio(mut self, audio: Arc<AudioContext>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn audio(&self) -> Option<&Arc<AudioContext>> {
        self.audio.as_ref()
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<dyn HostClock> {
        &self.host
    }

    /// Route synthetic rendezvous through `hook` instead of a bare enter/exit pair.
    pub fn install_hook(&self, hook: Weak<dyn RendezvousHook>) {
        *self.hook.write() = Some(hook);
    }

    pub fn clear_hook(&self) {
        *self.hook.write() = None;
    }

    /// Reset all state, as on a recording restart. Runtime flags are kept.
    pub fn initialize(&self) {
        let mut state = self.state.lock();
        *state = ClockState::new(state.framerate, state.fast_forward);
        drop(state);
        self.fallback.initialize();
        self.metrics.reset();
        tracing::info!("VirtualClock initialized");
    }

    /// Copy of all mutable state
    pub fn snapshot(&self) -> ClockState {
        self.state.lock().clone()
    }

    pub fn metrics(&self) -> ClockMetrics {
        self.metrics.get_metrics()
    }

    pub fn framerate(&self) -> u32 {
        self.state.lock().framerate
    }

    pub fn set_framerate(&self, framerate: u32) {
        let mut state = self.state.lock();
        if state.framerate != framerate {
            tracing::info!("Framerate changed from {} to {}", state.framerate, framerate);
            state.framerate = framerate;
            state.fractional_part = 0;
            state.frame_increment = base_increment(framerate);
        }
    }

    pub fn is_fast_forward(&self) -> bool {
        self.state.lock().fast_forward
    }

    pub fn set_fast_forward(&self, fast_forward: bool) {
        self.state.lock().fast_forward = fast_forward;
    }

    /// Report the current time to a caller.
    ///
    /// Native callers get real time. Tracked calls from the frame owner count
    /// toward their kind's limit and force an advance when it is exceeded;
    /// tracked calls from other threads count toward the promotion threshold.
    pub fn get_ticks(&self, kind: TimeCallKind, role: CallerRole) -> VirtualTime {
        if role == CallerRole::Native {
            return self.host.realtime();
        }

        let mut state = self.state.lock();
        if state.framerate == 0 {
            drop(state);
            return self.fallback.get_ticks();
        }

        let kind = if role == CallerRole::Internal { TimeCallKind::Untracked } else { kind };
        let mut is_owner = role == CallerRole::FrameOwner;

        if !is_owner && kind.is_tracked() {
            let threshold = self.config.non_owner_call_threshold;
            state.non_owner_calls = state.non_owner_calls.saturating_add(1);
            if state.non_owner_calls > threshold {
                if state.non_owner_calls == threshold + 1 {
                    tracing::warn!(
                        threshold,
                        "Non-owner thread keeps querying time, temporarily treating it as frame owner"
                    );
                    self.metrics.record_promotion();
                }
                is_owner = true;
            }
        }

        let mut force_advance = false;
        if is_owner {
            if let Some(index) = kind.index() {
                state.call_counts[index] += 1;
                if state.call_counts[index] > self.limits[index] {
                    tracing::warn!(?kind, "Time query limit reached within one frame, force-advancing time");
                    state.call_counts = [0; TimeCallKind::TRACKED];
                    force_advance = true;
                }
            }
        }

        if force_advance {
            drop(state);
            self.metrics.record_forced_advance();
            if let Err(e) = self.add_delay(self.config.forced_advance_quantum(), CallerRole::FrameOwner)
            {
                tracing::warn!("Forced advance failed to drain deferred delay: {}", e);
            }
            state = self.state.lock();
        }

        let now = state.ticks + state.fake_extra_ticks;
        tracing::trace!(?kind, ?role, ticks = %now, "get_ticks");
        now
    }

    /// Advance virtual time by `delay` on behalf of a sleeping caller.
    ///
    /// The delay is deferred to frame boundaries as far as possible; once the
    /// deferred total exceeds `max_deferred_frames` increments, non-drawing
    /// rendezvous are forced until it is back under the bound.
    pub fn add_delay(&self, delay: VirtualTime, role: CallerRole) -> Result<()> {
        if role == CallerRole::Native {
            return Ok(());
        }

        let mut state = self.state.lock();
        if state.framerate == 0 {
            drop(state);
            self.fallback.add_delay(delay);
            return Ok(());
        }
        if role == CallerRole::Internal {
            return Ok(());
        }

        let delay = delay.max_zero();
        state.deferred_delay += delay;
        state.ticks += delay;
        state.forced_advance_ticks += delay;
        let fast_forward = state.fast_forward;
        drop(state);

        self.metrics.record_delay(delay);
        tracing::trace!(delay = %delay, "add_delay");

        if !fast_forward {
            self.host.yield_now();
        }

        while self.deferred_over_bound() {
            tracing::debug!("Deferred delay over bound, forcing a non-drawing frame boundary");
            self.synthetic_rendezvous()?;
        }
        Ok(())
    }

    fn deferred_over_bound(&self) -> bool {
        let state = self.state.lock();
        state.framerate > 0
            && state.deferred_delay > state.frame_increment * self.config.max_deferred_frames
    }

    fn synthetic_rendezvous(&self) -> Result<()> {
        let hook = self.hook.read().as_ref().and_then(Weak::upgrade);
        match hook {
            Some(hook) => hook.synthetic_rendezvous().map_err(ClockError::Rendezvous),
            None => {
                self.enter_frame_boundary(false);
                self.exit_frame_boundary();
                Ok(())
            }
        }
    }

    /// Start a frame boundary: advance virtual time by one increment, mix
    /// audio with that increment, and pace against real time.
    pub fn enter_frame_boundary(&self, drawing: bool) -> FrameTiming {
        let mut state = self.state.lock();
        if state.framerate == 0 {
            drop(state);
            self.fallback.enter_frame_boundary();
            return FrameTiming::delegated(drawing);
        }

        let increment = state.next_increment();
        state.frame_increment = increment;

        let mut taken = state.ticks - state.last_enter_ticks;
        if self.config.count_forced_ticks_as_taken {
            taken += state.forced_advance_ticks;
        }
        if drawing {
            state.forced_advance_ticks = VirtualTime::ZERO;
        }
        if increment > taken {
            let shortfall = increment - taken;
            state.ticks += shortfall;
            tracing::trace!(added = %shortfall, "Topped up virtual time");
        }

        let ticks = state.ticks;
        let fast_forward = state.fast_forward;
        let last_enter_time = state.last_enter_time;
        drop(state);

        self.metrics.record_rendezvous(drawing, increment);

        let mix = self.audio.as_ref().map(|audio| audio.mix_all_sources(increment));

        let mut slept = VirtualTime::ZERO;
        if let Some(last) = last_enter_time.filter(|_| !fast_forward) {
            let wait = last + increment - self.host.monotonic();
            if wait > VirtualTime::ZERO {
                self.host.sleep(wait);
                self.metrics.record_pacing_sleep(wait);
                slept = wait;
            }
        }

        let now = self.host.monotonic();
        let mut state = self.state.lock();
        state.last_enter_time = Some(now);
        state.last_enter_ticks = state.ticks;
        drop(state);

        tracing::debug!(drawing, increment = %increment, ticks = %ticks, "Entered frame boundary");

        FrameTiming { drawing, increment, ticks, slept, mix }
    }

    /// Finish a frame boundary: clear per-frame counters and absorb one
    /// increment of deferred delay.
    pub fn exit_frame_boundary(&self) {
        let mut state = self.state.lock();
        state.call_counts = [0; TimeCallKind::TRACKED];
        if state.framerate == 0 {
            drop(state);
            self.fallback.exit_frame_boundary();
            return;
        }
        state.non_owner_calls = 0;
        state.deferred_delay = state.deferred_delay.saturating_sub(state.frame_increment);
    }

    /// Report `ticks + offset` from now on without committing the offset.
    pub fn fake_advance_timer(&self, offset: VirtualTime) {
        self.state.lock().fake_extra_ticks = offset;
    }
}
