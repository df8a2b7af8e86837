//! The per-frame rendezvous

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use virtual_clock::{CallerRole, FrameTiming, HookError, RendezvousHook, TimeCallKind, VirtualClock};
use virtual_time::{FrameIndex, VirtualTime};

use crate::channel::ControllerChannel;
use crate::collaborators::{FrameCapture, LogTitleDisplay, TitleDisplay};
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::events::{EventSink, InputTracker, NullEventSink, TimedEvent};
use crate::fps::{FpsCounter, FpsSample};
use crate::inputs::{InputSnapshot, MAX_CONTROLLERS};
use crate::messages::{ControllerMessage, RuntimeFlags};

/// What one rendezvous did
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    /// Frame index sent to the controller
    pub frame: FrameIndex,
    pub timing: FrameTiming,
    pub events: Vec<TimedEvent>,
    pub fps: Option<FpsSample>,
    /// Flags received from the controller during this rendezvous
    pub flags: Option<RuntimeFlags>,
}

struct FrameState {
    frame: FrameIndex,
    channel: Box<dyn ControllerChannel>,
    inputs: InputSnapshot,
    tracker: InputTracker,
    fps: FpsCounter,
    num_controllers: u8,

    capture: Option<Box<dyn FrameCapture>>,
    capture_enabled: bool,
    capture_failed: bool,

    display: Box<dyn TitleDisplay>,
    events: Box<dyn EventSink>,
}

/// Serializes rendezvous and runs each one end to end.
pub struct FrameScheduler {
    clock: Arc<VirtualClock>,
    fps_window: u64,
    state: Mutex<FrameState>,
}

impl FrameScheduler {
    /// Create a scheduler and register it as the clock's rendezvous hook.
    pub fn new(
        clock: Arc<VirtualClock>,
        config: SchedulerConfig,
        channel: Box<dyn ControllerChannel>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let fps = FpsCounter::new(config.fps_window, clock.host().monotonic(), VirtualTime::ZERO);
        let scheduler = Arc::new(Self {
            fps_window: config.fps_window,
            state: Mutex::new(FrameState {
                frame: 0,
                channel,
                inputs: InputSnapshot::new(),
                tracker: InputTracker::new(),
                fps,
                num_controllers: config.num_controllers,
                capture: None,
                capture_enabled: config.capture_enabled,
                capture_failed: false,
                display: Box::new(LogTitleDisplay),
                events: Box::new(NullEventSink),
            }),
            clock,
        });

        let hook: Weak<dyn RendezvousHook> = Arc::downgrade(&scheduler) as Weak<dyn RendezvousHook>;
        scheduler.clock.install_hook(hook);

        tracing::info!(
            fps_window = config.fps_window,
            num_controllers = config.num_controllers,
            capture_enabled = config.capture_enabled,
            "Created FrameScheduler"
        );
        Ok(scheduler)
    }

    pub fn clock(&self) -> &Arc<VirtualClock> {
        &self.clock
    }

    pub fn set_capture(&self, capture: Box<dyn FrameCapture>) {
        self.state.lock().capture = Some(capture);
    }

    pub fn set_display(&self, display: Box<dyn TitleDisplay>) {
        self.state.lock().display = display;
    }

    pub fn set_event_sink(&self, events: Box<dyn EventSink>) {
        self.state.lock().events = events;
    }

    /// Index of the next rendezvous
    pub fn frame(&self) -> FrameIndex {
        self.state.lock().frame
    }

    /// Input snapshot applied at the last rendezvous
    pub fn inputs(&self) -> InputSnapshot {
        self.state.lock().inputs.clone()
    }

    pub fn capture_active(&self) -> bool {
        let state = self.state.lock();
        state.capture_enabled && !state.capture_failed && state.capture.is_some()
    }

    /// Start over from frame 0 with a freshly initialized clock.
    pub fn restart(&self) {
        let mut state = self.state.lock();
        self.clock.initialize();
        state.frame = 0;
        state.inputs = InputSnapshot::new();
        state.tracker.reset();
        state.fps = FpsCounter::new(self.fps_window, self.clock.host().monotonic(), VirtualTime::ZERO);
        tracing::info!("FrameScheduler restarted");
    }

    /// Run one rendezvous. `drawing` is false for boundaries forced to
    /// drain deferred delay.
    ///
    /// The clock's exit step runs even when the controller exchange fails.
    pub fn frame_boundary(&self, drawing: bool) -> Result<FrameReport> {
        let mut state = self.state.lock();
        tracing::debug!(frame = state.frame, drawing, "Enter frame boundary");

        let timing = self.clock.enter_frame_boundary(drawing);
        let report = self.run_rendezvous(&mut state, timing);
        self.clock.exit_frame_boundary();

        tracing::debug!(frame = state.frame, "Leave frame boundary");
        report
    }

    fn run_rendezvous(&self, state: &mut FrameState, timing: FrameTiming) -> Result<FrameReport> {
        let frame = state.frame;

        self.capture_frame(state, frame);

        state.channel.send_frame_start(frame)?;
        let flags = self.proceed_commands(state)?;

        let clock = &self.clock;
        let now_ms = || clock.get_ticks(TimeCallKind::Untracked, CallerRole::Internal).as_millis();
        let events = state.tracker.diff(&state.inputs, state.num_controllers, now_ms);
        for event in &events {
            state.events.push_event(*event);
        }
        if !events.is_empty() {
            tracing::trace!(frame, count = events.len(), "Generated input events");
        }

        state.frame += 1;

        let fps = state.fps.record(
            timing.drawing,
            clock.host().monotonic(),
            clock.get_ticks(TimeCallKind::Untracked, CallerRole::Internal),
        );
        if let Some(sample) = fps {
            tracing::debug!(frame, fps = sample.fps, logical_fps = sample.logical_fps, "Frame rate sample");
            state.display.update_fps(sample);
        }

        Ok(FrameReport { frame, timing, events, fps, flags })
    }

    fn capture_frame(&self, state: &mut FrameState, frame: FrameIndex) {
        if !state.capture_enabled || state.capture_failed {
            return;
        }
        let Some(capture) = state.capture.as_mut() else { return };

        let audio = self.clock.audio().map(|audio| audio.last_output()).unwrap_or_default();
        if let Err(e) = capture.capture_frame(frame, &audio) {
            tracing::warn!(frame, "Capture failed, disabling capture for the rest of the run: {}", e);
            capture.close();
            state.capture_failed = true;
        }
    }

    /// Apply controller messages until the end-of-frame token.
    fn proceed_commands(&self, state: &mut FrameState) -> Result<Option<RuntimeFlags>> {
        let mut last_flags = None;
        loop {
            match state.channel.receive()? {
                ControllerMessage::Flags(flags) => {
                    self.apply_flags(state, flags);
                    last_flags = Some(flags);
                }
                ControllerMessage::Inputs(inputs) => state.inputs = *inputs,
                ControllerMessage::EndFrameBoundary => return Ok(last_flags),
            }
        }
    }

    fn apply_flags(&self, state: &mut FrameState, flags: RuntimeFlags) {
        self.clock.set_framerate(flags.framerate);
        self.clock.set_fast_forward(flags.fast_forward);
        state.num_controllers = flags.num_controllers.min(MAX_CONTROLLERS as u8);

        if flags.capture_enabled != state.capture_enabled {
            tracing::info!(capture_enabled = flags.capture_enabled, "Capture toggled by controller");
            state.capture_enabled = flags.capture_enabled;
        }
    }
}

impl RendezvousHook for FrameScheduler {
    fn synthetic_rendezvous(&self) -> std::result::Result<(), HookError> {
        self.frame_boundary(false).map(|_| ()).map_err(|e| Box::new(e) as HookError)
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.capture_failed {
            if let Some(capture) = state.capture.as_mut() {
                capture.close();
            }
        }
    }
}
