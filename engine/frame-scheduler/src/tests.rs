//! Rendezvous tests against a manual host clock and an in-process controller

use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use audio_mixer::{AudioContext, MixerConfig, SampleFormat};
use parking_lot::Mutex;
use proptest::prelude::*;
use virtual_clock::{
    CallerRole, ClockConfig, ManualHostClock, NonDeterministicTimer, TimeCallKind, VirtualClock,
};
use virtual_time::{FrameIndex, VirtualTime};

use crate::messages::{read_frame_start, write_message};
use crate::*;

const MONO16: SampleFormat = SampleFormat::new(16, 1, 44_100);

fn clock(config: ClockConfig) -> VirtualClock {
    let host = Arc::new(ManualHostClock::default());
    let fallback = Arc::new(NonDeterministicTimer::new(host.clone()));
    VirtualClock::new(config, host, fallback).unwrap()
}

fn fast_clock() -> Arc<VirtualClock> {
    Arc::new(clock(ClockConfig { fast_forward: true, ..Default::default() }))
}

fn scheduler(clock: Arc<VirtualClock>, config: SchedulerConfig) -> (Arc<FrameScheduler>, ControllerEndpoint) {
    let (channel, endpoint) = ChannelController::pair();
    (FrameScheduler::new(clock, config, Box::new(channel)).unwrap(), endpoint)
}

fn idle(endpoint: &ControllerEndpoint, frames: usize) {
    for _ in 0..frames {
        endpoint.respond(None, &InputSnapshot::new()).unwrap();
    }
}

fn flags(framerate: u32) -> RuntimeFlags {
    RuntimeFlags { framerate, fast_forward: true, num_controllers: 0, capture_enabled: false }
}

#[derive(Clone, Default)]
struct RecordingCapture {
    frames: Arc<Mutex<Vec<(FrameIndex, usize)>>>,
    closed: Arc<AtomicU32>,
    fail_at: Option<FrameIndex>,
}

impl FrameCapture for RecordingCapture {
    fn capture_frame(&mut self, frame: FrameIndex, audio: &[u8]) -> std::result::Result<(), CaptureError> {
        self.frames.lock().push((frame, audio.len()));
        if self.fail_at == Some(frame) {
            return Err("encoder pipe closed".into());
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
struct RecordingDisplay {
    samples: Arc<Mutex<Vec<FpsSample>>>,
}

impl TitleDisplay for RecordingDisplay {
    fn update_fps(&mut self, sample: FpsSample) {
        self.samples.lock().push(sample);
    }
}

#[test]
fn test_rendezvous_applies_flags_and_inputs() {
    let clock = fast_clock();
    let (scheduler, endpoint) = scheduler(clock.clone(), SchedulerConfig::default());
    let queue = EventQueue::new();
    scheduler.set_event_sink(Box::new(queue.clone()));

    let mut inputs = InputSnapshot::new();
    inputs.press_key(42);
    let new_flags = RuntimeFlags { num_controllers: 1, ..flags(30) };
    endpoint.respond(Some(new_flags), &inputs).unwrap();

    let report = scheduler.frame_boundary(true).unwrap();
    assert_eq!(endpoint.wait_frame().unwrap(), 0);
    assert_eq!(report.frame, 0);
    assert_eq!(report.flags, Some(new_flags));
    assert_eq!(report.timing.increment, VirtualTime::new(0, 16_666_666));

    assert_eq!(clock.framerate(), 30);
    assert_eq!(scheduler.frame(), 1);
    assert_eq!(scheduler.inputs(), inputs);

    let events = queue.drain();
    assert_eq!(events, report.events);
    assert_eq!(
        events.iter().map(|e| e.event).collect::<Vec<_>>(),
        vec![InputEvent::KeyDown { key: 42 }, InputEvent::ControllerAdded { controller: 0 }]
    );
    assert!(events.iter().all(|e| e.timestamp_ms == 16));

    // The new framerate takes effect at the next boundary.
    idle(&endpoint, 1);
    let report = scheduler.frame_boundary(true).unwrap();
    assert_eq!(report.frame, 1);
    assert_eq!(report.timing.increment, VirtualTime::new(0, 33_333_333));
    assert_eq!(
        queue.drain().iter().map(|e| e.event).collect::<Vec<_>>(),
        vec![InputEvent::KeyUp { key: 42 }]
    );
}

#[test]
fn test_time_queries_inside_rendezvous_do_not_count() {
    let clock = fast_clock();
    let (scheduler, endpoint) = scheduler(clock.clone(), SchedulerConfig::default());

    let mut inputs = InputSnapshot::new();
    for key in 1..=16 {
        inputs.press_key(key);
    }
    endpoint.respond(None, &inputs).unwrap();
    let report = scheduler.frame_boundary(true).unwrap();

    assert_eq!(report.events.len(), 16);
    assert_eq!(clock.metrics().forced_advances, 0);
    assert_eq!(clock.snapshot().ticks, VirtualTime::new(0, 16_666_666));
}

#[test]
fn test_fps_reported_every_window() {
    let clock = fast_clock();
    let (scheduler, endpoint) = scheduler(clock, SchedulerConfig { fps_window: 3, ..Default::default() });
    let display = RecordingDisplay::default();
    scheduler.set_display(Box::new(display.clone()));

    idle(&endpoint, 7);
    let reports: Vec<_> = (0..7).map(|_| scheduler.frame_boundary(true).unwrap()).collect();

    let sampled: Vec<_> = reports.iter().filter(|r| r.fps.is_some()).map(|r| r.frame).collect();
    assert_eq!(sampled, vec![2, 5]);

    let samples = display.samples.lock().clone();
    assert_eq!(samples.len(), 2);
    // Fast-forward never sleeps, so no real time passes on the manual host.
    assert_eq!(samples[0].fps, 0.0);
    assert!((samples[0].logical_fps - 60.0).abs() < 0.5);
}

#[test]
fn test_capture_receives_each_frame_audio() {
    let audio = Arc::new(
        AudioContext::new(MixerConfig { output_format: MONO16, ..Default::default() }).unwrap(),
    );
    let clock = Arc::new(
        clock(ClockConfig { fast_forward: true, ..Default::default() }).with_audio(audio),
    );
    let (scheduler, endpoint) =
        scheduler(clock, SchedulerConfig { capture_enabled: true, ..Default::default() });
    let capture = RecordingCapture::default();
    scheduler.set_capture(Box::new(capture.clone()));
    assert!(scheduler.capture_active());

    idle(&endpoint, 3);
    for _ in 0..3 {
        let report = scheduler.frame_boundary(true).unwrap();
        assert_eq!(report.timing.mix.unwrap().output_bytes, 1470);
    }

    assert_eq!(*capture.frames.lock(), vec![(0, 1470), (1, 1470), (2, 1470)]);
    drop(scheduler);
    assert_eq!(capture.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_capture_failure_disables_capture_only() {
    let clock = fast_clock();
    let (scheduler, endpoint) =
        scheduler(clock, SchedulerConfig { capture_enabled: true, ..Default::default() });
    let capture = RecordingCapture { fail_at: Some(1), ..Default::default() };
    scheduler.set_capture(Box::new(capture.clone()));

    idle(&endpoint, 4);
    for frame in 0..4 {
        assert_eq!(scheduler.frame_boundary(true).unwrap().frame, frame);
    }

    assert_eq!(capture.frames.lock().len(), 2);
    assert_eq!(capture.closed.load(Ordering::SeqCst), 1);
    assert!(!scheduler.capture_active());

    drop(scheduler);
    assert_eq!(capture.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_controller_toggles_capture() {
    let clock = fast_clock();
    let (scheduler, endpoint) = scheduler(clock, SchedulerConfig::default());
    let capture = RecordingCapture::default();
    scheduler.set_capture(Box::new(capture.clone()));

    endpoint.respond(Some(RuntimeFlags { capture_enabled: true, ..flags(60) }), &InputSnapshot::new()).unwrap();
    idle(&endpoint, 1);
    endpoint.respond(Some(flags(60)), &InputSnapshot::new()).unwrap();
    idle(&endpoint, 1);
    for _ in 0..4 {
        scheduler.frame_boundary(true).unwrap();
    }

    // Flags arrive after the capture step, so the toggle applies from the next frame.
    let frames: Vec<_> = capture.frames.lock().iter().map(|(frame, _)| *frame).collect();
    assert_eq!(frames, vec![1, 2]);
}

#[test]
fn test_disconnect_still_exits_clock_boundary() {
    let clock = fast_clock();
    let (scheduler, endpoint) = scheduler(clock.clone(), SchedulerConfig::default());
    clock.get_ticks(TimeCallKind::GetTicks, CallerRole::FrameOwner);
    clock.get_ticks(TimeCallKind::GetTimeOfDay, CallerRole::Worker);
    drop(endpoint);

    let err = scheduler.frame_boundary(true).unwrap_err();
    assert!(matches!(err, SchedulerError::Protocol(ProtocolError::Disconnected)));

    let state = clock.snapshot();
    assert_eq!(state.call_counts, [0; TimeCallKind::TRACKED]);
    assert_eq!(state.non_owner_calls, 0);
    assert_eq!(state.ticks, VirtualTime::new(0, 16_666_666));
    assert_eq!(scheduler.frame(), 0);
}

#[test]
fn test_large_delay_forces_non_drawing_rendezvous() {
    let clock = fast_clock();
    let (scheduler, endpoint) = scheduler(clock.clone(), SchedulerConfig::default());
    idle(&endpoint, 16);

    clock.add_delay(VirtualTime::from_millis(200), CallerRole::FrameOwner).unwrap();

    let metrics = clock.metrics();
    assert!(metrics.synthetic_rendezvous > 0);
    assert_eq!(metrics.drawing_rendezvous, 0);
    assert_eq!(scheduler.frame(), metrics.synthetic_rendezvous);
    for frame in 0..scheduler.frame() {
        assert_eq!(endpoint.wait_frame().unwrap(), frame);
    }

    let state = clock.snapshot();
    assert!(state.deferred_delay <= state.frame_increment * 6);
    assert!(state.ticks >= VirtualTime::from_millis(200));
}

#[test]
fn test_dropped_scheduler_leaves_bare_boundaries() {
    let clock = fast_clock();
    let (scheduler, _endpoint) = scheduler(clock.clone(), SchedulerConfig::default());
    drop(scheduler);

    clock.add_delay(VirtualTime::from_millis(200), CallerRole::FrameOwner).unwrap();
    assert!(clock.metrics().synthetic_rendezvous > 0);
}

#[test]
fn test_restart_replays_from_frame_zero() {
    let clock = fast_clock();
    let (scheduler, endpoint) =
        scheduler(clock.clone(), SchedulerConfig { num_controllers: 2, ..Default::default() });
    idle(&endpoint, 3);
    let first = scheduler.frame_boundary(true).unwrap();
    scheduler.frame_boundary(true).unwrap();

    scheduler.restart();
    assert_eq!(scheduler.frame(), 0);
    assert_eq!(clock.snapshot().ticks, VirtualTime::ZERO);

    let replay = scheduler.frame_boundary(true).unwrap();
    assert_eq!(replay, first);
    assert_eq!(
        replay.events.iter().map(|e| e.event).collect::<Vec<_>>(),
        vec![
            InputEvent::ControllerAdded { controller: 0 },
            InputEvent::ControllerAdded { controller: 1 }
        ]
    );
}

#[test]
fn test_invalid_config_rejected() {
    let (channel, _endpoint) = ChannelController::pair();
    let result = FrameScheduler::new(
        fast_clock(),
        SchedulerConfig { fps_window: 0, ..Default::default() },
        Box::new(channel),
    );
    assert!(matches!(result, Err(SchedulerError::Config(_))));
}

/// Scripted controller bytes in, scheduler bytes out.
struct Duplex {
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
}

impl Read for Duplex {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for Duplex {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_stream_controller_end_to_end() {
    let mut pressed = InputSnapshot::new();
    pressed.pointer = PointerState { x: 10, y: 20, buttons: 0b1 };

    let mut script = Vec::new();
    write_message(&mut script, &ControllerMessage::Flags(flags(50))).unwrap();
    write_message(&mut script, &ControllerMessage::Inputs(Box::new(pressed))).unwrap();
    write_message(&mut script, &ControllerMessage::EndFrameBoundary).unwrap();
    write_message(&mut script, &ControllerMessage::EndFrameBoundary).unwrap();

    let clock = fast_clock();
    let scheduler = FrameScheduler::new(
        clock.clone(),
        SchedulerConfig::default(),
        Box::new(StreamChannel::new(Duplex { input: Cursor::new(script), output: Vec::new() })),
    )
    .unwrap();

    let first = scheduler.frame_boundary(true).unwrap();
    assert_eq!(
        first.events.iter().map(|e| e.event).collect::<Vec<_>>(),
        vec![
            InputEvent::PointerMotion { x: 10, y: 20, dx: 10, dy: 20 },
            InputEvent::PointerButtonDown { button: 0, x: 10, y: 20 }
        ]
    );
    assert_eq!(clock.framerate(), 50);

    // Inputs are sticky until the controller sends new ones.
    let second = scheduler.frame_boundary(true).unwrap();
    assert!(second.events.is_empty());
    assert_eq!(second.timing.increment, VirtualTime::new(0, 20_000_000));

    let err = scheduler.frame_boundary(true).unwrap_err();
    assert!(matches!(err, SchedulerError::Protocol(ProtocolError::Disconnected)));
    assert_eq!(scheduler.frame(), 2);
}

#[test]
fn test_stream_controller_frame_starts() {
    let mut script = Vec::new();
    write_message(&mut script, &ControllerMessage::EndFrameBoundary).unwrap();

    let mut channel = StreamChannel::new(Duplex { input: Cursor::new(script), output: Vec::new() });
    channel.send_frame_start(9).unwrap();
    assert_eq!(channel.receive().unwrap(), ControllerMessage::EndFrameBoundary);

    let written = channel.into_inner().output;
    assert_eq!(read_frame_start(&mut Cursor::new(written)).unwrap(), 9);
}

fn apply(events: &[TimedEvent], snapshot: &mut InputSnapshot) {
    for timed in events {
        match timed.event {
            InputEvent::KeyDown { key } => {
                snapshot.press_key(key);
            }
            InputEvent::KeyUp { key } => snapshot.release_key(key),
            InputEvent::ControllerButtonDown { controller, button } => {
                snapshot.set_controller_button(controller as usize, button as usize, true)
            }
            InputEvent::ControllerButtonUp { controller, button } => {
                snapshot.set_controller_button(controller as usize, button as usize, false)
            }
            InputEvent::ControllerAxis { controller, axis, value } => {
                snapshot.controller_axes[controller as usize][axis as usize] = value
            }
            _ => {}
        }
    }
}

fn snapshot_from(keys: &[u32], buttons: &[u16]) -> InputSnapshot {
    let mut snapshot = InputSnapshot::new();
    for &key in keys {
        snapshot.press_key(key);
    }
    for (c, &mask) in buttons.iter().enumerate() {
        snapshot.controller_buttons[c] = mask;
    }
    snapshot
}

proptest! {
    #[test]
    fn prop_events_replay_snapshot(
        old_keys in prop::collection::vec(1u32..40, 0..16),
        new_keys in prop::collection::vec(1u32..40, 0..16),
        old_buttons in prop::collection::vec(any::<u16>(), 4),
        new_buttons in prop::collection::vec(any::<u16>(), 4),
        num_controllers in 0u8..=4,
    ) {
        let previous = snapshot_from(&old_keys, &old_buttons);
        let current = snapshot_from(&new_keys, &new_buttons);

        let mut tracker = InputTracker::new();
        tracker.diff(&previous, num_controllers, || 0);
        let events = tracker.diff(&current, num_controllers, || 0);

        let mut replayed = previous.clone();
        apply(&events, &mut replayed);

        let replayed_keys: BTreeSet<_> = replayed.pressed_keys().collect();
        let current_keys: BTreeSet<_> = current.pressed_keys().collect();
        prop_assert_eq!(replayed_keys, current_keys);
        for c in 0..num_controllers as usize {
            prop_assert_eq!(replayed.controller_buttons[c], current.controller_buttons[c]);
        }
        let no_added = events.iter().all(|e| !matches!(e.event, InputEvent::ControllerAdded { .. }));
        prop_assert!(no_added);
    }
}
