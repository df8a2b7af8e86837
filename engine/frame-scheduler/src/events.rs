//! Edge-triggered input events derived from consecutive snapshots

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::inputs::{
    InputSnapshot, KeySym, CONTROLLER_AXES, CONTROLLER_BUTTONS, MAX_CONTROLLERS, POINTER_BUTTONS,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    KeyDown { key: KeySym },
    KeyUp { key: KeySym },
    ControllerAdded { controller: u8 },
    ControllerAxis { controller: u8, axis: u8, value: i16 },
    ControllerButtonDown { controller: u8, button: u8 },
    ControllerButtonUp { controller: u8, button: u8 },
    PointerMotion { x: i32, y: i32, dx: i32, dy: i32 },
    PointerButtonDown { button: u8, x: i32, y: i32 },
    PointerButtonUp { button: u8, x: i32, y: i32 },
}

/// An event stamped with virtual time in milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub timestamp_ms: i64,
    pub event: InputEvent,
}

/// Receiver of synthesized events (the hosted process's event queue).
pub trait EventSink: Send {
    fn push_event(&mut self, event: TimedEvent);
}

/// Shared FIFO of events; clones see the same queue.
#[derive(Clone, Default)]
pub struct EventQueue {
    inner: Arc<Mutex<VecDeque<TimedEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&self) -> Option<TimedEvent> {
        self.inner.lock().pop_front()
    }

    pub fn drain(&self) -> Vec<TimedEvent> {
        self.inner.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl EventSink for EventQueue {
    fn push_event(&mut self, event: TimedEvent) {
        self.inner.lock().push_back(event);
    }
}

/// Drops every event
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn push_event(&mut self, _event: TimedEvent) {}
}

/// Keeps the previous snapshot and turns differences into events.
#[derive(Debug, Default)]
pub struct InputTracker {
    previous: InputSnapshot,
    controllers_announced: u8,
}

impl InputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> &InputSnapshot {
        &self.previous
    }

    pub fn controllers_announced(&self) -> u8 {
        self.controllers_announced
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Diff `current` against the previous snapshot, then keep `current`.
    ///
    /// Events come out in a fixed order: key releases, key presses,
    /// controller arrivals, per-controller axis then button changes,
    /// pointer motion, pointer buttons. `now_ms` is called once per event.
    pub fn diff(
        &mut self,
        current: &InputSnapshot,
        num_controllers: u8,
        mut now_ms: impl FnMut() -> i64,
    ) -> Vec<TimedEvent> {
        let mut events = Vec::new();
        let mut emit = |event: InputEvent| events.push(TimedEvent { timestamp_ms: now_ms(), event });
        let prev = &self.previous;

        for key in prev.pressed_keys().filter(|&k| !current.is_key_pressed(k)) {
            emit(InputEvent::KeyUp { key });
        }
        for key in current.pressed_keys().filter(|&k| !prev.is_key_pressed(k)) {
            emit(InputEvent::KeyDown { key });
        }

        let num_controllers = num_controllers.min(MAX_CONTROLLERS as u8);
        for controller in self.controllers_announced..num_controllers {
            emit(InputEvent::ControllerAdded { controller });
        }

        for c in 0..num_controllers as usize {
            for axis in 0..CONTROLLER_AXES {
                let value = current.controller_axes[c][axis];
                if value != prev.controller_axes[c][axis] {
                    emit(InputEvent::ControllerAxis { controller: c as u8, axis: axis as u8, value });
                }
            }
            let changed = current.controller_buttons[c] ^ prev.controller_buttons[c];
            for button in (0..CONTROLLER_BUTTONS).filter(|b| (changed >> b) & 1 == 1) {
                let (controller, button_id) = (c as u8, button as u8);
                if current.controller_button(c, button) {
                    emit(InputEvent::ControllerButtonDown { controller, button: button_id });
                } else {
                    emit(InputEvent::ControllerButtonUp { controller, button: button_id });
                }
            }
        }

        let (pointer, old) = (current.pointer, prev.pointer);
        if (pointer.x, pointer.y) != (old.x, old.y) {
            emit(InputEvent::PointerMotion {
                x: pointer.x,
                y: pointer.y,
                // Coordinates come off the wire unchecked.
                dx: pointer.x.wrapping_sub(old.x),
                dy: pointer.y.wrapping_sub(old.y),
            });
        }
        for button in 0..POINTER_BUTTONS {
            match (old.is_pressed(button), pointer.is_pressed(button)) {
                (false, true) => emit(InputEvent::PointerButtonDown {
                    button: button as u8,
                    x: pointer.x,
                    y: pointer.y,
                }),
                (true, false) => emit(InputEvent::PointerButtonUp {
                    button: button as u8,
                    x: pointer.x,
                    y: pointer.y,
                }),
                _ => {}
            }
        }

        self.controllers_announced = self.controllers_announced.max(num_controllers);
        self.previous = current.clone();
        events
    }
}
