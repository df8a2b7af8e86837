//! Full input state exchanged with the controller once per frame

use serde::{Deserialize, Serialize};

/// Key slots in one snapshot
pub const MAX_KEYS: usize = 16;
pub const MAX_CONTROLLERS: usize = 4;
pub const CONTROLLER_AXES: usize = 6;
/// Buttons per controller, one bit each
pub const CONTROLLER_BUTTONS: usize = 16;
/// Pointer buttons tracked in the pointer mask
pub const POINTER_BUTTONS: usize = 5;

/// Platform-neutral key symbol
pub type KeySym = u32;

/// Marks an empty key slot
pub const NO_KEY: KeySym = 0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerState {
    pub x: i32,
    pub y: i32,
    /// Bit `n` set while pointer button `n` is held
    pub buttons: u32,
}

impl PointerState {
    #[inline]
    pub fn is_pressed(&self, button: usize) -> bool {
        (self.buttons >> button) & 1 == 1
    }
}

/// Everything the controller says is held this frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub keyboard: [KeySym; MAX_KEYS],
    pub pointer: PointerState,
    pub controller_axes: [[i16; CONTROLLER_AXES]; MAX_CONTROLLERS],
    pub controller_buttons: [u16; MAX_CONTROLLERS],
}

impl InputSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_key_pressed(&self, key: KeySym) -> bool {
        key != NO_KEY && self.keyboard.contains(&key)
    }

    pub fn pressed_keys(&self) -> impl Iterator<Item = KeySym> + '_ {
        self.keyboard.iter().copied().filter(|&k| k != NO_KEY)
    }

    /// Put `key` in the first free slot. Returns false when it is already
    /// held or every slot is taken.
    pub fn press_key(&mut self, key: KeySym) -> bool {
        if key == NO_KEY || self.is_key_pressed(key) {
            return false;
        }
        match self.keyboard.iter_mut().find(|slot| **slot == NO_KEY) {
            Some(slot) => {
                *slot = key;
                true
            }
            None => false,
        }
    }

    pub fn release_key(&mut self, key: KeySym) {
        for slot in self.keyboard.iter_mut().filter(|slot| **slot == key) {
            *slot = NO_KEY;
        }
    }

    pub fn set_controller_button(&mut self, controller: usize, button: usize, pressed: bool) {
        let mask = 1u16 << button;
        if pressed {
            self.controller_buttons[controller] |= mask;
        } else {
            self.controller_buttons[controller] &= !mask;
        }
    }

    pub fn controller_button(&self, controller: usize, button: usize) -> bool {
        (self.controller_buttons[controller] >> button) & 1 == 1
    }
}
