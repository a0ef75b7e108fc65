use std::collections::HashSet;

use super::types::{Key, MouseButton};

/// What changed during one frame.
///
/// [`super::InputState`] holds what is down right now; this holds the
/// transitions and motion since the last clear.
#[derive(Debug, Default)]
pub struct InputFrame {
    pub keys_pressed: HashSet<Key>,
    pub buttons_pressed: HashSet<MouseButton>,
    pub buttons_released: HashSet<MouseButton>,
    /// Logical pixels.
    pub pointer_delta: (f32, f32),
    pub wheel_lines: f32,
}

impl InputFrame {
    pub fn clear(&mut self) {
        self.keys_pressed.clear();
        self.buttons_pressed.clear();
        self.buttons_released.clear();
        self.pointer_delta = (0.0, 0.0);
        self.wheel_lines = 0.0;
    }

    pub fn key_pressed(&self, key: Key) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn button_pressed(&self, button: MouseButton) -> bool {
        self.buttons_pressed.contains(&button)
    }

    pub fn button_released(&self, button: MouseButton) -> bool {
        self.buttons_released.contains(&button)
    }

    /// Digit keys pressed this frame, in ascending order.
    pub fn digits_pressed(&self) -> Vec<u8> {
        let mut digits: Vec<u8> = self
            .keys_pressed
            .iter()
            .filter_map(|k| match k {
                Key::Digit(d) => Some(*d),
                _ => None,
            })
            .collect();
        digits.sort_unstable();
        digits
    }
}
