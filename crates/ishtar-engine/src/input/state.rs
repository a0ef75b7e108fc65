use std::collections::HashSet;

use super::frame::InputFrame;
use super::types::{InputEvent, Key, Modifiers, MouseButton};

/// Held keys and buttons plus the pointer position of one window.
#[derive(Debug, Default)]
pub struct InputState {
    pub modifiers: Modifiers,
    pub focused: bool,
    /// Logical pixels; `None` while the pointer is outside the window.
    pub pointer_pos: Option<(f32, f32)>,
    pub keys_down: HashSet<Key>,
    pub buttons_down: HashSet<MouseButton>,
}

impl InputState {
    /// Updates held state and records the transition into `frame`.
    pub fn apply_event(&mut self, frame: &mut InputFrame, ev: InputEvent) {
        match ev {
            InputEvent::Modifiers(m) => self.modifiers = m,
            InputEvent::Focused(focused) => {
                self.focused = focused;
                if !focused {
                    self.keys_down.clear();
                    self.buttons_down.clear();
                }
            }
            InputEvent::PointerMoved { x, y } => {
                if let Some((px, py)) = self.pointer_pos {
                    frame.pointer_delta.0 += x - px;
                    frame.pointer_delta.1 += y - py;
                }
                self.pointer_pos = Some((x, y));
            }
            InputEvent::PointerLeft => self.pointer_pos = None,
            InputEvent::Key { key, pressed: true } => {
                // Auto-repeat arrives as another press of a held key.
                if self.keys_down.insert(key) {
                    frame.keys_pressed.insert(key);
                }
            }
            InputEvent::Key { key, pressed: false } => {
                self.keys_down.remove(&key);
            }
            InputEvent::Button { button, pressed: true } => {
                if self.buttons_down.insert(button) {
                    frame.buttons_pressed.insert(button);
                }
            }
            InputEvent::Button { button, pressed: false } => {
                if self.buttons_down.remove(&button) {
                    frame.buttons_released.insert(button);
                }
            }
            InputEvent::Wheel { lines } => frame.wheel_lines += lines,
        }
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    /// Pointer motion this frame while `button` is held.
    pub fn drag(&self, frame: &InputFrame, button: MouseButton) -> Option<(f32, f32)> {
        self.button_down(button).then_some(frame.pointer_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(events: &[InputEvent]) -> (InputState, InputFrame) {
        let (mut s, mut f) = (InputState::default(), InputFrame::default());
        for ev in events {
            s.apply_event(&mut f, *ev);
        }
        (s, f)
    }

    fn moved(x: f32, y: f32) -> InputEvent {
        InputEvent::PointerMoved { x, y }
    }

    // ── pointer ──

    #[test]
    fn first_move_only_sets_position() {
        let (s, f) = apply(&[moved(10.0, 10.0)]);
        assert_eq!(f.pointer_delta, (0.0, 0.0));
        assert_eq!(s.pointer_pos, Some((10.0, 10.0)));
    }

    #[test]
    fn motion_sums_until_cleared() {
        let (_, mut f) = apply(&[moved(0.0, 0.0), moved(3.0, 1.0), moved(5.0, -2.0)]);
        assert_eq!(f.pointer_delta, (5.0, -2.0));
        f.clear();
        assert_eq!(f.pointer_delta, (0.0, 0.0));
    }

    #[test]
    fn leaving_the_window_breaks_the_delta_chain() {
        let (_, f) = apply(&[moved(0.0, 0.0), InputEvent::PointerLeft, moved(50.0, 50.0)]);
        assert_eq!(f.pointer_delta, (0.0, 0.0));
    }

    #[test]
    fn drag_reports_motion_only_while_held() {
        let press = InputEvent::Button {
            button: MouseButton::Right,
            pressed: true,
        };
        let (s, f) = apply(&[moved(0.0, 0.0), press, moved(4.0, 2.0)]);
        assert_eq!(s.drag(&f, MouseButton::Right), Some((4.0, 2.0)));
        assert_eq!(s.drag(&f, MouseButton::Left), None);
        assert!(f.button_pressed(MouseButton::Right));
    }

    #[test]
    fn wheel_lines_accumulate() {
        let (_, f) = apply(&[InputEvent::Wheel { lines: 1.0 }, InputEvent::Wheel { lines: 2.0 }]);
        assert_eq!(f.wheel_lines, 3.0);
    }

    // ── keys ──

    #[test]
    fn held_key_repeat_is_one_press() {
        let press = InputEvent::Key {
            key: Key::Digit(1),
            pressed: true,
        };
        let (s, f) = apply(&[press, press]);
        assert_eq!(f.digits_pressed(), [1]);
        assert!(s.key_down(Key::Digit(1)));
    }

    #[test]
    fn focus_loss_releases_everything() {
        let (s, _) = apply(&[
            InputEvent::Key {
                key: Key::Char('w'),
                pressed: true,
            },
            InputEvent::Button {
                button: MouseButton::Left,
                pressed: true,
            },
            InputEvent::Focused(false),
        ]);
        assert!(!s.key_down(Key::Char('w')));
        assert!(!s.button_down(MouseButton::Left));
    }
}
