//! Mouse and keyboard mapping for the viewer camera and toggles.

use ishtar_engine::input::{InputFrame, InputState, Key, MouseButton};
use ishtar_engine::render::ViewMode;
use ishtar_engine::scene::Camera;

const ORBIT_SPEED: f32 = 0.005;
const ZOOM_STEP: f32 = 0.9;
/// Pointer travel (logical px) below which a left press counts as a click.
const CLICK_SLOP: f32 = 4.0;

/// Discrete requests produced by one frame of input.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Action {
    Exit,
    ViewMode(ViewMode),
    ToggleSsao,
    ToggleBloom,
    Frame,
    /// Framebuffer pixel, physical units.
    Pick { x: u32, y: u32 },
}

#[derive(Debug, Default)]
pub struct Controls {
    press_travel: f32,
}

impl Controls {
    /// Moves `camera` for continuous input and returns the frame's actions.
    pub fn update(
        &mut self,
        input: &InputState,
        frame: &InputFrame,
        scale_factor: f32,
        camera: &mut Camera,
    ) -> Vec<Action> {
        let mut actions = Vec::new();

        for &key in &frame.keys_pressed {
            match key {
                Key::Escape => actions.push(Action::Exit),
                Key::Char('o') => actions.push(Action::ToggleSsao),
                Key::Char('b') => actions.push(Action::ToggleBloom),
                Key::Char('f') => actions.push(Action::Frame),
                _ => {}
            }
        }
        // Digits 1..=8 map onto view modes in order; 0 and 9 are unbound.
        for digit in frame.digits_pressed() {
            let mode = (digit as usize).checked_sub(1).and_then(ViewMode::from_index);
            if let Some(mode) = mode {
                actions.push(Action::ViewMode(mode));
            }
        }

        if let Some((dx, dy)) = input.drag(frame, MouseButton::Left) {
            camera.orbit(-dx * ORBIT_SPEED, dy * ORBIT_SPEED);
        }
        if let Some((dx, dy)) = input.drag(frame, MouseButton::Right) {
            camera.pan(dx, dy);
        }
        if frame.wheel_lines != 0.0 {
            camera.zoom(ZOOM_STEP.powf(frame.wheel_lines));
        }

        let (dx, dy) = frame.pointer_delta;
        let released = frame.button_released(MouseButton::Left);
        if frame.button_pressed(MouseButton::Left) {
            self.press_travel = 0.0;
        }
        if input.button_down(MouseButton::Left) || released {
            self.press_travel += dx.abs() + dy.abs();
        }
        if released && self.press_travel < CLICK_SLOP {
            if let Some((x, y)) = input.pointer_pos {
                actions.push(Action::Pick {
                    x: (x * scale_factor).max(0.0) as u32,
                    y: (y * scale_factor).max(0.0) as u32,
                });
            }
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(frame: &mut InputFrame, key: Key) {
        frame.keys_pressed.insert(key);
    }

    #[test]
    fn digits_select_view_modes() {
        let mut controls = Controls::default();
        let mut camera = Camera::default();
        let mut frame = InputFrame::default();
        press(&mut frame, Key::Digit(8));
        let actions = controls.update(&InputState::default(), &frame, 1.0, &mut camera);
        assert_eq!(actions, [Action::ViewMode(ViewMode::Depth)]);

        let mut frame = InputFrame::default();
        press(&mut frame, Key::Digit(0));
        press(&mut frame, Key::Digit(9));
        assert!(controls.update(&InputState::default(), &frame, 1.0, &mut camera).is_empty());
    }

    #[test]
    fn letter_shortcuts() {
        let mut controls = Controls::default();
        let mut camera = Camera::default();
        let mut frame = InputFrame::default();
        press(&mut frame, Key::Char('o'));
        let actions = controls.update(&InputState::default(), &frame, 1.0, &mut camera);
        assert_eq!(actions, [Action::ToggleSsao]);
    }

    #[test]
    fn short_click_picks_in_physical_pixels() {
        let mut controls = Controls::default();
        let mut camera = Camera::default();
        let input = InputState {
            pointer_pos: Some((10.0, 20.0)),
            ..Default::default()
        };
        let mut frame = InputFrame::default();
        frame.buttons_pressed.insert(MouseButton::Left);
        frame.buttons_released.insert(MouseButton::Left);
        let actions = controls.update(&input, &frame, 2.0, &mut camera);
        assert_eq!(actions, [Action::Pick { x: 20, y: 40 }]);
    }

    #[test]
    fn drag_does_not_pick() {
        let mut controls = Controls::default();
        let mut camera = Camera::default();
        let mut input = InputState {
            pointer_pos: Some((10.0, 20.0)),
            ..Default::default()
        };
        input.buttons_down.insert(MouseButton::Left);

        let mut frame = InputFrame::default();
        frame.buttons_pressed.insert(MouseButton::Left);
        frame.pointer_delta = (30.0, 0.0);
        let yaw = camera.yaw;
        assert!(controls.update(&input, &frame, 1.0, &mut camera).is_empty());
        assert_ne!(camera.yaw, yaw);

        input.buttons_down.clear();
        let mut frame = InputFrame::default();
        frame.buttons_released.insert(MouseButton::Left);
        assert!(controls.update(&input, &frame, 1.0, &mut camera).is_empty());
    }

    #[test]
    fn wheel_zooms_in() {
        let mut controls = Controls::default();
        let mut camera = Camera::default();
        let before = camera.distance;
        let frame = InputFrame {
            wheel_lines: 1.0,
            ..Default::default()
        };
        controls.update(&InputState::default(), &frame, 1.0, &mut camera);
        assert!(camera.distance < before);
    }
}
