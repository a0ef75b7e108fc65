/// Physical key, independent of keyboard layout.
///
/// Letters are lowercase ASCII in `Char`; numpad digits fold into `Digit`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Space,
    Shift,
    Control,
    Alt,
    Meta,
    Char(char),
    Digit(u8),
    /// Anything else, by platform key code.
    Other(u32),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

/// Held modifier keys.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Pixel wheel deltas (touchpads) are divided by this to get lines.
pub const PIXELS_PER_WHEEL_LINE: f32 = 40.0;

/// Platform-agnostic input produced by the runtime.
///
/// Positions are logical pixels. Wheel motion is already in lines,
/// positive away from the user.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum InputEvent {
    Modifiers(Modifiers),
    Key { key: Key, pressed: bool },
    PointerMoved { x: f32, y: f32 },
    /// Pointer left the window.
    PointerLeft,
    Button { button: MouseButton, pressed: bool },
    Wheel { lines: f32 },
    Focused(bool),
}
