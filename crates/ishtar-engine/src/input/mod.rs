//! Window input, reduced to what camera controls and shortcuts need.
//!
//! Nothing here exposes winit types; the runtime feeds events in through
//! `translate_window_event`.

mod frame;
mod state;
mod translate;
mod types;

pub use frame::InputFrame;
pub use state::InputState;
pub(crate) use translate::translate_window_event;
pub use types::{InputEvent, Key, Modifiers, MouseButton, PIXELS_PER_WHEEL_LINE};
