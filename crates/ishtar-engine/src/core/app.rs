use winit::event::WindowEvent;
use winit::window::WindowId;

use super::ctx::FrameCtx;

/// Returned by every app callback.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// What the runtime drives: the viewer, or a test harness.
pub trait App {
    /// Raw window event, seen after input state absorbed it.
    fn on_window_event(&mut self, window_id: WindowId, event: &WindowEvent) -> AppControl {
        let _ = (window_id, event);
        AppControl::Continue
    }

    /// One presented frame. Not called while the window is minimized.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;

    /// Runs once before the window and its device are dropped. GPU-owning
    /// state and background workers should be released here.
    fn on_exit(&mut self) {}
}
