//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and windows, wires each window to its own
//! `Gpu`, and drives `core::App` once per redraw.

mod runtime;

pub use runtime::{RedrawPolicy, Runtime, RuntimeConfig, RuntimeCtx};
