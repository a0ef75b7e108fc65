//! Deferred renderer.
//!
//! [`RenderPipeline`] owns a fixed sequence of [`RenderPass`]es that share a
//! per-frame [`RenderContext`]. Screen-space passes draw one full-screen
//! triangle and read their inputs with `textureLoad`; every intermediate is
//! viewport-sized.

mod blur;
mod config;
mod context;
mod ctx;
pub mod effects;
mod fullscreen;
mod pass;
pub mod passes;
mod pipeline;
pub mod readback;
mod view_mode;

pub use config::{RenderConfig, Tonemap};
pub use context::{validate_pass_order, GBuffer, MissingInput, PassIo, PassOrderError, RenderContext, Slot};
pub use ctx::{RenderCtx, RenderTarget};
pub use pass::RenderPass;
pub use pipeline::{FrameInputs, FrameOutputs, RenderPipeline};
pub use view_mode::ViewMode;
