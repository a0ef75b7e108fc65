//! Ishtar engine crate.
//!
//! Platform runtime (window, GPU device, input, timing), scene and asset
//! model, the deferred render pipeline and the Gaussian splat stage with its
//! background depth sorter.

pub mod core;
pub mod device;
pub mod input;
pub mod time;
pub mod window;

pub mod assets;
pub mod logging;
pub mod render;
pub mod scene;
pub mod splat;
