//! Gaussian splat clouds: loading, background depth sorting and drawing.
//!
//! A [`SplatStage`] owns one [`PointCloud`] and one sort worker. The frame
//! thread only ever posts views and swaps in finished orders; it never waits
//! on a sort.

mod coordinator;
mod error;
pub mod ply;
mod point;
pub mod sort;
mod stage;

pub use coordinator::{SortCoordinator, SortPhase};
pub use error::SplatError;
pub use ply::{load_ply, parse_ply, PlyOptions};
pub use point::{sh_dc_to_rgb, GaussianPoint, PointCloud, SH_C0};
pub use sort::{DepthSorter, SortAlgorithm};
pub use stage::{GpuSplat, SplatConfig, SplatStage};
