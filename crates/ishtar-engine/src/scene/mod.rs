//! Scene description consumed by the render pipeline.
//!
//! Everything here lives on the frame thread: renderables are shared through
//! `Rc<RefCell<_>>` between the scene and the forward list.

mod camera;
mod light;
mod renderable;
mod scene;
mod transform;

pub use camera::Camera;
pub use light::{Light, LightKind};
pub use renderable::{Payload, Renderable, RenderableRef};
pub use scene::Scene;
pub use transform::{normal_matrix, Transform};
