//! Asset types and loaders: textures, meshes, materials and OBJ models.
//!
//! Textures are shared `Arc` handles; GPU memory is released when the last
//! holder drops. Splat clouds live in `crate::splat`.

mod error;
mod material;
mod mesh;
mod model;
pub mod obj;
pub mod primitives;
mod texture;

pub use error::{LoadError, LoadResult};
pub use material::{Material, MaterialLibrary};
pub use mesh::{Mesh, MeshData, Vertex};
pub use model::{Model, ModelPart};
pub use obj::load_obj;
pub use texture::{
    GpuTexture, TextureHandle, TextureRegistry, BLACK_TEXEL, FLAT_NORMAL_TEXEL, WHITE_TEXEL,
};
