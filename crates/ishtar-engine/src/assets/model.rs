use std::sync::Arc;

use glam::Vec3;

use super::{Material, Mesh};

/// One mesh of a model with the material it is drawn with.
pub struct ModelPart {
    pub mesh: Arc<Mesh>,
    pub material: Arc<Material>,
}

/// A loaded multi-part model.
pub struct Model {
    pub name: String,
    pub parts: Vec<ModelPart>,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
}

impl Model {
    pub fn new(name: impl Into<String>, parts: Vec<ModelPart>) -> Self {
        let (bounds_min, bounds_max) = parts
            .iter()
            .map(|p| (p.mesh.bounds_min, p.mesh.bounds_max))
            .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
            .unwrap_or((Vec3::ZERO, Vec3::ZERO));
        Self {
            name: name.into(),
            parts,
            bounds_min,
            bounds_max,
        }
    }
}
