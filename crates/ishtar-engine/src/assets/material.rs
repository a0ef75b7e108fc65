use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::Vec3;

use super::TextureHandle;

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

/// Blinn-Phong surface description.
///
/// Missing maps are substituted with registry defaults at bind time: white
/// for diffuse and specular, flat tangent-space normal for the normal map.
#[derive(Clone)]
pub struct Material {
    id: u64,
    pub name: String,
    pub diffuse_color: Vec3,
    pub specular_color: Vec3,
    pub shininess: f32,
    pub diffuse_map: Option<TextureHandle>,
    pub specular_map: Option<TextureHandle>,
    pub normal_map: Option<TextureHandle>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            diffuse_color: Vec3::splat(0.8),
            specular_color: Vec3::splat(0.5),
            shininess: 32.0,
            diffuse_map: None,
            specular_map: None,
            normal_map: None,
        }
    }

    /// Solid-colored material without maps.
    pub fn colored(name: impl Into<String>, diffuse: Vec3) -> Self {
        Self {
            diffuse_color: diffuse,
            ..Self::new(name)
        }
    }

    /// Process-unique identity, shared by clones. Keys the renderer's bind group cache;
    /// field edits under the same id are picked up on the next frame.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Named materials plus a default, owned by whoever builds the scene.
pub struct MaterialLibrary {
    default: Arc<Material>,
    by_name: HashMap<String, Arc<Material>>,
}

impl Default for MaterialLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self {
            default: Arc::new(Material::new("default")),
            by_name: HashMap::new(),
        }
    }

    pub fn default_material(&self) -> &Arc<Material> {
        &self.default
    }

    /// Inserts (or replaces) a material under its name.
    pub fn insert(&mut self, material: Material) -> Arc<Material> {
        let m = Arc::new(material);
        if self.by_name.insert(m.name.clone(), Arc::clone(&m)).is_some() {
            log::debug!("material '{}' replaced", m.name);
        }
        m
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Material>> {
        self.by_name.get(name)
    }

    /// Looks up `name`, falling back to the default material.
    pub fn get_or_default(&self, name: &str) -> Arc<Material> {
        self.get(name).cloned().unwrap_or_else(|| Arc::clone(&self.default))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Material::new("a");
        let b = Material::new("a");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn clone_keeps_identity() {
        let a = Material::new("a");
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn unknown_name_yields_default() {
        let mut lib = MaterialLibrary::new();
        lib.insert(Material::colored("red", Vec3::X));
        assert_eq!(lib.get_or_default("red").diffuse_color, Vec3::X);
        let fallback = lib.get_or_default("missing");
        assert!(Arc::ptr_eq(&fallback, lib.default_material()));
    }
}
