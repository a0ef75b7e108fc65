use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec4;

use crate::assets::{Material, Mesh, Model};

use super::Transform;

/// What a renderable draws.
#[derive(Clone)]
pub enum Payload {
    /// A single mesh with one material (cube, sphere, plane, ...).
    Primitive {
        mesh: Arc<Mesh>,
        material: Arc<Material>,
    },
    /// A loaded model: several meshes, each with its own material.
    Model(Arc<Model>),
}

/// Drawable scene entry.
///
/// `uid` is assigned by [`super::Scene`]; 0 means "not in a scene" and is
/// never written to the picking buffer. A `None` payload (still loading,
/// failed to load) is skipped by every pass.
pub struct Renderable {
    pub uid: u32,
    pub name: String,
    pub transform: Transform,
    /// Multiplied into the material diffuse color.
    pub color: Vec4,
    pub visible: bool,
    pub payload: Option<Payload>,
}

/// Shared handle; the scene and the forward list may both hold one.
pub type RenderableRef = Rc<RefCell<Renderable>>;

impl Renderable {
    pub fn new(name: impl Into<String>, payload: Option<Payload>) -> Self {
        Self {
            uid: 0,
            name: name.into(),
            transform: Transform::default(),
            color: Vec4::ONE,
            visible: true,
            payload,
        }
    }

    pub fn primitive(name: impl Into<String>, mesh: Arc<Mesh>, material: Arc<Material>) -> Self {
        Self::new(name, Some(Payload::Primitive { mesh, material }))
    }

    pub fn model(name: impl Into<String>, model: Arc<Model>) -> Self {
        Self::new(name, Some(Payload::Model(model)))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    /// True when the entry has something to draw this frame.
    pub fn is_drawable(&self) -> bool {
        self.visible && self.payload.is_some()
    }
}
