//! Per-frame blackboard shared by the passes.
//!
//! The pipeline fills the inputs once per frame. Intermediates start as
//! `None` and are set by the pass that produces them; later passes read them
//! back. Passes never talk to each other directly.

use glam::Mat4;
use thiserror::Error;

use crate::assets::{TextureHandle, TextureRegistry};
use crate::scene::{Camera, Light, RenderableRef};
use crate::splat::SplatStage;

use super::passes::ForwardItem;
use super::{RenderConfig, ViewMode};

/// The geometry pass outputs, all view-space and viewport-sized.
#[derive(Clone)]
pub struct GBuffer {
    /// `Rgba16Float`, w = 1 where geometry was drawn.
    pub position: TextureHandle,
    /// `Rgba16Float`.
    pub normal: TextureHandle,
    /// `Rgba8Unorm`.
    pub diffuse: TextureHandle,
    /// `Rgba8Unorm`.
    pub specular: TextureHandle,
    /// `R16Float`.
    pub shininess: TextureHandle,
    /// `R32Uint`, 0 where nothing was drawn.
    pub uid: TextureHandle,
    /// `Depth32Float`.
    pub depth: TextureHandle,
}

/// A named intermediate in [`RenderContext`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    GBuffer,
    Ssao,
    Lighting,
    PostProcess,
    Display,
}

/// A required intermediate was not produced this frame.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("{0:?} has not been produced this frame")]
pub struct MissingInput(pub Slot);

pub struct RenderContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub textures: &'a TextureRegistry,
    pub config: &'a RenderConfig,

    pub camera: &'a Camera,
    pub view: Mat4,
    pub proj: Mat4,
    pub width: u32,
    pub height: u32,
    /// Seconds since startup.
    pub time: f32,
    /// 0 = nothing selected.
    pub selected_uid: u32,
    pub view_mode: ViewMode,

    pub lights: &'a [Light],
    pub renderables: &'a [RenderableRef],
    pub forward_items: &'a [ForwardItem],
    pub splat_stages: &'a mut [SplatStage],

    /// Presentable target the final pass draws into.
    pub output: &'a wgpu::TextureView,
    pub output_format: wgpu::TextureFormat,

    pub gbuffer: Option<GBuffer>,
    pub ssao: Option<TextureHandle>,
    pub lighting: Option<TextureHandle>,
    pub post_process: Option<TextureHandle>,
    pub display: Option<TextureHandle>,
}

impl<'a> RenderContext<'a> {
    pub fn require_gbuffer(&self) -> Result<GBuffer, MissingInput> {
        self.gbuffer.clone().ok_or(MissingInput(Slot::GBuffer))
    }

    pub fn require_ssao(&self) -> Result<TextureHandle, MissingInput> {
        self.ssao.clone().ok_or(MissingInput(Slot::Ssao))
    }

    pub fn require_lighting(&self) -> Result<TextureHandle, MissingInput> {
        self.lighting.clone().ok_or(MissingInput(Slot::Lighting))
    }

    pub fn require_post_process(&self) -> Result<TextureHandle, MissingInput> {
        self.post_process.clone().ok_or(MissingInput(Slot::PostProcess))
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

// ── pass ordering ─────────────────────────────────────────────────────────

/// Declared slot usage of one pass.
#[derive(Debug, Copy, Clone)]
pub struct PassIo {
    pub name: &'static str,
    pub reads: &'static [Slot],
    pub writes: &'static [Slot],
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("pass `{pass}` reads {slot:?} before any pass writes it")]
pub struct PassOrderError {
    pub pass: &'static str,
    pub slot: Slot,
}

/// Checks that every slot a pass reads was written by an earlier pass.
/// Returns the first violation.
pub fn validate_pass_order(passes: &[PassIo]) -> Result<(), PassOrderError> {
    let mut written: Vec<Slot> = Vec::new();
    for pass in passes {
        if let Some(&slot) = pass.reads.iter().find(|s| !written.contains(s)) {
            return Err(PassOrderError {
                pass: pass.name,
                slot,
            });
        }
        written.extend_from_slice(pass.writes);
    }
    Ok(())
}
