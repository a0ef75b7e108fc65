//! Screen-space effects run by the post-process chain.

mod bloom;
mod outline;

pub use bloom::BloomEffect;
pub use outline::OutlineEffect;

use crate::assets::GpuTexture;
use crate::render::context::GBuffer;

/// What an effect may touch while recording.
pub struct EffectContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub width: u32,
    pub height: u32,
    pub time: f32,
    pub selected_uid: u32,
    pub gbuffer: Option<&'a GBuffer>,
}

/// One link in the post-process chain. `input` and `output` are distinct
/// `Rgba16Float` targets of the viewport size.
pub trait PostProcessEffect {
    fn name(&self) -> &'static str;

    fn enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// Recreates internal targets. Never called with a zero size.
    fn resize(&mut self, _device: &wgpu::Device, _width: u32, _height: u32) {}

    fn apply(&mut self, ctx: &mut EffectContext<'_>, input: &GpuTexture, output: &GpuTexture);
}
