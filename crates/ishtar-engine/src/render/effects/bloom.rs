use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::assets::{GpuTexture, TextureHandle};
use crate::render::blur::{Kernel, SeparableBlur};
use crate::render::fullscreen::{uniform_buffer, FullscreenDesc, FullscreenPipeline, Input};
use crate::render::passes::HDR_FORMAT;

use super::{EffectContext, PostProcessEffect};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct BloomUniform {
    params: [f32; 4],
}

/// Glow around pixels brighter than `threshold`.
pub struct BloomEffect {
    pub threshold: f32,
    pub intensity: f32,
    /// Horizontal + vertical blur rounds over the bright pass.
    pub iterations: u32,
    enabled: bool,

    threshold_pipeline: FullscreenPipeline,
    composite_pipeline: FullscreenPipeline,
    blur: SeparableBlur,
    uniform: wgpu::Buffer,
    bright: TextureHandle,
    scratch: TextureHandle,
}

impl BloomEffect {
    pub const NAME: &'static str = "Bloom";

    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) -> Self {
        let size = Some(std::mem::size_of::<BloomUniform>() as u64);
        let threshold_pipeline = FullscreenPipeline::new(
            device,
            &FullscreenDesc {
                label: "ishtar bloom threshold",
                fragment_src: include_str!("../shaders/bloom_threshold.wgsl"),
                inputs: &[Input::Float],
                uniform_size: size,
                target: HDR_FORMAT,
                blend: None,
            },
        );
        let composite_pipeline = FullscreenPipeline::new(
            device,
            &FullscreenDesc {
                label: "ishtar bloom composite",
                fragment_src: include_str!("../shaders/bloom_composite.wgsl"),
                inputs: &[Input::Float, Input::Float],
                uniform_size: size,
                target: HDR_FORMAT,
                blend: None,
            },
        );
        let (bright, scratch) = create_targets(device, width, height);
        Self {
            threshold: 1.0,
            intensity: 0.5,
            iterations: 5,
            enabled: true,
            threshold_pipeline,
            composite_pipeline,
            blur: SeparableBlur::new(device, queue, "ishtar bloom blur", Kernel::Gaussian, HDR_FORMAT),
            uniform: uniform_buffer::<BloomUniform>(device, "ishtar bloom params"),
            bright,
            scratch,
        }
    }
}

fn create_targets(device: &wgpu::Device, width: u32, height: u32) -> (TextureHandle, TextureHandle) {
    let t = |label| Arc::new(GpuTexture::render_target(device, label, width, height, HDR_FORMAT));
    (t("ishtar bloom bright"), t("ishtar bloom scratch"))
}

impl PostProcessEffect for BloomEffect {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        (self.bright, self.scratch) = create_targets(device, width, height);
    }

    fn apply(&mut self, ctx: &mut EffectContext<'_>, input: &GpuTexture, output: &GpuTexture) {
        let u = BloomUniform {
            params: [self.threshold, self.intensity, 0.0, 0.0],
        };
        ctx.queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(&u));

        let bg = self
            .threshold_pipeline
            .bind_group(ctx.device, &[&input.view], Some(&self.uniform));
        self.threshold_pipeline.draw(
            ctx.encoder,
            &self.bright.view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &bg,
        );

        for _ in 0..self.iterations {
            self.blur
                .run(ctx.device, ctx.encoder, &self.bright, &self.scratch, &self.bright);
        }

        let bg = self.composite_pipeline.bind_group(
            ctx.device,
            &[&input.view, &self.bright.view],
            Some(&self.uniform),
        );
        self.composite_pipeline.draw(
            ctx.encoder,
            &output.view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &bg,
        );
    }
}
