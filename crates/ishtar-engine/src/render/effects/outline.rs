use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::assets::GpuTexture;
use crate::render::fullscreen::{uniform_buffer, FullscreenDesc, FullscreenPipeline, Input};
use crate::render::passes::HDR_FORMAT;

use super::{EffectContext, PostProcessEffect};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct OutlineUniform {
    color: [f32; 4],
    params: [f32; 4],
    selected: [u32; 4],
}

/// Draws `color` around the selected object.
pub struct OutlineEffect {
    /// Alpha controls how strongly the outline covers the image.
    pub color: Vec4,
    /// In pixels, capped at 8 in the shader.
    pub width: f32,
    pub depth_threshold: f32,
    /// `1 - cos(angle)` between neighbouring normals.
    pub normal_threshold: f32,
    enabled: bool,

    pipeline: FullscreenPipeline,
    copy: FullscreenPipeline,
    uniform: wgpu::Buffer,
}

impl OutlineEffect {
    pub const NAME: &'static str = "Outline";

    pub fn new(device: &wgpu::Device) -> Self {
        let pipeline = FullscreenPipeline::new(
            device,
            &FullscreenDesc {
                label: "ishtar outline",
                fragment_src: include_str!("../shaders/outline.wgsl"),
                inputs: &[Input::Float, Input::Uint, Input::Depth, Input::Float],
                uniform_size: Some(std::mem::size_of::<OutlineUniform>() as u64),
                target: HDR_FORMAT,
                blend: None,
            },
        );
        Self {
            color: Vec4::new(1.0, 0.6, 0.1, 1.0),
            width: 2.0,
            depth_threshold: 0.002,
            normal_threshold: 0.3,
            enabled: true,
            pipeline,
            copy: copy_pipeline(device, "ishtar outline copy"),
            uniform: uniform_buffer::<OutlineUniform>(device, "ishtar outline params"),
        }
    }

    fn uniform(&self, selected: u32) -> OutlineUniform {
        OutlineUniform {
            color: self.color.to_array(),
            params: [self.width.max(0.0), self.depth_threshold, self.normal_threshold, 0.0],
            selected: [selected, 0, 0, 0],
        }
    }
}

pub(crate) fn copy_pipeline(device: &wgpu::Device, label: &str) -> FullscreenPipeline {
    FullscreenPipeline::new(
        device,
        &FullscreenDesc {
            label,
            fragment_src: include_str!("../shaders/copy.wgsl"),
            inputs: &[Input::Float],
            uniform_size: None,
            target: HDR_FORMAT,
            blend: None,
        },
    )
}

impl PostProcessEffect for OutlineEffect {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn apply(&mut self, ctx: &mut EffectContext<'_>, input: &GpuTexture, output: &GpuTexture) {
        let clear = wgpu::LoadOp::Clear(wgpu::Color::BLACK);
        let gbuffer = match ctx.gbuffer {
            Some(gb) if ctx.selected_uid != 0 => gb,
            _ => {
                let bg = self.copy.bind_group(ctx.device, &[&input.view], None);
                self.copy.draw(ctx.encoder, &output.view, clear, &bg);
                return;
            }
        };

        let u = self.uniform(ctx.selected_uid);
        ctx.queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(&u));
        let bg = self.pipeline.bind_group(
            ctx.device,
            &[
                &input.view,
                &gbuffer.uid.view,
                &gbuffer.depth.view,
                &gbuffer.normal.view,
            ],
            Some(&self.uniform),
        );
        self.pipeline.draw(ctx.encoder, &output.view, clear, &bg);
    }
}
