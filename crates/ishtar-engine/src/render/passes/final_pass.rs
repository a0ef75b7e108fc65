//! Presents the selected view to the surface.
//!
//! Reads: whichever intermediate the view mode names. Writes: `ctx.display`
//! and the output view.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::assets::TextureHandle;
use crate::render::config::RenderConfig;
use crate::render::context::{RenderContext, Slot};
use crate::render::fullscreen::{uniform_buffer, FullscreenDesc, FullscreenPipeline, Input};
use crate::render::pass::RenderPass;
use crate::render::ViewMode;

/// How the final shader interprets the display texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Presentation {
    Tonemapped,
    Raw,
    SingleChannel,
    Normal,
    Depth,
}

impl Presentation {
    fn of(mode: ViewMode) -> Self {
        match mode {
            ViewMode::Final => Presentation::Tonemapped,
            ViewMode::Lighting | ViewMode::Position | ViewMode::Diffuse | ViewMode::Specular => {
                Presentation::Raw
            }
            ViewMode::Normal => Presentation::Normal,
            ViewMode::Shininess => Presentation::SingleChannel,
            ViewMode::Depth => Presentation::Depth,
        }
    }

    fn shader_mode(self) -> f32 {
        match self {
            Presentation::Tonemapped => 0.0,
            Presentation::Raw | Presentation::Depth => 1.0,
            Presentation::SingleChannel => 2.0,
            Presentation::Normal => 3.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct FinalUniform {
    params: [f32; 4],
    clip: [f32; 4],
}

impl FinalUniform {
    fn new(config: &RenderConfig, mode: ViewMode, output: wgpu::TextureFormat, near: f32, far: f32) -> Self {
        Self {
            params: [
                config.exposure,
                config.tonemap.shader_index() as f32,
                Presentation::of(mode).shader_mode(),
                if output.is_srgb() { 0.0 } else { 1.0 },
            ],
            clip: [near, far, 0.0, 0.0],
        }
    }
}

struct DisplayPipelines {
    color: FullscreenPipeline,
    depth: FullscreenPipeline,
}

/// The texture a view mode shows, if it was produced this frame.
pub fn resolve_display(ctx: &RenderContext<'_>, mode: ViewMode) -> Option<TextureHandle> {
    let gb = ctx.gbuffer.as_ref();
    match mode {
        ViewMode::Final => ctx.post_process.clone(),
        ViewMode::Lighting => ctx.lighting.clone(),
        ViewMode::Position => gb.map(|g| g.position.clone()),
        ViewMode::Normal => gb.map(|g| g.normal.clone()),
        ViewMode::Diffuse => gb.map(|g| g.diffuse.clone()),
        ViewMode::Specular => gb.map(|g| g.specular.clone()),
        ViewMode::Shininess => gb.map(|g| g.shininess.clone()),
        ViewMode::Depth => gb.map(|g| g.depth.clone()),
    }
}

pub struct FinalPass {
    uniform: wgpu::Buffer,
    pipelines: HashMap<wgpu::TextureFormat, DisplayPipelines>,
    warned_missing: bool,
}

impl FinalPass {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            uniform: uniform_buffer::<FinalUniform>(device, "ishtar final params"),
            pipelines: HashMap::new(),
            warned_missing: false,
        }
    }

    fn clear(ctx: &mut RenderContext<'_>) {
        ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ishtar final clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }
}

fn pipelines_for<'p>(
    cache: &'p mut HashMap<wgpu::TextureFormat, DisplayPipelines>,
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
) -> &'p DisplayPipelines {
    cache.entry(format).or_insert_with(|| {
        log::debug!("creating final pipelines for {format:?}");
        let size = Some(std::mem::size_of::<FinalUniform>() as u64);
        DisplayPipelines {
            color: FullscreenPipeline::new(
                device,
                &FullscreenDesc {
                    label: "ishtar final",
                    fragment_src: include_str!("../shaders/final.wgsl"),
                    inputs: &[Input::Float],
                    uniform_size: size,
                    target: format,
                    blend: None,
                },
            ),
            depth: FullscreenPipeline::new(
                device,
                &FullscreenDesc {
                    label: "ishtar final depth",
                    fragment_src: include_str!("../shaders/final_depth.wgsl"),
                    inputs: &[Input::Depth],
                    uniform_size: size,
                    target: format,
                    blend: None,
                },
            ),
        }
    })
}

impl RenderPass for FinalPass {
    fn name(&self) -> &'static str {
        "final"
    }

    fn reads(&self) -> &'static [Slot] {
        &[Slot::PostProcess]
    }

    fn writes(&self) -> &'static [Slot] {
        &[Slot::Display]
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) {
        let mode = ctx.view_mode;
        ctx.display = resolve_display(ctx, mode);
        let Some(display) = ctx.display.clone() else {
            if !self.warned_missing {
                log::warn!("nothing to display for view mode {}", mode.label());
                self.warned_missing = true;
            }
            return Self::clear(ctx);
        };

        let u = FinalUniform::new(
            ctx.config,
            mode,
            ctx.output_format,
            ctx.camera.z_near,
            ctx.camera.z_far,
        );
        ctx.queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(&u));

        let (device, output_format) = (ctx.device, ctx.output_format);
        let pipelines = pipelines_for(&mut self.pipelines, device, output_format);
        let pipeline = if Presentation::of(mode) == Presentation::Depth {
            &pipelines.depth
        } else {
            &pipelines.color
        };
        let bg = pipeline.bind_group(device, &[&display.view], Some(&self.uniform));
        pipeline.draw(ctx.encoder, ctx.output, wgpu::LoadOp::Clear(wgpu::Color::BLACK), &bg);
    }
}
