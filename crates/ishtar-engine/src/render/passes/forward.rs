//! Forward-shaded objects drawn over the post-processed image.
//!
//! Reads: `ctx.post_process`, `ctx.gbuffer` (depth). Draws in submission
//! order; transparent items are not sorted.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::assets::{Mesh, Vertex};
use crate::render::context::{RenderContext, Slot};
use crate::render::pass::RenderPass;
use crate::scene::{normal_matrix, Payload, RenderableRef};

use super::geometry::DEPTH_FORMAT;
use super::lighting::HDR_FORMAT;
use super::ssao::warn_missing;

static NEXT_SHADER_ID: AtomicU64 = AtomicU64::new(1);

/// WGSL program for forward items.
///
/// The module must export `vs_main` and `fs_main`, take [`Vertex`] at
/// locations 0..=2 and declare at `@group(0) @binding(0)`:
///
/// ```wgsl
/// struct ForwardObject {
///     model_view: mat4x4<f32>,
///     proj: mat4x4<f32>,
///     normal_matrix: mat4x4<f32>,
///     tint: vec4<f32>,
///     params: vec4<f32>, // x: seconds since startup
/// };
/// ```
#[derive(Debug)]
pub struct ForwardShader {
    id: u64,
    pub label: String,
    pub source: String,
}

impl ForwardShader {
    pub fn new(label: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: NEXT_SHADER_ID.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
            source: source.into(),
        }
    }

    /// Rim glow tinted by the renderable color.
    pub fn fresnel() -> Self {
        Self::new(
            "ishtar forward fresnel",
            include_str!("../shaders/forward_fresnel.wgsl"),
        )
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Alpha,
    Additive,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ForwardRenderState {
    pub blend_mode: BlendMode,
    pub blending: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub cull_face: bool,
}

impl Default for ForwardRenderState {
    fn default() -> Self {
        Self {
            blend_mode: BlendMode::Alpha,
            blending: true,
            depth_test: true,
            depth_write: false,
            cull_face: false,
        }
    }
}

impl ForwardRenderState {
    fn blend(&self) -> Option<wgpu::BlendState> {
        if !self.blending {
            return None;
        }
        Some(match self.blend_mode {
            BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
            BlendMode::Additive => wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::Zero,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            },
        })
    }

    fn depth_compare(&self) -> wgpu::CompareFunction {
        if self.depth_test {
            wgpu::CompareFunction::Less
        } else {
            wgpu::CompareFunction::Always
        }
    }
}

/// One forward-rendered entry. `shader: None` uses [`ForwardShader::fresnel`].
#[derive(Clone)]
pub struct ForwardItem {
    pub renderable: RenderableRef,
    pub shader: Option<Arc<ForwardShader>>,
    pub state: ForwardRenderState,
}

impl ForwardItem {
    pub fn new(renderable: RenderableRef) -> Self {
        Self {
            renderable,
            shader: None,
            state: ForwardRenderState::default(),
        }
    }

    pub fn with_shader(mut self, shader: Arc<ForwardShader>) -> Self {
        self.shader = Some(shader);
        self
    }

    pub fn with_state(mut self, state: ForwardRenderState) -> Self {
        self.state = state;
        self
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ForwardObject {
    model_view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    tint: [f32; 4],
    params: [f32; 4],
}

type PipelineKey = (u64, ForwardRenderState);

struct ForwardDraw {
    slot: u32,
    mesh: Arc<Mesh>,
    key: PipelineKey,
}

pub struct ForwardPass {
    default_shader: Arc<ForwardShader>,
    bgl: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    modules: HashMap<u64, wgpu::ShaderModule>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    stride: u64,
    capacity: u32,
    ubo: wgpu::Buffer,
    bind_group: wgpu::BindGroup,

    objects: Vec<ForwardObject>,
    draws: Vec<ForwardDraw>,
    warned_missing: bool,
}

impl ForwardPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ishtar forward object bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<ForwardObject>() as u64),
                },
                count: None,
            }],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ishtar forward pipeline layout"),
            bind_group_layouts: &[&bgl],
            immediate_size: 0,
        });

        let align = device.limits().min_uniform_buffer_offset_alignment.max(1) as u64;
        let stride = (std::mem::size_of::<ForwardObject>() as u64).div_ceil(align) * align;
        let capacity = 16;
        let (ubo, bind_group) = create_object_buffer(device, &bgl, stride, capacity);

        Self {
            default_shader: Arc::new(ForwardShader::fresnel()),
            bgl,
            layout,
            modules: HashMap::new(),
            pipelines: HashMap::new(),
            stride,
            capacity,
            ubo,
            bind_group,
            objects: Vec::new(),
            draws: Vec::new(),
            warned_missing: false,
        }
    }

    pub fn cached_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device, shader: &ForwardShader, state: ForwardRenderState) {
        let key = (shader.id(), state);
        if self.pipelines.contains_key(&key) {
            return;
        }
        let module = self.modules.entry(shader.id()).or_insert_with(|| {
            log::debug!("compiling forward shader `{}`", shader.label);
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&shader.label),
                source: wgpu::ShaderSource::Wgsl(shader.source.as_str().into()),
            })
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&shader.label),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: state.blend(),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: state.cull_face.then_some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: state.depth_write,
                depth_compare: state.depth_compare(),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        self.pipelines.insert(key, pipeline);
    }

    fn ensure_capacity(&mut self, device: &wgpu::Device, required: u32) {
        if required <= self.capacity {
            return;
        }
        self.capacity = required.next_power_of_two();
        (self.ubo, self.bind_group) = create_object_buffer(device, &self.bgl, self.stride, self.capacity);
    }

    /// Collects uniforms and draws for the visible, loaded items.
    fn collect(&mut self, ctx: &RenderContext<'_>) {
        self.objects.clear();
        self.draws.clear();

        for item in ctx.forward_items {
            let r = item.renderable.borrow();
            if !r.is_drawable() {
                continue;
            }
            let Some(payload) = r.payload.as_ref() else { continue };
            let shader = Arc::clone(item.shader.as_ref().unwrap_or(&self.default_shader));
            self.ensure_pipeline(ctx.device, &shader, item.state);

            let model_view = ctx.view * r.transform.matrix();
            let base = ForwardObject {
                model_view: model_view.to_cols_array_2d(),
                proj: ctx.proj.to_cols_array_2d(),
                normal_matrix: normal_matrix(&model_view).to_cols_array_2d(),
                tint: r.color.to_array(),
                params: [ctx.time, 0.0, 0.0, 0.0],
            };
            let key = (shader.id(), item.state);
            let mut push = |mesh: &Arc<Mesh>| {
                self.draws.push(ForwardDraw {
                    slot: self.objects.len() as u32,
                    mesh: Arc::clone(mesh),
                    key,
                });
                self.objects.push(base);
            };
            match payload {
                Payload::Primitive { mesh, .. } => push(mesh),
                Payload::Model(model) => model.parts.iter().for_each(|p| push(&p.mesh)),
            }
        }
    }
}

impl RenderPass for ForwardPass {
    fn name(&self) -> &'static str {
        "forward"
    }

    fn reads(&self) -> &'static [Slot] {
        &[Slot::PostProcess, Slot::GBuffer]
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) {
        if ctx.forward_items.is_empty() {
            return;
        }
        let (target, gb) = match (ctx.require_post_process(), ctx.require_gbuffer()) {
            (Ok(t), Ok(gb)) => (t, gb),
            (Err(e), _) | (_, Err(e)) => {
                return warn_missing(self.name(), &mut self.warned_missing, e)
            }
        };

        self.collect(ctx);
        if self.draws.is_empty() {
            return;
        }
        self.ensure_capacity(ctx.device, self.objects.len() as u32);
        let stride = self.stride as usize;
        let mut bytes = vec![0u8; stride * self.objects.len()];
        for (i, obj) in self.objects.iter().enumerate() {
            bytes[i * stride..i * stride + std::mem::size_of::<ForwardObject>()]
                .copy_from_slice(bytemuck::bytes_of(obj));
        }
        ctx.queue.write_buffer(&self.ubo, 0, &bytes);

        let mut rpass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ishtar forward pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &gb.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        for draw in &self.draws {
            let Some(pipeline) = self.pipelines.get(&draw.key) else { continue };
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[(draw.slot as u64 * self.stride) as u32]);
            draw.mesh.draw(&mut rpass);
        }
    }
}

fn create_object_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    capacity: u32,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let ubo = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("ishtar forward object ubo"),
        size: stride * capacity as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("ishtar forward object bind group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &ubo,
                offset: 0,
                size: NonZeroU64::new(std::mem::size_of::<ForwardObject>() as u64),
            }),
        }],
    });
    (ubo, bind_group)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state() {
        let s = ForwardRenderState::default();
        assert_eq!(s.blend_mode, BlendMode::Alpha);
        assert!(s.blending && s.depth_test);
        assert!(!s.depth_write && !s.cull_face);
    }

    #[test]
    fn blending_off_means_opaque() {
        let s = ForwardRenderState {
            blending: false,
            ..Default::default()
        };
        assert!(s.blend().is_none());
    }

    #[test]
    fn additive_keeps_destination() {
        let s = ForwardRenderState {
            blend_mode: BlendMode::Additive,
            ..Default::default()
        };
        let b = s.blend().map(|b| b.color);
        assert_eq!(b.map(|c| c.dst_factor), Some(wgpu::BlendFactor::One));
    }

    #[test]
    fn depth_test_off_always_passes() {
        let s = ForwardRenderState {
            depth_test: false,
            ..Default::default()
        };
        assert_eq!(s.depth_compare(), wgpu::CompareFunction::Always);
    }

    #[test]
    fn shader_ids_are_unique() {
        let a = ForwardShader::fresnel();
        let b = ForwardShader::fresnel();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn object_uniform_size() {
        assert_eq!(std::mem::size_of::<ForwardObject>(), 224);
    }
}
