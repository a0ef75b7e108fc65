//! Rasterizes opaque renderables into the G-Buffer.
//!
//! Reads: scene renderables, camera matrices. Writes: `ctx.gbuffer`.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::assets::{GpuTexture, Material, Mesh, TextureHandle, TextureRegistry, Vertex};
use crate::render::context::{GBuffer, RenderContext, Slot};
use crate::render::fullscreen::uniform_buffer;
use crate::render::pass::RenderPass;
use crate::render::readback;
use crate::scene::{normal_matrix, Payload, Renderable};

pub const POSITION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DIFFUSE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const SPECULAR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const SHININESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;
pub const UID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Uint;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct FrameUniform {
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ObjectUniform {
    model_view: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    tint: [f32; 4],
    ids: [u32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
struct MaterialUniform {
    diffuse: [f32; 4],
    specular: [f32; 4],
    params: [f32; 4],
}

struct QueuedDraw {
    slot: u32,
    mesh: Arc<Mesh>,
    material: u64,
}

/// Addresses of the diffuse, specular and normal views a bind group uses.
type TextureKeys = [usize; 3];

/// What a material looks like on the GPU this frame.
struct MaterialState {
    uniform: MaterialUniform,
    maps: [TextureHandle; 3],
}

impl MaterialState {
    fn of(material: &Material, textures: &TextureRegistry) -> Self {
        let pick = |map: &Option<TextureHandle>, fallback: &TextureHandle| {
            Arc::clone(map.as_ref().unwrap_or(fallback))
        };
        Self {
            uniform: MaterialUniform {
                diffuse: material.diffuse_color.extend(1.0).to_array(),
                specular: material.specular_color.extend(1.0).to_array(),
                params: [
                    material.shininess,
                    if material.normal_map.is_some() { 1.0 } else { 0.0 },
                    0.0,
                    0.0,
                ],
            },
            maps: [
                pick(&material.diffuse_map, textures.white()),
                pick(&material.specular_map, textures.white()),
                pick(&material.normal_map, textures.flat_normal()),
            ],
        }
    }

    fn keys(&self) -> TextureKeys {
        self.maps.each_ref().map(|h| Arc::as_ptr(h) as usize)
    }
}

/// How a cached binding must change to match the material's current state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Refresh {
    Keep,
    /// Same textures, new colors or shininess.
    Rewrite,
    /// Missing, or a texture was swapped.
    Rebuild,
}

fn refresh_for(
    cached: Option<(&MaterialUniform, &TextureKeys)>,
    uniform: &MaterialUniform,
    keys: &TextureKeys,
) -> Refresh {
    match cached {
        None => Refresh::Rebuild,
        Some((_, cached_keys)) if cached_keys != keys => Refresh::Rebuild,
        Some((cached_uniform, _)) if cached_uniform != uniform => Refresh::Rewrite,
        Some(_) => Refresh::Keep,
    }
}

struct MaterialBinding {
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    uniform: MaterialUniform,
    keys: TextureKeys,
    /// Holds the bound textures so their addresses stay unique while cached.
    _maps: [TextureHandle; 3],
    /// Uniform changed since it was last uploaded.
    dirty: bool,
    last_used: u64,
}

pub struct GeometryPass {
    width: u32,
    height: u32,
    targets: GBuffer,

    pipeline: wgpu::RenderPipeline,
    frame_ubo: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,

    object_bgl: wgpu::BindGroupLayout,
    object_stride: u64,
    object_capacity: u32,
    object_ubo: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,

    material_bgl: wgpu::BindGroupLayout,
    material_sampler: wgpu::Sampler,
    /// Keyed by `Material::id()`; entries not drawn in a frame are evicted.
    materials: HashMap<u64, MaterialBinding>,
    frame_index: u64,

    objects: Vec<ObjectUniform>,
    draws: Vec<QueuedDraw>,
    view: Mat4,
    has_frame: bool,
}

impl GeometryPass {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ishtar geometry shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/geometry.wgsl").into()),
        });

        let uniform_entry = |binding, dynamic: bool, size: usize| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: dynamic,
                min_binding_size: NonZeroU64::new(size as u64),
            },
            count: None,
        };
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let frame_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ishtar geometry frame bgl"),
            entries: &[uniform_entry(0, false, std::mem::size_of::<FrameUniform>())],
        });
        let object_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ishtar geometry object bgl"),
            entries: &[uniform_entry(0, true, std::mem::size_of::<ObjectUniform>())],
        });
        let material_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ishtar geometry material bgl"),
            entries: &[
                uniform_entry(0, false, std::mem::size_of::<MaterialUniform>()),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ishtar geometry pipeline layout"),
            bind_group_layouts: &[&frame_bgl, &object_bgl, &material_bgl],
            immediate_size: 0,
        });

        let color = |format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        };
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("ishtar geometry pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[
                    color(POSITION_FORMAT),
                    color(NORMAL_FORMAT),
                    color(DIFFUSE_FORMAT),
                    color(SPECULAR_FORMAT),
                    color(SHININESS_FORMAT),
                    color(UID_FORMAT),
                ],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let frame_ubo = uniform_buffer::<FrameUniform>(device, "ishtar geometry frame ubo");
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ishtar geometry frame bind group"),
            layout: &frame_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_ubo.as_entire_binding(),
            }],
        });

        let align = device.limits().min_uniform_buffer_offset_alignment.max(1) as u64;
        let object_stride = (std::mem::size_of::<ObjectUniform>() as u64).div_ceil(align) * align;
        let object_capacity = 64;
        let (object_ubo, object_bind_group) =
            create_object_buffer(device, &object_bgl, object_stride, object_capacity);

        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ishtar material sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            width: width.max(1),
            height: height.max(1),
            targets: create_targets(device, width, height),
            pipeline,
            frame_ubo,
            frame_bind_group,
            object_bgl,
            object_stride,
            object_capacity,
            object_ubo,
            object_bind_group,
            material_bgl,
            material_sampler,
            materials: HashMap::new(),
            frame_index: 0,
            objects: Vec::new(),
            draws: Vec::new(),
            view: Mat4::IDENTITY,
            has_frame: false,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Starts a frame: uploads camera matrices and clears queued draws.
    pub fn begin(&mut self, ctx: &RenderContext<'_>) {
        self.frame_index += 1;
        self.view = ctx.view;
        self.objects.clear();
        self.draws.clear();
        let u = FrameUniform {
            view: ctx.view.to_cols_array_2d(),
            proj: ctx.proj.to_cols_array_2d(),
        };
        ctx.queue.write_buffer(&self.frame_ubo, 0, bytemuck::bytes_of(&u));
    }

    /// Queues `renderable`. Skips it when hidden, unassigned or not loaded.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        textures: &TextureRegistry,
        renderable: &Renderable,
    ) {
        if !renderable.is_drawable() || renderable.uid == 0 {
            return;
        }
        let Some(payload) = renderable.payload.as_ref() else { return };

        let model_view = self.view * renderable.transform.matrix();
        let slot = self.objects.len() as u32;
        self.objects.push(ObjectUniform {
            model_view: model_view.to_cols_array_2d(),
            normal_matrix: normal_matrix(&model_view).to_cols_array_2d(),
            tint: renderable.color.to_array(),
            ids: [renderable.uid, 0, 0, 0],
        });

        match payload {
            Payload::Primitive { mesh, material } => {
                self.queue_draw(device, textures, slot, mesh, material);
            }
            Payload::Model(model) => {
                for part in &model.parts {
                    self.queue_draw(device, textures, slot, &part.mesh, &part.material);
                }
            }
        }
    }

    /// Records the G-Buffer render pass and publishes `ctx.gbuffer`.
    pub fn end(&mut self, ctx: &mut RenderContext<'_>) {
        self.ensure_object_capacity(ctx.device, self.objects.len() as u32);
        if !self.objects.is_empty() {
            let stride = self.object_stride as usize;
            let mut bytes = vec![0u8; stride * self.objects.len()];
            for (i, obj) in self.objects.iter().enumerate() {
                let start = i * stride;
                bytes[start..start + std::mem::size_of::<ObjectUniform>()]
                    .copy_from_slice(bytemuck::bytes_of(obj));
            }
            ctx.queue.write_buffer(&self.object_ubo, 0, &bytes);
        }
        for binding in self.materials.values_mut().filter(|b| b.dirty) {
            ctx.queue
                .write_buffer(&binding.params, 0, bytemuck::bytes_of(&binding.uniform));
            binding.dirty = false;
        }

        {
            let t = &self.targets;
            let clear = |view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            };
            let mut rpass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ishtar geometry pass"),
                color_attachments: &[
                    clear(&t.position.view),
                    clear(&t.normal.view),
                    clear(&t.diffuse.view),
                    clear(&t.specular.view),
                    clear(&t.shininess.view),
                    clear(&t.uid.view),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &t.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.frame_bind_group, &[]);
            for draw in &self.draws {
                let Some(material) = self.materials.get(&draw.material) else { continue };
                let offset = (draw.slot as u64 * self.object_stride) as u32;
                rpass.set_bind_group(1, &self.object_bind_group, &[offset]);
                rpass.set_bind_group(2, &material.bind_group, &[]);
                draw.mesh.draw(&mut rpass);
            }
        }

        let frame = self.frame_index;
        let before = self.materials.len();
        self.materials.retain(|_, b| b.last_used == frame);
        if self.materials.len() < before {
            log::debug!("geometry: evicted {} material bindings", before - self.materials.len());
        }

        log::trace!("geometry: {} objects, {} draws", self.objects.len(), self.draws.len());
        self.has_frame = true;
        ctx.gbuffer = Some(self.targets.clone());
    }

    /// Object id under framebuffer pixel `(x, y)`, top-left origin.
    ///
    /// 0 when nothing is there, the point is outside the target, or no frame
    /// has been drawn yet. Blocks until the GPU has finished the copy.
    pub fn pick(&self, device: &wgpu::Device, queue: &wgpu::Queue, x: u32, y: u32) -> u32 {
        if !self.has_frame {
            return 0;
        }
        match readback::read_u32(device, queue, &self.targets.uid, x, y) {
            Ok(uid) => uid,
            Err(e) => {
                log::debug!("pick at ({x}, {y}) failed: {e}");
                0
            }
        }
    }

    pub fn targets(&self) -> &GBuffer {
        &self.targets
    }

    fn queue_draw(
        &mut self,
        device: &wgpu::Device,
        textures: &TextureRegistry,
        slot: u32,
        mesh: &Arc<Mesh>,
        material: &Material,
    ) {
        let state = MaterialState::of(material, textures);
        let keys = state.keys();
        let cached = self.materials.get(&material.id());
        match refresh_for(cached.map(|b| (&b.uniform, &b.keys)), &state.uniform, &keys) {
            Refresh::Rebuild => {
                let binding = self.create_material_binding(device, &material.name, state);
                self.materials.insert(material.id(), binding);
            }
            Refresh::Rewrite => {
                if let Some(binding) = self.materials.get_mut(&material.id()) {
                    binding.uniform = state.uniform;
                    binding.dirty = true;
                }
            }
            Refresh::Keep => {}
        }
        if let Some(binding) = self.materials.get_mut(&material.id()) {
            binding.last_used = self.frame_index;
        }
        self.draws.push(QueuedDraw {
            slot,
            mesh: Arc::clone(mesh),
            material: material.id(),
        });
    }

    fn create_material_binding(
        &self,
        device: &wgpu::Device,
        name: &str,
        state: MaterialState,
    ) -> MaterialBinding {
        use wgpu::util::DeviceExt;

        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ishtar material params"),
            contents: bytemuck::bytes_of(&state.uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let [diffuse, specular, normal] = &state.maps;
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ishtar material bind group"),
            layout: &self.material_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&diffuse.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&specular.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.material_sampler),
                },
            ],
        });
        log::debug!("material `{name}` bound");

        let keys = state.keys();
        MaterialBinding {
            params,
            bind_group,
            uniform: state.uniform,
            keys,
            _maps: state.maps,
            dirty: false,
            last_used: self.frame_index,
        }
    }

    /// Number of cached material bind groups.
    #[cfg(test)]
    pub(crate) fn cached_materials(&self) -> usize {
        self.materials.len()
    }

    fn ensure_object_capacity(&mut self, device: &wgpu::Device, required: u32) {
        if required <= self.object_capacity {
            return;
        }
        let capacity = required.next_power_of_two();
        let (ubo, bind_group) =
            create_object_buffer(device, &self.object_bgl, self.object_stride, capacity);
        self.object_ubo = ubo;
        self.object_bind_group = bind_group;
        self.object_capacity = capacity;
    }
}

impl RenderPass for GeometryPass {
    fn name(&self) -> &'static str {
        "geometry"
    }

    fn writes(&self) -> &'static [Slot] {
        &[Slot::GBuffer]
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) {
        self.begin(ctx);
        for r in ctx.renderables {
            let r = r.borrow();
            self.render(ctx.device, ctx.textures, &r);
        }
        self.end(ctx);
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.targets = create_targets(device, width, height);
        self.has_frame = false;
    }
}

fn create_targets(device: &wgpu::Device, width: u32, height: u32) -> GBuffer {
    let color = |label, format| Arc::new(GpuTexture::render_target(device, label, width, height, format));
    GBuffer {
        position: color("ishtar gbuffer position", POSITION_FORMAT),
        normal: color("ishtar gbuffer normal", NORMAL_FORMAT),
        diffuse: color("ishtar gbuffer diffuse", DIFFUSE_FORMAT),
        specular: color("ishtar gbuffer specular", SPECULAR_FORMAT),
        shininess: color("ishtar gbuffer shininess", SHININESS_FORMAT),
        uid: color("ishtar gbuffer uid", UID_FORMAT),
        depth: color("ishtar gbuffer depth", DEPTH_FORMAT),
    }
}

fn create_object_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    capacity: u32,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let ubo = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("ishtar geometry object ubo"),
        size: stride * capacity as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("ishtar geometry object bind group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &ubo,
                offset: 0,
                size: NonZeroU64::new(std::mem::size_of::<ObjectUniform>() as u64),
            }),
        }],
    });
    (ubo, bind_group)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(shininess: f32) -> MaterialUniform {
        MaterialUniform {
            diffuse: [1.0, 0.0, 0.0, 1.0],
            specular: [1.0; 4],
            params: [shininess, 0.0, 0.0, 0.0],
        }
    }

    // ── material cache ────────────────────────────────────────────────────

    #[test]
    fn uncached_material_is_built() {
        assert_eq!(refresh_for(None, &uniform(32.0), &[1, 2, 3]), Refresh::Rebuild);
    }

    #[test]
    fn unchanged_material_is_kept() {
        let u = uniform(32.0);
        assert_eq!(refresh_for(Some((&u, &[1, 2, 3])), &u, &[1, 2, 3]), Refresh::Keep);
    }

    #[test]
    fn edited_color_rewrites_the_uniform() {
        let cached = uniform(32.0);
        let mut edited = cached;
        edited.diffuse = [0.0, 1.0, 0.0, 1.0];
        assert_eq!(refresh_for(Some((&cached, &[1, 2, 3])), &edited, &[1, 2, 3]), Refresh::Rewrite);
        assert_eq!(
            refresh_for(Some((&cached, &[1, 2, 3])), &uniform(8.0), &[1, 2, 3]),
            Refresh::Rewrite
        );
    }

    #[test]
    fn swapped_texture_rebuilds_the_bind_group() {
        let u = uniform(32.0);
        assert_eq!(refresh_for(Some((&u, &[1, 2, 3])), &u, &[1, 9, 3]), Refresh::Rebuild);
        assert_eq!(
            refresh_for(Some((&u, &[1, 2, 3])), &uniform(8.0), &[1, 2, 9]),
            Refresh::Rebuild
        );
    }
}
