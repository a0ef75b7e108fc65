use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use super::coordinator::SortCoordinator;
use super::point::sh_dc_to_rgb;
use super::sort::SortAlgorithm;
use super::{PointCloud, SplatError};
use crate::render::{RenderCtx, RenderTarget};

/// Per-stage splat settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SplatConfig {
    pub algorithm: SortAlgorithm,
    /// Histogram resolution override; `None` derives it from the point count.
    pub bucket_bits: Option<u32>,
    /// Multiplier on every Gaussian's extent.
    pub scale_modifier: f32,
}

impl Default for SplatConfig {
    fn default() -> Self {
        Self {
            algorithm: SortAlgorithm::Histogram,
            bucket_bits: None,
            scale_modifier: 1.0,
        }
    }
}

/// GPU record for one splat. Matches `Splat` in `shaders/splat.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct GpuSplat {
    pub pos_opacity: [f32; 4],
    pub scale: [f32; 4],
    /// xyzw.
    pub rotation: [f32; 4],
    pub color: [f32; 4],
}

impl GpuSplat {
    fn from_point(p: &super::GaussianPoint) -> Self {
        let [r, g, b] = sh_dc_to_rgb(p.sh_dc);
        Self {
            pos_opacity: [p.position.x, p.position.y, p.position.z, p.opacity],
            scale: [p.scale.x, p.scale.y, p.scale.z, 0.0],
            rotation: p.rotation.to_array(),
            color: [r, g, b, 1.0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct SplatCameraUniform {
    view_model: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
    /// viewport width/height, focal x/y in pixels.
    viewport_focal: [f32; 4],
    /// x: scale modifier.
    params: [f32; 4],
}

/// Draws one point cloud as depth-sorted, alpha-blended Gaussians.
///
/// Sorting runs on a background [`SortCoordinator`]; each frame draws with
/// the newest finished order, which may trail the camera by one sort.
pub struct SplatStage {
    config: SplatConfig,
    cloud: Arc<PointCloud>,
    model: Mat4,
    coordinator: Option<SortCoordinator>,
    last_request: Option<Mat4>,
    available: bool,

    shader: Option<wgpu::ShaderModule>,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    pipelines: HashMap<(wgpu::TextureFormat, bool), wgpu::RenderPipeline>,

    camera_ubo: Option<wgpu::Buffer>,
    splat_buffer: Option<wgpu::Buffer>,
    order_buffer: Option<wgpu::Buffer>,
    bind_group: Option<wgpu::BindGroup>,
}

impl SplatStage {
    pub fn new(config: SplatConfig) -> Self {
        Self {
            config,
            cloud: Arc::new(PointCloud::default()),
            model: Mat4::IDENTITY,
            coordinator: None,
            last_request: None,
            available: true,
            shader: None,
            bind_group_layout: None,
            pipelines: HashMap::new(),
            camera_ubo: None,
            splat_buffer: None,
            order_buffer: None,
            bind_group: None,
        }
    }

    pub fn config(&self) -> &SplatConfig {
        &self.config
    }

    /// Takes effect for the next draw; sort settings apply on the next load.
    pub fn set_scale_modifier(&mut self, scale: f32) {
        self.config.scale_modifier = scale.max(0.0);
    }

    pub fn model(&self) -> Mat4 {
        self.model
    }

    pub fn set_model(&mut self, model: Mat4) {
        self.model = model;
    }

    /// False after a failed load; the stage draws nothing until the next
    /// successful one.
    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn point_count(&self) -> usize {
        self.cloud.len()
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.cloud.bounds()
    }

    pub fn cloud(&self) -> &Arc<PointCloud> {
        &self.cloud
    }

    /// Replaces the cloud: stops the old worker, uploads the new points and
    /// sorts once for the last known view before handing off to a new worker.
    pub fn load_points(&mut self, ctx: &RenderCtx<'_>, cloud: PointCloud) -> Result<(), SplatError> {
        // Joins the previous worker.
        self.coordinator = None;
        self.splat_buffer = None;
        self.order_buffer = None;
        self.bind_group = None;
        self.cloud = Arc::new(PointCloud::default());
        self.available = false;

        let n = cloud.len();
        if u32::try_from(n).is_err() {
            return Err(SplatError::TooManyPoints(n));
        }
        let cloud = Arc::new(cloud);

        if n > 0 {
            let limits = ctx.device.limits();
            let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
            let requested = (n * std::mem::size_of::<GpuSplat>()) as u64;
            if requested > limit {
                return Err(SplatError::BufferTooLarge { requested, limit });
            }

            let records: Vec<GpuSplat> = cloud.points().iter().map(GpuSplat::from_point).collect();
            let splat_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("ishtar splat buffer"),
                contents: bytemuck::cast_slice(&records),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            });

            let coordinator = SortCoordinator::spawn(
                Arc::clone(&cloud),
                self.config.algorithm,
                self.config.bucket_bits,
                self.last_request,
            )?;
            let order_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("ishtar splat order buffer"),
                contents: bytemuck::cast_slice(coordinator.current_order()),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            });

            self.splat_buffer = Some(splat_buffer);
            self.order_buffer = Some(order_buffer);
            self.coordinator = Some(coordinator);
        }

        let (lo, hi) = cloud.bounds();
        let center = cloud.center();
        let radius = (hi - lo).length() * 0.5;
        log::info!(
            "splat cloud: {n} points, bounds {lo:?}..{hi:?}, centre {center:?}, suggested camera {:?}",
            center + Vec3::new(0.0, 0.0, radius.max(1.0) * 2.0)
        );

        self.cloud = cloud;
        self.available = true;
        Ok(())
    }

    /// Picks up a finished sort, requests a new one for this view and draws
    /// onto `target`. Depth, when present, is tested but not written.
    pub fn update_and_draw(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        view: &Mat4,
        proj: &Mat4,
        model: &Mat4,
    ) {
        if !self.available || self.cloud.is_empty() {
            return;
        }
        let view_model = *view * *model;

        if let (Some(coordinator), Some(order_buffer)) =
            (self.coordinator.as_mut(), self.order_buffer.as_ref())
        {
            if coordinator.try_consume_latest() {
                ctx.queue.write_buffer(
                    order_buffer,
                    0,
                    bytemuck::cast_slice(coordinator.current_order()),
                );
            }
            if self.last_request != Some(view_model) {
                coordinator.request_sort(view_model);
                self.last_request = Some(view_model);
            }
        }

        let has_depth = target.depth_view.is_some();
        self.ensure_pipeline(ctx.device, target.format, has_depth);
        self.ensure_bindings(ctx.device);
        self.write_camera(ctx, &view_model, proj);

        let Some(pipeline) = self.pipelines.get(&(target.format, has_depth)) else { return };
        let Some(bind_group) = self.bind_group.as_ref() else { return };

        let depth_stencil_attachment =
            target
                .depth_view
                .map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: None,
                    stencil_ops: None,
                });

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ishtar splat pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.draw(0..4, 0..self.cloud.len() as u32);
    }

    fn write_camera(&self, ctx: &RenderCtx<'_>, view_model: &Mat4, proj: &Mat4) {
        let Some(ubo) = self.camera_ubo.as_ref() else { return };
        let (w, h) = (ctx.width.max(1) as f32, ctx.height.max(1) as f32);
        let u = SplatCameraUniform {
            view_model: view_model.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            viewport_focal: [w, h, proj.x_axis.x * w * 0.5, proj.y_axis.y * h * 0.5],
            params: [self.config.scale_modifier, 0.0, 0.0, 0.0],
        };
        ctx.queue.write_buffer(ubo, 0, bytemuck::bytes_of(&u));
    }

    fn ensure_layout(&mut self, device: &wgpu::Device) {
        if self.bind_group_layout.is_some() {
            return;
        }
        let storage = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        self.bind_group_layout = Some(device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some("ishtar splat bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(
                                std::mem::size_of::<SplatCameraUniform>() as u64,
                            ),
                        },
                        count: None,
                    },
                    storage(1),
                    storage(2),
                ],
            },
        ));
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat, has_depth: bool) {
        if self.pipelines.contains_key(&(format, has_depth)) {
            return;
        }
        self.ensure_layout(device);
        let Some(bgl) = self.bind_group_layout.as_ref() else { return };

        let shader = self.shader.get_or_insert_with(|| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("ishtar splat shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/splat.wgsl").into()),
            })
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ishtar splat pipeline layout"),
            bind_group_layouts: &[bgl],
            immediate_size: 0,
        });

        let depth_stencil = has_depth.then(|| wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("ishtar splat pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!("splat pipeline built for {format:?} (depth: {has_depth})");
        self.pipelines.insert((format, has_depth), pipeline);
    }

    fn ensure_bindings(&mut self, device: &wgpu::Device) {
        if self.bind_group.is_some() {
            return;
        }
        let (Some(bgl), Some(splats), Some(order)) = (
            self.bind_group_layout.as_ref(),
            self.splat_buffer.as_ref(),
            self.order_buffer.as_ref(),
        ) else {
            return;
        };

        let ubo = self.camera_ubo.get_or_insert_with(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("ishtar splat camera ubo"),
                size: std::mem::size_of::<SplatCameraUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ishtar splat bind group"),
            layout: bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ubo.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: splats.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: order.as_entire_binding(),
                },
            ],
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessGpu;
    use crate::splat::GaussianPoint;

    fn small_cloud(n: usize) -> PointCloud {
        PointCloud::new(
            (0..n)
                .map(|i| GaussianPoint::at(Vec3::new(i as f32, 0.0, -(i as f32))))
                .collect(),
        )
    }

    // ── records ───────────────────────────────────────────────────────────

    #[test]
    fn gpu_splat_is_four_vec4() {
        assert_eq!(std::mem::size_of::<GpuSplat>(), 64);
        assert_eq!(std::mem::size_of::<SplatCameraUniform>(), 160);
    }

    #[test]
    fn gpu_splat_packs_color_and_rotation() {
        let p = GaussianPoint {
            opacity: 0.25,
            ..GaussianPoint::at(Vec3::new(1.0, 2.0, 3.0))
        };
        let g = GpuSplat::from_point(&p);
        assert_eq!(g.pos_opacity, [1.0, 2.0, 3.0, 0.25]);
        assert_eq!(g.rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(g.color, [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn default_config() {
        let c = SplatConfig::default();
        assert_eq!(c.algorithm, SortAlgorithm::Histogram);
        assert_eq!(c.bucket_bits, None);
        assert_eq!(c.scale_modifier, 1.0);
    }

    // ── gpu ───────────────────────────────────────────────────────────────

    #[test]
    fn load_and_draw_offscreen() {
        let Some(gpu) = HeadlessGpu::new() else {
            eprintln!("no GPU adapter; skipping");
            return;
        };
        let format = wgpu::TextureFormat::Rgba16Float;
        let ctx = gpu.render_ctx(format, 64, 64);
        let mut stage = SplatStage::new(SplatConfig::default());
        stage.load_points(&ctx, small_cloud(100)).unwrap();
        assert!(stage.is_available());
        assert_eq!(stage.point_count(), 100);

        let color = crate::assets::GpuTexture::render_target(&gpu.device, "splat test", 64, 64, format);
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut target = RenderTarget::new(&mut encoder, &color.view, format);
            let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 50.0), Vec3::ZERO, Vec3::Y);
            let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
            stage.update_and_draw(&ctx, &mut target, &view, &proj, &Mat4::IDENTITY);
        }
        gpu.queue.submit(Some(encoder.finish()));
    }

    #[test]
    fn reload_replaces_cloud() {
        let Some(gpu) = HeadlessGpu::new() else {
            eprintln!("no GPU adapter; skipping");
            return;
        };
        let ctx = gpu.render_ctx(wgpu::TextureFormat::Rgba8Unorm, 8, 8);
        let mut stage = SplatStage::new(SplatConfig::default());
        stage.load_points(&ctx, small_cloud(10)).unwrap();
        stage.load_points(&ctx, small_cloud(3)).unwrap();
        assert_eq!(stage.point_count(), 3);
        stage.load_points(&ctx, PointCloud::default()).unwrap();
        assert_eq!(stage.point_count(), 0);
        assert!(stage.is_available());
    }
}
