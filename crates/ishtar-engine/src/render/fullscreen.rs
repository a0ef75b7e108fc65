//! Full-screen triangle pipelines shared by the screen-space passes.
//!
//! Inputs are read with `textureLoad`, so no samplers are bound. Bindings are
//! numbered in order: textures first, then the optional uniform.

use std::num::NonZeroU64;

const VERTEX_SRC: &str = include_str!("shaders/fullscreen.wgsl");

/// How a bound texture is declared in WGSL.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Input {
    /// `texture_2d<f32>`.
    Float,
    /// `texture_2d<u32>`.
    Uint,
    /// `texture_depth_2d`.
    Depth,
}

impl Input {
    fn sample_type(self) -> wgpu::TextureSampleType {
        match self {
            Input::Float => wgpu::TextureSampleType::Float { filterable: false },
            Input::Uint => wgpu::TextureSampleType::Uint,
            Input::Depth => wgpu::TextureSampleType::Depth,
        }
    }
}

pub(crate) struct FullscreenDesc<'a> {
    pub label: &'a str,
    /// Fragment stage source; `fs_main` is the entry point.
    pub fragment_src: &'a str,
    pub inputs: &'a [Input],
    pub uniform_size: Option<u64>,
    pub target: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
}

pub(crate) struct FullscreenPipeline {
    label: String,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    input_count: u32,
    has_uniform: bool,
}

impl FullscreenPipeline {
    pub fn new(device: &wgpu::Device, desc: &FullscreenDesc<'_>) -> Self {
        let source = format!("{VERTEX_SRC}\n{}", desc.fragment_src);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let mut entries: Vec<wgpu::BindGroupLayoutEntry> = desc
            .inputs
            .iter()
            .enumerate()
            .map(|(i, input)| wgpu::BindGroupLayoutEntry {
                binding: i as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: input.sample_type(),
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            })
            .collect();
        if let Some(size) = desc.uniform_size {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: desc.inputs.len() as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(size),
                },
                count: None,
            });
        }

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(desc.label),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_fullscreen"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.target,
                    blend: desc.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Self {
            label: desc.label.to_string(),
            pipeline,
            layout,
            input_count: desc.inputs.len() as u32,
            has_uniform: desc.uniform_size.is_some(),
        }
    }

    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        inputs: &[&wgpu::TextureView],
        uniform: Option<&wgpu::Buffer>,
    ) -> wgpu::BindGroup {
        debug_assert_eq!(inputs.len() as u32, self.input_count);
        debug_assert_eq!(uniform.is_some(), self.has_uniform);

        let mut entries: Vec<wgpu::BindGroupEntry> = inputs
            .iter()
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        if let Some(buf) = uniform {
            entries.push(wgpu::BindGroupEntry {
                binding: self.input_count,
                resource: buf.as_entire_binding(),
            });
        }
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&self.label),
            layout: &self.layout,
            entries: &entries,
        })
    }

    /// Records one full-screen draw into `target`.
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        load: wgpu::LoadOp<wgpu::Color>,
        bind_group: &wgpu::BindGroup,
    ) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }
}

/// Creates a `UNIFORM | COPY_DST` buffer sized for `T`.
pub(crate) fn uniform_buffer<T: bytemuck::Pod>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<T>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
