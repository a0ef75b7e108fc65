//! Screen-space ambient occlusion.
//!
//! Reads: `ctx.gbuffer` (position, normal). Writes: `ctx.ssao` (raw,
//! `R16Float`), or `None` when disabled in the config.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::assets::{GpuTexture, TextureHandle};
use crate::render::context::{MissingInput, RenderContext, Slot};
use crate::render::fullscreen::{uniform_buffer, FullscreenDesc, FullscreenPipeline, Input};
use crate::render::pass::RenderPass;

pub const SSAO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;
pub const KERNEL_SIZE: usize = 16;
const NOISE_DIM: u32 = 4;
const SEED: u64 = 0x15_57a2;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct SsaoUniform {
    proj: [[f32; 4]; 4],
    samples: [[f32; 4]; KERNEL_SIZE],
    params: [f32; 4],
}

/// Hemisphere samples along +Z, denser near the origin.
pub fn generate_kernel(rng: &mut impl Rng) -> [Vec3; KERNEL_SIZE] {
    std::array::from_fn(|i| {
        let dir = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(0.0..1.0),
        )
        .normalize_or(Vec3::Z);
        let t = i as f32 / KERNEL_SIZE as f32;
        let scale = 0.1 + 0.9 * t * t;
        dir * rng.gen_range(0.0..1.0f32) * scale
    })
}

/// Random rotations around the surface normal, tiled over the screen.
fn generate_noise(rng: &mut impl Rng) -> Vec<[f32; 4]> {
    (0..NOISE_DIM * NOISE_DIM)
        .map(|_| [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0, 0.0])
        .collect()
}

pub struct SsaoPass {
    pipeline: FullscreenPipeline,
    uniform: wgpu::Buffer,
    kernel: [Vec3; KERNEL_SIZE],
    noise: GpuTexture,
    output: TextureHandle,
    warned_missing: bool,
}

impl SsaoPass {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(SEED);
        let kernel = generate_kernel(&mut rng);
        let noise_texels = generate_noise(&mut rng);

        let noise = GpuTexture::new(
            device,
            "ishtar ssao noise",
            NOISE_DIM,
            NOISE_DIM,
            wgpu::TextureFormat::Rgba32Float,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &noise.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&noise_texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(NOISE_DIM * 16),
                rows_per_image: Some(NOISE_DIM),
            },
            wgpu::Extent3d {
                width: NOISE_DIM,
                height: NOISE_DIM,
                depth_or_array_layers: 1,
            },
        );

        let pipeline = FullscreenPipeline::new(
            device,
            &FullscreenDesc {
                label: "ishtar ssao",
                fragment_src: include_str!("../shaders/ssao.wgsl"),
                inputs: &[Input::Float, Input::Float, Input::Float],
                uniform_size: Some(std::mem::size_of::<SsaoUniform>() as u64),
                target: SSAO_FORMAT,
                blend: None,
            },
        );

        Self {
            pipeline,
            uniform: uniform_buffer::<SsaoUniform>(device, "ishtar ssao params"),
            kernel,
            noise,
            output: create_target(device, "ishtar ssao raw", width, height),
            warned_missing: false,
        }
    }

    pub fn kernel(&self) -> &[Vec3; KERNEL_SIZE] {
        &self.kernel
    }
}

pub(crate) fn create_target(device: &wgpu::Device, label: &str, width: u32, height: u32) -> TextureHandle {
    Arc::new(GpuTexture::render_target(device, label, width, height, SSAO_FORMAT))
}

pub(crate) fn warn_missing(pass: &str, warned: &mut bool, err: MissingInput) {
    if !*warned {
        log::warn!("{pass} pass skipped: {err}");
        *warned = true;
    }
}

impl RenderPass for SsaoPass {
    fn name(&self) -> &'static str {
        "ssao"
    }

    fn reads(&self) -> &'static [Slot] {
        &[Slot::GBuffer]
    }

    fn writes(&self) -> &'static [Slot] {
        &[Slot::Ssao]
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) {
        ctx.ssao = None;
        if !ctx.config.ssao_enabled {
            return;
        }
        let gb = match ctx.require_gbuffer() {
            Ok(gb) => gb,
            Err(e) => return warn_missing(self.name(), &mut self.warned_missing, e),
        };

        let mut samples = [[0.0f32; 4]; KERNEL_SIZE];
        for (dst, k) in samples.iter_mut().zip(self.kernel.iter()) {
            *dst = k.extend(0.0).to_array();
        }
        let u = SsaoUniform {
            proj: ctx.proj.to_cols_array_2d(),
            samples,
            params: [
                ctx.config.ssao_radius,
                ctx.config.ssao_bias,
                KERNEL_SIZE as f32,
                0.0,
            ],
        };
        ctx.queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(&u));

        let bind_group = self.pipeline.bind_group(
            ctx.device,
            &[&gb.position.view, &gb.normal.view, &self.noise.view],
            Some(&self.uniform),
        );
        self.pipeline.draw(
            ctx.encoder,
            &self.output.view,
            wgpu::LoadOp::Clear(wgpu::Color::WHITE),
            &bind_group,
        );
        ctx.ssao = Some(Arc::clone(&self.output));
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.output = create_target(device, "ishtar ssao raw", width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_lies_in_unit_hemisphere() {
        let k = generate_kernel(&mut StdRng::seed_from_u64(SEED));
        for s in k {
            assert!(s.z >= 0.0);
            assert!(s.length() <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn kernel_scale_grows_with_index() {
        let k = generate_kernel(&mut StdRng::seed_from_u64(SEED));
        assert!(k[0].length() <= 0.1 + 1e-5);
    }

    #[test]
    fn kernel_is_deterministic_for_a_seed() {
        let a = generate_kernel(&mut StdRng::seed_from_u64(9));
        let b = generate_kernel(&mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn noise_rotates_in_tangent_plane() {
        let n = generate_noise(&mut StdRng::seed_from_u64(1));
        assert_eq!(n.len(), 16);
        assert!(n.iter().all(|t| t[2] == 0.0));
    }
    // ── missing inputs ────────────────────────────────────────────────────

    #[test]
    fn missing_input_sets_the_warned_flag_once() {
        let mut warned = false;
        warn_missing("ssao", &mut warned, MissingInput(Slot::GBuffer));
        assert!(warned);
        warn_missing("ssao", &mut warned, MissingInput(Slot::GBuffer));
        assert!(warned);
    }
}
