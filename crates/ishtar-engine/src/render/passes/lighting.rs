//! Deferred shading into an HDR target.
//!
//! Reads: `ctx.gbuffer`, optional `ctx.ssao`, lights. Writes: `ctx.lighting`
//! (`Rgba16Float`).

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::assets::{GpuTexture, TextureHandle};
use crate::render::config::RenderConfig;
use crate::render::context::{RenderContext, Slot};
use crate::render::fullscreen::{uniform_buffer, FullscreenDesc, FullscreenPipeline, Input};
use crate::render::pass::RenderPass;
use crate::scene::{Light, LightKind};

use super::ssao::warn_missing;

pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const MAX_LIGHTS: usize = 8;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable, PartialEq)]
struct GpuLight {
    position: [f32; 4],
    direction: [f32; 4],
    color: [f32; 4],
    attenuation: [f32; 4],
    cutoff: [f32; 4],
}

impl GpuLight {
    fn from_light(light: &Light, view: &Mat4) -> Self {
        let kind = match light.kind {
            LightKind::Directional => 0.0,
            LightKind::Point => 1.0,
            LightKind::Spot => 2.0,
        };
        let p = view.transform_point3(light.position);
        let d = view.transform_vector3(light.direction).normalize_or_zero();
        Self {
            position: [p.x, p.y, p.z, kind],
            direction: [d.x, d.y, d.z, light.intensity],
            color: light.color.extend(1.0).to_array(),
            attenuation: [light.constant, light.linear, light.quadratic, 0.0],
            cutoff: [
                light.inner_cutoff.to_radians().cos(),
                light.outer_cutoff.to_radians().cos(),
                0.0,
                0.0,
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct LightingUniform {
    lights: [GpuLight; MAX_LIGHTS],
    counts: [f32; 4],
    strengths: [f32; 4],
}

impl LightingUniform {
    fn build(lights: &[Light], view: &Mat4, config: &RenderConfig, has_ao: bool) -> Self {
        let mut out = [GpuLight::zeroed(); MAX_LIGHTS];
        let count = lights.len().min(MAX_LIGHTS);
        for (dst, light) in out.iter_mut().zip(lights.iter()) {
            *dst = GpuLight::from_light(light, view);
        }
        Self {
            lights: out,
            counts: [
                count as f32,
                if has_ao { 1.0 } else { 0.0 },
                config.ssao_strength,
                config.shininess,
            ],
            strengths: [
                config.ambient_strength,
                config.diffuse_strength,
                config.specular_strength,
                0.0,
            ],
        }
    }
}

pub struct LightingPass {
    pipeline: FullscreenPipeline,
    uniform: wgpu::Buffer,
    output: TextureHandle,
    warned_missing: bool,
    warned_light_count: bool,
}

impl LightingPass {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let pipeline = FullscreenPipeline::new(
            device,
            &FullscreenDesc {
                label: "ishtar lighting",
                fragment_src: include_str!("../shaders/lighting.wgsl"),
                inputs: &[Input::Float; 6],
                uniform_size: Some(std::mem::size_of::<LightingUniform>() as u64),
                target: HDR_FORMAT,
                blend: None,
            },
        );
        Self {
            pipeline,
            uniform: uniform_buffer::<LightingUniform>(device, "ishtar lighting params"),
            output: create_target(device, width, height),
            warned_missing: false,
            warned_light_count: false,
        }
    }
}

fn create_target(device: &wgpu::Device, width: u32, height: u32) -> TextureHandle {
    Arc::new(GpuTexture::render_target(device, "ishtar lighting", width, height, HDR_FORMAT))
}

impl RenderPass for LightingPass {
    fn name(&self) -> &'static str {
        "lighting"
    }

    fn reads(&self) -> &'static [Slot] {
        &[Slot::GBuffer, Slot::Ssao]
    }

    fn writes(&self) -> &'static [Slot] {
        &[Slot::Lighting]
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) {
        let gb = match ctx.require_gbuffer() {
            Ok(gb) => gb,
            Err(e) => return warn_missing(self.name(), &mut self.warned_missing, e),
        };
        if ctx.lights.len() > MAX_LIGHTS && !self.warned_light_count {
            log::warn!("{} lights in scene; only the first {MAX_LIGHTS} are shaded", ctx.lights.len());
            self.warned_light_count = true;
        }

        let ao = ctx.ssao.clone();
        let u = LightingUniform::build(ctx.lights, &ctx.view, ctx.config, ao.is_some());
        ctx.queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(&u));

        let ao_view = match ao.as_ref() {
            Some(t) => &t.view,
            None => &ctx.textures.white().view,
        };
        let bind_group = self.pipeline.bind_group(
            ctx.device,
            &[
                &gb.position.view,
                &gb.normal.view,
                &gb.diffuse.view,
                &gb.specular.view,
                &gb.shininess.view,
                ao_view,
            ],
            Some(&self.uniform),
        );
        self.pipeline.draw(
            ctx.encoder,
            &self.output.view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &bind_group,
        );
        ctx.lighting = Some(Arc::clone(&self.output));
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.output = create_target(device, width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn uniform_caps_light_count() {
        let lights = vec![Light::default(); 12];
        let u = LightingUniform::build(&lights, &Mat4::IDENTITY, &RenderConfig::default(), false);
        assert_eq!(u.counts[0], MAX_LIGHTS as f32);
        assert_eq!(u.counts[1], 0.0);
    }

    #[test]
    fn lights_move_into_view_space() {
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let g = GpuLight::from_light(&Light::point(Vec3::ZERO, Vec3::ONE, 2.0), &view);
        assert_eq!(&g.position[..3], &[0.0, 0.0, -5.0]);
        assert_eq!(g.position[3], 1.0);
        assert_eq!(g.direction[3], 2.0);
    }

    #[test]
    fn spot_cutoffs_are_cosines() {
        let g = GpuLight::from_light(
            &Light::spot(Vec3::ZERO, Vec3::NEG_Y, Vec3::ONE, 1.0),
            &Mat4::IDENTITY,
        );
        assert!(g.cutoff[0] > g.cutoff[1]);
        assert!((g.cutoff[0] - 12.5f32.to_radians().cos()).abs() < 1e-6);
    }

    #[test]
    fn strengths_come_from_config() {
        let u = LightingUniform::build(&[], &Mat4::IDENTITY, &RenderConfig::default(), true);
        assert_eq!(&u.strengths[..3], &[0.1, 0.9, 0.5]);
        assert_eq!(u.counts[1], 1.0);
        assert_eq!(u.counts[2], 0.75);
    }
}
