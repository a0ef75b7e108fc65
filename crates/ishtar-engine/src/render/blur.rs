//! Separable 9-tap blur used by SSAO and bloom.

use bytemuck::{Pod, Zeroable};

use crate::assets::GpuTexture;

use super::fullscreen::{uniform_buffer, FullscreenDesc, FullscreenPipeline, Input};

/// Per-tap weights for offsets 0..=4; negative offsets mirror them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) enum Kernel {
    Box,
    Gaussian,
}

impl Kernel {
    fn weights(self) -> [f32; 5] {
        match self {
            Kernel::Box => [1.0 / 9.0; 5],
            Kernel::Gaussian => [0.227_027, 0.194_594_6, 0.121_621_6, 0.054_054, 0.016_216],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct BlurUniform {
    direction: [f32; 4],
    weights: [[f32; 4]; 3],
}

impl BlurUniform {
    fn new(kernel: Kernel, dx: f32, dy: f32) -> Self {
        let w = kernel.weights();
        Self {
            direction: [dx, dy, 0.0, 0.0],
            weights: [[w[0], w[1], w[2], w[3]], [w[4], 0.0, 0.0, 0.0], [0.0; 4]],
        }
    }
}

pub(crate) struct SeparableBlur {
    pipeline: FullscreenPipeline,
    horizontal: wgpu::Buffer,
    vertical: wgpu::Buffer,
}

impl SeparableBlur {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        kernel: Kernel,
        format: wgpu::TextureFormat,
    ) -> Self {
        let pipeline = FullscreenPipeline::new(
            device,
            &FullscreenDesc {
                label,
                fragment_src: include_str!("shaders/blur.wgsl"),
                inputs: &[Input::Float],
                uniform_size: Some(std::mem::size_of::<BlurUniform>() as u64),
                target: format,
                blend: None,
            },
        );
        let horizontal = uniform_buffer::<BlurUniform>(device, "ishtar blur horizontal");
        let vertical = uniform_buffer::<BlurUniform>(device, "ishtar blur vertical");
        queue.write_buffer(&horizontal, 0, bytemuck::bytes_of(&BlurUniform::new(kernel, 1.0, 0.0)));
        queue.write_buffer(&vertical, 0, bytemuck::bytes_of(&BlurUniform::new(kernel, 0.0, 1.0)));
        Self {
            pipeline,
            horizontal,
            vertical,
        }
    }

    /// `src` → `scratch` horizontally, then `scratch` → `dst` vertically.
    pub fn run(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        src: &GpuTexture,
        scratch: &GpuTexture,
        dst: &GpuTexture,
    ) {
        let h = self.pipeline.bind_group(device, &[&src.view], Some(&self.horizontal));
        self.pipeline
            .draw(encoder, &scratch.view, wgpu::LoadOp::Clear(wgpu::Color::BLACK), &h);
        let v = self.pipeline.bind_group(device, &[&scratch.view], Some(&self.vertical));
        self.pipeline
            .draw(encoder, &dst.view, wgpu::LoadOp::Clear(wgpu::Color::BLACK), &v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernels_sum_to_one() {
        for k in [Kernel::Box, Kernel::Gaussian] {
            let w = k.weights();
            let sum = w[0] + 2.0 * (w[1] + w[2] + w[3] + w[4]);
            assert!((sum - 1.0).abs() < 1e-3, "{k:?} sums to {sum}");
        }
    }
}
