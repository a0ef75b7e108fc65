//! Box-blurs the raw occlusion to hide the noise tile.
//!
//! Reads: `ctx.ssao`. Writes: `ctx.ssao` (blurred). Leaves `None` alone.

use std::sync::Arc;

use crate::assets::TextureHandle;
use crate::render::blur::{Kernel, SeparableBlur};
use crate::render::context::{RenderContext, Slot};
use crate::render::pass::RenderPass;

use super::ssao::{create_target, SSAO_FORMAT};

pub struct SsaoBlurPass {
    blur: SeparableBlur,
    ping: TextureHandle,
    pong: TextureHandle,
}

impl SsaoBlurPass {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) -> Self {
        Self {
            blur: SeparableBlur::new(device, queue, "ishtar ssao blur", Kernel::Box, SSAO_FORMAT),
            ping: create_target(device, "ishtar ssao blur ping", width, height),
            pong: create_target(device, "ishtar ssao blur pong", width, height),
        }
    }
}

impl RenderPass for SsaoBlurPass {
    fn name(&self) -> &'static str {
        "ssao_blur"
    }

    fn reads(&self) -> &'static [Slot] {
        &[Slot::Ssao]
    }

    fn writes(&self) -> &'static [Slot] {
        &[Slot::Ssao]
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) {
        // Disabled SSAO is not an error.
        let Some(raw) = ctx.ssao.clone() else { return };
        self.blur.run(ctx.device, ctx.encoder, &raw, &self.ping, &self.pong);
        ctx.ssao = Some(Arc::clone(&self.pong));
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.ping = create_target(device, "ishtar ssao blur ping", width, height);
        self.pong = create_target(device, "ishtar ssao blur pong", width, height);
    }
}
