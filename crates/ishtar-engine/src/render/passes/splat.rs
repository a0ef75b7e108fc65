//! Gaussian splat clouds over the post-processed image.
//!
//! Reads: `ctx.post_process`, `ctx.gbuffer` depth (tested, never written).

use crate::render::context::{RenderContext, Slot};
use crate::render::ctx::{RenderCtx, RenderTarget};
use crate::render::pass::RenderPass;

use super::lighting::HDR_FORMAT;
use super::ssao::warn_missing;

#[derive(Default)]
pub struct SplatPass {
    warned_missing: bool,
}

impl SplatPass {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderPass for SplatPass {
    fn name(&self) -> &'static str {
        "splat"
    }

    fn reads(&self) -> &'static [Slot] {
        &[Slot::PostProcess, Slot::GBuffer]
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) {
        if !ctx.splat_stages.iter().any(|s| s.is_available()) {
            return;
        }
        let color = match ctx.require_post_process() {
            Ok(t) => t,
            Err(e) => return warn_missing(self.name(), &mut self.warned_missing, e),
        };
        let depth = ctx.gbuffer.as_ref().map(|gb| gb.depth.clone());

        let rctx = RenderCtx::new(ctx.device, ctx.queue, HDR_FORMAT, ctx.width, ctx.height);
        let (view, proj) = (ctx.view, ctx.proj);
        for stage in ctx.splat_stages.iter_mut().filter(|s| s.is_available()) {
            let mut target = RenderTarget::new(&mut *ctx.encoder, &color.view, HDR_FORMAT);
            if let Some(d) = depth.as_ref() {
                target = target.with_depth(&d.view);
            }
            let model = stage.model();
            stage.update_and_draw(&rctx, &mut target, &view, &proj, &model);
        }
    }
}
