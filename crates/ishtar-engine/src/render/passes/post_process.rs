//! Ordered chain of screen-space effects over the lit image.
//!
//! Reads: `ctx.lighting`, `ctx.gbuffer`. Writes: `ctx.post_process`. With no
//! enabled effect the lighting target is published unchanged.

use std::sync::Arc;

use crate::assets::{GpuTexture, TextureHandle};
use crate::render::context::{RenderContext, Slot};
use crate::render::effects::{EffectContext, PostProcessEffect};
use crate::render::pass::RenderPass;

use super::lighting::HDR_FORMAT;
use super::ssao::warn_missing;

#[derive(Default)]
pub struct PostProcessChain {
    effects: Vec<Box<dyn PostProcessEffect>>,
    /// Ping-pong targets, allocated on the first frame with an enabled effect.
    targets: Option<[TextureHandle; 2]>,
    warned_missing: bool,
}

impl PostProcessChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `effect`; effects run in insertion order.
    pub fn add_effect(&mut self, effect: Box<dyn PostProcessEffect>) {
        if self.effect(effect.name()).is_some() {
            log::warn!("post-process chain already has a `{}` effect", effect.name());
        }
        self.effects.push(effect);
    }

    /// First effect called `name`.
    pub fn effect(&self, name: &str) -> Option<&dyn PostProcessEffect> {
        self.effects
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.as_ref())
    }

    pub fn effect_mut(&mut self, name: &str) -> Option<&mut (dyn PostProcessEffect + 'static)> {
        self.effects
            .iter_mut()
            .find(|e| e.name() == name)
            .map(|e| e.as_mut())
    }

    /// Removes the first effect called `name`. Returns whether one was found.
    pub fn remove_effect(&mut self, name: &str) -> bool {
        match self.effects.iter().position(|e| e.name() == name) {
            Some(i) => {
                self.effects.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn effect_names(&self) -> Vec<&'static str> {
        self.effects.iter().map(|e| e.name()).collect()
    }

    pub fn active_count(&self) -> usize {
        self.effects.iter().filter(|e| e.enabled()).count()
    }

    fn ensure_targets(&mut self, device: &wgpu::Device, width: u32, height: u32) -> [TextureHandle; 2] {
        let stale = match &self.targets {
            Some([a, _]) => a.size() != (width.max(1), height.max(1)),
            None => true,
        };
        if stale {
            self.targets = None;
        }
        let [a, b] = self.targets.get_or_insert_with(|| {
            let t = |label| {
                Arc::new(GpuTexture::render_target(device, label, width, height, HDR_FORMAT))
            };
            [t("ishtar post ping"), t("ishtar post pong")]
        });
        [Arc::clone(a), Arc::clone(b)]
    }
}

impl RenderPass for PostProcessChain {
    fn name(&self) -> &'static str {
        "post_process"
    }

    fn reads(&self) -> &'static [Slot] {
        &[Slot::Lighting, Slot::GBuffer]
    }

    fn writes(&self) -> &'static [Slot] {
        &[Slot::PostProcess]
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) {
        let lit = match ctx.require_lighting() {
            Ok(t) => t,
            Err(e) => return warn_missing(self.name(), &mut self.warned_missing, e),
        };
        if self.active_count() == 0 {
            ctx.post_process = Some(lit);
            return;
        }

        let targets = self.ensure_targets(ctx.device, ctx.width, ctx.height);
        let mut ectx = EffectContext {
            device: ctx.device,
            queue: ctx.queue,
            encoder: &mut *ctx.encoder,
            width: ctx.width,
            height: ctx.height,
            time: ctx.time,
            selected_uid: ctx.selected_uid,
            gbuffer: ctx.gbuffer.as_ref(),
        };

        let mut input = lit;
        for (i, effect) in self.effects.iter_mut().filter(|e| e.enabled()).enumerate() {
            let output = Arc::clone(&targets[i % 2]);
            effect.apply(&mut ectx, &input, &output);
            input = output;
        }
        ctx.post_process = Some(input);
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.targets = None;
        for effect in &mut self.effects {
            effect.resize(device, width, height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mock {
        name: &'static str,
        enabled: bool,
    }

    impl PostProcessEffect for Mock {
        fn name(&self) -> &'static str {
            self.name
        }

        fn enabled(&self) -> bool {
            self.enabled
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }

        fn apply(&mut self, _: &mut EffectContext<'_>, _: &GpuTexture, _: &GpuTexture) {}
    }

    fn mock(name: &'static str) -> Box<dyn PostProcessEffect> {
        Box::new(Mock {
            name,
            enabled: true,
        })
    }

    // ── chain management ──────────────────────────────────────────────────

    #[test]
    fn effects_keep_insertion_order() {
        let mut chain = PostProcessChain::new();
        chain.add_effect(mock("Bloom"));
        chain.add_effect(mock("Outline"));
        assert_eq!(chain.effect_names(), ["Bloom", "Outline"]);
    }

    #[test]
    fn remove_reports_whether_found() {
        let mut chain = PostProcessChain::new();
        chain.add_effect(mock("Bloom"));
        assert!(!chain.remove_effect("Outline"));
        assert!(chain.remove_effect("Bloom"));
        assert!(chain.effect_names().is_empty());
        assert!(!chain.remove_effect("Bloom"));
    }

    #[test]
    fn lookup_by_name() {
        let mut chain = PostProcessChain::new();
        chain.add_effect(mock("Bloom"));
        assert!(chain.effect("Bloom").is_some());
        assert!(chain.effect("bloom").is_none());
    }

    #[test]
    fn disabling_through_effect_mut_drops_active_count() {
        let mut chain = PostProcessChain::new();
        chain.add_effect(mock("Bloom"));
        chain.add_effect(mock("Outline"));
        assert_eq!(chain.active_count(), 2);

        if let Some(e) = chain.effect_mut("Outline") {
            e.set_enabled(false);
        }
        assert_eq!(chain.active_count(), 1);
        assert!(chain.effect("Outline").is_some_and(|e| !e.enabled()));
    }

    #[test]
    fn empty_chain_declares_slots() {
        let chain = PostProcessChain::new();
        let io = chain.io();
        assert_eq!(io.writes, &[Slot::PostProcess]);
        assert!(io.reads.contains(&Slot::Lighting));
    }
}
