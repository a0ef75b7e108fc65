//! Frame orchestration: owns the passes and runs them in a fixed order.
//!
//! Geometry → SSAO → SSAO Blur → Lighting → PostProcess → Forward → Splat →
//! Final. Each pass sees the same [`RenderContext`] and fills in its slot.

use std::sync::Arc;

use crate::assets::{TextureHandle, TextureRegistry};
use crate::scene::{Camera, RenderableRef, Scene};
use crate::splat::SplatStage;

use super::config::RenderConfig;
use super::context::{validate_pass_order, GBuffer, PassIo, RenderContext};
use super::ctx::{RenderCtx, RenderTarget};
use super::effects::{BloomEffect, OutlineEffect};
use super::pass::RenderPass;
use super::passes::{
    FinalPass, ForwardItem, ForwardPass, ForwardRenderState, ForwardShader, GeometryPass,
    LightingPass, PostProcessChain, SplatPass, SsaoBlurPass, SsaoPass,
};
use super::view_mode::ViewMode;

/// Per-frame inputs owned by the caller.
pub struct FrameInputs<'a> {
    pub camera: &'a Camera,
    pub scene: &'a Scene,
    /// 0 = nothing selected.
    pub selected_uid: u32,
    pub view_mode: ViewMode,
    /// Seconds since startup.
    pub time: f32,
}

/// Intermediates published by the last executed frame.
#[derive(Clone)]
pub struct FrameOutputs {
    pub gbuffer: Option<GBuffer>,
    pub lighting: Option<TextureHandle>,
    pub post_process: Option<TextureHandle>,
    pub display: Option<TextureHandle>,
}

pub struct RenderPipeline {
    width: u32,
    height: u32,
    config: RenderConfig,
    textures: Arc<TextureRegistry>,

    geometry: GeometryPass,
    ssao: SsaoPass,
    ssao_blur: SsaoBlurPass,
    lighting: LightingPass,
    post_chain: PostProcessChain,
    forward: ForwardPass,
    splat: SplatPass,
    final_pass: FinalPass,

    forward_items: Vec<ForwardItem>,
    splat_stages: Vec<SplatStage>,
    last_frame: Option<FrameOutputs>,
}

impl RenderPipeline {
    /// Builds every pass for a `width` x `height` viewport. The post chain
    /// starts with Bloom then Outline.
    pub fn new(ctx: &RenderCtx<'_>, width: u32, height: u32, textures: Arc<TextureRegistry>) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let (device, queue) = (ctx.device, ctx.queue);

        let mut post_chain = PostProcessChain::new();
        post_chain.add_effect(Box::new(BloomEffect::new(device, queue, width, height)));
        post_chain.add_effect(Box::new(OutlineEffect::new(device)));

        let pipeline = Self {
            width,
            height,
            config: RenderConfig::default(),
            textures,
            geometry: GeometryPass::new(device, width, height),
            ssao: SsaoPass::new(device, queue, width, height),
            ssao_blur: SsaoBlurPass::new(device, queue, width, height),
            lighting: LightingPass::new(device, width, height),
            post_chain,
            forward: ForwardPass::new(device),
            splat: SplatPass::new(),
            final_pass: FinalPass::new(device),
            forward_items: Vec::new(),
            splat_stages: Vec::new(),
            last_frame: None,
        };
        debug_assert!(
            validate_pass_order(&pipeline.pass_order()).is_ok(),
            "render passes are out of order"
        );
        log::info!("render pipeline ready at {width}x{height}");
        pipeline
    }

    /// Declared slot usage of every pass, in execution order.
    pub fn pass_order(&self) -> [PassIo; 8] {
        [
            self.geometry.io(),
            self.ssao.io(),
            self.ssao_blur.io(),
            self.lighting.io(),
            self.post_chain.io(),
            self.forward.io(),
            self.splat.io(),
            self.final_pass.io(),
        ]
    }

    /// Records the whole frame into `target.encoder`. Submission stays with
    /// the caller.
    pub fn execute(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, frame: &FrameInputs<'_>) {
        if (ctx.width, ctx.height) != (self.width, self.height) {
            self.resize(ctx, ctx.width, ctx.height);
        }

        let aspect = self.width as f32 / self.height as f32;
        let mut rctx = RenderContext {
            device: ctx.device,
            queue: ctx.queue,
            encoder: &mut *target.encoder,
            textures: &self.textures,
            config: &self.config,
            camera: frame.camera,
            view: frame.camera.view_matrix(),
            proj: frame.camera.projection_matrix(aspect),
            width: self.width,
            height: self.height,
            time: frame.time,
            selected_uid: frame.selected_uid,
            view_mode: frame.view_mode,
            lights: frame.scene.lights(),
            renderables: frame.scene.renderables(),
            forward_items: &self.forward_items,
            splat_stages: &mut self.splat_stages,
            output: target.color_view,
            output_format: target.format,
            gbuffer: None,
            ssao: None,
            lighting: None,
            post_process: None,
            display: None,
        };

        let passes: [&mut dyn RenderPass; 8] = [
            &mut self.geometry,
            &mut self.ssao,
            &mut self.ssao_blur,
            &mut self.lighting,
            &mut self.post_chain,
            &mut self.forward,
            &mut self.splat,
            &mut self.final_pass,
        ];
        for pass in passes {
            pass.execute(&mut rctx);
        }

        self.last_frame = Some(FrameOutputs {
            gbuffer: rctx.gbuffer,
            lighting: rctx.lighting,
            post_process: rctx.post_process,
            display: rctx.display,
        });
    }

    /// Draws `renderable` after post-processing, in insertion order.
    pub fn add_forward_renderable(
        &mut self,
        renderable: RenderableRef,
        shader: Option<Arc<ForwardShader>>,
        state: ForwardRenderState,
    ) {
        self.forward_items.push(ForwardItem {
            renderable,
            shader,
            state,
        });
    }

    pub fn clear_forward_renderables(&mut self) {
        self.forward_items.clear();
    }

    pub fn forward_count(&self) -> usize {
        self.forward_items.len()
    }

    /// Returns the stage's index for [`Self::splat_stage_mut`].
    pub fn add_splat_stage(&mut self, stage: SplatStage) -> usize {
        self.splat_stages.push(stage);
        self.splat_stages.len() - 1
    }

    pub fn splat_stage_mut(&mut self, index: usize) -> Option<&mut SplatStage> {
        self.splat_stages.get_mut(index)
    }

    /// Object id at framebuffer pixel `(x, y)`; 0 = none.
    ///
    /// wgpu framebuffers and winit cursor positions share a top-left origin,
    /// so window coordinates in physical pixels are passed through as-is.
    /// Reads the last submitted frame and blocks until the copy completes.
    pub fn pick_object(&self, ctx: &RenderCtx<'_>, x: u32, y: u32) -> u32 {
        self.geometry.pick(ctx.device, ctx.queue, x, y)
    }

    pub fn view_mode_labels() -> &'static [&'static str] {
        &ViewMode::LABELS
    }

    /// Recreates size-dependent targets. Zero sizes (minimized windows) are
    /// ignored.
    pub fn resize(&mut self, ctx: &RenderCtx<'_>, width: u32, height: u32) {
        if width == 0 || height == 0 || (width, height) == (self.width, self.height) {
            return;
        }
        log::debug!("render pipeline resize {}x{} -> {width}x{height}", self.width, self.height);
        self.width = width;
        self.height = height;
        self.last_frame = None;

        let passes: [&mut dyn RenderPass; 8] = [
            &mut self.geometry,
            &mut self.ssao,
            &mut self.ssao_blur,
            &mut self.lighting,
            &mut self.post_chain,
            &mut self.forward,
            &mut self.splat,
            &mut self.final_pass,
        ];
        for pass in passes {
            pass.resize(ctx.device, width, height);
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RenderConfig {
        &mut self.config
    }

    pub fn post_chain(&self) -> &PostProcessChain {
        &self.post_chain
    }

    pub fn post_chain_mut(&mut self) -> &mut PostProcessChain {
        &mut self.post_chain
    }

    pub fn textures(&self) -> &Arc<TextureRegistry> {
        &self.textures
    }

    /// Outputs of the most recent [`Self::execute`]; cleared by a resize.
    pub fn last_frame(&self) -> Option<&FrameOutputs> {
        self.last_frame.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    use crate::assets::{primitives, GpuTexture, Material, Mesh};
    use crate::device::HeadlessGpu;
    use crate::scene::{Payload, Renderable};
    use crate::render::context::Slot;
    use crate::render::readback;

    const W: u32 = 64;
    const H: u32 = 48;
    const OUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    fn gpu() -> Option<HeadlessGpu> {
        let gpu = HeadlessGpu::new();
        if gpu.is_none() {
            eprintln!("skipping: no GPU adapter");
        }
        gpu
    }

    fn pipeline(gpu: &HeadlessGpu) -> RenderPipeline {
        let ctx = gpu.render_ctx(OUT_FORMAT, W, H);
        let textures = Arc::new(TextureRegistry::new(&gpu.device, &gpu.queue));
        RenderPipeline::new(&ctx, W, H, textures)
    }

    fn run_frame(gpu: &HeadlessGpu, pipeline: &mut RenderPipeline, scene: &Scene) -> GpuTexture {
        let ctx = gpu.render_ctx(OUT_FORMAT, W, H);
        let output = GpuTexture::render_target(&gpu.device, "test output", W, H, OUT_FORMAT);
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut target = RenderTarget::new(&mut encoder, &output.view, OUT_FORMAT);
            let camera = Camera::default();
            let frame = FrameInputs {
                camera: &camera,
                scene,
                selected_uid: 0,
                view_mode: ViewMode::Final,
                time: 0.0,
            };
            pipeline.execute(&ctx, &mut target, &frame);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        output
    }

    // ── ordering ──────────────────────────────────────────────────────────

    #[test]
    fn default_order_is_valid() {
        let Some(gpu) = gpu() else { return };
        let p = pipeline(&gpu);
        let order = p.pass_order();
        assert_eq!(validate_pass_order(&order), Ok(()));
        let names: Vec<_> = order.iter().map(|io| io.name).collect();
        assert_eq!(
            names,
            ["geometry", "ssao", "ssao_blur", "lighting", "post_process", "forward", "splat", "final"]
        );
        assert_eq!(order[7].writes, &[Slot::Display]);
    }

    #[test]
    fn labels_follow_enum_order() {
        let labels = RenderPipeline::view_mode_labels();
        assert_eq!(labels.len(), 8);
        assert_eq!(labels[0], "Final (PostProcess)");
        assert_eq!(labels[7], "Depth");
    }

    // ── frames ────────────────────────────────────────────────────────────

    #[test]
    fn empty_scene_clears_display() {
        let Some(gpu) = gpu() else { return };
        let mut p = pipeline(&gpu);
        let output = run_frame(&gpu, &mut p, &Scene::new());

        let texel = readback::read_texel(&gpu.device, &gpu.queue, &output, W / 2, H / 2)
            .expect("readback");
        assert_eq!(&texel[..4], &[0, 0, 0, 255]);
        assert!(p.last_frame().is_some_and(|f| f.display.is_some()));
        assert_eq!(p.pick_object(&gpu.render_ctx(OUT_FORMAT, W, H), 1, 1), 0);
    }

    #[test]
    fn empty_chain_passes_lighting_through() {
        let Some(gpu) = gpu() else { return };
        let mut p = pipeline(&gpu);
        for name in p.post_chain().effect_names() {
            p.post_chain_mut().remove_effect(name);
        }
        run_frame(&gpu, &mut p, &Scene::new());

        let frame = p.last_frame().expect("frame outputs");
        let (Some(lit), Some(post)) = (&frame.lighting, &frame.post_process) else {
            panic!("lighting and post-process must be published");
        };
        assert!(Arc::ptr_eq(lit, post));
    }

    #[test]
    fn active_chain_publishes_its_own_target() {
        let Some(gpu) = gpu() else { return };
        let mut p = pipeline(&gpu);
        run_frame(&gpu, &mut p, &Scene::new());

        let frame = p.last_frame().expect("frame outputs");
        let (Some(lit), Some(post)) = (&frame.lighting, &frame.post_process) else {
            panic!("lighting and post-process must be published");
        };
        assert!(!Arc::ptr_eq(lit, post));
    }

    #[test]
    fn disabled_ssao_still_lights_the_frame() {
        let Some(gpu) = gpu() else { return };
        let mut p = pipeline(&gpu);
        p.config_mut().ssao_enabled = false;
        run_frame(&gpu, &mut p, &Scene::new());

        let frame = p.last_frame().expect("frame outputs");
        assert!(frame.lighting.is_some());
        assert!(frame.display.is_some());
    }

    // ── materials ─────────────────────────────────────────────────────────

    fn cube(gpu: &HeadlessGpu) -> Arc<Mesh> {
        Arc::new(Mesh::upload(&gpu.device, "test cube", &primitives::cube(2.0)))
    }

    fn material(color: Vec3) -> Arc<Material> {
        let mut m = Material::new("test");
        m.diffuse_color = color;
        Arc::new(m)
    }

    fn centre_diffuse(gpu: &HeadlessGpu, p: &RenderPipeline) -> [u8; 4] {
        let frame = p.last_frame().expect("frame outputs");
        let gbuffer = frame.gbuffer.as_ref().expect("gbuffer");
        let texel = readback::read_texel(&gpu.device, &gpu.queue, &gbuffer.diffuse, W / 2, H / 2)
            .expect("readback");
        [texel[0], texel[1], texel[2], texel[3]]
    }

    #[test]
    fn material_edit_shows_in_next_frame() {
        let Some(gpu) = gpu() else { return };
        let mut p = pipeline(&gpu);
        let mut scene = Scene::new();
        let r = scene.add_renderable(Renderable::primitive("cube", cube(&gpu), material(Vec3::X)));

        run_frame(&gpu, &mut p, &scene);
        let before = centre_diffuse(&gpu, &p);
        assert!(before[0] > 200 && before[1] < 50, "{before:?}");

        {
            let mut r = r.borrow_mut();
            let Some(Payload::Primitive { material, .. }) = r.payload.as_mut() else {
                panic!("primitive payload");
            };
            let id = material.id();
            Arc::make_mut(material).diffuse_color = Vec3::Y;
            assert_eq!(material.id(), id);
        }

        run_frame(&gpu, &mut p, &scene);
        let after = centre_diffuse(&gpu, &p);
        assert!(after[0] < 50 && after[1] > 200, "{after:?}");
    }

    #[test]
    fn unused_materials_are_evicted() {
        let Some(gpu) = gpu() else { return };
        let mut p = pipeline(&gpu);
        let mut scene = Scene::new();
        let mesh = cube(&gpu);
        scene.add_renderable(Renderable::primitive("a", Arc::clone(&mesh), material(Vec3::X)));
        let b = scene.add_renderable(Renderable::primitive("b", mesh, material(Vec3::Y)));

        run_frame(&gpu, &mut p, &scene);
        assert_eq!(p.geometry.cached_materials(), 2);

        let uid = b.borrow().uid;
        scene.remove_renderable(uid);
        run_frame(&gpu, &mut p, &scene);
        assert_eq!(p.geometry.cached_materials(), 1);

        scene.clear();
        run_frame(&gpu, &mut p, &scene);
        assert_eq!(p.geometry.cached_materials(), 0);
    }

    #[test]
    fn resize_ignores_zero_and_drops_last_frame() {
        let Some(gpu) = gpu() else { return };
        let mut p = pipeline(&gpu);
        run_frame(&gpu, &mut p, &Scene::new());

        let ctx = gpu.render_ctx(OUT_FORMAT, W, H);
        p.resize(&ctx, 0, 10);
        assert_eq!(p.size(), (W, H));
        assert!(p.last_frame().is_some());

        p.resize(&ctx, 32, 32);
        assert_eq!(p.size(), (32, 32));
        assert!(p.last_frame().is_none());
    }
}
