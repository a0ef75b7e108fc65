//! Ishtar viewer: the demo scene plus any `.ply` splat clouds and `.obj`
//! models given on the command line.
//!
//! Controls: left drag orbits, right drag pans, wheel zooms, left click
//! selects, `1`-`8` switch view modes, `O` toggles SSAO, `B` toggles bloom,
//! `F` frames the scene, `Esc` quits.

mod controls;
mod demo;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use winit::dpi::LogicalSize;

use ishtar_engine::assets::{load_obj, MaterialLibrary, TextureRegistry};
use ishtar_engine::core::{App, AppControl, FrameCtx};
use ishtar_engine::device::GpuInit;
use ishtar_engine::logging::{init_logging, LoggingConfig};
use ishtar_engine::render::effects::BloomEffect;
use ishtar_engine::render::{FrameInputs, RenderCtx, RenderPipeline, ViewMode};
use ishtar_engine::scene::{Camera, Renderable, Scene};
use ishtar_engine::splat::{load_ply, PlyOptions, PointCloud, SplatConfig, SplatStage};
use ishtar_engine::window::{RedrawPolicy, Runtime, RuntimeConfig};

use controls::{Action, Controls};

/// Command line: files split by extension, plus `-v` for debug logging.
#[derive(Debug, Default)]
struct Inputs {
    plys: Vec<PathBuf>,
    objs: Vec<PathBuf>,
    ignored: Vec<PathBuf>,
    verbose: bool,
}

impl Inputs {
    fn from_args(args: impl IntoIterator<Item = String>) -> Self {
        let mut inputs = Inputs::default();
        for arg in args {
            if arg == "-v" || arg == "--verbose" {
                inputs.verbose = true;
                continue;
            }
            let path = PathBuf::from(arg);
            match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase) {
                Some(ext) if ext == "ply" => inputs.plys.push(path),
                Some(ext) if ext == "obj" => inputs.objs.push(path),
                _ => inputs.ignored.push(path),
            }
        }
        inputs
    }
}

/// GPU-side state, created on the first frame.
struct Loaded {
    pipeline: RenderPipeline,
    scene: Scene,
}

struct Viewer {
    inputs: Inputs,
    loaded: Option<Loaded>,
    camera: Camera,
    controls: Controls,
    selected_uid: u32,
    view_mode: ViewMode,
}

impl Viewer {
    fn new(inputs: Inputs) -> Self {
        Self {
            inputs,
            loaded: None,
            camera: Camera::default(),
            controls: Controls::default(),
            selected_uid: 0,
            view_mode: ViewMode::Final,
        }
    }

    fn load(&mut self, rctx: &RenderCtx<'_>) -> Loaded {
        let (device, queue) = (rctx.device, rctx.queue);
        let textures = Arc::new(TextureRegistry::new(device, queue));
        let mut materials = MaterialLibrary::new();
        let mut pipeline = RenderPipeline::new(rctx, rctx.width, rctx.height, Arc::clone(&textures));
        let mut scene = Scene::new();
        demo::populate(device, &mut scene, &mut materials, &mut pipeline);

        for path in &self.inputs.objs {
            match load_obj(device, queue, path, &textures, &mut materials) {
                Ok(model) => {
                    let name = model.name.clone();
                    scene.add_renderable(Renderable::model(name, Arc::new(model)));
                }
                Err(e) => log::error!("failed to load {}: {e}", path.display()),
            }
        }

        let mut clouds: Vec<PointCloud> = Vec::new();
        for path in &self.inputs.plys {
            match load_ply(path, PlyOptions::default()) {
                Ok(cloud) => clouds.push(cloud),
                Err(e) => log::error!("failed to load {}: {e}", path.display()),
            }
        }
        if clouds.is_empty() {
            clouds.push(demo::splat_ring(2_000, 2.5));
        } else if let Some(cloud) = clouds.first() {
            let (min, max) = cloud.bounds();
            self.camera.frame_bounds(min, max);
        }

        for cloud in clouds {
            let mut stage = SplatStage::new(SplatConfig::default());
            match stage.load_points(rctx, cloud) {
                Ok(()) => {
                    pipeline.add_splat_stage(stage);
                }
                Err(e) => log::error!("splat cloud rejected: {e}"),
            }
        }

        log::info!(
            "scene ready: {} renderables, {} lights",
            scene.len(),
            scene.lights().len()
        );
        Loaded { pipeline, scene }
    }

    fn apply(&mut self, action: Action, rctx: &RenderCtx<'_>) -> AppControl {
        let Some(loaded) = self.loaded.as_mut() else {
            return AppControl::Continue;
        };
        match action {
            Action::Exit => return AppControl::Exit,
            Action::ViewMode(mode) => {
                self.view_mode = mode;
                log::info!("view mode: {}", mode.label());
            }
            Action::ToggleSsao => {
                let config = loaded.pipeline.config_mut();
                config.ssao_enabled = !config.ssao_enabled;
                log::info!("ssao {}", if config.ssao_enabled { "on" } else { "off" });
            }
            Action::ToggleBloom => {
                if let Some(bloom) = loaded.pipeline.post_chain_mut().effect_mut(BloomEffect::NAME) {
                    let enabled = !bloom.enabled();
                    bloom.set_enabled(enabled);
                    log::info!("bloom {}", if enabled { "on" } else { "off" });
                }
            }
            Action::Frame => {
                if let Some((min, max)) = scene_bounds(&loaded.scene) {
                    self.camera.frame_bounds(min, max);
                }
            }
            Action::Pick { x, y } => {
                self.selected_uid = loaded.pipeline.pick_object(rctx, x, y);
                let name = loaded
                    .scene
                    .renderable_by_uid(self.selected_uid)
                    .map(|r| r.borrow().name.clone());
                match name {
                    Some(name) => log::info!("selected `{name}` (uid {})", self.selected_uid),
                    None => log::info!("selection cleared"),
                }
            }
        }
        AppControl::Continue
    }
}

/// World-space bounds over every loaded primitive and model.
fn scene_bounds(scene: &Scene) -> Option<(glam::Vec3, glam::Vec3)> {
    use ishtar_engine::scene::Payload;

    let mut acc: Option<(glam::Vec3, glam::Vec3)> = None;
    for r in scene.renderables() {
        let r = r.borrow();
        let (lo, hi) = match r.payload.as_ref() {
            Some(Payload::Primitive { mesh, .. }) => (mesh.bounds_min, mesh.bounds_max),
            Some(Payload::Model(model)) => (model.bounds_min, model.bounds_max),
            None => continue,
        };
        let m = r.transform.matrix();
        let (a, b) = (m.transform_point3(lo), m.transform_point3(hi));
        let (lo, hi) = (a.min(b), a.max(b));
        acc = Some(match acc {
            Some((amin, amax)) => (amin.min(lo), amax.max(hi)),
            None => (lo, hi),
        });
    }
    acc
}

impl App for Viewer {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let scale = ctx.window.scale_factor();
        let actions = self.controls.update(ctx.input, ctx.input_frame, scale, &mut self.camera);
        let time = ctx.time.elapsed;
        if ctx.time.frame_index == 0 {
            log::info!("device fits {} splats per cloud", ctx.gpu.max_splats());
        }
        if ctx.time.frame_index % TITLE_REFRESH_FRAMES == 0 {
            ctx.window
                .set_title(&format!("ishtar | {} | {:.0} fps", self.view_mode.label(), ctx.time.fps));
        }

        let mut control = AppControl::Continue;
        let draw = ctx.render(|rctx, target| {
            if self.loaded.is_none() {
                self.loaded = Some(self.load(rctx));
            }
            for action in actions {
                if self.apply(action, rctx) == AppControl::Exit {
                    control = AppControl::Exit;
                }
            }

            let Some(loaded) = self.loaded.as_mut() else { return };
            if loaded.pipeline.size() != (rctx.width, rctx.height) {
                loaded.pipeline.resize(rctx, rctx.width, rctx.height);
            }
            let frame = FrameInputs {
                camera: &self.camera,
                scene: &loaded.scene,
                selected_uid: self.selected_uid,
                view_mode: self.view_mode,
                time,
            };
            loaded.pipeline.execute(rctx, target, &frame);
        });

        if draw == AppControl::Exit {
            return AppControl::Exit;
        }
        control
    }

    fn on_exit(&mut self) {
        // Joins every splat sort worker while the device is still alive.
        if let Some(loaded) = self.loaded.take() {
            log::info!("shutting down: {} renderables", loaded.scene.len());
        }
    }
}

/// Frames between window title refreshes.
const TITLE_REFRESH_FRAMES: u64 = 30;

fn main() -> Result<()> {
    let inputs = Inputs::from_args(std::env::args().skip(1));
    init_logging(if inputs.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    });
    for path in &inputs.ignored {
        log::warn!("ignoring {}: expected a .ply or .obj file", path.display());
    }

    log::info!(
        "ishtar viewer: {} splat file(s), {} model(s)",
        inputs.plys.len(),
        inputs.objs.len()
    );

    let config = RuntimeConfig {
        title: "ishtar".to_string(),
        initial_size: LogicalSize::new(1280.0, 720.0),
        // Sorted splat buffers arrive asynchronously; keep presenting.
        redraw: RedrawPolicy::Continuous,
    };
    Runtime::run(config, GpuInit::default(), Viewer::new(inputs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_split_by_extension() {
        let inputs = Inputs::from_args(
            ["a.ply", "B.PLY", "model.obj", "notes.txt", "noext"].map(String::from),
        );
        assert_eq!(inputs.plys.len(), 2);
        assert_eq!(inputs.objs, [PathBuf::from("model.obj")]);
        assert_eq!(inputs.ignored.len(), 2);
        assert!(!inputs.verbose);
    }

    #[test]
    fn verbose_flag_is_not_a_file() {
        let inputs = Inputs::from_args(["--verbose", "scan.ply"].map(String::from));
        assert!(inputs.verbose);
        assert_eq!(inputs.plys, [PathBuf::from("scan.ply")]);
    }
}
