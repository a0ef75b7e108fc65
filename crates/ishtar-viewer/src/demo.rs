//! Built-in scene shown when the viewer starts.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use glam::{Quat, Vec3, Vec4};

use ishtar_engine::assets::{primitives, Material, MaterialLibrary, Mesh};
use ishtar_engine::render::passes::{BlendMode, ForwardRenderState};
use ishtar_engine::render::RenderPipeline;
use ishtar_engine::scene::{Light, Renderable, Scene, Transform};
use ishtar_engine::splat::{GaussianPoint, PointCloud};

/// Fills `scene` with a ground plane, a cube, a sphere and three lights, and
/// adds a glowing forward-shaded sphere to `pipeline`.
pub fn populate(
    device: &wgpu::Device,
    scene: &mut Scene,
    materials: &mut MaterialLibrary,
    pipeline: &mut RenderPipeline,
) {
    let plane = Arc::new(Mesh::upload(device, "demo plane", &primitives::plane(20.0)));
    let cube = Arc::new(Mesh::upload(device, "demo cube", &primitives::cube(1.0)));
    let sphere = Arc::new(Mesh::upload(device, "demo sphere", &primitives::sphere(0.6, 48, 24)));

    let ground = materials.insert(Material::colored("ground", Vec3::splat(0.6)));
    let mut red = Material::colored("red", Vec3::new(0.8, 0.15, 0.1));
    red.shininess = 64.0;
    let red = materials.insert(red);
    let blue = materials.insert(Material::colored("blue", Vec3::new(0.15, 0.3, 0.9)));

    scene.add_renderable(Renderable::primitive("ground", plane, ground));
    scene.add_renderable(
        Renderable::primitive("cube", cube, red).with_transform(
            Transform::from_translation(Vec3::new(-1.2, 0.5, 0.0))
                .with_rotation(Quat::from_rotation_y(0.6)),
        ),
    );
    scene.add_renderable(
        Renderable::primitive("sphere", Arc::clone(&sphere), blue)
            .with_transform(Transform::from_translation(Vec3::new(1.2, 0.6, 0.0))),
    );

    scene.add_light(Light::directional(Vec3::new(-0.4, -1.0, -0.3), Vec3::ONE, 0.6));
    scene.add_light(Light::point(Vec3::new(2.0, 3.0, 2.0), Vec3::new(1.0, 0.9, 0.8), 2.0));
    scene.add_light(Light::spot(
        Vec3::new(-2.0, 4.0, 1.0),
        Vec3::new(0.3, -1.0, -0.2),
        Vec3::new(0.6, 0.7, 1.0),
        3.0,
    ));

    // Forward items stay out of the scene so they never reach the G-Buffer.
    let glow = Renderable::primitive("glow", sphere, Arc::clone(materials.default_material()))
        .with_transform(
            Transform::from_translation(Vec3::new(0.0, 1.6, -1.2)).with_scale(Vec3::splat(0.7)),
        )
        .with_color(Vec4::new(0.3, 0.9, 1.0, 0.8));
    pipeline.add_forward_renderable(
        Rc::new(RefCell::new(glow)),
        None,
        ForwardRenderState {
            blend_mode: BlendMode::Additive,
            ..Default::default()
        },
    );
}

/// A small ring of splats, used when no `.ply` is given.
pub fn splat_ring(count: usize, radius: f32) -> PointCloud {
    let points = (0..count)
        .map(|i| {
            let t = i as f32 / count as f32 * std::f32::consts::TAU;
            GaussianPoint {
                position: Vec3::new(t.cos() * radius, 1.0 + (t * 3.0).sin() * 0.2, t.sin() * radius),
                sh_dc: [t.cos() * 1.5, (t + 2.1).cos() * 1.5, (t + 4.2).cos() * 1.5],
                opacity: 0.8,
                scale: Vec3::new(0.06, 0.06, 0.02),
                rotation: Quat::from_rotation_y(-t),
                ..Default::default()
            }
        })
        .collect();
    PointCloud::with_spatial_order(points)
}
