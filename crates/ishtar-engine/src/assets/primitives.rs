//! Procedural meshes used by the demo scene and tests.
//!
//! Convention: counter-clockwise front faces, outward normals, UV origin at
//! the top-left of each face.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use super::{MeshData, Vertex};

/// Appends one square face of half-size `h`, centred at `n * offset`.
fn push_face(mesh: &mut MeshData, n: Vec3, h: f32, offset: f32) {
    let v = if n.y.abs() > 0.5 {
        Vec3::new(0.0, 0.0, -n.y.signum())
    } else {
        Vec3::Y
    };
    // u × v == n keeps the winding counter-clockwise seen from outside.
    let u = v.cross(n);
    let c = n * offset;

    let base = mesh.vertices.len() as u32;
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    for (su, sv) in corners {
        let p = c + (u * su + v * sv) * h;
        let uv = [(su + 1.0) * 0.5, (1.0 - sv) * 0.5];
        mesh.vertices.push(Vertex::new(p, n, uv));
    }
    mesh.indices
        .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}

/// Axis-aligned cube with edge length `size`, centred at the origin.
pub fn cube(size: f32) -> MeshData {
    let h = size * 0.5;
    let mut mesh = MeshData::default();
    for n in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
        push_face(&mut mesh, n, h, h);
    }
    mesh
}

/// Ground plane in XZ facing +Y with edge length `size`.
pub fn plane(size: f32) -> MeshData {
    let mut mesh = MeshData::default();
    push_face(&mut mesh, Vec3::Y, size * 0.5, 0.0);
    mesh
}

/// UV sphere. `sectors` splits longitude, `stacks` latitude (minimums 3 and 2).
pub fn sphere(radius: f32, sectors: u32, stacks: u32) -> MeshData {
    let sectors = sectors.max(3);
    let stacks = stacks.max(2);
    let mut mesh = MeshData::default();

    for i in 0..=stacks {
        let phi = PI / 2.0 - i as f32 * PI / stacks as f32;
        let (y, ring) = (phi.sin(), phi.cos());
        for j in 0..=sectors {
            let theta = j as f32 * TAU / sectors as f32;
            let n = Vec3::new(ring * theta.sin(), y, ring * theta.cos());
            let uv = [j as f32 / sectors as f32, i as f32 / stacks as f32];
            mesh.vertices.push(Vertex::new(n * radius, n, uv));
        }
    }

    let row = sectors + 1;
    for i in 0..stacks {
        for j in 0..sectors {
            let k1 = i * row + j;
            let k2 = k1 + row;
            if i != 0 {
                mesh.indices.extend_from_slice(&[k1, k2, k1 + 1]);
            }
            if i != stacks - 1 {
                mesh.indices.extend_from_slice(&[k1 + 1, k2, k2 + 1]);
            }
        }
    }
    mesh
}
