//! Wavefront OBJ / MTL ingestion.
//!
//! Supports `v`, `vt`, `vn`, polygonal `f` (fan-triangulated, negative
//! indices allowed), `usemtl` and `mtllib`. Groups without normals get flat
//! normals. Unknown statements are ignored.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use glam::Vec3;

use super::{
    LoadError, LoadResult, Material, MaterialLibrary, Mesh, MeshData, Model, ModelPart,
    TextureRegistry, Vertex,
};

/// Parsed OBJ contents, one mesh per `usemtl` run.
#[derive(Debug, Default)]
pub struct ObjData {
    pub groups: Vec<ObjGroup>,
    pub mtllibs: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ObjGroup {
    pub material: Option<String>,
    pub mesh: MeshData,
}

/// One `newmtl` block.
#[derive(Debug, Clone, PartialEq)]
pub struct MtlEntry {
    pub name: String,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub diffuse_map: Option<String>,
    pub specular_map: Option<String>,
    pub normal_map: Option<String>,
}

impl MtlEntry {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::splat(0.5),
            shininess: 32.0,
            diffuse_map: None,
            specular_map: None,
            normal_map: None,
        }
    }
}

/// Corner key: position / uv / normal indices (already resolved, 0-based).
type Corner = (usize, Option<usize>, Option<usize>);

struct GroupBuilder {
    material: Option<String>,
    corners: Vec<[Corner; 3]>,
    has_normals: bool,
}

impl GroupBuilder {
    fn new(material: Option<String>) -> Self {
        Self {
            material,
            corners: Vec::new(),
            has_normals: true,
        }
    }

    fn finish(self, positions: &[Vec3], uvs: &[[f32; 2]], normals: &[Vec3]) -> Option<ObjGroup> {
        if self.corners.is_empty() {
            return None;
        }
        let mut mesh = MeshData::default();
        let vertex = |c: &Corner| {
            let uv = c.1.map_or([0.0, 0.0], |i| uvs[i]);
            let n = c.2.map_or(Vec3::ZERO, |i| normals[i]);
            Vertex::new(positions[c.0], n, uv)
        };

        if self.has_normals {
            let mut dedup: HashMap<Corner, u32> = HashMap::new();
            for tri in &self.corners {
                for c in tri {
                    let idx = *dedup.entry(*c).or_insert_with(|| {
                        mesh.vertices.push(vertex(c));
                        (mesh.vertices.len() - 1) as u32
                    });
                    mesh.indices.push(idx);
                }
            }
        } else {
            // Unshared corners so generated normals stay per-face.
            for tri in &self.corners {
                for c in tri {
                    mesh.indices.push(mesh.vertices.len() as u32);
                    mesh.vertices.push(vertex(c));
                }
            }
            mesh.recompute_normals();
        }

        Some(ObjGroup {
            material: self.material,
            mesh,
        })
    }
}

fn parse_floats<const N: usize>(line_no: usize, args: &[&str]) -> LoadResult<[f32; N]> {
    let mut out = [0.0f32; N];
    for (i, slot) in out.iter_mut().enumerate() {
        let tok = args
            .get(i)
            .ok_or_else(|| LoadError::parse(line_no, format!("expected {N} numbers")))?;
        *slot = tok
            .parse()
            .map_err(|_| LoadError::parse(line_no, format!("invalid number '{tok}'")))?;
    }
    Ok(out)
}

/// Resolves a 1-based (or negative, relative) OBJ index against `len`.
fn resolve_index(line_no: usize, tok: &str, len: usize) -> LoadResult<usize> {
    let raw: i64 = tok
        .parse()
        .map_err(|_| LoadError::parse(line_no, format!("invalid index '{tok}'")))?;
    let idx = if raw > 0 {
        raw - 1
    } else if raw < 0 {
        len as i64 + raw
    } else {
        -1
    };
    if idx < 0 || idx as usize >= len {
        return Err(LoadError::parse(line_no, format!("index {raw} out of range")));
    }
    Ok(idx as usize)
}

/// Parses OBJ source text.
pub fn parse_obj(src: &str) -> LoadResult<ObjData> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();

    let mut data = ObjData::default();
    let mut done: Vec<GroupBuilder> = Vec::new();
    let mut current = GroupBuilder::new(None);

    for (i, raw_line) in src.lines().enumerate() {
        let line_no = i + 1;
        let line = raw_line.split('#').next().unwrap_or("").trim();
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else { continue };
        let args: Vec<&str> = parts.collect();

        match keyword {
            "v" => positions.push(Vec3::from(parse_floats::<3>(line_no, &args)?)),
            "vn" => normals.push(Vec3::from(parse_floats::<3>(line_no, &args)?).normalize_or_zero()),
            "vt" => {
                let [u, v] = parse_floats::<2>(line_no, &args)?;
                uvs.push([u, 1.0 - v]);
            }
            "f" => {
                if args.len() < 3 {
                    return Err(LoadError::parse(line_no, "face needs at least 3 vertices"));
                }
                let mut poly: Vec<Corner> = Vec::with_capacity(args.len());
                for tok in &args {
                    let mut it = tok.split('/');
                    let v = resolve_index(line_no, it.next().unwrap_or(""), positions.len())?;
                    let vt = match it.next() {
                        Some(s) if !s.is_empty() => Some(resolve_index(line_no, s, uvs.len())?),
                        _ => None,
                    };
                    let vn = match it.next() {
                        Some(s) if !s.is_empty() => Some(resolve_index(line_no, s, normals.len())?),
                        _ => None,
                    };
                    if vn.is_none() {
                        current.has_normals = false;
                    }
                    poly.push((v, vt, vn));
                }
                for k in 1..poly.len() - 1 {
                    current.corners.push([poly[0], poly[k], poly[k + 1]]);
                }
            }
            "usemtl" => {
                let name = args.first().map(|s| s.to_string());
                let prev = std::mem::replace(&mut current, GroupBuilder::new(name));
                done.push(prev);
            }
            "mtllib" => data.mtllibs.extend(args.iter().map(|s| s.to_string())),
            _ => {}
        }
    }
    done.push(current);

    data.groups = done
        .into_iter()
        .filter_map(|g| g.finish(&positions, &uvs, &normals))
        .collect();

    if data.groups.is_empty() {
        return Err(LoadError::UnsupportedFormat("OBJ contains no faces".into()));
    }
    Ok(data)
}

/// Parses MTL source text.
pub fn parse_mtl(src: &str) -> LoadResult<Vec<MtlEntry>> {
    let mut out: Vec<MtlEntry> = Vec::new();

    for (i, raw_line) in src.lines().enumerate() {
        let line_no = i + 1;
        let line = raw_line.split('#').next().unwrap_or("").trim();
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else { continue };
        let args: Vec<&str> = parts.collect();

        if keyword == "newmtl" {
            let name = args
                .first()
                .ok_or_else(|| LoadError::parse(line_no, "newmtl without a name"))?;
            out.push(MtlEntry::new(name));
            continue;
        }

        let Some(entry) = out.last_mut() else { continue };
        // Map statements may carry options (`-bm 1.0 file.png`); the file is last.
        let map_file = || args.last().map(|s| s.to_string());
        match keyword {
            "Kd" => entry.diffuse = Vec3::from(parse_floats::<3>(line_no, &args)?),
            "Ks" => entry.specular = Vec3::from(parse_floats::<3>(line_no, &args)?),
            "Ns" => entry.shininess = parse_floats::<1>(line_no, &args)?[0].max(1.0),
            "map_Kd" => entry.diffuse_map = map_file(),
            "map_Ks" => entry.specular_map = map_file(),
            "map_Bump" | "map_bump" | "bump" | "norm" => entry.normal_map = map_file(),
            _ => {}
        }
    }
    Ok(out)
}

/// Loads an OBJ file, its MTL libraries and textures, and uploads meshes.
///
/// Missing MTL files or textures are logged and replaced with defaults; only
/// an unreadable or malformed OBJ fails the load.
pub fn load_obj(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: &Path,
    textures: &TextureRegistry,
    materials: &mut MaterialLibrary,
) -> LoadResult<Model> {
    let src = std::fs::read_to_string(path)?;
    let data = parse_obj(&src)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    for lib in &data.mtllibs {
        let mtl_path = dir.join(lib);
        let entries = match std::fs::read_to_string(&mtl_path)
            .map_err(LoadError::from)
            .and_then(|s| parse_mtl(&s))
        {
            Ok(e) => e,
            Err(e) => {
                log::warn!("material library {} skipped: {e}", mtl_path.display());
                continue;
            }
        };
        for entry in entries {
            let mut m = Material::new(entry.name.as_str());
            m.diffuse_color = entry.diffuse;
            m.specular_color = entry.specular;
            m.shininess = entry.shininess;
            let map = |file: &Option<String>, srgb: bool| {
                file.as_ref().map(|f| {
                    textures.load_or(device, queue, &dir.join(f), srgb, textures.white())
                })
            };
            m.diffuse_map = map(&entry.diffuse_map, true);
            m.specular_map = map(&entry.specular_map, false);
            m.normal_map = entry
                .normal_map
                .as_ref()
                .map(|f| textures.load_or(device, queue, &dir.join(f), false, textures.flat_normal()));
            materials.insert(m);
        }
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());

    let parts: Vec<ModelPart> = data
        .groups
        .iter()
        .enumerate()
        .map(|(i, g)| ModelPart {
            mesh: Arc::new(Mesh::upload(device, &format!("{name} part {i}"), &g.mesh)),
            material: g
                .material
                .as_deref()
                .map(|m| materials.get_or_default(m))
                .unwrap_or_else(|| Arc::clone(materials.default_material())),
        })
        .collect();

    let tris: usize = data.groups.iter().map(|g| g.mesh.triangle_count()).sum();
    log::info!(
        "loaded model {} ({} parts, {tris} triangles)",
        path.display(),
        parts.len()
    );
    Ok(Model::new(name, parts))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    // ── obj ───────────────────────────────────────────────────────────────

    #[test]
    fn quad_is_fan_triangulated_and_shared() {
        let data = parse_obj(QUAD).unwrap();
        assert_eq!(data.groups.len(), 1);
        let mesh = &data.groups[0].mesh;
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn texture_v_is_flipped() {
        let data = parse_obj(QUAD).unwrap();
        assert_eq!(data.groups[0].mesh.vertices[0].uv, [0.0, 1.0]);
    }

    #[test]
    fn missing_normals_are_generated_flat() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let data = parse_obj(src).unwrap();
        let mesh = &data.groups[0].mesh;
        assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
        assert!(mesh.vertices.iter().all(|v| v.uv == [0.0, 0.0]));
    }

    #[test]
    fn negative_indices_are_relative() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let data = parse_obj(src).unwrap();
        assert_eq!(data.groups[0].mesh.triangle_count(), 1);
    }

    #[test]
    fn usemtl_splits_groups() {
        let src = "\
mtllib scene.mtl
v 0 0 0
v 1 0 0
v 0 1 0
usemtl red
f 1 2 3
usemtl blue
f 3 2 1
";
        let data = parse_obj(src).unwrap();
        assert_eq!(data.mtllibs, vec!["scene.mtl".to_string()]);
        let names: Vec<_> = data.groups.iter().map(|g| g.material.as_deref()).collect();
        assert_eq!(names, vec![Some("red"), Some("blue")]);
    }

    #[test]
    fn out_of_range_index_reports_line() {
        let src = "v 0 0 0\nf 1 2 3\n";
        match parse_obj(src) {
            Err(LoadError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_faces_is_an_error() {
        assert!(matches!(
            parse_obj("v 0 0 0\n"),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    // ── mtl ───────────────────────────────────────────────────────────────

    #[test]
    fn mtl_reads_colors_and_maps() {
        let src = "\
newmtl brick
Kd 0.5 0.25 0.125
Ks 0.1 0.1 0.1
Ns 64
map_Kd brick.png
map_Bump -bm 1.0 brick_n.png
";
        let mats = parse_mtl(src).unwrap();
        assert_eq!(mats.len(), 1);
        let m = &mats[0];
        assert_eq!(m.diffuse, Vec3::new(0.5, 0.25, 0.125));
        assert_eq!(m.shininess, 64.0);
        assert_eq!(m.diffuse_map.as_deref(), Some("brick.png"));
        assert_eq!(m.normal_map.as_deref(), Some("brick_n.png"));
        assert_eq!(m.specular_map, None);
    }

    #[test]
    fn statements_before_newmtl_are_ignored() {
        let mats = parse_mtl("Kd 1 1 1\nnewmtl a\n").unwrap();
        assert_eq!(mats.len(), 1);
        assert_eq!(mats[0].diffuse, Vec3::splat(0.8));
    }
}
