//! PLY ingestion for Gaussian splat exports.
//!
//! Reads the `vertex` element of `ascii` or `binary_little_endian` files.
//! Fixed-size elements ahead of it are skipped; anything after it is ignored.
//! Raw log-scales and logit opacities are activated on load.

use std::path::Path;

use glam::{Quat, Vec3};
use rayon::prelude::*;

use super::{GaussianPoint, PointCloud};
use crate::assets::{LoadError, LoadResult};

/// Loader switches.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlyOptions {
    /// Converts from the capture convention (y down, z forward) to y up.
    pub flip_yz: bool,
}

impl Default for PlyOptions {
    fn default() -> Self {
        Self { flip_yz: true }
    }
}

/// Reads and parses a PLY file, returning a spatially ordered cloud.
pub fn load_ply(path: impl AsRef<Path>, opts: PlyOptions) -> LoadResult<PointCloud> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let cloud = parse_ply(&bytes, opts)?;
    log::info!("loaded {} splats from {}", cloud.len(), path.display());
    Ok(cloud)
}

/// Parses PLY bytes.
pub fn parse_ply(bytes: &[u8], opts: PlyOptions) -> LoadResult<PointCloud> {
    let (header, body_start) = parse_header(bytes)?;
    let layout = VertexLayout::resolve(&header.vertex.properties)?;
    let body = &bytes[body_start..];

    let points = match header.format {
        Format::Ascii => decode_ascii(body, &header, &layout, opts)?,
        Format::BinaryLe => decode_binary(body, &header, &layout, opts)?,
    };
    Ok(PointCloud::with_spatial_order(points))
}

// ── header ────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Format {
    Ascii,
    BinaryLe,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Scalar {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            _ => return None,
        })
    }

    fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    fn read_le(self, b: &[u8]) -> f32 {
        match self {
            Self::I8 => b[0] as i8 as f32,
            Self::U8 => b[0] as f32,
            Self::I16 => i16::from_le_bytes([b[0], b[1]]) as f32,
            Self::U16 => u16::from_le_bytes([b[0], b[1]]) as f32,
            Self::I32 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32,
            Self::U32 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32,
            Self::F32 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            Self::F64 => f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32,
        }
    }
}

#[derive(Debug, Clone)]
struct Property {
    name: String,
    ty: Scalar,
    /// Byte offset within one binary record.
    offset: usize,
}

#[derive(Debug, Clone, Default)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
    stride: usize,
    has_list: bool,
}

#[derive(Debug)]
struct Header {
    format: Format,
    /// Elements that precede `vertex` in the body.
    before: Vec<Element>,
    vertex: Element,
}

fn parse_header(bytes: &[u8]) -> LoadResult<(Header, usize)> {
    let mut pos = 0usize;
    let next_line = |pos: &mut usize| -> Option<String> {
        if *pos >= bytes.len() {
            return None;
        }
        let rest = &bytes[*pos..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        *pos += (end + 1).min(rest.len());
        Some(String::from_utf8_lossy(&rest[..end]).trim_end_matches('\r').to_string())
    };

    match next_line(&mut pos) {
        Some(l) if l.trim() == "ply" => {}
        _ => return Err(LoadError::UnsupportedFormat("missing `ply` magic".into())),
    }

    let mut format = None;
    let mut elements: Vec<Element> = Vec::new();
    let mut n = 1usize;

    loop {
        let Some(line) = next_line(&mut pos) else {
            return Err(LoadError::parse(n, "header ended without `end_header`"));
        };
        n += 1;
        let mut tok = line.split_whitespace();
        match tok.next() {
            Some("format") => {
                format = Some(match tok.next() {
                    Some("ascii") => Format::Ascii,
                    Some("binary_little_endian") => Format::BinaryLe,
                    Some(other) => {
                        return Err(LoadError::UnsupportedFormat(format!("PLY format `{other}`")));
                    }
                    None => return Err(LoadError::parse(n, "format without a value")),
                });
            }
            Some("element") => {
                let name = tok.next().ok_or_else(|| LoadError::parse(n, "element without name"))?;
                let count = tok
                    .next()
                    .and_then(|c| c.parse::<usize>().ok())
                    .ok_or_else(|| LoadError::parse(n, "element count is not an integer"))?;
                elements.push(Element {
                    name: name.to_string(),
                    count,
                    ..Element::default()
                });
            }
            Some("property") => {
                let el = elements
                    .last_mut()
                    .ok_or_else(|| LoadError::parse(n, "property before any element"))?;
                let ty = tok.next().ok_or_else(|| LoadError::parse(n, "property without type"))?;
                if ty == "list" {
                    el.has_list = true;
                    continue;
                }
                let ty = Scalar::from_name(ty)
                    .ok_or_else(|| LoadError::parse(n, format!("unknown property type `{ty}`")))?;
                let name = tok.next().ok_or_else(|| LoadError::parse(n, "property without name"))?;
                el.properties.push(Property {
                    name: name.to_string(),
                    ty,
                    offset: el.stride,
                });
                el.stride += ty.size();
            }
            Some("end_header") => break,
            Some("comment") | Some("obj_info") | None => {}
            Some(other) => return Err(LoadError::parse(n, format!("unexpected header keyword `{other}`"))),
        }
    }

    let format = format.ok_or_else(|| LoadError::parse(n, "missing format line"))?;
    let vi = elements
        .iter()
        .position(|e| e.name == "vertex")
        .ok_or_else(|| LoadError::MissingProperty("vertex".into()))?;
    let mut before = elements;
    let vertex = before.remove(vi);
    before.truncate(vi);

    if let Some(e) = before.iter().find(|e| e.has_list) {
        return Err(LoadError::UnsupportedFormat(format!(
            "list element `{}` before vertex data",
            e.name
        )));
    }
    if vertex.has_list {
        return Err(LoadError::UnsupportedFormat("list property on vertex element".into()));
    }

    Ok((
        Header {
            format,
            before,
            vertex,
        },
        pos,
    ))
}

// ── vertex layout ─────────────────────────────────────────────────────────

const REQUIRED: [&str; 14] = [
    "x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2", "opacity", "scale_0", "scale_1", "scale_2",
    "rot_0", "rot_1", "rot_2", "rot_3",
];

/// Indices into the vertex property list for every field we read.
#[derive(Debug)]
struct VertexLayout {
    required: [usize; 14],
    normal: Option<[usize; 3]>,
}

impl VertexLayout {
    fn resolve(props: &[Property]) -> LoadResult<Self> {
        let find = |name: &str| props.iter().position(|p| p.name == name);
        let mut required = [0usize; 14];
        for (slot, name) in required.iter_mut().zip(REQUIRED) {
            *slot = find(name).ok_or_else(|| LoadError::MissingProperty(name.to_string()))?;
        }
        let normal = match (find("nx"), find("ny"), find("nz")) {
            (Some(x), Some(y), Some(z)) => Some([x, y, z]),
            _ => None,
        };
        Ok(Self { required, normal })
    }

    fn build(&self, value: impl Fn(usize) -> f32, opts: PlyOptions) -> GaussianPoint {
        let r = |i: usize| value(self.required[i]);
        let raw_pos = Vec3::new(r(0), r(1), r(2));
        let raw_normal = self
            .normal
            .map_or(Vec3::ZERO, |[x, y, z]| Vec3::new(value(x), value(y), value(z)));
        let (w, qx, qy, qz) = (r(10), r(11), r(12), r(13));

        let (position, normal, rotation) = if opts.flip_yz {
            (
                flip(raw_pos),
                flip(raw_normal),
                normalize_or_identity(Quat::from_xyzw(w, -qz, qy, -qx)),
            )
        } else {
            (
                raw_pos,
                raw_normal,
                normalize_or_identity(Quat::from_xyzw(qx, qy, qz, w)),
            )
        };

        GaussianPoint {
            position,
            normal,
            sh_dc: [r(3), r(4), r(5)],
            opacity: sigmoid(r(6)),
            scale: Vec3::new(r(7).exp(), r(8).exp(), r(9).exp()),
            rotation,
        }
    }
}

fn flip(v: Vec3) -> Vec3 {
    Vec3::new(v.x, -v.y, -v.z)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn normalize_or_identity(q: Quat) -> Quat {
    let len = q.length();
    if len < 1e-5 || !len.is_finite() {
        Quat::IDENTITY
    } else {
        q / len
    }
}

// ── body ──────────────────────────────────────────────────────────────────

fn decode_binary(
    body: &[u8],
    header: &Header,
    layout: &VertexLayout,
    opts: PlyOptions,
) -> LoadResult<Vec<GaussianPoint>> {
    let v = &header.vertex;
    if v.stride == 0 {
        return Ok(Vec::new());
    }
    let skip = header
        .before
        .iter()
        .try_fold(0usize, |acc, e| e.count.checked_mul(e.stride)?.checked_add(acc))
        .ok_or_else(|| oversized("leading elements"))?;
    let available = body.len().saturating_sub(skip) / v.stride;
    if skip > body.len() || v.count > available {
        return Err(LoadError::UnsupportedFormat(format!(
            "truncated vertex data: header declares {} vertices after {skip} bytes, body holds {available}",
            v.count
        )));
    }
    let data = &body[skip..skip + v.count * v.stride];

    Ok(data
        .par_chunks_exact(v.stride)
        .map(|rec| {
            layout.build(
                |i| {
                    let p = &v.properties[i];
                    p.ty.read_le(&rec[p.offset..p.offset + p.ty.size()])
                },
                opts,
            )
        })
        .collect())
}

fn oversized(what: &str) -> LoadError {
    LoadError::UnsupportedFormat(format!("{what} exceed addressable size"))
}

fn decode_ascii(
    body: &[u8],
    header: &Header,
    layout: &VertexLayout,
    opts: PlyOptions,
) -> LoadResult<Vec<GaussianPoint>> {
    let text = String::from_utf8_lossy(body);
    let skip = header
        .before
        .iter()
        .try_fold(0usize, |acc, e| acc.checked_add(e.count))
        .ok_or_else(|| oversized("leading elements"))?;
    let v = &header.vertex;

    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
    if lines.by_ref().take(skip).count() < skip {
        return Err(LoadError::UnsupportedFormat(format!(
            "expected {skip} leading element lines"
        )));
    }

    // Every ascii vertex needs at least two bytes (a value and a newline).
    let mut points = Vec::with_capacity(v.count.min(body.len() / 2));
    let mut values = Vec::with_capacity(v.properties.len());
    for _ in 0..v.count {
        let Some((ln, line)) = lines.next() else {
            return Err(LoadError::UnsupportedFormat(format!(
                "expected {} vertices, found {}",
                v.count,
                points.len()
            )));
        };
        values.clear();
        for tok in line.split_whitespace() {
            let f = tok
                .parse::<f32>()
                .map_err(|_| LoadError::parse(ln + 1, format!("bad number `{tok}`")))?;
            values.push(f);
        }
        if values.len() < v.properties.len() {
            return Err(LoadError::parse(
                ln + 1,
                format!("expected {} values, found {}", v.properties.len(), values.len()),
            ));
        }
        points.push(layout.build(|i| values[i], opts));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROPS: &str = "property float x\nproperty float y\nproperty float z\n\
property float nx\nproperty float ny\nproperty float nz\n\
property float f_dc_0\nproperty float f_dc_1\nproperty float f_dc_2\n\
property float opacity\n\
property float scale_0\nproperty float scale_1\nproperty float scale_2\n\
property float rot_0\nproperty float rot_1\nproperty float rot_2\nproperty float rot_3\n";

    fn ascii(rows: &[&str]) -> Vec<u8> {
        let mut s = format!("ply\nformat ascii 1.0\nelement vertex {}\n{PROPS}end_header\n", rows.len());
        for r in rows {
            s.push_str(r);
            s.push('\n');
        }
        s.into_bytes()
    }

    fn binary(rows: &[[f32; 17]], prefix: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut s = String::from("ply\nformat binary_little_endian 1.0\n");
        if let Some((decl, _)) = prefix {
            s.push_str(decl);
        }
        s.push_str(&format!("element vertex {}\n{PROPS}end_header\n", rows.len()));
        let mut out = s.into_bytes();
        if let Some((_, bytes)) = prefix {
            out.extend_from_slice(bytes);
        }
        for r in rows {
            for v in r {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out
    }

    const ROW: [f32; 17] = [
        1.0, 2.0, 3.0, 0.0, 0.0, 1.0, 0.5, -0.5, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
    ];

    // ── activation ────────────────────────────────────────────────────────

    #[test]
    fn activations_are_applied() {
        let opts = PlyOptions { flip_yz: false };
        let c = parse_ply(&binary(&[ROW], None), opts).unwrap();
        let p = c.points()[0];
        assert_eq!(p.position, Vec3::new(1.0, 2.0, 3.0));
        assert!((p.opacity - 0.5).abs() < 1e-6);
        assert!((p.scale - Vec3::ONE).length() < 1e-6);
        assert_eq!(p.sh_dc, [0.5, -0.5, 1.0]);
        assert!(p.rotation.abs_diff_eq(Quat::IDENTITY, 1e-6));
    }

    #[test]
    fn flip_negates_y_and_z() {
        let c = parse_ply(&binary(&[ROW], None), PlyOptions::default()).unwrap();
        let p = c.points()[0];
        assert_eq!(p.position, Vec3::new(1.0, -2.0, -3.0));
        assert_eq!(p.normal, Vec3::new(0.0, 0.0, -1.0));
        assert!((p.rotation.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn degenerate_quaternion_becomes_identity() {
        let mut row = ROW;
        row[13] = 0.0;
        let c = parse_ply(&binary(&[row], None), PlyOptions { flip_yz: false }).unwrap();
        assert_eq!(c.points()[0].rotation, Quat::IDENTITY);
    }

    #[test]
    fn unnormalized_quaternion_is_normalized() {
        let mut row = ROW;
        row[13] = 2.0;
        row[14] = 2.0;
        let c = parse_ply(&binary(&[row], None), PlyOptions { flip_yz: false }).unwrap();
        assert!((c.points()[0].rotation.length() - 1.0).abs() < 1e-5);
    }

    // ── formats ───────────────────────────────────────────────────────────

    #[test]
    fn ascii_matches_binary() {
        let row = "1 2 3 0 0 1 0.5 -0.5 1 0 0 0 0 1 0 0 0";
        let a = parse_ply(&ascii(&[row]), PlyOptions::default()).unwrap();
        let b = parse_ply(&binary(&[ROW], None), PlyOptions::default()).unwrap();
        assert_eq!(a.points(), b.points());
    }

    #[test]
    fn normals_are_optional() {
        let header = "ply\nformat ascii 1.0\nelement vertex 1\n\
property float x\nproperty float y\nproperty float z\n\
property float f_dc_0\nproperty float f_dc_1\nproperty float f_dc_2\n\
property float opacity\n\
property float scale_0\nproperty float scale_1\nproperty float scale_2\n\
property float rot_0\nproperty float rot_1\nproperty float rot_2\nproperty float rot_3\n\
end_header\n0 0 0 0 0 0 0 0 0 0 1 0 0 0\n";
        let c = parse_ply(header.as_bytes(), PlyOptions::default()).unwrap();
        assert_eq!(c.points()[0].normal, Vec3::ZERO);
    }

    #[test]
    fn fixed_size_element_before_vertex_is_skipped() {
        let junk = [7u8; 8];
        let bytes = binary(
            &[ROW],
            Some(("element camera 2\nproperty float fx\n", &junk[..])),
        );
        let c = parse_ply(&bytes, PlyOptions { flip_yz: false }).unwrap();
        assert_eq!(c.points()[0].position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn crlf_header_is_accepted() {
        let text = String::from_utf8(ascii(&["1 2 3 0 0 1 0.5 -0.5 1 0 0 0 0 1 0 0 0"]))
            .unwrap()
            .replace('\n', "\r\n");
        let c = parse_ply(text.as_bytes(), PlyOptions::default()).unwrap();
        assert_eq!(c.len(), 1);
    }

    // ── errors ────────────────────────────────────────────────────────────

    #[test]
    fn big_endian_is_unsupported() {
        let bytes = b"ply\nformat binary_big_endian 1.0\nelement vertex 0\nend_header\n";
        assert!(matches!(
            parse_ply(bytes, PlyOptions::default()),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn missing_property_is_named() {
        let bytes = b"ply\nformat ascii 1.0\nelement vertex 0\nproperty float x\nend_header\n";
        match parse_ply(bytes, PlyOptions::default()) {
            Err(LoadError::MissingProperty(name)) => assert_eq!(name, "y"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn list_before_vertex_is_unsupported() {
        let bytes = b"ply\nformat ascii 1.0\nelement face 1\nproperty list uchar int vertex_indices\n\
element vertex 0\nproperty float x\nend_header\n";
        assert!(matches!(
            parse_ply(bytes, PlyOptions::default()),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn truncated_binary_is_rejected() {
        let mut bytes = binary(&[ROW, ROW], None);
        bytes.truncate(bytes.len() - 4);
        assert!(parse_ply(&bytes, PlyOptions::default()).is_err());
    }

    fn huge_count_header(format: &str, count: usize) -> Vec<u8> {
        let mut bytes =
            format!("ply\nformat {format} 1.0\nelement vertex {count}\n{PROPS}end_header\n")
                .into_bytes();
        bytes.extend_from_slice(&[0u8; 68]);
        bytes
    }

    #[test]
    fn ascii_count_beyond_memory_is_an_error() {
        let bytes = huge_count_header("ascii", usize::MAX / 2);
        assert!(parse_ply(&bytes, PlyOptions::default()).is_err());
    }

    #[test]
    fn binary_count_that_overflows_size_is_an_error() {
        let bytes = huge_count_header("binary_little_endian", usize::MAX / 8);
        assert!(matches!(
            parse_ply(&bytes, PlyOptions::default()),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn leading_element_size_overflow_is_an_error() {
        let decl = format!("element camera {}\nproperty double fx\n", usize::MAX / 4);
        let bytes = binary(&[ROW], Some((&decl, &[][..])));
        assert!(matches!(
            parse_ply(&bytes, PlyOptions::default()),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn ascii_leading_elements_past_the_end_are_an_error() {
        let text = format!(
            "ply\nformat ascii 1.0\nelement camera {}\nproperty float fx\n\
element vertex 1\n{PROPS}end_header\n1 2 3\n",
            usize::MAX
        );
        assert!(parse_ply(text.as_bytes(), PlyOptions::default()).is_err());
    }

    #[test]
    fn missing_magic_is_rejected() {
        assert!(matches!(
            parse_ply(b"obj\n", PlyOptions::default()),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn empty_vertex_element_gives_empty_cloud() {
        let c = parse_ply(&ascii(&[]), PlyOptions::default()).unwrap();
        assert!(c.is_empty());
    }
}
