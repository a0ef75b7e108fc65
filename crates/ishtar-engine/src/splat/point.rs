use glam::{Quat, Vec3};

/// One 3D Gaussian, with activations already applied.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GaussianPoint {
    pub position: Vec3,
    pub normal: Vec3,
    /// Degree-0 spherical harmonic coefficients.
    pub sh_dc: [f32; 3],
    /// In `[0, 1]`.
    pub opacity: f32,
    /// Per-axis standard deviation.
    pub scale: Vec3,
    /// Unit quaternion.
    pub rotation: Quat,
}

impl Default for GaussianPoint {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::ZERO,
            sh_dc: [0.0; 3],
            opacity: 1.0,
            scale: Vec3::splat(0.01),
            rotation: Quat::IDENTITY,
        }
    }
}

impl GaussianPoint {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// Zeroth-order SH basis constant.
pub const SH_C0: f32 = 0.282_094_8;

/// Base color from the DC coefficients, clamped to non-negative.
pub fn sh_dc_to_rgb(dc: [f32; 3]) -> [f32; 3] {
    dc.map(|c| (0.5 + SH_C0 * c).max(0.0))
}

/// Immutable point array with cached bounds.
///
/// Indices are stable for the lifetime of the cloud; sort results refer to them.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    points: Vec<GaussianPoint>,
    bounds_min: Vec3,
    bounds_max: Vec3,
}

impl PointCloud {
    /// Keeps the given order.
    pub fn new(points: Vec<GaussianPoint>) -> Self {
        let (bounds_min, bounds_max) = compute_bounds(&points);
        Self {
            points,
            bounds_min,
            bounds_max,
        }
    }

    /// Reorders points along a Morton curve over their bounds for memory locality.
    pub fn with_spatial_order(mut points: Vec<GaussianPoint>) -> Self {
        let (lo, hi) = compute_bounds(&points);
        let extent = hi - lo;
        let inv = Vec3::new(
            inv_range(extent.x),
            inv_range(extent.y),
            inv_range(extent.z),
        );
        points.sort_by_cached_key(|p| {
            let n = ((p.position - lo) * inv).clamp(Vec3::ZERO, Vec3::ONE) * MORTON_MAX;
            morton3(n.x as u32, n.y as u32, n.z as u32)
        });
        Self {
            points,
            bounds_min: lo,
            bounds_max: hi,
        }
    }

    pub fn points(&self) -> &[GaussianPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Axis-aligned bounds; both zero for an empty cloud.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.bounds_min, self.bounds_max)
    }

    pub fn center(&self) -> Vec3 {
        (self.bounds_min + self.bounds_max) * 0.5
    }

    /// The 8 corners of the bounding box.
    pub fn bounds_corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.bounds_min, self.bounds_max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }
}

fn compute_bounds(points: &[GaussianPoint]) -> (Vec3, Vec3) {
    let mut it = points
        .iter()
        .map(|p| p.position)
        .filter(|p| p.is_finite());
    let Some(first) = it.next() else {
        return (Vec3::ZERO, Vec3::ZERO);
    };
    it.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)))
}

// ── morton ────────────────────────────────────────────────────────────────

const MORTON_BITS: u32 = 21;
const MORTON_MAX: f32 = ((1u32 << MORTON_BITS) - 1) as f32;

fn inv_range(r: f32) -> f32 {
    if r < 1e-6 { 1.0 } else { 1.0 / r }
}

/// Spreads the low 21 bits of `v` so that two zero bits separate each.
fn spread_bits(v: u32) -> u64 {
    let mut x = (v as u64) & 0x1f_ffff;
    x = (x | (x << 32)) & 0x1f_0000_0000_ffff;
    x = (x | (x << 16)) & 0x1f_0000_ff00_00ff;
    x = (x | (x << 8)) & 0x100f_00f0_0f00_f00f;
    x = (x | (x << 4)) & 0x10c3_0c30_c30c_30c3;
    x = (x | (x << 2)) & 0x1249_2492_4924_9249;
    x
}

fn morton3(x: u32, y: u32, z: u32) -> u64 {
    spread_bits(x) | (spread_bits(y) << 1) | (spread_bits(z) << 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(ps: &[[f32; 3]]) -> Vec<GaussianPoint> {
        ps.iter().map(|p| GaussianPoint::at(Vec3::from(*p))).collect()
    }

    // ── bounds ────────────────────────────────────────────────────────────

    #[test]
    fn bounds_cover_points() {
        let c = PointCloud::new(cloud(&[[1.0, -2.0, 3.0], [-1.0, 4.0, 0.0]]));
        assert_eq!(c.bounds(), (Vec3::new(-1.0, -2.0, 0.0), Vec3::new(1.0, 4.0, 3.0)));
        assert_eq!(c.center(), Vec3::new(0.0, 1.0, 1.5));
    }

    #[test]
    fn empty_cloud_has_zero_bounds() {
        let c = PointCloud::new(Vec::new());
        assert!(c.is_empty());
        assert_eq!(c.bounds(), (Vec3::ZERO, Vec3::ZERO));
    }

    #[test]
    fn non_finite_positions_do_not_poison_bounds() {
        let c = PointCloud::new(cloud(&[[f32::NAN, 0.0, 0.0], [1.0, 1.0, 1.0]]));
        assert_eq!(c.bounds(), (Vec3::ONE, Vec3::ONE));
    }

    // ── morton ────────────────────────────────────────────────────────────

    #[test]
    fn morton_interleaves_axes() {
        assert_eq!(morton3(1, 0, 0), 0b001);
        assert_eq!(morton3(0, 1, 0), 0b010);
        assert_eq!(morton3(0, 0, 1), 0b100);
        assert_eq!(morton3(3, 0, 0), 0b001_001);
    }

    #[test]
    fn morton_uses_all_21_bits() {
        let m = morton3(0x1f_ffff, 0x1f_ffff, 0x1f_ffff);
        assert_eq!(m, (1u64 << 63) - 1);
    }

    #[test]
    fn spatial_order_keeps_every_point() {
        let pts = cloud(&[[5.0, 5.0, 5.0], [0.0, 0.0, 0.0], [5.0, 0.0, 0.0], [0.0, 5.0, 5.0]]);
        let c = PointCloud::with_spatial_order(pts.clone());
        assert_eq!(c.len(), 4);
        assert_eq!(c.points()[0].position, Vec3::ZERO);
        assert_eq!(c.points()[3].position, Vec3::splat(5.0));
        for p in &pts {
            assert!(c.points().contains(p));
        }
    }

    #[test]
    fn flat_axis_does_not_divide_by_zero() {
        let c = PointCloud::with_spatial_order(cloud(&[[0.0, 1.0, 0.0], [1.0, 1.0, 0.0]]));
        assert_eq!(c.points()[0].position, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn dc_color_is_centred_on_half() {
        assert_eq!(sh_dc_to_rgb([0.0; 3]), [0.5; 3]);
        assert_eq!(sh_dc_to_rgb([-10.0, 0.0, 0.0])[0], 0.0);
    }
}
