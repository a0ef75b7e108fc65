//! Back-to-front ordering of splats for a given view.
//!
//! Right-handed view space looks down -Z, so ascending view-space z is
//! farthest first.

use glam::{Mat4, Vec3, Vec4Swizzles};
use rayon::prelude::*;

use super::PointCloud;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SortAlgorithm {
    /// Exact ordering by view depth; O(N log N).
    Comparison,
    /// Quantized counting sort over the cloud's depth range; O(N).
    #[default]
    Histogram,
}

const MIN_BUCKET_BITS: u32 = 12;
const MAX_BUCKET_BITS: u32 = 16;
const MAX_OVERRIDE_BITS: u32 = 24;

/// Reusable sort state. Owns scratch so repeated sorts do not allocate.
#[derive(Debug, Default)]
pub struct DepthSorter {
    algorithm: SortAlgorithm,
    bucket_bits: Option<u32>,
    keys: Vec<u32>,
    depths: Vec<f32>,
    counts: Vec<u32>,
}

impl DepthSorter {
    pub fn new(algorithm: SortAlgorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    /// Overrides the histogram resolution. Clamped to `1..=24`.
    pub fn with_bucket_bits(mut self, bits: Option<u32>) -> Self {
        self.bucket_bits = bits.map(|b| b.clamp(1, MAX_OVERRIDE_BITS));
        self
    }

    pub fn algorithm(&self) -> SortAlgorithm {
        self.algorithm
    }

    /// Writes a permutation of `0..cloud.len()` into `out`, farthest first.
    ///
    /// `view` is the combined view * model matrix.
    pub fn sort(&mut self, cloud: &PointCloud, view: &Mat4, out: &mut Vec<u32>) {
        out.clear();
        let n = cloud.len();
        if n == 0 {
            return;
        }
        if n == 1 {
            out.push(0);
            return;
        }
        match self.algorithm {
            SortAlgorithm::Comparison => self.sort_comparison(cloud, view, out),
            SortAlgorithm::Histogram => self.sort_histogram(cloud, view, out),
        }
    }

    fn sort_comparison(&mut self, cloud: &PointCloud, view: &Mat4, out: &mut Vec<u32>) {
        let row = view.row(2);
        let (f, w) = (row.xyz(), row.w);
        self.depths.clear();
        self.depths
            .par_extend(cloud.points().par_iter().map(|p| f.dot(p.position) + w));

        out.extend(0..cloud.len() as u32);
        let depths = &self.depths;
        out.par_sort_unstable_by(|&a, &b| {
            depths[a as usize]
                .total_cmp(&depths[b as usize])
                .then(a.cmp(&b))
        });
    }

    fn sort_histogram(&mut self, cloud: &PointCloud, view: &Mat4, out: &mut Vec<u32>) {
        let n = cloud.len();
        let bits = self.bucket_bits.unwrap_or_else(|| auto_bucket_bits(n));
        let buckets = 1usize << bits;

        let f = view.row(2).xyz();
        let (min, max) = depth_range(f, &cloud.bounds_corners());
        let range = max - min;
        let scale = if range > 1e-6 && range.is_finite() {
            (buckets - 1) as f32 / range
        } else {
            0.0
        };
        let last = (buckets - 1) as u32;

        self.keys.clear();
        self.keys.par_extend(cloud.points().par_iter().map(|p| {
            let d = f.dot(p.position);
            // NaN and negative both saturate to 0 on the cast.
            (((d - min) * scale) as u32).min(last)
        }));

        self.counts.clear();
        self.counts.resize(buckets, 0);
        for &k in &self.keys {
            self.counts[k as usize] += 1;
        }
        let mut acc = 0u32;
        for c in self.counts.iter_mut() {
            acc += *c;
            *c = acc;
        }

        out.resize(n, 0);
        for i in (0..n).rev() {
            let k = self.keys[i] as usize;
            self.counts[k] -= 1;
            out[self.counts[k] as usize] = i as u32;
        }
    }
}

/// `round(log2 n)` clamped to the default bucket range.
fn auto_bucket_bits(n: usize) -> u32 {
    let bits = (n.max(1) as f64).log2().round() as u32;
    bits.clamp(MIN_BUCKET_BITS, MAX_BUCKET_BITS)
}

fn depth_range(f: Vec3, corners: &[Vec3; 8]) -> (f32, f32) {
    corners.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), c| {
        let d = f.dot(*c);
        (lo.min(d), hi.max(d))
    })
}

/// True when `order` holds every index in `0..n` exactly once.
pub fn is_permutation(order: &[u32], n: usize) -> bool {
    if order.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    for &i in order {
        match seen.get_mut(i as usize) {
            Some(s) if !*s => *s = true,
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splat::GaussianPoint;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn random_cloud(n: usize, seed: u64) -> PointCloud {
        let mut rng = StdRng::seed_from_u64(seed);
        PointCloud::new(
            (0..n)
                .map(|_| {
                    GaussianPoint::at(Vec3::new(
                        rng.gen_range(-10.0..10.0),
                        rng.gen_range(-10.0..10.0),
                        rng.gen_range(-10.0..10.0),
                    ))
                })
                .collect(),
        )
    }

    fn view() -> Mat4 {
        Mat4::look_at_rh(Vec3::new(0.0, 0.0, 30.0), Vec3::ZERO, Vec3::Y)
    }

    fn both() -> [SortAlgorithm; 2] {
        [SortAlgorithm::Comparison, SortAlgorithm::Histogram]
    }

    // ── permutation ───────────────────────────────────────────────────────

    #[test]
    fn output_is_a_permutation() {
        for alg in both() {
            let mut sorter = DepthSorter::new(alg);
            for n in [0, 1, 2, 1000, 70_000] {
                let cloud = random_cloud(n, n as u64);
                let mut out = Vec::new();
                sorter.sort(&cloud, &view(), &mut out);
                assert!(is_permutation(&out, n), "{alg:?} n={n}");
            }
        }
    }

    #[test]
    fn is_permutation_rejects_duplicates_and_out_of_range() {
        assert!(is_permutation(&[2, 0, 1], 3));
        assert!(!is_permutation(&[0, 0, 1], 3));
        assert!(!is_permutation(&[0, 1, 3], 3));
        assert!(!is_permutation(&[0, 1], 3));
    }

    // ── ordering ──────────────────────────────────────────────────────────

    #[test]
    fn two_points_far_then_near() {
        let cloud = PointCloud::new(vec![
            GaussianPoint::at(Vec3::new(0.0, 0.0, 5.0)),
            GaussianPoint::at(Vec3::new(0.0, 0.0, -5.0)),
        ]);
        for alg in both() {
            let mut out = Vec::new();
            DepthSorter::new(alg).sort(&cloud, &view(), &mut out);
            assert_eq!(out, vec![1, 0], "{alg:?}");
        }
    }

    #[test]
    fn comparison_is_monotonic_in_depth() {
        let cloud = random_cloud(5000, 7);
        let v = view();
        let mut out = Vec::new();
        DepthSorter::new(SortAlgorithm::Comparison).sort(&cloud, &v, &mut out);
        let depth = |i: u32| (v * cloud.points()[i as usize].position.extend(1.0)).z;
        assert!(out.windows(2).all(|w| depth(w[0]) <= depth(w[1])));
    }

    #[test]
    fn histogram_error_is_within_one_bucket() {
        let n = 20_000;
        let cloud = random_cloud(n, 11);
        let v = view();
        let mut out = Vec::new();
        DepthSorter::new(SortAlgorithm::Histogram).sort(&cloud, &v, &mut out);

        let f = v.row(2).xyz();
        let (lo, hi) = depth_range(f, &cloud.bounds_corners());
        let bucket = (hi - lo) / ((1 << auto_bucket_bits(n)) - 1) as f32;
        let depth = |i: u32| f.dot(cloud.points()[i as usize].position);
        assert!(out.windows(2).all(|w| depth(w[0]) <= depth(w[1]) + bucket));
    }

    #[test]
    fn identical_depths_keep_index_order() {
        let cloud = PointCloud::new(vec![GaussianPoint::at(Vec3::ZERO); 64]);
        for alg in both() {
            let mut out = Vec::new();
            DepthSorter::new(alg).sort(&cloud, &view(), &mut out);
            assert_eq!(out, (0..64).collect::<Vec<u32>>(), "{alg:?}");
        }
    }

    #[test]
    fn nan_view_still_yields_permutation() {
        let cloud = random_cloud(500, 3);
        let v = Mat4::from_cols_array(&[f32::NAN; 16]);
        for alg in both() {
            let mut out = Vec::new();
            DepthSorter::new(alg).sort(&cloud, &v, &mut out);
            assert!(is_permutation(&out, 500), "{alg:?}");
        }
    }

    // ── buckets ───────────────────────────────────────────────────────────

    #[test]
    fn bucket_bits_follow_point_count() {
        assert_eq!(auto_bucket_bits(1), 12);
        assert_eq!(auto_bucket_bits(1 << 14), 14);
        assert_eq!(auto_bucket_bits(10_000_000), 16);
    }

    #[test]
    fn bucket_override_is_clamped() {
        let s = DepthSorter::new(SortAlgorithm::Histogram).with_bucket_bits(Some(40));
        assert_eq!(s.bucket_bits, Some(24));
        let s = DepthSorter::new(SortAlgorithm::Histogram).with_bucket_bits(Some(0));
        assert_eq!(s.bucket_bits, Some(1));
    }

    #[test]
    fn single_bucket_still_sorts() {
        let cloud = random_cloud(100, 5);
        let mut out = Vec::new();
        DepthSorter::new(SortAlgorithm::Histogram)
            .with_bucket_bits(Some(1))
            .sort(&cloud, &view(), &mut out);
        assert!(is_permutation(&out, 100));
    }
}
