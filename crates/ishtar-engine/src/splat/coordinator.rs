//! Background depth sorting with a double-buffered result.
//!
//! The render thread posts view matrices with [`SortCoordinator::request_sort`]
//! and picks up finished orders with [`SortCoordinator::try_consume_latest`].
//! Only the newest pending request is kept; older ones are overwritten.
//! The render thread never blocks on the worker.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, TryLockError};
use std::thread::JoinHandle;
use std::time::Duration;

use glam::Mat4;

use super::sort::{DepthSorter, SortAlgorithm};
use super::{PointCloud, SplatError};

/// Observable worker state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SortPhase {
    /// Nothing requested and nothing unconsumed.
    Idle,
    /// A view is waiting for the worker.
    SortRequested,
    Sorting,
    /// A finished order is waiting to be consumed.
    Completed,
}

#[derive(Debug, Default)]
struct Control {
    sorting: bool,
    pending: Option<Mat4>,
    stop: bool,
}

struct Shared {
    cloud: Arc<PointCloud>,
    control: Mutex<Control>,
    wake: Condvar,
    /// Back buffer. Swapped with the consumer's front buffer.
    published: Mutex<Vec<u32>>,
    ready: AtomicBool,
    sorts_completed: AtomicU64,
    live_workers: AtomicUsize,
    delay: Duration,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Owns the sort worker for one point cloud.
pub struct SortCoordinator {
    shared: Arc<Shared>,
    front: Vec<u32>,
    worker: Option<JoinHandle<()>>,
}

impl SortCoordinator {
    /// Sorts once synchronously, then starts the worker.
    ///
    /// Without an initial view the first order is the identity.
    pub fn spawn(
        cloud: Arc<PointCloud>,
        algorithm: SortAlgorithm,
        bucket_bits: Option<u32>,
        initial_view: Option<Mat4>,
    ) -> Result<Self, SplatError> {
        Self::spawn_inner(cloud, algorithm, bucket_bits, initial_view, Duration::ZERO)
    }

    #[cfg(test)]
    fn spawn_with_delay(
        cloud: Arc<PointCloud>,
        algorithm: SortAlgorithm,
        delay: Duration,
    ) -> Result<Self, SplatError> {
        Self::spawn_inner(cloud, algorithm, None, None, delay)
    }

    fn spawn_inner(
        cloud: Arc<PointCloud>,
        algorithm: SortAlgorithm,
        bucket_bits: Option<u32>,
        initial_view: Option<Mat4>,
        delay: Duration,
    ) -> Result<Self, SplatError> {
        let n = cloud.len();
        if u32::try_from(n).is_err() {
            return Err(SplatError::TooManyPoints(n));
        }

        let mut sorter = DepthSorter::new(algorithm).with_bucket_bits(bucket_bits);
        let mut front = Vec::with_capacity(n);
        match initial_view {
            Some(view) => sorter.sort(&cloud, &view, &mut front),
            None => front.extend(0..n as u32),
        }

        let shared = Arc::new(Shared {
            cloud,
            control: Mutex::new(Control::default()),
            wake: Condvar::new(),
            published: Mutex::new(Vec::with_capacity(n)),
            ready: AtomicBool::new(false),
            sorts_completed: AtomicU64::new(0),
            live_workers: AtomicUsize::new(1),
            delay,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("ishtar-splat-sort".into())
            .spawn(move || worker_loop(worker_shared, sorter));
        let worker = match worker {
            Ok(w) => w,
            Err(e) => {
                shared.live_workers.store(0, Ordering::Release);
                return Err(SplatError::Spawn(e));
            }
        };

        log::debug!("sort worker started for {n} splats ({algorithm:?})");
        Ok(Self {
            shared,
            front,
            worker: Some(worker),
        })
    }

    /// Replaces any pending request with `view` and wakes the worker.
    pub fn request_sort(&self, view: Mat4) {
        let mut ctl = self.shared.control();
        ctl.pending = Some(view);
        drop(ctl);
        self.shared.wake.notify_one();
    }

    /// Swaps in the newest finished order, if any. Never blocks.
    pub fn try_consume_latest(&mut self) -> bool {
        if !self.shared.ready.load(Ordering::Acquire) {
            return false;
        }
        let mut published = match self.shared.published.try_lock() {
            Ok(g) => g,
            Err(TryLockError::WouldBlock) => return false,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
        };
        if !self.shared.ready.load(Ordering::Acquire) {
            return false;
        }
        std::mem::swap(&mut *published, &mut self.front);
        self.shared.ready.store(false, Ordering::Release);
        true
    }

    /// The order most recently consumed.
    pub fn current_order(&self) -> &[u32] {
        &self.front
    }

    pub fn phase(&self) -> SortPhase {
        let ctl = self.shared.control();
        if ctl.sorting {
            SortPhase::Sorting
        } else if ctl.pending.is_some() {
            SortPhase::SortRequested
        } else if self.shared.ready.load(Ordering::Acquire) {
            SortPhase::Completed
        } else {
            SortPhase::Idle
        }
    }

    pub fn sorts_completed(&self) -> u64 {
        self.shared.sorts_completed.load(Ordering::Acquire)
    }

    pub fn live_workers(&self) -> usize {
        self.shared.live_workers.load(Ordering::Acquire)
    }

    pub fn cloud(&self) -> &Arc<PointCloud> {
        &self.shared.cloud
    }

    /// Polls until no request is pending or in flight. Returns false on timeout.
    #[cfg(test)]
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            {
                let ctl = self.shared.control();
                if !ctl.sorting && ctl.pending.is_none() {
                    return true;
                }
            }
            if std::time::Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Drop for SortCoordinator {
    fn drop(&mut self) {
        self.shared.control().stop = true;
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("sort worker panicked");
            }
        }
    }
}

struct LiveGuard<'a>(&'a AtomicUsize);

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

fn worker_loop(shared: Arc<Shared>, mut sorter: DepthSorter) {
    let _live = LiveGuard(&shared.live_workers);
    let mut scratch = Vec::with_capacity(shared.cloud.len());

    loop {
        let view = {
            let mut ctl = shared.control();
            loop {
                if ctl.stop {
                    return;
                }
                if let Some(view) = ctl.pending.take() {
                    ctl.sorting = true;
                    break view;
                }
                ctl = shared.wake.wait(ctl).unwrap_or_else(|e| e.into_inner());
            }
        };

        if !shared.delay.is_zero() {
            std::thread::sleep(shared.delay);
        }
        sorter.sort(&shared.cloud, &view, &mut scratch);

        {
            let mut published = shared.published.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::swap(&mut *published, &mut scratch);
            shared.ready.store(true, Ordering::Release);
        }
        shared.sorts_completed.fetch_add(1, Ordering::AcqRel);
        shared.control().sorting = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splat::sort::is_permutation;
    use crate::splat::GaussianPoint;
    use glam::{Quat, Vec3};
    use std::time::Instant;

    fn line_cloud(n: usize) -> Arc<PointCloud> {
        Arc::new(PointCloud::new(
            (0..n)
                .map(|i| GaussianPoint::at(Vec3::new(0.0, 0.0, i as f32 - n as f32 / 2.0)))
                .collect(),
        ))
    }

    fn look_from(eye: Vec3) -> Mat4 {
        Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y)
    }

    const WAIT: Duration = Duration::from_secs(10);

    // ── startup ───────────────────────────────────────────────────────────

    #[test]
    fn initial_order_is_identity_without_view() {
        let c = SortCoordinator::spawn(line_cloud(5), SortAlgorithm::Comparison, None, None)
            .unwrap();
        assert_eq!(c.current_order(), &[0, 1, 2, 3, 4]);
        assert_eq!(c.phase(), SortPhase::Idle);
        assert_eq!(c.live_workers(), 1);
    }

    #[test]
    fn initial_view_is_sorted_synchronously() {
        let view = look_from(Vec3::new(0.0, 0.0, -100.0));
        let c = SortCoordinator::spawn(line_cloud(4), SortAlgorithm::Comparison, None, Some(view))
            .unwrap();
        assert_eq!(c.current_order(), &[3, 2, 1, 0]);
    }

    #[test]
    fn empty_cloud_is_fine() {
        let mut c =
            SortCoordinator::spawn(line_cloud(0), SortAlgorithm::Histogram, None, None).unwrap();
        c.request_sort(Mat4::IDENTITY);
        assert!(c.wait_idle(WAIT));
        assert!(c.try_consume_latest());
        assert!(c.current_order().is_empty());
    }

    // ── publish ───────────────────────────────────────────────────────────

    #[test]
    fn request_then_consume() {
        let mut c =
            SortCoordinator::spawn(line_cloud(4), SortAlgorithm::Comparison, None, None).unwrap();
        c.request_sort(look_from(Vec3::new(0.0, 0.0, -100.0)));
        assert!(c.wait_idle(WAIT));
        assert_eq!(c.phase(), SortPhase::Completed);
        assert!(c.try_consume_latest());
        assert_eq!(c.current_order(), &[3, 2, 1, 0]);
        assert_eq!(c.phase(), SortPhase::Idle);
        assert!(!c.try_consume_latest());
    }

    #[test]
    fn burst_during_sort_coalesces_to_latest_view() {
        let cloud = line_cloud(1000);
        let mut c = SortCoordinator::spawn_with_delay(
            Arc::clone(&cloud),
            SortAlgorithm::Comparison,
            Duration::from_millis(100),
        )
        .unwrap();
        c.request_sort(look_from(Vec3::new(0.0, 0.0, 100.0)));
        let deadline = Instant::now() + WAIT;
        while c.phase() != SortPhase::Sorting && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        let mut last = Mat4::IDENTITY;
        for i in 0..50 {
            let z = if i % 2 == 0 { 100.0 } else { -100.0 };
            last = look_from(Vec3::new(0.0, 0.0, z));
            c.request_sort(last);
        }
        assert_eq!(c.phase(), SortPhase::Sorting);
        assert!(c.wait_idle(WAIT));
        assert_eq!(c.sorts_completed(), 2);

        assert!(c.try_consume_latest());
        let mut expected = Vec::new();
        DepthSorter::new(SortAlgorithm::Comparison).sort(&cloud, &last, &mut expected);
        assert_eq!(c.current_order(), expected.as_slice());
        assert_eq!(c.current_order()[0], 999);
    }

    #[test]
    fn phase_reports_pending_and_sorting() {
        let mut c = SortCoordinator::spawn_with_delay(
            line_cloud(10),
            SortAlgorithm::Histogram,
            Duration::from_millis(200),
        )
        .unwrap();
        c.request_sort(Mat4::IDENTITY);
        let mut saw_busy = false;
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            match c.phase() {
                SortPhase::SortRequested | SortPhase::Sorting => saw_busy = true,
                SortPhase::Completed => break,
                SortPhase::Idle => {}
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(saw_busy);
        assert_eq!(c.phase(), SortPhase::Completed);
        assert!(c.try_consume_latest());
    }

    #[test]
    fn consume_never_blocks_while_sorting() {
        let mut c = SortCoordinator::spawn_with_delay(
            line_cloud(10),
            SortAlgorithm::Comparison,
            Duration::from_millis(300),
        )
        .unwrap();
        c.request_sort(Mat4::IDENTITY);
        let t = Instant::now();
        for _ in 0..1000 {
            c.try_consume_latest();
        }
        assert!(t.elapsed() < Duration::from_millis(250));
    }

    // ── concurrency ───────────────────────────────────────────────────────

    #[test]
    fn stress_every_consumed_order_is_a_permutation() {
        let n = 5000;
        let mut c =
            SortCoordinator::spawn(line_cloud(n), SortAlgorithm::Histogram, None, None).unwrap();
        for i in 0..500 {
            let a = i as f32 * 0.1;
            c.request_sort(look_from(Vec3::new(a.cos() * 50.0, 5.0, a.sin() * 50.0)));
            if c.try_consume_latest() {
                assert!(is_permutation(c.current_order(), n));
            }
        }
        assert!(c.wait_idle(WAIT));
        c.try_consume_latest();
        assert!(is_permutation(c.current_order(), n));
    }

    #[test]
    fn orbit_over_large_cloud() {
        use rand::{Rng, SeedableRng, rngs::StdRng};

        let n = 100_000;
        let mut rng = StdRng::seed_from_u64(42);
        let cloud = Arc::new(PointCloud::new(
            (0..n)
                .map(|_| {
                    GaussianPoint::at(Vec3::new(
                        rng.gen_range(-5.0..5.0),
                        rng.gen_range(-5.0..5.0),
                        rng.gen_range(-5.0..5.0),
                    ))
                })
                .collect(),
        ));
        let mut c = SortCoordinator::spawn(cloud, SortAlgorithm::Histogram, None, None).unwrap();
        let frames = 120;
        for step in 0..frames {
            let angle = step as f32 / frames as f32 * std::f32::consts::TAU;
            let q = Quat::from_rotation_y(angle);
            c.request_sort(look_from(q * Vec3::new(0.0, 2.0, 20.0)));
            if c.try_consume_latest() {
                assert!(is_permutation(c.current_order(), n));
            }
            assert!(c.live_workers() <= 1);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(c.wait_idle(WAIT));
        c.try_consume_latest();
        assert!(is_permutation(c.current_order(), n));
        assert!(c.sorts_completed() >= 1);
    }

    // ── shutdown ──────────────────────────────────────────────────────────

    #[test]
    fn drop_joins_worker() {
        let c = SortCoordinator::spawn_with_delay(
            line_cloud(10),
            SortAlgorithm::Comparison,
            Duration::from_millis(50),
        )
        .unwrap();
        c.request_sort(Mat4::IDENTITY);
        let shared = Arc::clone(&c.shared);
        drop(c);
        assert_eq!(shared.live_workers.load(Ordering::Acquire), 0);
    }

    #[test]
    fn drop_while_idle_is_prompt() {
        let c = SortCoordinator::spawn(line_cloud(10), SortAlgorithm::Comparison, None, None)
            .unwrap();
        let t = Instant::now();
        drop(c);
        assert!(t.elapsed() < Duration::from_secs(1));
    }
}
