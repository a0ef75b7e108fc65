use std::time::{Duration, Instant};

/// Timing of one presented frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,
    /// Sum of clamped steps; drives animated shaders and survives stalls.
    pub elapsed: f32,
    pub now: Instant,
    pub frame_index: u64,
    /// Smoothed frames per second.
    pub fps: f32,
}

/// Per-window frame clock.
///
/// Steps are clamped so a debugger pause or a minimized window does not
/// produce one huge `dt`.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    elapsed: f64,
    frame_index: u64,
    range: (Duration, Duration),
    fps: f32,
}

/// Weight of the newest sample in the fps average.
const FPS_SMOOTHING: f32 = 0.1;

impl FrameClock {
    /// Clamps steps to 100 µs ..= 250 ms.
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            elapsed: 0.0,
            frame_index: 0,
            range: (dt_min, dt_max),
            fps: 0.0,
        }
    }

    /// Restarts the step baseline without touching `elapsed`.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let (lo, hi) = self.range;
        let step = now.saturating_duration_since(self.last).clamp(lo, hi);
        self.last = now;
        self.elapsed += step.as_secs_f64();

        let dt = step.as_secs_f32();
        let sample = 1.0 / dt;
        self.fps = if self.frame_index == 0 {
            sample
        } else {
            self.fps + (sample - self.fps) * FPS_SMOOTHING
        };

        let ft = FrameTime {
            dt,
            elapsed: self.elapsed as f32,
            now,
            frame_index: self.frame_index,
            fps: self.fps,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_numbered_from_zero() {
        let mut clock = FrameClock::new();
        let indices: Vec<u64> = (0..3).map(|_| clock.tick().frame_index).collect();
        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    fn short_steps_are_raised_to_the_minimum() {
        let mut clock =
            FrameClock::with_clamps(Duration::from_millis(5), Duration::from_millis(10));
        assert!(clock.tick().dt >= 0.005 - f32::EPSILON);
    }

    #[test]
    fn elapsed_is_the_sum_of_clamped_steps() {
        let mut clock =
            FrameClock::with_clamps(Duration::from_millis(10), Duration::from_millis(10));
        clock.tick();
        clock.tick();
        let ft = clock.tick();
        assert!((ft.elapsed - 0.03).abs() < 1e-4);
    }

    #[test]
    fn fixed_steps_give_steady_fps() {
        let mut clock =
            FrameClock::with_clamps(Duration::from_millis(10), Duration::from_millis(10));
        let last = (0..20).map(|_| clock.tick()).last();
        let fps = last.map(|ft| ft.fps).unwrap_or_default();
        assert!((fps - 100.0).abs() < 0.5, "fps {fps}");
    }
}
