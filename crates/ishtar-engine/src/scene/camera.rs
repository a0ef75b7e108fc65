use glam::{Mat4, Vec3};

/// Orbit camera looking at `target` from `distance` along yaw/pitch.
///
/// Right-handed, +Y up; the view looks down -Z in view space, and the
/// projection maps depth to wgpu's `[0, 1]` range.
#[derive(Debug, Clone)]
pub struct Camera {
    pub target: Vec3,
    pub distance: f32,
    /// Radians around +Y; 0 places the eye on +Z.
    pub yaw: f32,
    /// Radians above the XZ plane.
    pub pitch: f32,
    pub fovy_rad: f32,
    pub z_near: f32,
    pub z_far: f32,
}

const PITCH_LIMIT: f32 = 1.55;
const MIN_DISTANCE: f32 = 0.05;

impl Default for Camera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 5.0,
            yaw: 0.0,
            pitch: 0.3,
            fovy_rad: 45.0_f32.to_radians(),
            z_near: 0.01,
            z_far: 1000.0,
        }
    }
}

impl Camera {
    pub fn position(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        self.target + Vec3::new(sy * cp, sp, cy * cp) * self.distance
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fovy_rad, aspect.max(1e-4), self.z_near, self.z_far)
    }

    pub fn orbit(&mut self, dyaw: f32, dpitch: f32) {
        self.yaw = (self.yaw + dyaw).rem_euclid(std::f32::consts::TAU);
        self.pitch = (self.pitch + dpitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Multiplies the orbit distance; `factor < 1` moves closer.
    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.distance = (self.distance * factor).max(MIN_DISTANCE);
        }
    }

    /// Pans the target in the camera's screen plane.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let forward = (self.target - self.position()).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward);
        let scale = self.distance * 0.001;
        self.target += (-right * dx + up * dy) * scale;
    }

    /// Places the target at the box centre and backs off until the box fits.
    pub fn frame_bounds(&mut self, min: Vec3, max: Vec3) {
        let center = (min + max) * 0.5;
        let radius = ((max - min).length() * 0.5).max(1e-3);
        self.target = center;
        self.distance = radius / (self.fovy_rad * 0.5).sin();
        self.z_near = (self.distance * 0.001).max(1e-3);
        self.z_far = (self.distance + radius) * 4.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn default_eye_sits_on_positive_z() {
        let cam = Camera {
            pitch: 0.0,
            ..Camera::default()
        };
        assert!(approx(cam.position(), Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn target_lands_on_negative_view_z() {
        let cam = Camera::default();
        let p = cam.view_matrix().transform_point3(cam.target);
        assert!(p.z < 0.0);
        assert!((p.z + cam.distance).abs() < 1e-4);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = Camera::default();
        cam.orbit(0.0, 10.0);
        assert!(cam.pitch <= PITCH_LIMIT);
    }

    #[test]
    fn zoom_ignores_invalid_factors() {
        let mut cam = Camera::default();
        cam.zoom(0.0);
        cam.zoom(f32::NAN);
        assert_eq!(cam.distance, 5.0);
        cam.zoom(0.5);
        assert_eq!(cam.distance, 2.5);
    }

    #[test]
    fn frame_bounds_centres_target() {
        let mut cam = Camera::default();
        cam.frame_bounds(Vec3::splat(-1.0), Vec3::new(3.0, 1.0, 1.0));
        assert!(approx(cam.target, Vec3::new(1.0, 0.0, 0.0)));
        assert!(cam.distance > 2.0);
    }

    #[test]
    fn projection_maps_near_plane_to_zero_depth() {
        let cam = Camera::default();
        let proj = cam.projection_matrix(16.0 / 9.0);
        let clip = proj * glam::Vec4::new(0.0, 0.0, -cam.z_near, 1.0);
        assert!((clip.z / clip.w).abs() < 1e-4);
    }
}
