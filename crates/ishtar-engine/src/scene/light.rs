use glam::Vec3;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// Scene light.
///
/// Point and spot lights attenuate with `1 / (constant + linear d + quadratic d²)`;
/// spot lights fade between the inner and outer cone angles.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,

    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,

    /// Degrees.
    pub inner_cutoff: f32,
    /// Degrees.
    pub outer_cutoff: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            position: Vec3::new(0.0, 10.0, 10.0),
            direction: Vec3::new(0.0, -1.0, -1.0),
            color: Vec3::ONE,
            intensity: 1.0,
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
            inner_cutoff: 12.5,
            outer_cutoff: 17.5,
        }
    }
}

impl Light {
    pub fn point(position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            color,
            intensity,
            ..Self::default()
        }
    }

    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            ..Self::default()
        }
    }

    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Spot,
            position,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            ..Self::default()
        }
    }

    /// Distance attenuation factor; 1 for directional lights.
    pub fn attenuation(&self, distance: f32) -> f32 {
        match self.kind {
            LightKind::Directional => 1.0,
            _ => {
                let denom =
                    self.constant + self.linear * distance + self.quadratic * distance * distance;
                if denom > 0.0 { 1.0 / denom } else { 1.0 }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_a_white_point_light() {
        let l = Light::default();
        assert_eq!(l.kind, LightKind::Point);
        assert_eq!(l.position, Vec3::new(0.0, 10.0, 10.0));
        assert_eq!(l.color, Vec3::ONE);
        assert_eq!(l.intensity, 1.0);
    }

    #[test]
    fn point_attenuation_falls_off() {
        let l = Light::point(Vec3::ZERO, Vec3::ONE, 1.0);
        assert_eq!(l.attenuation(0.0), 1.0);
        assert!(l.attenuation(10.0) < l.attenuation(1.0));
    }

    #[test]
    fn directional_never_attenuates() {
        let l = Light::directional(Vec3::new(0.0, -2.0, 0.0), Vec3::ONE, 2.0);
        assert_eq!(l.attenuation(100.0), 1.0);
        assert!((l.direction.length() - 1.0).abs() < 1e-6);
    }
}
