/// Operator mapping HDR color to display range in the final pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Tonemap {
    None,
    Reinhard,
    #[default]
    Aces,
}

impl Tonemap {
    pub(crate) fn shader_index(self) -> u32 {
        match self {
            Tonemap::None => 0,
            Tonemap::Reinhard => 1,
            Tonemap::Aces => 2,
        }
    }
}

/// Frame-independent shading settings, owned by the render pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub ssao_enabled: bool,
    /// How far AO darkens ambient light, `0` none, `1` full.
    pub ssao_strength: f32,
    /// Hemisphere radius in view-space units.
    pub ssao_radius: f32,
    pub ssao_bias: f32,
    /// Used where a material leaves shininess at zero.
    pub shininess: f32,
    pub ambient_strength: f32,
    pub diffuse_strength: f32,
    pub specular_strength: f32,
    pub exposure: f32,
    pub tonemap: Tonemap,
    /// Surface clear color when nothing can be displayed.
    pub clear_color: wgpu::Color,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ssao_enabled: true,
            ssao_strength: 0.75,
            ssao_radius: 0.5,
            ssao_bias: 0.065,
            shininess: 32.0,
            ambient_strength: 0.1,
            diffuse_strength: 0.9,
            specular_strength: 0.5,
            exposure: 1.0,
            tonemap: Tonemap::Aces,
            clear_color: wgpu::Color::BLACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = RenderConfig::default();
        assert!(c.ssao_enabled);
        assert_eq!(c.ssao_strength, 0.75);
        assert_eq!(c.shininess, 32.0);
        assert_eq!(
            (c.ambient_strength, c.diffuse_strength, c.specular_strength),
            (0.1, 0.9, 0.5)
        );
        assert_eq!(c.exposure, 1.0);
        assert_eq!(c.tonemap, Tonemap::Aces);
    }
}
