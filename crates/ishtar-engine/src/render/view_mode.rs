/// Which texture the final pass shows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Hash)]
pub enum ViewMode {
    /// Post-processed, tonemapped image.
    #[default]
    Final,
    Lighting,
    Position,
    Normal,
    Diffuse,
    Specular,
    Shininess,
    Depth,
}

impl ViewMode {
    pub const ALL: [ViewMode; 8] = [
        ViewMode::Final,
        ViewMode::Lighting,
        ViewMode::Position,
        ViewMode::Normal,
        ViewMode::Diffuse,
        ViewMode::Specular,
        ViewMode::Shininess,
        ViewMode::Depth,
    ];

    pub const LABELS: [&'static str; 8] = [
        "Final (PostProcess)",
        "Lighting",
        "Position",
        "Normal",
        "Diffuse",
        "Specular",
        "Shininess",
        "Depth",
    ];

    pub fn label(self) -> &'static str {
        Self::LABELS[self.index()]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    /// True for views that show raw G-Buffer data without tonemapping.
    pub fn is_debug(self) -> bool {
        !matches!(self, ViewMode::Final)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_enum_order() {
        for (i, mode) in ViewMode::ALL.iter().enumerate() {
            assert_eq!(mode.index(), i);
            assert_eq!(ViewMode::from_index(i), Some(*mode));
        }
        assert_eq!(ViewMode::Final.label(), "Final (PostProcess)");
        assert_eq!(ViewMode::Depth.label(), "Depth");
        assert_eq!(ViewMode::from_index(8), None);
    }
}
