/// Initialization parameters for the GPU layer.
///
/// Add configuration flags only when a concrete platform or backend
/// requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    ///
    /// The final pass writes linear color and relies on the sRGB view for
    /// encoding; on non-sRGB surfaces it applies gamma in the shader instead.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior).
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Adapter selection hint.
    pub power_preference: wgpu::PowerPreference,

    /// Required wgpu features.
    pub required_features: wgpu::Features,

    /// Limits requested from the device.
    ///
    /// Ignored when `use_adapter_limits` is set.
    pub required_limits: wgpu::Limits,

    /// Request everything the adapter supports.
    ///
    /// Large splat clouds need storage buffers past the portable 128 MiB
    /// binding limit.
    pub use_adapter_limits: bool,

    /// Desired maximum frame latency for the surface.
    ///
    /// This value is a hint; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            use_adapter_limits: true,
            desired_maximum_frame_latency: 2,
        }
    }
}

impl GpuInit {
    pub(crate) fn limits_for(&self, adapter: &wgpu::Adapter) -> wgpu::Limits {
        if self.use_adapter_limits {
            adapter.limits()
        } else {
            self.required_limits.clone()
        }
    }
}
