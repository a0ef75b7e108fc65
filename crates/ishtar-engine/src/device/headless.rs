use super::adapter::{create_instance, request_device};
use super::GpuInit;

/// Device + queue without a surface.
///
/// Used for offline rendering and GPU-backed tests. Construction returns
/// `None` when no adapter is available so callers can skip gracefully.
pub struct HeadlessGpu {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl HeadlessGpu {
    pub fn new() -> Option<Self> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Option<Self> {
        let instance = create_instance();

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(a) => a,
            Err(e) => {
                log::info!("no GPU adapter available: {e}");
                return None;
            }
        };

        let init = GpuInit::default();
        let (device, queue) = match request_device(
            &adapter,
            "ishtar headless device",
            &init,
            wgpu::MemoryHints::MemoryUsage,
        )
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("headless device request failed: {e}");
                return None;
            }
        };

        Some(Self { device, queue })
    }

    /// Builds a [`crate::render::RenderCtx`] for an offscreen target.
    pub fn render_ctx(
        &self,
        target_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> crate::render::RenderCtx<'_> {
        crate::render::RenderCtx::new(&self.device, &self.queue, target_format, width, height)
    }
}
