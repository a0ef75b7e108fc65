//! Adapter and device acquisition shared by the windowed and headless
//! contexts.

use crate::splat::GpuSplat;

use super::GpuInit;

/// Instance over every backend the platform offers.
pub(crate) fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

/// Requests a device with the limits `init` asks for.
pub(crate) async fn request_device(
    adapter: &wgpu::Adapter,
    label: &str,
    init: &GpuInit,
    memory_hints: wgpu::MemoryHints,
) -> Result<(wgpu::Device, wgpu::Queue), wgpu::RequestDeviceError> {
    let info = adapter.get_info();
    log::info!("adapter: {} ({:?}, {:?})", info.name, info.device_type, info.backend);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: init.required_features,
            required_limits: init.limits_for(adapter),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints,
            trace: wgpu::Trace::Off,
        })
        .await?;

    log::debug!(
        "{label}: up to {} splats per cloud",
        splat_capacity(&device.limits())
    );
    Ok((device, queue))
}

/// Largest point count a splat stage can upload under `limits`.
pub fn splat_capacity(limits: &wgpu::Limits) -> u64 {
    let bytes = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    bytes / std::mem::size_of::<GpuSplat>() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_hold_two_million_splats() {
        assert_eq!(splat_capacity(&wgpu::Limits::default()), (128 << 20) / 64);
    }

    #[test]
    fn smaller_buffer_limit_wins() {
        let limits = wgpu::Limits {
            max_buffer_size: 64 * 10,
            ..Default::default()
        };
        assert_eq!(splat_capacity(&limits), 10);
    }
}
