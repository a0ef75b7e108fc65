use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{LoadError, LoadResult};

/// A 2D texture plus its default view.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}

/// Shared texture handle. Released when the last holder drops it.
pub type TextureHandle = Arc<GpuTexture>;

impl GpuTexture {
    /// Allocates an uninitialized texture, typically a render target.
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            format,
            width,
            height,
        }
    }

    /// Color target that later passes sample and that can be read back.
    pub fn render_target(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self::new(
            device,
            label,
            width,
            height,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        )
    }

    /// Uploads tightly packed RGBA8 pixels.
    pub fn from_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
        srgb: bool,
    ) -> Self {
        let format = if srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        let tex = Self::new(
            device,
            label,
            width,
            height,
            format,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
        );
        debug_assert_eq!(pixels.len(), (tex.width * tex.height * 4) as usize);

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * tex.width),
                rows_per_image: Some(tex.height),
            },
            wgpu::Extent3d {
                width: tex.width,
                height: tex.height,
                depth_or_array_layers: 1,
            },
        );
        tex
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Explicitly constructed texture registry: 1x1 defaults plus a path cache.
///
/// Shared as `Arc<TextureRegistry>` between the render pipeline and loaders.
pub struct TextureRegistry {
    white: TextureHandle,
    black: TextureHandle,
    flat_normal: TextureHandle,
    cache: Mutex<HashMap<PathBuf, TextureHandle>>,
}

pub const WHITE_TEXEL: [u8; 4] = [255, 255, 255, 255];
pub const BLACK_TEXEL: [u8; 4] = [0, 0, 0, 255];
/// Tangent-space +Z.
pub const FLAT_NORMAL_TEXEL: [u8; 4] = [128, 128, 255, 255];

impl TextureRegistry {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let solid = |label: &str, texel: [u8; 4]| {
            Arc::new(GpuTexture::from_rgba8(device, queue, label, 1, 1, &texel, false))
        };
        Self {
            white: solid("ishtar default white", WHITE_TEXEL),
            black: solid("ishtar default black", BLACK_TEXEL),
            flat_normal: solid("ishtar default normal", FLAT_NORMAL_TEXEL),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn white(&self) -> &TextureHandle {
        &self.white
    }

    pub fn black(&self) -> &TextureHandle {
        &self.black
    }

    pub fn flat_normal(&self) -> &TextureHandle {
        &self.flat_normal
    }

    /// Loads an image file (png / jpeg), caching by path.
    ///
    /// Color maps should pass `srgb = true`; data maps (specular, normal) `false`.
    pub fn load(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
        srgb: bool,
    ) -> LoadResult<TextureHandle> {
        if let Some(hit) = self.lock_cache().get(path) {
            return Ok(Arc::clone(hit));
        }

        let img = image::open(path)?.to_rgba8();
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(LoadError::UnsupportedFormat(format!(
                "{} has zero size",
                path.display()
            )));
        }

        let label = format!("ishtar texture {}", path.display());
        let tex = Arc::new(GpuTexture::from_rgba8(device, queue, &label, w, h, &img, srgb));
        log::debug!("loaded texture {} ({w}x{h})", path.display());

        self.lock_cache()
            .insert(path.to_path_buf(), Arc::clone(&tex));
        Ok(tex)
    }

    /// Like [`Self::load`] but logs failures and returns `fallback` instead.
    pub fn load_or(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
        srgb: bool,
        fallback: &TextureHandle,
    ) -> TextureHandle {
        match self.load(device, queue, path, srgb) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("texture {} unavailable, using default: {e}", path.display());
                Arc::clone(fallback)
            }
        }
    }

    pub fn cached_count(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, TextureHandle>> {
        // A poisoned cache only means a loader panicked mid-insert; the map is still usable.
        self.cache.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessGpu;
    use crate::render::readback;

    #[test]
    fn white_default_reads_back_opaque_white() {
        let Some(gpu) = HeadlessGpu::new() else {
            eprintln!("skipping: no GPU adapter");
            return;
        };
        let registry = TextureRegistry::new(&gpu.device, &gpu.queue);
        let texel = readback::read_texel(&gpu.device, &gpu.queue, registry.white(), 0, 0)
            .expect("readback");
        assert_eq!(&texel[..4], &WHITE_TEXEL);
    }

    #[test]
    fn black_default_keeps_alpha() {
        let Some(gpu) = HeadlessGpu::new() else {
            eprintln!("skipping: no GPU adapter");
            return;
        };
        let registry = TextureRegistry::new(&gpu.device, &gpu.queue);
        let texel = readback::read_texel(&gpu.device, &gpu.queue, registry.black(), 0, 0)
            .expect("readback");
        assert_eq!(&texel[..4], &BLACK_TEXEL);
    }

    #[test]
    fn missing_file_falls_back() {
        let Some(gpu) = HeadlessGpu::new() else {
            eprintln!("skipping: no GPU adapter");
            return;
        };
        let registry = TextureRegistry::new(&gpu.device, &gpu.queue);
        let tex = registry.load_or(
            &gpu.device,
            &gpu.queue,
            Path::new("/nonexistent/ishtar.png"),
            true,
            registry.white(),
        );
        assert!(Arc::ptr_eq(&tex, registry.white()));
        assert_eq!(registry.cached_count(), 0);
    }
}
