//! Blocking GPU → CPU copies for picking and tests.
//!
//! Everything here stalls the calling thread until the GPU catches up; use
//! it for single texels on user interaction, never per frame.

use thiserror::Error;

use crate::assets::GpuTexture;

/// `bytes_per_row` must be a multiple of this for texture → buffer copies.
const ROW_ALIGN: u64 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64;

#[derive(Error, Debug)]
pub enum ReadbackError {
    #[error("texel ({x}, {y}) outside {width}x{height} texture")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("format {0:?} cannot be copied to a buffer")]
    UnsupportedFormat(wgpu::TextureFormat),

    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("buffer map failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("map callback was dropped")]
    CallbackDropped,
}

/// Reads one texel. The first `block_copy_size` bytes of the result are valid.
pub fn read_texel(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    tex: &GpuTexture,
    x: u32,
    y: u32,
) -> Result<[u8; 16], ReadbackError> {
    if x >= tex.width || y >= tex.height {
        return Err(ReadbackError::OutOfBounds {
            x,
            y,
            width: tex.width,
            height: tex.height,
        });
    }
    let texel_size = tex
        .format
        .block_copy_size(None)
        .filter(|s| *s <= 16)
        .ok_or(ReadbackError::UnsupportedFormat(tex.format))? as usize;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("ishtar readback buffer"),
        size: ROW_ALIGN,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("ishtar readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &tex.texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(ROW_ALIGN as u32),
                rows_per_image: Some(1),
            },
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    device.poll(wgpu::PollType::wait_indefinitely())?;
    rx.recv().map_err(|_| ReadbackError::CallbackDropped)??;

    let mut out = [0u8; 16];
    {
        let data = slice.get_mapped_range();
        out[..texel_size].copy_from_slice(&data[..texel_size]);
    }
    buffer.unmap();
    Ok(out)
}

/// Reads one `R32Uint` texel.
pub fn read_u32(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    tex: &GpuTexture,
    x: u32,
    y: u32,
) -> Result<u32, ReadbackError> {
    let raw = read_texel(device, queue, tex, x, y)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}
