//! Float Texture Readback
//!
//! Copies an `Rgba32Float` render target into a tight CPU `Vec<f32>`.
//! WebGPU pads every copied row to 256 bytes, so the staging buffer is
//! depadded row by row before the floats are decoded.

use std::sync::mpsc;

use crate::error::RenderTargetError;

/// Bytes per `Rgba32Float` texel.
pub const BYTES_PER_TEXEL: usize = 16;

/// Align a row length to WebGPU's copy row alignment (256 bytes).
pub fn align_bpr(value: usize) -> usize {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    value.div_ceil(align) * align
}

/// Strip row padding from a staging buffer.
pub fn depad_rows(data: &[u8], padded_bpr: usize, tight_bpr: usize, rows: usize) -> Vec<u8> {
    let mut tight = vec![0u8; tight_bpr * rows];
    for row in 0..rows {
        let src = row * padded_bpr;
        let dst = row * tight_bpr;
        tight[dst..dst + tight_bpr].copy_from_slice(&data[src..src + tight_bpr]);
    }
    tight
}

/// Reinterpret tightly packed texel bytes as `f32`s. `bytes` need not be
/// aligned.
pub fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytemuck::pod_collect_to_vec(bytes)
}

/// Synchronously read a `width` x `height` `Rgba32Float` texture.
pub fn read_texture_f32(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> Result<Vec<f32>, RenderTargetError> {
    if width == 0 || height == 0 {
        return Err(RenderTargetError::Readback(
            "readback size must be positive".to_string(),
        ));
    }

    let tight_bpr = BYTES_PER_TEXEL * width as usize;
    let padded_bpr = align_bpr(tight_bpr);
    let buffer_size = (padded_bpr * height as usize) as wgpu::BufferAddress;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Height Readback Staging"),
        size: buffer_size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Height Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr as u32),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| RenderTargetError::Readback(e.to_string()))?;

    receiver
        .recv()
        .map_err(|_| RenderTargetError::Readback("map_async callback dropped".to_string()))?
        .map_err(|e| RenderTargetError::Readback(e.to_string()))?;

    let tight = {
        let data = slice.get_mapped_range();
        depad_rows(&data, padded_bpr, tight_bpr, height as usize)
    };
    staging.unmap();

    Ok(decode_f32(&tight))
}
