use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;

use crate::error::CreationError;

/// Edge length of the generated floor texture.
pub const STONE_SIZE: u32 = 64;

/// Colour texture with a repeating sampler.
pub struct GpuTexture {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl GpuTexture {
    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Self, CreationError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(CreationError::Texture {
                label: label.to_string(),
                message: format!(
                    "{width}x{height} needs {expected} bytes of RGBA, got {}",
                    pixels.len()
                ),
            });
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(CreationError::Texture {
                label: label.to_string(),
                message: error.to_string(),
            });
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Ok(Self {
            _texture: texture,
            view,
            sampler,
        })
    }

    /// Single white texel, used for untextured materials.
    pub fn white(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Self, CreationError> {
        Self::from_rgba(device, queue, "white-texel", 1, 1, &[255; 4])
    }

    pub fn load(device: &wgpu::Device, queue: &wgpu::Queue, path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("unable to read {}", path.display()))?;
        let image = image::load_from_memory(&bytes)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        let label = path.display().to_string();
        Ok(Self::from_rgba(
            device,
            queue,
            &label,
            width,
            height,
            image.as_raw(),
        )?)
    }

    /// Loads `path` when given, falling back to `fallback` on any failure.
    pub fn load_or(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: Option<&Path>,
        fallback: impl FnOnce() -> Result<Self, CreationError>,
    ) -> Result<Self, CreationError> {
        if let Some(path) = path {
            match Self::load(device, queue, path) {
                Ok(texture) => return Ok(texture),
                Err(err) => warn!("texture {} unavailable, using fallback: {err:#}", path.display()),
            }
        }
        fallback()
    }

    pub fn stone(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Self, CreationError> {
        let pixels = stone_pattern(STONE_SIZE);
        Self::from_rgba(device, queue, "stone", STONE_SIZE, STONE_SIZE, &pixels)
    }
}

/// Grey flagstones with darker mortar lines and a little hashed noise.
pub fn stone_pattern(size: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
    let tile = (size / 2).max(1);
    for y in 0..size {
        for x in 0..size {
            let mortar = x % tile == 0 || y % tile == 0;
            let noise = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663)) % 24;
            let lighter = if (x / tile + y / tile) % 2 == 0 { 20 } else { 0 };
            let shade = if mortar { 70 } else { 140 + noise as u8 + lighter };
            pixels.extend_from_slice(&[shade, shade, shade.saturating_sub(8), 255]);
        }
    }
    pixels
}

/// Layout for a sampled colour texture at bindings `first` and `first + 1`.
pub(crate) fn texture_entries(first: u32) -> [wgpu::BindGroupLayoutEntry; 2] {
    [
        wgpu::BindGroupLayoutEntry {
            binding: first,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: first + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stone_pattern_is_opaque_rgba() {
        let pixels = stone_pattern(STONE_SIZE);
        assert_eq!(pixels.len(), (STONE_SIZE * STONE_SIZE * 4) as usize);
        assert!(pixels.chunks(4).all(|texel| texel[3] == 255));
        // Mortar at the tile corner is darker than the stone beside it.
        let row = STONE_SIZE as usize * 4;
        assert!(pixels[0] < pixels[row + 4]);
    }
}
