//! Six-layer cube textures rendered one face and mip at a time.

use crate::gpu::{self, GpuError};

use super::CUBEMAP_FORMAT;

/// Number of mip levels down to 1x1 for a `size` base level.
pub fn full_mip_count(size: u32) -> u32 {
    32 - size.max(1).leading_zeros()
}

/// A 6-layer 2D array in +X, -X, +Y, -Y, +Z, -Z order, usable
/// both as a render attachment (one layer at a time) and through `view` as a
/// sampled cube.
#[derive(Debug)]
pub struct GpuCubemap {
    pub texture: wgpu::Texture,
    /// Cube view over every mip level.
    pub view: wgpu::TextureView,
    /// Trilinear, clamped.
    pub sampler: wgpu::Sampler,
    size: u32,
    mip_levels: u32,
}

impl GpuCubemap {
    pub fn new(device: &wgpu::Device, size: u32, mip_levels: u32, label: &str) -> Result<Self, GpuError> {
        let texture = gpu::checked(device, label, || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: 6,
                },
                mip_level_count: mip_levels,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: CUBEMAP_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        })?;

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{} Cube View", label)),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            base_mip_level: 0,
            mip_level_count: Some(mip_levels),
            base_array_layer: 0,
            array_layer_count: Some(6),
            ..Default::default()
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Sampler", label)),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: if mip_levels > 1 {
                wgpu::FilterMode::Linear
            } else {
                wgpu::FilterMode::Nearest
            },
            ..Default::default()
        });

        log::debug!("Created cubemap '{}' ({}x{}, {} mips)", label, size, size, mip_levels);
        Ok(Self {
            texture,
            view,
            sampler,
            size,
            mip_levels,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Single-layer 2D view of one face at one mip, for sampling.
    pub fn face_view(&self, mip: u32, layer: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Cubemap Face View"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_mip_level: mip,
            mip_level_count: Some(1),
            base_array_layer: layer,
            array_layer_count: Some(1),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mip_count() {
        assert_eq!(full_mip_count(512), 10);
        assert_eq!(full_mip_count(128), 8);
        assert_eq!(full_mip_count(1), 1);
        assert_eq!(full_mip_count(0), 1);
        assert_eq!(full_mip_count(300), 9);
    }
}
