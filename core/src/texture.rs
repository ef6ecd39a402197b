//! GPU-side textures: decoded material images, fallbacks and the depth buffer.

use pbr_engine_scene::{Material, TextureData, TextureId, TextureRegistry};

use crate::gpu::{self, GpuError};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Fallback texels for materials that lack a map.
pub const FALLBACK_ALBEDO: [u8; 4] = [255, 255, 255, 255];
/// Tangent-space +Z.
pub const FALLBACK_NORMAL: [u8; 4] = [128, 128, 255, 255];
/// Metallic is read from the blue channel.
pub const FALLBACK_METALLIC: [u8; 4] = [0, 0, 0, 255];
/// Roughness is read from the green channel; 128 is roughly 0.5.
pub const FALLBACK_ROUGHNESS: [u8; 4] = [128, 128, 128, 255];
pub const FALLBACK_AO: [u8; 4] = [255, 255, 255, 255];

pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl GpuTexture {
    /// Uploads `data` as RGBA8, sRGB-encoded if `srgb`.
    pub fn from_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &TextureData,
        srgb: bool,
        label: &str,
    ) -> Result<Self, GpuError> {
        let size = wgpu::Extent3d {
            width: data.width.max(1),
            height: data.height.max(1),
            depth_or_array_layers: 1,
        };
        let format = if srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        let rgba = data.to_rgba8();

        let texture = gpu::checked(device, label, || {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                },
                &rgba,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * size.width),
                    rows_per_image: Some(size.height),
                },
                size,
            );
            texture
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self { texture, view })
    }

    pub fn solid(device: &wgpu::Device, queue: &wgpu::Queue, rgba: [u8; 4], label: &str) -> Result<Self, GpuError> {
        Self::from_data(device, queue, &TextureData::solid(rgba), false, label)
    }

    /// Depth buffer matching a surface size.
    pub fn depth(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, GpuError> {
        let texture = gpu::checked(device, "Depth Texture", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Depth Texture"),
                size: wgpu::Extent3d {
                    width: width.max(1),
                    height: height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self { texture, view })
    }
}

/// 1x1 stand-ins bound in place of missing material maps.
pub struct FallbackTextures {
    pub albedo: GpuTexture,
    pub normal: GpuTexture,
    pub metallic: GpuTexture,
    pub roughness: GpuTexture,
    pub ao: GpuTexture,
}

impl FallbackTextures {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Self, GpuError> {
        Ok(Self {
            albedo: GpuTexture::solid(device, queue, FALLBACK_ALBEDO, "Fallback Albedo")?,
            normal: GpuTexture::solid(device, queue, FALLBACK_NORMAL, "Fallback Normal")?,
            metallic: GpuTexture::solid(device, queue, FALLBACK_METALLIC, "Fallback Metallic")?,
            roughness: GpuTexture::solid(device, queue, FALLBACK_ROUGHNESS, "Fallback Roughness")?,
            ao: GpuTexture::solid(device, queue, FALLBACK_AO, "Fallback AO")?,
        })
    }
}

/// Uploaded copies of a [`TextureRegistry`], indexed by [`TextureId`].
///
/// The registry only ever grows, so syncing uploads the tail that is new
/// since the last call. An entry that fails to upload keeps an empty slot;
/// materials referencing it bind the fallback and it is not retried.
pub struct GpuTextures<T = GpuTexture> {
    slots: Vec<Option<T>>,
}

impl<T> Default for GpuTextures<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl GpuTextures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads registry entries not seen before. Returns how many slots were added.
    pub fn sync(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, registry: &TextureRegistry) -> usize {
        let max_dimension = device.limits().max_texture_dimension_2d;
        self.sync_with(registry, |id, data, srgb| {
            let label = format!("Texture {}", id);
            check_dimensions(data, max_dimension, &label)?;
            GpuTexture::from_data(device, queue, data, srgb, &label)
        })
    }
}

impl<T> GpuTextures<T> {
    /// Walks the unseen tail of `registry`, storing whatever `upload` produces.
    pub fn sync_with<E: std::fmt::Display>(
        &mut self,
        registry: &TextureRegistry,
        mut upload: impl FnMut(TextureId, &TextureData, bool) -> Result<T, E>,
    ) -> usize {
        let start = self.slots.len();
        let mut failed = 0;
        for id in start..registry.len() {
            let Some(data) = registry.get(id) else {
                break;
            };
            let slot = match upload(id, data, registry.is_srgb(id)) {
                Ok(texture) => Some(texture),
                Err(err) => {
                    log::warn!("Texture {} failed to upload, materials will use fallbacks: {}", id, err);
                    failed += 1;
                    None
                }
            };
            self.slots.push(slot);
        }
        let added = self.slots.len() - start;
        if added > 0 {
            log::debug!(
                "Uploaded {} textures ({} failed, {} total)",
                added - failed,
                failed,
                self.slots.len()
            );
        }
        added
    }

    pub fn get(&self, id: TextureId) -> Option<&T> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    /// Registry entries seen so far, uploaded or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn uploaded(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Rejects images the device cannot hold before any GPU call is made.
fn check_dimensions(data: &TextureData, max_dimension: u32, label: &str) -> Result<(), GpuError> {
    if data.width > max_dimension || data.height > max_dimension {
        return Err(GpuError::Validation {
            context: label.to_string(),
            message: format!(
                "{}x{} exceeds the device limit of {}",
                data.width, data.height, max_dimension
            ),
        });
    }
    Ok(())
}

/// The five material views to bind, with fallbacks filled in.
pub struct MaterialViews<'a> {
    pub albedo: &'a wgpu::TextureView,
    pub normal: &'a wgpu::TextureView,
    pub metallic: &'a wgpu::TextureView,
    pub roughness: &'a wgpu::TextureView,
    pub ao: &'a wgpu::TextureView,
}

impl<'a> MaterialViews<'a> {
    pub fn resolve(material: Option<&Material>, textures: &'a GpuTextures, fallbacks: &'a FallbackTextures) -> Self {
        let pick = move |id: Option<TextureId>, fallback: &'a GpuTexture| -> &'a wgpu::TextureView {
            match id {
                Some(id) => match textures.get(id) {
                    Some(texture) => &texture.view,
                    None => {
                        log::warn!("Texture {} is not uploaded, using fallback", id);
                        &fallback.view
                    }
                },
                None => &fallback.view,
            }
        };
        match material {
            Some(m) => Self {
                albedo: pick(m.albedo, &fallbacks.albedo),
                normal: pick(m.normal, &fallbacks.normal),
                metallic: pick(m.metallic, &fallbacks.metallic),
                roughness: pick(m.roughness, &fallbacks.roughness),
                ao: pick(m.ao, &fallbacks.ao),
            },
            None => Self::fallback(fallbacks),
        }
    }

    pub fn fallback(fallbacks: &'a FallbackTextures) -> Self {
        Self {
            albedo: &fallbacks.albedo.view,
            normal: &fallbacks.normal.view,
            metallic: &fallbacks.metallic.view,
            roughness: &fallbacks.roughness.view,
            ao: &fallbacks.ao.view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_normal_decodes_to_plus_z() {
        let n: Vec<f32> = FALLBACK_NORMAL[..3].iter().map(|&c| c as f32 / 255.0 * 2.0 - 1.0).collect();
        assert!(n[0].abs() < 0.01);
        assert!(n[1].abs() < 0.01);
        assert!((n[2] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_fallback_material_channels() {
        // metallic in blue, roughness in green
        assert_eq!(FALLBACK_METALLIC[2], 0);
        assert!((FALLBACK_ROUGHNESS[1] as f32 / 255.0 - 0.5).abs() < 0.01);
        assert_eq!(FALLBACK_AO[0], 255);
    }

    fn registry(count: usize) -> TextureRegistry {
        let mut registry = TextureRegistry::new();
        for i in 0..count {
            registry.insert(TextureData::solid([i as u8, 0, 0, 255]), false);
        }
        registry
    }

    #[test]
    fn test_failed_upload_advances_and_is_not_retried() {
        let registry = registry(3);
        let mut textures: GpuTextures<u8> = GpuTextures::default();
        let mut attempts = Vec::new();

        let added = textures.sync_with(&registry, |id, data, _| {
            attempts.push(id);
            if id == 0 {
                Err("out of memory")
            } else {
                Ok(data.pixels[0])
            }
        });
        assert_eq!(added, 3);
        assert_eq!(textures.len(), 3);
        assert_eq!(textures.uploaded(), 2);
        assert!(textures.get(0).is_none());
        assert_eq!(textures.get(2), Some(&2));

        let added = textures.sync_with(&registry, |id, _, _| {
            attempts.push(id);
            Ok::<u8, &str>(0)
        });
        assert_eq!(added, 0);
        assert_eq!(attempts, vec![0, 1, 2]);
    }

    #[test]
    fn test_sync_uploads_only_new_entries() {
        let mut registry = registry(1);
        let mut textures: GpuTextures<TextureId> = GpuTextures::default();
        assert!(textures.is_empty());
        assert_eq!(textures.sync_with(&registry, |id, _, _| Ok::<_, &str>(id)), 1);

        registry.insert(TextureData::solid([9, 9, 9, 255]), true);
        let mut srgb_flags = Vec::new();
        let added = textures.sync_with(&registry, |id, _, srgb| {
            srgb_flags.push(srgb);
            Ok::<_, &str>(id)
        });
        assert_eq!(added, 1);
        assert_eq!(srgb_flags, vec![true]);
        assert_eq!(textures.get(1), Some(&1));
    }

    #[test]
    fn test_oversized_texture_is_rejected() {
        let data = TextureData {
            pixels: vec![0; 4 * 16 * 2],
            width: 16,
            height: 2,
            channels: 4,
        };
        assert!(check_dimensions(&data, 16, "Texture 0").is_ok());
        let err = check_dimensions(&data, 8, "Texture 0").unwrap_err();
        assert!(matches!(err, GpuError::Validation { .. }));
        assert!(err.to_string().contains("16x2"));
    }
}
