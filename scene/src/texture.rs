use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Unique identifier for a texture in a [`TextureRegistry`].
pub type TextureId = usize;

/// Decoded 8-bit image data.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Channels per pixel in `pixels` (1..=4).
    pub channels: u8,
}

impl TextureData {
    /// A single-pixel RGBA texture.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            pixels: rgba.to_vec(),
            width: 1,
            height: 1,
            channels: 4,
        }
    }

    /// Converts any decoded image to 8 bits per channel, keeping its channel
    /// count. 16-bit values are rescaled, float values clamped to [0, 1].
    pub(crate) fn from_image(image: image::DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let (pixels, channels) = match image.color().channel_count() {
            1 => (image.into_luma8().into_raw(), 1),
            2 => (image.into_luma_alpha8().into_raw(), 2),
            3 => (image.into_rgb8().into_raw(), 3),
            _ => (image.into_rgba8().into_raw(), 4),
        };
        Self {
            pixels,
            width,
            height,
            channels,
        }
    }

    /// Expands the pixels to tightly packed RGBA8.
    ///
    /// Grey images replicate into RGB, missing alpha becomes opaque.
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self.channels {
            4 => self.pixels.clone(),
            channels => {
                let channels = channels as usize;
                let mut rgba = Vec::with_capacity(self.pixels.len() / channels * 4);
                for texel in self.pixels.chunks_exact(channels) {
                    match texel {
                        [g] => rgba.extend_from_slice(&[*g, *g, *g, 255]),
                        [g, a] => rgba.extend_from_slice(&[*g, *g, *g, *a]),
                        [r, g, b] => rgba.extend_from_slice(&[*r, *g, *b, 255]),
                        _ => unreachable!("chunks_exact yields {} channels", channels),
                    }
                }
                rgba
            }
        }
    }
}

/// Decodes an image file into 8-bit pixels, keeping its channel count.
pub fn decode_texture(path: impl AsRef<Path>) -> Result<TextureData> {
    let path = path.as_ref();
    let image = image::open(path).with_context(|| format!("Failed to decode texture {}", path.display()))?;
    Ok(TextureData::from_image(image))
}

struct TextureEntry {
    data: TextureData,
    srgb: bool,
}

/// Owns decoded textures and deduplicates them by source key.
///
/// File textures are keyed by path; embedded images use a synthetic key such
/// as `model.glb#image3`.
#[derive(Default)]
pub struct TextureRegistry {
    entries: Vec<TextureEntry>,
    by_key: HashMap<PathBuf, TextureId>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a texture file once; later calls with the same path return the same id.
    pub fn load(&mut self, path: impl AsRef<Path>, srgb: bool) -> Result<TextureId> {
        let path = path.as_ref();
        if let Some(&id) = self.by_key.get(path) {
            return Ok(id);
        }
        let data = decode_texture(path)?;
        log::debug!("Loaded texture {} ({}x{})", path.display(), data.width, data.height);
        Ok(self.insert_keyed(path.to_path_buf(), data, srgb))
    }

    /// Inserts already decoded data under `key` unless the key is known.
    pub fn insert_keyed(&mut self, key: PathBuf, data: TextureData, srgb: bool) -> TextureId {
        if let Some(&id) = self.by_key.get(&key) {
            return id;
        }
        let id = self.insert(data, srgb);
        self.by_key.insert(key, id);
        id
    }

    /// Inserts anonymous data. Never deduplicated.
    pub fn insert(&mut self, data: TextureData, srgb: bool) -> TextureId {
        self.entries.push(TextureEntry { data, srgb });
        self.entries.len() - 1
    }

    pub fn get(&self, id: TextureId) -> Option<&TextureData> {
        self.entries.get(id).map(|e| &e.data)
    }

    /// Whether the texture holds color data that should be sampled as sRGB.
    pub fn is_srgb(&self, id: TextureId) -> bool {
        self.entries.get(id).is_some_and(|e| e.srgb)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_expands_to_opaque_rgba() {
        let data = TextureData {
            pixels: vec![10, 20, 30, 40, 50, 60],
            width: 2,
            height: 1,
            channels: 3,
        };
        assert_eq!(data.to_rgba8(), vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn test_grey_alpha_replicates() {
        let data = TextureData {
            pixels: vec![7, 128],
            width: 1,
            height: 1,
            channels: 2,
        };
        assert_eq!(data.to_rgba8(), vec![7, 7, 7, 128]);
    }

    #[test]
    fn test_keyed_insert_deduplicates() {
        let mut registry = TextureRegistry::new();
        let key = PathBuf::from("model.glb#image0");
        let a = registry.insert_keyed(key.clone(), TextureData::solid([1, 2, 3, 4]), true);
        let b = registry.insert_keyed(key, TextureData::solid([9, 9, 9, 9]), true);
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(a).unwrap().pixels, vec![1, 2, 3, 4]);
        assert!(registry.is_srgb(a));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let mut registry = TextureRegistry::new();
        assert!(registry.load("does/not/exist.png", false).is_err());
        assert!(registry.is_empty());
    }
}
