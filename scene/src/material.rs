use crate::texture::TextureId;

pub type MaterialId = usize;

/// PBR material described entirely by texture maps.
///
/// Missing maps fall back to neutral defaults at bind time (white albedo,
/// flat normal, non-metal, medium roughness, no occlusion). Metallic is read
/// from the blue channel and roughness from the green channel, so a glTF
/// metallic-roughness texture can fill both slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    pub name: String,
    pub albedo: Option<TextureId>,
    pub normal: Option<TextureId>,
    pub metallic: Option<TextureId>,
    pub roughness: Option<TextureId>,
    pub ao: Option<TextureId>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_albedo(mut self, texture: TextureId) -> Self {
        self.albedo = Some(texture);
        self
    }

    pub fn with_normal(mut self, texture: TextureId) -> Self {
        self.normal = Some(texture);
        self
    }

    pub fn with_metallic(mut self, texture: TextureId) -> Self {
        self.metallic = Some(texture);
        self
    }

    pub fn with_roughness(mut self, texture: TextureId) -> Self {
        self.roughness = Some(texture);
        self
    }

    pub fn with_ao(mut self, texture: TextureId) -> Self {
        self.ao = Some(texture);
        self
    }
}
