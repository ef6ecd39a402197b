use pbr_engine_scene::{Material, MaterialId};

use crate::ibl::EnvironmentMapSet;
use crate::texture::{FallbackTextures, GpuTextures, MaterialViews};

use super::slots::{create_texture_bind_group, SlotSamplers};

/// Texture bind groups (group 1), one per scene material plus a default for
/// submeshes without one.
pub struct GpuMaterials {
    default: wgpu::BindGroup,
    groups: Vec<wgpu::BindGroup>,
    synced_textures: usize,
}

pub struct MaterialBindContext<'a> {
    pub layout: &'a wgpu::BindGroupLayout,
    pub environment: &'a EnvironmentMapSet,
    pub textures: &'a GpuTextures,
    pub fallbacks: &'a FallbackTextures,
    pub samplers: &'a SlotSamplers,
}

impl GpuMaterials {
    pub fn new(device: &wgpu::Device, ctx: &MaterialBindContext) -> Self {
        let default = create_texture_bind_group(
            device,
            ctx.layout,
            ctx.environment,
            &MaterialViews::fallback(ctx.fallbacks),
            ctx.samplers,
            "Default Material Bind Group",
        );
        Self {
            default,
            groups: Vec::new(),
            synced_textures: 0,
        }
    }

    /// Builds groups for materials added since the last sync. Everything is
    /// rebuilt when new textures were uploaded, since earlier materials may
    /// have been bound to fallbacks for them.
    pub fn sync(&mut self, device: &wgpu::Device, materials: &[Material], ctx: &MaterialBindContext) {
        if ctx.textures.len() != self.synced_textures {
            self.groups.clear();
            self.synced_textures = ctx.textures.len();
        }
        if self.groups.len() == materials.len() {
            return;
        }
        for material in &materials[self.groups.len()..] {
            let views = MaterialViews::resolve(Some(material), ctx.textures, ctx.fallbacks);
            let label = format!("Material Bind Group '{}'", material.name);
            self.groups.push(create_texture_bind_group(
                device,
                ctx.layout,
                ctx.environment,
                &views,
                ctx.samplers,
                &label,
            ));
        }
        log::debug!("{} material bind groups ready", self.groups.len());
    }

    pub fn get(&self, material: Option<MaterialId>) -> &wgpu::BindGroup {
        material.and_then(|id| self.groups.get(id)).unwrap_or(&self.default)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}
