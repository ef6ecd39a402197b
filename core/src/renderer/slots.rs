//! Binding tables for the PBR pass.
//!
//! Group 0 holds the frame parameters, group 1 the textures. Both tables
//! are mirrored by the declarations at the top of `pbr.wgsl`; layouts and
//! bind groups are built from the tables here so the three cannot drift.

use std::num::NonZeroU64;

use crate::ibl::EnvironmentMapSet;
use crate::params::{GLOBAL_BINDING_SIZE, LOCAL_BLOCK_SIZE};
use crate::texture::MaterialViews;

/// Frame parameter bindings in group 0. Both use dynamic offsets.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParamBinding {
    Global = 0,
    Local = 1,
}

impl ParamBinding {
    pub const ALL: [ParamBinding; 2] = [ParamBinding::Global, ParamBinding::Local];

    pub fn binding(self) -> u32 {
        self as u32
    }

    /// Size each binding covers. The global block is bound at the size the
    /// shader declares, whatever the frame's light count.
    pub fn size(self) -> u64 {
        match self {
            ParamBinding::Global => GLOBAL_BINDING_SIZE,
            ParamBinding::Local => LOCAL_BLOCK_SIZE,
        }
    }
}

/// Texture bindings in group 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextureSlot {
    Irradiance = 0,
    Prefiltered = 1,
    BrdfLut = 2,
    Albedo = 3,
    Normal = 4,
    Metallic = 5,
    Roughness = 6,
    Ao = 7,
    Environment = 8,
}

/// Repeat-wrapping sampler for material maps.
pub const MATERIAL_SAMPLER_BINDING: u32 = 9;
/// Clamped trilinear sampler for the IBL textures.
pub const IBL_SAMPLER_BINDING: u32 = 10;

impl TextureSlot {
    pub const ALL: [TextureSlot; 9] = [
        TextureSlot::Irradiance,
        TextureSlot::Prefiltered,
        TextureSlot::BrdfLut,
        TextureSlot::Albedo,
        TextureSlot::Normal,
        TextureSlot::Metallic,
        TextureSlot::Roughness,
        TextureSlot::Ao,
        TextureSlot::Environment,
    ];

    pub fn binding(self) -> u32 {
        self as u32
    }

    pub fn view_dimension(self) -> wgpu::TextureViewDimension {
        match self {
            TextureSlot::Irradiance | TextureSlot::Prefiltered | TextureSlot::Environment => {
                wgpu::TextureViewDimension::Cube
            }
            _ => wgpu::TextureViewDimension::D2,
        }
    }
}

pub fn param_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    ParamBinding::ALL
        .iter()
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding: binding.binding(),
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(binding.size()),
            },
            count: None,
        })
        .collect()
}

pub fn texture_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries: Vec<_> = TextureSlot::ALL
        .iter()
        .map(|slot| wgpu::BindGroupLayoutEntry {
            binding: slot.binding(),
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: slot.view_dimension(),
                multisampled: false,
            },
            count: None,
        })
        .collect();
    for binding in [MATERIAL_SAMPLER_BINDING, IBL_SAMPLER_BINDING] {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

pub fn create_param_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Frame Parameter Layout"),
        entries: &param_layout_entries(),
    })
}

pub fn create_texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("PBR Texture Layout"),
        entries: &texture_layout_entries(),
    })
}

/// Binds the parameter buffer at both bindings; draws select the blocks with dynamic offsets.
pub fn create_param_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    let entries: Vec<_> = ParamBinding::ALL
        .iter()
        .map(|binding| wgpu::BindGroupEntry {
            binding: binding.binding(),
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: NonZeroU64::new(binding.size()),
            }),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Frame Parameter Bind Group"),
        layout,
        entries: &entries,
    })
}

/// The two shared samplers of the texture group.
pub struct SlotSamplers {
    pub material: wgpu::Sampler,
    pub ibl: wgpu::Sampler,
}

impl SlotSamplers {
    pub fn new(device: &wgpu::Device) -> Self {
        let material = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let ibl = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("IBL Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self { material, ibl }
    }
}

fn slot_view<'a>(slot: TextureSlot, environment: &'a EnvironmentMapSet, material: &MaterialViews<'a>) -> &'a wgpu::TextureView {
    match slot {
        TextureSlot::Irradiance => &environment.irradiance.view,
        TextureSlot::Prefiltered => &environment.prefiltered.view,
        TextureSlot::BrdfLut => &environment.brdf_lut.view,
        TextureSlot::Albedo => material.albedo,
        TextureSlot::Normal => material.normal,
        TextureSlot::Metallic => material.metallic,
        TextureSlot::Roughness => material.roughness,
        TextureSlot::Ao => material.ao,
        TextureSlot::Environment => &environment.radiance.view,
    }
}

/// One material's texture group: IBL maps plus the material's own maps.
pub fn create_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    environment: &EnvironmentMapSet,
    material: &MaterialViews,
    samplers: &SlotSamplers,
    label: &str,
) -> wgpu::BindGroup {
    let mut entries: Vec<_> = TextureSlot::ALL
        .iter()
        .map(|&slot| wgpu::BindGroupEntry {
            binding: slot.binding(),
            resource: wgpu::BindingResource::TextureView(slot_view(slot, environment, material)),
        })
        .collect();
    entries.push(wgpu::BindGroupEntry {
        binding: MATERIAL_SAMPLER_BINDING,
        resource: wgpu::BindingResource::Sampler(&samplers.material),
    });
    entries.push(wgpu::BindGroupEntry {
        binding: IBL_SAMPLER_BINDING,
        resource: wgpu::BindingResource::Sampler(&samplers.ibl),
    });
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}
