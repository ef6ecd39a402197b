//! Stage D: the split-sum BRDF table.
//!
//! One full-screen draw into an `Rg16Float` square. Texel `(u, v)` holds the
//! scale and bias applied to F0 for N·V = `u` and roughness = `v`.

use crate::gpu;

use super::target::{capture_depth_state, CaptureTarget};
use super::{IblError, BRDF_LUT_SIZE};

const BRDF_LUT_SHADER: &str = include_str!("../shaders/ibl/brdf_lut.wgsl");

pub const BRDF_LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;

/// The baked table with a clamped linear sampler.
#[derive(Debug)]
pub struct BrdfLut {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

/// Draws a full-screen quad that evaluates the integral per texel.
pub struct BrdfLutPipeline {
    pipeline: wgpu::RenderPipeline,
}

impl BrdfLutPipeline {
    pub fn new(device: &wgpu::Device) -> Result<Self, IblError> {
        let pipeline = gpu::checked(device, "BRDF LUT Pipeline", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("BRDF LUT Shader"),
                source: wgpu::ShaderSource::Wgsl(BRDF_LUT_SHADER.into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("BRDF LUT Pipeline Layout"),
                bind_group_layouts: &[],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("BRDF LUT Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: BRDF_LUT_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(capture_depth_state()),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;
        Ok(Self { pipeline })
    }

    /// Renders the table into a fresh texture.
    ///
    /// The LUT does not depend on the environment, only on N·V and roughness.
    pub fn generate(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &mut CaptureTarget,
    ) -> Result<BrdfLut, IblError> {
        let texture = gpu::checked(device, "BRDF LUT Texture", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("BRDF LUT Texture"),
                size: wgpu::Extent3d {
                    width: BRDF_LUT_SIZE,
                    height: BRDF_LUT_SIZE,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: BRDF_LUT_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        })?;
        target.resize(device, BRDF_LUT_SIZE)?;
        let attachment = target.attach(device, &texture, 0, 0)?;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("BRDF LUT Encoder"),
        });
        {
            let mut pass = target.begin_pass(&mut encoder, &attachment, "BRDF LUT Pass");
            pass.set_pipeline(&self.pipeline);
            pass.draw(0..4, 0..1);
        }
        gpu::checked(device, "BRDF LUT Submit", || {
            queue.submit(std::iter::once(encoder.finish()));
        })?;

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("BRDF LUT Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(BrdfLut {
            texture,
            view,
            sampler,
        })
    }
}
