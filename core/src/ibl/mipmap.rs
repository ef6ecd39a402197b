//! Mip chain generation for the radiance cubemap, one linear downsample per face and level.

use crate::gpu;

use super::capture::{source_bind_group, source_layout};
use super::cubemap::GpuCubemap;
use super::{CubeFace, IblError, CUBEMAP_FORMAT};

const MIPMAP_SHADER: &str = include_str!("../shaders/ibl/mipmap.wgsl");

pub struct MipGenerator {
    pipeline: wgpu::RenderPipeline,
    source_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl MipGenerator {
    pub fn new(device: &wgpu::Device) -> Result<Self, IblError> {
        let source_layout = source_layout(device, "Mipmap Source Layout", wgpu::TextureViewDimension::D2, true);
        let pipeline = gpu::checked(device, "Mipmap Pipeline", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Mipmap Shader"),
                source: wgpu::ShaderSource::Wgsl(MIPMAP_SHADER.into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Mipmap Pipeline Layout"),
                bind_group_layouts: &[&source_layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Mipmap Pipeline"),
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
                    targets: &[Some(CUBEMAP_FORMAT.into())],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Mipmap Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Ok(Self {
            pipeline,
            source_layout,
            sampler,
        })
    }

    /// Fills mips 1.. of every face from the level above it.
    pub fn generate(&self, device: &wgpu::Device, queue: &wgpu::Queue, cubemap: &GpuCubemap) -> Result<(), IblError> {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Mipmap Encoder"),
        });
        for face in CubeFace::ALL {
            for mip in 1..cubemap.mip_levels() {
                let src = cubemap.face_view(mip - 1, face.layer());
                let dst = cubemap.face_view(mip, face.layer());
                let bind_group =
                    source_bind_group(device, "Mipmap Bind Group", &self.source_layout, &src, &self.sampler);
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Mipmap Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &dst,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }
        gpu::checked(device, "Mipmap Submit", || {
            queue.submit(std::iter::once(encoder.finish()));
        })?;
        log::debug!("Generated {} mips for {}x{} cubemap", cubemap.mip_levels(), cubemap.size(), cubemap.size());
        Ok(())
    }
}
