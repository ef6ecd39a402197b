use pbr_engine_scene::VertexLayout;

use crate::gpu;
use crate::shaders::ShaderProgram;
use crate::texture::DEPTH_FORMAT;

use super::binding_cache::{link_attributes, BindingCache, SubmeshKey};
use super::submit::SubmitError;

/// The PBR program, its pipeline layout and one pipeline per submesh vertex layout.
pub struct PbrPipelines {
    program: ShaderProgram,
    layout: wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    cache: BindingCache<wgpu::RenderPipeline>,
}

impl PbrPipelines {
    pub fn new(
        device: &wgpu::Device,
        program: ShaderProgram,
        param_layout: &wgpu::BindGroupLayout,
        texture_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
    ) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PBR Pipeline Layout"),
            bind_group_layouts: &[param_layout, texture_layout],
            push_constant_ranges: &[],
        });
        Self {
            program,
            layout,
            format,
            cache: BindingCache::new(),
        }
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Picks up a changed shader file. Pipelines built from the previous
    /// generation are dropped.
    pub fn reload_if_changed(&mut self, device: &wgpu::Device) -> bool {
        if !self.program.reload_if_changed(device) {
            return false;
        }
        let purged = self.cache.purge_stale(self.program.generation());
        log::debug!("Dropped {} stale PBR pipelines", purged);
        true
    }

    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        key: SubmeshKey,
        vertex_layout: &VertexLayout,
    ) -> Result<&wgpu::RenderPipeline, SubmitError> {
        let generation = self.program.generation();
        let program = &self.program;
        let layout = &self.layout;
        let format = self.format;
        self.cache.get_or_try_insert_with(key, generation, || {
            let attributes =
                link_attributes(vertex_layout, program.inputs()).map_err(|source| SubmitError::Link { key, source })?;
            log::debug!(
                "Creating PBR pipeline for mesh {} submesh {} (generation {})",
                key.mesh,
                key.submesh,
                generation
            );
            let pipeline = gpu::checked(device, "PBR Pipeline", || {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("PBR Pipeline"),
                    layout: Some(layout),
                    vertex: wgpu::VertexState {
                        module: program.module(),
                        entry_point: Some("vs_main"),
                        buffers: &[wgpu::VertexBufferLayout {
                            array_stride: vertex_layout.stride as wgpu::BufferAddress,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &attributes,
                        }],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: program.module(),
                        entry_point: Some("fs_main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: Some(wgpu::BlendState::REPLACE),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: Some(wgpu::Face::Back),
                        polygon_mode: wgpu::PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: DEPTH_FORMAT,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                })
            })?;
            Ok(pipeline)
        })
    }
}
