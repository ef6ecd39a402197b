//! The radiance cubemap drawn behind the scene.

use anyhow::{Context, Result};
use cgmath::{Matrix4, Vector4};

use crate::buffer::{BufferError, BufferUsageClass, GpuAlignedBuffer, VEC4_ALIGNMENT};
use crate::gpu::{self, GpuError};
use crate::ibl::capture_rig::UNIT_CUBE_POSITIONS;
use crate::ibl::EnvironmentMapSet;
use crate::shaders::ShaderProgram;
use crate::texture::DEPTH_FORMAT;

const SKYBOX_UNIFORM_SIZE: u64 = 64;

/// `projection * view` with the view's translation dropped, so the cube
/// stays centered on the camera.
pub fn skybox_view_projection(view: Matrix4<f32>, projection: Matrix4<f32>) -> Matrix4<f32> {
    let mut rotation = view;
    rotation.w = Vector4::new(0.0, 0.0, 0.0, 1.0);
    projection * rotation
}

pub struct Skybox {
    program: ShaderProgram,
    pipeline: wgpu::RenderPipeline,
    pipeline_layout: wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    uniform: GpuAlignedBuffer,
    vertices: GpuAlignedBuffer,
    uniform_group: wgpu::BindGroup,
    texture_group: wgpu::BindGroup,
}

impl Skybox {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        program: ShaderProgram,
        environment: &EnvironmentMapSet,
        format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Skybox Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(SKYBOX_UNIFORM_SIZE),
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Skybox Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Skybox Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let pipeline = create_pipeline(device, &pipeline_layout, &program, format)
            .context("Failed to create skybox pipeline")?;

        let uniform = GpuAlignedBuffer::create(device, SKYBOX_UNIFORM_SIZE, BufferUsageClass::Uniform, "Skybox Uniform")?;
        let mut vertices = GpuAlignedBuffer::create(
            device,
            std::mem::size_of_val(&UNIT_CUBE_POSITIONS) as u64,
            BufferUsageClass::Vertex,
            "Skybox Vertices",
        )?;
        vertices.map_for_write()?.push_slice(&UNIT_CUBE_POSITIONS, VEC4_ALIGNMENT)?;
        vertices.unmap(device, queue)?;

        let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.buffer().as_entire_binding(),
            }],
        });
        let texture_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox Texture Bind Group"),
            layout: &texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&environment.radiance.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&environment.radiance.sampler),
                },
            ],
        });

        Ok(Self {
            program,
            pipeline,
            pipeline_layout,
            format,
            uniform,
            vertices,
            uniform_group,
            texture_group,
        })
    }

    /// Recompiles a changed shader and rebuilds the pipeline. A pipeline
    /// that fails to build leaves the previous one in place.
    pub fn reload_if_changed(&mut self, device: &wgpu::Device) -> bool {
        if !self.program.reload_if_changed(device) {
            return false;
        }
        match create_pipeline(device, &self.pipeline_layout, &self.program, self.format) {
            Ok(pipeline) => {
                self.pipeline = pipeline;
                true
            }
            Err(err) => {
                log::error!("Keeping previous skybox pipeline: {}", err);
                false
            }
        }
    }

    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
    ) -> Result<(), BufferError> {
        self.uniform
            .map_for_write()?
            .push_mat4(&skybox_view_projection(view, projection))?;
        self.uniform.unmap(device, queue)
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_group, &[]);
        pass.set_bind_group(1, &self.texture_group, &[]);
        pass.set_vertex_buffer(0, self.vertices.buffer().slice(..));
        pass.draw(0..UNIT_CUBE_POSITIONS.len() as u32, 0..1);
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    program: &ShaderProgram,
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, GpuError> {
    gpu::checked(device, "Skybox Pipeline", || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Skybox Pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: program.module(),
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: program.module(),
                entry_point: Some("fs_main"),
                targets: &[Some(format.into())],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Point3, SquareMatrix, Vector3};

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_skybox_ignores_camera_translation() {
        let projection = cgmath::perspective(cgmath::Deg(45.0), 1.5, 0.1, 100.0);
        let at_origin = Matrix4::look_to_rh(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, -1.0), Vector3::unit_y());
        let moved = Matrix4::look_to_rh(Point3::new(5.0, -3.0, 2.0), Vector3::new(0.0, 0.0, -1.0), Vector3::unit_y());

        let a = skybox_view_projection(at_origin, projection);
        let b = skybox_view_projection(moved, projection);
        for col in 0..4 {
            for row in 0..4 {
                assert!((a[col][row] - b[col][row]).abs() < EPSILON);
            }
        }
    }

    #[test]
    fn test_skybox_identity_view() {
        let projection = Matrix4::identity();
        let view = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(skybox_view_projection(view, projection), Matrix4::identity());
    }
}
