//! Resources shared by the cube capture stages: the unit cube, per-face
//! uniform blocks, and the pipeline template every stage instantiates.

use std::num::NonZeroU64;

use cgmath::Vector4;

use crate::buffer::{align_to, AlignedBuffer, BufferError, BufferUsageClass, GpuAlignedBuffer, SCALAR_ALIGNMENT};
use crate::gpu::{self, GpuError};

use super::capture_rig::{CaptureRig, CubeFace, UNIT_CUBE_POSITIONS};
use super::target::capture_depth_state;
use super::{prefilter_roughness, IblError, CUBEMAP_FORMAT, ENVIRONMENT_CUBEMAP_SIZE, PREFILTERED_MIP_LEVELS};

/// Vertex stage and face uniform declaration prepended to each stage's fragment shader.
pub const CAPTURE_VERTEX_SHADER: &str = include_str!("../shaders/ibl/capture.wgsl");

/// `view_proj: mat4x4<f32>` followed by `params: vec4<f32>` (roughness, source size).
pub const FACE_BLOCK_SIZE: u64 = 80;

/// Writes one face block per cube face for every roughness value.
///
/// Returns the dynamic offsets, indexed `[set][face layer]`.
pub fn write_face_blocks(
    buffer: &mut AlignedBuffer,
    rig: &CaptureRig,
    roughness: &[f32],
    source_size: f32,
    alignment: u64,
) -> Result<Vec<[u32; 6]>, BufferError> {
    let mut sets = Vec::with_capacity(roughness.len());
    for &r in roughness {
        let mut offsets = [0u32; 6];
        for face in CubeFace::ALL {
            let offset = buffer.align(alignment)?;
            buffer.push_mat4(&rig.view_projection(face))?;
            buffer.push_vec4(Vector4::new(r, source_size, 0.0, 0.0))?;
            offsets[face.layer() as usize] = offset as u32;
        }
        sets.push(offsets);
    }
    Ok(sets)
}

/// Face uniforms and cube geometry, uploaded once per environment build.
pub struct CaptureUniforms {
    uniforms: GpuAlignedBuffer,
    vertices: GpuAlignedBuffer,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    sets: Vec<[u32; 6]>,
}

impl CaptureUniforms {
    /// Set 0 has roughness 0; set `k` matches prefilter mip `k`.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, rig: &CaptureRig) -> Result<Self, IblError> {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let roughness: Vec<f32> = (0..PREFILTERED_MIP_LEVELS).map(prefilter_roughness).collect();
        let capacity = roughness.len() as u64 * 6 * align_to(FACE_BLOCK_SIZE, alignment);

        let mut uniforms =
            GpuAlignedBuffer::create(device, capacity, BufferUsageClass::Uniform, "Capture Face Uniforms")?;
        let sets = write_face_blocks(
            uniforms.map_for_write()?,
            rig,
            &roughness,
            ENVIRONMENT_CUBEMAP_SIZE as f32,
            alignment,
        )?;
        uniforms.unmap(device, queue)?;

        let mut vertices = GpuAlignedBuffer::create(
            device,
            std::mem::size_of_val(&UNIT_CUBE_POSITIONS) as u64,
            BufferUsageClass::Vertex,
            "Capture Cube Vertices",
        )?;
        vertices.map_for_write()?.push_slice(&UNIT_CUBE_POSITIONS, SCALAR_ALIGNMENT)?;
        vertices.unmap(device, queue)?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Capture Face Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(FACE_BLOCK_SIZE),
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Capture Face Bind Group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: uniforms.buffer(),
                    offset: 0,
                    size: NonZeroU64::new(FACE_BLOCK_SIZE),
                }),
            }],
        });

        Ok(Self {
            uniforms,
            vertices,
            layout,
            bind_group,
            sets,
        })
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn uniform_bytes(&self) -> u64 {
        self.uniforms.host().head()
    }

    /// Binds the face block at group 0 and draws the unit cube.
    pub fn draw_face(&self, pass: &mut wgpu::RenderPass<'_>, set: usize, face: CubeFace) {
        let offset = self.sets[set.min(self.sets.len() - 1)][face.layer() as usize];
        pass.set_bind_group(0, &self.bind_group, &[offset]);
        pass.set_vertex_buffer(0, self.vertices.buffer().slice(..));
        pass.draw(0..UNIT_CUBE_POSITIONS.len() as u32, 0..1);
    }
}

/// Layout for a sampled source texture at binding 0 and its sampler at binding 1.
pub fn source_layout(
    device: &wgpu::Device,
    label: &str,
    view_dimension: wgpu::TextureViewDimension,
    filterable: bool,
) -> wgpu::BindGroupLayout {
    let sampler = if filterable {
        wgpu::SamplerBindingType::Filtering
    } else {
        wgpu::SamplerBindingType::NonFiltering
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable },
                    view_dimension,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(sampler),
                count: None,
            },
        ],
    })
}

pub fn source_bind_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Builds a pipeline that draws the unit cube with `fragment` into a cubemap face.
pub fn capture_pipeline(
    device: &wgpu::Device,
    label: &str,
    fragment: &str,
    source_layout: &wgpu::BindGroupLayout,
    faces: &CaptureUniforms,
) -> Result<wgpu::RenderPipeline, GpuError> {
    gpu::checked(device, label, || {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(format!("{}\n{}", CAPTURE_VERTEX_SHADER, fragment).into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[faces.layout(), source_layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: 12,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    }],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: CUBEMAP_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // The capture projection flips Y, which reverses winding.
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(capture_depth_state()),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    })
}
