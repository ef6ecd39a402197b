//! Per-frame parameter blocks.
//!
//! Every frame the packer rewrites the parameter buffer from scratch: one
//! global block for the whole frame, then one local block per entity. The
//! ranges it returns are only meaningful until the next pack.
//!
//! Global block (binding 0), std140 rules:
//!
//! | Offset     | Size | Field             |
//! |------------|------|-------------------|
//! | 0          | 4    | render target mode|
//! | 16         | 12   | camera position   |
//! | 28         | 4    | light count       |
//! | 32 + 64*i  | 64   | light i           |
//!
//! Light block, relative to its 16-byte aligned start:
//!
//! | Offset | Size | Field     |
//! |--------|------|-----------|
//! | 0      | 4    | type      |
//! | 16     | 12   | color     |
//! | 32     | 12   | direction |
//! | 48     | 12   | position  |
//! | 60     | 4    | intensity |
//!
//! Local block (binding 1): world matrix then world-view-projection matrix,
//! starting at a multiple of the device's minimum uniform offset alignment.

use cgmath::{Matrix4, Vector3};
use pbr_engine_scene::{Entity, FlyCamera, Light, RenderTargetMode, Scene, MAX_LIGHTS};
use thiserror::Error;

use crate::buffer::{AlignedBuffer, BufferError, GpuAlignedBuffer, VEC4_ALIGNMENT};

/// Bytes before the first light block.
pub const GLOBAL_HEADER_SIZE: u64 = 32;
/// Bytes per light block.
pub const LIGHT_BLOCK_SIZE: u64 = 64;
/// Bytes per entity block.
pub const LOCAL_BLOCK_SIZE: u64 = 128;
/// Size of the global block as declared in the shader (full light array).
pub const GLOBAL_BINDING_SIZE: u64 = GLOBAL_HEADER_SIZE + LIGHT_BLOCK_SIZE * MAX_LIGHTS as u64;

/// A bindable `(offset, size)` window into the parameter buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParamRange {
    pub offset: u64,
    pub size: u64,
}

impl ParamRange {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    pub fn overlaps(&self, other: &ParamRange) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }

    pub fn dynamic_offset(&self) -> wgpu::DynamicOffset {
        self.offset as wgpu::DynamicOffset
    }
}

/// Ranges produced by one pack. `locals[i]` belongs to entity `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameParams {
    pub global: ParamRange,
    pub locals: Vec<ParamRange>,
}

/// What a frame's parameter blocks are computed from.
#[derive(Debug, Clone)]
pub struct FrameInputs<'a> {
    pub mode: RenderTargetMode,
    pub camera_position: Vector3<f32>,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub lights: &'a [Light],
    pub entities: &'a [Entity],
}

impl<'a> FrameInputs<'a> {
    pub fn from_scene(scene: &'a Scene, camera: &FlyCamera) -> Self {
        Self {
            mode: scene.render_target_mode,
            camera_position: Vector3::new(camera.position.x, camera.position.y, camera.position.z),
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            lights: &scene.lights,
            entities: &scene.entities,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("frame parameters do not fit: {0}")]
    Buffer(#[from] BufferError),
    #[error("{count} lights exceed the shader limit of {max}")]
    TooManyLights { count: usize, max: usize },
}

/// Writes the global and local blocks into an already mapped buffer.
pub fn write_frame(
    buffer: &mut AlignedBuffer,
    min_offset_alignment: u64,
    inputs: &FrameInputs,
) -> Result<FrameParams, ParamsError> {
    if inputs.lights.len() > MAX_LIGHTS {
        return Err(ParamsError::TooManyLights {
            count: inputs.lights.len(),
            max: MAX_LIGHTS,
        });
    }

    let global_offset = buffer.align(min_offset_alignment)?;
    buffer.push_u32(inputs.mode as u32)?;
    buffer.push_vec3(inputs.camera_position)?;
    buffer.push_u32(inputs.lights.len() as u32)?;
    for light in inputs.lights {
        buffer.align(VEC4_ALIGNMENT)?;
        buffer.push_u32(light.light_type as u32)?;
        buffer.push_vec3(light.color)?;
        buffer.push_vec3(light.direction)?;
        buffer.push_vec3(light.position)?;
        buffer.push_f32(light.intensity)?;
    }
    let global = ParamRange {
        offset: global_offset,
        size: buffer.head() - global_offset,
    };

    let view_projection = inputs.projection * inputs.view;
    let mut locals = Vec::with_capacity(inputs.entities.len());
    for entity in inputs.entities {
        let offset = buffer.align(min_offset_alignment)?;
        let world = entity.world_matrix();
        buffer.push_mat4(&world)?;
        buffer.push_mat4(&(view_projection * world))?;
        locals.push(ParamRange {
            offset,
            size: buffer.head() - offset,
        });
    }

    Ok(FrameParams { global, locals })
}

/// Maps the buffer, writes the frame's blocks and uploads them.
pub fn pack_frame(
    buffer: &mut GpuAlignedBuffer,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    min_offset_alignment: u64,
    inputs: &FrameInputs,
) -> Result<FrameParams, ParamsError> {
    let params = write_frame(buffer.map_for_write()?, min_offset_alignment, inputs);
    buffer.unmap(device, queue)?;
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferUsageClass;
    use cgmath::SquareMatrix;

    const EPSILON: f32 = 1e-4;

    fn inputs<'a>(lights: &'a [Light], entities: &'a [Entity]) -> FrameInputs<'a> {
        FrameInputs {
            mode: RenderTargetMode::FinalRender,
            camera_position: Vector3::new(0.0, 1.0, 3.0),
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            lights,
            entities,
        }
    }

    fn mapped(capacity: u64) -> AlignedBuffer {
        let mut buffer = AlignedBuffer::new(capacity, BufferUsageClass::Uniform);
        buffer.map_for_write().unwrap();
        buffer
    }

    fn lights(count: usize) -> Vec<Light> {
        (0..count)
            .map(|i| Light::point(Vector3::new(i as f32, 3.0, 0.0)))
            .collect()
    }

    fn entities(count: usize) -> Vec<Entity> {
        (0..count)
            .map(|i| Entity::new(format!("e{}", i), 0).with_position(Vector3::new(i as f32, 0.0, 0.0)))
            .collect()
    }

    #[test]
    fn test_global_size_by_light_count() {
        for (count, expected) in [(0, 32), (1, 96), (4, 288)] {
            let lights = lights(count);
            let mut buffer = mapped(65536);
            let params = write_frame(&mut buffer, 256, &inputs(&lights, &[])).unwrap();
            assert_eq!(params.global.offset, 0);
            assert_eq!(params.global.size, expected, "{} lights", count);
        }
    }

    #[test]
    fn test_global_size_is_linear_in_lights() {
        for count in 0..=MAX_LIGHTS {
            let lights = lights(count);
            let mut buffer = mapped(65536);
            let params = write_frame(&mut buffer, 16, &inputs(&lights, &[])).unwrap();
            assert_eq!(params.global.size, GLOBAL_HEADER_SIZE + LIGHT_BLOCK_SIZE * count as u64);
            assert!(params.global.size <= GLOBAL_BINDING_SIZE);
        }
    }

    #[test]
    fn test_local_ranges_aligned_and_disjoint() {
        let lights = lights(3);
        for alignment in [16u64, 64, 256] {
            for count in [1usize, 2, 10] {
                let entities = entities(count);
                let mut buffer = mapped(65536);
                let params = write_frame(&mut buffer, alignment, &inputs(&lights, &entities)).unwrap();

                assert_eq!(params.locals.len(), count);
                assert!(params.locals.iter().all(|r| r.offset % alignment == 0));
                assert!(params.locals.iter().all(|r| r.size == LOCAL_BLOCK_SIZE));
                assert!(params.locals.iter().all(|r| !r.overlaps(&params.global)));
                for pair in params.locals.windows(2) {
                    assert!(!pair[0].overlaps(&pair[1]));
                    assert!(pair[1].offset > pair[0].offset);
                }
            }
        }
    }

    #[test]
    fn test_four_lights_two_entities_read_back() {
        let lights: Vec<Light> = [(-2.5, -2.5), (2.5, -2.5), (-2.5, 2.5), (2.5, 2.5)]
            .iter()
            .map(|&(x, z)| Light::point(Vector3::new(x, 3.0, z)))
            .collect();
        let entities = vec![
            Entity::new("first", 0).with_position(Vector3::new(5.0, 0.0, 0.0)),
            Entity::new("second", 0).with_position(Vector3::new(0.0, 0.0, -2.0)).with_scale(0.5),
        ];
        let mut frame = inputs(&lights, &entities);
        frame.mode = RenderTargetMode::Normals;
        frame.view = Matrix4::from_translation(Vector3::new(0.0, 0.0, -3.0));
        frame.projection = cgmath::perspective(cgmath::Deg(45.0), 1.5, 0.1, 1000.0);

        let mut buffer = mapped(65536);
        let params = write_frame(&mut buffer, 256, &frame).unwrap();
        buffer.unmap().unwrap();

        let g = params.global.offset;
        assert_eq!(buffer.read_u32(g), Some(RenderTargetMode::Normals as u32));
        assert_eq!(buffer.read_vec3(g + 16), Some(Vector3::new(0.0, 1.0, 3.0)));
        assert_eq!(buffer.read_u32(g + 28), Some(4));
        for (i, light) in lights.iter().enumerate() {
            let base = g + GLOBAL_HEADER_SIZE + LIGHT_BLOCK_SIZE * i as u64;
            assert_eq!(buffer.read_u32(base), Some(0));
            assert_eq!(buffer.read_vec3(base + 16), Some(Vector3::new(1.0, 1.0, 1.0)));
            assert_eq!(buffer.read_vec3(base + 48), Some(light.position));
            assert_eq!(buffer.read_f32(base + 60), Some(60000.0));
        }

        let world = buffer.read_mat4(params.locals[0].offset).unwrap();
        assert_eq!(world.w.truncate(), Vector3::new(5.0, 0.0, 0.0));
        assert_eq!(world, entities[0].world_matrix());

        let wvp = buffer.read_mat4(params.locals[1].offset + 64).unwrap();
        let expected = frame.projection * frame.view * entities[1].world_matrix();
        let actual: &[f32; 16] = wvp.as_ref();
        let expected: &[f32; 16] = expected.as_ref();
        for (a, b) in actual.iter().zip(expected.iter()) {
            assert!((a - b).abs() < EPSILON, "{} != {}", a, b);
        }
    }

    #[test]
    fn test_consecutive_frames_reuse_ranges() {
        let lights = lights(2);
        let mut entities = entities(3);
        let mut buffer = AlignedBuffer::new(65536, BufferUsageClass::Uniform);

        buffer.map_for_write().unwrap();
        let first = write_frame(&mut buffer, 256, &inputs(&lights, &entities)).unwrap();
        let first_head = buffer.head();
        buffer.unmap().unwrap();

        entities[1].position = Vector3::new(-7.0, 2.0, 1.0);
        buffer.map_for_write().unwrap();
        let second = write_frame(&mut buffer, 256, &inputs(&lights, &entities)).unwrap();
        buffer.unmap().unwrap();

        assert_eq!(first, second);
        assert_eq!(buffer.head(), first_head);
        let world = buffer.read_mat4(second.locals[1].offset).unwrap();
        assert_eq!(world.w.truncate(), Vector3::new(-7.0, 2.0, 1.0));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let lights = lights(1);
        let entities = entities(4);
        let mut buffer = mapped(512);
        let err = write_frame(&mut buffer, 256, &inputs(&lights, &entities)).unwrap_err();
        assert!(matches!(err, ParamsError::Buffer(BufferError::CapacityExceeded { .. })));
    }

    #[test]
    fn test_too_many_lights() {
        let lights = lights(MAX_LIGHTS + 1);
        let mut buffer = mapped(65536);
        let err = write_frame(&mut buffer, 256, &inputs(&lights, &[])).unwrap_err();
        assert_eq!(
            err,
            ParamsError::TooManyLights {
                count: MAX_LIGHTS + 1,
                max: MAX_LIGHTS
            }
        );
        assert_eq!(buffer.head(), 0);
    }

    #[test]
    fn test_unmapped_buffer_is_rejected() {
        let mut buffer = AlignedBuffer::new(1024, BufferUsageClass::Uniform);
        let err = write_frame(&mut buffer, 256, &inputs(&[], &[])).unwrap_err();
        assert_eq!(err, ParamsError::Buffer(BufferError::NotMapped));
    }

    #[test]
    fn test_from_scene_uses_camera_matrices() {
        let mut scene = Scene::new();
        scene.add_default_lights();
        let camera = FlyCamera::default();
        let frame = FrameInputs::from_scene(&scene, &camera);
        assert_eq!(frame.lights.len(), 4);
        assert_eq!(frame.view, camera.view_matrix());
        assert_eq!(frame.camera_position, Vector3::new(0.0, 0.0, 3.0));
    }
}
