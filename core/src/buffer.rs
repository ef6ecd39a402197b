//! Aligned append buffers.
//!
//! An [`AlignedBuffer`] is a fixed-capacity byte region with a write cursor.
//! Every write first rounds the cursor up to a power-of-two alignment, which
//! is how std140-style uniform blocks and dynamically offset sub-ranges are
//! laid out. [`GpuAlignedBuffer`] pairs the host region with a `wgpu::Buffer`
//! and uploads the written prefix when it is unmapped.
//!
//! ```text
//! map_for_write() -> head = 0
//! push / align ...   (host-side only)
//! unmap()          -> queue.write_buffer(0, data[..head])
//! ```

use cgmath::{Matrix4, Vector3, Vector4};
use thiserror::Error;

use crate::gpu::{self, GpuError};

/// Size and alignment of a vec3/vec4/mat4 column in a uniform block.
pub const VEC4_ALIGNMENT: u64 = 16;
/// Alignment of 4-byte scalars.
pub const SCALAR_ALIGNMENT: u64 = 4;

/// What a buffer is bound as. Decides the wgpu usage flags and the device
/// limit its capacity is checked against.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferUsageClass {
    Uniform,
    Vertex,
    Index,
}

impl BufferUsageClass {
    fn wgpu_usage(self) -> wgpu::BufferUsages {
        let usage = match self {
            BufferUsageClass::Uniform => wgpu::BufferUsages::UNIFORM,
            BufferUsageClass::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsageClass::Index => wgpu::BufferUsages::INDEX,
        };
        usage | wgpu::BufferUsages::COPY_DST
    }

    /// Largest buffer of this class the device accepts.
    pub fn device_limit(self, limits: &wgpu::Limits) -> u64 {
        match self {
            BufferUsageClass::Uniform => limits.max_uniform_buffer_binding_size as u64,
            BufferUsageClass::Vertex | BufferUsageClass::Index => limits.max_buffer_size,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("{usage:?} buffer of {requested} bytes exceeds the device limit of {limit} bytes")]
    ExceedsDeviceLimit {
        usage: BufferUsageClass,
        requested: u64,
        limit: u64,
    },
    #[error("writing {size} bytes at offset {offset} exceeds the buffer capacity of {capacity} bytes")]
    CapacityExceeded { offset: u64, size: u64, capacity: u64 },
    #[error("buffer is not mapped for writing")]
    NotMapped,
    #[error("buffer is already mapped")]
    AlreadyMapped,
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Rounds `value` up to a multiple of the power-of-two `alignment`.
pub fn align_to(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two(), "alignment {} is not a power of two", alignment);
    let mask = alignment - 1;
    (value + mask) & !mask
}

/// Host-side append region with a head cursor.
#[derive(Debug, Clone)]
pub struct AlignedBuffer {
    usage: BufferUsageClass,
    data: Vec<u8>,
    head: u64,
    mapped: bool,
}

impl AlignedBuffer {
    pub fn new(capacity: u64, usage: BufferUsageClass) -> Self {
        Self {
            usage,
            data: vec![0; capacity as usize],
            head: 0,
            mapped: false,
        }
    }

    pub fn usage(&self) -> BufferUsageClass {
        self.usage
    }

    pub fn capacity(&self) -> u64 {
        self.data.len() as u64
    }

    /// Bytes written since the last mapping, including alignment padding.
    pub fn head(&self) -> u64 {
        self.head
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// The bytes written so far.
    pub fn written(&self) -> &[u8] {
        &self.data[..self.head as usize]
    }

    /// Starts a write pass. The cursor restarts at 0 since every pass
    /// rewrites its contents from scratch.
    pub fn map_for_write(&mut self) -> Result<(), BufferError> {
        if self.mapped {
            return Err(BufferError::AlreadyMapped);
        }
        self.mapped = true;
        self.head = 0;
        Ok(())
    }

    /// Ends a write pass.
    pub fn unmap(&mut self) -> Result<(), BufferError> {
        if !self.mapped {
            return Err(BufferError::NotMapped);
        }
        self.mapped = false;
        Ok(())
    }

    /// Advances the cursor to the next multiple of `alignment` and returns it.
    pub fn align(&mut self, alignment: u64) -> Result<u64, BufferError> {
        if !self.mapped {
            return Err(BufferError::NotMapped);
        }
        let aligned = align_to(self.head, alignment);
        if aligned > self.capacity() {
            return Err(BufferError::CapacityExceeded {
                offset: aligned,
                size: 0,
                capacity: self.capacity(),
            });
        }
        self.head = aligned;
        Ok(aligned)
    }

    /// Aligns, copies `bytes` at the cursor and advances past them.
    ///
    /// Returns the offset the bytes were written at. On overflow nothing is
    /// written and the cursor does not move.
    pub fn push(&mut self, bytes: &[u8], alignment: u64) -> Result<u64, BufferError> {
        if !self.mapped {
            return Err(BufferError::NotMapped);
        }
        let offset = align_to(self.head, alignment);
        let size = bytes.len() as u64;
        if offset + size > self.capacity() {
            return Err(BufferError::CapacityExceeded {
                offset,
                size,
                capacity: self.capacity(),
            });
        }
        self.data[offset as usize..(offset + size) as usize].copy_from_slice(bytes);
        self.head = offset + size;
        Ok(offset)
    }

    pub fn push_u32(&mut self, value: u32) -> Result<u64, BufferError> {
        self.push(bytemuck::bytes_of(&value), SCALAR_ALIGNMENT)
    }

    pub fn push_f32(&mut self, value: f32) -> Result<u64, BufferError> {
        self.push(bytemuck::bytes_of(&value), SCALAR_ALIGNMENT)
    }

    /// Pushes 12 bytes at a 16-byte boundary; the next scalar may fill the
    /// remaining 4 bytes of the slot.
    pub fn push_vec3(&mut self, value: Vector3<f32>) -> Result<u64, BufferError> {
        let v: [f32; 3] = value.into();
        self.push(bytemuck::cast_slice(&v), VEC4_ALIGNMENT)
    }

    pub fn push_vec4(&mut self, value: Vector4<f32>) -> Result<u64, BufferError> {
        let v: [f32; 4] = value.into();
        self.push(bytemuck::cast_slice(&v), VEC4_ALIGNMENT)
    }

    /// Pushes a column-major 4x4 matrix.
    pub fn push_mat4(&mut self, value: &Matrix4<f32>) -> Result<u64, BufferError> {
        let m: [[f32; 4]; 4] = (*value).into();
        self.push(bytemuck::cast_slice(&m), VEC4_ALIGNMENT)
    }

    /// Pushes a slice of plain-old-data values.
    pub fn push_slice<T: bytemuck::Pod>(&mut self, values: &[T], alignment: u64) -> Result<u64, BufferError> {
        self.push(bytemuck::cast_slice(values), alignment)
    }

    pub fn read_u32(&self, offset: u64) -> Option<u32> {
        self.read_array::<1>(offset).map(|[v]| v.to_bits())
    }

    pub fn read_f32(&self, offset: u64) -> Option<f32> {
        self.read_array::<1>(offset).map(|[v]| v)
    }

    pub fn read_vec3(&self, offset: u64) -> Option<Vector3<f32>> {
        self.read_array::<3>(offset).map(Vector3::from)
    }

    pub fn read_mat4(&self, offset: u64) -> Option<Matrix4<f32>> {
        let m = self.read_array::<16>(offset)?;
        Some(Matrix4::new(
            m[0], m[1], m[2], m[3], m[4], m[5], m[6], m[7], m[8], m[9], m[10], m[11], m[12], m[13], m[14], m[15],
        ))
    }

    fn read_array<const N: usize>(&self, offset: u64) -> Option<[f32; N]> {
        let start = offset as usize;
        let bytes = self.data.get(start..start + N * 4)?;
        let mut out = [0.0f32; N];
        for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Some(out)
    }
}

/// An [`AlignedBuffer`] backed by a `wgpu::Buffer`.
///
/// Writes are staged on the host and uploaded with `Queue::write_buffer` on
/// unmap. The upload never reads the previous contents back, so the driver
/// can rename the storage instead of stalling on in-flight frames.
pub struct GpuAlignedBuffer {
    label: String,
    buffer: wgpu::Buffer,
    host: AlignedBuffer,
}

impl GpuAlignedBuffer {
    /// Allocates `capacity` bytes (rounded up to the copy alignment).
    ///
    /// Fails if the size exceeds the device maximum for the usage class.
    pub fn create(
        device: &wgpu::Device,
        capacity: u64,
        usage: BufferUsageClass,
        label: &str,
    ) -> Result<Self, BufferError> {
        let capacity = align_to(capacity.max(wgpu::COPY_BUFFER_ALIGNMENT), wgpu::COPY_BUFFER_ALIGNMENT);
        let limit = usage.device_limit(&device.limits());
        if capacity > limit {
            return Err(BufferError::ExceedsDeviceLimit {
                usage,
                requested: capacity,
                limit,
            });
        }

        let buffer = gpu::checked(device, label, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: capacity,
                usage: usage.wgpu_usage(),
                mapped_at_creation: false,
            })
        })?;
        log::debug!("Created {:?} buffer '{}' ({} bytes)", usage, label, capacity);

        Ok(Self {
            label: label.to_string(),
            buffer,
            host: AlignedBuffer::new(capacity, usage),
        })
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn host(&self) -> &AlignedBuffer {
        &self.host
    }

    pub fn capacity(&self) -> u64 {
        self.host.capacity()
    }

    /// Starts a write pass and hands out the host region to write into.
    pub fn map_for_write(&mut self) -> Result<&mut AlignedBuffer, BufferError> {
        self.host.map_for_write()?;
        Ok(&mut self.host)
    }

    /// Ends the write pass and uploads everything written in it.
    pub fn unmap(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<(), BufferError> {
        self.host.unmap()?;
        let len = align_to(self.host.head(), wgpu::COPY_BUFFER_ALIGNMENT).min(self.host.capacity());
        if len == 0 {
            return Ok(());
        }
        gpu::checked(device, &self.label, || {
            queue.write_buffer(&self.buffer, 0, &self.host.data[..len as usize]);
        })?;
        Ok(())
    }
}
