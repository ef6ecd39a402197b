//! Scene meshes packed into one vertex and one index buffer.

use pbr_engine_scene::Mesh;

use crate::buffer::{AlignedBuffer, BufferError, BufferUsageClass, GpuAlignedBuffer, SCALAR_ALIGNMENT};

use super::binding_cache::SubmeshKey;

/// Where one submesh lives in the packed buffers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SubmeshRange {
    pub vertex_offset: u64,
    pub vertex_size: u64,
    pub index_offset: u64,
    pub index_count: u32,
}

impl SubmeshRange {
    pub fn index_size(&self) -> u64 {
        self.index_count as u64 * std::mem::size_of::<u32>() as u64
    }
}

/// Bytes needed for all vertex and index data, including alignment padding.
pub fn packed_sizes(meshes: &[Mesh]) -> (u64, u64) {
    let mut vertices = 0;
    let mut indices = 0;
    for submesh in meshes.iter().flat_map(|m| &m.submeshes) {
        vertices += std::mem::size_of_val(submesh.vertices.as_slice()) as u64;
        indices += std::mem::size_of_val(submesh.indices.as_slice()) as u64;
    }
    (vertices, indices)
}

/// Appends every submesh to the two mapped buffers. `ranges[mesh][submesh]`
/// locates the data afterwards.
pub fn write_meshes(
    meshes: &[Mesh],
    vertex_buffer: &mut AlignedBuffer,
    index_buffer: &mut AlignedBuffer,
) -> Result<Vec<Vec<SubmeshRange>>, BufferError> {
    let mut ranges = Vec::with_capacity(meshes.len());
    for mesh in meshes {
        let mut submeshes = Vec::with_capacity(mesh.submeshes.len());
        for submesh in &mesh.submeshes {
            let vertex_offset = vertex_buffer.push_slice(&submesh.vertices, SCALAR_ALIGNMENT)?;
            let index_offset = index_buffer.push_slice(&submesh.indices, SCALAR_ALIGNMENT)?;
            submeshes.push(SubmeshRange {
                vertex_offset,
                vertex_size: vertex_buffer.head() - vertex_offset,
                index_offset,
                index_count: submesh.indices.len() as u32,
            });
        }
        ranges.push(submeshes);
    }
    Ok(ranges)
}

/// GPU copies of the scene's meshes.
///
/// Meshes are only ever appended to a scene, so the buffers are rebuilt
/// whenever the mesh count changes.
#[derive(Default)]
pub struct GpuMeshes {
    buffers: Option<(GpuAlignedBuffer, GpuAlignedBuffer)>,
    ranges: Vec<Vec<SubmeshRange>>,
}

impl GpuMeshes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mesh_count(&self) -> usize {
        self.ranges.len()
    }

    /// Rebuilds the buffers if `meshes` changed length. Returns true on rebuild.
    pub fn sync(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, meshes: &[Mesh]) -> Result<bool, BufferError> {
        if meshes.len() == self.ranges.len() {
            return Ok(false);
        }
        let (vertex_bytes, index_bytes) = packed_sizes(meshes);
        let mut vertices = GpuAlignedBuffer::create(device, vertex_bytes, BufferUsageClass::Vertex, "Mesh Vertices")?;
        let mut indices = GpuAlignedBuffer::create(device, index_bytes, BufferUsageClass::Index, "Mesh Indices")?;

        let ranges = write_meshes(meshes, vertices.map_for_write()?, indices.map_for_write()?);
        vertices.unmap(device, queue)?;
        indices.unmap(device, queue)?;
        self.ranges = ranges?;
        self.buffers = Some((vertices, indices));
        log::debug!(
            "Uploaded {} meshes ({} vertex bytes, {} index bytes)",
            meshes.len(),
            vertex_bytes,
            index_bytes
        );
        Ok(true)
    }

    pub fn range(&self, key: SubmeshKey) -> Option<SubmeshRange> {
        self.ranges.get(key.mesh)?.get(key.submesh).copied()
    }

    /// Binds a submesh's vertex and index data at slot 0.
    pub fn bind<'p>(&self, pass: &mut wgpu::RenderPass<'p>, range: &SubmeshRange) -> bool {
        let Some((vertices, indices)) = &self.buffers else {
            return false;
        };
        if range.vertex_size == 0 || range.index_count == 0 {
            return false;
        }
        pass.set_vertex_buffer(
            0,
            vertices
                .buffer()
                .slice(range.vertex_offset..range.vertex_offset + range.vertex_size),
        );
        pass.set_index_buffer(
            indices
                .buffer()
                .slice(range.index_offset..range.index_offset + range.index_size()),
            wgpu::IndexFormat::Uint32,
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbr_engine_scene::primitives;

    fn mapped(capacity: u64, usage: BufferUsageClass) -> AlignedBuffer {
        let mut buffer = AlignedBuffer::new(capacity, usage);
        buffer.map_for_write().unwrap();
        buffer
    }

    #[test]
    fn test_write_meshes_ranges_are_contiguous() {
        let meshes = vec![primitives::uv_sphere(1.0, 8, 4), primitives::plane(2.0)];
        let (vertex_bytes, index_bytes) = packed_sizes(&meshes);
        let mut vertices = mapped(vertex_bytes, BufferUsageClass::Vertex);
        let mut indices = mapped(index_bytes, BufferUsageClass::Index);

        let ranges = write_meshes(&meshes, &mut vertices, &mut indices).unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(vertices.head(), vertex_bytes);
        assert_eq!(indices.head(), index_bytes);

        let flat: Vec<_> = ranges.iter().flatten().collect();
        assert_eq!(flat[0].vertex_offset, 0);
        for pair in flat.windows(2) {
            assert_eq!(pair[1].vertex_offset, pair[0].vertex_offset + pair[0].vertex_size);
            assert_eq!(pair[1].index_offset, pair[0].index_offset + pair[0].index_size());
        }
    }

    #[test]
    fn test_index_counts_match_submeshes() {
        let meshes = vec![primitives::plane(1.0)];
        let (vertex_bytes, index_bytes) = packed_sizes(&meshes);
        let mut vertices = mapped(vertex_bytes, BufferUsageClass::Vertex);
        let mut indices = mapped(index_bytes, BufferUsageClass::Index);
        let ranges = write_meshes(&meshes, &mut vertices, &mut indices).unwrap();
        assert_eq!(ranges[0][0].index_count as usize, meshes[0].submeshes[0].indices.len());
        assert_eq!(indices.read_u32(0), Some(meshes[0].submeshes[0].indices[0]));
    }

    #[test]
    fn test_undersized_buffer_fails() {
        let meshes = vec![primitives::plane(1.0)];
        let (vertex_bytes, index_bytes) = packed_sizes(&meshes);
        let mut vertices = mapped(vertex_bytes - 4, BufferUsageClass::Vertex);
        let mut indices = mapped(index_bytes, BufferUsageClass::Index);
        assert!(matches!(
            write_meshes(&meshes, &mut vertices, &mut indices),
            Err(BufferError::CapacityExceeded { .. })
        ));
    }
}
