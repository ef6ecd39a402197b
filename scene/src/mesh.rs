use crate::material::MaterialId;

pub type MeshId = usize;
pub type ModelId = usize;

/// Meaning of a vertex attribute. The discriminant is the shader input
/// location the attribute is expected at.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    Position = 0,
    Normal = 1,
    TexCoord = 2,
    Tangent = 3,
}

impl VertexSemantic {
    pub fn location(self) -> u32 {
        self as u32
    }
}

/// One attribute within an interleaved `f32` vertex.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub semantic: VertexSemantic,
    /// Number of `f32` components (1..=4).
    pub components: u32,
    /// Byte offset from the start of the vertex.
    pub offset: u32,
}

/// Interleaved vertex layout of a submesh.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub attributes: Vec<VertexAttribute>,
    /// Bytes per vertex.
    pub stride: u32,
}

impl VertexLayout {
    /// Builds a tightly packed layout from `(semantic, components)` pairs, in order.
    pub fn interleaved(attributes: &[(VertexSemantic, u32)]) -> Self {
        let mut offset = 0;
        let attributes = attributes
            .iter()
            .map(|&(semantic, components)| {
                let attribute = VertexAttribute {
                    semantic,
                    components,
                    offset,
                };
                offset += components * std::mem::size_of::<f32>() as u32;
                attribute
            })
            .collect();
        Self {
            attributes,
            stride: offset,
        }
    }

    /// Finds the attribute feeding a given shader input location.
    pub fn attribute_at(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.semantic.location() == location)
    }

    /// Number of `f32` values per vertex.
    pub fn floats_per_vertex(&self) -> usize {
        self.stride as usize / std::mem::size_of::<f32>()
    }
}

/// A drawable piece of a mesh with a single material.
#[derive(Debug, Clone)]
pub struct Submesh {
    pub layout: VertexLayout,
    /// Interleaved vertex data following `layout`.
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    /// Index into the owning model's material list.
    pub material_index: usize,
}

impl Submesh {
    pub fn vertex_count(&self) -> usize {
        match self.layout.floats_per_vertex() {
            0 => 0,
            n => self.vertices.len() / n,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub submeshes: Vec<Submesh>,
}

/// A mesh together with the materials its submeshes refer to.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub mesh: MeshId,
    pub materials: Vec<MaterialId>,
}

impl Model {
    /// Resolves a submesh's material index to a scene material, if any.
    pub fn material_for(&self, submesh: &Submesh) -> Option<MaterialId> {
        self.materials.get(submesh.material_index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_offsets_and_stride() {
        let layout = VertexLayout::interleaved(&[
            (VertexSemantic::Position, 3),
            (VertexSemantic::Normal, 3),
            (VertexSemantic::TexCoord, 2),
        ]);
        assert_eq!(layout.stride, 32);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[2].offset, 24);
        assert_eq!(layout.floats_per_vertex(), 8);
    }

    #[test]
    fn test_attribute_lookup_by_location() {
        let layout = VertexLayout::interleaved(&[
            (VertexSemantic::TexCoord, 2),
            (VertexSemantic::Position, 3),
        ]);
        let position = layout.attribute_at(0).unwrap();
        assert_eq!(position.semantic, VertexSemantic::Position);
        assert_eq!(position.offset, 8);
        assert!(layout.attribute_at(VertexSemantic::Normal.location()).is_none());
    }

    #[test]
    fn test_vertex_count() {
        let submesh = Submesh {
            layout: VertexLayout::interleaved(&[(VertexSemantic::Position, 3)]),
            vertices: vec![0.0; 9],
            indices: vec![0, 1, 2],
            material_index: 0,
        };
        assert_eq!(submesh.vertex_count(), 3);
    }
}
