//! Vertex bindings: linking a submesh's attributes to the PBR program's
//! inputs, cached per submesh and shader generation.

use std::collections::HashMap;

use pbr_engine_scene::{MeshId, VertexLayout};
use thiserror::Error;

use crate::shaders::ShaderInput;

/// Identifies one submesh of one mesh.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubmeshKey {
    pub mesh: MeshId,
    pub submesh: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("vertex layout has no attribute for shader input at location {location}")]
    MissingAttribute { location: u32 },
    #[error("shader input at location {location} has {components} components, expected 1 to 4 floats")]
    UnsupportedComponents { location: u32, components: u32 },
    #[error("shader input at location {location} reads {shader} components but the vertex stores {layout}")]
    ComponentMismatch { location: u32, shader: u32, layout: u32 },
}

fn float_format(location: u32, components: u32) -> Result<wgpu::VertexFormat, LinkError> {
    match components {
        1 => Ok(wgpu::VertexFormat::Float32),
        2 => Ok(wgpu::VertexFormat::Float32x2),
        3 => Ok(wgpu::VertexFormat::Float32x3),
        4 => Ok(wgpu::VertexFormat::Float32x4),
        _ => Err(LinkError::UnsupportedComponents { location, components }),
    }
}

/// Matches every shader input to the layout attribute at the same location.
///
/// Attributes the shader does not read are left out. The format follows the
/// shader's component count, which may be fewer than the attribute stores.
pub fn link_attributes(layout: &VertexLayout, inputs: &[ShaderInput]) -> Result<Vec<wgpu::VertexAttribute>, LinkError> {
    inputs
        .iter()
        .map(|input| {
            let attribute = layout
                .attribute_at(input.location)
                .ok_or(LinkError::MissingAttribute {
                    location: input.location,
                })?;
            if input.components > attribute.components {
                return Err(LinkError::ComponentMismatch {
                    location: input.location,
                    shader: input.components,
                    layout: attribute.components,
                });
            }
            Ok(wgpu::VertexAttribute {
                format: float_format(input.location, input.components)?,
                offset: attribute.offset as wgpu::BufferAddress,
                shader_location: input.location,
            })
        })
        .collect()
}

/// Values derived from a submesh and a shader generation.
///
/// A lookup with a newer generation never returns an entry built for an
/// older one; [`purge_stale`](Self::purge_stale) drops those entries.
pub struct BindingCache<T> {
    entries: HashMap<(SubmeshKey, u64), T>,
}

impl<T> Default for BindingCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> BindingCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: SubmeshKey, generation: u64) -> Option<&T> {
        self.entries.get(&(key, generation))
    }

    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: SubmeshKey,
        generation: u64,
        create: impl FnOnce() -> Result<T, E>,
    ) -> Result<&T, E> {
        use std::collections::hash_map::Entry;
        match self.entries.entry((key, generation)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(create()?)),
        }
    }

    /// Drops entries built for any generation other than `generation`.
    /// Returns how many were removed.
    pub fn purge_stale(&mut self, generation: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, g), _| *g == generation);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbr_engine_scene::VertexSemantic;

    fn full_layout() -> VertexLayout {
        VertexLayout::interleaved(&[
            (VertexSemantic::Position, 3),
            (VertexSemantic::Normal, 3),
            (VertexSemantic::TexCoord, 2),
            (VertexSemantic::Tangent, 4),
        ])
    }

    fn pbr_inputs() -> Vec<ShaderInput> {
        vec![
            ShaderInput { location: 0, components: 3 },
            ShaderInput { location: 1, components: 3 },
            ShaderInput { location: 2, components: 2 },
        ]
    }

    const KEY: SubmeshKey = SubmeshKey { mesh: 0, submesh: 1 };

    #[test]
    fn test_link_uses_layout_offsets() {
        let attributes = link_attributes(&full_layout(), &pbr_inputs()).unwrap();
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[0].format, wgpu::VertexFormat::Float32x3);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[2].offset, 24);
        assert_eq!(attributes[2].format, wgpu::VertexFormat::Float32x2);
        assert_eq!(attributes[2].shader_location, 2);
    }

    #[test]
    fn test_link_skips_unused_attributes() {
        let attributes = link_attributes(&full_layout(), &pbr_inputs()).unwrap();
        assert!(attributes.iter().all(|a| a.shader_location != VertexSemantic::Tangent.location()));
    }

    #[test]
    fn test_link_missing_attribute() {
        let layout = VertexLayout::interleaved(&[(VertexSemantic::Position, 3), (VertexSemantic::Normal, 3)]);
        assert_eq!(
            link_attributes(&layout, &pbr_inputs()),
            Err(LinkError::MissingAttribute { location: 2 })
        );
    }

    #[test]
    fn test_link_rejects_wider_input() {
        let layout = VertexLayout::interleaved(&[(VertexSemantic::Position, 2)]);
        let inputs = [ShaderInput { location: 0, components: 3 }];
        assert_eq!(
            link_attributes(&layout, &inputs),
            Err(LinkError::ComponentMismatch {
                location: 0,
                shader: 3,
                layout: 2
            })
        );
    }

    #[test]
    fn test_cache_reuses_entry_within_generation() {
        let mut cache: BindingCache<u32> = BindingCache::new();
        let mut created = 0;
        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with::<()>(KEY, 0, || {
                    created += 1;
                    Ok(7)
                })
                .unwrap();
            assert_eq!(*value, 7);
        }
        assert_eq!(created, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_misses_after_generation_bump() {
        let mut cache: BindingCache<u32> = BindingCache::new();
        cache.get_or_try_insert_with::<()>(KEY, 0, || Ok(1)).unwrap();
        assert!(cache.get(KEY, 1).is_none());

        let value = cache.get_or_try_insert_with::<()>(KEY, 1, || Ok(2)).unwrap();
        assert_eq!(*value, 2);
        assert_eq!(cache.purge_stale(1), 1);
        assert!(cache.get(KEY, 0).is_none());
        assert_eq!(cache.get(KEY, 1), Some(&2));
    }

    #[test]
    fn test_cache_failed_insert_leaves_no_entry() {
        let mut cache: BindingCache<u32> = BindingCache::new();
        let result = cache.get_or_try_insert_with(KEY, 0, || Err(LinkError::MissingAttribute { location: 1 }));
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
