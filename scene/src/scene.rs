use cgmath::Vector3;

use crate::entity::{Entity, EntityId};
use crate::gltf::ImportedModel;
use crate::light::Light;
use crate::material::{Material, MaterialId};
use crate::mesh::{Mesh, MeshId, Model, ModelId};
use crate::texture::TextureRegistry;

/// Which shading output the PBR pass writes to the screen.
///
/// The discriminant is the selector value the shader reads from the global
/// parameter block.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum RenderTargetMode {
    Albedo = 0,
    Normals = 1,
    Position = 2,
    Depth = 3,
    Metallic = 4,
    Roughness = 5,
    #[default]
    FinalRender = 6,
}

impl RenderTargetMode {
    pub const ALL: [RenderTargetMode; 7] = [
        RenderTargetMode::Albedo,
        RenderTargetMode::Normals,
        RenderTargetMode::Position,
        RenderTargetMode::Depth,
        RenderTargetMode::Metallic,
        RenderTargetMode::Roughness,
        RenderTargetMode::FinalRender,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RenderTargetMode::Albedo => "Albedo",
            RenderTargetMode::Normals => "Normals",
            RenderTargetMode::Position => "Position",
            RenderTargetMode::Depth => "Depth",
            RenderTargetMode::Metallic => "Metallic",
            RenderTargetMode::Roughness => "Roughness",
            RenderTargetMode::FinalRender => "Final Render",
        }
    }
}

/// Everything that gets drawn: a flat entity list, the lights, and the
/// meshes/materials/textures entities refer to.
///
/// Entities are drawn in list order. Ids are indices into the respective
/// lists and stay valid because nothing is ever removed except by
/// [`Scene::clear_entities`].
#[derive(Default)]
pub struct Scene {
    pub entities: Vec<Entity>,
    pub lights: Vec<Light>,
    pub meshes: Vec<Mesh>,
    pub models: Vec<Model>,
    pub materials: Vec<Material>,
    pub textures: TextureRegistry,
    pub render_target_mode: RenderTargetMode,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_model(&mut self, model: Model) -> ModelId {
        self.models.push(model);
        self.models.len() - 1
    }

    /// Adds a mesh drawn with a single material.
    pub fn add_simple_model(&mut self, mesh: Mesh, material: Material) -> ModelId {
        let name = mesh.name.clone();
        let mesh = self.add_mesh(mesh);
        let material = self.add_material(material);
        self.add_model(Model {
            name,
            mesh,
            materials: vec![material],
        })
    }

    /// Registers an imported model's mesh and materials.
    pub fn add_imported(&mut self, imported: ImportedModel) -> ModelId {
        let mesh = self.add_mesh(imported.mesh);
        let materials = imported
            .materials
            .into_iter()
            .map(|m| self.add_material(m))
            .collect();
        self.add_model(Model {
            name: imported.name,
            mesh,
            materials,
        })
    }

    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn entity_position(&self, id: EntityId) -> Option<Vector3<f32>> {
        self.entities.get(id).map(|e| e.position)
    }

    /// Moves an entity. Returns false if the id is unknown.
    pub fn set_entity_position(&mut self, id: EntityId, position: Vector3<f32>) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) => {
                entity.position = position;
                true
            }
            None => false,
        }
    }

    pub fn clear_entities(&mut self) {
        self.entities.clear();
    }

    /// Four white point lights above the origin at (+/-2.5, 3, +/-2.5).
    pub fn add_default_lights(&mut self) {
        for (x, z) in [(-2.5, -2.5), (2.5, -2.5), (-2.5, 2.5), (2.5, 2.5)] {
            self.add_light(Light::point(Vector3::new(x, 3.0, z)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::DEFAULT_LIGHT_INTENSITY;
    use crate::primitives::uv_sphere;

    #[test]
    fn test_render_target_mode_selectors() {
        for (i, mode) in RenderTargetMode::ALL.iter().enumerate() {
            assert_eq!(*mode as u32, i as u32);
        }
        assert_eq!(RenderTargetMode::default(), RenderTargetMode::FinalRender);
    }

    #[test]
    fn test_default_lights() {
        let mut scene = Scene::new();
        scene.add_default_lights();
        assert_eq!(scene.lights.len(), 4);
        for light in &scene.lights {
            assert_eq!(light.intensity, DEFAULT_LIGHT_INTENSITY);
            assert_eq!(light.position.y, 3.0);
            assert_eq!(light.position.x.abs(), 2.5);
            assert_eq!(light.position.z.abs(), 2.5);
        }
    }

    #[test]
    fn test_set_entity_position() {
        let mut scene = Scene::new();
        let model = scene.add_simple_model(uv_sphere(1.0, 8, 4), Material::new("white"));
        let id = scene.add_entity(Entity::new("ball", model));

        assert!(scene.set_entity_position(id, Vector3::new(5.0, 0.0, 0.0)));
        assert_eq!(scene.entity_position(id), Some(Vector3::new(5.0, 0.0, 0.0)));
        assert!(!scene.set_entity_position(id + 1, Vector3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_add_imported_maps_materials() {
        let mut scene = Scene::new();
        scene.add_material(Material::new("existing"));
        let imported = ImportedModel {
            name: "helmet".to_string(),
            mesh: uv_sphere(1.0, 8, 4),
            materials: vec![Material::new("a"), Material::new("b")],
        };
        let model = scene.add_imported(imported);
        assert_eq!(scene.models[model].materials, vec![1, 2]);
        assert_eq!(scene.materials[2].name, "b");
    }
}
