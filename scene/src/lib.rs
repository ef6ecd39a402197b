//! GPU-free scene data for the PBR engine.
//!
//! Everything in this crate can be created and edited without a wgpu device:
//! the fly camera, lights, the flat entity list, meshes with their vertex
//! layouts, materials and decoded textures. The `pbr-engine` crate uploads
//! and draws it.

pub mod camera;
pub mod entity;
pub mod gltf;
pub mod light;
pub mod material;
pub mod mesh;
pub mod primitives;
mod scene;
pub mod texture;

pub use camera::{CameraMovement, FlyCamera, OPENGL_TO_WGPU_MATRIX};
pub use entity::{Entity, EntityId};
pub use self::gltf::{import_gltf, ImportedModel};
pub use light::{Light, LightType, DEFAULT_LIGHT_INTENSITY, MAX_LIGHTS};
pub use material::{Material, MaterialId};
pub use mesh::{Mesh, MeshId, Model, ModelId, Submesh, VertexAttribute, VertexLayout, VertexSemantic};
pub use scene::{RenderTargetMode, Scene};
pub use texture::{decode_texture, TextureData, TextureId, TextureRegistry};
