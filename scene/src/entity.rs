use cgmath::{Matrix4, Vector3};

use crate::mesh::ModelId;

/// Index of an entity in the scene's entity list.
pub type EntityId = usize;

/// A placed instance of a model.
///
/// Entities form a flat list; there is no parenting.
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub model: ModelId,
    pub position: Vector3<f32>,
    /// Uniform scale factor.
    pub scale: f32,
}

impl Entity {
    pub fn new(name: impl Into<String>, model: ModelId) -> Self {
        Self {
            name: name.into(),
            model,
            position: Vector3::new(0.0, 0.0, 0.0),
            scale: 1.0,
        }
    }

    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.position = position;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// World transform: translation after uniform scale. Rotation is not part
    /// of the per-frame transform.
    pub fn world_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position) * Matrix4::from_scale(self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Point3, Transform};

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_world_matrix_scales_then_translates() {
        let entity = Entity::new("cube", 0)
            .with_position(Vector3::new(5.0, 0.0, 0.0))
            .with_scale(2.0);
        let p = entity.world_matrix().transform_point(Point3::new(1.0, 1.0, 1.0));
        assert!((p.x - 7.0).abs() < EPSILON);
        assert!((p.y - 2.0).abs() < EPSILON);
        assert!((p.z - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_world_matrix_translation_column() {
        let entity = Entity::new("sphere", 1).with_position(Vector3::new(5.0, 0.0, 0.0));
        let m = entity.world_matrix();
        assert_eq!(m.w.x, 5.0);
        assert_eq!(m.w.y, 0.0);
        assert_eq!(m.w.z, 0.0);
        assert_eq!(m.w.w, 1.0);
    }
}
