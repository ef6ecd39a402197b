use cgmath::{InnerSpace, Vector3};

/// Maximum number of lights the PBR shader's light array holds.
pub const MAX_LIGHTS: usize = 16;

/// Intensity given to lights created without an explicit one.
pub const DEFAULT_LIGHT_INTENSITY: f32 = 60000.0;

/// Discriminant written into each light's `type` field of the global block.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LightType {
    /// Point light (radiates in all directions from a position).
    Point = 0,
    /// Directional light (parallel rays, like sunlight).
    Directional = 1,
}

impl LightType {
    pub const ALL: [LightType; 2] = [LightType::Point, LightType::Directional];

    pub fn label(self) -> &'static str {
        match self {
            LightType::Point => "Point",
            LightType::Directional => "Directional",
        }
    }
}

/// A light source in the scene.
///
/// Every light carries all fields regardless of type, since the parameter
/// block the shader reads has a fixed layout. Point lights ignore
/// `direction`, directional lights ignore `position`.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub light_type: LightType,
    /// Linear RGB.
    pub color: Vector3<f32>,
    pub direction: Vector3<f32>,
    pub position: Vector3<f32>,
    pub intensity: f32,
}

impl Light {
    /// Creates a white point light with the default intensity.
    pub fn point(position: Vector3<f32>) -> Self {
        Self {
            light_type: LightType::Point,
            color: Vector3::new(1.0, 1.0, 1.0),
            direction: Vector3::new(0.0, -1.0, 0.0),
            position,
            intensity: DEFAULT_LIGHT_INTENSITY,
        }
    }

    /// Creates a white directional light. `direction` is normalized.
    pub fn directional(direction: Vector3<f32>) -> Self {
        Self {
            light_type: LightType::Directional,
            color: Vector3::new(1.0, 1.0, 1.0),
            direction: direction.normalize(),
            position: Vector3::new(0.0, 0.0, 0.0),
            intensity: DEFAULT_LIGHT_INTENSITY,
        }
    }

    pub fn with_color(mut self, color: Vector3<f32>) -> Self {
        self.color = color;
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_point_light_defaults() {
        let light = Light::point(Vector3::new(2.5, 3.0, -2.5));
        assert_eq!(light.light_type, LightType::Point);
        assert_eq!(light.color, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(light.intensity, DEFAULT_LIGHT_INTENSITY);
        assert_eq!(light.position, Vector3::new(2.5, 3.0, -2.5));
    }

    #[test]
    fn test_directional_light_is_normalized() {
        let light = Light::directional(Vector3::new(0.0, -4.0, 0.0));
        assert!((light.direction.magnitude() - 1.0).abs() < EPSILON);
        assert_eq!(light.light_type as u32, 1);
    }

    #[test]
    fn test_builders() {
        let light = Light::point(Vector3::new(0.0, 0.0, 0.0))
            .with_color(Vector3::new(1.0, 0.5, 0.25))
            .with_intensity(10.0);
        assert_eq!(light.color, Vector3::new(1.0, 0.5, 0.25));
        assert_eq!(light.intensity, 10.0);
    }
}
