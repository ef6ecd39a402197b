use cgmath::{Deg, InnerSpace, Matrix4, Point3, Vector3};

/// Matrix to convert from OpenGL clip-space depth [-1, 1] to WGPU depth [0, 1].
///
/// cgmath builds OpenGL-style projections; wgpu expects depth in [0, 1].
/// This matrix remaps Z: `z' = 0.5 * z + 0.5`
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const DEFAULT_YAW: f32 = -90.0;
const DEFAULT_PITCH: f32 = 0.0;
const DEFAULT_SPEED: f32 = 2.5;
const DEFAULT_SENSITIVITY: f32 = 0.1;
const DEFAULT_ZOOM: f32 = 45.0;

const PITCH_LIMIT: f32 = 89.0;
const MIN_ZOOM: f32 = 1.0;
const MAX_ZOOM: f32 = 45.0;

/// Direction of a keyboard-driven camera move.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// A first-person fly camera driven by yaw/pitch angles.
///
/// `zoom` is the vertical field of view in degrees; scrolling narrows it.
/// The camera basis (`front`, `right`, `up`) is recomputed whenever the
/// angles change.
#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub position: Point3<f32>,
    front: Vector3<f32>,
    up: Vector3<f32>,
    right: Vector3<f32>,
    world_up: Vector3<f32>,
    /// Rotation around the world up axis, in degrees.
    pub yaw: f32,
    /// Elevation angle in degrees, clamped to +/-89.
    pub pitch: f32,
    /// Units per second.
    pub movement_speed: f32,
    pub mouse_sensitivity: f32,
    pub zoom: f32,
    /// Viewport width / height.
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl FlyCamera {
    pub fn new(position: Point3<f32>, aspect: f32) -> Self {
        let mut camera = Self {
            position,
            front: Vector3::new(0.0, 0.0, -1.0),
            up: Vector3::unit_y(),
            right: Vector3::unit_x(),
            world_up: Vector3::unit_y(),
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            movement_speed: DEFAULT_SPEED,
            mouse_sensitivity: DEFAULT_SENSITIVITY,
            zoom: DEFAULT_ZOOM,
            aspect,
            znear: 0.1,
            zfar: 1000.0,
        };
        camera.update_vectors();
        camera
    }

    pub fn front(&self) -> Vector3<f32> {
        self.front
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    /// World-to-view transform.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// View-to-clip transform with wgpu depth range.
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(Deg(self.zoom), self.aspect, self.znear, self.zfar)
    }

    /// Moves the camera along its basis vectors, scaled by elapsed seconds.
    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_seconds: f32) {
        let velocity = self.movement_speed * delta_seconds;
        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position -= self.front * velocity,
            CameraMovement::Left => self.position -= self.right * velocity,
            CameraMovement::Right => self.position += self.right * velocity,
        }
    }

    /// Applies a mouse delta in pixels. Positive `y_offset` looks up.
    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch = (self.pitch + y_offset * self.mouse_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    /// Narrows (positive) or widens (negative) the field of view.
    pub fn process_mouse_scroll(&mut self, y_offset: f32) {
        self.zoom = (self.zoom - y_offset).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vector3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self::new(Point3::new(0.0, 0.0, 3.0), 16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Transform};

    const EPSILON: f32 = 1e-5;

    fn assert_vec_eq(actual: Vector3<f32>, expected: Vector3<f32>) {
        assert!(
            (actual - expected).magnitude() < EPSILON,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn test_default_basis_looks_down_negative_z() {
        let camera = FlyCamera::default();
        assert_vec_eq(camera.front(), Vector3::new(0.0, 0.0, -1.0));
        assert_vec_eq(camera.right(), Vector3::new(1.0, 0.0, 0.0));
        assert_vec_eq(camera.up(), Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_keyboard_moves_along_front() {
        let mut camera = FlyCamera::new(Point3::new(0.0, 0.0, 0.0), 1.0);
        camera.process_keyboard(CameraMovement::Forward, 2.0);
        assert_vec_eq(camera.position - Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, -5.0));

        camera.process_keyboard(CameraMovement::Right, 1.0);
        assert!((camera.position.x - 2.5).abs() < EPSILON);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = FlyCamera::default();
        camera.process_mouse_movement(0.0, 10_000.0);
        assert!((camera.pitch - PITCH_LIMIT).abs() < EPSILON);

        camera.process_mouse_movement(0.0, -20_000.0);
        assert!((camera.pitch + PITCH_LIMIT).abs() < EPSILON);
    }

    #[test]
    fn test_yaw_turns_front() {
        let mut camera = FlyCamera::default();
        // 900 px * 0.1 = 90 degrees, from -90 to 0
        camera.process_mouse_movement(900.0, 0.0);
        assert_vec_eq(camera.front(), Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = FlyCamera::default();
        camera.process_mouse_scroll(100.0);
        assert_eq!(camera.zoom, MIN_ZOOM);
        camera.process_mouse_scroll(-100.0);
        assert_eq!(camera.zoom, MAX_ZOOM);
    }

    #[test]
    fn test_view_matrix_maps_position_to_origin() {
        let camera = FlyCamera::new(Point3::new(1.0, 2.0, 3.0), 1.0);
        let origin = camera.view_matrix().transform_point(camera.position);
        assert!(origin.x.abs() < EPSILON && origin.y.abs() < EPSILON && origin.z.abs() < EPSILON);
    }

    #[test]
    fn test_projection_depth_range_is_zero_to_one() {
        let camera = FlyCamera::new(Point3::new(0.0, 0.0, 0.0), 1.0);
        let proj = camera.projection_matrix();
        assert!(proj.invert().is_some());

        let near = proj.transform_point(Point3::new(0.0, 0.0, -camera.znear));
        let far = proj.transform_point(Point3::new(0.0, 0.0, -camera.zfar));
        assert!(near.z.abs() < 1e-3);
        assert!((far.z - 1.0).abs() < 1e-3);
    }
}
