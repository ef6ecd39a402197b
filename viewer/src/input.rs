use pbr_engine::scene::{CameraMovement, FlyCamera};
use winit::event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pixels of a trackpad scroll that count as one wheel line.
const PIXELS_PER_LINE: f32 = 50.0;

/// Window input reduced to what the camera needs each frame.
///
/// Held keys persist across frames; mouse motion and scroll accumulate
/// until [`apply`](Self::apply) consumes them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InputState {
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    /// Right mouse button held: movement and mouse look are active.
    looking: bool,
    mouse_delta: (f32, f32),
    scroll: f32,
    quit_requested: bool,
}

impl InputState {
    pub fn is_looking(&self) -> bool {
        self.looking
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        match key {
            KeyCode::KeyW => self.forward = pressed,
            KeyCode::KeyS => self.backward = pressed,
            KeyCode::KeyA => self.left = pressed,
            KeyCode::KeyD => self.right = pressed,
            KeyCode::Escape if pressed => self.quit_requested = true,
            _ => {}
        }
    }

    pub fn set_looking(&mut self, looking: bool) {
        self.looking = looking;
        if !looking {
            self.mouse_delta = (0.0, 0.0);
        }
    }

    pub fn add_mouse_delta(&mut self, dx: f32, dy: f32) {
        if self.looking {
            self.mouse_delta.0 += dx;
            self.mouse_delta.1 += dy;
        }
    }

    pub fn add_scroll(&mut self, lines: f32) {
        self.scroll += lines;
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.set_key(code, event.state == ElementState::Pressed);
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Right,
                ..
            } => self.set_looking(*state == ElementState::Pressed),
            WindowEvent::MouseWheel { delta, .. } => match delta {
                MouseScrollDelta::LineDelta(_, y) => self.add_scroll(*y),
                MouseScrollDelta::PixelDelta(position) => self.add_scroll(position.y as f32 / PIXELS_PER_LINE),
            },
            WindowEvent::Focused(false) => {
                *self = Self {
                    quit_requested: self.quit_requested,
                    ..Self::default()
                };
            }
            _ => {}
        }
    }

    /// Raw mouse motion, unaffected by cursor position or window edges.
    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.add_mouse_delta(delta.0 as f32, delta.1 as f32);
        }
    }

    /// Moves and turns the camera, then clears the accumulated deltas.
    pub fn apply(&mut self, camera: &mut FlyCamera, delta_seconds: f32) {
        if self.looking {
            let moves = [
                (self.forward, CameraMovement::Forward),
                (self.backward, CameraMovement::Backward),
                (self.left, CameraMovement::Left),
                (self.right, CameraMovement::Right),
            ];
            for (held, movement) in moves {
                if held {
                    camera.process_keyboard(movement, delta_seconds);
                }
            }
            let (dx, dy) = self.mouse_delta;
            if dx != 0.0 || dy != 0.0 {
                // Screen y grows downwards.
                camera.process_mouse_movement(dx, -dy);
            }
        }
        if self.scroll != 0.0 {
            camera.process_mouse_scroll(self.scroll);
        }
        self.mouse_delta = (0.0, 0.0);
        self.scroll = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{MetricSpace, Point3};

    const EPSILON: f32 = 1e-4;

    fn camera() -> FlyCamera {
        FlyCamera::new(Point3::new(0.0, 0.0, 3.0), 1.0)
    }

    #[test]
    fn test_movement_requires_right_button() {
        let mut input = InputState::default();
        let mut cam = camera();
        input.set_key(KeyCode::KeyW, true);
        input.apply(&mut cam, 1.0);
        assert!(cam.position.distance(Point3::new(0.0, 0.0, 3.0)) < EPSILON);

        input.set_looking(true);
        input.apply(&mut cam, 1.0);
        // Default yaw looks down -Z.
        assert!((cam.position.z - (3.0 - cam.movement_speed)).abs() < EPSILON);
    }

    #[test]
    fn test_mouse_delta_is_consumed() {
        let mut input = InputState::default();
        let mut cam = camera();
        input.set_looking(true);
        input.add_mouse_delta(10.0, 0.0);
        input.apply(&mut cam, 0.0);
        let yaw = cam.yaw;
        assert!((yaw - (-90.0 + 10.0 * cam.mouse_sensitivity)).abs() < EPSILON);

        input.apply(&mut cam, 0.0);
        assert!((cam.yaw - yaw).abs() < EPSILON);
    }

    #[test]
    fn test_mouse_up_looks_up() {
        let mut input = InputState::default();
        let mut cam = camera();
        input.set_looking(true);
        input.add_mouse_delta(0.0, -20.0);
        input.apply(&mut cam, 0.0);
        assert!(cam.pitch > 0.0);
    }

    #[test]
    fn test_motion_ignored_while_not_looking() {
        let mut input = InputState::default();
        input.add_mouse_delta(5.0, 5.0);
        assert_eq!(input, InputState::default());
    }

    #[test]
    fn test_scroll_zooms_without_looking() {
        let mut input = InputState::default();
        let mut cam = camera();
        let zoom = cam.zoom;
        input.add_scroll(5.0);
        input.apply(&mut cam, 0.0);
        assert!((cam.zoom - (zoom - 5.0)).abs() < EPSILON);
    }

    #[test]
    fn test_escape_requests_quit() {
        let mut input = InputState::default();
        input.set_key(KeyCode::Escape, false);
        assert!(!input.quit_requested());
        input.set_key(KeyCode::Escape, true);
        assert!(input.quit_requested());
    }
}
