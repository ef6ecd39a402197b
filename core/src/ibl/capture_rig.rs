//! Six-face capture camera for rendering into cubemaps.

use cgmath::{Deg, Matrix4, Point3, Vector3};
use pbr_engine_scene::OPENGL_TO_WGPU_MATRIX;

/// Flips clip-space Y.
///
/// The face views below follow the OpenGL cube-face conventions, where
/// texel row 0 is the bottom of the framebuffer. wgpu render targets put row
/// 0 at the top, so captured faces are flipped vertically to land in the
/// orientation the cube sampler expects. The flip reverses triangle winding,
/// so capture pipelines draw without culling.
#[rustfmt::skip]
const FLIP_Y: Matrix4<f32> = Matrix4::new(
    1.0,  0.0, 0.0, 0.0,
    0.0, -1.0, 0.0, 0.0,
    0.0,  0.0, 1.0, 0.0,
    0.0,  0.0, 0.0, 1.0,
);

pub const CAPTURE_FOV_DEGREES: f32 = 90.0;
pub const CAPTURE_NEAR: f32 = 0.1;
pub const CAPTURE_FAR: f32 = 10.0;

/// Cubemap faces in array-layer order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CubeFace {
    PositiveX = 0,
    NegativeX = 1,
    PositiveY = 2,
    NegativeY = 3,
    PositiveZ = 4,
    NegativeZ = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn layer(self) -> u32 {
        self as u32
    }

    /// World axis the face looks along.
    pub fn direction(self) -> Vector3<f32> {
        match self {
            CubeFace::PositiveX => Vector3::unit_x(),
            CubeFace::NegativeX => -Vector3::unit_x(),
            CubeFace::PositiveY => Vector3::unit_y(),
            CubeFace::NegativeY => -Vector3::unit_y(),
            CubeFace::PositiveZ => Vector3::unit_z(),
            CubeFace::NegativeZ => -Vector3::unit_z(),
        }
    }

    /// Up vector for the face's look-at. The Y faces cannot use a Y up
    /// vector, so they take one along Z.
    pub fn up(self) -> Vector3<f32> {
        match self {
            CubeFace::PositiveY => Vector3::unit_z(),
            CubeFace::NegativeY => -Vector3::unit_z(),
            _ => -Vector3::unit_y(),
        }
    }
}

/// Fixed projection plus one view per cube face, shared by every IBL stage.
#[derive(Debug, Clone)]
pub struct CaptureRig {
    projection: Matrix4<f32>,
    views: [Matrix4<f32>; 6],
}

impl CaptureRig {
    pub fn new() -> Self {
        let origin = Point3::new(0.0, 0.0, 0.0);
        let projection = OPENGL_TO_WGPU_MATRIX
            * FLIP_Y
            * cgmath::perspective(Deg(CAPTURE_FOV_DEGREES), 1.0, CAPTURE_NEAR, CAPTURE_FAR);
        let views = CubeFace::ALL.map(|face| Matrix4::look_at_rh(origin, origin + face.direction(), face.up()));
        Self { projection, views }
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection
    }

    pub fn view(&self, face: CubeFace) -> Matrix4<f32> {
        self.views[face as usize]
    }

    pub fn view_projection(&self, face: CubeFace) -> Matrix4<f32> {
        self.projection * self.view(face)
    }
}

impl Default for CaptureRig {
    fn default() -> Self {
        Self::new()
    }
}

/// Unit cube as 36 positions (12 triangles), drawn around the capture camera.
#[rustfmt::skip]
pub const UNIT_CUBE_POSITIONS: [[f32; 3]; 36] = [
    // -Z
    [-1.0, -1.0, -1.0], [ 1.0,  1.0, -1.0], [ 1.0, -1.0, -1.0],
    [ 1.0,  1.0, -1.0], [-1.0, -1.0, -1.0], [-1.0,  1.0, -1.0],
    // +Z
    [-1.0, -1.0,  1.0], [ 1.0, -1.0,  1.0], [ 1.0,  1.0,  1.0],
    [ 1.0,  1.0,  1.0], [-1.0,  1.0,  1.0], [-1.0, -1.0,  1.0],
    // -X
    [-1.0,  1.0,  1.0], [-1.0,  1.0, -1.0], [-1.0, -1.0, -1.0],
    [-1.0, -1.0, -1.0], [-1.0, -1.0,  1.0], [-1.0,  1.0,  1.0],
    // +X
    [ 1.0,  1.0,  1.0], [ 1.0, -1.0, -1.0], [ 1.0,  1.0, -1.0],
    [ 1.0, -1.0, -1.0], [ 1.0,  1.0,  1.0], [ 1.0, -1.0,  1.0],
    // -Y
    [-1.0, -1.0, -1.0], [ 1.0, -1.0, -1.0], [ 1.0, -1.0,  1.0],
    [ 1.0, -1.0,  1.0], [-1.0, -1.0,  1.0], [-1.0, -1.0, -1.0],
    // +Y
    [-1.0,  1.0, -1.0], [ 1.0,  1.0,  1.0], [ 1.0,  1.0, -1.0],
    [ 1.0,  1.0,  1.0], [-1.0,  1.0, -1.0], [-1.0,  1.0,  1.0],
];
