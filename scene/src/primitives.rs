//! Procedural meshes for scenes built without model files.

use std::f32::consts::PI;

use crate::mesh::{Mesh, Submesh, VertexLayout, VertexSemantic};

fn standard_layout() -> VertexLayout {
    VertexLayout::interleaved(&[
        (VertexSemantic::Position, 3),
        (VertexSemantic::Normal, 3),
        (VertexSemantic::TexCoord, 2),
    ])
}

/// A UV sphere centered at the origin, counter-clockwise when seen from outside.
pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Mesh {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut vertices = Vec::new();
    for ring in 0..=rings {
        let phi = PI * ring as f32 / rings as f32;
        let v = ring as f32 / rings as f32;
        for seg in 0..=segments {
            let theta = 2.0 * PI * seg as f32 / segments as f32;
            let u = seg as f32 / segments as f32;
            let (x, y, z) = (phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            vertices.extend_from_slice(&[x * radius, y * radius, z * radius, x, y, z, u, v]);
        }
    }

    let mut indices = Vec::new();
    let verts_per_ring = segments + 1;
    for ring in 0..rings {
        for seg in 0..segments {
            let current = ring * verts_per_ring + seg;
            let next = current + verts_per_ring;
            if ring != 0 {
                indices.extend_from_slice(&[current, current + 1, next]);
            }
            if ring != rings - 1 {
                indices.extend_from_slice(&[current + 1, next + 1, next]);
            }
        }
    }

    Mesh {
        name: "sphere".to_string(),
        submeshes: vec![Submesh {
            layout: standard_layout(),
            vertices,
            indices,
            material_index: 0,
        }],
    }
}

/// A square in the XZ plane facing +Y with side length `size`.
pub fn plane(size: f32) -> Mesh {
    let h = size * 0.5;
    #[rustfmt::skip]
    let vertices = vec![
        -h, 0.0,  h,  0.0, 1.0, 0.0,  0.0, 1.0,
         h, 0.0,  h,  0.0, 1.0, 0.0,  1.0, 1.0,
         h, 0.0, -h,  0.0, 1.0, 0.0,  1.0, 0.0,
        -h, 0.0, -h,  0.0, 1.0, 0.0,  0.0, 0.0,
    ];
    Mesh {
        name: "plane".to_string(),
        submeshes: vec![Submesh {
            layout: standard_layout(),
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
            material_index: 0,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector3};

    fn position(submesh: &Submesh, index: u32) -> Vector3<f32> {
        let base = index as usize * submesh.layout.floats_per_vertex();
        Vector3::new(submesh.vertices[base], submesh.vertices[base + 1], submesh.vertices[base + 2])
    }

    #[test]
    fn test_sphere_triangles_face_outward() {
        let mesh = uv_sphere(1.0, 16, 8);
        let submesh = &mesh.submeshes[0];
        for tri in submesh.indices.chunks_exact(3) {
            let (a, b, c) = (position(submesh, tri[0]), position(submesh, tri[1]), position(submesh, tri[2]));
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0, "triangle {:?} faces inward", tri);
        }
    }

    #[test]
    fn test_sphere_vertices_on_radius() {
        let mesh = uv_sphere(2.0, 8, 4);
        let submesh = &mesh.submeshes[0];
        for i in 0..submesh.vertex_count() as u32 {
            assert!((position(submesh, i).magnitude() - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_plane_faces_up() {
        let mesh = plane(10.0);
        let submesh = &mesh.submeshes[0];
        let (a, b, c) = (position(submesh, 0), position(submesh, 1), position(submesh, 2));
        assert!((b - a).cross(c - a).y > 0.0);
    }
}
