use bytemuck::{Pod, Zeroable};
use camoscene_render::Geometry;
use glam::Vec3;
use std::f32::consts::PI;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// CPU-side triangle list, counter-clockwise front faces.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

pub fn tessellate(geometry: &Geometry) -> MeshData {
    match *geometry {
        Geometry::Sphere {
            radius,
            width_segments,
            height_segments,
        } => sphere(radius, width_segments.max(3), height_segments.max(2)),
        Geometry::Box { size } => cuboid(size),
        Geometry::Plane { width, height } => plane(width, height),
    }
}

/// UV sphere. Pole rows emit one triangle per segment.
fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let row = width_segments + 1;

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let (sin_theta, cos_theta) = (v * PI).sin_cos();
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let (sin_phi, cos_phi) = (u * 2.0 * PI).sin_cos();
            let normal = Vec3::new(-cos_phi * sin_theta, cos_theta, sin_phi * sin_theta);
            mesh.vertices.push(Vertex {
                position: (normal * radius).to_array(),
                normal: normal.to_array(),
                uv: [u, v],
            });
        }
    }

    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;
            if iy != 0 {
                mesh.indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                mesh.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    mesh
}

fn cuboid(size: Vec3) -> MeshData {
    let h = size / 2.0;
    // (normal, u axis, v axis) with u x v == normal
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut mesh = MeshData::default();
    for (normal, u_axis, v_axis) in faces {
        let base = mesh.vertices.len() as u32;
        for (s, t) in corners {
            let p = (normal + u_axis * s + v_axis * t) * h;
            mesh.vertices.push(Vertex {
                position: p.to_array(),
                normal: normal.to_array(),
                uv: [(s + 1.0) / 2.0, (1.0 - t) / 2.0],
            });
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    mesh
}

fn plane(width: f32, height: f32) -> MeshData {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let n = [0.0, 0.0, 1.0];
    MeshData {
        vertices: vec![
            Vertex { position: [-hw, -hh, 0.0], normal: n, uv: [0.0, 1.0] },
            Vertex { position: [hw, -hh, 0.0], normal: n, uv: [1.0, 1.0] },
            Vertex { position: [hw, hh, 0.0], normal: n, uv: [1.0, 0.0] },
            Vertex { position: [-hw, hh, 0.0], normal: n, uv: [0.0, 0.0] },
        ],
        indices: vec![0, 1, 2, 2, 3, 0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward_winding(mesh: &MeshData) {
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize]);
            let (pa, pb, pc) = (
                Vec3::from(a.position),
                Vec3::from(b.position),
                Vec3::from(c.position),
            );
            let face = (pb - pa).cross(pc - pa);
            if face.length_squared() < 1e-12 {
                continue;
            }
            let n = Vec3::from(a.normal) + Vec3::from(b.normal) + Vec3::from(c.normal);
            assert!(face.dot(n) > 0.0, "triangle {tri:?} faces inward");
        }
    }

    #[test]
    fn sphere_counts_and_radius() {
        let mesh = tessellate(&Geometry::sphere(2.0));
        assert_eq!(mesh.vertices.len(), 33 * 33);
        assert_eq!(mesh.indices.len(), 6 * 32 * 31);
        for v in &mesh.vertices {
            assert!((Vec3::from(v.position).length() - 2.0).abs() < 1e-4);
            assert!((Vec3::from(v.normal).length() - 1.0).abs() < 1e-4);
        }
        assert_outward_winding(&mesh);
    }

    #[test]
    fn box_faces_point_out() {
        let mesh = tessellate(&Geometry::Box {
            size: Vec3::new(1.0, 2.0, 3.0),
        });
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        for v in &mesh.vertices {
            let p = Vec3::from(v.position).abs();
            assert!(p.abs_diff_eq(Vec3::new(0.5, 1.0, 1.5), 1e-6));
        }
        assert_outward_winding(&mesh);
    }

    #[test]
    fn plane_is_a_quad() {
        let mesh = tessellate(&Geometry::unit_plane());
        assert_eq!(mesh.indices.len(), 6);
        assert_outward_winding(&mesh);
    }

    #[test]
    fn indices_are_in_bounds() {
        for g in [Geometry::sphere(1.0), Geometry::unit_box(), Geometry::unit_plane()] {
            let mesh = tessellate(&g);
            let n = mesh.vertices.len() as u32;
            assert!(mesh.indices.iter().all(|&i| i < n));
        }
    }
}
