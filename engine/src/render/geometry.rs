//! Geometry Descriptions
//!
//! Shapes handed to [`GpuContext::create_mesh`](super::GpuContext::create_mesh)
//! and the CPU-side mesh building behind them. All shapes are built in local
//! space with +Z up; placement happens through the drawable transform.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

/// Vertex layout shared by every mesh pipeline.
///
/// Layout (32 bytes):
/// - position: vec3<f32> (12 bytes)
/// - normal: vec3<f32> (12 bytes)
/// - uv: vec2<f32> (8 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

static_assertions::assert_eq_size!(MeshVertex, [u8; 32]);

/// How a mesh's indices are assembled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
    Triangles,
    Points,
}

/// A shape to build a drawable from.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// Flat grid in the XY plane centred on the origin.
    Plane {
        width: f32,
        height: f32,
        width_segments: u32,
        height_segments: u32,
    },
    /// UV sphere centred on the origin.
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    /// Cone standing on the XY plane, apex at +Z.
    Cone {
        radius: f32,
        height: f32,
        segments: u32,
    },
    /// Loose points (rendered with point topology).
    Points { positions: Vec<Vec3> },
}

impl Geometry {
    pub fn topology(&self) -> Topology {
        match self {
            Geometry::Points { .. } => Topology::Points,
            _ => Topology::Triangles,
        }
    }
}

/// CPU mesh ready for upload.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, position: Vec3, normal: Vec3, uv: Vec2) -> u32 {
        let idx = self.vertices.len() as u32;
        self.vertices.push(MeshVertex {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
        });
        idx
    }
}

/// Build the CPU mesh for `geometry`.
pub fn build_mesh(geometry: &Geometry) -> MeshData {
    match geometry {
        Geometry::Plane {
            width,
            height,
            width_segments,
            height_segments,
        } => build_plane(*width, *height, *width_segments, *height_segments),
        Geometry::Sphere {
            radius,
            width_segments,
            height_segments,
        } => build_sphere(*radius, *width_segments, *height_segments),
        Geometry::Cone {
            radius,
            height,
            segments,
        } => build_cone(*radius, *height, *segments),
        Geometry::Points { positions } => build_points(positions),
    }
}

fn build_plane(width: f32, height: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let segs_x = width_segments.max(1);
    let segs_y = height_segments.max(1);
    let mut mesh = MeshData::new();

    for iy in 0..=segs_y {
        let v = iy as f32 / segs_y as f32;
        for ix in 0..=segs_x {
            let u = ix as f32 / segs_x as f32;
            let position = Vec3::new((u - 0.5) * width, (v - 0.5) * height, 0.0);
            mesh.push(position, Vec3::Z, Vec2::new(u, v));
        }
    }

    let row = segs_x + 1;
    for iy in 0..segs_y {
        for ix in 0..segs_x {
            let a = iy * row + ix;
            let b = a + 1;
            let c = a + row;
            let d = c + 1;
            mesh.indices.extend_from_slice(&[a, b, d, a, d, c]);
        }
    }

    mesh
}

fn build_sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let segs_w = width_segments.max(3);
    let segs_h = height_segments.max(2);
    let mut mesh = MeshData::new();

    for iy in 0..=segs_h {
        let v = iy as f32 / segs_h as f32;
        let polar = v * PI;
        for ix in 0..=segs_w {
            let u = ix as f32 / segs_w as f32;
            let azimuth = u * TAU;
            let normal = Vec3::new(
                polar.sin() * azimuth.cos(),
                polar.sin() * azimuth.sin(),
                polar.cos(),
            );
            mesh.push(normal * radius, normal, Vec2::new(u, v));
        }
    }

    let row = segs_w + 1;
    for iy in 0..segs_h {
        for ix in 0..segs_w {
            let a = iy * row + ix;
            let b = a + 1;
            let c = a + row;
            let d = c + 1;
            if iy != 0 {
                mesh.indices.extend_from_slice(&[a, c, b]);
            }
            if iy != segs_h - 1 {
                mesh.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    mesh
}

fn build_cone(radius: f32, height: f32, segments: u32) -> MeshData {
    let segments = segments.max(3);
    let mut mesh = MeshData::new();

    // Side ring
    let ring_start = mesh.vertices.len() as u32;
    for i in 0..segments {
        let angle = i as f32 * TAU / segments as f32;
        let (sin, cos) = angle.sin_cos();
        let normal = Vec3::new(cos, sin, radius / height.max(f32::EPSILON)).normalize();
        mesh.push(
            Vec3::new(cos * radius, sin * radius, 0.0),
            normal,
            Vec2::new(i as f32 / segments as f32, 0.0),
        );
    }
    let apex = mesh.push(Vec3::new(0.0, 0.0, height), Vec3::Z, Vec2::new(0.5, 1.0));
    for i in 0..segments {
        let i0 = ring_start + i;
        let i1 = ring_start + (i + 1) % segments;
        mesh.indices.extend_from_slice(&[i0, i1, apex]);
    }

    // Base cap
    let base_center = mesh.push(Vec3::ZERO, -Vec3::Z, Vec2::splat(0.5));
    for i in 0..segments {
        let i0 = ring_start + i;
        let i1 = ring_start + (i + 1) % segments;
        mesh.indices.extend_from_slice(&[i1, i0, base_center]);
    }

    mesh
}

fn build_points(positions: &[Vec3]) -> MeshData {
    let mut mesh = MeshData::new();
    for position in positions {
        let normal = position.normalize_or_zero();
        let idx = mesh.push(*position, normal, Vec2::ZERO);
        mesh.indices.push(idx);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_vertex_and_index_counts() {
        let mesh = build_mesh(&Geometry::Plane {
            width: 100.0,
            height: 50.0,
            width_segments: 4,
            height_segments: 2,
        });
        assert_eq!(mesh.vertices.len(), 5 * 3);
        assert_eq!(mesh.indices.len(), 4 * 2 * 6);
        // Centred on the origin
        assert_eq!(mesh.vertices[0].position, [-50.0, -25.0, 0.0]);
        assert_eq!(mesh.vertices.last().unwrap().position, [50.0, 25.0, 0.0]);
    }

    #[test]
    fn test_sphere_vertices_on_radius() {
        let mesh = build_mesh(&Geometry::Sphere {
            radius: 8.0,
            width_segments: 12,
            height_segments: 6,
        });
        for v in &mesh.vertices {
            let len = Vec3::from_array(v.position).length();
            assert!((len - 8.0).abs() < 1e-3);
        }
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn test_cone_apex_height() {
        let mesh = build_mesh(&Geometry::Cone {
            radius: 2.0,
            height: 10.0,
            segments: 6,
        });
        let top = mesh
            .vertices
            .iter()
            .map(|v| v.position[2])
            .fold(f32::MIN, f32::max);
        assert_eq!(top, 10.0);
        assert_eq!(mesh.indices.len(), 6 * 3 * 2);
    }

    #[test]
    fn test_points_topology() {
        let geometry = Geometry::Points {
            positions: vec![Vec3::X, Vec3::Y, Vec3::Z],
        };
        assert_eq!(geometry.topology(), Topology::Points);
        let mesh = build_mesh(&geometry);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }
}
