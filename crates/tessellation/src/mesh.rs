use serde::{Deserialize, Serialize};

use burin_geom::{Point3, Vec3};

/// A tessellated curve: an ordered vertex chain in 3D, f32 for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline3 {
    pub points: Vec<[f32; 3]>,
}

impl Polyline3 {
    pub fn push(&mut self, p: Point3) {
        self.points.push([p.x as f32, p.y as f32, p.z as f32]);
    }
}

/// A triangle mesh for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    /// Vertex positions [x, y, z, x, y, z, ...]
    pub positions: Vec<f32>,
    /// Vertex normals [nx, ny, nz, ...]
    pub normals: Vec<f32>,
    /// Triangle indices [i0, i1, i2, ...]
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn add_vertex(&mut self, pos: Point3, normal: Vec3) -> u32 {
        let idx = self.vertex_count() as u32;
        self.positions.push(pos.x as f32);
        self.positions.push(pos.y as f32);
        self.positions.push(pos.z as f32);
        self.normals.push(normal.x as f32);
        self.normals.push(normal.y as f32);
        self.normals.push(normal.z as f32);
        idx
    }

    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }

    /// Append a flat quad (a, b, c, d counter-clockwise) with one shared
    /// face normal.
    pub fn add_quad(&mut self, a: Point3, b: Point3, c: Point3, d: Point3, normal: Vec3) {
        let ia = self.add_vertex(a, normal);
        let ib = self.add_vertex(b, normal);
        let ic = self.add_vertex(c, normal);
        let id = self.add_vertex(d, normal);
        self.add_triangle(ia, ib, ic);
        self.add_triangle(ia, ic, id);
    }

    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.vertex_count() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        for &idx in &other.indices {
            self.indices.push(idx + offset);
        }
    }
}

/// Immutable render payload for one feature, handed across threads as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderMesh {
    /// Sketch curves as polylines.
    Wireframe(Vec<Polyline3>),
    /// A swept solid as triangles.
    Surface(TriangleMesh),
}
