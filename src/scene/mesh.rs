//! Immutable indexed geometry with a material reference

use std::sync::{Arc, Weak};

use crate::rasterizer::{Material, Topology, Vec2, Vec3, Vertex};

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    vertices: Arc<Vec<Vertex>>,
    indices: Arc<Vec<u32>>,
    topology: Topology,
    material: Weak<Material>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, topology: Topology) -> Self {
        Self {
            name: String::new(),
            vertices: Arc::new(vertices),
            indices: Arc::new(indices),
            topology,
            material: Weak::new(),
        }
    }

    pub fn with_material(mut self, material: Weak<Material>) -> Self {
        self.material = material;
        self
    }

    pub fn vertices(&self) -> &Arc<Vec<Vertex>> {
        &self.vertices
    }

    pub fn indices(&self) -> &Arc<Vec<u32>> {
        &self.indices
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn material(&self) -> Weak<Material> {
        self.material.clone()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Cube centered on the origin with edge length `size`
    ///
    /// Four vertices per face so UVs and normals stay per-face. Faces wind
    /// counter-clockwise on screen when seen from outside.
    pub fn test_cube(size: f32) -> Self {
        let h = size * 0.5;
        // (normal, up) per face
        let faces = [
            (Vec3::Z, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y),
            (Vec3::X, Vec3::Y),
            (Vec3::NEG_X, Vec3::Y),
            (Vec3::Y, Vec3::Z),
            (Vec3::NEG_Y, Vec3::Z),
        ];
        let uvs = [
            Vec2::new(0.0, 1.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, up) in faces {
            // Right as seen when looking at the face from outside
            let right = up.cross(-normal);
            let corners = [
                normal - right - up,
                normal - right + up,
                normal + right + up,
                normal + right - up,
            ];

            let base = vertices.len() as u32;
            for (corner, uv) in corners.iter().zip(uvs) {
                let mut v = Vertex::new(*corner * h, uv, normal);
                v.tangent = right;
                v.binormal = up;
                vertices.push(v);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        let mut mesh = Self::new(vertices, indices, Topology::TriangleList);
        mesh.name = "cube".to_string();
        mesh
    }
}
