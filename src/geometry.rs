//! Renderable mesh geometry shared between sections

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::bounds::Aabb;

/// Opaque handle to a material owned by the embedding renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u64);

/// Standard vertex with position, normal, and UV
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

/// Renderable mesh data for one section.
///
/// Geometry is owned by the application and shared with sections through
/// `Arc<MeshGeometry>`; the section system never mutates it. One material
/// per geometry: `material == None` means the renderer's injected default
/// is used.
#[derive(Debug, Clone)]
pub struct MeshGeometry {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: Option<MaterialHandle>,
    /// Number of detail levels the asset carries. Sections always draw
    /// level 0; the count is only reported to the embedder.
    pub lod_count: u32,
}

impl MeshGeometry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vertices: Vec::new(),
            indices: Vec::new(),
            material: None,
            lod_count: 1,
        }
    }

    pub fn with_material(mut self, material: MaterialHandle) -> Self {
        self.material = Some(material);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Highest vertex index referenced by the index list.
    pub fn max_vertex_index(&self) -> u32 {
        self.vertices.len().saturating_sub(1) as u32
    }

    /// Get vertex data as bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Get index data as bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Computes the axis-aligned box enclosing all vertex positions.
    ///
    /// Invalid for empty geometry.
    pub fn bounding_box(&self) -> Aabb {
        let mut bounds = Aabb::INVALID;
        for vertex in &self.vertices {
            bounds.union_point(vertex.position);
        }
        bounds
    }

    /// Create a unit cube spanning [0,1]^3
    pub fn unit_cube() -> Self {
        let mut mesh = MeshGeometry::new("unit_cube");

        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y, Vec3::new(0.0, 0.0, 1.0)),
            (-Vec3::Z, -Vec3::X, Vec3::Y, Vec3::new(1.0, 0.0, 0.0)),
            (Vec3::X, -Vec3::Z, Vec3::Y, Vec3::new(1.0, 0.0, 1.0)),
            (-Vec3::X, Vec3::Z, Vec3::Y, Vec3::new(0.0, 0.0, 0.0)),
            (Vec3::Y, Vec3::X, -Vec3::Z, Vec3::new(0.0, 1.0, 1.0)),
            (-Vec3::Y, Vec3::X, Vec3::Z, Vec3::new(0.0, 0.0, 0.0)),
        ];

        for (normal, u_axis, v_axis, origin) in faces {
            let base = mesh.vertices.len() as u32;
            for (du, dv) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                mesh.vertices.push(Vertex {
                    position: origin + u_axis * du + v_axis * dv,
                    normal,
                    uv: Vec2::new(du, 1.0 - dv),
                });
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }
}
