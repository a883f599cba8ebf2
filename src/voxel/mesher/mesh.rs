//! Extracted chunk meshes

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Texture blend weights for up to 16 layers, four per vector
pub type BlendWeights = [Vec4; 4];

/// Vertex layout handed to the host renderer
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PackedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Triangle mesh of one chunk at one LOD, positions chunk-local
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Empty for collision meshes
    pub uvs: Vec<Vec2>,
    pub blend: Vec<BlendWeights>,
    pub tex_info: Vec<i8>,
}

impl ChunkMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Too small to be drawn or collided with
    pub fn is_degenerate(&self) -> bool {
        self.vertex_count() < 3 || self.triangle_count() < 1
    }

    pub fn packed_vertices(&self) -> Vec<PackedVertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .enumerate()
            .map(|(i, (p, n))| PackedVertex {
                position: p.to_array(),
                normal: n.to_array(),
                uv: self.uvs.get(i).copied().unwrap_or(Vec2::ZERO).to_array(),
            })
            .collect()
    }

    /// Raw vertex bytes for upload
    pub fn vertex_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.packed_vertices()).to_vec()
    }
}
