//! Marching cubes surface extraction at several levels of detail

pub mod tables;
pub mod buffers;
pub mod lod;
pub mod mesh;
pub mod marching_cubes;

pub use lod::{stride, LOD_COUNT};
pub use mesh::{BlendWeights, ChunkMesh, PackedVertex};
pub use marching_cubes::{MarchingCubes, MeshSettings, SurfaceContext};
