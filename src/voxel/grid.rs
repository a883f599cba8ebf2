//! Placement of the voxel chunk grid over the terrain

use glam::Vec3;

use crate::core::{EngineConfig, Error, Result};
use crate::terrain::TerrainSurface;
use super::chunk::{ChunkCoord, TexelMapping};
use super::field::CELLS_PER_CHUNK;

/// Terrain-derived geometry shared by every chunk
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainGrid {
    /// World-space terrain origin
    pub position: Vec3,
    pub size: Vec3,
    /// Voxel spacing per axis, one unit vertically
    pub voxel_scale: Vec3,
    /// Chunk columns along x and z
    pub chunks_x: i32,
    pub chunks_z: i32,
    pub alpha_resolution: (u32, u32),
    /// World size of one alphamap texel, one unit vertically
    pub control_map_scale: Vec3,
    /// Brush inflation covering the texels a cut can reach
    pub cut_margin: Vec3,
    pub cut_size: i32,
}

impl TerrainGrid {
    pub fn new(terrain: &dyn TerrainSurface, config: &EngineConfig) -> Result<Self> {
        let size = terrain.size();
        let resolution = terrain.heightmap_resolution();
        let (aw, ah) = terrain.alphamap_resolution();
        if resolution < 2 {
            return Err(Error::Config(format!("heightmap resolution {resolution} is too small")));
        }
        if aw == 0 || ah == 0 {
            return Err(Error::Config("terrain has an empty alphamap".into()));
        }
        if !(size.x > 0.0 && size.z > 0.0) {
            return Err(Error::Config(format!("terrain size {size} must be positive")));
        }

        let cells = (resolution - 1) * config.resolution_mult.max(1);
        let voxel_scale = Vec3::new(size.x / cells as f32, 1.0, size.z / cells as f32);
        let chunks = cells.div_ceil(CELLS_PER_CHUNK as u32) as i32;
        let control_map_scale = Vec3::new(size.x / aw as f32, 1.0, size.z / ah as f32);
        let cut_margin = (control_map_scale * config.cut_margin_multiplier).max(Vec3::splat(config.min_cut_margin));
        let cut_size = ((voxel_scale.x / control_map_scale.x) as i32).max(1);

        Ok(Self {
            position: terrain.position(),
            size,
            voxel_scale,
            chunks_x: chunks,
            chunks_z: chunks,
            alpha_resolution: (aw, ah),
            control_map_scale,
            cut_margin,
            cut_size,
        })
    }

    /// Chunk column lies on the terrain. Height is unbounded.
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        (0..self.chunks_x).contains(&coord.x) && (0..self.chunks_z).contains(&coord.z)
    }

    pub fn chunk_size_in_world(&self) -> Vec3 {
        self.voxel_scale * CELLS_PER_CHUNK as f32
    }

    pub fn to_terrain_space(&self, world: Vec3) -> Vec3 {
        world - self.position
    }

    /// World-space position of a chunk's first interior voxel
    pub fn chunk_world_origin(&self, coord: ChunkCoord) -> Vec3 {
        self.position + coord.origin(self.voxel_scale)
    }

    pub fn texel_mapping(&self, coord: ChunkCoord) -> TexelMapping {
        TexelMapping {
            origin: coord.origin(self.voxel_scale),
            voxel_scale: self.voxel_scale,
            terrain_size: self.size,
            alpha_resolution: self.alpha_resolution,
            cut_size: self.cut_size,
        }
    }
}
