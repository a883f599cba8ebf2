//! Terrain surface seen by the mesher and the cutout mask

use crate::core::types::Vec3;
use super::heightfield::DetailLayer;

/// The underlying height-field terrain, as far as sculpting needs to know it
pub trait TerrainSurface: Send + Sync {
    /// World-space position of the terrain's minimum corner
    fn position(&self) -> Vec3;

    /// World-space extent of the terrain
    fn size(&self) -> Vec3;

    /// Heightmap samples per side
    fn heightmap_resolution(&self) -> u32;

    /// Alphamap texels along x and z
    fn alphamap_resolution(&self) -> (u32, u32);

    fn alphamap_layers(&self) -> usize;

    /// Blend weight of `layer` at an alphamap texel
    fn alpha(&self, x: u32, z: u32, layer: usize) -> f32;

    /// Surface normal at normalized terrain coordinates
    fn interpolated_normal(&self, u: f32, v: f32) -> Vec3;

    /// Vegetation density layers, copied into the cutout mask on startup
    fn detail_layers(&self) -> Vec<DetailLayer> {
        Vec::new()
    }
}
