//! Height sampling in voxel grid space

use std::sync::Arc;

use super::heightfield::Heightfield;

/// Read-only source of terrain heights for seeding voxel fields.
///
/// Coordinates are voxel grid columns, which may be finer than the terrain's
/// native heightmap grid.
pub trait HeightFeeder: Send + Sync {
    /// Terrain height (terrain space, world units) at a voxel column
    fn height(&self, x: i32, z: i32) -> f32;

    /// Vertical component of the terrain normal at a voxel column
    fn vertical_normal(&self, x: i32, z: i32) -> f32;
}

/// Feeds heights from a [`Heightfield`] at a resolution multiple of its native grid
#[derive(Clone)]
pub struct HeightfieldFeeder {
    terrain: Arc<Heightfield>,
    resolution_mult: u32,
}

impl HeightfieldFeeder {
    pub fn new(terrain: Arc<Heightfield>, resolution_mult: u32) -> Self {
        Self {
            terrain,
            resolution_mult: resolution_mult.max(1),
        }
    }

    #[inline]
    fn to_sample(&self, v: i32) -> f32 {
        v as f32 / self.resolution_mult as f32
    }
}

impl HeightFeeder for HeightfieldFeeder {
    fn height(&self, x: i32, z: i32) -> f32 {
        self.terrain.interpolated_height(self.to_sample(x), self.to_sample(z))
    }

    fn vertical_normal(&self, x: i32, z: i32) -> f32 {
        self.terrain.sample_normal(self.to_sample(x), self.to_sample(z)).y
    }
}
