//! Dense per-chunk density field with a one-voxel halo

use rayon::prelude::*;

use crate::core::types::IVec3;
use crate::terrain::HeightFeeder;
use super::voxel::Voxel;

/// Samples per axis that carry mesh corners
pub const SIZE: usize = 33;
/// Cells per axis; chunks tile every `CELLS_PER_CHUNK` voxels
pub const CELLS_PER_CHUNK: usize = SIZE - 1;
/// Samples per axis including the halo on both sides
pub const SIZE_VOX: usize = SIZE + 2;
pub const SIZE_VOX2: usize = SIZE_VOX * SIZE_VOX;
/// Total voxels per chunk
pub const VOXEL_COUNT: usize = SIZE_VOX * SIZE_VOX * SIZE_VOX;

/// Flattened voxel index
#[inline]
pub fn index(x: usize, y: usize, z: usize) -> usize {
    x * SIZE_VOX2 + y * SIZE_VOX + z
}

/// Inverse of [`index`]
#[inline]
pub fn coords(index: usize) -> (usize, usize, usize) {
    let x = index / SIZE_VOX2;
    let rem = index % SIZE_VOX2;
    (x, rem / SIZE_VOX, rem % SIZE_VOX)
}

/// Terrain heights and vertical normals sampled over a chunk's voxel columns
#[derive(Clone, Debug)]
pub struct HeightCache {
    heights: Vec<f32>,
    normals: Vec<f32>,
}

impl HeightCache {
    /// Sample a chunk's footprint from the feeder. `voxel_origin` is the chunk's
    /// first interior voxel in the voxel grid.
    pub fn sample(feeder: &dyn HeightFeeder, voxel_origin: IVec3) -> Self {
        let mut heights = Vec::with_capacity(SIZE_VOX2);
        let mut normals = Vec::with_capacity(SIZE_VOX2);
        for xi in 0..SIZE_VOX as i32 {
            for zi in 0..SIZE_VOX as i32 {
                let x = voxel_origin.x + xi - 1;
                let z = voxel_origin.z + zi - 1;
                heights.push(feeder.height(x, z));
                normals.push(feeder.vertical_normal(x, z));
            }
        }
        Self { heights, normals }
    }

    #[inline]
    pub fn height(&self, xi: usize, zi: usize) -> f32 {
        self.heights[xi * SIZE_VOX + zi]
    }

    #[inline]
    pub fn vertical_normal(&self, xi: usize, zi: usize) -> f32 {
        self.normals[xi * SIZE_VOX + zi]
    }
}

/// Density field of one chunk
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelField {
    voxels: Vec<Voxel>,
}

impl VoxelField {
    /// Seed the field from the terrain: `value = y - height`.
    ///
    /// `altitude` is the terrain-space height of the chunk's first interior
    /// voxel layer, `vertical_scale` the height of one voxel.
    pub fn generate(heights: &HeightCache, altitude: f32, vertical_scale: f32) -> Self {
        let mut voxels = vec![Voxel::default(); VOXEL_COUNT];
        voxels.par_iter_mut().enumerate().for_each(|(i, voxel)| {
            let (xi, yi, zi) = coords(i);
            let y = altitude + (yi as f32 - 1.0) * vertical_scale;
            *voxel = Voxel::unaltered(y - heights.height(xi, zi));
        });
        Self { voxels }
    }

    /// Wrap a raw voxel array. Returns `None` unless it holds exactly [`VOXEL_COUNT`] voxels.
    pub fn from_voxels(voxels: Vec<Voxel>) -> Option<Self> {
        (voxels.len() == VOXEL_COUNT).then_some(Self { voxels })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Voxel {
        self.voxels[index(x, y, z)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, voxel: Voxel) {
        self.voxels[index(x, y, z)] = voxel;
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    pub fn voxels_mut(&mut self) -> &mut [Voxel] {
        &mut self.voxels
    }

    /// Any voxel carries an alteration
    pub fn is_altered(&self) -> bool {
        self.voxels.iter().any(Voxel::is_altered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat(f32);

    impl HeightFeeder for Flat {
        fn height(&self, _x: i32, _z: i32) -> f32 {
            self.0
        }
        fn vertical_normal(&self, _x: i32, _z: i32) -> f32 {
            1.0
        }
    }

    #[test]
    fn test_dimensions() {
        assert_eq!(CELLS_PER_CHUNK, 32);
        assert_eq!(SIZE_VOX, 35);
        assert_eq!(VOXEL_COUNT, 35 * 35 * 35);
    }

    #[test]
    fn test_index_roundtrip() {
        for &(x, y, z) in &[(0, 0, 0), (34, 34, 34), (1, 17, 3), (20, 0, 34)] {
            assert_eq!(coords(index(x, y, z)), (x, y, z));
        }
        assert_eq!(index(1, 0, 0), SIZE_VOX2);
    }

    #[test]
    fn test_generate_flat() {
        let heights = HeightCache::sample(&Flat(10.0), IVec3::ZERO);
        let field = VoxelField::generate(&heights, 0.0, 1.0);

        // halo layer sits one voxel below the chunk origin
        assert_eq!(field.get(5, 0, 5).value, -11.0);
        assert_eq!(field.get(5, 11, 5).value, 0.0);
        assert_eq!(field.get(5, 12, 5).value, 1.0);
        assert!(!field.is_altered());
    }

    #[test]
    fn test_from_voxels_rejects_wrong_length() {
        assert!(VoxelField::from_voxels(vec![Voxel::default(); 10]).is_none());
        assert!(VoxelField::from_voxels(vec![Voxel::default(); VOXEL_COUNT]).is_some());
    }
}
