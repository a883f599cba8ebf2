//! Level of detail strides for mesh extraction
//!
//! LOD `i` samples every `1 << i` voxels. Coarser levels are cheaper to mesh
//! and render but do not line up with finer neighbours at chunk faces.

use crate::voxel::field::SIZE_VOX;

/// Number of LOD levels extracted per chunk
pub const LOD_COUNT: usize = 3;

/// Voxel stride of a LOD level
///
/// # Example
/// ```
/// use burrow::voxel::mesher::lod::stride;
/// assert_eq!(stride(0), 1);
/// assert_eq!(stride(2), 4);
/// ```
pub fn stride(lod_index: usize) -> usize {
    1 << lod_index.min(LOD_COUNT - 1)
}

/// Voxel indices along one axis at which cells of the given stride start.
///
/// The halo voxel at index 0 and the trailing halo are never cell origins,
/// and origins are aligned to the stride from the first interior voxel.
pub fn cell_origins(stride: usize) -> impl Iterator<Item = usize> + Clone {
    (1..SIZE_VOX.saturating_sub(stride + 1)).filter(move |i| (i - 1) % stride == 0)
}
