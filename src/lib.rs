//! Burrow - chunked voxel sculpting on top of height-field terrain
//!
//! Terrain is mirrored into 32-cell voxel chunks on demand. Brush strokes
//! dig, add, paint or reset voxels, chunks are remeshed with marching cubes
//! and the terrain's cutout mask hides the surface that was dug through.

pub mod core;
pub mod math;
pub mod terrain;
pub mod voxel;
pub mod storage;
