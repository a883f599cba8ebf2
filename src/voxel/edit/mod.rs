//! Voxel edits: the modification kernel and dirty-chunk tracking

pub mod kernel;
pub mod invalidator;

pub use kernel::ModificationKernel;
pub use invalidator::ChunkInvalidator;
