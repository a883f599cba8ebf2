//! Voxel chunks, edits, meshing and the chunk manager

pub mod voxel;
pub mod field;
pub mod chunk;
pub mod brush;
pub mod edit;
pub mod mesher;
pub mod events;
pub mod grid;
pub mod manager;

pub use voxel::Voxel;
pub use field::{HeightCache, VoxelField};
pub use chunk::{Chunk, ChunkCoord, ChunkState, TriggerBounds};
pub use brush::{Action, BrushShape, BrushStroke};
pub use events::ChunkEvent;
pub use grid::TerrainGrid;
pub use manager::{ChunkFailure, ChunkManager, ChunkManagerBuilder, ModifyOutcome, ReloadOutcome, UndoOutcome};
