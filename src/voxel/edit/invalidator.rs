//! Chunks whose persisted copy went stale since the last save

use std::collections::BTreeSet;

use crate::voxel::chunk::ChunkCoord;

/// Dirty set drained by each persist
#[derive(Debug, Default)]
pub struct ChunkInvalidator {
    dirty: BTreeSet<ChunkCoord>,
}

impl ChunkInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_chunk_dirty(&mut self, coord: ChunkCoord) {
        self.dirty.insert(coord);
    }

    /// Chunk was removed; its files are handled as a deletion instead
    pub fn forget(&mut self, coord: &ChunkCoord) {
        self.dirty.remove(coord);
    }

    /// Dirty chunks in coordinate order, leaving the set empty
    pub fn take_dirty_chunks(&mut self) -> Vec<ChunkCoord> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn is_chunk_dirty(&self, coord: &ChunkCoord) -> bool {
        self.dirty.contains(coord)
    }

    pub fn clear(&mut self) {
        self.dirty.clear();
    }
}
