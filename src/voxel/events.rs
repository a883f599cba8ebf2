//! Lifecycle notifications for the host's visual and collision proxies

use super::chunk::ChunkCoord;

/// Something the host must mirror: create, rebuild or destroy a proxy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkEvent {
    Created(ChunkCoord),
    /// Meshes were rebuilt; `visible` tells whether a visual mesh exists
    MeshUpdated { coord: ChunkCoord, visible: bool },
    Removed(ChunkCoord),
}

impl ChunkEvent {
    pub fn coord(&self) -> ChunkCoord {
        match *self {
            ChunkEvent::Created(coord)
            | ChunkEvent::MeshUpdated { coord, .. }
            | ChunkEvent::Removed(coord) => coord,
        }
    }
}
