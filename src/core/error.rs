//! Error types for the Burrow sculpting engine

use std::path::PathBuf;

use thiserror::Error;

use crate::voxel::chunk::ChunkCoord;

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("Invalid edit input: {0}")]
    InvalidInput(String),

    #[error("Mesh exceeds output capacity of {capacity} ({vertices} vertices, {indices} indices)")]
    MeshCapacity {
        vertices: usize,
        indices: usize,
        capacity: usize,
    },

    #[error("Meshing error: {0}")]
    Mesh(String),

    #[error("Corrupt file {}: {reason}", path.display())]
    CorruptFile { path: PathBuf, reason: String },

    #[error("Chunk {0} is outside the terrain chunk grid")]
    ChunkOutOfBounds(ChunkCoord),
}

impl Error {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
