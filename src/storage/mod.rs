//! On-disk persistence of chunks, the cutout mask and undo history

pub mod disk_io;
pub mod manifest;
pub mod history;

pub use history::{DirtyChunk, VersionStore};
pub use manifest::{CurrentVersion, VersionManifest};
