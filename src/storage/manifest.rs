//! JSON records describing persisted versions

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::voxel::chunk::ChunkCoord;
use super::disk_io::write_atomic;

pub const CURRENT_VERSION_FILE: &str = "current.ver";

/// Chunks alive when a version was persisted
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionManifest {
    pub version: i64,
    pub alive_chunks: Vec<String>,
}

impl VersionManifest {
    pub fn new(version: i64, alive: impl IntoIterator<Item = ChunkCoord>) -> Self {
        let mut coords: Vec<ChunkCoord> = alive.into_iter().collect();
        coords.sort();
        Self {
            version,
            alive_chunks: coords.into_iter().map(ChunkCoord::name).collect(),
        }
    }

    pub fn path(dir: &Path, version: i64) -> PathBuf {
        dir.join(format!("version_{version}.ver"))
    }

    /// Alive chunk coordinates. An unparsable name makes the manifest corrupt.
    pub fn alive_coords(&self, path: &Path) -> Result<Vec<ChunkCoord>> {
        self.alive_chunks
            .iter()
            .map(|name| {
                ChunkCoord::from_name(name)
                    .ok_or_else(|| Error::corrupt(path, format!("invalid chunk name '{name}'")))
            })
            .collect()
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&Self::path(dir, self.version), json.as_bytes())?;
        Ok(())
    }

    /// Read the manifest of `version`, `None` if it was never written
    pub fn load(dir: &Path, version: i64) -> Result<Option<Self>> {
        let path = Self::path(dir, version);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let manifest: Self =
            serde_json::from_str(&contents).map_err(|e| Error::corrupt(&path, e.to_string()))?;
        Ok(Some(manifest))
    }

    /// Version number encoded in a manifest file name
    pub fn parse_file_name(name: &str) -> Option<i64> {
        name.strip_prefix("version_")?.strip_suffix(".ver")?.parse().ok()
    }
}

/// Next version to be persisted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentVersion {
    pub version: i64,
}

impl CurrentVersion {
    pub fn save(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        write_atomic(&dir.join(CURRENT_VERSION_FILE), json.as_bytes())?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CURRENT_VERSION_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map(Some)
                .map_err(|e| Error::corrupt(&path, e.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_roundtrip() {
        let temp = TempDir::new().unwrap();
        let manifest = VersionManifest::new(4, [ChunkCoord::new(1, 0, 0), ChunkCoord::new(0, -1, 2)]);
        assert_eq!(manifest.alive_chunks, vec!["Chunk_0_-1_2", "Chunk_1_0_0"]);
        manifest.save(temp.path()).unwrap();

        let loaded = VersionManifest::load(temp.path(), 4).unwrap().unwrap();
        assert_eq!(loaded, manifest);
        let path = VersionManifest::path(temp.path(), 4);
        assert_eq!(loaded.alive_coords(&path).unwrap()[1], ChunkCoord::new(1, 0, 0));
        assert!(VersionManifest::load(temp.path(), 5).unwrap().is_none());
    }

    #[test]
    fn test_garbled_manifest_is_corrupt() {
        let temp = TempDir::new().unwrap();
        fs::write(VersionManifest::path(temp.path(), 2), "{ not json").unwrap();
        assert!(matches!(
            VersionManifest::load(temp.path(), 2),
            Err(Error::CorruptFile { .. })
        ));

        let bad = VersionManifest { version: 3, alive_chunks: vec!["Tile_1".into()] };
        assert!(bad.alive_coords(Path::new("v3")).is_err());
    }

    #[test]
    fn test_manifest_file_names() {
        assert_eq!(VersionManifest::parse_file_name("version_17.ver"), Some(17));
        assert_eq!(VersionManifest::parse_file_name("current.ver"), None);
    }

    #[test]
    fn test_current_version_roundtrip() {
        let temp = TempDir::new().unwrap();
        assert!(CurrentVersion::load(temp.path()).unwrap().is_none());
        CurrentVersion { version: 9 }.save(temp.path()).unwrap();
        assert_eq!(CurrentVersion::load(temp.path()).unwrap(), Some(CurrentVersion { version: 9 }));
    }
}
