//! Versioned chunk store backing persistence and undo.
//!
//! Every persisted version `v` leaves a manifest `version_v.ver`, a mask
//! snapshot and a `_v{v}` snapshot of each chunk written in that version.
//! Before a chunk is first touched after version `v` was committed, its
//! current files are copied to `_v{v}` so stepping back to `v` can restore
//! them. Version 0 is an empty baseline written when the store is created.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::Result;
use crate::terrain::CutoutMask;
use crate::voxel::chunk::{ChunkCoord, TriggerBounds};
use crate::voxel::field::VoxelField;
use super::disk_io::{
    self, copy_if_exists, metadata_path, parse_versioned, remove_if_exists, versioned, voxel_path,
    write_atomic, MASK_FILE, METADATA_EXTENSION, VOXEL_EXTENSION,
};
use super::manifest::{CurrentVersion, VersionManifest, CURRENT_VERSION_FILE};

/// A chunk written by [`VersionStore::commit`]
pub struct DirtyChunk<'a> {
    pub coord: ChunkCoord,
    pub field: &'a VoxelField,
    pub bounds: &'a TriggerBounds,
}

/// Directory of chunk files plus their version history
#[derive(Debug)]
pub struct VersionStore {
    dir: PathBuf,
    /// Next version to be persisted
    version: i64,
    undo_stack_size: i64,
}

impl VersionStore {
    /// Open or create a store. A new store starts with a baseline version 0
    /// holding no chunks and `mask`.
    pub fn open(dir: impl AsRef<Path>, undo_stack_size: i64, mask: &CutoutMask) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut store = Self {
            dir,
            version: 1,
            undo_stack_size: undo_stack_size.max(1),
        };
        match CurrentVersion::load(&store.dir)? {
            Some(current) => {
                store.version = current.version.max(1);
                log::debug!("Opened version store {} at version {}", store.dir.display(), store.version);
            }
            None => store.write_baseline(mask)?,
        }
        Ok(store)
    }

    fn write_baseline(&mut self, mask: &CutoutMask) -> Result<()> {
        VersionManifest::new(0, []).save(&self.dir)?;
        self.save_mask(mask, 0)?;
        self.set_version(1)?;
        log::debug!("Created version store {}", self.dir.display());
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Next version to be persisted
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Last persisted version
    pub fn committed_version(&self) -> i64 {
        self.version - 1
    }

    fn set_version(&mut self, version: i64) -> Result<()> {
        self.version = version;
        CurrentVersion { version }.save(&self.dir)
    }

    /// Snapshot a chunk's current files as part of the committed version
    /// unless that snapshot already exists. Returns whether a snapshot was taken.
    pub fn record_undo_if_needed(&self, coord: ChunkCoord) -> Result<bool> {
        let committed = self.committed_version();
        let mut recorded = false;
        for path in [voxel_path(&self.dir, coord), metadata_path(&self.dir, coord)] {
            let snapshot = versioned(&path, committed);
            if !snapshot.exists() {
                recorded |= copy_if_exists(&path, &snapshot)?;
            }
        }
        Ok(recorded)
    }

    /// Manifest of a retained version
    pub fn manifest(&self, version: i64) -> Result<Option<VersionManifest>> {
        VersionManifest::load(&self.dir, version)
    }

    pub fn load_chunk(&self, coord: ChunkCoord) -> Result<Option<(VoxelField, TriggerBounds)>> {
        disk_io::load_chunk(&self.dir, coord)
    }

    pub fn delete_chunk(&self, coord: ChunkCoord) -> Result<()> {
        disk_io::delete_chunk(&self.dir, coord)
    }

    pub fn persisted_chunks(&self) -> Result<Vec<ChunkCoord>> {
        disk_io::persisted_chunks(&self.dir)
    }

    fn mask_path(&self) -> PathBuf {
        self.dir.join(MASK_FILE)
    }

    fn save_mask(&self, mask: &CutoutMask, version: i64) -> Result<()> {
        let bytes = mask.to_bytes();
        write_atomic(&self.mask_path(), &bytes)?;
        write_atomic(&versioned(&self.mask_path(), version), &bytes)?;
        Ok(())
    }

    /// Load the current mask into `mask`. Returns false if none was persisted.
    pub fn load_mask(&self, mask: &mut CutoutMask) -> Result<bool> {
        let path = self.mask_path();
        match fs::read(&path) {
            Ok(bytes) => {
                mask.load_bytes(&bytes, &path)?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist a new version and return its number.
    ///
    /// `deleted` chunks lose their current files, `dirty` chunks are written
    /// and snapshotted, and `alive` becomes the version's manifest.
    pub fn commit<'a>(
        &mut self,
        dirty: impl IntoIterator<Item = DirtyChunk<'a>>,
        deleted: impl IntoIterator<Item = ChunkCoord>,
        alive: impl IntoIterator<Item = ChunkCoord>,
        mask: &CutoutMask,
    ) -> Result<i64> {
        let version = self.version;
        self.discard_redo()?;

        for coord in deleted {
            self.delete_chunk(coord)?;
        }
        let mut written = 0usize;
        for chunk in dirty {
            disk_io::save_chunk(&self.dir, chunk.coord, chunk.field, chunk.bounds)?;
            for path in [voxel_path(&self.dir, chunk.coord), metadata_path(&self.dir, chunk.coord)] {
                fs::copy(&path, versioned(&path, version))?;
            }
            written += 1;
        }

        VersionManifest::new(version, alive).save(&self.dir)?;
        self.save_mask(mask, version)?;
        self.prune(version - self.undo_stack_size)?;
        self.set_version(version + 1)?;

        log::info!("Persisted version {version} ({written} chunks written)");
        Ok(version)
    }

    /// Delete snapshots of versions that an undo stepped back over
    pub fn discard_redo(&self) -> Result<()> {
        let from = self.version;
        self.delete_versions(|v| v >= from)
    }

    fn prune(&self, at_or_below: i64) -> Result<()> {
        self.delete_versions(|v| v <= at_or_below)
    }

    fn delete_versions(&self, doomed: impl Fn(i64) -> bool) -> Result<()> {
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let version = VersionManifest::parse_file_name(name)
                .or_else(|| parse_versioned(name).map(|(_, v)| v));
            if version.is_some_and(&doomed) {
                remove_if_exists(&entry.path())?;
            }
        }
        Ok(())
    }

    /// Copy every snapshot of `version` over the current files.
    /// Returns the version's manifest, `None` if it is not retained.
    fn restore(&self, version: i64) -> Result<Option<VersionManifest>> {
        let Some(manifest) = VersionManifest::load(&self.dir, version)? else {
            return Ok(None);
        };
        let mut restored = 0usize;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some((base, v)) = name.to_str().and_then(parse_versioned) else {
                continue;
            };
            if v == version {
                fs::copy(entry.path(), self.dir.join(base))?;
                restored += 1;
            }
        }
        log::debug!("Restored {restored} files of version {version}");
        Ok(Some(manifest))
    }

    /// Roll the current files back one step and return the manifest now in effect.
    ///
    /// With `pending` edits the step discards them and returns to the last
    /// committed version; otherwise it returns to the version before that.
    /// `None` means no older version is retained and nothing changed.
    pub fn undo(&mut self, pending: bool) -> Result<Option<VersionManifest>> {
        let target = if pending { self.committed_version() } else { self.committed_version() - 1 };
        if target < 0 {
            return Ok(None);
        }
        let Some(manifest) = self.restore(target)? else {
            return Ok(None);
        };
        if !pending {
            self.set_version(self.version - 1)?;
        }
        Ok(Some(manifest))
    }

    /// Remove every chunk, snapshot and manifest and start over from a baseline
    pub fn clear(&mut self, mask: &CutoutMask) -> Result<()> {
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let base = parse_versioned(name).map_or(name, |(base, _)| base);
            let ours = base == MASK_FILE
                || base == CURRENT_VERSION_FILE
                || VersionManifest::parse_file_name(base).is_some()
                || base.ends_with(&format!(".{VOXEL_EXTENSION}"))
                || base.ends_with(&format!(".{METADATA_EXTENSION}"));
            if ours {
                remove_if_exists(&entry.path())?;
            }
        }
        self.write_baseline(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::HeightFeeder;
    use crate::voxel::field::HeightCache;
    use crate::voxel::voxel::Voxel;
    use glam::IVec3;
    use tempfile::TempDir;

    struct Flat;

    impl HeightFeeder for Flat {
        fn height(&self, _x: i32, _z: i32) -> f32 {
            4.0
        }
        fn vertical_normal(&self, _x: i32, _z: i32) -> f32 {
            1.0
        }
    }

    fn field(marker: f32) -> VoxelField {
        let heights = HeightCache::sample(&Flat, IVec3::ZERO);
        let mut field = VoxelField::generate(&heights, 0.0, 1.0);
        field.set(1, 1, 1, Voxel::new(marker, -1));
        field
    }

    fn marker(store: &VersionStore, coord: ChunkCoord) -> Option<f32> {
        store.load_chunk(coord).unwrap().map(|(f, _)| f.get(1, 1, 1).value)
    }

    fn commit(store: &mut VersionStore, coord: ChunkCoord, value: f32, mask: &CutoutMask) -> i64 {
        store.record_undo_if_needed(coord).unwrap();
        let field = field(value);
        let bounds = TriggerBounds::default();
        store
            .commit([DirtyChunk { coord, field: &field, bounds: &bounds }], [], [coord], mask)
            .unwrap()
    }

    #[test]
    fn test_new_store_has_baseline() {
        let temp = TempDir::new().unwrap();
        let store = VersionStore::open(temp.path(), 5, &CutoutMask::new(4, 4)).unwrap();
        assert_eq!(store.version(), 1);
        assert!(VersionManifest::load(temp.path(), 0).unwrap().is_some());

        let reopened = VersionStore::open(temp.path(), 5, &CutoutMask::new(4, 4)).unwrap();
        assert_eq!(reopened.version(), 1);
    }

    #[test]
    fn test_commit_and_step_back() {
        let temp = TempDir::new().unwrap();
        let mask = CutoutMask::new(4, 4);
        let mut store = VersionStore::open(temp.path(), 5, &mask).unwrap();
        let coord = ChunkCoord::new(0, 0, 0);

        assert_eq!(commit(&mut store, coord, 1.0, &mask), 1);
        assert_eq!(commit(&mut store, coord, 2.0, &mask), 2);
        assert_eq!(marker(&store, coord), Some(2.0));

        let manifest = store.undo(false).unwrap().unwrap();
        assert_eq!(manifest.version, 1);
        assert_eq!(marker(&store, coord), Some(1.0));
        assert_eq!(store.version(), 2);

        let manifest = store.undo(false).unwrap().unwrap();
        assert_eq!(manifest.version, 0);
        assert!(manifest.alive_chunks.is_empty());
        assert!(store.undo(false).unwrap().is_none());
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn test_pending_undo_keeps_version() {
        let temp = TempDir::new().unwrap();
        let mask = CutoutMask::new(4, 4);
        let mut store = VersionStore::open(temp.path(), 5, &mask).unwrap();
        let coord = ChunkCoord::new(1, 0, 0);
        commit(&mut store, coord, 1.0, &mask);

        store.record_undo_if_needed(coord).unwrap();
        let manifest = store.undo(true).unwrap().unwrap();
        assert_eq!(manifest.version, 1);
        assert_eq!(store.version(), 2);
        assert_eq!(marker(&store, coord), Some(1.0));
    }

    #[test]
    fn test_commit_after_undo_discards_redo() {
        let temp = TempDir::new().unwrap();
        let mask = CutoutMask::new(4, 4);
        let mut store = VersionStore::open(temp.path(), 5, &mask).unwrap();
        let coord = ChunkCoord::new(0, 0, 0);
        commit(&mut store, coord, 1.0, &mask);
        commit(&mut store, coord, 2.0, &mask);
        store.undo(false).unwrap();

        assert_eq!(commit(&mut store, coord, 3.0, &mask), 2);
        let snapshot = versioned(&voxel_path(temp.path(), coord), 2);
        let (field, _) = disk_io::load_chunk(temp.path(), coord).unwrap().unwrap();
        assert_eq!(fs::read(snapshot).unwrap(), disk_io::encode_voxels(&field));
        assert_eq!(marker(&store, coord), Some(3.0));
    }

    #[test]
    fn test_prune_bounds_history() {
        let temp = TempDir::new().unwrap();
        let mask = CutoutMask::new(4, 4);
        let mut store = VersionStore::open(temp.path(), 3, &mask).unwrap();
        let coord = ChunkCoord::new(0, 0, 0);
        for i in 0..6 {
            commit(&mut store, coord, i as f32, &mask);
        }
        // versions 4, 5 and 6 are retained
        assert!(VersionManifest::load(temp.path(), 3).unwrap().is_none());
        assert!(VersionManifest::load(temp.path(), 4).unwrap().is_some());

        assert!(store.undo(false).unwrap().is_some());
        assert!(store.undo(false).unwrap().is_some());
        assert!(store.undo(false).unwrap().is_none());
        assert_eq!(marker(&store, coord), Some(3.0));
    }

    #[test]
    fn test_mask_is_versioned() {
        let temp = TempDir::new().unwrap();
        let mut mask = CutoutMask::new(4, 4);
        let mut store = VersionStore::open(temp.path(), 5, &mask).unwrap();
        mask.cut(1, 1, false);
        store.commit([], [], [], &mask).unwrap();

        let mut loaded = CutoutMask::new(4, 4);
        assert!(store.load_mask(&mut loaded).unwrap());
        assert!(loaded.is_cut(1, 1));

        store.undo(false).unwrap();
        store.load_mask(&mut loaded).unwrap();
        assert_eq!(loaded.cut_count(), 0);
    }

    #[test]
    fn test_clear_resets_store() {
        let temp = TempDir::new().unwrap();
        let mask = CutoutMask::new(4, 4);
        let mut store = VersionStore::open(temp.path(), 5, &mask).unwrap();
        let coord = ChunkCoord::new(0, 2, 0);
        commit(&mut store, coord, 1.0, &mask);
        fs::write(temp.path().join("unrelated.txt"), "keep").unwrap();

        store.clear(&mask).unwrap();
        assert_eq!(store.version(), 1);
        assert!(store.persisted_chunks().unwrap().is_empty());
        assert!(temp.path().join("unrelated.txt").exists());
        assert!(VersionManifest::load(temp.path(), 1).unwrap().is_none());
    }
}
