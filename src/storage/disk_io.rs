//! Binary chunk files and their naming on disk

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::{Error, Result};
use crate::voxel::chunk::{ChunkCoord, TriggerBounds};
use crate::voxel::field::{VoxelField, VOXEL_COUNT};
use crate::voxel::voxel::{Voxel, PACKED_SIZE};
use glam::Vec3;

pub const VOXEL_EXTENSION: &str = "vox";
pub const METADATA_EXTENSION: &str = "vom";
pub const MASK_FILE: &str = "cutout.mask";

/// Bytes of a metadata sidecar: virgin flag + min/max corners
pub const METADATA_SIZE: usize = 1 + 6 * 4;

/// Serialize a voxel field, `PACKED_SIZE` bytes per voxel
pub fn encode_voxels(field: &VoxelField) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(VOXEL_COUNT * PACKED_SIZE);
    for voxel in field.voxels() {
        bytes.extend_from_slice(&voxel.to_bytes());
    }
    bytes
}

/// Deserialize a voxel field. `path` names the source in errors.
pub fn decode_voxels(bytes: &[u8], path: &Path) -> Result<VoxelField> {
    if bytes.len() != VOXEL_COUNT * PACKED_SIZE {
        return Err(Error::corrupt(
            path,
            format!("expected {} bytes, found {}", VOXEL_COUNT * PACKED_SIZE, bytes.len()),
        ));
    }
    let voxels = bytes
        .chunks_exact(PACKED_SIZE)
        .map(|c| Voxel::from_bytes([c[0], c[1], c[2], c[3], c[4]]))
        .collect();
    VoxelField::from_voxels(voxels).ok_or_else(|| Error::corrupt(path, "wrong voxel count"))
}

pub fn encode_bounds(bounds: &TriggerBounds) -> [u8; METADATA_SIZE] {
    let mut bytes = [0u8; METADATA_SIZE];
    bytes[0] = bounds.virgin as u8;
    let floats = bounds.min.to_array().into_iter().chain(bounds.max.to_array());
    for (i, f) in floats.enumerate() {
        bytes[1 + i * 4..5 + i * 4].copy_from_slice(&f.to_le_bytes());
    }
    bytes
}

pub fn decode_bounds(bytes: &[u8], path: &Path) -> Result<TriggerBounds> {
    if bytes.len() != METADATA_SIZE {
        return Err(Error::corrupt(path, format!("expected {METADATA_SIZE} bytes, found {}", bytes.len())));
    }
    let virgin = match bytes[0] {
        0 => false,
        1 => true,
        other => return Err(Error::corrupt(path, format!("invalid virgin flag {other}"))),
    };
    let f = |i: usize| {
        let o = 1 + i * 4;
        f32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]])
    };
    Ok(TriggerBounds {
        virgin,
        min: Vec3::new(f(0), f(1), f(2)),
        max: Vec3::new(f(3), f(4), f(5)),
    })
}

/// Current voxel file of a chunk
pub fn voxel_path(dir: &Path, coord: ChunkCoord) -> PathBuf {
    dir.join(format!("{}.{VOXEL_EXTENSION}", coord.name()))
}

/// Current metadata sidecar of a chunk
pub fn metadata_path(dir: &Path, coord: ChunkCoord) -> PathBuf {
    dir.join(format!("{}.{METADATA_EXTENSION}", coord.name()))
}

/// Snapshot of `file` at `version`, e.g. `Chunk_0_0_0.vox_v3`
pub fn versioned(file: &Path, version: i64) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(format!("_v{version}"));
    PathBuf::from(name)
}

/// Split a snapshot file name into its base name and version
pub fn parse_versioned(file_name: &str) -> Option<(&str, i64)> {
    let (base, version) = file_name.rsplit_once("_v")?;
    Some((base, version.parse().ok()?))
}

/// Write through a temporary file so a crash never leaves a truncated file behind
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

/// Copy `from` over `to` if `from` exists. Returns whether a copy happened.
pub fn copy_if_exists(from: &Path, to: &Path) -> io::Result<bool> {
    match fs::copy(from, to) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Write a chunk's current voxel and metadata files
pub fn save_chunk(dir: &Path, coord: ChunkCoord, field: &VoxelField, bounds: &TriggerBounds) -> Result<()> {
    write_atomic(&voxel_path(dir, coord), &encode_voxels(field))?;
    write_atomic(&metadata_path(dir, coord), &encode_bounds(bounds))?;
    Ok(())
}

/// Read a chunk's current files, `None` if it was never persisted.
///
/// A voxel file without metadata loads with virgin bounds.
pub fn load_chunk(dir: &Path, coord: ChunkCoord) -> Result<Option<(VoxelField, TriggerBounds)>> {
    let path = voxel_path(dir, coord);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let field = decode_voxels(&bytes, &path)?;

    let meta = metadata_path(dir, coord);
    let bounds = match fs::read(&meta) {
        Ok(bytes) => decode_bounds(&bytes, &meta)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => TriggerBounds::default(),
        Err(e) => return Err(e.into()),
    };
    Ok(Some((field, bounds)))
}

/// Remove a chunk's current files
pub fn delete_chunk(dir: &Path, coord: ChunkCoord) -> Result<()> {
    remove_if_exists(&voxel_path(dir, coord))?;
    remove_if_exists(&metadata_path(dir, coord))?;
    Ok(())
}

/// Chunks with a current voxel file, sorted
pub fn persisted_chunks(dir: &Path) -> Result<Vec<ChunkCoord>> {
    let mut coords = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(VOXEL_EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match ChunkCoord::from_name(stem) {
            Some(coord) => coords.push(coord),
            None => log::warn!("Ignoring unrecognized voxel file {}", path.display()),
        }
    }
    coords.sort();
    Ok(coords)
}
