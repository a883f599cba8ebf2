//! Engine configuration
//!
//! The tuning constants here (near-surface epsilon, neighbour margin, cut
//! margin multiplier) are empirically chosen values. They are exposed as
//! configuration rather than baked into the algorithms so they can be tuned
//! per terrain.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Configuration for a sculpting session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Voxel grid resolution relative to the terrain's native heightmap grid
    pub resolution_mult: u32,
    /// Number of persisted versions kept for undo
    pub undo_stack_size: i64,
    /// Values closer than this to the original terrain value count as unaltered surface
    pub near_surface_epsilon: f32,
    /// Distance from a chunk face within which altered geometry requires the neighbour
    pub neighbour_margin: f32,
    /// Cut margin per axis is `max(min_cut_margin, multiplier * control map texel size)`
    pub cut_margin_multiplier: f32,
    pub min_cut_margin: f32,
    /// LOD level used for the collision mesh
    pub collider_lod_index: usize,
    /// Maximum vertices and indices per extracted mesh
    pub mesh_capacity: usize,
    /// Density threshold separating inside from outside
    pub isovalue: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolution_mult: 1,
            undo_stack_size: 15,
            near_surface_epsilon: 0.08,
            neighbour_margin: 4.0,
            cut_margin_multiplier: 2.1,
            min_cut_margin: 2.0,
            collider_lod_index: 0,
            mesh_capacity: 32767,
            isovalue: 0.0,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty-printed JSON
    pub fn save_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Check that values are usable
    pub fn validate(&self) -> Result<()> {
        if self.resolution_mult == 0 {
            return Err(Error::Config("resolution_mult must be at least 1".into()));
        }
        if self.undo_stack_size < 1 {
            return Err(Error::Config("undo_stack_size must be at least 1".into()));
        }
        if self.collider_lod_index >= crate::voxel::mesher::LOD_COUNT {
            return Err(Error::Config(format!(
                "collider_lod_index {} exceeds the {} available LOD levels",
                self.collider_lod_index,
                crate::voxel::mesher::LOD_COUNT
            )));
        }
        if self.mesh_capacity < 3 {
            return Err(Error::Config("mesh_capacity must hold at least one triangle".into()));
        }
        if !(self.near_surface_epsilon >= 0.0) || !(self.neighbour_margin >= 0.0) {
            return Err(Error::Config("margins must be non-negative".into()));
        }
        Ok(())
    }
}
