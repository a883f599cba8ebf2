//! Chunk manager: owns the loaded chunks and runs edits, persistence and undo
//!
//! The manager is the single mutation point for voxel state. Every edit goes
//! through [`ChunkManager::modify`], which processes the affected chunks in a
//! fixed order (x, then z, then y ascending) so each chunk's field is mutated
//! by exactly one kernel dispatch at a time. Changes are only written to disk
//! by [`ChunkManager::persist_and_record_undo`], which turns everything since
//! the previous call into one undo step.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use glam::{IVec3, Vec3};

use crate::core::{EngineConfig, Error, Result};
use crate::math::{floor_div, Aabb};
use crate::storage::{DirtyChunk, VersionManifest, VersionStore};
use crate::terrain::{CutoutMask, HeightFeeder, HoleQuery, TerrainSurface};
use super::brush::{Action, BrushStroke};
use super::chunk::{Chunk, ChunkCoord, ChunkState, DIRECTIONS};
use super::edit::{ChunkInvalidator, ModificationKernel};
use super::events::ChunkEvent;
use super::field::{HeightCache, VoxelField, CELLS_PER_CHUNK};
use super::grid::TerrainGrid;
use super::mesher::{ChunkMesh, MarchingCubes, MeshSettings, SurfaceContext, LOD_COUNT};
use super::voxel::MAX_TEXTURE_LAYERS;

/// Collider holes are tested slightly inflated so hits on their rim count
const HOLE_INFLATION: f32 = 0.1;

/// A chunk that could not be processed. Sibling chunks are unaffected.
#[derive(Debug)]
pub struct ChunkFailure {
    pub coord: ChunkCoord,
    pub error: Error,
}

/// What one [`ChunkManager::modify`] call did
#[derive(Debug, Default)]
pub struct ModifyOutcome {
    /// Chunks in the stroke's range, in processing order
    pub touched: Vec<ChunkCoord>,
    /// Chunks created by this call, in range or as neighbours
    pub created: Vec<ChunkCoord>,
    pub removed: Vec<ChunkCoord>,
    pub failures: Vec<ChunkFailure>,
}

/// Result of rebuilding the chunk set from disk
#[derive(Debug, Default)]
pub struct ReloadOutcome {
    pub loaded: Vec<ChunkCoord>,
    /// Chunk files dropped because the version does not list them as alive
    pub removed: Vec<ChunkCoord>,
    /// Chunks whose files could not be loaded or meshed
    pub failures: Vec<ChunkFailure>,
}

#[derive(Debug)]
pub enum UndoOutcome {
    /// No older version is retained; nothing changed
    NothingToUndo,
    Restored { version: i64, reload: ReloadOutcome },
}

/// Collects the manager's collaborators
pub struct ChunkManagerBuilder {
    config: EngineConfig,
    feeder: Option<Arc<dyn HeightFeeder>>,
    terrain: Option<Arc<dyn TerrainSurface>>,
    storage_dir: Option<PathBuf>,
}

impl ChunkManagerBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            feeder: None,
            terrain: None,
            storage_dir: None,
        }
    }

    pub fn height_feeder(mut self, feeder: Arc<dyn HeightFeeder>) -> Self {
        self.feeder = Some(feeder);
        self
    }

    pub fn terrain(mut self, terrain: Arc<dyn TerrainSurface>) -> Self {
        self.terrain = Some(terrain);
        self
    }

    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    /// Validate the configuration, open the store and restore the last
    /// persisted session. Chunks that fail to load are logged and kept
    /// available through [`ChunkManager::take_load_failures`].
    pub fn build(self) -> Result<ChunkManager> {
        self.config.validate()?;
        let feeder = self.feeder.ok_or(Error::MissingCollaborator("height feeder"))?;
        let terrain = self.terrain.ok_or(Error::MissingCollaborator("terrain surface"))?;
        let dir = self.storage_dir.ok_or(Error::MissingCollaborator("storage directory"))?;

        let grid = TerrainGrid::new(terrain.as_ref(), &self.config)?;
        let mask = CutoutMask::from_terrain(terrain.as_ref());
        let store = VersionStore::open(&dir, self.config.undo_stack_size, &mask)?;

        let mut manager = ChunkManager {
            config: self.config,
            feeder,
            terrain,
            grid,
            chunks: BTreeMap::new(),
            mask,
            store,
            invalidator: ChunkInvalidator::new(),
            pending_deletions: HashSet::new(),
            events: Vec::new(),
            load_failures: Vec::new(),
        };

        let restored = manager.reload()?;
        log::info!(
            "Chunk manager ready at {}: {} chunks restored, version {}",
            dir.display(),
            restored.loaded.len(),
            manager.version()
        );
        manager.load_failures = restored.failures;
        Ok(manager)
    }
}

/// Owns every loaded chunk of one terrain
pub struct ChunkManager {
    config: EngineConfig,
    feeder: Arc<dyn HeightFeeder>,
    terrain: Arc<dyn TerrainSurface>,
    grid: TerrainGrid,
    chunks: BTreeMap<ChunkCoord, Chunk>,
    mask: CutoutMask,
    store: VersionStore,
    invalidator: ChunkInvalidator,
    /// Removed chunks whose files are deleted on the next persist
    pending_deletions: HashSet<ChunkCoord>,
    events: Vec<ChunkEvent>,
    load_failures: Vec<ChunkFailure>,
}

impl ChunkManager {
    pub fn builder(config: EngineConfig) -> ChunkManagerBuilder {
        ChunkManagerBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn grid(&self) -> &TerrainGrid {
        &self.grid
    }

    /// Next version to be persisted
    pub fn version(&self) -> i64 {
        self.store.version()
    }

    pub fn mask(&self) -> &CutoutMask {
        &self.mask
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn chunk_state(&self, coord: ChunkCoord) -> ChunkState {
        self.chunks.get(&coord).map_or(ChunkState::Unloaded, Chunk::state)
    }

    /// Loaded chunks in coordinate order
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Edits made since the last persist
    pub fn has_pending_edits(&self) -> bool {
        self.invalidator.has_dirty() || !self.pending_deletions.is_empty()
    }

    /// Drain queued lifecycle events
    pub fn take_events(&mut self) -> Vec<ChunkEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drain the failures of the last startup restore
    pub fn take_load_failures(&mut self) -> Vec<ChunkFailure> {
        std::mem::take(&mut self.load_failures)
    }

    /// Texture layers a stroke may select
    pub fn texture_layers(&self) -> usize {
        self.terrain.alphamap_layers().clamp(1, MAX_TEXTURE_LAYERS)
    }

    /// World-space volumes where the terrain collider must be ignored
    pub fn collider_holes(&self) -> Vec<Aabb> {
        self.chunks
            .values()
            .filter_map(|chunk| chunk.collider_hole(self.grid.chunk_world_origin(chunk.coord)))
            .collect()
    }

    /// Create the chunk unless it is already loaded. Returns whether it was created.
    pub fn ensure_chunk_exists(&mut self, coord: ChunkCoord) -> Result<bool> {
        if !self.grid.contains(coord) {
            return Err(Error::ChunkOutOfBounds(coord));
        }
        if self.chunks.contains_key(&coord) {
            return Ok(false);
        }
        self.create_chunk(coord)?;
        Ok(true)
    }

    fn create_chunk(&mut self, coord: ChunkCoord) -> Result<()> {
        let heights = HeightCache::sample(self.feeder.as_ref(), coord.voxel_origin());
        let altitude = coord.voxel_origin().y as f32 * self.grid.voxel_scale.y;
        let field = VoxelField::generate(&heights, altitude, self.grid.voxel_scale.y);
        let meshes = self.build_chunk_meshes(coord, &field)?;

        self.chunks.insert(coord, Chunk::new(coord, field, heights));
        self.pending_deletions.remove(&coord);
        self.invalidator.mark_chunk_dirty(coord);
        self.events.push(ChunkEvent::Created(coord));
        log::debug!("Created chunk {coord}");
        self.install_meshes(coord, meshes);
        Ok(())
    }

    /// Apply a stroke to every chunk it can reach.
    ///
    /// Input is validated before any chunk is touched. Per-chunk failures are
    /// logged and reported in the outcome while the remaining chunks proceed.
    pub fn modify(&mut self, stroke: &BrushStroke) -> Result<ModifyOutcome> {
        stroke.validate(self.texture_layers())?;
        let reach = self.grid.size.x.max(self.grid.size.z);
        if stroke.shape.vertical_extent(stroke.radius) > reach {
            return Err(Error::InvalidInput(format!(
                "brush reach {} exceeds the terrain extent {reach}",
                stroke.shape.vertical_extent(stroke.radius)
            )));
        }
        let started = Instant::now();
        self.store.discard_redo()?;

        let (min, max) = self.chunk_range(stroke);
        let center = self.grid.to_terrain_space(stroke.position);
        let mut outcome = ModifyOutcome::default();

        for x in min.x..=max.x {
            for z in min.z..=max.z {
                if stroke.action == Action::Reset {
                    self.uncut_column(x, z, min.y, max.y);
                }
                for y in min.y..=max.y {
                    let coord = ChunkCoord::new(x, y, z);
                    if let Err(error) = self.modify_chunk(coord, stroke, center, &mut outcome) {
                        log::error!("Failed to modify chunk {coord}: {error}");
                        outcome.failures.push(ChunkFailure { coord, error });
                    }
                    outcome.touched.push(coord);
                }
            }
        }

        self.materialize_neighbours(&mut outcome);
        self.remove_useless_chunks(&mut outcome);

        log::info!(
            "{:?} at {} touched {} chunks ({} created, {} removed, {} failed) in {:.1}ms",
            stroke.action,
            stroke.position,
            outcome.touched.len(),
            outcome.created.len(),
            outcome.removed.len(),
            outcome.failures.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(outcome)
    }

    /// Inclusive chunk range a stroke can affect
    fn chunk_range(&self, stroke: &BrushStroke) -> (IVec3, IVec3) {
        let grid = &self.grid;
        let scale = grid.voxel_scale;
        let cm = grid.cut_margin;
        let p = grid.to_terrain_space(stroke.position) / scale;

        let voxel_radius = ((stroke.radius + cm.x.max(cm.z)) / scale.x.min(scale.z)).floor() as i32 + 1;
        let vertical = (stroke.shape.vertical_extent(stroke.radius) + cm.y).floor() as i32 + 1;
        let margin = IVec3::new(voxel_radius, vertical, voxel_radius);
        let center = p.floor().as_ivec3();
        let mut vmin = center - margin;
        let mut vmax = center + margin;

        // halo columns included, nothing outside the terrain is ever sampled
        let cells = CELLS_PER_CHUNK as i32;
        vmin.x = vmin.x.max(-1);
        vmin.z = vmin.z.max(-1);
        vmax.x = vmax.x.min(grid.chunks_x * cells + 1);
        vmax.z = vmax.z.min(grid.chunks_z * cells + 1);

        let (low, high) = self.height_range(vmin, vmax);
        vmin.y = vmin.y.min(low.floor() as i32 - 1);
        vmax.y = vmax.y.max(high.ceil() as i32 + 1);

        let to_chunk = |v: IVec3| IVec3::new(floor_div(v.x, cells), floor_div(v.y, cells), floor_div(v.z, cells));
        let mut min = to_chunk(vmin);
        let mut max = to_chunk(vmax);
        min.x = min.x.max(0);
        min.z = min.z.max(0);
        max.x = max.x.min(grid.chunks_x - 1);
        max.z = max.z.min(grid.chunks_z - 1);
        (min, max)
    }

    /// Lowest and highest terrain height over a horizontal voxel range
    fn height_range(&self, vmin: IVec3, vmax: IVec3) -> (f32, f32) {
        let mut low = f32::MAX;
        let mut high = f32::MIN;
        for x in vmin.x..=vmax.x {
            for z in vmin.z..=vmax.z {
                let h = self.feeder.height(x, z);
                low = low.min(h);
                high = high.max(h);
            }
        }
        (low, high)
    }

    fn kernel_for(&self, coord: ChunkCoord, stroke: &BrushStroke, center: Vec3) -> ModificationKernel {
        let scale = self.grid.voxel_scale;
        ModificationKernel {
            shape: stroke.shape,
            action: stroke.action,
            center: center - coord.origin(scale),
            radius: stroke.radius,
            radius_with_margin: stroke.radius + self.grid.cut_margin.max_element(),
            intensity: stroke.intensity,
            texture_index: stroke.texture_index,
            altitude: coord.voxel_origin().y as f32 * scale.y,
            scale,
            near_surface_epsilon: self.config.near_surface_epsilon,
        }
    }

    fn modify_chunk(
        &mut self,
        coord: ChunkCoord,
        stroke: &BrushStroke,
        center: Vec3,
        outcome: &mut ModifyOutcome,
    ) -> Result<()> {
        if !self.chunks.contains_key(&coord) {
            self.create_chunk(coord)?;
            outcome.created.push(coord);
        }
        self.store.record_undo_if_needed(coord)?;

        // the edit lands only once the edited field has meshed
        let kernel = self.kernel_for(coord, stroke, center);
        let Some(chunk) = self.chunks.get(&coord) else {
            return Ok(());
        };
        let mut field = chunk.field.clone();
        kernel.apply(&mut field, &chunk.heights);
        let meshes = self.build_chunk_meshes(coord, &field)?;

        if let Some(chunk) = self.chunks.get_mut(&coord) {
            chunk.field = field;
        }
        self.invalidator.mark_chunk_dirty(coord);
        self.refresh_cuts(coord);
        self.install_meshes(coord, meshes);
        Ok(())
    }

    fn build_chunk_meshes(&self, coord: ChunkCoord, field: &VoxelField) -> Result<ChunkMeshes> {
        let ctx = SurfaceContext {
            chunk_origin: coord.origin(self.grid.voxel_scale),
            voxel_scale: self.grid.voxel_scale,
            terrain: self.terrain.as_ref(),
        };
        build_meshes(field, &ctx, &self.config)
    }

    fn install_meshes(&mut self, coord: ChunkCoord, (meshes, collision): ChunkMeshes) {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };
        chunk.meshes = meshes;
        chunk.collision = collision;

        let visible = chunk.has_visual_mesh();
        self.events.push(ChunkEvent::MeshUpdated { coord, visible });
    }

    fn is_fully_cut_elsewhere(&self, owner: ChunkCoord, texel: &(i32, i32)) -> bool {
        self.chunks
            .iter()
            .any(|(coord, chunk)| *coord != owner && chunk.cuts.full.contains(texel))
    }

    /// Rescan trigger bounds and cut texels, un-cutting texels the chunk no
    /// longer hides unless another chunk still hides them
    fn refresh_cuts(&mut self, coord: ChunkCoord) {
        let mapping = self.grid.texel_mapping(coord);
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };
        let (bounds, cuts) = chunk.scan_near_surface(&mapping);
        chunk.bounds = bounds;
        let old = std::mem::replace(&mut chunk.cuts, cuts);

        let stale: Vec<(i32, i32)> = old
            .full
            .iter()
            .chain(&old.details)
            .filter(|t| !chunk.cuts.full.contains(*t))
            .copied()
            .collect();
        for texel in stale {
            if !self.is_fully_cut_elsewhere(coord, &texel) {
                self.mask.uncut(texel.0, texel.1);
            }
        }

        if let Some(chunk) = self.chunks.get(&coord) {
            for &(x, z) in &chunk.cuts.full {
                self.mask.cut(x, z, false);
            }
            for &(x, z) in &chunk.cuts.details {
                self.mask.cut(x, z, true);
            }
        }
    }

    /// Restore the terrain under a whole chunk column before a reset, then
    /// cut again what chunks outside the reset range still hide there
    fn uncut_column(&mut self, x: i32, z: i32, min_y: i32, max_y: i32) {
        let texels = self.grid.texel_mapping(ChunkCoord::new(x, 0, z)).column_texels();
        for &(tx, tz) in &texels {
            self.mask.uncut(tx, tz);
        }

        let resetting = |c: &ChunkCoord| c.x == x && c.z == z && (min_y..=max_y).contains(&c.y);
        for (coord, chunk) in &self.chunks {
            if resetting(coord) {
                continue;
            }
            for t in chunk.cuts.full.intersection(&texels) {
                self.mask.cut(t.0, t.1, false);
            }
            for t in chunk.cuts.details.intersection(&texels) {
                self.mask.cut(t.0, t.1, true);
            }
        }
    }

    /// Create missing neighbours whose shared face now carries altered geometry
    fn materialize_neighbours(&mut self, outcome: &mut ModifyOutcome) {
        let size = self.grid.chunk_size_in_world();
        let margin = self.config.neighbour_margin;

        let mut wanted: Vec<ChunkCoord> = Vec::new();
        for coord in &outcome.touched {
            let Some(chunk) = self.chunks.get(coord) else {
                continue;
            };
            for dir in DIRECTIONS {
                let neighbour = coord.neighbour(dir);
                if chunk.needs_neighbour(dir, size, margin)
                    && self.grid.contains(neighbour)
                    && !self.chunks.contains_key(&neighbour)
                {
                    wanted.push(neighbour);
                }
            }
        }
        wanted.sort();
        wanted.dedup();

        for coord in wanted {
            log::debug!("Materializing neighbour {coord}");
            match self.create_chunk(coord) {
                Ok(()) => outcome.created.push(coord),
                Err(error) => {
                    log::error!("Failed to mesh neighbour {coord}: {error}");
                    outcome.failures.push(ChunkFailure { coord, error });
                }
            }
        }
    }

    /// No visual mesh and no neighbour needing it across the shared face
    fn is_useless(&self, coord: ChunkCoord) -> bool {
        let Some(chunk) = self.chunks.get(&coord) else {
            return false;
        };
        if chunk.has_visual_mesh() {
            return false;
        }
        let size = self.grid.chunk_size_in_world();
        let margin = self.config.neighbour_margin;
        !DIRECTIONS.iter().any(|&dir| {
            self.chunks
                .get(&coord.neighbour(dir))
                .is_some_and(|n| n.needs_neighbour(-dir, size, margin))
        })
    }

    fn remove_useless_chunks(&mut self, outcome: &mut ModifyOutcome) {
        let mut candidates: HashSet<ChunkCoord> = outcome.created.iter().copied().collect();
        for coord in &outcome.touched {
            candidates.insert(*coord);
            candidates.extend(DIRECTIONS.iter().map(|&dir| coord.neighbour(dir)));
        }
        let mut useless: Vec<ChunkCoord> = candidates.into_iter().filter(|c| self.is_useless(*c)).collect();
        useless.sort();

        for coord in useless {
            match self.remove_chunk(coord) {
                Ok(()) => outcome.removed.push(coord),
                Err(error) => {
                    log::error!("Failed to remove chunk {coord}: {error}");
                    outcome.failures.push(ChunkFailure { coord, error });
                }
            }
        }
    }

    fn remove_chunk(&mut self, coord: ChunkCoord) -> Result<()> {
        self.store.record_undo_if_needed(coord)?;
        let Some(chunk) = self.chunks.remove(&coord) else {
            return Ok(());
        };
        for texel in chunk.cuts.full.iter().chain(&chunk.cuts.details) {
            if !self.is_fully_cut_elsewhere(coord, texel) {
                self.mask.uncut(texel.0, texel.1);
            }
        }
        self.invalidator.forget(&coord);
        self.pending_deletions.insert(coord);
        self.events.push(ChunkEvent::Removed(coord));
        log::debug!("Removed useless chunk {coord}");
        Ok(())
    }

    /// Write every edit since the last call as one undo step. Returns the
    /// persisted version.
    pub fn persist_and_record_undo(&mut self) -> Result<i64> {
        let started = Instant::now();
        let dirty = self.invalidator.take_dirty_chunks();
        let deleted: Vec<ChunkCoord> = self.pending_deletions.drain().collect();

        let chunks = &self.chunks;
        let written = dirty.iter().filter_map(|coord| {
            chunks.get(coord).map(|chunk| DirtyChunk {
                coord: *coord,
                field: &chunk.field,
                bounds: &chunk.bounds,
            })
        });
        let result = self
            .store
            .commit(written, deleted.iter().copied(), chunks.keys().copied(), &self.mask);

        match result {
            Ok(version) => {
                log::info!(
                    "Persisted {} dirty chunks as version {version} in {:.1}ms",
                    dirty.len(),
                    started.elapsed().as_secs_f64() * 1000.0
                );
                Ok(version)
            }
            Err(error) => {
                for coord in dirty {
                    self.invalidator.mark_chunk_dirty(coord);
                }
                self.pending_deletions.extend(deleted);
                Err(error)
            }
        }
    }

    /// Step back one version.
    ///
    /// Pending edits are discarded first: with any in flight, undo returns to
    /// the last persisted state instead of the version before it.
    pub fn undo(&mut self) -> Result<UndoOutcome> {
        let started = Instant::now();
        let pending = self.has_pending_edits();
        let Some(manifest) = self.store.undo(pending)? else {
            log::warn!("Nothing to undo at version {}", self.store.version());
            return Ok(UndoOutcome::NothingToUndo);
        };

        let reload = self.reload_from_store(Some(&manifest))?;
        log::info!(
            "Undo restored version {} ({} chunks, {} failed) in {:.1}ms",
            manifest.version,
            reload.loaded.len(),
            reload.failures.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(UndoOutcome::Restored {
            version: manifest.version,
            reload,
        })
    }

    /// Rebuild the chunk set from the persisted state, discarding pending edits
    pub fn reload(&mut self) -> Result<ReloadOutcome> {
        let manifest = self.store.manifest(self.store.committed_version())?;
        if manifest.is_none() {
            log::warn!("No manifest for version {}, loading every chunk file", self.store.committed_version());
        }
        self.reload_from_store(manifest.as_ref())
    }

    fn reload_from_store(&mut self, manifest: Option<&VersionManifest>) -> Result<ReloadOutcome> {
        let alive: Option<HashSet<ChunkCoord>> = match manifest {
            Some(m) => {
                let path = VersionManifest::path(self.store.dir(), m.version);
                Some(m.alive_coords(&path)?.into_iter().collect())
            }
            None => None,
        };

        self.mask = CutoutMask::from_terrain(self.terrain.as_ref());
        if !self.store.load_mask(&mut self.mask)? {
            log::debug!("No persisted cutout mask, starting fully visible");
        }

        for coord in self.chunks.keys() {
            self.events.push(ChunkEvent::Removed(*coord));
        }
        self.chunks.clear();
        self.invalidator.clear();
        self.pending_deletions.clear();

        let mut outcome = ReloadOutcome::default();
        for coord in self.store.persisted_chunks()? {
            if alive.as_ref().is_some_and(|a| !a.contains(&coord)) {
                self.store.delete_chunk(coord)?;
                outcome.removed.push(coord);
                continue;
            }
            if !self.grid.contains(coord) {
                log::warn!("Skipping persisted chunk {coord} outside the terrain chunk grid");
                continue;
            }
            match self.load_chunk(coord) {
                Ok(()) => outcome.loaded.push(coord),
                Err(error) => {
                    log::error!("Failed to load chunk {coord}: {error}");
                    outcome.failures.push(ChunkFailure { coord, error });
                }
            }
        }

        if let Some(alive) = &alive {
            let failed: HashSet<ChunkCoord> = outcome.failures.iter().map(|f| f.coord).collect();
            for coord in alive {
                if !self.chunks.contains_key(coord) && !failed.contains(coord) {
                    log::warn!("Chunk {coord} is listed as alive but has no voxel file");
                }
            }
        }
        Ok(outcome)
    }

    fn load_chunk(&mut self, coord: ChunkCoord) -> Result<()> {
        let Some((field, bounds)) = self.store.load_chunk(coord)? else {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("voxel file of chunk {coord} disappeared"),
            )));
        };
        let heights = HeightCache::sample(self.feeder.as_ref(), coord.voxel_origin());
        let mut chunk = Chunk::new(coord, field, heights);
        let (_, cuts) = chunk.scan_near_surface(&self.grid.texel_mapping(coord));
        chunk.bounds = bounds;
        chunk.cuts = cuts;

        // a chunk that fails to mesh is still loaded so its persisted data survives
        let meshes = self.build_chunk_meshes(coord, &chunk.field);
        self.chunks.insert(coord, chunk);
        self.events.push(ChunkEvent::Created(coord));
        self.install_meshes(coord, meshes?);
        Ok(())
    }

    /// Delete every chunk, all persisted data and the undo history
    pub fn clear(&mut self) -> Result<()> {
        for coord in self.chunks.keys() {
            self.events.push(ChunkEvent::Removed(*coord));
        }
        self.chunks.clear();
        self.invalidator.clear();
        self.pending_deletions.clear();
        self.mask = CutoutMask::from_terrain(self.terrain.as_ref());
        self.store.clear(&self.mask)?;
        log::info!("Cleared all chunks and history in {}", self.store.dir().display());
        Ok(())
    }
}

impl HoleQuery for ChunkManager {
    fn is_in_collider_hole(&self, point: Vec3) -> bool {
        self.chunks.values().any(|chunk| {
            chunk
                .collider_hole(self.grid.chunk_world_origin(chunk.coord))
                .is_some_and(|hole| hole.inflated(HOLE_INFLATION).contains_point(point))
        })
    }
}

type ChunkMeshes = ([Option<ChunkMesh>; LOD_COUNT], Option<ChunkMesh>);

/// Visual meshes for every LOD plus the collision mesh, all or nothing
fn build_meshes(field: &VoxelField, ctx: &SurfaceContext<'_>, config: &EngineConfig) -> Result<ChunkMeshes> {
    let mut meshes: [Option<ChunkMesh>; LOD_COUNT] = Default::default();
    for (lod_index, mesh) in meshes.iter_mut().enumerate() {
        let settings = MeshSettings {
            lod_index,
            isovalue: config.isovalue,
            altered_only: true,
            full_output: true,
            capacity: config.mesh_capacity,
        };
        *mesh = MarchingCubes::new(settings).extract(field, ctx)?;
    }

    let collision = MarchingCubes::new(MeshSettings {
        lod_index: config.collider_lod_index,
        isovalue: config.isovalue,
        altered_only: false,
        full_output: false,
        capacity: config.mesh_capacity,
    })
    .extract(field, ctx)?;
    Ok((meshes, collision))
}

#[cfg(test)]
mod tests;
