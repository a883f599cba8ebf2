use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use super::*;
use crate::storage::disk_io::voxel_path;
use crate::terrain::{first_valid_hit, Heightfield, HeightfieldFeeder, HitSurface, RayHit};
use crate::voxel::brush::BrushShape;
use crate::voxel::chunk::TriggerBounds;

/// 96x96 flat terrain centred on the world origin: 3x3 chunk columns of one-unit voxels
fn terrain(height: f32) -> Arc<Heightfield> {
    Arc::new(
        Heightfield::flat(97, Vec3::new(96.0, 10.0, 96.0), height)
            .with_position(Vec3::new(-48.0, 0.0, -48.0)),
    )
}

fn manager_at(dir: &Path) -> ChunkManager {
    manager_with(dir, EngineConfig::default())
}

fn manager_with(dir: &Path, config: EngineConfig) -> ChunkManager {
    let terrain = terrain(0.0);
    ChunkManager::builder(config)
        .height_feeder(Arc::new(HeightfieldFeeder::new(terrain.clone(), 1)))
        .terrain(terrain)
        .storage_dir(dir)
        .build()
        .unwrap()
}

fn fields(manager: &ChunkManager) -> BTreeMap<ChunkCoord, (VoxelField, TriggerBounds)> {
    manager
        .chunks()
        .map(|c| (c.coord, (c.field.clone(), c.bounds)))
        .collect()
}

/// Terrain-space positions of a chunk's LOD 0 vertices
fn terrain_vertices(manager: &ChunkManager, coord: ChunkCoord) -> Vec<Vec3> {
    let origin = coord.origin(manager.grid().voxel_scale);
    manager.chunk(coord).unwrap().meshes[0]
        .as_ref()
        .unwrap()
        .positions
        .iter()
        .map(|p| *p + origin)
        .collect()
}

const CENTER: ChunkCoord = ChunkCoord { x: 1, y: -1, z: 1 };
const ABOVE_CENTER: ChunkCoord = ChunkCoord { x: 1, y: 0, z: 1 };

#[test]
fn test_dig_into_flat_terrain() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());

    let outcome = manager.modify(&BrushStroke::dig(Vec3::ZERO, 2.0)).unwrap();
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.touched, vec![CENTER, ABOVE_CENTER]);
    assert!(outcome.created.contains(&ABOVE_CENTER));

    let chunk = manager.chunk(CENTER).unwrap();
    assert!(chunk.has_visual_mesh());
    assert!(chunk.meshes[0].as_ref().unwrap().triangle_count() >= 1);
    assert!(chunk.collision.is_some());
    assert_eq!(manager.chunk_state(CENTER), ChunkState::Visible);

    // the crater reaches the top face, so the chunk above must stay alive
    let size = manager.grid().chunk_size_in_world();
    assert!(chunk.needs_neighbour(IVec3::Y, size, 4.0));
    assert_eq!(manager.chunk_state(ABOVE_CENTER), ChunkState::Loaded);
    assert!(outcome.removed.is_empty());

    assert!(manager.mask().is_cut(48, 48));
    assert!(!manager.mask().is_cut(10, 10));
    assert!(manager.is_in_collider_hole(Vec3::new(0.0, -0.5, 0.0)));
    assert!(!manager.is_in_collider_hole(Vec3::new(30.0, -0.5, 30.0)));
    assert!(manager.has_pending_edits());
}

#[test]
fn test_terrain_hit_inside_hole_is_ignored() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());
    manager.modify(&BrushStroke::dig(Vec3::ZERO, 2.0)).unwrap();

    let hits = vec![
        RayHit { distance: 5.0, point: Vec3::ZERO, surface: HitSurface::Terrain },
        RayHit { distance: 7.0, point: Vec3::new(0.0, -2.0, 0.0), surface: HitSurface::Voxel },
    ];
    let hit = first_valid_hit(hits, &manager).unwrap();
    assert_eq!(hit.surface, HitSurface::Voxel);

    let far = vec![RayHit { distance: 5.0, point: Vec3::new(30.0, 0.0, 30.0), surface: HitSurface::Terrain }];
    assert_eq!(first_valid_hit(far, &manager).unwrap().surface, HitSurface::Terrain);
}

#[test]
fn test_edit_near_face_materializes_neighbour() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());

    // terrain-space x = 28.4, four units short of the +x face of chunk column 0
    let outcome = manager.modify(&BrushStroke::dig(Vec3::new(-19.6, 0.0, 0.0), 0.5)).unwrap();
    let dug = ChunkCoord::new(0, -1, 1);
    let neighbour = ChunkCoord::new(1, -1, 1);

    assert!(outcome.failures.is_empty());
    assert!(!outcome.touched.contains(&neighbour));
    assert!(outcome.created.contains(&neighbour));
    assert_eq!(manager.chunk_state(dug), ChunkState::Visible);
    assert_eq!(manager.chunk_state(neighbour), ChunkState::Loaded);
}

#[test]
fn test_isolated_chunk_removed_on_revisit() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());
    let coord = ChunkCoord::new(2, 3, 2);

    assert!(manager.ensure_chunk_exists(coord).unwrap());
    assert!(!manager.ensure_chunk_exists(coord).unwrap());
    assert_eq!(manager.chunk_state(coord), ChunkState::Loaded);

    let inside = manager.grid().chunk_world_origin(coord) + Vec3::splat(16.0);
    let paint = BrushStroke::new(BrushShape::Sphere, Action::Paint, inside, 1.0);
    let outcome = manager.modify(&paint).unwrap();

    assert!(outcome.removed.contains(&coord));
    assert_eq!(manager.chunk_state(coord), ChunkState::Unloaded);
    assert_eq!(manager.chunk_count(), 0);
    assert!(manager
        .take_events()
        .contains(&ChunkEvent::Removed(coord)));
}

#[test]
fn test_ensure_chunk_outside_grid_fails() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());
    assert!(matches!(
        manager.ensure_chunk_exists(ChunkCoord::new(3, 0, 0)),
        Err(Error::ChunkOutOfBounds(_))
    ));
    assert!(matches!(
        manager.ensure_chunk_exists(ChunkCoord::new(0, 0, -1)),
        Err(Error::ChunkOutOfBounds(_))
    ));
}

#[test]
fn test_shared_face_vertices_match() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());

    // centred exactly on the plane shared by chunk columns 0 and 1
    manager.modify(&BrushStroke::dig(Vec3::new(-16.0, 0.0, 0.0), 3.0)).unwrap();
    let left = terrain_vertices(&manager, ChunkCoord::new(0, -1, 1));
    let right = terrain_vertices(&manager, ChunkCoord::new(1, -1, 1));

    let on_face = |v: &&Vec3| (v.x - 32.0).abs() < 1e-4;
    let left_face: Vec<Vec3> = left.iter().filter(on_face).copied().collect();
    let right_face: Vec<Vec3> = right.iter().filter(on_face).copied().collect();
    assert!(!left_face.is_empty());

    let matched = |v: &Vec3, others: &[Vec3]| others.iter().any(|o| o.distance(*v) < 1e-4);
    assert!(left_face.iter().all(|v| matched(v, &right_face)));
    assert!(right_face.iter().all(|v| matched(v, &left_face)));
}

#[test]
fn test_reset_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());
    manager.modify(&BrushStroke::dig(Vec3::ZERO, 3.0)).unwrap();
    assert!(manager.mask().cut_count() > 0);

    let reset = BrushStroke::new(BrushShape::Sphere, Action::Reset, Vec3::ZERO, 3.0);
    manager.modify(&reset).unwrap();
    let once = fields(&manager);
    assert_eq!(manager.mask().cut_count(), 0);
    assert!(!manager.is_in_collider_hole(Vec3::new(0.0, -0.5, 0.0)));

    manager.modify(&reset).unwrap();
    assert_eq!(fields(&manager), once);
    assert_eq!(manager.mask().cut_count(), 0);
}

#[test]
fn test_persisted_session_reloads_exactly() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());
    manager.modify(&BrushStroke::dig(Vec3::ZERO, 2.0)).unwrap();
    manager.modify(&BrushStroke::add(Vec3::new(12.0, 1.0, -7.0), 1.5)).unwrap();
    assert_eq!(manager.persist_and_record_undo().unwrap(), 1);
    assert!(!manager.has_pending_edits());

    let saved = fields(&manager);
    let mask = manager.mask().clone();
    let visible = manager.chunk_state(CENTER);
    drop(manager);

    let mut reopened = manager_at(temp.path());
    assert!(reopened.take_load_failures().is_empty());
    assert_eq!(reopened.version(), 2);
    assert_eq!(fields(&reopened), saved);
    assert_eq!(reopened.mask(), &mask);
    assert_eq!(reopened.chunk_state(CENTER), visible);
}

#[test]
fn test_undo_walks_back_each_step() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());

    manager.modify(&BrushStroke::dig(Vec3::ZERO, 2.0)).unwrap();
    manager.persist_and_record_undo().unwrap();
    let first = fields(&manager);
    let first_mask = manager.mask().clone();

    manager.modify(&BrushStroke::dig(Vec3::new(5.0, 0.0, 5.0), 2.0)).unwrap();
    manager.persist_and_record_undo().unwrap();
    let second = fields(&manager);

    manager.modify(&BrushStroke::add(Vec3::ZERO, 1.5).with_intensity(0.5)).unwrap();
    manager.persist_and_record_undo().unwrap();
    assert_eq!(manager.version(), 4);

    assert!(matches!(manager.undo().unwrap(), UndoOutcome::Restored { version: 2, .. }));
    assert_eq!(fields(&manager), second);

    assert!(matches!(manager.undo().unwrap(), UndoOutcome::Restored { version: 1, .. }));
    assert_eq!(fields(&manager), first);
    assert_eq!(manager.mask(), &first_mask);

    // back to the untouched terrain
    match manager.undo().unwrap() {
        UndoOutcome::Restored { version, reload } => {
            assert_eq!(version, 0);
            assert!(reload.loaded.is_empty());
            assert!(reload.removed.contains(&CENTER));
        }
        UndoOutcome::NothingToUndo => panic!("baseline version should be restorable"),
    }
    assert_eq!(manager.chunk_count(), 0);
    assert_eq!(manager.mask().cut_count(), 0);

    assert!(matches!(manager.undo().unwrap(), UndoOutcome::NothingToUndo));
    assert_eq!(manager.version(), 1);
}

#[test]
fn test_undo_discards_pending_edits() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());
    manager.modify(&BrushStroke::dig(Vec3::ZERO, 2.0)).unwrap();
    manager.persist_and_record_undo().unwrap();
    let persisted = fields(&manager);

    manager.modify(&BrushStroke::dig(Vec3::new(30.0, 0.0, 30.0), 2.0)).unwrap();
    manager.modify(&BrushStroke::dig(Vec3::new(1.0, 0.0, 0.0), 1.0)).unwrap();
    assert_ne!(fields(&manager), persisted);

    assert!(matches!(manager.undo().unwrap(), UndoOutcome::Restored { version: 1, .. }));
    assert_eq!(fields(&manager), persisted);
    assert_eq!(manager.version(), 2);
    assert!(!manager.has_pending_edits());
}

#[test]
fn test_new_edit_after_undo_replaces_redo() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());
    manager.modify(&BrushStroke::dig(Vec3::ZERO, 2.0)).unwrap();
    manager.persist_and_record_undo().unwrap();
    let first = fields(&manager);
    manager.modify(&BrushStroke::dig(Vec3::ZERO, 3.0)).unwrap();
    manager.persist_and_record_undo().unwrap();

    manager.undo().unwrap();
    manager.modify(&BrushStroke::add(Vec3::new(-3.0, 0.0, 2.0), 1.0)).unwrap();
    assert_eq!(manager.persist_and_record_undo().unwrap(), 2);

    assert!(matches!(manager.undo().unwrap(), UndoOutcome::Restored { version: 1, .. }));
    assert_eq!(fields(&manager), first);
}

#[test]
fn test_corrupt_chunk_file_is_reported() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());
    manager.modify(&BrushStroke::dig(Vec3::ZERO, 2.0)).unwrap();
    manager.persist_and_record_undo().unwrap();

    fs::write(voxel_path(temp.path(), CENTER), b"not a voxel array").unwrap();
    let outcome = manager.reload().unwrap();
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].coord, CENTER);
    assert!(matches!(outcome.failures[0].error, Error::CorruptFile { .. }));
    assert!(manager.chunk(CENTER).is_none());
    assert!(manager.chunk(ABOVE_CENTER).is_some());

    let mut reopened = manager_at(temp.path());
    let failures = reopened.take_load_failures();
    assert_eq!(failures.len(), 1);
    assert!(reopened.chunk(CENTER).is_none());
}

#[test]
fn test_invalid_strokes_are_rejected_up_front() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());
    manager.take_events();

    assert!(matches!(
        manager.modify(&BrushStroke::dig(Vec3::ZERO, 0.0)),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        manager.modify(&BrushStroke::dig(Vec3::ZERO, 2.0).with_texture(3)),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        manager.modify(&BrushStroke::dig(Vec3::new(f32::NAN, 0.0, 0.0), 2.0)),
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(manager.chunk_count(), 0);
    assert!(manager.take_events().is_empty());
    assert!(!manager.has_pending_edits());
}

#[test]
fn test_missing_collaborators_are_fatal() {
    let temp = TempDir::new().unwrap();
    let terrain = terrain(0.0);

    let no_feeder = ChunkManager::builder(EngineConfig::default())
        .terrain(terrain.clone())
        .storage_dir(temp.path())
        .build();
    assert!(matches!(no_feeder, Err(Error::MissingCollaborator("height feeder"))));

    let no_terrain = ChunkManager::builder(EngineConfig::default())
        .height_feeder(Arc::new(HeightfieldFeeder::new(terrain.clone(), 1)))
        .storage_dir(temp.path())
        .build();
    assert!(matches!(no_terrain, Err(Error::MissingCollaborator(_))));

    let bad_config = EngineConfig { collider_lod_index: 7, ..EngineConfig::default() };
    let invalid = ChunkManager::builder(bad_config)
        .height_feeder(Arc::new(HeightfieldFeeder::new(terrain.clone(), 1)))
        .terrain(terrain)
        .storage_dir(temp.path())
        .build();
    assert!(matches!(invalid, Err(Error::Config(_))));
}

#[test]
fn test_events_and_clear() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());
    manager.modify(&BrushStroke::dig(Vec3::ZERO, 2.0)).unwrap();

    let events = manager.take_events();
    assert!(events.contains(&ChunkEvent::Created(CENTER)));
    assert!(events.contains(&ChunkEvent::MeshUpdated { coord: CENTER, visible: true }));
    assert!(manager.take_events().is_empty());

    manager.persist_and_record_undo().unwrap();
    manager.clear().unwrap();
    let events = manager.take_events();
    assert!(events.contains(&ChunkEvent::Removed(CENTER)));
    assert_eq!(manager.chunk_count(), 0);
    assert_eq!(manager.version(), 1);
    assert_eq!(manager.mask().cut_count(), 0);

    let reopened = manager_at(temp.path());
    assert_eq!(reopened.chunk_count(), 0);
    assert!(reopened.collider_holes().is_empty());
}

#[test]
fn test_mesh_overflow_keeps_previous_chunk_state() {
    let temp = TempDir::new().unwrap();
    // fits the flat collision plane and a small crater, not a radius 5 one
    let config = EngineConfig { mesh_capacity: 6150, ..EngineConfig::default() };
    let mut manager = manager_with(temp.path(), config.clone());
    manager.modify(&BrushStroke::dig(Vec3::ZERO, 1.0)).unwrap();
    manager.persist_and_record_undo().unwrap();
    manager.take_events();

    let before = manager.chunk(CENTER).unwrap();
    let field = before.field.clone();
    let bounds = before.bounds;
    let cuts = before.cuts.clone();
    let meshes = before.meshes.clone();
    let cut_before: Vec<bool> = cuts.full.iter().map(|t| manager.mask().is_cut(t.0, t.1)).collect();

    let outcome = manager.modify(&BrushStroke::dig(Vec3::ZERO, 5.0)).unwrap();
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].coord, CENTER);
    assert!(matches!(outcome.failures[0].error, Error::MeshCapacity { capacity: 6150, .. }));

    let after = manager.chunk(CENTER).unwrap();
    assert_eq!(after.field, field);
    assert_eq!(after.bounds, bounds);
    assert_eq!(after.cuts, cuts);
    assert_eq!(after.meshes, meshes);
    assert!(!manager.invalidator.is_chunk_dirty(&CENTER));
    let cut_after: Vec<bool> = cuts.full.iter().map(|t| manager.mask().is_cut(t.0, t.1)).collect();
    assert_eq!(cut_after, cut_before);
    assert!(!manager
        .take_events()
        .contains(&ChunkEvent::MeshUpdated { coord: CENTER, visible: true }));

    // the chunk above was still edited
    assert!(outcome.touched.contains(&ABOVE_CENTER));
    assert!(
        manager.invalidator.is_chunk_dirty(&ABOVE_CENTER) || outcome.removed.contains(&ABOVE_CENTER)
    );

    manager.persist_and_record_undo().unwrap();
    drop(manager);
    let reopened = manager_with(temp.path(), config);
    assert_eq!(reopened.chunk(CENTER).unwrap().field, field);
}

#[test]
fn test_stroke_reach_is_bounded_by_terrain() {
    let temp = TempDir::new().unwrap();
    let mut manager = manager_at(temp.path());

    assert!(matches!(
        manager.modify(&BrushStroke::dig(Vec3::ZERO, 500.0)),
        Err(Error::InvalidInput(_))
    ));
    let tall = BrushStroke::new(
        BrushShape::Stalagmite { height: 200.0, upside_down: false },
        Action::Add,
        Vec3::ZERO,
        2.0,
    );
    assert!(matches!(manager.modify(&tall), Err(Error::InvalidInput(_))));

    let outside = manager.modify(&BrushStroke::dig(Vec3::new(500.0, 0.0, 500.0), 2.0)).unwrap();
    assert!(outside.touched.is_empty());
    assert_eq!(manager.chunk_count(), 0);
}
