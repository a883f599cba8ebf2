//! Sculpting demo: digs a tunnel into synthetic hills and persists the session.
//!
//! Usage: cargo run --release --bin sculpt_demo -- [OPTIONS]
//!
//! Options:
//!   --dir <PATH>      Session directory (default: "sculpt_session")
//!   --config <FILE>   Engine configuration JSON (default: built-in values)
//!   --radius <R>      Brush radius in world units (default: 3.0)
//!   --undo            Step back one version instead of sculpting
//!
//! Output structure:
//!   <dir>/
//!     Chunk_1_-1_1.vox        # Voxel values and alteration bytes
//!     Chunk_1_-1_1.vom        # Trigger bounds
//!     version_1.ver           # Alive chunks of each version
//!     cutout.mask             # Terrain visibility mask
//!     cutout.png              # Mask preview

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;

use burrow::core::{logging, EngineConfig, Result};
use burrow::terrain::{Heightfield, HeightfieldFeeder};
use burrow::voxel::brush::{Action, BrushShape, BrushStroke};
use burrow::voxel::{ChunkManager, UndoOutcome};

fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let dir = PathBuf::from(parse_str_arg(&args, "--dir").unwrap_or_else(|| "sculpt_session".to_string()));
    let radius = parse_f32_arg(&args, "--radius").unwrap_or(3.0);
    let config = match parse_str_arg(&args, "--config") {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    println!("=== Burrow Sculpt Demo ===");
    println!("Session: {}", dir.display());
    println!("Radius:  {}", radius);
    println!();

    let terrain = Arc::new(
        Heightfield::from_fn(129, Vec3::new(128.0, 40.0, 128.0), |x, z| {
            6.0 + 5.0 * (x as f32 * 0.08).sin() * (z as f32 * 0.05).cos()
        })
        .with_position(Vec3::new(-64.0, 0.0, -64.0)),
    );
    let mut manager = ChunkManager::builder(config.clone())
        .height_feeder(Arc::new(HeightfieldFeeder::new(terrain.clone(), config.resolution_mult)))
        .terrain(terrain)
        .storage_dir(&dir)
        .build()?;
    for failure in manager.take_load_failures() {
        println!("  could not restore {}: {}", failure.coord, failure.error);
    }
    println!("Restored {} chunks at version {}", manager.chunk_count(), manager.version());

    if args.iter().any(|a| a == "--undo") {
        match manager.undo()? {
            UndoOutcome::NothingToUndo => println!("Nothing to undo"),
            UndoOutcome::Restored { version, reload } => {
                println!("Restored version {} ({} chunks)", version, reload.loaded.len())
            }
        }
        manager.mask().save_png(dir.join("cutout.png"))?;
        return Ok(());
    }

    let start = Instant::now();
    let mut touched = 0;
    for step in 0..12 {
        let t = step as f32 / 11.0;
        let position = Vec3::new(-30.0 + 60.0 * t, 6.0 - 8.0 * t, 10.0 * (t * 6.0).sin());
        let outcome = manager.modify(&BrushStroke::dig(position, radius))?;
        touched += outcome.touched.len();
        for failure in &outcome.failures {
            println!("  chunk {} failed: {}", failure.coord, failure.error);
        }
    }

    let pillar = BrushStroke::new(
        BrushShape::Stalagmite { height: 8.0, upside_down: false },
        Action::Add,
        Vec3::new(20.0, 4.0, -20.0),
        radius,
    );
    manager.modify(&pillar)?;
    manager.modify(&BrushStroke::new(BrushShape::Sphere, Action::Paint, Vec3::new(0.0, 2.0, 0.0), radius * 2.0))?;

    let version = manager.persist_and_record_undo()?;
    let elapsed = start.elapsed();

    let triangles: usize = manager
        .chunks()
        .filter_map(|c| c.meshes[0].as_ref())
        .map(|m| m.triangle_count())
        .sum();
    manager.mask().save_png(dir.join("cutout.png"))?;

    println!();
    println!("Strokes touched {} chunk visits in {:.1}ms", touched, elapsed.as_secs_f64() * 1000.0);
    println!("Loaded chunks:  {}", manager.chunk_count());
    println!("LOD 0 triangles: {}", triangles);
    println!("Cut texels:     {}", manager.mask().cut_count());
    println!("Collider holes: {}", manager.collider_holes().len());
    println!("Persisted as version {}", version);
    Ok(())
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
