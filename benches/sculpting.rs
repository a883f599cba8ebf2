use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use glam::Vec3;
use tempfile::TempDir;

use burrow::core::EngineConfig;
use burrow::terrain::{Heightfield, HeightfieldFeeder};
use burrow::voxel::brush::{Action, BrushShape, BrushStroke};
use burrow::voxel::edit::ModificationKernel;
use burrow::voxel::mesher::{MarchingCubes, MeshSettings, SurfaceContext};
use burrow::voxel::{ChunkManager, HeightCache, VoxelField};

fn rolling_terrain() -> Arc<Heightfield> {
    Arc::new(
        Heightfield::from_fn(97, Vec3::new(96.0, 20.0, 96.0), |x, z| {
            4.0 * (x as f32 * 0.15).sin() + 3.0 * (z as f32 * 0.2).cos()
        })
        .with_position(Vec3::new(-48.0, 0.0, -48.0)),
    )
}

fn surface_chunk(terrain: &Arc<Heightfield>) -> (VoxelField, HeightCache) {
    let feeder = HeightfieldFeeder::new(terrain.clone(), 1);
    let heights = HeightCache::sample(&feeder, glam::IVec3::new(32, -32, 32));
    let field = VoxelField::generate(&heights, -32.0, 1.0);
    (field, heights)
}

fn dig_kernel() -> ModificationKernel {
    ModificationKernel {
        shape: BrushShape::Sphere,
        action: Action::Dig,
        center: Vec3::new(16.0, 32.0, 16.0),
        radius: 6.0,
        radius_with_margin: 8.1,
        intensity: 1.0,
        texture_index: 0,
        altitude: -32.0,
        scale: Vec3::ONE,
        near_surface_epsilon: 0.08,
    }
}

fn bench_kernel_dig(c: &mut Criterion) {
    let terrain = rolling_terrain();
    let (field, heights) = surface_chunk(&terrain);
    let kernel = dig_kernel();

    c.bench_function("kernel_dig_chunk", |b| {
        b.iter_batched(
            || field.clone(),
            |mut f| {
                kernel.apply(black_box(&mut f), &heights);
                f
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_marching_cubes(c: &mut Criterion) {
    let terrain = rolling_terrain();
    let (mut field, heights) = surface_chunk(&terrain);
    dig_kernel().apply(&mut field, &heights);
    let ctx = SurfaceContext {
        chunk_origin: Vec3::new(32.0, -32.0, 32.0),
        voxel_scale: Vec3::ONE,
        terrain: terrain.as_ref(),
    };

    let mut group = c.benchmark_group("marching_cubes");
    for (name, full_output) in [("visual_lod0", true), ("collision_lod0", false)] {
        let mesher = MarchingCubes::new(MeshSettings {
            lod_index: 0,
            isovalue: 0.0,
            altered_only: full_output,
            full_output,
            capacity: 32767,
        });
        group.bench_function(name, |b| {
            b.iter(|| mesher.extract(black_box(&field), &ctx));
        });
    }
    group.finish();
}

fn bench_modify(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let terrain = rolling_terrain();
    let mut manager = ChunkManager::builder(EngineConfig::default())
        .height_feeder(Arc::new(HeightfieldFeeder::new(terrain.clone(), 1)))
        .terrain(terrain)
        .storage_dir(temp.path())
        .build()
        .unwrap();

    let mut step = 0u32;
    c.bench_function("manager_modify_dig", |b| {
        b.iter(|| {
            step = step.wrapping_add(1);
            let x = (step % 40) as f32 - 20.0;
            let stroke = BrushStroke::new(BrushShape::Sphere, Action::Dig, Vec3::new(x, 0.0, 0.0), 2.0)
                .with_intensity(0.2);
            black_box(manager.modify(&stroke).unwrap());
            manager.take_events();
        });
    });
}

criterion_group!(benches, bench_kernel_dig, bench_marching_cubes, bench_modify);
criterion_main!(benches);
