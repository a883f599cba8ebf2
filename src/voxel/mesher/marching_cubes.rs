//! Parallel marching cubes extraction over a chunk's voxel field

use glam::{Vec2, Vec3, Vec4};
use rayon::prelude::*;

use crate::core::{Error, Result};
use crate::math::bilinear;
use crate::terrain::TerrainSurface;
use crate::voxel::field::VoxelField;
use crate::voxel::voxel::{is_near_surface_marker, Alteration, Voxel, MAX_TEXTURE_LAYERS};
use super::buffers::SlotBuffer;
use super::lod::{cell_origins, stride};
use super::mesh::{BlendWeights, ChunkMesh};
use super::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};

/// Endpoint densities closer than this to the isovalue snap the vertex to the corner
const SNAP_EPSILON: f32 = 1e-5;
/// Squared area (or length) below which a triangle is dropped
const DEGENERATE_EPSILON: f32 = 1e-12;

/// What to extract
#[derive(Debug, Clone, Copy)]
pub struct MeshSettings {
    pub lod_index: usize,
    pub isovalue: f32,
    /// Skip cells none of whose corners were altered
    pub altered_only: bool,
    /// Produce UVs, texture blends and terrain-matched normals
    pub full_output: bool,
    /// Maximum vertices and maximum indices
    pub capacity: usize,
}

/// Placement of the chunk on the terrain
#[derive(Clone, Copy)]
pub struct SurfaceContext<'a> {
    /// Terrain-space position of the chunk's first interior voxel
    pub chunk_origin: Vec3,
    pub voxel_scale: Vec3,
    pub terrain: &'a dyn TerrainSurface,
}

#[derive(Clone, Copy)]
struct MeshVertex {
    position: Vec3,
    normal: Vec3,
    uv: Vec2,
    blend: BlendWeights,
    tex_info: i8,
}

/// Marching cubes mesher for one LOD configuration
pub struct MarchingCubes {
    settings: MeshSettings,
}

impl MarchingCubes {
    pub fn new(settings: MeshSettings) -> Self {
        Self { settings }
    }

    /// Extract the isosurface of `field`.
    ///
    /// Returns `Ok(None)` when the surface has no drawable triangle and
    /// [`Error::MeshCapacity`] when either output arena overflows.
    pub fn extract(&self, field: &VoxelField, ctx: &SurfaceContext<'_>) -> Result<Option<ChunkMesh>> {
        let step = stride(self.settings.lod_index);
        let origins: Vec<usize> = cell_origins(step).collect();
        let n = origins.len();

        let vertices = SlotBuffer::<MeshVertex>::with_capacity(self.settings.capacity);
        let triangles = SlotBuffer::<[u32; 3]>::with_capacity(self.settings.capacity / 3);

        (0..n * n * n).into_par_iter().for_each(|cell| {
            let x = origins[cell / (n * n)];
            let y = origins[(cell / n) % n];
            let z = origins[cell % n];
            self.polygonise(field, ctx, [x, y, z], step, &vertices, &triangles);
        });

        if vertices.overflowed() || triangles.overflowed() {
            return Err(Error::MeshCapacity {
                vertices: vertices.claimed(),
                indices: triangles.claimed() * 3,
                capacity: self.settings.capacity,
            });
        }

        let (Some(vertices), Some(triangles)) = (vertices.into_vec(), triangles.into_vec()) else {
            return Err(Error::Mesh("output slot claimed but never written".into()));
        };

        let mut mesh = ChunkMesh {
            positions: vertices.iter().map(|v| v.position).collect(),
            normals: vertices.iter().map(|v| v.normal).collect(),
            indices: triangles.into_iter().flatten().collect(),
            ..Default::default()
        };
        if self.settings.full_output {
            mesh.uvs = vertices.iter().map(|v| v.uv).collect();
            mesh.blend = vertices.iter().map(|v| v.blend).collect();
            mesh.tex_info = vertices.iter().map(|v| v.tex_info).collect();
        }

        Ok((!mesh.is_degenerate()).then_some(mesh))
    }

    fn polygonise(
        &self,
        field: &VoxelField,
        ctx: &SurfaceContext<'_>,
        cell: [usize; 3],
        step: usize,
        vertices: &SlotBuffer<MeshVertex>,
        triangles: &SlotBuffer<[u32; 3]>,
    ) {
        let iso = self.settings.isovalue;
        let corner_index = |i: usize| {
            [
                cell[0] + CORNER_OFFSETS[i][0] * step,
                cell[1] + CORNER_OFFSETS[i][1] * step,
                cell[2] + CORNER_OFFSETS[i][2] * step,
            ]
        };
        let corners: [Voxel; 8] = std::array::from_fn(|i| {
            let [x, y, z] = corner_index(i);
            field.get(x, y, z)
        });

        if self.settings.altered_only && !corners.iter().any(Voxel::is_altered) {
            return;
        }

        let mut case = 0usize;
        for (i, corner) in corners.iter().enumerate() {
            if corner.is_inside(iso) {
                case |= 1 << i;
            }
        }
        let edges = EDGE_TABLE[case];
        if edges == 0 {
            return;
        }

        let mut edge_slots = [u32::MAX; 12];
        let mut edge_positions = [Vec3::ZERO; 12];
        for (e, [a, b]) in EDGE_CORNERS.iter().copied().enumerate() {
            if edges & (1 << e) == 0 {
                continue;
            }
            let (va, vb) = (corners[a], corners[b]);
            let t = crossing(iso, va.value, vb.value);
            let ga = grid_position(corner_index(a));
            let gb = grid_position(corner_index(b));
            let position = ga.lerp(gb, t) * ctx.voxel_scale;

            let nearest = if t < 0.5 { corner_index(a) } else { corner_index(b) };
            let mut normal = gradient(field, nearest, ctx.voxel_scale);

            // the weaker endpoint decides how the vertex is textured
            let tex_info = if va.value.abs() < vb.value.abs() { va.altered } else { vb.altered };

            let mut uv = Vec2::ZERO;
            let mut blend = [Vec4::ZERO; 4];
            if self.settings.full_output {
                let size = ctx.terrain.size();
                uv = Vec2::new(
                    (ctx.chunk_origin.x + position.x) / size.x,
                    (ctx.chunk_origin.z + position.z) / size.z,
                );
                if is_near_surface_marker(tex_info) {
                    blend = terrain_blend(ctx.terrain, uv);
                    normal = ctx.terrain.interpolated_normal(uv.x, uv.y);
                } else {
                    let texture = painted_texture(tex_info);
                    blend = one_hot(texture);
                }
            }

            let Some(slot) = vertices.claim() else {
                return;
            };
            vertices.write(slot, MeshVertex { position, normal, uv, blend, tex_info });
            edge_slots[e] = slot as u32;
            edge_positions[e] = position;
        }

        for triple in TRI_TABLE[case].chunks_exact(3) {
            if triple[0] < 0 {
                break;
            }
            let [e0, e1, e2] = [triple[0] as usize, triple[1] as usize, triple[2] as usize];
            if is_degenerate(edge_positions[e0], edge_positions[e1], edge_positions[e2]) {
                continue;
            }
            let Some(slot) = triangles.claim() else {
                return;
            };
            triangles.write(slot, [edge_slots[e0], edge_slots[e1], edge_slots[e2]]);
        }
    }
}

/// Interpolation parameter of the isovalue crossing between two densities
fn crossing(iso: f32, va: f32, vb: f32) -> f32 {
    if (iso - va).abs() < SNAP_EPSILON {
        return 0.0;
    }
    if (iso - vb).abs() < SNAP_EPSILON {
        return 1.0;
    }
    if (va - vb).abs() < SNAP_EPSILON {
        return 0.0;
    }
    ((iso - va) / (vb - va)).clamp(0.0, 1.0)
}

/// Chunk-local voxel-unit position of a field index (halo shifted out)
#[inline]
fn grid_position(index: [usize; 3]) -> Vec3 {
    Vec3::new(index[0] as f32 - 1.0, index[1] as f32 - 1.0, index[2] as f32 - 1.0)
}

/// Forward-difference density gradient at a sample, pointing outward
fn gradient(field: &VoxelField, [x, y, z]: [usize; 3], scale: Vec3) -> Vec3 {
    let v = field.get(x, y, z).value;
    let d = Vec3::new(
        field.get(x + 1, y, z).value - v,
        field.get(x, y + 1, z).value - v,
        field.get(x, y, z + 1).value - v,
    );
    (d / scale).normalize_or(Vec3::Y)
}

fn is_degenerate(a: Vec3, b: Vec3, c: Vec3) -> bool {
    if a.distance_squared(b) < DEGENERATE_EPSILON
        || b.distance_squared(c) < DEGENERATE_EPSILON
        || a.distance_squared(c) < DEGENERATE_EPSILON
    {
        return true;
    }
    (b - a).cross(c - a).length_squared() < DEGENERATE_EPSILON
}

fn painted_texture(tex_info: i8) -> usize {
    Alteration::from_byte(tex_info)
        .texture()
        .unwrap_or(0) as usize
}

/// Blend vector selecting a single texture layer
fn one_hot(texture: usize) -> BlendWeights {
    let mut blend = [Vec4::ZERO; 4];
    let texture = texture.min(MAX_TEXTURE_LAYERS - 1);
    blend[texture / 4][texture % 4] = 1.0;
    blend
}

/// Terrain alphamap weights at a normalized terrain coordinate, bilinearly filtered
fn terrain_blend(terrain: &dyn TerrainSurface, uv: Vec2) -> BlendWeights {
    let mut blend = [Vec4::ZERO; 4];
    let (width, height) = terrain.alphamap_resolution();
    if width == 0 || height == 0 {
        return blend;
    }
    let layers = terrain.alphamap_layers().min(MAX_TEXTURE_LAYERS);

    let axis = |u: f32, res: u32| -> (u32, u32, f32) {
        if res < 2 {
            return (0, 0, 0.0);
        }
        let splat = u * (res - 1) as f32;
        let i0 = (splat.floor() as i64).clamp(0, res as i64 - 2) as u32;
        (i0, i0 + 1, (splat - i0 as f32).clamp(0.0, 1.0))
    };
    let (x0, x1, tx) = axis(uv.x, width);
    let (z0, z1, tz) = axis(uv.y, height);

    for layer in 0..layers {
        blend[layer / 4][layer % 4] = bilinear(
            terrain.alpha(x0, z0, layer),
            terrain.alpha(x1, z0, layer),
            terrain.alpha(x0, z1, layer),
            terrain.alpha(x1, z1, layer),
            tx,
            tz,
        );
    }
    blend
}
