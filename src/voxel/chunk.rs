//! Chunks: the unit of voxel storage, meshing and persistence

use std::collections::HashSet;
use std::fmt;

use glam::{IVec3, Vec3};

use crate::math::Aabb;
use super::field::{coords, HeightCache, VoxelField, CELLS_PER_CHUNK, SIZE_VOX};
use super::mesher::{ChunkMesh, LOD_COUNT};

/// Unit steps to the six face neighbours
pub const DIRECTIONS: [IVec3; 6] = [
    IVec3::new(-1, 0, 0),
    IVec3::new(1, 0, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, 0, -1),
    IVec3::new(0, 0, 1),
];

const NAME_PREFIX: &str = "Chunk_";

/// Integer coordinate identifying a chunk in the chunk grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn from_ivec3(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }

    pub fn to_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }

    /// First interior voxel of this chunk in the voxel grid
    pub fn voxel_origin(self) -> IVec3 {
        self.to_ivec3() * CELLS_PER_CHUNK as i32
    }

    /// Terrain-space position of the chunk's first interior voxel
    pub fn origin(self, voxel_scale: Vec3) -> Vec3 {
        self.voxel_origin().as_vec3() * voxel_scale
    }

    pub fn neighbour(self, direction: IVec3) -> Self {
        Self::from_ivec3(self.to_ivec3() + direction)
    }

    /// File-system friendly name, `Chunk_<x>_<y>_<z>`
    pub fn name(self) -> String {
        format!("{NAME_PREFIX}{}_{}_{}", self.x, self.y, self.z)
    }

    /// Parse a name produced by [`Self::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        let mut parts = name.strip_prefix(NAME_PREFIX)?.split('_');
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        let z = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(x, y, z))
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Chunk-local box around voxels altered near the original surface.
///
/// A virgin record has seen no such voxel yet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerBounds {
    pub virgin: bool,
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for TriggerBounds {
    fn default() -> Self {
        Self {
            virgin: true,
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

impl TriggerBounds {
    pub fn extend(&mut self, point: Vec3) {
        if self.virgin {
            self.virgin = false;
            self.min = point;
            self.max = point;
        } else {
            self.min = self.min.min(point);
            self.max = self.max.max(point);
        }
    }

    pub fn aabb(&self) -> Option<Aabb> {
        (!self.virgin).then(|| Aabb::new(self.min, self.max))
    }

    /// Altered geometry reaches within `margin` of the face in `direction`
    pub fn reaches_face(&self, direction: IVec3, size_in_world: Vec3, margin: f32) -> bool {
        if self.virgin {
            return false;
        }
        let far = size_in_world - Vec3::splat(margin);
        let axis_hit = |d: i32, min: f32, max: f32, far: f32| match d {
            d if d < 0 => min <= margin,
            d if d > 0 => max >= far,
            _ => true,
        };
        axis_hit(direction.x, self.min.x, self.max.x, far.x)
            && axis_hit(direction.y, self.min.y, self.max.y, far.y)
            && axis_hit(direction.z, self.min.z, self.max.z, far.z)
    }
}

/// How a chunk's voxels map onto cutout mask texels
#[derive(Clone, Copy, Debug)]
pub struct TexelMapping {
    /// Terrain-space chunk origin
    pub origin: Vec3,
    pub voxel_scale: Vec3,
    pub terrain_size: Vec3,
    pub alpha_resolution: (u32, u32),
    /// Half width of the texel block cut per voxel
    pub cut_size: i32,
}

impl TexelMapping {
    /// Texels under every voxel column of the chunk, halo included
    pub fn column_texels(&self) -> HashSet<(i32, i32)> {
        let mut texels = HashSet::new();
        for xi in 0..SIZE_VOX {
            for zi in 0..SIZE_VOX {
                let local = Vec3::new(xi as f32 - 1.0, 0.0, zi as f32 - 1.0) * self.voxel_scale;
                texels.insert(self.texel(local));
            }
        }
        texels
    }

    fn texel(&self, local: Vec3) -> (i32, i32) {
        let p = (self.origin + local) / self.terrain_size;
        (
            (p.x * self.alpha_resolution.0 as f32) as i32,
            (p.z * self.alpha_resolution.1 as f32) as i32,
        )
    }
}

/// Texels a chunk hides, split by cut kind
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CutSet {
    /// Terrain surface and details hidden
    pub full: HashSet<(i32, i32)>,
    /// Only details hidden
    pub details: HashSet<(i32, i32)>,
}

/// Lifecycle state of a chunk as seen by the host
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    Unloaded,
    /// Loaded without a visible mesh
    Loaded,
    /// Loaded with a visible mesh
    Visible,
}

/// One loaded chunk
#[derive(Debug)]
pub struct Chunk {
    pub coord: ChunkCoord,
    pub field: VoxelField,
    pub heights: HeightCache,
    pub bounds: TriggerBounds,
    /// Visual meshes per LOD, `None` when the surface is empty
    pub meshes: [Option<ChunkMesh>; LOD_COUNT],
    pub collision: Option<ChunkMesh>,
    pub cuts: CutSet,
}

impl Chunk {
    pub fn new(coord: ChunkCoord, field: VoxelField, heights: HeightCache) -> Self {
        Self {
            coord,
            field,
            heights,
            bounds: TriggerBounds::default(),
            meshes: Default::default(),
            collision: None,
            cuts: CutSet::default(),
        }
    }

    pub fn has_visual_mesh(&self) -> bool {
        self.meshes[0].is_some()
    }

    pub fn state(&self) -> ChunkState {
        if self.has_visual_mesh() { ChunkState::Visible } else { ChunkState::Loaded }
    }

    /// The neighbour in `direction` must exist because altered geometry
    /// reaches the shared face
    pub fn needs_neighbour(&self, direction: IVec3, size_in_world: Vec3, margin: f32) -> bool {
        self.has_visual_mesh() && self.bounds.reaches_face(direction, size_in_world, margin)
    }

    /// Rescan the field for voxels altered near the original surface,
    /// returning fresh trigger bounds and the texels they cut
    pub fn scan_near_surface(&self, mapping: &TexelMapping) -> (TriggerBounds, CutSet) {
        let mut bounds = TriggerBounds::default();
        let mut cuts = CutSet::default();
        let cut_size = mapping.cut_size.max(1);

        for (i, voxel) in self.field.voxels().iter().enumerate() {
            let below = voxel.is_altered_near_below_surface();
            if !below && !voxel.is_altered_near_above_surface() {
                continue;
            }
            let (xi, yi, zi) = coords(i);
            let local = Vec3::new(xi as f32 - 1.0, yi as f32 - 1.0, zi as f32 - 1.0) * mapping.voxel_scale;
            bounds.extend(local);

            let (tx, tz) = mapping.texel(local);
            for ox in -cut_size..cut_size {
                for oz in -cut_size..cut_size {
                    let texel = (tx + ox, tz + oz);
                    if below {
                        cuts.full.insert(texel);
                    } else {
                        cuts.details.insert(texel);
                    }
                }
            }
        }
        // a texel hidden fully does not also need a details-only cut
        cuts.details.retain(|t| !cuts.full.contains(t));
        (bounds, cuts)
    }

    /// World-space hole volume this chunk punches into the terrain collider
    pub fn collider_hole(&self, world_origin: Vec3) -> Option<Aabb> {
        self.bounds.aabb().map(|b| b.translated(world_origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::HeightFeeder;
    use crate::voxel::voxel::{Voxel, NEAR_SURFACE_OFFSET};

    struct Flat;

    impl HeightFeeder for Flat {
        fn height(&self, _x: i32, _z: i32) -> f32 {
            8.0
        }
        fn vertical_normal(&self, _x: i32, _z: i32) -> f32 {
            1.0
        }
    }

    fn flat_chunk(coord: ChunkCoord) -> Chunk {
        let heights = HeightCache::sample(&Flat, coord.voxel_origin());
        let field = VoxelField::generate(&heights, coord.voxel_origin().y as f32, 1.0);
        Chunk::new(coord, field, heights)
    }

    #[test]
    fn test_name_roundtrip() {
        let coord = ChunkCoord::new(3, -1, 12);
        assert_eq!(coord.name(), "Chunk_3_-1_12");
        assert_eq!(ChunkCoord::from_name(&coord.name()), Some(coord));
        assert_eq!(ChunkCoord::from_name("Chunk_1_2"), None);
        assert_eq!(ChunkCoord::from_name("Chunk_1_2_3_4"), None);
        assert_eq!(ChunkCoord::from_name("Other_1_2_3"), None);
    }

    #[test]
    fn test_origin_and_neighbour() {
        let coord = ChunkCoord::new(1, -1, 2);
        assert_eq!(coord.voxel_origin(), IVec3::new(32, -32, 64));
        assert_eq!(coord.origin(Vec3::new(0.5, 1.0, 0.5)), Vec3::new(16.0, -32.0, 32.0));
        assert_eq!(coord.neighbour(IVec3::new(0, 1, 0)), ChunkCoord::new(1, 0, 2));
    }

    #[test]
    fn test_bounds_reach_faces() {
        let size = Vec3::splat(32.0);
        let mut bounds = TriggerBounds::default();
        assert!(!bounds.reaches_face(IVec3::X, size, 4.0));

        bounds.extend(Vec3::new(14.0, 2.0, 14.0));
        bounds.extend(Vec3::new(18.0, 6.0, 18.0));
        assert!(bounds.reaches_face(IVec3::NEG_Y, size, 4.0));
        assert!(!bounds.reaches_face(IVec3::Y, size, 4.0));
        assert!(!bounds.reaches_face(IVec3::X, size, 4.0));
        assert!(!bounds.reaches_face(IVec3::NEG_Z, size, 4.0));

        bounds.extend(Vec3::new(29.0, 6.0, 18.0));
        assert!(bounds.reaches_face(IVec3::X, size, 4.0));
    }

    #[test]
    fn test_scan_near_surface() {
        let mut chunk = flat_chunk(ChunkCoord::new(0, 0, 0));
        chunk.field.set(5, 9, 7, Voxel::new(0.5, -(NEAR_SURFACE_OFFSET + 1)));
        chunk.field.set(20, 9, 7, Voxel::new(-0.5, NEAR_SURFACE_OFFSET));

        let mapping = TexelMapping {
            origin: Vec3::ZERO,
            voxel_scale: Vec3::ONE,
            terrain_size: Vec3::new(64.0, 1.0, 64.0),
            alpha_resolution: (64, 64),
            cut_size: 1,
        };
        let (bounds, cuts) = chunk.scan_near_surface(&mapping);

        assert!(!bounds.virgin);
        assert_eq!(bounds.min, Vec3::new(4.0, 8.0, 6.0));
        assert_eq!(bounds.max, Vec3::new(19.0, 8.0, 6.0));
        assert_eq!(cuts.full.len(), 4);
        assert!(cuts.full.contains(&(3, 5)));
        assert!(cuts.full.contains(&(4, 6)));
        assert_eq!(cuts.details.len(), 4);
        assert!(cuts.details.contains(&(19, 6)));
    }

    #[test]
    fn test_unaltered_chunk_needs_nothing() {
        let chunk = flat_chunk(ChunkCoord::new(0, 0, 0));
        assert_eq!(chunk.state(), ChunkState::Loaded);
        for dir in DIRECTIONS {
            assert!(!chunk.needs_neighbour(dir, Vec3::splat(32.0), 4.0));
        }
    }

    #[test]
    fn test_column_texels_cover_halo() {
        let mapping = TexelMapping {
            origin: Vec3::new(32.0, 0.0, 0.0),
            voxel_scale: Vec3::ONE,
            terrain_size: Vec3::new(128.0, 1.0, 128.0),
            alpha_resolution: (128, 128),
            cut_size: 1,
        };
        let texels = mapping.column_texels();
        assert_eq!(texels.len(), SIZE_VOX * SIZE_VOX);
        assert!(texels.contains(&(31, -1)));
        assert!(texels.contains(&(65, 33)));
        assert!(!texels.contains(&(66, 0)));
    }
}
