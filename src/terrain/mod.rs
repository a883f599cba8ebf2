//! Height-field terrain collaborators: height sampling, surface textures,
//! the cutout mask and hole-aware raycast filtering

pub mod feeder;
pub mod surface;
pub mod heightfield;
pub mod cutout;
pub mod raycast;

pub use feeder::{HeightFeeder, HeightfieldFeeder};
pub use surface::TerrainSurface;
pub use heightfield::{Alphamaps, DetailLayer, Heightfield};
pub use cutout::CutoutMask;
pub use raycast::{first_valid_hit, HitSurface, HoleQuery, RayHit};
