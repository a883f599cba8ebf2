//! Raycast filtering against collider holes
//!
//! The host physics layer still sees the original terrain collider under a
//! dug hole. A terrain hit that lands inside a hole is not real and the next
//! closest hit is used instead.

use crate::core::types::Vec3;

/// What a ray hit reported by the host physics layer struck
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitSurface {
    /// The original height-field collider
    Terrain,
    /// A voxel chunk collision mesh
    Voxel,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub point: Vec3,
    pub surface: HitSurface,
}

/// Answers whether a world point lies inside a collider hole
pub trait HoleQuery {
    fn is_in_collider_hole(&self, point: Vec3) -> bool;
}

/// Closest hit that is not a terrain hit inside a hole
pub fn first_valid_hit(mut hits: Vec<RayHit>, holes: &impl HoleQuery) -> Option<RayHit> {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.into_iter()
        .find(|hit| hit.surface != HitSurface::Terrain || !holes.is_in_collider_hole(hit.point))
}
