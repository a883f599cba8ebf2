//! Applies a brush stroke to one chunk's density field

use glam::{Vec2, Vec3};
use rayon::prelude::*;

use crate::voxel::brush::{Action, BrushShape};
use crate::voxel::field::{coords, HeightCache, VoxelField};
use crate::voxel::voxel::{
    Voxel, NEAR_SURFACE_OFFSET, SURFACE, TEXTURE_OFFSET, UNTOUCHED,
};

/// Per-chunk parameters of a modification, in chunk-local terrain space
#[derive(Debug, Clone, Copy)]
pub struct ModificationKernel {
    pub shape: BrushShape,
    pub action: Action,
    /// Brush center relative to the chunk origin
    pub center: Vec3,
    pub radius: f32,
    /// Radius inflated by the cut margin
    pub radius_with_margin: f32,
    pub intensity: f32,
    pub texture_index: u8,
    /// Terrain-space height of the chunk's first interior voxel layer
    pub altitude: f32,
    /// Voxel spacing per axis
    pub scale: Vec3,
    pub near_surface_epsilon: f32,
}

impl ModificationKernel {
    /// Run the kernel over every voxel of `field` in parallel
    pub fn apply(&self, field: &mut VoxelField, heights: &HeightCache) {
        field.voxels_mut().par_iter_mut().enumerate().for_each(|(i, voxel)| {
            let (xi, yi, zi) = coords(i);
            let local = Vec3::new(xi as f32 - 1.0, yi as f32 - 1.0, zi as f32 - 1.0) * self.scale;
            let original = self.altitude + local.y - heights.height(xi, zi);
            let vertical_normal = heights.vertical_normal(xi, zi);
            *voxel = self.modify(*voxel, local, original, vertical_normal);
        });
    }

    /// New state of one voxel at chunk-local position `local` whose unmodified
    /// terrain value is `original`
    pub fn modify(&self, voxel: Voxel, local: Vec3, original: f32, vertical_normal: f32) -> Voxel {
        let d = self.shape.evaluate(local - self.center, self.radius, self.radius_with_margin);

        let mut value = voxel.value;
        let mut altered = voxel.altered;

        match self.action {
            Action::Dig | Action::Add => {
                let step = self.intensity * original.abs().max(1.0) * d.distance;
                value = if self.action == Action::Dig {
                    value.max(value + step)
                } else {
                    value.min(value - step)
                };

                if d.distance >= 0.0 {
                    altered = TEXTURE_OFFSET + self.texture_index as i8;
                } else if d.flat_distance > 0.0 && altered.abs() < NEAR_SURFACE_OFFSET {
                    altered = SURFACE;
                }
            }
            Action::Paint => {
                if d.distance >= 0.0 {
                    let magnitude = altered.abs();
                    if magnitude >= TEXTURE_OFFSET {
                        altered = TEXTURE_OFFSET + self.texture_index as i8;
                    } else if magnitude >= NEAR_SURFACE_OFFSET {
                        altered = NEAR_SURFACE_OFFSET + self.texture_index as i8;
                    }
                }
            }
            Action::Reset => {
                // circular footprint whatever the shape
                let offset = local - self.center;
                let flat_distance = self.radius_with_margin - Vec2::new(offset.x, offset.z).length();
                if flat_distance >= 0.0 {
                    value = original;
                    let inside_radius = flat_distance > self.radius_with_margin - self.radius;
                    altered = if altered == UNTOUCHED || inside_radius { UNTOUCHED } else { SURFACE };
                }
            }
        }

        if altered != UNTOUCHED {
            altered = self.classify(value, original, altered.abs(), vertical_normal);
        }

        Voxel::new(value, altered)
    }

    /// Re-derive band and polarity of an altered voxel
    fn classify(&self, value: f32, original: f32, mut magnitude: i8, vertical_normal: f32) -> i8 {
        if (value - original).abs() < self.near_surface_epsilon {
            magnitude = SURFACE;
        } else if magnitude >= TEXTURE_OFFSET
            && original.abs() <= 1.0 / vertical_normal.max(0.001) + 0.5
        {
            // steeper terrain widens the near-surface band
            magnitude = magnitude - TEXTURE_OFFSET + NEAR_SURFACE_OFFSET;
        }

        if value > original { -magnitude } else { magnitude }
    }
}
