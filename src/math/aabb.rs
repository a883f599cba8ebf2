//! Axis-aligned boxes used for trigger bounds and collider holes

use crate::core::types::Vec3;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Inclusive on every face
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn inflated(&self, amount: f32) -> Aabb {
        Aabb::new(self.min - Vec3::splat(amount), self.max + Vec3::splat(amount))
    }

    pub fn translated(&self, offset: Vec3) -> Aabb {
        Aabb::new(self.min + offset, self.max + offset)
    }
}
