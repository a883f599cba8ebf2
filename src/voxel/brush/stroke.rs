//! Edit requests entering the chunk manager

use glam::Vec3;

use crate::core::{Error, Result};
use super::primitive::BrushShape;

/// What an edit does to the density field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Add material
    Add,
    /// Remove material
    Dig,
    /// Repaint already altered surfaces
    Paint,
    /// Restore the original terrain
    Reset,
}

/// One sculpting edit in world space
#[derive(Debug, Clone, PartialEq)]
pub struct BrushStroke {
    pub shape: BrushShape,
    pub action: Action,
    /// World-space brush center
    pub position: Vec3,
    pub radius: f32,
    pub intensity: f32,
    /// Texture layer written into altered voxels
    pub texture_index: u8,
}

impl BrushStroke {
    pub fn new(shape: BrushShape, action: Action, position: Vec3, radius: f32) -> Self {
        Self {
            shape,
            action,
            position,
            radius,
            intensity: 1.0,
            texture_index: 0,
        }
    }

    /// Sphere dig at full intensity
    pub fn dig(position: Vec3, radius: f32) -> Self {
        Self::new(BrushShape::Sphere, Action::Dig, position, radius)
    }

    /// Sphere add at full intensity
    pub fn add(position: Vec3, radius: f32) -> Self {
        Self::new(BrushShape::Sphere, Action::Add, position, radius)
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn with_texture(mut self, texture_index: u8) -> Self {
        self.texture_index = texture_index;
        self
    }

    /// Reject malformed strokes before any chunk is touched
    pub fn validate(&self, texture_layers: usize) -> Result<()> {
        if !(self.radius > 0.0) || !self.radius.is_finite() {
            return Err(Error::InvalidInput(format!("brush radius must be positive, got {}", self.radius)));
        }
        if !self.position.is_finite() {
            return Err(Error::InvalidInput("brush position is not finite".into()));
        }
        if !self.intensity.is_finite() || self.intensity < 0.0 {
            return Err(Error::InvalidInput(format!("intensity must be non-negative, got {}", self.intensity)));
        }
        if self.texture_index as usize >= texture_layers {
            return Err(Error::InvalidInput(format!(
                "texture index {} out of range (terrain has {} layers)",
                self.texture_index, texture_layers
            )));
        }
        if let BrushShape::Stalagmite { height, .. } = self.shape {
            if !height.is_finite() || height < 0.0 {
                return Err(Error::InvalidInput(format!("cone height must be non-negative, got {height}")));
            }
        }
        Ok(())
    }
}
