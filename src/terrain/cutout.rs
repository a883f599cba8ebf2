//! Transparency mask punching holes in the terrain where voxel meshes replace it

use std::path::Path;

use image::{GrayImage, Luma};

use crate::core::{Error, Result};
use super::heightfield::DetailLayer;
use super::surface::TerrainSurface;

/// Alpha value of a visible texel
pub const VISIBLE: u8 = 255;
/// Alpha value of a hidden texel
pub const HIDDEN: u8 = 0;

/// Per-texel visibility of the terrain surface plus the vegetation maps it hides
#[derive(Clone, Debug, PartialEq)]
pub struct CutoutMask {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
    details: Vec<DetailLayer>,
}

impl CutoutMask {
    /// Fully visible mask
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            alpha: vec![VISIBLE; (width * height) as usize],
            details: Vec::new(),
        }
    }

    /// Mask sized to the terrain's alphamap, carrying its detail layers
    pub fn from_terrain(terrain: &dyn TerrainSurface) -> Self {
        let (width, height) = terrain.alphamap_resolution();
        Self {
            details: terrain.detail_layers(),
            ..Self::new(width, height)
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn offset(&self, x: i32, z: i32) -> Option<usize> {
        if x < 0 || z < 0 || x as u32 >= self.width || z as u32 >= self.height {
            return None;
        }
        Some(z as usize * self.width as usize + x as usize)
    }

    /// Hide the terrain at an alphamap texel (unless `details_only`) and clear
    /// the vegetation covering it. Out-of-range texels are ignored.
    pub fn cut(&mut self, x: i32, z: i32, details_only: bool) {
        let Some(i) = self.offset(x, z) else {
            return;
        };
        if !details_only {
            self.alpha[i] = HIDDEN;
        }

        let (aw, ah) = (self.width, self.height);
        for layer in &mut self.details {
            let block_w = (layer.width / aw).max(1);
            let block_h = (layer.height / ah).max(1);
            let dx = x as u32 * layer.width / aw;
            let dz = z as u32 * layer.height / ah;
            for oz in 0..block_h {
                for ox in 0..block_w {
                    layer.clear(dx + ox, dz + oz);
                }
            }
        }
    }

    /// Make a texel visible again
    pub fn uncut(&mut self, x: i32, z: i32) {
        if let Some(i) = self.offset(x, z) {
            self.alpha[i] = VISIBLE;
        }
    }

    pub fn is_cut(&self, x: i32, z: i32) -> bool {
        self.offset(x, z).is_some_and(|i| self.alpha[i] == HIDDEN)
    }

    pub fn cut_count(&self) -> usize {
        self.alpha.iter().filter(|&&a| a == HIDDEN).count()
    }

    pub fn detail_layers(&self) -> &[DetailLayer] {
        &self.details
    }

    /// Length-prefixed raw alpha buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.alpha.len());
        bytes.extend_from_slice(&(self.alpha.len() as i32).to_le_bytes());
        bytes.extend_from_slice(&self.alpha);
        bytes
    }

    /// Replace the alpha buffer from [`Self::to_bytes`] output. `path` names the
    /// source in errors.
    pub fn load_bytes(&mut self, bytes: &[u8], path: &Path) -> Result<()> {
        let Some((prefix, pixels)) = bytes.split_first_chunk::<4>() else {
            return Err(Error::corrupt(path, "missing length prefix"));
        };
        let len = i32::from_le_bytes(*prefix);
        if len < 0 || len as usize != pixels.len() || pixels.len() != self.alpha.len() {
            return Err(Error::corrupt(
                path,
                format!("mask holds {} texels, expected {}", len, self.alpha.len()),
            ));
        }
        self.alpha.copy_from_slice(pixels);
        Ok(())
    }

    /// Grayscale image for the host terrain material, row per z
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, z| {
            Luma([self.alpha[(z * self.width + x) as usize]])
        })
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_image().save(path.as_ref())?;
        Ok(())
    }
}
