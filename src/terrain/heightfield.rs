//! In-memory height-field terrain with alphamaps and detail layers

use crate::core::types::Vec3;
use crate::math::bilinear;
use super::surface::TerrainSurface;

/// Per-texel texture blend weights, `layers` weights per texel
#[derive(Clone, Debug)]
pub struct Alphamaps {
    width: u32,
    height: u32,
    layers: usize,
    weights: Vec<f32>,
}

impl Alphamaps {
    /// Every texel fully weighted to `layer`
    pub fn uniform(width: u32, height: u32, layers: usize, layer: usize) -> Self {
        let layers = layers.max(1);
        let mut weights = vec![0.0; (width * height) as usize * layers];
        for texel in weights.chunks_mut(layers) {
            texel[layer.min(layers - 1)] = 1.0;
        }
        Self { width, height, layers, weights }
    }

    pub fn set(&mut self, x: u32, z: u32, layer: usize, weight: f32) {
        let i = self.offset(x, z) + layer;
        self.weights[i] = weight;
    }

    pub fn get(&self, x: u32, z: u32, layer: usize) -> f32 {
        if x >= self.width || z >= self.height || layer >= self.layers {
            return 0.0;
        }
        self.weights[self.offset(x, z) + layer]
    }

    #[inline]
    fn offset(&self, x: u32, z: u32) -> usize {
        (z as usize * self.width as usize + x as usize) * self.layers
    }
}

/// One vegetation density map
#[derive(Clone, Debug, PartialEq)]
pub struct DetailLayer {
    pub width: u32,
    pub height: u32,
    pub density: Vec<u8>,
}

impl DetailLayer {
    pub fn filled(width: u32, height: u32, density: u8) -> Self {
        Self {
            width,
            height,
            density: vec![density; (width * height) as usize],
        }
    }

    pub fn get(&self, x: u32, z: u32) -> u8 {
        if x >= self.width || z >= self.height {
            return 0;
        }
        self.density[(z * self.width + x) as usize]
    }

    pub fn clear(&mut self, x: u32, z: u32) {
        if x < self.width && z < self.height {
            self.density[(z * self.width + x) as usize] = 0;
        }
    }
}

/// Square heightmap terrain
#[derive(Clone, Debug)]
pub struct Heightfield {
    position: Vec3,
    size: Vec3,
    resolution: u32,
    heights: Vec<f32>,
    alphamaps: Alphamaps,
    details: Vec<DetailLayer>,
}

impl Heightfield {
    /// Build from a height function over heightmap sample indices
    pub fn from_fn(resolution: u32, size: Vec3, f: impl Fn(u32, u32) -> f32) -> Self {
        let resolution = resolution.max(2);
        let mut heights = Vec::with_capacity((resolution * resolution) as usize);
        for z in 0..resolution {
            for x in 0..resolution {
                heights.push(f(x, z));
            }
        }
        let alpha_res = resolution - 1;
        Self {
            position: Vec3::ZERO,
            size,
            resolution,
            heights,
            alphamaps: Alphamaps::uniform(alpha_res, alpha_res, 1, 0),
            details: Vec::new(),
        }
    }

    pub fn flat(resolution: u32, size: Vec3, height: f32) -> Self {
        Self::from_fn(resolution, size, |_, _| height)
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_alphamaps(mut self, alphamaps: Alphamaps) -> Self {
        self.alphamaps = alphamaps;
        self
    }

    pub fn with_detail_layer(mut self, layer: DetailLayer) -> Self {
        self.details.push(layer);
        self
    }

    /// Distance between heightmap samples along x and z
    pub fn sample_spacing(&self) -> (f32, f32) {
        let cells = (self.resolution - 1) as f32;
        (self.size.x / cells, self.size.z / cells)
    }

    fn sample(&self, x: i64, z: i64) -> f32 {
        let max = self.resolution as i64 - 1;
        let (x, z) = (x.clamp(0, max), z.clamp(0, max));
        self.heights[(z * (max + 1) + x) as usize]
    }

    /// Height at fractional heightmap sample coordinates, clamped at the edges
    pub fn interpolated_height(&self, x: f32, z: f32) -> f32 {
        let (x0, z0) = (x.floor(), z.floor());
        let (tx, tz) = (x - x0, z - z0);
        let (xi, zi) = (x0 as i64, z0 as i64);
        bilinear(
            self.sample(xi, zi),
            self.sample(xi + 1, zi),
            self.sample(xi, zi + 1),
            self.sample(xi + 1, zi + 1),
            tx,
            tz,
        )
    }

    fn normal_at(&self, x: i64, z: i64) -> Vec3 {
        let (dx, dz) = self.sample_spacing();
        let slope_x = (self.sample(x + 1, z) - self.sample(x - 1, z)) / (2.0 * dx);
        let slope_z = (self.sample(x, z + 1) - self.sample(x, z - 1)) / (2.0 * dz);
        Vec3::new(-slope_x, 1.0, -slope_z).normalize()
    }

    /// Normal at fractional heightmap sample coordinates
    pub fn sample_normal(&self, x: f32, z: f32) -> Vec3 {
        let (x0, z0) = (x.floor(), z.floor());
        let (tx, tz) = (x - x0, z - z0);
        let (xi, zi) = (x0 as i64, z0 as i64);
        let n00 = self.normal_at(xi, zi);
        let n10 = self.normal_at(xi + 1, zi);
        let n01 = self.normal_at(xi, zi + 1);
        let n11 = self.normal_at(xi + 1, zi + 1);
        n00.lerp(n10, tx).lerp(n01.lerp(n11, tx), tz).normalize_or(Vec3::Y)
    }
}

impl TerrainSurface for Heightfield {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn size(&self) -> Vec3 {
        self.size
    }

    fn heightmap_resolution(&self) -> u32 {
        self.resolution
    }

    fn alphamap_resolution(&self) -> (u32, u32) {
        (self.alphamaps.width, self.alphamaps.height)
    }

    fn alphamap_layers(&self) -> usize {
        self.alphamaps.layers
    }

    fn alpha(&self, x: u32, z: u32, layer: usize) -> f32 {
        self.alphamaps.get(x, z, layer)
    }

    fn interpolated_normal(&self, u: f32, v: f32) -> Vec3 {
        let cells = (self.resolution - 1) as f32;
        self.sample_normal(u * cells, v * cells)
    }

    fn detail_layers(&self) -> Vec<DetailLayer> {
        self.details.clone()
    }
}
