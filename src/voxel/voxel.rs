//! Voxel data type and the alteration tag carried by each sample

/// Alteration magnitude of a voxel nothing has touched
pub const UNTOUCHED: i8 = 0;
/// Alteration magnitude of a voxel that was touched but still lies on the original surface
pub const SURFACE: i8 = 1;
/// First magnitude of the near-surface texture band
pub const NEAR_SURFACE_OFFSET: i8 = 2;
/// First magnitude of the deep texture band
pub const TEXTURE_OFFSET: i8 = NEAR_SURFACE_OFFSET + MAX_TEXTURE_LAYERS as i8;
/// Texture layers addressable by the alteration byte
pub const MAX_TEXTURE_LAYERS: usize = 16;

/// Bytes per voxel in the persisted format (f32 value + i8 altered, no padding)
pub const PACKED_SIZE: usize = 5;

/// Which side of the original terrain surface an altered voxel ended up on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    /// Value at or below the original terrain value (material added)
    Filled,
    /// Value above the original terrain value (material removed)
    Carved,
}

/// Classification band of an alteration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Band {
    Untouched,
    /// Touched but indistinguishable from the original surface
    Surface,
    /// Close to the original surface, blends with the terrain's own textures
    NearSurface(u8),
    /// Far from the original surface, fully painted with one texture
    Deep(u8),
}

/// Decoded form of the signed alteration byte.
///
/// The byte multiplexes the polarity (its sign) with the band and texture
/// (its magnitude). Persisted files keep the byte, code works with this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Alteration {
    pub polarity: Polarity,
    pub band: Band,
}

impl Alteration {
    pub const NONE: Alteration = Alteration {
        polarity: Polarity::Filled,
        band: Band::Untouched,
    };

    /// Decode an alteration byte
    pub fn from_byte(altered: i8) -> Self {
        let polarity = if altered < 0 { Polarity::Carved } else { Polarity::Filled };
        let magnitude = altered.unsigned_abs();
        let near = NEAR_SURFACE_OFFSET as u8;
        let deep = TEXTURE_OFFSET as u8;
        let band = match magnitude {
            0 => Band::Untouched,
            1 => Band::Surface,
            m if m < deep => Band::NearSurface(m - near),
            m => Band::Deep((m - deep).min(MAX_TEXTURE_LAYERS as u8 - 1)),
        };
        Self { polarity, band }
    }

    /// Encode back into the alteration byte
    pub fn to_byte(self) -> i8 {
        let magnitude = match self.band {
            Band::Untouched => return UNTOUCHED,
            Band::Surface => SURFACE,
            Band::NearSurface(texture) => NEAR_SURFACE_OFFSET + texture as i8,
            Band::Deep(texture) => TEXTURE_OFFSET + texture as i8,
        };
        match self.polarity {
            Polarity::Filled => magnitude,
            Polarity::Carved => -magnitude,
        }
    }

    /// Texture painted on this voxel, if it is in a texture band
    pub fn texture(self) -> Option<u8> {
        match self.band {
            Band::NearSurface(t) | Band::Deep(t) => Some(t),
            Band::Untouched | Band::Surface => None,
        }
    }
}

/// Single density sample
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Voxel {
    /// Signed distance to the surface, negative inside
    pub value: f32,
    /// Encoded [`Alteration`]
    pub altered: i8,
}

impl Voxel {
    pub fn new(value: f32, altered: i8) -> Self {
        Self { value, altered }
    }

    /// Fresh voxel seeded from the terrain height field
    pub fn unaltered(value: f32) -> Self {
        Self { value, altered: UNTOUCHED }
    }

    #[inline]
    pub fn is_inside(&self, isovalue: f32) -> bool {
        self.value < isovalue
    }

    #[inline]
    pub fn is_altered(&self) -> bool {
        self.altered != UNTOUCHED
    }

    pub fn alteration(&self) -> Alteration {
        Alteration::from_byte(self.altered)
    }

    /// Carved voxel close to the original surface; the terrain surface must be hidden here
    pub fn is_altered_near_below_surface(&self) -> bool {
        let a = self.alteration();
        a.polarity == Polarity::Carved && matches!(a.band, Band::NearSurface(_))
    }

    /// Filled voxel close to the original surface; only terrain details must be hidden here
    pub fn is_altered_near_above_surface(&self) -> bool {
        let a = self.alteration();
        a.polarity == Polarity::Filled && matches!(a.band, Band::NearSurface(_))
    }

    /// Pack into the persisted little-endian layout
    pub fn to_bytes(&self) -> [u8; PACKED_SIZE] {
        let v = self.value.to_le_bytes();
        [v[0], v[1], v[2], v[3], self.altered as u8]
    }

    /// Unpack from the persisted little-endian layout
    pub fn from_bytes(bytes: [u8; PACKED_SIZE]) -> Self {
        Self {
            value: f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            altered: bytes[4] as i8,
        }
    }
}

/// Alteration byte marks a mesh vertex that should blend with the terrain textures
#[inline]
pub fn is_near_surface_marker(altered: i8) -> bool {
    (-SURFACE..=SURFACE).contains(&altered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_layout() {
        assert_eq!(TEXTURE_OFFSET, 18);
        assert!(TEXTURE_OFFSET + MAX_TEXTURE_LAYERS as i8 - 1 <= i8::MAX);
    }

    #[test]
    fn test_alteration_byte_compat() {
        for byte in -33i8..=33 {
            assert_eq!(Alteration::from_byte(byte).to_byte(), byte, "byte {byte}");
        }
    }

    #[test]
    fn test_alteration_decoding() {
        let a = Alteration::from_byte(-(TEXTURE_OFFSET + 3));
        assert_eq!(a.polarity, Polarity::Carved);
        assert_eq!(a.band, Band::Deep(3));

        let b = Alteration::from_byte(NEAR_SURFACE_OFFSET + 5);
        assert_eq!(b.polarity, Polarity::Filled);
        assert_eq!(b.band, Band::NearSurface(5));
        assert_eq!(b.texture(), Some(5));

        assert_eq!(Alteration::from_byte(0), Alteration::NONE);
    }

    #[test]
    fn test_near_surface_predicates() {
        let carved = Voxel::new(0.5, -(NEAR_SURFACE_OFFSET + 1));
        assert!(carved.is_altered_near_below_surface());
        assert!(!carved.is_altered_near_above_surface());

        let filled = Voxel::new(-0.5, NEAR_SURFACE_OFFSET);
        assert!(filled.is_altered_near_above_surface());

        let deep = Voxel::new(3.0, -TEXTURE_OFFSET);
        assert!(!deep.is_altered_near_below_surface());
    }

    #[test]
    fn test_packed_bytes() {
        let voxel = Voxel::new(-1.25, -20);
        let bytes = voxel.to_bytes();
        assert_eq!(bytes.len(), PACKED_SIZE);
        assert_eq!(Voxel::from_bytes(bytes), voxel);
    }

    #[test]
    fn test_inside_classification() {
        assert!(Voxel::unaltered(-0.1).is_inside(0.0));
        assert!(!Voxel::unaltered(0.0).is_inside(0.0));
    }
}
