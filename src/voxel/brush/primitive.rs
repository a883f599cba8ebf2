use glam::{Vec2, Vec3};

/// Brush shapes available for sculpting
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BrushShape {
    Sphere,
    /// Sphere cut at the brush center plane, keeping the upper half
    HalfSphere,
    /// Axis-aligned cube with half extent `radius`
    RoundedCube,
    /// Cone whose vertex sits `0.95 * height` above (or below) the center
    Stalagmite { height: f32, upside_down: bool },
}

/// Result of evaluating a brush at one point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushDistances {
    /// Positive inside the brush volume
    pub distance: f32,
    /// Positive within the horizontal footprint inflated by the cut margin
    pub flat_distance: f32,
}

/// Cones shorter than this have no lateral surface worth measuring
const MIN_CONE_HEIGHT: f32 = 0.1;
/// Fraction of the height above the center at which the cone vertex sits
const CONE_VERTEX_FRACTION: f32 = 0.95;

impl BrushShape {
    /// Evaluate the brush at `offset` (point minus brush center).
    ///
    /// `radius_with_margin` is the radius inflated by the cut margin and only
    /// affects `flat_distance`.
    pub fn evaluate(&self, offset: Vec3, radius: f32, radius_with_margin: f32) -> BrushDistances {
        let flat = Vec2::new(offset.x, offset.z).length();
        let flat_distance = radius_with_margin - flat;

        match *self {
            BrushShape::Sphere => BrushDistances {
                distance: radius - offset.length(),
                flat_distance,
            },
            BrushShape::HalfSphere => BrushDistances {
                distance: (radius - offset.length()).min(offset.y),
                flat_distance,
            },
            BrushShape::RoundedCube => BrushDistances {
                distance: (radius - offset.x.abs())
                    .min(radius - offset.y.abs())
                    .min(radius - offset.z.abs()),
                flat_distance: (radius_with_margin - offset.x.abs())
                    .min(radius_with_margin - offset.z.abs()),
            },
            BrushShape::Stalagmite { height, upside_down } => BrushDistances {
                distance: cone_distance(offset, radius, height, upside_down),
                flat_distance,
            },
        }
    }

    /// Largest vertical reach of the shape from its center
    pub fn vertical_extent(&self, radius: f32) -> f32 {
        match *self {
            BrushShape::Stalagmite { height, .. } => radius.max(height),
            _ => radius,
        }
    }
}

fn cone_distance(offset: Vec3, radius: f32, height: f32, upside_down: bool) -> f32 {
    let cone_angle = if height > MIN_CONE_HEIGHT { (radius / height).atan() } else { 0.0 };
    let sign = if upside_down { -1.0 } else { 1.0 };

    // relative to the vertex
    let w = offset - Vec3::new(0.0, sign * height * CONE_VERTEX_FRACTION, 0.0);
    let length = w.length();
    let flat = Vec2::new(w.x, w.z).length();
    let point_angle = if length > f32::EPSILON {
        (flat / length).clamp(0.0, 1.0).asin()
    } else {
        0.0
    };

    let delta = point_angle - cone_angle;
    let lateral = -length * delta.abs().sin() * delta.signum();
    lateral.min(height + sign * w.y).min(-sign * w.y)
}
