//! Scalar interpolation and integer helpers

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Bilinear interpolation over a unit cell.
///
/// `v00` sits at (0, 0), `v10` at (1, 0), `v01` at (0, 1) and `v11` at (1, 1),
/// with `tx` running along the first axis and `tz` along the second.
#[inline]
pub fn bilinear(v00: f32, v10: f32, v01: f32, v11: f32, tx: f32, tz: f32) -> f32 {
    lerp(lerp(v00, v10, tx), lerp(v01, v11, tx), tz)
}

/// Integer division rounding toward negative infinity
#[inline]
pub fn floor_div(value: i32, divisor: i32) -> i32 {
    value.div_euclid(divisor)
}
