//! Brush shapes and the edit strokes built from them

pub mod primitive;
pub mod stroke;

pub use primitive::{BrushDistances, BrushShape};
pub use stroke::{Action, BrushStroke};
