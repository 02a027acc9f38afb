//! Rasterizing frame plans.

pub mod backend;
pub mod cpu;
/// Axis and colorbar labels through `usvg`/`resvg`.
pub mod text;
