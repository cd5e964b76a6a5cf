//! Plot rendering: terminal (ASCII) and SVG figures.

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;
