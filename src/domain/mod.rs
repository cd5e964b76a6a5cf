//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the constants table and literature presets (`PhysicalConstants`, `QConstant`, `Calibration`)
//! - observations (`PartitionSample`, `SampleSet`, `RatioSeries`)
//! - fit outputs (`LatticeFit`, `TemperatureTable`, `FitFile`, etc.)

pub mod constants;
pub mod types;

pub use constants::*;
pub use types::*;
