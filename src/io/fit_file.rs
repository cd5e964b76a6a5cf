//! Read/write fit JSON files.
//!
//! A fit file is the portable record of one lattice strain fit:
//! - the input rows and run conditions
//! - the `LatticeFit` (parameters, errors, covariance, diagnostics)
//! - the constants it was computed with
//! - a precomputed curve grid for quick plotting
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{CurveGrid, FitFile, LatticeFit, PartitionSample, PhysicalConstants};
use crate::error::AppError;
use crate::fit::{fitted_grid, radius_grid};

const GRID_POINTS: usize = 101;

/// Assemble a fit file (grid included).
pub fn build_fit_file(
    fit: &LatticeFit,
    samples: &[PartitionSample],
    constants: &PhysicalConstants,
    dataset: Option<String>,
    phase_label: &str,
) -> FitFile {
    let lo = samples.iter().map(|s| s.radius).fold(f64::INFINITY, f64::min);
    let hi = samples.iter().map(|s| s.radius).fold(f64::NEG_INFINITY, f64::max);
    let radius = radius_grid(lo, hi, GRID_POINTS);
    let d = fitted_grid(fit, constants, &radius);

    FitFile {
        tool: env!("CARGO_PKG_NAME").to_string(),
        generated_at: Utc::now(),
        dataset,
        phase_label: phase_label.to_string(),
        samples: samples.to_vec(),
        fit: fit.clone(),
        constants: *constants,
        grid: CurveGrid { radius, d },
    }
}

/// Write a fit JSON file.
pub fn write_fit_json(path: &Path, file: &FitFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::new(4, format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(out, file).map_err(|e| AppError::new(4, format!("Failed to write fit JSON: {e}")))?;
    tracing::info!(path = %path.display(), "fit written");
    Ok(())
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let input = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let file: FitFile =
        serde_json::from_reader(input).map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))?;
    Ok(file)
}
