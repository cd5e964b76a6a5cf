//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::constants::{Calibration, PhysicalConstants, QConstant};

/// One observed partition coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSample {
    pub element: String,
    /// Ionic radius (Å).
    pub radius: f64,
    /// Partition coefficient (mineral/melt).
    pub d: f64,
    /// One-sigma uncertainty of `d`.
    pub sigma: f64,
}

/// Run conditions shared by every sample of a set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    pub temperature_k: f64,
    pub pressure_gpa: f64,
}

/// Partition coefficients measured under one set of conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    pub samples: Vec<PartitionSample>,
    pub conditions: Conditions,
}

impl SampleSet {
    pub fn radii(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.radius).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.d).collect()
    }

    pub fn sigmas(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.sigma).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Which model(s) to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSpec {
    Unconstrained,
    Constrained,
    /// Fit both and keep the lower BIC.
    Both,
}

impl ModelSpec {
    pub fn next(self) -> Self {
        match self {
            ModelSpec::Unconstrained => ModelSpec::Constrained,
            ModelSpec::Constrained => ModelSpec::Both,
            ModelSpec::Both => ModelSpec::Unconstrained,
        }
    }
}

/// Concrete fitted model kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Free `(D0, r0, E)`.
    Unconstrained,
    /// `(D0, r0)` with `E` tied to `r0` through Q.
    Constrained,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Unconstrained => "free E",
            ModelKind::Constrained => "Q-constrained",
        }
    }

    /// Number of fitted parameters.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Unconstrained => 3,
            ModelKind::Constrained => 2,
        }
    }
}

/// How the per-point uncertainties enter the covariance estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SigmaMode {
    /// Uncertainties are absolute one-sigma errors: `cov = (JᵀWJ)⁻¹`.
    Absolute,
    /// Uncertainties are relative weights: the covariance is rescaled by `χ²/(n−p)`.
    Relative,
}

impl SigmaMode {
    pub fn toggle(self) -> Self {
        match self {
            SigmaMode::Absolute => SigmaMode::Relative,
            SigmaMode::Relative => SigmaMode::Absolute,
        }
    }
}

/// A fitted value with its one-sigma standard error.
///
/// `stderr = None` means the uncertainty could not be computed (for example
/// a rank-deficient Jacobian); it is never reported as NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamEstimate {
    pub value: f64,
    pub stderr: Option<f64>,
}

impl ParamEstimate {
    pub fn new(value: f64, stderr: Option<f64>) -> Self {
        Self { value, stderr }
    }
}

/// Goodness-of-fit diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    /// Weighted sum of squared residuals.
    pub chi2: f64,
    /// `χ²/(n−p)`, or `None` when `n <= p`.
    pub reduced_chi2: Option<f64>,
    pub bic: f64,
    pub n: usize,
    /// Residual evaluations spent by the solver.
    pub nfev: usize,
}

/// Result of one lattice strain fit, in reporting units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatticeFit {
    pub model: ModelKind,
    pub d0: ParamEstimate,
    /// Optimal radius (Å).
    pub r0: ParamEstimate,
    /// Effective Young's modulus (GPa): fitted for the unconstrained model,
    /// derived from `r0` for the constrained one.
    pub modulus_gpa: ParamEstimate,
    /// Parameters in fit space (`[D0, r0, E]` or `[D0, r0]`).
    pub raw_params: Vec<f64>,
    /// Covariance of `raw_params` (row-major, symmetric); `None` when unavailable.
    pub covariance: Option<Vec<Vec<f64>>>,
    pub quality: FitQuality,
    pub conditions: Conditions,
    /// Q in joules (constrained model only).
    pub q_joules: Option<f64>,
    pub sigma_mode: SigmaMode,
}

/// Partition-coefficient ratios of one sample, as used for temperature estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioSeries {
    pub sample: String,
    pub radii: Vec<f64>,
    pub ratios: Vec<f64>,
}

/// One temperature estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureEstimate {
    pub sample: String,
    pub temperature_k: f64,
    pub stderr_k: Option<f64>,
    pub n: usize,
    pub nfev: usize,
}

impl TemperatureEstimate {
    pub fn temperature_c(&self) -> f64 {
        self.temperature_k - 273.15
    }
}

/// One row of the temperature results table.
///
/// Failures stay in the table so the caller can decide whether to skip or abort.
#[derive(Debug, Clone)]
pub struct TemperatureRow {
    pub sample: String,
    pub outcome: Result<TemperatureEstimate, String>,
}

/// Temperature estimates for every sample column, in input order.
#[derive(Debug, Clone, Default)]
pub struct TemperatureTable {
    pub rows: Vec<TemperatureRow>,
}

impl TemperatureTable {
    pub fn failures(&self) -> impl Iterator<Item = &TemperatureRow> {
        self.rows.iter().filter(|r| r.outcome.is_err())
    }
}

/// Configuration of a lattice strain run, derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub csv_path: PathBuf,
    pub model_spec: ModelSpec,
    pub q: QConstant,
    pub sigma_mode: SigmaMode,
    pub max_evals: usize,
    pub constants: PhysicalConstants,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    /// Write an SVG figure to this path.
    pub svg_path: Option<PathBuf>,
    /// Y-axis label of the figure (phase pair).
    pub phase_label: String,
    pub export_fit: Option<PathBuf>,
}

/// Configuration of a temperature-estimation run.
#[derive(Debug, Clone)]
pub struct TemperatureConfig {
    pub csv_path: PathBuf,
    pub q: QConstant,
    pub calibration: Calibration,
    pub calibration_label: String,
    pub max_evals: usize,
    pub constants: PhysicalConstants,
    /// Abort on the first failed sample instead of reporting it.
    pub strict: bool,
    pub export: Option<PathBuf>,
}

/// A saved fit file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub dataset: Option<String>,
    pub phase_label: String,
    pub samples: Vec<PartitionSample>,
    pub fit: LatticeFit,
    pub constants: PhysicalConstants,
    pub grid: CurveGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub radius: Vec<f64>,
    pub d: Vec<f64>,
}
