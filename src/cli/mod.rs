//! Command-line parsing for the lattice strain fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code. Settings that select physics can also
//! come from `LSM_*` environment variables (a `.env` file is loaded first).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::{CalibrationPreset, ModelKind, ModelSpec, QPreset, SigmaMode};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "lsm", version, about = "Lattice strain fits of mineral/melt partition coefficients")]
pub struct Cli {
    /// Log verbosity (written to stderr).
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn, env = "LSM_LOG_LEVEL")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a partition-coefficient table, print diagnostics and optionally plot/export.
    Fit(FitArgs),
    /// Fit both models and print the BIC comparison only (useful for scripting).
    Compare(FitArgs),
    /// Estimate crystallisation temperatures from a ratio table.
    Temperature(TemperatureArgs),
    /// Write a synthetic partition table or ratio table.
    Synth(SynthArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
    /// Launch the interactive TUI.
    ///
    /// This uses the same underlying fit pipeline as `lsm fit`, but renders results
    /// in a terminal UI using Ratatui.
    Tui(FitArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Elastic constant and solver budget.
#[derive(Debug, Args, Clone)]
pub struct PhysicsArgs {
    /// Literature elastic constant used by the constrained model.
    #[arg(long, value_enum, default_value_t = QPreset::Q1, env = "LSM_Q")]
    pub q: QPreset,

    /// Explicit Q in units of 1e-21 J (overrides --q).
    #[arg(long, env = "LSM_Q_VALUE")]
    pub q_value: Option<f64>,

    /// Maximum residual evaluations per fit.
    #[arg(long, env = "LSM_MAX_EVALS")]
    pub max_evals: Option<usize>,
}

/// Common options for fitting and comparing.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Partition CSV (element, ri, di, 1s, T [C], P [GPa]). Prompts if omitted.
    #[arg(short = 'f', long = "file", value_name = "CSV")]
    pub csv: Option<PathBuf>,

    /// Which model(s) to fit.
    #[arg(long, value_enum, default_value_t = ModelSpec::Both, env = "LSM_MODEL")]
    pub model: ModelSpec,

    /// How the 1s column enters the parameter uncertainties.
    #[arg(long, value_enum, default_value_t = SigmaMode::Absolute, env = "LSM_SIGMA_MODE")]
    pub sigma_mode: SigmaMode,

    #[command(flatten)]
    pub physics: PhysicsArgs,

    /// Render an ASCII plot in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 22)]
    pub height: usize,

    /// Write an SVG figure.
    #[arg(long, value_name = "SVG")]
    pub svg: Option<PathBuf>,

    /// Y-axis label of the figure.
    #[arg(long, default_value = "D(mineral/melt)")]
    pub phase_label: String,

    /// Export the chosen fit (params + errors + curve grid) to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,
}

/// Options for temperature estimation.
#[derive(Debug, Args, Clone)]
pub struct TemperatureArgs {
    /// Ratio table CSV: a `radii` column plus one column per sample.
    #[arg(short = 'f', long = "file", value_name = "CSV")]
    pub csv: PathBuf,

    /// Calibration of the exp(a/T - b) factor.
    #[arg(long, value_enum, default_value_t = CalibrationPreset::Streicher2022, env = "LSM_CALIBRATION")]
    pub calibration: CalibrationPreset,

    #[command(flatten)]
    pub physics: PhysicsArgs,

    /// Abort on the first sample that fails instead of reporting it.
    #[arg(long)]
    pub strict: bool,

    /// Export the results table to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SynthKind {
    /// One row per element, ready for `lsm fit`.
    Partition,
    /// Ratio table, ready for `lsm temperature`.
    Ratios,
}

/// Options for synthetic data generation.
#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    #[arg(long, value_enum, default_value_t = SynthKind::Partition)]
    pub kind: SynthKind,

    /// Output CSV.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub out: PathBuf,

    /// Generating model (partition tables).
    #[arg(long, value_enum, default_value_t = ModelKind::Unconstrained)]
    pub model: ModelKind,

    #[arg(long, default_value_t = 150.0)]
    pub d0: f64,

    /// Optimal radius (Å).
    #[arg(long, default_value_t = 0.95)]
    pub r0: f64,

    /// Strain parameter of the unconstrained model (fit units).
    #[arg(long = "e-fit", default_value_t = 30.0)]
    pub e_fit: f64,

    /// Run temperature (°C).
    #[arg(long, default_value_t = 1000.0)]
    pub temperature_c: f64,

    /// Run pressure (GPa).
    #[arg(long, default_value_t = 1.0)]
    pub pressure_gpa: f64,

    /// Relative Gaussian noise applied to each value.
    #[arg(long, default_value_t = 0.05)]
    pub noise: f64,

    /// Relative uncertainty written to the 1s column.
    #[arg(long, default_value_t = 0.05)]
    pub sigma_rel: f64,

    /// Sample columns of a ratio table as NAME=T_C (repeatable).
    #[arg(long = "sample", value_name = "NAME=T_C")]
    pub samples: Vec<String>,

    #[arg(long, value_enum, default_value_t = CalibrationPreset::Streicher2022, env = "LSM_CALIBRATION")]
    pub calibration: CalibrationPreset,

    #[arg(long, value_enum, default_value_t = QPreset::Q1, env = "LSM_Q")]
    pub q: QPreset,

    /// Explicit Q in units of 1e-21 J (overrides --q).
    #[arg(long, env = "LSM_Q_VALUE")]
    pub q_value: Option<f64>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Options for plotting a saved fit.
#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Fit JSON file produced by `lsm fit --export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 22)]
    pub height: usize,

    /// Write an SVG figure instead of printing the terminal plot.
    #[arg(long, value_name = "SVG")]
    pub svg: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fit_defaults() {
        let cli = Cli::try_parse_from(["lsm", "fit", "-f", "data.csv"]).unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.csv, Some(PathBuf::from("data.csv")));
        assert_eq!(args.model, ModelSpec::Both);
        assert_eq!(args.physics.q, QPreset::Q1);
        assert_eq!(args.physics.q_value, None);
        assert!(args.plot && !args.no_plot);
        assert_eq!(cli.log_level, LogLevel::Warn);
    }

    #[test]
    fn temperature_flags() {
        let cli = Cli::try_parse_from([
            "lsm",
            "temperature",
            "-f",
            "ratios.csv",
            "--calibration",
            "rubatto-hermann2007",
            "--q",
            "q2",
            "--strict",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, LogLevel::Debug);
        let Command::Temperature(args) = cli.command else {
            panic!("expected temperature");
        };
        assert_eq!(args.calibration, CalibrationPreset::RubattoHermann2007);
        assert_eq!(args.physics.q, QPreset::Q2);
        assert!(args.strict);
    }
}
