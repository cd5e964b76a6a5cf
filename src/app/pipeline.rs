//! Shared pipelines used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV load -> fit(s) -> selection -> residuals
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use crate::domain::{FitConfig, TemperatureConfig, TemperatureRow, TemperatureTable};
use crate::error::AppError;
use crate::fit::{FitSelection, LatticeStrainFitter, TemperatureEstimator, fit_and_select};
use crate::io::{PartitionData, load_partition_csv, load_ratio_table};
use crate::report::{ElementResidual, compute_residuals};

/// All computed outputs of a single `lsm fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub data: PartitionData,
    pub selection: FitSelection,
    pub residuals: Vec<ElementResidual>,
}

/// Load the configured CSV and run the fit pipeline.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let data = load_partition_csv(&config.csv_path)?;
    run_fit_with_data(config, data)
}

/// Run the fit pipeline on already-loaded data.
///
/// The TUI uses this to refit after toggling settings without re-reading the file.
pub fn run_fit_with_data(config: &FitConfig, data: PartitionData) -> Result<RunOutput, AppError> {
    let fitter = fitter_for(config);
    let selection = fit_and_select(&data.set, config.model_spec, &fitter)?;
    tracing::info!(
        model = selection.best.model.display_name(),
        bic = selection.best.quality.bic,
        nfev = selection.best.quality.nfev,
        "fit selected"
    );
    let residuals = compute_residuals(&data.set.samples, &selection.best, &config.constants)?;

    Ok(RunOutput {
        data,
        selection,
        residuals,
    })
}

pub fn fitter_for(config: &FitConfig) -> LatticeStrainFitter {
    LatticeStrainFitter::new(config.constants)
        .with_q(config.q)
        .with_sigma_mode(config.sigma_mode)
        .with_max_evals(config.max_evals)
}

/// Load a ratio table and estimate one temperature per sample column.
///
/// In strict mode the samples are processed in order and the first failure
/// aborts the run; otherwise failures are kept as rows of the table.
pub fn run_temperature(config: &TemperatureConfig) -> Result<TemperatureTable, AppError> {
    let series = load_ratio_table(&config.csv_path)?;

    let estimator = TemperatureEstimator::new(config.constants, config.q, config.calibration)
        .with_max_evals(config.max_evals);

    if !config.strict {
        return Ok(estimator.estimate_table(&series));
    }

    let mut rows = Vec::with_capacity(series.len());
    for s in &series {
        match estimator.estimate(s) {
            Ok(est) => rows.push(TemperatureRow {
                sample: s.sample.clone(),
                outcome: Ok(est),
            }),
            Err(err) => {
                let err = AppError::from(err);
                return Err(AppError::new(err.exit_code(), format!("{}: {err}", s.sample)));
            }
        }
    }
    Ok(TemperatureTable { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CalibrationPreset, ModelSpec, PhysicalConstants, QConstant, SigmaMode};
    use crate::fit::DEFAULT_TEMPERATURE_MAX_EVALS;
    use std::path::PathBuf;

    fn temp_csv(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("lsm-pipeline-{name}-{}.csv", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    fn fit_config(path: PathBuf) -> FitConfig {
        FitConfig {
            csv_path: path,
            model_spec: ModelSpec::Both,
            q: QConstant::Q1,
            sigma_mode: SigmaMode::Absolute,
            max_evals: 500,
            constants: PhysicalConstants::default(),
            plot: false,
            plot_width: 80,
            plot_height: 20,
            svg_path: None,
            phase_label: "D(Zrn/Melt)".to_string(),
            export_fit: None,
        }
    }

    fn temperature_config(path: PathBuf, strict: bool) -> TemperatureConfig {
        let preset = CalibrationPreset::Streicher2022;
        TemperatureConfig {
            csv_path: path,
            q: QConstant::Q1,
            calibration: preset.calibration(),
            calibration_label: preset.display_name().to_string(),
            max_evals: DEFAULT_TEMPERATURE_MAX_EVALS,
            constants: PhysicalConstants::default(),
            strict,
            export: None,
        }
    }

    #[test]
    fn fit_pipeline_from_csv() {
        let path = temp_csv(
            "fit",
            "element,ri,di,1s,T [C],P [GPa]\n\
             Lu,0.977,45,3,1000,1\n\
             Yb,0.985,41,3,1000,1\n\
             Er,1.004,29,2,1000,1\n\
             Dy,1.027,16,1.5,1000,1\n\
             Gd,1.053,7.5,0.6,1000,1\n\
             Sm,1.079,3.1,0.3,1000,1\n",
        );
        let run = run_fit(&fit_config(path.clone())).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(run.residuals.len(), 6);
        assert!(!run.selection.fits.is_empty());
        assert!((run.data.set.conditions.temperature_k - 1273.15).abs() < 1e-9);
    }

    #[test]
    fn strict_temperature_run_aborts_on_short_sample() {
        // `b` has a single usable ratio.
        let path = temp_csv("strict", "radii,a,b\n0.977,2.0,1.5\n1.004,1.5,\n1.053,0.8,\n");
        let lenient = run_temperature(&temperature_config(path.clone(), false)).unwrap();
        let strict = run_temperature(&temperature_config(path.clone(), true));
        std::fs::remove_file(&path).ok();

        assert_eq!(lenient.rows.len(), 2);
        assert_eq!(lenient.failures().count(), 1);
        let err = strict.unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().starts_with("b:"));
    }
}
