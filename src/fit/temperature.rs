//! Temperature estimation from partition-coefficient ratios.
//!
//! The optimal radius is held at the reference value and the strain term is
//! fixed by `Q`; the only unknown is `T`. Each sample column is an independent
//! one-parameter fit, so a table of samples is processed in parallel.

use rayon::prelude::*;

use crate::domain::{
    Calibration, PhysicalConstants, QConstant, RatioSeries, SigmaMode, TemperatureEstimate, TemperatureRow,
    TemperatureTable,
};
use crate::error::FitError;
use crate::fit::{fit_model, Observations};
use crate::math::Bounds;
use crate::models::{shape_term, LatticeModel};

/// Default solver budget for temperature fits.
pub const DEFAULT_TEMPERATURE_MAX_EVALS: usize = 10_000;

const T_MAX: f64 = 2000.0;
const T_FALLBACK: f64 = 1000.0;

/// Solves for the temperature of each ratio series.
#[derive(Debug, Clone)]
pub struct TemperatureEstimator {
    constants: PhysicalConstants,
    q_joules: f64,
    calibration: Calibration,
    max_evals: usize,
}

impl TemperatureEstimator {
    pub fn new(constants: PhysicalConstants, q: QConstant, calibration: Calibration) -> Self {
        Self {
            q_joules: constants.q_joules(q),
            constants,
            calibration,
            max_evals: DEFAULT_TEMPERATURE_MAX_EVALS,
        }
    }

    pub fn with_max_evals(mut self, max_evals: usize) -> Self {
        self.max_evals = max_evals;
        self
    }

    fn model(&self) -> LatticeModel {
        LatticeModel::temperature(&self.constants, self.q_joules, self.calibration)
    }

    /// `a + k′·g(x)`: the numerator of the exponent, so that `ln D = num/T − b`.
    fn numerator(&self, radius: f64) -> f64 {
        let c = &self.constants;
        let g = shape_term(radius, c.reference_radius) / (c.site_radius + c.reference_radius).powi(3);
        self.calibration.a + c.strain_coefficient(self.q_joules) * g
    }

    /// Median of the per-point closed-form inversions, clamped into bounds.
    fn seed(&self, obs: &Observations) -> f64 {
        let mut guesses: Vec<f64> = obs
            .x
            .iter()
            .zip(obs.y.iter())
            .map(|(&x, &y)| self.numerator(x) / (y.ln() + self.calibration.b))
            .filter(|t| t.is_finite() && *t > 0.0)
            .collect();
        if guesses.is_empty() {
            return T_FALLBACK;
        }
        guesses.sort_by(|a, b| a.total_cmp(b));
        let mid = guesses.len() / 2;
        let median = if guesses.len() % 2 == 0 {
            0.5 * (guesses[mid - 1] + guesses[mid])
        } else {
            guesses[mid]
        };
        median.clamp(1.0, T_MAX)
    }

    /// Estimate the temperature of one series.
    pub fn estimate(&self, series: &RatioSeries) -> Result<TemperatureEstimate, FitError> {
        if series.radii.len() != series.ratios.len() {
            return Err(FitError::InvalidInput(format!(
                "{}: {} radii but {} ratios",
                series.sample,
                series.radii.len(),
                series.ratios.len()
            )));
        }
        if series.radii.len() < 2 {
            return Err(FitError::Insufficient(format!(
                "{}: {} usable ratio(s), need at least 2",
                series.sample,
                series.radii.len()
            )));
        }
        let obs = Observations::unweighted(series.radii.clone(), series.ratios.clone())?;

        let bounds = Bounds::new(&[0.0], &[T_MAX]);
        let start = self.seed(&obs);
        let fit = fit_model(&self.model(), &obs, &[start], &bounds, SigmaMode::Relative, self.max_evals)?;

        tracing::debug!(sample = %series.sample, start, t = fit.params[0], nfev = fit.nfev, "temperature fitted");
        Ok(TemperatureEstimate {
            sample: series.sample.clone(),
            temperature_k: fit.params[0],
            stderr_k: fit.stderr[0],
            n: fit.n,
            nfev: fit.nfev,
        })
    }

    /// Estimate every series; rows stay in input order and failures stay explicit.
    pub fn estimate_table(&self, series: &[RatioSeries]) -> TemperatureTable {
        let rows = series
            .par_iter()
            .map(|s| {
                let outcome = self.estimate(s).map_err(|e| e.to_string());
                if let Err(msg) = &outcome {
                    tracing::warn!(sample = %s.sample, "temperature fit failed: {msg}");
                }
                TemperatureRow {
                    sample: s.sample.clone(),
                    outcome,
                }
            })
            .collect();
        TemperatureTable { rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CalibrationPreset;

    const RADII: [f64; 6] = [0.977, 0.985, 1.004, 1.027, 1.053, 1.079];

    fn estimator() -> TemperatureEstimator {
        TemperatureEstimator::new(
            PhysicalConstants::default(),
            QConstant::Q1,
            CalibrationPreset::Streicher2022.calibration(),
        )
    }

    fn series(name: &str, t: f64, jitter: &[f64]) -> RatioSeries {
        let est = estimator();
        let model = est.model();
        let ratios = RADII
            .iter()
            .enumerate()
            .map(|(i, &r)| model.predict(r, &[t]) * (1.0 + jitter.get(i).copied().unwrap_or(0.0)))
            .collect();
        RatioSeries {
            sample: name.to_string(),
            radii: RADII.to_vec(),
            ratios,
        }
    }

    #[test]
    fn recovers_temperature_without_noise() {
        let est = estimator().estimate(&series("s1", 1023.15, &[])).unwrap();
        assert!((est.temperature_k - 1023.15).abs() < 1e-3, "T={}", est.temperature_k);
        assert!((est.temperature_c() - 750.0).abs() < 1e-3);
        assert!(est.stderr_k.unwrap() < 1e-3);
    }

    #[test]
    fn noisy_ratios_give_nearby_temperature_with_error() {
        let jitter = [0.02, -0.015, 0.01, -0.02, 0.015, -0.01];
        let est = estimator().estimate(&series("s2", 973.15, &jitter)).unwrap();
        assert!((est.temperature_k - 973.15).abs() < 20.0, "T={}", est.temperature_k);
        let se = est.stderr_k.unwrap();
        assert!(se > 0.0 && se < 20.0, "stderr={se}");
    }

    #[test]
    fn seed_inverts_single_points() {
        let est = estimator();
        let s = series("s", 1100.0, &[]);
        let obs = Observations::unweighted(s.radii, s.ratios).unwrap();
        assert!((est.seed(&obs) - 1100.0).abs() < 1e-6);
    }

    #[test]
    fn table_keeps_input_order_and_failures() {
        let short = RatioSeries {
            sample: "short".to_string(),
            radii: vec![1.0],
            ratios: vec![5.0],
        };
        let input = vec![series("a", 900.0, &[]), short, series("c", 1150.0, &[])];
        let table = estimator().estimate_table(&input);

        let names: Vec<&str> = table.rows.iter().map(|r| r.sample.as_str()).collect();
        assert_eq!(names, vec!["a", "short", "c"]);
        assert_eq!(table.failures().count(), 1);
        assert!(table.rows[1].outcome.as_ref().unwrap_err().contains("need at least 2"));
        let t = table.rows[2].outcome.as_ref().unwrap().temperature_k;
        assert!((t - 1150.0).abs() < 1e-3);
    }

    #[test]
    fn tiny_budget_fails_explicitly() {
        let jitter = [0.3, -0.2, 0.25, -0.3, 0.2, -0.25];
        let err = estimator()
            .with_max_evals(1)
            .estimate(&series("s", 1000.0, &jitter))
            .unwrap_err();
        assert!(matches!(err, FitError::NotConverged { .. }));
    }
}
