//! Weighted nonlinear fit of a single lattice strain model.
//!
//! Given:
//! - radii `x_i`
//! - observed values `y_i`
//! - one-sigma uncertainties `σ_i`
//! - a starting point and box bounds
//!
//! we minimize `χ² = Σ ((y_i − f(x_i; p)) / σ_i)²` with the bounded
//! trust-region solver and estimate the parameter covariance at the solution.

use nalgebra::{DMatrix, DVector};

use crate::domain::SigmaMode;
use crate::error::FitError;
use crate::math::{estimate_covariance, minimize_bounded, Bounds, ResidualProblem, SolverOptions};
use crate::models::LatticeModel;

/// Validated observations (equal lengths, finite, positive radius/value, positive σ).
#[derive(Debug, Clone)]
pub struct Observations {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub sigma: Vec<f64>,
}

impl Observations {
    pub fn new(x: Vec<f64>, y: Vec<f64>, sigma: Vec<f64>) -> Result<Self, FitError> {
        if x.is_empty() {
            return Err(FitError::Insufficient("no observations".to_string()));
        }
        if x.len() != y.len() || x.len() != sigma.len() {
            return Err(FitError::InvalidInput(format!(
                "array lengths differ (radius={}, value={}, sigma={})",
                x.len(),
                y.len(),
                sigma.len()
            )));
        }
        for (i, ((&xi, &yi), &si)) in x.iter().zip(y.iter()).zip(sigma.iter()).enumerate() {
            if !(xi.is_finite() && xi > 0.0) {
                return Err(FitError::InvalidInput(format!("row {}: radius must be finite and > 0 (got {xi})", i + 1)));
            }
            if !(yi.is_finite() && yi > 0.0) {
                return Err(FitError::InvalidInput(format!("row {}: value must be finite and > 0 (got {yi})", i + 1)));
            }
            if !(si.is_finite() && si > 0.0) {
                return Err(FitError::InvalidInput(format!("row {}: sigma must be finite and > 0 (got {si})", i + 1)));
            }
        }
        Ok(Self { x, y, sigma })
    }

    /// Unit uncertainties.
    pub fn unweighted(x: Vec<f64>, y: Vec<f64>) -> Result<Self, FitError> {
        let sigma = vec![1.0; x.len()];
        Self::new(x, y, sigma)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Fitted parameters of one model, in fit space.
#[derive(Debug, Clone)]
pub struct ModelFit {
    pub params: Vec<f64>,
    pub stderr: Vec<Option<f64>>,
    pub covariance: Option<Vec<Vec<f64>>>,
    /// Weighted sum of squared residuals.
    pub chi2: f64,
    pub n: usize,
    pub nfev: usize,
}

struct WeightedResiduals<'a> {
    model: &'a LatticeModel,
    obs: &'a Observations,
}

impl ResidualProblem for WeightedResiduals<'_> {
    fn n_params(&self) -> usize {
        self.model.param_len()
    }

    fn n_residuals(&self) -> usize {
        self.obs.len()
    }

    fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
        let p = params.as_slice();
        DVector::from_iterator(
            self.obs.len(),
            (0..self.obs.len()).map(|i| (self.obs.y[i] - self.model.predict(self.obs.x[i], p)) / self.obs.sigma[i]),
        )
    }

    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64> {
        let p = params.as_slice();
        let k = self.model.param_len();
        let mut jac = DMatrix::zeros(self.obs.len(), k);
        let mut grad = vec![0.0; k];
        for i in 0..self.obs.len() {
            self.model.fill_gradient(self.obs.x[i], p, &mut grad);
            for j in 0..k {
                jac[(i, j)] = -grad[j] / self.obs.sigma[i];
            }
        }
        jac
    }
}

/// Fit `model` to `obs` from `start`, within `bounds`.
pub fn fit_model(
    model: &LatticeModel,
    obs: &Observations,
    start: &[f64],
    bounds: &Bounds,
    sigma_mode: SigmaMode,
    max_nfev: usize,
) -> Result<ModelFit, FitError> {
    let k = model.param_len();
    if obs.len() < k {
        return Err(FitError::Insufficient(format!(
            "{} observations for {k} parameters",
            obs.len()
        )));
    }

    let problem = WeightedResiduals { model, obs };
    let report = minimize_bounded(
        &problem,
        &DVector::from_column_slice(start),
        bounds,
        &SolverOptions::with_budget(max_nfev),
    )?;

    let chi2 = 2.0 * report.cost;
    let cov = estimate_covariance(&report.jacobian, chi2, sigma_mode);

    tracing::debug!(
        names = ?model.param_names(),
        params = ?report.params.as_slice(),
        chi2,
        nfev = report.nfev,
        "model fitted"
    );

    Ok(ModelFit {
        params: report.params.iter().copied().collect(),
        stderr: cov.stderr,
        covariance: cov.matrix,
        chi2,
        n: obs.len(),
        nfev: report.nfev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observations_reject_bad_rows() {
        let err = Observations::new(vec![1.0, -1.0], vec![1.0, 1.0], vec![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(ref m) if m.contains("row 2")));

        let err = Observations::new(vec![1.0], vec![1.0, 2.0], vec![1.0]).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));

        let err = Observations::new(vec![1.0], vec![1.0], vec![0.0]).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(ref m) if m.contains("sigma")));
    }

    #[test]
    fn weighted_residuals_scale_with_sigma() {
        let obs = Observations::new(vec![1.0, 1.0], vec![10.0, 10.0], vec![1.0, 2.0]).unwrap();
        let model = LatticeModel::Unconstrained;
        let problem = WeightedResiduals { model: &model, obs: &obs };
        // At r0 = x the prediction is D0.
        let r = problem.residuals(&DVector::from_vec(vec![4.0, 1.0, 10.0]));
        assert!((r[0] - 6.0).abs() < 1e-12);
        assert!((r[1] - 3.0).abs() < 1e-12);
        let j = problem.jacobian(&DVector::from_vec(vec![4.0, 1.0, 10.0]));
        assert!((j[(0, 0)] + 1.0).abs() < 1e-12);
        assert!((j[(1, 0)] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn too_few_observations_is_insufficient() {
        let obs = Observations::new(vec![0.9, 1.0], vec![10.0, 8.0], vec![1.0, 1.0]).unwrap();
        let bounds = Bounds::new(&[0.0, 0.0, 0.0], &[2000.0, 2.0, 1000.0]);
        let err = fit_model(&LatticeModel::Unconstrained, &obs, &[10.0, 0.9, 10.0], &bounds, SigmaMode::Absolute, 50)
            .unwrap_err();
        assert!(matches!(err, FitError::Insufficient(_)));
    }
}
