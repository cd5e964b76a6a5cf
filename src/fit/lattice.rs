//! Lattice strain fits of a partition-coefficient set.
//!
//! Two model forms are available:
//! - unconstrained: `(D0, r0, E)` all free
//! - constrained: `(D0, r0)`, with `E` tied to `r0` through an elastic constant `Q`
//!
//! Both are weighted by the per-point uncertainties and bounded to physically
//! meaningful boxes. Results are reported in GPa for the modulus.

use crate::domain::{
    Conditions, FitQuality, LatticeFit, ModelKind, ParamEstimate, PhysicalConstants, QConstant, SampleSet,
    SigmaMode,
};
use crate::error::FitError;
use crate::fit::{constrained_seed, fit_model, unconstrained_seed, ModelFit, Observations};
use crate::math::Bounds;
use crate::models::{constrained_modulus, unconstrained_modulus_gpa, LatticeModel};

/// Default solver budget (residual evaluations) for lattice strain fits.
pub const DEFAULT_MAX_EVALS: usize = 50;

const D0_MAX: f64 = 2000.0;
const R0_MAX: f64 = 2.0;
const E_MAX: f64 = 1000.0;

/// Fits lattice strain models to sample sets.
#[derive(Debug, Clone)]
pub struct LatticeStrainFitter {
    constants: PhysicalConstants,
    q: QConstant,
    sigma_mode: SigmaMode,
    max_evals: usize,
}

impl LatticeStrainFitter {
    pub fn new(constants: PhysicalConstants) -> Self {
        Self {
            constants,
            q: QConstant::Q1,
            sigma_mode: SigmaMode::Absolute,
            max_evals: DEFAULT_MAX_EVALS,
        }
    }

    /// Elastic constant for the constrained model.
    pub fn with_q(mut self, q: QConstant) -> Self {
        self.q = q;
        self
    }

    pub fn with_sigma_mode(mut self, mode: SigmaMode) -> Self {
        self.sigma_mode = mode;
        self
    }

    pub fn with_max_evals(mut self, max_evals: usize) -> Self {
        self.max_evals = max_evals;
        self
    }

    pub fn constants(&self) -> &PhysicalConstants {
        &self.constants
    }

    pub fn q(&self) -> QConstant {
        self.q
    }

    /// Fit the requested model kind.
    pub fn fit(&self, set: &SampleSet, kind: ModelKind) -> Result<LatticeFit, FitError> {
        match kind {
            ModelKind::Unconstrained => self.fit_unconstrained(set),
            ModelKind::Constrained => self.fit_constrained(set),
        }
    }

    /// Fit `(D0, r0, E)`.
    pub fn fit_unconstrained(&self, set: &SampleSet) -> Result<LatticeFit, FitError> {
        let (obs, sigma_mode) = self.prepare(set)?;
        let model = LatticeModel::Unconstrained;
        let bounds = Bounds::new(&[0.0, 0.0, 0.0], &[D0_MAX, R0_MAX, E_MAX]);
        let start = unconstrained_seed(&obs, &bounds);
        tracing::debug!(?start, n = obs.len(), "fitting unconstrained model");

        let fit = fit_model(&model, &obs, &start, &bounds, sigma_mode, self.max_evals)?;
        let e_fit = ParamEstimate::new(fit.params[2], fit.stderr[2]);
        let modulus = unconstrained_modulus_gpa(e_fit, set.conditions.temperature_k, &self.constants);
        Ok(assemble(ModelKind::Unconstrained, fit, modulus, set.conditions, None, sigma_mode))
    }

    /// Fit `(D0, r0)` with `E = Q / (c + r0)³`.
    pub fn fit_constrained(&self, set: &SampleSet) -> Result<LatticeFit, FitError> {
        let (obs, sigma_mode) = self.prepare(set)?;
        let q_joules = self.constants.q_joules(self.q);
        if !(q_joules.is_finite() && q_joules > 0.0) {
            return Err(FitError::InvalidInput(format!("Q must be finite and > 0 (got {q_joules})")));
        }
        let model = LatticeModel::constrained(&self.constants, q_joules, set.conditions.temperature_k);
        let bounds = Bounds::new(&[0.0, 0.0], &[D0_MAX, R0_MAX]);
        let start = constrained_seed(&obs, &bounds);
        tracing::debug!(?start, n = obs.len(), q = %self.q.label(), "fitting constrained model");

        let fit = fit_model(&model, &obs, &start, &bounds, sigma_mode, self.max_evals)?;
        let r0 = ParamEstimate::new(fit.params[1], fit.stderr[1]);
        let modulus = constrained_modulus(r0, q_joules, &self.constants);
        Ok(assemble(
            ModelKind::Constrained,
            fit,
            modulus,
            set.conditions,
            Some(q_joules),
            sigma_mode,
        ))
    }

    /// Validate a sample set and turn it into weighted observations.
    fn prepare(&self, set: &SampleSet) -> Result<(Observations, SigmaMode), FitError> {
        if set.is_empty() {
            return Err(FitError::Insufficient("sample set is empty".to_string()));
        }
        let t = set.conditions.temperature_k;
        if !(t.is_finite() && t > 0.0) {
            return Err(FitError::InvalidInput(format!("temperature must be finite and > 0 K (got {t})")));
        }
        for s in &set.samples {
            if !(s.sigma.is_finite() && s.sigma >= 0.0) {
                return Err(FitError::InvalidInput(format!(
                    "{}: uncertainty must be finite and >= 0 (got {})",
                    s.element, s.sigma
                )));
            }
        }

        let zero = set.samples.iter().filter(|s| s.sigma == 0.0).count();
        if zero == set.len() {
            tracing::warn!("all uncertainties are zero; fitting unweighted with relative sigma mode");
            let obs = Observations::unweighted(set.radii(), set.values())?;
            return Ok((obs, SigmaMode::Relative));
        }
        if zero > 0 {
            let names: Vec<&str> = set
                .samples
                .iter()
                .filter(|s| s.sigma == 0.0)
                .map(|s| s.element.as_str())
                .collect();
            return Err(FitError::InvalidInput(format!(
                "zero uncertainty cannot be weighted: {}",
                names.join(", ")
            )));
        }

        let obs = Observations::new(set.radii(), set.values(), set.sigmas())?;
        Ok((obs, self.sigma_mode))
    }
}

fn assemble(
    model: ModelKind,
    fit: ModelFit,
    modulus_gpa: ParamEstimate,
    conditions: Conditions,
    q_joules: Option<f64>,
    sigma_mode: SigmaMode,
) -> LatticeFit {
    let k = model.param_count();
    let quality = FitQuality {
        chi2: fit.chi2,
        reduced_chi2: (fit.n > k).then(|| fit.chi2 / (fit.n - k) as f64),
        bic: bic(fit.chi2, k, fit.n),
        n: fit.n,
        nfev: fit.nfev,
    };
    LatticeFit {
        model,
        d0: ParamEstimate::new(fit.params[0], fit.stderr[0]),
        r0: ParamEstimate::new(fit.params[1], fit.stderr[1]),
        modulus_gpa,
        raw_params: fit.params,
        covariance: fit.covariance,
        quality,
        conditions,
        q_joules,
        sigma_mode,
    }
}

/// `BIC = χ² + k·ln n`.
pub fn bic(chi2: f64, k: usize, n: usize) -> f64 {
    chi2 + k as f64 * (n as f64).ln()
}

/// Rebuild the evaluable model behind a fit.
pub fn model_for_fit(fit: &LatticeFit, constants: &PhysicalConstants) -> LatticeModel {
    match (fit.model, fit.q_joules) {
        (ModelKind::Constrained, Some(q)) => LatticeModel::constrained(constants, q, fit.conditions.temperature_k),
        (ModelKind::Constrained, None) => LatticeModel::constrained(
            constants,
            constants.q1,
            fit.conditions.temperature_k,
        ),
        (ModelKind::Unconstrained, _) => LatticeModel::Unconstrained,
    }
}

/// Evaluate a fitted curve at `radii`.
pub fn fitted_grid(fit: &LatticeFit, constants: &PhysicalConstants, radii: &[f64]) -> Vec<f64> {
    let model = model_for_fit(fit, constants);
    radii.iter().map(|&r| model.predict(r, &fit.raw_params)).collect()
}

/// Evenly spaced radii covering `[lo, hi]`, widened to at least 0.8–1.2 Å.
pub fn radius_grid(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let n = n.max(2);
    let mut r0 = if lo.is_finite() { (lo - 0.02).min(0.8) } else { 0.8 };
    let r1 = if hi.is_finite() { (hi + 0.02).max(1.2) } else { 1.2 };
    r0 = r0.max(0.01);
    (0..n)
        .map(|i| r0 + (r1 - r0) * i as f64 / (n as f64 - 1.0))
        .collect()
}
