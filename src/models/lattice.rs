//! Model evaluation for the Brice / Blundy & Wood lattice strain family.
//!
//! The solver relies on two primitive operations:
//! - predict `D(x)` given the parameter vector (for residuals/plots)
//! - fill the parameter gradient `∂D/∂p` at `x` (for the Jacobian)
//!
//! These are implemented here for each model form. All three share the shape
//! term `s(x; r0) = ½·r0·(x−r0)² + ⅓·(x−r0)³`, which vanishes at `x = r0`.

use std::f64::consts::PI;

use crate::domain::{Calibration, PhysicalConstants};

/// Lattice strain shape term `½·r0·d² + ⅓·d³` with `d = x − r0`.
pub fn shape_term(x: f64, r0: f64) -> f64 {
    let d = x - r0;
    0.5 * r0 * d * d + d * d * d / 3.0
}

/// `∂s/∂r0 = −½·d² − r0·d`.
fn shape_term_dr0(x: f64, r0: f64) -> f64 {
    let d = x - r0;
    -0.5 * d * d - r0 * d
}

/// A lattice strain model with its fixed (non-fitted) inputs baked in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatticeModel {
    /// `D0 · exp(−4π·E·s(x; r0))`, parameters `[D0, r0, E]`.
    Unconstrained,
    /// `D0 · exp(k · s(x; r0) / (c + r0)³)`, parameters `[D0, r0]`.
    ///
    /// `k = −4π·N_A·Q/(R·T)` and `c` is the site size term.
    Constrained { coefficient: f64, site_radius: f64 },
    /// `exp(a/T − b) · exp((k′/T) · s(x; r_ref) / (c + r_ref)³)`, parameter `[T]`.
    ///
    /// `k′ = −4π·N_A·Q/R`.
    Temperature {
        coefficient: f64,
        site_radius: f64,
        reference_radius: f64,
        calibration: Calibration,
    },
}

impl LatticeModel {
    pub fn constrained(constants: &PhysicalConstants, q_joules: f64, temperature_k: f64) -> Self {
        LatticeModel::Constrained {
            coefficient: constants.strain_coefficient(q_joules) / temperature_k,
            site_radius: constants.site_radius,
        }
    }

    pub fn temperature(constants: &PhysicalConstants, q_joules: f64, calibration: Calibration) -> Self {
        LatticeModel::Temperature {
            coefficient: constants.strain_coefficient(q_joules),
            site_radius: constants.site_radius,
            reference_radius: constants.reference_radius,
            calibration,
        }
    }

    /// Number of fitted parameters.
    pub fn param_len(&self) -> usize {
        match self {
            LatticeModel::Unconstrained => 3,
            LatticeModel::Constrained { .. } => 2,
            LatticeModel::Temperature { .. } => 1,
        }
    }

    /// Parameter names, in parameter-vector order.
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            LatticeModel::Unconstrained => &["D0", "r0", "E"],
            LatticeModel::Constrained { .. } => &["D0", "r0"],
            LatticeModel::Temperature { .. } => &["T"],
        }
    }

    /// Predict `D(x)`.
    ///
    /// # Panics
    /// Panics if `params` is shorter than `self.param_len()`.
    pub fn predict(&self, x: f64, params: &[f64]) -> f64 {
        match *self {
            LatticeModel::Unconstrained => {
                let (d0, r0, e) = (params[0], params[1], params[2]);
                d0 * (-4.0 * PI * e * shape_term(x, r0)).exp()
            }
            LatticeModel::Constrained {
                coefficient,
                site_radius,
            } => {
                let (d0, r0) = (params[0], params[1]);
                d0 * (coefficient * shape_term(x, r0) / (site_radius + r0).powi(3)).exp()
            }
            LatticeModel::Temperature {
                coefficient,
                site_radius,
                reference_radius,
                calibration,
            } => {
                let t = params[0];
                let g = shape_term(x, reference_radius) / (site_radius + reference_radius).powi(3);
                // One exponential so that both factors under/overflow together.
                ((calibration.a + coefficient * g) / t - calibration.b).exp()
            }
        }
    }

    /// Fill `∂D/∂p` at `x`.
    ///
    /// # Panics
    /// Panics if `out` or `params` are shorter than `self.param_len()`.
    pub fn fill_gradient(&self, x: f64, params: &[f64], out: &mut [f64]) {
        match *self {
            LatticeModel::Unconstrained => {
                let (d0, r0, e) = (params[0], params[1], params[2]);
                let s = shape_term(x, r0);
                let core = (-4.0 * PI * e * s).exp();
                out[0] = core;
                out[1] = d0 * core * (-4.0 * PI * e * shape_term_dr0(x, r0));
                out[2] = d0 * core * (-4.0 * PI * s);
            }
            LatticeModel::Constrained {
                coefficient,
                site_radius,
            } => {
                let (d0, r0) = (params[0], params[1]);
                let size = site_radius + r0;
                let s = shape_term(x, r0);
                let g = s / size.powi(3);
                let dg = shape_term_dr0(x, r0) / size.powi(3) - 3.0 * s / size.powi(4);
                let core = (coefficient * g).exp();
                out[0] = core;
                out[1] = d0 * core * coefficient * dg;
            }
            LatticeModel::Temperature {
                coefficient,
                site_radius,
                reference_radius,
                calibration,
            } => {
                let t = params[0];
                let g = shape_term(x, reference_radius) / (site_radius + reference_radius).powi(3);
                let numer = calibration.a + coefficient * g;
                let value = (numer / t - calibration.b).exp();
                out[0] = -value * numer / (t * t);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CalibrationPreset;

    fn numeric_gradient(model: &LatticeModel, x: f64, params: &[f64]) -> Vec<f64> {
        (0..params.len())
            .map(|j| {
                let h = 1e-6 * params[j].abs().max(1e-3);
                let mut hi = params.to_vec();
                let mut lo = params.to_vec();
                hi[j] += h;
                lo[j] -= h;
                (model.predict(x, &hi) - model.predict(x, &lo)) / (2.0 * h)
            })
            .collect()
    }

    fn assert_gradient_matches(model: LatticeModel, params: &[f64]) {
        let mut analytic = vec![0.0; model.param_len()];
        for &x in &[0.85, 0.94, 1.0, 1.1] {
            model.fill_gradient(x, params, &mut analytic);
            let numeric = numeric_gradient(&model, x, params);
            for (a, n) in analytic.iter().zip(numeric.iter()) {
                let scale = a.abs().max(n.abs()).max(1e-8);
                assert!((a - n).abs() / scale < 1e-5, "x={x}: analytic {a} vs numeric {n}");
            }
        }
    }

    #[test]
    fn shape_term_vanishes_at_optimum() {
        assert_eq!(shape_term(0.93, 0.93), 0.0);
        assert!(shape_term(1.05, 0.93) > 0.0);
    }

    #[test]
    fn forms_agree_at_optimal_radius() {
        let constants = PhysicalConstants::default();
        let unconstrained = LatticeModel::Unconstrained;
        let constrained = LatticeModel::constrained(&constants, constants.q1, 1100.0);
        let d0 = 312.5;
        let r0 = 0.912;
        let a = unconstrained.predict(r0, &[d0, r0, 27.0]);
        let b = constrained.predict(r0, &[d0, r0]);
        assert!((a - d0).abs() < 1e-12);
        assert!((b - d0).abs() < 1e-12);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let constants = PhysicalConstants::default();
        assert_gradient_matches(LatticeModel::Unconstrained, &[120.0, 0.93, 24.0]);
        assert_gradient_matches(LatticeModel::constrained(&constants, constants.q1, 1050.0), &[120.0, 0.93]);
        let cal = CalibrationPreset::Streicher2022.calibration();
        assert_gradient_matches(LatticeModel::temperature(&constants, constants.q1, cal), &[1020.0]);
    }

    #[test]
    fn temperature_model_is_nonfinite_at_zero_kelvin() {
        let constants = PhysicalConstants::default();
        let cal = CalibrationPreset::Streicher2022.calibration();
        let model = LatticeModel::temperature(&constants, constants.q1, cal);
        assert!(!model.predict(1.0, &[0.0]).is_finite());
    }
}
