//! Starting points for the nonlinear fits.
//!
//! Near the optimum the lattice strain curve is a parabola in log space:
//!
//! ```text
//! ln D ≈ ln D0 − 2π·E·r0·(x − r0)²
//! ```
//!
//! so a weighted quadratic fit of `ln D` against `x` gives usable values for
//! all three parameters. The solver budget is small (50 evaluations by
//! default), so the seed matters.

use nalgebra::{DMatrix, DVector};

use crate::fit::Observations;
use crate::math::{solve_least_squares, Bounds};

/// Fallback curvature when the data do not bend downwards.
const FALLBACK_E: f64 = 10.0;

/// Peak of the data in log space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakEstimate {
    pub d0: f64,
    pub r0: f64,
    /// Unconstrained strain parameter implied by the curvature.
    pub e: f64,
}

/// Weighted quadratic fit of `ln y` (weights `y/σ`, the inverse log-space error).
///
/// Returns `[c0, c1, c2]` for `c0 + c1·x + c2·x²`, or `None` with fewer than
/// three points or a singular system.
pub fn log_quadratic(obs: &Observations) -> Option<[f64; 3]> {
    let n = obs.len();
    if n < 3 {
        return None;
    }
    let mut a = DMatrix::zeros(n, 3);
    let mut b = DVector::zeros(n);
    for i in 0..n {
        let (x, y) = (obs.x[i], obs.y[i]);
        let w = y / obs.sigma[i];
        a[(i, 0)] = w;
        a[(i, 1)] = w * x;
        a[(i, 2)] = w * x * x;
        b[i] = w * y.ln();
    }
    let c = solve_least_squares(&a, &b)?;
    Some([c[0], c[1], c[2]])
}

/// Peak position, height and curvature, falling back to the largest observation.
pub fn peak_estimate(obs: &Observations) -> PeakEstimate {
    if let Some([c0, c1, c2]) = log_quadratic(obs) {
        if c2 < 0.0 {
            let r0 = -c1 / (2.0 * c2);
            if r0.is_finite() && r0 > 0.0 {
                let e = -c2 / (2.0 * std::f64::consts::PI * r0);
                let d0 = (c0 + c1 * r0 + c2 * r0 * r0).exp();
                if d0.is_finite() && e.is_finite() {
                    return PeakEstimate { d0, r0, e };
                }
            }
        }
    }

    let (r0, d0) = obs
        .x
        .iter()
        .zip(obs.y.iter())
        .fold((obs.x[0], obs.y[0]), |best, (&x, &y)| if y > best.1 { (x, y) } else { best });
    PeakEstimate { d0, r0, e: FALLBACK_E }
}

/// `[D0, r0, E]` clamped into `bounds`.
pub fn unconstrained_seed(obs: &Observations, bounds: &Bounds) -> Vec<f64> {
    let peak = peak_estimate(obs);
    vec![bounds.clamp(0, peak.d0), bounds.clamp(1, peak.r0), bounds.clamp(2, peak.e)]
}

/// `[D0, r0]` clamped into `bounds`.
pub fn constrained_seed(obs: &Observations, bounds: &Bounds) -> Vec<f64> {
    let peak = peak_estimate(obs);
    vec![bounds.clamp(0, peak.d0), bounds.clamp(1, peak.r0)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LatticeModel;

    fn synthetic(params: &[f64]) -> Observations {
        let x = vec![0.977, 0.985, 1.004, 1.027, 1.053, 1.079, 1.109];
        let y: Vec<f64> = x.iter().map(|&r| LatticeModel::Unconstrained.predict(r, params)).collect();
        let sigma = y.iter().map(|v| 0.05 * v).collect();
        Observations::new(x, y, sigma).unwrap()
    }

    #[test]
    fn peak_lands_near_truth() {
        let peak = peak_estimate(&synthetic(&[150.0, 0.98, 30.0]));
        assert!((peak.r0 - 0.98).abs() < 0.05, "r0={}", peak.r0);
        assert!((peak.d0 / 150.0 - 1.0).abs() < 0.3, "d0={}", peak.d0);
        assert!(peak.e > 10.0 && peak.e < 60.0, "e={}", peak.e);
    }

    #[test]
    fn upward_parabola_falls_back_to_maximum() {
        let obs = Observations::new(
            vec![0.9, 1.0, 1.1],
            vec![10.0, 2.0, 12.0],
            vec![1.0, 1.0, 1.0],
        )
        .unwrap();
        let peak = peak_estimate(&obs);
        assert_eq!(peak.r0, 1.1);
        assert_eq!(peak.d0, 12.0);
        assert_eq!(peak.e, FALLBACK_E);
    }

    #[test]
    fn seeds_respect_bounds() {
        let obs = Observations::new(vec![0.9, 1.0], vec![5000.0, 4000.0], vec![1.0, 1.0]).unwrap();
        let bounds = Bounds::new(&[0.0, 0.0], &[2000.0, 2.0]);
        let seed = constrained_seed(&obs, &bounds);
        assert_eq!(seed, vec![2000.0, 0.9]);
    }
}
