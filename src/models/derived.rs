//! Derived physical quantities and their error propagation.
//!
//! - unconstrained fits report `E` in fit units (Å⁻³ scaled by `N_A/(R·T)`);
//!   converting to GPa is a single multiplicative factor.
//! - constrained fits never fit `E`: it follows from `r0` through
//!   `E = Q / ((c + r0)·1e-10)³`, and its uncertainty has to be propagated
//!   through that nonlinear map.

use crate::domain::{ParamEstimate, PhysicalConstants};

const ANGSTROM: f64 = 1e-10;
const PA_PER_GPA: f64 = 1e9;

/// Convert the unconstrained strain parameter (and its error) to GPa.
pub fn unconstrained_modulus_gpa(
    e_fit: ParamEstimate,
    temperature_k: f64,
    constants: &PhysicalConstants,
) -> ParamEstimate {
    let factor = constants.modulus_conversion(temperature_k);
    ParamEstimate::new(e_fit.value * factor, e_fit.stderr.map(|s| s.abs() * factor))
}

/// `E = Q / ((c + r0)·1e-10)³`, in GPa.
pub fn constrained_modulus_gpa(r0: f64, q_joules: f64, site_radius: f64) -> f64 {
    let rho = (site_radius + r0) * ANGSTROM;
    q_joules / rho.powi(3) / PA_PER_GPA
}

/// Second-order Taylor estimate of `σ_E` from `σ_r0` (both radii in Å).
///
/// `σ_E ≈ |E′(r0)·σ + ½·E″(r0)·σ²|` with `E′ = −3Q/ρ⁴` and `E″ = 12Q/ρ⁵`.
/// The second-order term matters once `σ_r0` is no longer small against `c + r0`.
pub fn constrained_modulus_sigma_gpa(r0: f64, sigma_r0: f64, q_joules: f64, site_radius: f64) -> f64 {
    let rho = (site_radius + r0) * ANGSTROM;
    let sigma = sigma_r0 * ANGSTROM;
    let first = -3.0 * q_joules / rho.powi(4) * sigma;
    let second = 6.0 * q_joules / rho.powi(5) * sigma * sigma;
    (first + second).abs() / PA_PER_GPA
}

/// First-order (linear) estimate `|E′(r0)|·σ`, in GPa.
pub fn constrained_modulus_sigma_linear_gpa(r0: f64, sigma_r0: f64, q_joules: f64, site_radius: f64) -> f64 {
    let rho = (site_radius + r0) * ANGSTROM;
    (3.0 * q_joules / rho.powi(4) * sigma_r0 * ANGSTROM).abs() / PA_PER_GPA
}

/// Derived modulus estimate for a constrained fit.
pub fn constrained_modulus(
    r0: ParamEstimate,
    q_joules: f64,
    constants: &PhysicalConstants,
) -> ParamEstimate {
    let value = constrained_modulus_gpa(r0.value, q_joules, constants.site_radius);
    let stderr = r0
        .stderr
        .map(|s| constrained_modulus_sigma_gpa(r0.value, s, q_joules, constants.site_radius));
    ParamEstimate::new(value, stderr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constrained_modulus_reference_value() {
        // Q1 with r0 = 0.9 Å: 6489e-21 / (2.28e-10)^3 / 1e9 ~ 547.5 GPa.
        let e = constrained_modulus_gpa(0.9, 6489e-21, 1.38);
        assert!((e - 547.48).abs() < 0.05, "got {e}");
    }

    #[test]
    fn taylor_reduces_to_first_order_for_small_errors() {
        let q = 6489e-21;
        for &sigma in &[1e-3, 1e-5, 1e-7] {
            let second = constrained_modulus_sigma_gpa(0.9, sigma, q, 1.38);
            let first = constrained_modulus_sigma_linear_gpa(0.9, sigma, q, 1.38);
            let rel = (second - first).abs() / first;
            // The relative correction is 2σ/(c + r0).
            assert!(rel <= 2.0 * sigma / 2.28 * 1.0001, "sigma={sigma}: rel={rel}");
        }
        assert_eq!(constrained_modulus_sigma_gpa(0.9, 0.0, q, 1.38), 0.0);
    }

    #[test]
    fn second_order_term_shrinks_large_error_estimate() {
        // E is convex in r0 and decreasing, so the quadratic term offsets the linear one.
        let q = 7687e-21;
        let second = constrained_modulus_sigma_gpa(0.95, 0.2, q, 1.38);
        let first = constrained_modulus_sigma_linear_gpa(0.95, 0.2, q, 1.38);
        assert!(second < first);
        assert!(second > 0.0);
    }

    #[test]
    fn unconstrained_conversion_scales_value_and_error() {
        let c = PhysicalConstants::default();
        let e = unconstrained_modulus_gpa(ParamEstimate::new(20.0, Some(2.0)), 1273.15, &c);
        let f = c.modulus_conversion(1273.15);
        assert!((e.value - 20.0 * f).abs() < 1e-9);
        assert!((e.stderr.unwrap() - 2.0 * f).abs() < 1e-9);
    }
}
