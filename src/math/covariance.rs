//! Parameter covariance from the Jacobian at the solution.
//!
//! `cov = (JᵀJ)⁺`, computed from the SVD of `J` so that rank deficiency is
//! detected rather than hidden behind a huge inverse. In relative mode the
//! covariance is rescaled by the reduced chi-squared.

use nalgebra::DMatrix;

use crate::domain::SigmaMode;

/// Covariance estimate; `None` entries where the estimate is unusable.
#[derive(Debug, Clone)]
pub struct Covariance {
    /// Full matrix, `None` when it cannot be estimated.
    pub matrix: Option<Vec<Vec<f64>>>,
    /// Standard errors, one per parameter.
    pub stderr: Vec<Option<f64>>,
}

impl Covariance {
    fn unavailable(n: usize) -> Self {
        Self {
            matrix: None,
            stderr: vec![None; n],
        }
    }
}

/// Estimate the covariance of the fitted parameters.
///
/// `jacobian` is the Jacobian of the weighted residuals, `chi2` the weighted
/// sum of squared residuals at the solution.
pub fn estimate_covariance(jacobian: &DMatrix<f64>, chi2: f64, mode: SigmaMode) -> Covariance {
    let (m, n) = jacobian.shape();
    if n == 0 || m == 0 || !jacobian.iter().all(|v| v.is_finite()) {
        tracing::warn!("covariance unavailable: empty or non-finite Jacobian");
        return Covariance::unavailable(n);
    }

    let svd = jacobian.clone().svd(false, true);
    let Some(v_t) = svd.v_t else {
        return Covariance::unavailable(n);
    };
    let s = &svd.singular_values;
    let s_max = s.iter().cloned().fold(0.0, f64::max);
    let threshold = f64::EPSILON * m.max(n) as f64 * s_max;
    let rank = s.iter().filter(|&&v| v > threshold).count();
    if rank < n {
        tracing::warn!(rank, params = n, "covariance unavailable: Jacobian is rank deficient");
        return Covariance::unavailable(n);
    }

    let scale = match mode {
        SigmaMode::Absolute => 1.0,
        SigmaMode::Relative => {
            if m <= n {
                tracing::warn!(
                    observations = m,
                    params = n,
                    "covariance unavailable: no residual degrees of freedom"
                );
                return Covariance::unavailable(n);
            }
            chi2 / (m - n) as f64
        }
    };

    // (JᵀJ)⁻¹ = V · diag(1/s²) · Vᵀ
    let mut matrix = vec![vec![0.0; n]; n];
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for k in 0..s.len() {
                acc += v_t[(k, i)] * v_t[(k, j)] / (s[k] * s[k]);
            }
            *cell = acc * scale;
        }
    }

    let stderr = (0..n)
        .map(|i| {
            let var = matrix[i][i];
            if var.is_finite() && var >= 0.0 {
                Some(var.sqrt())
            } else {
                tracing::warn!(param = i, variance = var, "unusable variance estimate");
                None
            }
        })
        .collect();

    Covariance {
        matrix: Some(matrix),
        stderr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_mode_inverts_normal_matrix() {
        // Straight line through x = [0, 1, 2] with unit weights.
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let cov = estimate_covariance(&j, 123.0, SigmaMode::Absolute);
        let m = cov.matrix.unwrap();
        // JᵀJ = [[3, 3], [3, 5]], inverse = [[5, -3], [-3, 3]] / 6
        assert!((m[0][0] - 5.0 / 6.0).abs() < 1e-12);
        assert!((m[0][1] + 0.5).abs() < 1e-12);
        assert!((m[1][0] - m[0][1]).abs() < 1e-15);
        assert!((cov.stderr[1].unwrap() - 0.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn relative_mode_scales_by_reduced_chi2() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let abs = estimate_covariance(&j, 4.0, SigmaMode::Absolute);
        let rel = estimate_covariance(&j, 4.0, SigmaMode::Relative);
        let (rel, abs) = (rel.matrix.unwrap(), abs.matrix.unwrap());
        assert!((rel[1][1] - 4.0 * abs[1][1]).abs() < 1e-12);
    }

    #[test]
    fn relative_mode_needs_degrees_of_freedom() {
        let j = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1.0]);
        let cov = estimate_covariance(&j, 0.0, SigmaMode::Relative);
        assert!(cov.stderr.iter().all(Option::is_none));
        // Absolute mode has no such requirement.
        let cov = estimate_covariance(&j, 0.0, SigmaMode::Absolute);
        assert!(cov.stderr.iter().all(Option::is_some));
    }

    #[test]
    fn rank_deficient_jacobian_has_no_errors() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
        let cov = estimate_covariance(&j, 1.0, SigmaMode::Absolute);
        assert!(cov.stderr.iter().all(Option::is_none));
        assert!(cov.matrix.is_none());
    }
}
