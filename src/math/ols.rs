//! Linear least squares via SVD.
//!
//! Two callers solve small linear problems of the form
//!
//! ```text
//! minimize ‖A·x − b‖²
//! ```
//!
//! - the trust-region solver, for its Gauss–Newton step on the free variables
//! - the starting-point heuristic, for a weighted quadratic fit of `ln D`
//!
//! Implementation choices:
//! - SVD handles tall systems (more rows than columns) and near-singular ones.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Problems have at most three columns, so SVD cost is irrelevant.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() == 0 || x.ncols() == 0 || x.nrows() != y.len() {
        return None;
    }
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
