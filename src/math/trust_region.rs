//! Bounded nonlinear least squares: dogleg steps inside rectangular trust regions.
//!
//! We minimize `½‖r(p)‖²` subject to `lower <= p <= upper`, where `r` is the
//! vector of weighted residuals. Each iteration:
//!
//! 1. freezes variables sitting on a bound whose gradient points outward
//! 2. computes the Gauss–Newton step on the free variables (SVD solve) and the
//!    Cauchy point along the steepest-descent direction
//! 3. follows the dogleg path from the Cauchy point towards the Gauss–Newton
//!    point, truncated to `[lower − p, upper − p] ∩ [−Δ, Δ]`
//! 4. compares actual and predicted reduction to accept/reject the step and
//!    resize `Δ`
//!
//! The evaluation budget counts residual evaluations only (Jacobians are
//! analytic). Running out of budget is an error, never a silently returned
//! "best so far" point.

use nalgebra::{DMatrix, DVector};

use crate::error::FitError;
use crate::math::solve_least_squares;

/// A residual vector and its Jacobian.
pub trait ResidualProblem {
    fn n_params(&self) -> usize;
    fn n_residuals(&self) -> usize;
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;
    /// `∂r_i/∂p_j`, shape `n_residuals × n_params`.
    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64>;
}

/// Box constraints.
#[derive(Debug, Clone)]
pub struct Bounds {
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl Bounds {
    pub fn new(lower: &[f64], upper: &[f64]) -> Self {
        Self {
            lower: DVector::from_column_slice(lower),
            upper: DVector::from_column_slice(upper),
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Clamp a point into the box.
    pub fn project(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            x.len(),
            x.iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .map(|(&v, (&lo, &hi))| v.max(lo).min(hi)),
        )
    }

    pub fn clamp(&self, i: usize, v: f64) -> f64 {
        v.max(self.lower[i]).min(self.upper[i])
    }

    /// Whether variable `i` is held by its bound: descent (`−g`) would leave the box.
    fn is_blocking(&self, i: usize, x: f64, g: f64) -> bool {
        (x <= self.lower[i] && g > 0.0) || (x >= self.upper[i] && g < 0.0)
    }
}

/// Convergence tolerances and evaluation budget.
#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    /// Maximum number of residual evaluations.
    pub max_nfev: usize,
    /// Relative cost reduction tolerance.
    pub ftol: f64,
    /// Relative step size tolerance.
    pub xtol: f64,
    /// Projected gradient (∞-norm) tolerance.
    pub gtol: f64,
}

impl SolverOptions {
    pub fn with_budget(max_nfev: usize) -> Self {
        Self {
            max_nfev,
            ..Self::default()
        }
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_nfev: 100,
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ExactFit,
    GradientTolerance,
    CostTolerance,
    StepTolerance,
}

/// Converged solution.
#[derive(Debug, Clone)]
pub struct SolverReport {
    pub params: DVector<f64>,
    pub residuals: DVector<f64>,
    /// Jacobian at `params` (for covariance estimation).
    pub jacobian: DMatrix<f64>,
    /// `½‖r‖²`.
    pub cost: f64,
    pub nfev: usize,
    pub iterations: usize,
    pub termination: Termination,
}

/// Minimize `½‖r(p)‖²` within `bounds`, starting from `x0` (projected into the box).
pub fn minimize_bounded<P: ResidualProblem>(
    problem: &P,
    x0: &DVector<f64>,
    bounds: &Bounds,
    opts: &SolverOptions,
) -> Result<SolverReport, FitError> {
    let n = problem.n_params();
    if n == 0 || x0.len() != n || bounds.len() != n {
        return Err(FitError::InvalidInput(format!(
            "parameter dimension mismatch (model={n}, start={}, bounds={})",
            x0.len(),
            bounds.len()
        )));
    }
    if bounds
        .lower
        .iter()
        .zip(bounds.upper.iter())
        .any(|(lo, hi)| lo.is_nan() || hi.is_nan() || lo > hi)
    {
        return Err(FitError::InvalidInput("bounds must satisfy lower <= upper".to_string()));
    }
    if problem.n_residuals() == 0 {
        return Err(FitError::Insufficient("no residuals to minimize".to_string()));
    }
    if opts.max_nfev == 0 {
        return Err(FitError::InvalidInput("evaluation budget must be > 0".to_string()));
    }

    let mut x = bounds.project(x0);
    let mut r = problem.residuals(&x);
    let mut nfev = 1usize;
    if !r.iter().all(|v| v.is_finite()) {
        return Err(FitError::Numerical(
            "non-finite residuals at the starting point".to_string(),
        ));
    }
    let mut cost = 0.5 * r.norm_squared();
    let mut delta = x.amax().max(1.0);
    let mut iterations = 0usize;

    loop {
        if cost == 0.0 {
            return Ok(finish(problem, x, r, cost, nfev, iterations, Termination::ExactFit));
        }

        let jac = problem.jacobian(&x);
        if !jac.iter().all(|v| v.is_finite()) {
            return Err(FitError::Numerical(format!(
                "non-finite Jacobian at {:?}",
                x.as_slice()
            )));
        }
        let grad = jac.transpose() * &r;

        let free: Vec<usize> = (0..n)
            .filter(|&i| !bounds.is_blocking(i, x[i], grad[i]))
            .collect();
        let projected_grad = free.iter().map(|&i| grad[i].abs()).fold(0.0, f64::max);
        if projected_grad < opts.gtol {
            return Ok(finish(problem, x, r, cost, nfev, iterations, Termination::GradientTolerance));
        }
        if nfev >= opts.max_nfev {
            return Err(not_converged(nfev, opts, cost));
        }
        iterations += 1;

        let j_free = jac.select_columns(&free);
        let g_free = DVector::from_iterator(free.len(), free.iter().map(|&i| grad[i]));
        let gauss_newton = solve_least_squares(&j_free, &(-&r));
        let jg = &j_free * &g_free;
        let jg_sq = jg.norm_squared();
        let cauchy = if jg_sq > 0.0 {
            &g_free * (-g_free.norm_squared() / jg_sq)
        } else {
            -&g_free
        };

        // Shrink the region until a step is accepted (or we give up).
        loop {
            let lo = DVector::from_iterator(
                free.len(),
                free.iter().map(|&i| (bounds.lower[i] - x[i]).max(-delta)),
            );
            let hi = DVector::from_iterator(
                free.len(),
                free.iter().map(|&i| (bounds.upper[i] - x[i]).min(delta)),
            );
            let (step_free, hit_boundary) = dogleg_step(gauss_newton.as_ref(), &cauchy, &lo, &hi);

            let mut trial = x.clone();
            for (k, &i) in free.iter().enumerate() {
                trial[i] = bounds.clamp(i, x[i] + step_free[k]);
            }
            let step = &trial - &x;
            let js = &jac * &step;
            let predicted = -(grad.dot(&step) + 0.5 * js.norm_squared());

            let r_trial = problem.residuals(&trial);
            nfev += 1;
            let cost_trial = if r_trial.iter().all(|v| v.is_finite()) {
                0.5 * r_trial.norm_squared()
            } else {
                f64::INFINITY
            };
            let actual = cost - cost_trial;
            let ratio = if predicted > 0.0 && cost_trial.is_finite() {
                actual / predicted
            } else {
                -1.0
            };

            let step_inf = step.amax();
            if ratio < 0.25 {
                delta = if step_inf > 0.0 { 0.25 * step_inf } else { 0.25 * delta };
            } else if ratio > 0.75 && hit_boundary {
                delta = delta.max(2.0 * step_inf);
            }

            let step_small = step.norm() < opts.xtol * (opts.xtol + x.norm());

            if ratio > 0.0 {
                let cost_small = actual < opts.ftol * cost && ratio > 0.25;
                x = trial;
                r = r_trial;
                cost = cost_trial;
                if cost_small {
                    return Ok(finish(problem, x, r, cost, nfev, iterations, Termination::CostTolerance));
                }
                if step_small {
                    return Ok(finish(problem, x, r, cost, nfev, iterations, Termination::StepTolerance));
                }
                break;
            }

            // Rejected: the current point stays the best one.
            if step_small {
                return Ok(finish(problem, x, r, cost, nfev, iterations, Termination::StepTolerance));
            }
            if nfev >= opts.max_nfev {
                return Err(not_converged(nfev, opts, cost));
            }
        }
    }
}

fn not_converged(nfev: usize, opts: &SolverOptions, cost: f64) -> FitError {
    tracing::debug!(nfev, cost, "solver budget exhausted");
    FitError::NotConverged {
        nfev,
        max_nfev: opts.max_nfev,
        cost,
    }
}

fn finish<P: ResidualProblem>(
    problem: &P,
    params: DVector<f64>,
    residuals: DVector<f64>,
    cost: f64,
    nfev: usize,
    iterations: usize,
    termination: Termination,
) -> SolverReport {
    tracing::debug!(?termination, nfev, iterations, cost, "solver finished");
    let jacobian = problem.jacobian(&params);
    SolverReport {
        params,
        residuals,
        jacobian,
        cost,
        nfev,
        iterations,
        termination,
    }
}

/// Dogleg step inside the box `[lo, hi]` (which contains the origin).
///
/// Returns the step and whether it was truncated by the box.
fn dogleg_step(
    gauss_newton: Option<&DVector<f64>>,
    cauchy: &DVector<f64>,
    lo: &DVector<f64>,
    hi: &DVector<f64>,
) -> (DVector<f64>, bool) {
    if let Some(gn) = gauss_newton {
        if inside_box(gn, lo, hi) {
            return (gn.clone(), false);
        }
    }

    let origin = DVector::zeros(cauchy.len());
    let t = max_step_in_box(&origin, cauchy, lo, hi);
    let gn = match gauss_newton {
        Some(gn) if t >= 1.0 => gn,
        _ => return (cauchy * t, t < 1.0),
    };

    let dir = gn - cauchy;
    let tau = max_step_in_box(cauchy, &dir, lo, hi);
    (cauchy + dir * tau, true)
}

fn inside_box(p: &DVector<f64>, lo: &DVector<f64>, hi: &DVector<f64>) -> bool {
    p.iter()
        .zip(lo.iter().zip(hi.iter()))
        .all(|(&v, (&l, &h))| v >= l && v <= h)
}

/// Largest `t ∈ [0, 1]` with `origin + t·dir` inside `[lo, hi]`.
fn max_step_in_box(origin: &DVector<f64>, dir: &DVector<f64>, lo: &DVector<f64>, hi: &DVector<f64>) -> f64 {
    let mut t = 1.0_f64;
    for i in 0..dir.len() {
        if dir[i] > 0.0 {
            t = t.min((hi[i] - origin[i]) / dir[i]);
        } else if dir[i] < 0.0 {
            t = t.min((lo[i] - origin[i]) / dir[i]);
        }
    }
    t.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `y = a + b·x` residuals.
    struct Line {
        x: Vec<f64>,
        y: Vec<f64>,
    }

    impl ResidualProblem for Line {
        fn n_params(&self) -> usize {
            2
        }
        fn n_residuals(&self) -> usize {
            self.x.len()
        }
        fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
            DVector::from_iterator(
                self.x.len(),
                self.x.iter().zip(self.y.iter()).map(|(&x, &y)| y - (p[0] + p[1] * x)),
            )
        }
        fn jacobian(&self, _p: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_fn(self.x.len(), 2, |i, j| if j == 0 { -1.0 } else { -self.x[i] })
        }
    }

    /// `y = exp(k·x)` residuals (nonlinear in `k`).
    struct Decay {
        x: Vec<f64>,
        y: Vec<f64>,
    }

    impl ResidualProblem for Decay {
        fn n_params(&self) -> usize {
            1
        }
        fn n_residuals(&self) -> usize {
            self.x.len()
        }
        fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
            DVector::from_iterator(
                self.x.len(),
                self.x.iter().zip(self.y.iter()).map(|(&x, &y)| y - (p[0] * x).exp()),
            )
        }
        fn jacobian(&self, p: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_fn(self.x.len(), 1, |i, _| -self.x[i] * (p[0] * self.x[i]).exp())
        }
    }

    #[test]
    fn solves_linear_problem_exactly() {
        let problem = Line {
            x: vec![0.0, 1.0, 2.0, 3.0],
            y: vec![2.0, 5.0, 8.0, 11.0],
        };
        let bounds = Bounds::new(&[-100.0, -100.0], &[100.0, 100.0]);
        let report = minimize_bounded(&problem, &DVector::from_vec(vec![0.0, 0.0]), &bounds, &SolverOptions::default())
            .unwrap();
        assert!((report.params[0] - 2.0).abs() < 1e-9);
        assert!((report.params[1] - 3.0).abs() < 1e-9);
        assert!(report.cost < 1e-18);
    }

    #[test]
    fn active_bound_holds_the_solution() {
        // Unconstrained optimum is a = 5, b = 0; cap a at 3.
        let problem = Line {
            x: vec![-1.0, 0.0, 1.0],
            y: vec![5.0, 5.0, 5.0],
        };
        let bounds = Bounds::new(&[0.0, -10.0], &[3.0, 10.0]);
        let report = minimize_bounded(&problem, &DVector::from_vec(vec![1.0, 1.0]), &bounds, &SolverOptions::default())
            .unwrap();
        assert!((report.params[0] - 3.0).abs() < 1e-12);
        assert!(report.params[1].abs() < 1e-6);
    }

    #[test]
    fn nonlinear_problem_converges_within_budget() {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|&v| (-1.7 * v).exp()).collect();
        let problem = Decay { x, y };
        let bounds = Bounds::new(&[-10.0], &[10.0]);
        let report = minimize_bounded(&problem, &DVector::from_vec(vec![0.0]), &bounds, &SolverOptions::with_budget(50))
            .unwrap();
        assert!((report.params[0] + 1.7).abs() < 1e-7, "k={}", report.params[0]);
        assert!(report.nfev <= 50);
    }

    #[test]
    fn exhausted_budget_is_an_error() {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|&v| (-1.7 * v).exp()).collect();
        let problem = Decay { x, y };
        let bounds = Bounds::new(&[-10.0], &[10.0]);
        let err = minimize_bounded(&problem, &DVector::from_vec(vec![3.0]), &bounds, &SolverOptions::with_budget(2))
            .unwrap_err();
        assert!(matches!(err, FitError::NotConverged { max_nfev: 2, .. }), "{err:?}");
    }

    #[test]
    fn start_point_is_projected_into_bounds() {
        let problem = Line {
            x: vec![0.0, 1.0],
            y: vec![1.0, 1.0],
        };
        let bounds = Bounds::new(&[0.0, 0.0], &[2.0, 2.0]);
        let report = minimize_bounded(&problem, &DVector::from_vec(vec![-5.0, 9.0]), &bounds, &SolverOptions::default())
            .unwrap();
        assert!(report.params.iter().all(|&v| (0.0..=2.0).contains(&v)));
        assert!((report.params[0] - 1.0).abs() < 1e-8);
    }

    #[test]
    fn dogleg_takes_gauss_newton_step_when_it_fits() {
        let gn = DVector::from_vec(vec![0.5, -0.5]);
        let cauchy = DVector::from_vec(vec![0.2, -0.1]);
        let lo = DVector::from_vec(vec![-1.0, -1.0]);
        let hi = DVector::from_vec(vec![1.0, 1.0]);
        let (step, hit) = dogleg_step(Some(&gn), &cauchy, &lo, &hi);
        assert_eq!(step, gn);
        assert!(!hit);
    }

    #[test]
    fn dogleg_truncates_to_box() {
        let gn = DVector::from_vec(vec![4.0, 0.0]);
        let cauchy = DVector::from_vec(vec![0.5, 0.0]);
        let lo = DVector::from_vec(vec![-1.0, -1.0]);
        let hi = DVector::from_vec(vec![1.0, 1.0]);
        let (step, hit) = dogleg_step(Some(&gn), &cauchy, &lo, &hi);
        assert!((step[0] - 1.0).abs() < 1e-12);
        assert!(hit);
    }
}
