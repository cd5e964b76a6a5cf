use thiserror::Error;

/// Application-level error: a message plus the process exit code.
///
/// Exit codes:
/// - 2: invalid input or configuration
/// - 3: not enough usable data
/// - 4: computation or output failure
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failures of a single fit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Input rejected before the solver ran.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Not enough observations for the requested model.
    #[error("insufficient data: {0}")]
    Insufficient(String),

    /// The evaluation budget ran out before any convergence criterion was met.
    #[error("fit did not converge within {max_nfev} evaluations (nfev={nfev}, cost={cost:.6e})")]
    NotConverged { nfev: usize, max_nfev: usize, cost: f64 },

    /// Non-finite values or a degenerate linear system.
    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match err {
            FitError::InvalidInput(_) => 2,
            FitError::Insufficient(_) => 3,
            FitError::NotConverged { .. } | FitError::Numerical(_) => 4,
        };
        AppError::new(code, err.to_string())
    }
}
