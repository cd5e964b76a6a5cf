//! Numerical building blocks: linear least squares, the bounded trust-region
//! solver, and covariance estimation.

pub mod covariance;
pub mod ols;
pub mod trust_region;

pub use covariance::*;
pub use ols::*;
pub use trust_region::*;
