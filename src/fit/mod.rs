//! Fitting orchestration.
//!
//! Responsibilities:
//!
//! - validate sample sets and derive starting points
//! - run the bounded solver for one model (`fitter`)
//! - lattice strain fits in reporting units (`lattice`)
//! - pick between models using BIC (`selection`)
//! - temperature estimation per sample column (`temperature`)

pub mod fitter;
pub mod lattice;
pub mod seed;
pub mod selection;
pub mod temperature;

pub use fitter::*;
pub use lattice::*;
pub use seed::*;
pub use selection::*;
pub use temperature::*;
