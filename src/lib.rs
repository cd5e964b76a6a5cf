//! `lattice-strain` library crate.
//!
//! Fits the lattice strain model to mineral/melt partition coefficients and
//! inverts it for crystallisation temperature. The binary (`lsm`) is a thin
//! wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - fitting can be reused from other tools without the CLI

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod tui;
