//! Lattice strain model implementations.
//!
//! Models are implemented as small, pure functions so that fitting code can
//! stay generic.

pub mod derived;
pub mod lattice;

pub use derived::*;
pub use lattice::*;
