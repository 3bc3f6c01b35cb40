//! Definedness analysis for gradient graphs
//!
//! This module implements the undefined-gradient specialization pass:
//! - A three-state definedness lattice seeded from graph input types
//! - A single forward walk that propagates it through the node order
//! - Rewrites of `prim::GradOf` and `prim::AutogradAdd` driven by the result

mod lattice;
mod specialize;

pub use lattice::{Definedness, StateMap};
pub use specialize::{specialize_undefined, SpecializeStats, UndefinedSpecializer};
