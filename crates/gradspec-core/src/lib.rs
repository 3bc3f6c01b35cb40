//! # Gradspec Core
//!
//! Program graphs for automatically differentiated computations and the
//! undefined-gradient specialization pass that runs over them.
//!
//! ## Modules
//!
//! - **[`ir`]** - Arena-backed graph model, mutation primitives, lint, dump and JSON interchange
//! - **[`dataflow`]** - Definedness lattice and the specialization walk
//! - **[`config`]** - Pass options
//! - **[`export`]** - Conversion to `petgraph` for visualization
//!
//! ## Quick Start
//!
//! ```rust
//! use gradspec_core::prelude::*;
//!
//! let mut graph = Graph::new();
//! let x = graph.add_input(Type::Dynamic);
//! let dy = graph.add_input(Type::UndefinedTensor);
//! let acc = graph.append(NodeKind::AutogradAdd, &[dy, x], vec![Type::Dynamic]);
//! let out = graph.node(acc).output();
//! graph.register_output(out);
//!
//! specialize_undefined(&mut graph);
//! assert_eq!(graph.outputs(), &[x]);
//! ```

pub mod config;
pub mod dataflow;
pub mod error;
pub mod export;
pub mod ir;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::SpecializeConfig;
    pub use crate::dataflow::{specialize_undefined, Definedness, SpecializeStats, StateMap, UndefinedSpecializer};
    pub use crate::error::{GraphError, Result};
    pub use crate::ir::{BlockId, Graph, GraphSpec, NodeId, NodeKind, Type, ValueId};
}

pub use config::SpecializeConfig;
pub use dataflow::{specialize_undefined, Definedness, SpecializeStats, UndefinedSpecializer};
pub use error::{GraphError, Result};
pub use ir::{Graph, GraphSpec, NodeKind, Type};
