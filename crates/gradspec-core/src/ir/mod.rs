//! In-memory program graph
//!
//! Nodes, values and blocks live in arenas owned by [`Graph`] and are
//! addressed by `Copy` ids. Node order inside a block is an intrusive
//! doubly-linked list, so a cursor held on one node stays valid while other
//! nodes are inserted, moved or destroyed.
//!
//! - [`graph`]: storage, construction and read access
//! - [`mutate`]: use redirection, splicing and node destruction
//! - [`lint`]: def-use integrity verification
//! - [`display`]: textual IR dump
//! - [`spec`]: JSON interchange format

mod display;
mod graph;
mod lint;
mod mutate;
pub mod spec;
mod types;

pub use graph::{Block, Graph, Node, NodeIter, Use, Value, ValueDef};
pub use spec::{BlockSpec, GraphSpec, NodeSpec, ValueSpec};
pub use types::{ScalarType, TensorType, Type};

use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a value in its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub(crate) u32);

/// Index of a node in its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

/// Index of a block in its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) u32);

macro_rules! impl_id {
    ($name:ident, $prefix:literal) => {
        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

impl_id!(ValueId, "%");
impl_id!(NodeId, "node ");
impl_id!(BlockId, "block ");

/// Operator kind of a node
///
/// The three kinds emitted by the differentiation graph builder are
/// distinguished; everything else is an opaque qualified operator name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NodeKind {
    /// `prim::GradOf`: guards a gradient computation held in its single block
    GradOf,
    /// `prim::AutogradAdd`: adds two gradients, either of which may be undefined
    AutogradAdd,
    /// `prim::Undefined`: produces an undefined tensor
    Undefined,
    /// Any other operator, e.g. `aten::mul` or `prim::Loop`
    Op(String),
}

impl NodeKind {
    pub const ADD: &'static str = "aten::add";

    /// Parse a qualified `namespace::name` operator symbol
    pub fn parse(symbol: &str) -> Result<Self, GraphError> {
        match symbol {
            "prim::GradOf" => Ok(NodeKind::GradOf),
            "prim::AutogradAdd" => Ok(NodeKind::AutogradAdd),
            "prim::Undefined" => Ok(NodeKind::Undefined),
            _ => match symbol.split_once("::") {
                Some((ns, name))
                    if !ns.is_empty()
                        && !name.is_empty()
                        && !name.contains("::")
                        && symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':') =>
                {
                    Ok(NodeKind::Op(symbol.to_string()))
                }
                _ => Err(GraphError::InvalidKind(symbol.to_string())),
            },
        }
    }

    pub fn op(symbol: &str) -> Self {
        NodeKind::Op(symbol.to_string())
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::GradOf => "prim::GradOf",
            NodeKind::AutogradAdd => "prim::AutogradAdd",
            NodeKind::Undefined => "prim::Undefined",
            NodeKind::Op(symbol) => symbol,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for NodeKind {
    type Error = GraphError;

    fn try_from(symbol: String) -> Result<Self, Self::Error> {
        NodeKind::parse(&symbol)
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}
