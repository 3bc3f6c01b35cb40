//! Error types for graph construction and verification
//!
//! Recoverable failures only. Contract violations inside the pass (a
//! `prim::GradOf` with an unresolved input, destroying a node that is still
//! used) are panics, not `GraphError`s.

use crate::ir::{BlockId, NodeId, ValueId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown value '%{0}'")]
    UnknownValue(String),

    #[error("value '%{0}' is defined more than once")]
    DuplicateValue(String),

    #[error("invalid node kind '{0}': expected a qualified name such as 'aten::add'")]
    InvalidKind(String),

    #[error("{value} is used by {user} before its definition")]
    UseBeforeDef { value: ValueId, user: String },

    #[error("{value} is referenced by {user} but has been destroyed")]
    StaleValue { value: ValueId, user: String },

    #[error("use list of {value} names {user}, which does not reference it")]
    DanglingUse { value: ValueId, user: String },

    #[error("{user} references {value} but is missing from its use list")]
    MissingUse { value: ValueId, user: String },

    #[error("{node} is linked into {block} but records {owner:?} as its owner")]
    OwnershipMismatch {
        node: NodeId,
        block: BlockId,
        owner: Option<BlockId>,
    },

    #[error("{block} is listed by {node} but owned by {owner:?}")]
    OrphanBlock {
        block: BlockId,
        node: NodeId,
        owner: Option<NodeId>,
    },

    #[error("{node} must own exactly one block, found {found}")]
    BlockCount { node: NodeId, found: usize },

    #[error("{node} ({kind}) takes {expected_inputs} input(s) and {expected_outputs} output(s), found {inputs} and {outputs}")]
    NodeArity {
        node: NodeId,
        kind: String,
        expected_inputs: usize,
        expected_outputs: usize,
        inputs: usize,
        outputs: usize,
    },

    #[error("{block} declares {expected} outputs but its node has {found}")]
    ArityMismatch {
        block: BlockId,
        expected: usize,
        found: usize,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("malformed graph description: {0}")]
    Json(String),
}

impl From<toml::de::Error> for GraphError {
    fn from(err: toml::de::Error) -> Self {
        GraphError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Json(err.to_string())
    }
}
