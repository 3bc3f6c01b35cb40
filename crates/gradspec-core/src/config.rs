//! Pass configuration

use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options for [`UndefinedSpecializer`](crate::dataflow::UndefinedSpecializer)
///
/// ```toml
/// share_undefined_producer = true
/// verify = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecializeConfig {
    /// Route every eliminated `prim::GradOf` to one `prim::Undefined` at the
    /// top of the graph instead of inserting one per eliminated node
    pub share_undefined_producer: bool,
    /// Lint the graph after the pass and panic if it is malformed
    pub verify: bool,
}

impl Default for SpecializeConfig {
    fn default() -> Self {
        Self {
            share_undefined_producer: false,
            verify: cfg!(debug_assertions),
        }
    }
}

impl SpecializeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shared_undefined(mut self, share: bool) -> Self {
        self.share_undefined_producer = share;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GraphError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}
