//! Def-use integrity checks

use super::{BlockId, Graph, NodeId, NodeKind, Use, ValueDef, ValueId};
use crate::error::{GraphError, Result};
use std::collections::HashSet;

impl Graph {
    /// Verify that the graph is well formed:
    ///
    /// - every value read by a node or declared as a block output is live,
    ///   in scope, and defined before the read
    /// - use lists and the slots they name agree in both directions
    /// - nodes are linked into the block they claim as owner
    /// - every `prim::GradOf` has one block whose outputs match its own
    /// - `prim::AutogradAdd` reads two values and `prim::Undefined` none,
    ///   and both produce exactly one
    pub fn lint(&self) -> Result<()> {
        let mut scope = HashSet::new();
        self.lint_block(self.top_block(), &mut scope)?;
        self.lint_use_lists()
    }

    fn lint_block(&self, block: BlockId, scope: &mut HashSet<ValueId>) -> Result<()> {
        let mut defined_here = Vec::new();

        for (offset, &param) in self.block(block).inputs().iter().enumerate() {
            let user = format!("parameter {offset} of {block}");
            self.check_live(param, &user)?;
            if self.value(param).def() != (ValueDef::BlockParam { block, offset }) {
                return Err(GraphError::DanglingUse { value: param, user });
            }
            scope.insert(param);
            defined_here.push(param);
        }

        for node in self.nodes(block) {
            self.lint_node(block, node, scope)?;
            for &output in self.node(node).outputs() {
                scope.insert(output);
                defined_here.push(output);
            }
        }

        for (offset, &output) in self.block(block).outputs().iter().enumerate() {
            let user = format!("output {offset} of {block}");
            self.check_read(output, &user, scope, Use::BlockOutput { block, offset })?;
        }

        for value in defined_here {
            scope.remove(&value);
        }
        Ok(())
    }

    fn lint_node(&self, block: BlockId, node: NodeId, scope: &mut HashSet<ValueId>) -> Result<()> {
        let data = self.node(node);
        if data.owner() != Some(block) {
            return Err(GraphError::OwnershipMismatch {
                node,
                block,
                owner: data.owner(),
            });
        }

        let shape = match data.kind() {
            NodeKind::AutogradAdd => Some((2, 1)),
            NodeKind::Undefined => Some((0, 1)),
            _ => None,
        };
        if let Some((expected_inputs, expected_outputs)) = shape {
            if data.inputs().len() != expected_inputs || data.outputs().len() != expected_outputs {
                return Err(GraphError::NodeArity {
                    node,
                    kind: data.kind().to_string(),
                    expected_inputs,
                    expected_outputs,
                    inputs: data.inputs().len(),
                    outputs: data.outputs().len(),
                });
            }
        }

        for (offset, &input) in data.inputs().iter().enumerate() {
            let user = format!("input {offset} of {node} ({})", data.kind());
            self.check_read(input, &user, scope, Use::Input { node, offset })?;
        }

        if data.kind() == &NodeKind::GradOf {
            match data.blocks() {
                [body] if self.block(*body).outputs().len() == data.outputs().len() => {}
                [body] => {
                    return Err(GraphError::ArityMismatch {
                        block: *body,
                        expected: self.block(*body).outputs().len(),
                        found: data.outputs().len(),
                    })
                }
                blocks => {
                    return Err(GraphError::BlockCount {
                        node,
                        found: blocks.len(),
                    })
                }
            }
        }

        for &nested in data.blocks() {
            let owner = self.block(nested).owner();
            if owner != Some(node) {
                return Err(GraphError::OrphanBlock {
                    block: nested,
                    node,
                    owner,
                });
            }
            self.lint_block(nested, scope)?;
        }

        for (offset, &output) in data.outputs().iter().enumerate() {
            self.check_live(output, &format!("output {offset} of {node}"))?;
            if self.value(output).def() != (ValueDef::Node { node, offset }) {
                return Err(GraphError::DanglingUse {
                    value: output,
                    user: format!("output {offset} of {node}"),
                });
            }
        }
        Ok(())
    }

    fn check_live(&self, value: ValueId, user: &str) -> Result<()> {
        if self.is_live_value(value) {
            Ok(())
        } else {
            Err(GraphError::StaleValue {
                value,
                user: user.to_string(),
            })
        }
    }

    fn check_read(&self, value: ValueId, user: &str, scope: &HashSet<ValueId>, site: Use) -> Result<()> {
        self.check_live(value, user)?;
        if !scope.contains(&value) {
            return Err(GraphError::UseBeforeDef {
                value,
                user: user.to_string(),
            });
        }
        if !self.value(value).uses().contains(&site) {
            return Err(GraphError::MissingUse {
                value,
                user: user.to_string(),
            });
        }
        Ok(())
    }

    /// Every recorded use must name a live slot that reads the value
    fn lint_use_lists(&self) -> Result<()> {
        for (index, slot) in self.values.iter().enumerate() {
            let Some(value) = slot else { continue };
            let id = ValueId(index as u32);
            for site in value.uses() {
                let reads_value = match *site {
                    Use::Input { node, offset } => {
                        self.is_live_node(node) && self.node(node).inputs().get(offset) == Some(&id)
                    }
                    Use::BlockOutput { block, offset } => {
                        self.is_live_block(block) && self.block(block).outputs().get(offset) == Some(&id)
                    }
                };
                if !reads_value {
                    return Err(GraphError::DanglingUse {
                        value: id,
                        user: format!("{site:?}"),
                    });
                }
            }
        }
        Ok(())
    }
}
