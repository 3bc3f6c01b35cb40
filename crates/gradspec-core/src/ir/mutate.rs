//! Structural edits that keep use lists consistent

use super::{BlockId, Graph, NodeId, NodeKind, Type, Use, ValueId};

impl Graph {
    /// Repoint every reader of `from` (node inputs and block outputs) at `to`.
    /// Afterwards `from` has no uses.
    pub fn replace_all_uses_with(&mut self, from: ValueId, to: ValueId) {
        if from == to {
            return;
        }
        let uses = std::mem::take(&mut self.value_mut(from).uses);
        for site in &uses {
            match *site {
                Use::Input { node, offset } => self.node_mut(node).inputs[offset] = to,
                Use::BlockOutput { block, offset } => self.block_mut(block).outputs[offset] = to,
            }
        }
        self.value_mut(to).uses.extend(uses);
    }

    /// Move a linked node so that it sits immediately before `anchor`
    pub fn move_before(&mut self, node: NodeId, anchor: NodeId) {
        assert_ne!(node, anchor, "cannot move {node} before itself");
        self.unlink(node);
        self.insert_before(node, anchor);
    }

    /// Move every node of `block`, in order, to just before `anchor`.
    /// Returns the moved nodes. Values are neither copied nor renamed.
    pub fn splice_block_before(&mut self, block: BlockId, anchor: NodeId) -> Vec<NodeId> {
        let moved: Vec<NodeId> = self.nodes(block).collect();
        for &node in &moved {
            self.move_before(node, anchor);
        }
        moved
    }

    /// Remove `node` from the graph together with its nested blocks.
    ///
    /// # Panics
    /// If any output of `node` is still used. Redirect uses first.
    pub fn destroy_node(&mut self, node: NodeId) {
        for &output in self.node(node).outputs() {
            let uses = self.value(output).uses().len();
            assert!(
                uses == 0,
                "cannot destroy {node} ({}): output {output} still has {uses} use(s)",
                self.node(node).kind()
            );
        }

        let nested: Vec<BlockId> = self.node(node).blocks().to_vec();
        for block in nested {
            self.destroy_block(block);
        }

        let inputs: Vec<ValueId> = self.node(node).inputs().to_vec();
        for (offset, input) in inputs.into_iter().enumerate() {
            self.remove_use(input, Use::Input { node, offset });
        }

        self.unlink(node);
        let outputs: Vec<ValueId> = self.node(node).outputs().to_vec();
        for output in outputs {
            self.values[output.index()] = None;
        }
        self.nodes[node.index()] = None;
    }

    fn destroy_block(&mut self, block: BlockId) {
        let outputs: Vec<ValueId> = self.block(block).outputs().to_vec();
        for (offset, output) in outputs.into_iter().enumerate() {
            self.remove_use(output, Use::BlockOutput { block, offset });
        }
        self.block_mut(block).outputs.clear();

        // Later nodes read earlier ones, so tear down from the back.
        while let Some(last) = self.block(block).last() {
            self.destroy_node(last);
        }

        let params: Vec<ValueId> = self.block(block).inputs().to_vec();
        for param in params {
            let uses = self.value(param).uses().len();
            assert!(uses == 0, "cannot destroy {block}: parameter {param} still has {uses} use(s)");
            self.values[param.index()] = None;
        }
        self.blocks[block.index()] = None;
    }

    /// Create a detached `prim::Undefined` node
    pub fn create_undefined(&mut self) -> NodeId {
        self.create_node(NodeKind::Undefined, &[], vec![Type::UndefinedTensor])
    }

    /// Create a detached, unguarded `aten::add(a, b)` node
    pub fn create_add(&mut self, a: ValueId, b: ValueId) -> NodeId {
        self.create_node(NodeKind::op(NodeKind::ADD), &[a, b], vec![Type::Dynamic])
    }
}
