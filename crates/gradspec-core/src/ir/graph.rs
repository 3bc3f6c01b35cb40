//! Arena storage and construction API for program graphs

use super::{BlockId, NodeId, NodeKind, Type, ValueId};
use smallvec::SmallVec;

/// Where a value is defined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    /// Parameter of a block; the graph inputs are the top block's parameters
    BlockParam { block: BlockId, offset: usize },
    /// Output of a node
    Node { node: NodeId, offset: usize },
}

/// A slot that reads a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Use {
    /// Input `offset` of `node`
    Input { node: NodeId, offset: usize },
    /// Declared output `offset` of `block`; the graph outputs are the top block's outputs
    BlockOutput { block: BlockId, offset: usize },
}

#[derive(Debug, Clone)]
pub struct Value {
    pub(super) ty: Type,
    pub(super) def: ValueDef,
    pub(super) uses: Vec<Use>,
    pub(super) debug_name: Option<String>,
}

impl Value {
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn def(&self) -> ValueDef {
        self.def
    }

    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    pub fn debug_name(&self) -> Option<&str> {
        self.debug_name.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(super) kind: NodeKind,
    pub(super) inputs: SmallVec<[ValueId; 2]>,
    pub(super) outputs: SmallVec<[ValueId; 1]>,
    pub(super) blocks: SmallVec<[BlockId; 1]>,
    pub(super) owner: Option<BlockId>,
    pub(super) prev: Option<NodeId>,
    pub(super) next: Option<NodeId>,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    pub fn input(&self, offset: usize) -> ValueId {
        self.inputs[offset]
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    /// The single output of this node
    ///
    /// # Panics
    /// If the node does not have exactly one output.
    pub fn output(&self) -> ValueId {
        assert_eq!(
            self.outputs.len(),
            1,
            "{} was expected to have exactly one output",
            self.kind
        );
        self.outputs[0]
    }

    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// Block this node is linked into, if any
    pub fn owner(&self) -> Option<BlockId> {
        self.owner
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub(super) inputs: Vec<ValueId>,
    pub(super) outputs: Vec<ValueId>,
    pub(super) first: Option<NodeId>,
    pub(super) last: Option<NodeId>,
    pub(super) owner: Option<NodeId>,
}

impl Block {
    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    pub fn first(&self) -> Option<NodeId> {
        self.first
    }

    pub fn last(&self) -> Option<NodeId> {
        self.last
    }

    /// Node that owns this block; `None` for the top block
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }
}

/// A program graph: a top block of nodes, its parameters (graph inputs)
/// and its declared outputs (graph outputs)
#[derive(Debug, Clone)]
pub struct Graph {
    pub(super) values: Vec<Option<Value>>,
    pub(super) nodes: Vec<Option<Node>>,
    pub(super) blocks: Vec<Option<Block>>,
    top: BlockId,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            nodes: Vec::new(),
            blocks: vec![Some(Block::default())],
            top: BlockId(0),
        }
    }

    pub fn top_block(&self) -> BlockId {
        self.top
    }

    pub fn inputs(&self) -> &[ValueId] {
        self.block(self.top).inputs()
    }

    pub fn outputs(&self) -> &[ValueId] {
        self.block(self.top).outputs()
    }

    pub fn value(&self, id: ValueId) -> &Value {
        match self.values.get(id.index()).and_then(Option::as_ref) {
            Some(value) => value,
            None => panic!("{id} is not a live value of this graph"),
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        match self.nodes.get(id.index()).and_then(Option::as_ref) {
            Some(node) => node,
            None => panic!("{id} is not a live node of this graph"),
        }
    }

    pub fn block(&self, id: BlockId) -> &Block {
        match self.blocks.get(id.index()).and_then(Option::as_ref) {
            Some(block) => block,
            None => panic!("{id} is not a live block of this graph"),
        }
    }

    pub(super) fn value_mut(&mut self, id: ValueId) -> &mut Value {
        match self.values.get_mut(id.index()).and_then(Option::as_mut) {
            Some(value) => value,
            None => panic!("{id} is not a live value of this graph"),
        }
    }

    pub(super) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes.get_mut(id.index()).and_then(Option::as_mut) {
            Some(node) => node,
            None => panic!("{id} is not a live node of this graph"),
        }
    }

    pub(super) fn block_mut(&mut self, id: BlockId) -> &mut Block {
        match self.blocks.get_mut(id.index()).and_then(Option::as_mut) {
            Some(block) => block,
            None => panic!("{id} is not a live block of this graph"),
        }
    }

    pub fn is_live_value(&self, id: ValueId) -> bool {
        matches!(self.values.get(id.index()), Some(Some(_)))
    }

    pub fn is_live_node(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.index()), Some(Some(_)))
    }

    pub fn is_live_block(&self, id: BlockId) -> bool {
        matches!(self.blocks.get(id.index()), Some(Some(_)))
    }

    pub fn uses(&self, id: ValueId) -> &[Use] {
        self.value(id).uses()
    }

    pub fn set_debug_name(&mut self, id: ValueId, name: impl Into<String>) {
        self.value_mut(id).debug_name = Some(name.into());
    }

    /// Nodes of `block` in order
    pub fn nodes(&self, block: BlockId) -> NodeIter<'_> {
        NodeIter {
            graph: self,
            cursor: self.block(block).first,
        }
    }

    /// Every linked node reachable from the top block, nested blocks included,
    /// in pre-order
    pub fn all_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_nodes(self.top, &mut out);
        out
    }

    fn collect_nodes(&self, block: BlockId, out: &mut Vec<NodeId>) {
        for node in self.nodes(block) {
            out.push(node);
            for &nested in self.node(node).blocks() {
                self.collect_nodes(nested, out);
            }
        }
    }

    pub fn find_nodes(&self, kind: &NodeKind) -> Vec<NodeId> {
        self.all_nodes()
            .into_iter()
            .filter(|&n| self.node(n).kind() == kind)
            .collect()
    }

    /// Number of nodes reachable from the top block
    pub fn node_count(&self) -> usize {
        self.all_nodes().len()
    }

    fn new_value(&mut self, ty: Type, def: ValueDef) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Some(Value {
            ty,
            def,
            uses: Vec::new(),
            debug_name: None,
        }));
        id
    }

    pub(super) fn add_use(&mut self, value: ValueId, site: Use) {
        self.value_mut(value).uses.push(site);
    }

    pub(super) fn remove_use(&mut self, value: ValueId, site: Use) {
        let uses = &mut self.value_mut(value).uses;
        if let Some(pos) = uses.iter().position(|u| *u == site) {
            uses.swap_remove(pos);
        }
    }

    /// Add a graph input
    pub fn add_input(&mut self, ty: Type) -> ValueId {
        self.add_block_input(self.top, ty)
    }

    /// Declare a graph output
    pub fn register_output(&mut self, value: ValueId) -> usize {
        self.register_block_output(self.top, value)
    }

    pub fn add_block_input(&mut self, block: BlockId, ty: Type) -> ValueId {
        let offset = self.block(block).inputs.len();
        let value = self.new_value(ty, ValueDef::BlockParam { block, offset });
        self.block_mut(block).inputs.push(value);
        value
    }

    pub fn register_block_output(&mut self, block: BlockId, value: ValueId) -> usize {
        let offset = self.block(block).outputs.len();
        self.add_use(value, Use::BlockOutput { block, offset });
        self.block_mut(block).outputs.push(value);
        offset
    }

    /// Create a detached node; link it with [`append_node`](Self::append_node)
    /// or one of the `insert_*` methods
    pub fn create_node(&mut self, kind: NodeKind, inputs: &[ValueId], output_types: Vec<Type>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            kind,
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
            blocks: SmallVec::new(),
            owner: None,
            prev: None,
            next: None,
        }));
        for &input in inputs {
            self.add_node_input(id, input);
        }
        for (offset, ty) in output_types.into_iter().enumerate() {
            let value = self.new_value(ty, ValueDef::Node { node: id, offset });
            self.node_mut(id).outputs.push(value);
        }
        id
    }

    pub fn add_node_input(&mut self, node: NodeId, value: ValueId) -> usize {
        let offset = self.node(node).inputs.len();
        self.add_use(value, Use::Input { node, offset });
        self.node_mut(node).inputs.push(value);
        offset
    }

    /// Create a nested block owned by `node`
    pub fn add_block(&mut self, node: NodeId) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Some(Block {
            owner: Some(node),
            ..Block::default()
        }));
        self.node_mut(node).blocks.push(id);
        id
    }

    /// Create a node and append it to the top block
    pub fn append(&mut self, kind: NodeKind, inputs: &[ValueId], output_types: Vec<Type>) -> NodeId {
        self.append_to(self.top, kind, inputs, output_types)
    }

    /// Create a node and append it to `block`
    pub fn append_to(
        &mut self,
        block: BlockId,
        kind: NodeKind,
        inputs: &[ValueId],
        output_types: Vec<Type>,
    ) -> NodeId {
        let node = self.create_node(kind, inputs, output_types);
        self.append_node(block, node);
        node
    }

    fn assert_detached(&self, node: NodeId) {
        assert!(
            self.node(node).owner.is_none(),
            "{node} ({}) is already linked into a block",
            self.node(node).kind
        );
    }

    pub fn append_node(&mut self, block: BlockId, node: NodeId) {
        self.assert_detached(node);
        let last = self.block(block).last;
        self.link(block, node, last, None);
    }

    pub fn prepend_node(&mut self, block: BlockId, node: NodeId) {
        self.assert_detached(node);
        let first = self.block(block).first;
        self.link(block, node, None, first);
    }

    /// Link a detached `node` immediately before `anchor`
    pub fn insert_before(&mut self, node: NodeId, anchor: NodeId) {
        self.assert_detached(node);
        let anchor_node = self.node(anchor);
        let block = match anchor_node.owner {
            Some(block) => block,
            None => panic!("cannot insert before detached {anchor}"),
        };
        let prev = anchor_node.prev;
        self.link(block, node, prev, Some(anchor));
    }

    /// Link a detached `node` immediately after `anchor`
    pub fn insert_after(&mut self, node: NodeId, anchor: NodeId) {
        self.assert_detached(node);
        let anchor_node = self.node(anchor);
        let block = match anchor_node.owner {
            Some(block) => block,
            None => panic!("cannot insert after detached {anchor}"),
        };
        let next = anchor_node.next;
        self.link(block, node, Some(anchor), next);
    }

    fn link(&mut self, block: BlockId, node: NodeId, prev: Option<NodeId>, next: Option<NodeId>) {
        {
            let n = self.node_mut(node);
            n.owner = Some(block);
            n.prev = prev;
            n.next = next;
        }
        match prev {
            Some(p) => self.node_mut(p).next = Some(node),
            None => self.block_mut(block).first = Some(node),
        }
        match next {
            Some(n) => self.node_mut(n).prev = Some(node),
            None => self.block_mut(block).last = Some(node),
        }
    }

    /// Detach `node` from its block, leaving its inputs, outputs and
    /// nested blocks intact
    pub(super) fn unlink(&mut self, node: NodeId) {
        let (owner, prev, next) = {
            let n = self.node(node);
            (n.owner, n.prev, n.next)
        };
        let Some(block) = owner else {
            return;
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.block_mut(block).first = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.block_mut(block).last = prev,
        }
        let n = self.node_mut(node);
        n.owner = None;
        n.prev = None;
        n.next = None;
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the nodes of one block
pub struct NodeIter<'g> {
    graph: &'g Graph,
    cursor: Option<NodeId>,
}

impl Iterator for NodeIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.cursor?;
        self.cursor = self.graph.node(current).next;
        Some(current)
    }
}
