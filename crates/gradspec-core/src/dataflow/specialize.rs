//! Undefined-gradient specialization
//!
//! A single forward walk over a gradient graph that propagates
//! [`Definedness`] and uses it to:
//!
//! 1. delete `prim::GradOf` nodes whose inputs are all undefined, replacing
//!    their outputs with a `prim::Undefined`
//! 2. hoist the body of every other `prim::GradOf` into the enclosing block
//! 3. drop `prim::AutogradAdd` nodes with an undefined operand, and turn the
//!    ones whose operands are both defined into a plain `aten::add`
//!
//! Only the three node kinds produced by symbolic differentiation are
//! understood. Outputs of everything else are Unknown, and blocks owned by
//! anything but a `prim::GradOf` are not entered.

use super::lattice::{Definedness, StateMap};
use crate::config::SpecializeConfig;
use crate::ir::{BlockId, Graph, NodeId, NodeKind, Use, ValueDef, ValueId};
use std::collections::HashSet;
use tracing::{debug, info, trace};

/// Counts of the rewrites performed by one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecializeStats {
    /// `prim::GradOf` nodes replaced by an undefined value
    pub grad_of_eliminated: usize,
    /// `prim::GradOf` nodes whose body was hoisted
    pub grad_of_hoisted: usize,
    /// Nodes moved out of hoisted bodies
    pub hoisted_nodes: usize,
    /// `prim::AutogradAdd` nodes replaced by one of their operands
    pub adds_forwarded: usize,
    /// `prim::AutogradAdd` nodes replaced by `aten::add`
    pub adds_upgraded: usize,
    /// `prim::AutogradAdd` nodes left in place
    pub adds_kept: usize,
}

impl SpecializeStats {
    pub fn rewrites(&self) -> usize {
        self.grad_of_eliminated + self.grad_of_hoisted + self.adds_forwarded + self.adds_upgraded
    }
}

/// Propagate undefinedness through `graph` and remove every `prim::GradOf`
/// in the walked region, with the default configuration
pub fn specialize_undefined(graph: &mut Graph) {
    UndefinedSpecializer::default().run(graph);
}

#[derive(Debug, Clone, Default)]
pub struct UndefinedSpecializer {
    config: SpecializeConfig,
}

impl UndefinedSpecializer {
    pub fn new(config: SpecializeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpecializeConfig {
        &self.config
    }

    pub fn run(&self, graph: &mut Graph) -> SpecializeStats {
        self.run_with_states(graph).0
    }

    /// Like [`run`](Self::run), also returning the definedness computed for
    /// every value the walk visited
    ///
    /// # Panics
    /// If a `prim::GradOf` has an input of unknown definedness, or, with
    /// `verify` set, if the rewritten graph fails [`Graph::lint`].
    pub fn run_with_states(&self, graph: &mut Graph) -> (SpecializeStats, StateMap) {
        let top = graph.top_block();
        let mut walker = Walker {
            state: StateMap::seed_from_inputs(graph),
            graph: &mut *graph,
            stats: SpecializeStats::default(),
            share_undefined: self.config.share_undefined_producer,
            shared_undefined: None,
            kept: HashSet::new(),
        };
        walker.walk_block(top);
        let Walker { stats, state, .. } = walker;

        info!(
            grad_of_eliminated = stats.grad_of_eliminated,
            grad_of_hoisted = stats.grad_of_hoisted,
            hoisted_nodes = stats.hoisted_nodes,
            adds_forwarded = stats.adds_forwarded,
            adds_upgraded = stats.adds_upgraded,
            adds_kept = stats.adds_kept,
            "undefined specialization finished"
        );

        if self.config.verify {
            if let Err(err) = graph.lint() {
                panic!("graph is malformed after undefined specialization: {err}\n{graph}");
            }
        }
        (stats, state)
    }
}

struct Walker<'g> {
    graph: &'g mut Graph,
    state: StateMap,
    stats: SpecializeStats,
    share_undefined: bool,
    shared_undefined: Option<ValueId>,
    /// Visited `prim::AutogradAdd` nodes left in place
    kept: HashSet<NodeId>,
}

impl Walker<'_> {
    fn walk_block(&mut self, block: BlockId) {
        let mut cursor = self.graph.block(block).first();
        while let Some(node) = cursor {
            // Fetched first: visiting may destroy `node` and only ever
            // inserts right next to it.
            cursor = self.graph.node(node).next();
            self.visit(node);
        }
    }

    fn visit(&mut self, node: NodeId) {
        let kind = self.graph.node(node).kind().clone();
        trace!(%node, %kind, "visit");
        match kind {
            NodeKind::GradOf => self.visit_grad_of(node),
            NodeKind::AutogradAdd => {
                self.visit_autograd_add(node);
            }
            NodeKind::Undefined => {
                let output = self.graph.node(node).output();
                self.state.set(output, Definedness::Undefined);
            }
            NodeKind::Op(_) => {
                for &output in self.graph.node(node).outputs() {
                    self.state.set(output, Definedness::Unknown);
                }
            }
        }
    }

    fn visit_grad_of(&mut self, node: NodeId) {
        let inputs = self.graph.node(node).inputs().to_vec();
        let outputs = self.graph.node(node).outputs().to_vec();

        // No gradient flows in, so none flows out.
        if self.state.all_undefined(&inputs) {
            let undefined = self.undefined_for(node);
            for &output in &outputs {
                self.graph.replace_all_uses_with(output, undefined);
            }
            self.graph.destroy_node(node);
            self.stats.grad_of_eliminated += 1;
            debug!(%node, outputs = outputs.len(), "removed prim::GradOf with only undefined inputs");
            return;
        }

        // Gradient graphs are built from linear nodes and AutogradAdds, so
        // every GradOf input must be resolved by now.
        for &input in &inputs {
            assert!(
                self.state.get(input).is_resolved(),
                "prim::GradOf ({node}) input {input} has unknown definedness"
            );
        }

        let body = match self.graph.node(node).blocks() {
            [body] => *body,
            blocks => panic!("prim::GradOf ({node}) must own exactly one block, found {}", blocks.len()),
        };

        self.walk_block(body);

        // Read after the walk: rewrites inside the body may have retargeted
        // its outputs.
        let body_outputs = self.graph.block(body).outputs().to_vec();
        assert_eq!(
            outputs.len(),
            body_outputs.len(),
            "prim::GradOf ({node}) has {} outputs but its block declares {}",
            outputs.len(),
            body_outputs.len()
        );

        let moved = self.graph.splice_block_before(body, node);
        let moved_set: HashSet<NodeId> = moved.iter().copied().collect();

        // A GradOf with some defined input produces defined gradients.
        let mut upgraded = Vec::new();
        for &value in &body_outputs {
            if let ValueDef::Node { node: def, .. } = self.graph.value(value).def() {
                if moved_set.contains(&def) && self.state.get(value) == Definedness::Unknown {
                    self.state.set(value, Definedness::Defined);
                    upgraded.push(value);
                }
            }
        }
        self.revisit_readers(upgraded);

        let body_outputs = self.graph.block(body).outputs().to_vec();
        for (&output, &replacement) in outputs.iter().zip(&body_outputs) {
            self.graph.replace_all_uses_with(output, replacement);
        }
        self.graph.destroy_node(node);

        self.stats.grad_of_hoisted += 1;
        self.stats.hoisted_nodes += moved.len();
        debug!(%node, hoisted = moved.len(), "hoisted prim::GradOf body");
    }

    /// Visit kept `prim::AutogradAdd` readers of values whose state became
    /// more precise, following every rewrite to the readers of its result
    fn revisit_readers(&mut self, mut worklist: Vec<ValueId>) {
        while let Some(value) = worklist.pop() {
            if !self.graph.is_live_value(value) {
                continue;
            }
            let mut readers: Vec<NodeId> = self
                .graph
                .uses(value)
                .iter()
                .filter_map(|site| match *site {
                    Use::Input { node, .. } => Some(node),
                    Use::BlockOutput { .. } => None,
                })
                .collect();
            readers.sort_unstable();
            readers.dedup();

            for reader in readers {
                if !self.kept.remove(&reader) {
                    continue;
                }
                self.stats.adds_kept -= 1;
                trace!(node = %reader, %value, "revisiting prim::AutogradAdd");
                if let Some(replacement) = self.visit_autograd_add(reader) {
                    worklist.push(replacement);
                }
            }
        }
    }

    /// Returns the value that replaced the node's output, if it was rewritten
    fn visit_autograd_add(&mut self, node: NodeId) -> Option<ValueId> {
        let (a, b, output) = {
            let data = self.graph.node(node);
            assert_eq!(
                data.inputs().len(),
                2,
                "prim::AutogradAdd ({node}) must have exactly two inputs"
            );
            (data.input(0), data.input(1), data.output())
        };

        match (self.state.get(a), self.state.get(b)) {
            (Definedness::Undefined, _) => {
                self.graph.replace_all_uses_with(output, b);
                self.graph.destroy_node(node);
                self.stats.adds_forwarded += 1;
                debug!(%node, operand = %b, "undefined + b => b");
                Some(b)
            }
            (_, Definedness::Undefined) => {
                self.graph.replace_all_uses_with(output, a);
                self.graph.destroy_node(node);
                self.stats.adds_forwarded += 1;
                debug!(%node, operand = %a, "a + undefined => a");
                Some(a)
            }
            (Definedness::Defined, Definedness::Defined) => {
                let add = self.graph.create_add(a, b);
                self.graph.insert_before(add, node);
                let sum = self.graph.node(add).output();
                self.state.set(sum, Definedness::Defined);
                self.graph.replace_all_uses_with(output, sum);
                self.graph.destroy_node(node);
                self.stats.adds_upgraded += 1;
                debug!(%node, replacement = %add, "both operands defined, using aten::add");
                Some(sum)
            }
            (sa, sb) => {
                // A revisited node keeps whatever its output was upgraded to.
                if !self.state.contains(output) {
                    self.state.set(output, Definedness::Unknown);
                }
                self.stats.adds_kept += 1;
                self.kept.insert(node);
                trace!(%node, a = %sa, b = %sb, "keeping guarded prim::AutogradAdd");
                None
            }
        }
    }

    /// The undefined value that replaces the outputs of `grad_of`
    fn undefined_for(&mut self, grad_of: NodeId) -> ValueId {
        if let Some(shared) = self.shared_undefined {
            return shared;
        }
        let producer = self.graph.create_undefined();
        if self.share_undefined {
            let top = self.graph.top_block();
            self.graph.prepend_node(top, producer);
        } else {
            self.graph.insert_after(producer, grad_of);
        }
        let value = self.graph.node(producer).output();
        self.state.set(value, Definedness::Undefined);
        if self.share_undefined {
            self.shared_undefined = Some(value);
        }
        value
    }
}
