//! Export of the data-flow structure to `petgraph`

use crate::ir::{Graph, NodeId, ValueDef, ValueId};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Build a directed graph with one vertex per linked node plus an `input`
/// and an `output` vertex. Each edge runs from the definition of a value to
/// one of its readers and is labelled with the value's name.
///
/// Nested blocks are flattened: their nodes become ordinary vertices, block
/// parameters are drawn as coming from the owning node, and block outputs
/// as edges into it.
pub fn to_petgraph(graph: &Graph) -> DiGraph<String, String> {
    let mut out = DiGraph::new();
    let input = out.add_node("input".to_string());
    let output = out.add_node("output".to_string());

    let nodes = graph.all_nodes();
    let mut index: HashMap<NodeId, NodeIndex> = HashMap::with_capacity(nodes.len());
    for &node in &nodes {
        index.insert(node, out.add_node(graph.node(node).kind().to_string()));
    }

    let source_of = |value: ValueId| -> NodeIndex {
        let def = match graph.value(value).def() {
            ValueDef::Node { node, .. } => Some(node),
            ValueDef::BlockParam { block, .. } => graph.block(block).owner(),
        };
        def.and_then(|n| index.get(&n).copied()).unwrap_or(input)
    };

    for &node in &nodes {
        let vertex = index[&node];
        for &value in graph.node(node).inputs() {
            out.add_edge(source_of(value), vertex, graph.value_name(value));
        }
        for &block in graph.node(node).blocks() {
            for &value in graph.block(block).outputs() {
                out.add_edge(source_of(value), vertex, graph.value_name(value));
            }
        }
    }

    for &value in graph.outputs() {
        out.add_edge(source_of(value), output, graph.value_name(value));
    }
    out
}
