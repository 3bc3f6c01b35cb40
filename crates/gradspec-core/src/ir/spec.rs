//! JSON interchange format
//!
//! A [`GraphSpec`] names every value and refers to values by name, which
//! is how graphs are handed to the command line driver:
//!
//! ```json
//! {
//!   "inputs": [{ "name": "x", "type": "Dynamic" }],
//!   "nodes": [
//!     { "kind": "aten::neg", "inputs": ["x"], "outputs": [{ "name": "y", "type": "Dynamic" }] }
//!   ],
//!   "outputs": ["y"]
//! }
//! ```

use super::{BlockId, Graph, NodeId, NodeKind, Type, ValueId};
use crate::error::{GraphError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<ValueSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<BlockSpec>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<ValueSpec>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default)]
    pub inputs: Vec<ValueSpec>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl GraphSpec {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build a graph, checking that names are unique and that every
    /// reference is in scope
    pub fn build(&self) -> Result<Graph> {
        let mut builder = SpecBuilder {
            graph: Graph::new(),
            names: IndexMap::new(),
        };
        let top = builder.graph.top_block();
        builder.build_block(
            top,
            &BlockSpec {
                inputs: self.inputs.clone(),
                nodes: self.nodes.clone(),
                outputs: self.outputs.clone(),
            },
        )?;
        builder.graph.lint()?;
        Ok(builder.graph)
    }

    /// Describe `graph`. Values keep their debug names where these are
    /// unique; the rest are named after their index.
    pub fn from_graph(graph: &Graph) -> Self {
        let mut namer = Namer {
            graph,
            taken: HashSet::new(),
            names: IndexMap::new(),
        };
        let block = namer.describe_block(graph.top_block());
        GraphSpec {
            inputs: block.inputs,
            nodes: block.nodes,
            outputs: block.outputs,
        }
    }
}

struct SpecBuilder {
    graph: Graph,
    names: IndexMap<String, ValueId>,
}

impl SpecBuilder {
    fn define(&mut self, spec: &ValueSpec, value: ValueId) -> Result<()> {
        if self.names.insert(spec.name.clone(), value).is_some() {
            return Err(GraphError::DuplicateValue(spec.name.clone()));
        }
        self.graph.set_debug_name(value, spec.name.clone());
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<ValueId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownValue(name.to_string()))
    }

    fn build_block(&mut self, block: BlockId, spec: &BlockSpec) -> Result<()> {
        for input in &spec.inputs {
            let value = self.graph.add_block_input(block, input.ty.clone());
            self.define(input, value)?;
        }
        for node in &spec.nodes {
            self.build_node(block, node)?;
        }
        for name in &spec.outputs {
            let value = self.lookup(name)?;
            self.graph.register_block_output(block, value);
        }
        Ok(())
    }

    fn build_node(&mut self, block: BlockId, spec: &NodeSpec) -> Result<NodeId> {
        let inputs = spec
            .inputs
            .iter()
            .map(|name| self.lookup(name))
            .collect::<Result<Vec<_>>>()?;
        let types = spec.outputs.iter().map(|o| o.ty.clone()).collect();
        let node = self.graph.append_to(block, spec.kind.clone(), &inputs, types);
        for nested in &spec.blocks {
            let nested_block = self.graph.add_block(node);
            self.build_block(nested_block, nested)?;
        }
        let outputs = self.graph.node(node).outputs().to_vec();
        for (output, output_spec) in outputs.into_iter().zip(&spec.outputs) {
            self.define(output_spec, output)?;
        }
        Ok(node)
    }
}

struct Namer<'g> {
    graph: &'g Graph,
    taken: HashSet<String>,
    names: IndexMap<ValueId, String>,
}

impl Namer<'_> {
    fn name(&mut self, value: ValueId) -> String {
        if let Some(name) = self.names.get(&value) {
            return name.clone();
        }
        let mut name = match self.graph.value(value).debug_name() {
            Some(debug) => debug.to_string(),
            None => value.index().to_string(),
        };
        if self.taken.contains(&name) {
            let base = name;
            let mut suffix = value.index();
            name = format!("{base}.{suffix}");
            while self.taken.contains(&name) {
                suffix += 1;
                name = format!("{base}.{suffix}");
            }
        }
        self.taken.insert(name.clone());
        self.names.insert(value, name.clone());
        name
    }

    fn value_spec(&mut self, value: ValueId) -> ValueSpec {
        ValueSpec {
            name: self.name(value),
            ty: self.graph.value(value).ty().clone(),
        }
    }

    fn describe_block(&mut self, block: BlockId) -> BlockSpec {
        let graph = self.graph;
        let data = graph.block(block);
        let inputs = data.inputs().iter().map(|&v| self.value_spec(v)).collect();
        let nodes = graph.nodes(block).map(|n| self.describe_node(n)).collect();
        let outputs = data.outputs().iter().map(|&v| self.name(v)).collect();
        BlockSpec { inputs, nodes, outputs }
    }

    fn describe_node(&mut self, node: NodeId) -> NodeSpec {
        let graph = self.graph;
        let data = graph.node(node);
        let inputs = data.inputs().iter().map(|&v| self.name(v)).collect();
        let blocks = data.blocks().iter().map(|&b| self.describe_block(b)).collect();
        let outputs = data.outputs().iter().map(|&v| self.value_spec(v)).collect();
        NodeSpec {
            kind: data.kind().clone(),
            inputs,
            outputs,
            blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEG_GRAPH: &str = r#"{
        "inputs": [{ "name": "x", "type": "Dynamic" }, { "name": "dy", "type": "UndefinedTensor" }],
        "nodes": [
            {
                "kind": "prim::GradOf",
                "inputs": ["x", "dy"],
                "outputs": [{ "name": "g", "type": "Dynamic" }],
                "blocks": [{
                    "nodes": [{ "kind": "aten::neg", "inputs": ["x"], "outputs": [{ "name": "n", "type": "Dynamic" }] }],
                    "outputs": ["n"]
                }]
            }
        ],
        "outputs": ["g"]
    }"#;

    #[test]
    fn test_build_from_json() {
        let graph = GraphSpec::from_json(NEG_GRAPH).unwrap().build().unwrap();
        assert_eq!(graph.inputs().len(), 2);
        assert_eq!(graph.find_nodes(&NodeKind::GradOf).len(), 1);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.value_name(graph.outputs()[0]), "%g");
    }

    #[test]
    fn test_unknown_value_is_rejected() {
        let spec = GraphSpec {
            outputs: vec!["missing".to_string()],
            ..GraphSpec::default()
        };
        assert_eq!(spec.build().unwrap_err(), GraphError::UnknownValue("missing".to_string()));
    }

    #[test]
    fn test_duplicate_value_is_rejected() {
        let json = r#"{
            "inputs": [{ "name": "x", "type": "Dynamic" }],
            "nodes": [{ "kind": "aten::neg", "inputs": ["x"], "outputs": [{ "name": "x", "type": "Dynamic" }] }]
        }"#;
        let err = GraphSpec::from_json(json).unwrap().build().unwrap_err();
        assert_eq!(err, GraphError::DuplicateValue("x".to_string()));
    }

    #[test]
    fn test_block_local_name_escaping_scope_fails_lint() {
        let json = r#"{
            "nodes": [{
                "kind": "prim::Loop",
                "blocks": [{ "nodes": [{ "kind": "prim::Undefined", "outputs": [{ "name": "u", "type": "UndefinedTensor" }] }] }]
            }],
            "outputs": ["u"]
        }"#;
        let err = GraphSpec::from_json(json).unwrap().build().unwrap_err();
        assert!(matches!(err, GraphError::UseBeforeDef { .. }));
    }

    #[test]
    fn test_bad_kind_is_a_json_error() {
        let json = r#"{ "nodes": [{ "kind": "neg" }] }"#;
        assert!(matches!(GraphSpec::from_json(json), Err(GraphError::Json(_))));
    }

    #[test]
    fn test_from_graph_preserves_structure() {
        let spec = GraphSpec::from_json(NEG_GRAPH).unwrap();
        let graph = spec.build().unwrap();
        assert_eq!(GraphSpec::from_graph(&graph), spec);
    }

    #[test]
    fn test_from_graph_disambiguates_names() {
        let mut g = Graph::new();
        let a = g.add_input(Type::Dynamic);
        let b = g.add_input(Type::Dynamic);
        g.set_debug_name(a, "t");
        g.set_debug_name(b, "t");
        let spec = GraphSpec::from_graph(&g);
        let names: Vec<&str> = spec.inputs.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["t", "t.1"]);
        assert!(spec.build().is_ok());
    }

    #[test]
    fn test_fallback_names_never_collide() {
        let mut g = Graph::new();
        let a = g.add_input(Type::Dynamic);
        let b = g.add_input(Type::Dynamic);
        g.set_debug_name(a, "4.4");
        g.set_debug_name(b, "4");
        let mut last = a;
        for _ in 0..3 {
            let node = g.append(NodeKind::op("aten::neg"), &[last], vec![Type::Dynamic]);
            last = g.node(node).output();
        }
        assert_eq!(last.index(), 4);
        g.register_output(last);

        let spec = GraphSpec::from_graph(&g);
        assert_eq!(spec.nodes[2].outputs[0].name, "4.5");
        assert_eq!(spec.outputs, vec!["4.5"]);
        assert!(spec.build().is_ok());
    }

    #[test]
    fn test_malformed_accumulation_fails_to_build() {
        let json = r#"{
            "inputs": [{ "name": "x", "type": "Dynamic" }],
            "nodes": [{ "kind": "prim::AutogradAdd", "inputs": ["x"], "outputs": [{ "name": "a", "type": "Dynamic" }] }],
            "outputs": ["a"]
        }"#;
        let err = GraphSpec::from_json(json).unwrap().build().unwrap_err();
        assert!(matches!(err, GraphError::NodeArity { expected_inputs: 2, inputs: 1, .. }));
    }
}
