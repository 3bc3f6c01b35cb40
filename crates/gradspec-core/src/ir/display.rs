//! Textual IR dump
//!
//! ```text
//! graph(%x : Dynamic,
//!       %1 : UndefinedTensor) {
//!   %2 : Dynamic = prim::GradOf(%x, %1)
//!     block0() {
//!       %3 : Dynamic = aten::neg(%x)
//!       -> (%3)
//!     }
//!   return (%2);
//! }
//! ```

use super::{BlockId, Graph, NodeId, ValueId};
use std::fmt::{self, Write};

impl Graph {
    /// `%name` if the value carries a debug name, `%index` otherwise
    pub fn value_name(&self, value: ValueId) -> String {
        match self.value(value).debug_name() {
            Some(name) => format!("%{name}"),
            None => value.to_string(),
        }
    }

    fn typed_list(&self, values: &[ValueId], sep: &str) -> String {
        values
            .iter()
            .map(|&v| format!("{} : {}", self.value_name(v), self.value(v).ty()))
            .collect::<Vec<_>>()
            .join(sep)
    }

    fn name_list(&self, values: &[ValueId]) -> String {
        values.iter().map(|&v| self.value_name(v)).collect::<Vec<_>>().join(", ")
    }

    fn write_node(&self, out: &mut String, node: NodeId, indent: usize) -> fmt::Result {
        let data = self.node(node);
        write!(out, "{:indent$}", "")?;
        if !data.outputs().is_empty() {
            write!(out, "{} = ", self.typed_list(data.outputs(), ", "))?;
        }
        writeln!(out, "{}({})", data.kind(), self.name_list(data.inputs()))?;
        for (i, &block) in data.blocks().iter().enumerate() {
            self.write_block(out, block, i, indent + 2)?;
        }
        Ok(())
    }

    fn write_block(&self, out: &mut String, block: BlockId, ordinal: usize, indent: usize) -> fmt::Result {
        let data = self.block(block);
        writeln!(out, "{:indent$}block{ordinal}({}) {{", "", self.typed_list(data.inputs(), ", "))?;
        for node in self.nodes(block) {
            self.write_node(out, node, indent + 2)?;
        }
        writeln!(out, "{:width$}-> ({})", "", self.name_list(data.outputs()), width = indent + 2)?;
        writeln!(out, "{:indent$}}}", "")
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        writeln!(out, "graph({}) {{", self.typed_list(self.inputs(), ",\n      "))?;
        for node in self.nodes(self.top_block()) {
            self.write_node(&mut out, node, 2)?;
        }
        writeln!(out, "  return ({});", self.name_list(self.outputs()))?;
        out.push('}');
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{Graph, NodeKind, Type};

    #[test]
    fn test_display_nested_block() {
        let mut g = Graph::new();
        let x = g.add_input(Type::Dynamic);
        g.set_debug_name(x, "x");
        let u = g.add_input(Type::UndefinedTensor);
        let grad_of = g.append(NodeKind::GradOf, &[x, u], vec![Type::Dynamic]);
        let body = g.add_block(grad_of);
        let neg = g.append_to(body, NodeKind::op("aten::neg"), &[x], vec![Type::Dynamic]);
        let neg_out = g.node(neg).output();
        g.register_block_output(body, neg_out);
        let out = g.node(grad_of).output();
        g.register_output(out);

        let expected = "\
graph(%x : Dynamic,
      %1 : UndefinedTensor) {
  %2 : Dynamic = prim::GradOf(%x, %1)
    block0() {
      %3 : Dynamic = aten::neg(%x)
      -> (%3)
    }
  return (%2);
}";
        assert_eq!(g.to_string(), expected);
    }

    #[test]
    fn test_display_node_without_outputs() {
        let mut g = Graph::new();
        let x = g.add_input(Type::Int);
        g.append(NodeKind::op("prim::Print"), &[x], vec![]);
        assert_eq!(g.to_string(), "graph(%0 : int) {\n  prim::Print(%0)\n  return ();\n}");
    }
}
