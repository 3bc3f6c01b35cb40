//! Integration tests for undefined-gradient specialization
//!
//! Test Strategy:
//! - Graphs shaped like the output of symbolic differentiation
//! - Each rewrite rule in isolation and in combination
//! - Structural postconditions: node order, use lists, graph outputs
//! - Idempotence and the contract panics

use gradspec_core::dataflow::StateMap;
use gradspec_core::ir::{BlockId, GraphSpec, Use, ValueDef};
use gradspec_core::prelude::*;

fn checked() -> UndefinedSpecializer {
    UndefinedSpecializer::new(SpecializeConfig::new().with_verify(true))
}

fn kinds(graph: &Graph, block: BlockId) -> Vec<String> {
    graph.nodes(block).map(|n| graph.node(n).kind().to_string()).collect()
}

/// v0 defined, v1 undefined; G = GradOf(v0, v1) { v2 = neg(v0) -> (v2) };
/// A = AutogradAdd(v1, v1); outputs (G, A)
#[test]
fn test_worked_example() {
    let mut g = Graph::new();
    let top = g.top_block();
    let v0 = g.add_input(Type::Dynamic);
    let v1 = g.add_input(Type::UndefinedTensor);
    let grad_of = g.append(NodeKind::GradOf, &[v0, v1], vec![Type::Dynamic]);
    let body = g.add_block(grad_of);
    let neg = g.append_to(body, NodeKind::op("aten::neg"), &[v0], vec![Type::Dynamic]);
    let v2 = g.node(neg).output();
    g.register_block_output(body, v2);
    let acc = g.append(NodeKind::AutogradAdd, &[v1, v1], vec![Type::Dynamic]);
    let g_out = g.node(grad_of).output();
    let a_out = g.node(acc).output();
    g.register_output(g_out);
    g.register_output(a_out);

    let stats = checked().run(&mut g);

    assert_eq!(kinds(&g, top), vec!["aten::neg"]);
    assert_eq!(g.nodes(top).next(), Some(neg));
    assert!(!g.is_live_node(grad_of));
    assert!(!g.is_live_node(acc));
    assert_eq!(g.outputs(), &[v2, v1]);
    assert!(g.find_nodes(&NodeKind::Undefined).is_empty());
    assert_eq!(stats.grad_of_hoisted, 1);
    assert_eq!(stats.adds_forwarded, 1);
    assert_eq!(g.inputs(), &[v0, v1]);
}

#[test]
fn test_all_undefined_guard_with_many_outputs() {
    let mut g = Graph::new();
    let inputs: Vec<ValueId> = (0..3).map(|_| g.add_input(Type::UndefinedTensor)).collect();
    let grad_of = g.append(NodeKind::GradOf, &inputs, vec![Type::Dynamic; 3]);
    let body = g.add_block(grad_of);
    for &input in &inputs {
        let neg = g.append_to(body, NodeKind::op("aten::neg"), &[input], vec![Type::Dynamic]);
        let out = g.node(neg).output();
        g.register_block_output(body, out);
    }
    let outs = g.node(grad_of).outputs().to_vec();
    let consumer = g.append(NodeKind::op("aten::cat"), &outs, vec![Type::Dynamic]);
    let cat_out = g.node(consumer).output();
    g.register_output(cat_out);

    checked().run(&mut g);

    let producers = g.find_nodes(&NodeKind::Undefined);
    assert_eq!(producers.len(), 1);
    let undef = g.node(producers[0]).output();
    assert_eq!(g.node(consumer).inputs(), &[undef, undef, undef]);
    assert_eq!(g.uses(undef).len(), 3);
    assert!(g.uses(undef).iter().all(|u| matches!(u, Use::Input { node, .. } if *node == consumer)));
}

#[test]
fn test_hoisted_body_keeps_relative_order_and_position() {
    let json = r#"{
        "inputs": [
            { "name": "x", "type": "Dynamic" },
            { "name": "dy", "type": "Dynamic" },
            { "name": "dz", "type": "UndefinedTensor" }
        ],
        "nodes": [
            { "kind": "aten::tanh", "inputs": ["x"], "outputs": [{ "name": "t", "type": "Dynamic" }] },
            {
                "kind": "prim::GradOf",
                "inputs": ["dy", "dz"],
                "outputs": [{ "name": "dx", "type": "Dynamic" }],
                "blocks": [{
                    "nodes": [
                        { "kind": "aten::mul", "inputs": ["t", "t"], "outputs": [{ "name": "t2", "type": "Dynamic" }] },
                        { "kind": "aten::rsub", "inputs": ["t2"], "outputs": [{ "name": "s", "type": "Dynamic" }] },
                        { "kind": "aten::mul", "inputs": ["dy", "s"], "outputs": [{ "name": "g", "type": "Dynamic" }] }
                    ],
                    "outputs": ["g"]
                }]
            },
            { "kind": "aten::sum", "inputs": ["dx"], "outputs": [{ "name": "r", "type": "Dynamic" }] }
        ],
        "outputs": ["r", "dx"]
    }"#;
    let mut g = GraphSpec::from_json(json).unwrap().build().unwrap();
    let top = g.top_block();

    checked().run(&mut g);

    assert_eq!(kinds(&g, top), vec!["aten::tanh", "aten::mul", "aten::rsub", "aten::mul", "aten::sum"]);
    let spec = GraphSpec::from_graph(&g);
    assert_eq!(spec.outputs, vec!["r", "g"]);
    assert_eq!(spec.nodes[4].inputs, vec!["g"]);
}

#[test]
fn test_autograd_add_chain() {
    // acc1 = AutogradAdd(undef, a)        -> a
    // acc2 = AutogradAdd(acc1, b)         -> aten::add(a, b)
    // acc3 = AutogradAdd(acc2, maybe)     -> kept, maybe is unknown
    let mut g = Graph::new();
    let a = g.add_input(Type::Dynamic);
    let b = g.add_input(Type::Dynamic);
    let maybe = g.add_input(Type::Optional(Box::new(Type::Dynamic)));
    let undef = g.append(NodeKind::Undefined, &[], vec![Type::UndefinedTensor]);
    let u = g.node(undef).output();
    let acc1 = g.append(NodeKind::AutogradAdd, &[u, a], vec![Type::Dynamic]);
    let acc1_out = g.node(acc1).output();
    let acc2 = g.append(NodeKind::AutogradAdd, &[acc1_out, b], vec![Type::Dynamic]);
    let acc2_out = g.node(acc2).output();
    let acc3 = g.append(NodeKind::AutogradAdd, &[acc2_out, maybe], vec![Type::Dynamic]);
    let acc3_out = g.node(acc3).output();
    g.register_output(acc3_out);

    let (stats, states) = checked().run_with_states(&mut g);

    let adds = g.find_nodes(&NodeKind::op(NodeKind::ADD));
    assert_eq!(adds.len(), 1);
    assert_eq!(g.node(adds[0]).inputs(), &[a, b]);
    let sum = g.node(adds[0]).output();
    assert_eq!(states.get(sum), Definedness::Defined);
    assert!(g.is_live_node(acc3));
    assert_eq!(g.node(acc3).inputs(), &[sum, maybe]);
    assert_eq!(states.get(acc3_out), Definedness::Unknown);
    assert_eq!(g.outputs(), &[acc3_out]);
    assert_eq!(
        stats,
        SpecializeStats {
            adds_forwarded: 1,
            adds_upgraded: 1,
            adds_kept: 1,
            ..SpecializeStats::default()
        }
    );
}

#[test]
fn test_new_add_is_inserted_at_the_accumulation_site() {
    let mut g = Graph::new();
    let top = g.top_block();
    let a = g.add_input(Type::Dynamic);
    let b = g.add_input(Type::Dynamic);
    let first = g.append(NodeKind::op("aten::relu"), &[a], vec![Type::Dynamic]);
    let acc = g.append(NodeKind::AutogradAdd, &[a, b], vec![Type::Dynamic]);
    let acc_out = g.node(acc).output();
    let last = g.append(NodeKind::op("aten::exp"), &[acc_out], vec![Type::Dynamic]);
    let last_out = g.node(last).output();
    g.register_output(last_out);

    checked().run(&mut g);

    let order: Vec<NodeId> = g.nodes(top).collect();
    assert_eq!(order.len(), 3);
    assert_eq!(order[0], first);
    assert_eq!(g.node(order[1]).kind(), &NodeKind::op("aten::add"));
    assert_eq!(order[2], last);
    assert_eq!(g.node(last).inputs(), &[g.node(order[1]).output()]);
}

#[test]
fn test_graph_interface_is_preserved() {
    let mut g = Graph::new();
    let x = g.add_input(Type::Dynamic);
    let u = g.add_input(Type::UndefinedTensor);
    let n = g.add_input(Type::Int);
    let grad_of = g.append(NodeKind::GradOf, &[u], vec![Type::Dynamic]);
    let body = g.add_block(grad_of);
    g.register_block_output(body, x);
    let out = g.node(grad_of).output();
    g.register_output(out);
    g.register_output(n);
    g.register_output(x);

    checked().run(&mut g);

    assert_eq!(g.inputs(), &[x, u, n]);
    assert_eq!(g.outputs().len(), 3);
    assert_eq!(&g.outputs()[1..], &[n, x]);
    match g.value(g.outputs()[0]).def() {
        ValueDef::Node { node, .. } => assert_eq!(g.node(node).kind(), &NodeKind::Undefined),
        other => panic!("expected a prim::Undefined output, got {other:?}"),
    }
}

#[test]
fn test_second_run_is_a_no_op() {
    let mut g = Graph::new();
    let x = g.add_input(Type::Dynamic);
    let dy = g.add_input(Type::Dynamic);
    let dz = g.add_input(Type::UndefinedTensor);
    let maybe = g.add_input(Type::Optional(Box::new(Type::Dynamic)));
    let grad_of = g.append(NodeKind::GradOf, &[dy, dz], vec![Type::Dynamic]);
    let body = g.add_block(grad_of);
    let mul = g.append_to(body, NodeKind::op("aten::mul"), &[dy, x], vec![Type::Dynamic]);
    let mul_out = g.node(mul).output();
    g.register_block_output(body, mul_out);
    let dead = g.append(NodeKind::GradOf, &[dz], vec![Type::Dynamic]);
    let dead_body = g.add_block(dead);
    g.register_block_output(dead_body, x);
    let grad = g.node(grad_of).output();
    let dead_out = g.node(dead).output();
    let acc = g.append(NodeKind::AutogradAdd, &[grad, dead_out], vec![Type::Dynamic]);
    let acc_out = g.node(acc).output();
    let kept = g.append(NodeKind::AutogradAdd, &[acc_out, maybe], vec![Type::Dynamic]);
    let kept_out = g.node(kept).output();
    g.register_output(kept_out);

    let first = checked().run(&mut g);
    let once = g.to_string();
    let second = checked().run(&mut g);

    assert!(first.rewrites() > 0);
    assert_eq!(second.rewrites(), 0);
    assert_eq!(second.adds_kept, 1);
    assert_eq!(g.to_string(), once);
}

#[test]
fn test_specialize_undefined_entry_point() {
    let mut g = Graph::new();
    let u = g.add_input(Type::UndefinedTensor);
    let grad_of = g.append(NodeKind::GradOf, &[u], vec![Type::Dynamic]);
    let body = g.add_block(grad_of);
    g.register_block_output(body, u);
    let out = g.node(grad_of).output();
    g.register_output(out);

    specialize_undefined(&mut g);

    assert!(g.find_nodes(&NodeKind::GradOf).is_empty());
    assert_eq!(g.lint(), Ok(()));
}

#[test]
#[should_panic(expected = "unknown definedness")]
fn test_unknown_grad_of_input_aborts() {
    let mut g = Graph::new();
    let x = g.add_input(Type::Dynamic);
    let neg = g.append(NodeKind::op("aten::neg"), &[x], vec![Type::Dynamic]);
    let unknown = g.node(neg).output();
    let grad_of = g.append(NodeKind::GradOf, &[unknown], vec![Type::Dynamic]);
    let body = g.add_block(grad_of);
    g.register_block_output(body, x);
    checked().run(&mut g);
}

#[test]
fn test_seeding_only_reads_input_types() {
    let mut g = Graph::new();
    let a = g.add_input(Type::Dynamic);
    let b = g.add_input(Type::UndefinedTensor);
    // An UndefinedTensor-typed node output is still only Unknown to the pass
    let cast = g.append(NodeKind::op("aten::detach"), &[a], vec![Type::UndefinedTensor]);
    let cast_out = g.node(cast).output();
    let acc = g.append(NodeKind::AutogradAdd, &[cast_out, b], vec![Type::Dynamic]);
    let acc_out = g.node(acc).output();
    g.register_output(acc_out);

    let seeded = StateMap::seed_from_inputs(&g);
    assert_eq!(seeded.len(), 2);

    checked().run(&mut g);
    assert_eq!(g.outputs(), &[cast_out]);
}
