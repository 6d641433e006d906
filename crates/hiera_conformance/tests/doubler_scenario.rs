//! The adder/multiplier/doubler scenario, built through the public API.
//!
//! Registers the arithmetic leaves, builds `doubler` with the composite
//! builder, instantiates it in a top graph between stimulus and sink
//! buffers, and flattens.

use hiera_conformance::{arith_registry, instance_names, single_driver_holds, wire, wires};
use hiera_config::BoundaryConfig;
use hiera_elaborate::{build_composite, flatten_graph, CompositeBuild};
use hiera_ir::{
    port_map, InstanceRole, ModuleRegistry, NetlistError, NetlistGraph, PortDirection,
};
use indexmap::IndexMap;

fn build_doubler(reg: &mut ModuleRegistry) {
    let mut graph = NetlistGraph::new();
    graph.add_instance(reg, "adder_0", "adder").unwrap();
    graph.add_instance(reg, "multiplier_0", "multiplier").unwrap();
    graph
        .add_connection(reg, "adder_0", "multiplier_0", [("c", "a")])
        .unwrap();

    let mut input_connections = IndexMap::new();
    input_connections.insert("x".to_string(), vec![("adder_0".to_string(), "a".to_string())]);
    input_connections.insert(
        "y".to_string(),
        vec![
            ("adder_0".to_string(), "b".to_string()),
            ("multiplier_0".to_string(), "b".to_string()),
        ],
    );
    let mut output_connections = IndexMap::new();
    output_connections.insert(
        "out".to_string(),
        ("multiplier_0".to_string(), "product".to_string()),
    );

    build_composite(
        reg,
        &BoundaryConfig::default(),
        CompositeBuild {
            name: "doubler".into(),
            input_ports: port_map([("x", 8u32), ("y", 8u32)]),
            output_ports: port_map([("out", 8u32)]),
            graph,
            input_connections,
            output_connections,
            ..CompositeBuild::default()
        },
    )
    .unwrap();
}

fn top_graph(reg: &ModuleRegistry) -> NetlistGraph {
    let mut top = NetlistGraph::new();
    top.add_instance(reg, "src_x", "buffer").unwrap();
    top.add_instance(reg, "src_y", "buffer").unwrap();
    top.add_instance(reg, "dbl", "doubler").unwrap();
    top.add_instance(reg, "sink", "buffer").unwrap();
    top.add_connection(reg, "src_x", "dbl", [("o", "x")]).unwrap();
    top.add_connection(reg, "src_y", "dbl", [("o", "y")]).unwrap();
    top.add_connection(reg, "dbl", "sink", [("out", "i")]).unwrap();
    top
}

#[test]
fn doubler_registers_as_composite() {
    let mut reg = arith_registry();
    build_doubler(&mut reg);
    let doubler = reg.get("doubler").unwrap();
    assert!(!doubler.is_leaf());
    assert!(reg.port_exists("doubler", "y", PortDirection::Input));

    let inner = doubler.internal_graph().unwrap();
    assert_eq!(inner.instance_count(), 4);
    assert_eq!(
        inner.boundary(InstanceRole::InputBoundary).unwrap().name,
        "input_block"
    );
    assert_eq!(inner.driver_of("multiplier_0", "b"), Some(("input_block", "y")));
    // only the two leaves and the composite remain registered
    assert_eq!(reg.len(), 4);
}

#[test]
fn flattening_inlines_doubler() {
    let mut reg = arith_registry();
    build_doubler(&mut reg);
    let top = top_graph(&reg);
    let flat = flatten_graph(&reg, &BoundaryConfig::default(), &top).unwrap();

    let names = instance_names(&flat);
    assert_eq!(
        names.into_iter().collect::<Vec<_>>(),
        ["dbl.adder_0", "dbl.multiplier_0", "sink", "src_x", "src_y"]
    );
    assert!(flat.instances().all(|i| reg.get(&i.module).unwrap().is_leaf()));

    let expected = [
        wire("src_x", "o", "dbl.adder_0", "a"),
        wire("src_y", "o", "dbl.adder_0", "b"),
        wire("src_y", "o", "dbl.multiplier_0", "b"),
        wire("dbl.adder_0", "c", "dbl.multiplier_0", "a"),
        wire("dbl.multiplier_0", "product", "sink", "i"),
    ];
    assert_eq!(wires(&flat), expected.into_iter().collect());
    assert!(single_driver_holds(&flat));
    flat.validate(&reg).unwrap();
}

#[test]
fn flattening_leaves_input_untouched() {
    let mut reg = arith_registry();
    build_doubler(&mut reg);
    let top = top_graph(&reg);
    let before = top.clone();
    flatten_graph(&reg, &BoundaryConfig::default(), &top).unwrap();
    assert!(top.structurally_equal(&before));
}

#[test]
fn width_mismatch_is_rejected_without_change() {
    let reg = arith_registry();
    let mut g = NetlistGraph::new();
    g.add_instance(&reg, "add", "adder").unwrap();
    g.add_instance(&reg, "mul", "multiplier").unwrap();
    let before = g.clone();

    // 8-bit c into 10-bit ac
    let err = g
        .add_connection(&reg, "add", "mul", [("c", "ac")])
        .unwrap_err();
    assert!(matches!(err, NetlistError::PortTypeMismatch { .. }));
    assert!(g.structurally_equal(&before));

    // the 10-bit side output fits
    g.add_connection(&reg, "add", "mul", [("d", "ac")]).unwrap();
}

#[test]
fn second_driver_is_rejected() {
    let reg = arith_registry();
    let mut g = NetlistGraph::new();
    for (name, module) in [("a0", "adder"), ("a1", "adder"), ("mul", "multiplier")] {
        g.add_instance(&reg, name, module).unwrap();
    }
    g.add_connection(&reg, "a0", "mul", [("c", "a")]).unwrap();
    let before = g.clone();

    let err = g
        .add_connection(&reg, "a1", "mul", [("c", "b"), ("c", "a")])
        .unwrap_err();
    assert!(matches!(
        err,
        NetlistError::PortAlreadyDriven { ref port, .. } if port == "a"
    ));
    // the valid pair in the same call was not applied either
    assert!(g.structurally_equal(&before));
    assert!(single_driver_holds(&g));
}

#[test]
fn arbitrary_connection_sequences_keep_single_driver() {
    let reg = arith_registry();
    let mut g = NetlistGraph::new();
    let names = ["a0", "a1", "a2", "a3"];
    for name in names {
        g.add_instance(&reg, name, "adder").unwrap();
    }
    for src in names {
        for dst in names {
            for port in ["a", "b"] {
                let _ = g.add_connection(&reg, src, dst, [("c", port)]);
            }
        }
    }
    assert!(single_driver_holds(&g));
    // every input was driven exactly once
    assert_eq!(wires(&g).len(), names.len() * 2);
}
