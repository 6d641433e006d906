//! Registry and graph persistence in the node-link JSON format.

use hiera_conformance::{arith_registry, wire, wires, DOUBLER, QUAD};
use hiera_config::BoundaryConfig;
use hiera_descriptor::CompositeDescriptor;
use hiera_elaborate::{flatten_module, DescriptorLibrary};
use hiera_ir::{
    port_map, ModuleRegistry, NetlistError, NetlistGraph, PortMap, PortType, TypeRegistry,
};

fn full_registry() -> ModuleRegistry {
    let mut reg = arith_registry();
    let lib = DescriptorLibrary::from_descriptors(
        &BoundaryConfig::default(),
        [DOUBLER, QUAD]
            .into_iter()
            .map(|text| CompositeDescriptor::from_toml_str(text).unwrap()),
    )
    .unwrap();
    lib.load_all(&mut reg).unwrap();
    reg
}

#[test]
fn registry_round_trips_through_json() {
    let reg = full_registry();
    let json = reg.to_json().unwrap();
    let back = ModuleRegistry::from_json(&json).unwrap();
    assert!(back.structurally_equal(&reg));
    assert_eq!(back.names().collect::<Vec<_>>(), reg.names().collect::<Vec<_>>());
}

#[test]
fn registry_json_shape() {
    let reg = full_registry();
    let value: serde_json::Value = serde_json::from_str(&reg.to_json().unwrap()).unwrap();
    let doubler = &value["modules"]["doubler"];
    assert_eq!(doubler["is_leaf"], false);
    assert_eq!(doubler["input_ports"]["x"], 8);
    assert_eq!(doubler["internal_graph"]["directed"], true);
    assert!(value["modules"]["adder"]["internal_graph"].is_null());

    let links = doubler["internal_graph"]["links"].as_array().unwrap();
    let fanout = links
        .iter()
        .find(|l| l["source"] == "input_block" && l["target"] == "adder_0")
        .unwrap();
    assert_eq!(fanout["port_connections"][0][0], "x");
    assert_eq!(fanout["port_connections"][0][1], "a");
}

#[test]
fn registry_with_named_types_round_trips() {
    let mut types = TypeRegistry::new();
    types
        .register("nibbles", port_map([("lo", 4u32), ("hi", 4u32)]))
        .unwrap();
    let mut reg = ModuleRegistry::with_types(types);
    let mut out = PortMap::new();
    out.insert("n".into(), PortType::named("nibbles"));
    reg.add("split", port_map([("i", 8u32)]), out, None).unwrap();

    let back = ModuleRegistry::from_json(&reg.to_json().unwrap()).unwrap();
    assert!(back.structurally_equal(&reg));
    assert_eq!(back.types().bit_width(&PortType::named("nibbles")), Some(8));
}

#[test]
fn registry_saves_and_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("generated_files/hardware_library.json");
    let reg = full_registry();
    reg.save(&path).unwrap();
    assert!(path.is_file());
    let back = ModuleRegistry::load(&path).unwrap();
    assert!(back.structurally_equal(&reg));
    assert!(!back.get("quad").unwrap().is_leaf());
}

#[test]
fn graph_with_fanout_round_trips() {
    let reg = arith_registry();
    let mut g = NetlistGraph::new();
    g.add_instance(&reg, "src", "buffer").unwrap();
    g.add_instance(&reg, "add", "adder").unwrap();
    g.add_connection(&reg, "src", "add", [("o", "a"), ("o", "b")])
        .unwrap();

    let back = NetlistGraph::from_json(&g.to_json().unwrap()).unwrap();
    assert!(back.structurally_equal(&g));
    assert_eq!(
        wires(&back),
        [wire("src", "o", "add", "a"), wire("src", "o", "add", "b")]
            .into_iter()
            .collect()
    );
}

#[test]
fn flattened_graph_round_trips() {
    let reg = full_registry();
    let flat = flatten_module(&reg, &BoundaryConfig::default(), "quad").unwrap();
    let back = NetlistGraph::from_json(&flat.to_json().unwrap()).unwrap();
    assert!(back.structurally_equal(&flat));
    back.validate(&reg).unwrap();
}

#[test]
fn dangling_link_is_malformed() {
    let json = r#"{
        "directed": true,
        "nodes": [{"id": "a", "module_name": "adder"}],
        "links": [{"source": "a", "target": "ghost", "port_connections": [["c", "a"]]}]
    }"#;
    assert!(matches!(
        NetlistGraph::from_json(json),
        Err(NetlistError::MalformedDocument(_))
    ));
}

#[test]
fn registry_with_broken_graph_is_rejected() {
    let json = r#"{
        "modules": {
            "adder": {"input_ports": {"a": 8}, "output_ports": {"c": 8}, "is_leaf": true, "internal_graph": null},
            "wide": {"input_ports": {"w": 10}, "output_ports": {}, "is_leaf": true, "internal_graph": null},
            "top": {
                "input_ports": {},
                "output_ports": {},
                "is_leaf": false,
                "internal_graph": {
                    "directed": true,
                    "nodes": [
                        {"id": "a0", "module_name": "adder"},
                        {"id": "w0", "module_name": "wide"}
                    ],
                    "links": [{"source": "a0", "target": "w0", "port_connections": [["c", "w"]]}]
                }
            }
        }
    }"#;
    assert!(matches!(
        ModuleRegistry::from_json(json),
        Err(NetlistError::PortTypeMismatch { .. })
    ));
}

#[test]
fn not_json_is_a_json_error() {
    assert!(matches!(
        ModuleRegistry::from_json("{ not json"),
        Err(NetlistError::Json(_))
    ));
}
