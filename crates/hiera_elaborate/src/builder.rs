//! Composite module construction.
//!
//! Turns a populated internal graph plus a description of how the module's
//! own ports attach to it into a registered composite template. The module's
//! interface is represented inside the graph by two boundary instances named
//! after the configured block names.

use hiera_config::BoundaryConfig;
use hiera_ir::{
    is_identifier, InstanceRole, ModuleRegistry, NetlistError, NetlistGraph, NetlistResult,
    PortMap,
};
use indexmap::IndexMap;

/// Everything needed to build and register one composite module.
#[derive(Debug, Clone, Default)]
pub struct CompositeBuild {
    /// The composite module name.
    pub name: String,
    /// Declared input ports.
    pub input_ports: PortMap,
    /// Declared output ports.
    pub output_ports: PortMap,
    /// Internal graph, already populated with sub-instances and their wiring.
    pub graph: NetlistGraph,
    /// For each declared input, the internal `(instance, port)` pairs it drives.
    pub input_connections: IndexMap<String, Vec<(String, String)>>,
    /// For each declared output, the internal `(instance, port)` producing it.
    pub output_connections: IndexMap<String, (String, String)>,
    /// Declared inputs forwarded unchanged to a declared output, keyed by input.
    pub feed_through: IndexMap<String, String>,
}

/// Name of a temporary boundary template, scoped to the composite being built.
fn transient_name(composite: &str, block: &str) -> String {
    format!("{composite}::{block}")
}

/// Builds the composite described by `build` and registers it.
///
/// The boundary blocks are first bound to temporary templates so the
/// ordinary validated `add_connection` checks every boundary wire. Those
/// templates are removed again whether or not the build succeeds, and the
/// registry is unchanged on error.
pub fn build_composite(
    registry: &mut ModuleRegistry,
    boundary: &BoundaryConfig,
    build: CompositeBuild,
) -> NetlistResult<()> {
    let CompositeBuild {
        name,
        input_ports,
        output_ports,
        mut graph,
        input_connections,
        output_connections,
        feed_through,
    } = build;

    if registry.module_exists(&name) {
        return Err(NetlistError::DuplicateModule(name));
    }
    // flattened names join path segments with a non-identifier separator
    if let Some(bad) = graph.instances().find(|i| !is_identifier(&i.name)) {
        return Err(NetlistError::InvalidInstanceName(bad.name.clone()));
    }

    let input_template = transient_name(&name, &boundary.input_block_name);
    let output_template = transient_name(&name, &boundary.output_block_name);
    registry.add(&input_template, PortMap::new(), input_ports.clone(), None)?;
    if let Err(err) = registry.add(&output_template, output_ports.clone(), PortMap::new(), None) {
        registry.delete(&input_template)?;
        return Err(err);
    }

    let wired = wire_boundaries(
        registry,
        boundary,
        &mut graph,
        (&input_template, &input_connections),
        (&output_template, &output_connections),
        &feed_through,
    );
    registry.delete(&input_template)?;
    registry.delete(&output_template)?;
    wired?;

    for port in input_ports.keys() {
        let forwarded = feed_through.contains_key(port);
        if !forwarded && input_connections.get(port).map_or(true, Vec::is_empty) {
            tracing::warn!(module = %name, port = %port, "declared input drives nothing");
        }
    }
    for port in output_ports.keys() {
        let forwarded = feed_through.values().any(|o| o == port);
        if !forwarded && !output_connections.contains_key(port) {
            tracing::warn!(module = %name, port = %port, "declared output is undriven");
        }
    }

    graph.relabel(&boundary.input_block_name, &name, InstanceRole::InputBoundary)?;
    graph.relabel(&boundary.output_block_name, &name, InstanceRole::OutputBoundary)?;

    tracing::debug!(
        module = %name,
        instances = graph.instance_count(),
        connections = graph.connection_count(),
        "built composite"
    );
    registry.add(&name, input_ports, output_ports, Some(graph))
}

fn wire_boundaries(
    registry: &ModuleRegistry,
    boundary: &BoundaryConfig,
    graph: &mut NetlistGraph,
    (input_template, input_connections): (&str, &IndexMap<String, Vec<(String, String)>>),
    (output_template, output_connections): (&str, &IndexMap<String, (String, String)>),
    feed_through: &IndexMap<String, String>,
) -> NetlistResult<()> {
    let input_block = boundary.input_block_name.as_str();
    let output_block = boundary.output_block_name.as_str();
    graph.add_instance(registry, input_block, input_template)?;
    graph.add_instance(registry, output_block, output_template)?;

    for (port, sinks) in input_connections {
        for (instance, instance_port) in sinks {
            graph.add_connection(registry, input_block, instance, [(port, instance_port)])?;
        }
    }
    for (port, (instance, instance_port)) in output_connections {
        graph.add_connection(registry, instance, output_block, [(instance_port, port)])?;
    }
    for (input, output) in feed_through {
        graph.add_connection(registry, input_block, output_block, [(input, output)])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiera_ir::{port_map, PortDirection, PortType};

    fn leaves() -> ModuleRegistry {
        let mut reg = ModuleRegistry::new();
        reg.add(
            "adder",
            port_map([("a", 8u32), ("b", 8u32)]),
            port_map([("c", 8u32), ("d", 10u32)]),
            None,
        )
        .unwrap();
        reg.add(
            "multiplier",
            port_map([("a", 8u32), ("b", 8u32), ("ac", 10u32)]),
            port_map([("product", 8u32)]),
            None,
        )
        .unwrap();
        reg
    }

    fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(i, p)| (i.to_string(), p.to_string()))
            .collect()
    }

    fn doubler_build(reg: &ModuleRegistry) -> CompositeBuild {
        let mut graph = NetlistGraph::new();
        graph.add_instance(reg, "adder_0", "adder").unwrap();
        graph.add_instance(reg, "multiplier_0", "multiplier").unwrap();
        graph
            .add_connection(reg, "adder_0", "multiplier_0", [("c", "a")])
            .unwrap();
        let mut input_connections = IndexMap::new();
        input_connections.insert("x".to_string(), pairs(&[("adder_0", "a"), ("adder_0", "b")]));
        input_connections.insert("y".to_string(), pairs(&[("multiplier_0", "b")]));
        let mut output_connections = IndexMap::new();
        output_connections.insert(
            "out".to_string(),
            ("multiplier_0".to_string(), "product".to_string()),
        );
        CompositeBuild {
            name: "doubler".into(),
            input_ports: port_map([("x", 8u32), ("y", 8u32)]),
            output_ports: port_map([("out", 8u32)]),
            graph,
            input_connections,
            output_connections,
            ..CompositeBuild::default()
        }
    }

    #[test]
    fn builds_doubler() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        let build = doubler_build(&reg);
        build_composite(&mut reg, &boundary, build).unwrap();

        let doubler = reg.get("doubler").unwrap();
        assert!(!doubler.is_leaf());
        assert_eq!(
            doubler.port("out", PortDirection::Output),
            Some(&PortType::Width(8))
        );
        let g = doubler.internal_graph().unwrap();
        let input = g.instance("input_block").unwrap();
        assert_eq!(input.module, "doubler");
        assert_eq!(input.role, InstanceRole::InputBoundary);
        assert_eq!(
            g.instance("output_block").unwrap().role,
            InstanceRole::OutputBoundary
        );
        assert_eq!(g.driver_of("adder_0", "b"), Some(("input_block", "x")));
        assert_eq!(g.driver_of("output_block", "out"), Some(("multiplier_0", "product")));
        assert_eq!(
            g.connection("input_block", "adder_0").unwrap().pairs().len(),
            2
        );
        // transient templates are gone
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn custom_block_names() {
        let mut reg = leaves();
        let boundary = BoundaryConfig {
            input_block_name: "in".into(),
            output_block_name: "out".into(),
            separator: "/".into(),
        };
        let build = doubler_build(&reg);
        build_composite(&mut reg, &boundary, build).unwrap();
        let g = reg.get("doubler").unwrap().internal_graph().unwrap();
        assert!(g.contains("in"));
        assert!(g.contains("out"));
    }

    #[test]
    fn wiring_error_rolls_back() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        let mut build = doubler_build(&reg);
        // multiplier_0.a is already driven by adder_0.c
        build
            .input_connections
            .insert("y".into(), pairs(&[("multiplier_0", "a")]));
        let err = build_composite(&mut reg, &boundary, build).unwrap_err();
        assert!(matches!(err, NetlistError::PortAlreadyDriven { .. }));
        assert!(!reg.module_exists("doubler"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn width_mismatch_on_boundary() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        let mut build = doubler_build(&reg);
        build
            .output_connections
            .insert("out".into(), ("adder_0".into(), "d".into()));
        let err = build_composite(&mut reg, &boundary, build).unwrap_err();
        assert!(matches!(err, NetlistError::PortTypeMismatch { .. }));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn invalid_ports_roll_back() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        let mut build = doubler_build(&reg);
        build.output_ports = port_map([("out", 8u32), ("x", 8u32)]);
        let err = build_composite(&mut reg, &boundary, build).unwrap_err();
        assert!(matches!(err, NetlistError::InvalidPorts { .. }));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn block_name_collision() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        let mut build = doubler_build(&reg);
        build.graph.add_instance(&reg, "input_block", "adder").unwrap();
        let err = build_composite(&mut reg, &boundary, build).unwrap_err();
        assert!(matches!(err, NetlistError::InstanceExists(ref n) if n == "input_block"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn duplicate_composite_rejected() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        let first = doubler_build(&reg);
        build_composite(&mut reg, &boundary, first).unwrap();
        let again = doubler_build(&reg);
        assert!(matches!(
            build_composite(&mut reg, &boundary, again),
            Err(NetlistError::DuplicateModule(_))
        ));
    }

    #[test]
    fn unwired_ports_are_allowed() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        let mut build = doubler_build(&reg);
        build.input_ports.insert("spare".into(), PortType::Width(3));
        build.output_ports.insert("unused".into(), PortType::Width(1));
        build_composite(&mut reg, &boundary, build).unwrap();
        assert!(reg.port_exists("doubler", "spare", PortDirection::Input));
    }

    #[test]
    fn feed_through_wires_boundary_to_boundary() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        let mut build = doubler_build(&reg);
        build.input_ports.insert("bypass".into(), PortType::Width(10));
        build.output_ports.insert("echo".into(), PortType::Width(10));
        build.feed_through.insert("bypass".into(), "echo".into());
        build_composite(&mut reg, &boundary, build).unwrap();

        let g = reg.get("doubler").unwrap().internal_graph().unwrap();
        assert_eq!(g.driver_of("output_block", "echo"), Some(("input_block", "bypass")));
        assert_eq!(g.driver_of("output_block", "out"), Some(("multiplier_0", "product")));
    }

    #[test]
    fn feed_through_checks_widths_and_drivers() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();

        let mut narrow = doubler_build(&reg);
        narrow.output_ports.insert("echo".into(), PortType::Width(4));
        narrow.feed_through.insert("x".into(), "echo".into());
        assert!(matches!(
            build_composite(&mut reg, &boundary, narrow),
            Err(NetlistError::PortTypeMismatch { .. })
        ));

        // `out` is already produced by multiplier_0
        let mut doubled = doubler_build(&reg);
        doubled.feed_through.insert("x".into(), "out".into());
        assert!(matches!(
            build_composite(&mut reg, &boundary, doubled),
            Err(NetlistError::PortAlreadyDriven { ref port, .. }) if port == "out"
        ));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn instance_names_must_be_identifiers() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        let mut build = doubler_build(&reg);
        build.graph.add_instance(&reg, "adder_0.c", "adder").unwrap();
        let err = build_composite(&mut reg, &boundary, build).unwrap_err();
        assert!(matches!(err, NetlistError::InvalidInstanceName(ref n) if n == "adder_0.c"));
        assert_eq!(reg.len(), 2);
    }
}
