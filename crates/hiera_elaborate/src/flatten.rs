//! Hierarchy flattening.
//!
//! Inlines composite instances recursively until only leaf instances remain.
//! Each inlined node is renamed `parent + separator + node`, and every wire
//! that crossed the composite's boundary is replaced by a direct wire
//! between the real driver and the real consumers, keeping the leaf port
//! names on both ends. All rewired connections go through the validating
//! `add_connection`, so the result satisfies the same invariants as any
//! hand-built graph.

use std::collections::HashSet;

use hiera_config::BoundaryConfig;
use hiera_ir::{
    InstanceRole, ModuleRegistry, NetlistError, NetlistGraph, NetlistResult, PortPair,
};
use indexmap::IndexMap;

use crate::context::FlattenContext;

/// Flattens the internal graph of a registered composite module.
///
/// The result keeps the module's own boundary instances.
pub fn flatten_module(
    registry: &ModuleRegistry,
    boundary: &BoundaryConfig,
    module: &str,
) -> NetlistResult<NetlistGraph> {
    let mut ctx = FlattenContext::new(registry, boundary);
    flatten_composite(&mut ctx, module)
}

/// Flattens an arbitrary graph whose instances are bound to `registry`.
///
/// A graph that contains only leaf instances comes back unchanged.
pub fn flatten_graph(
    registry: &ModuleRegistry,
    boundary: &BoundaryConfig,
    graph: &NetlistGraph,
) -> NetlistResult<NetlistGraph> {
    let mut ctx = FlattenContext::new(registry, boundary);
    flatten_in(&mut ctx, graph)
}

fn flatten_composite(ctx: &mut FlattenContext<'_>, module: &str) -> NetlistResult<NetlistGraph> {
    if let Some(done) = ctx.check_cache(module) {
        return Ok(done.clone());
    }
    let registry = ctx.registry;
    let template = registry
        .get(module)
        .ok_or_else(|| NetlistError::ModuleNotFound(module.to_string()))?;
    let internal = template
        .internal_graph()
        .ok_or_else(|| NetlistError::NotComposite(module.to_string()))?;

    ctx.push_stack(module)?;
    let flat = flatten_in(ctx, internal);
    ctx.pop_stack();
    let flat = flat?;

    ctx.insert_cache(module, flat.clone());
    Ok(flat)
}

fn flatten_in(ctx: &mut FlattenContext<'_>, graph: &NetlistGraph) -> NetlistResult<NetlistGraph> {
    let registry = ctx.registry;
    let mut composites = Vec::new();
    for inst in graph.instances().filter(|i| i.role == InstanceRole::Cell) {
        let template = registry
            .get(&inst.module)
            .ok_or_else(|| NetlistError::ModuleNotFound(inst.module.clone()))?;
        if !template.is_leaf() {
            composites.push((inst.name.clone(), inst.module.clone()));
        }
    }
    if composites.is_empty() {
        return Ok(graph.clone());
    }

    let mut work = graph.clone();
    for (name, module) in &composites {
        let sub = flatten_composite(ctx, module)?;
        inline(ctx, &mut work, name, &sub)?;
    }

    let original: HashSet<&str> = graph.instances().map(|i| i.name.as_str()).collect();
    let dropped = work.remove_orphans_where(|inst| {
        inst.role == InstanceRole::Cell && !original.contains(inst.name.as_str())
    });
    if !dropped.is_empty() {
        tracing::debug!(count = dropped.len(), "removed unconnected inlined instances");
    }
    Ok(work)
}

/// The view of a flattened composite from its boundary.
struct Ports<'s> {
    /// Producer of each output: an internal endpoint, or the input it
    /// passes straight through.
    drivers: IndexMap<&'s str, Driver<'s>>,
    /// Internal consumers of each input.
    sinks: IndexMap<&'s str, Vec<(&'s str, &'s str)>>,
}

#[derive(Clone, Copy)]
enum Driver<'s> {
    Internal(&'s str, &'s str),
    FeedThrough(&'s str),
}

impl<'s> Ports<'s> {
    fn of(sub: &'s NetlistGraph) -> Self {
        let input = sub.boundary(InstanceRole::InputBoundary).map(|i| i.name.as_str());
        let output = sub.boundary(InstanceRole::OutputBoundary).map(|i| i.name.as_str());
        let mut drivers: IndexMap<&str, Driver<'_>> = IndexMap::new();
        let mut sinks: IndexMap<&str, Vec<(&str, &str)>> = IndexMap::new();
        for conn in sub.connections() {
            let from_input = Some(conn.source) == input;
            let to_output = Some(conn.dest) == output;
            for pair in conn.connection.pairs() {
                let (src_port, dst_port) = (pair.source_port.as_str(), pair.dest_port.as_str());
                match (from_input, to_output) {
                    (true, true) => {
                        drivers.insert(dst_port, Driver::FeedThrough(src_port));
                    }
                    (false, true) => {
                        drivers.insert(dst_port, Driver::Internal(conn.source, src_port));
                    }
                    (true, false) => sinks.entry(src_port).or_default().push((conn.dest, dst_port)),
                    (false, false) => {}
                }
            }
        }
        Self { drivers, sinks }
    }
}

/// Replaces composite instance `name` in `work` by the contents of `sub`.
fn inline(
    ctx: &FlattenContext<'_>,
    work: &mut NetlistGraph,
    name: &str,
    sub: &NetlistGraph,
) -> NetlistResult<()> {
    let registry = ctx.registry;
    let prefixed = |node: &str| ctx.boundary.join(name, node);
    for inst in sub.instances().filter(|i| i.role == InstanceRole::Cell) {
        let inlined = prefixed(inst.name.as_str());
        if work.contains(&inlined) {
            return Err(NetlistError::NameCollision {
                instance: inlined,
                composite: name.to_string(),
            });
        }
    }
    let ports = Ports::of(sub);

    // Resolves the real source of `name.port`, following feed-throughs back
    // to whatever drives the matching input from outside.
    let resolve_source = |port: &str| -> Option<(String, String)> {
        let mut seen = HashSet::new();
        let mut port = port;
        loop {
            match ports.drivers.get(port).copied()? {
                Driver::Internal(node, node_port) => {
                    return Some((prefixed(node), node_port.to_string()))
                }
                Driver::FeedThrough(input) => {
                    let (producer, producer_port) = work.driver_of(name, input)?;
                    if producer != name {
                        return Some((producer.to_string(), producer_port.to_string()));
                    }
                    if !seen.insert(producer_port) {
                        tracing::warn!(
                            instance = name,
                            port = input,
                            "feed-through loop has no driver"
                        );
                        return None;
                    }
                    port = producer_port;
                }
            }
        }
    };

    let mut rewired: IndexMap<(String, String), Vec<PortPair>> = IndexMap::new();
    let incident = work
        .incoming(name)
        .into_iter()
        .chain(work.outgoing(name).into_iter().filter(|c| c.dest != name));
    for conn in incident {
        for pair in conn.connection.pairs() {
            let source = if conn.source == name {
                resolve_source(pair.source_port.as_str())
            } else {
                Some((conn.source.to_string(), pair.source_port.clone()))
            };
            let Some((src, src_port)) = source else {
                tracing::debug!(
                    instance = name,
                    port = %pair.source_port,
                    "composite output has no driver; consumers left undriven"
                );
                continue;
            };
            let dests: Vec<(String, String)> = if conn.dest == name {
                ports
                    .sinks
                    .get(pair.dest_port.as_str())
                    .into_iter()
                    .flatten()
                    .map(|&(node, node_port)| (prefixed(node), node_port.to_string()))
                    .collect()
            } else {
                vec![(conn.dest.to_string(), pair.dest_port.clone())]
            };
            for (dst, dst_port) in dests {
                rewired
                    .entry((src.clone(), dst))
                    .or_default()
                    .push(PortPair::new(src_port.clone(), dst_port));
            }
        }
    }

    let removed = work.remove_instance(name)?;
    tracing::debug!(instance = name, module = %removed.module, "inlining composite instance");

    for inst in sub.instances().filter(|i| i.role == InstanceRole::Cell) {
        work.add_instance(registry, &prefixed(inst.name.as_str()), &inst.module)?;
    }
    for conn in sub.connections() {
        let internal = |n: &str| sub.instance(n).is_some_and(|i| i.role == InstanceRole::Cell);
        if !(internal(conn.source) && internal(conn.dest)) {
            continue;
        }
        let pairs = conn
            .connection
            .pairs()
            .iter()
            .map(|p| (p.source_port.clone(), p.dest_port.clone()));
        work.add_connection(registry, &prefixed(conn.source), &prefixed(conn.dest), pairs)?;
    }
    for ((src, dst), pairs) in rewired {
        tracing::trace!(source = %src, dest = %dst, pairs = pairs.len(), "rewired boundary connection");
        let pairs = pairs.into_iter().map(|p| (p.source_port, p.dest_port));
        work.add_connection(registry, &src, &dst, pairs)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_composite, CompositeBuild};
    use hiera_ir::port_map;

    fn leaves() -> ModuleRegistry {
        let mut reg = ModuleRegistry::new();
        reg.add(
            "adder",
            port_map([("a", 8u32), ("b", 8u32)]),
            port_map([("c", 8u32)]),
            None,
        )
        .unwrap();
        reg.add(
            "buffer",
            port_map([("i", 8u32)]),
            port_map([("o", 8u32)]),
            None,
        )
        .unwrap();
        reg
    }

    fn conns(entries: &[(&str, &[(&str, &str)])]) -> IndexMap<String, Vec<(String, String)>> {
        entries
            .iter()
            .map(|(port, sinks)| {
                let sinks = sinks
                    .iter()
                    .map(|(i, p)| (i.to_string(), p.to_string()))
                    .collect();
                (port.to_string(), sinks)
            })
            .collect()
    }

    fn outs(entries: &[(&str, (&str, &str))]) -> IndexMap<String, (String, String)> {
        entries
            .iter()
            .map(|(port, (i, p))| (port.to_string(), (i.to_string(), p.to_string())))
            .collect()
    }

    /// `sum(x, y) = adder(x, y)` wrapped in a composite, with a spare leaf.
    fn add_sum(reg: &mut ModuleRegistry, boundary: &BoundaryConfig) {
        let mut graph = NetlistGraph::new();
        graph.add_instance(reg, "core", "adder").unwrap();
        graph.add_instance(reg, "spare", "buffer").unwrap();
        let build = CompositeBuild {
            name: "sum".into(),
            input_ports: port_map([("x", 8u32), ("y", 8u32)]),
            output_ports: port_map([("s", 8u32)]),
            graph,
            input_connections: conns(&[("x", &[("core", "a")]), ("y", &[("core", "b")])]),
            output_connections: outs(&[("s", ("core", "c"))]),
            ..CompositeBuild::default()
        };
        build_composite(reg, boundary, build).unwrap();
    }

    /// A composite whose input is wired straight to its output.
    fn add_wire(reg: &mut ModuleRegistry, boundary: &BoundaryConfig) {
        let build = CompositeBuild {
            name: "wire".into(),
            input_ports: port_map([("i", 8u32)]),
            output_ports: port_map([("o", 8u32)]),
            feed_through: [("i".to_string(), "o".to_string())].into_iter().collect(),
            ..CompositeBuild::default()
        };
        build_composite(reg, boundary, build).unwrap();
    }

    #[test]
    fn leaf_only_graph_is_unchanged() {
        let reg = leaves();
        let boundary = BoundaryConfig::default();
        let mut g = NetlistGraph::new();
        g.add_instance(&reg, "a0", "adder").unwrap();
        g.add_instance(&reg, "b0", "buffer").unwrap();
        g.add_instance(&reg, "lonely", "buffer").unwrap();
        g.add_connection(&reg, "a0", "b0", [("c", "i")]).unwrap();
        let flat = flatten_graph(&reg, &boundary, &g).unwrap();
        assert!(flat.structurally_equal(&g));
    }

    #[test]
    fn composite_is_inlined_with_prefixed_names() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        add_sum(&mut reg, &boundary);

        let mut g = NetlistGraph::new();
        g.add_instance(&reg, "src", "buffer").unwrap();
        g.add_instance(&reg, "s0", "sum").unwrap();
        g.add_instance(&reg, "dst", "buffer").unwrap();
        g.add_connection(&reg, "src", "s0", [("o", "x"), ("o", "y")]).unwrap();
        g.add_connection(&reg, "s0", "dst", [("s", "i")]).unwrap();

        let flat = flatten_graph(&reg, &boundary, &g).unwrap();
        assert!(!flat.contains("s0"));
        assert!(flat.contains("s0.core"));
        // the unconnected spare leaf of the composite is dropped
        assert!(!flat.contains("s0.spare"));
        assert_eq!(flat.driver_of("s0.core", "a"), Some(("src", "o")));
        assert_eq!(flat.driver_of("s0.core", "b"), Some(("src", "o")));
        assert_eq!(flat.driver_of("dst", "i"), Some(("s0.core", "c")));
        assert!(flat
            .instances()
            .all(|i| reg.get(&i.module).unwrap().is_leaf()));
        flat.validate(&reg).unwrap();
    }

    #[test]
    fn flatten_module_keeps_own_boundary() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        add_sum(&mut reg, &boundary);

        let mut inner = NetlistGraph::new();
        inner.add_instance(&reg, "left", "sum").unwrap();
        inner.add_instance(&reg, "right", "sum").unwrap();
        inner
            .add_connection(&reg, "left", "right", [("s", "x")])
            .unwrap();
        let build = CompositeBuild {
            name: "chain".into(),
            input_ports: port_map([("p", 8u32), ("q", 8u32), ("r", 8u32)]),
            output_ports: port_map([("z", 8u32)]),
            graph: inner,
            input_connections: conns(&[
                ("p", &[("left", "x")]),
                ("q", &[("left", "y")]),
                ("r", &[("right", "y")]),
            ]),
            output_connections: outs(&[("z", ("right", "s"))]),
            ..CompositeBuild::default()
        };
        build_composite(&mut reg, &boundary, build).unwrap();

        let flat = flatten_module(&reg, &boundary, "chain").unwrap();
        let names: HashSet<&str> = flat.instances().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            HashSet::from(["input_block", "output_block", "left.core", "right.core"])
        );
        assert_eq!(flat.driver_of("left.core", "a"), Some(("input_block", "p")));
        assert_eq!(flat.driver_of("right.core", "a"), Some(("left.core", "c")));
        assert_eq!(flat.driver_of("right.core", "b"), Some(("input_block", "r")));
        assert_eq!(flat.driver_of("output_block", "z"), Some(("right.core", "c")));
        flat.validate(&reg).unwrap();
    }

    #[test]
    fn feed_through_is_forwarded() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        add_wire(&mut reg, &boundary);

        let mut g = NetlistGraph::new();
        g.add_instance(&reg, "src", "buffer").unwrap();
        g.add_instance(&reg, "w", "wire").unwrap();
        g.add_instance(&reg, "d0", "buffer").unwrap();
        g.add_instance(&reg, "d1", "buffer").unwrap();
        g.add_connection(&reg, "src", "w", [("o", "i")]).unwrap();
        g.add_connection(&reg, "w", "d0", [("o", "i")]).unwrap();
        g.add_connection(&reg, "w", "d1", [("o", "i")]).unwrap();

        let flat = flatten_graph(&reg, &boundary, &g).unwrap();
        assert!(!flat.contains("w"));
        assert_eq!(flat.driver_of("d0", "i"), Some(("src", "o")));
        assert_eq!(flat.driver_of("d1", "i"), Some(("src", "o")));
        assert_eq!(flat.instance_count(), 3);
    }

    #[test]
    fn feed_through_loop_is_left_undriven() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        add_wire(&mut reg, &boundary);

        let mut g = NetlistGraph::new();
        g.add_instance(&reg, "w", "wire").unwrap();
        g.add_instance(&reg, "d0", "buffer").unwrap();
        g.add_connection(&reg, "w", "w", [("o", "i")]).unwrap();
        g.add_connection(&reg, "w", "d0", [("o", "i")]).unwrap();

        let flat = flatten_graph(&reg, &boundary, &g).unwrap();
        assert_eq!(flat.driver_of("d0", "i"), None);
        assert!(flat.contains("d0"));
    }

    #[test]
    fn inlined_name_collision_is_reported() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        add_sum(&mut reg, &boundary);

        // a hand-built graph may already hold a dotted name
        let mut g = NetlistGraph::new();
        g.add_instance(&reg, "s0.core", "adder").unwrap();
        g.add_instance(&reg, "s0", "sum").unwrap();
        g.add_connection(&reg, "s0", "s0.core", [("s", "a")]).unwrap();
        let before = g.clone();

        match flatten_graph(&reg, &boundary, &g) {
            Err(NetlistError::NameCollision { instance, composite }) => {
                assert_eq!(instance, "s0.core");
                assert_eq!(composite, "s0");
            }
            other => panic!("expected name collision, got {other:?}"),
        }
        assert!(g.structurally_equal(&before));
    }

    #[test]
    fn same_composite_twice() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        add_sum(&mut reg, &boundary);

        let mut g = NetlistGraph::new();
        g.add_instance(&reg, "src", "buffer").unwrap();
        g.add_instance(&reg, "s0", "sum").unwrap();
        g.add_instance(&reg, "s1", "sum").unwrap();
        g.add_connection(&reg, "src", "s0", [("o", "x"), ("o", "y")]).unwrap();
        g.add_connection(&reg, "s0", "s1", [("s", "x"), ("s", "y")]).unwrap();

        let flat = flatten_graph(&reg, &boundary, &g).unwrap();
        assert!(flat.contains("s0.core"));
        assert!(flat.contains("s1.core"));
        assert_eq!(flat.driver_of("s1.core", "a"), Some(("s0.core", "c")));
        assert_eq!(
            flat.connection("s0.core", "s1.core").unwrap().pairs().len(),
            2
        );
    }

    #[test]
    fn flattening_is_idempotent() {
        let mut reg = leaves();
        let boundary = BoundaryConfig::default();
        add_sum(&mut reg, &boundary);
        let mut g = NetlistGraph::new();
        g.add_instance(&reg, "s0", "sum").unwrap();
        g.add_instance(&reg, "dst", "buffer").unwrap();
        g.add_connection(&reg, "s0", "dst", [("s", "i")]).unwrap();
        let once = flatten_graph(&reg, &boundary, &g).unwrap();
        let twice = flatten_graph(&reg, &boundary, &once).unwrap();
        assert!(once.structurally_equal(&twice));
    }

    #[test]
    fn errors() {
        let reg = leaves();
        let boundary = BoundaryConfig::default();
        assert!(matches!(
            flatten_module(&reg, &boundary, "nope"),
            Err(NetlistError::ModuleNotFound(_))
        ));
        assert!(matches!(
            flatten_module(&reg, &boundary, "adder"),
            Err(NetlistError::NotComposite(_))
        ));
    }

    #[test]
    fn dangling_module_reference() {
        let mut reg = leaves();
        let mut g = NetlistGraph::new();
        g.add_instance(&reg, "gone", "buffer").unwrap();
        reg.delete("buffer").unwrap();
        let boundary = BoundaryConfig::default();
        assert!(matches!(
            flatten_graph(&reg, &boundary, &g),
            Err(NetlistError::ModuleNotFound(ref m)) if m == "buffer"
        ));
    }
}
