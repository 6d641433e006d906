//! Views of a netlist graph for code emission and visualization.
//!
//! [`instance_records`] lists, for every cell instance, what each of its
//! ports is wired to. This is what an HDL writer needs to print one module
//! instantiation per cell. [`graph_view`] resolves every port to a printable
//! type label for drawing the graph.

use hiera_ir::{
    Instance, InstanceRole, ModuleRegistry, NetlistError, NetlistGraph, NetlistResult,
    PortDirection, PortType,
};
use serde::Serialize;

/// What a cell port is wired to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PortBinding {
    /// A port of another instance.
    Instance {
        /// The peer instance.
        instance: String,
        /// The peer port.
        port: String,
    },
    /// A port of the enclosing module, reached through a boundary instance.
    ModulePort {
        /// The module port.
        port: String,
    },
}

/// One cell instance and its port bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceRecord {
    /// Module the instance is bound to.
    pub module_name: String,
    /// The instance name.
    pub instance_name: String,
    /// `(port, binding)` entries in connection order. A fanned-out output
    /// appears once per sink.
    pub bindings: Vec<(String, PortBinding)>,
}

fn binding(peer: &Instance, port: &str) -> PortBinding {
    if peer.role.is_boundary() {
        PortBinding::ModulePort {
            port: port.to_string(),
        }
    } else {
        PortBinding::Instance {
            instance: peer.name.clone(),
            port: port.to_string(),
        }
    }
}

/// Lists every non-boundary instance with the peers of its wired ports.
pub fn instance_records(graph: &NetlistGraph) -> Vec<InstanceRecord> {
    let connections: Vec<_> = graph.connections().collect();
    let mut records = Vec::new();
    for inst in graph.instances().filter(|i| !i.role.is_boundary()) {
        let mut bindings = Vec::new();
        for conn in &connections {
            if conn.dest == inst.name {
                if let Some(peer) = graph.instance(conn.source) {
                    for pair in conn.connection.pairs() {
                        bindings.push((pair.dest_port.clone(), binding(peer, &pair.source_port)));
                    }
                }
            }
            if conn.source == inst.name {
                if let Some(peer) = graph.instance(conn.dest) {
                    for pair in conn.connection.pairs() {
                        bindings.push((pair.source_port.clone(), binding(peer, &pair.dest_port)));
                    }
                }
            }
        }
        records.push(InstanceRecord {
            module_name: inst.module.clone(),
            instance_name: inst.name.clone(),
            bindings,
        });
    }
    records
}

/// A port as drawn on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualPort {
    /// Port name.
    pub name: String,
    /// Direction as seen from inside the graph.
    pub direction: PortDirection,
    /// `[h:0]` for plain widths, the type name otherwise.
    pub type_label: String,
}

/// A node of the drawn graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualNode {
    /// Instance name.
    pub instance: String,
    /// Module name.
    pub module: String,
    /// What the instance represents.
    pub role: InstanceRole,
    /// Every port of the instance, inputs first.
    pub ports: Vec<VisualPort>,
}

/// One wired port pair on a drawn edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualWire {
    /// Driving port.
    pub source_port: String,
    /// Driven port.
    pub dest_port: String,
    /// Type label of the driving port.
    pub type_label: String,
}

/// An edge of the drawn graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualEdge {
    /// Driving instance.
    pub source: String,
    /// Driven instance.
    pub dest: String,
    /// The wired port pairs.
    pub wires: Vec<VisualWire>,
}

/// A graph with every port type resolved to a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphView {
    /// One node per instance, in insertion order.
    pub nodes: Vec<VisualNode>,
    /// One edge per connection.
    pub edges: Vec<VisualEdge>,
}

impl GraphView {
    /// Serializes the view as pretty JSON.
    pub fn to_json(&self) -> NetlistResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Type of `port` on `inst` when it is used in direction `used_as` inside the graph.
fn port_type<'r>(
    registry: &'r ModuleRegistry,
    inst: &Instance,
    port: &str,
    used_as: PortDirection,
) -> NetlistResult<&'r PortType> {
    let template = registry
        .get(&inst.module)
        .ok_or_else(|| NetlistError::ModuleNotFound(inst.module.clone()))?;
    inst.role
        .declared_direction(used_as)
        .and_then(|declared| template.port(port, declared))
        .ok_or_else(|| NetlistError::PortNotFound {
            instance: inst.name.clone(),
            module: inst.module.clone(),
            port: port.to_string(),
            direction: used_as,
        })
}

/// Resolves the graph into labelled nodes and edges.
///
/// Fails if an instance references a module or port missing from `registry`.
pub fn graph_view(graph: &NetlistGraph, registry: &ModuleRegistry) -> NetlistResult<GraphView> {
    let mut nodes = Vec::with_capacity(graph.instance_count());
    for inst in graph.instances() {
        let template = registry
            .get(&inst.module)
            .ok_or_else(|| NetlistError::ModuleNotFound(inst.module.clone()))?;
        let mut ports = Vec::new();
        for used_as in [PortDirection::Input, PortDirection::Output] {
            let Some(declared) = inst.role.declared_direction(used_as) else {
                continue;
            };
            ports.extend(template.ports(declared).iter().map(|(name, ty)| VisualPort {
                name: name.clone(),
                direction: used_as,
                type_label: ty.to_string(),
            }));
        }
        nodes.push(VisualNode {
            instance: inst.name.clone(),
            module: inst.module.clone(),
            role: inst.role,
            ports,
        });
    }

    let mut edges = Vec::with_capacity(graph.connection_count());
    for conn in graph.connections() {
        let source = graph
            .instance(conn.source)
            .ok_or_else(|| NetlistError::InstanceNotFound(conn.source.to_string()))?;
        let mut wires = Vec::new();
        for pair in conn.connection.pairs() {
            let ty = port_type(registry, source, &pair.source_port, PortDirection::Output)?;
            wires.push(VisualWire {
                source_port: pair.source_port.clone(),
                dest_port: pair.dest_port.clone(),
                type_label: ty.to_string(),
            });
        }
        edges.push(VisualEdge {
            source: conn.source.to_string(),
            dest: conn.dest.to_string(),
            wires,
        });
    }
    Ok(GraphView { nodes, edges })
}
