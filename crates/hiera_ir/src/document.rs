//! Persisted JSON shapes for graphs and registries.
//!
//! Graphs use a node-link layout (ordered node list, ordered link list).
//! Registries nest one node-link graph per composite module.

use crate::error::{NetlistError, NetlistResult};
use crate::graph::{InstanceRole, NetlistGraph, PortPair};
use crate::module::ModuleTemplate;
use crate::port::PortMap;
use crate::registry::ModuleRegistry;
use crate::types::TypeRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Node-link encoding of a [`NetlistGraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Always `true`; netlist graphs are directed.
    pub directed: bool,
    /// Instances in insertion order.
    pub nodes: Vec<NodeRecord>,
    /// Connections, one per instance pair.
    pub links: Vec<LinkRecord>,
}

/// A persisted instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Instance name.
    pub id: String,
    /// Bound module name.
    pub module_name: String,
    /// Instance role; absent means an ordinary cell.
    #[serde(default)]
    pub role: InstanceRole,
}

/// A persisted connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Driving instance name.
    pub source: String,
    /// Driven instance name.
    pub target: String,
    /// `[source_port, dest_port]` pairs in order.
    pub port_connections: Vec<(String, String)>,
}

/// Persisted form of a [`ModuleRegistry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    /// Named types.
    #[serde(default)]
    pub types: TypeRegistry,
    /// Modules keyed by name, in registration order.
    pub modules: IndexMap<String, ModuleRecord>,
}

/// A persisted module template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Declared input ports.
    pub input_ports: PortMap,
    /// Declared output ports.
    pub output_ports: PortMap,
    /// `true` for leaf modules.
    pub is_leaf: bool,
    /// Internal graph of a composite module.
    #[serde(default)]
    pub internal_graph: Option<GraphDocument>,
}

impl NetlistGraph {
    /// Encodes the graph in node-link form.
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            directed: true,
            nodes: self
                .instances()
                .map(|inst| NodeRecord {
                    id: inst.name.clone(),
                    module_name: inst.module.clone(),
                    role: inst.role,
                })
                .collect(),
            links: self
                .connections()
                .map(|c| LinkRecord {
                    source: c.source.to_string(),
                    target: c.dest.to_string(),
                    port_connections: c
                        .connection
                        .pairs()
                        .iter()
                        .map(|p| (p.source_port.clone(), p.dest_port.clone()))
                        .collect(),
                })
                .collect(),
        }
    }

    /// Decodes a node-link document.
    ///
    /// Module references and port types are not checked here since the
    /// document is registry-independent; call [`validate`](Self::validate)
    /// against a registry afterwards. Duplicate instances, dangling links,
    /// and double-driven ports are rejected.
    pub fn from_document(doc: &GraphDocument) -> NetlistResult<Self> {
        if !doc.directed {
            return Err(NetlistError::MalformedDocument(
                "netlist graphs must be directed".into(),
            ));
        }
        let mut graph = NetlistGraph::new();
        for node in &doc.nodes {
            graph.insert_unchecked(&node.id, &node.module_name, node.role)?;
        }
        for link in &doc.links {
            if link.port_connections.is_empty() {
                return Err(NetlistError::MalformedDocument(format!(
                    "link `{}` -> `{}` has no port connections",
                    link.source, link.target
                )));
            }
            let pairs = link
                .port_connections
                .iter()
                .map(|(s, d)| PortPair::new(s.as_str(), d.as_str()))
                .collect();
            graph
                .connect_unchecked(&link.source, &link.target, pairs)
                .map_err(|e| match e {
                    NetlistError::InstanceNotFound(name) => NetlistError::MalformedDocument(
                        format!("link references unknown node `{name}`"),
                    ),
                    other => other,
                })?;
        }
        Ok(graph)
    }

    /// Serializes the graph as node-link JSON.
    pub fn to_json(&self) -> NetlistResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Parses node-link JSON.
    pub fn from_json(json: &str) -> NetlistResult<Self> {
        let doc: GraphDocument = serde_json::from_str(json)?;
        Self::from_document(&doc)
    }
}

impl ModuleRegistry {
    /// Encodes the registry for persistence.
    pub fn to_document(&self) -> RegistryDocument {
        RegistryDocument {
            types: self.types.clone(),
            modules: self
                .modules
                .iter()
                .map(|(name, m)| {
                    let record = ModuleRecord {
                        input_ports: m.input_ports.clone(),
                        output_ports: m.output_ports.clone(),
                        is_leaf: m.is_leaf(),
                        internal_graph: m.internal_graph.as_ref().map(NetlistGraph::to_document),
                    };
                    (name.clone(), record)
                })
                .collect(),
        }
    }

    /// Rebuilds a registry from its persisted form.
    ///
    /// Named types are validated first, then every module's ports, then every
    /// internal graph against the complete registry, and finally composite
    /// containment.
    pub fn from_document(doc: RegistryDocument) -> NetlistResult<Self> {
        doc.types.validate()?;
        let mut registry = ModuleRegistry::with_types(doc.types);
        for (name, record) in doc.modules {
            let internal_graph = match (record.is_leaf, &record.internal_graph) {
                (true, None) => None,
                (false, Some(graph)) => Some(NetlistGraph::from_document(graph)?),
                (true, Some(_)) => {
                    return Err(NetlistError::MalformedDocument(format!(
                        "leaf module `{name}` has an internal graph"
                    )))
                }
                (false, None) => {
                    return Err(NetlistError::MalformedDocument(format!(
                        "composite module `{name}` has no internal graph"
                    )))
                }
            };
            registry.insert_loaded(ModuleTemplate {
                name,
                input_ports: record.input_ports,
                output_ports: record.output_ports,
                internal_graph,
            })?;
        }
        for m in registry.composites() {
            if let Some(graph) = m.internal_graph() {
                graph.validate(&registry)?;
            }
        }
        registry.check_all_containment()?;
        tracing::debug!(modules = registry.len(), types = registry.types().len(), "loaded registry");
        Ok(registry)
    }

    fn insert_loaded(&mut self, template: ModuleTemplate) -> NetlistResult<()> {
        if self.module_exists(&template.name) {
            return Err(NetlistError::DuplicateModule(template.name));
        }
        // Containment is checked once every module is present.
        self.validate_ports(&template.name, &template.input_ports, &template.output_ports)?;
        self.modules.insert(template.name.clone(), template);
        Ok(())
    }
}
