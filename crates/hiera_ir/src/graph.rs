//! The netlist graph: instances wired together by validated connections.
//!
//! A [`NetlistGraph`] owns a directed [`StableDiGraph`] whose nodes are
//! [`Instance`]s and whose edges are [`Connection`]s, plus an index from
//! instance name to node. Every mutation goes through this type so the wiring
//! invariants hold at all times:
//!
//! 1. both endpoints of a connection exist in the graph;
//! 2. each source port is an output and each destination port an input of the
//!    respective instance (as seen through the instance's [`InstanceRole`]);
//! 3. both ports resolve to structurally equal types;
//! 4. no input port anywhere in the graph has more than one driver.

use crate::error::{NetlistError, NetlistResult};
use crate::port::{PortDirection, PortType};
use crate::registry::ModuleRegistry;
use indexmap::IndexMap;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// What an instance stands for inside its graph.
///
/// Boundary instances represent the enclosing composite's own interface and
/// are bound to that composite's module name. Their port view is mirrored:
/// the input boundary *drives* the module's inputs into the graph, and the
/// output boundary *receives* the module's outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceRole {
    /// An ordinary instance of a leaf or composite module.
    #[default]
    Cell,
    /// The enclosing module's input interface.
    InputBoundary,
    /// The enclosing module's output interface.
    OutputBoundary,
}

impl InstanceRole {
    /// Returns `true` for either boundary role.
    pub fn is_boundary(self) -> bool {
        !matches!(self, InstanceRole::Cell)
    }

    /// Maps the direction a port is used with on this instance to the
    /// direction it is declared with on the bound module.
    ///
    /// Returns `None` if an instance with this role has no ports in that
    /// direction.
    pub fn declared_direction(self, used_as: PortDirection) -> Option<PortDirection> {
        match (self, used_as) {
            (InstanceRole::Cell, dir) => Some(dir),
            (InstanceRole::InputBoundary, PortDirection::Output) => Some(PortDirection::Input),
            (InstanceRole::OutputBoundary, PortDirection::Input) => Some(PortDirection::Output),
            (InstanceRole::InputBoundary, PortDirection::Input)
            | (InstanceRole::OutputBoundary, PortDirection::Output) => None,
        }
    }

    pub(crate) fn is_cell(&self) -> bool {
        matches!(self, InstanceRole::Cell)
    }
}

/// A graph node: a named instance bound to a module template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Instance name, unique within the graph.
    pub name: String,
    /// Name of the module template this instance is bound to.
    pub module: String,
    /// Whether this is an ordinary instance or a boundary block.
    pub role: InstanceRole,
}

/// One `source_port → dest_port` binding carried by a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortPair {
    /// Output port on the source instance.
    pub source_port: String,
    /// Input port on the destination instance.
    pub dest_port: String,
}

impl PortPair {
    /// Creates a port pair.
    pub fn new(source_port: impl Into<String>, dest_port: impl Into<String>) -> Self {
        Self {
            source_port: source_port.into(),
            dest_port: dest_port.into(),
        }
    }
}

/// A graph edge: every port binding from one instance to another.
///
/// At most one connection exists per ordered instance pair; repeated
/// `add_connection` calls between the same pair accumulate pairs here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    pairs: Vec<PortPair>,
}

impl Connection {
    /// Returns the port bindings in the order they were added.
    pub fn pairs(&self) -> &[PortPair] {
        &self.pairs
    }

    /// Returns the destination port bound to `source_port`, if any.
    pub fn dest_of(&self, source_port: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.source_port == source_port)
            .map(|p| p.dest_port.as_str())
    }

    /// Returns the source port driving `dest_port`, if any.
    pub fn source_of(&self, dest_port: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.dest_port == dest_port)
            .map(|p| p.source_port.as_str())
    }
}

/// A connection together with the names of its endpoints.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionRef<'g> {
    /// Name of the driving instance.
    pub source: &'g str,
    /// Name of the driven instance.
    pub dest: &'g str,
    /// The port bindings.
    pub connection: &'g Connection,
}

/// A graph payload, either a node or an edge.
#[derive(Debug, Clone, Copy)]
pub enum GraphElement<'g> {
    /// An instance node.
    Instance(&'g Instance),
    /// A connection edge.
    Connection(ConnectionRef<'g>),
}

/// Resolves module names that are not yet registered.
///
/// Called by [`NetlistGraph::add_instance_with`] before failing with
/// [`NetlistError::ModuleNotFound`]. Implementations register the module
/// (and anything it depends on) into `registry`.
pub trait ModuleLoader {
    /// Tries to define `module_name` in `registry`.
    ///
    /// Returns `Ok(false)` if this loader knows nothing about the module.
    fn load_module(&mut self, module_name: &str, registry: &mut ModuleRegistry)
        -> NetlistResult<bool>;
}

/// A directed graph of instances and validated connections.
#[derive(Debug, Clone, Default)]
pub struct NetlistGraph {
    graph: StableDiGraph<Instance, Connection>,
    index: IndexMap<String, NodeIndex>,
}

impl NetlistGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance of a registered module.
    ///
    /// Fails with [`NetlistError::InstanceExists`] if the name is taken and
    /// [`NetlistError::ModuleNotFound`] if the module is not registered.
    pub fn add_instance(
        &mut self,
        registry: &ModuleRegistry,
        instance_name: &str,
        module_name: &str,
    ) -> NetlistResult<()> {
        if self.index.contains_key(instance_name) {
            return Err(NetlistError::InstanceExists(instance_name.to_string()));
        }
        if !registry.module_exists(module_name) {
            return Err(NetlistError::ModuleNotFound(module_name.to_string()));
        }
        self.insert(instance_name, module_name, InstanceRole::Cell);
        Ok(())
    }

    /// Adds an instance, asking `loader` to define the module first if it is
    /// not registered yet.
    pub fn add_instance_with(
        &mut self,
        registry: &mut ModuleRegistry,
        loader: &mut dyn ModuleLoader,
        instance_name: &str,
        module_name: &str,
    ) -> NetlistResult<()> {
        if self.index.contains_key(instance_name) {
            return Err(NetlistError::InstanceExists(instance_name.to_string()));
        }
        if !registry.module_exists(module_name) {
            tracing::debug!(module = module_name, "module not registered, trying loader");
            loader.load_module(module_name, registry)?;
        }
        self.add_instance(registry, instance_name, module_name)
    }

    fn insert(&mut self, name: &str, module: &str, role: InstanceRole) -> NodeIndex {
        let idx = self.graph.add_node(Instance {
            name: name.to_string(),
            module: module.to_string(),
            role,
        });
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Rebinds an existing instance to another module name and role.
    ///
    /// No validation is performed. Composite builders use this to turn their
    /// scaffolding instances into the composite's own boundary blocks.
    pub fn relabel(
        &mut self,
        instance_name: &str,
        module_name: &str,
        role: InstanceRole,
    ) -> NetlistResult<()> {
        let idx = self.node(instance_name)?;
        let inst = &mut self.graph[idx];
        inst.module = module_name.to_string();
        inst.role = role;
        Ok(())
    }

    /// Connects output ports of `source` to input ports of `dest`.
    ///
    /// Every pair is checked against the graph invariants before anything is
    /// written; on error the graph is unchanged. Pairs are merged into the
    /// existing connection between the two instances, if there is one.
    pub fn add_connection<S, D>(
        &mut self,
        registry: &ModuleRegistry,
        source: &str,
        dest: &str,
        port_pairs: impl IntoIterator<Item = (S, D)>,
    ) -> NetlistResult<()>
    where
        S: Into<String>,
        D: Into<String>,
    {
        let src_idx = self.node(source)?;
        let dst_idx = self.node(dest)?;
        let pairs: Vec<PortPair> = port_pairs
            .into_iter()
            .map(|(s, d)| PortPair::new(s, d))
            .collect();

        let mut pending: IndexMap<&str, &str> = IndexMap::new();
        for pair in &pairs {
            let src_ty = self.port_type(registry, src_idx, &pair.source_port, PortDirection::Output)?;
            let dst_ty = self.port_type(registry, dst_idx, &pair.dest_port, PortDirection::Input)?;
            if !registry.types().structurally_equal(src_ty, dst_ty) {
                return Err(NetlistError::PortTypeMismatch {
                    source_instance: source.to_string(),
                    source_port: pair.source_port.clone(),
                    source_type: src_ty.clone(),
                    dest_instance: dest.to_string(),
                    dest_port: pair.dest_port.clone(),
                    dest_type: dst_ty.clone(),
                });
            }
            if let Some((drv_inst, drv_port)) = self.driver_at(dst_idx, &pair.dest_port) {
                return Err(NetlistError::PortAlreadyDriven {
                    instance: dest.to_string(),
                    port: pair.dest_port.clone(),
                    driver: format!("{drv_inst}.{drv_port}"),
                });
            }
            if let Some(prev) = pending.get(pair.dest_port.as_str()) {
                return Err(NetlistError::PortAlreadyDriven {
                    instance: dest.to_string(),
                    port: pair.dest_port.clone(),
                    driver: format!("{source}.{prev}"),
                });
            }
            pending.insert(&pair.dest_port, &pair.source_port);
        }

        tracing::trace!(source, dest, pairs = pairs.len(), "connect");
        match self.graph.find_edge(src_idx, dst_idx) {
            Some(edge) => self.graph[edge].pairs.extend(pairs),
            None => {
                self.graph.add_edge(src_idx, dst_idx, Connection { pairs });
            }
        }
        Ok(())
    }

    /// Resolves the type of a port as used on the instance at `idx`.
    fn port_type<'r>(
        &self,
        registry: &'r ModuleRegistry,
        idx: NodeIndex,
        port: &str,
        used_as: PortDirection,
    ) -> NetlistResult<&'r PortType> {
        let inst = &self.graph[idx];
        let template = registry
            .get(&inst.module)
            .ok_or_else(|| NetlistError::ModuleNotFound(inst.module.clone()))?;
        inst.role
            .declared_direction(used_as)
            .and_then(|dir| template.port(port, dir))
            .ok_or_else(|| NetlistError::PortNotFound {
                instance: inst.name.clone(),
                module: inst.module.clone(),
                port: port.to_string(),
                direction: used_as,
            })
    }

    fn driver_at(&self, idx: NodeIndex, port: &str) -> Option<(&str, &str)> {
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .find_map(|edge| {
                edge.weight()
                    .source_of(port)
                    .map(|src_port| (self.graph[edge.source()].name.as_str(), src_port))
            })
    }

    /// Returns the `(instance, port)` driving an input port, if any.
    pub fn driver_of(&self, instance_name: &str, port: &str) -> Option<(&str, &str)> {
        let idx = *self.index.get(instance_name)?;
        self.driver_at(idx, port)
    }

    /// Removes an instance and every connection touching it.
    pub fn remove_instance(&mut self, instance_name: &str) -> NetlistResult<Instance> {
        let idx = self
            .index
            .shift_remove(instance_name)
            .ok_or_else(|| NetlistError::InstanceNotFound(instance_name.to_string()))?;
        self.graph
            .remove_node(idx)
            .ok_or_else(|| NetlistError::InstanceNotFound(instance_name.to_string()))
    }

    /// Removes every instance with no incident connections.
    ///
    /// Returns the names of the removed instances.
    pub fn remove_orphans(&mut self) -> Vec<String> {
        self.remove_orphans_where(|_| true)
    }

    /// Removes instances with no incident connections for which `eligible`
    /// returns `true`.
    pub fn remove_orphans_where(&mut self, eligible: impl Fn(&Instance) -> bool) -> Vec<String> {
        let orphans: Vec<String> = self
            .index
            .iter()
            .filter(|(_, &idx)| {
                self.graph.neighbors_undirected(idx).next().is_none() && eligible(&self.graph[idx])
            })
            .map(|(name, _)| name.clone())
            .collect();
        for name in &orphans {
            if let Some(idx) = self.index.shift_remove(name) {
                self.graph.remove_node(idx);
            }
        }
        orphans
    }

    fn node(&self, instance_name: &str) -> NetlistResult<NodeIndex> {
        self.index
            .get(instance_name)
            .copied()
            .ok_or_else(|| NetlistError::InstanceNotFound(instance_name.to_string()))
    }

    /// Returns `true` if an instance with this name exists.
    pub fn contains(&self, instance_name: &str) -> bool {
        self.index.contains_key(instance_name)
    }

    /// Looks up an instance by name.
    pub fn instance(&self, instance_name: &str) -> Option<&Instance> {
        self.index.get(instance_name).map(|&idx| &self.graph[idx])
    }

    /// Iterates over instances in insertion order.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> + '_ {
        self.index.values().map(move |&idx| &self.graph[idx])
    }

    /// Returns the instance bound with the given boundary role, if present.
    pub fn boundary(&self, role: InstanceRole) -> Option<&Instance> {
        self.instances().find(|inst| inst.role == role)
    }

    /// Iterates over every connection.
    pub fn connections(&self) -> impl Iterator<Item = ConnectionRef<'_>> + '_ {
        self.graph.edge_indices().filter_map(move |e| self.edge_ref(e))
    }

    fn edge_ref(&self, edge: EdgeIndex) -> Option<ConnectionRef<'_>> {
        let (src, dst) = self.graph.edge_endpoints(edge)?;
        Some(ConnectionRef {
            source: &self.graph[src].name,
            dest: &self.graph[dst].name,
            connection: &self.graph[edge],
        })
    }

    /// Iterates over every node and edge as a tagged payload.
    pub fn elements(&self) -> impl Iterator<Item = GraphElement<'_>> + '_ {
        self.instances()
            .map(GraphElement::Instance)
            .chain(self.connections().map(GraphElement::Connection))
    }

    /// Returns the connection from `source` to `dest`, if any.
    pub fn connection(&self, source: &str, dest: &str) -> Option<&Connection> {
        let src = *self.index.get(source)?;
        let dst = *self.index.get(dest)?;
        self.graph.find_edge(src, dst).map(|e| &self.graph[e])
    }

    /// Returns the connections leaving an instance.
    pub fn outgoing(&self, instance_name: &str) -> Vec<ConnectionRef<'_>> {
        self.incident(instance_name, Direction::Outgoing)
    }

    /// Returns the connections entering an instance.
    pub fn incoming(&self, instance_name: &str) -> Vec<ConnectionRef<'_>> {
        self.incident(instance_name, Direction::Incoming)
    }

    fn incident(&self, instance_name: &str, dir: Direction) -> Vec<ConnectionRef<'_>> {
        let Some(&idx) = self.index.get(instance_name) else {
            return Vec::new();
        };
        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(idx, dir)
            .map(|e| e.id())
            .collect();
        edges.sort();
        edges.into_iter().filter_map(|e| self.edge_ref(e)).collect()
    }

    /// Returns the number of instances.
    pub fn instance_count(&self) -> usize {
        self.index.len()
    }

    /// Returns the number of connections (instance pairs, not port pairs).
    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `true` if the graph has no instances.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Re-checks every invariant against the current registry.
    ///
    /// [`ModuleRegistry::update`] does not revisit graphs that reference the
    /// updated module; call this to regain the wiring guarantees afterwards.
    pub fn validate(&self, registry: &ModuleRegistry) -> NetlistResult<()> {
        for inst in self.instances() {
            if !registry.module_exists(&inst.module) {
                return Err(NetlistError::ModuleNotFound(inst.module.clone()));
            }
        }
        let mut driven: HashSet<(&str, &str)> = HashSet::new();
        for edge in self.graph.edge_indices() {
            let Some((src, dst)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            for pair in &self.graph[edge].pairs {
                let src_ty = self.port_type(registry, src, &pair.source_port, PortDirection::Output)?;
                let dst_ty = self.port_type(registry, dst, &pair.dest_port, PortDirection::Input)?;
                if !registry.types().structurally_equal(src_ty, dst_ty) {
                    return Err(NetlistError::PortTypeMismatch {
                        source_instance: self.graph[src].name.clone(),
                        source_port: pair.source_port.clone(),
                        source_type: src_ty.clone(),
                        dest_instance: self.graph[dst].name.clone(),
                        dest_port: pair.dest_port.clone(),
                        dest_type: dst_ty.clone(),
                    });
                }
                if !driven.insert((&self.graph[dst].name, &pair.dest_port)) {
                    return Err(NetlistError::PortAlreadyDriven {
                        instance: self.graph[dst].name.clone(),
                        port: pair.dest_port.clone(),
                        driver: format!("{}.{}", self.graph[src].name, pair.source_port),
                    });
                }
            }
        }
        Ok(())
    }

    /// Compares two graphs by instance names, bindings, roles, and wiring.
    ///
    /// Insertion order and internal indices are ignored.
    pub fn structurally_equal(&self, other: &NetlistGraph) -> bool {
        self.shape() == other.shape()
    }

    #[allow(clippy::type_complexity)]
    fn shape(
        &self,
    ) -> (
        BTreeMap<&str, (&str, InstanceRole)>,
        BTreeMap<(&str, &str), BTreeSet<&PortPair>>,
    ) {
        let nodes = self
            .instances()
            .map(|i| (i.name.as_str(), (i.module.as_str(), i.role)))
            .collect();
        let edges = self
            .connections()
            .map(|c| ((c.source, c.dest), c.connection.pairs.iter().collect()))
            .collect();
        (nodes, edges)
    }

    /// Inserts an instance without consulting a registry.
    ///
    /// Used when rebuilding a graph from a persisted document.
    pub(crate) fn insert_unchecked(
        &mut self,
        instance_name: &str,
        module_name: &str,
        role: InstanceRole,
    ) -> NetlistResult<()> {
        if self.index.contains_key(instance_name) {
            return Err(NetlistError::InstanceExists(instance_name.to_string()));
        }
        self.insert(instance_name, module_name, role);
        Ok(())
    }

    /// Adds port pairs without type checks, still enforcing endpoint
    /// existence and the single-driver rule.
    pub(crate) fn connect_unchecked(
        &mut self,
        source: &str,
        dest: &str,
        pairs: Vec<PortPair>,
    ) -> NetlistResult<()> {
        let src_idx = self.node(source)?;
        let dst_idx = self.node(dest)?;
        let mut seen = HashSet::new();
        for pair in &pairs {
            if let Some((drv_inst, drv_port)) = self.driver_at(dst_idx, &pair.dest_port) {
                return Err(NetlistError::PortAlreadyDriven {
                    instance: dest.to_string(),
                    port: pair.dest_port.clone(),
                    driver: format!("{drv_inst}.{drv_port}"),
                });
            }
            if !seen.insert(pair.dest_port.as_str()) {
                return Err(NetlistError::PortAlreadyDriven {
                    instance: dest.to_string(),
                    port: pair.dest_port.clone(),
                    driver: format!("{source}.{}", pair.source_port),
                });
            }
        }
        match self.graph.find_edge(src_idx, dst_idx) {
            Some(edge) => self.graph[edge].pairs.extend(pairs),
            None => {
                self.graph.add_edge(src_idx, dst_idx, Connection { pairs });
            }
        }
        Ok(())
    }
}
