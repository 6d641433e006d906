//! The module registry: the catalog of leaf and composite templates.
//!
//! The registry owns its [`TypeRegistry`] so that port validation and
//! structural type comparison always see the same set of named types.

use crate::error::{NetlistError, NetlistResult};
use crate::graph::NetlistGraph;
use crate::module::{ModuleInterface, ModuleTemplate};
use crate::port::{is_identifier, PortDirection, PortMap, PortType};
use crate::types::TypeRegistry;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::Path;

/// Catalog of module templates keyed by module name.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    pub(crate) types: TypeRegistry,
    pub(crate) modules: IndexMap<String, ModuleTemplate>,
}

impl ModuleRegistry {
    /// Creates an empty registry with an empty type registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry that uses the given named types.
    pub fn with_types(types: TypeRegistry) -> Self {
        Self {
            types,
            modules: IndexMap::new(),
        }
    }

    /// Returns the named-type registry.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Returns the named-type registry for registering new types.
    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    /// Registers a new module.
    ///
    /// A module with an `internal_graph` is a composite, otherwise a leaf.
    /// The graph is stored as given. Nothing is registered on error.
    pub fn add(
        &mut self,
        name: &str,
        input_ports: PortMap,
        output_ports: PortMap,
        internal_graph: Option<NetlistGraph>,
    ) -> NetlistResult<()> {
        if self.modules.contains_key(name) {
            return Err(NetlistError::DuplicateModule(name.to_string()));
        }
        self.validate_ports(name, &input_ports, &output_ports)?;
        if let Some(graph) = &internal_graph {
            let mut path = vec![name.to_string()];
            let mut cleared = HashSet::new();
            self.check_containment(name, graph, &mut path, &mut cleared)?;
        }
        tracing::debug!(
            module = name,
            inputs = input_ports.len(),
            outputs = output_ports.len(),
            leaf = internal_graph.is_none(),
            "registered module"
        );
        self.modules.insert(
            name.to_string(),
            ModuleTemplate {
                name: name.to_string(),
                input_ports,
                output_ports,
                internal_graph,
            },
        );
        Ok(())
    }

    /// Replaces the port maps of an existing module.
    ///
    /// Graphs that already instantiate the module are not re-checked; use
    /// [`NetlistGraph::validate`] for that.
    pub fn update(
        &mut self,
        name: &str,
        input_ports: PortMap,
        output_ports: PortMap,
    ) -> NetlistResult<()> {
        if !self.modules.contains_key(name) {
            return Err(NetlistError::ModuleNotFound(name.to_string()));
        }
        self.validate_ports(name, &input_ports, &output_ports)?;
        if let Some(template) = self.modules.get_mut(name) {
            template.input_ports = input_ports;
            template.output_ports = output_ports;
        }
        tracing::debug!(module = name, "updated module ports");
        Ok(())
    }

    /// Removes a module and returns its template.
    pub fn delete(&mut self, name: &str) -> NetlistResult<ModuleTemplate> {
        let removed = self
            .modules
            .shift_remove(name)
            .ok_or_else(|| NetlistError::ModuleNotFound(name.to_string()))?;
        tracing::debug!(module = name, "deleted module");
        Ok(removed)
    }

    /// Registers a batch of leaf modules.
    ///
    /// Every interface is checked (including name clashes within the batch)
    /// before any of them is inserted.
    pub fn register_leaves(
        &mut self,
        leaves: impl IntoIterator<Item = ModuleInterface>,
    ) -> NetlistResult<usize> {
        let leaves: Vec<ModuleInterface> = leaves.into_iter().collect();
        let mut seen = HashSet::new();
        for leaf in &leaves {
            if self.modules.contains_key(&leaf.name) || !seen.insert(leaf.name.as_str()) {
                return Err(NetlistError::DuplicateModule(leaf.name.clone()));
            }
            self.validate_ports(&leaf.name, &leaf.input_ports, &leaf.output_ports)?;
        }
        let count = leaves.len();
        for leaf in leaves {
            self.add(&leaf.name, leaf.input_ports, leaf.output_ports, None)?;
        }
        Ok(count)
    }

    pub(crate) fn validate_ports(
        &self,
        module: &str,
        input_ports: &PortMap,
        output_ports: &PortMap,
    ) -> NetlistResult<()> {
        let invalid = |reason: String| NetlistError::InvalidPorts {
            module: module.to_string(),
            reason,
        };
        for (port, ty) in input_ports.iter().chain(output_ports.iter()) {
            if !is_identifier(port) {
                return Err(invalid(format!("`{port}` is not a valid port name")));
            }
            match ty {
                PortType::Width(0) => {
                    return Err(invalid(format!("port `{port}` has zero width")));
                }
                PortType::Width(_) => {}
                PortType::Named(type_name) => {
                    if !self.types.exists(type_name) {
                        return Err(NetlistError::UnknownType {
                            module: module.to_string(),
                            port: port.clone(),
                            type_name: type_name.clone(),
                        });
                    }
                }
            }
        }
        if let Some(port) = input_ports.keys().find(|p| output_ports.contains_key(*p)) {
            return Err(invalid(format!(
                "`{port}` is declared as both an input and an output"
            )));
        }
        Ok(())
    }

    /// Walks cell instances of `graph` (and of the registered composites they
    /// instantiate) looking for `root`.
    fn check_containment(
        &self,
        root: &str,
        graph: &NetlistGraph,
        path: &mut Vec<String>,
        cleared: &mut HashSet<String>,
    ) -> NetlistResult<()> {
        for inst in graph.instances().filter(|i| i.role.is_cell()) {
            if inst.module == root || path.contains(&inst.module) {
                let mut cycle = path.clone();
                cycle.push(inst.module.clone());
                return Err(NetlistError::CyclicContainment(cycle));
            }
            if cleared.contains(&inst.module) {
                continue;
            }
            if let Some(inner) = self.get(&inst.module).and_then(|m| m.internal_graph()) {
                path.push(inst.module.clone());
                self.check_containment(root, inner, path, cleared)?;
                path.pop();
            }
            cleared.insert(inst.module.clone());
        }
        Ok(())
    }

    /// Returns `true` if a module with this name is registered.
    pub fn module_exists(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Looks up a module template.
    pub fn get(&self, name: &str) -> Option<&ModuleTemplate> {
        self.modules.get(name)
    }

    /// Returns `true` if `module` declares `port` with the given direction.
    pub fn port_exists(&self, module: &str, port: &str, direction: PortDirection) -> bool {
        self.port_type(module, port, direction).is_some()
    }

    /// Returns the declared type of a port.
    pub fn port_type(
        &self,
        module: &str,
        port: &str,
        direction: PortDirection,
    ) -> Option<&PortType> {
        self.modules.get(module)?.port(port, direction)
    }

    /// Returns `true` if an output port of `source_module` and an input port
    /// of `dest_module` exist and have structurally equal types.
    pub fn ports_type_match(
        &self,
        source_module: &str,
        source_port: &str,
        dest_module: &str,
        dest_port: &str,
    ) -> bool {
        match (
            self.port_type(source_module, source_port, PortDirection::Output),
            self.port_type(dest_module, dest_port, PortDirection::Input),
        ) {
            (Some(a), Some(b)) => self.types.structurally_equal(a, b),
            _ => false,
        }
    }

    /// Iterates over module names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Iterates over every module template.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleTemplate> {
        self.modules.values()
    }

    /// Iterates over leaf modules.
    pub fn leaves(&self) -> impl Iterator<Item = &ModuleTemplate> {
        self.modules.values().filter(|m| m.is_leaf())
    }

    /// Iterates over composite modules.
    pub fn composites(&self) -> impl Iterator<Item = &ModuleTemplate> {
        self.modules.values().filter(|m| !m.is_leaf())
    }

    /// Returns the number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if no modules are registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Serializes the registry to the persisted JSON format.
    pub fn to_json(&self) -> NetlistResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Rebuilds a registry from the persisted JSON format.
    pub fn from_json(json: &str) -> NetlistResult<Self> {
        let doc = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    /// Writes the registry to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> NetlistResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        tracing::debug!(path = %path.display(), modules = self.len(), "saved registry");
        Ok(())
    }

    /// Reads a registry previously written by [`save`](Self::save).
    pub fn load(path: &Path) -> NetlistResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Compares two registries by types, module ports, and internal graphs.
    pub fn structurally_equal(&self, other: &ModuleRegistry) -> bool {
        if self.types != other.types || self.modules.len() != other.modules.len() {
            return false;
        }
        self.modules.values().all(|m| {
            other.get(&m.name).is_some_and(|o| {
                m.input_ports == o.input_ports
                    && m.output_ports == o.output_ports
                    && match (&m.internal_graph, &o.internal_graph) {
                        (None, None) => true,
                        (Some(a), Some(b)) => a.structurally_equal(b),
                        _ => false,
                    }
            })
        })
    }

    /// Re-runs the containment check for every composite.
    pub(crate) fn check_all_containment(&self) -> NetlistResult<()> {
        for m in self.composites() {
            if let Some(graph) = m.internal_graph() {
                let mut path = vec![m.name.clone()];
                let mut cleared = HashSet::new();
                self.check_containment(&m.name, graph, &mut path, &mut cleared)?;
            }
        }
        Ok(())
    }
}
