//! Declarative composite module descriptors.
//!
//! A composite descriptor is a TOML document naming the module, its typed
//! ports, the sub-instances of its internal graph, the connections between
//! them, and how the module's own ports attach to internal instance ports.
//! An input may also be forwarded unchanged to an output:
//!
//! ```toml
//! name = "doubler"
//!
//! [inputs]
//! x = 8
//! bypass = 4
//!
//! [outputs]
//! out = 8
//! bypass_out = 4
//!
//! [[instances]]
//! name = "adder_0"
//! module = "adder"
//!
//! [[connections]]
//! source = "adder_0"
//! dest = "multiplier_0"
//! ports = { c = "a" }
//!
//! [input_connections]
//! x = [["adder_0", "a"], ["adder_0", "b"]]
//!
//! [output_connections]
//! out = ["multiplier_0", "product"]
//!
//! [feed_through]
//! bypass = "bypass_out"
//! ```

use crate::error::DescriptorError;
use hiera_ir::{is_identifier, PortMap};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;

/// A parsed composite module descriptor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositeDescriptor {
    /// The composite module name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Declared input ports.
    #[serde(default)]
    pub inputs: PortMap,
    /// Declared output ports.
    #[serde(default)]
    pub outputs: PortMap,
    /// Sub-instances of the internal graph.
    #[serde(default)]
    pub instances: Vec<InstanceDecl>,
    /// Connections between sub-instances.
    #[serde(default)]
    pub connections: Vec<ConnectionDecl>,
    /// For each declared input, the internal `(instance, port)` pairs it drives.
    #[serde(default)]
    pub input_connections: IndexMap<String, Vec<(String, String)>>,
    /// For each declared output, the internal `(instance, port)` that produces it.
    #[serde(default)]
    pub output_connections: IndexMap<String, (String, String)>,
    /// Declared inputs wired straight to a declared output, keyed by input.
    #[serde(default)]
    pub feed_through: IndexMap<String, String>,
}

/// A sub-instance declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceDecl {
    /// Instance name, unique within the descriptor.
    pub name: String,
    /// Module the instance is bound to.
    pub module: String,
}

/// A connection between two sub-instances.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionDecl {
    /// Driving instance.
    pub source: String,
    /// Driven instance.
    pub dest: String,
    /// Port bindings from `source` outputs to `dest` inputs.
    pub ports: PortBindings,
}

/// Port bindings, written either as a table or as a list of pairs.
///
/// The list form allows one output to drive several inputs of the same
/// destination instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PortBindings {
    /// `{ source_port = "dest_port", ... }`
    Table(IndexMap<String, String>),
    /// `[["source_port", "dest_port"], ...]`
    Pairs(Vec<(String, String)>),
}

impl PortBindings {
    /// Returns the bindings as `(source_port, dest_port)` pairs in order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        match self {
            PortBindings::Table(map) => map.iter().map(|(s, d)| (s.clone(), d.clone())).collect(),
            PortBindings::Pairs(pairs) => pairs.clone(),
        }
    }
}

impl CompositeDescriptor {
    /// Parses and checks a composite descriptor.
    pub fn from_toml_str(text: &str) -> Result<Self, DescriptorError> {
        let desc: CompositeDescriptor =
            toml::from_str(text).map_err(|e| DescriptorError::Toml(e.to_string()))?;
        desc.check()?;
        Ok(desc)
    }

    /// Returns the distinct module names instantiated, in declaration order.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.instances
            .iter()
            .map(|i| i.module.as_str())
            .filter(|m| seen.insert(*m))
            .collect()
    }

    fn invalid(&self, reason: String) -> DescriptorError {
        DescriptorError::Invalid {
            name: self.name.clone(),
            reason,
        }
    }

    /// Checks references that do not need a module registry.
    ///
    /// Port names and types are checked when the composite is built.
    fn check(&self) -> Result<(), DescriptorError> {
        if !is_identifier(&self.name) {
            return Err(self.invalid("module name is not an identifier".into()));
        }
        let mut names = HashSet::new();
        for inst in &self.instances {
            if !is_identifier(&inst.name) {
                return Err(self.invalid(format!(
                    "instance name `{}` is not an identifier",
                    inst.name
                )));
            }
            if !names.insert(inst.name.as_str()) {
                return Err(self.invalid(format!(
                    "instance `{}` is declared more than once",
                    inst.name
                )));
            }
        }
        let known = |inst: &str| names.contains(inst);
        for conn in &self.connections {
            for end in [&conn.source, &conn.dest] {
                if !known(end.as_str()) {
                    return Err(self.invalid(format!(
                        "connection references undeclared instance `{end}`"
                    )));
                }
            }
            if conn.ports.pairs().is_empty() {
                return Err(self.invalid(format!(
                    "connection `{}` -> `{}` binds no ports",
                    conn.source, conn.dest
                )));
            }
        }
        for (port, sinks) in &self.input_connections {
            if !self.inputs.contains_key(port) {
                return Err(self.invalid(format!(
                    "input_connections names undeclared input `{port}`"
                )));
            }
            if let Some((inst, _)) = sinks.iter().find(|(inst, _)| !known(inst.as_str())) {
                return Err(self.invalid(format!(
                    "input `{port}` drives undeclared instance `{inst}`"
                )));
            }
        }
        for (port, (inst, _)) in &self.output_connections {
            if !self.outputs.contains_key(port) {
                return Err(self.invalid(format!(
                    "output_connections names undeclared output `{port}`"
                )));
            }
            if !known(inst.as_str()) {
                return Err(self.invalid(format!(
                    "output `{port}` is produced by undeclared instance `{inst}`"
                )));
            }
        }
        let mut forwarded = HashSet::new();
        for (input, output) in &self.feed_through {
            if !self.inputs.contains_key(input) {
                return Err(self.invalid(format!(
                    "feed_through names undeclared input `{input}`"
                )));
            }
            if !self.outputs.contains_key(output) {
                return Err(self.invalid(format!(
                    "input `{input}` is fed through to undeclared output `{output}`"
                )));
            }
            if self.output_connections.contains_key(output) || !forwarded.insert(output.as_str()) {
                return Err(self.invalid(format!("output `{output}` has more than one driver")));
            }
        }
        Ok(())
    }
}
