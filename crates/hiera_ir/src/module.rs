//! Module templates: the catalog entries instances are bound to.
//!
//! A [`ModuleTemplate`] is either a leaf (its ports are its complete
//! definition) or a composite whose behavior is a frozen internal
//! [`NetlistGraph`].

use crate::graph::NetlistGraph;
use crate::port::{PortDirection, PortMap, PortType};

/// A named module interface without an internal graph.
///
/// This is what a leaf descriptor parses into before it is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInterface {
    /// The module name.
    pub name: String,
    /// Declared input ports, in declaration order.
    pub input_ports: PortMap,
    /// Declared output ports, in declaration order.
    pub output_ports: PortMap,
}

/// A registered module: its typed ports and, for composites, its internal graph.
#[derive(Debug, Clone)]
pub struct ModuleTemplate {
    pub(crate) name: String,
    pub(crate) input_ports: PortMap,
    pub(crate) output_ports: PortMap,
    pub(crate) internal_graph: Option<NetlistGraph>,
}

impl ModuleTemplate {
    /// Returns the module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared input ports.
    pub fn input_ports(&self) -> &PortMap {
        &self.input_ports
    }

    /// Returns the declared output ports.
    pub fn output_ports(&self) -> &PortMap {
        &self.output_ports
    }

    /// Returns the ports declared with the given direction.
    pub fn ports(&self, direction: PortDirection) -> &PortMap {
        match direction {
            PortDirection::Input => &self.input_ports,
            PortDirection::Output => &self.output_ports,
        }
    }

    /// Looks up the type of a port with the given direction.
    pub fn port(&self, port: &str, direction: PortDirection) -> Option<&PortType> {
        self.ports(direction).get(port)
    }

    /// Returns `true` if this is a leaf module (no internal graph).
    pub fn is_leaf(&self) -> bool {
        self.internal_graph.is_none()
    }

    /// Returns the internal graph of a composite module.
    pub fn internal_graph(&self) -> Option<&NetlistGraph> {
        self.internal_graph.as_ref()
    }

    /// Returns the module's interface (name and ports).
    pub fn interface(&self) -> ModuleInterface {
        ModuleInterface {
            name: self.name.clone(),
            input_ports: self.input_ports.clone(),
            output_ports: self.output_ports.clone(),
        }
    }
}
