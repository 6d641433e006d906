//! Parsed leaf descriptor nodes.
//!
//! A [`LeafDescriptor`] is the module header of a basic block: its name and
//! an ordered list of typed, directional [`PortDecl`]s. Spans are kept so
//! semantic errors can point back into the file.

use crate::error::DescriptorError;
use crate::token::Span;
use hiera_ir::{ModuleInterface, PortDirection, PortMap, PortType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A parsed module header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeafDescriptor {
    /// The module name.
    pub name: String,
    /// Port declarations in source order.
    pub ports: Vec<PortDecl>,
    /// Span of the whole module header.
    pub span: Span,
}

/// A single port declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortDecl {
    /// The port direction.
    pub direction: PortDirection,
    /// The declared width or named type.
    pub ty: PortType,
    /// The port name.
    pub name: String,
    /// Span of the declaration.
    pub span: Span,
}

impl LeafDescriptor {
    /// Iterates over ports with the given direction.
    pub fn ports(&self, direction: PortDirection) -> impl Iterator<Item = &PortDecl> {
        self.ports.iter().filter(move |p| p.direction == direction)
    }

    /// Converts the header into a registrable module interface.
    ///
    /// Fails if a port name is declared twice.
    pub fn to_interface(&self) -> Result<ModuleInterface, DescriptorError> {
        let mut seen = HashSet::new();
        let mut input_ports = PortMap::new();
        let mut output_ports = PortMap::new();
        for port in &self.ports {
            if !seen.insert(port.name.as_str()) {
                return Err(DescriptorError::Invalid {
                    name: self.name.clone(),
                    reason: format!("port `{}` is declared more than once", port.name),
                });
            }
            let target = match port.direction {
                PortDirection::Input => &mut input_ports,
                PortDirection::Output => &mut output_ports,
            };
            target.insert(port.name.clone(), port.ty.clone());
        }
        Ok(ModuleInterface {
            name: self.name.clone(),
            input_ports,
            output_ports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(direction: PortDirection, name: &str, ty: PortType) -> PortDecl {
        PortDecl {
            direction,
            ty,
            name: name.into(),
            span: Span::default(),
        }
    }

    #[test]
    fn interface_splits_directions() {
        let leaf = LeafDescriptor {
            name: "adder".into(),
            ports: vec![
                decl(PortDirection::Input, "a", PortType::Width(8)),
                decl(PortDirection::Output, "c", PortType::Width(8)),
                decl(PortDirection::Input, "b", PortType::named("intermediate")),
            ],
            span: Span::default(),
        };
        let iface = leaf.to_interface().unwrap();
        assert_eq!(iface.input_ports.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(iface.output_ports.len(), 1);
        assert_eq!(leaf.ports(PortDirection::Input).count(), 2);
    }

    #[test]
    fn duplicate_port_rejected() {
        let leaf = LeafDescriptor {
            name: "bad".into(),
            ports: vec![
                decl(PortDirection::Input, "a", PortType::Width(1)),
                decl(PortDirection::Output, "a", PortType::Width(1)),
            ],
            span: Span::default(),
        };
        assert!(matches!(
            leaf.to_interface(),
            Err(DescriptorError::Invalid { .. })
        ));
    }
}
