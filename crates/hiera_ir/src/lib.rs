//! Core netlist representation for the hiera hierarchical netlist compiler.
//!
//! This crate defines the module catalog ([`ModuleRegistry`] and its
//! [`TypeRegistry`]), the validated instance graph ([`NetlistGraph`]), and
//! their persisted JSON forms. Every mutating operation checks its invariants
//! before touching state, so callers either get the change or an error.

#![warn(missing_docs)]

pub mod document;
pub mod error;
pub mod graph;
pub mod module;
pub mod port;
pub mod registry;
pub mod types;

pub use document::{GraphDocument, LinkRecord, ModuleRecord, NodeRecord, RegistryDocument};
pub use error::{NetlistError, NetlistResult};
pub use graph::{
    Connection, ConnectionRef, GraphElement, Instance, InstanceRole, ModuleLoader, NetlistGraph,
    PortPair,
};
pub use module::{ModuleInterface, ModuleTemplate};
pub use port::{
    is_identifier, is_identifier_char, is_identifier_start, port_map, PortDirection, PortMap,
    PortType,
};
pub use registry::ModuleRegistry;
pub use types::{ResolvedType, TypeRegistry};
