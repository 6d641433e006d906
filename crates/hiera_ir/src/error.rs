//! Error taxonomy for registry, graph, and flattening operations.
//!
//! Every failure is detected at the point of mutation and reported before
//! any state changes, so a returned error means the registry or graph is
//! exactly as it was before the call.

use crate::port::{PortDirection, PortType};

/// Errors produced by the type registry, module registry, netlist graph,
/// composite builder, and flattening engine.
#[derive(Debug, thiserror::Error)]
pub enum NetlistError {
    /// A module with this name is already registered.
    #[error("module `{0}` already exists")]
    DuplicateModule(String),

    /// A named type with this name is already registered.
    #[error("type `{0}` already exists")]
    DuplicateType(String),

    /// The referenced module is not registered (and could not be loaded).
    #[error("module `{0}` not found")]
    ModuleNotFound(String),

    /// The referenced instance does not exist in the graph.
    #[error("instance `{0}` not found in graph")]
    InstanceNotFound(String),

    /// An instance with this name already exists in the graph.
    #[error("instance `{0}` already exists in graph")]
    InstanceExists(String),

    /// A sub-instance name inside a composite is not an identifier.
    #[error("instance name `{0}` is not an identifier")]
    InvalidInstanceName(String),

    /// Inlining a composite would create an instance name that is already taken.
    #[error("inlining `{composite}` would create `{instance}`, which already exists in graph")]
    NameCollision {
        /// The prefixed name of the inlined sub-instance.
        instance: String,
        /// The composite instance being inlined.
        composite: String,
    },

    /// The port is not declared with the required direction on the instance's module.
    #[error("{direction} port `{port}` not found on instance `{instance}` of module `{module}`")]
    PortNotFound {
        /// The instance the port was looked up on.
        instance: String,
        /// The module the instance is bound to.
        module: String,
        /// The missing port name.
        port: String,
        /// The direction the port was required to have.
        direction: PortDirection,
    },

    /// The source and destination ports have structurally different types.
    #[error(
        "type mismatch connecting `{source_instance}.{source_port}` ({source_type}) \
         to `{dest_instance}.{dest_port}` ({dest_type})"
    )]
    PortTypeMismatch {
        /// The driving instance.
        source_instance: String,
        /// The driving output port.
        source_port: String,
        /// Declared type of the driving port.
        source_type: PortType,
        /// The driven instance.
        dest_instance: String,
        /// The driven input port.
        dest_port: String,
        /// Declared type of the driven port.
        dest_type: PortType,
    },

    /// The destination input port already has a driver.
    #[error("input port `{instance}.{port}` is already driven by `{driver}`")]
    PortAlreadyDriven {
        /// The driven instance.
        instance: String,
        /// The input port that already has a driver.
        port: String,
        /// `instance.port` of the existing driver.
        driver: String,
    },

    /// A module's port maps are malformed (bad name, zero width, or overlap).
    #[error("invalid ports on module `{module}`: {reason}")]
    InvalidPorts {
        /// The module being registered or updated.
        module: String,
        /// What is wrong with the ports.
        reason: String,
    },

    /// A named type declares a field whose name is not an identifier.
    #[error("type `{type_name}` has invalid field name `{field}`")]
    InvalidFieldName {
        /// The type being registered.
        type_name: String,
        /// The offending field name.
        field: String,
    },

    /// A named type field references a type that does not exist.
    #[error("field `{field}` of type `{type_name}` references unknown type `{reference}`")]
    InvalidFieldType {
        /// The type being registered.
        type_name: String,
        /// The offending field.
        field: String,
        /// The unresolved type reference.
        reference: String,
    },

    /// A named type field declares a zero width.
    #[error("field `{field}` of type `{type_name}` must have a width greater than 0")]
    InvalidWidth {
        /// The type being registered.
        type_name: String,
        /// The offending field.
        field: String,
    },

    /// A module port references a named type missing from the type registry.
    #[error("port `{port}` of module `{module}` references unknown type `{type_name}`")]
    UnknownType {
        /// The module declaring the port.
        module: String,
        /// The port with the unresolved type.
        port: String,
        /// The missing type name.
        type_name: String,
    },

    /// An operation that needs an internal graph was given a leaf module.
    #[error("module `{0}` is a leaf and has no internal graph")]
    NotComposite(String),

    /// A leaf or composite descriptor could not be read, parsed, or built.
    #[error("failed to load descriptor `{source_name}`: {reason}")]
    DescriptorLoadFailure {
        /// The descriptor file or module name.
        source_name: String,
        /// Why loading failed.
        reason: String,
    },

    /// A composite module contains itself, directly or through other composites.
    #[error("circular containment: {}", .0.join(" -> "))]
    CyclicContainment(Vec<String>),

    /// Named types reference each other in a cycle.
    #[error("circular type reference: {}", .0.join(" -> "))]
    CyclicType(Vec<String>),

    /// A persisted document is well-formed JSON but structurally invalid.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// Reading or writing a persisted document failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted document is not valid JSON for the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for netlist operations.
pub type NetlistResult<T> = Result<T, NetlistError>;
