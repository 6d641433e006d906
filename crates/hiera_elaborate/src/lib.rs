//! Composite construction, descriptor loading, and hierarchy flattening.
//!
//! Builds on the `hiera_ir` data model: composite descriptors become
//! registered composite modules, and any graph of composite instances can be
//! flattened into an equivalent graph of leaf instances.
//!
//! # Architecture
//!
//! - **Builder** ([`builder`]): Wires a composite's boundary blocks into its
//!   internal graph and registers the result.
//! - **Library** ([`library`]): Parsed composite descriptors, built on demand
//!   in dependency order.
//! - **Bootstrap** ([`bootstrap`]): Registers leaf modules from header files.
//! - **Flatten** ([`flatten`]): Recursive inlining of composite instances.
//! - **Emit** ([`emit`]): Per-instance port bindings and labelled graph views.
//! - **Session** ([`session`]): A project directory opened as a whole.
//!
//! # Usage
//!
//! ```ignore
//! let mut session = Session::open(Path::new("my_project"))?;
//! let flat = session.flatten_top()?;
//! for record in instance_records(&flat) {
//!     println!("{} {}", record.module_name, record.instance_name);
//! }
//! ```

#![warn(missing_docs)]

pub mod bootstrap;
pub mod builder;
pub mod context;
pub mod emit;
pub mod errors;
pub mod flatten;
pub mod library;
pub mod session;

pub use bootstrap::{bootstrap_leaves, register_leaf_source, LEAF_EXTENSIONS};
pub use builder::{build_composite, CompositeBuild};
pub use context::FlattenContext;
pub use emit::{
    graph_view, instance_records, GraphView, InstanceRecord, PortBinding, VisualEdge, VisualNode,
    VisualPort, VisualWire,
};
pub use errors::{ElaborateError, ElaborateResult};
pub use flatten::{flatten_graph, flatten_module};
pub use library::{DescriptorLibrary, COMPOSITE_EXTENSION};
pub use session::Session;
