//! Parsing and validation of `hiera.toml` project configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`ProjectConfig`] carrying the boundary block names, the hierarchy separator
//! used during flattening, and the descriptor directories.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::{resolve_paths, ResolvedPaths};
pub use types::*;
