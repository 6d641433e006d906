//! Port definitions for module interfaces.
//!
//! A port is a named, directional connection point on a module. Its type is
//! either a raw bit width or a reference to a named composite type held in
//! the [`TypeRegistry`](crate::TypeRegistry).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The direction of a port on a module boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    /// An input port (data flows into the module).
    Input,
    /// An output port (data flows out of the module).
    Output,
}

impl PortDirection {
    /// Returns the opposite direction.
    pub fn flip(self) -> Self {
        match self {
            PortDirection::Input => PortDirection::Output,
            PortDirection::Output => PortDirection::Input,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// The declared type of a port or of a named-type field.
///
/// Persisted as a bare integer (width) or a bare string (type name), matching
/// the registry document format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortType {
    /// A plain bit vector of the given width. Valid widths are non-zero.
    Width(u32),
    /// A reference to a named type in the type registry.
    Named(String),
}

impl PortType {
    /// Creates a named-type reference.
    pub fn named(name: impl Into<String>) -> Self {
        PortType::Named(name.into())
    }

    /// Returns the referenced type name, if this is a named type.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            PortType::Named(name) => Some(name),
            PortType::Width(_) => None,
        }
    }
}

impl From<u32> for PortType {
    fn from(width: u32) -> Self {
        PortType::Width(width)
    }
}

impl From<&str> for PortType {
    fn from(name: &str) -> Self {
        PortType::Named(name.to_string())
    }
}

/// Renders widths as a packed range (`[7:0]`) and named types by name.
impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortType::Width(w) => write!(f, "[{}:0]", w.saturating_sub(1)),
            PortType::Named(name) => f.write_str(name),
        }
    }
}

/// Ordered mapping from port (or field) name to its type.
pub type PortMap = IndexMap<String, PortType>;

/// Builds a [`PortMap`] from `(name, type)` pairs.
///
/// ```ignore
/// let ports = port_map([("a", 8), ("b", 8)]);
/// ```
pub fn port_map<K, T>(entries: impl IntoIterator<Item = (K, T)>) -> PortMap
where
    K: Into<String>,
    T: Into<PortType>,
{
    entries
        .into_iter()
        .map(|(k, t)| (k.into(), t.into()))
        .collect()
}

/// Returns `true` if `c` may start an identifier: an ASCII letter or `_`.
pub fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Returns `true` if `c` may continue an identifier: an ASCII alphanumeric,
/// `_`, or `$`.
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Returns `true` if `s` is a valid port, field, type, or instance identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(is_identifier_start) && chars.all(is_identifier_char)
}
