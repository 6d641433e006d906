//! Named composite port types and their structural resolution.
//!
//! A [`TypeRegistry`] holds named record types whose fields are themselves
//! widths or other named types. Ports compare by the structure a type
//! resolves to, not by its spelling.

use crate::error::{NetlistError, NetlistResult};
use crate::port::{is_identifier, PortMap, PortType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A port type with every named reference expanded.
///
/// Record fields are keyed by name, so two records with the same fields in a
/// different declaration order are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    /// A plain bit vector.
    Bits(u32),
    /// A record of named fields.
    Record(BTreeMap<String, ResolvedType>),
}

impl ResolvedType {
    /// Returns the total number of bits the type occupies.
    pub fn bit_width(&self) -> u64 {
        match self {
            ResolvedType::Bits(w) => u64::from(*w),
            ResolvedType::Record(fields) => fields.values().map(ResolvedType::bit_width).sum(),
        }
    }
}

/// Registry of named composite port types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeRegistry {
    types: IndexMap<String, PortMap>,
}

impl TypeRegistry {
    /// Creates an empty type registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named type with the given fields.
    ///
    /// Fields may only reference types that are already registered, so a
    /// registry built through this method never contains a reference cycle.
    pub fn register(&mut self, name: &str, fields: PortMap) -> NetlistResult<()> {
        if self.types.contains_key(name) {
            return Err(NetlistError::DuplicateType(name.to_string()));
        }
        for (field, ty) in &fields {
            if !is_identifier(field) {
                return Err(NetlistError::InvalidFieldName {
                    type_name: name.to_string(),
                    field: field.clone(),
                });
            }
            match ty {
                PortType::Width(0) => {
                    return Err(NetlistError::InvalidWidth {
                        type_name: name.to_string(),
                        field: field.clone(),
                    })
                }
                PortType::Width(_) => {}
                PortType::Named(reference) => {
                    if !self.types.contains_key(reference) {
                        return Err(NetlistError::InvalidFieldType {
                            type_name: name.to_string(),
                            field: field.clone(),
                            reference: reference.clone(),
                        });
                    }
                }
            }
        }
        tracing::debug!(type_name = name, fields = fields.len(), "registered type");
        self.types.insert(name.to_string(), fields);
        Ok(())
    }

    /// Returns `true` if a type with this name is registered.
    pub fn exists(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Returns the fields of a named type.
    pub fn get(&self, name: &str) -> Option<&PortMap> {
        self.types.get(name)
    }

    /// Iterates over `(name, fields)` in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PortMap)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Expands a port type into its structural form.
    ///
    /// Returns `None` if any referenced type is missing. The registry is
    /// assumed acyclic; call [`validate`](Self::validate) on deserialized data
    /// before resolving.
    pub fn resolve(&self, ty: &PortType) -> Option<ResolvedType> {
        match ty {
            PortType::Width(w) => Some(ResolvedType::Bits(*w)),
            PortType::Named(name) => {
                let fields = self.types.get(name)?;
                let mut resolved = BTreeMap::new();
                for (field, field_ty) in fields {
                    resolved.insert(field.clone(), self.resolve(field_ty)?);
                }
                Some(ResolvedType::Record(resolved))
            }
        }
    }

    /// Returns `true` if two port types resolve to the same structure.
    ///
    /// Unresolvable types are never equal to anything.
    pub fn structurally_equal(&self, a: &PortType, b: &PortType) -> bool {
        if a == b {
            return self.resolve(a).is_some();
        }
        match (self.resolve(a), self.resolve(b)) {
            (Some(ra), Some(rb)) => ra == rb,
            _ => false,
        }
    }

    /// Returns the flattened bit width of a port type.
    pub fn bit_width(&self, ty: &PortType) -> Option<u64> {
        self.resolve(ty).map(|r| r.bit_width())
    }

    /// Checks a registry obtained from a persisted document.
    ///
    /// Verifies field names, widths, and references, then detects reference
    /// cycles among named types.
    pub fn validate(&self) -> NetlistResult<()> {
        for (name, fields) in &self.types {
            for (field, ty) in fields {
                if !is_identifier(field) {
                    return Err(NetlistError::InvalidFieldName {
                        type_name: name.clone(),
                        field: field.clone(),
                    });
                }
                match ty {
                    PortType::Width(0) => {
                        return Err(NetlistError::InvalidWidth {
                            type_name: name.clone(),
                            field: field.clone(),
                        })
                    }
                    PortType::Width(_) => {}
                    PortType::Named(reference) if !self.types.contains_key(reference) => {
                        return Err(NetlistError::InvalidFieldType {
                            type_name: name.clone(),
                            field: field.clone(),
                            reference: reference.clone(),
                        })
                    }
                    PortType::Named(_) => {}
                }
            }
        }

        let mut done = HashSet::new();
        for name in self.types.keys() {
            let mut stack = Vec::new();
            self.visit_for_cycles(name, &mut stack, &mut done)?;
        }
        Ok(())
    }

    fn visit_for_cycles<'a>(
        &'a self,
        name: &'a str,
        stack: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> NetlistResult<()> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|n| *n == name) {
            let mut cycle: Vec<String> = stack[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(name.to_string());
            return Err(NetlistError::CyclicType(cycle));
        }
        stack.push(name);
        if let Some(fields) = self.types.get(name) {
            for ty in fields.values() {
                if let PortType::Named(reference) = ty {
                    self.visit_for_cycles(reference, stack, done)?;
                }
            }
        }
        stack.pop();
        done.insert(name);
        Ok(())
    }
}
