//! Mutable state for recursive flattening.
//!
//! [`FlattenContext`] holds the module registry, a cache of composites that
//! have already been flattened in this run, and the stack of composites
//! currently being flattened for cycle detection.

use std::collections::HashMap;

use hiera_config::BoundaryConfig;
use hiera_ir::{ModuleRegistry, NetlistError, NetlistGraph, NetlistResult};

/// Mutable state carried through recursive flattening.
pub struct FlattenContext<'a> {
    /// The registry providing templates and port types.
    pub registry: &'a ModuleRegistry,
    /// Reserved names and the hierarchy separator.
    pub boundary: &'a BoundaryConfig,
    /// Flattened internal graphs by composite name.
    cache: HashMap<String, NetlistGraph>,
    /// Composites currently being flattened, outermost first.
    stack: Vec<String>,
}

impl<'a> FlattenContext<'a> {
    /// Creates a new flattening context.
    pub fn new(registry: &'a ModuleRegistry, boundary: &'a BoundaryConfig) -> Self {
        Self {
            registry,
            boundary,
            cache: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Returns the flattened graph of a composite if it was already computed.
    pub fn check_cache(&self, module: &str) -> Option<&NetlistGraph> {
        self.cache.get(module)
    }

    /// Records the flattened graph of a composite.
    pub fn insert_cache(&mut self, module: &str, graph: NetlistGraph) {
        self.cache.insert(module.to_string(), graph);
    }

    /// Pushes a composite onto the flattening stack.
    ///
    /// Fails with [`NetlistError::CyclicContainment`] if it is already on the
    /// stack.
    pub fn push_stack(&mut self, module: &str) -> NetlistResult<()> {
        if let Some(pos) = self.stack.iter().position(|m| m == module) {
            let mut cycle = self.stack[pos..].to_vec();
            cycle.push(module.to_string());
            return Err(NetlistError::CyclicContainment(cycle));
        }
        self.stack.push(module.to_string());
        Ok(())
    }

    /// Pops the most recent composite from the flattening stack.
    pub fn pop_stack(&mut self) {
        self.stack.pop();
    }

    /// Returns the current stack depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
