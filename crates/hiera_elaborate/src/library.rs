//! Composite descriptor library and lazy loading.
//!
//! The [`DescriptorLibrary`] parses every composite descriptor of a project
//! up front and keeps them by module name. Modules are built on demand: when
//! a graph asks for an unregistered module, the library computes the
//! composites it depends on, orders them so submodules come first, and
//! builds each through the composite builder.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use hiera_config::BoundaryConfig;
use hiera_descriptor::CompositeDescriptor;
use hiera_ir::{ModuleLoader, ModuleRegistry, NetlistError, NetlistGraph, NetlistResult};
use indexmap::{IndexMap, IndexSet};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::builder::{build_composite, CompositeBuild};
use crate::errors;

/// File extension of composite descriptors.
pub const COMPOSITE_EXTENSION: &str = "toml";

/// A descriptor together with the file it was read from, if any.
#[derive(Debug, Clone)]
struct Entry {
    descriptor: CompositeDescriptor,
    path: Option<PathBuf>,
}

/// Parsed composite descriptors, keyed by module name.
#[derive(Debug, Clone, Default)]
pub struct DescriptorLibrary {
    boundary: BoundaryConfig,
    entries: IndexMap<String, Entry>,
}

impl DescriptorLibrary {
    /// Creates an empty library.
    pub fn new(boundary: BoundaryConfig) -> Self {
        Self {
            boundary,
            entries: IndexMap::new(),
        }
    }

    /// Parses every `*.toml` descriptor in `dir`, in file name order.
    ///
    /// A missing directory yields an empty library. Unreadable or malformed
    /// files, and two files defining the same module, fail with
    /// [`NetlistError::DescriptorLoadFailure`].
    pub fn scan(dir: &Path, boundary: &BoundaryConfig) -> NetlistResult<Self> {
        let mut library = Self::new(boundary.clone());
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "composite descriptor directory not found");
            return Ok(library);
        }
        for path in descriptor_files(dir, &[COMPOSITE_EXTENSION])? {
            let text = fs::read_to_string(&path).map_err(|e| errors::file_failure(&path, e))?;
            let descriptor = CompositeDescriptor::from_toml_str(&text)
                .map_err(|e| errors::file_failure(&path, e))?;
            library.insert(descriptor, Some(path))?;
        }
        tracing::debug!(
            dir = %dir.display(),
            descriptors = library.len(),
            "scanned composite descriptors"
        );
        Ok(library)
    }

    /// Builds a library from descriptors that are already parsed.
    pub fn from_descriptors(
        boundary: &BoundaryConfig,
        descriptors: impl IntoIterator<Item = CompositeDescriptor>,
    ) -> NetlistResult<Self> {
        let mut library = Self::new(boundary.clone());
        for descriptor in descriptors {
            library.insert(descriptor, None)?;
        }
        Ok(library)
    }

    fn insert(&mut self, descriptor: CompositeDescriptor, path: Option<PathBuf>) -> NetlistResult<()> {
        if let Some(existing) = self.entries.get(&descriptor.name) {
            let name = descriptor.name.as_str();
            return Err(match (&existing.path, &path) {
                (Some(first), Some(second)) => errors::duplicate_descriptor(name, first, second),
                _ => errors::descriptor_failure(name, "module is described more than once"),
            });
        }
        self.entries
            .insert(descriptor.name.clone(), Entry { descriptor, path });
        Ok(())
    }

    /// Returns `true` if the library describes `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the descriptor for `name`.
    pub fn get(&self, name: &str) -> Option<&CompositeDescriptor> {
        self.entries.get(name).map(|e| &e.descriptor)
    }

    /// Returns the file `name` was read from, if it came from disk.
    pub fn source_path(&self, name: &str) -> Option<&Path> {
        self.entries.get(name).and_then(|e| e.path.as_deref())
    }

    /// Iterates over described module names in scan order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of descriptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the library holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the composites that must be built to define `name`, submodules
    /// first and `name` last.
    ///
    /// Modules already in `registry` are treated as available and are not
    /// descended into. A module that is neither registered nor described
    /// fails with [`NetlistError::ModuleNotFound`]; a composite that
    /// contains itself fails with [`NetlistError::CyclicContainment`].
    pub fn dependency_order(
        &self,
        name: &str,
        registry: &ModuleRegistry,
    ) -> NetlistResult<Vec<String>> {
        if registry.module_exists(name) {
            return Ok(Vec::new());
        }
        if !self.contains(name) {
            return Err(NetlistError::ModuleNotFound(name.to_string()));
        }

        let mut closure: IndexSet<&str> = IndexSet::new();
        let mut pending = vec![name];
        while let Some(current) = pending.pop() {
            if !closure.insert(current) {
                continue;
            }
            for dep in self.missing_dependencies(current, registry)? {
                if !closure.contains(dep) {
                    pending.push(dep);
                }
            }
        }

        let mut deps: DiGraph<&str, ()> = DiGraph::new();
        let nodes: IndexMap<&str, _> = closure.iter().map(|&m| (m, deps.add_node(m))).collect();
        for (&module, &idx) in &nodes {
            for dep in self.missing_dependencies(module, registry)? {
                if dep == module {
                    return Err(NetlistError::CyclicContainment(vec![
                        module.to_string(),
                        module.to_string(),
                    ]));
                }
                if let Some(&dep_idx) = nodes.get(dep) {
                    deps.add_edge(dep_idx, idx, ());
                }
            }
        }

        match toposort(&deps, None) {
            Ok(order) => Ok(order.into_iter().map(|i| deps[i].to_string()).collect()),
            Err(cycle) => {
                let reported = deps[cycle.node_id()];
                let path = std::iter::once(reported)
                    .chain(closure.iter().copied())
                    .find_map(|m| self.cycle_from(m, registry))
                    .unwrap_or_else(|| vec![reported.to_string(), reported.to_string()]);
                Err(NetlistError::CyclicContainment(path))
            }
        }
    }

    /// Dependencies of a described module that the registry does not define yet.
    fn missing_dependencies<'s>(
        &'s self,
        name: &str,
        registry: &ModuleRegistry,
    ) -> NetlistResult<Vec<&'s str>> {
        let Some(entry) = self.entries.get(name) else {
            return Ok(Vec::new());
        };
        let mut missing = Vec::new();
        for dep in entry.descriptor.dependencies() {
            if registry.module_exists(dep) {
                continue;
            }
            if !self.contains(dep) {
                return Err(NetlistError::ModuleNotFound(dep.to_string()));
            }
            missing.push(dep);
        }
        Ok(missing)
    }

    /// Finds a containment path from `start` back to itself.
    fn cycle_from(&self, start: &str, registry: &ModuleRegistry) -> Option<Vec<String>> {
        let mut path = vec![start.to_string()];
        let mut seen = HashSet::new();
        self.path_back(start, start, registry, &mut path, &mut seen)
            .then_some(path)
    }

    fn path_back(
        &self,
        start: &str,
        current: &str,
        registry: &ModuleRegistry,
        path: &mut Vec<String>,
        seen: &mut HashSet<String>,
    ) -> bool {
        let deps = self
            .missing_dependencies(current, registry)
            .unwrap_or_default();
        for dep in deps {
            if dep == start {
                path.push(start.to_string());
                return true;
            }
            if seen.insert(dep.to_string()) {
                path.push(dep.to_string());
                if self.path_back(start, dep, registry, path, seen) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    /// Builds and registers `name` together with every composite it needs.
    ///
    /// Returns the names of the modules that were built, in build order.
    /// If a build fails, modules built before it stay registered.
    pub fn build(&self, name: &str, registry: &mut ModuleRegistry) -> NetlistResult<Vec<String>> {
        let order = self.dependency_order(name, registry)?;
        for module in &order {
            if let Some(entry) = self.entries.get(module) {
                self.build_one(&entry.descriptor, registry)?;
            }
        }
        Ok(order)
    }

    /// Builds every described module that is not registered yet.
    ///
    /// Returns how many modules were built.
    pub fn load_all(&self, registry: &mut ModuleRegistry) -> NetlistResult<usize> {
        let mut built = 0;
        for name in self.entries.keys() {
            if !registry.module_exists(name) {
                built += self.build(name, registry)?.len();
            }
        }
        tracing::debug!(built, "loaded composite library");
        Ok(built)
    }

    fn build_one(
        &self,
        descriptor: &CompositeDescriptor,
        registry: &mut ModuleRegistry,
    ) -> NetlistResult<()> {
        let mut graph = NetlistGraph::new();
        for inst in &descriptor.instances {
            graph.add_instance(registry, &inst.name, &inst.module)?;
        }
        for conn in &descriptor.connections {
            graph.add_connection(registry, &conn.source, &conn.dest, conn.ports.pairs())?;
        }
        tracing::debug!(module = %descriptor.name, "building composite from descriptor");
        build_composite(
            registry,
            &self.boundary,
            CompositeBuild {
                name: descriptor.name.clone(),
                input_ports: descriptor.inputs.clone(),
                output_ports: descriptor.outputs.clone(),
                graph,
                input_connections: descriptor.input_connections.clone(),
                output_connections: descriptor.output_connections.clone(),
                feed_through: descriptor.feed_through.clone(),
            },
        )
    }
}

impl ModuleLoader for DescriptorLibrary {
    fn load_module(
        &mut self,
        module_name: &str,
        registry: &mut ModuleRegistry,
    ) -> NetlistResult<bool> {
        if !self.contains(module_name) {
            return Ok(false);
        }
        let built = self.build(module_name, registry)?;
        tracing::debug!(module = module_name, built = built.len(), "lazily loaded composite");
        Ok(true)
    }
}

/// Lists files in `dir` with one of `extensions`, sorted by path.
pub(crate) fn descriptor_files(dir: &Path, extensions: &[&str]) -> NetlistResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| errors::file_failure(dir, e))? {
        let path = entry.map_err(|e| errors::file_failure(dir, e))?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
