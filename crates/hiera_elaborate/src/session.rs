//! Project sessions.
//!
//! A [`Session`] ties a project directory to its configuration, its module
//! registry, and its composite descriptor library. Opening a session
//! registers every leaf descriptor; composites are built lazily the first
//! time something needs them.

use std::path::{Path, PathBuf};

use hiera_config::{load_config, resolve_paths, ProjectConfig, ResolvedPaths};
use hiera_ir::{is_identifier, ModuleLoader, ModuleRegistry, NetlistError, NetlistGraph};

use crate::bootstrap::bootstrap_leaves;
use crate::errors::ElaborateResult;
use crate::flatten::{flatten_graph, flatten_module};
use crate::library::DescriptorLibrary;

/// An opened project.
pub struct Session {
    config: ProjectConfig,
    paths: ResolvedPaths,
    registry: ModuleRegistry,
    library: DescriptorLibrary,
}

impl Session {
    /// Opens the project in `project_dir`.
    ///
    /// Loads `hiera.toml`, registers the leaf descriptors, and scans the
    /// composite descriptors.
    pub fn open(project_dir: &Path) -> ElaborateResult<Self> {
        let config = load_config(project_dir)?;
        Self::with_config(config, project_dir)
    }

    /// Opens a project with an already loaded configuration.
    ///
    /// Paths in `config` are resolved against `project_dir`.
    pub fn with_config(config: ProjectConfig, project_dir: &Path) -> ElaborateResult<Self> {
        let paths = resolve_paths(&config, project_dir);
        let mut registry = ModuleRegistry::new();
        let leaves = bootstrap_leaves(&mut registry, &paths.leaf_descriptors)?;
        let library = DescriptorLibrary::scan(&paths.composite_descriptors, &config.boundary)?;
        tracing::debug!(
            project = %config.project.name,
            leaves,
            composites = library.len(),
            "opened project"
        );
        Ok(Self {
            config,
            paths,
            registry,
            library,
        })
    }

    /// Returns the project configuration.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Returns the resolved project paths.
    pub fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    /// Returns the module registry.
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Returns the module registry for direct edits.
    pub fn registry_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.registry
    }

    /// Returns the composite descriptor library.
    pub fn library(&self) -> &DescriptorLibrary {
        &self.library
    }

    /// Makes sure `module` is registered, building it from its descriptor
    /// if needed.
    pub fn ensure_module(&mut self, module: &str) -> ElaborateResult<()> {
        if self.registry.module_exists(module) {
            return Ok(());
        }
        if !self.library.load_module(module, &mut self.registry)? {
            return Err(NetlistError::ModuleNotFound(module.to_string()).into());
        }
        Ok(())
    }

    /// Adds an instance of `module` to `graph`, loading the module on demand.
    ///
    /// Instance names must be identifiers so that flattened names stay unique.
    pub fn instantiate(
        &mut self,
        graph: &mut NetlistGraph,
        instance: &str,
        module: &str,
    ) -> ElaborateResult<()> {
        if !is_identifier(instance) {
            return Err(NetlistError::InvalidInstanceName(instance.to_string()).into());
        }
        graph.add_instance_with(&mut self.registry, &mut self.library, instance, module)?;
        Ok(())
    }

    /// Connects `source` to `dest` in `graph`, checked against this session's registry.
    pub fn connect(
        &self,
        graph: &mut NetlistGraph,
        source: &str,
        dest: &str,
        port_pairs: &[(&str, &str)],
    ) -> ElaborateResult<()> {
        graph.add_connection(&self.registry, source, dest, port_pairs.iter().copied())?;
        Ok(())
    }

    /// Builds every composite descriptor that is not registered yet.
    pub fn load_all(&mut self) -> ElaborateResult<usize> {
        Ok(self.library.load_all(&mut self.registry)?)
    }

    /// Flattens a composite module, loading it on demand.
    pub fn flatten(&mut self, module: &str) -> ElaborateResult<NetlistGraph> {
        self.ensure_module(module)?;
        Ok(flatten_module(&self.registry, &self.config.boundary, module)?)
    }

    /// Flattens the configured top module.
    pub fn flatten_top(&mut self) -> ElaborateResult<NetlistGraph> {
        let top = self.config.project.top.clone();
        self.flatten(&top)
    }

    /// Flattens a user-built graph against this session's registry.
    pub fn flatten_graph(&self, graph: &NetlistGraph) -> ElaborateResult<NetlistGraph> {
        Ok(flatten_graph(&self.registry, &self.config.boundary, graph)?)
    }

    /// Writes the registry to the configured path and returns that path.
    pub fn save_registry(&self) -> ElaborateResult<PathBuf> {
        self.registry.save(&self.paths.registry)?;
        tracing::debug!(path = %self.paths.registry.display(), "saved module registry");
        Ok(self.paths.registry.clone())
    }
}
