//! Path resolution: anchoring the configured relative paths at a project directory.

use crate::types::ProjectConfig;
use std::path::{Path, PathBuf};

/// Configured paths joined onto the project directory.
///
/// Absolute paths in the configuration are kept as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Directory of leaf descriptor files.
    pub leaf_descriptors: PathBuf,
    /// Directory of composite descriptor files.
    pub composite_descriptors: PathBuf,
    /// Output path of the persisted module registry.
    pub registry: PathBuf,
}

/// Resolves every configured path relative to `project_dir`.
pub fn resolve_paths(config: &ProjectConfig, project_dir: &Path) -> ResolvedPaths {
    ResolvedPaths {
        leaf_descriptors: project_dir.join(&config.paths.leaf_descriptors),
        composite_descriptors: project_dir.join(&config.paths.composite_descriptors),
        registry: project_dir.join(&config.paths.registry),
    }
}
