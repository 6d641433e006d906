//! Error helpers for elaboration.
//!
//! Descriptor problems surface as [`NetlistError::DescriptorLoadFailure`]
//! naming the file or module they came from. Project-level operations that
//! also read configuration return [`ElaborateError`].

use hiera_config::ConfigError;
use hiera_ir::NetlistError;
use std::fmt::Display;
use std::path::Path;

/// Errors from opening and driving a project session.
#[derive(Debug, thiserror::Error)]
pub enum ElaborateError {
    /// The project configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A registry, graph, or descriptor operation failed.
    #[error(transparent)]
    Netlist(#[from] NetlistError),
}

/// Result alias for project-level operations.
pub type ElaborateResult<T> = Result<T, ElaborateError>;

/// Creates a load failure for a descriptor identified by name.
pub fn descriptor_failure(source_name: &str, reason: impl Display) -> NetlistError {
    NetlistError::DescriptorLoadFailure {
        source_name: source_name.to_string(),
        reason: reason.to_string(),
    }
}

/// Creates a load failure for a descriptor file.
pub fn file_failure(path: &Path, reason: impl Display) -> NetlistError {
    descriptor_failure(&path.display().to_string(), reason)
}

/// Creates a load failure for a module defined by two descriptors.
pub fn duplicate_descriptor(name: &str, first: &Path, second: &Path) -> NetlistError {
    file_failure(
        second,
        format!(
            "module `{name}` is already defined in {}",
            first.display()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_failure_names_path() {
        let err = file_failure(Path::new("blocks/adder.v"), "1:3: expected identifier");
        assert_eq!(
            err.to_string(),
            "failed to load descriptor `blocks/adder.v`: 1:3: expected identifier"
        );
    }

    #[test]
    fn duplicate_descriptor_mentions_both_files() {
        let err = duplicate_descriptor("doubler", Path::new("a.toml"), Path::new("b.toml"));
        let msg = err.to_string();
        assert!(msg.contains("b.toml"));
        assert!(msg.contains("already defined in a.toml"));
    }

    #[test]
    fn elaborate_error_is_transparent() {
        let err: ElaborateError = NetlistError::ModuleNotFound("top".into()).into();
        assert_eq!(err.to_string(), "module `top` not found");
        let err: ElaborateError = ConfigError::MissingField("project.top".into()).into();
        assert!(err.to_string().contains("project.top"));
    }
}
