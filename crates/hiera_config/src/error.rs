//! Failures while reading a project's `hiera.toml`.

use std::path::PathBuf;

/// Why a `hiera.toml` could not be turned into a [`crate::ProjectConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file is missing or unreadable.
    #[error("cannot read `{}`: {source}", path.display())]
    Unreadable {
        /// The file that was looked up.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// The file is not TOML of the expected shape.
    #[error("malformed hiera.toml: {0}")]
    Malformed(String),

    /// A field that has no default is empty.
    #[error("hiera.toml must set `{0}`")]
    MissingField(String),

    /// The `[boundary]` table names blocks or a separator that flattening cannot use.
    #[error("unusable `{field}`: {reason}")]
    InvalidBoundary {
        /// The offending key, e.g. `boundary.separator`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}
