//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{BoundaryConfig, ProjectConfig};
use hiera_ir::{is_identifier, is_identifier_char};
use std::path::Path;

/// File name of the project configuration inside a project directory.
pub const CONFIG_FILE_NAME: &str = "hiera.toml";

/// Loads and validates a `hiera.toml` configuration from a project directory.
///
/// Reads `<project_dir>/hiera.toml`, parses it, and validates required fields.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&config_path).map_err(|source| {
        ConfigError::Unreadable {
            path: config_path.clone(),
            source,
        }
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a `hiera.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::Malformed(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and configuration values are consistent.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.top.is_empty() {
        return Err(ConfigError::MissingField("project.top".to_string()));
    }
    validate_boundary(&config.boundary)
}

fn validate_boundary(boundary: &BoundaryConfig) -> Result<(), ConfigError> {
    for (field, value) in [
        ("boundary.input_block_name", &boundary.input_block_name),
        ("boundary.output_block_name", &boundary.output_block_name),
    ] {
        if !is_identifier(value) {
            return Err(ConfigError::InvalidBoundary {
                field: field.to_string(),
                reason: format!("`{value}` is not an identifier"),
            });
        }
    }
    if boundary.input_block_name == boundary.output_block_name {
        return Err(ConfigError::InvalidBoundary {
            field: "boundary.output_block_name".to_string(),
            reason: "must differ from boundary.input_block_name".to_string(),
        });
    }
    // Identifier characters in the separator would let two inlined names collide.
    if boundary.separator.is_empty()
        || boundary
            .separator
            .chars()
            .all(is_identifier_char)
    {
        return Err(ConfigError::InvalidBoundary {
            field: "boundary.separator".to_string(),
            reason: format!(
                "`{}` must contain a non-identifier character",
                boundary.separator
            ),
        });
    }
    Ok(())
}
