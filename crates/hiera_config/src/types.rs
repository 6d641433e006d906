//! Configuration types deserialized from `hiera.toml`.

use serde::Deserialize;

/// Default instance name of a composite's input boundary block.
pub const DEFAULT_INPUT_BLOCK_NAME: &str = "input_block";
/// Default instance name of a composite's output boundary block.
pub const DEFAULT_OUTPUT_BLOCK_NAME: &str = "output_block";
/// Default separator joining an instance path to an inlined instance name.
pub const DEFAULT_SEPARATOR: &str = ".";

/// The top-level project configuration parsed from `hiera.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata (name, top module).
    pub project: ProjectMeta,
    /// Names reserved for boundary instances and the hierarchy separator.
    #[serde(default)]
    pub boundary: BoundaryConfig,
    /// Descriptor and output locations, relative to the project directory.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Core project metadata required in every `hiera.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string.
    #[serde(default)]
    pub version: String,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
    /// Name of the top-level composite module.
    pub top: String,
}

/// Reserved names used when building and flattening composite modules.
///
/// The two block names identify the boundary instances inside every
/// composite's internal graph. The separator joins a parent instance name to
/// the names of the instances it inlines during flattening.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    /// Instance name of the input boundary block.
    pub input_block_name: String,
    /// Instance name of the output boundary block.
    pub output_block_name: String,
    /// Hierarchy separator for inlined instance names.
    pub separator: String,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            input_block_name: DEFAULT_INPUT_BLOCK_NAME.to_string(),
            output_block_name: DEFAULT_OUTPUT_BLOCK_NAME.to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl BoundaryConfig {
    /// Returns `true` if `instance_name` is one of the two reserved block names.
    pub fn is_block_name(&self, instance_name: &str) -> bool {
        instance_name == self.input_block_name || instance_name == self.output_block_name
    }

    /// Joins a parent instance name and a child instance name with the separator.
    pub fn join(&self, parent: &str, child: &str) -> String {
        format!("{parent}{}{child}", self.separator)
    }
}

/// Filesystem locations of descriptor directories and generated artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory of leaf (basic block) descriptor files.
    pub leaf_descriptors: String,
    /// Directory of composite module descriptor files.
    pub composite_descriptors: String,
    /// Path the persisted module registry is written to.
    pub registry: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            leaf_descriptors: "hardware_modules/basic_blocks".to_string(),
            composite_descriptors: "hardware_modules/non_basic_blocks".to_string(),
            registry: "generated_files/hardware_library.json".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_defaults() {
        let b = BoundaryConfig::default();
        assert_eq!(b.input_block_name, "input_block");
        assert_eq!(b.output_block_name, "output_block");
        assert_eq!(b.separator, ".");
    }

    #[test]
    fn block_name_detection() {
        let b = BoundaryConfig::default();
        assert!(b.is_block_name("input_block"));
        assert!(b.is_block_name("output_block"));
        assert!(!b.is_block_name("adder_0"));
    }

    #[test]
    fn join_uses_separator() {
        let b = BoundaryConfig {
            separator: "/".to_string(),
            ..BoundaryConfig::default()
        };
        assert_eq!(b.join("doubler_0", "adder_0"), "doubler_0/adder_0");
    }

    #[test]
    fn partial_boundary_table_keeps_defaults() {
        let b: BoundaryConfig = toml::from_str(r#"separator = "__""#).unwrap();
        assert_eq!(b.separator, "__");
        assert_eq!(b.input_block_name, "input_block");
    }
}
