//! Leaf module registration from header descriptors.
//!
//! Leaf descriptors are Verilog-style module headers. Every header found in
//! the leaf directory becomes a leaf template in the module registry.

use std::fs;
use std::path::Path;

use hiera_ir::{ModuleInterface, ModuleRegistry, NetlistResult};

use crate::errors;
use crate::library::descriptor_files;

/// File extensions recognized as leaf descriptors.
pub const LEAF_EXTENSIONS: &[&str] = &["v", "sv", "desc"];

/// Parses one leaf descriptor text and registers every module it declares.
///
/// `source_name` identifies the text in errors, usually its file path.
/// Nothing is registered if any header fails to parse or register.
pub fn register_leaf_source(
    registry: &mut ModuleRegistry,
    source_name: &str,
    text: &str,
) -> NetlistResult<usize> {
    let interfaces = hiera_descriptor::parse_interfaces(text)
        .map_err(|e| errors::descriptor_failure(source_name, e))?;
    registry.register_leaves(interfaces)
}

/// Registers every leaf descriptor file in `dir`, in file name order.
///
/// All files are parsed before anything is registered, so a failure leaves
/// the registry unchanged. A missing directory registers nothing.
pub fn bootstrap_leaves(registry: &mut ModuleRegistry, dir: &Path) -> NetlistResult<usize> {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "leaf descriptor directory not found");
        return Ok(0);
    }
    let mut interfaces: Vec<ModuleInterface> = Vec::new();
    for path in descriptor_files(dir, LEAF_EXTENSIONS)? {
        let text = fs::read_to_string(&path).map_err(|e| errors::file_failure(&path, e))?;
        let parsed = hiera_descriptor::parse_interfaces(&text)
            .map_err(|e| errors::file_failure(&path, e))?;
        tracing::debug!(file = %path.display(), modules = parsed.len(), "parsed leaf descriptors");
        interfaces.extend(parsed);
    }
    let count = registry.register_leaves(interfaces)?;
    tracing::debug!(dir = %dir.display(), leaves = count, "bootstrapped leaf modules");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiera_ir::{NetlistError, PortDirection, PortType};

    const ARITH: &str = "
        module adder (input [7:0] a, input [7:0] b, output [7:0] c, output [9:0] d);
        endmodule
        module multiplier (input [7:0] a, input [7:0] b, input [9:0] ac, output [7:0] product);
        endmodule
    ";

    #[test]
    fn registers_every_header() {
        let mut reg = ModuleRegistry::new();
        assert_eq!(register_leaf_source(&mut reg, "arith.v", ARITH).unwrap(), 2);
        assert!(reg.get("adder").unwrap().is_leaf());
        assert_eq!(
            reg.port_type("multiplier", "ac", PortDirection::Input),
            Some(&PortType::Width(10))
        );
    }

    #[test]
    fn parse_failure_names_source() {
        let mut reg = ModuleRegistry::new();
        let err = register_leaf_source(&mut reg, "broken.v", "module (").unwrap_err();
        match err {
            NetlistError::DescriptorLoadFailure { source_name, .. } => {
                assert_eq!(source_name, "broken.v")
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn scans_directory_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("arith.v"), ARITH).unwrap();
        fs::write(
            dir.path().join("buffer.desc"),
            "module buffer (input i, output o);",
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "# leaves").unwrap();
        let mut reg = ModuleRegistry::new();
        assert_eq!(bootstrap_leaves(&mut reg, dir.path()).unwrap(), 3);
        assert_eq!(reg.names().collect::<Vec<_>>(), ["adder", "multiplier", "buffer"]);
    }

    #[test]
    fn bad_file_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.v"), ARITH).unwrap();
        fs::write(dir.path().join("b.v"), "module bad (input [3:1] x);").unwrap();
        let mut reg = ModuleRegistry::new();
        let err = bootstrap_leaves(&mut reg, dir.path()).unwrap_err();
        assert!(err.to_string().contains("b.v"));
        assert!(reg.is_empty());
    }

    #[test]
    fn duplicate_leaf_across_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.v"), ARITH).unwrap();
        fs::write(dir.path().join("b.v"), "module adder (input a, output b);").unwrap();
        let mut reg = ModuleRegistry::new();
        assert!(matches!(
            bootstrap_leaves(&mut reg, dir.path()),
            Err(NetlistError::DuplicateModule(ref m)) if m == "adder"
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn missing_directory_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = ModuleRegistry::new();
        assert_eq!(bootstrap_leaves(&mut reg, &dir.path().join("none")).unwrap(), 0);
    }
}
