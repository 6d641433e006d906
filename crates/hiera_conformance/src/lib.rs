//! End-to-end test helpers for the hiera netlist compiler.
//!
//! Provides the shared leaf and composite descriptors used across the
//! integration tests, on-disk project fixtures, and a few helpers that
//! reduce a graph to plain sets for assertions.

#![warn(missing_docs)]

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use hiera_config::{load_config_from_str, ProjectConfig};
use hiera_elaborate::{register_leaf_source, ElaborateResult, Session};
use hiera_ir::{ModuleRegistry, NetlistGraph};
use tempfile::TempDir;

/// Arithmetic leaves: `adder` (with a 10-bit side output), `multiplier`,
/// and an 8-bit `buffer` used as stimulus and sink.
pub const ARITH_LEAVES: &str = "
// arithmetic blocks
module adder (
    input  [7:0] a,
    input  [7:0] b,
    output [7:0] c,
    output [9:0] d
);
endmodule

module multiplier (
    input  wire [7:0] a,
    input  wire [7:0] b,
    input  wire [9:0] ac,
    output wire [7:0] product
);
endmodule

/* stimulus and sink */
module buffer (input [7:0] i, output [7:0] o);
endmodule
";

/// `doubler(x, y) = (x + y) * y`: an adder feeding a multiplier.
pub const DOUBLER: &str = r#"
name = "doubler"
description = "adder feeding a multiplier"

[inputs]
x = 8
y = 8

[outputs]
out = 8

[[instances]]
name = "adder_0"
module = "adder"

[[instances]]
name = "multiplier_0"
module = "multiplier"

[[connections]]
source = "adder_0"
dest = "multiplier_0"
ports = { c = "a" }

[input_connections]
x = [["adder_0", "a"]]
y = [["adder_0", "b"], ["multiplier_0", "b"]]

[output_connections]
out = ["multiplier_0", "product"]
"#;

/// Two doublers in series.
pub const QUAD: &str = r#"
name = "quad"

[inputs]
x = 8
y = 8

[outputs]
out = 8

[[instances]]
name = "first"
module = "doubler"

[[instances]]
name = "second"
module = "doubler"

[[connections]]
source = "first"
dest = "second"
ports = { out = "x" }

[input_connections]
x = [["first", "x"]]
y = [["first", "y"], ["second", "y"]]

[output_connections]
out = ["second", "out"]
"#;

/// A composite whose input `i` is wired straight to its output `o`, with a
/// buffer on the side channel.
pub const PASS: &str = r#"
name = "pass"

[inputs]
i = 8
side_in = 8

[outputs]
o = 8
side_out = 8

[[instances]]
name = "buf"
module = "buffer"

[input_connections]
side_in = [["buf", "i"]]

[output_connections]
side_out = ["buf", "o"]

[feed_through]
i = "o"
"#;

/// The default project configuration with the given top module.
pub fn make_config(top: &str) -> ProjectConfig {
    load_config_from_str(&format!(
        "[project]\nname = \"conformance\"\ntop = \"{top}\"\n"
    ))
    .expect("fixture config should be valid")
}

/// A registry holding the [`ARITH_LEAVES`].
pub fn arith_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    register_leaf_source(&mut registry, "arith.v", ARITH_LEAVES)
        .expect("fixture leaves should register");
    registry
}

/// A project laid out on disk in a temporary directory.
///
/// Uses the default descriptor locations from `hiera.toml`.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    /// Creates a project whose top module is `top`.
    pub fn new(top: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("hiera.toml"),
            format!("[project]\nname = \"conformance\"\ntop = \"{top}\"\n"),
        )
        .expect("write hiera.toml");
        Self { dir }
    }

    /// Returns the project directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a leaf descriptor file.
    pub fn leaf(&self, file_name: &str, text: &str) -> &Self {
        self.write("hardware_modules/basic_blocks", file_name, text)
    }

    /// Writes a composite descriptor file.
    pub fn composite(&self, file_name: &str, text: &str) -> &Self {
        self.write("hardware_modules/non_basic_blocks", file_name, text)
    }

    fn write(&self, sub_dir: &str, file_name: &str, text: &str) -> &Self {
        let dir = self.dir.path().join(sub_dir);
        fs::create_dir_all(&dir).expect("create descriptor dir");
        fs::write(dir.join(file_name), text).expect("write descriptor");
        self
    }

    /// Opens the project.
    pub fn open(&self) -> ElaborateResult<Session> {
        Session::open(self.dir.path())
    }
}

/// A wire between two instance ports: `(source, source_port, dest, dest_port)`.
pub type Wire = (String, String, String, String);

/// Every wired port pair of `graph`.
pub fn wires(graph: &NetlistGraph) -> BTreeSet<Wire> {
    graph
        .connections()
        .flat_map(|conn| {
            conn.connection.pairs().iter().map(move |p| {
                (
                    conn.source.to_string(),
                    p.source_port.clone(),
                    conn.dest.to_string(),
                    p.dest_port.clone(),
                )
            })
        })
        .collect()
}

/// Builds a [`Wire`] from string slices.
pub fn wire(source: &str, source_port: &str, dest: &str, dest_port: &str) -> Wire {
    (
        source.to_string(),
        source_port.to_string(),
        dest.to_string(),
        dest_port.to_string(),
    )
}

/// Names of every instance in `graph`, sorted.
pub fn instance_names(graph: &NetlistGraph) -> BTreeSet<String> {
    graph.instances().map(|i| i.name.clone()).collect()
}

/// Checks that no input port of `graph` has more than one driver.
pub fn single_driver_holds(graph: &NetlistGraph) -> bool {
    let mut driven = BTreeSet::new();
    wires(graph)
        .into_iter()
        .all(|(_, _, dest, dest_port)| driven.insert((dest, dest_port)))
}
