//! Readers for hiera module descriptors.
//!
//! Leaf (basic) modules are described by a Verilog-style module header; the
//! crate parses those into [`LeafDescriptor`]s and converts them into
//! [`ModuleInterface`](hiera_ir::ModuleInterface)s ready for registration.
//! Composite modules are described by a declarative TOML document parsed
//! into a [`CompositeDescriptor`].
//!
//! # Architecture
//!
//! - **Lexer** ([`lexer`]): Converts header text to tokens, skipping line and
//!   block comments.
//! - **Parser** ([`parser`]): Recursive descent over the token stream; the
//!   first error aborts with its line and column.
//! - **AST** ([`ast`]): Parsed headers with spans.
//! - **Composite** ([`composite`]): TOML composite descriptors.

#![warn(missing_docs)]

pub mod ast;
pub mod composite;
pub mod error;
/// Lexical analyzer for leaf descriptor text.
pub mod lexer;
/// Recursive descent parser for module headers.
pub mod parser;
/// Token types for the leaf descriptor lexer.
pub mod token;

pub use ast::{LeafDescriptor, PortDecl};
pub use composite::{CompositeDescriptor, ConnectionDecl, InstanceDecl, PortBindings};
pub use error::DescriptorError;
pub use token::{DescToken, Span, Token};

use hiera_ir::ModuleInterface;

/// Parses every module header in a leaf descriptor file.
pub fn parse_leaves(source: &str) -> Result<Vec<LeafDescriptor>, DescriptorError> {
    let tokens = lexer::lex(source)?;
    parser::LeafParser::new(tokens, source).parse_file()
}

/// Parses a leaf descriptor file straight into module interfaces.
pub fn parse_interfaces(source: &str) -> Result<Vec<ModuleInterface>, DescriptorError> {
    parse_leaves(source)?
        .iter()
        .map(LeafDescriptor::to_interface)
        .collect()
}
