//! Error types for descriptor lexing, parsing, and validation.

use crate::token::Span;

/// Errors that can occur while reading leaf or composite descriptors.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// An unexpected character or an unterminated comment.
    #[error("{line}:{column}: {message}")]
    Lex {
        /// 1-based line of the offending input.
        line: usize,
        /// 1-based column of the offending input.
        column: usize,
        /// What went wrong.
        message: String,
    },

    /// The token stream does not match the module header grammar.
    #[error("{line}:{column}: {message}")]
    Syntax {
        /// 1-based line of the offending token.
        line: usize,
        /// 1-based column of the offending token.
        column: usize,
        /// What was expected and what was found.
        message: String,
    },

    /// A descriptor is syntactically valid but semantically wrong
    /// (duplicate port, bad range, duplicate instance name, ...).
    #[error("invalid descriptor `{name}`: {reason}")]
    Invalid {
        /// The module the descriptor defines.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A composite descriptor is not valid TOML for the expected shape.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

impl DescriptorError {
    /// Builds a positioned error kind from a byte span.
    pub(crate) fn at(source: &str, span: Span, lex: bool, message: impl Into<String>) -> Self {
        let (line, column) = line_col(source, span.start as usize);
        let message = message.into();
        if lex {
            DescriptorError::Lex { line, column, message }
        } else {
            DescriptorError::Syntax { line, column, message }
        }
    }
}

/// Converts a byte offset into a 1-based line and column.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|p| p + 1)
        .unwrap_or(0);
    (line, offset - line_start + 1)
}
