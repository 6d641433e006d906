//! Token types for the leaf descriptor lexer.
//!
//! Defines the [`DescToken`] enum covering the keywords and punctuation that
//! can appear in a module header, plus the [`Token`] struct pairing a token
//! kind with its source [`Span`].

use serde::{Deserialize, Serialize};

/// A byte range in descriptor source text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the first character.
    pub start: u32,
    /// Byte offset one past the last character.
    pub end: u32,
}

impl Span {
    /// Creates a span covering `start..end`.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Returns a span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Returns the text this span covers.
    pub fn text(self, source: &str) -> &str {
        &source[self.start as usize..self.end as usize]
    }
}

/// A leaf descriptor token kind.
///
/// Keywords are case-sensitive. Literal values are not stored in the token;
/// they are read back from the source text through the token's span.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum DescToken {
    // === Keywords ===
    /// `module`
    Module,
    /// `endmodule`
    Endmodule,
    /// `input`
    Input,
    /// `output`
    Output,
    /// `wire`
    Wire,
    /// `logic`
    Logic,
    /// `reg`
    Reg,

    // === Literals and names ===
    /// A plain identifier.
    Identifier,
    /// An unsigned decimal integer.
    IntLiteral,

    // === Punctuation ===
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `;`
    Semicolon,

    /// End of input.
    Eof,
}

impl DescToken {
    /// Returns `true` for the port direction keywords.
    pub fn is_direction(self) -> bool {
        matches!(self, DescToken::Input | DescToken::Output)
    }

    /// Returns `true` for the net keywords accepted (and ignored) before a port type.
    pub fn is_net_type(self) -> bool {
        matches!(self, DescToken::Wire | DescToken::Logic | DescToken::Reg)
    }

    /// Returns a human-readable description for error messages.
    pub fn describe(self) -> &'static str {
        match self {
            DescToken::Module => "`module`",
            DescToken::Endmodule => "`endmodule`",
            DescToken::Input => "`input`",
            DescToken::Output => "`output`",
            DescToken::Wire => "`wire`",
            DescToken::Logic => "`logic`",
            DescToken::Reg => "`reg`",
            DescToken::Identifier => "identifier",
            DescToken::IntLiteral => "integer",
            DescToken::LeftParen => "`(`",
            DescToken::RightParen => "`)`",
            DescToken::LeftBracket => "`[`",
            DescToken::RightBracket => "`]`",
            DescToken::Colon => "`:`",
            DescToken::Comma => "`,`",
            DescToken::Semicolon => "`;`",
            DescToken::Eof => "end of file",
        }
    }
}

/// A token with its kind and source location.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Token {
    /// The token kind.
    pub kind: DescToken,
    /// The source span of this token.
    pub span: Span,
}

/// Looks up a keyword by its source text.
pub fn lookup_keyword(s: &str) -> Option<DescToken> {
    match s {
        "module" => Some(DescToken::Module),
        "endmodule" => Some(DescToken::Endmodule),
        "input" => Some(DescToken::Input),
        "output" => Some(DescToken::Output),
        "wire" => Some(DescToken::Wire),
        "logic" => Some(DescToken::Logic),
        "reg" => Some(DescToken::Reg),
        _ => None,
    }
}
