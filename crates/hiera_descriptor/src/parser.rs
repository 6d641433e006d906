//! Recursive descent parser for leaf descriptor module headers.
//!
//! Grammar:
//!
//! ```text
//! file      := header*
//! header    := 'module' IDENT '(' [ port { ',' port } ] ')' ';' [ 'endmodule' ]
//! port      := direction [ net ] [ range | IDENT ] IDENT
//! direction := 'input' | 'output'
//! net       := 'wire' | 'logic' | 'reg'
//! range     := '[' INT ':' '0' ']'
//! ```
//!
//! A direction may be omitted after the first port; it is then inherited from
//! the previous declaration. The first syntax error aborts parsing.

use crate::ast::{LeafDescriptor, PortDecl};
use crate::error::DescriptorError;
use crate::token::{DescToken, Span, Token};
use hiera_ir::{PortDirection, PortType};

/// A recursive descent parser over a token stream produced by the lexer.
pub struct LeafParser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'src str,
}

impl<'src> LeafParser<'src> {
    /// Creates a parser from tokens lexed from `source`.
    pub fn new(tokens: Vec<Token>, source: &'src str) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
        }
    }

    // ========================================================================
    // Primitive operations
    // ========================================================================

    fn current(&self) -> DescToken {
        self.tokens.get(self.pos).map_or(DescToken::Eof, |t| t.kind)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(Span::default(), |t| t.span)
    }

    fn current_text(&self) -> &'src str {
        self.current_span().text(self.source)
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn at(&self, kind: DescToken) -> bool {
        self.current() == kind
    }

    fn at_eof(&self) -> bool {
        self.at(DescToken::Eof)
    }

    fn advance(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: DescToken) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, msg: impl Into<String>) -> DescriptorError {
        DescriptorError::at(self.source, self.current_span(), false, msg)
    }

    fn expected(&self, what: &str) -> DescriptorError {
        self.error(format!(
            "expected {what}, found {}",
            self.current().describe()
        ))
    }

    fn expect(&mut self, kind: DescToken) -> Result<(), DescriptorError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.expected(kind.describe()))
        }
    }

    fn expect_ident(&mut self) -> Result<String, DescriptorError> {
        if self.at(DescToken::Identifier) {
            let text = self.current_text().to_string();
            self.advance();
            Ok(text)
        } else {
            Err(self.expected("identifier"))
        }
    }

    fn expect_int(&mut self) -> Result<u32, DescriptorError> {
        if !self.at(DescToken::IntLiteral) {
            return Err(self.expected("integer"));
        }
        let digits: String = self.current_text().chars().filter(|&c| c != '_').collect();
        let value = digits
            .parse::<u32>()
            .map_err(|_| self.error(format!("integer `{digits}` is out of range")))?;
        self.advance();
        Ok(value)
    }

    // ========================================================================
    // Top-level parsing
    // ========================================================================

    /// Parses every module header in the file.
    pub fn parse_file(&mut self) -> Result<Vec<LeafDescriptor>, DescriptorError> {
        let mut leaves = Vec::new();
        while !self.at_eof() {
            if !self.at(DescToken::Module) {
                return Err(self.expected("`module`"));
            }
            leaves.push(self.parse_header()?);
        }
        Ok(leaves)
    }

    fn parse_header(&mut self) -> Result<LeafDescriptor, DescriptorError> {
        let start = self.current_span();
        self.expect(DescToken::Module)?;
        let name = self.expect_ident()?;

        self.expect(DescToken::LeftParen)?;
        let mut ports = Vec::new();
        if !self.at(DescToken::RightParen) {
            let mut direction = None;
            loop {
                let port = self.parse_port(direction)?;
                direction = Some(port.direction);
                ports.push(port);
                if !self.eat(DescToken::Comma) {
                    break;
                }
            }
        }
        self.expect(DescToken::RightParen)?;
        self.expect(DescToken::Semicolon)?;
        self.eat(DescToken::Endmodule);

        Ok(LeafDescriptor {
            name,
            ports,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_port(
        &mut self,
        inherited: Option<PortDirection>,
    ) -> Result<PortDecl, DescriptorError> {
        let start = self.current_span();
        let direction = match self.current() {
            DescToken::Input => {
                self.advance();
                PortDirection::Input
            }
            DescToken::Output => {
                self.advance();
                PortDirection::Output
            }
            _ => inherited.ok_or_else(|| self.expected("`input` or `output`"))?,
        };

        if self.current().is_net_type() {
            self.advance();
        }

        let ty = if self.at(DescToken::LeftBracket) {
            PortType::Width(self.parse_range()?)
        } else if self.at(DescToken::Identifier) && self.peek_is(DescToken::Identifier) {
            PortType::named(self.expect_ident()?)
        } else {
            PortType::Width(1)
        };

        let name = self.expect_ident()?;
        Ok(PortDecl {
            direction,
            ty,
            name,
            span: start.merge(self.prev_span()),
        })
    }

    /// Parses `[high:0]` and returns the width `high + 1`.
    fn parse_range(&mut self) -> Result<u32, DescriptorError> {
        self.expect(DescToken::LeftBracket)?;
        let high = self.expect_int()?;
        self.expect(DescToken::Colon)?;
        let low_span = self.current_span();
        let low = self.expect_int()?;
        if low != 0 {
            return Err(DescriptorError::at(
                self.source,
                low_span,
                false,
                format!("port ranges must end at bit 0, found `{low}`"),
            ));
        }
        self.expect(DescToken::RightBracket)?;
        high.checked_add(1)
            .ok_or_else(|| self.error("port width is out of range"))
    }

    fn peek_is(&self, kind: DescToken) -> bool {
        self.tokens
            .get(self.pos + 1)
            .is_some_and(|t| t.kind == kind)
    }
}
