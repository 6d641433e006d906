//! Lexical analyzer for leaf descriptor text.
//!
//! Converts a module header into a sequence of [`Token`]s. Whitespace, line
//! comments, and block comments are skipped. The first unexpected character
//! aborts lexing with a positioned [`DescriptorError::Lex`].

use crate::error::DescriptorError;
use crate::token::{lookup_keyword, DescToken, Span, Token};
use hiera_ir::{is_identifier_char, is_identifier_start};

/// Lexes descriptor source text into a vector of tokens.
///
/// The returned vector always ends with a [`DescToken::Eof`] token.
pub fn lex(source: &str) -> Result<Vec<Token>, DescriptorError> {
    let mut lexer = Lexer {
        text: source,
        source: source.as_bytes(),
        pos: 0,
    };
    lexer.lex_all()
}

struct Lexer<'a> {
    text: &'a str,
    source: &'a [u8],
    pos: usize,
}

impl Lexer<'_> {
    fn lex_all(&mut self) -> Result<Vec<Token>, DescriptorError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments()?;
            if self.pos >= self.source.len() {
                tokens.push(Token {
                    kind: DescToken::Eof,
                    span: Span::new(self.pos as u32, self.pos as u32),
                });
                break;
            }
            tokens.push(self.next_token()?);
        }
        Ok(tokens)
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }

    fn error(&self, msg: impl Into<String>, span: Span) -> DescriptorError {
        DescriptorError::at(self.text, span, true, msg)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), DescriptorError> {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos >= self.source.len() {
                return Ok(());
            }
            // Line comment: //
            if self.peek() == b'/' && self.peek_at(1) == b'/' {
                self.pos += 2;
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            // Block comment: /* ... */ (non-nesting)
            if self.peek() == b'/' && self.peek_at(1) == b'*' {
                let start = self.pos;
                self.pos += 2;
                loop {
                    if self.pos >= self.source.len() {
                        return Err(self.error("unterminated block comment", self.span_from(start)));
                    }
                    if self.source[self.pos] == b'*' && self.peek_at(1) == b'/' {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            return Ok(());
        }
    }

    fn next_token(&mut self) -> Result<Token, DescriptorError> {
        let start = self.pos;
        let b = self.peek();

        if is_ident_start(b) {
            while self.pos < self.source.len() && is_ident_char(self.source[self.pos]) {
                self.pos += 1;
            }
            let span = self.span_from(start);
            let kind = lookup_keyword(span.text(self.text)).unwrap_or(DescToken::Identifier);
            return Ok(Token { kind, span });
        }

        if b.is_ascii_digit() {
            while self.pos < self.source.len()
                && (self.source[self.pos].is_ascii_digit() || self.source[self.pos] == b'_')
            {
                self.pos += 1;
            }
            return Ok(Token {
                kind: DescToken::IntLiteral,
                span: self.span_from(start),
            });
        }

        let kind = match b {
            b'(' => DescToken::LeftParen,
            b')' => DescToken::RightParen,
            b'[' => DescToken::LeftBracket,
            b']' => DescToken::RightBracket,
            b':' => DescToken::Colon,
            b',' => DescToken::Comma,
            b';' => DescToken::Semicolon,
            _ => {
                let ch = self.text[start..].chars().next().unwrap_or('\0');
                self.pos += ch.len_utf8().max(1);
                return Err(self.error(
                    format!("unexpected character '{ch}'"),
                    self.span_from(start),
                ));
            }
        };
        self.pos += 1;
        Ok(Token {
            kind,
            span: self.span_from(start),
        })
    }
}

fn is_ident_start(b: u8) -> bool {
    is_identifier_start(char::from(b))
}

fn is_ident_char(b: u8) -> bool {
    is_identifier_char(char::from(b))
}
