//! Recursive descent parser for KIF S-expressions.
//!
//! Consumes the token stream from the lexer and produces [`Term`]s. Quoted
//! strings become atoms holding the unescaped content.

use thiserror::Error;

use crate::base::LineIndex;
use crate::term::Term;

use super::lexer::{Lexer, Token, TokenKind};

/// A surface-syntax violation, with a 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at {line}:{column}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// Parse a source text into its sequence of top-level terms.
pub fn parse_kif(input: &str) -> Result<Vec<Term>, ParseError> {
    let tokens: Vec<_> = Lexer::new(input)
        .filter(|t| !t.kind.is_trivia())
        .collect();
    let mut parser = TermParser {
        tokens,
        pos: 0,
        line_index: LineIndex::new(input),
        input_len: input.len(),
    };
    parser.parse_all()
}

struct TermParser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    line_index: LineIndex,
    input_len: usize,
}

impl<'a> TermParser<'a> {
    fn parse_all(&mut self) -> Result<Vec<Term>, ParseError> {
        let mut terms = Vec::new();
        while self.peek().is_some() {
            terms.push(self.parse_term()?);
        }
        Ok(terms)
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        let pos = self.line_index.line_col(offset);
        ParseError {
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    fn parse_term(&mut self) -> Result<Term, ParseError> {
        let token = self
            .bump()
            .ok_or_else(|| self.error_at(self.input_len, "unexpected end of input"))?;
        match token.kind {
            TokenKind::LParen => self.parse_list(token.offset),
            TokenKind::RParen => Err(self.error_at(token.offset, "unmatched ')'")),
            TokenKind::String => {
                let value = unescape(token.text)
                    .map_err(|(i, msg)| self.error_at(token.offset + i, msg))?;
                Ok(Term::atom(value))
            }
            TokenKind::Variable => {
                let name = &token.text[1..];
                if name.is_empty() {
                    return Err(self.error_at(token.offset, "empty variable name after '?'"));
                }
                Ok(Term::var(name))
            }
            TokenKind::Atom => Ok(Term::atom(token.text)),
            TokenKind::Error => {
                if token.text.starts_with('"') {
                    Err(self.error_at(token.offset, "unterminated string literal"))
                } else {
                    Err(self.error_at(
                        token.offset,
                        format!("unexpected character {:?}", token.text),
                    ))
                }
            }
            TokenKind::Whitespace | TokenKind::Comment => unreachable!("trivia filtered"),
        }
    }

    fn parse_list(&mut self, open_offset: usize) -> Result<Term, ParseError> {
        let mut children = Vec::new();
        loop {
            match self.peek().map(|t| t.kind) {
                None => {
                    return Err(
                        self.error_at(open_offset, "unclosed '(': reached end of input")
                    );
                }
                Some(TokenKind::RParen) => {
                    self.bump();
                    return Ok(Term::list(children));
                }
                Some(_) => children.push(self.parse_term()?),
            }
        }
    }
}

/// Unescape the content of a quoted string token (quotes included).
/// On failure returns the byte index of the offending escape and a message.
fn unescape(text: &str) -> Result<String, (usize, String)> {
    let inner = &text[1..text.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.char_indices();
    while let Some((i, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        // The lexer only matches complete escape pairs.
        let (_, escaped) = chars.next().expect("escape pair");
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            other => {
                return Err((i + 1, format!("invalid escape sequence '\\{other}'")));
            }
        }
    }
    Ok(out)
}
