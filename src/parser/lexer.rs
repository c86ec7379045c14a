//! Logos-based lexer for the KIF surface syntax.

use logos::Logos;

/// A token with its kind, text, and byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub offset: usize,
}

/// Lexer wrapping the logos-generated tokenizer.
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, LogosToken>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            inner: LogosToken::lexer(input),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let logos_token = self.inner.next()?;
        let text = self.inner.slice();
        let offset = self.inner.span().start;

        let kind = match logos_token {
            Ok(t) => t.into(),
            Err(()) => TokenKind::Error,
        };

        Some(Token { kind, text, offset })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    Comment,
    LParen,
    RParen,
    String,
    Variable,
    Atom,
    Error,
}

impl TokenKind {
    /// Trivia is skipped by the parser.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }
}

/// Logos token enum - maps to TokenKind.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogosToken {
    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    #[regex(r";[^\n]*")]
    Comment,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[regex(r#""([^"\\]|\\.)*""#)]
    String,

    // The name may be empty here; the parser rejects it with a position.
    #[regex(r"\?[A-Za-z0-9_\-+*/.<>=:]*")]
    Variable,

    #[regex(r"[A-Za-z0-9_\-+*/.<>=:]+")]
    Atom,
}

impl From<LogosToken> for TokenKind {
    fn from(t: LogosToken) -> Self {
        match t {
            LogosToken::Whitespace => TokenKind::Whitespace,
            LogosToken::Comment => TokenKind::Comment,
            LogosToken::LParen => TokenKind::LParen,
            LogosToken::RParen => TokenKind::RParen,
            LogosToken::String => TokenKind::String,
            LogosToken::Variable => TokenKind::Variable,
            LogosToken::Atom => TokenKind::Atom,
        }
    }
}
