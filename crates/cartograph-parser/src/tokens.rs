//! Token definitions produced by the [`lexer`](super::lexer).

use std::fmt;

use crate::span::Span;

/// A lexical token.
///
/// Literal variants carry their decoded value; the raw text is kept on
/// [`PositionedToken::lexeme`].
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    // Keywords (matched case-insensitively)
    Thing,
    Actor,
    Fixture,
    True,
    False,

    Identifier(&'a str),
    StringLiteral(String),
    NumberLiteral(f64),

    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Equals,

    /// End of input; always the last token.
    Eof,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Thing => write!(f, "thing"),
            Token::Actor => write!(f, "actor"),
            Token::Fixture => write!(f, "fixture"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Identifier(name) => write!(f, "{name}"),
            Token::StringLiteral(s) => write!(f, "\"{s}\""),
            Token::NumberLiteral(n) => write!(f, "{n}"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Equals => write!(f, "="),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// A token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedToken<'a> {
    pub token: Token<'a>,
    pub span: Span,
    /// 1-based line of the first character.
    pub line: usize,
    /// 1-based column of the first character, counted in characters.
    pub column: usize,
    /// Raw source text of the token.
    pub lexeme: &'a str,
}

impl<'a> PositionedToken<'a> {
    pub fn new(token: Token<'a>, span: Span, line: usize, column: usize, lexeme: &'a str) -> Self {
        Self {
            token,
            span,
            line,
            column,
            lexeme,
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.token, Token::Eof)
    }
}
