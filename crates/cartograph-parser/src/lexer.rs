//! Lexical analyzer for Cartograph source text.
//!
//! The lexer converts source text into a flat stream of [`PositionedToken`]s.
//! Whitespace and `//` line comments are skipped. The stream always ends with
//! a [`Token::Eof`] token.
//!
//! Lexing is fail-fast: the first unterminated string, malformed number,
//! bad escape, or unrecognized character aborts with a [`Diagnostic`].

use log::{debug, trace};
use winnow::{
    Parser as _,
    ascii::{digit1, multispace1},
    combinator::{alt, cut_err, not, opt, peek, preceded, repeat, terminated},
    error::{AddContext, ContextError, ErrMode, ModalResult},
    stream::{LocatingSlice, Location, Stream},
    token::{none_of, one_of, take_while},
};

use crate::{
    error::{Diagnostic, ErrorCode},
    span::{LineIndex, Span},
    tokens::{PositionedToken, Token},
};

/// Rich diagnostic information for lexer errors.
///
/// Attached to winnow errors via `.context()`. The error span covers from
/// `start` to the position where lexing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LexerDiagnostic {
    code: ErrorCode,
    message: &'static str,
    help: Option<&'static str>,
    start: usize,
}

type Input<'a> = LocatingSlice<&'a str>;
type IResult<O> = ModalResult<O, ContextError<LexerDiagnostic>>;

/// A token with its span and raw text, before line/column resolution.
type RawToken<'a> = (Token<'a>, Span, &'a str);

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parse an escape sequence after a backslash inside a string.
fn string_escape(input: &mut Input<'_>) -> IResult<char> {
    let escape_start = input.current_token_start();
    '\\'.parse_next(input)?;

    let escaped: IResult<char> = one_of(['"', '\\', 'n', 't'])
        .map(|c| match c {
            'n' => '\n',
            't' => '\t',
            other => other,
        })
        .parse_next(input);

    match escaped {
        Ok(c) => Ok(c),
        Err(ErrMode::Backtrack(_)) => Err(ErrMode::Cut(ContextError::new().add_context(
            input,
            &input.checkpoint(),
            LexerDiagnostic {
                code: ErrorCode::E003,
                message: "invalid escape sequence",
                help: Some("valid escapes: `\\\"`, `\\\\`, `\\n`, `\\t`"),
                start: escape_start,
            },
        ))),
        Err(e) => Err(e),
    }
}

/// Parse a double-quoted string literal.
///
/// Raw newlines are not allowed inside strings, so an unclosed quote is
/// reported on the line where it was opened.
fn string_literal<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let string_char = none_of(['"', '\\', '\n', '\r']);
    let string_content =
        repeat(0.., alt((string_escape, string_char))).fold(String::new, |mut acc, ch| {
            acc.push(ch);
            acc
        });

    let start = input.current_token_start();
    '"'.parse_next(input)?;

    cut_err(terminated(string_content, '"'))
        .context(LexerDiagnostic {
            code: ErrorCode::E001,
            message: "unterminated string literal",
            help: Some("add a closing `\"` before the end of the line"),
            start,
        })
        .map(Token::StringLiteral)
        .parse_next(input)
}

/// Parse a signed or unsigned integer or decimal literal.
///
/// A `.` continues the number only when a digit follows it, so `1.x` lexes
/// as the number `1`, a dot, and an identifier.
fn number_literal<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let start = input.current_token_start();
    peek(one_of(|c: char| c.is_ascii_digit() || c == '+' || c == '-')).parse_next(input)?;

    cut_err(
        (
            opt(one_of(['+', '-'])),
            digit1,
            opt(('.', digit1)),
            peek(not(one_of(is_word_char))),
        )
            .take()
            .verify_map(|text: &str| text.parse::<f64>().ok()),
    )
    .context(LexerDiagnostic {
        code: ErrorCode::E004,
        message: "malformed number",
        help: Some("numbers look like `42`, `-3`, or `2.5`"),
        start,
    })
    .map(Token::NumberLiteral)
    .parse_next(input)
}

/// Parse an identifier or a keyword.
///
/// Keywords are recognized case-insensitively after the whole word is read,
/// which gives them a word boundary for free.
fn word<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_word_char),
    )
        .take()
        .map(|word: &'a str| keyword(word).unwrap_or(Token::Identifier(word)))
        .parse_next(input)
}

fn keyword(word: &str) -> Option<Token<'static>> {
    let token = match word.to_ascii_lowercase().as_str() {
        "thing" => Token::Thing,
        "actor" => Token::Actor,
        "fixture" => Token::Fixture,
        "true" => Token::True,
        "false" => Token::False,
        _ => return None,
    };
    Some(token)
}

fn single_char_token<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    alt((
        '('.value(Token::LeftParen),
        ')'.value(Token::RightParen),
        '['.value(Token::LeftBracket),
        ']'.value(Token::RightBracket),
        ','.value(Token::Comma),
        '.'.value(Token::Dot),
        '='.value(Token::Equals),
    ))
    .parse_next(input)
}

/// Skip whitespace and line comments.
fn trivia(input: &mut Input<'_>) -> IResult<()> {
    repeat(
        0..,
        alt((
            multispace1.void(),
            preceded("//", take_while(0.., |c: char| c != '\n')).void(),
        )),
    )
    .parse_next(input)
}

/// Parse a single token with its span and raw text.
fn positioned_token<'a>(input: &mut Input<'a>) -> IResult<RawToken<'a>> {
    let start = input.current_token_start();

    let (token, lexeme) = alt((
        string_literal,    // Must come before any single char
        number_literal,    // Must come before identifiers
        word,              // Keywords and identifiers
        single_char_token, // Punctuation
    ))
    .with_taken()
    .parse_next(input)?;

    let end = input.current_token_start();
    Ok((token, Span::new(start..end), lexeme))
}

/// Lexer state for one source text.
struct Lexer<'a> {
    source: &'a str,
    lines: LineIndex<'a>,
    tokens: Vec<PositionedToken<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            lines: LineIndex::new(source),
            tokens: Vec::new(),
        }
    }

    /// Tokenize the whole source, stopping at the first error.
    fn run(mut self) -> Result<Vec<PositionedToken<'a>>, Diagnostic> {
        let mut input = LocatingSlice::new(self.source);

        loop {
            trivia(&mut input).map_err(|e| Self::convert_err_mode(e, input.current_token_start()))?;
            if input.is_empty() {
                break;
            }

            match positioned_token(&mut input) {
                Ok((token, span, lexeme)) => {
                    trace!(token:?, start = span.start(); "Token scanned");
                    self.push(token, span, lexeme);
                }
                Err(e) => {
                    let error_pos = input.current_token_start();
                    return Err(Self::convert_err_mode(e, error_pos));
                }
            }
        }

        let end = self.source.len();
        self.push(Token::Eof, Span::new(end..end), "");
        Ok(self.tokens)
    }

    fn push(&mut self, token: Token<'a>, span: Span, lexeme: &'a str) {
        let location = self.lines.locate(span.start());
        self.tokens.push(PositionedToken::new(
            token,
            span,
            location.line,
            location.column,
            lexeme,
        ));
    }

    /// Convert an ErrMode and error position to a Diagnostic.
    ///
    /// Uses the innermost `LexerDiagnostic` context when present and falls
    /// back to E002 (unexpected character) otherwise.
    fn convert_err_mode(
        err: ErrMode<ContextError<LexerDiagnostic>>,
        error_pos: usize,
    ) -> Diagnostic {
        let context_error = match err {
            ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx,
            ErrMode::Incomplete(_) => ContextError::new(),
        };

        if let Some(LexerDiagnostic {
            code,
            message,
            help,
            start,
        }) = context_error.context().next()
        {
            let span = Span::new(*start..error_pos.max(*start + 1));
            let mut diag = Diagnostic::error(*message)
                .with_code(*code)
                .with_label(span, code.description());
            if let Some(h) = help {
                diag = diag.with_help(*h);
            }
            return diag;
        }

        let span = Span::new(error_pos..error_pos.saturating_add(1));
        Diagnostic::error("unexpected character")
            .with_code(ErrorCode::E002)
            .with_label(span, ErrorCode::E002.description())
    }
}

/// Tokenize source text, stopping at the first lexical error.
pub fn tokenize(source: &str) -> Result<Vec<PositionedToken<'_>>, Diagnostic> {
    let tokens = Lexer::new(source).run()?;
    debug!(tokens_len = tokens.len(); "Source tokenized");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_single_token(input: &str, expected: Token<'_>) {
        let mut located_input = LocatingSlice::new(input);
        let result = positioned_token(&mut located_input);
        assert!(result.is_ok(), "Failed to parse: {}", input);
        let (token, _, lexeme) = result.unwrap();
        assert_eq!(token, expected);
        assert_eq!(lexeme, input);
    }

    fn kinds(input: &str) -> Vec<Token<'_>> {
        tokenize(input)
            .expect("tokenize failed")
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        test_single_token("thing", Token::Thing);
        test_single_token("THING", Token::Thing);
        test_single_token("Actor", Token::Actor);
        test_single_token("fixture", Token::Fixture);
        test_single_token("True", Token::True);
        test_single_token("FALSE", Token::False);
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        test_single_token("things", Token::Identifier("things"));
        test_single_token("actor_1", Token::Identifier("actor_1"));
        test_single_token("fixture-a", Token::Identifier("fixture-a"));
    }

    #[test]
    fn test_identifiers() {
        test_single_token("self", Token::Identifier("self"));
        test_single_token("east-room", Token::Identifier("east-room"));
        test_single_token("_hidden", Token::Identifier("_hidden"));
        test_single_token("locationX", Token::Identifier("locationX"));
    }

    #[test]
    fn test_punctuation() {
        test_single_token("(", Token::LeftParen);
        test_single_token(")", Token::RightParen);
        test_single_token("[", Token::LeftBracket);
        test_single_token("]", Token::RightBracket);
        test_single_token(",", Token::Comma);
        test_single_token(".", Token::Dot);
        test_single_token("=", Token::Equals);
    }

    #[test]
    fn test_numbers() {
        test_single_token("42", Token::NumberLiteral(42.0));
        test_single_token("-3", Token::NumberLiteral(-3.0));
        test_single_token("+7", Token::NumberLiteral(7.0));
        test_single_token("2.5", Token::NumberLiteral(2.5));
        test_single_token("-0.25", Token::NumberLiteral(-0.25));
    }

    #[test]
    fn test_dot_after_number_without_digit() {
        assert_eq!(
            kinds("1.x"),
            vec![
                Token::NumberLiteral(1.0),
                Token::Dot,
                Token::Identifier("x"),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        test_single_token("\"hello\"", Token::StringLiteral("hello".to_string()));
        test_single_token("\"\"", Token::StringLiteral(String::new()));
        test_single_token(
            r#""say \"hi\"\n\tok \\""#,
            Token::StringLiteral("say \"hi\"\n\tok \\".to_string()),
        );
    }

    #[test]
    fn test_whitespace_and_comments_are_skipped() {
        assert_eq!(
            kinds("thing // a comment\n  ( hall )"),
            vec![
                Token::Thing,
                Token::LeftParen,
                Token::Identifier("hall"),
                Token::RightParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_eof_is_always_appended() {
        let tokens = tokenize("").unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_eof());
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);

        let tokens = tokenize("  // only a comment").unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_eof());
    }

    #[test]
    fn test_line_and_column_tracking() {
        let tokens = tokenize("thing(a)\n  .self").unwrap();

        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[2].line, tokens[2].column), (1, 7));
        // `.` on the second line
        assert_eq!((tokens[4].line, tokens[4].column), (2, 3));
        assert_eq!(tokens[5].lexeme, "self");
        assert_eq!((tokens[5].line, tokens[5].column), (2, 4));
    }

    #[test]
    fn test_span_tracking() {
        let tokens = tokenize("name=\"Hall\"").unwrap();

        assert_eq!(tokens[0].span, Span::new(0..4));
        assert_eq!(tokens[1].span, Span::new(4..5));
        assert_eq!(tokens[2].span, Span::new(5..11));
        assert_eq!(tokens[2].lexeme, "\"Hall\"");
        assert_eq!(tokens[3].span, Span::new(11..11));
    }

    mod lexer_error_tests {
        use super::*;

        fn error_of(input: &str) -> Diagnostic {
            tokenize(input).expect_err("expected lexer error")
        }

        #[test]
        fn test_unterminated_string() {
            let diag = error_of("name=\"Hall");
            assert_eq!(diag.code(), Some(ErrorCode::E001));
            assert_eq!(diag.primary_label().unwrap().span(), Span::new(5..10));
        }

        #[test]
        fn test_string_stops_at_newline() {
            let diag = error_of("\"open\nthing");
            assert_eq!(diag.code(), Some(ErrorCode::E001));
            assert_eq!(diag.primary_label().unwrap().span(), Span::new(0..5));
        }

        #[test]
        fn test_invalid_escape() {
            let diag = error_of(r#""bad \q""#);
            assert_eq!(diag.code(), Some(ErrorCode::E003));
            assert_eq!(diag.primary_label().unwrap().span().start(), 5);
        }

        #[test]
        fn test_malformed_numbers() {
            assert_eq!(error_of("12abc").code(), Some(ErrorCode::E004));
            assert_eq!(error_of("x=-").code(), Some(ErrorCode::E004));
            assert_eq!(error_of("x=+.5").code(), Some(ErrorCode::E004));
        }

        #[test]
        fn test_unexpected_character() {
            let diag = error_of("thing(a) @");
            assert_eq!(diag.code(), Some(ErrorCode::E002));
            assert_eq!(diag.primary_label().unwrap().span(), Span::new(9..10));
        }
    }

    proptest! {
        #[test]
        fn tokenize_never_panics(input in "\\PC{0,60}") {
            let _ = tokenize(&input);
        }

        #[test]
        fn successful_streams_end_with_single_eof(input in "[a-z(). =\"0-9,\\[\\]]{0,40}") {
            if let Ok(tokens) = tokenize(&input) {
                prop_assert!(tokens.last().is_some_and(|t| t.is_eof()));
                prop_assert_eq!(tokens.iter().filter(|t| t.is_eof()).count(), 1);
            }
        }

        #[test]
        fn identifiers_roundtrip(name in "[a-z_][a-z0-9_-]{0,15}") {
            prop_assume!(keyword(&name).is_none());
            let tokens = tokenize(&name).unwrap();
            prop_assert_eq!(&tokens[0].token, &Token::Identifier(name.as_str()));
        }

        #[test]
        fn integers_roundtrip(n in -100_000i64..100_000) {
            let text = n.to_string();
            let tokens = tokenize(&text).unwrap();
            prop_assert_eq!(&tokens[0].token, &Token::NumberLiteral(n as f64));
        }
    }
}
