//! Parser for Cartograph source tokens.
//!
//! This module transforms the token stream from the [`lexer`](super::lexer)
//! into the syntax tree defined in [`parser_types`](super::parser_types).
//! The public entry point is [`build_program`].
//!
//! Grammar (informal):
//!
//! ```text
//! program     := statement*
//! statement   := ('thing' | 'actor') '(' id ')' '.' block ('.' block)* '.'?
//! block       := fixture_ref ('.' attribute)+
//! fixture_ref := 'fixture' '(' id ')' | id
//! attribute   := IDENT '=' value
//! value       := STRING | NUMBER | 'true' | 'false' | '[' (value (',' value)*)? ']'
//! id          := STRING | IDENT
//! ```
//!
//! A `.IDENT` that is not followed by `=` opens a new fixture block under the
//! same subject, so one statement may yield several declarations.

use winnow::{
    Parser as _,
    combinator::peek,
    error::{AddContext, ContextError, ErrMode},
    stream::{Stream, TokenSlice},
    token::any,
};

use crate::{
    error::{Diagnostic, ErrorCode},
    parser_types::{Attribute, AttributeValue, Declaration, Program, SubjectKind},
    span::{Span, Spanned},
    tokens::{PositionedToken, Token},
};

/// Context type for parser errors
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Context {
    /// What was expected at the failing token
    Label(&'static str),
    /// An attribute assigned twice within one fixture block
    DuplicateAttribute {
        name: String,
        first: Span,
        second: Span,
    },
}

type Input<'src> = CartographTokenSlice<'src>;
type IResult<O> = std::result::Result<O, ErrMode<ContextError<Context>>>;
/// Type alias for winnow TokenSlice with our positioned tokens
type CartographTokenSlice<'src> = TokenSlice<'src, PositionedToken<'src>>;

/// Cut error at the current token carrying `context`.
fn cut_error(input: &Input<'_>, context: Context) -> ErrMode<ContextError<Context>> {
    ErrMode::Cut(ContextError::new().add_context(input, &input.checkpoint(), context))
}

/// Consume the next token if `select` accepts it.
///
/// On rejection the token is left unconsumed, so the error points at it.
fn expect<'src, O>(
    input: &mut Input<'src>,
    label: &'static str,
    select: impl FnOnce(&'src PositionedToken<'src>) -> Option<O>,
) -> IResult<O> {
    let checkpoint = input.checkpoint();
    let next: IResult<&'src PositionedToken<'src>> = any.parse_next(input);

    if let Some(value) = next.ok().and_then(select) {
        return Ok(value);
    }

    input.reset(&checkpoint);
    Err(cut_error(input, Context::Label(label)))
}

/// Consume a specific punctuation or keyword token, returning its span.
fn punct<'src>(
    input: &mut Input<'src>,
    expected: Token<'static>,
    label: &'static str,
) -> IResult<Span> {
    expect(input, label, |token| (token.token == expected).then_some(token.span))
}

fn peek_token<'src>(input: &mut Input<'src>) -> IResult<&'src PositionedToken<'src>> {
    peek(any).parse_next(input)
}

/// Whether the next token ends the current statement.
fn at_statement_end(input: &mut Input<'_>) -> bool {
    if input.eof_offset() == 0 {
        return true;
    }
    matches!(
        peek_token(input),
        Ok(token) if matches!(token.token, Token::Thing | Token::Actor | Token::Eof)
    )
}

/// Parse an id: a bare identifier or a string literal.
fn id<'src>(input: &mut Input<'src>, label: &'static str) -> IResult<Spanned<String>> {
    expect(input, label, |token| match &token.token {
        Token::Identifier(name) => Some(Spanned::new((*name).to_string(), token.span)),
        Token::StringLiteral(text) => Some(Spanned::new(text.clone(), token.span)),
        _ => None,
    })
}

/// Parse a literal value or a bracketed list of values.
fn value<'src>(input: &mut Input<'src>) -> IResult<Spanned<AttributeValue>> {
    if matches!(peek_token(input)?.token, Token::LeftBracket) {
        return list(input);
    }

    expect(input, "attribute value", |token| {
        let value = match &token.token {
            Token::StringLiteral(text) => AttributeValue::String(text.clone()),
            Token::NumberLiteral(number) => AttributeValue::Number(*number),
            Token::True => AttributeValue::Boolean(true),
            Token::False => AttributeValue::Boolean(false),
            _ => return None,
        };
        Some(Spanned::new(value, token.span))
    })
}

fn list<'src>(input: &mut Input<'src>) -> IResult<Spanned<AttributeValue>> {
    let open = punct(input, Token::LeftBracket, "'['")?;
    let mut items = Vec::new();

    if matches!(peek_token(input)?.token, Token::RightBracket) {
        let close = punct(input, Token::RightBracket, "']'")?;
        return Ok(Spanned::new(AttributeValue::List(items), open.union(close)));
    }

    loop {
        items.push(value(input)?);

        let (separator, closed) =
            expect(input, "',' or ']' in list", |token| match token.token {
                Token::Comma => Some((token.span, false)),
                Token::RightBracket => Some((token.span, true)),
                _ => None,
            })?;

        if closed {
            return Ok(Spanned::new(
                AttributeValue::List(items),
                open.union(separator),
            ));
        }
    }
}

/// Parse `IDENT '=' value`; the leading dot is already consumed.
fn attribute<'src>(input: &mut Input<'src>) -> IResult<Attribute> {
    let name = expect(input, "attribute name", |token| match token.token {
        Token::Identifier(name) => Some(Spanned::new(name.to_ascii_lowercase(), token.span)),
        _ => None,
    })?;
    punct(input, Token::Equals, "'=' after attribute name")?;
    let value = value(input)?;

    Ok(Attribute { name, value })
}

/// Whether the next tokens read `'.' IDENT '='`.
fn attribute_ahead(input: &mut Input<'_>) -> bool {
    let checkpoint = input.checkpoint();
    let ahead: IResult<(&PositionedToken<'_>, &PositionedToken<'_>, &PositionedToken<'_>)> =
        (any, any, any).parse_next(input);
    input.reset(&checkpoint);

    matches!(
        ahead,
        Ok((dot, name, equals))
            if matches!(dot.token, Token::Dot)
                && matches!(name.token, Token::Identifier(_))
                && matches!(equals.token, Token::Equals)
    )
}

/// Parse one or more `.attribute` assignments of a fixture block.
fn attribute_block<'src>(input: &mut Input<'src>) -> IResult<Vec<Attribute>> {
    let mut attributes: Vec<Attribute> = Vec::new();

    loop {
        if !attributes.is_empty() && !attribute_ahead(input) {
            return Ok(attributes);
        }

        let label = if attributes.is_empty() {
            "'.' and at least one attribute after fixture name"
        } else {
            "'.' before attribute"
        };
        punct(input, Token::Dot, label)?;
        let attribute = attribute(input)?;

        if let Some(first) = attributes
            .iter()
            .find(|existing| existing.name.inner() == attribute.name.inner())
        {
            return Err(cut_error(
                input,
                Context::DuplicateAttribute {
                    name: attribute.name.inner().clone(),
                    first: first.name.span(),
                    second: attribute.name.span(),
                },
            ));
        }
        attributes.push(attribute);
    }
}

/// Parse the fixture reference opening a block.
fn fixture_ref<'src>(input: &mut Input<'src>) -> IResult<Spanned<String>> {
    if matches!(peek_token(input)?.token, Token::Fixture) {
        punct(input, Token::Fixture, "'fixture'")?;
        punct(input, Token::LeftParen, "'(' after 'fixture'")?;
        let fixture_id = id(input, "fixture id")?;
        punct(input, Token::RightParen, "')' after fixture id")?;
        return Ok(fixture_id);
    }

    id(input, "'fixture(...)' or a fixture name after '.'")
}

/// Parse one statement, appending a declaration per fixture block.
fn statement<'src>(input: &mut Input<'src>, declarations: &mut Vec<Declaration>) -> IResult<()> {
    let (subject_kind, start) = expect(
        input,
        "'thing' or 'actor' to start a declaration",
        |token| match token.token {
            Token::Thing => Some((SubjectKind::Thing, token.span)),
            Token::Actor => Some((SubjectKind::Actor, token.span)),
            _ => None,
        },
    )?;
    punct(input, Token::LeftParen, "'(' after subject keyword")?;
    let subject_id = id(input, "declaration id")?;
    punct(input, Token::RightParen, "')' after declaration id")?;
    punct(input, Token::Dot, "'.' after declaration subject")?;

    loop {
        let fixture_id = fixture_ref(input)?;
        let attributes = attribute_block(input)?;
        let end = attributes
            .last()
            .map_or(fixture_id.span(), |attribute| attribute.value.span());

        declarations.push(Declaration {
            subject_kind,
            subject_id: subject_id.clone(),
            fixture_id,
            attributes,
            span: start.union(end),
        });

        if at_statement_end(input) {
            return Ok(());
        }
        punct(input, Token::Dot, "'.' or the start of a new declaration")?;
        // Optional trailing dot
        if at_statement_end(input) {
            return Ok(());
        }
    }
}

fn program<'src>(input: &mut Input<'src>) -> IResult<Vec<Declaration>> {
    let mut declarations = Vec::new();

    while !at_program_end(input) {
        statement(input, &mut declarations)?;
    }

    Ok(declarations)
}

fn at_program_end(input: &mut Input<'_>) -> bool {
    input.eof_offset() == 0 || matches!(peek_token(input), Ok(token) if token.is_eof())
}

/// Convert a winnow error into a [`Diagnostic`] pointing at the failing token.
fn convert_error(
    error: ErrMode<ContextError<Context>>,
    tokens: &[PositionedToken<'_>],
    current_remaining: usize,
) -> Diagnostic {
    let context = match error {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e,
        ErrMode::Incomplete(_) => ContextError::new(),
    };

    let mut expectation = None;
    for ctx in context.context() {
        match ctx {
            Context::DuplicateAttribute {
                name,
                first,
                second,
            } => {
                return Diagnostic::error(format!(
                    "attribute `{name}` is set twice in this declaration"
                ))
                .with_code(ErrorCode::E102)
                .with_label(*second, "set again here")
                .with_secondary_label(*first, "first set here")
                .with_help("remove one of the assignments");
            }
            Context::Label(label) => {
                expectation.get_or_insert(*label);
            }
        }
    }

    let offending = tokens
        .get(tokens.len() - current_remaining)
        .or_else(|| tokens.last());
    let at_end = offending.is_none_or(|token| token.is_eof());

    let message = match expectation {
        Some(label) => format!("Expected {label}"),
        None => "Unexpected end of input".to_string(),
    };
    let (code, found) = if at_end {
        (ErrorCode::E101, "found end of input".to_string())
    } else {
        let lexeme = offending.map_or("", |token| token.lexeme);
        (ErrorCode::E100, format!("found `{lexeme}`"))
    };
    let span = offending.map_or(Span::default(), |token| token.span);

    Diagnostic::error(message)
        .with_code(code)
        .with_label(span, found)
}

/// Parse a token stream into a [`Program`].
///
/// Parsing stops at the first error.
pub fn build_program<'src>(tokens: &'src [PositionedToken<'src>]) -> Result<Program, Diagnostic> {
    let mut token_slice = TokenSlice::new(tokens);

    match program(&mut token_slice) {
        Ok(declarations) => Ok(Program { declarations }),
        Err(e) => {
            let current_remaining = token_slice.eof_offset();
            Err(convert_error(e, tokens, current_remaining))
        }
    }
}
