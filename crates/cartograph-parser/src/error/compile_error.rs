//! The error surfaced by every compiler entry point.

use thiserror::Error;

use crate::{
    error::Diagnostic,
    span::{LineIndex, Span, floor_char_boundary},
};

/// First problem found while scanning, parsing, or compiling.
///
/// Carries the [`Diagnostic`] together with the 1-based line and column of
/// its primary label, the source text under that label, and the full source.
#[derive(Debug, Clone, Error)]
#[error("{line}:{column}: {diagnostic}")]
pub struct CompileError {
    diagnostic: Diagnostic,
    line: usize,
    column: usize,
    lexeme: String,
    source_text: String,
}

impl CompileError {
    /// Resolve `diagnostic` against `source`.
    pub fn new(diagnostic: Diagnostic, source: &str) -> Self {
        let span = diagnostic
            .primary_label()
            .map(|label| label.span())
            .unwrap_or_else(|| Span::new(source.len()..source.len()));

        let location = LineIndex::new(source).locate(span.start());
        let start = floor_char_boundary(source, span.start());
        let end = floor_char_boundary(source, span.end());

        Self {
            line: location.line,
            column: location.column,
            lexeme: source[start..end].to_string(),
            source_text: source.to_string(),
            diagnostic,
        }
    }

    pub fn diagnostic(&self) -> &Diagnostic {
        &self.diagnostic
    }

    pub fn message(&self) -> &str {
        self.diagnostic.message()
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// Source text under the primary label; for scanner errors this is the
    /// partial lexeme read before the failure.
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }
}
