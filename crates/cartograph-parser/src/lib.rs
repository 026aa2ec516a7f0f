//! # Cartograph Parser
//!
//! Compiler pipeline for the Cartograph world language: source text is
//! scanned into tokens, parsed into declarations, and compiled into a
//! [`WorldRecipe`].
//!
//! ## Usage
//!
//! ```
//! # use cartograph_parser::{compile_source, CompileError};
//!
//! fn main() -> Result<(), CompileError> {
//!     let source = r#"
//!         thing(start).self.kind="plot".self.name="Start".self.region="R"
//!             .east.leadsTo="east-room"
//!         thing("east-room").self.locationX=1.self.locationY=0
//!     "#;
//!
//!     let recipe = compile_source(source)?;
//!     assert_eq!(recipe.plots.len(), 2);
//!     assert_eq!(recipe.gates.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! Each stage is also exposed on its own ([`scan`], [`parse`], [`compile`])
//! for tooling that wants to inspect intermediate results.

mod compile;
mod compile_utils;
pub mod error;
mod lexer;
mod parser;
pub mod parser_types;
mod span;
pub mod tokens;

pub use error::CompileError;
pub use span::{LineIndex, Location, Span, Spanned};

use log::info;

use cartograph_core::recipe::WorldRecipe;

use parser_types::Program;
use tokens::PositionedToken;

/// Scan source text into tokens.
///
/// The returned stream always ends with [`tokens::Token::Eof`].
pub fn scan(source: &str) -> Result<Vec<PositionedToken<'_>>, CompileError> {
    lexer::tokenize(source).map_err(|diag| CompileError::new(diag, source))
}

/// Parse a token stream produced by [`scan`] into a [`Program`].
///
/// `source` must be the text the tokens were scanned from; it is used to
/// resolve error positions.
pub fn parse<'src>(
    tokens: &'src [PositionedToken<'src>],
    source: &str,
) -> Result<Program, CompileError> {
    parser::build_program(tokens).map_err(|diag| CompileError::new(diag, source))
}

/// Compile a parsed [`Program`] into a [`WorldRecipe`].
pub fn compile(program: &Program, source: &str) -> Result<WorldRecipe, CompileError> {
    compile::compile_program(program).map_err(|diag| CompileError::new(diag, source))
}

/// Run the whole pipeline on source text.
///
/// # Errors
///
/// Returns the first scanner, parser, or compiler problem as a
/// [`CompileError`] carrying line, column, and offending lexeme.
pub fn compile_source(source: &str) -> Result<WorldRecipe, CompileError> {
    info!(source_len = source.len(); "Compiling source");
    let tokens = scan(source)?;
    let program = parse(&tokens, source)?;
    compile(&program, source)
}
