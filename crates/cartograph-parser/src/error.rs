//! Diagnostics for the Cartograph compiler pipeline.
//!
//! Scanning, parsing, and semantic compilation all stop at the first
//! problem. That problem is described by a [`Diagnostic`] and surfaced to
//! callers as a [`CompileError`], which adds the resolved line, column,
//! offending lexeme, and full source text.
//!
//! # Example
//!
//! ```
//! # use cartograph_parser::error::{Diagnostic, ErrorCode};
//! # use cartograph_parser::Span;
//!
//! let diag = Diagnostic::error("fixture key `desk` is declared more than once")
//!     .with_code(ErrorCode::E301)
//!     .with_label(Span::new(40..44), "declared again here")
//!     .with_secondary_label(Span::new(10..14), "first declared here")
//!     .with_help("rename one of the fixtures");
//! assert_eq!(
//!     diag.to_string(),
//!     "error[E301]: fixture key `desk` is declared more than once"
//! );
//! ```

mod compile_error;
mod diagnostic;
mod error_code;
mod label;

pub use compile_error::CompileError;
pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;

/// A type alias for `Result<T, Diagnostic>`.
pub(crate) type Result<T> = std::result::Result<T, Diagnostic>;
