//! Error types for Cartograph operations.
//!
//! [`CartographError`] wraps everything that can stop a source file from
//! becoming a world. Build failures carry the full problem [`Report`].

use std::io;

use thiserror::Error;

use cartograph_parser::CompileError;

use crate::report::Report;

/// The main error type for Cartograph operations.
#[derive(Debug, Error)]
pub enum CartographError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// A build rejected by validation.
#[derive(Debug, Clone, Error)]
#[error("world build failed with {} problem(s)", report.len())]
pub struct BuildError {
    report: Report,
}

impl BuildError {
    pub fn new(report: Report) -> Self {
        Self { report }
    }

    /// Every problem that blocked the build.
    pub fn report(&self) -> &Report {
        &self.report
    }
}
