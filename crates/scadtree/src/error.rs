//! Error types for scadtree operations.
//!
//! This module provides the main error type [`ScadError`] which wraps the
//! error conditions that can occur while parsing and resolving OpenSCAD
//! sources.

use std::io;

use thiserror::Error;

use scadtree_parser::ParseError;

/// The main error type for scadtree operations.
///
/// # Diagnostic Variants
///
/// The `Parse` variant carries the structured [`ParseError`] together
/// with the source text its spans refer to, so callers can render rich
/// caret diagnostics. The `Include` variant carries include-expansion
/// failures (file not found, iteration bound exceeded).
#[derive(Debug, Error)]
pub enum ScadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Parse { err: ParseError, src: String },

    #[error("{0}")]
    Include(ParseError),
}

impl ScadError {
    /// Create a new `Parse` error with the associated source code.
    pub fn new_parse_error(err: ParseError, src: impl Into<String>) -> Self {
        Self::Parse {
            err,
            src: src.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scadtree_parser::error::Diagnostic;

    #[test]
    fn test_parse_error_display() {
        let err = ScadError::new_parse_error(
            ParseError::from(Diagnostic::error("unexpected token")),
            "x = ;",
        );
        assert_eq!(err.to_string(), "error: unexpected token");
    }
}
