//! The ParseError type for wrapping parsing diagnostics.
//!
//! [`ParseError`] wraps one or more [`Diagnostic`]s that occurred during
//! the parsing lifecycle (lexing, parsing, or include expansion). It is a
//! returned value, never a process abort: a failed parse leaves the host
//! in full control.

use std::fmt;

use crate::error::Diagnostic;
use crate::error::render::render_diagnostic;
use crate::source_map::SourceMap;

/// Error type for the parsing lifecycle.
///
/// Wraps one or more diagnostics.
#[derive(Debug)]
pub struct ParseError {
    diagnostics: Vec<Diagnostic>,
}

impl ParseError {
    /// Create a new parse error from diagnostics.
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// Get all diagnostics in this error.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The offset in the combined buffer where the first diagnostic's
    /// primary label points, if any.
    pub fn offset(&self) -> Option<usize> {
        self.diagnostics.iter().find_map(|diag| {
            diag.labels()
                .iter()
                .find(|label| label.is_primary())
                .map(|label| label.span().start())
        })
    }

    /// Render every diagnostic with source lines and caret markers.
    ///
    /// `source` is the combined buffer the error spans refer to; `map`,
    /// when given, translates offsets back to their original
    /// (origin, line, column) locations.
    pub fn render(&self, source: &str, map: Option<&SourceMap>) -> String {
        let mut out = String::new();
        for (i, diagnostic) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&render_diagnostic(diagnostic, source, map));
        }
        out
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(first) = self.diagnostics.first() {
            write!(f, "{}", first)?;
            if self.diagnostics.len() > 1 {
                write!(f, " (+{} more)", self.diagnostics.len() - 1)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

impl From<Diagnostic> for ParseError {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostics: vec![diagnostic],
        }
    }
}

impl From<Vec<Diagnostic>> for ParseError {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }
}
