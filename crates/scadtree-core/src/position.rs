//! Source positions for AST nodes.

use std::fmt;

use crate::origin::Origin;

/// A resolved location in an original source origin.
///
/// Every AST node owns exactly one `Position`. Line and column are
/// 1-indexed and refer to the *original* origin, not the combined parse
/// buffer; `offset` is the node's 0-indexed character offset in the
/// combined buffer the node was parsed from, kept so downstream tooling
/// can map back into the buffer.
///
/// Positions are immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    origin: Origin,
    line: u32,
    column: u32,
    offset: usize,
}

impl Position {
    /// Creates a new position.
    pub fn new(origin: Origin, line: u32, column: u32, offset: usize) -> Self {
        Self {
            origin,
            line,
            column,
            offset,
        }
    }

    /// Computes a position by counting lines in `text` up to `offset`.
    ///
    /// This is the fallback used when no source map is available: the
    /// whole text is treated as a single origin starting at line 1,
    /// column 1.
    pub fn from_text(origin: Origin, text: &str, offset: usize) -> Self {
        let clamped = offset.min(text.len());
        let before = &text[..clamped];
        let line = before.matches('\n').count() as u32 + 1;
        let column = match before.rfind('\n') {
            Some(last_newline) => (clamped - last_newline) as u32,
            None => clamped as u32 + 1,
        };
        Self::new(origin, line, column, offset)
    }

    /// The origin this position refers to.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// 1-indexed line number in the origin.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 1-indexed column number in the origin.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// 0-indexed character offset in the combined parse buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.origin, self.line, self.column)
    }
}
