//! Error and diagnostic system for the scadtree parser.
//!
//! This module provides an error handling system with:
//! - Error codes for documentation and searchability
//! - Multiple labeled spans for rich error context
//! - Severity levels
//! - Diagnostic collector for accumulating multiple errors
//! - Plain-text rendering with caret markers under the failing column
//!
//! # Overview
//!
//! The error system is built around the [`Diagnostic`] type, which
//! represents a single error or warning message with optional error code,
//! multiple source locations, and help text. Multiple diagnostics are
//! wrapped in [`ParseError`] for returning from the parsing lifecycle.
//!
//! # Example
//!
//! ```
//! # use scadtree_parser::error::{Diagnostic, ErrorCode};
//! # use scadtree_parser::Span;
//!
//! let span = Span::new(8..9);
//!
//! let diag = Diagnostic::error("unexpected token")
//!     .with_code(ErrorCode::E100)
//!     .with_label(span, "expected an expression here")
//!     .with_help("terms of a binary operator cannot be empty");
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod render;
mod severity;

pub(crate) use collector::DiagnosticCollector;

pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::ParseError;
pub use severity::Severity;
