//! Labeled source spans for diagnostic messages.
//!
//! A label associates a message with a span in the combined parse buffer,
//! providing context for where an error or warning occurred.

use crate::span::Span;

/// The role a label plays within its diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelKind {
    /// Marks the main location of the error or warning; rendered with
    /// `^` carets. Typically one per diagnostic.
    Primary,
    /// Provides additional context, such as "first included here";
    /// rendered with `-` markers.
    Secondary,
}

/// A labeled span in source code.
#[derive(Debug, Clone)]
pub struct Label {
    span: Span,
    message: String,
    kind: LabelKind,
}

impl Label {
    /// Create a new primary label.
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            kind: LabelKind::Primary,
        }
    }

    /// Create a new secondary label.
    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            kind: LabelKind::Secondary,
        }
    }

    /// Get the span this label applies to.
    pub fn span(&self) -> Span {
        self.span
    }

    /// Get the label message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this is a primary label.
    pub fn is_primary(&self) -> bool {
        self.kind == LabelKind::Primary
    }

    /// Check if this is a secondary label.
    pub fn is_secondary(&self) -> bool {
        self.kind == LabelKind::Secondary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_label() {
        let label = Label::primary(Span::new(10..20), "error here");
        assert_eq!(label.span().start(), 10);
        assert_eq!(label.message(), "error here");
        assert!(label.is_primary());
        assert!(!label.is_secondary());
    }

    #[test]
    fn test_secondary_label() {
        let label = Label::secondary(Span::new(5..15), "first included here");
        assert!(label.is_secondary());
    }
}
