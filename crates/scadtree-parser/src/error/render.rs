//! Plain-text diagnostic rendering with caret markers.
//!
//! Renders a [`Diagnostic`] against the combined parse buffer: the
//! `error[Ennn]: message` headline, an `--> origin:line:column` pointer
//! per label (translated through the source map when one is given), the
//! offending source line, and a caret marker aligned under the failing
//! column with tabs expanded.

use scadtree_core::{Origin, Position};

use crate::error::Diagnostic;
use crate::source_map::SourceMap;

/// Width a tab stop expands to in rendered source lines.
const TAB_WIDTH: usize = 4;

/// Render a single diagnostic to plain text.
pub(crate) fn render_diagnostic(
    diagnostic: &Diagnostic,
    source: &str,
    map: Option<&SourceMap>,
) -> String {
    let mut out = String::new();
    out.push_str(&diagnostic.to_string());
    out.push('\n');

    for label in diagnostic.labels() {
        let offset = label.span().start().min(source.len());
        let location = match map {
            Some(map) => map.location_of(offset),
            None => Position::from_text(Origin::new("<input>"), source, offset),
        };

        let (line_text, column_in_line) = line_at(source, offset);
        let (rendered_line, caret_pad) = expand_tabs(line_text, column_in_line);

        let line_number = location.line();
        let gutter = line_number.to_string().len();
        let caret_len = label.span().len().clamp(1, line_text.len().saturating_sub(column_in_line).max(1));
        let marker = if label.is_primary() { "^" } else { "-" };

        out.push_str(&format!(
            "{:gutter$}--> {}:{}:{}\n",
            "",
            location.origin(),
            line_number,
            location.column()
        ));
        out.push_str(&format!("{:gutter$} |\n", ""));
        out.push_str(&format!("{line_number} | {rendered_line}\n"));
        out.push_str(&format!(
            "{:gutter$} | {:caret_pad$}{}",
            "",
            "",
            marker.repeat(caret_len)
        ));
        if !label.message().is_empty() {
            out.push(' ');
            out.push_str(label.message());
        }
        out.push('\n');
    }

    if let Some(help) = diagnostic.help() {
        out.push_str(&format!("  = help: {help}\n"));
    }

    out
}

/// The full line containing `offset` and the 0-indexed column within it.
fn line_at(source: &str, offset: usize) -> (&str, usize) {
    let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = source[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(source.len());
    (&source[line_start..line_end], offset - line_start)
}

/// Expand tabs to [`TAB_WIDTH`] spaces, returning the rendered line and
/// the caret padding for the given 0-indexed byte column.
fn expand_tabs(line: &str, column: usize) -> (String, usize) {
    let mut rendered = String::with_capacity(line.len());
    let mut pad = 0;
    for (index, ch) in line.char_indices() {
        let width = if ch == '\t' {
            rendered.push_str(&" ".repeat(TAB_WIDTH));
            TAB_WIDTH
        } else {
            rendered.push(ch);
            1
        };
        if index < column {
            pad += width;
        }
    }
    (rendered, pad)
}
