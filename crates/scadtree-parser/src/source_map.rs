//! Source map: multi-origin text composition and position translation.
//!
//! A [`SourceMap`] combines text from several origins (files, editor
//! buffers) into one parseable buffer while keeping the ability to map
//! any offset in that buffer back to an (origin, line, column) triple.
//! Segments may be inserted at arbitrary offsets and spans of the
//! combined buffer may be replaced with differently-sourced content,
//! which is how [`expand_includes`] substitutes `include <path>`
//! directives with file contents.
//!
//! File discovery and reading are delegated to an injected
//! [`IncludeResolver`]; this module performs no I/O of its own.

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use scadtree_core::{Origin, Position};

use crate::error::{Diagnostic, ErrorCode, ParseError};
use crate::span::Span;

/// A span of text contributed by one origin into the combined buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSegment {
    origin: Origin,
    start_line: u32,
    start_column: u32,
    content: String,
    combined_start: usize,
}

impl SourceSegment {
    /// The origin this segment's text came from.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// 1-indexed line in the origin where this segment starts.
    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    /// 1-indexed column in the origin where this segment starts.
    pub fn start_column(&self) -> u32 {
        self.start_column
    }

    /// The segment's text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Starting offset of this segment in the combined buffer.
    pub fn combined_start(&self) -> usize {
        self.combined_start
    }

    fn end(&self) -> usize {
        self.combined_start + self.content.len()
    }
}

/// Options for [`SourceMap::add_origin_with`].
#[derive(Debug, Clone)]
pub struct InsertOptions {
    /// Offset in the combined buffer to insert at; appends when `None`.
    pub insert_at: Option<usize>,
    /// Line in the origin where the inserted content starts.
    pub start_line: u32,
    /// Column in the origin where the inserted content starts.
    pub start_column: u32,
    /// Number of characters of existing content to replace at
    /// `insert_at` before inserting.
    pub replace_length: usize,
    /// When replacing, also drop one newline immediately following the
    /// replaced span so a content-final newline does not double up.
    pub strip_following_newline: bool,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            insert_at: None,
            start_line: 1,
            start_column: 1,
            replace_length: 0,
            strip_following_newline: false,
        }
    }
}

/// Maps offsets in a combined source buffer back to original locations.
///
/// Segments stay sorted by their combined offset; the combined buffer is
/// invalidated on every mutation and rebuilt lazily, with gaps between
/// segments padded with spaces.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    segments: Vec<SourceSegment>,
    combined: String,
    dirty: bool,
}

impl SourceMap {
    /// Creates an empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// All segments, ordered by combined offset.
    pub fn segments(&self) -> &[SourceSegment] {
        &self.segments
    }

    /// Appends an origin's content to the end of the combined buffer and
    /// returns the offset it was inserted at.
    pub fn add_origin(&mut self, origin: Origin, content: &str) -> usize {
        self.add_origin_with(origin, content, InsertOptions::default())
    }

    /// Inserts an origin's content with explicit placement options and
    /// returns the offset it was inserted at.
    ///
    /// Every other segment's recorded offset is re-pointed; a replacement
    /// that falls inside a segment splits it into "before" and "after"
    /// pieces, with the after piece's start line/column recomputed from
    /// the split point.
    pub fn add_origin_with(
        &mut self,
        origin: Origin,
        content: &str,
        options: InsertOptions,
    ) -> usize {
        let insert_at = options.insert_at.unwrap_or_else(|| self.end_offset());

        if options.replace_length > 0 {
            self.replace_text(
                insert_at,
                options.replace_length,
                options.strip_following_newline,
            );
        }

        // Shift segments at or after the insertion point to the right.
        let content_len = content.len();
        for segment in &mut self.segments {
            if segment.combined_start >= insert_at {
                segment.combined_start += content_len;
            }
        }

        let segment = SourceSegment {
            origin,
            start_line: options.start_line,
            start_column: options.start_column,
            content: content.to_string(),
            combined_start: insert_at,
        };
        let index = self
            .segments
            .partition_point(|existing| existing.combined_start <= insert_at);
        self.segments.insert(index, segment);
        self.dirty = true;

        trace!("added origin {origin} at offset {insert_at} ({content_len} chars)");
        insert_at
    }

    /// End of the combined buffer: the maximum segment end.
    fn end_offset(&self) -> usize {
        self.segments
            .iter()
            .map(SourceSegment::end)
            .max()
            .unwrap_or(0)
    }

    /// Removes `length` characters of existing content starting at
    /// `start`, splitting any segment the range falls inside.
    fn replace_text(&mut self, start: usize, length: usize, strip_following_newline: bool) {
        if length == 0 {
            return;
        }
        let end = start + length;
        let mut result: Vec<SourceSegment> = Vec::with_capacity(self.segments.len());

        for mut segment in std::mem::take(&mut self.segments) {
            let segment_start = segment.combined_start;
            let segment_end = segment.end();

            if segment_start < end && segment_end > start {
                // The replacement overlaps this segment.
                let replace_start = start.saturating_sub(segment_start);
                let replace_end = (end - segment_start).min(segment.content.len());

                let mut after = segment.content[replace_end..].to_string();
                // Text of the segment consumed before the after piece
                // begins, used to recompute its start line/column.
                let mut consumed = segment.content[..replace_end].to_string();

                if !after.is_empty() && strip_following_newline && after.starts_with('\n') {
                    after.remove(0);
                    consumed.push('\n');
                }

                let before = &segment.content[..replace_start];
                if !before.is_empty() {
                    let before = before.to_string();
                    let mut kept = segment.clone();
                    kept.content = before;
                    result.push(kept);
                }

                if !after.is_empty() {
                    let line_count = consumed.matches('\n').count() as u32;
                    let (start_line, start_column) = if line_count > 0 {
                        let last_newline = consumed.rfind('\n').unwrap_or(0);
                        (
                            segment.start_line + line_count,
                            (consumed.len() - last_newline) as u32,
                        )
                    } else {
                        (
                            segment.start_line,
                            segment.start_column + consumed.len() as u32,
                        )
                    };
                    segment.start_line = start_line;
                    segment.start_column = start_column;
                    segment.content = after;
                    segment.combined_start = start;
                    result.push(segment);
                }
            } else {
                if segment.combined_start >= end {
                    segment.combined_start -= length;
                }
                result.push(segment);
            }
        }

        result.sort_by_key(|segment| segment.combined_start);
        self.segments = result;
        self.dirty = true;
    }

    /// The combined buffer, rebuilt lazily after mutations.
    pub fn combined_text(&mut self) -> &str {
        if self.dirty {
            self.rebuild_combined();
        }
        &self.combined
    }

    fn rebuild_combined(&mut self) {
        let mut combined = String::new();
        let mut position = 0usize;
        for segment in &self.segments {
            if segment.combined_start > position {
                combined.push_str(&" ".repeat(segment.combined_start - position));
            }
            combined.push_str(&segment.content);
            position = segment.end();
        }
        self.combined = combined;
        self.dirty = false;
    }

    /// Translates an offset in the combined buffer back to its original
    /// (origin, line, column).
    ///
    /// Offsets past the end of all segments clamp to the end of the
    /// segment that reaches furthest.
    pub fn location_of(&self, offset: usize) -> Position {
        let Some(last) = self.segments.iter().max_by_key(|segment| segment.end()) else {
            return Position::new(Origin::unknown(), 1, 1, offset);
        };

        let found = self.segments.binary_search_by(|segment| {
            if offset < segment.combined_start {
                std::cmp::Ordering::Greater
            } else if offset >= segment.end() {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Equal
            }
        });

        match found {
            Ok(index) => {
                let segment = &self.segments[index];
                location_in_segment(segment, offset - segment.combined_start, offset)
            }
            Err(_) => location_in_segment(last, last.content.len(), offset),
        }
    }
}

fn location_in_segment(segment: &SourceSegment, local_offset: usize, offset: usize) -> Position {
    let local_offset = local_offset.min(segment.content.len());
    let before = &segment.content[..local_offset];
    let line_count = before.matches('\n').count() as u32;

    let line = segment.start_line + line_count;
    let column = if line_count == 0 {
        segment.start_column + local_offset as u32
    } else {
        let last_newline = before.rfind('\n').unwrap_or(0);
        (local_offset - last_newline) as u32
    };
    Position::new(segment.origin, line, column, offset)
}

/// File discovery and reading for include expansion.
///
/// The core performs no I/O; callers supply the lookup. `resolve` follows
/// the contract `resolve(current_origin, requested_path) -> path or
/// not-found`.
pub trait IncludeResolver {
    /// Resolves a requested include path relative to the origin currently
    /// being expanded. `None` means not found.
    fn resolve(&self, current_origin: &str, path: &str) -> Option<PathBuf>;

    /// Reads a resolved file's content.
    fn read(&self, path: &Path) -> io::Result<String>;
}

/// A matched `include <path>` occurrence in the combined buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IncludeOccurrence {
    offset: usize,
    length: usize,
    path: String,
}

/// Expands `include <path>` directives in place until none remain.
///
/// An explicit fixed-point loop: each pass scans the current combined
/// buffer for valid occurrences (never inside strings or comments),
/// substitutes them all in reverse-offset order so earlier substitutions
/// do not invalidate later offsets, then rescans from scratch because
/// substituted content may itself contain includes. The loop fails with
/// an [`ErrorCode::E201`] diagnostic after `max_iterations` passes, which
/// is the cycle-detection contract for circular includes. `use`
/// directives are never substituted.
pub fn expand_includes(
    map: &mut SourceMap,
    current_origin: Origin,
    resolver: &dyn IncludeResolver,
    max_iterations: usize,
) -> Result<(), ParseError> {
    let mut current = current_origin.as_str();

    for iteration in 0..max_iterations {
        let combined = map.combined_text().to_string();
        let occurrences = find_valid_includes(&combined);
        if occurrences.is_empty() {
            debug!("include expansion reached fixed point after {iteration} iterations");
            return Ok(());
        }
        debug!(
            "include expansion iteration {iteration}: {} occurrences",
            occurrences.len()
        );

        // Substitute from the end of the buffer backwards so earlier
        // offsets stay valid within this pass.
        for occurrence in occurrences.iter().rev() {
            let span = Span::new(occurrence.offset..occurrence.offset + occurrence.length);

            let resolved = resolver.resolve(&current, &occurrence.path).ok_or_else(|| {
                ParseError::from(
                    Diagnostic::error(format!("included file '{}' not found", occurrence.path))
                        .with_code(ErrorCode::E200)
                        .with_label(span, "cannot resolve this include")
                        .with_help("check the path and the configured search locations"),
                )
            })?;

            let content = resolver.read(&resolved).map_err(|err| {
                ParseError::from(
                    Diagnostic::error(format!(
                        "error reading included file '{}': {err}",
                        resolved.display()
                    ))
                    .with_code(ErrorCode::E200)
                    .with_label(span, "include could not be read"),
                )
            })?;

            let resolved_name = resolved.to_string_lossy().into_owned();
            map.add_origin_with(
                Origin::new(&resolved_name),
                &content,
                InsertOptions {
                    insert_at: Some(occurrence.offset),
                    replace_length: occurrence.length,
                    strip_following_newline: true,
                    ..InsertOptions::default()
                },
            );

            // Nested includes resolve relative to the file just included.
            current = resolved_name;
        }
    }

    Err(ParseError::from(
        Diagnostic::error(format!(
            "maximum include iterations ({max_iterations}) exceeded"
        ))
        .with_code(ErrorCode::E201)
        .with_help("this usually indicates circular includes"),
    ))
}

/// Scans for `include <path>` occurrences outside strings and comments.
///
/// A linear scan tracking an in-string / in-line-comment / in-block-
/// comment state machine; only word-boundary-delimited `include` tokens
/// count, and a directive that spans multiple lines is skipped.
fn find_valid_includes(code: &str) -> Vec<IncludeOccurrence> {
    let bytes = code.as_bytes();
    let mut occurrences = Vec::new();
    let mut i = 0;
    let mut in_string = false;
    let mut string_delimiter = 0u8;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while i < bytes.len() {
        let ch = bytes[i];
        let next = bytes.get(i + 1).copied();

        if !in_line_comment && !in_block_comment {
            if ch == b'"' || ch == b'\'' {
                if !in_string {
                    in_string = true;
                    string_delimiter = ch;
                } else if ch == string_delimiter && (i == 0 || bytes[i - 1] != b'\\') {
                    in_string = false;
                }
            } else if in_string && ch == b'\\' && next == Some(string_delimiter) {
                i += 1;
            }
        }

        if !in_string && !in_block_comment {
            if ch == b'/' && next == Some(b'/') {
                in_line_comment = true;
                i += 1;
            } else if in_line_comment && ch == b'\n' {
                in_line_comment = false;
            }
        }

        if !in_string && !in_line_comment {
            if ch == b'/' && next == Some(b'*') {
                in_block_comment = true;
                i += 1;
            } else if in_block_comment && ch == b'*' && next == Some(b'/') {
                in_block_comment = false;
                i += 1;
            }
        }

        if !in_string
            && !in_line_comment
            && !in_block_comment
            && code[i..].starts_with("include")
            && (i == 0 || !is_word_byte(bytes[i - 1]))
        {
            let after_keyword = skip_whitespace(bytes, i + "include".len());
            if bytes.get(after_keyword) == Some(&b'<') {
                let path_start = after_keyword + 1;
                let mut path_end = path_start;
                let mut closed = false;
                while path_end < bytes.len() {
                    match bytes[path_end] {
                        b'>' => {
                            closed = true;
                            break;
                        }
                        // Multi-line directives are not substituted.
                        b'\n' => break,
                        _ => path_end += 1,
                    }
                }
                if closed {
                    let path = code[path_start..path_end].trim();
                    if !path.is_empty() {
                        let end = path_end + 1;
                        occurrences.push(IncludeOccurrence {
                            offset: i,
                            length: end - i,
                            path: path.to_string(),
                        });
                        i = end;
                        continue;
                    }
                }
            }
        }

        i += 1;
    }

    occurrences
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn skip_whitespace(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\n' | b'\r') {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn origin(name: &str) -> Origin {
        Origin::new(name)
    }

    #[test]
    fn test_single_origin_roundtrip() {
        let mut map = SourceMap::new();
        map.add_origin(origin("main.scad"), "x = 5;\ny = 10;\n");

        let location = map.location_of(7);
        assert_eq!(location.origin(), origin("main.scad"));
        assert_eq!(location.line(), 2);
        assert_eq!(location.column(), 1);
    }

    #[test]
    fn test_append_returns_end_offset() {
        let mut map = SourceMap::new();
        assert_eq!(map.add_origin(origin("a"), "abc"), 0);
        assert_eq!(map.add_origin(origin("b"), "def"), 3);
        assert_eq!(map.combined_text(), "abcdef");
    }

    #[test]
    fn test_insert_shifts_following_segments() {
        let mut map = SourceMap::new();
        map.add_origin(origin("a"), "head ");
        map.add_origin(origin("b"), "tail");
        map.add_origin_with(
            origin("mid"),
            "mid ",
            InsertOptions {
                insert_at: Some(5),
                ..InsertOptions::default()
            },
        );
        assert_eq!(map.combined_text(), "head mid tail");

        let location = map.location_of(9);
        assert_eq!(location.origin(), origin("b"));
        assert_eq!(location.column(), 1);
    }

    #[test]
    fn test_replace_splits_segment() {
        let mut map = SourceMap::new();
        map.add_origin(origin("main"), "before REPLACED after");
        // Replace "REPLACED" (offset 7, length 8) with new content.
        map.add_origin_with(
            origin("lib"),
            "new",
            InsertOptions {
                insert_at: Some(7),
                replace_length: 8,
                ..InsertOptions::default()
            },
        );
        assert_eq!(map.combined_text(), "before new after");

        // The before piece still maps to main at column 1.
        assert_eq!(map.location_of(0).origin(), origin("main"));
        // The replacement maps to lib.
        assert_eq!(map.location_of(7).origin(), origin("lib"));
        // The after piece maps back to main with its original column: the
        // 'a' of "after" sat at column 17 of the source line.
        let after = map.location_of(11);
        assert_eq!(after.origin(), origin("main"));
        assert_eq!(after.line(), 1);
        assert_eq!(after.column(), 17);
    }

    #[test]
    fn test_split_recomputes_line_for_after_piece() {
        let mut map = SourceMap::new();
        map.add_origin(origin("main"), "x = 1;\ninclude <lib>\ny = 2;\n");
        // Replace "include <lib>" (offset 7, length 13).
        map.add_origin_with(
            origin("lib"),
            "z = 20;",
            InsertOptions {
                insert_at: Some(7),
                replace_length: 13,
                strip_following_newline: true,
                ..InsertOptions::default()
            },
        );
        assert_eq!(map.combined_text(), "x = 1;\nz = 20;y = 2;\n");

        // The after piece starts at line 3 column 1 of main.
        let after = map.location_of(14);
        assert_eq!(after.origin(), origin("main"));
        assert_eq!(after.line(), 3);
        assert_eq!(after.column(), 1);
    }

    #[test]
    fn test_location_past_end_clamps() {
        let mut map = SourceMap::new();
        map.add_origin(origin("main"), "abc");
        let location = map.location_of(100);
        assert_eq!(location.origin(), origin("main"));
        assert_eq!(location.column(), 4);
    }

    #[test]
    fn test_empty_map_location() {
        let map = SourceMap::new();
        let location = map.location_of(5);
        assert_eq!(location.line(), 1);
        assert_eq!(location.column(), 1);
    }

    #[test]
    fn test_gap_padded_with_spaces() {
        let mut map = SourceMap::new();
        map.add_origin_with(
            origin("late"),
            "xy",
            InsertOptions {
                insert_at: Some(4),
                ..InsertOptions::default()
            },
        );
        assert_eq!(map.combined_text(), "    xy");
    }

    #[test]
    fn test_find_valid_includes_basic() {
        let found = find_valid_includes("x = 5;\ninclude <lib.scad>\ny = 10;\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "lib.scad");
        assert_eq!(found[0].offset, 7);
        assert_eq!(found[0].length, "include <lib.scad>".len());
    }

    #[test]
    fn test_find_valid_includes_skips_strings_and_comments() {
        let code = concat!(
            "s = \"include <fake>\";\n",
            "// include <fake>\n",
            "/* include <fake> */\n",
            "include <real>\n",
        );
        let found = find_valid_includes(code);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "real");
    }

    #[test]
    fn test_find_valid_includes_word_boundary() {
        let found = find_valid_includes("reinclude <lib>\nmy_include <lib>\n");
        assert!(found.is_empty());
    }

    #[test]
    fn test_find_valid_includes_multiline_skipped() {
        let found = find_valid_includes("include <lib\n.scad>\n");
        assert!(found.is_empty());
    }

    /// In-memory resolver used by the expansion tests.
    struct MapResolver {
        files: HashMap<String, String>,
    }

    impl MapResolver {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(name, content)| (name.to_string(), content.to_string()))
                    .collect(),
            }
        }
    }

    impl IncludeResolver for MapResolver {
        fn resolve(&self, _current_origin: &str, path: &str) -> Option<PathBuf> {
            self.files.contains_key(path).then(|| PathBuf::from(path))
        }

        fn read(&self, path: &Path) -> io::Result<String> {
            self.files
                .get(&path.to_string_lossy().into_owned())
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing file"))
        }
    }

    #[test]
    fn test_expand_includes_substitutes_content() {
        let resolver = MapResolver::new(&[("lib", "z = 20;\n")]);
        let mut map = SourceMap::new();
        map.add_origin(origin("main"), "x = 5;\ninclude <lib>\ny = 10;\n");

        expand_includes(&mut map, origin("main"), &resolver, 100).unwrap();

        let combined = map.combined_text().to_string();
        let x = combined.find("x = 5;").unwrap();
        let z = combined.find("z = 20;").unwrap();
        let y = combined.find("y = 10;").unwrap();
        assert!(x < z && z < y, "expanded order wrong: {combined:?}");
        assert!(!combined.contains("include"));
    }

    #[test]
    fn test_expand_includes_nested() {
        let resolver = MapResolver::new(&[("a", "include <b>\n"), ("b", "inner = 1;\n")]);
        let mut map = SourceMap::new();
        map.add_origin(origin("main"), "include <a>\n");

        expand_includes(&mut map, origin("main"), &resolver, 100).unwrap();
        assert!(map.combined_text().contains("inner = 1;"));
    }

    #[test]
    fn test_expand_includes_inside_string_untouched() {
        let resolver = MapResolver::new(&[]);
        let mut map = SourceMap::new();
        map.add_origin(origin("main"), "s = \"include <lib>\";\n");

        expand_includes(&mut map, origin("main"), &resolver, 100).unwrap();
        assert!(map.combined_text().contains("include <lib>"));
    }

    #[test]
    fn test_expand_includes_not_found() {
        let resolver = MapResolver::new(&[]);
        let mut map = SourceMap::new();
        map.add_origin(origin("main"), "include <missing>\n");

        let err = expand_includes(&mut map, origin("main"), &resolver, 100).unwrap_err();
        assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E200));
    }

    #[test]
    fn test_expand_includes_circular_terminates() {
        let resolver = MapResolver::new(&[("a", "include <b>\n"), ("b", "include <a>\n")]);
        let mut map = SourceMap::new();
        map.add_origin(origin("main"), "include <a>\n");

        let err = expand_includes(&mut map, origin("main"), &resolver, 10).unwrap_err();
        assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E201));
    }

    #[test]
    fn test_expanded_positions_map_to_origins() {
        let resolver = MapResolver::new(&[("lib", "z = 20;\n")]);
        let mut map = SourceMap::new();
        map.add_origin(origin("main"), "x = 5;\ninclude <lib>\ny = 10;\n");
        expand_includes(&mut map, origin("main"), &resolver, 100).unwrap();

        let combined = map.combined_text().to_string();
        let z = combined.find("z = 20;").unwrap();
        let y = combined.find("y = 10;").unwrap();

        assert_eq!(map.location_of(z).origin(), origin("lib"));
        let y_location = map.location_of(y);
        assert_eq!(y_location.origin(), origin("main"));
        assert_eq!(y_location.line(), 3);
        assert_eq!(y_location.column(), 1);
    }
}
