//! # Scadtree Parser
//!
//! Parser for the OpenSCAD language: lexer, grammar, typed concrete parse
//! tree, AST builder, source map with include expansion, and the
//! diagnostic system.
//!
//! The pipeline runs in stages, each a pure function of its input:
//!
//! 1. **Combine** - a [`SourceMap`] merges one or more origins into a
//!    single buffer, optionally expanding `include` directives through
//!    [`expand_includes`]
//! 2. **Tokenize** - error-recovering lexical analysis
//! 3. **Parse** - the winnow grammar produces a typed concrete parse tree
//! 4. **Build** - the [`Builder`] transforms the parse tree into the AST
//!    defined by `scadtree-core`, stamping every node with a source
//!    position translated through the source map
//!
//! Scope resolution lives in `scadtree-core` and runs on the finished
//! AST.
//!
//! ## Usage
//!
//! ```
//! use scadtree_parser::{Builder, parse};
//!
//! let source = "x = 1 + 2;\ncube(x);";
//! let program = parse(source)?;
//! let statements = Builder::new(source).build(&program);
//! assert_eq!(statements.len(), 2);
//! # Ok::<(), scadtree_parser::ParseError>(())
//! ```

mod builder;
pub mod cst;
pub mod error;
mod lexer;
mod parser;
pub mod source_map;
mod span;
mod tokens;

pub use builder::Builder;
pub use error::ParseError;
pub use source_map::{
    IncludeResolver, InsertOptions, SourceMap, SourceSegment, expand_includes,
};
pub use span::Span;

use cst::CstProgram;

/// Parse source text into a concrete parse tree.
///
/// Tokenizes and parses the text. A failed parse returns a
/// [`ParseError`] carrying every collected diagnostic and the failing
/// offset; it never aborts the process.
pub fn parse(source: &str) -> Result<CstProgram<'_>, ParseError> {
    let tokens = lexer::tokenize(source)?;
    parser::parse_program(&tokens)
}
