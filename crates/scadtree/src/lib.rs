//! Scadtree - an OpenSCAD syntax toolkit.
//!
//! Parsing, scope resolution, and multi-file include expansion for the
//! OpenSCAD 3D-modelling description language. Source text is turned into
//! a fully typed, source-position-annotated abstract syntax tree; lexical
//! scoping is resolved over the finished tree; and `include` directives
//! are textually expanded while error locations keep pointing back at the
//! original files.
//!
//! No evaluation is performed: the crate produces and annotates syntax
//! trees only.

pub mod config;

mod error;

pub use scadtree_core::{ast, resolve, scope};
pub use scadtree_core::{Origin, Position, ScopeTree};
pub use scadtree_parser::{
    Builder, IncludeResolver, InsertOptions, ParseError, SourceMap, expand_includes,
};

pub use config::ParseConfig;
pub use error::ScadError;

use log::{debug, info, trace};

use scadtree_core::ast::Statement;

/// The result of a pipeline run: the typed AST, its resolved scope tree,
/// and the source map the positions were translated through (present when
/// parsing went through include expansion).
#[derive(Debug)]
pub struct Ast {
    /// Top-level statements in source order.
    pub statements: Vec<Statement>,
    /// The scope tree; every AST node's `scope` cell points into it.
    pub scopes: ScopeTree,
    /// The source map used for position translation, if any.
    pub source_map: Option<SourceMap>,
}

/// The end-to-end parse pipeline.
///
/// Runs source text through tokenizing, parsing, AST construction, and
/// scope resolution. Each run owns its own state exclusively; construct
/// one pipeline per thread for parallel parsing of independent files.
///
/// # Examples
///
/// ```
/// use scadtree::{ParseConfig, Pipeline};
///
/// let pipeline = Pipeline::new(ParseConfig::default());
/// let ast = pipeline.parse_source("x = 1 + 2;\ncube(x);").expect("valid source");
///
/// assert_eq!(ast.statements.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct Pipeline {
    config: ParseConfig,
}

impl Pipeline {
    /// Creates a pipeline with the given configuration.
    pub fn new(config: ParseConfig) -> Self {
        Self { config }
    }

    /// Parses source text with the origin `"<input>"`.
    ///
    /// Positions are computed by plain line/column counting over the raw
    /// text; `include` directives stay in the tree as directive nodes.
    pub fn parse_source(&self, source: &str) -> Result<Ast, ScadError> {
        self.parse_origin("<input>", source)
    }

    /// Parses source text attributed to a named origin.
    pub fn parse_origin(&self, origin: &str, source: &str) -> Result<Ast, ScadError> {
        info!("parsing origin {origin}");

        let program = scadtree_parser::parse(source)
            .map_err(|err| ScadError::new_parse_error(err, source))?;

        let statements = Builder::new(source)
            .with_origin(Origin::new(origin))
            .with_comments(self.config.include_comments())
            .build(&program);
        debug!("built {} top-level statements", statements.len());

        let scopes = resolve(&statements);
        trace!("resolved {} scopes", scopes.len());

        Ok(Ast {
            statements,
            scopes,
            source_map: None,
        })
    }

    /// Expands includes in `map`, then parses the combined buffer.
    ///
    /// File discovery and reading go through `resolver`; expansion stops
    /// with an error when a file cannot be resolved or the configured
    /// iteration bound is exceeded (likely circular includes). Node
    /// positions are translated through the map back to their original
    /// origins.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io;
    /// use std::path::{Path, PathBuf};
    ///
    /// use scadtree::{IncludeResolver, ParseConfig, Pipeline, SourceMap, Origin};
    ///
    /// struct OneFile;
    ///
    /// impl IncludeResolver for OneFile {
    ///     fn resolve(&self, _from: &str, path: &str) -> Option<PathBuf> {
    ///         (path == "lib").then(|| PathBuf::from("lib"))
    ///     }
    ///     fn read(&self, _path: &Path) -> io::Result<String> {
    ///         Ok("z = 20;\n".to_string())
    ///     }
    /// }
    ///
    /// let mut map = SourceMap::new();
    /// map.add_origin(Origin::new("main"), "x = 5;\ninclude <lib>\ny = 10;\n");
    ///
    /// let pipeline = Pipeline::new(ParseConfig::default());
    /// let ast = pipeline.parse_with_includes(map, "main", &OneFile).expect("valid source");
    /// assert_eq!(ast.statements.len(), 3);
    /// ```
    pub fn parse_with_includes(
        &self,
        mut map: SourceMap,
        origin: &str,
        resolver: &dyn IncludeResolver,
    ) -> Result<Ast, ScadError> {
        info!("expanding includes from origin {origin}");
        expand_includes(
            &mut map,
            Origin::new(origin),
            resolver,
            self.config.max_include_iterations(),
        )
        .map_err(ScadError::Include)?;

        let source = map.combined_text().to_string();
        debug!("combined buffer is {} chars", source.len());

        let program = scadtree_parser::parse(&source)
            .map_err(|err| ScadError::new_parse_error(err, source.clone()))?;

        let statements = Builder::new(&source)
            .with_source_map(&map)
            .with_comments(self.config.include_comments())
            .build(&program);
        debug!("built {} top-level statements", statements.len());

        let scopes = resolve(&statements);
        trace!("resolved {} scopes", scopes.len());

        Ok(Ast {
            statements,
            scopes,
            source_map: Some(map),
        })
    }
}
