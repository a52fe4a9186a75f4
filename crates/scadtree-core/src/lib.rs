//! # Scadtree Core
//!
//! Core types for the scadtree OpenSCAD syntax toolkit: the typed AST,
//! source positions and origins, the lexical scope tree, and the scope
//! resolver.
//!
//! This crate holds no parsing logic; the [`scadtree-parser`] crate
//! produces the trees defined here, and [`resolve`](resolve::resolve)
//! annotates them with scope information afterwards.
//!
//! [`scadtree-parser`]: https://docs.rs/scadtree-parser

pub mod ast;
pub mod origin;
pub mod position;
pub mod resolve;
pub mod scope;

pub use origin::Origin;
pub use position::Position;
pub use resolve::resolve;
pub use scope::{Declaration, DeclarationKind, Scope, ScopeId, ScopeTree};
