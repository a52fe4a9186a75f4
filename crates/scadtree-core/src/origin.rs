//! Source-origin identifiers using string interning.
//!
//! An [`Origin`] names where a piece of source text came from: a file path,
//! an editor buffer marker such as `"<editor>"`, or a test fixture name.
//! Every AST position carries one, so origins are interned to keep
//! [`Position`](crate::position::Position) cheap to copy and compare.

use std::{
    fmt,
    sync::{Mutex, OnceLock},
};

use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner for origin identifiers.
///
/// # Thread Safety
///
/// Uses a `Mutex` for thread-safe access to the interner.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

/// Interned identifier for a source origin.
///
/// # Examples
///
/// ```
/// use scadtree_core::origin::Origin;
///
/// let main = Origin::new("main.scad");
/// let editor = Origin::new("<editor>");
///
/// assert_eq!(main, Origin::new("main.scad"));
/// assert_ne!(main, editor);
/// assert_eq!(main.as_str(), "main.scad");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin(DefaultSymbol);

impl Origin {
    /// Creates an `Origin` from its string representation, interning it.
    pub fn new(name: &str) -> Self {
        let mut interner = INTERNER
            .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
            .lock()
            .expect("Failed to acquire interner lock");
        let symbol = interner.get_or_intern(name);
        Self(symbol)
    }

    /// An empty origin, used when no origin information is available.
    pub fn unknown() -> Self {
        Self::new("")
    }

    /// Resolves the origin back to its string representation.
    pub fn as_str(&self) -> String {
        let interner = INTERNER
            .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
            .lock()
            .expect("Failed to acquire interner lock");
        interner
            .resolve(self.0)
            .expect("Origin symbol should exist in interner")
            .to_string()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Origin {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
