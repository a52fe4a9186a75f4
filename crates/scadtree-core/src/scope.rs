//! Lexical scope tracking.
//!
//! Scopes form a tree: each scope holds three independent name-to-
//! declaration namespaces (variables, functions, modules) and an optional
//! parent. The tree is arena-indexed: [`ScopeTree`] owns every scope and
//! hands out [`ScopeId`] indices, which keeps it acyclic and cheap to
//! inspect in tests.
//!
//! The same name may denote a variable, a function, and a module at the
//! same time without collision. Lookups walk outward through parents until
//! found or the root is exhausted; a failed lookup is `None`, never an
//! error.

use indexmap::IndexMap;

use crate::position::Position;

/// Index of a scope inside its owning [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    /// The root scope of any tree.
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

/// What kind of node introduced a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// A plain `name = expr` assignment.
    Assignment,
    /// A module/function/function-literal parameter.
    Parameter,
    /// A `function name(…) = …;` declaration.
    Function,
    /// A `module name(…) { … }` declaration.
    Module,
}

/// A binding record pointing back at the declaring node.
///
/// Declarations carry the declaring node's name, kind, and position rather
/// than a reference into the AST, keeping the scope tree acyclic. A
/// downstream semantic layer can key on the position to find the node.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    pub position: Position,
}

impl Declaration {
    pub fn new(name: impl Into<String>, kind: DeclarationKind, position: Position) -> Self {
        Self {
            name: name.into(),
            kind,
            position,
        }
    }
}

/// One lexical scope: three namespaces plus a parent link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    parent: Option<ScopeId>,
    variables: IndexMap<String, Declaration>,
    functions: IndexMap<String, Declaration>,
    modules: IndexMap<String, Declaration>,
}

impl Scope {
    fn with_parent(parent: Option<ScopeId>) -> Self {
        Self {
            parent,
            ..Self::default()
        }
    }

    /// The enclosing scope, or `None` for the root.
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Variables defined directly in this scope, in definition order.
    pub fn variables(&self) -> &IndexMap<String, Declaration> {
        &self.variables
    }

    /// Functions defined directly in this scope, in definition order.
    pub fn functions(&self) -> &IndexMap<String, Declaration> {
        &self.functions
    }

    /// Modules defined directly in this scope, in definition order.
    pub fn modules(&self) -> &IndexMap<String, Declaration> {
        &self.modules
    }
}

/// Owning arena for a resolved scope tree.
///
/// Index 0 is always the root. Scopes are only appended, never removed,
/// so every handed-out [`ScopeId`] stays valid for the tree's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    /// Creates a tree containing only an empty root scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    /// The root scope's id.
    pub fn root(&self) -> ScopeId {
        ScopeId::ROOT
    }

    /// Number of scopes in the tree (root included).
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Borrows a scope by id.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Appends a new child scope under `parent` and returns its id.
    pub fn push_child(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::with_parent(Some(parent)));
        id
    }

    /// Defines a variable binding directly in `scope`.
    pub fn define_variable(&mut self, scope: ScopeId, declaration: Declaration) {
        self.scopes[scope.0]
            .variables
            .insert(declaration.name.clone(), declaration);
    }

    /// Defines a function binding directly in `scope`.
    pub fn define_function(&mut self, scope: ScopeId, declaration: Declaration) {
        self.scopes[scope.0]
            .functions
            .insert(declaration.name.clone(), declaration);
    }

    /// Defines a module binding directly in `scope`.
    pub fn define_module(&mut self, scope: ScopeId, declaration: Declaration) {
        self.scopes[scope.0]
            .modules
            .insert(declaration.name.clone(), declaration);
    }

    /// Looks up a variable, walking parent scopes.
    pub fn lookup_variable(&self, scope: ScopeId, name: &str) -> Option<&Declaration> {
        self.lookup(scope, |s| s.variables.get(name))
    }

    /// Looks up a function, walking parent scopes.
    pub fn lookup_function(&self, scope: ScopeId, name: &str) -> Option<&Declaration> {
        self.lookup(scope, |s| s.functions.get(name))
    }

    /// Looks up a module, walking parent scopes.
    pub fn lookup_module(&self, scope: ScopeId, name: &str) -> Option<&Declaration> {
        self.lookup(scope, |s| s.modules.get(name))
    }

    fn lookup<'a>(
        &'a self,
        scope: ScopeId,
        select: impl Fn(&'a Scope) -> Option<&'a Declaration>,
    ) -> Option<&'a Declaration> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(declaration) = select(scope) {
                return Some(declaration);
            }
            current = scope.parent;
        }
        None
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}
