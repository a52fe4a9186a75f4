//! The OpenSCAD abstract syntax tree.
//!
//! A closed set of typed node families produced by the parser crate's
//! builder and annotated by the [scope resolver](crate::resolve). Every
//! node owns a [`Position`] and a write-once [`ScopeRef`] that the
//! resolver fills in exactly once; nothing else mutates a constructed
//! tree.
//!
//! Node kinds are enumerable through [`NodeKind`] so external tooling
//! (serializers, analyzers) can walk the tree without knowing the concrete
//! types up front.

mod expr;
mod modular;

pub use expr::{BinaryOp, Expression, ExpressionKind, UnaryOp, VectorElement, VectorElementKind};
pub use modular::{Modifier, ModuleInstantiation, ModuleInstantiationKind};

use std::cell::OnceCell;
use std::fmt;

use crate::position::Position;
use crate::scope::ScopeId;

/// Write-once reference to the lexical scope enclosing a node.
///
/// Unset until the scope resolver runs; the resolver writes each node's
/// scope exactly once. A second write indicates a resolver defect and is
/// rejected in debug builds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeRef(OnceCell<ScopeId>);

impl ScopeRef {
    /// Creates an empty (unresolved) scope reference.
    pub fn new() -> Self {
        Self(OnceCell::new())
    }

    /// The scope this node was resolved into, if resolution has run.
    pub fn get(&self) -> Option<ScopeId> {
        self.0.get().copied()
    }

    /// Writes the scope reference. Write-once.
    pub fn set(&self, id: ScopeId) {
        let result = self.0.set(id);
        debug_assert!(result.is_ok(), "scope reference written twice");
    }
}

/// Enumeration of every node kind in the tree.
///
/// Exposed so an external serializer can dispatch over a closed set
/// without pattern-matching the concrete node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // Expressions
    Identifier,
    StringLiteral,
    NumberLiteral,
    BooleanLiteral,
    UndefinedLiteral,
    RangeLiteral,
    UnaryOp,
    BinaryOp,
    TernaryOp,
    LetOp,
    EchoOp,
    AssertOp,
    FunctionLiteral,
    Call,
    Index,
    Member,
    Vector,
    // Comprehension elements
    ElementExpr,
    ElementLet,
    ElementEach,
    ElementFor,
    ElementCFor,
    ElementIf,
    ElementIfElse,
    // Module instantiations
    ModularCall,
    ModularFor,
    ModularCFor,
    ModularIntersectionFor,
    ModularIntersectionCFor,
    ModularLet,
    ModularEcho,
    ModularAssert,
    ModularIf,
    ModularIfElse,
    ModifierShowOnly,
    ModifierHighlight,
    ModifierBackground,
    ModifierDisable,
    // Declarations and directives
    ModuleDeclaration,
    FunctionDeclaration,
    UseDirective,
    IncludeDirective,
    // Auxiliary
    Assignment,
    ParameterDeclaration,
    PositionalArgument,
    NamedArgument,
    CommentLine,
    CommentBlock,
}

/// A name occurrence: variable, function, module, member, or parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub position: Position,
    pub scope: ScopeRef,
}

impl Identifier {
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        Self {
            name: name.into(),
            position,
            scope: ScopeRef::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::Identifier
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// `name = expr` at top level, in bodies, in `let`/`for` headers.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: Identifier,
    pub value: Expression,
    pub position: Position,
    pub scope: ScopeRef,
}

impl Assignment {
    pub fn new(name: Identifier, value: Expression, position: Position) -> Self {
        Self {
            name,
            value,
            position,
            scope: ScopeRef::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::Assignment
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

/// A declared parameter of a module, function, or function literal.
///
/// The default expression, when present, is resolved in the *enclosing*
/// scope, not the parameter's own scope: defaults are conceptually
/// evaluated at call time in the caller's context.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDeclaration {
    pub name: Identifier,
    pub default: Option<Expression>,
    pub position: Position,
    pub scope: ScopeRef,
}

impl ParameterDeclaration {
    pub fn new(name: Identifier, default: Option<Expression>, position: Position) -> Self {
        Self {
            name,
            default,
            position,
            scope: ScopeRef::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::ParameterDeclaration
    }
}

impl fmt::Display for ParameterDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.default {
            Some(default) => write!(f, "{} = {}", self.name, default),
            None => write!(f, "{}", self.name),
        }
    }
}

/// How an argument was passed at a call site.
///
/// Positional and named arguments are distinguished by tag at parse time;
/// the distinction is never re-inferred from shape afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentKind {
    Positional(Expression),
    Named { name: Identifier, value: Expression },
}

/// One argument in a call, `echo`, or `assert` argument list.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub kind: ArgumentKind,
    pub position: Position,
    pub scope: ScopeRef,
}

impl Argument {
    pub fn positional(value: Expression, position: Position) -> Self {
        Self {
            kind: ArgumentKind::Positional(value),
            position,
            scope: ScopeRef::new(),
        }
    }

    pub fn named(name: Identifier, value: Expression, position: Position) -> Self {
        Self {
            kind: ArgumentKind::Named { name, value },
            position,
            scope: ScopeRef::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self.kind {
            ArgumentKind::Positional(_) => NodeKind::PositionalArgument,
            ArgumentKind::Named { .. } => NodeKind::NamedArgument,
        }
    }

    /// The argument's value expression, whichever way it was passed.
    pub fn value(&self) -> &Expression {
        match &self.kind {
            ArgumentKind::Positional(value) => value,
            ArgumentKind::Named { value, .. } => value,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ArgumentKind::Positional(value) => write!(f, "{value}"),
            ArgumentKind::Named { name, value } => write!(f, "{name} = {value}"),
        }
    }
}

/// `module name(parameters) body`
///
/// The body keeps its full statement list (assignments and nested
/// declarations included) so hoisting can see them.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDeclaration {
    pub name: Identifier,
    pub parameters: Vec<ParameterDeclaration>,
    pub children: Vec<Statement>,
    pub position: Position,
    pub scope: ScopeRef,
}

impl ModuleDeclaration {
    pub fn kind(&self) -> NodeKind {
        NodeKind::ModuleDeclaration
    }
}

impl fmt::Display for ModuleDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module {}(", self.name)?;
        fmt_list(f, &self.parameters)?;
        write!(f, ") {{ ")?;
        fmt_list(f, &self.children)?;
        write!(f, " }}")
    }
}

/// `function name(parameters) = body;`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: Identifier,
    pub parameters: Vec<ParameterDeclaration>,
    pub body: Expression,
    pub position: Position,
    pub scope: ScopeRef,
}

impl FunctionDeclaration {
    pub fn kind(&self) -> NodeKind {
        NodeKind::FunctionDeclaration
    }
}

impl fmt::Display for FunctionDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {}(", self.name)?;
        fmt_list(f, &self.parameters)?;
        write!(f, ") = {};", self.body)
    }
}

/// `use <path>`: imports definitions; never textually substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct UseDirective {
    pub path: String,
    pub position: Position,
    pub scope: ScopeRef,
}

impl UseDirective {
    pub fn kind(&self) -> NodeKind {
        NodeKind::UseDirective
    }
}

impl fmt::Display for UseDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "use <{}>", self.path)
    }
}

/// `include <path>`
///
/// Present in the AST whenever expansion was not requested (or the
/// directive survived expansion inside a string or comment scan).
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeDirective {
    pub path: String,
    pub position: Position,
    pub scope: ScopeRef,
}

impl IncludeDirective {
    pub fn kind(&self) -> NodeKind {
        NodeKind::IncludeDirective
    }
}

impl fmt::Display for IncludeDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "include <{}>", self.path)
    }
}

/// The flavor of a retained comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// `// …` to end of line.
    Line,
    /// `/* … */`, possibly spanning lines.
    Block,
}

/// A source comment, retained only when comment inclusion is requested.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub comment_kind: CommentKind,
    pub text: String,
    pub position: Position,
    pub scope: ScopeRef,
}

impl Comment {
    pub fn kind(&self) -> NodeKind {
        match self.comment_kind {
            CommentKind::Line => NodeKind::CommentLine,
            CommentKind::Block => NodeKind::CommentBlock,
        }
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.comment_kind {
            CommentKind::Line => write!(f, "//{}", self.text),
            CommentKind::Block => write!(f, "/*{}*/", self.text),
        }
    }
}

/// One statement of a program or body.
///
/// Brace blocks do not appear here: the builder flattens them into the
/// surrounding statement list.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment(Assignment),
    ModuleDeclaration(ModuleDeclaration),
    FunctionDeclaration(FunctionDeclaration),
    Instantiation(ModuleInstantiation),
    Use(UseDirective),
    Include(IncludeDirective),
    Comment(Comment),
}

impl Statement {
    pub fn kind(&self) -> NodeKind {
        match self {
            Statement::Assignment(node) => node.kind(),
            Statement::ModuleDeclaration(node) => node.kind(),
            Statement::FunctionDeclaration(node) => node.kind(),
            Statement::Instantiation(node) => node.kind(),
            Statement::Use(node) => node.kind(),
            Statement::Include(node) => node.kind(),
            Statement::Comment(node) => node.kind(),
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Statement::Assignment(node) => node.position,
            Statement::ModuleDeclaration(node) => node.position,
            Statement::FunctionDeclaration(node) => node.position,
            Statement::Instantiation(node) => node.position,
            Statement::Use(node) => node.position,
            Statement::Include(node) => node.position,
            Statement::Comment(node) => node.position,
        }
    }

    pub fn scope(&self) -> &ScopeRef {
        match self {
            Statement::Assignment(node) => &node.scope,
            Statement::ModuleDeclaration(node) => &node.scope,
            Statement::FunctionDeclaration(node) => &node.scope,
            Statement::Instantiation(node) => &node.scope,
            Statement::Use(node) => &node.scope,
            Statement::Include(node) => &node.scope,
            Statement::Comment(node) => &node.scope,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assignment(node) => write!(f, "{node};"),
            Statement::ModuleDeclaration(node) => write!(f, "{node}"),
            Statement::FunctionDeclaration(node) => write!(f, "{node}"),
            Statement::Instantiation(node) => write!(f, "{node}"),
            Statement::Use(node) => write!(f, "{node}"),
            Statement::Include(node) => write!(f, "{node}"),
            Statement::Comment(node) => write!(f, "{node}"),
        }
    }
}

pub(crate) fn fmt_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
