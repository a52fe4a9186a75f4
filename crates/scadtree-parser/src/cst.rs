//! The typed concrete parse tree.
//!
//! Each grammar rule produces a strongly-typed, field-named record rather
//! than an untyped child list, so the AST builder disambiguates rule
//! shapes by structural match instead of child counting. Binary precedence
//! levels keep their flat `first + (operator, operand)*` chains, unary
//! rules keep their prefix-operator runs, and postfix rules keep their
//! suffix lists; the [builder](crate::builder) performs the associativity
//! folding.
//!
//! Nodes borrow string data from the source text; spans are byte ranges in
//! the combined parse buffer.

use scadtree_core::ast::Modifier;

use crate::span::Span;

/// A parsed program: the ordered top-level items.
#[derive(Debug, Clone, PartialEq)]
pub struct CstProgram<'src> {
    pub items: Vec<CstItem<'src>>,
}

/// One top-level item.
#[derive(Debug, Clone, PartialEq)]
pub enum CstItem<'src> {
    Use(CstDirective<'src>),
    Include(CstDirective<'src>),
    Statement(CstStatement<'src>),
    /// A top-level comment; dropped by the builder unless comment
    /// retention is requested.
    Comment(CstComment<'src>),
}

/// A `use <path>` or `include <path>` directive.
#[derive(Debug, Clone, PartialEq)]
pub struct CstDirective<'src> {
    /// The text between `<` and `>`.
    pub path: &'src str,
    pub span: Span,
}

/// A retained source comment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CstComment<'src> {
    pub text: &'src str,
    pub block: bool,
    pub span: Span,
}

/// A general statement.
#[derive(Debug, Clone, PartialEq)]
pub enum CstStatement<'src> {
    /// A bare `;`.
    Empty { span: Span },
    /// A brace-delimited block; flattened by the builder.
    Block { statements: Vec<CstStatement<'src>>, span: Span },
    ModuleDeclaration(CstModuleDeclaration<'src>),
    FunctionDeclaration(CstFunctionDeclaration<'src>),
    Instantiation(CstInstantiation<'src>),
    Assignment(CstAssignment<'src>),
}

impl CstStatement<'_> {
    pub fn span(&self) -> Span {
        match self {
            CstStatement::Empty { span } => *span,
            CstStatement::Block { span, .. } => *span,
            CstStatement::ModuleDeclaration(node) => node.span,
            CstStatement::FunctionDeclaration(node) => node.span,
            CstStatement::Instantiation(node) => node.span,
            CstStatement::Assignment(node) => node.span,
        }
    }
}

/// `module name(parameters) body`
#[derive(Debug, Clone, PartialEq)]
pub struct CstModuleDeclaration<'src> {
    pub name: CstIdent<'src>,
    pub parameters: Vec<CstParameter<'src>>,
    pub body: Box<CstStatement<'src>>,
    pub span: Span,
}

/// `function name(parameters) = body;`
#[derive(Debug, Clone, PartialEq)]
pub struct CstFunctionDeclaration<'src> {
    pub name: CstIdent<'src>,
    pub parameters: Vec<CstParameter<'src>>,
    pub body: CstExpr<'src>,
    pub span: Span,
}

/// A module instantiation.
///
/// Simple and C-style `for` headers are distinct records at parse time;
/// so are `if` with and without `else`.
#[derive(Debug, Clone, PartialEq)]
pub struct CstInstantiation<'src> {
    pub kind: CstInstantiationKind<'src>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CstInstantiationKind<'src> {
    /// `!`/`#`/`%`/`*` prefix wrapping an inner instantiation.
    Modifier {
        modifier: Modifier,
        child: Box<CstInstantiation<'src>>,
    },
    If {
        condition: CstExpr<'src>,
        then_body: Box<CstStatement<'src>>,
    },
    IfElse {
        condition: CstExpr<'src>,
        then_body: Box<CstStatement<'src>>,
        else_body: Box<CstStatement<'src>>,
    },
    For {
        assignments: Vec<CstAssignment<'src>>,
        body: Box<CstStatement<'src>>,
    },
    CFor {
        init: Vec<CstAssignment<'src>>,
        condition: CstExpr<'src>,
        increment: Vec<CstAssignment<'src>>,
        body: Box<CstStatement<'src>>,
    },
    IntersectionFor {
        assignments: Vec<CstAssignment<'src>>,
        body: Box<CstStatement<'src>>,
    },
    IntersectionCFor {
        init: Vec<CstAssignment<'src>>,
        condition: CstExpr<'src>,
        increment: Vec<CstAssignment<'src>>,
        body: Box<CstStatement<'src>>,
    },
    Let {
        assignments: Vec<CstAssignment<'src>>,
        body: Box<CstStatement<'src>>,
    },
    Echo {
        arguments: Vec<CstArgument<'src>>,
        body: Box<CstStatement<'src>>,
    },
    Assert {
        arguments: Vec<CstArgument<'src>>,
        body: Box<CstStatement<'src>>,
    },
    Call {
        name: CstIdent<'src>,
        arguments: Vec<CstArgument<'src>>,
        body: Box<CstStatement<'src>>,
    },
}

/// An identifier occurrence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CstIdent<'src> {
    pub name: &'src str,
    pub span: Span,
}

/// `name = expr` in statement position or a `let`/`for` header.
#[derive(Debug, Clone, PartialEq)]
pub struct CstAssignment<'src> {
    pub name: CstIdent<'src>,
    pub value: CstExpr<'src>,
    pub span: Span,
}

/// A declared parameter, optionally with a default expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CstParameter<'src> {
    pub name: CstIdent<'src>,
    pub default: Option<CstExpr<'src>>,
    pub span: Span,
}

/// One call argument: positional, or named when `name` is present.
#[derive(Debug, Clone, PartialEq)]
pub struct CstArgument<'src> {
    pub name: Option<CstIdent<'src>>,
    pub value: CstExpr<'src>,
    pub span: Span,
}

/// Separator tokens of the binary precedence chains.
///
/// Closed: the grammar can only ever record one of these, so the builder's
/// operator selection has no "unrecognized separator" case to default from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitOr,
    BitAnd,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Prefix unary operator tokens, including the identity `+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpToken {
    Plus,
    Minus,
    Not,
    BitNot,
}

/// A postfix suffix in a call/index/member chain.
#[derive(Debug, Clone, PartialEq)]
pub enum CstSuffix<'src> {
    Call(Vec<CstArgument<'src>>),
    Index(CstExpr<'src>),
    Member(CstIdent<'src>),
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CstExpr<'src> {
    pub kind: CstExprKind<'src>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CstExprKind<'src> {
    Identifier(&'src str),
    /// Interior text between the quotes, escapes preserved as-is.
    String(&'src str),
    Number(f64),
    True,
    False,
    Undef,
    /// `(expr)`; transparent to the builder.
    Paren(Box<CstExpr<'src>>),
    /// `[start : end]` or `[start : end : step]`.
    Range {
        start: Box<CstExpr<'src>>,
        end: Box<CstExpr<'src>>,
        step: Option<Box<CstExpr<'src>>>,
    },
    /// Bracketed list: vector literal and list comprehension share this rule.
    Vector(Vec<CstVectorElement<'src>>),
    Let {
        assignments: Vec<CstAssignment<'src>>,
        body: Box<CstExpr<'src>>,
    },
    Assert {
        arguments: Vec<CstArgument<'src>>,
        body: Box<CstExpr<'src>>,
    },
    Echo {
        arguments: Vec<CstArgument<'src>>,
        body: Box<CstExpr<'src>>,
    },
    FunctionLiteral {
        parameters: Vec<CstParameter<'src>>,
        body: Box<CstExpr<'src>>,
    },
    Ternary {
        condition: Box<CstExpr<'src>>,
        if_true: Box<CstExpr<'src>>,
        if_false: Box<CstExpr<'src>>,
    },
    /// A flat same-precedence chain; folded left-associatively.
    Chain {
        first: Box<CstExpr<'src>>,
        rest: Vec<(ChainOp, CstExpr<'src>)>,
    },
    /// A run of prefix operators; applied right-to-left.
    Unary {
        ops: Vec<UnaryOpToken>,
        operand: Box<CstExpr<'src>>,
    },
    /// `base ^ exponent`; the grammar recursion already nests this to the
    /// right.
    Exponent {
        base: Box<CstExpr<'src>>,
        exponent: Box<CstExpr<'src>>,
    },
    /// A primary followed by call/index/member suffixes, threaded
    /// left-to-right.
    Postfix {
        primary: Box<CstExpr<'src>>,
        suffixes: Vec<CstSuffix<'src>>,
    },
}

/// One element of a bracketed list.
#[derive(Debug, Clone, PartialEq)]
pub struct CstVectorElement<'src> {
    pub kind: CstVectorElementKind<'src>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CstVectorElementKind<'src> {
    /// A plain expression element.
    Expr(CstExpr<'src>),
    /// A parenthesized comprehension-control form; transparent to the
    /// builder.
    Paren(Box<CstVectorElement<'src>>),
    Let {
        assignments: Vec<CstAssignment<'src>>,
        body: Box<CstVectorElement<'src>>,
    },
    Each(Box<CstVectorElement<'src>>),
    For {
        assignments: Vec<CstAssignment<'src>>,
        body: Box<CstVectorElement<'src>>,
    },
    CFor {
        init: Vec<CstAssignment<'src>>,
        condition: CstExpr<'src>,
        increment: Vec<CstAssignment<'src>>,
        body: Box<CstVectorElement<'src>>,
    },
    If {
        condition: CstExpr<'src>,
        then_body: Box<CstVectorElement<'src>>,
    },
    IfElse {
        condition: CstExpr<'src>,
        then_body: Box<CstVectorElement<'src>>,
        else_body: Box<CstVectorElement<'src>>,
    },
}
