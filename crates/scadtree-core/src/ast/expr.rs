//! Expression and comprehension-element nodes.

use std::fmt;

use crate::position::Position;

use super::{Argument, Assignment, Identifier, NodeKind, ParameterDeclaration, ScopeRef, fmt_list};

/// Prefix unary operators.
///
/// Unary plus is the identity and is folded away during AST construction,
/// so it has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-expr`
    Minus,
    /// `!expr`
    Not,
    /// `~expr`
    BitNot,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Binary operators, one variant per concrete separator token.
///
/// The set is closed: the builder selects a variant from the separator
/// token's identity, and there is no fallback value for an "unrecognized"
/// separator to collapse into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Exponent,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitOr,
    And,
    Or,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Exponent => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// The shape of an expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Identifier(Identifier),
    /// Interior text between the quotes, escape sequences preserved as-is.
    String(String),
    Number(f64),
    Boolean(bool),
    Undef,
    /// `[start : end]` or `[start : end : step]`; a missing step is
    /// materialized as the number literal `1` at construction.
    Range {
        start: Box<Expression>,
        end: Box<Expression>,
        step: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Ternary {
        condition: Box<Expression>,
        if_true: Box<Expression>,
        if_false: Box<Expression>,
    },
    Let {
        assignments: Vec<Assignment>,
        body: Box<Expression>,
    },
    Echo {
        arguments: Vec<Argument>,
        body: Box<Expression>,
    },
    Assert {
        arguments: Vec<Argument>,
        body: Box<Expression>,
    },
    FunctionLiteral {
        parameters: Vec<ParameterDeclaration>,
        body: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Argument>,
    },
    Index {
        target: Box<Expression>,
        index: Box<Expression>,
    },
    Member {
        target: Box<Expression>,
        member: Identifier,
    },
    /// Bracketed list: vector literals and list comprehensions share this
    /// one family; plain elements and comprehension-control elements mix
    /// freely.
    Vector(Vec<VectorElement>),
}

/// An expression with its source position and scope annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub position: Position,
    pub scope: ScopeRef,
}

impl Expression {
    pub fn new(kind: ExpressionKind, position: Position) -> Self {
        Self {
            kind,
            position,
            scope: ScopeRef::new(),
        }
    }

    /// A number literal, used when materializing implicit values such as a
    /// range's default step.
    pub fn number(value: f64, position: Position) -> Self {
        Self::new(ExpressionKind::Number(value), position)
    }

    pub fn kind(&self) -> NodeKind {
        match &self.kind {
            ExpressionKind::Identifier(_) => NodeKind::Identifier,
            ExpressionKind::String(_) => NodeKind::StringLiteral,
            ExpressionKind::Number(_) => NodeKind::NumberLiteral,
            ExpressionKind::Boolean(_) => NodeKind::BooleanLiteral,
            ExpressionKind::Undef => NodeKind::UndefinedLiteral,
            ExpressionKind::Range { .. } => NodeKind::RangeLiteral,
            ExpressionKind::Unary { .. } => NodeKind::UnaryOp,
            ExpressionKind::Binary { .. } => NodeKind::BinaryOp,
            ExpressionKind::Ternary { .. } => NodeKind::TernaryOp,
            ExpressionKind::Let { .. } => NodeKind::LetOp,
            ExpressionKind::Echo { .. } => NodeKind::EchoOp,
            ExpressionKind::Assert { .. } => NodeKind::AssertOp,
            ExpressionKind::FunctionLiteral { .. } => NodeKind::FunctionLiteral,
            ExpressionKind::Call { .. } => NodeKind::Call,
            ExpressionKind::Index { .. } => NodeKind::Index,
            ExpressionKind::Member { .. } => NodeKind::Member,
            ExpressionKind::Vector(_) => NodeKind::Vector,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExpressionKind::Identifier(name) => write!(f, "{name}"),
            ExpressionKind::String(text) => write!(f, "\"{text}\""),
            ExpressionKind::Number(value) => write!(f, "{value}"),
            ExpressionKind::Boolean(value) => write!(f, "{value}"),
            ExpressionKind::Undef => write!(f, "undef"),
            ExpressionKind::Range { start, end, step } => {
                write!(f, "[{start} : {end} : {step}]")
            }
            ExpressionKind::Unary { op, operand } => write!(f, "{op}{operand}"),
            ExpressionKind::Binary { op, left, right } => write!(f, "{left} {op} {right}"),
            ExpressionKind::Ternary {
                condition,
                if_true,
                if_false,
            } => write!(f, "{condition} ? {if_true} : {if_false}"),
            ExpressionKind::Let { assignments, body } => {
                write!(f, "let(")?;
                fmt_list(f, assignments)?;
                write!(f, ") {body}")
            }
            ExpressionKind::Echo { arguments, body } => {
                write!(f, "echo(")?;
                fmt_list(f, arguments)?;
                write!(f, ") {body}")
            }
            ExpressionKind::Assert { arguments, body } => {
                write!(f, "assert(")?;
                fmt_list(f, arguments)?;
                write!(f, ") {body}")
            }
            ExpressionKind::FunctionLiteral { parameters, body } => {
                write!(f, "function(")?;
                fmt_list(f, parameters)?;
                write!(f, ") {body}")
            }
            ExpressionKind::Call { callee, arguments } => {
                write!(f, "{callee}(")?;
                fmt_list(f, arguments)?;
                write!(f, ")")
            }
            ExpressionKind::Index { target, index } => write!(f, "{target}[{index}]"),
            ExpressionKind::Member { target, member } => write!(f, "{target}.{member}"),
            ExpressionKind::Vector(elements) => {
                write!(f, "[")?;
                fmt_list(f, elements)?;
                write!(f, "]")
            }
        }
    }
}

/// The shape of one element in a bracketed list.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorElementKind {
    /// A plain expression element, e.g. the `1` in `[1, 2, 3]`.
    Expr(Expression),
    Let {
        assignments: Vec<Assignment>,
        body: Box<VectorElement>,
    },
    /// `each element`: flattens the nested element's value.
    Each(Box<VectorElement>),
    For {
        assignments: Vec<Assignment>,
        body: Box<VectorElement>,
    },
    CFor {
        init: Vec<Assignment>,
        condition: Expression,
        increment: Vec<Assignment>,
        body: Box<VectorElement>,
    },
    If {
        condition: Expression,
        then_body: Box<VectorElement>,
    },
    IfElse {
        condition: Expression,
        then_body: Box<VectorElement>,
        else_body: Box<VectorElement>,
    },
}

/// One element of a vector literal / list comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorElement {
    pub kind: VectorElementKind,
    pub position: Position,
    pub scope: ScopeRef,
}

impl VectorElement {
    pub fn new(kind: VectorElementKind, position: Position) -> Self {
        Self {
            kind,
            position,
            scope: ScopeRef::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match &self.kind {
            VectorElementKind::Expr(_) => NodeKind::ElementExpr,
            VectorElementKind::Let { .. } => NodeKind::ElementLet,
            VectorElementKind::Each(_) => NodeKind::ElementEach,
            VectorElementKind::For { .. } => NodeKind::ElementFor,
            VectorElementKind::CFor { .. } => NodeKind::ElementCFor,
            VectorElementKind::If { .. } => NodeKind::ElementIf,
            VectorElementKind::IfElse { .. } => NodeKind::ElementIfElse,
        }
    }
}

impl fmt::Display for VectorElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            VectorElementKind::Expr(expr) => write!(f, "{expr}"),
            VectorElementKind::Let { assignments, body } => {
                write!(f, "let(")?;
                fmt_list(f, assignments)?;
                write!(f, ") {body}")
            }
            VectorElementKind::Each(body) => write!(f, "each {body}"),
            VectorElementKind::For { assignments, body } => {
                write!(f, "for (")?;
                fmt_list(f, assignments)?;
                write!(f, ") {body}")
            }
            VectorElementKind::CFor {
                init,
                condition,
                increment,
                body,
            } => {
                write!(f, "for (")?;
                fmt_list(f, init)?;
                write!(f, "; {condition}; ")?;
                fmt_list(f, increment)?;
                write!(f, ") {body}")
            }
            VectorElementKind::If {
                condition,
                then_body,
            } => write!(f, "if ({condition}) {then_body}"),
            VectorElementKind::IfElse {
                condition,
                then_body,
                else_body,
            } => write!(f, "if ({condition}) {then_body} else {else_body}"),
        }
    }
}
