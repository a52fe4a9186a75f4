//! Module-instantiation nodes.

use std::fmt;

use crate::position::Position;

use super::{Argument, Assignment, Expression, Identifier, NodeKind, ScopeRef, Statement, fmt_list};

/// The four single-character instantiation modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// `!`: show only this subtree.
    ShowOnly,
    /// `#`: highlight.
    Highlight,
    /// `%`: render as transparent background.
    Background,
    /// `*`: disable.
    Disable,
}

impl Modifier {
    pub fn symbol(&self) -> &'static str {
        match self {
            Modifier::ShowOnly => "!",
            Modifier::Highlight => "#",
            Modifier::Background => "%",
            Modifier::Disable => "*",
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// The shape of a module instantiation.
///
/// Bodies are full statement lists so hoisting can see assignments and
/// nested declarations inside brace blocks; the builder flattens blocks
/// before these nodes are constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleInstantiationKind {
    Call {
        name: Identifier,
        arguments: Vec<Argument>,
        children: Vec<Statement>,
    },
    For {
        assignments: Vec<Assignment>,
        children: Vec<Statement>,
    },
    CFor {
        init: Vec<Assignment>,
        condition: Expression,
        increment: Vec<Assignment>,
        children: Vec<Statement>,
    },
    IntersectionFor {
        assignments: Vec<Assignment>,
        children: Vec<Statement>,
    },
    IntersectionCFor {
        init: Vec<Assignment>,
        condition: Expression,
        increment: Vec<Assignment>,
        children: Vec<Statement>,
    },
    Let {
        assignments: Vec<Assignment>,
        children: Vec<Statement>,
    },
    Echo {
        arguments: Vec<Argument>,
        children: Vec<Statement>,
    },
    Assert {
        arguments: Vec<Argument>,
        children: Vec<Statement>,
    },
    If {
        condition: Expression,
        then_children: Vec<Statement>,
    },
    IfElse {
        condition: Expression,
        then_children: Vec<Statement>,
        else_children: Vec<Statement>,
    },
    Modifier {
        modifier: Modifier,
        child: Box<ModuleInstantiation>,
    },
}

/// A module instantiation with position and scope annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInstantiation {
    pub kind: ModuleInstantiationKind,
    pub position: Position,
    pub scope: ScopeRef,
}

impl ModuleInstantiation {
    pub fn new(kind: ModuleInstantiationKind, position: Position) -> Self {
        Self {
            kind,
            position,
            scope: ScopeRef::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match &self.kind {
            ModuleInstantiationKind::Call { .. } => NodeKind::ModularCall,
            ModuleInstantiationKind::For { .. } => NodeKind::ModularFor,
            ModuleInstantiationKind::CFor { .. } => NodeKind::ModularCFor,
            ModuleInstantiationKind::IntersectionFor { .. } => NodeKind::ModularIntersectionFor,
            ModuleInstantiationKind::IntersectionCFor { .. } => NodeKind::ModularIntersectionCFor,
            ModuleInstantiationKind::Let { .. } => NodeKind::ModularLet,
            ModuleInstantiationKind::Echo { .. } => NodeKind::ModularEcho,
            ModuleInstantiationKind::Assert { .. } => NodeKind::ModularAssert,
            ModuleInstantiationKind::If { .. } => NodeKind::ModularIf,
            ModuleInstantiationKind::IfElse { .. } => NodeKind::ModularIfElse,
            ModuleInstantiationKind::Modifier { modifier, .. } => match modifier {
                Modifier::ShowOnly => NodeKind::ModifierShowOnly,
                Modifier::Highlight => NodeKind::ModifierHighlight,
                Modifier::Background => NodeKind::ModifierBackground,
                Modifier::Disable => NodeKind::ModifierDisable,
            },
        }
    }
}

impl fmt::Display for ModuleInstantiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ModuleInstantiationKind::Call {
                name,
                arguments,
                children,
            } => {
                write!(f, "{name}(")?;
                fmt_list(f, arguments)?;
                write!(f, ")")?;
                fmt_children(f, children)
            }
            ModuleInstantiationKind::For {
                assignments,
                children,
            } => {
                write!(f, "for (")?;
                fmt_list(f, assignments)?;
                write!(f, ")")?;
                fmt_children(f, children)
            }
            ModuleInstantiationKind::CFor {
                init,
                condition,
                increment,
                children,
            } => {
                write!(f, "for (")?;
                fmt_list(f, init)?;
                write!(f, "; {condition}; ")?;
                fmt_list(f, increment)?;
                write!(f, ")")?;
                fmt_children(f, children)
            }
            ModuleInstantiationKind::IntersectionFor {
                assignments,
                children,
            } => {
                write!(f, "intersection_for (")?;
                fmt_list(f, assignments)?;
                write!(f, ")")?;
                fmt_children(f, children)
            }
            ModuleInstantiationKind::IntersectionCFor {
                init,
                condition,
                increment,
                children,
            } => {
                write!(f, "intersection_for (")?;
                fmt_list(f, init)?;
                write!(f, "; {condition}; ")?;
                fmt_list(f, increment)?;
                write!(f, ")")?;
                fmt_children(f, children)
            }
            ModuleInstantiationKind::Let {
                assignments,
                children,
            } => {
                write!(f, "let (")?;
                fmt_list(f, assignments)?;
                write!(f, ")")?;
                fmt_children(f, children)
            }
            ModuleInstantiationKind::Echo {
                arguments,
                children,
            } => {
                write!(f, "echo(")?;
                fmt_list(f, arguments)?;
                write!(f, ")")?;
                fmt_children(f, children)
            }
            ModuleInstantiationKind::Assert {
                arguments,
                children,
            } => {
                write!(f, "assert(")?;
                fmt_list(f, arguments)?;
                write!(f, ")")?;
                fmt_children(f, children)
            }
            ModuleInstantiationKind::If {
                condition,
                then_children,
            } => {
                write!(f, "if ({condition})")?;
                fmt_children(f, then_children)
            }
            ModuleInstantiationKind::IfElse {
                condition,
                then_children,
                else_children,
            } => {
                write!(f, "if ({condition})")?;
                fmt_children(f, then_children)?;
                write!(f, " else")?;
                fmt_children(f, else_children)
            }
            ModuleInstantiationKind::Modifier { modifier, child } => {
                write!(f, "{modifier}{child}")
            }
        }
    }
}

fn fmt_children(f: &mut fmt::Formatter<'_>, children: &[Statement]) -> fmt::Result {
    if children.is_empty() {
        return write!(f, ";");
    }
    write!(f, " {{ ")?;
    fmt_list(f, children)?;
    write!(f, " }}")
}
