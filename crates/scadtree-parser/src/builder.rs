//! AST construction from the concrete parse tree.
//!
//! A bottom-up transform over the typed CST: children are converted
//! first, then a node-kind-specific rule assembles the AST node. The
//! [`Builder`] owns the policy pieces of the transform:
//!
//! - precedence chains fold into strictly left-associative binary trees
//!   (`^` folds right-associatively through the grammar's own recursion);
//! - unary runs apply right-to-left, with unary `+` folding away;
//! - postfix suffixes thread left-to-right, each wrapping the running
//!   expression in a call/index/member node;
//! - range literals materialize a step of `1` when the source omits it;
//! - brace blocks flatten into the surrounding statement list;
//! - every node is stamped with a [`Position`] translated through the
//!   optional source map, or computed by plain line/column counting over
//!   the raw text when no map is supplied.
//!
//! The CST's operator enums are closed, so there is no "unrecognized
//! separator" to default from; a CST shape this module cannot construct
//! from would be a grammar/builder mismatch and panics as a defect
//! rather than degrading the tree.

use log::debug;

use scadtree_core::ast::{
    Argument, Assignment, BinaryOp, Comment, CommentKind, Expression, ExpressionKind,
    FunctionDeclaration, Identifier, IncludeDirective, ModuleDeclaration, ModuleInstantiation,
    ModuleInstantiationKind, ParameterDeclaration, Statement, UnaryOp, UseDirective,
    VectorElement, VectorElementKind,
};
use scadtree_core::{Origin, Position};

use crate::cst::{
    ChainOp, CstArgument, CstAssignment, CstComment, CstExpr, CstExprKind, CstInstantiation,
    CstInstantiationKind, CstItem, CstParameter, CstProgram, CstStatement, CstSuffix,
    CstVectorElement, CstVectorElementKind, UnaryOpToken,
};
use crate::source_map::SourceMap;
use crate::span::Span;

/// Transforms a [`CstProgram`] into a list of top-level [`Statement`]s.
pub struct Builder<'a> {
    source: &'a str,
    origin: Origin,
    source_map: Option<&'a SourceMap>,
    include_comments: bool,
}

impl<'a> Builder<'a> {
    /// Creates a builder over the raw source text, stamping positions by
    /// line/column counting with the origin `"<input>"`.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            origin: Origin::new("<input>"),
            source_map: None,
            include_comments: false,
        }
    }

    /// Sets the origin used when no source map is supplied.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Translates positions through `map` instead of counting over the
    /// raw text.
    pub fn with_source_map(mut self, map: &'a SourceMap) -> Self {
        self.source_map = Some(map);
        self
    }

    /// Retains top-level comments as [`Statement::Comment`] nodes.
    pub fn with_comments(mut self, include_comments: bool) -> Self {
        self.include_comments = include_comments;
        self
    }

    /// Builds the AST for a parsed program.
    pub fn build(&self, program: &CstProgram<'_>) -> Vec<Statement> {
        let statements: Vec<Statement> = program
            .items
            .iter()
            .flat_map(|item| self.build_item(item))
            .collect();
        debug!(
            "built {} top-level statements from {} parse items",
            statements.len(),
            program.items.len()
        );
        statements
    }

    fn position(&self, span: Span) -> Position {
        match self.source_map {
            Some(map) => map.location_of(span.start()),
            None => Position::from_text(self.origin, self.source, span.start()),
        }
    }

    fn build_item(&self, item: &CstItem<'_>) -> Vec<Statement> {
        match item {
            CstItem::Use(directive) => vec![Statement::Use(UseDirective {
                path: directive.path.to_string(),
                position: self.position(directive.span),
                scope: Default::default(),
            })],
            CstItem::Include(directive) => vec![Statement::Include(IncludeDirective {
                path: directive.path.to_string(),
                position: self.position(directive.span),
                scope: Default::default(),
            })],
            CstItem::Statement(statement) => self.build_statement(statement),
            CstItem::Comment(comment) => {
                if self.include_comments {
                    vec![Statement::Comment(self.build_comment(comment))]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn build_comment(&self, comment: &CstComment<'_>) -> Comment {
        Comment {
            comment_kind: if comment.block {
                CommentKind::Block
            } else {
                CommentKind::Line
            },
            text: comment.text.to_string(),
            position: self.position(comment.span),
            scope: Default::default(),
        }
    }

    /// Builds a statement, flattening blocks and dropping empties, so one
    /// CST statement may yield zero or many AST statements.
    fn build_statement(&self, statement: &CstStatement<'_>) -> Vec<Statement> {
        match statement {
            CstStatement::Empty { .. } => Vec::new(),
            CstStatement::Block { statements, .. } => statements
                .iter()
                .flat_map(|statement| self.build_statement(statement))
                .collect(),
            CstStatement::ModuleDeclaration(decl) => {
                vec![Statement::ModuleDeclaration(ModuleDeclaration {
                    name: self.build_identifier(decl.name.name, decl.name.span),
                    parameters: self.build_parameters(&decl.parameters),
                    children: self.build_statement(&decl.body),
                    position: self.position(decl.span),
                    scope: Default::default(),
                })]
            }
            CstStatement::FunctionDeclaration(decl) => {
                vec![Statement::FunctionDeclaration(FunctionDeclaration {
                    name: self.build_identifier(decl.name.name, decl.name.span),
                    parameters: self.build_parameters(&decl.parameters),
                    body: self.build_expr(&decl.body),
                    position: self.position(decl.span),
                    scope: Default::default(),
                })]
            }
            CstStatement::Instantiation(instantiation) => {
                vec![Statement::Instantiation(
                    self.build_instantiation(instantiation),
                )]
            }
            CstStatement::Assignment(assignment) => {
                vec![Statement::Assignment(self.build_assignment(assignment))]
            }
        }
    }

    fn build_identifier(&self, name: &str, span: Span) -> Identifier {
        Identifier::new(name, self.position(span))
    }

    fn build_assignment(&self, assignment: &CstAssignment<'_>) -> Assignment {
        Assignment::new(
            self.build_identifier(assignment.name.name, assignment.name.span),
            self.build_expr(&assignment.value),
            self.position(assignment.span),
        )
    }

    fn build_assignments(&self, assignments: &[CstAssignment<'_>]) -> Vec<Assignment> {
        assignments
            .iter()
            .map(|assignment| self.build_assignment(assignment))
            .collect()
    }

    fn build_parameters(&self, parameters: &[CstParameter<'_>]) -> Vec<ParameterDeclaration> {
        parameters
            .iter()
            .map(|parameter| {
                ParameterDeclaration::new(
                    self.build_identifier(parameter.name.name, parameter.name.span),
                    parameter.default.as_ref().map(|default| self.build_expr(default)),
                    self.position(parameter.span),
                )
            })
            .collect()
    }

    fn build_arguments(&self, arguments: &[CstArgument<'_>]) -> Vec<Argument> {
        arguments
            .iter()
            .map(|argument| {
                let position = self.position(argument.span);
                let value = self.build_expr(&argument.value);
                match &argument.name {
                    Some(name) => Argument::named(
                        self.build_identifier(name.name, name.span),
                        value,
                        position,
                    ),
                    None => Argument::positional(value, position),
                }
            })
            .collect()
    }

    fn build_instantiation(&self, instantiation: &CstInstantiation<'_>) -> ModuleInstantiation {
        let position = self.position(instantiation.span);
        let kind = match &instantiation.kind {
            CstInstantiationKind::Modifier { modifier, child } => {
                ModuleInstantiationKind::Modifier {
                    modifier: *modifier,
                    child: Box::new(self.build_instantiation(child)),
                }
            }
            CstInstantiationKind::If {
                condition,
                then_body,
            } => ModuleInstantiationKind::If {
                condition: self.build_expr(condition),
                then_children: self.build_statement(then_body),
            },
            CstInstantiationKind::IfElse {
                condition,
                then_body,
                else_body,
            } => ModuleInstantiationKind::IfElse {
                condition: self.build_expr(condition),
                then_children: self.build_statement(then_body),
                else_children: self.build_statement(else_body),
            },
            CstInstantiationKind::For { assignments, body } => ModuleInstantiationKind::For {
                assignments: self.build_assignments(assignments),
                children: self.build_statement(body),
            },
            CstInstantiationKind::CFor {
                init,
                condition,
                increment,
                body,
            } => ModuleInstantiationKind::CFor {
                init: self.build_assignments(init),
                condition: self.build_expr(condition),
                increment: self.build_assignments(increment),
                children: self.build_statement(body),
            },
            CstInstantiationKind::IntersectionFor { assignments, body } => {
                ModuleInstantiationKind::IntersectionFor {
                    assignments: self.build_assignments(assignments),
                    children: self.build_statement(body),
                }
            }
            CstInstantiationKind::IntersectionCFor {
                init,
                condition,
                increment,
                body,
            } => ModuleInstantiationKind::IntersectionCFor {
                init: self.build_assignments(init),
                condition: self.build_expr(condition),
                increment: self.build_assignments(increment),
                children: self.build_statement(body),
            },
            CstInstantiationKind::Let { assignments, body } => ModuleInstantiationKind::Let {
                assignments: self.build_assignments(assignments),
                children: self.build_statement(body),
            },
            CstInstantiationKind::Echo { arguments, body } => ModuleInstantiationKind::Echo {
                arguments: self.build_arguments(arguments),
                children: self.build_statement(body),
            },
            CstInstantiationKind::Assert { arguments, body } => ModuleInstantiationKind::Assert {
                arguments: self.build_arguments(arguments),
                children: self.build_statement(body),
            },
            CstInstantiationKind::Call {
                name,
                arguments,
                body,
            } => ModuleInstantiationKind::Call {
                name: self.build_identifier(name.name, name.span),
                arguments: self.build_arguments(arguments),
                children: self.build_statement(body),
            },
        };
        ModuleInstantiation::new(kind, position)
    }

    fn build_expr(&self, expr: &CstExpr<'_>) -> Expression {
        let position = self.position(expr.span);
        match &expr.kind {
            CstExprKind::Identifier(name) => Expression::new(
                ExpressionKind::Identifier(self.build_identifier(name, expr.span)),
                position,
            ),
            CstExprKind::String(text) => {
                Expression::new(ExpressionKind::String(text.to_string()), position)
            }
            CstExprKind::Number(value) => Expression::number(*value, position),
            CstExprKind::True => Expression::new(ExpressionKind::Boolean(true), position),
            CstExprKind::False => Expression::new(ExpressionKind::Boolean(false), position),
            CstExprKind::Undef => Expression::new(ExpressionKind::Undef, position),
            CstExprKind::Paren(inner) => self.build_expr(inner),
            CstExprKind::Range { start, end, step } => {
                // A missing step is materialized, never left absent.
                let step = match step {
                    Some(step) => self.build_expr(step),
                    None => Expression::number(1.0, position),
                };
                Expression::new(
                    ExpressionKind::Range {
                        start: Box::new(self.build_expr(start)),
                        end: Box::new(self.build_expr(end)),
                        step: Box::new(step),
                    },
                    position,
                )
            }
            CstExprKind::Vector(elements) => Expression::new(
                ExpressionKind::Vector(
                    elements
                        .iter()
                        .map(|element| self.build_element(element))
                        .collect(),
                ),
                position,
            ),
            CstExprKind::Let { assignments, body } => Expression::new(
                ExpressionKind::Let {
                    assignments: self.build_assignments(assignments),
                    body: Box::new(self.build_expr(body)),
                },
                position,
            ),
            CstExprKind::Assert { arguments, body } => Expression::new(
                ExpressionKind::Assert {
                    arguments: self.build_arguments(arguments),
                    body: Box::new(self.build_expr(body)),
                },
                position,
            ),
            CstExprKind::Echo { arguments, body } => Expression::new(
                ExpressionKind::Echo {
                    arguments: self.build_arguments(arguments),
                    body: Box::new(self.build_expr(body)),
                },
                position,
            ),
            CstExprKind::FunctionLiteral { parameters, body } => Expression::new(
                ExpressionKind::FunctionLiteral {
                    parameters: self.build_parameters(parameters),
                    body: Box::new(self.build_expr(body)),
                },
                position,
            ),
            CstExprKind::Ternary {
                condition,
                if_true,
                if_false,
            } => Expression::new(
                ExpressionKind::Ternary {
                    condition: Box::new(self.build_expr(condition)),
                    if_true: Box::new(self.build_expr(if_true)),
                    if_false: Box::new(self.build_expr(if_false)),
                },
                position,
            ),
            CstExprKind::Chain { first, rest } => self.fold_chain(first, rest),
            CstExprKind::Unary { ops, operand } => self.fold_unary(ops, operand, position),
            CstExprKind::Exponent { base, exponent } => Expression::new(
                ExpressionKind::Binary {
                    op: BinaryOp::Exponent,
                    left: Box::new(self.build_expr(base)),
                    right: Box::new(self.build_expr(exponent)),
                },
                position,
            ),
            CstExprKind::Postfix { primary, suffixes } => self.thread_suffixes(primary, suffixes),
        }
    }

    /// Folds a flat same-precedence chain into a strictly left-associative
    /// binary tree, selecting each node's operator from the separator
    /// token's identity.
    fn fold_chain(&self, first: &CstExpr<'_>, rest: &[(ChainOp, CstExpr<'_>)]) -> Expression {
        let mut result = self.build_expr(first);
        for (op, operand) in rest {
            let position = result.position;
            result = Expression::new(
                ExpressionKind::Binary {
                    op: binary_op(*op),
                    left: Box::new(result),
                    right: Box::new(self.build_expr(operand)),
                },
                position,
            );
        }
        result
    }

    /// Applies a prefix-operator run right-to-left; unary `+` is the
    /// identity and folds away.
    fn fold_unary(
        &self,
        ops: &[UnaryOpToken],
        operand: &CstExpr<'_>,
        position: Position,
    ) -> Expression {
        let mut result = self.build_expr(operand);
        for op in ops.iter().rev() {
            let op = match op {
                UnaryOpToken::Plus => continue,
                UnaryOpToken::Minus => UnaryOp::Minus,
                UnaryOpToken::Not => UnaryOp::Not,
                UnaryOpToken::BitNot => UnaryOp::BitNot,
            };
            result = Expression::new(
                ExpressionKind::Unary {
                    op,
                    operand: Box::new(result),
                },
                position,
            );
        }
        result
    }

    /// Threads postfix suffixes left-to-right: each suffix wraps the
    /// running expression before the next is considered.
    fn thread_suffixes(&self, primary: &CstExpr<'_>, suffixes: &[CstSuffix<'_>]) -> Expression {
        let mut result = self.build_expr(primary);
        for suffix in suffixes {
            let position = result.position;
            let kind = match suffix {
                CstSuffix::Call(arguments) => ExpressionKind::Call {
                    callee: Box::new(result),
                    arguments: self.build_arguments(arguments),
                },
                CstSuffix::Index(index) => ExpressionKind::Index {
                    target: Box::new(result),
                    index: Box::new(self.build_expr(index)),
                },
                CstSuffix::Member(member) => ExpressionKind::Member {
                    target: Box::new(result),
                    member: self.build_identifier(member.name, member.span),
                },
            };
            result = Expression::new(kind, position);
        }
        result
    }

    fn build_element(&self, element: &CstVectorElement<'_>) -> VectorElement {
        let position = self.position(element.span);
        let kind = match &element.kind {
            CstVectorElementKind::Expr(value) => VectorElementKind::Expr(self.build_expr(value)),
            CstVectorElementKind::Paren(inner) => return self.build_element(inner),
            CstVectorElementKind::Let { assignments, body } => VectorElementKind::Let {
                assignments: self.build_assignments(assignments),
                body: Box::new(self.build_element(body)),
            },
            CstVectorElementKind::Each(body) => {
                VectorElementKind::Each(Box::new(self.build_element(body)))
            }
            CstVectorElementKind::For { assignments, body } => VectorElementKind::For {
                assignments: self.build_assignments(assignments),
                body: Box::new(self.build_element(body)),
            },
            CstVectorElementKind::CFor {
                init,
                condition,
                increment,
                body,
            } => VectorElementKind::CFor {
                init: self.build_assignments(init),
                condition: self.build_expr(condition),
                increment: self.build_assignments(increment),
                body: Box::new(self.build_element(body)),
            },
            CstVectorElementKind::If {
                condition,
                then_body,
            } => VectorElementKind::If {
                condition: self.build_expr(condition),
                then_body: Box::new(self.build_element(then_body)),
            },
            CstVectorElementKind::IfElse {
                condition,
                then_body,
                else_body,
            } => VectorElementKind::IfElse {
                condition: self.build_expr(condition),
                then_body: Box::new(self.build_element(then_body)),
                else_body: Box::new(self.build_element(else_body)),
            },
        };
        VectorElement::new(kind, position)
    }
}

/// Maps a chain separator token to its binary operator.
///
/// Both enums are closed; every separator the grammar can record has
/// exactly one operator here.
fn binary_op(op: ChainOp) -> BinaryOp {
    match op {
        ChainOp::Or => BinaryOp::Or,
        ChainOp::And => BinaryOp::And,
        ChainOp::Eq => BinaryOp::Equal,
        ChainOp::Ne => BinaryOp::NotEqual,
        ChainOp::Lt => BinaryOp::Less,
        ChainOp::Le => BinaryOp::LessEqual,
        ChainOp::Gt => BinaryOp::Greater,
        ChainOp::Ge => BinaryOp::GreaterEqual,
        ChainOp::BitOr => BinaryOp::BitOr,
        ChainOp::BitAnd => BinaryOp::BitAnd,
        ChainOp::Shl => BinaryOp::ShiftLeft,
        ChainOp::Shr => BinaryOp::ShiftRight,
        ChainOp::Add => BinaryOp::Add,
        ChainOp::Sub => BinaryOp::Subtract,
        ChainOp::Mul => BinaryOp::Multiply,
        ChainOp::Div => BinaryOp::Divide,
        ChainOp::Mod => BinaryOp::Modulo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn build(source: &str) -> Vec<Statement> {
        let program = parse(source).expect("source should parse");
        Builder::new(source).build(&program)
    }

    fn only_assignment_value(statements: &[Statement]) -> &Expression {
        assert_eq!(statements.len(), 1);
        let Statement::Assignment(assignment) = &statements[0] else {
            panic!("expected an assignment, got {:?}", statements[0]);
        };
        &assignment.value
    }

    #[test]
    fn test_left_associative_chain_folding() {
        // 8/4/2 folds as (8/4)/2.
        let ast = build("x = 8 / 4 / 2;");
        let value = only_assignment_value(&ast);
        let ExpressionKind::Binary { op, left, right } = &value.kind else {
            panic!("expected binary, got {:?}", value.kind);
        };
        assert_eq!(*op, BinaryOp::Divide);
        assert!(matches!(right.kind, ExpressionKind::Number(n) if n == 2.0));
        let ExpressionKind::Binary { op, .. } = &left.kind else {
            panic!("expected nested binary on the left");
        };
        assert_eq!(*op, BinaryOp::Divide);
    }

    #[test]
    fn test_chain_of_n_operators_folds_to_n_minus_1_nodes() {
        let ast = build("x = 1 + 2 + 3 + 4;");
        let mut count = 0;
        let mut current = only_assignment_value(&ast);
        while let ExpressionKind::Binary { left, .. } = &current.kind {
            count += 1;
            current = left;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_exponent_right_associative() {
        // 2^3^2 folds as 2^(3^2).
        let ast = build("x = 2 ^ 3 ^ 2;");
        let value = only_assignment_value(&ast);
        let ExpressionKind::Binary { op, left, right } = &value.kind else {
            panic!("expected binary, got {:?}", value.kind);
        };
        assert_eq!(*op, BinaryOp::Exponent);
        assert!(matches!(left.kind, ExpressionKind::Number(n) if n == 2.0));
        let ExpressionKind::Binary { op, .. } = &right.kind else {
            panic!("expected nested binary on the right");
        };
        assert_eq!(*op, BinaryOp::Exponent);
    }

    #[test]
    fn test_unary_applies_right_to_left() {
        let ast = build("x = !~a;");
        let value = only_assignment_value(&ast);
        let ExpressionKind::Unary { op, operand } = &value.kind else {
            panic!("expected unary, got {:?}", value.kind);
        };
        assert_eq!(*op, UnaryOp::Not);
        let ExpressionKind::Unary { op, .. } = &operand.kind else {
            panic!("expected nested unary");
        };
        assert_eq!(*op, UnaryOp::BitNot);
    }

    #[test]
    fn test_unary_plus_folds_away() {
        let ast = build("x = +5;");
        let value = only_assignment_value(&ast);
        assert!(matches!(value.kind, ExpressionKind::Number(n) if n == 5.0));
    }

    #[test]
    fn test_range_step_materialized() {
        let ast = build("r = [1 : 10];");
        let value = only_assignment_value(&ast);
        let ExpressionKind::Range { step, .. } = &value.kind else {
            panic!("expected range, got {:?}", value.kind);
        };
        assert!(matches!(step.kind, ExpressionKind::Number(n) if n == 1.0));
    }

    #[test]
    fn test_range_explicit_step() {
        let ast = build("r = [1 : 10 : 2];");
        let value = only_assignment_value(&ast);
        let ExpressionKind::Range { step, .. } = &value.kind else {
            panic!("expected range, got {:?}", value.kind);
        };
        assert!(matches!(step.kind, ExpressionKind::Number(n) if n == 2.0));
    }

    #[test]
    fn test_postfix_threading_left_to_right() {
        // a(1)[0].x nests as Member(Index(Call(a))).
        let ast = build("v = a(1)[0].x;");
        let value = only_assignment_value(&ast);
        let ExpressionKind::Member { target, member } = &value.kind else {
            panic!("expected member access, got {:?}", value.kind);
        };
        assert_eq!(member.name, "x");
        let ExpressionKind::Index { target, .. } = &target.kind else {
            panic!("expected index below member");
        };
        assert!(matches!(target.kind, ExpressionKind::Call { .. }));
    }

    #[test]
    fn test_string_escapes_preserved() {
        let ast = build(r#"s = "a\nb";"#);
        let value = only_assignment_value(&ast);
        let ExpressionKind::String(text) = &value.kind else {
            panic!("expected string, got {:?}", value.kind);
        };
        assert_eq!(text, r"a\nb");
    }

    #[test]
    fn test_hex_and_scientific_numbers() {
        let ast = build("a = 0x10; b = 2.5e2;");
        assert_eq!(ast.len(), 2);
        let Statement::Assignment(a) = &ast[0] else {
            panic!();
        };
        let Statement::Assignment(b) = &ast[1] else {
            panic!();
        };
        assert!(matches!(a.value.kind, ExpressionKind::Number(n) if n == 16.0));
        assert!(matches!(b.value.kind, ExpressionKind::Number(n) if n == 250.0));
    }

    #[test]
    fn test_block_flattening() {
        let ast = build("module m() { a = 1; b = 2; }");
        let Statement::ModuleDeclaration(module) = &ast[0] else {
            panic!("expected module declaration");
        };
        assert_eq!(module.children.len(), 2);
        assert!(matches!(module.children[0], Statement::Assignment(_)));
        assert!(matches!(module.children[1], Statement::Assignment(_)));
    }

    #[test]
    fn test_empty_statement_dropped() {
        let ast = build(";;x = 1;;");
        assert_eq!(ast.len(), 1);
    }

    #[test]
    fn test_vector_keeps_plain_elements() {
        let ast = build("v = [1, 2, 3];");
        let value = only_assignment_value(&ast);
        let ExpressionKind::Vector(elements) = &value.kind else {
            panic!("expected vector, got {:?}", value.kind);
        };
        assert_eq!(elements.len(), 3);
        assert!(matches!(elements[0].kind, VectorElementKind::Expr(_)));
    }

    #[test]
    fn test_list_comprehension_for() {
        let ast = build("v = [for (i = [0 : 3]) i * i];");
        let value = only_assignment_value(&ast);
        let ExpressionKind::Vector(elements) = &value.kind else {
            panic!("expected vector, got {:?}", value.kind);
        };
        assert_eq!(elements.len(), 1);
        let VectorElementKind::For { assignments, body } = &elements[0].kind else {
            panic!("expected comprehension for, got {:?}", elements[0].kind);
        };
        assert_eq!(assignments.len(), 1);
        assert!(matches!(body.kind, VectorElementKind::Expr(_)));
    }

    #[test]
    fn test_c_style_comprehension_for() {
        let ast = build("v = [for (i = 0; i < 4; i = i + 1) i];");
        let value = only_assignment_value(&ast);
        let ExpressionKind::Vector(elements) = &value.kind else {
            panic!("expected vector");
        };
        assert!(matches!(elements[0].kind, VectorElementKind::CFor { .. }));
    }

    #[test]
    fn test_modifier_wrapping() {
        let ast = build("#cube(1);");
        let Statement::Instantiation(instantiation) = &ast[0] else {
            panic!("expected instantiation");
        };
        let ModuleInstantiationKind::Modifier { modifier, child } = &instantiation.kind else {
            panic!("expected modifier, got {:?}", instantiation.kind);
        };
        assert_eq!(*modifier, scadtree_core::ast::Modifier::Highlight);
        assert!(matches!(child.kind, ModuleInstantiationKind::Call { .. }));
    }

    #[test]
    fn test_if_else_disambiguation() {
        let ast = build("if (a) cube(1); else sphere(2);");
        let Statement::Instantiation(instantiation) = &ast[0] else {
            panic!("expected instantiation");
        };
        assert!(matches!(
            instantiation.kind,
            ModuleInstantiationKind::IfElse { .. }
        ));

        let ast = build("if (a) cube(1);");
        let Statement::Instantiation(instantiation) = &ast[0] else {
            panic!("expected instantiation");
        };
        assert!(matches!(
            instantiation.kind,
            ModuleInstantiationKind::If { .. }
        ));
    }

    #[test]
    fn test_for_shape_disambiguation() {
        let ast = build("for (i = [0 : 3]) cube(i);");
        let Statement::Instantiation(instantiation) = &ast[0] else {
            panic!();
        };
        assert!(matches!(
            instantiation.kind,
            ModuleInstantiationKind::For { .. }
        ));

        let ast = build("for (i = 0; i < 3; i = i + 1) cube(i);");
        let Statement::Instantiation(instantiation) = &ast[0] else {
            panic!();
        };
        assert!(matches!(
            instantiation.kind,
            ModuleInstantiationKind::CFor { .. }
        ));
    }

    #[test]
    fn test_positions_without_map() {
        let ast = build("x = 1;\ny = 2;");
        let Statement::Assignment(y) = &ast[1] else {
            panic!();
        };
        assert_eq!(y.position.line(), 2);
        assert_eq!(y.position.column(), 1);
        assert_eq!(y.position.offset(), 7);
    }

    #[test]
    fn test_comments_retained_on_request() {
        let source = "// head\nx = 1;\n/* tail */";
        let program = parse(source).expect("source should parse");
        let without = Builder::new(source).build(&program);
        assert_eq!(without.len(), 1);

        let with = Builder::new(source).with_comments(true).build(&program);
        assert_eq!(with.len(), 3);
        let Statement::Comment(head) = &with[0] else {
            panic!("expected leading comment");
        };
        assert_eq!(head.text, " head");
        assert_eq!(head.comment_kind, CommentKind::Line);
        let Statement::Comment(tail) = &with[2] else {
            panic!("expected trailing comment");
        };
        assert_eq!(tail.comment_kind, CommentKind::Block);
    }

    #[test]
    fn test_determinism() {
        let source = "module m(a = 1) { cube(a); }\nx = [for (i = [0:2]) i];";
        assert_eq!(build(source), build(source));
    }
}
