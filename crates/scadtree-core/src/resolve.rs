//! Scope resolution.
//!
//! A second, independent walk over a completed AST that builds the
//! [`ScopeTree`] and writes each node's scope reference exactly once. The
//! AST itself is not restructured; the scope annotation is the only write.
//!
//! Per-construct rules:
//! - bodies hoist their assignments, function declarations, and module
//!   declarations before any statement is visited, so later declarations
//!   are visible to earlier statements;
//! - an assignment's right-hand side resolves in the enclosing scope and
//!   cannot see the variable it defines, except a function-literal RHS,
//!   whose body scope is seeded with the name being defined (recursion);
//! - `let` creates one scope and resolves its assignments sequentially
//!   inside it, so later bindings see earlier ones;
//! - function/module declarations and function literals seed a new scope
//!   with their parameter names; parameter defaults resolve in the
//!   enclosing scope (defaults are evaluated in the caller's context);
//! - simple `for` keeps the iterated expression in the enclosing scope
//!   while the loop variable lives in the new scope; C-style `for`
//!   resolves init, condition, and increment inside the new scope;
//! - modular `if`/`if-else` branches each get their own hoisted scope,
//!   the condition stays in the enclosing scope;
//! - a call's children share one new hoisted scope.

use log::debug;

use crate::ast::{
    Argument, ArgumentKind, Assignment, Comment, Expression, ExpressionKind, FunctionDeclaration,
    Identifier, IncludeDirective, ModuleDeclaration, ModuleInstantiation, ModuleInstantiationKind,
    ParameterDeclaration, Statement, UseDirective, VectorElement, VectorElementKind,
};
use crate::scope::{Declaration, DeclarationKind, ScopeId, ScopeTree};

/// Resolves lexical scopes for a program.
///
/// Returns the owning scope tree; afterwards every node's `scope` cell
/// holds the [`ScopeId`] of its enclosing scope.
pub fn resolve(statements: &[Statement]) -> ScopeTree {
    let mut resolver = Resolver {
        tree: ScopeTree::new(),
    };
    let root = resolver.tree.root();
    resolver.hoist(statements, root);
    resolver.visit_statements(statements, root);
    debug!(
        "scope resolution complete: {} scopes for {} top-level statements",
        resolver.tree.len(),
        statements.len()
    );
    resolver.tree
}

struct Resolver {
    tree: ScopeTree,
}

impl Resolver {
    /// Registers a body's hoisted declarations before its statements run.
    fn hoist(&mut self, statements: &[Statement], scope: ScopeId) {
        for statement in statements {
            match statement {
                Statement::Assignment(node) => self.tree.define_variable(
                    scope,
                    Declaration::new(&node.name.name, DeclarationKind::Assignment, node.position),
                ),
                Statement::FunctionDeclaration(node) => self.tree.define_function(
                    scope,
                    Declaration::new(&node.name.name, DeclarationKind::Function, node.position),
                ),
                Statement::ModuleDeclaration(node) => self.tree.define_module(
                    scope,
                    Declaration::new(&node.name.name, DeclarationKind::Module, node.position),
                ),
                _ => {}
            }
        }
    }

    fn visit_statements(&mut self, statements: &[Statement], scope: ScopeId) {
        for statement in statements {
            self.visit_statement(statement, scope);
        }
    }

    fn visit_statement(&mut self, statement: &Statement, scope: ScopeId) {
        match statement {
            Statement::Assignment(node) => self.visit_assignment(node, scope),
            Statement::ModuleDeclaration(node) => self.visit_module_declaration(node, scope),
            Statement::FunctionDeclaration(node) => self.visit_function_declaration(node, scope),
            Statement::Instantiation(node) => self.visit_instantiation(node, scope),
            Statement::Use(node) => self.visit_use(node, scope),
            Statement::Include(node) => self.visit_include(node, scope),
            Statement::Comment(node) => self.visit_comment(node, scope),
        }
    }

    /// A plain assignment: the RHS cannot see the variable being defined,
    /// unless it is a function literal recursing by its assigned name.
    fn visit_assignment(&mut self, node: &Assignment, scope: ScopeId) {
        node.scope.set(scope);
        self.visit_identifier(&node.name, scope);
        if matches!(node.value.kind, ExpressionKind::FunctionLiteral { .. }) {
            self.visit_function_literal(&node.value, scope, Some(node));
        } else {
            self.visit_expression(&node.value, scope);
        }
    }

    fn visit_module_declaration(&mut self, node: &ModuleDeclaration, scope: ScopeId) {
        node.scope.set(scope);
        self.visit_identifier(&node.name, scope);

        let body_scope = self.tree.push_child(scope);
        self.visit_parameters(&node.parameters, body_scope, scope);
        self.hoist(&node.children, body_scope);
        self.visit_statements(&node.children, body_scope);
    }

    fn visit_function_declaration(&mut self, node: &FunctionDeclaration, scope: ScopeId) {
        node.scope.set(scope);
        self.visit_identifier(&node.name, scope);

        let body_scope = self.tree.push_child(scope);
        self.visit_parameters(&node.parameters, body_scope, scope);
        self.visit_expression(&node.body, body_scope);
    }

    /// Registers parameters in `param_scope`; defaults resolve in the
    /// enclosing (caller-side) scope.
    fn visit_parameters(
        &mut self,
        parameters: &[ParameterDeclaration],
        param_scope: ScopeId,
        enclosing: ScopeId,
    ) {
        for parameter in parameters {
            parameter.scope.set(param_scope);
            self.tree.define_variable(
                param_scope,
                Declaration::new(
                    &parameter.name.name,
                    DeclarationKind::Parameter,
                    parameter.position,
                ),
            );
            self.visit_identifier(&parameter.name, param_scope);
            if let Some(default) = &parameter.default {
                self.visit_expression(default, enclosing);
            }
        }
    }

    fn visit_use(&mut self, node: &UseDirective, scope: ScopeId) {
        node.scope.set(scope);
    }

    fn visit_include(&mut self, node: &IncludeDirective, scope: ScopeId) {
        node.scope.set(scope);
    }

    fn visit_comment(&mut self, node: &Comment, scope: ScopeId) {
        node.scope.set(scope);
    }

    fn visit_instantiation(&mut self, node: &ModuleInstantiation, scope: ScopeId) {
        node.scope.set(scope);
        match &node.kind {
            ModuleInstantiationKind::Call {
                name,
                arguments,
                children,
            } => {
                self.visit_identifier(name, scope);
                self.visit_arguments(arguments, scope);
                self.visit_child_block(children, scope);
            }
            ModuleInstantiationKind::Echo {
                arguments,
                children,
            }
            | ModuleInstantiationKind::Assert {
                arguments,
                children,
            } => {
                self.visit_arguments(arguments, scope);
                self.visit_child_block(children, scope);
            }
            ModuleInstantiationKind::For {
                assignments,
                children,
            }
            | ModuleInstantiationKind::IntersectionFor {
                assignments,
                children,
            } => {
                let loop_scope = self.visit_loop_bindings(assignments, scope);
                self.hoist(children, loop_scope);
                self.visit_statements(children, loop_scope);
            }
            ModuleInstantiationKind::CFor {
                init,
                condition,
                increment,
                children,
            }
            | ModuleInstantiationKind::IntersectionCFor {
                init,
                condition,
                increment,
                children,
            } => {
                let loop_scope = self.visit_c_loop_header(init, condition, increment, scope);
                self.hoist(children, loop_scope);
                self.visit_statements(children, loop_scope);
            }
            ModuleInstantiationKind::Let {
                assignments,
                children,
            } => {
                let let_scope = self.visit_let_bindings(assignments, scope);
                self.hoist(children, let_scope);
                self.visit_statements(children, let_scope);
            }
            ModuleInstantiationKind::If {
                condition,
                then_children,
            } => {
                self.visit_expression(condition, scope);
                let then_scope = self.tree.push_child(scope);
                self.hoist(then_children, then_scope);
                self.visit_statements(then_children, then_scope);
            }
            ModuleInstantiationKind::IfElse {
                condition,
                then_children,
                else_children,
            } => {
                self.visit_expression(condition, scope);
                let then_scope = self.tree.push_child(scope);
                self.hoist(then_children, then_scope);
                self.visit_statements(then_children, then_scope);
                let else_scope = self.tree.push_child(scope);
                self.hoist(else_children, else_scope);
                self.visit_statements(else_children, else_scope);
            }
            ModuleInstantiationKind::Modifier { child, .. } => {
                self.visit_instantiation(child, scope);
            }
        }
    }

    /// Children of a call/echo/assert share one new hoisted scope; an
    /// empty child list creates no scope at all.
    fn visit_child_block(&mut self, children: &[Statement], scope: ScopeId) {
        if children.is_empty() {
            return;
        }
        let child_scope = self.tree.push_child(scope);
        self.hoist(children, child_scope);
        self.visit_statements(children, child_scope);
    }

    /// Simple-for header: loop variables live in the new scope while the
    /// iterated expressions resolve in the enclosing scope.
    fn visit_loop_bindings(&mut self, assignments: &[Assignment], scope: ScopeId) -> ScopeId {
        let loop_scope = self.tree.push_child(scope);
        for assignment in assignments {
            assignment.scope.set(loop_scope);
            self.tree.define_variable(
                loop_scope,
                Declaration::new(
                    &assignment.name.name,
                    DeclarationKind::Assignment,
                    assignment.position,
                ),
            );
            self.visit_identifier(&assignment.name, loop_scope);
            self.visit_expression(&assignment.value, scope);
        }
        loop_scope
    }

    /// C-style-for header: init, condition, and increment all resolve in
    /// the new scope, since the initializer introduces the loop variable
    /// there.
    fn visit_c_loop_header(
        &mut self,
        init: &[Assignment],
        condition: &Expression,
        increment: &[Assignment],
        scope: ScopeId,
    ) -> ScopeId {
        let loop_scope = self.tree.push_child(scope);
        for assignment in init {
            assignment.scope.set(loop_scope);
            self.tree.define_variable(
                loop_scope,
                Declaration::new(
                    &assignment.name.name,
                    DeclarationKind::Assignment,
                    assignment.position,
                ),
            );
            self.visit_identifier(&assignment.name, loop_scope);
            self.visit_expression(&assignment.value, loop_scope);
        }
        self.visit_expression(condition, loop_scope);
        for assignment in increment {
            assignment.scope.set(loop_scope);
            self.visit_identifier(&assignment.name, loop_scope);
            self.visit_expression(&assignment.value, loop_scope);
        }
        loop_scope
    }

    /// Let header: assignments resolve sequentially within the new scope,
    /// so later bindings see earlier ones.
    fn visit_let_bindings(&mut self, assignments: &[Assignment], scope: ScopeId) -> ScopeId {
        let let_scope = self.tree.push_child(scope);
        for assignment in assignments {
            assignment.scope.set(let_scope);
            self.tree.define_variable(
                let_scope,
                Declaration::new(
                    &assignment.name.name,
                    DeclarationKind::Assignment,
                    assignment.position,
                ),
            );
            self.visit_identifier(&assignment.name, let_scope);
            self.visit_expression(&assignment.value, let_scope);
        }
        let_scope
    }

    fn visit_arguments(&mut self, arguments: &[Argument], scope: ScopeId) {
        for argument in arguments {
            argument.scope.set(scope);
            match &argument.kind {
                ArgumentKind::Positional(value) => self.visit_expression(value, scope),
                ArgumentKind::Named { name, value } => {
                    self.visit_identifier(name, scope);
                    self.visit_expression(value, scope);
                }
            }
        }
    }

    fn visit_identifier(&mut self, node: &Identifier, scope: ScopeId) {
        node.scope.set(scope);
    }

    fn visit_expression(&mut self, node: &Expression, scope: ScopeId) {
        node.scope.set(scope);
        match &node.kind {
            ExpressionKind::Identifier(name) => self.visit_identifier(name, scope),
            ExpressionKind::String(_)
            | ExpressionKind::Number(_)
            | ExpressionKind::Boolean(_)
            | ExpressionKind::Undef => {}
            ExpressionKind::Range { start, end, step } => {
                self.visit_expression(start, scope);
                self.visit_expression(end, scope);
                self.visit_expression(step, scope);
            }
            ExpressionKind::Unary { operand, .. } => self.visit_expression(operand, scope),
            ExpressionKind::Binary { left, right, .. } => {
                self.visit_expression(left, scope);
                self.visit_expression(right, scope);
            }
            ExpressionKind::Ternary {
                condition,
                if_true,
                if_false,
            } => {
                self.visit_expression(condition, scope);
                self.visit_expression(if_true, scope);
                self.visit_expression(if_false, scope);
            }
            ExpressionKind::Let { assignments, body } => {
                let let_scope = self.visit_let_bindings(assignments, scope);
                self.visit_expression(body, let_scope);
            }
            ExpressionKind::Echo { arguments, body }
            | ExpressionKind::Assert { arguments, body } => {
                self.visit_arguments(arguments, scope);
                self.visit_expression(body, scope);
            }
            ExpressionKind::FunctionLiteral { .. } => {
                self.visit_function_literal(node, scope, None);
            }
            ExpressionKind::Call { callee, arguments } => {
                self.visit_expression(callee, scope);
                self.visit_arguments(arguments, scope);
            }
            ExpressionKind::Index { target, index } => {
                self.visit_expression(target, scope);
                self.visit_expression(index, scope);
            }
            ExpressionKind::Member { target, member } => {
                self.visit_expression(target, scope);
                self.visit_identifier(member, scope);
            }
            ExpressionKind::Vector(elements) => {
                for element in elements {
                    self.visit_element(element, scope);
                }
            }
        }
    }

    /// Function literal: a new parameter scope; when the literal is the
    /// RHS of an assignment, the being-defined name is seeded into the
    /// body scope so the literal can recurse by its own assigned name.
    fn visit_function_literal(
        &mut self,
        node: &Expression,
        scope: ScopeId,
        recursion_binding: Option<&Assignment>,
    ) {
        let ExpressionKind::FunctionLiteral { parameters, body } = &node.kind else {
            unreachable!("visit_function_literal called on a non-literal expression");
        };
        // Set only if the caller has not already annotated this node (the
        // assignment path visits the literal directly).
        if node.scope.get().is_none() {
            node.scope.set(scope);
        }

        let body_scope = self.tree.push_child(scope);
        if let Some(assignment) = recursion_binding {
            self.tree.define_variable(
                body_scope,
                Declaration::new(
                    &assignment.name.name,
                    DeclarationKind::Assignment,
                    assignment.position,
                ),
            );
        }
        self.visit_parameters(parameters, body_scope, scope);
        self.visit_expression(body, body_scope);
    }

    fn visit_element(&mut self, node: &VectorElement, scope: ScopeId) {
        node.scope.set(scope);
        match &node.kind {
            VectorElementKind::Expr(expr) => self.visit_expression(expr, scope),
            VectorElementKind::Let { assignments, body } => {
                let let_scope = self.visit_let_bindings(assignments, scope);
                self.visit_element(body, let_scope);
            }
            VectorElementKind::Each(body) => self.visit_element(body, scope),
            VectorElementKind::For { assignments, body } => {
                let loop_scope = self.visit_loop_bindings(assignments, scope);
                self.visit_element(body, loop_scope);
            }
            VectorElementKind::CFor {
                init,
                condition,
                increment,
                body,
            } => {
                let loop_scope = self.visit_c_loop_header(init, condition, increment, scope);
                self.visit_element(body, loop_scope);
            }
            VectorElementKind::If {
                condition,
                then_body,
            } => {
                self.visit_expression(condition, scope);
                self.visit_element(then_body, scope);
            }
            VectorElementKind::IfElse {
                condition,
                then_body,
                else_body,
            } => {
                self.visit_expression(condition, scope);
                self.visit_element(then_body, scope);
                self.visit_element(else_body, scope);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;
    use crate::origin::Origin;
    use crate::position::Position;

    fn pos(offset: usize) -> Position {
        Position::new(Origin::new("test"), 1, offset as u32 + 1, offset)
    }

    fn ident(name: &str) -> Identifier {
        Identifier::new(name, pos(0))
    }

    fn num(value: f64) -> Expression {
        Expression::number(value, pos(0))
    }

    fn var(name: &str) -> Expression {
        Expression::new(ExpressionKind::Identifier(ident(name)), pos(0))
    }

    fn assign(name: &str, value: Expression) -> Assignment {
        Assignment::new(ident(name), value, pos(0))
    }

    #[test]
    fn test_empty_program() {
        let tree = resolve(&[]);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_top_level_assignment_in_root() {
        let ast = vec![Statement::Assignment(assign("x", num(10.0)))];
        let tree = resolve(&ast);

        let found = tree.lookup_variable(tree.root(), "x").unwrap();
        assert_eq!(found.kind, DeclarationKind::Assignment);

        let Statement::Assignment(node) = &ast[0] else {
            unreachable!();
        };
        assert_eq!(node.scope.get(), Some(tree.root()));
    }

    #[test]
    fn test_assignment_rhs_cannot_see_itself() {
        // x = x; resolves the RHS in root, where hoisting has already
        // defined x, so the lookup succeeds at the root scope itself. The
        // interesting property is that no child scope was created.
        let ast = vec![Statement::Assignment(assign("x", var("x")))];
        let tree = resolve(&ast);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_let_expression_scopes() {
        // x = let(a = 1, b = a) a + b;
        let body = Expression::new(
            ExpressionKind::Binary {
                op: BinaryOp::Add,
                left: Box::new(var("a")),
                right: Box::new(var("b")),
            },
            pos(0),
        );
        let let_expr = Expression::new(
            ExpressionKind::Let {
                assignments: vec![assign("a", num(1.0)), assign("b", var("a"))],
                body: Box::new(body),
            },
            pos(0),
        );
        let ast = vec![Statement::Assignment(assign("x", let_expr))];
        let tree = resolve(&ast);

        // a and b are not visible at the root.
        assert!(tree.lookup_variable(tree.root(), "a").is_none());
        assert!(tree.lookup_variable(tree.root(), "b").is_none());

        // The body scope sees both.
        let Statement::Assignment(assignment) = &ast[0] else {
            unreachable!();
        };
        let ExpressionKind::Let { body, .. } = &assignment.value.kind else {
            unreachable!();
        };
        let body_scope = body.scope.get().unwrap();
        assert!(tree.lookup_variable(body_scope, "a").is_some());
        assert!(tree.lookup_variable(body_scope, "b").is_some());
    }

    #[test]
    fn test_function_literal_recursion() {
        // fn = function(n) fn;
        let literal = Expression::new(
            ExpressionKind::FunctionLiteral {
                parameters: vec![ParameterDeclaration::new(ident("n"), None, pos(0))],
                body: Box::new(var("fn")),
            },
            pos(0),
        );
        let ast = vec![Statement::Assignment(assign("fn", literal))];
        let tree = resolve(&ast);

        let Statement::Assignment(assignment) = &ast[0] else {
            unreachable!();
        };
        let ExpressionKind::FunctionLiteral { body, .. } = &assignment.value.kind else {
            unreachable!();
        };
        let body_scope = body.scope.get().unwrap();
        assert!(tree.lookup_variable(body_scope, "fn").is_some());
        assert!(tree.lookup_variable(body_scope, "n").is_some());
    }

    #[test]
    fn test_module_body_hoisting() {
        // module m() { cube(x); x = 10; }
        let call = ModuleInstantiation::new(
            ModuleInstantiationKind::Call {
                name: ident("cube"),
                arguments: vec![Argument::positional(var("x"), pos(0))],
                children: vec![],
            },
            pos(0),
        );
        let module = ModuleDeclaration {
            name: ident("m"),
            parameters: vec![],
            children: vec![
                Statement::Instantiation(call),
                Statement::Assignment(assign("x", num(10.0))),
            ],
            position: pos(0),
            scope: crate::ast::ScopeRef::new(),
        };
        let ast = vec![Statement::ModuleDeclaration(module)];
        let tree = resolve(&ast);

        let Statement::ModuleDeclaration(module) = &ast[0] else {
            unreachable!();
        };
        let Statement::Instantiation(call) = &module.children[0] else {
            unreachable!();
        };
        let call_scope = call.scope.get().unwrap();
        // x resolves at the call site despite being assigned afterwards.
        assert!(tree.lookup_variable(call_scope, "x").is_some());
        // x is local to the module body.
        assert!(tree.lookup_variable(tree.root(), "x").is_none());
    }

    #[test]
    fn test_parameter_default_in_enclosing_scope() {
        // function f(a = b) = a;
        let decl = FunctionDeclaration {
            name: ident("f"),
            parameters: vec![ParameterDeclaration::new(
                ident("a"),
                Some(var("b")),
                pos(0),
            )],
            body: var("a"),
            position: pos(0),
            scope: crate::ast::ScopeRef::new(),
        };
        let ast = vec![Statement::FunctionDeclaration(decl)];
        let tree = resolve(&ast);

        let Statement::FunctionDeclaration(decl) = &ast[0] else {
            unreachable!();
        };
        let default = decl.parameters[0].default.as_ref().unwrap();
        // The default resolves in the enclosing (root) scope, not the
        // parameter scope.
        assert_eq!(default.scope.get(), Some(tree.root()));
        assert_ne!(decl.body.scope.get(), Some(tree.root()));
    }

    #[test]
    fn test_simple_for_range_in_enclosing_scope() {
        // for (i = r) cube(i);
        let body = ModuleInstantiation::new(
            ModuleInstantiationKind::Call {
                name: ident("cube"),
                arguments: vec![Argument::positional(var("i"), pos(0))],
                children: vec![],
            },
            pos(0),
        );
        let for_loop = ModuleInstantiation::new(
            ModuleInstantiationKind::For {
                assignments: vec![assign("i", var("r"))],
                children: vec![Statement::Instantiation(body)],
            },
            pos(0),
        );
        let ast = vec![Statement::Instantiation(for_loop)];
        let tree = resolve(&ast);

        let Statement::Instantiation(for_loop) = &ast[0] else {
            unreachable!();
        };
        let ModuleInstantiationKind::For {
            assignments,
            children,
        } = &for_loop.kind
        else {
            unreachable!();
        };
        // The iterated expression resolved in the enclosing (root) scope.
        assert_eq!(assignments[0].value.scope.get(), Some(tree.root()));
        // The body sees the loop variable.
        let body_scope = children[0].scope().get().unwrap();
        assert!(tree.lookup_variable(body_scope, "i").is_some());
        assert!(tree.lookup_variable(tree.root(), "i").is_none());
    }

    #[test]
    fn test_if_branches_get_separate_scopes() {
        let branch_stmt = |name: &str| Statement::Assignment(assign(name, num(1.0)));
        let if_else = ModuleInstantiation::new(
            ModuleInstantiationKind::IfElse {
                condition: Expression::new(ExpressionKind::Boolean(true), pos(0)),
                then_children: vec![branch_stmt("a")],
                else_children: vec![branch_stmt("b")],
            },
            pos(0),
        );
        let ast = vec![Statement::Instantiation(if_else)];
        let tree = resolve(&ast);

        let Statement::Instantiation(node) = &ast[0] else {
            unreachable!();
        };
        let ModuleInstantiationKind::IfElse {
            condition,
            then_children,
            else_children,
        } = &node.kind
        else {
            unreachable!();
        };
        assert_eq!(condition.scope.get(), Some(tree.root()));
        let then_scope = then_children[0].scope().get().unwrap();
        let else_scope = else_children[0].scope().get().unwrap();
        assert_ne!(then_scope, else_scope);
        assert!(tree.lookup_variable(then_scope, "a").is_some());
        assert!(tree.lookup_variable(then_scope, "b").is_none());
        assert!(tree.lookup_variable(else_scope, "b").is_some());
    }
}
