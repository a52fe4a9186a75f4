//! End-to-end pipeline tests: source text in, resolved AST out.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use scadtree::ast::{
    BinaryOp, ExpressionKind, ModuleInstantiationKind, Statement,
};
use scadtree::{
    Ast, IncludeResolver, Origin, ParseConfig, Pipeline, ScadError, SourceMap,
};

fn parse(source: &str) -> Ast {
    Pipeline::new(ParseConfig::default())
        .parse_source(source)
        .expect("source should parse")
}

/// In-memory include resolver backed by a name-to-content table.
struct MemoryResolver {
    files: HashMap<String, String>,
}

impl MemoryResolver {
    fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(name, content)| (name.to_string(), content.to_string()))
                .collect(),
        }
    }
}

impl IncludeResolver for MemoryResolver {
    fn resolve(&self, _current_origin: &str, path: &str) -> Option<PathBuf> {
        self.files.contains_key(path).then(|| PathBuf::from(path))
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(&path.to_string_lossy().into_owned())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing file"))
    }
}

#[test]
fn building_twice_yields_identical_asts() {
    let source = r#"
        use <shapes.scad>
        module widget(size = 10) {
            for (i = [0 : size]) cube(i);
        }
        x = let(a = 1, b = 2) a + b;
        widget(5);
    "#;
    let first = parse(source);
    let second = parse(source);
    assert_eq!(first.statements, second.statements);
}

#[test]
fn exponent_chain_is_right_associative() {
    // 2^3^2 parses as 2^(3^2): the left operand of the top node is 2.
    let ast = parse("x = 2^3^2;");
    let Statement::Assignment(assignment) = &ast.statements[0] else {
        panic!("expected assignment");
    };
    let ExpressionKind::Binary { op, left, right } = &assignment.value.kind else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinaryOp::Exponent);
    assert!(matches!(left.kind, ExpressionKind::Number(n) if n == 2.0));
    let ExpressionKind::Binary { left: inner_left, right: inner_right, .. } = &right.kind else {
        panic!("expected nested exponent");
    };
    assert!(matches!(inner_left.kind, ExpressionKind::Number(n) if n == 3.0));
    assert!(matches!(inner_right.kind, ExpressionKind::Number(n) if n == 2.0));
}

#[test]
fn division_chain_is_left_associative() {
    // 8/4/2 parses as (8/4)/2: the right operand of the top node is 2.
    let ast = parse("x = 8/4/2;");
    let Statement::Assignment(assignment) = &ast.statements[0] else {
        panic!("expected assignment");
    };
    let ExpressionKind::Binary { left, right, .. } = &assignment.value.kind else {
        panic!("expected binary");
    };
    assert!(matches!(right.kind, ExpressionKind::Number(n) if n == 2.0));
    assert!(matches!(left.kind, ExpressionKind::Binary { .. }));
}

#[test]
fn range_step_defaults_to_one() {
    let ast = parse("a = [1:10];\nb = [1:10:2];");
    let steps: Vec<f64> = ast
        .statements
        .iter()
        .map(|statement| {
            let Statement::Assignment(assignment) = statement else {
                panic!("expected assignment");
            };
            let ExpressionKind::Range { step, .. } = &assignment.value.kind else {
                panic!("expected range");
            };
            let ExpressionKind::Number(value) = step.kind else {
                panic!("expected numeric step");
            };
            value
        })
        .collect();
    assert_eq!(steps, vec![1.0, 2.0]);
}

#[test]
fn let_bindings_stay_inside_the_let_scope() {
    let ast = parse("x = let(a = 1, b = 2) a + b;");

    // Neither binding is visible in the root scope.
    assert!(ast.scopes.lookup_variable(ast.scopes.root(), "a").is_none());
    assert!(ast.scopes.lookup_variable(ast.scopes.root(), "b").is_none());
    assert!(ast.scopes.lookup_variable(ast.scopes.root(), "x").is_some());

    // The let body sees both.
    let Statement::Assignment(assignment) = &ast.statements[0] else {
        panic!("expected assignment");
    };
    let ExpressionKind::Let { body, .. } = &assignment.value.kind else {
        panic!("expected let");
    };
    let body_scope = body.scope.get().expect("body scope resolved");
    assert!(ast.scopes.lookup_variable(body_scope, "a").is_some());
    assert!(ast.scopes.lookup_variable(body_scope, "b").is_some());
}

#[test]
fn function_literal_can_recurse_by_its_assigned_name() {
    let ast = parse("fn = function(n) n == 0 ? 1 : n * fn(n - 1);");
    let Statement::Assignment(assignment) = &ast.statements[0] else {
        panic!("expected assignment");
    };
    let ExpressionKind::FunctionLiteral { body, .. } = &assignment.value.kind else {
        panic!("expected function literal");
    };
    let body_scope = body.scope.get().expect("body scope resolved");
    assert!(ast.scopes.lookup_variable(body_scope, "fn").is_some());
    assert!(ast.scopes.lookup_variable(body_scope, "n").is_some());
}

#[test]
fn module_body_hoists_later_assignments() {
    let ast = parse("module m() { cube(x); x = 10; }");
    let Statement::ModuleDeclaration(module) = &ast.statements[0] else {
        panic!("expected module declaration");
    };
    let Statement::Instantiation(call) = &module.children[0] else {
        panic!("expected call");
    };
    let call_scope = call.scope.get().expect("call scope resolved");
    // x resolves at the call site despite textual order.
    assert!(ast.scopes.lookup_variable(call_scope, "x").is_some());
    // And stays local to the module body.
    assert!(ast.scopes.lookup_variable(ast.scopes.root(), "x").is_none());
}

#[test]
fn use_directive_survives_as_a_node() {
    let ast = parse("use <lib.scad>\nx = 1;");
    let Statement::Use(use_directive) = &ast.statements[0] else {
        panic!("expected use directive");
    };
    assert_eq!(use_directive.path, "lib.scad");
}

#[test]
fn include_expansion_inlines_file_content_in_order() {
    let resolver = MemoryResolver::new(&[("lib", "z = 20;\n")]);
    let mut map = SourceMap::new();
    map.add_origin(Origin::new("main"), "x = 5;\ninclude <lib>\ny = 10;\n");

    let ast = Pipeline::new(ParseConfig::default())
        .parse_with_includes(map, "main", &resolver)
        .expect("expansion should succeed");

    let names: Vec<String> = ast
        .statements
        .iter()
        .map(|statement| {
            let Statement::Assignment(assignment) = statement else {
                panic!("expected assignment, got {statement:?}");
            };
            assignment.name.name.clone()
        })
        .collect();
    assert_eq!(names, vec!["x", "z", "y"]);

    let mut map = ast.source_map.expect("map present");
    assert!(!map.combined_text().contains("include"));
}

#[test]
fn include_expansion_preserves_original_positions() {
    let resolver = MemoryResolver::new(&[("lib", "z = 20;\n")]);
    let mut map = SourceMap::new();
    map.add_origin(Origin::new("main"), "x = 5;\ninclude <lib>\ny = 10;\n");

    let ast = Pipeline::new(ParseConfig::default())
        .parse_with_includes(map, "main", &resolver)
        .expect("expansion should succeed");

    let positions: Vec<(String, u32)> = ast
        .statements
        .iter()
        .map(|statement| {
            (
                statement.position().origin().as_str(),
                statement.position().line(),
            )
        })
        .collect();

    // x from main line 1, z from lib line 1, y from main line 3.
    assert_eq!(positions[0], ("main".to_string(), 1));
    assert_eq!(positions[1], ("lib".to_string(), 1));
    assert_eq!(positions[2], ("main".to_string(), 3));
}

#[test]
fn include_inside_string_or_comment_is_never_substituted() {
    let resolver = MemoryResolver::new(&[("lib", "z = 20;\n")]);
    let mut map = SourceMap::new();
    map.add_origin(
        Origin::new("main"),
        "s = \"include <lib>\";\n// include <lib>\ninclude <lib>\n",
    );

    let ast = Pipeline::new(ParseConfig::default())
        .parse_with_includes(map, "main", &resolver)
        .expect("expansion should succeed");

    let mut map = ast.source_map.expect("map present");
    let combined = map.combined_text().to_string();
    // The string literal and the comment keep their directives; only the
    // real one was replaced.
    assert_eq!(combined.matches("include <lib>").count(), 2);
    assert!(combined.contains("z = 20;"));
}

#[test]
fn circular_includes_terminate_with_designated_error() {
    let resolver = MemoryResolver::new(&[("a", "include <b>\n"), ("b", "include <a>\n")]);
    let mut map = SourceMap::new();
    map.add_origin(Origin::new("main"), "include <a>\n");

    let err = Pipeline::new(ParseConfig::default().with_max_include_iterations(8))
        .parse_with_includes(map, "main", &resolver)
        .expect_err("circular includes must fail");

    let ScadError::Include(parse_error) = err else {
        panic!("expected include error, got {err:?}");
    };
    let rendered = parse_error.to_string();
    assert!(rendered.contains("maximum include iterations"));
}

#[test]
fn missing_include_aborts_the_parse() {
    let resolver = MemoryResolver::new(&[]);
    let mut map = SourceMap::new();
    map.add_origin(Origin::new("main"), "include <missing>\n");

    let err = Pipeline::new(ParseConfig::default())
        .parse_with_includes(map, "main", &resolver)
        .expect_err("missing include must fail");
    assert!(matches!(err, ScadError::Include(_)));
}

#[test]
fn syntax_error_renders_caret_diagnostics() {
    let err = Pipeline::new(ParseConfig::default())
        .parse_source("x = 1;\ny = ;\n")
        .expect_err("syntax error expected");

    let ScadError::Parse { err, src } = err else {
        panic!("expected parse error");
    };
    let rendered = err.render(&src, None);
    assert!(rendered.contains("error[E100]"), "rendered: {rendered}");
    assert!(rendered.contains("<input>:2:"), "rendered: {rendered}");
    assert!(rendered.contains("y = ;"), "rendered: {rendered}");
    assert!(rendered.contains('^'), "rendered: {rendered}");
}

#[test]
fn comment_retention_is_opt_in() {
    let source = "// heading\nx = 1;";
    let without = parse(source);
    assert_eq!(without.statements.len(), 1);

    let with = Pipeline::new(ParseConfig::default().with_comments(true))
        .parse_source(source)
        .expect("source should parse");
    assert_eq!(with.statements.len(), 2);
    assert!(matches!(with.statements[0], Statement::Comment(_)));
}

#[test]
fn same_name_may_be_variable_function_and_module() {
    let ast = parse(
        "thing = 1;\nfunction thing(x) = x;\nmodule thing() cube(1);\n",
    );
    let root = ast.scopes.root();
    assert!(ast.scopes.lookup_variable(root, "thing").is_some());
    assert!(ast.scopes.lookup_function(root, "thing").is_some());
    assert!(ast.scopes.lookup_module(root, "thing").is_some());
}

#[test]
fn modifier_wrappers_keep_single_child() {
    let ast = parse("%translate([1, 0, 0]) cube(1);");
    let Statement::Instantiation(instantiation) = &ast.statements[0] else {
        panic!("expected instantiation");
    };
    let ModuleInstantiationKind::Modifier { child, .. } = &instantiation.kind else {
        panic!("expected modifier wrapper");
    };
    let ModuleInstantiationKind::Call { name, children, .. } = &child.kind else {
        panic!("expected call inside modifier");
    };
    assert_eq!(name.name, "translate");
    assert_eq!(children.len(), 1);
}

#[test]
fn failed_lookups_are_not_errors() {
    let ast = parse("cube(unknown_variable);");
    // Resolution completed; the unknown name simply is not bound.
    assert!(
        ast.scopes
            .lookup_variable(ast.scopes.root(), "unknown_variable")
            .is_none()
    );
}
