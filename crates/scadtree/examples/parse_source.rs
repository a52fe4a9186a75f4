//! Example: Parsing OpenSCAD source into a resolved AST
//!
//! This example runs a small program through the full pipeline and walks
//! the result: top-level statements, their source positions, and the
//! scope tree.

use scadtree::ast::Statement;
use scadtree::{ParseConfig, Pipeline, ScadError};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let source = r#"
// A parametric tower of cubes.
levels = 4;

module tower(n = levels) {
    for (i = [0 : n - 1]) {
        translate([0, 0, i * 10]) cube(10 - i);
    }
}

scale = function(x) x * 2;

tower(scale(2));
"#;

    println!("Parsing {} bytes of source...\n", source.len());

    let pipeline = Pipeline::new(ParseConfig::default());
    let ast = match pipeline.parse_source(source) {
        Ok(ast) => ast,
        Err(ScadError::Parse { err, src }) => {
            // A failed parse renders caret diagnostics instead of aborting.
            eprintln!("{}", err.render(&src, None));
            return Err(err.into());
        }
        Err(other) => return Err(other.into()),
    };

    println!("Top-level statements:");
    for statement in &ast.statements {
        let position = statement.position();
        println!("  {position}  {:?}", statement.kind());
    }

    println!("\nScope tree has {} scopes.", ast.scopes.len());

    let root = ast.scopes.root();
    for name in ["levels", "scale", "tower"] {
        let as_variable = ast.scopes.lookup_variable(root, name).is_some();
        let as_module = ast.scopes.lookup_module(root, name).is_some();
        println!("  {name}: variable={as_variable} module={as_module}");
    }

    // The for-loop variable is not visible at the root.
    assert!(ast.scopes.lookup_variable(root, "i").is_none());

    let Statement::ModuleDeclaration(tower) = ast
        .statements
        .iter()
        .find(|statement| matches!(statement, Statement::ModuleDeclaration(_)))
        .expect("tower module present")
    else {
        unreachable!();
    };
    println!(
        "\nmodule {} has {} parameter(s) and {} child statement(s)",
        tower.name,
        tower.parameters.len(),
        tower.children.len()
    );

    Ok(())
}
