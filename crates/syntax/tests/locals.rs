// Chunk: docs/chunks/locals_resolution - Scope-resolved reference and definition lookup

//! Integration tests for `local.*` capture handling: reference lookup at a
//! point and scope-resolved definition search.

use std::cell::RefCell;
use std::rc::Rc;

use canopy_buffer::{Point, TextBuffer};
use canopy_syntax::{Config, Grammar, LanguageMode, LanguageRegistry};

const LOCALS_QUERY: &str = r#"
(program) @local.scope
(function_declaration) @local.scope
(statement_block) @local.scope

(variable_declarator name: (identifier) @local.definition)

(identifier) @local.reference
"#;

fn mode_over(text: &str) -> LanguageMode {
    let mut registry = LanguageRegistry::empty();
    registry.add_grammar(
        &["javascript"],
        Grammar::new("source.js", tree_sitter_javascript::LANGUAGE.into())
            .with_syntax_query(tree_sitter_javascript::HIGHLIGHT_QUERY)
            .with_locals_query(LOCALS_QUERY),
    );
    LanguageMode::new(
        Rc::new(RefCell::new(TextBuffer::from_str(text))),
        Rc::new(RefCell::new(registry)),
        "javascript",
        Config::new(),
    )
    .unwrap()
}

#[test]
fn references_at_point_are_found_and_deepest_first() {
    let mode = mode_over("let x = 1;\nx;\n");
    let references = mode.local_references_at_point(Point::new(1, 0));
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].text, "x");
    assert_eq!(references[0].range.start, Point::new(1, 0));
}

#[test]
fn no_references_on_unrelated_positions() {
    let mode = mode_over("let x = 1;\nx;\n");
    // The `=` sign is not a reference.
    assert!(mode.local_references_at_point(Point::new(0, 6)).is_empty());
}

#[test]
fn shadowing_definition_in_inner_scope_wins() {
    let source = "let x = 1;\nfunction f() { let x = 2; return x; }\n";
    let mode = mode_over(source);

    // The `x` in `return x` on row 1.
    let references = mode.local_references_at_point(Point::new(1, 33));
    assert_eq!(references[0].text, "x");

    let definition = mode.find_definition_for_local_reference(&references[0]).unwrap();
    // The inner `let x = 2`, not the outer declaration.
    assert_eq!(definition.range.start, Point::new(1, 19));
}

#[test]
fn outer_definition_resolves_outside_the_inner_scope() {
    let source = "let x = 1;\nfunction f() { let x = 2; }\nx;\n";
    let mode = mode_over(source);

    let references = mode.local_references_at_point(Point::new(2, 0));
    let definition = mode.find_definition_for_local_reference(&references[0]).unwrap();
    assert_eq!(definition.range.start, Point::new(0, 4));
}

#[test]
fn latest_preceding_definition_wins_within_a_scope() {
    let source = "let x = 1;\nlet x = 2;\nx;\n";
    let mode = mode_over(source);

    let references = mode.local_references_at_point(Point::new(2, 0));
    let definition = mode.find_definition_for_local_reference(&references[0]).unwrap();
    assert_eq!(definition.range.start, Point::new(1, 4));
}

#[test]
fn definition_after_the_reference_is_a_fallback() {
    let source = "x;\nlet x = 1;\n";
    let mode = mode_over(source);

    let references = mode.local_references_at_point(Point::new(0, 0));
    let definition = mode.find_definition_for_local_reference(&references[0]).unwrap();
    assert_eq!(definition.range.start, Point::new(1, 4));
}

#[test]
fn unresolvable_reference_returns_none() {
    let source = "y;\nlet x = 1;\n";
    let mode = mode_over(source);

    let references = mode.local_references_at_point(Point::new(0, 0));
    assert!(mode.find_definition_for_local_reference(&references[0]).is_none());
}
