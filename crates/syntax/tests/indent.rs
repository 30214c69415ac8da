// Chunk: docs/chunks/indent_hints - Indent suggestions from capture hints

//! Integration tests for the indentation subsystem: `@indent`,
//! `@indent_end`, and `@branch` capture handling.

use std::cell::RefCell;
use std::rc::Rc;

use canopy_buffer::{Point, Range, TextBuffer};
use canopy_syntax::{Config, Grammar, IndentOptions, LanguageMode, LanguageRegistry};

fn shared_buffer(text: &str) -> Rc<RefCell<TextBuffer>> {
    Rc::new(RefCell::new(TextBuffer::from_str(text)))
}

fn indenting_js_registry() -> Rc<RefCell<LanguageRegistry>> {
    let mut registry = LanguageRegistry::empty();
    registry.add_grammar(
        &["javascript"],
        Grammar::new("source.js", tree_sitter_javascript::LANGUAGE.into())
            .with_syntax_query(tree_sitter_javascript::HIGHLIGHT_QUERY)
            .with_indents_query(
                r#"
                ["{" "[" "("] @indent
                ["}" "]" ")"] @indent_end
                (break_statement) @branch
                "#,
            ),
    );
    Rc::new(RefCell::new(registry))
}

fn mode_over(text: &str) -> LanguageMode {
    LanguageMode::new(
        shared_buffer(text),
        indenting_js_registry(),
        "javascript",
        Config::new(),
    )
    .unwrap()
}

// ==================== basic indent / dedent ====================

#[test]
fn open_brace_indents_the_next_row() {
    let mode = mode_over("{\n");
    assert_eq!(
        mode.suggested_indent_for_buffer_row(1, 2, IndentOptions::default()),
        1
    );
}

#[test]
fn closing_brace_dedents_its_own_row() {
    let mode = mode_over("{\n}\n");
    assert_eq!(
        mode.suggested_indent_for_buffer_row(1, 2, IndentOptions::default()),
        0
    );
}

#[test]
fn row_zero_suggests_zero() {
    let mode = mode_over("{\n");
    assert_eq!(
        mode.suggested_indent_for_buffer_row(0, 2, IndentOptions::default()),
        0
    );
}

#[test]
fn indent_delta_is_clamped_to_one() {
    // Two opening brackets on the comparison row still indent by one.
    let mode = mode_over("f({\n");
    assert_eq!(
        mode.suggested_indent_for_buffer_row(1, 2, IndentOptions::default()),
        1
    );
}

#[test]
fn balanced_braces_on_comparison_row_cancel_out() {
    let mode = mode_over("f({ a: 1 })\nx;\n");
    assert_eq!(
        mode.suggested_indent_for_buffer_row(1, 2, IndentOptions::default()),
        0
    );
}

#[test]
fn blank_rows_are_skipped_when_finding_the_comparison_row() {
    let mode = mode_over("{\n\n\n");
    assert_eq!(
        mode.suggested_indent_for_buffer_row(3, 2, IndentOptions::default()),
        1
    );
}

#[test]
fn without_an_indents_query_the_previous_indent_carries() {
    let mut registry = LanguageRegistry::empty();
    registry.add_grammar(
        &["javascript"],
        Grammar::new("source.js", tree_sitter_javascript::LANGUAGE.into())
            .with_syntax_query(tree_sitter_javascript::HIGHLIGHT_QUERY),
    );
    let registry = Rc::new(RefCell::new(registry));
    let mode = LanguageMode::new(
        shared_buffer("    x();\ny();\n"),
        registry,
        "javascript",
        Config::new(),
    )
    .unwrap();

    assert_eq!(
        mode.suggested_indent_for_buffer_row(1, 2, IndentOptions::default()),
        2
    );
}

// ==================== idempotence ====================

#[test]
fn applying_the_suggestion_does_not_change_it() {
    let source = "if (x) {\n  y();\n}\n";
    let mode = mode_over(source);
    // Row 1 already carries the suggested indent.
    assert_eq!(
        mode.suggested_indent_for_buffer_row(1, 2, IndentOptions::default()),
        1
    );
    // Row 2's closing brace dedents back to zero, matching its actual
    // indentation.
    assert_eq!(
        mode.suggested_indent_for_buffer_row(2, 2, IndentOptions::default()),
        0
    );
}

// ==================== edited rows ====================

#[test]
fn branch_capture_matching_the_whole_line_dedents_an_edited_row() {
    let source = "while (x) {\n  a();\n  break;\n}\n";
    let mode = mode_over(source);
    // "break;" matches the @branch capture exactly, so the edited-row path
    // pulls it back one level from its baseline.
    assert_eq!(mode.suggested_indent_for_edited_buffer_row(2, 2), 0);
}

#[test]
fn edited_row_without_branch_keeps_its_current_indent() {
    let source = "while (x) {\n  a();\n  b();\n}\n";
    let mode = mode_over(source);
    assert_eq!(mode.suggested_indent_for_edited_buffer_row(2, 2), 1);
}

// ==================== mid-transaction parses ====================

#[test]
fn indent_suggestion_sees_an_uncommitted_edit() {
    let buffer = shared_buffer("x;\n");
    let mode = LanguageMode::new(
        buffer.clone(),
        indenting_js_registry(),
        "javascript",
        Config::new(),
    )
    .unwrap();

    // Type "{" at the end of row 0 and ask for row 1's indent before the
    // transaction commits: the forced parse must see the new brace.
    let change = buffer.borrow_mut().set_text_in_range(
        Range::new(Point::new(0, 2), Point::new(0, 2)),
        "\n{\n",
    );
    mode.buffer_did_change(&change);

    assert_eq!(
        mode.suggested_indent_for_buffer_row(2, 2, IndentOptions::default()),
        1
    );
    mode.buffer_did_finish_transaction(std::slice::from_ref(&change));
}
