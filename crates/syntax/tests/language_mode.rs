// Chunk: docs/chunks/language_mode - End-to-end language mode behavior

//! Integration tests driving `LanguageMode` end-to-end: scope descriptors,
//! highlight iteration, injections, and event routing.

use std::cell::RefCell;
use std::rc::Rc;

use canopy_buffer::{Point, Range, TextBuffer};
use canopy_syntax::{
    Config, Grammar, LanguageMode, LanguageRegistry, NodeInjection, ScopeSelector, VAR_SCOPE_ID,
};

fn shared_buffer(text: &str) -> Rc<RefCell<TextBuffer>> {
    Rc::new(RefCell::new(TextBuffer::from_str(text)))
}

fn full_registry() -> Rc<RefCell<LanguageRegistry>> {
    Rc::new(RefCell::new(LanguageRegistry::new()))
}

/// A JavaScript grammar whose only capture is the `function` keyword.
fn keyword_only_registry() -> Rc<RefCell<LanguageRegistry>> {
    let mut registry = LanguageRegistry::empty();
    registry.add_grammar(
        &["javascript"],
        Grammar::new("source.js", tree_sitter_javascript::LANGUAGE.into())
            .with_syntax_query(r#""function" @keyword"#),
    );
    Rc::new(RefCell::new(registry))
}

/// Drains the full event stream: (seek-time open scopes, per-boundary
/// events as (position, opened, closed) scope names).
#[allow(clippy::type_complexity)]
fn collect_events(
    mode: &LanguageMode,
    range: Range,
) -> (Vec<String>, Vec<(Point, Vec<String>, Vec<String>)>) {
    let name = |id| mode.scope_name_for_scope_id(id).unwrap_or_default();
    let mut iterator = mode.build_highlight_iterator();
    let open = iterator.seek(range).into_iter().map(name).collect();
    let mut events = Vec::new();
    while !iterator.done() {
        let position = iterator.get_position().unwrap();
        let opened: Vec<String> = iterator.get_open_scope_ids().into_iter().map(name).collect();
        let closed: Vec<String> = iterator.get_close_scope_ids().into_iter().map(name).collect();
        events.push((position, opened, closed));
        iterator.move_to_successor();
    }
    (open, events)
}

// ==================== scope descriptors ====================

#[test]
fn scope_descriptor_covers_keyword_capture() {
    let buffer = shared_buffer("function f() {\n  return 1;\n}\n");
    let mode = LanguageMode::new(buffer, keyword_only_registry(), "javascript", Config::new())
        .unwrap();

    let scopes = mode.scope_descriptor_for_position(Point::new(0, 3));
    assert_eq!(scopes, vec!["source.js".to_string(), "keyword".to_string()]);
}

#[test]
fn buffer_range_for_scope_finds_smallest_matching_capture() {
    let buffer = shared_buffer("function f() {\n  return 1;\n}\n");
    let mode = LanguageMode::new(buffer, keyword_only_registry(), "javascript", Config::new())
        .unwrap();

    let selector = ScopeSelector::parse("keyword");
    let range = mode
        .buffer_range_for_scope_at_position(&selector, Point::new(0, 3))
        .unwrap();
    assert_eq!(range, Range::new(Point::new(0, 0), Point::new(0, 8)));

    let miss = ScopeSelector::parse("string");
    assert!(mode
        .buffer_range_for_scope_at_position(&miss, Point::new(0, 3))
        .is_none());
}

#[test]
fn descriptor_starts_with_root_scope_everywhere() {
    let buffer = shared_buffer("fn main() {\n    let x = 1;\n}\n");
    let mode = LanguageMode::new(buffer, full_registry(), "rust", Config::new()).unwrap();

    for position in [Point::new(0, 0), Point::new(0, 4), Point::new(1, 8), Point::new(2, 0)] {
        let scopes = mode.scope_descriptor_for_position(position);
        assert_eq!(scopes[0], "source.rust", "at {position:?}: {scopes:?}");
    }
}

#[test]
fn syntax_tree_descriptor_starts_at_tree_root() {
    let buffer = shared_buffer("function f() {\n  return 1;\n}\n");
    let mode =
        LanguageMode::new(buffer, full_registry(), "javascript", Config::new()).unwrap();

    let descriptor = mode.syntax_tree_scope_descriptor_for_position(Point::new(1, 4));
    assert_eq!(descriptor[0], "program");
    assert!(descriptor.contains(&"return_statement".to_string()));
}

#[test]
fn normalize_point_is_idempotent() {
    let buffer = shared_buffer("hello\n\nworld");
    let mode = LanguageMode::new(buffer, full_registry(), "javascript", Config::new()).unwrap();

    for position in [
        Point::new(0, 0),
        Point::new(0, 5),
        Point::new(0, 99),
        Point::new(1, 0),
        Point::new(9, 9),
    ] {
        let once = mode.normalize_point_for_position_query(position);
        let twice = mode.normalize_point_for_position_query(once);
        assert_eq!(once, twice, "normalizing {position:?}");
    }
}

// ==================== scope ids ====================

#[test]
fn scope_id_interning_is_a_stable_bijection() {
    let buffer = shared_buffer("x;\n");
    let mode = LanguageMode::new(buffer, full_registry(), "javascript", Config::new()).unwrap();

    for name in ["keyword", "string.quoted.double", "variable", "entity.name"] {
        let id = mode.get_or_create_scope_id(name);
        assert_eq!(mode.scope_name_for_scope_id(id).as_deref(), Some(name));
        assert_eq!(mode.get_or_create_scope_id(name), id);
    }
    assert_eq!(mode.get_or_create_scope_id("variable"), VAR_SCOPE_ID);
    assert_eq!(
        mode.class_name_for_scope_id(mode.get_or_create_scope_id("string.quoted")),
        Some("syntax--string syntax--quoted".to_string())
    );
}

// ==================== highlight iteration ====================

#[test]
fn highlight_events_balance_over_whole_buffer() {
    let buffer = shared_buffer("function f() {\n  return \"hi\";\n}\n");
    let range = buffer.borrow().range();
    let mode = LanguageMode::new(buffer, keyword_only_registry(), "javascript", Config::new())
        .unwrap();

    let (open, events) = collect_events(&mode, range);
    let mut depth = open.len() as i64;
    for (_, opened, closed) in &events {
        depth -= closed.len() as i64;
        depth += opened.len() as i64;
    }
    assert_eq!(depth, 0, "events: {events:?}");
}

#[test]
fn highlight_events_arrive_in_buffer_order() {
    let buffer = shared_buffer("function f() {\n  return \"hi\";\n}\n");
    let range = buffer.borrow().range();
    let mode =
        LanguageMode::new(buffer, full_registry(), "javascript", Config::new()).unwrap();

    let (_, events) = collect_events(&mode, range);
    assert!(!events.is_empty());
    for pair in events.windows(2) {
        assert!(pair[0].0 <= pair[1].0, "positions regressed: {pair:?}");
    }
}

#[test]
fn keyword_opens_at_its_capture_start() {
    let buffer = shared_buffer("function f() {\n  return 1;\n}\n");
    let range = buffer.borrow().range();
    let mode = LanguageMode::new(buffer, keyword_only_registry(), "javascript", Config::new())
        .unwrap();

    let (open, events) = collect_events(&mode, range);
    assert!(open.is_empty());
    let (position, opened, _) = &events[0];
    assert_eq!(*position, Point::new(0, 0));
    assert_eq!(opened, &vec!["source.js".to_string(), "keyword".to_string()]);
    // The keyword closes at column 8.
    assert!(events
        .iter()
        .any(|(p, _, closed)| *p == Point::new(0, 8) && closed.contains(&"keyword".to_string())));
}

// ==================== injections ====================

#[test]
fn script_tag_creates_javascript_injection() {
    let buffer = shared_buffer("<script>\nvar x = 1;\n</script>\n");
    let mode = LanguageMode::new(buffer, full_registry(), "html", Config::new()).unwrap();

    assert_eq!(mode.injection_marker_count(), 1);
    assert_eq!(
        mode.injection_marker_ranges(),
        vec![Range::new(Point::new(0, 8), Point::new(2, 0))]
    );

    let scopes = mode.scope_descriptor_for_position(Point::new(1, 0));
    let html_index = scopes.iter().position(|s| s == "text.html.basic").unwrap();
    let js_index = scopes.iter().position(|s| s == "source.js").unwrap();
    assert!(html_index < js_index, "scopes: {scopes:?}");
}

#[test]
fn destroying_the_mode_destroys_injection_layers() {
    let buffer = shared_buffer("<script>\nvar x = 1;\n</script>\n");
    let mode =
        LanguageMode::new(buffer.clone(), full_registry(), "html", Config::new()).unwrap();
    assert_eq!(mode.injection_marker_count(), 1);

    mode.destroy();
    assert!(mode.is_destroyed());
    assert_eq!(mode.injection_marker_count(), 0);
    assert!(mode.scope_descriptor_for_position(Point::new(1, 0)).is_empty());
}

#[test]
fn injection_layer_follows_edits() {
    let buffer = shared_buffer("<script>\nvar x = 1;\n</script>\n");
    let mode =
        LanguageMode::new(buffer.clone(), full_registry(), "html", Config::new()).unwrap();
    mode.take_highlight_invalidations();

    // Insert a line above the script element.
    let change = buffer.borrow_mut().set_text_in_range(
        Range::new(Point::new(0, 0), Point::new(0, 0)),
        "<p>hi</p>\n",
    );
    mode.buffer_did_change(&change);
    mode.buffer_did_finish_transaction(std::slice::from_ref(&change));

    assert_eq!(
        mode.injection_marker_ranges(),
        vec![Range::new(Point::new(1, 8), Point::new(3, 0))]
    );
    let scopes = mode.scope_descriptor_for_position(Point::new(2, 0));
    assert!(scopes.contains(&"source.js".to_string()), "{scopes:?}");
    assert!(!mode.take_highlight_invalidations().is_empty());
}

#[test]
fn removing_script_content_destroys_the_injection() {
    let buffer = shared_buffer("<script>\nvar x = 1;\n</script>\n");
    let mode =
        LanguageMode::new(buffer.clone(), full_registry(), "html", Config::new()).unwrap();
    assert_eq!(mode.injection_marker_count(), 1);

    let change = buffer.borrow_mut().set_text_in_range(
        Range::new(Point::new(0, 8), Point::new(2, 0)),
        "",
    );
    mode.buffer_did_change(&change);
    mode.buffer_did_finish_transaction(std::slice::from_ref(&change));

    assert_eq!(mode.injection_marker_count(), 0);
}

#[test]
fn update_for_injection_picks_up_late_grammar() {
    let mut registry = LanguageRegistry::empty();
    registry.add_grammar(
        &["html"],
        Grammar::new("text.html.basic", tree_sitter_html::LANGUAGE.into())
            .with_syntax_query(tree_sitter_html::HIGHLIGHTS_QUERY)
            .with_injection_rule(
                NodeInjection::new("raw_text", "javascript").within_parent("script_element"),
            ),
    );
    let registry = Rc::new(RefCell::new(registry));

    let buffer = shared_buffer("<script>\nvar x = 1;\n</script>\n");
    let mode =
        LanguageMode::new(buffer, registry.clone(), "html", Config::new()).unwrap();
    // No JavaScript grammar yet: the injection is skipped silently.
    assert_eq!(mode.injection_marker_count(), 0);

    registry.borrow_mut().add_grammar(
        &["javascript"],
        Grammar::new("source.js", tree_sitter_javascript::LANGUAGE.into())
            .with_syntax_query(tree_sitter_javascript::HIGHLIGHT_QUERY),
    );
    mode.update_for_injection("javascript");

    assert_eq!(mode.injection_marker_count(), 1);
    let scopes = mode.scope_descriptor_for_position(Point::new(1, 0));
    assert!(scopes.contains(&"source.js".to_string()), "{scopes:?}");
}

#[test]
fn cover_shallower_scopes_suppresses_host_boundaries_inside_content() {
    // Host grammar: JavaScript that captures template substitutions, with a
    // covering injection of real JavaScript over template strings.
    let mut registry = LanguageRegistry::empty();
    registry.add_grammar(
        &["javascript"],
        Grammar::new("source.js", tree_sitter_javascript::LANGUAGE.into())
            .with_syntax_query(tree_sitter_javascript::HIGHLIGHT_QUERY),
    );
    registry.add_grammar(
        &["host"],
        Grammar::new("source.host", tree_sitter_javascript::LANGUAGE.into())
            .with_syntax_query("(template_substitution) @meta.embedded")
            .with_injection_rule(
                NodeInjection::new("template_string", "javascript").covering_shallower_scopes(),
            ),
    );
    let registry = Rc::new(RefCell::new(registry));

    let buffer = shared_buffer("`a${b}c`;\n");
    let range = buffer.borrow().range();
    let mode = LanguageMode::new(buffer, registry, "host", Config::new()).unwrap();
    assert_eq!(mode.injection_marker_count(), 1);

    let (_, events) = collect_events(&mode, range);
    let embedded_opened = events
        .iter()
        .any(|(_, opened, _)| opened.contains(&"meta.embedded".to_string()));
    assert!(
        !embedded_opened,
        "host capture inside covered content should be suppressed: {events:?}"
    );
}

// ==================== edits and invalidation ====================

#[test]
fn edit_keeps_tree_in_sync_with_buffer() {
    let buffer = shared_buffer("function f() {\n  return 1;\n}\n");
    let mode =
        LanguageMode::new(buffer.clone(), full_registry(), "javascript", Config::new()).unwrap();
    assert!(mode.has_tokenized());
    mode.take_highlight_invalidations();

    let change = buffer.borrow_mut().set_text_in_range(
        Range::new(Point::new(1, 9), Point::new(1, 10)),
        "computeAnswer()",
    );
    mode.buffer_did_change(&change);
    mode.buffer_did_finish_transaction(std::slice::from_ref(&change));

    let expected = buffer.borrow().range();
    assert_eq!(mode.root_tree_range(), Some(expected));
    assert!(!mode.take_highlight_invalidations().is_empty());
}

#[test]
fn initial_parse_reports_tokenized_and_invalidation() {
    let buffer = shared_buffer("var x = 1;\n");
    let expected = buffer.borrow().range();
    let mode =
        LanguageMode::new(buffer, full_registry(), "javascript", Config::new()).unwrap();

    assert!(mode.has_tokenized());
    let invalidations = mode.take_highlight_invalidations();
    assert_eq!(invalidations, vec![expected]);
    assert!(mode.take_highlight_invalidations().is_empty());
}

#[test]
fn unknown_language_is_a_construction_error() {
    let buffer = shared_buffer("x");
    let result = LanguageMode::new(buffer, full_registry(), "fortran", Config::new());
    assert!(result.is_err());
}

// ==================== comment strings ====================

#[test]
fn comment_strings_prefer_the_innermost_layer() {
    let buffer = shared_buffer("<style>\na { color: red; }\n</style>\n");
    let mode = LanguageMode::new(buffer, full_registry(), "html", Config::new()).unwrap();

    let html = mode.comment_strings_for_position(Point::new(0, 0));
    assert_eq!(html.start.as_deref(), Some("<!--"));

    let css = mode.comment_strings_for_position(Point::new(1, 2));
    assert_eq!(css.start.as_deref(), Some("/*"));
    assert_eq!(css.end.as_deref(), Some("*/"));
}

#[test]
fn comment_strings_fall_back_to_scoped_config() {
    let mut registry = LanguageRegistry::empty();
    registry.add_grammar(
        &["plainjs"],
        Grammar::new("source.plain", tree_sitter_javascript::LANGUAGE.into()),
    );
    let registry = Rc::new(RefCell::new(registry));

    let mut config = Config::new();
    config.set_scoped("source.plain", "editor.commentStart", ";;");

    let buffer = shared_buffer("var x = 1;\n");
    let mode = LanguageMode::new(buffer, registry, "plainjs", config).unwrap();

    let comments = mode.comment_strings_for_position(Point::new(0, 0));
    assert_eq!(comments.start.as_deref(), Some(";;"));
    assert_eq!(comments.end, None);
}
