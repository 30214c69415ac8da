// Chunk: docs/chunks/grammar_registry - Built-in fold and indent query sources

//! Fold and indent query sources for the built-in grammars.
//!
//! Grammar crates ship highlight and injection queries as constants, but not
//! fold or indent queries; these fill the gap for the registry's built-in
//! table. The capture vocabulary is the stable contract with grammar
//! authors: `@fold` / `@fold.start` / `@fold.end` with `fold.*` properties,
//! and `@indent` / `@indent_end` / `@branch`.

pub const RUST_FOLDS: &str = r#"
(block) @fold
(declaration_list) @fold
(field_declaration_list) @fold
(enum_variant_list) @fold
(match_block) @fold
(use_list) @fold
"#;

pub const RUST_INDENTS: &str = r#"
["{" "[" "("] @indent
["}" "]" ")"] @indent_end
"#;

pub const C_FOLDS: &str = r##"
(compound_statement) @fold
(enumerator_list) @fold
(field_declaration_list) @fold

["#if" "#ifdef" "#ifndef" "#else" "#elif"] @fold.start
["#else" "#elif" "#endif"] @fold.end
"##;

pub const C_INDENTS: &str = r#"
["{" "[" "("] @indent
["}" "]" ")"] @indent_end
"else" @branch
"#;

pub const JAVASCRIPT_FOLDS: &str = r#"
(statement_block) @fold
(class_body) @fold
(object) @fold
(switch_body) @fold
(array) @fold
"#;

pub const JAVASCRIPT_INDENTS: &str = r#"
["{" "[" "("] @indent
["}" "]" ")"] @indent_end
"else" @branch
"#;

pub const PYTHON_INDENTS: &str = r#"
":" @indent
["else" "elif" "except" "finally"] @branch
"#;

pub const GO_FOLDS: &str = r#"
(block) @fold
(field_declaration_list) @fold
(literal_value) @fold
"#;

pub const GO_INDENTS: &str = r#"
["{" "[" "("] @indent
["}" "]" ")"] @indent_end
"#;

pub const JSON_FOLDS: &str = r#"
(object) @fold
(array) @fold
"#;

pub const HTML_FOLDS: &str = r#"
((element) @fold
 (#set! fold.endAt "lastChild.startPosition"))
"#;

pub const CSS_FOLDS: &str = r#"
(block) @fold
"#;
