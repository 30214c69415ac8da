// Chunk: docs/chunks/grammar_registry - Grammar bundles and the language registry

//! Language registry mapping language tags to grammar bundles.
//!
//! A [`Grammar`] bundles a tree-sitter `Language` with its root scope name,
//! comment delimiters, injection rules, and query sources of the four kinds
//! the language mode understands (syntax, folds, indents, locals). The
//! [`LanguageRegistry`] maps normalized language names to shared grammars.
//!
//! Queries are kept as *sources* here and compiled lazily by each language
//! layer on first use; a compile failure is logged with the grammar identity
//! and that query kind is treated as absent from then on.

use std::borrow::Cow;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::warn;
use tree_sitter::{Language, Node, Query};

use crate::queries;

/// Comment delimiters for a language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentStrings {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl CommentStrings {
    /// Line comments: a start delimiter only.
    pub fn line(start: &str) -> Self {
        Self {
            start: Some(start.to_string()),
            end: None,
        }
    }

    /// Block comments: start and end delimiters.
    pub fn block(start: &str, end: &str) -> Self {
        Self {
            start: Some(start.to_string()),
            end: Some(end.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// The four query kinds a grammar may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Syntax,
    Folds,
    Indents,
    Locals,
}

impl QueryKind {
    fn label(self) -> &'static str {
        match self {
            QueryKind::Syntax => "syntax",
            QueryKind::Folds => "folds",
            QueryKind::Indents => "indents",
            QueryKind::Locals => "locals",
        }
    }
}

/// An injection point: a rule saying nodes of one type may embed another
/// language over some of their content. Each kind of injection implements
/// this capability interface directly.
pub trait InjectionRule {
    /// The node kind this rule applies to.
    fn node_type(&self) -> &str;

    /// The language tag for this node, or `None` to skip the injection.
    fn language(&self, node: &Node, source: &str) -> Option<String>;

    /// The nodes whose text the injected parser should see. Returning an
    /// empty list skips the injection.
    fn content<'tree>(&self, node: Node<'tree>) -> Vec<Node<'tree>>;

    /// Synthesize newline ranges between content ranges on different rows,
    /// preserving line numbering for the injected parser.
    fn newlines_between(&self) -> bool {
        false
    }

    /// Feed the content nodes' full text (true) or only the text between
    /// their named children (false).
    fn include_children(&self) -> bool {
        false
    }

    /// Suppress scopes of shallower layers inside this injection's content.
    fn cover_shallower_scopes(&self) -> bool {
        false
    }
}

/// Injects a fixed language over every node of one kind, optionally gated on
/// the node's parent kind. The content is the node itself.
pub struct NodeInjection {
    node_type: String,
    language: String,
    parent_type: Option<String>,
    newlines_between: bool,
    include_children: bool,
    cover_shallower_scopes: bool,
}

impl NodeInjection {
    pub fn new(node_type: &str, language: &str) -> Self {
        Self {
            node_type: node_type.to_string(),
            language: language.to_string(),
            parent_type: None,
            newlines_between: false,
            include_children: true,
            cover_shallower_scopes: false,
        }
    }

    /// Only inject when the node's parent has the given kind.
    pub fn within_parent(mut self, parent_type: &str) -> Self {
        self.parent_type = Some(parent_type.to_string());
        self
    }

    pub fn with_newlines_between(mut self) -> Self {
        self.newlines_between = true;
        self
    }

    /// Feed only the text between the node's named children.
    pub fn excluding_children(mut self) -> Self {
        self.include_children = false;
        self
    }

    pub fn covering_shallower_scopes(mut self) -> Self {
        self.cover_shallower_scopes = true;
        self
    }
}

impl InjectionRule for NodeInjection {
    fn node_type(&self) -> &str {
        &self.node_type
    }

    fn language(&self, node: &Node, _source: &str) -> Option<String> {
        if let Some(parent_type) = &self.parent_type {
            if node.parent()?.kind() != parent_type {
                return None;
            }
        }
        Some(self.language.clone())
    }

    fn content<'tree>(&self, node: Node<'tree>) -> Vec<Node<'tree>> {
        vec![node]
    }

    fn newlines_between(&self) -> bool {
        self.newlines_between
    }

    fn include_children(&self) -> bool {
        self.include_children
    }

    fn cover_shallower_scopes(&self) -> bool {
        self.cover_shallower_scopes
    }
}

/// Markdown fenced code blocks: the language comes from the fence's info
/// string (` ```rust `), the content is the fenced text.
pub struct FencedCodeInjection;

impl InjectionRule for FencedCodeInjection {
    fn node_type(&self) -> &str {
        "fenced_code_block"
    }

    fn language(&self, node: &Node, source: &str) -> Option<String> {
        let mut cursor = node.walk();
        let info = node
            .children(&mut cursor)
            .find(|child| child.kind() == "info_string")?;
        let text = info.utf8_text(source.as_bytes()).ok()?;
        let tag = text.split_whitespace().next()?;
        Some(tag.to_ascii_lowercase())
    }

    fn content<'tree>(&self, node: Node<'tree>) -> Vec<Node<'tree>> {
        let mut cursor = node.walk();
        node.children(&mut cursor)
            .filter(|child| child.kind() == "code_fence_content")
            .collect()
    }

    fn include_children(&self) -> bool {
        true
    }
}

/// A grammar bundle: language, scope name, comment strings, injection rules,
/// and query sources.
pub struct Grammar {
    scope_name: String,
    language: Language,
    comment_strings: CommentStrings,
    injection_rules: Vec<Box<dyn InjectionRule>>,
    syntax_source: Option<Cow<'static, str>>,
    folds_source: Option<Cow<'static, str>>,
    indents_source: Option<Cow<'static, str>>,
    locals_source: Option<Cow<'static, str>>,
}

impl Grammar {
    pub fn new(scope_name: &str, language: Language) -> Self {
        Self {
            scope_name: scope_name.to_string(),
            language,
            comment_strings: CommentStrings::default(),
            injection_rules: Vec::new(),
            syntax_source: None,
            folds_source: None,
            indents_source: None,
            locals_source: None,
        }
    }

    pub fn with_syntax_query(mut self, source: impl Into<Cow<'static, str>>) -> Self {
        self.syntax_source = Some(source.into());
        self
    }

    pub fn with_folds_query(mut self, source: impl Into<Cow<'static, str>>) -> Self {
        self.folds_source = Some(source.into());
        self
    }

    pub fn with_indents_query(mut self, source: impl Into<Cow<'static, str>>) -> Self {
        self.indents_source = Some(source.into());
        self
    }

    pub fn with_locals_query(mut self, source: impl Into<Cow<'static, str>>) -> Self {
        self.locals_source = Some(source.into());
        self
    }

    pub fn with_comment_strings(mut self, comment_strings: CommentStrings) -> Self {
        self.comment_strings = comment_strings;
        self
    }

    pub fn with_injection_rule(mut self, rule: impl InjectionRule + 'static) -> Self {
        self.injection_rules.push(Box::new(rule));
        self
    }

    /// The root scope name, e.g. `source.js`.
    pub fn scope_name(&self) -> &str {
        &self.scope_name
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn comment_strings(&self) -> &CommentStrings {
        &self.comment_strings
    }

    pub fn injection_rules(&self) -> &[Box<dyn InjectionRule>] {
        &self.injection_rules
    }

    /// Node kinds that can introduce injections under this grammar.
    pub fn injection_node_types(&self) -> Vec<&str> {
        self.injection_rules
            .iter()
            .map(|rule| rule.node_type())
            .collect()
    }

    pub fn query_source(&self, kind: QueryKind) -> Option<&str> {
        let source = match kind {
            QueryKind::Syntax => &self.syntax_source,
            QueryKind::Folds => &self.folds_source,
            QueryKind::Indents => &self.indents_source,
            QueryKind::Locals => &self.locals_source,
        };
        source.as_deref()
    }

    /// Compiles one of this grammar's queries. A missing source yields
    /// `None` silently; a compile failure is logged and also yields `None`.
    pub fn compile_query(&self, kind: QueryKind) -> Option<Query> {
        let source = self.query_source(kind)?;
        match Query::new(&self.language, source) {
            Ok(query) => Some(query),
            Err(error) => {
                warn!(
                    grammar = %self.scope_name,
                    kind = kind.label(),
                    %error,
                    "failed to compile query; treating it as absent"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("scope_name", &self.scope_name)
            .field("injection_rules", &self.injection_rules.len())
            .finish()
    }
}

/// Registry mapping language names to grammar bundles.
pub struct LanguageRegistry {
    grammars: HashMap<String, Rc<Grammar>>,
}

impl LanguageRegistry {
    /// Creates an empty registry. Useful for tests and for hosts that wire
    /// up their own grammar set.
    pub fn empty() -> Self {
        Self {
            grammars: HashMap::new(),
        }
    }

    /// Creates a registry with all built-in languages.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.add_grammar(
            &["rust"],
            Grammar::new("source.rust", tree_sitter_rust::LANGUAGE.into())
                .with_syntax_query(tree_sitter_rust::HIGHLIGHTS_QUERY)
                .with_folds_query(queries::RUST_FOLDS)
                .with_indents_query(queries::RUST_INDENTS)
                .with_comment_strings(CommentStrings::line("//")),
        );

        // C++ needs the C highlight query as a base, with C++-specific
        // additions layered on top: the C++ grammar's query only covers the
        // constructs C doesn't have.
        let cpp_syntax: &'static str = Box::leak(
            format!(
                "{}\n{}",
                tree_sitter_c::HIGHLIGHT_QUERY,
                tree_sitter_cpp::HIGHLIGHT_QUERY
            )
            .into_boxed_str(),
        );
        registry.add_grammar(
            &["cpp"],
            Grammar::new("source.cpp", tree_sitter_cpp::LANGUAGE.into())
                .with_syntax_query(cpp_syntax)
                .with_folds_query(queries::C_FOLDS)
                .with_indents_query(queries::C_INDENTS)
                .with_comment_strings(CommentStrings::line("//")),
        );

        registry.add_grammar(
            &["c"],
            Grammar::new("source.c", tree_sitter_c::LANGUAGE.into())
                .with_syntax_query(tree_sitter_c::HIGHLIGHT_QUERY)
                .with_folds_query(queries::C_FOLDS)
                .with_indents_query(queries::C_INDENTS)
                .with_comment_strings(CommentStrings::block("/*", "*/")),
        );

        registry.add_grammar(
            &["python"],
            Grammar::new("source.python", tree_sitter_python::LANGUAGE.into())
                .with_syntax_query(tree_sitter_python::HIGHLIGHTS_QUERY)
                .with_indents_query(queries::PYTHON_INDENTS)
                .with_comment_strings(CommentStrings::line("#")),
        );

        // TypeScript layers its additions over the JavaScript base query,
        // same pattern as C/C++.
        let ts_syntax: &'static str = Box::leak(
            format!(
                "{}\n{}",
                tree_sitter_javascript::HIGHLIGHT_QUERY,
                tree_sitter_typescript::HIGHLIGHTS_QUERY
            )
            .into_boxed_str(),
        );
        registry.add_grammar(
            &["typescript"],
            Grammar::new(
                "source.ts",
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            )
            .with_syntax_query(ts_syntax)
            .with_indents_query(queries::JAVASCRIPT_INDENTS)
            .with_locals_query(tree_sitter_typescript::LOCALS_QUERY)
            .with_comment_strings(CommentStrings::line("//")),
        );

        registry.add_grammar(
            &["tsx"],
            Grammar::new("source.tsx", tree_sitter_typescript::LANGUAGE_TSX.into())
                .with_syntax_query(ts_syntax)
                .with_indents_query(queries::JAVASCRIPT_INDENTS)
                .with_locals_query(tree_sitter_typescript::LOCALS_QUERY)
                .with_comment_strings(CommentStrings::line("//")),
        );

        registry.add_grammar(
            &["javascript"],
            Grammar::new("source.js", tree_sitter_javascript::LANGUAGE.into())
                .with_syntax_query(tree_sitter_javascript::HIGHLIGHT_QUERY)
                .with_folds_query(queries::JAVASCRIPT_FOLDS)
                .with_indents_query(queries::JAVASCRIPT_INDENTS)
                .with_locals_query(tree_sitter_javascript::LOCALS_QUERY)
                .with_comment_strings(CommentStrings::line("//")),
        );

        registry.add_grammar(
            &["go"],
            Grammar::new("source.go", tree_sitter_go::LANGUAGE.into())
                .with_syntax_query(tree_sitter_go::HIGHLIGHTS_QUERY)
                .with_folds_query(queries::GO_FOLDS)
                .with_indents_query(queries::GO_INDENTS)
                .with_comment_strings(CommentStrings::line("//")),
        );

        registry.add_grammar(
            &["json"],
            Grammar::new("source.json", tree_sitter_json::LANGUAGE.into())
                .with_syntax_query(tree_sitter_json::HIGHLIGHTS_QUERY)
                .with_folds_query(queries::JSON_FOLDS),
        );

        registry.add_grammar(
            &["toml"],
            Grammar::new("source.toml", tree_sitter_toml_ng::LANGUAGE.into())
                .with_syntax_query(tree_sitter_toml_ng::HIGHLIGHTS_QUERY)
                .with_comment_strings(CommentStrings::line("#")),
        );

        registry.add_grammar(
            &["markdown"],
            Grammar::new("text.md", tree_sitter_md::LANGUAGE.into())
                .with_syntax_query(tree_sitter_md::HIGHLIGHT_QUERY_BLOCK)
                .with_injection_rule(FencedCodeInjection),
        );

        registry.add_grammar(
            &["html"],
            Grammar::new("text.html.basic", tree_sitter_html::LANGUAGE.into())
                .with_syntax_query(tree_sitter_html::HIGHLIGHTS_QUERY)
                .with_folds_query(queries::HTML_FOLDS)
                .with_injection_rule(
                    NodeInjection::new("raw_text", "javascript").within_parent("script_element"),
                )
                .with_injection_rule(
                    NodeInjection::new("raw_text", "css").within_parent("style_element"),
                )
                .with_comment_strings(CommentStrings::block("<!--", "-->")),
        );

        registry.add_grammar(
            &["css"],
            Grammar::new("source.css", tree_sitter_css::LANGUAGE.into())
                .with_syntax_query(tree_sitter_css::HIGHLIGHTS_QUERY)
                .with_folds_query(queries::CSS_FOLDS)
                .with_comment_strings(CommentStrings::block("/*", "*/")),
        );

        registry.add_grammar(
            &["bash"],
            Grammar::new("source.shell", tree_sitter_bash::LANGUAGE.into())
                .with_syntax_query(tree_sitter_bash::HIGHLIGHT_QUERY)
                .with_comment_strings(CommentStrings::line("#")),
        );

        registry
    }

    /// Registers a grammar under one or more names and returns the shared
    /// handle.
    pub fn add_grammar(&mut self, names: &[&str], grammar: Grammar) -> Rc<Grammar> {
        let grammar = Rc::new(grammar);
        for name in names {
            self.grammars.insert(name.to_string(), grammar.clone());
        }
        grammar
    }

    /// Looks up a grammar by language name.
    ///
    /// Names are normalized (lowercased, trimmed) and common aliases are
    /// folded onto their canonical entry, so `"JS"`, `"javascript"` and
    /// `" js "` all resolve to the same grammar.
    pub fn grammar_for_language(&self, name: &str) -> Option<Rc<Grammar>> {
        let name = name.to_lowercase();
        let name = name.trim();

        let canonical = match name {
            "rs" => "rust",
            "js" | "jsx" | "mjs" => "javascript",
            "ts" => "typescript",
            "py" => "python",
            "c++" | "cc" | "cxx" => "cpp",
            "golang" => "go",
            "md" => "markdown",
            "htm" => "html",
            "sh" | "shell" | "zsh" => "bash",
            other => other,
        };

        self.grammars.get(canonical).cloned()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_languages_present() {
        let registry = LanguageRegistry::new();
        for name in [
            "rust",
            "c",
            "cpp",
            "python",
            "javascript",
            "typescript",
            "tsx",
            "go",
            "json",
            "toml",
            "markdown",
            "html",
            "css",
            "bash",
        ] {
            assert!(
                registry.grammar_for_language(name).is_some(),
                "language '{}' should be registered",
                name
            );
        }
    }

    #[test]
    fn test_aliases_resolve_to_same_grammar() {
        let registry = LanguageRegistry::new();
        let a = registry.grammar_for_language("javascript").unwrap();
        let b = registry.grammar_for_language("js").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_trims() {
        let registry = LanguageRegistry::new();
        assert!(registry.grammar_for_language("RUST").is_some());
        assert!(registry.grammar_for_language(" Python ").is_some());
    }

    #[test]
    fn test_unknown_language() {
        let registry = LanguageRegistry::new();
        assert!(registry.grammar_for_language("fortran").is_none());
        assert!(registry.grammar_for_language("").is_none());
    }

    #[test]
    fn test_compile_syntax_query() {
        let registry = LanguageRegistry::new();
        let grammar = registry.grammar_for_language("javascript").unwrap();
        assert!(grammar.compile_query(QueryKind::Syntax).is_some());
        assert!(grammar.compile_query(QueryKind::Locals).is_some());
    }

    #[test]
    fn test_missing_query_kind_is_absent() {
        let registry = LanguageRegistry::new();
        let grammar = registry.grammar_for_language("bash").unwrap();
        assert!(grammar.compile_query(QueryKind::Folds).is_none());
    }

    #[test]
    fn test_bad_query_source_is_absent() {
        let grammar = Grammar::new("source.js", tree_sitter_javascript::LANGUAGE.into())
            .with_folds_query("(this_node_kind_does_not_exist) @fold");
        assert!(grammar.compile_query(QueryKind::Folds).is_none());
    }

    #[test]
    fn test_html_injection_rules() {
        let registry = LanguageRegistry::new();
        let grammar = registry.grammar_for_language("html").unwrap();
        assert_eq!(grammar.injection_node_types(), vec!["raw_text", "raw_text"]);
    }
}
