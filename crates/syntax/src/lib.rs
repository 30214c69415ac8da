// Chunk: docs/chunks/language_mode - Syntax-aware language mode crate

//! canopy-syntax: a tree-sitter language mode for text editors.
//!
//! This crate sits between a text buffer and an editor's rendering,
//! folding, indentation, and scope-query subsystems. For every edit it
//! maintains an up-to-date forest of parse trees — one root tree for the
//! file's primary grammar plus injection trees for embedded languages
//! (CSS inside HTML, fenced code inside Markdown) — and answers queries
//! from that forest:
//!
//! - [`LanguageMode::build_highlight_iterator`]: a cursor over open/close
//!   scope boundary events merged across all layers in buffer order
//! - [`LanguageMode::scope_descriptor_for_position`]: the ordered scope
//!   names covering a position
//! - [`LanguageMode::get_foldable_ranges`] and friends: collapsible
//!   regions, flat or by nesting level
//! - [`LanguageMode::suggested_indent_for_buffer_row`]: indentation hints
//!   from `@indent` / `@indent_end` / `@branch` captures
//! - [`LanguageMode::find_definition_for_local_reference`]: scope-resolved
//!   name lookup from `local.*` captures
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use canopy_buffer::{Point, TextBuffer};
//! use canopy_syntax::{Config, LanguageMode, LanguageRegistry};
//!
//! let buffer = Rc::new(RefCell::new(TextBuffer::from_str("fn main() {}\n")));
//! let registry = Rc::new(RefCell::new(LanguageRegistry::new()));
//! let mode = LanguageMode::new(buffer, registry, "rust", Config::new()).unwrap();
//!
//! let scopes = mode.scope_descriptor_for_position(Point::new(0, 1));
//! assert_eq!(scopes[0], "source.rust");
//! ```
//!
//! The scheduling model is single-threaded and synchronous: a buffer
//! change is recorded on every layer immediately, and the next
//! transaction end reparses the forest and reports invalidation ranges.

mod captures;
mod edit;
mod fold_resolver;
mod highlight_iterator;
mod language_layer;
mod language_mode;
mod node_range_set;
pub mod queries;
mod registry;
mod scope_resolver;

pub use edit::input_edit_for_change;
pub use fold_resolver::FoldResolver;
pub use highlight_iterator::{HighlightIterator, LayerHighlightIterator};
pub use language_layer::{LanguageLayer, SyntaxNodeInfo};
pub use language_mode::{
    indent_level_for_line, Config, IndentOptions, LanguageMode, LanguageModeError, ScopeSelector,
};
pub use node_range_set::NodeRangeSet;
pub use registry::{
    CommentStrings, FencedCodeInjection, Grammar, InjectionRule, LanguageRegistry, NodeInjection,
    QueryKind,
};
pub use scope_resolver::{
    adjusted_capture_range, BoundarySide, CaptureProperties, ScopeBoundary, ScopeId, ScopeIdMap,
    ScopeResolver, VAR_SCOPE_ID,
};
