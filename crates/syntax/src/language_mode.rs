// Chunk: docs/chunks/language_mode - Top-level facade over the layer forest

//! The language mode: the facade the editor host talks to.
//!
//! Owns the root [`LanguageLayer`], routes buffer change events into the
//! layer forest, and answers every scope, fold, indent, comment, and
//! highlight query by selecting the relevant layers and delegating.
//!
//! Events are drain-style rather than callback-style: the host calls
//! [`LanguageMode::take_highlight_invalidations`] after a transaction to
//! learn which ranges need re-rendering, and [`LanguageMode::has_tokenized`]
//! reports the one-shot initial-parse event.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use canopy_buffer::{MarkerLayerId, Point, Range, TextBuffer, TextChange};
use thiserror::Error;

use crate::captures::captures_in_range;
use crate::edit::input_edit_for_change;
use crate::highlight_iterator::{CoverRegion, HighlightIterator, LayerIterSeed};
use crate::language_layer::{LanguageLayer, LayerContext, SyntaxNodeInfo};
use crate::registry::{CommentStrings, Grammar, LanguageRegistry, QueryKind};
use crate::scope_resolver::{ScopeId, ScopeIdMap};

/// Errors surfaced at construction. Everything after construction degrades
/// instead of erroring.
#[derive(Debug, Error)]
pub enum LanguageModeError {
    #[error("no grammar registered for language `{0}`")]
    UnknownLanguage(String),
}

/// A dotted scope selector with `,` alternation.
///
/// Each alternative matches by segment prefix: `string.quoted` matches
/// `string.quoted.double.js` but not `string.unquoted`.
#[derive(Debug, Clone)]
pub struct ScopeSelector {
    alternatives: Vec<Vec<String>>,
}

impl ScopeSelector {
    pub fn parse(source: &str) -> Self {
        let alternatives = source
            .split(',')
            .map(|alternative| {
                alternative
                    .trim()
                    .split('.')
                    .filter(|segment| !segment.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|segments| !segments.is_empty())
            .collect();
        Self { alternatives }
    }

    pub fn matches(&self, scope_name: &str) -> bool {
        let segments: Vec<&str> = scope_name.split('.').collect();
        self.alternatives.iter().any(|alternative| {
            alternative.len() <= segments.len()
                && alternative
                    .iter()
                    .zip(&segments)
                    .all(|(want, have)| want == have)
        })
    }
}

/// The configuration-store collaborator: scoped key/value entries used as
/// the fallback for comment delimiters.
#[derive(Debug, Default)]
pub struct Config {
    entries: Vec<ConfigEntry>,
}

#[derive(Debug)]
struct ConfigEntry {
    key: String,
    selector: Option<ScopeSelector>,
    value: String,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.push(ConfigEntry {
            key: key.to_string(),
            selector: None,
            value: value.to_string(),
        });
    }

    pub fn set_scoped(&mut self, selector: &str, key: &str, value: &str) {
        self.entries.push(ConfigEntry {
            key: key.to_string(),
            selector: Some(ScopeSelector::parse(selector)),
            value: value.to_string(),
        });
    }

    /// Scoped entries matching any scope in the descriptor win over
    /// unscoped ones; later entries override earlier.
    pub fn get(&self, key: &str, scopes: &[String]) -> Option<&str> {
        let mut unscoped = None;
        let mut scoped = None;
        for entry in &self.entries {
            if entry.key != key {
                continue;
            }
            match &entry.selector {
                None => unscoped = Some(entry.value.as_str()),
                Some(selector) => {
                    if scopes.iter().any(|scope| selector.matches(scope)) {
                        scoped = Some(entry.value.as_str());
                    }
                }
            }
        }
        scoped.or(unscoped)
    }
}

/// Options for [`LanguageMode::suggested_indent_for_buffer_row`].
#[derive(Debug, Clone, Copy)]
pub struct IndentOptions {
    pub skip_blank_lines: bool,
    pub skip_dedent_check: bool,
}

impl Default for IndentOptions {
    fn default() -> Self {
        Self {
            skip_blank_lines: true,
            skip_dedent_check: false,
        }
    }
}

/// Indent level of a line: leading spaces count one column, tabs count
/// `tab_length`; the level is whole tabs.
pub fn indent_level_for_line(line: &str, tab_length: usize) -> usize {
    let tab_length = tab_length.max(1);
    let mut columns = 0;
    for ch in line.chars() {
        match ch {
            ' ' => columns += 1,
            '\t' => columns += tab_length,
            _ => break,
        }
    }
    columns / tab_length
}

/// The syntax-aware language mode over one buffer.
pub struct LanguageMode {
    buffer: Rc<RefCell<TextBuffer>>,
    registry: Rc<RefCell<LanguageRegistry>>,
    config: Config,
    interner: RefCell<ScopeIdMap>,
    root: RefCell<LanguageLayer>,
    marker_layer: MarkerLayerId,
    foldable_cache: RefCell<Vec<Option<bool>>>,
    invalidations: RefCell<Vec<Range>>,
    tokenized: Cell<bool>,
    destroyed: Cell<bool>,
}

impl LanguageMode {
    /// Creates the mode and performs the initial root parse synchronously.
    pub fn new(
        buffer: Rc<RefCell<TextBuffer>>,
        registry: Rc<RefCell<LanguageRegistry>>,
        language: &str,
        config: Config,
    ) -> Result<Self, LanguageModeError> {
        let grammar = registry
            .borrow()
            .grammar_for_language(language)
            .ok_or_else(|| LanguageModeError::UnknownLanguage(language.to_string()))?;
        let marker_layer = buffer.borrow_mut().add_marker_layer();
        let interner = RefCell::new(ScopeIdMap::new());
        let root = LanguageLayer::new(grammar, 0, None, None, false, &interner);

        let mode = Self {
            buffer,
            registry,
            config,
            interner,
            root: RefCell::new(root),
            marker_layer,
            foldable_cache: RefCell::new(Vec::new()),
            invalidations: RefCell::new(Vec::new()),
            tokenized: Cell::new(false),
            destroyed: Cell::new(false),
        };
        {
            let ctx = mode.ctx();
            mode.root.borrow_mut().update(&ctx, None);
        }
        mode.tokenized.set(true);
        Ok(mode)
    }

    fn ctx(&self) -> LayerContext<'_> {
        LayerContext {
            buffer: &self.buffer,
            registry: &self.registry,
            interner: &self.interner,
            marker_layer: self.marker_layer,
            invalidations: &self.invalidations,
        }
    }

    /// The root grammar.
    pub fn grammar(&self) -> Rc<Grammar> {
        self.root.borrow().grammar().clone()
    }

    /// The root grammar's scope name.
    pub fn root_scope_name(&self) -> String {
        self.root.borrow().grammar().scope_name().to_string()
    }

    /// True once the initial root parse has completed.
    pub fn has_tokenized(&self) -> bool {
        self.tokenized.get()
    }

    /// Drains the highlight invalidation ranges recorded since the last
    /// call. Recorded strictly after each tree swap.
    pub fn take_highlight_invalidations(&self) -> Vec<Range> {
        std::mem::take(&mut self.invalidations.borrow_mut())
    }

    /// Tears down every layer and the injections marker layer.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        {
            let ctx = self.ctx();
            self.root.borrow_mut().destroy(&ctx);
        }
        self.buffer.borrow_mut().remove_marker_layer(self.marker_layer);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Number of live injection markers; each corresponds to one child
    /// layer somewhere in the forest.
    pub fn injection_marker_count(&self) -> usize {
        self.buffer
            .borrow()
            .marker_layer(self.marker_layer)
            .map_or(0, |layer| layer.len())
    }

    /// Current injection marker ranges, in buffer order.
    pub fn injection_marker_ranges(&self) -> Vec<Range> {
        let buffer = self.buffer.borrow();
        let Some(layer) = buffer.marker_layer(self.marker_layer) else {
            return Vec::new();
        };
        let mut ranges: Vec<Range> = layer
            .marker_ids()
            .into_iter()
            .filter_map(|id| layer.range_for(id))
            .collect();
        ranges.sort();
        ranges
    }

    /// The root tree's span, for edit-consistency checks.
    pub fn root_tree_range(&self) -> Option<Range> {
        let root = self.root.borrow();
        root.tree()
            .map(|tree| crate::edit::point_range(tree.root_node().range()))
    }

    // ==================== change routing ====================

    /// Records one buffer change on every live layer's tree. No reparse
    /// happens until the transaction ends.
    pub fn buffer_did_change(&self, change: &TextChange) {
        if self.destroyed.get() {
            return;
        }
        let edit = {
            let buffer = self.buffer.borrow();
            input_edit_for_change(change, &buffer)
        };
        self.root.borrow_mut().handle_text_change(&edit);
    }

    /// Ends a transaction: splices the per-row foldable cache and reparses
    /// the whole layer forest.
    pub fn buffer_did_finish_transaction(&self, changes: &[TextChange]) {
        if self.destroyed.get() {
            return;
        }
        {
            let mut cache = self.foldable_cache.borrow_mut();
            for change in changes {
                let start_row = change.new_range.start.row.min(cache.len());
                let old_rows = change.old_range.row_span() + 1;
                let new_rows = change.new_range.row_span() + 1;
                let remove_end = (start_row + old_rows).min(cache.len());
                drop(cache.splice(
                    start_row..remove_end,
                    std::iter::repeat(None).take(new_rows),
                ));
            }
        }
        let ctx = self.ctx();
        self.root.borrow_mut().update(&ctx, None);
    }

    /// Re-evaluates injections after a candidate grammar was registered or
    /// replaced.
    pub fn update_for_injection(&self, _language: &str) {
        if self.destroyed.get() {
            return;
        }
        let ctx = self.ctx();
        let range = self.buffer.borrow().range();
        self.root.borrow_mut().populate_injections(&ctx, range);
    }

    /// Drops every layer's compiled-query caches and invalidates the whole
    /// buffer; the reload path after replacing query sources.
    pub fn invalidate_queries(&self) {
        if self.destroyed.get() {
            return;
        }
        self.root.borrow_mut().clear_query_caches();
        let range = self.buffer.borrow().range();
        self.invalidations.borrow_mut().push(range);
    }

    // ==================== scope ids ====================

    pub fn get_or_create_scope_id(&self, name: &str) -> ScopeId {
        self.interner.borrow_mut().get_or_create(name)
    }

    pub fn scope_name_for_scope_id(&self, id: ScopeId) -> Option<String> {
        self.interner.borrow().name_for(id).map(String::from)
    }

    pub fn class_name_for_scope_id(&self, id: ScopeId) -> Option<String> {
        self.interner.borrow().class_name_for(id)
    }

    // ==================== highlighting ====================

    /// A merged boundary iterator over all layers. Null (immediately done)
    /// until the root layer has parsed.
    pub fn build_highlight_iterator(&self) -> HighlightIterator<'_> {
        HighlightIterator::new(self)
    }

    pub(crate) fn highlight_seeds(
        &self,
        range: Range,
    ) -> (Vec<LayerIterSeed>, Vec<CoverRegion>) {
        let mut seeds = Vec::new();
        let mut cover_regions = Vec::new();
        if self.destroyed.get() {
            return (seeds, cover_regions);
        }
        let ctx = self.ctx();
        let root = self.root.borrow();
        if root.tree().is_none() {
            return (seeds, cover_regions);
        }
        root.for_each_layer(&mut |layer| {
            let Some(extent) = layer.extent(&ctx) else {
                return;
            };
            if !extent.intersects(&range) {
                return;
            }
            if layer.covers_shallower_scopes() {
                cover_regions.push(CoverRegion {
                    depth: layer.depth(),
                    ranges: layer.content_point_ranges(&ctx),
                });
            }
            let (boundaries, already_open) =
                layer.get_syntax_boundaries(&ctx, range.start, range.end);
            seeds.push(LayerIterSeed {
                boundaries: boundaries.into_iter().collect(),
                already_open,
                depth: layer.depth(),
            });
        });
        (seeds, cover_regions)
    }

    // ==================== scope queries ====================

    /// Clips, then moves a point at end-of-line onto the character to its
    /// left. Idempotent.
    pub fn normalize_point_for_position_query(&self, position: Point) -> Point {
        let buffer = self.buffer.borrow();
        let mut position = buffer.clip_position(position);
        let line = buffer.line(position.row);
        if position.column > 0 && position.column == line.len() {
            position.column = line[..position.column]
                .char_indices()
                .last()
                .map(|(index, _)| index)
                .unwrap_or(0);
        }
        position
    }

    /// Ordered scope names covering a position, outermost first. The first
    /// element is always the root grammar's scope name.
    pub fn scope_descriptor_for_position(&self, position: Point) -> Vec<String> {
        let mut names = Vec::new();
        if self.destroyed.get() {
            return names;
        }
        let position = self.normalize_point_for_position_query(position);
        let ctx = self.ctx();
        let root = self.root.borrow();
        let mut ids: Vec<ScopeId> = Vec::new();
        root.for_each_layer(&mut |layer| {
            let Some(extent) = layer.extent(&ctx) else {
                return;
            };
            if !extent.contains_point_inclusive(position) {
                return;
            }
            if layer.adds_language_scope() {
                ids.push(layer.language_scope_id());
            }
            for entry in layer.scope_map_at_position(&ctx, position) {
                ids.push(entry.scope_id);
            }
        });
        let interner = self.interner.borrow();
        for id in ids {
            if let Some(name) = interner.name_for(id) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Ordered node-kind names from the root grammar down to the smallest
    /// node at the position, aggregated across layers. Anonymous kinds are
    /// quoted.
    pub fn syntax_tree_scope_descriptor_for_position(&self, position: Point) -> Vec<String> {
        struct Entry {
            start: usize,
            end: usize,
            depth: usize,
            name: String,
        }
        let mut entries: Vec<Entry> = Vec::new();
        if self.destroyed.get() {
            return Vec::new();
        }
        let position = self.normalize_point_for_position_query(position);
        let ctx = self.ctx();
        let root = self.root.borrow();
        root.for_each_layer(&mut |layer| {
            let Some(extent) = layer.extent(&ctx) else {
                return;
            };
            if !extent.contains_point_inclusive(position) {
                return;
            }
            let chain = layer.node_infos_at_position(&ctx, position);
            for info in chain.into_iter().rev() {
                let name = if info.is_named {
                    info.kind
                } else {
                    format!("\"{}\"", info.kind)
                };
                entries.push(Entry {
                    start: info.start_byte,
                    end: info.end_byte,
                    depth: layer.depth(),
                    name,
                });
            }
        });
        entries.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(b.end.cmp(&a.end))
                .then(a.depth.cmp(&b.depth))
        });
        entries.into_iter().map(|entry| entry.name).collect()
    }

    /// The smallest capture range covering the position whose scope name
    /// matches the selector. Deeper layers break size ties.
    pub fn buffer_range_for_scope_at_position(
        &self,
        selector: &ScopeSelector,
        position: Point,
    ) -> Option<Range> {
        if self.destroyed.get() {
            return None;
        }
        let position = self.normalize_point_for_position_query(position);
        let ctx = self.ctx();
        let root = self.root.borrow();
        let mut best: Option<(usize, usize, Range)> = None;
        root.for_each_layer(&mut |layer| {
            let Some(extent) = layer.extent(&ctx) else {
                return;
            };
            if !extent.contains_point_inclusive(position) {
                return;
            }
            for entry in layer.scope_map_at_position(&ctx, position) {
                let matches = self
                    .interner
                    .borrow()
                    .name_for(entry.scope_id)
                    .is_some_and(|name| selector.matches(name));
                if !matches {
                    continue;
                }
                let candidate = (entry.byte_len, layer.depth(), entry.range);
                best = match best.take() {
                    None => Some(candidate),
                    Some(current) => {
                        if candidate.0 < current.0
                            || (candidate.0 == current.0 && candidate.1 > current.1)
                        {
                            Some(candidate)
                        } else {
                            Some(current)
                        }
                    }
                };
            }
        });
        best.map(|(_, _, range)| range)
    }

    /// The smallest node across all covering layers that contains the
    /// position and passes the predicate. Deeper layers break size ties.
    pub fn get_syntax_node_at_position(
        &self,
        position: Point,
        predicate: Option<&dyn Fn(&SyntaxNodeInfo, &Grammar) -> bool>,
    ) -> Option<SyntaxNodeInfo> {
        if self.destroyed.get() {
            return None;
        }
        let position = self.buffer.borrow().clip_position(position);
        let ctx = self.ctx();
        let root = self.root.borrow();
        let mut best: Option<(usize, usize, SyntaxNodeInfo)> = None;
        root.for_each_layer(&mut |layer| {
            let Some(extent) = layer.extent(&ctx) else {
                return;
            };
            if !extent.contains_point_inclusive(position) {
                return;
            }
            for info in layer.node_infos_at_position(&ctx, position) {
                if let Some(predicate) = predicate {
                    if !predicate(&info, layer.grammar()) {
                        continue;
                    }
                }
                consider_candidate(&mut best, info.byte_len(), layer.depth(), info);
                break;
            }
        });
        best.map(|(_, _, info)| info)
    }

    /// The smallest node across all covering layers that contains `range`
    /// and passes the predicate.
    pub fn get_syntax_node_containing_range(
        &self,
        range: Range,
        predicate: Option<&dyn Fn(&SyntaxNodeInfo, &Grammar) -> bool>,
    ) -> Option<SyntaxNodeInfo> {
        if self.destroyed.get() {
            return None;
        }
        let ctx = self.ctx();
        let root = self.root.borrow();
        let mut best: Option<(usize, usize, SyntaxNodeInfo)> = None;
        root.for_each_layer(&mut |layer| {
            let Some(extent) = layer.extent(&ctx) else {
                return;
            };
            if !extent.contains_range(&range) {
                return;
            }
            for info in layer.node_infos_containing_range(&ctx, range) {
                if let Some(predicate) = predicate {
                    if !predicate(&info, layer.grammar()) {
                        continue;
                    }
                }
                consider_candidate(&mut best, info.byte_len(), layer.depth(), info);
                break;
            }
        });
        best.map(|(_, _, info)| info)
    }

    // ==================== locals ====================

    /// `local.reference` captures containing the position, deepest first.
    pub fn local_references_at_point(&self, position: Point) -> Vec<SyntaxNodeInfo> {
        if self.destroyed.get() {
            return Vec::new();
        }
        let position = self.normalize_point_for_position_query(position);
        let ctx = self.ctx();
        let root = self.root.borrow();
        let mut references = Vec::new();
        root.for_each_layer(&mut |layer| {
            let Some(extent) = layer.extent(&ctx) else {
                return;
            };
            if !extent.contains_point_inclusive(position) {
                return;
            }
            references.extend(layer.local_references_at_point(&ctx, position));
        });
        references.sort_by_key(SyntaxNodeInfo::byte_len);
        references
    }

    /// Scope-resolved definition lookup for a reference node.
    pub fn find_definition_for_local_reference(
        &self,
        reference: &SyntaxNodeInfo,
    ) -> Option<SyntaxNodeInfo> {
        if self.destroyed.get() {
            return None;
        }
        let ctx = self.ctx();
        let root = self.root.borrow();
        let mut result = None;
        root.for_each_layer(&mut |layer| {
            if result.is_some() {
                return;
            }
            let Some(extent) = layer.extent(&ctx) else {
                return;
            };
            if !extent.contains_range(&reference.range) {
                return;
            }
            if layer.query(QueryKind::Locals).is_none() {
                return;
            }
            result = layer.find_definition_for_local_reference(&ctx, reference);
        });
        result
    }

    // ==================== folds ====================

    /// The first multi-row fold starting on `row`, checking the deepest
    /// covering layer first.
    pub fn get_fold_range_for_row(&self, row: usize) -> Option<Range> {
        if self.destroyed.get() {
            return None;
        }
        let ctx = self.ctx();
        let mut root = self.root.borrow_mut();
        fold_range_for_row_deepest(&mut root, &ctx, row)
    }

    /// Delegates to the fold lookup for the point's row.
    pub fn get_foldable_range_containing_point(&self, position: Point) -> Option<Range> {
        self.get_fold_range_for_row(position.row)
    }

    /// Every fold across every layer, accumulated into one list.
    pub fn get_foldable_ranges(&self) -> Vec<Range> {
        if self.destroyed.get() {
            return Vec::new();
        }
        let ctx = self.ctx();
        let mut root = self.root.borrow_mut();
        let mut folds = Vec::new();
        root.collect_fold_ranges(&ctx, &mut folds);
        folds
    }

    /// Folds whose start is visited at nesting level `level`, walking all
    /// layers' folds in buffer order through a (position, start|end)
    /// ordered sequence. "Level" is nesting among folds, not indentation.
    pub fn get_foldable_ranges_at_indent_level(&self, level: usize) -> Vec<Range> {
        let folds = self.get_foldable_ranges();
        // (point, 0=end/1=start, index): ends sort before starts at equal
        // points, so a fold ending where another starts closes first.
        let mut events: Vec<(Point, u8, usize)> = Vec::with_capacity(folds.len() * 2);
        for (index, fold) in folds.iter().enumerate() {
            events.push((fold.start, 1, index));
            events.push((fold.end, 0, index));
        }
        events.sort();

        let mut current_level = 0usize;
        let mut result = Vec::new();
        for (_, side, index) in events {
            if side == 1 {
                if current_level == level {
                    result.push(folds[index]);
                }
                current_level += 1;
            } else {
                current_level = current_level.saturating_sub(1);
            }
        }
        result
    }

    /// Cached per row; the cache is spliced on every transaction.
    pub fn is_foldable_at_row(&self, row: usize) -> bool {
        if self.destroyed.get() {
            return false;
        }
        {
            let cache = self.foldable_cache.borrow();
            if let Some(Some(value)) = cache.get(row) {
                return *value;
            }
        }
        let value = self.get_fold_range_for_row(row).is_some();
        let line_count = self.buffer.borrow().line_count();
        let mut cache = self.foldable_cache.borrow_mut();
        if cache.len() < line_count {
            cache.resize(line_count, None);
        }
        if row < cache.len() {
            cache[row] = Some(value);
        }
        value
    }

    // ==================== comments ====================

    /// Comment delimiters for the innermost layer covering the row's first
    /// non-whitespace character, falling back to scoped config entries.
    pub fn comment_strings_for_position(&self, position: Point) -> CommentStrings {
        if self.destroyed.get() {
            return CommentStrings::default();
        }
        let anchor = {
            let buffer = self.buffer.borrow();
            let row = buffer.clip_position(position).row;
            buffer
                .first_non_whitespace_position(row)
                .unwrap_or(Point::new(row, 0))
        };
        let ctx = self.ctx();
        let mut best: Option<(usize, CommentStrings)> = None;
        {
            let root = self.root.borrow();
            root.for_each_layer(&mut |layer| {
                let Some(extent) = layer.extent(&ctx) else {
                    return;
                };
                if !extent.contains_point_inclusive(anchor) {
                    return;
                }
                let comment_strings = layer.grammar().comment_strings();
                if comment_strings.is_empty() {
                    return;
                }
                let replace = match &best {
                    Some((depth, _)) => layer.depth() >= *depth,
                    None => true,
                };
                if replace {
                    best = Some((layer.depth(), comment_strings.clone()));
                }
            });
        }
        if let Some((_, comment_strings)) = best {
            return comment_strings;
        }

        let scopes = self.scope_descriptor_for_position(position);
        CommentStrings {
            start: self
                .config
                .get("editor.commentStart", &scopes)
                .map(String::from),
            end: self
                .config
                .get("editor.commentEnd", &scopes)
                .map(String::from),
        }
    }

    // ==================== indentation ====================

    /// The suggested indent level for `row`, derived from the previous
    /// non-blank row's indentation plus captured indent/dedent hints.
    pub fn suggested_indent_for_buffer_row(
        &self,
        row: usize,
        tab_length: usize,
        options: IndentOptions,
    ) -> usize {
        if row == 0 || self.destroyed.get() {
            return 0;
        }
        let (comparison_row, last_line_indent, anchor) = {
            let buffer = self.buffer.borrow();
            let mut comparison_row = row - 1;
            if options.skip_blank_lines {
                while comparison_row > 0 && buffer.is_row_blank(comparison_row) {
                    comparison_row -= 1;
                }
            }
            let indent = indent_level_for_line(buffer.line(comparison_row), tab_length);
            (
                comparison_row,
                indent,
                Point::new(comparison_row, buffer.line_len(comparison_row)),
            )
        };

        let ctx = self.ctx();
        let mut root = self.root.borrow_mut();
        let Some(path) = root.path_to_deepest_layer(&ctx, anchor, &|layer| {
            layer.query(QueryKind::Indents).is_some()
        }) else {
            return last_line_indent;
        };
        let layer = root.layer_at_path_mut(&path);
        let Some(query) = layer.query(QueryKind::Indents) else {
            return last_line_indent;
        };
        let Some(tree) = layer.force_anonymous_parse(&ctx) else {
            return last_line_indent;
        };

        let buffer = self.buffer.borrow();
        let text = buffer.text();

        let mut indent_delta: i64 = 0;
        let mut seen_indent = false;
        for item in captures_in_range(
            &query,
            tree.root_node(),
            text,
            Point::new(comparison_row, 0),
            Point::new(row, 0),
        ) {
            if item.node.end_position().row < comparison_row {
                continue;
            }
            if item.node.start_byte() == item.node.end_byte() {
                continue;
            }
            match item.name.as_str() {
                "indent" => {
                    indent_delta += 1;
                    seen_indent = true;
                }
                "indent_end" if seen_indent => indent_delta -= 1,
                _ => {}
            }
        }
        indent_delta = indent_delta.clamp(0, 1);

        let mut dedent_delta: i64 = 0;
        if !options.skip_dedent_check {
            let trimmed = buffer.line(row).trim().to_string();
            let mut seen_positions = HashSet::new();
            for item in captures_in_range(
                &query,
                tree.root_node(),
                text,
                Point::new(row, 0),
                Point::new(row + 1, 0),
            ) {
                if !matches!(item.name.as_str(), "indent_end" | "branch") {
                    continue;
                }
                let Ok(node_text) = item.node.utf8_text(text.as_bytes()) else {
                    continue;
                };
                if node_text.is_empty() || !trimmed.starts_with(node_text) {
                    continue;
                }
                if !seen_positions.insert((item.node.start_byte(), item.node.end_byte())) {
                    continue;
                }
                dedent_delta -= 1;
            }
            dedent_delta = dedent_delta.clamp(-1, 0);
        }

        (last_line_indent as i64 + indent_delta + dedent_delta).max(0) as usize
    }

    /// Indent suggestion for a row the user just edited: only `@branch`
    /// captures matching the whole trimmed line pull it back one level;
    /// anything else keeps the current indent.
    pub fn suggested_indent_for_edited_buffer_row(&self, row: usize, tab_length: usize) -> usize {
        if row == 0 || self.destroyed.get() {
            return 0;
        }
        let baseline = self.suggested_indent_for_buffer_row(
            row,
            tab_length,
            IndentOptions {
                skip_blank_lines: true,
                skip_dedent_check: true,
            },
        );
        let current_indent = {
            let buffer = self.buffer.borrow();
            indent_level_for_line(buffer.line(row), tab_length)
        };
        let anchor = {
            let buffer = self.buffer.borrow();
            Point::new(row, buffer.line_len(row))
        };

        let ctx = self.ctx();
        let mut root = self.root.borrow_mut();
        let Some(path) = root.path_to_deepest_layer(&ctx, anchor, &|layer| {
            layer.query(QueryKind::Indents).is_some()
        }) else {
            return current_indent;
        };
        let layer = root.layer_at_path_mut(&path);
        let Some(query) = layer.query(QueryKind::Indents) else {
            return current_indent;
        };
        let Some(tree) = layer.force_anonymous_parse(&ctx) else {
            return current_indent;
        };

        let buffer = self.buffer.borrow();
        let trimmed = buffer.line(row).trim().to_string();
        for item in captures_in_range(
            &query,
            tree.root_node(),
            buffer.text(),
            Point::new(row, 0),
            Point::new(row + 1, 0),
        ) {
            if item.name != "branch" || item.node.start_position().row != row {
                continue;
            }
            if let Ok(node_text) = item.node.utf8_text(buffer.text().as_bytes()) {
                if node_text == trimmed {
                    return baseline.saturating_sub(1);
                }
            }
        }
        current_indent
    }
}

fn consider_candidate(
    best: &mut Option<(usize, usize, SyntaxNodeInfo)>,
    byte_len: usize,
    depth: usize,
    info: SyntaxNodeInfo,
) {
    let replace = match best {
        None => true,
        Some((current_len, current_depth, _)) => {
            byte_len < *current_len || (byte_len == *current_len && depth > *current_depth)
        }
    };
    if replace {
        *best = Some((byte_len, depth, info));
    }
}

/// Deepest-first fold lookup: injections are more specific than their host.
fn fold_range_for_row_deepest(
    layer: &mut LanguageLayer,
    ctx: &LayerContext,
    row: usize,
) -> Option<Range> {
    for child in layer.children_mut() {
        if let Some(range) = fold_range_for_row_deepest(&mut child.layer, ctx, row) {
            return Some(range);
        }
    }
    layer.fold_range_for_row(ctx, row)
}
