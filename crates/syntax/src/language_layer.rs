// Chunk: docs/chunks/language_layers - Layer lifecycle, incremental reparse, injections

//! One grammar, one tree, one buffer region.
//!
//! A `LanguageLayer` owns a tree-sitter parser and parse tree for one
//! grammar over one extent: the whole buffer for the root layer, an
//! injection marker's range otherwise. Layers form an ownership tree — the
//! root layer owns its injection children, which own theirs — so destroying
//! a layer destroys every descendant, and there are no parent back-pointers.
//!
//! Edits are recorded on the tree immediately (`handle_text_change`) but no
//! parse runs until `update`, which reparses incrementally, reports
//! changed-range invalidations, and re-discovers injections over the
//! affected range. Between those two calls the tree is marked-edited but
//! stale, and queries against it produce approximate results by design.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use canopy_buffer::{MarkerId, MarkerLayerId, Point, Range, TextBuffer};
use tracing::warn;
use tree_sitter::{InputEdit, Node, Parser, Query, Range as TsRange, Tree};

use crate::captures::captures_in_range;
use crate::edit::{point, point_range, ts_point};
use crate::fold_resolver::FoldResolver;
use crate::node_range_set::NodeRangeSet;
use crate::registry::{Grammar, LanguageRegistry, QueryKind};
use crate::scope_resolver::{
    adjusted_capture_range, BoundarySide, ScopeBoundary, ScopeId, ScopeIdMap, ScopeResolver,
};

/// Shared collaborators threaded through every layer operation.
pub(crate) struct LayerContext<'a> {
    pub buffer: &'a RefCell<TextBuffer>,
    pub registry: &'a RefCell<LanguageRegistry>,
    pub interner: &'a RefCell<ScopeIdMap>,
    pub marker_layer: MarkerLayerId,
    pub invalidations: &'a RefCell<Vec<Range>>,
}

/// An owned snapshot of a syntax node.
///
/// Tree-sitter nodes borrow their tree, so anything that crosses the
/// facade boundary is snapshotted into this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNodeInfo {
    pub kind: String,
    pub range: Range,
    pub start_byte: usize,
    pub end_byte: usize,
    pub is_named: bool,
    pub text: String,
}

impl SyntaxNodeInfo {
    pub(crate) fn from_node(node: &Node, text: &str) -> Self {
        Self {
            kind: node.kind().to_string(),
            range: point_range(node.range()),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            is_named: node.is_named(),
            text: node.utf8_text(text.as_bytes()).unwrap_or_default().to_string(),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.end_byte - self.start_byte
    }
}

/// One capture covering a position, used for scope descriptors.
#[derive(Debug, Clone)]
pub(crate) struct ScopeMapEntry {
    pub range: Range,
    pub scope_id: ScopeId,
    pub byte_len: usize,
}

enum QuerySlot {
    Unloaded,
    Loaded(Option<Rc<Query>>),
}

/// Lazily-compiled queries, one-shot per layer per kind.
struct LayerQueries {
    syntax: RefCell<QuerySlot>,
    folds: RefCell<QuerySlot>,
    indents: RefCell<QuerySlot>,
    locals: RefCell<QuerySlot>,
}

impl LayerQueries {
    fn new() -> Self {
        Self {
            syntax: RefCell::new(QuerySlot::Unloaded),
            folds: RefCell::new(QuerySlot::Unloaded),
            indents: RefCell::new(QuerySlot::Unloaded),
            locals: RefCell::new(QuerySlot::Unloaded),
        }
    }

    fn slot(&self, kind: QueryKind) -> &RefCell<QuerySlot> {
        match kind {
            QueryKind::Syntax => &self.syntax,
            QueryKind::Folds => &self.folds,
            QueryKind::Indents => &self.indents,
            QueryKind::Locals => &self.locals,
        }
    }

    fn get(&self, grammar: &Grammar, kind: QueryKind) -> Option<Rc<Query>> {
        let slot = self.slot(kind);
        if let QuerySlot::Loaded(query) = &*slot.borrow() {
            return query.clone();
        }
        let compiled = grammar.compile_query(kind).map(Rc::new);
        *slot.borrow_mut() = QuerySlot::Loaded(compiled.clone());
        compiled
    }

    fn clear(&self) {
        for kind in [
            QueryKind::Syntax,
            QueryKind::Folds,
            QueryKind::Indents,
            QueryKind::Locals,
        ] {
            *self.slot(kind).borrow_mut() = QuerySlot::Unloaded;
        }
    }
}

pub(crate) struct ChildLayer {
    pub marker_id: MarkerId,
    pub layer: LanguageLayer,
}

/// A parse layer: one grammar and tree over one extent.
pub struct LanguageLayer {
    grammar: Rc<Grammar>,
    depth: usize,
    marker_id: Option<MarkerId>,
    parser: Parser,
    tree: Option<Tree>,
    edited_range: Option<Range>,
    current_included_ranges: Option<Vec<TsRange>>,
    current_node_range_set: Option<NodeRangeSet>,
    children: Vec<ChildLayer>,
    language_scope_id: ScopeId,
    parent_language_scope_id: Option<ScopeId>,
    cover_shallower_scopes: bool,
    queries: LayerQueries,
    fold_resolver: FoldResolver,
    destroyed: bool,
}

impl LanguageLayer {
    pub(crate) fn new(
        grammar: Rc<Grammar>,
        depth: usize,
        marker_id: Option<MarkerId>,
        parent_language_scope_id: Option<ScopeId>,
        cover_shallower_scopes: bool,
        interner: &RefCell<ScopeIdMap>,
    ) -> Self {
        let language_scope_id = interner.borrow_mut().get_or_create(grammar.scope_name());
        Self {
            grammar,
            depth,
            marker_id,
            parser: Parser::new(),
            tree: None,
            edited_range: None,
            current_included_ranges: None,
            current_node_range_set: None,
            children: Vec::new(),
            language_scope_id,
            parent_language_scope_id,
            cover_shallower_scopes,
            queries: LayerQueries::new(),
            fold_resolver: FoldResolver::new(),
            destroyed: false,
        }
    }

    pub fn grammar(&self) -> &Rc<Grammar> {
        &self.grammar
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn language_scope_id(&self) -> ScopeId {
        self.language_scope_id
    }

    pub(crate) fn covers_shallower_scopes(&self) -> bool {
        self.cover_shallower_scopes
    }

    /// False when the parent layer already carries this layer's language
    /// scope (a language injected into itself).
    pub(crate) fn adds_language_scope(&self) -> bool {
        self.parent_language_scope_id != Some(self.language_scope_id)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// The buffer range this layer is responsible for: the whole buffer for
    /// the root, the marker's range otherwise.
    pub(crate) fn extent(&self, ctx: &LayerContext) -> Option<Range> {
        if self.destroyed {
            return None;
        }
        match self.marker_id {
            None => Some(ctx.buffer.borrow().range()),
            Some(id) => ctx
                .buffer
                .borrow()
                .marker_layer(ctx.marker_layer)?
                .range_for(id),
        }
    }

    pub(crate) fn query(&self, kind: QueryKind) -> Option<Rc<Query>> {
        if self.destroyed {
            return None;
        }
        self.queries.get(&self.grammar, kind)
    }

    /// Drops compiled-query caches for this layer and all descendants.
    pub(crate) fn clear_query_caches(&mut self) {
        self.queries.clear();
        for child in &mut self.children {
            child.layer.clear_query_caches();
        }
    }

    /// Visits this layer and every descendant, root-to-leaf.
    pub(crate) fn for_each_layer<'a>(&'a self, f: &mut dyn FnMut(&'a LanguageLayer)) {
        f(self);
        for child in &self.children {
            child.layer.for_each_layer(f);
        }
    }

    /// Child-index path to the deepest layer covering `position` that
    /// satisfies `predicate`.
    pub(crate) fn path_to_deepest_layer(
        &self,
        ctx: &LayerContext,
        position: Point,
        predicate: &dyn Fn(&LanguageLayer) -> bool,
    ) -> Option<Vec<usize>> {
        if self.destroyed {
            return None;
        }
        let covers = match self.marker_id {
            None => true,
            Some(_) => self
                .extent(ctx)
                .is_some_and(|extent| !extent.is_empty() && extent.contains_point_inclusive(position)),
        };
        if !covers {
            return None;
        }
        for (index, child) in self.children.iter().enumerate() {
            if let Some(mut path) = child.layer.path_to_deepest_layer(ctx, position, predicate) {
                path.insert(0, index);
                return Some(path);
            }
        }
        if predicate(self) {
            Some(Vec::new())
        } else {
            None
        }
    }

    pub(crate) fn layer_at_path_mut(&mut self, path: &[usize]) -> &mut LanguageLayer {
        let mut current = self;
        for &index in path {
            current = &mut current.children[index].layer;
        }
        current
    }

    /// Records an edit on this layer's tree and every descendant's, without
    /// reparsing.
    pub(crate) fn handle_text_change(&mut self, edit: &InputEdit) {
        if self.destroyed {
            return;
        }
        if let Some(tree) = &mut self.tree {
            tree.edit(edit);
        }
        let new_span = Range::new(point(edit.start_position), point(edit.new_end_position));
        self.edited_range = Some(match self.edited_range {
            Some(range) => range.union(&new_span),
            None => new_span,
        });
        self.fold_resolver.invalidate();
        for child in &mut self.children {
            child.layer.handle_text_change(edit);
        }
    }

    /// Reparses this layer and re-discovers injections over the affected
    /// range. Returns false if the layer destroyed itself (its content
    /// range resolved to nothing).
    pub(crate) fn update(
        &mut self,
        ctx: &LayerContext,
        node_range_set: Option<NodeRangeSet>,
    ) -> bool {
        if self.destroyed {
            return false;
        }

        let included = {
            let buffer = ctx.buffer.borrow();
            node_range_set.as_ref().map(|set| set.get_ranges(&buffer))
        };
        if let Some(ranges) = &included {
            if ranges.is_empty() {
                let extent = self.extent(ctx);
                self.destroy(ctx);
                if let Some(extent) = extent {
                    ctx.invalidations.borrow_mut().push(extent);
                }
                return false;
            }
        }

        if self.parser.set_language(self.grammar.language()).is_err() {
            warn!(
                grammar = %self.grammar.scope_name(),
                "language failed to load; layer stays inert"
            );
            return true;
        }
        let ranges_ok = match &included {
            Some(ranges) => self.parser.set_included_ranges(ranges),
            None => self.parser.set_included_ranges(&[]),
        };
        if ranges_ok.is_err() {
            warn!(
                grammar = %self.grammar.scope_name(),
                "included ranges were rejected; layer stays inert"
            );
            return true;
        }

        let new_tree = {
            let buffer = ctx.buffer.borrow();
            self.parser.parse(buffer.text(), self.tree.as_ref())
        };
        let Some(new_tree) = new_tree else {
            warn!(grammar = %self.grammar.scope_name(), "parse produced no tree");
            return true;
        };

        let mut affected: Option<Range> = None;
        if let Some(old_tree) = &self.tree {
            for changed in old_tree.changed_ranges(&new_tree) {
                let range = point_range(changed);
                ctx.invalidations.borrow_mut().push(range);
                affected = Some(affected.map_or(range, |a| a.union(&range)));
            }
            if let Some(edited) = self.edited_range {
                affected = Some(affected.map_or(edited, |a| a.union(&edited)));
            }
        } else {
            let range = match &included {
                Some(ranges) => ranges
                    .iter()
                    .map(|r| point_range(*r))
                    .reduce(|a, b| a.union(&b))
                    .unwrap_or_default(),
                None => ctx.buffer.borrow().range(),
            };
            ctx.invalidations.borrow_mut().push(range);
            affected = Some(range);
        }

        self.tree = Some(new_tree);
        self.edited_range = None;
        self.fold_resolver.invalidate();
        self.current_included_ranges = included;
        self.current_node_range_set = node_range_set;

        // Children that saw edits must be revisited even when this layer's
        // own tree didn't change around them.
        {
            let buffer = ctx.buffer.borrow();
            if let Some(markers) = buffer.marker_layer(ctx.marker_layer) {
                for child in &self.children {
                    if child.layer.edited_range.is_none() {
                        continue;
                    }
                    if let Some(marker_range) = markers.range_for(child.marker_id) {
                        affected =
                            Some(affected.map_or(marker_range, |a| a.union(&marker_range)));
                    }
                }
            }
        }

        if let Some(affected) = affected {
            self.populate_injections(ctx, affected);
        }
        true
    }

    /// Marks the layer destroyed and tears down all descendant layers and
    /// their markers. The layer's own marker belongs to its parent.
    pub(crate) fn destroy(&mut self, ctx: &LayerContext) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.tree = None;
        self.fold_resolver.invalidate();
        let children = std::mem::take(&mut self.children);
        for mut child in children {
            if let Some(markers) = ctx
                .buffer
                .borrow_mut()
                .marker_layer_mut(ctx.marker_layer)
            {
                markers.destroy(child.marker_id);
            }
            child.layer.destroy(ctx);
        }
    }

    /// Discovers injections over `range`, reusing markers that still match,
    /// creating layers for new injection sites, and destroying layers whose
    /// sites no longer inject.
    pub(crate) fn populate_injections(&mut self, ctx: &LayerContext, range: Range) {
        if self.destroyed || self.tree.is_none() {
            return;
        }
        if self.grammar.injection_rules().is_empty() && self.children.is_empty() {
            return;
        }

        let mut range = range;
        {
            let buffer = ctx.buffer.borrow();
            if let Some(markers) = buffer.marker_layer(ctx.marker_layer) {
                for child in &self.children {
                    if let Some(marker_range) = markers.range_for(child.marker_id) {
                        if marker_range.intersects(&range) {
                            range = range.union(&marker_range);
                        }
                    }
                }
            }
        }

        struct PlannedInjection {
            marker_range: Range,
            grammar: Rc<Grammar>,
            node_range_set: NodeRangeSet,
            cover_shallower_scopes: bool,
        }

        let mut planned: Vec<PlannedInjection> = Vec::new();
        {
            let buffer = ctx.buffer.borrow();
            let text = buffer.text();
            let tree = self.tree.as_ref().expect("tree checked above");
            let types = self.grammar.injection_node_types();
            for node in descendants_of_type(tree.root_node(), &types, range) {
                for rule in self.grammar.injection_rules() {
                    if rule.node_type() != node.kind() {
                        continue;
                    }
                    let Some(language) = rule.language(&node, text) else {
                        continue;
                    };
                    let Some(grammar) = ctx.registry.borrow().grammar_for_language(&language)
                    else {
                        continue;
                    };
                    let content = rule.content(node);
                    if content.is_empty() {
                        continue;
                    }
                    let node_range_set = NodeRangeSet::new(
                        self.current_included_ranges.as_deref(),
                        &content,
                        rule.newlines_between(),
                        rule.include_children(),
                    );
                    planned.push(PlannedInjection {
                        marker_range: point_range(node.range()),
                        grammar,
                        node_range_set,
                        cover_shallower_scopes: rule.cover_shallower_scopes(),
                    });
                }
            }
        }

        let mut leftovers = std::mem::take(&mut self.children);
        let mut scheduled: Vec<(ChildLayer, NodeRangeSet)> = Vec::new();
        for plan in planned {
            let reusable = leftovers.iter().position(|child| {
                let marker_range = ctx
                    .buffer
                    .borrow()
                    .marker_layer(ctx.marker_layer)
                    .and_then(|markers| markers.range_for(child.marker_id));
                marker_range == Some(plan.marker_range)
                    && Rc::ptr_eq(child.layer.grammar(), &plan.grammar)
            });
            let child = match reusable {
                Some(index) => leftovers.remove(index),
                None => {
                    let marker_id = ctx
                        .buffer
                        .borrow_mut()
                        .marker_layer_mut(ctx.marker_layer)
                        .map(|markers| markers.mark_range(plan.marker_range));
                    let Some(marker_id) = marker_id else { continue };
                    let layer = LanguageLayer::new(
                        plan.grammar.clone(),
                        self.depth + 1,
                        Some(marker_id),
                        Some(self.language_scope_id),
                        plan.cover_shallower_scopes,
                        ctx.interner,
                    );
                    ChildLayer { marker_id, layer }
                }
            };
            scheduled.push((child, plan.node_range_set));
        }

        // Children inside the populated range that were not re-visited no
        // longer correspond to an injection.
        for mut child in leftovers {
            let marker_range = ctx
                .buffer
                .borrow()
                .marker_layer(ctx.marker_layer)
                .and_then(|markers| markers.range_for(child.marker_id));
            match marker_range {
                Some(marker_range) if !marker_range.intersects(&range) => {
                    self.children.push(child);
                }
                other => {
                    if let Some(marker_range) = other {
                        ctx.invalidations.borrow_mut().push(marker_range);
                    }
                    if let Some(markers) = ctx
                        .buffer
                        .borrow_mut()
                        .marker_layer_mut(ctx.marker_layer)
                    {
                        markers.destroy(child.marker_id);
                    }
                    child.layer.destroy(ctx);
                }
            }
        }

        for (mut child, node_range_set) in scheduled {
            if child.layer.update(ctx, Some(node_range_set)) {
                self.children.push(child);
            } else {
                if let Some(markers) = ctx
                    .buffer
                    .borrow_mut()
                    .marker_layer_mut(ctx.marker_layer)
                {
                    markers.destroy(child.marker_id);
                }
            }
        }
    }

    /// Materializes this layer's scope boundaries over `[from, to]` plus the
    /// scopes already open strictly before `from`.
    ///
    /// The layer's own language scope opens at its extent start and closes
    /// at its extent end, unless the parent layer already carries the same
    /// scope (a language injected into itself is not double-scoped).
    pub(crate) fn get_syntax_boundaries(
        &self,
        ctx: &LayerContext,
        from: Point,
        to: Point,
    ) -> (BTreeMap<Point, ScopeBoundary>, Vec<ScopeId>) {
        let mut boundaries = BTreeMap::new();
        let mut already_open = Vec::new();
        let Some(extent) = self.extent(ctx) else {
            return (boundaries, already_open);
        };
        let Some(tree) = &self.tree else {
            return (boundaries, already_open);
        };

        let buffer = ctx.buffer.borrow();
        let mut resolver = ScopeResolver::new(ctx.interner);

        if self.parent_language_scope_id != Some(self.language_scope_id) {
            resolver.set_boundary(extent.start, self.language_scope_id, BoundarySide::Open);
            resolver.set_boundary(extent.end, self.language_scope_id, BoundarySide::Close);
        }

        if let Some(query) = self.query(QueryKind::Syntax) {
            let items =
                captures_in_range(&query, tree.root_node(), buffer.text(), extent.start, to);
            for item in items {
                resolver.store(&item.name, &item.node, &item.properties, None, &buffer);
            }
        }

        for (position, boundary) in resolver.into_boundaries() {
            if position < from {
                for id in &boundary.close {
                    if let Some(found) = already_open.iter().rposition(|open| open == id) {
                        already_open.remove(found);
                    }
                }
                already_open.extend(boundary.open.iter().copied());
            } else if position <= to {
                boundaries.insert(position, boundary);
            }
        }
        (boundaries, already_open)
    }

    /// Resolved included ranges as point ranges; the extent when the layer
    /// parses the whole buffer.
    pub(crate) fn content_point_ranges(&self, ctx: &LayerContext) -> Vec<Range> {
        match &self.current_included_ranges {
            Some(ranges) => ranges.iter().map(|r| point_range(*r)).collect(),
            None => self.extent(ctx).into_iter().collect(),
        }
    }

    /// Captures covering `position`, biggest range first.
    pub(crate) fn scope_map_at_position(
        &self,
        ctx: &LayerContext,
        position: Point,
    ) -> Vec<ScopeMapEntry> {
        let mut entries = Vec::new();
        let Some(tree) = &self.tree else {
            return entries;
        };
        let Some(query) = self.query(QueryKind::Syntax) else {
            return entries;
        };
        let buffer = ctx.buffer.borrow();
        let next = Point::new(position.row, position.column + 1);
        for item in captures_in_range(&query, tree.root_node(), buffer.text(), position, next) {
            let Some(range) = adjusted_capture_range(&item.node, &item.properties, &buffer) else {
                continue;
            };
            if !(range.start <= position && range.end > position) {
                continue;
            }
            let byte_len =
                buffer.offset_for_position(range.end) - buffer.offset_for_position(range.start);
            let scope_id = ctx.interner.borrow_mut().get_or_create(&item.name);
            entries.push(ScopeMapEntry {
                range,
                scope_id,
                byte_len,
            });
        }
        entries.sort_by(|a, b| b.byte_len.cmp(&a.byte_len));
        entries
    }

    /// `local.reference` captures containing `position`, deepest first.
    pub(crate) fn local_references_at_point(
        &self,
        ctx: &LayerContext,
        position: Point,
    ) -> Vec<SyntaxNodeInfo> {
        let mut references = Vec::new();
        let Some(tree) = &self.tree else {
            return references;
        };
        let Some(query) = self.query(QueryKind::Locals) else {
            return references;
        };
        let buffer = ctx.buffer.borrow();
        let next = Point::new(position.row, position.column + 1);
        for item in captures_in_range(&query, tree.root_node(), buffer.text(), position, next) {
            if item.name != "local.reference" {
                continue;
            }
            let range = point_range(item.node.range());
            if range.start <= position && range.end > position {
                references.push(SyntaxNodeInfo::from_node(&item.node, buffer.text()));
            }
        }
        references.sort_by_key(SyntaxNodeInfo::byte_len);
        references
    }

    /// Scope-resolved definition lookup: buckets candidate definitions by
    /// their smallest containing `local.scope` and walks outward from the
    /// reference's innermost scope.
    pub(crate) fn find_definition_for_local_reference(
        &self,
        ctx: &LayerContext,
        reference: &SyntaxNodeInfo,
    ) -> Option<SyntaxNodeInfo> {
        let extent = self.extent(ctx)?;
        let tree = self.tree.as_ref()?;
        let query = self.query(QueryKind::Locals)?;
        let buffer = ctx.buffer.borrow();
        let text = buffer.text();

        let mut scopes: Vec<(usize, usize)> = Vec::new();
        let mut definitions: Vec<SyntaxNodeInfo> = Vec::new();
        for item in captures_in_range(&query, tree.root_node(), text, extent.start, extent.end) {
            match item.name.as_str() {
                "local.scope" => scopes.push((item.node.start_byte(), item.node.end_byte())),
                "local.definition" => definitions.push(SyntaxNodeInfo::from_node(&item.node, text)),
                _ => {}
            }
        }

        // Scopes containing the reference, smallest first, plus the
        // synthetic global scope.
        let mut relevant: Vec<(usize, usize)> = scopes
            .into_iter()
            .filter(|(start, end)| *start <= reference.start_byte && reference.end_byte <= *end)
            .collect();
        relevant.sort_by_key(|(start, end)| end - start);
        relevant.push((
            buffer.offset_for_position(extent.start),
            buffer.offset_for_position(extent.end),
        ));

        let candidates: Vec<SyntaxNodeInfo> = definitions
            .into_iter()
            .filter(|definition| definition.text == reference.text)
            .collect();

        let mut buckets: Vec<Vec<&SyntaxNodeInfo>> = vec![Vec::new(); relevant.len()];
        for definition in &candidates {
            if let Some(index) = relevant.iter().position(|(start, end)| {
                *start <= definition.start_byte && definition.end_byte <= *end
            }) {
                buckets[index].push(definition);
            }
        }

        let mut fallback: Option<&SyntaxNodeInfo> = None;
        for bucket in &buckets {
            let before = bucket
                .iter()
                .filter(|definition| definition.start_byte < reference.start_byte)
                .max_by_key(|definition| definition.start_byte);
            if let Some(found) = before {
                return Some((*found).clone());
            }
            if fallback.is_none() {
                fallback = bucket
                    .iter()
                    .filter(|definition| definition.start_byte > reference.start_byte)
                    .min_by_key(|definition| definition.start_byte)
                    .copied();
            }
        }
        fallback.cloned()
    }

    /// Ancestor chain at `position`, smallest node first.
    pub(crate) fn node_infos_at_position(
        &self,
        ctx: &LayerContext,
        position: Point,
    ) -> Vec<SyntaxNodeInfo> {
        let mut infos = Vec::new();
        let Some(tree) = &self.tree else {
            return infos;
        };
        let buffer = ctx.buffer.borrow();
        let p = ts_point(position);
        let mut node = match tree.root_node().descendant_for_point_range(p, p) {
            Some(node) => node,
            None => return infos,
        };
        loop {
            infos.push(SyntaxNodeInfo::from_node(&node, buffer.text()));
            match node.parent() {
                Some(parent) => node = parent,
                None => break,
            }
        }
        infos
    }

    /// Ancestor chain containing `range`, smallest node first.
    pub(crate) fn node_infos_containing_range(
        &self,
        ctx: &LayerContext,
        range: Range,
    ) -> Vec<SyntaxNodeInfo> {
        let mut infos = Vec::new();
        let Some(tree) = &self.tree else {
            return infos;
        };
        let buffer = ctx.buffer.borrow();
        let mut node = match tree
            .root_node()
            .descendant_for_point_range(ts_point(range.start), ts_point(range.end))
        {
            Some(node) => node,
            None => return infos,
        };
        loop {
            let node_range = point_range(node.range());
            if node_range.contains_range(&range) {
                infos.push(SyntaxNodeInfo::from_node(&node, buffer.text()));
            }
            match node.parent() {
                Some(parent) => node = parent,
                None => break,
            }
        }
        infos
    }

    /// Synchronously reparses with the cached included ranges, returning a
    /// fresh tree without replacing the cached one. Used by indentation,
    /// which needs an up-to-date tree mid-transaction.
    pub(crate) fn force_anonymous_parse(&mut self, ctx: &LayerContext) -> Option<Tree> {
        if self.destroyed {
            return None;
        }
        if self.parser.set_language(self.grammar.language()).is_err() {
            return None;
        }
        // Re-resolve the cached range set against the current buffer so a
        // mid-transaction parse sees shifted content where possible.
        let ranges = match (&self.current_node_range_set, &self.current_included_ranges) {
            (Some(set), _) => {
                let resolved = set.get_ranges(&ctx.buffer.borrow());
                if resolved.is_empty() {
                    return None;
                }
                Some(resolved)
            }
            (None, Some(ranges)) => Some(ranges.clone()),
            (None, None) => None,
        };
        let ranges_ok = match &ranges {
            Some(ranges) => self.parser.set_included_ranges(ranges),
            None => self.parser.set_included_ranges(&[]),
        };
        if ranges_ok.is_err() {
            return None;
        }
        let buffer = ctx.buffer.borrow();
        self.parser.parse(buffer.text(), self.tree.as_ref())
    }

    /// The first multi-row fold starting on `row`, if any.
    pub(crate) fn fold_range_for_row(&mut self, ctx: &LayerContext, row: usize) -> Option<Range> {
        let extent = self.extent(ctx)?;
        let query = self.query(QueryKind::Folds)?;
        let buffer = ctx.buffer.borrow();
        let root = self.tree.as_ref()?.root_node();
        self.fold_resolver.ensure_cached(&query, root, &buffer, extent);
        self.fold_resolver.fold_range_for_row(&buffer, row)
    }

    /// Every resolvable fold in this layer.
    pub(crate) fn all_fold_ranges(&mut self, ctx: &LayerContext) -> Vec<Range> {
        let Some(extent) = self.extent(ctx) else {
            return Vec::new();
        };
        let Some(query) = self.query(QueryKind::Folds) else {
            return Vec::new();
        };
        let buffer = ctx.buffer.borrow();
        let Some(tree) = self.tree.as_ref() else {
            return Vec::new();
        };
        self.fold_resolver
            .ensure_cached(&query, tree.root_node(), &buffer, extent);
        self.fold_resolver.all_fold_ranges(&buffer)
    }

    /// Collects fold ranges from this layer and all descendants into `out`.
    ///
    /// A single accumulator deliberately: per-layer lists that shadow an
    /// outer one drop every nested layer's folds.
    pub(crate) fn collect_fold_ranges(&mut self, ctx: &LayerContext, out: &mut Vec<Range>) {
        out.extend(self.all_fold_ranges(ctx));
        for child in &mut self.children {
            child.layer.collect_fold_ranges(ctx, out);
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<ChildLayer> {
        &mut self.children
    }

    pub(crate) fn children(&self) -> &[ChildLayer] {
        &self.children
    }
}

/// Collects nodes of the given kinds intersecting `range`, in tree order.
///
/// The engine's node API has no kind-filtered descendant query, so this is
/// a cursor walk that prunes subtrees outside the range.
pub(crate) fn descendants_of_type<'tree>(
    root: Node<'tree>,
    types: &[&str],
    range: Range,
) -> Vec<Node<'tree>> {
    let mut results = Vec::new();
    if types.is_empty() {
        return results;
    }
    let start = ts_point(range.start);
    let end = ts_point(range.end);
    let mut cursor = root.walk();
    'outer: loop {
        let node = cursor.node();
        let intersects = node.start_position() <= end && start <= node.end_position();
        if intersects {
            if types.contains(&node.kind()) {
                results.push(node);
            }
            if cursor.goto_first_child() {
                continue;
            }
        }
        loop {
            if cursor.goto_next_sibling() {
                continue 'outer;
            }
            if !cursor.goto_parent() {
                break 'outer;
            }
        }
    }
    results
}
