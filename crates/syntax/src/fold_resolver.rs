// Chunk: docs/chunks/fold_resolution - Simple and divided fold discovery per layer

//! Fold discovery for one language layer.
//!
//! The resolver caches an ordered tree of fold boundary captures over the
//! layer's extent and resolves two fold shapes from it:
//!
//! - *simple* folds (`@fold`): one capture whose end is derived from the
//!   node via the `fold.endAt` descriptor (default
//!   `lastChild.startPosition`) plus optional end adjustments;
//! - *divided* folds (`@fold.start` / `@fold.end`): two complementary
//!   captures paired by walking the boundary tree forward at balanced
//!   nesting depth. A start with no matching end within the layer simply
//!   produces no fold.
//!
//! At equal positions end boundaries sort before start boundaries, which is
//! what makes `#else`-style nodes (both an end and a start) pair up.
//!
//! The cache is invalidated on any edit inside the layer and rebuilt on
//! first use after a parse.

use std::collections::BTreeMap;
use std::ops::Bound;

use canopy_buffer::{Point, Range, TextBuffer};
use tree_sitter::{Node, Query};

use crate::captures::{captures_in_range, CaptureItem};
use crate::edit::point;
use crate::scope_resolver::{
    property_int, property_value, resolve_node_position, CaptureProperties,
};

/// Tie-break at equal positions: a fold end sorts before a fold start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum FoldSide {
    End,
    Start,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FoldKind {
    Simple,
    Start,
    End,
}

#[derive(Debug, Clone)]
struct FoldEntry {
    kind: FoldKind,
    node_id: usize,
    position: Point,
    /// Pre-resolved range for simple folds; `None` for rejected ones.
    simple_range: Option<Range>,
}

type FoldKey = (Point, FoldSide, usize);

/// Per-layer fold boundary cache and resolution.
#[derive(Debug, Default)]
pub struct FoldResolver {
    boundaries: BTreeMap<FoldKey, FoldEntry>,
    cached_extent: Option<Range>,
}

impl FoldResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the cache. Called on every edit inside the layer and after
    /// each reparse.
    pub fn invalidate(&mut self) {
        self.boundaries.clear();
        self.cached_extent = None;
    }

    /// Rebuilds the boundary tree if the cache is stale.
    pub(crate) fn ensure_cached(
        &mut self,
        query: &Query,
        root: Node,
        buffer: &TextBuffer,
        extent: Range,
    ) {
        if self.cached_extent == Some(extent) {
            return;
        }
        self.boundaries.clear();

        let items = captures_in_range(query, root, buffer.text(), extent.start, extent.end);
        for (seq, item) in items.iter().enumerate() {
            let kind = match item.name.as_str() {
                "fold" => FoldKind::Simple,
                "fold.start" => FoldKind::Start,
                "fold.end" => FoldKind::End,
                _ => continue,
            };
            let position = point(item.node.start_position());
            let side = match kind {
                FoldKind::End => FoldSide::End,
                _ => FoldSide::Start,
            };
            let simple_range = match kind {
                FoldKind::Simple => resolve_simple_fold(item, buffer),
                _ => None,
            };
            self.boundaries.insert(
                (position, side, seq),
                FoldEntry {
                    kind,
                    node_id: item.node.id(),
                    position,
                    simple_range,
                },
            );
        }
        self.cached_extent = Some(extent);
    }

    /// The first fold starting on `row` that spans more than one row.
    pub fn fold_range_for_row(&self, buffer: &TextBuffer, row: usize) -> Option<Range> {
        let from: FoldKey = (Point::new(row, 0), FoldSide::End, 0);
        for (key, entry) in self.boundaries.range(from..) {
            if key.0.row > row {
                break;
            }
            if let Some(range) = self.resolve(key, entry, buffer) {
                return Some(range);
            }
        }
        None
    }

    /// Every resolvable fold in the cached extent, in boundary order.
    pub fn all_fold_ranges(&self, buffer: &TextBuffer) -> Vec<Range> {
        self.boundaries
            .iter()
            .filter_map(|(key, entry)| self.resolve(key, entry, buffer))
            .collect()
    }

    fn resolve(&self, key: &FoldKey, entry: &FoldEntry, buffer: &TextBuffer) -> Option<Range> {
        match entry.kind {
            FoldKind::Simple => entry.simple_range,
            FoldKind::Start => self.resolve_divided(key, entry, buffer),
            FoldKind::End => None,
        }
    }

    /// Pairs a `@fold.start` with the nearest later `@fold.end` at the same
    /// nesting depth.
    fn resolve_divided(
        &self,
        key: &FoldKey,
        entry: &FoldEntry,
        buffer: &TextBuffer,
    ) -> Option<Range> {
        let start_row = entry.position.row;
        let start = Point::new(start_row, buffer.line_len(start_row));

        let mut depth = 0usize;
        for (_, candidate) in self
            .boundaries
            .range((Bound::Excluded(*key), Bound::Unbounded))
        {
            if candidate.node_id == entry.node_id {
                continue;
            }
            match candidate.kind {
                FoldKind::Start => depth += 1,
                FoldKind::End => {
                    if depth > 0 {
                        depth -= 1;
                    } else {
                        let p = candidate.position;
                        let end = if p.column == 0 && p.row > 0 {
                            Point::new(p.row - 1, buffer.line_len(p.row - 1))
                        } else {
                            p
                        };
                        if end.row <= start_row {
                            return None;
                        }
                        return Some(Range::new(start, end));
                    }
                }
                FoldKind::Simple => {}
            }
        }
        None
    }
}

/// Resolves a `@fold` capture to its range, or `None` if the fold is
/// rejected (ends on or before its own start row).
fn resolve_simple_fold(item: &CaptureItem, buffer: &TextBuffer) -> Option<Range> {
    let node = &item.node;
    let start_row = node.start_position().row;
    let start = Point::new(start_row, buffer.line_len(start_row));

    let mut end = match property_value(&item.properties, "fold.endAt") {
        Some(spec) => resolve_node_position(node, spec)?,
        None => resolve_node_position(node, "lastChild.startPosition")?,
    };

    if let Some(delta) = property_int(&item.properties, "fold.offsetEnd") {
        let offset = buffer.offset_for_position(end) as i64 + delta;
        end = buffer.position_for_offset(offset.max(0) as usize);
    }
    if let Some(column) = property_int(&item.properties, "fold.adjustEndColumn") {
        end = buffer.clip_position(Point::new(end.row, column.max(0) as usize));
    }
    if has_property(&item.properties, "fold.adjustToEndOfPreviousRow") {
        if end.row == 0 {
            return None;
        }
        end = Point::new(end.row - 1, buffer.line_len(end.row - 1));
    }

    let end = buffer.clip_position(end);
    if end.row <= start_row {
        return None;
    }
    Some(Range::new(start, end))
}

fn has_property(properties: &CaptureProperties, key: &str) -> bool {
    property_value(properties, key).is_some() || properties.contains_key(key) || {
        let bare = key.rsplit('.').next().unwrap_or(key);
        properties.contains_key(bare)
    }
}
