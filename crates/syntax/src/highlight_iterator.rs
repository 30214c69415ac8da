// Chunk: docs/chunks/highlight_iteration - Cross-layer boundary merging

//! Merged iteration over every layer's scope boundaries.
//!
//! Each active layer contributes a [`LayerHighlightIterator`] walking its
//! precomputed boundary list in buffer order. The combined
//! [`HighlightIterator`] keeps them in a list sorted so the *last* element
//! is the one positioned earliest; advancing bubbles the advanced iterator
//! back into place. Tie-breaking at equal positions:
//!
//! 1. the iterator that needs to close scopes wins (closing before opening
//!    preserves nesting at shared boundaries),
//! 2. otherwise the shallower layer wins.
//!
//! The opt-in cover rule: while the leader's position lies strictly inside
//! a content range of a deeper layer whose injection point asserts
//! `cover_shallower_scopes`, the leader's open/close lists are suppressed
//! for that step only. The matching opposite boundary elsewhere is *not*
//! suppressed, so consumers must tolerate transient scope-stack imbalance
//! inside a highlighted range; that asymmetry is intentional.

use canopy_buffer::{Point, Range};

use crate::language_mode::LanguageMode;
use crate::scope_resolver::{ScopeBoundary, ScopeId};

/// Seed data one layer contributes to the merged iterator.
pub(crate) struct LayerIterSeed {
    pub boundaries: Vec<(Point, ScopeBoundary)>,
    pub already_open: Vec<ScopeId>,
    pub depth: usize,
}

/// A covering injection's content ranges, tracked even when that layer has
/// no boundaries of its own in the seeked range.
pub(crate) struct CoverRegion {
    pub depth: usize,
    pub ranges: Vec<Range>,
}

/// Walks one layer's boundaries in buffer order.
pub struct LayerHighlightIterator {
    boundaries: Vec<(Point, ScopeBoundary)>,
    index: usize,
    depth: usize,
}

impl LayerHighlightIterator {
    fn new(seed: LayerIterSeed) -> Self {
        Self {
            boundaries: seed.boundaries,
            index: 0,
            depth: seed.depth,
        }
    }

    fn position(&self) -> Point {
        self.boundaries[self.index].0
    }

    fn open_ids(&self) -> &[ScopeId] {
        &self.boundaries[self.index].1.open
    }

    fn close_ids(&self) -> &[ScopeId] {
        &self.boundaries[self.index].1.close
    }

    fn needs_close(&self) -> bool {
        !self.close_ids().is_empty()
    }

    fn depth(&self) -> usize {
        self.depth
    }

    /// Steps to the next boundary; false when exhausted.
    fn advance(&mut self) -> bool {
        self.index += 1;
        self.index < self.boundaries.len()
    }
}

/// Sort key: earlier position first, then closes-before-opens, then the
/// shallower layer.
fn rank(iterator: &LayerHighlightIterator) -> (Point, u8, usize) {
    (
        iterator.position(),
        if iterator.needs_close() { 0 } else { 1 },
        iterator.depth(),
    )
}

/// The merged boundary stream across all active layers.
pub struct HighlightIterator<'a> {
    mode: &'a LanguageMode,
    iterators: Vec<LayerHighlightIterator>,
    cover_regions: Vec<CoverRegion>,
}

impl<'a> HighlightIterator<'a> {
    pub(crate) fn new(mode: &'a LanguageMode) -> Self {
        Self {
            mode,
            iterators: Vec::new(),
            cover_regions: Vec::new(),
        }
    }

    /// Positions the iterator at the start of `range` and returns the scope
    /// ids already open there, outermost layer first.
    ///
    /// Layers with no boundaries inside the range still contribute their
    /// already-open scopes but are excluded from merging.
    pub fn seek(&mut self, range: Range) -> Vec<ScopeId> {
        let (seeds, cover_regions) = self.mode.highlight_seeds(range);
        self.cover_regions = cover_regions;

        let mut open_scopes = Vec::new();
        self.iterators = seeds
            .into_iter()
            .filter_map(|seed| {
                open_scopes.extend(seed.already_open.iter().copied());
                if seed.boundaries.is_empty() {
                    None
                } else {
                    Some(LayerHighlightIterator::new(seed))
                }
            })
            .collect();
        // Descending by rank so the earliest-positioned iterator is last.
        self.iterators.sort_by(|a, b| rank(b).cmp(&rank(a)));
        open_scopes
    }

    /// True once every layer iterator is exhausted.
    pub fn done(&self) -> bool {
        self.iterators.is_empty()
    }

    /// The current boundary position.
    pub fn get_position(&self) -> Option<Point> {
        self.iterators.last().map(LayerHighlightIterator::position)
    }

    /// Scope ids opening at the current boundary. Empty while the leader is
    /// covered by a deeper `cover_shallower_scopes` injection.
    pub fn get_open_scope_ids(&self) -> Vec<ScopeId> {
        match self.iterators.last() {
            Some(leader) if !self.leader_is_covered() => leader.open_ids().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Scope ids closing at the current boundary, with the same cover rule.
    pub fn get_close_scope_ids(&self) -> Vec<ScopeId> {
        match self.iterators.last() {
            Some(leader) if !self.leader_is_covered() => leader.close_ids().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Advances the earliest iterator and restores the sort order.
    pub fn move_to_successor(&mut self) {
        let Some(leader) = self.iterators.last_mut() else {
            return;
        };
        if !leader.advance() {
            self.iterators.pop();
            return;
        }
        let mut index = self.iterators.len() - 1;
        while index > 0 && rank(&self.iterators[index]) > rank(&self.iterators[index - 1]) {
            self.iterators.swap(index, index - 1);
            index -= 1;
        }
    }

    fn leader_is_covered(&self) -> bool {
        let Some(leader) = self.iterators.last() else {
            return false;
        };
        let position = leader.position();
        self.cover_regions.iter().any(|region| {
            region.depth > leader.depth()
                && region
                    .ranges
                    .iter()
                    .any(|range| range.start < position && position < range.end)
        })
    }
}
