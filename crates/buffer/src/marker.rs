// Chunk: docs/chunks/buffer_markers - Marker layers that follow content under edits

//! Marker layers: named sets of ranges that move with the text.
//!
//! The syntax subsystem marks every injection's extent with a marker; when
//! the buffer is edited, markers shift so that a marker placed over a
//! `<script>` body still covers that body after text is inserted above it.
//!
//! Adjustment rules for a position relative to an edit replacing
//! `[start, old_end)` with content ending at `new_end`:
//!
//! - positions at or before `start` are untouched
//! - positions at or after `old_end` translate by the edit's extent delta
//! - positions strictly inside the replaced span clamp to `new_end`
//!
//! Interior clamping makes markers approximate until the next injection
//! pass re-anchors them, which is the documented contract between an edit
//! and the following parse.

use std::collections::BTreeMap;

use crate::types::{Point, Range};

/// Identifies a marker within its layer.
pub type MarkerId = usize;

/// Identifies a marker layer within its buffer.
pub type MarkerLayerId = usize;

/// An ordered set of markers over one buffer.
#[derive(Debug, Default)]
pub struct MarkerLayer {
    markers: BTreeMap<MarkerId, Range>,
    next_id: MarkerId,
}

impl MarkerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a marker over `range` and returns its id.
    pub fn mark_range(&mut self, range: Range) -> MarkerId {
        let id = self.next_id;
        self.next_id += 1;
        self.markers.insert(id, range);
        id
    }

    /// Returns the current range of a marker, or `None` if it was destroyed.
    pub fn range_for(&self, id: MarkerId) -> Option<Range> {
        self.markers.get(&id).copied()
    }

    /// Re-anchors a marker to an exact range.
    pub fn set_range(&mut self, id: MarkerId, range: Range) {
        if let Some(entry) = self.markers.get_mut(&id) {
            *entry = range;
        }
    }

    /// Removes a marker. Returns true if it existed.
    pub fn destroy(&mut self, id: MarkerId) -> bool {
        self.markers.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// All marker ids, in creation order.
    pub fn marker_ids(&self) -> Vec<MarkerId> {
        self.markers.keys().copied().collect()
    }

    /// Ids of markers whose ranges overlap or touch `range`.
    pub fn marker_ids_intersecting(&self, range: Range) -> Vec<MarkerId> {
        self.markers
            .iter()
            .filter(|(_, r)| r.intersects(&range))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Adjusts every marker for an edit that replaced `[start, old_end)`
    /// with text ending at `new_end`.
    pub fn splice(&mut self, start: Point, old_end: Point, new_end: Point) {
        for range in self.markers.values_mut() {
            range.start = adjust_point(range.start, start, old_end, new_end);
            range.end = adjust_point(range.end, start, old_end, new_end);
        }
    }
}

fn adjust_point(point: Point, start: Point, old_end: Point, new_end: Point) -> Point {
    if point <= start {
        point
    } else if point >= old_end {
        new_end.traverse(point.traversal(old_end))
    } else {
        new_end
    }
}
