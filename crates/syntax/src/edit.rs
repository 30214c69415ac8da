// Chunk: docs/chunks/language_layers - Edit translation between buffer changes and tree-sitter

//! Edit translation between buffer change events and tree-sitter edits.
//!
//! Tree-sitter wants edits as byte offsets plus (row, column) points; the
//! buffer reports [`TextChange`] events in points plus texts. This module
//! bridges the two, along with the point/range conversions used across the
//! crate.

use canopy_buffer::{Point, Range, TextBuffer, TextChange};
use tree_sitter::InputEdit;

/// Converts a buffer point to a tree-sitter point.
pub fn ts_point(point: Point) -> tree_sitter::Point {
    tree_sitter::Point {
        row: point.row,
        column: point.column,
    }
}

/// Converts a tree-sitter point to a buffer point.
pub fn point(ts: tree_sitter::Point) -> Point {
    Point::new(ts.row, ts.column)
}

/// Converts a tree-sitter range to a buffer point range.
pub fn point_range(ts: tree_sitter::Range) -> Range {
    Range::new(point(ts.start_point), point(ts.end_point))
}

/// Builds the tree-sitter edit for a buffer change.
///
/// `start_byte` comes from the post-edit buffer (old and new range share a
/// start); the old end offset is reconstructed from the replaced text's
/// length, so the edit is exact even though the buffer has already mutated.
pub fn input_edit_for_change(change: &TextChange, buffer: &TextBuffer) -> InputEdit {
    let start_byte = buffer.offset_for_position(change.new_range.start);
    InputEdit {
        start_byte,
        old_end_byte: start_byte + change.old_text.len(),
        new_end_byte: start_byte + change.new_text.len(),
        start_position: ts_point(change.new_range.start),
        old_end_position: ts_point(change.old_range.end),
        new_end_position: ts_point(change.new_range.end),
    }
}
