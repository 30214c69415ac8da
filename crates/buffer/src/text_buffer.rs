// Chunk: docs/chunks/buffer_core - Text buffer with splice editing and marker layers

//! The text buffer backing the language mode.
//!
//! `TextBuffer` stores UTF-8 text with a byte-offset line index and exposes
//! the interface the syntax subsystem needs: row/column ↔ byte-offset
//! mapping, line access, clipping, splice-style editing that reports
//! [`TextChange`] events, and marker layers whose ranges follow content
//! under edits.
//!
//! Every mutation goes through [`TextBuffer::set_text_in_range`]; the
//! returned `TextChange` is what a host forwards to the language mode's
//! `buffer_did_change`.

use std::collections::HashMap;

use crate::line_index::LineIndex;
use crate::marker::{MarkerLayer, MarkerLayerId};
use crate::types::{extent_of, Point, Range};

/// Describes one buffer mutation: the range that was replaced, the range the
/// replacement occupies, and both texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub old_range: Range,
    pub new_range: Range,
    pub old_text: String,
    pub new_text: String,
}

/// A line-indexed UTF-8 text buffer with marker layers.
#[derive(Debug, Default)]
pub struct TextBuffer {
    text: String,
    line_index: LineIndex,
    marker_layers: HashMap<MarkerLayerId, MarkerLayer>,
    next_marker_layer_id: MarkerLayerId,
}

impl TextBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        let mut buffer = Self {
            text: String::new(),
            line_index: LineIndex::new(),
            marker_layers: HashMap::new(),
            next_marker_layer_id: 0,
        };
        buffer.line_index.rebuild("");
        buffer
    }

    /// Creates a buffer containing `content`.
    pub fn from_str(content: &str) -> Self {
        let mut buffer = Self::new();
        buffer.text = content.to_string();
        buffer.line_index.rebuild(content);
        buffer
    }

    /// The entire buffer text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Total length in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_index.line_count()
    }

    /// The content of a line, excluding its newline. Out-of-bounds rows
    /// yield the empty string.
    pub fn line(&self, row: usize) -> &str {
        let Some(start) = self.line_index.line_start(row) else {
            return "";
        };
        let end = self.line_index.line_end(row, self.text.len()).unwrap_or(start);
        &self.text[start..end]
    }

    /// Length of a line in bytes, excluding its newline.
    pub fn line_len(&self, row: usize) -> usize {
        self.line_index.line_len(row, self.text.len()).unwrap_or(0)
    }

    /// `"\n"` for every row but the last, `""` for the last.
    pub fn line_ending(&self, row: usize) -> &'static str {
        if row + 1 < self.line_count() {
            "\n"
        } else {
            ""
        }
    }

    /// True if the row contains only whitespace (or nothing).
    pub fn is_row_blank(&self, row: usize) -> bool {
        self.line(row).trim().is_empty()
    }

    /// Position of the first non-whitespace character on `row`, if any.
    pub fn first_non_whitespace_position(&self, row: usize) -> Option<Point> {
        let line = self.line(row);
        line.find(|c: char| !c.is_whitespace())
            .map(|column| Point::new(row, column))
    }

    /// The last valid position in the buffer.
    pub fn max_point(&self) -> Point {
        let row = self.line_count() - 1;
        Point::new(row, self.line_len(row))
    }

    /// The whole-buffer range.
    pub fn range(&self) -> Range {
        Range::new(Point::zero(), self.max_point())
    }

    /// Clamps a point into the buffer: the row to the last row, the column
    /// to the row's length.
    pub fn clip_position(&self, point: Point) -> Point {
        let row = point.row.min(self.line_count() - 1);
        let column = if point.row > row {
            self.line_len(row)
        } else {
            point.column.min(self.line_len(row))
        };
        Point::new(row, column)
    }

    /// Byte offset of a (clipped) position.
    pub fn offset_for_position(&self, point: Point) -> usize {
        let point = self.clip_position(point);
        self.line_index.line_start(point.row).unwrap_or(0) + point.column
    }

    /// Position of a byte offset, clamped to the buffer length.
    pub fn position_for_offset(&self, offset: usize) -> Point {
        let offset = offset.min(self.text.len());
        let row = self.line_index.row_at_offset(offset);
        let start = self.line_index.line_start(row).unwrap_or(0);
        Point::new(row, offset - start)
    }

    /// The text inside `range`, clipped to the buffer.
    pub fn text_in_range(&self, range: Range) -> &str {
        let start = self.offset_for_position(range.start);
        let end = self.offset_for_position(range.end).max(start);
        &self.text[start..end]
    }

    /// Replaces `range` with `new_text`, adjusting all marker layers, and
    /// returns the change event describing the splice.
    pub fn set_text_in_range(&mut self, range: Range, new_text: &str) -> TextChange {
        let start = self.clip_position(range.start);
        let end = self.clip_position(range.end).max(start);
        let old_range = Range::new(start, end);

        let start_offset = self.offset_for_position(start);
        let end_offset = self.offset_for_position(end);
        let old_text = self.text[start_offset..end_offset].to_string();

        self.text.replace_range(start_offset..end_offset, new_text);
        self.line_index.rebuild(&self.text);

        let new_end = start.traverse(extent_of(new_text));
        for layer in self.marker_layers.values_mut() {
            layer.splice(start, end, new_end);
        }

        TextChange {
            old_range,
            new_range: Range::new(start, new_end),
            old_text,
            new_text: new_text.to_string(),
        }
    }

    /// Creates a new, empty marker layer.
    pub fn add_marker_layer(&mut self) -> MarkerLayerId {
        let id = self.next_marker_layer_id;
        self.next_marker_layer_id += 1;
        self.marker_layers.insert(id, MarkerLayer::new());
        id
    }

    pub fn marker_layer(&self, id: MarkerLayerId) -> Option<&MarkerLayer> {
        self.marker_layers.get(&id)
    }

    pub fn marker_layer_mut(&mut self, id: MarkerLayerId) -> Option<&mut MarkerLayer> {
        self.marker_layers.get_mut(&id)
    }

    /// Drops a marker layer and all of its markers.
    pub fn remove_marker_layer(&mut self, id: MarkerLayerId) {
        self.marker_layers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== line access ====================

    #[test]
    fn test_from_str_lines() {
        let buffer = TextBuffer::from_str("hello\nworld\n");
        assert_eq!(buffer.line_count(), 3);
        assert_eq!(buffer.line(0), "hello");
        assert_eq!(buffer.line(1), "world");
        assert_eq!(buffer.line(2), "");
    }

    #[test]
    fn test_line_out_of_bounds() {
        let buffer = TextBuffer::from_str("hello");
        assert_eq!(buffer.line(5), "");
        assert_eq!(buffer.line_len(5), 0);
    }

    #[test]
    fn test_line_ending() {
        let buffer = TextBuffer::from_str("a\nb");
        assert_eq!(buffer.line_ending(0), "\n");
        assert_eq!(buffer.line_ending(1), "");
    }

    #[test]
    fn test_is_row_blank() {
        let buffer = TextBuffer::from_str("a\n   \n\nb");
        assert!(!buffer.is_row_blank(0));
        assert!(buffer.is_row_blank(1));
        assert!(buffer.is_row_blank(2));
        assert!(!buffer.is_row_blank(3));
    }

    #[test]
    fn test_first_non_whitespace_position() {
        let buffer = TextBuffer::from_str("  abc\n\t x");
        assert_eq!(
            buffer.first_non_whitespace_position(0),
            Some(Point::new(0, 2))
        );
        assert_eq!(
            buffer.first_non_whitespace_position(1),
            Some(Point::new(1, 2))
        );
    }

    // ==================== positions and offsets ====================

    #[test]
    fn test_offset_for_position() {
        let buffer = TextBuffer::from_str("hello\nworld");
        assert_eq!(buffer.offset_for_position(Point::new(0, 0)), 0);
        assert_eq!(buffer.offset_for_position(Point::new(0, 5)), 5);
        assert_eq!(buffer.offset_for_position(Point::new(1, 0)), 6);
        assert_eq!(buffer.offset_for_position(Point::new(1, 5)), 11);
    }

    #[test]
    fn test_position_for_offset() {
        let buffer = TextBuffer::from_str("hello\nworld");
        assert_eq!(buffer.position_for_offset(0), Point::new(0, 0));
        assert_eq!(buffer.position_for_offset(5), Point::new(0, 5));
        assert_eq!(buffer.position_for_offset(6), Point::new(1, 0));
        assert_eq!(buffer.position_for_offset(100), Point::new(1, 5));
    }

    #[test]
    fn test_clip_position() {
        let buffer = TextBuffer::from_str("hello\nhi");
        assert_eq!(buffer.clip_position(Point::new(0, 99)), Point::new(0, 5));
        assert_eq!(buffer.clip_position(Point::new(9, 1)), Point::new(1, 2));
        assert_eq!(buffer.clip_position(Point::new(1, 1)), Point::new(1, 1));
    }

    #[test]
    fn test_max_point_and_range() {
        let buffer = TextBuffer::from_str("ab\ncde");
        assert_eq!(buffer.max_point(), Point::new(1, 3));
        assert_eq!(
            buffer.range(),
            Range::new(Point::zero(), Point::new(1, 3))
        );
    }

    // ==================== editing ====================

    #[test]
    fn test_insert_reports_change() {
        let mut buffer = TextBuffer::from_str("hello world");
        let change = buffer.set_text_in_range(
            Range::new(Point::new(0, 5), Point::new(0, 5)),
            ",",
        );
        assert_eq!(buffer.text(), "hello, world");
        assert_eq!(change.old_text, "");
        assert_eq!(change.new_text, ",");
        assert_eq!(
            change.new_range,
            Range::new(Point::new(0, 5), Point::new(0, 6))
        );
    }

    #[test]
    fn test_replace_across_lines() {
        let mut buffer = TextBuffer::from_str("one\ntwo\nthree");
        let change = buffer.set_text_in_range(
            Range::new(Point::new(0, 1), Point::new(2, 1)),
            "x",
        );
        assert_eq!(buffer.text(), "oxhree");
        assert_eq!(change.old_text, "ne\ntwo\nt");
        assert_eq!(
            change.new_range,
            Range::new(Point::new(0, 1), Point::new(0, 2))
        );
    }

    #[test]
    fn test_insert_newline_updates_lines() {
        let mut buffer = TextBuffer::from_str("ab");
        buffer.set_text_in_range(Range::new(Point::new(0, 1), Point::new(0, 1)), "\n");
        assert_eq!(buffer.line_count(), 2);
        assert_eq!(buffer.line(0), "a");
        assert_eq!(buffer.line(1), "b");
    }

    #[test]
    fn test_edit_adjusts_markers() {
        let mut buffer = TextBuffer::from_str("abc\ndef\n");
        let layer_id = buffer.add_marker_layer();
        let marker = buffer
            .marker_layer_mut(layer_id)
            .unwrap()
            .mark_range(Range::new(Point::new(1, 0), Point::new(1, 3)));

        buffer.set_text_in_range(Range::new(Point::new(0, 0), Point::new(0, 0)), "x\n");

        let range = buffer.marker_layer(layer_id).unwrap().range_for(marker);
        assert_eq!(range, Some(Range::new(Point::new(2, 0), Point::new(2, 3))));
    }
}
