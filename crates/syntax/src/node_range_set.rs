// Chunk: docs/chunks/language_layers - Included-range computation for injected parsers

//! The set of buffer sub-ranges fed to an injected layer's parser.
//!
//! An injection covers the text of its content nodes, optionally excluding
//! their named children (so a template string's interpolations don't reach
//! the embedded parser), intersected with whatever the parent layer itself
//! was allowed to see. With `newlines_between`, synthetic one-byte newline
//! ranges keep the injected parser's line numbering aligned with the buffer.

use canopy_buffer::{Point, TextBuffer};
use tree_sitter::{Node, Range as TsRange};

/// The disjoint, ordered ranges to feed a child parser.
#[derive(Debug, Clone)]
pub struct NodeRangeSet {
    previous: Option<Vec<TsRange>>,
    base: Vec<TsRange>,
    newlines_between: bool,
}

impl NodeRangeSet {
    /// Builds a range set from content nodes.
    ///
    /// `previous` is the parent layer's own resolved range set (`None` for a
    /// root-layer parent, which sees the whole buffer); every computed range
    /// is intersected with it. With `include_children == false`, only the
    /// text between each node's named children (plus the trailing tail)
    /// is included.
    pub fn new(
        previous: Option<&[TsRange]>,
        nodes: &[Node],
        newlines_between: bool,
        include_children: bool,
    ) -> Self {
        let mut base = Vec::new();
        for node in nodes {
            if include_children {
                base.push(node.range());
            } else {
                push_gap_ranges(&mut base, node);
            }
        }
        Self {
            previous: previous.map(<[TsRange]>::to_vec),
            base,
            newlines_between,
        }
    }

    /// True if the set can produce no ranges at all.
    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Resolves the final ranges against the buffer.
    pub fn get_ranges(&self, buffer: &TextBuffer) -> Vec<TsRange> {
        let mut result: Vec<TsRange> = Vec::new();
        match &self.previous {
            None => result.extend(self.base.iter().copied().filter(|r| r.start_byte < r.end_byte)),
            Some(previous) => {
                for range in &self.base {
                    for prior in previous {
                        if let Some(overlap) = intersect(range, prior) {
                            result.push(overlap);
                        }
                    }
                }
            }
        }
        if self.newlines_between {
            result = insert_newline_ranges(result, buffer);
        }
        result
    }
}

/// The gaps between a node's consecutive named children, plus the trailing
/// tail: only the node's own text.
fn push_gap_ranges(out: &mut Vec<TsRange>, node: &Node) {
    let mut cursor_byte = node.start_byte();
    let mut cursor_point = node.start_position();
    for i in 0..node.named_child_count() {
        let child = node.named_child(i).expect("named child index in bounds");
        if child.start_byte() > cursor_byte {
            out.push(TsRange {
                start_byte: cursor_byte,
                end_byte: child.start_byte(),
                start_point: cursor_point,
                end_point: child.start_position(),
            });
        }
        cursor_byte = cursor_byte.max(child.end_byte());
        cursor_point = cursor_point.max(child.end_position());
    }
    if node.end_byte() > cursor_byte {
        out.push(TsRange {
            start_byte: cursor_byte,
            end_byte: node.end_byte(),
            start_point: cursor_point,
            end_point: node.end_position(),
        });
    }
}

fn intersect(a: &TsRange, b: &TsRange) -> Option<TsRange> {
    let (start_byte, start_point) = if a.start_byte >= b.start_byte {
        (a.start_byte, a.start_point)
    } else {
        (b.start_byte, b.start_point)
    };
    let (end_byte, end_point) = if a.end_byte <= b.end_byte {
        (a.end_byte, a.end_point)
    } else {
        (b.end_byte, b.end_point)
    };
    if start_byte < end_byte {
        Some(TsRange {
            start_byte,
            end_byte,
            start_point,
            end_point,
        })
    } else {
        None
    }
}

/// Inserts a one-byte range over the newline at the end of the previous
/// range's row between each pair of ranges separated by a row.
fn insert_newline_ranges(ranges: Vec<TsRange>, buffer: &TextBuffer) -> Vec<TsRange> {
    let mut result: Vec<TsRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        if let Some(previous) = result.last() {
            let row = previous.end_point.row;
            if range.start_point.row > row && row + 1 < buffer.line_count() {
                let column = buffer.line_len(row);
                let byte = buffer.offset_for_position(Point::new(row, column));
                if byte >= previous.end_byte && byte + 1 <= range.start_byte {
                    result.push(TsRange {
                        start_byte: byte,
                        end_byte: byte + 1,
                        start_point: tree_sitter::Point { row, column },
                        end_point: tree_sitter::Point {
                            row: row + 1,
                            column: 0,
                        },
                    });
                }
            }
        }
        result.push(range);
    }
    result
}
