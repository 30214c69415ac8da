// Chunk: docs/chunks/language_layers - Query capture collection

//! Shared capture collection over a point range.
//!
//! Wraps the `QueryCursor` streaming-iterator protocol once so every
//! subsystem (scopes, folds, indents, locals) consumes plain vectors of
//! captures with their pattern's `#set!` property bag attached. Text
//! predicates (`#eq?`, `#match?`) are enforced by the engine during
//! iteration, so rejected matches never show up here.

use std::collections::HashMap;

use canopy_buffer::Point;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

use crate::edit::ts_point;
use crate::scope_resolver::CaptureProperties;

/// One capture: its name, node, and pattern properties.
pub(crate) struct CaptureItem<'tree> {
    pub name: String,
    pub node: Node<'tree>,
    pub properties: CaptureProperties,
}

/// Collects all captures of `query` under `node` intersecting
/// `[start, end)`, in capture-position order.
pub(crate) fn captures_in_range<'tree>(
    query: &Query,
    node: Node<'tree>,
    text: &str,
    start: Point,
    end: Point,
) -> Vec<CaptureItem<'tree>> {
    let mut cursor = QueryCursor::new();
    cursor.set_point_range(ts_point(start)..ts_point(end));

    let mut properties_by_pattern: HashMap<usize, CaptureProperties> = HashMap::new();
    let mut items = Vec::new();

    let mut captures = cursor.captures(query, node, text.as_bytes());
    while let Some((mat, capture_index)) = captures.next() {
        let capture = mat.captures[*capture_index];
        let name = query.capture_names()[capture.index as usize].to_string();
        let properties = properties_by_pattern
            .entry(mat.pattern_index)
            .or_insert_with(|| {
                query
                    .property_settings(mat.pattern_index)
                    .iter()
                    .map(|property| {
                        (
                            property.key.to_string(),
                            property.value.as_ref().map(|value| value.to_string()),
                        )
                    })
                    .collect()
            })
            .clone();
        items.push(CaptureItem {
            name,
            node: capture.node,
            properties,
        });
    }
    items
}
