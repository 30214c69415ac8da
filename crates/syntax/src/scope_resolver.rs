// Chunk: docs/chunks/scope_resolution - Capture-to-boundary resolution and scope interning

//! Turns raw query captures into deterministic scope boundary events.
//!
//! Capture names are interned to numeric scope ids; each stored capture
//! contributes an open boundary at its (possibly adjusted) start and a close
//! boundary at its end. The resolver deduplicates boundaries with identical
//! (position, id, side), merges equal captures on the same node, and keeps
//! everything in an ordered map so replaying boundaries is deterministic.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use canopy_buffer::{Point, Range, TextBuffer};
use tree_sitter::Node;

use crate::edit::point;

/// Numeric id for an interned scope name.
pub type ScopeId = u32;

/// The pre-interned id of the synthetic `variable` scope.
pub const VAR_SCOPE_ID: ScopeId = 257;

const FIRST_DYNAMIC_SCOPE_ID: ScopeId = 259;
const SCOPE_ID_STEP: ScopeId = 2;

/// Bijective map between scope names and scope ids.
///
/// Ids are stable for the life of the map: once a name is assigned an id it
/// never changes. New ids step by 2 from a fixed base.
#[derive(Debug)]
pub struct ScopeIdMap {
    ids_by_name: HashMap<String, ScopeId>,
    names_by_id: HashMap<ScopeId, String>,
    next_id: ScopeId,
}

impl ScopeIdMap {
    pub fn new() -> Self {
        let mut map = Self {
            ids_by_name: HashMap::new(),
            names_by_id: HashMap::new(),
            next_id: FIRST_DYNAMIC_SCOPE_ID,
        };
        map.ids_by_name.insert("variable".to_string(), VAR_SCOPE_ID);
        map.names_by_id.insert(VAR_SCOPE_ID, "variable".to_string());
        map
    }

    /// Returns the id for `name`, interning it if needed.
    pub fn get_or_create(&mut self, name: &str) -> ScopeId {
        if let Some(id) = self.ids_by_name.get(name) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += SCOPE_ID_STEP;
        self.ids_by_name.insert(name.to_string(), id);
        self.names_by_id.insert(id, name.to_string());
        id
    }

    pub fn id_for(&self, name: &str) -> Option<ScopeId> {
        self.ids_by_name.get(name).copied()
    }

    pub fn name_for(&self, id: ScopeId) -> Option<&str> {
        self.names_by_id.get(&id).map(String::as_str)
    }

    /// CSS-style class name for a scope id: `string.quoted` becomes
    /// `syntax--string syntax--quoted`.
    pub fn class_name_for(&self, id: ScopeId) -> Option<String> {
        let name = self.name_for(id)?;
        Some(
            name.split('.')
                .map(|segment| format!("syntax--{segment}"))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}

impl Default for ScopeIdMap {
    fn default() -> Self {
        Self::new()
    }
}

/// The `#set!` property bag attached to a capture's pattern.
pub type CaptureProperties = HashMap<String, Option<String>>;

/// Which side of a scope a boundary represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundarySide {
    Open,
    Close,
}

/// The scopes opening and closing at one buffer position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeBoundary {
    pub open: Vec<ScopeId>,
    pub close: Vec<ScopeId>,
}

/// Accumulates captures into an ordered boundary map.
pub struct ScopeResolver<'a> {
    interner: &'a RefCell<ScopeIdMap>,
    boundaries: BTreeMap<Point, ScopeBoundary>,
    seen: HashSet<(Point, ScopeId, bool)>,
    stored: HashSet<(usize, ScopeId)>,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(interner: &'a RefCell<ScopeIdMap>) -> Self {
        Self {
            interner,
            boundaries: BTreeMap::new(),
            seen: HashSet::new(),
            stored: HashSet::new(),
        }
    }

    /// Stores one capture, returning the effective range it covered, or
    /// `None` if the capture was rejected (an adjustment emptied or
    /// inverted its range).
    ///
    /// Equal-name captures on the same node are merged; their range is
    /// still reported.
    pub fn store(
        &mut self,
        name: &str,
        node: &Node,
        properties: &CaptureProperties,
        override_id: Option<ScopeId>,
        buffer: &TextBuffer,
    ) -> Option<Range> {
        let range = adjusted_capture_range(node, properties, buffer)?;
        let id = override_id
            .unwrap_or_else(|| self.interner.borrow_mut().get_or_create(name));
        if self.stored.insert((node.id(), id)) {
            self.set_boundary(range.start, id, BoundarySide::Open);
            self.set_boundary(range.end, id, BoundarySide::Close);
        }
        Some(range)
    }

    /// Injects a synthetic boundary, deduplicated like stored ones.
    pub fn set_boundary(&mut self, position: Point, id: ScopeId, side: BoundarySide) {
        let open = matches!(side, BoundarySide::Open);
        if !self.seen.insert((position, id, open)) {
            return;
        }
        let boundary = self.boundaries.entry(position).or_default();
        if open {
            boundary.open.push(id);
        } else {
            boundary.close.push(id);
        }
    }

    /// Clears all accumulated state.
    pub fn reset(&mut self) {
        self.boundaries.clear();
        self.seen.clear();
        self.stored.clear();
    }

    /// Consumes the resolver, yielding boundaries in buffer order.
    pub fn into_boundaries(self) -> BTreeMap<Point, ScopeBoundary> {
        self.boundaries
    }
}

/// The effective range of a capture after applying its `adjust.*`
/// properties. `None` if the adjusted range is empty or inverted.
pub fn adjusted_capture_range(
    node: &Node,
    properties: &CaptureProperties,
    buffer: &TextBuffer,
) -> Option<Range> {
    let mut start = point(node.start_position());
    let mut end = point(node.end_position());

    if let Some(spec) = property_value(properties, "adjust.startAt") {
        start = resolve_node_position(node, spec)?;
    }
    if let Some(spec) = property_value(properties, "adjust.endAt") {
        end = resolve_node_position(node, spec)?;
    }
    if let Some(delta) = property_int(properties, "adjust.offsetStart") {
        start = offset_position(buffer, start, delta);
    }
    if let Some(delta) = property_int(properties, "adjust.offsetEnd") {
        end = offset_position(buffer, end, delta);
    }

    if end <= start {
        return None;
    }
    Some(Range::new(start, end))
}

/// Looks up a property under its full key or its bare suffix
/// (`adjust.endAt` or `endAt`).
pub(crate) fn property_value<'p>(
    properties: &'p CaptureProperties,
    key: &str,
) -> Option<&'p str> {
    if let Some(value) = properties.get(key) {
        return value.as_deref();
    }
    let bare = key.rsplit('.').next()?;
    properties.get(bare)?.as_deref()
}

pub(crate) fn property_int(properties: &CaptureProperties, key: &str) -> Option<i64> {
    property_value(properties, key)?.parse().ok()
}

fn offset_position(buffer: &TextBuffer, position: Point, delta: i64) -> Point {
    let offset = buffer.offset_for_position(position) as i64 + delta;
    buffer.position_for_offset(offset.max(0) as usize)
}

/// Resolves a node-descriptor chain like `lastChild.startPosition` against
/// a node. An intermediate null breaks the chain.
pub(crate) fn resolve_node_position(node: &Node, spec: &str) -> Option<Point> {
    let mut current = *node;
    for part in spec.split('.') {
        match part {
            "startPosition" => return Some(point(current.start_position())),
            "endPosition" => return Some(point(current.end_position())),
            "firstChild" => current = current.child(0)?,
            "lastChild" => current = current.child(current.child_count().checked_sub(1)?)?,
            "firstNamedChild" => current = current.named_child(0)?,
            "lastNamedChild" => {
                current = current.named_child(current.named_child_count().checked_sub(1)?)?
            }
            "parent" => current = current.parent()?,
            "nextSibling" => current = current.next_sibling()?,
            "previousSibling" => current = current.prev_sibling()?,
            _ => return None,
        }
    }
    None
}
