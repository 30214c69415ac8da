// Chunk: docs/chunks/buffer_core - Text buffer crate for the canopy language mode

//! canopy-buffer: the text buffer collaborator for the canopy language mode.
//!
//! This crate provides a line-indexed UTF-8 text buffer with splice editing,
//! position/offset conversion, and marker layers. It is deliberately simple:
//! the language mode needs a correct buffer interface, not a clever one.
//!
//! # Overview
//!
//! The main type is [`TextBuffer`], which provides:
//! - byte-offset ↔ (row, column) conversion and clipping
//! - line-based access for indentation and fold queries
//! - [`TextBuffer::set_text_in_range`] splice editing that reports a
//!   [`TextChange`] for each mutation
//! - marker layers ([`MarkerLayer`]) whose ranges follow content under edits
//!
//! # Example
//!
//! ```
//! use canopy_buffer::{Point, Range, TextBuffer};
//!
//! let mut buffer = TextBuffer::from_str("hello\nworld");
//! assert_eq!(buffer.line(1), "world");
//!
//! let change = buffer.set_text_in_range(
//!     Range::new(Point::new(0, 5), Point::new(0, 5)),
//!     ",",
//! );
//! assert_eq!(buffer.text(), "hello,\nworld");
//! assert_eq!(change.new_range.end, Point::new(0, 6));
//! ```
//!
//! Columns are byte offsets within their row, matching tree-sitter's
//! coordinate convention.

mod line_index;
mod marker;
mod text_buffer;
mod types;

pub use marker::{MarkerId, MarkerLayer, MarkerLayerId};
pub use text_buffer::{TextBuffer, TextChange};
pub use types::{extent_of, Point, Range};
