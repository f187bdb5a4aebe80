#![forbid(unsafe_code)]

//! Text side of fline: the edit buffer and render geometry.
//!
//! - [`EditBuffer`] - text, cursor, selection, undo/redo, kill ring
//! - [`geometry`] - wrapping, point/offset mapping and resize remapping
//!
//! # Example
//! ```
//! use fline_text::{EditBuffer, RenderData, ScreenPoint, geometry};
//!
//! let mut buf = EditBuffer::new();
//! buf.insert("0123456789");
//!
//! let anchor = ScreenPoint::new(2, 0);
//! let render = RenderData::from_text(buf.text(), 8, 0);
//! let offset = render.offset_for_char(buf.cursor());
//! let point = geometry::offset_to_point(anchor, 8, &render, offset).unwrap();
//! assert_eq!(point, ScreenPoint::new(4, 1));
//! ```

pub mod buffer;
pub mod geometry;

pub use buffer::{
    EditBuffer, KillRing, RangeConstraint, RangeError, Selection, WordCase, WordMotion,
};
pub use geometry::{
    GeometryError, LineKind, LogicalLine, PromptSpan, Remap, RenderData, RenderOffset,
    ScreenPoint,
};
