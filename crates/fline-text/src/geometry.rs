#![forbid(unsafe_code)]

//! Render geometry for wrapped multi-line input.
//!
//! The edited text is split into logical lines (newline-delimited). Each
//! logical line starts at some column (the anchor column for the first line,
//! the continuation prompt width for the rest) and wraps at the buffer width
//! into physical rows.
//!
//! Two coordinate systems meet here:
//!
//! - [`ScreenPoint`]: absolute `(x, y)` cells, only meaningful for one buffer
//!   width and anchor.
//! - [`RenderOffset`]: `(line, index)` where `index` counts visible cells
//!   from the start of the logical line. Width-independent, so it survives a
//!   resize.
//!
//! # Boundary rule
//!
//! A line whose content lands flush with the right edge does not grow an
//! empty trailing row: `physical_line_count` reports the last row as full
//! (`last == width`). A cursor *after* that content sits at column 0 of the
//! following row. When the next logical line also starts at column 0 (empty
//! continuation prompt) both positions are the same point; the point maps to
//! the start of the next line.
//!
//! Visible length is measured in terminal cells with `unicode-width`. A wide
//! character that straddles the right edge is counted as if it split; the
//! terminal's own behaviour there (wrap early, pad the row) is not modelled.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Geometry failures. All of them are caller mistakes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// Buffer width must be at least one cell.
    #[error("buffer width must be non-zero")]
    ZeroWidth,
    /// Offset names a logical line that does not exist.
    #[error("logical line {line} out of range (have {count})")]
    LineOutOfRange {
        /// Requested logical line.
        line: usize,
        /// Number of logical lines.
        count: usize,
    },
    /// Offset index is past the end of its line.
    #[error("visible index {index} exceeds line {line} length {len}")]
    IndexOutOfRange {
        /// Logical line.
        line: usize,
        /// Requested visible index.
        index: usize,
        /// Visible length of the line.
        len: usize,
    },
    /// Point is not on any rendered cell of the text.
    #[error("point ({x}, {y}) is outside the rendered text")]
    PointOutOfRange {
        /// Column.
        x: usize,
        /// Row.
        y: usize,
    },
}

/// Absolute screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScreenPoint {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
}

impl ScreenPoint {
    /// Create a point.
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Width-independent cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderOffset {
    /// Logical line index.
    pub line: usize,
    /// Visible cell index within the line.
    pub index: usize,
}

impl RenderOffset {
    /// Create an offset.
    #[must_use]
    pub const fn new(line: usize, index: usize) -> Self {
        Self { line, index }
    }
}

/// Which prompt a logical line renders after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// First logical line, after the main prompt.
    First,
    /// Later lines, after the continuation prompt.
    Continuation,
}

/// One newline-delimited segment of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// Line text without the newline.
    pub text: String,
    /// Prompt kind.
    pub kind: LineKind,
}

impl LogicalLine {
    /// Visible length in cells.
    #[must_use]
    pub fn visible_len(&self) -> usize {
        self.text.width()
    }
}

/// Full render state of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderData {
    /// Logical lines in order; never empty.
    pub lines: Vec<LogicalLine>,
    /// Width the cursor point was computed against.
    pub buffer_width: usize,
    /// Column where continuation lines start.
    pub continuation_width: usize,
    /// Absolute cursor position.
    pub cursor: ScreenPoint,
}

impl RenderData {
    /// Split `text` into logical lines. The cursor starts at the origin.
    #[must_use]
    pub fn from_text(text: &str, buffer_width: usize, continuation_width: usize) -> Self {
        let lines = text
            .split('\n')
            .enumerate()
            .map(|(i, line)| LogicalLine {
                text: line.to_string(),
                kind: if i == 0 {
                    LineKind::First
                } else {
                    LineKind::Continuation
                },
            })
            .collect();
        Self {
            lines,
            buffer_width,
            continuation_width,
            cursor: ScreenPoint::default(),
        }
    }

    /// Set the cursor point.
    #[must_use]
    pub fn with_cursor(mut self, cursor: ScreenPoint) -> Self {
        self.cursor = cursor;
        self
    }

    /// Starting column of logical line `line`.
    #[must_use]
    pub fn initial_column(&self, anchor: ScreenPoint, line: usize) -> usize {
        if line == 0 {
            anchor.x
        } else {
            self.continuation_width
        }
    }

    /// Physical rows used by every line at `width`.
    pub fn total_rows(&self, anchor: ScreenPoint, width: usize) -> Result<usize, GeometryError> {
        let mut rows = 0;
        for (i, line) in self.lines.iter().enumerate() {
            let (count, _) =
                physical_line_count_len(line.visible_len(), width, self.initial_column(anchor, i))?;
            rows += count;
        }
        Ok(rows)
    }

    /// Map a char index into the whole buffer text to a render offset.
    ///
    /// Indices past the end map to the end of the last line.
    #[must_use]
    pub fn offset_for_char(&self, char_index: usize) -> RenderOffset {
        let mut remaining = char_index;
        for (i, line) in self.lines.iter().enumerate() {
            let len = line.text.chars().count();
            if remaining <= len || i + 1 == self.lines.len() {
                return RenderOffset::new(i, cell_offset(&line.text, remaining));
            }
            remaining -= len + 1;
        }
        RenderOffset::default()
    }

    /// Map a render offset back to a char index into the whole buffer text.
    pub fn char_for_offset(&self, offset: RenderOffset) -> Result<usize, GeometryError> {
        let line = self.checked_line(offset)?;
        let before: usize = self.lines[..offset.line]
            .iter()
            .map(|l| l.text.chars().count() + 1)
            .sum();
        Ok(before + char_index_at_cell(&line.text, offset.index))
    }

    fn checked_line(&self, offset: RenderOffset) -> Result<&LogicalLine, GeometryError> {
        let line = self
            .lines
            .get(offset.line)
            .ok_or(GeometryError::LineOutOfRange {
                line: offset.line,
                count: self.lines.len(),
            })?;
        let len = line.visible_len();
        if offset.index > len {
            return Err(GeometryError::IndexOutOfRange {
                line: offset.line,
                index: offset.index,
                len,
            });
        }
        Ok(line)
    }
}

/// Rows and last-row length for `text` starting at `initial_column`.
///
/// An empty line occupies one row ending at `initial_column`. Content that
/// fills the last row exactly stays on it: the last-row length can equal
/// `width`.
pub fn physical_line_count(
    text: &str,
    width: usize,
    initial_column: usize,
) -> Result<(usize, usize), GeometryError> {
    physical_line_count_len(text.width(), width, initial_column)
}

/// [`physical_line_count`] for a known visible length.
pub fn physical_line_count_len(
    len: usize,
    width: usize,
    initial_column: usize,
) -> Result<(usize, usize), GeometryError> {
    if width == 0 {
        return Err(GeometryError::ZeroWidth);
    }
    let total = initial_column + len;
    let rows = total.div_ceil(width).max(1);
    Ok((rows, total - (rows - 1) * width))
}

/// Map an absolute point to a render offset.
pub fn point_to_offset(
    anchor: ScreenPoint,
    render: &RenderData,
    point: ScreenPoint,
) -> Result<RenderOffset, GeometryError> {
    let width = render.buffer_width;
    if width == 0 {
        return Err(GeometryError::ZeroWidth);
    }
    let outside = GeometryError::PointOutOfRange {
        x: point.x,
        y: point.y,
    };
    if point.x >= width || point.y < anchor.y {
        return Err(outside);
    }

    let mut top = anchor.y;
    for (i, line) in render.lines.iter().enumerate() {
        let x0 = render.initial_column(anchor, i);
        let len = line.visible_len();
        let (rows, _) = physical_line_count_len(len, width, x0)?;

        if point.y < top + rows {
            let position = (point.y - top) * width + point.x;
            if position < x0 || position - x0 > len {
                return Err(outside);
            }
            return Ok(RenderOffset::new(i, position - x0));
        }

        // End of a flush line: the cursor sits at column 0 of the next row.
        let flush_end = point.y == top + rows && point.x == 0 && x0 + len == rows * width;
        let next_claims = i + 1 < render.lines.len() && render.continuation_width == 0;
        if flush_end && !next_claims {
            return Ok(RenderOffset::new(i, len));
        }

        top += rows;
    }
    Err(outside)
}

/// Map a render offset to an absolute point at `width`.
///
/// Only the lines up to and including the target are wrapped.
pub fn offset_to_point(
    anchor: ScreenPoint,
    width: usize,
    render: &RenderData,
    offset: RenderOffset,
) -> Result<ScreenPoint, GeometryError> {
    if width == 0 {
        return Err(GeometryError::ZeroWidth);
    }
    render.checked_line(offset)?;

    let mut top = anchor.y;
    for (i, line) in render.lines[..offset.line].iter().enumerate() {
        let (rows, _) =
            physical_line_count_len(line.visible_len(), width, render.initial_column(anchor, i))?;
        top += rows;
    }

    let position = render.initial_column(anchor, offset.line) + offset.index;
    Ok(ScreenPoint::new(position % width, top + position / width))
}

/// The cursor point of `render` as a render offset.
pub fn cursor_offset(anchor: ScreenPoint, render: &RenderData) -> Result<RenderOffset, GeometryError> {
    point_to_offset(anchor, render, render.cursor)
}

/// Where the prompt ends, independent of width.
///
/// `end` counts cells from the first column of row `row` (the row the prompt
/// started on) to the end of the prompt, so it includes anything already on
/// that row before the prompt. The anchor at any width follows by wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PromptSpan {
    /// Row the prompt started on.
    pub row: usize,
    /// Cells from the start of `row` to the end of the prompt.
    pub end: usize,
}

impl PromptSpan {
    /// Create a span.
    #[must_use]
    pub const fn new(row: usize, end: usize) -> Self {
        Self { row, end }
    }

    /// Recover the span from the anchor reported for a prompt `prompt_cells`
    /// wide drawn at `width`.
    ///
    /// The prompt started somewhere on its first row, so `end` is the one
    /// value in `prompt_cells..prompt_cells + width` that wraps to
    /// `anchor.x`.
    pub fn from_anchor(
        anchor: ScreenPoint,
        prompt_cells: usize,
        width: usize,
    ) -> Result<Self, GeometryError> {
        if width == 0 {
            return Err(GeometryError::ZeroWidth);
        }
        let wraps = prompt_cells.saturating_sub(anchor.x).div_ceil(width);
        Ok(Self {
            row: anchor.y.saturating_sub(wraps),
            end: anchor.x + wraps * width,
        })
    }

    /// The anchor at `width`.
    pub fn anchor(&self, width: usize) -> Result<ScreenPoint, GeometryError> {
        if width == 0 {
            return Err(GeometryError::ZeroWidth);
        }
        Ok(ScreenPoint::new(self.end % width, self.row + self.end / width))
    }
}

/// Result of remapping a render across a width change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remap {
    /// Anchor at the new width.
    pub anchor: ScreenPoint,
    /// Cursor at the new width.
    pub cursor: ScreenPoint,
    /// The width-independent cursor position both were derived from.
    pub offset: RenderOffset,
}

/// Keep the cursor on the same logical position across a resize.
///
/// The cursor is read at the old width (`render.buffer_width`), converted to
/// a render offset, and placed again at `new_width` relative to the prompt
/// reflowed to that width.
pub fn remap_for_resize(
    prompt: PromptSpan,
    render: &RenderData,
    new_width: usize,
) -> Result<Remap, GeometryError> {
    let anchor = prompt.anchor(render.buffer_width)?;
    let offset = cursor_offset(anchor, render)?;
    let new_anchor = prompt.anchor(new_width)?;
    let cursor = offset_to_point(new_anchor, new_width, render, offset)?;
    Ok(Remap {
        anchor: new_anchor,
        cursor,
        offset,
    })
}

/// Visible cells taken by `text`.
///
/// This is the plain sum of cell widths. A wide character that would
/// straddle the right edge is still counted where it falls; terminals wrap
/// it to the next row early, so a row holding one can end a cell short of
/// what the geometry here reports.
#[must_use]
pub fn display_width(text: &str) -> usize {
    text.width()
}

/// Visible cells before char index `char_index` of `text`.
#[must_use]
pub fn cell_offset(text: &str, char_index: usize) -> usize {
    match text.char_indices().nth(char_index) {
        Some((byte, _)) => text[..byte].width(),
        None => text.width(),
    }
}

/// Char index of the grapheme that covers visible cell `cell` of `text`.
///
/// Cells inside a wide grapheme resolve to its start.
#[must_use]
pub fn char_index_at_cell(text: &str, cell: usize) -> usize {
    let mut cells = 0;
    let mut chars = 0;
    for grapheme in text.graphemes(true) {
        let width = grapheme.width();
        if cells + width > cell {
            return chars;
        }
        cells += width;
        chars += grapheme.chars().count();
    }
    chars
}
