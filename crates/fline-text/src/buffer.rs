#![forbid(unsafe_code)]

//! The edit buffer.
//!
//! [`EditBuffer`] holds the text being edited, a cursor, an optional
//! selection, grouped undo/redo and a kill ring. Positions are char indices.
//!
//! The public edit API takes signed positions so callers can pass whatever
//! they computed; anything outside the buffer is reported as a
//! [`RangeError`] and leaves the buffer untouched. Cursor placement is the
//! exception: [`EditBuffer::set_cursor_position`] clamps.
//!
//! # Example
//! ```
//! use fline_text::buffer::EditBuffer;
//!
//! let mut buf = EditBuffer::new();
//! buf.insert("hello world");
//! buf.replace(0, 5, "howdy").unwrap();
//! assert_eq!(buf.buffer_state(), ("howdy world".to_string(), 5));
//! assert!(buf.delete(6, 10).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;

/// Default characters that separate words in addition to whitespace.
pub const DEFAULT_WORD_DELIMITERS: &str = ";:,.[]{}()/\\|^&*-=+'\"\u{2013}\u{2014}\u{2015}";

/// Default kill ring capacity.
pub const DEFAULT_KILL_RING_SIZE: usize = 10;

/// Which constraint a range argument broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeConstraint {
    /// The value must not be negative.
    NonNegative,
    /// `start + count` must not pass the end of the buffer.
    WithinBuffer,
}

impl fmt::Display for RangeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonNegative => f.write_str("must be >= 0"),
            Self::WithinBuffer => f.write_str("start + count must be <= buffer length"),
        }
    }
}

/// Invalid start/count passed to the edit API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{argument} = {value}: {constraint} (buffer length {len})")]
pub struct RangeError {
    /// Offending argument name.
    pub argument: &'static str,
    /// Its value.
    pub value: isize,
    /// The violated constraint.
    pub constraint: RangeConstraint,
    /// Buffer length at the time of the call.
    pub len: usize,
}

/// Active selection as start and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// First selected char.
    pub start: usize,
    /// Number of selected chars.
    pub len: usize,
}

impl Selection {
    /// Selected char range.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// A single edit for undo/redo.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EditOp {
    Insert { at: usize, text: String },
    Delete { at: usize, text: String },
}

impl EditOp {
    fn inverse(&self) -> Self {
        match self {
            Self::Insert { at, text } => Self::Delete {
                at: *at,
                text: text.clone(),
            },
            Self::Delete { at, text } => Self::Insert {
                at: *at,
                text: text.clone(),
            },
        }
    }
}

/// Edits undone and redone together.
#[derive(Debug, Clone, Default)]
struct EditGroup {
    ops: Vec<EditOp>,
    cursor_before: usize,
}

/// Bounded ring of killed text, newest first.
#[derive(Debug, Clone)]
pub struct KillRing {
    entries: VecDeque<String>,
    capacity: usize,
    /// Entry the last yank or yank-pop inserted.
    index: usize,
}

impl KillRing {
    /// Create a ring holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            index: 0,
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been killed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record killed text as a new entry.
    pub fn push(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(text);
        self.index = 0;
    }

    /// Extend the newest entry, forward kills append and backward kills prepend.
    pub fn merge(&mut self, text: &str, backward: bool) {
        match self.entries.front_mut() {
            Some(front) if backward => front.insert_str(0, text),
            Some(front) => front.push_str(text),
            None => self.push(text.to_string()),
        }
        self.index = 0;
    }

    /// Newest entry.
    #[must_use]
    pub fn top(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    fn rotate(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.index = (self.index + 1) % self.entries.len();
        self.entries.get(self.index).map(String::as_str)
    }
}

/// Text buffer with cursor, selection, undo/redo and kill ring.
#[derive(Debug, Clone)]
pub struct EditBuffer {
    text: String,
    /// Cursor as a char index in `0..=len`.
    cursor: usize,
    /// Fixed end of the selection; the cursor is the moving end.
    anchor: Option<usize>,
    undo_stack: Vec<EditGroup>,
    redo_stack: Vec<EditGroup>,
    /// Edits since the last group boundary.
    open_group: Option<EditGroup>,
    kill_ring: KillRing,
    /// The previous action killed text; the next kill merges.
    kill_chain: bool,
    /// Char range inserted by the last yank.
    last_yank: Option<Range<usize>>,
    word_delimiters: String,
}

impl Default for EditBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EditBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            anchor: None,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            open_group: None,
            kill_ring: KillRing::new(DEFAULT_KILL_RING_SIZE),
            kill_chain: false,
            last_yank: None,
            word_delimiters: DEFAULT_WORD_DELIMITERS.to_string(),
        }
    }

    /// Create a buffer holding `text` with the cursor at the end.
    #[must_use]
    pub fn with_text(text: &str) -> Self {
        let mut buf = Self::new();
        buf.text = text.to_string();
        buf.cursor = buf.len();
        buf
    }

    /// Set the kill ring capacity. Existing entries are dropped.
    pub fn set_kill_ring_size(&mut self, size: usize) {
        self.kill_ring = KillRing::new(size);
    }

    /// Set the characters that separate words besides whitespace.
    pub fn set_word_delimiters(&mut self, delimiters: &str) {
        self.word_delimiters = delimiters.to_string();
    }

    // ====================================================================
    // State
    // ====================================================================

    /// Buffer text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Cursor char index.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Length in chars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text and cursor.
    #[must_use]
    pub fn buffer_state(&self) -> (String, usize) {
        (self.text.clone(), self.cursor)
    }

    /// Active selection, `None` when nothing is selected.
    #[must_use]
    pub fn selection_state(&self) -> Option<Selection> {
        let anchor = self.anchor?;
        if anchor == self.cursor {
            return None;
        }
        let start = anchor.min(self.cursor);
        Some(Selection {
            start,
            len: anchor.max(self.cursor) - start,
        })
    }

    /// Selected text, if any.
    #[must_use]
    pub fn selected_text(&self) -> Option<String> {
        self.selection_state().map(|sel| self.slice(sel.range()))
    }

    /// Text of a char range.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> String {
        self.text
            .chars()
            .skip(range.start)
            .take(range.end.saturating_sub(range.start))
            .collect()
    }

    /// Char at `index`.
    #[must_use]
    pub fn char_at(&self, index: usize) -> Option<char> {
        self.text.chars().nth(index)
    }

    /// The kill ring.
    #[must_use]
    pub fn kill_ring(&self) -> &KillRing {
        &self.kill_ring
    }

    /// Whether there is anything to undo.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty() || self.open_group.as_ref().is_some_and(|g| !g.ops.is_empty())
    }

    /// Whether there is anything to redo.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    // ====================================================================
    // Edit API
    // ====================================================================

    /// Insert text at the cursor, replacing the selection if there is one.
    pub fn insert(&mut self, text: &str) {
        self.delete_selection();
        let at = self.cursor;
        self.apply(EditOp::Insert {
            at,
            text: text.to_string(),
        });
        self.cursor = at + text.chars().count();
    }

    /// Insert one char at the cursor.
    pub fn insert_char(&mut self, ch: char) {
        let mut tmp = [0u8; 4];
        self.insert(ch.encode_utf8(&mut tmp));
    }

    /// Delete `count` chars starting at `start`.
    pub fn delete(&mut self, start: isize, count: isize) -> Result<(), RangeError> {
        let range = self.check_range(start, count)?;
        self.remove_range(range);
        Ok(())
    }

    /// Replace `count` chars at `start` with `text`. The cursor ends after
    /// the replacement.
    pub fn replace(&mut self, start: isize, count: isize, text: &str) -> Result<(), RangeError> {
        let range = self.check_range(start, count)?;
        self.splice(range, text);
        Ok(())
    }

    /// Replace a char range, clamped to the buffer, with `text`. The cursor
    /// ends after the replacement.
    pub fn splice(&mut self, range: Range<usize>, text: &str) {
        let len = self.len();
        let at = range.start.min(len);
        self.remove_range(at..range.end.clamp(at, len));
        if !text.is_empty() {
            self.apply(EditOp::Insert {
                at,
                text: text.to_string(),
            });
        }
        self.cursor = at + text.chars().count();
    }

    /// Delete a char range, clamped to the buffer. Returns `false` if
    /// nothing was removed.
    pub fn remove(&mut self, range: Range<usize>) -> bool {
        let len = self.len();
        let range = range.start.min(len)..range.end.min(len);
        if range.is_empty() {
            return false;
        }
        self.remove_range(range);
        true
    }

    /// Move the cursor, clamping to `[0, len]`. Clears the selection.
    pub fn set_cursor_position(&mut self, position: isize) {
        let len = self.len();
        let clamped = usize::try_from(position).unwrap_or(0).min(len);
        self.anchor = None;
        self.cursor = clamped;
    }

    /// Replace the whole text as one undoable edit; cursor at the end.
    pub fn set_text(&mut self, text: &str) {
        self.anchor = None;
        let len = self.len();
        self.remove_range(0..len);
        self.apply(EditOp::Insert {
            at: 0,
            text: text.to_string(),
        });
        self.cursor = self.len();
    }

    /// Replace the text and forget all history.
    pub fn reset(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.len();
        self.anchor = None;
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.open_group = None;
        self.break_chains();
    }

    fn check_range(&self, start: isize, count: isize) -> Result<Range<usize>, RangeError> {
        let len = self.len();
        let error = |argument, value, constraint| RangeError {
            argument,
            value,
            constraint,
            len,
        };
        let Ok(begin) = usize::try_from(start) else {
            return Err(error("start", start, RangeConstraint::NonNegative));
        };
        let Ok(amount) = usize::try_from(count) else {
            return Err(error("count", count, RangeConstraint::NonNegative));
        };
        if begin > len {
            return Err(error("start", start, RangeConstraint::WithinBuffer));
        }
        if begin + amount > len {
            return Err(error("count", count, RangeConstraint::WithinBuffer));
        }
        Ok(begin..begin + amount)
    }

    /// Delete a known-valid range and fix up the cursor.
    fn remove_range(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let text = self.slice(range.clone());
        self.apply(EditOp::Delete {
            at: range.start,
            text,
        });
        if self.cursor >= range.end {
            self.cursor -= range.len();
        } else if self.cursor > range.start {
            self.cursor = range.start;
        }
        self.anchor = None;
    }

    // ====================================================================
    // Undo / redo
    // ====================================================================

    /// Close the current undo group. The next edit starts a new one.
    pub fn commit_group(&mut self) {
        if let Some(group) = self.open_group.take() {
            if !group.ops.is_empty() {
                self.undo_stack.push(group);
            }
        }
    }

    /// Undo the last group of edits.
    pub fn undo(&mut self) -> bool {
        self.commit_group();
        let Some(group) = self.undo_stack.pop() else {
            return false;
        };
        let cursor_after = self.cursor;
        for op in group.ops.iter().rev() {
            self.apply_raw(&op.inverse());
        }
        tracing::trace!(ops = group.ops.len(), "undo");
        self.cursor = group.cursor_before.min(self.len());
        self.anchor = None;
        self.redo_stack.push(EditGroup {
            ops: group.ops,
            cursor_before: cursor_after,
        });
        true
    }

    /// Redo the last undone group.
    pub fn redo(&mut self) -> bool {
        self.commit_group();
        let Some(group) = self.redo_stack.pop() else {
            return false;
        };
        let cursor_before = self.cursor;
        for op in &group.ops {
            self.apply_raw(op);
        }
        tracing::trace!(ops = group.ops.len(), "redo");
        self.cursor = group.cursor_before.min(self.len());
        self.anchor = None;
        self.undo_stack.push(EditGroup {
            ops: group.ops,
            cursor_before,
        });
        true
    }

    /// Undo everything back to the initial text.
    pub fn revert(&mut self) -> bool {
        let mut any = false;
        while self.undo() {
            any = true;
        }
        self.redo_stack.clear();
        any
    }

    /// Record and apply an edit.
    fn apply(&mut self, op: EditOp) {
        let noop = match &op {
            EditOp::Insert { text, .. } | EditOp::Delete { text, .. } => text.is_empty(),
        };
        if noop {
            return;
        }
        self.apply_raw(&op);
        let cursor = self.cursor;
        self.open_group
            .get_or_insert_with(|| EditGroup {
                ops: Vec::new(),
                cursor_before: cursor,
            })
            .ops
            .push(op);
        self.redo_stack.clear();
    }

    fn apply_raw(&mut self, op: &EditOp) {
        match op {
            EditOp::Insert { at, text } => {
                let byte = self.byte_index(*at);
                self.text.insert_str(byte, text);
            }
            EditOp::Delete { at, text } => {
                let start = self.byte_index(*at);
                self.text.replace_range(start..start + text.len(), "");
            }
        }
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_index)
            .map_or(self.text.len(), |(byte, _)| byte)
    }

    // ====================================================================
    // Cursor movement
    // ====================================================================

    /// Start of the grapheme before `pos`.
    #[must_use]
    pub fn prev_grapheme(&self, pos: usize) -> usize {
        self.graphemes_before(pos, 1)
    }

    /// End of the grapheme at `pos`.
    #[must_use]
    pub fn next_grapheme(&self, pos: usize) -> usize {
        self.graphemes_after(pos, 1)
    }

    /// Position `count` graphemes before `pos`, stopping at 0.
    #[must_use]
    pub fn graphemes_before(&self, pos: usize, count: usize) -> usize {
        if count == 0 {
            return pos.min(self.len());
        }
        let mut starts = Vec::new();
        let mut chars = 0;
        for grapheme in self.text.graphemes(true) {
            if chars >= pos {
                break;
            }
            starts.push(chars);
            chars += grapheme.chars().count();
        }
        starts
            .len()
            .checked_sub(count)
            .map_or(0, |index| starts[index])
    }

    /// Position `count` graphemes after `pos`, stopping at the end.
    #[must_use]
    pub fn graphemes_after(&self, pos: usize, count: usize) -> usize {
        let mut remaining = count;
        let mut chars = 0;
        for grapheme in self.text.graphemes(true) {
            if remaining == 0 && chars >= pos {
                return chars;
            }
            chars += grapheme.chars().count();
            if chars > pos {
                remaining = remaining.saturating_sub(1);
            }
        }
        chars
    }

    /// Move the cursor to `pos` (clamped), clearing the selection.
    pub fn move_to(&mut self, pos: usize) {
        self.anchor = None;
        self.cursor = pos.min(self.len());
    }

    /// Move the cursor to `pos` (clamped), extending the selection.
    pub fn select_to(&mut self, pos: usize) {
        if self.anchor.is_none() {
            self.anchor = Some(self.cursor);
        }
        self.cursor = pos.min(self.len());
    }

    /// Select the whole buffer.
    pub fn select_all(&mut self) {
        self.anchor = Some(0);
        self.cursor = self.len();
    }

    /// Drop the selection, keeping the cursor.
    pub fn clear_selection(&mut self) {
        self.anchor = None;
    }

    /// Delete the selection. Returns `true` if something was selected.
    pub fn delete_selection(&mut self) -> bool {
        match self.selection_state() {
            Some(sel) => {
                self.remove_range(sel.range());
                self.cursor = sel.start;
                true
            }
            None => {
                self.anchor = None;
                false
            }
        }
    }

    // ====================================================================
    // Words
    // ====================================================================

    fn is_word_char(&self, ch: char) -> bool {
        !ch.is_whitespace() && !self.word_delimiters.contains(ch)
    }

    /// Start of the next word after `pos`, or the end of the buffer.
    #[must_use]
    pub fn next_word_start(&self, pos: usize) -> usize {
        self.word_steps(pos, 1, WordMotion::NextStart)
    }

    /// End of the word at or after `pos`.
    #[must_use]
    pub fn next_word_end(&self, pos: usize) -> usize {
        self.word_steps(pos, 1, WordMotion::NextEnd)
    }

    /// Start of the word before `pos`.
    #[must_use]
    pub fn prev_word_start(&self, pos: usize) -> usize {
        self.word_steps(pos, 1, WordMotion::PrevStart)
    }

    /// Start of the whitespace-delimited token before `pos`, skipping
    /// whitespace directly before `pos` first.
    #[must_use]
    pub fn token_start(&self, pos: usize) -> usize {
        self.word_steps(pos, 1, WordMotion::TokenStart)
    }

    /// Apply `motion` `count` times from `pos`, stopping early once it can
    /// go no further.
    #[must_use]
    pub fn word_steps(&self, pos: usize, count: usize, motion: WordMotion) -> usize {
        let chars: Vec<char> = self.text.chars().collect();
        let mut i = pos.min(chars.len());
        for _ in 0..count {
            let next = match motion {
                WordMotion::NextStart => {
                    let mut j = i;
                    while j < chars.len() && self.is_word_char(chars[j]) {
                        j += 1;
                    }
                    while j < chars.len() && !self.is_word_char(chars[j]) {
                        j += 1;
                    }
                    j
                }
                WordMotion::NextEnd => {
                    let mut j = i;
                    while j < chars.len() && !self.is_word_char(chars[j]) {
                        j += 1;
                    }
                    while j < chars.len() && self.is_word_char(chars[j]) {
                        j += 1;
                    }
                    j
                }
                WordMotion::PrevStart => {
                    let mut j = i;
                    while j > 0 && !self.is_word_char(chars[j - 1]) {
                        j -= 1;
                    }
                    while j > 0 && self.is_word_char(chars[j - 1]) {
                        j -= 1;
                    }
                    j
                }
                WordMotion::TokenStart => {
                    let mut j = i;
                    while j > 0 && chars[j - 1].is_whitespace() {
                        j -= 1;
                    }
                    while j > 0 && !chars[j - 1].is_whitespace() {
                        j -= 1;
                    }
                    j
                }
            };
            if next == i {
                break;
            }
            i = next;
        }
        i
    }

    /// Apply a case mapping from the cursor to the end of the next word.
    pub fn map_word_case(&mut self, case: WordCase) -> bool {
        let start = self.cursor;
        let end = self.next_word_end(start);
        if end == start {
            return false;
        }
        let original = self.slice(start..end);
        let mapped = case.apply(&original, |c| self.is_word_char(c));
        if mapped != original {
            self.remove_range(start..end);
            self.apply(EditOp::Insert { at: start, text: mapped });
        }
        self.cursor = end;
        true
    }

    /// Swap the two chars around the cursor and move forward.
    ///
    /// At the end of the buffer the last two chars are swapped instead.
    pub fn swap_chars(&mut self) -> bool {
        self.swap_chars_times(1)
    }

    /// [`swap_chars`](Self::swap_chars) `count` times: the char before the
    /// cursor is dragged forward, and once the end is reached the last two
    /// chars swap back and forth.
    pub fn swap_chars_times(&mut self, count: usize) -> bool {
        let len = self.len();
        if len < 2 || self.cursor == 0 || count == 0 {
            return false;
        }
        let mut remaining = count;
        if self.cursor < len {
            let steps = remaining.min(len - self.cursor);
            let from = self.cursor - 1;
            let span = self.slice(from..self.cursor + steps);
            let mut chars = span.chars();
            let dragged = chars.next().map(String::from).unwrap_or_default();
            let moved: String = chars.as_str().to_string() + &dragged;
            self.remove_range(from..from + steps + 1);
            self.apply(EditOp::Insert {
                at: from,
                text: moved,
            });
            self.cursor = from + steps + 1;
            remaining -= steps;
        }
        if remaining % 2 == 1 {
            let pair = self.slice(len - 2..len);
            let swapped: String = pair.chars().rev().collect();
            self.remove_range(len - 2..len);
            self.apply(EditOp::Insert {
                at: len - 2,
                text: swapped,
            });
        }
        if remaining > 0 {
            self.cursor = len;
        }
        true
    }

    // ====================================================================
    // Kill ring
    // ====================================================================

    /// Delete `range` into the kill ring. Consecutive kills merge into one
    /// entry; `backward` kills prepend.
    pub fn kill(&mut self, range: Range<usize>, backward: bool) -> bool {
        let range = range.start.min(self.len())..range.end.min(self.len());
        if range.is_empty() {
            return false;
        }
        let text = self.slice(range.clone());
        if self.kill_chain {
            self.kill_ring.merge(&text, backward);
        } else {
            self.kill_ring.push(text);
        }
        self.remove_range(range);
        self.kill_chain = true;
        self.last_yank = None;
        true
    }

    /// Insert the newest kill at the cursor.
    pub fn yank(&mut self) -> bool {
        let Some(text) = self.kill_ring.top().map(str::to_string) else {
            return false;
        };
        self.kill_ring.index = 0;
        self.kill_chain = false;
        let start = self.cursor;
        self.insert(&text);
        self.last_yank = Some(start..self.cursor);
        true
    }

    /// Insert the newest kill `count` times. A following yank-pop replaces
    /// only the last copy.
    pub fn yank_times(&mut self, count: usize) -> bool {
        let Some(text) = self.kill_ring.top().map(str::to_string) else {
            return false;
        };
        if count > 1 {
            self.kill_chain = false;
            self.insert(&text.repeat(count - 1));
        }
        self.yank()
    }

    /// Replace the text inserted by the last yank with the next older kill.
    pub fn yank_pop(&mut self) -> bool {
        let Some(range) = self.last_yank.clone() else {
            return false;
        };
        let Some(text) = self.kill_ring.rotate().map(str::to_string) else {
            return false;
        };
        self.remove_range(range.clone());
        self.cursor = range.start;
        self.insert(&text);
        self.last_yank = Some(range.start..self.cursor);
        true
    }

    /// Forget kill and yank continuity. Called between unrelated actions.
    pub fn break_chains(&mut self) {
        self.kill_chain = false;
        self.last_yank = None;
    }

    // ====================================================================
    // Logical lines
    // ====================================================================

    /// Number of logical lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    /// Logical line index containing `pos`.
    #[must_use]
    pub fn line_index(&self, pos: usize) -> usize {
        self.text.chars().take(pos).filter(|&c| c == '\n').count()
    }

    /// Start of the logical line containing `pos`.
    #[must_use]
    pub fn line_start(&self, pos: usize) -> usize {
        let (pos, byte) = self.clamped_index(pos);
        match self.text[..byte].rfind('\n') {
            Some(newline) => pos - self.text[newline + 1..byte].chars().count(),
            None => 0,
        }
    }

    /// End (before the newline) of the logical line containing `pos`.
    #[must_use]
    pub fn line_end(&self, pos: usize) -> usize {
        let (pos, byte) = self.clamped_index(pos);
        let rest = &self.text[byte..];
        let line = rest.find('\n').map_or(rest, |newline| &rest[..newline]);
        pos + line.chars().count()
    }

    /// `pos` clamped to the buffer, with its byte offset.
    fn clamped_index(&self, pos: usize) -> (usize, usize) {
        match self.text.char_indices().nth(pos) {
            Some((byte, _)) => (pos, byte),
            None => (self.len(), self.text.len()),
        }
    }

    /// Column of `pos` within its logical line.
    #[must_use]
    pub fn column(&self, pos: usize) -> usize {
        pos.min(self.len()) - self.line_start(pos)
    }

    /// Char range of logical line `index`, excluding the newline.
    #[must_use]
    pub fn line_range(&self, index: usize) -> Option<Range<usize>> {
        let mut start = 0;
        for (i, line) in self.text.split('\n').enumerate() {
            let len = line.chars().count();
            if i == index {
                return Some(start..start + len);
            }
            start += len + 1;
        }
        None
    }
}

/// Word boundaries for [`EditBuffer::word_steps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordMotion {
    /// Start of the next word.
    NextStart,
    /// End of the current or next word.
    NextEnd,
    /// Start of the current or previous word.
    PrevStart,
    /// Start of the whitespace-delimited token before the position.
    TokenStart,
}

/// Case mappings for [`EditBuffer::map_word_case`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordCase {
    /// All upper case.
    Upper,
    /// All lower case.
    Lower,
    /// First word char upper, rest lower.
    Capitalize,
}

impl WordCase {
    fn apply(self, text: &str, is_word_char: impl Fn(char) -> bool) -> String {
        match self {
            Self::Upper => text.to_uppercase(),
            Self::Lower => text.to_lowercase(),
            Self::Capitalize => {
                let mut seen_word = false;
                let mut out = String::with_capacity(text.len());
                for ch in text.chars() {
                    if is_word_char(ch) && !seen_word {
                        seen_word = true;
                        out.extend(ch.to_uppercase());
                    } else {
                        out.extend(ch.to_lowercase());
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unchanged_after(buf: &mut EditBuffer, f: impl FnOnce(&mut EditBuffer) -> Result<(), RangeError>) {
        let before = buf.buffer_state();
        assert!(f(buf).is_err());
        assert_eq!(buf.buffer_state(), before);
    }

    #[test]
    fn new_buffer_is_empty() {
        let buf = EditBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.buffer_state(), (String::new(), 0));
        assert_eq!(buf.selection_state(), None);
    }

    #[test]
    fn insert_advances_cursor() {
        let mut buf = EditBuffer::new();
        buf.insert("ab");
        buf.insert_char('c');
        assert_eq!(buf.buffer_state(), ("abc".to_string(), 3));
    }

    #[test]
    fn insert_in_middle() {
        let mut buf = EditBuffer::with_text("helo");
        buf.set_cursor_position(3);
        buf.insert_char('l');
        assert_eq!(buf.buffer_state(), ("hello".to_string(), 4));
    }

    #[test]
    fn replace_range_errors_leave_buffer_unchanged() {
        let mut buf = EditBuffer::with_text("abcd");
        unchanged_after(&mut buf, |b| b.replace(-1, 6, "zzz"));
        unchanged_after(&mut buf, |b| b.replace(11, 6, "zzz"));
        unchanged_after(&mut buf, |b| b.replace(0, 12, "zzz"));
        unchanged_after(&mut buf, |b| b.replace(0, -1, "zzz"));
    }

    #[test]
    fn range_errors_name_the_argument() {
        let mut buf = EditBuffer::with_text("abcd");
        let err = buf.delete(-1, 1).unwrap_err();
        assert_eq!(err.argument, "start");
        assert_eq!(err.constraint, RangeConstraint::NonNegative);
        let err = buf.delete(0, -2).unwrap_err();
        assert_eq!(err.argument, "count");
        assert_eq!(err.value, -2);
        let err = buf.delete(2, 3).unwrap_err();
        assert_eq!(err.argument, "count");
        assert_eq!(err.constraint, RangeConstraint::WithinBuffer);
        assert_eq!(err.len, 4);
        let err = buf.delete(5, 0).unwrap_err();
        assert_eq!(err.argument, "start");
        assert!(err.to_string().contains("buffer length 4"));
    }

    #[test]
    fn delete_adjusts_cursor() {
        let mut buf = EditBuffer::with_text("abcdef");
        buf.delete(1, 2).unwrap();
        assert_eq!(buf.buffer_state(), ("adef".to_string(), 4));
        buf.set_cursor_position(2);
        buf.delete(1, 2).unwrap();
        assert_eq!(buf.buffer_state(), ("af".to_string(), 1));
    }

    #[test]
    fn replace_puts_cursor_after_text() {
        let mut buf = EditBuffer::with_text("abcd");
        buf.replace(1, 2, "xyz").unwrap();
        assert_eq!(buf.buffer_state(), ("axyzd".to_string(), 4));
        buf.replace(5, 0, "!").unwrap();
        assert_eq!(buf.buffer_state(), ("axyzd!".to_string(), 6));
    }

    #[test]
    fn cursor_position_clamps() {
        let mut buf = EditBuffer::with_text("abc");
        buf.set_cursor_position(-5);
        assert_eq!(buf.cursor(), 0);
        buf.set_cursor_position(99);
        assert_eq!(buf.cursor(), 3);
    }

    #[test]
    fn selection_start_and_length() {
        let mut buf = EditBuffer::with_text("hello world");
        buf.select_to(6);
        assert_eq!(buf.selection_state(), Some(Selection { start: 6, len: 5 }));
        assert_eq!(buf.selected_text().as_deref(), Some("world"));
        buf.insert("there");
        assert_eq!(buf.text(), "hello there");
        assert_eq!(buf.selection_state(), None);
    }

    #[test]
    fn undo_redo_groups() {
        let mut buf = EditBuffer::new();
        buf.insert("a");
        buf.insert("b");
        buf.commit_group();
        buf.insert("c");
        buf.commit_group();
        assert!(buf.undo());
        assert_eq!(buf.buffer_state(), ("ab".to_string(), 2));
        assert!(buf.undo());
        assert_eq!(buf.buffer_state(), (String::new(), 0));
        assert!(!buf.undo());
        assert!(buf.redo());
        assert_eq!(buf.buffer_state(), ("ab".to_string(), 2));
        assert!(buf.redo());
        assert_eq!(buf.text(), "abc");
        assert!(!buf.redo());
    }

    #[test]
    fn new_edit_clears_redo() {
        let mut buf = EditBuffer::new();
        buf.insert("a");
        buf.commit_group();
        buf.undo();
        buf.insert("b");
        assert!(!buf.can_redo());
    }

    #[test]
    fn revert_restores_initial_text() {
        let mut buf = EditBuffer::with_text("base");
        buf.insert(" one");
        buf.commit_group();
        buf.replace(0, 4, "BASE").unwrap();
        buf.commit_group();
        assert!(buf.revert());
        assert_eq!(buf.text(), "base");
    }

    #[test]
    fn word_boundaries_respect_delimiters() {
        let buf = EditBuffer::with_text("foo.bar  baz");
        assert_eq!(buf.next_word_start(0), 4);
        assert_eq!(buf.next_word_start(4), 9);
        assert_eq!(buf.next_word_end(3), 7);
        assert_eq!(buf.prev_word_start(12), 9);
        assert_eq!(buf.prev_word_start(9), 4);
        assert_eq!(buf.token_start(12), 9);
        assert_eq!(buf.token_start(9), 0);
    }

    #[test]
    fn custom_delimiters() {
        let mut buf = EditBuffer::with_text("a.b");
        buf.set_word_delimiters("");
        assert_eq!(buf.next_word_end(0), 3);
    }

    #[test]
    fn case_operations() {
        let mut buf = EditBuffer::with_text("hello WORLD");
        buf.set_cursor_position(0);
        assert!(buf.map_word_case(WordCase::Upper));
        assert_eq!(buf.buffer_state(), ("HELLO WORLD".to_string(), 5));
        assert!(buf.map_word_case(WordCase::Capitalize));
        assert_eq!(buf.buffer_state(), ("HELLO World".to_string(), 11));
        buf.set_cursor_position(0);
        buf.map_word_case(WordCase::Lower);
        assert_eq!(buf.text(), "hello World");
    }

    #[test]
    fn swap_chars_mid_and_end() {
        let mut buf = EditBuffer::with_text("abcd");
        buf.set_cursor_position(1);
        assert!(buf.swap_chars());
        assert_eq!(buf.buffer_state(), ("bacd".to_string(), 2));
        buf.set_cursor_position(4);
        assert!(buf.swap_chars());
        assert_eq!(buf.buffer_state(), ("badc".to_string(), 4));
    }

    #[test]
    fn kills_merge_and_yank() {
        let mut buf = EditBuffer::with_text("one two three");
        buf.kill(8..13, false);
        buf.kill(4..8, true);
        assert_eq!(buf.text(), "one ");
        assert_eq!(buf.kill_ring().top(), Some("two three"));
        assert_eq!(buf.kill_ring().len(), 1);

        buf.break_chains();
        buf.kill(0..4, true);
        assert_eq!(buf.kill_ring().len(), 2);
        assert!(buf.yank());
        assert_eq!(buf.text(), "one ");
        assert!(buf.yank_pop());
        assert_eq!(buf.buffer_state(), ("two three".to_string(), 9));
        assert!(buf.yank_pop());
        assert_eq!(buf.text(), "one ");
    }

    #[test]
    fn yank_pop_requires_yank() {
        let mut buf = EditBuffer::with_text("x");
        buf.kill(0..1, false);
        assert!(!buf.yank_pop());
    }

    #[test]
    fn kill_ring_is_bounded() {
        let mut ring = KillRing::new(2);
        ring.push("a".into());
        ring.push("b".into());
        ring.push("c".into());
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.top(), Some("c"));
    }

    #[test]
    fn logical_line_helpers() {
        let buf = EditBuffer::with_text("ab\ncde\n");
        assert_eq!(buf.line_count(), 3);
        assert_eq!(buf.line_index(4), 1);
        assert_eq!(buf.line_start(4), 3);
        assert_eq!(buf.line_end(4), 6);
        assert_eq!(buf.column(5), 2);
        assert_eq!(buf.line_range(1), Some(3..6));
        assert_eq!(buf.line_range(2), Some(7..7));
        assert_eq!(buf.line_range(3), None);
    }

    #[test]
    fn grapheme_steps() {
        let buf = EditBuffer::with_text("ae\u{301}b");
        assert_eq!(buf.next_grapheme(1), 3);
        assert_eq!(buf.prev_grapheme(3), 1);
        assert_eq!(buf.prev_grapheme(0), 0);
        assert_eq!(buf.next_grapheme(4), 4);
    }

    #[test]
    fn counted_grapheme_steps_stop_at_the_ends() {
        let buf = EditBuffer::with_text("ae\u{301}bc");
        assert_eq!(buf.graphemes_after(0, 2), 3);
        assert_eq!(buf.graphemes_after(0, 1_000_000), 5);
        assert_eq!(buf.graphemes_before(5, 2), 3);
        assert_eq!(buf.graphemes_before(5, 3), 1);
        assert_eq!(buf.graphemes_before(5, 1_000_000), 0);
        assert_eq!(buf.graphemes_before(3, 0), 3);
    }

    #[test]
    fn counted_word_steps() {
        let buf = EditBuffer::with_text("one two three four");
        assert_eq!(buf.word_steps(0, 2, WordMotion::NextStart), 8);
        assert_eq!(buf.word_steps(0, 3, WordMotion::NextEnd), 13);
        assert_eq!(buf.word_steps(18, 2, WordMotion::PrevStart), 8);
        assert_eq!(buf.word_steps(0, 1_000_000, WordMotion::NextStart), 18);
        assert_eq!(buf.word_steps(18, 1_000_000, WordMotion::TokenStart), 0);
    }

    #[test]
    fn swap_chars_times_drags_then_toggles() {
        let mut buf = EditBuffer::with_text("abcd");
        buf.set_cursor_position(1);
        assert!(buf.swap_chars_times(2));
        assert_eq!(buf.buffer_state(), ("bcad".to_string(), 3));

        // Dragged to the end, then one more swap of the last two.
        let mut buf = EditBuffer::with_text("abcd");
        buf.set_cursor_position(1);
        assert!(buf.swap_chars_times(4));
        assert_eq!(buf.buffer_state(), ("bcad".to_string(), 4));

        let mut buf = EditBuffer::with_text("abcd");
        buf.set_cursor_position(1);
        assert!(buf.swap_chars_times(1_000_001));
        assert_eq!(buf.buffer_state(), ("bcda".to_string(), 4));
    }

    #[test]
    fn yank_times_repeats_the_newest_kill() {
        let mut buf = EditBuffer::with_text("ab");
        buf.kill(0..2, false);
        assert!(buf.yank_times(3));
        assert_eq!(buf.buffer_state(), ("ababab".to_string(), 6));
        assert!(!EditBuffer::new().yank_times(3));
    }

    #[test]
    fn line_helpers_with_multibyte_text() {
        let buf = EditBuffer::with_text("é日\nxé");
        assert_eq!(buf.line_start(4), 3);
        assert_eq!(buf.line_end(1), 2);
        assert_eq!(buf.line_end(3), 5);
        assert_eq!(buf.line_start(99), 3);
        assert_eq!(buf.line_end(99), 5);
    }

    #[test]
    #[tracing_test::traced_test]
    fn undo_is_traced() {
        let mut buf = EditBuffer::new();
        buf.insert("ab");
        buf.commit_group();
        assert!(buf.undo());
        assert!(logs_contain("undo"));
    }
}
