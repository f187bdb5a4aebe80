#![forbid(unsafe_code)]

//! Capability ports the session talks to, plus in-memory doubles.
//!
//! The session owns no terminal, clipboard, history store or completion
//! engine itself. Each is a small trait injected at construction; the
//! `Memory*` types here are the defaults and the test doubles.

use std::collections::VecDeque;
use std::io;
use std::ops::Range;
use std::sync::mpsc::Sender;

use fline_text::buffer::Selection;
use fline_text::geometry::{RenderData, ScreenPoint};

use crate::options::BellStyle;
use crate::prediction::{PredictionReply, PredictionToken};

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// Everything the console needs to draw the edited text once.
#[derive(Debug, Clone)]
pub struct RenderFrame<'a> {
    /// Screen point right after the prompt.
    pub anchor: ScreenPoint,
    /// Logical lines and the width they were laid out for.
    pub render: &'a RenderData,
    /// Classifier output for the current text.
    pub spans: &'a [StyledSpan],
    /// Text drawn before each continuation line.
    pub continuation_prompt: &'a str,
    /// Remainder of the top suggestion, drawn after the text.
    pub suggestion: Option<&'a str>,
    /// Active selection, in chars.
    pub selection: Option<Selection>,
    /// Rows the previous frame covered; the console clears leftovers.
    pub previous_rows: usize,
}

/// Terminal output.
pub trait Console {
    /// Current buffer width in cells.
    fn buffer_width(&self) -> usize;

    /// Write the prompt and return the point where input starts.
    fn begin(&mut self, prompt: &str) -> io::Result<ScreenPoint>;

    /// Draw a frame.
    fn render(&mut self, frame: &RenderFrame<'_>) -> io::Result<()>;

    /// Place the cursor.
    fn set_cursor(&mut self, point: ScreenPoint) -> io::Result<()>;

    /// Notify the user that input was rejected.
    fn ding(&mut self, style: BellStyle) -> io::Result<()>;

    /// Move below the edited text once the line is finished.
    fn finish(&mut self, rows: usize) -> io::Result<()>;
}

/// Console double that records what the session asked for.
#[derive(Debug, Clone)]
pub struct MemoryConsole {
    /// Reported buffer width.
    pub width: usize,
    /// Row the prompt is written on.
    pub row: usize,
    /// Column the prompt starts at, for output left on the row before it.
    pub column: usize,
    /// Prompts written so far.
    pub prompts: Vec<String>,
    /// Text of each rendered frame, logical lines joined with `\n`.
    pub frames: Vec<String>,
    /// Suggestion shown with each frame.
    pub suggestions: Vec<Option<String>>,
    /// Last cursor placement.
    pub cursor: Option<ScreenPoint>,
    /// Dings received.
    pub dings: usize,
    /// Calls to `finish`.
    pub finished: usize,
}

impl MemoryConsole {
    /// A console of the given width with the prompt on row 0.
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            width,
            row: 0,
            column: 0,
            prompts: Vec::new(),
            frames: Vec::new(),
            suggestions: Vec::new(),
            cursor: None,
            dings: 0,
            finished: 0,
        }
    }

    /// The most recent frame text.
    #[must_use]
    pub fn last_frame(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }
}

impl Console for MemoryConsole {
    fn buffer_width(&self) -> usize {
        self.width
    }

    fn begin(&mut self, prompt: &str) -> io::Result<ScreenPoint> {
        self.prompts.push(prompt.to_string());
        let width = self.width.max(1);
        let cells = self.column + fline_text::geometry::display_width(prompt);
        Ok(ScreenPoint::new(cells % width, self.row + cells / width))
    }

    fn render(&mut self, frame: &RenderFrame<'_>) -> io::Result<()> {
        let text = frame
            .render
            .lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.frames.push(text);
        self.suggestions.push(frame.suggestion.map(str::to_string));
        Ok(())
    }

    fn set_cursor(&mut self, point: ScreenPoint) -> io::Result<()> {
        self.cursor = Some(point);
        Ok(())
    }

    fn ding(&mut self, style: BellStyle) -> io::Result<()> {
        if style != BellStyle::None {
            self.dings += 1;
        }
        Ok(())
    }

    fn finish(&mut self, _rows: usize) -> io::Result<()> {
        self.finished += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Clipboard
// ---------------------------------------------------------------------------

/// System clipboard.
pub trait Clipboard {
    /// Current clipboard text.
    fn get_text(&self) -> String;
    /// Replace the clipboard text.
    fn set_text(&mut self, text: &str);
}

/// Clipboard held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    text: String,
}

impl MemoryClipboard {
    /// A clipboard holding `text`.
    #[must_use]
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl Clipboard for MemoryClipboard {
    fn get_text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Accepted-line store. Deduplication and size limits belong to the store.
pub trait History {
    /// Record an accepted line.
    fn append(&mut self, line: &str);
    /// Every entry, oldest first.
    fn all(&self) -> Vec<String>;
}

/// History kept in memory, optionally bounded.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    entries: VecDeque<String>,
    capacity: Option<usize>,
}

impl MemoryHistory {
    /// Unbounded history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// History that keeps at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: Some(capacity),
        }
    }

    /// History pre-filled with `lines`, oldest first.
    #[must_use]
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: lines.into_iter().map(Into::into).collect(),
            capacity: None,
        }
    }
}

impl History for MemoryHistory {
    fn append(&mut self, line: &str) {
        self.entries.push_back(line.to_string());
        if let Some(capacity) = self.capacity {
            while self.entries.len() > capacity {
                self.entries.pop_front();
            }
        }
    }

    fn all(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Display category of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TokenCategory {
    /// Plain text.
    #[default]
    Default,
    /// Command name.
    Command,
    /// Parameter or flag.
    Parameter,
    /// Quoted string.
    String,
    /// Numeric literal.
    Number,
    /// Variable reference.
    Variable,
    /// Operator.
    Operator,
    /// Reserved word.
    Keyword,
    /// Comment.
    Comment,
    /// Parse error.
    Error,
}

/// A classified char range of the buffer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    /// Char range.
    pub range: Range<usize>,
    /// Display category.
    pub category: TokenCategory,
}

/// Source of display categories for the buffer text.
pub trait Classifier {
    /// Classify `text`. Spans are ordered and non-overlapping.
    fn classify(&self, text: &str) -> Vec<StyledSpan>;
}

/// Classifier that returns no spans.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainClassifier;

impl Classifier for PlainClassifier {
    fn classify(&self, _text: &str) -> Vec<StyledSpan> {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Completer
// ---------------------------------------------------------------------------

/// Candidates for the text around the cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completions {
    /// Char range the candidates replace.
    pub replace: Range<usize>,
    /// Candidates in display order.
    pub candidates: Vec<String>,
}

/// Tab completion.
pub trait Completer {
    /// Complete `text` at char index `cursor`.
    fn complete(&mut self, text: &str, cursor: usize) -> Completions;
}

/// Completer that never has candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompletion;

impl Completer for NoCompletion {
    fn complete(&mut self, _text: &str, cursor: usize) -> Completions {
        Completions {
            replace: cursor..cursor,
            candidates: Vec::new(),
        }
    }
}

/// Completes the whitespace-delimited word before the cursor from a fixed
/// word list.
#[derive(Debug, Clone, Default)]
pub struct WordListCompleter {
    words: Vec<String>,
}

impl WordListCompleter {
    /// A completer over `words`.
    #[must_use]
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }
}

impl Completer for WordListCompleter {
    fn complete(&mut self, text: &str, cursor: usize) -> Completions {
        let before: Vec<char> = text.chars().take(cursor).collect();
        let start = before
            .iter()
            .rposition(|c| c.is_whitespace())
            .map_or(0, |i| i + 1);
        let prefix: String = before[start..].iter().collect();
        let candidates = self
            .words
            .iter()
            .filter(|word| word.starts_with(&prefix))
            .cloned()
            .collect();
        Completions {
            replace: start..before.len(),
            candidates,
        }
    }
}

// ---------------------------------------------------------------------------
// Predictor
// ---------------------------------------------------------------------------

/// Background suggestion source.
///
/// `predict` must not block. The reply goes back over `reply`, from any
/// thread, tagged with `token`; the session drops replies whose token is not
/// the newest it issued.
pub trait Predictor {
    /// Request suggestions for `text`.
    fn predict(&mut self, text: &str, token: PredictionToken, reply: Sender<PredictionReply>);
}

/// Predictor that answers immediately from history, newest match first.
#[derive(Debug, Clone, Default)]
pub struct HistoryPredictor {
    lines: Vec<String>,
}

impl HistoryPredictor {
    /// A predictor over `lines`, oldest first.
    #[must_use]
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl Predictor for HistoryPredictor {
    fn predict(&mut self, text: &str, token: PredictionToken, reply: Sender<PredictionReply>) {
        let suggestions = if text.is_empty() {
            Vec::new()
        } else {
            self.lines
                .iter()
                .rev()
                .filter(|line| line.len() > text.len() && line.starts_with(text))
                .cloned()
                .collect()
        };
        // The session may already be gone.
        let _ = reply.send(PredictionReply { token, suggestions });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn bounded_history_drops_oldest() {
        let mut history = MemoryHistory::with_capacity(2);
        history.append("a");
        history.append("b");
        history.append("c");
        assert_eq!(history.all(), vec!["b", "c"]);
    }

    #[test]
    fn word_list_completes_last_token() {
        let mut completer = WordListCompleter::new(["git", "grep", "ls"]);
        let completions = completer.complete("sudo g", 6);
        assert_eq!(completions.replace, 5..6);
        assert_eq!(completions.candidates, vec!["git", "grep"]);
    }

    #[test]
    fn history_predictor_prefers_newest() {
        let (tx, rx) = mpsc::channel();
        let mut predictor = HistoryPredictor::new(["git status", "ls", "git stash"]);
        predictor.predict("git st", PredictionToken::new(3), tx);
        let reply = rx.recv().unwrap();
        assert_eq!(reply.token, PredictionToken::new(3));
        assert_eq!(reply.suggestions, vec!["git stash", "git status"]);
    }

    #[test]
    fn memory_console_anchor_wraps_long_prompt() {
        let mut console = MemoryConsole::new(4);
        assert_eq!(console.begin("abcdef").unwrap(), ScreenPoint::new(2, 1));
        console.column = 3;
        assert_eq!(console.begin("ab").unwrap(), ScreenPoint::new(1, 1));
        console.ding(BellStyle::None).unwrap();
        console.ding(BellStyle::Visual).unwrap();
        assert_eq!(console.dings, 1);
    }
}
