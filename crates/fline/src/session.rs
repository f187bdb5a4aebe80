#![forbid(unsafe_code)]

//! The edit session: the read loop and everything it drives.
//!
//! # State machine
//!
//! ```text
//! AwaitingInput ──chord──► Dispatching ──► Rendering ──► AwaitingInput
//!                               │
//!                               ├──accept──► Accepted(text)
//!                               └──cancel──► Cancelled
//! ```
//!
//! Each chord goes through, in order:
//!
//! 1. the digit argument (unless a multi-chord sequence is in progress)
//! 2. the chord resolver of the active key map
//! 3. the action, repeated or reversed by the argument
//! 4. a redraw through the render geometry
//!
//! Unbound chords ding and are dropped. On resize the cursor point is mapped
//! to a width-independent offset at the old width and back to a point at the
//! new width.
//!
//! # Determinism
//!
//! [`handle_raw`](EditSession::handle_raw), [`tick`](EditSession::tick),
//! [`handle_chord`](EditSession::handle_chord) and
//! [`handle_resize`](EditSession::handle_resize) take explicit inputs and
//! times, so tests can step the session without a terminal or a clock.
//! [`read_line`](EditSession::read_line) is the same loop driven by an
//! [`InputSource`].

use std::time::{Duration, Instant};

use fline_core::binding::{ChordResolver, Resolution};
use fline_core::decoder::InputDecoder;
use fline_core::descriptor;
use fline_core::digit_argument::{ArgumentKey, DigitArgument};
use fline_core::key::{KeyChord, KeyCode, RawUnit};
use fline_text::buffer::{EditBuffer, WordCase, WordMotion};
use fline_text::geometry::{self, PromptSpan, RenderData, ScreenPoint};
use tracing::{debug, info, trace};

use crate::action::EditAction;
use crate::input::{InputEvent, InputPoll, InputSource};
use crate::keymap::{KeyMapKind, KeyMaps};
use crate::options::{EditMode, EditOptions};
use crate::ports::{
    Classifier, Clipboard, Completer, Console, History, MemoryClipboard, MemoryHistory,
    NoCompletion, PlainClassifier, Predictor, RenderFrame,
};
use crate::prediction::PredictionCoordinator;
use crate::{Result, SessionError};

/// How often the read loop checks for prediction replies while one is due.
const PREDICTION_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Most chars a single repeated insert may add.
const MAX_REPEATED_CHARS: usize = 1_000_000;

// ---------------------------------------------------------------------------
// States and outcomes
// ---------------------------------------------------------------------------

/// Where the session is in its loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next chord.
    AwaitingInput,
    /// Running an action.
    Dispatching,
    /// Drawing the result.
    Rendering,
    /// Finished with a line.
    Accepted(String),
    /// Finished without a line.
    Cancelled,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The user accepted this text.
    Accepted(String),
    /// The user cancelled.
    Cancelled,
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// External collaborators other than the console.
pub struct Ports {
    /// Clipboard for copy, cut and paste.
    pub clipboard: Box<dyn Clipboard>,
    /// Accepted-line store.
    pub history: Box<dyn History>,
    /// Display categories for the text.
    pub classifier: Box<dyn Classifier>,
    /// Tab completion.
    pub completer: Box<dyn Completer>,
    /// Background suggestions, if any.
    pub predictor: Option<Box<dyn Predictor>>,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            clipboard: Box::new(MemoryClipboard::default()),
            history: Box::new(MemoryHistory::new()),
            classifier: Box::new(PlainClassifier),
            completer: Box::new(NoCompletion),
            predictor: None,
        }
    }
}

impl std::fmt::Debug for Ports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ports")
            .field("predictor", &self.predictor.is_some())
            .finish_non_exhaustive()
    }
}

impl Ports {
    /// Use `clipboard`.
    #[must_use]
    pub fn with_clipboard(mut self, clipboard: impl Clipboard + 'static) -> Self {
        self.clipboard = Box::new(clipboard);
        self
    }

    /// Use `history`.
    #[must_use]
    pub fn with_history(mut self, history: impl History + 'static) -> Self {
        self.history = Box::new(history);
        self
    }

    /// Use `classifier`.
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Use `completer`.
    #[must_use]
    pub fn with_completer(mut self, completer: impl Completer + 'static) -> Self {
        self.completer = Box::new(completer);
        self
    }

    /// Use `predictor`.
    #[must_use]
    pub fn with_predictor(mut self, predictor: impl Predictor + 'static) -> Self {
        self.predictor = Some(Box::new(predictor));
        self
    }
}

// ---------------------------------------------------------------------------
// Internal bookkeeping
// ---------------------------------------------------------------------------

/// What a chord turned into after the argument and resolver saw it.
enum Route {
    Consumed,
    Action(EditAction, Option<i64>),
    Ding,
}

#[derive(Debug)]
struct CompletionCycle {
    start: usize,
    inserted: usize,
    candidates: Vec<String>,
    index: usize,
}

#[derive(Debug)]
struct HistoryCursor {
    index: usize,
    /// The in-progress line, restored past the newest entry.
    saved: String,
}

// ---------------------------------------------------------------------------
// EditSession
// ---------------------------------------------------------------------------

/// One interactive line edit.
pub struct EditSession<C: Console> {
    console: C,
    ports: Ports,
    options: EditOptions,
    keymaps: KeyMaps,
    active: KeyMapKind,
    decoder: InputDecoder,
    resolver: ChordResolver,
    argument: DigitArgument,
    buffer: EditBuffer,
    state: SessionState,
    anchor: ScreenPoint,
    prompt: PromptSpan,
    render: RenderData,
    continuation_width: usize,
    /// Rows covered by the last frame.
    rows: usize,
    history: Option<HistoryCursor>,
    completion: Option<CompletionCycle>,
    predictions: PredictionCoordinator,
}

impl<C: Console> std::fmt::Debug for EditSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("state", &self.state)
            .field("active", &self.active)
            .field("buffer", &self.buffer.text())
            .field("cursor", &self.buffer.cursor())
            .field("anchor", &self.anchor)
            .field("argument", &self.argument)
            .field("pending", &self.resolver.pending())
            .finish()
    }
}

impl<C: Console> EditSession<C> {
    /// A session on `console` with in-memory ports.
    #[must_use]
    pub fn new(console: C, options: EditOptions) -> Self {
        Self::with_ports(console, Ports::default(), options)
    }

    /// A session on `console` with the given ports.
    #[must_use]
    pub fn with_ports(console: C, ports: Ports, options: EditOptions) -> Self {
        let mut keymaps = KeyMaps::default();
        for kind in KeyMapKind::ALL {
            keymaps
                .get_mut(kind)
                .set_digit_keys(options.digit_argument_keys.get(kind).clone());
        }

        let mut buffer = EditBuffer::new();
        buffer.set_kill_ring_size(options.max_kill_ring);
        buffer.set_word_delimiters(&options.word_delimiters);

        let width = console.buffer_width().max(1);
        let continuation_width = geometry::display_width(&options.continuation_prompt);

        Self {
            active: KeyMapKind::initial(options.edit_mode),
            decoder: InputDecoder::new(options.escape_timeout),
            render: RenderData::from_text("", width, continuation_width),
            console,
            ports,
            options,
            keymaps,
            resolver: ChordResolver::new(),
            argument: DigitArgument::new(),
            buffer,
            state: SessionState::AwaitingInput,
            anchor: ScreenPoint::default(),
            prompt: PromptSpan::default(),
            continuation_width,
            rows: 0,
            history: None,
            completion: None,
            predictions: PredictionCoordinator::new(),
        }
    }

    // ====================================================================
    // Accessors
    // ====================================================================

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The edit buffer.
    #[must_use]
    pub fn buffer(&self) -> &EditBuffer {
        &self.buffer
    }

    /// Mutable access to the edit buffer. Call [`refresh`](Self::refresh)
    /// afterwards to redraw.
    pub fn buffer_mut(&mut self) -> &mut EditBuffer {
        &mut self.buffer
    }

    /// The console.
    #[must_use]
    pub fn console(&self) -> &C {
        &self.console
    }

    /// Mutable access to the console.
    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    /// The history store.
    #[must_use]
    pub fn history(&self) -> &dyn History {
        self.ports.history.as_ref()
    }

    /// The clipboard.
    #[must_use]
    pub fn clipboard(&self) -> &dyn Clipboard {
        self.ports.clipboard.as_ref()
    }

    /// Options the session was built with.
    #[must_use]
    pub fn options(&self) -> &EditOptions {
        &self.options
    }

    /// All key maps.
    #[must_use]
    pub fn keymaps(&self) -> &KeyMaps {
        &self.keymaps
    }

    /// The key map in effect.
    #[must_use]
    pub fn active_keymap(&self) -> KeyMapKind {
        self.active
    }

    /// Bind `descriptor` to `action` in the map for `kind`.
    pub fn bind(
        &mut self,
        kind: KeyMapKind,
        descriptor: &str,
        action: EditAction,
    ) -> Result<Option<EditAction>> {
        Ok(self.keymaps.get_mut(kind).bind(descriptor, action)?)
    }

    /// Switch the edit mode; the mode's initial key map takes effect.
    pub fn set_edit_mode(&mut self, mode: EditMode) {
        debug!(from = %self.options.edit_mode, to = %mode, "edit mode switch");
        self.options.edit_mode = mode;
        self.switch_keymap(KeyMapKind::initial(mode));
    }

    /// The digit argument being collected.
    #[must_use]
    pub fn digit_argument(&self) -> &DigitArgument {
        &self.argument
    }

    /// Chords collected toward a multi-chord binding.
    #[must_use]
    pub fn pending_chords(&self) -> &[KeyChord] {
        self.resolver.pending()
    }

    /// Screen point right after the prompt.
    #[must_use]
    pub fn anchor(&self) -> ScreenPoint {
        self.anchor
    }

    /// Layout of the last frame.
    #[must_use]
    pub fn render_data(&self) -> &RenderData {
        &self.render
    }

    /// Where the cursor was last placed.
    #[must_use]
    pub fn cursor_point(&self) -> ScreenPoint {
        self.render.cursor
    }

    /// Prediction state.
    #[must_use]
    pub fn predictions(&self) -> &PredictionCoordinator {
        &self.predictions
    }

    /// The suggestion remainder currently shown after the text.
    #[must_use]
    pub fn suggestion(&self) -> Option<&str> {
        self.predictions.completion_for(self.buffer.text())
    }

    // ====================================================================
    // Driving the session
    // ====================================================================

    /// Start a new line: write the prompt and reset per-line state.
    pub fn begin(&mut self) -> Result<()> {
        self.buffer.reset("");
        self.decoder.reset();
        self.resolver.reset();
        self.argument.abort();
        self.history = None;
        self.completion = None;
        self.predictions.clear();
        self.active = KeyMapKind::initial(self.options.edit_mode);
        self.state = SessionState::AwaitingInput;
        self.render.buffer_width = self.console.buffer_width().max(1);
        self.anchor = self.console.begin(&self.options.prompt)?;
        self.prompt = PromptSpan::from_anchor(
            self.anchor,
            geometry::display_width(&self.options.prompt),
            self.render.buffer_width,
        )?;
        self.rows = 0;
        self.redraw(None)
    }

    /// Read one line from `input`.
    pub fn read_line(&mut self, input: &mut dyn InputSource) -> Result<Outcome> {
        self.begin()?;
        loop {
            let started = Instant::now();
            let timeout = self.next_timeout(started);
            match input.next_event(timeout)? {
                InputPoll::Event(InputEvent::Unit(unit)) => {
                    if let Some(outcome) = self.handle_raw(unit, Instant::now())? {
                        return Ok(outcome);
                    }
                }
                InputPoll::Event(InputEvent::Paste(text)) => {
                    if let Some(outcome) = self.handle_paste(&text)? {
                        return Ok(outcome);
                    }
                }
                InputPoll::Event(InputEvent::Resize { width, .. }) => {
                    self.handle_resize(usize::from(width))?;
                }
                InputPoll::Timeout => {
                    // The source waited the full timeout, so the deadline has passed.
                    let now = started + timeout.unwrap_or_default();
                    if let Some(outcome) = self.tick(now)? {
                        return Ok(outcome);
                    }
                }
                InputPoll::Closed => {
                    self.decoder.flush();
                    if let Some(outcome) = self.drain_decoder()? {
                        return Ok(outcome);
                    }
                    return Err(SessionError::InputClosed);
                }
            }
        }
    }

    /// Feed one raw unit at time `now`.
    pub fn handle_raw(&mut self, unit: RawUnit, now: Instant) -> Result<Option<Outcome>> {
        self.decoder.feed_at(unit, now);
        self.drain_decoder()
    }

    /// Let time pass: expire escape deadlines and apply prediction replies.
    pub fn tick(&mut self, now: Instant) -> Result<Option<Outcome>> {
        self.decoder.flush_expired(now);
        if let Some(outcome) = self.drain_decoder()? {
            return Ok(Some(outcome));
        }
        if self.predictions.poll() && self.outcome().is_none() {
            self.redraw(None)?;
        }
        Ok(None)
    }

    /// Process one decoded chord.
    pub fn handle_chord(&mut self, chord: KeyChord) -> Result<Option<Outcome>> {
        if let Some(outcome) = self.outcome() {
            return Ok(Some(outcome));
        }

        self.state = SessionState::Dispatching;
        match self.route(chord) {
            Route::Consumed => {}
            Route::Action(action, count) => self.dispatch(action, count)?,
            Route::Ding => self.ding()?,
        }
        if let Some(outcome) = self.outcome() {
            return Ok(Some(outcome));
        }

        self.state = SessionState::Rendering;
        self.redraw(None)?;
        self.state = SessionState::AwaitingInput;
        Ok(None)
    }

    /// Insert pasted text as-is.
    ///
    /// Pending escape input is resolved first. The text itself never reaches
    /// the decoder or the key maps, so tabs and escapes in it stay literal.
    /// Carriage returns become newlines.
    pub fn handle_paste(&mut self, text: &str) -> Result<Option<Outcome>> {
        self.decoder.flush();
        if let Some(outcome) = self.drain_decoder()? {
            return Ok(Some(outcome));
        }
        if let Some(outcome) = self.outcome() {
            return Ok(Some(outcome));
        }

        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        debug!(chars = text.chars().count(), "paste");
        self.state = SessionState::Dispatching;
        self.resolver.reset();
        self.argument.abort();
        self.completion = None;
        self.buffer.break_chains();
        if !text.is_empty() {
            self.buffer.insert(&text);
            self.buffer.commit_group();
            self.request_prediction();
        }

        self.state = SessionState::Rendering;
        self.redraw(None)?;
        self.state = SessionState::AwaitingInput;
        Ok(None)
    }

    /// The terminal is now `width` cells wide.
    pub fn handle_resize(&mut self, width: usize) -> Result<()> {
        if width == 0 {
            debug!("ignoring resize to zero width");
            return Ok(());
        }
        let old_width = self.render.buffer_width;
        let remap = geometry::remap_for_resize(self.prompt, &self.render, width)?;
        debug!(
            old_width,
            new_width = width,
            line = remap.offset.line,
            index = remap.offset.index,
            "resize remap"
        );
        self.anchor = remap.anchor;
        self.render.buffer_width = width;
        if self.outcome().is_some() {
            return Ok(());
        }

        // A flush line end and the next line start can share a point; the
        // buffer cursor decides which one it was.
        let cursor = match self.render.char_for_offset(remap.offset) {
            Ok(index) if index == self.buffer.cursor() => Some(remap.cursor),
            _ => None,
        };
        self.redraw(cursor)
    }

    /// Redraw after the buffer was changed through
    /// [`buffer_mut`](Self::buffer_mut).
    pub fn refresh(&mut self) -> Result<()> {
        self.request_prediction();
        self.redraw(None)
    }

    // ====================================================================
    // Routing
    // ====================================================================

    fn outcome(&self) -> Option<Outcome> {
        match &self.state {
            SessionState::Accepted(text) => Some(Outcome::Accepted(text.clone())),
            SessionState::Cancelled => Some(Outcome::Cancelled),
            _ => None,
        }
    }

    fn next_timeout(&self, now: Instant) -> Option<Duration> {
        let escape = self.decoder.time_until_deadline(now);
        let prediction = (self.ports.predictor.is_some() && self.predictions.is_waiting())
            .then_some(PREDICTION_POLL_INTERVAL);
        match (escape, prediction) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn drain_decoder(&mut self) -> Result<Option<Outcome>> {
        while let Some(chord) = self.decoder.take_chord() {
            if let Some(outcome) = self.handle_chord(chord)? {
                self.decoder.reset();
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }

    fn route(&mut self, chord: KeyChord) -> Route {
        let map = self.keymaps.get(self.active);

        if !self.resolver.is_pending() {
            if self.argument.is_active() {
                if map.abort_chord() == Some(chord) {
                    debug!("digit argument aborted");
                    self.argument.abort();
                    return Route::Consumed;
                }
                if chord == KeyChord::new(KeyCode::Backspace) {
                    self.argument.backspace();
                    return Route::Consumed;
                }
            }
            if let Some(key) = map.digit_keys().classify(&chord, self.argument.is_active()) {
                match key {
                    ArgumentKey::Digit(digit) => self.argument.push_digit(digit),
                    ArgumentKey::Negate => self.argument.negate(),
                }
                trace!(argument = ?self.argument.value(), "digit argument");
                return Route::Consumed;
            }
        }

        match self.resolver.resolve(map.table(), chord) {
            Resolution::Action(action) => Route::Action(action, self.argument.take()),
            Resolution::Pending => Route::Consumed,
            Resolution::Unbound(chords) => {
                if let [single] = chords.as_slice() {
                    if map.self_insert() {
                        if let Some(ch) = single.insertable_char() {
                            return Route::Action(EditAction::SelfInsert(ch), self.argument.take());
                        }
                    }
                }
                self.argument.abort();
                debug!(
                    chords = %descriptor::describe(&chords),
                    keymap = ?self.active,
                    "unbound input"
                );
                Route::Ding
            }
        }
    }

    // ====================================================================
    // Dispatch
    // ====================================================================

    fn dispatch(&mut self, action: EditAction, count: Option<i64>) -> Result<()> {
        let (action, times) = match count {
            Some(n) if n < 0 => (action.opposite().unwrap_or(action), n.unsigned_abs()),
            Some(n) => (action, n.unsigned_abs()),
            None => (action, 1),
        };
        let times = if action.repeats() {
            usize::try_from(times).unwrap_or(usize::MAX)
        } else {
            1
        };
        trace!(?action, times, "dispatch");

        if !action.kills() && !action.yanks() {
            self.buffer.break_chains();
        }
        if !action.cycles_completion() {
            self.completion = None;
        }

        let before = self.buffer.text().to_string();
        let done = if times == 0 {
            true
        } else {
            match self.apply_counted(action, times)? {
                Some(done) => done,
                None => self.apply_repeated(action, times)?,
            }
        };
        if self.outcome().is_some() {
            return Ok(());
        }
        if !done {
            self.ding()?;
        }
        if !action.keeps_selection() {
            self.buffer.clear_selection();
        }
        self.buffer.commit_group();

        if self.buffer.text() != before {
            self.request_prediction();
        }
        Ok(())
    }

    /// Run an action whose repeat count folds into a single edit or motion.
    ///
    /// Returns `None` for actions that repeat by running again.
    fn apply_counted(&mut self, action: EditAction, times: usize) -> Result<Option<bool>> {
        use EditAction::*;

        let cursor = self.buffer.cursor();
        let done = match action {
            SelfInsert(ch) => {
                let mut tmp = [0u8; 4];
                self.insert_repeated(ch.encode_utf8(&mut tmp), times)
            }
            AddLine => self.insert_repeated("\n", times),
            InsertLineAbove => {
                let start = self.buffer.line_start(cursor);
                self.buffer.move_to(start);
                self.insert_repeated("\n", times);
                self.buffer.move_to(start);
                true
            }
            InsertLineBelow => {
                self.buffer.move_to(self.buffer.line_end(cursor));
                self.insert_repeated("\n", times)
            }
            Paste => {
                let text = self.ports.clipboard.get_text();
                self.insert_repeated(&text, times)
            }
            Yank | ViPasteBefore => self.yank_repeated(times),
            ViPasteAfter => {
                if cursor < self.buffer.line_end(cursor) {
                    self.buffer.move_to(self.buffer.next_grapheme(cursor));
                }
                self.yank_repeated(times)
            }

            BackwardChar => {
                self.buffer.move_to(self.buffer.graphemes_before(cursor, times));
                true
            }
            ForwardChar => {
                if cursor == self.buffer.len() {
                    self.accept_suggestion();
                } else {
                    self.buffer.move_to(self.buffer.graphemes_after(cursor, times));
                }
                true
            }
            BackwardWord => {
                self.buffer.move_to(self.word(cursor, times, WordMotion::PrevStart));
                true
            }
            ForwardWord => {
                self.buffer.move_to(self.word(cursor, times, WordMotion::NextEnd));
                true
            }
            NextWord => {
                self.buffer.move_to(self.word(cursor, times, WordMotion::NextStart));
                true
            }
            SelectBackwardChar => {
                self.buffer.select_to(self.buffer.graphemes_before(cursor, times));
                true
            }
            SelectForwardChar => {
                self.buffer.select_to(self.buffer.graphemes_after(cursor, times));
                true
            }
            SelectBackwardWord => {
                self.buffer.select_to(self.word(cursor, times, WordMotion::PrevStart));
                true
            }
            SelectNextWord => {
                self.buffer.select_to(self.word(cursor, times, WordMotion::NextStart));
                true
            }

            BackwardDeleteChar => {
                if !self.buffer.delete_selection() {
                    let start = self.buffer.graphemes_before(cursor, times);
                    self.buffer.remove(start..cursor);
                }
                true
            }
            DeleteChar => {
                self.delete_forward(cursor, times);
                true
            }
            DeleteCharOrCancel => {
                if self.buffer.is_empty() {
                    self.cancel()?;
                } else {
                    self.delete_forward(cursor, times);
                }
                true
            }
            BackwardDeleteWord => {
                let start = self.word(cursor, times, WordMotion::PrevStart);
                self.buffer.remove(start..cursor);
                true
            }
            KillWord => {
                let end = self.word(cursor, times, WordMotion::NextEnd);
                self.buffer.kill(cursor..end, false);
                true
            }
            BackwardKillWord => {
                let start = self.word(cursor, times, WordMotion::PrevStart);
                self.buffer.kill(start..cursor, true);
                true
            }
            UnixWordRubout => {
                let start = self.word(cursor, times, WordMotion::TokenStart);
                self.buffer.kill(start..cursor, true);
                true
            }
            TransposeChars => self.buffer.swap_chars_times(times),
            ViDeleteWord => {
                let end = self.word(cursor, times, WordMotion::NextStart);
                self.buffer.kill(cursor..end, false);
                true
            }
            ViChangeWord => {
                let end = self.word(cursor, times, WordMotion::NextEnd);
                self.buffer.kill(cursor..end, false);
                self.switch_keymap(KeyMapKind::ViInsert);
                true
            }
            _ => return Ok(None),
        };
        Ok(Some(done))
    }

    /// Run `action` up to `times` (at least 1) times, stopping at the first
    /// run that has nothing to act on or changes nothing.
    fn apply_repeated(&mut self, action: EditAction, times: usize) -> Result<bool> {
        let limit = match action {
            EditAction::PreviousHistory | EditAction::NextHistory => {
                times.min(self.ports.history.all().len() + 1)
            }
            // The ring is cyclic.
            EditAction::YankPop => match self.buffer.kill_ring().len() {
                0 => 1,
                ring => (times - 1) % ring + 1,
            },
            _ => times,
        };
        let until_stuck = !matches!(
            action,
            EditAction::Undo | EditAction::Redo | EditAction::YankPop
        );

        for _ in 0..limit {
            let state = (self.buffer.text().len(), self.buffer.cursor());
            if !self.apply(action)? {
                return Ok(false);
            }
            if self.outcome().is_some() {
                break;
            }
            if until_stuck && state == (self.buffer.text().len(), self.buffer.cursor()) {
                break;
            }
        }
        Ok(true)
    }

    /// Run `action` once. Returns `false` when it had nothing to act on.
    fn apply(&mut self, action: EditAction) -> Result<bool> {
        use EditAction::*;

        let cursor = self.buffer.cursor();
        let len = self.buffer.len();
        let line_start = self.buffer.line_start(cursor);
        let line_end = self.buffer.line_end(cursor);

        match action {
            BeginningOfLine => self.move_to(line_start),
            EndOfLine => {
                if cursor == len {
                    self.accept_suggestion();
                } else {
                    self.move_to(line_end);
                }
            }

            KillLine => {
                let end = if line_end == cursor { cursor + 1 } else { line_end };
                return Ok(self.buffer.kill(cursor..end, false));
            }
            BackwardKillLine => {
                self.buffer.kill(line_start..cursor, true);
            }
            YankPop => return Ok(self.buffer.yank_pop()),

            Undo => return Ok(self.buffer.undo()),
            Redo => return Ok(self.buffer.redo()),
            RevertLine => {
                self.buffer.revert();
            }
            UpcaseWord => return Ok(self.buffer.map_word_case(WordCase::Upper)),
            DowncaseWord => return Ok(self.buffer.map_word_case(WordCase::Lower)),
            CapitalizeWord => return Ok(self.buffer.map_word_case(WordCase::Capitalize)),

            SelectAll => self.buffer.select_all(),
            Copy => return Ok(self.copy_selection()),
            CopyOrCancelLine => {
                if !self.copy_selection() {
                    self.cancel()?;
                }
            }
            Cut => {
                if !self.copy_selection() {
                    return Ok(false);
                }
                self.buffer.delete_selection();
            }

            PreviousHistory | NextHistory | BeginningOfHistory | EndOfHistory => {
                return Ok(self.navigate_history(action));
            }
            TabCompleteNext => return Ok(self.complete(true)),
            TabCompletePrevious => return Ok(self.complete(false)),
            AcceptSuggestion => return Ok(self.accept_suggestion()),

            AcceptLine => self.accept()?,
            CancelLine => self.cancel()?,
            Abort => {
                self.argument.abort();
                self.resolver.reset();
                self.buffer.clear_selection();
                self.completion = None;
            }

            ViCommandMode => {
                self.switch_keymap(KeyMapKind::ViCommand);
                if cursor > line_start {
                    self.move_to(self.buffer.prev_grapheme(cursor));
                }
            }
            ViInsertMode => self.switch_keymap(KeyMapKind::ViInsert),
            ViAppend => {
                if cursor < line_end {
                    self.move_to(self.buffer.next_grapheme(cursor));
                }
                self.switch_keymap(KeyMapKind::ViInsert);
            }
            ViInsertAtStart => {
                self.move_to(line_start);
                self.switch_keymap(KeyMapKind::ViInsert);
            }
            ViInsertAtEnd => {
                self.move_to(line_end);
                self.switch_keymap(KeyMapKind::ViInsert);
            }
            ViDeleteLine => {
                let range = if line_end < len {
                    line_start..line_end + 1
                } else if line_start > 0 {
                    line_start - 1..line_end
                } else {
                    line_start..line_end
                };
                return Ok(self.buffer.kill(range, false));
            }
            ViDeleteToLineStart => {
                self.buffer.kill(line_start..cursor, true);
            }
            ViDeleteToEnd => {
                self.buffer.kill(cursor..line_end, false);
            }
            ViChangeLine => {
                self.buffer.kill(line_start..line_end, false);
                self.switch_keymap(KeyMapKind::ViInsert);
            }

            counted => return Ok(self.apply_counted(counted, 1)?.unwrap_or(false)),
        }
        Ok(true)
    }

    fn word(&self, pos: usize, times: usize, motion: WordMotion) -> usize {
        self.buffer.word_steps(pos, times, motion)
    }

    /// Insert `unit` `times` times as one edit, capped at
    /// [`MAX_REPEATED_CHARS`] chars.
    fn insert_repeated(&mut self, unit: &str, times: usize) -> bool {
        if unit.is_empty() {
            return false;
        }
        let times = capped_repeat(times, unit.chars().count());
        self.buffer.insert(&unit.repeat(times));
        true
    }

    fn yank_repeated(&mut self, times: usize) -> bool {
        let unit = self.buffer.kill_ring().top().map_or(1, |text| text.chars().count());
        self.buffer.yank_times(capped_repeat(times, unit))
    }

    fn move_to(&mut self, pos: usize) {
        self.buffer.move_to(pos);
    }

    fn delete_forward(&mut self, cursor: usize, times: usize) {
        if !self.buffer.delete_selection() {
            let end = self.buffer.graphemes_after(cursor, times);
            self.buffer.remove(cursor..end);
        }
    }

    fn copy_selection(&mut self) -> bool {
        match self.buffer.selected_text() {
            Some(text) => {
                self.ports.clipboard.set_text(&text);
                true
            }
            None => false,
        }
    }

    fn switch_keymap(&mut self, kind: KeyMapKind) {
        if kind != self.active {
            debug!(from = ?self.active, to = ?kind, "key map switch");
            self.active = kind;
            self.resolver.reset();
        }
    }

    fn navigate_history(&mut self, action: EditAction) -> bool {
        let entries = self.ports.history.all();
        if entries.is_empty() {
            return false;
        }
        let newest = entries.len() - 1;
        let current = self.history.as_ref().map(|cursor| cursor.index);
        let target = match (action, current) {
            (EditAction::PreviousHistory, None) => newest,
            (EditAction::PreviousHistory, Some(0)) => return false,
            (EditAction::PreviousHistory, Some(index)) => index - 1,
            (EditAction::NextHistory, None) => return false,
            (EditAction::NextHistory, Some(index)) => index + 1,
            (EditAction::BeginningOfHistory, _) => 0,
            (EditAction::EndOfHistory, None) => return true,
            (EditAction::EndOfHistory, Some(_)) => entries.len(),
            _ => return false,
        };
        trace!(index = target, entries = entries.len(), "history navigation");

        if target > newest {
            if let Some(cursor) = self.history.take() {
                self.buffer.set_text(&cursor.saved);
            }
            return true;
        }
        match self.history.as_mut() {
            Some(cursor) => cursor.index = target,
            None => {
                self.history = Some(HistoryCursor {
                    index: target,
                    saved: self.buffer.text().to_string(),
                });
            }
        }
        self.buffer.set_text(&entries[target]);
        true
    }

    fn complete(&mut self, forward: bool) -> bool {
        if let Some(cycle) = self.completion.as_mut() {
            let count = cycle.candidates.len();
            cycle.index = if forward {
                (cycle.index + 1) % count
            } else {
                (cycle.index + count - 1) % count
            };
            let candidate = &cycle.candidates[cycle.index];
            let range = cycle.start..cycle.start + cycle.inserted;
            cycle.inserted = candidate.chars().count();
            self.buffer.splice(range, candidate);
            return true;
        }

        let completions = self
            .ports
            .completer
            .complete(self.buffer.text(), self.buffer.cursor());
        let count = completions.candidates.len();
        if count == 0 {
            return false;
        }
        let index = if forward { 0 } else { count - 1 };
        let candidate = &completions.candidates[index];
        let inserted = candidate.chars().count();
        self.buffer.splice(completions.replace.clone(), candidate);
        self.completion = Some(CompletionCycle {
            start: completions.replace.start,
            inserted,
            candidates: completions.candidates,
            index,
        });
        true
    }

    fn accept_suggestion(&mut self) -> bool {
        let Some(rest) = self
            .predictions
            .completion_for(self.buffer.text())
            .map(str::to_string)
        else {
            return false;
        };
        self.buffer.move_to(self.buffer.len());
        self.buffer.insert(&rest);
        true
    }

    fn request_prediction(&mut self) {
        if !self.options.prediction {
            return;
        }
        let Some(predictor) = self.ports.predictor.as_mut() else {
            return;
        };
        let token = self.predictions.issue();
        predictor.predict(self.buffer.text(), token, self.predictions.sender());
        // Synchronous predictors have answered already.
        self.predictions.poll();
    }

    fn accept(&mut self) -> Result<()> {
        let text = self.buffer.text().to_string();
        if !text.is_empty() {
            self.ports.history.append(&text);
        }
        self.finish_line()?;
        info!(chars = text.chars().count(), "line accepted");
        self.state = SessionState::Accepted(text);
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        self.finish_line()?;
        info!("line cancelled");
        self.state = SessionState::Cancelled;
        Ok(())
    }

    fn finish_line(&mut self) -> Result<()> {
        self.predictions.clear();
        self.completion = None;
        self.history = None;
        self.buffer.clear_selection();
        self.redraw(None)?;
        self.console.finish(self.rows)?;
        Ok(())
    }

    fn ding(&mut self) -> Result<()> {
        debug!(bell = ?self.options.bell_style, "ding");
        self.console.ding(self.options.bell_style)?;
        Ok(())
    }

    // ====================================================================
    // Rendering
    // ====================================================================

    /// Lay out the buffer, draw it and place the cursor. `cursor` overrides
    /// the point computed from the buffer cursor.
    fn redraw(&mut self, cursor: Option<ScreenPoint>) -> Result<()> {
        let width = self.render.buffer_width;
        let text = self.buffer.text();
        let mut render = RenderData::from_text(text, width, self.continuation_width);
        let cursor = match cursor {
            Some(point) => point,
            None => {
                let offset = render.offset_for_char(self.buffer.cursor());
                geometry::offset_to_point(self.anchor, width, &render, offset)?
            }
        };
        render.cursor = cursor;

        let spans = self.ports.classifier.classify(text);
        let frame = RenderFrame {
            anchor: self.anchor,
            render: &render,
            spans: &spans,
            continuation_prompt: &self.options.continuation_prompt,
            suggestion: self.predictions.completion_for(text),
            selection: self.buffer.selection_state(),
            previous_rows: self.rows,
        };
        self.console.render(&frame)?;
        self.console.set_cursor(cursor)?;

        self.rows = render.total_rows(self.anchor, width)?;
        self.render = render;
        Ok(())
    }
}

fn capped_repeat(times: usize, unit_chars: usize) -> usize {
    let cap = (MAX_REPEATED_CHARS / unit_chars.max(1)).max(1);
    if times > cap {
        debug!(times, cap, "repeat count capped");
    }
    times.min(cap)
}
