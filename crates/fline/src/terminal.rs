#![forbid(unsafe_code)]

//! Crossterm-backed console and input.
//!
//! # Coordinates
//!
//! [`CrosstermConsole`] reports points relative to the row the prompt
//! started on, so the session never sees absolute terminal rows. When the
//! edited text grows past the bottom of the screen the console scrolls and
//! moves its origin up; session coordinates stay valid.
//!
//! # Raw mode
//!
//! [`RawModeGuard`] owns raw mode and bracketed paste. Cleanup runs on drop,
//! from a panic hook, and (on Unix) from a SIGINT/SIGTERM watcher thread.
//!
//! ```no_run
//! use fline::terminal::{CrosstermConsole, CrosstermInput, RawModeGuard};
//! use fline::{EditOptions, EditSession};
//!
//! let _guard = RawModeGuard::new()?;
//! let mut session = EditSession::new(CrosstermConsole::stdout(), EditOptions::from_env());
//! let outcome = session.read_line(&mut CrosstermInput::new())?;
//! # Ok::<(), fline::SessionError>(())
//! ```

use std::collections::VecDeque;
use std::io::{self, Stdout, Write};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crossterm::cursor::MoveTo;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, queue};
use fline_core::key::{KeyCode, Modifiers, RawUnit};
use fline_text::geometry::{self, RenderOffset, ScreenPoint};
use tracing::{debug, info, trace};

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGWINCH};
#[cfg(unix)]
use signal_hook::iterator::Signals;

use crate::input::{InputEvent, InputPoll, InputSource};
use crate::options::BellStyle;
use crate::ports::{Console, RenderFrame, TokenCategory};

/// Width assumed when the terminal size cannot be queried.
const FALLBACK_WIDTH: u16 = 80;
/// Height assumed when the terminal size cannot be queried.
const FALLBACK_HEIGHT: u16 = 24;

// ---------------------------------------------------------------------------
// CrosstermConsole
// ---------------------------------------------------------------------------

/// Console port that draws with crossterm commands.
#[derive(Debug)]
pub struct CrosstermConsole<W: Write = Stdout> {
    out: W,
    /// Absolute terminal row of session row 0.
    origin: u16,
    /// Size used instead of querying the terminal.
    fixed_size: Option<(u16, u16)>,
}

impl CrosstermConsole<Stdout> {
    /// A console writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> CrosstermConsole<W> {
    /// A console writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            origin: 0,
            fixed_size: None,
        }
    }

    /// Use a fixed `width` x `height` instead of the terminal's size.
    #[must_use]
    pub fn with_size(mut self, width: u16, height: u16) -> Self {
        self.fixed_size = Some((width, height));
        self
    }

    fn size(&self) -> (u16, u16) {
        self.fixed_size.unwrap_or_else(|| {
            crossterm::terminal::size().unwrap_or((FALLBACK_WIDTH, FALLBACK_HEIGHT))
        })
    }

    fn row(&self, y: usize) -> u16 {
        self.origin.saturating_add(clamp_u16(y))
    }

    /// Scroll until session rows `0..rows` fit on screen.
    fn ensure_rows(&mut self, rows: usize) -> io::Result<()> {
        let (_, height) = self.size();
        let bottom = usize::from(self.origin) + rows;
        let height = usize::from(height.max(1));
        if bottom <= height {
            return Ok(());
        }
        let overflow = bottom - height;
        queue!(self.out, MoveTo(0, clamp_u16(height - 1)))?;
        for _ in 0..overflow {
            queue!(self.out, Print("\n"))?;
        }
        self.origin = self.origin.saturating_sub(clamp_u16(overflow));
        trace!(overflow, origin = self.origin, "console scrolled");
        Ok(())
    }

    fn print_run(&mut self, text: &str, category: TokenCategory, selected: bool) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if selected {
            queue!(self.out, SetAttribute(Attribute::Reverse))?;
        }
        match category_color(category) {
            Some(color) => queue!(self.out, SetForegroundColor(color), Print(text), ResetColor)?,
            None => queue!(self.out, Print(text))?,
        }
        if selected {
            queue!(self.out, SetAttribute(Attribute::NoReverse))?;
        }
        Ok(())
    }

    /// Print one logical line, split into runs of equal styling.
    fn print_line(
        &mut self,
        frame: &RenderFrame<'_>,
        text: &str,
        first_char: usize,
    ) -> io::Result<()> {
        let selection = frame.selection.map(|selection| selection.range());
        let style_at = |index: usize| {
            let category = frame
                .spans
                .iter()
                .find(|span| span.range.contains(&index))
                .map_or(TokenCategory::Default, |span| span.category);
            let selected = selection
                .as_ref()
                .is_some_and(|range| range.contains(&index));
            (category, selected)
        };

        let mut run = String::new();
        let mut run_style = style_at(first_char);
        for (offset, ch) in text.chars().enumerate() {
            let style = style_at(first_char + offset);
            if style != run_style {
                self.print_run(&run, run_style.0, run_style.1)?;
                run.clear();
                run_style = style;
            }
            run.push(ch);
        }
        self.print_run(&run, run_style.0, run_style.1)
    }
}

impl<W: Write> Console for CrosstermConsole<W> {
    fn buffer_width(&self) -> usize {
        usize::from(self.size().0.max(1))
    }

    fn begin(&mut self, prompt: &str) -> io::Result<ScreenPoint> {
        let (column, row) = crossterm::cursor::position().unwrap_or((0, 0));
        self.origin = row;
        if column != 0 {
            queue!(self.out, Print("\r\n"))?;
            self.origin = row.saturating_add(1);
        }

        let width = self.buffer_width();
        let cells = geometry::display_width(prompt);
        let anchor = ScreenPoint::new(cells % width, cells / width);
        self.ensure_rows(anchor.y + 1)?;
        let origin = self.origin;
        queue!(self.out, MoveTo(0, origin), Print(prompt))?;
        self.out.flush()?;
        debug!(origin = self.origin, x = anchor.x, y = anchor.y, "prompt written");
        Ok(anchor)
    }

    fn render(&mut self, frame: &RenderFrame<'_>) -> io::Result<()> {
        let render = frame.render;
        let width = render.buffer_width.max(1);
        let rows = render
            .total_rows(frame.anchor, width)
            .map_err(io::Error::other)?;
        let last = render.lines.len().saturating_sub(1);
        let end = geometry::offset_to_point(
            frame.anchor,
            width,
            render,
            RenderOffset::new(last, render.lines.last().map_or(0, |line| line.visible_len())),
        )
        .map_err(io::Error::other)?;
        // After a flush last row the end point is on the row below it.
        self.ensure_rows(rows.max(end.y + 1).max(frame.previous_rows))?;

        let mut first_char = 0;
        for (index, line) in render.lines.iter().enumerate() {
            let start =
                geometry::offset_to_point(frame.anchor, width, render, RenderOffset::new(index, 0))
                    .map_err(io::Error::other)?;
            let row = self.row(start.y);
            if index == 0 {
                queue!(self.out, MoveTo(clamp_u16(start.x), row))?;
            } else {
                queue!(
                    self.out,
                    MoveTo(0, row),
                    Clear(ClearType::UntilNewLine),
                    Print(frame.continuation_prompt)
                )?;
            }
            self.print_line(frame, &line.text, first_char)?;
            first_char += line.text.chars().count() + 1;
        }

        // Suggestions never wrap; they are cut at the right edge.
        let row = self.row(end.y);
        queue!(self.out, MoveTo(clamp_u16(end.x), row))?;
        if let Some(suggestion) = frame.suggestion {
            let room = width.saturating_sub(end.x);
            let cut = geometry::char_index_at_cell(suggestion, room);
            let visible: String = suggestion.chars().take(cut).collect();
            queue!(
                self.out,
                SetForegroundColor(Color::DarkGrey),
                Print(visible),
                ResetColor
            )?;
        }
        queue!(self.out, Clear(ClearType::FromCursorDown))?;
        self.out.flush()
    }

    fn set_cursor(&mut self, point: ScreenPoint) -> io::Result<()> {
        let row = self.row(point.y);
        execute!(self.out, MoveTo(clamp_u16(point.x), row))
    }

    fn ding(&mut self, style: BellStyle) -> io::Result<()> {
        match style {
            BellStyle::Audible => {
                self.out.write_all(b"\x07")?;
                self.out.flush()
            }
            // No portable flash command; hosts wanting one draw it themselves.
            BellStyle::Visual | BellStyle::None => Ok(()),
        }
    }

    fn finish(&mut self, rows: usize) -> io::Result<()> {
        let last = self.row(rows.saturating_sub(1));
        queue!(self.out, MoveTo(0, last), Print("\r\n"))?;
        self.out.flush()
    }
}

fn category_color(category: TokenCategory) -> Option<Color> {
    match category {
        TokenCategory::Default => None,
        TokenCategory::Command => Some(Color::Yellow),
        TokenCategory::Parameter => Some(Color::DarkGrey),
        TokenCategory::String => Some(Color::DarkCyan),
        TokenCategory::Number => Some(Color::White),
        TokenCategory::Variable => Some(Color::Green),
        TokenCategory::Operator => Some(Color::DarkGrey),
        TokenCategory::Keyword => Some(Color::Green),
        TokenCategory::Comment => Some(Color::DarkGreen),
        TokenCategory::Error => Some(Color::Red),
    }
}

fn clamp_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

// ---------------------------------------------------------------------------
// CrosstermInput
// ---------------------------------------------------------------------------

/// Input source reading crossterm events.
///
/// Key events become [`RawUnit`]s: Escape and plain characters go through
/// as characters so the decoder can pair them; everything else arrives as an
/// already-resolved key. Bracketed pastes arrive whole as
/// [`InputEvent::Paste`] and are inserted literally.
#[derive(Debug, Default)]
pub struct CrosstermInput {
    queued: VecDeque<InputEvent>,
}

impl CrosstermInput {
    /// A source reading the process terminal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputSource for CrosstermInput {
    fn next_event(&mut self, timeout: Option<Duration>) -> io::Result<InputPoll> {
        if let Some(event) = self.queued.pop_front() {
            return Ok(InputPoll::Event(event));
        }

        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if !crossterm::event::poll(remaining)? {
                    return Ok(InputPoll::Timeout);
                }
            }
            self.queued.extend(map_event(crossterm::event::read()?));
            if let Some(event) = self.queued.pop_front() {
                return Ok(InputPoll::Event(event));
            }
        }
    }
}

fn map_event(event: crossterm::event::Event) -> Vec<InputEvent> {
    match event {
        crossterm::event::Event::Key(key) => map_key_event(key)
            .map(InputEvent::Unit)
            .into_iter()
            .collect(),
        crossterm::event::Event::Resize(width, height) => {
            vec![InputEvent::Resize { width, height }]
        }
        crossterm::event::Event::Paste(text) => vec![InputEvent::Paste(text)],
        _ => Vec::new(),
    }
}

fn map_key_event(event: crossterm::event::KeyEvent) -> Option<RawUnit> {
    if event.kind == crossterm::event::KeyEventKind::Release {
        return None;
    }
    let modifiers = map_modifiers(event.modifiers);
    match event.code {
        crossterm::event::KeyCode::Esc if modifiers.is_empty() => Some(RawUnit::char('\x1b')),
        crossterm::event::KeyCode::Char(ch) if modifiers.difference(Modifiers::SHIFT).is_empty() => {
            Some(RawUnit::char(ch))
        }
        crossterm::event::KeyCode::Char(ch) => {
            let ch = if modifiers.contains(Modifiers::SHIFT) {
                ch.to_ascii_uppercase()
            } else {
                ch
            };
            Some(RawUnit::key(KeyCode::Char(ch), modifiers))
        }
        crossterm::event::KeyCode::BackTab => {
            Some(RawUnit::key(KeyCode::Tab, modifiers | Modifiers::SHIFT))
        }
        crossterm::event::KeyCode::Null => {
            Some(RawUnit::key(KeyCode::Char(' '), modifiers | Modifiers::CTRL))
        }
        code => map_key_code(code).map(|key| RawUnit::key(key, modifiers)),
    }
}

fn map_key_code(code: crossterm::event::KeyCode) -> Option<KeyCode> {
    match code {
        crossterm::event::KeyCode::Backspace => Some(KeyCode::Backspace),
        crossterm::event::KeyCode::Enter => Some(KeyCode::Enter),
        crossterm::event::KeyCode::Left => Some(KeyCode::Left),
        crossterm::event::KeyCode::Right => Some(KeyCode::Right),
        crossterm::event::KeyCode::Up => Some(KeyCode::Up),
        crossterm::event::KeyCode::Down => Some(KeyCode::Down),
        crossterm::event::KeyCode::Home => Some(KeyCode::Home),
        crossterm::event::KeyCode::End => Some(KeyCode::End),
        crossterm::event::KeyCode::PageUp => Some(KeyCode::PageUp),
        crossterm::event::KeyCode::PageDown => Some(KeyCode::PageDown),
        crossterm::event::KeyCode::Tab => Some(KeyCode::Tab),
        crossterm::event::KeyCode::Delete => Some(KeyCode::Delete),
        crossterm::event::KeyCode::Insert => Some(KeyCode::Insert),
        crossterm::event::KeyCode::F(n) => Some(KeyCode::F(n)),
        crossterm::event::KeyCode::Esc => Some(KeyCode::Escape),
        _ => None,
    }
}

fn map_modifiers(modifiers: crossterm::event::KeyModifiers) -> Modifiers {
    let mut mapped = Modifiers::NONE;
    if modifiers.contains(crossterm::event::KeyModifiers::SHIFT) {
        mapped |= Modifiers::SHIFT;
    }
    if modifiers.contains(crossterm::event::KeyModifiers::ALT)
        || modifiers.contains(crossterm::event::KeyModifiers::META)
    {
        mapped |= Modifiers::ALT;
    }
    if modifiers.contains(crossterm::event::KeyModifiers::CONTROL) {
        mapped |= Modifiers::CTRL;
    }
    mapped
}

// ---------------------------------------------------------------------------
// RawModeGuard
// ---------------------------------------------------------------------------

/// Raw mode plus bracketed paste for the lifetime of the guard.
#[derive(Debug)]
pub struct RawModeGuard {
    #[cfg(unix)]
    signal_guard: Option<SignalGuard>,
}

impl RawModeGuard {
    /// Enter raw mode.
    ///
    /// # Errors
    ///
    /// Returns an error if raw mode cannot be enabled.
    pub fn new() -> io::Result<Self> {
        install_panic_hook();

        crossterm::terminal::enable_raw_mode()?;
        info!("terminal raw mode enabled");

        let guard = Self {
            #[cfg(unix)]
            signal_guard: Some(SignalGuard::new()?),
        };
        execute!(io::stdout(), crossterm::event::EnableBracketedPaste)?;
        Ok(guard)
    }

    fn cleanup(&mut self) {
        #[cfg(unix)]
        let _ = self.signal_guard.take();

        let mut stdout = io::stdout();
        let _ = execute!(stdout, crossterm::event::DisableBracketedPaste);
        let _ = execute!(stdout, crossterm::cursor::Show);
        let _ = crossterm::terminal::disable_raw_mode();
        info!("terminal raw mode disabled");
        let _ = stdout.flush();
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            best_effort_cleanup();
            previous(info);
        }));
    });
}

fn best_effort_cleanup() {
    let mut stdout = io::stdout();
    let _ = execute!(stdout, crossterm::event::DisableBracketedPaste);
    let _ = execute!(stdout, crossterm::cursor::Show);
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = stdout.flush();
}

#[cfg(unix)]
#[derive(Debug)]
struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    fn new() -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGWINCH]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::spawn(move || {
            for signal in signals.forever() {
                match signal {
                    // Resizes reach the session as crossterm events.
                    SIGWINCH => debug!("SIGWINCH received"),
                    SIGINT | SIGTERM => {
                        tracing::warn!("termination signal received, cleaning up");
                        best_effort_cleanup();
                        std::process::exit(128 + signal);
                    }
                    _ => {}
                }
            }
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};
    use fline_text::geometry::RenderData;

    fn key(code: crossterm::event::KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn plain_chars_and_escape_stay_characters() {
        let unit = map_key_event(key(crossterm::event::KeyCode::Char('a'), KeyModifiers::NONE));
        assert_eq!(unit, Some(RawUnit::char('a')));
        let unit = map_key_event(key(crossterm::event::KeyCode::Esc, KeyModifiers::NONE));
        assert_eq!(unit, Some(RawUnit::char('\x1b')));
    }

    #[test]
    fn modified_chars_become_keys() {
        let unit = map_key_event(key(
            crossterm::event::KeyCode::Char('c'),
            KeyModifiers::CONTROL | KeyModifiers::SHIFT,
        ));
        assert_eq!(
            unit,
            Some(RawUnit::key(
                KeyCode::Char('C'),
                Modifiers::CTRL | Modifiers::SHIFT
            ))
        );
    }

    #[test]
    fn back_tab_and_null_map_to_chords() {
        let unit = map_key_event(key(crossterm::event::KeyCode::BackTab, KeyModifiers::SHIFT));
        assert_eq!(unit, Some(RawUnit::key(KeyCode::Tab, Modifiers::SHIFT)));
        let unit = map_key_event(key(crossterm::event::KeyCode::Null, KeyModifiers::NONE));
        assert_eq!(unit, Some(RawUnit::key(KeyCode::Char(' '), Modifiers::CTRL)));
    }

    #[test]
    fn releases_are_dropped() {
        let mut event = key(crossterm::event::KeyCode::Char('a'), KeyModifiers::NONE);
        event.kind = KeyEventKind::Release;
        assert_eq!(map_key_event(event), None);
    }

    #[test]
    fn paste_stays_one_event() {
        let events = map_event(crossterm::event::Event::Paste("a\tb\x1b[Ac".into()));
        assert_eq!(events, vec![InputEvent::Paste("a\tb\x1b[Ac".into())]);
    }

    #[test]
    fn render_writes_text_and_continuation_prompt() {
        let render = RenderData::from_text("ab\ncd", 20, 3);
        let frame = RenderFrame {
            anchor: ScreenPoint::new(2, 0),
            render: &render,
            spans: &[],
            continuation_prompt: ">> ",
            suggestion: None,
            selection: None,
            previous_rows: 0,
        };
        let mut console = CrosstermConsole::new(Vec::new()).with_size(20, 24);
        console.render(&frame).unwrap();
        let written = String::from_utf8(console.out).unwrap();
        assert!(written.contains("ab"));
        assert!(written.contains(">> "));
        assert!(written.contains("cd"));
    }

    fn flush_frame<'a>(render: &'a RenderData) -> RenderFrame<'a> {
        RenderFrame {
            anchor: ScreenPoint::new(0, 0),
            render,
            spans: &[],
            continuation_prompt: "",
            suggestion: None,
            selection: None,
            previous_rows: 0,
        }
    }

    #[test]
    fn flush_last_row_scrolls_for_the_cursor_row() {
        // "abcd" fills the only row; the cursor after it needs a second row.
        let render = RenderData::from_text("abcd", 4, 0);
        let mut console = CrosstermConsole::new(Vec::new()).with_size(4, 24);
        console.origin = 23;
        console.render(&flush_frame(&render)).unwrap();
        assert_eq!(console.origin, 22);
    }

    #[test]
    fn partial_last_row_does_not_scroll() {
        let render = RenderData::from_text("abc", 4, 0);
        let mut console = CrosstermConsole::new(Vec::new()).with_size(4, 24);
        console.origin = 23;
        console.render(&flush_frame(&render)).unwrap();
        assert_eq!(console.origin, 23);
    }
}
