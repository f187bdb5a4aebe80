#![forbid(unsafe_code)]

//! Raw input decoder.
//!
//! Turns a stream of [`RawUnit`]s into normalized [`KeyChord`]s, resolving
//! escape-sequence ambiguity with a timeout.
//!
//! # Design
//!
//! The decoder is a state machine:
//!
//! - `Ground`: no pending escape. Control characters map straight to named
//!   keys; printable characters pass through.
//! - `AwaitingEscapeBody`: an ESC was seen and nothing after it yet.
//! - `AwaitingTerminator`: inside `ESC [`, collecting decimal parameters and
//!   `;` until a final letter or `~`.
//! - `AwaitingSs3Final`: after `ESC O`, waiting for the single final letter.
//!
//! ## Invariants
//! 1. A pending escape never outlives its deadline: the first call to
//!    [`feed_at`](InputDecoder::feed_at) or
//!    [`flush_expired`](InputDecoder::flush_expired) at or after the deadline
//!    resolves it before anything else happens.
//! 2. Every consumed unit eventually contributes to at least one chord; the
//!    decoder never reports an error.
//!
//! ## Failure Modes
//! - A lone ESC that times out becomes one `Escape` chord.
//! - `ESC O` that times out becomes `Alt+O` (it is itself a complete encoding).
//! - An incomplete `ESC [` sequence that times out is flushed one chord per
//!   unit, unmerged.
//! - Unknown or over-long sequences degrade to the same per-unit emission.
//!
//! # Example
//!
//! ```
//! use fline_core::decoder::InputDecoder;
//! use fline_core::key::{KeyCode, Modifiers};
//! use std::time::Instant;
//!
//! let mut decoder = InputDecoder::default();
//! decoder.feed_bytes(b"\x1b[1;2B", Instant::now());
//! let chord = decoder.take_chord().unwrap();
//! assert_eq!(chord.code, KeyCode::Down);
//! assert_eq!(chord.modifiers, Modifiers::SHIFT);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use crate::key::{KeyChord, KeyCode, Modifiers, RawUnit};
use crate::logging::trace;

/// Default wait for the next unit of an escape sequence.
pub const DEFAULT_ESCAPE_TIMEOUT: Duration = Duration::from_millis(50);

/// Parameterized sequences longer than this degrade to raw emission.
const MAX_SEQUENCE_LEN: usize = 64;

const ESC: char = '\x1b';

/// Decoder state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DecoderState {
    /// No pending escape.
    #[default]
    Ground,
    /// After ESC.
    AwaitingEscapeBody,
    /// After ESC [, collecting parameters.
    AwaitingTerminator,
    /// After ESC O.
    AwaitingSs3Final,
}

/// Escape-sequence decoder with timeout-based disambiguation.
pub struct InputDecoder {
    state: DecoderState,
    /// Units collected since the unresolved ESC.
    pending: Vec<RawUnit>,
    /// When the pending sequence is abandoned.
    deadline: Option<Instant>,
    escape_timeout: Duration,
    output: VecDeque<KeyChord>,
    utf8: Utf8Collector,
    /// When a partial UTF-8 character is abandoned.
    utf8_deadline: Option<Instant>,
}

impl fmt::Debug for InputDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputDecoder")
            .field("state", &self.state)
            .field("pending_len", &self.pending.len())
            .field("queued", &self.output.len())
            .field("escape_timeout", &self.escape_timeout)
            .finish()
    }
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_ESCAPE_TIMEOUT)
    }
}

impl InputDecoder {
    /// Create a decoder with the given escape timeout.
    #[must_use]
    pub fn new(escape_timeout: Duration) -> Self {
        Self {
            state: DecoderState::Ground,
            pending: Vec::with_capacity(8),
            deadline: None,
            escape_timeout,
            output: VecDeque::new(),
            utf8: Utf8Collector::default(),
            utf8_deadline: None,
        }
    }

    /// Current escape timeout.
    #[must_use]
    pub fn escape_timeout(&self) -> Duration {
        self.escape_timeout
    }

    /// Change the escape timeout. Applies from the next unit on.
    pub fn set_escape_timeout(&mut self, timeout: Duration) {
        self.escape_timeout = timeout;
    }

    /// Feed one unit using the wall clock.
    pub fn feed(&mut self, unit: RawUnit) {
        self.feed_at(unit, Instant::now());
    }

    /// Feed one unit observed at `now`.
    ///
    /// A partial UTF-8 character from [`feed_bytes`](Self::feed_bytes) is
    /// abandoned first, so the unit never overtakes it.
    pub fn feed_at(&mut self, unit: RawUnit, now: Instant) {
        self.flush_expired(now);
        if self.utf8.is_partial() {
            trace!("partial UTF-8 character interrupted by a unit");
            self.abandon_utf8(now);
        }

        if let Some(key) = unit.key {
            if self.is_pending() {
                self.resolve_pending();
            }
            self.emit(normalize(KeyChord::new(key).with_modifiers(unit.modifiers)));
            return;
        }

        self.process_char(unit, now);
    }

    /// Feed raw terminal bytes observed at `now`.
    ///
    /// UTF-8 is decoded across calls; invalid sequences become U+FFFD. A
    /// partial character still incomplete after the escape timeout is
    /// abandoned the same way.
    pub fn feed_bytes(&mut self, bytes: &[u8], now: Instant) {
        for &byte in bytes {
            if self.utf8.interrupted_by(byte) {
                self.utf8_deadline = None;
                self.feed_at(RawUnit::char(char::REPLACEMENT_CHARACTER), now);
            }
            match self.utf8.push(byte) {
                Some(ch) => {
                    self.utf8_deadline = None;
                    self.feed_at(RawUnit::char(ch), now);
                }
                None => {
                    self.utf8_deadline.get_or_insert(now + self.escape_timeout);
                }
            }
        }
    }

    /// Resolve the pending sequence if its deadline has passed.
    ///
    /// Returns `true` when something was flushed.
    pub fn flush_expired(&mut self, now: Instant) -> bool {
        let mut flushed = false;
        if self.deadline.is_some_and(|deadline| now >= deadline) {
            trace!(pending = self.pending.len(), "escape deadline expired");
            self.resolve_pending();
            flushed = true;
        }
        if self.utf8_deadline.is_some_and(|deadline| now >= deadline) {
            trace!("partial UTF-8 character expired");
            self.abandon_utf8(now);
            flushed = true;
        }
        flushed
    }

    /// Resolve anything pending immediately, as if it had timed out.
    pub fn flush(&mut self) {
        let now = Instant::now();
        if self.utf8.is_partial() {
            self.abandon_utf8(now);
        }
        self.resolve_pending();
    }

    /// Whether a decoded chord is ready.
    #[must_use]
    pub fn has_chord(&self) -> bool {
        !self.output.is_empty()
    }

    /// Take the next decoded chord.
    pub fn take_chord(&mut self) -> Option<KeyChord> {
        self.output.pop_front()
    }

    /// Drain all decoded chords.
    pub fn drain(&mut self) -> impl Iterator<Item = KeyChord> + '_ {
        self.output.drain(..)
    }

    /// Whether an escape sequence is waiting for more input.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state != DecoderState::Ground || self.utf8.is_partial()
    }

    /// Time left before the pending sequence is abandoned.
    ///
    /// Returns `None` if nothing is pending.
    #[must_use]
    pub fn time_until_deadline(&self, now: Instant) -> Option<Duration> {
        let deadline = match (self.deadline, self.utf8_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        deadline.map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Discard all pending and decoded state.
    pub fn reset(&mut self) {
        self.state = DecoderState::Ground;
        self.pending.clear();
        self.deadline = None;
        self.output.clear();
        self.utf8 = Utf8Collector::default();
        self.utf8_deadline = None;
    }

    fn abandon_utf8(&mut self, now: Instant) {
        self.utf8 = Utf8Collector::default();
        self.utf8_deadline = None;
        self.process_char(RawUnit::char(char::REPLACEMENT_CHARACTER), now);
    }

    fn process_char(&mut self, unit: RawUnit, now: Instant) {
        match self.state {
            DecoderState::Ground => self.process_ground(unit, now),
            DecoderState::AwaitingEscapeBody => self.process_escape_body(unit, now),
            DecoderState::AwaitingTerminator => self.process_terminator(unit, now),
            DecoderState::AwaitingSs3Final => self.process_ss3(unit, now),
        }
    }

    fn process_ground(&mut self, unit: RawUnit, now: Instant) {
        if unit.ch == ESC && unit.modifiers.is_empty() {
            self.begin_pending(unit, now);
        } else {
            self.emit(ground_chord(unit));
        }
    }

    fn process_escape_body(&mut self, unit: RawUnit, now: Instant) {
        match unit.ch {
            '[' => self.extend_pending(unit, DecoderState::AwaitingTerminator, now),
            'O' => self.extend_pending(unit, DecoderState::AwaitingSs3Final, now),
            ESC => {
                // Two escapes are two Escape keys, never Alt+Escape.
                self.emit(KeyChord::new(KeyCode::Escape));
                self.pending.clear();
                self.begin_pending(unit, now);
            }
            _ => {
                self.clear_pending();
                self.emit(ground_chord(unit).plus(Modifiers::ALT));
            }
        }
    }

    fn process_terminator(&mut self, unit: RawUnit, now: Instant) {
        match unit.ch {
            '0'..='9' | ';' => {
                if self.pending.len() >= MAX_SEQUENCE_LEN {
                    trace!("parameterized sequence too long, degrading");
                    self.flush_pending_raw();
                    self.process_ground(unit, now);
                } else {
                    self.extend_pending(unit, DecoderState::AwaitingTerminator, now);
                }
            }
            'A'..='Z' | 'a'..='z' | '~' => {
                self.pending.push(unit);
                match parse_csi(&self.pending) {
                    Some(chord) => {
                        self.clear_pending();
                        self.emit(chord);
                    }
                    None => {
                        trace!("unrecognized CSI sequence, degrading");
                        self.flush_pending_raw();
                    }
                }
            }
            _ => {
                self.flush_pending_raw();
                self.process_ground(unit, now);
            }
        }
    }

    fn process_ss3(&mut self, unit: RawUnit, now: Instant) {
        match ss3_key(unit.ch) {
            Some(code) => {
                self.clear_pending();
                self.emit(KeyChord::new(code));
            }
            None => {
                self.clear_pending();
                self.emit(KeyChord::char('O').with_modifiers(Modifiers::ALT));
                self.process_ground(unit, now);
            }
        }
    }

    fn begin_pending(&mut self, unit: RawUnit, now: Instant) {
        self.pending.push(unit);
        self.state = DecoderState::AwaitingEscapeBody;
        self.deadline = Some(now + self.escape_timeout);
    }

    fn extend_pending(&mut self, unit: RawUnit, state: DecoderState, now: Instant) {
        self.pending.push(unit);
        self.state = state;
        self.deadline = Some(now + self.escape_timeout);
    }

    fn clear_pending(&mut self) {
        self.pending.clear();
        self.state = DecoderState::Ground;
        self.deadline = None;
    }

    /// Resolve the pending sequence the way a timeout does.
    fn resolve_pending(&mut self) {
        match self.state {
            DecoderState::Ground => {}
            DecoderState::AwaitingEscapeBody => {
                self.clear_pending();
                self.emit(KeyChord::new(KeyCode::Escape));
            }
            DecoderState::AwaitingSs3Final => {
                self.clear_pending();
                self.emit(KeyChord::char('O').with_modifiers(Modifiers::ALT));
            }
            DecoderState::AwaitingTerminator => self.flush_pending_raw(),
        }
    }

    /// Emit every pending unit as its own chord, unmerged.
    fn flush_pending_raw(&mut self) {
        let units = std::mem::take(&mut self.pending);
        self.clear_pending();
        for unit in units {
            self.emit(ground_chord(unit));
        }
    }

    fn emit(&mut self, chord: KeyChord) {
        self.output.push_back(chord);
    }
}

/// Map a character unit outside any escape sequence to a chord.
fn ground_chord(unit: RawUnit) -> KeyChord {
    let mods = unit.modifiers;
    let chord = match unit.ch {
        '\r' | '\n' => KeyChord::new(KeyCode::Enter),
        '\t' => KeyChord::new(KeyCode::Tab),
        '\x7f' | '\x08' => KeyChord::new(KeyCode::Backspace),
        ESC => KeyChord::new(KeyCode::Escape),
        '\0' => KeyChord::char(' ').with_modifiers(Modifiers::CTRL),
        c @ '\x01'..='\x1a' => {
            let letter = char::from(b'a' + (c as u8) - 1);
            KeyChord::char(letter).with_modifiers(Modifiers::CTRL)
        }
        c @ '\x1c'..='\x1f' => {
            let symbol = char::from(b'\\' + (c as u8) - 0x1c);
            KeyChord::char(symbol).with_modifiers(Modifiers::CTRL)
        }
        c => KeyChord::char(c),
    };
    normalize(chord.plus(mods))
}

/// Printable characters never carry Shift; the character is already shifted.
fn normalize(mut chord: KeyChord) -> KeyChord {
    if let KeyCode::Char(c) = chord.code {
        if !c.is_ascii_digit() && !c.is_control() {
            chord.modifiers.remove(Modifiers::SHIFT);
        }
    }
    chord
}

fn ss3_key(final_char: char) -> Option<KeyCode> {
    let code = match final_char {
        'A' => KeyCode::Up,
        'B' => KeyCode::Down,
        'C' => KeyCode::Right,
        'D' => KeyCode::Left,
        'H' => KeyCode::Home,
        'F' => KeyCode::End,
        'P' => KeyCode::F(1),
        'Q' => KeyCode::F(2),
        'R' => KeyCode::F(3),
        'S' => KeyCode::F(4),
        _ => return None,
    };
    Some(code)
}

/// Parse a complete `ESC [ params final` sequence.
fn parse_csi(units: &[RawUnit]) -> Option<KeyChord> {
    let (last, body) = units.split_last()?;
    // body = ESC '[' params...
    let params: String = body.iter().skip(2).map(|unit| unit.ch).collect();
    let mut fields = params.split(';');
    let first = parse_param(fields.next())?;
    let modifiers = match fields.next() {
        Some(raw) => Modifiers::from_xterm_param(parse_param(Some(raw))?.unwrap_or(1)),
        None => Modifiers::NONE,
    };
    if fields.next().is_some() {
        return None;
    }

    let code = match last.ch {
        'A' => KeyCode::Up,
        'B' => KeyCode::Down,
        'C' => KeyCode::Right,
        'D' => KeyCode::Left,
        'H' => KeyCode::Home,
        'F' => KeyCode::End,
        'P' => KeyCode::F(1),
        'Q' => KeyCode::F(2),
        'R' => KeyCode::F(3),
        'S' => KeyCode::F(4),
        'Z' => {
            return Some(KeyChord::new(KeyCode::Tab).with_modifiers(modifiers | Modifiers::SHIFT));
        }
        '~' => tilde_key(first?)?,
        _ => return None,
    };
    Some(KeyChord::new(code).with_modifiers(modifiers))
}

/// Parse one decimal field. `Some(None)` means the field was empty.
fn parse_param(field: Option<&str>) -> Option<Option<u32>> {
    match field {
        None | Some("") => Some(None),
        Some(digits) => digits.parse().ok().map(Some),
    }
}

fn tilde_key(number: u32) -> Option<KeyCode> {
    let code = match number {
        1 | 7 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 | 8 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        15 => KeyCode::F(5),
        17 => KeyCode::F(6),
        18 => KeyCode::F(7),
        19 => KeyCode::F(8),
        20 => KeyCode::F(9),
        21 => KeyCode::F(10),
        23 => KeyCode::F(11),
        24 => KeyCode::F(12),
        _ => return None,
    };
    Some(code)
}

/// Incremental UTF-8 collector for byte input.
#[derive(Debug, Default)]
struct Utf8Collector {
    buffer: [u8; 4],
    collected: u8,
    expected: u8,
}

impl Utf8Collector {
    fn is_partial(&self) -> bool {
        self.expected != 0
    }

    /// A partial character is broken by a byte that cannot continue it.
    /// The collector resets so the byte can be taken fresh.
    fn interrupted_by(&mut self, byte: u8) -> bool {
        if self.is_partial() && byte & 0xC0 != 0x80 {
            self.expected = 0;
            self.collected = 0;
            return true;
        }
        false
    }

    fn push(&mut self, byte: u8) -> Option<char> {
        if self.expected == 0 {
            return match byte {
                0x00..=0x7F => Some(char::from(byte)),
                0xC0..=0xDF => self.start(byte, 2),
                0xE0..=0xEF => self.start(byte, 3),
                0xF0..=0xF7 => self.start(byte, 4),
                _ => Some(char::REPLACEMENT_CHARACTER),
            };
        }

        self.buffer[self.collected as usize] = byte;
        self.collected += 1;
        if self.collected < self.expected {
            return None;
        }

        let len = self.expected as usize;
        self.expected = 0;
        self.collected = 0;
        let decoded = std::str::from_utf8(&self.buffer[..len])
            .ok()
            .and_then(|s| s.chars().next());
        Some(decoded.unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn start(&mut self, byte: u8, expected: u8) -> Option<char> {
        self.buffer[0] = byte;
        self.collected = 1;
        self.expected = expected;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_10: Duration = Duration::from_millis(10);
    const MS_100: Duration = Duration::from_millis(100);

    fn decode_all(decoder: &mut InputDecoder) -> Vec<KeyChord> {
        decoder.drain().collect()
    }

    #[test]
    fn printable_ascii_passes_through() {
        let mut decoder = InputDecoder::default();
        decoder.feed_bytes(b"ab", Instant::now());
        assert_eq!(
            decode_all(&mut decoder),
            vec![KeyChord::char('a'), KeyChord::char('b')]
        );
    }

    #[test]
    fn control_bytes_map_to_named_keys() {
        let mut decoder = InputDecoder::default();
        decoder.feed_bytes(b"\r\x03\x7f\t\x00", Instant::now());
        assert_eq!(
            decode_all(&mut decoder),
            vec![
                KeyChord::new(KeyCode::Enter),
                KeyChord::char('c').with_modifiers(Modifiers::CTRL),
                KeyChord::new(KeyCode::Backspace),
                KeyChord::new(KeyCode::Tab),
                KeyChord::char(' ').with_modifiers(Modifiers::CTRL),
            ]
        );
    }

    #[test]
    fn ctrl_symbols() {
        let mut decoder = InputDecoder::default();
        decoder.feed_bytes(&[0x1c, 0x1d, 0x1f], Instant::now());
        assert_eq!(
            decode_all(&mut decoder),
            vec![
                KeyChord::char('\\').with_modifiers(Modifiers::CTRL),
                KeyChord::char(']').with_modifiers(Modifiers::CTRL),
                KeyChord::char('_').with_modifiers(Modifiers::CTRL),
            ]
        );
    }

    #[test]
    fn lone_escape_waits_for_timeout() {
        let mut decoder = InputDecoder::new(MS_100);
        let t = Instant::now();
        decoder.feed_bytes(b"\x1b", t);
        assert!(!decoder.has_chord());
        assert!(decoder.is_pending());

        assert!(!decoder.flush_expired(t + MS_10));
        assert!(decoder.flush_expired(t + MS_100));
        assert_eq!(decode_all(&mut decoder), vec![KeyChord::new(KeyCode::Escape)]);
        assert!(!decoder.is_pending());
    }

    #[test]
    fn escape_letter_merges_to_alt() {
        let mut decoder = InputDecoder::default();
        decoder.feed_bytes(b"\x1bf", Instant::now());
        assert_eq!(
            decode_all(&mut decoder),
            vec![KeyChord::char('f').with_modifiers(Modifiers::ALT)]
        );
    }

    #[test]
    fn escape_backspace_is_alt_backspace() {
        let mut decoder = InputDecoder::default();
        decoder.feed_bytes(b"\x1b\x7f", Instant::now());
        assert_eq!(
            decode_all(&mut decoder),
            vec![KeyChord::new(KeyCode::Backspace).with_modifiers(Modifiers::ALT)]
        );
    }

    #[test]
    fn double_escape_is_two_escapes() {
        let mut decoder = InputDecoder::new(MS_100);
        let t = Instant::now();
        decoder.feed_bytes(b"\x1b\x1b", t);
        assert_eq!(decode_all(&mut decoder), vec![KeyChord::new(KeyCode::Escape)]);
        decoder.flush_expired(t + MS_100);
        assert_eq!(decode_all(&mut decoder), vec![KeyChord::new(KeyCode::Escape)]);
    }

    #[test]
    fn late_unit_resolves_expired_escape_first() {
        let mut decoder = InputDecoder::new(MS_10);
        let t = Instant::now();
        decoder.feed_bytes(b"\x1b", t);
        // 'x' arrives after the deadline: Escape then 'x', not Alt+x.
        decoder.feed_bytes(b"x", t + MS_100);
        assert_eq!(
            decode_all(&mut decoder),
            vec![KeyChord::new(KeyCode::Escape), KeyChord::char('x')]
        );
    }

    #[test]
    fn deadline_refreshes_per_unit() {
        let mut decoder = InputDecoder::new(MS_100);
        let t = Instant::now();
        decoder.feed_bytes(b"\x1b", t);
        decoder.feed_bytes(b"[", t + Duration::from_millis(90));
        assert!(!decoder.flush_expired(t + Duration::from_millis(150)));
        decoder.feed_bytes(b"A", t + Duration::from_millis(160));
        assert_eq!(decode_all(&mut decoder), vec![KeyChord::new(KeyCode::Up)]);
    }

    #[test]
    fn tilde_keys() {
        let mut decoder = InputDecoder::default();
        decoder.feed_bytes(b"\x1b[3~\x1b[5;5~\x1b[15~", Instant::now());
        assert_eq!(
            decode_all(&mut decoder),
            vec![
                KeyChord::new(KeyCode::Delete),
                KeyChord::new(KeyCode::PageUp).with_modifiers(Modifiers::CTRL),
                KeyChord::new(KeyCode::F(5)),
            ]
        );
    }

    #[test]
    fn back_tab() {
        let mut decoder = InputDecoder::default();
        decoder.feed_bytes(b"\x1b[Z", Instant::now());
        assert_eq!(
            decode_all(&mut decoder),
            vec![KeyChord::new(KeyCode::Tab).with_modifiers(Modifiers::SHIFT)]
        );
    }

    #[test]
    fn ss3_alternate_up_arrow() {
        let mut decoder = InputDecoder::default();
        decoder.feed_bytes(b"\x1bOA\x1bOP", Instant::now());
        assert_eq!(
            decode_all(&mut decoder),
            vec![KeyChord::new(KeyCode::Up), KeyChord::new(KeyCode::F(1))]
        );
    }

    #[test]
    fn ss3_with_unknown_final_degrades() {
        let mut decoder = InputDecoder::default();
        decoder.feed_bytes(b"\x1bOz", Instant::now());
        assert_eq!(
            decode_all(&mut decoder),
            vec![
                KeyChord::char('O').with_modifiers(Modifiers::ALT),
                KeyChord::char('z'),
            ]
        );
    }

    #[test]
    fn unknown_csi_final_flushes_raw() {
        let mut decoder = InputDecoder::default();
        decoder.feed_bytes(b"\x1b[9q", Instant::now());
        assert_eq!(
            decode_all(&mut decoder),
            vec![
                KeyChord::new(KeyCode::Escape),
                KeyChord::char('['),
                KeyChord::char('9'),
                KeyChord::char('q'),
            ]
        );
    }

    #[test]
    fn interrupted_csi_reprocesses_interrupting_unit() {
        let mut decoder = InputDecoder::new(MS_100);
        let t = Instant::now();
        decoder.feed_bytes(b"\x1b[1\x1b", t);
        assert_eq!(
            decode_all(&mut decoder),
            vec![
                KeyChord::new(KeyCode::Escape),
                KeyChord::char('['),
                KeyChord::char('1'),
            ]
        );
        assert!(decoder.is_pending());
    }

    #[test]
    fn over_long_sequence_degrades() {
        let mut decoder = InputDecoder::default();
        let mut bytes = b"\x1b[".to_vec();
        bytes.extend(std::iter::repeat_n(b'1', MAX_SEQUENCE_LEN + 4));
        bytes.push(b'A');
        decoder.feed_bytes(&bytes, Instant::now());
        decoder.flush();
        assert!(!decoder.is_pending());
        assert!(decode_all(&mut decoder).len() > MAX_SEQUENCE_LEN);
    }

    #[test]
    fn named_key_units_bypass_decoding() {
        let mut decoder = InputDecoder::default();
        let t = Instant::now();
        decoder.feed_at(RawUnit::key(KeyCode::Left, Modifiers::CTRL), t);
        assert_eq!(
            decode_all(&mut decoder),
            vec![KeyChord::new(KeyCode::Left).with_modifiers(Modifiers::CTRL)]
        );
    }

    #[test]
    fn named_key_resolves_pending_escape() {
        let mut decoder = InputDecoder::default();
        let t = Instant::now();
        decoder.feed_bytes(b"\x1b", t);
        decoder.feed_at(RawUnit::key(KeyCode::Home, Modifiers::NONE), t);
        assert_eq!(
            decode_all(&mut decoder),
            vec![KeyChord::new(KeyCode::Escape), KeyChord::new(KeyCode::Home)]
        );
    }

    #[test]
    fn named_key_flushes_partial_utf8_first() {
        let mut decoder = InputDecoder::default();
        let t = Instant::now();
        decoder.feed_bytes(&[0xE2, 0x82], t);
        decoder.feed_at(RawUnit::key(KeyCode::Left, Modifiers::NONE), t);
        assert_eq!(
            decode_all(&mut decoder),
            vec![
                KeyChord::char(char::REPLACEMENT_CHARACTER),
                KeyChord::new(KeyCode::Left)
            ]
        );
        assert!(!decoder.is_pending());

        // The abandoned bytes do not complete a later character.
        decoder.feed_bytes(&[0xAC], t);
        assert_eq!(
            decode_all(&mut decoder),
            vec![KeyChord::char(char::REPLACEMENT_CHARACTER)]
        );
    }

    #[test]
    fn shift_dropped_from_printable_chars() {
        let mut decoder = InputDecoder::default();
        decoder.feed_at(
            RawUnit::char('A').with_modifiers(Modifiers::SHIFT),
            Instant::now(),
        );
        assert_eq!(decode_all(&mut decoder), vec![KeyChord::char('A')]);
    }

    #[test]
    fn utf8_across_calls() {
        let mut decoder = InputDecoder::default();
        let t = Instant::now();
        decoder.feed_bytes(&[0xC3], t);
        assert!(!decoder.has_chord());
        decoder.feed_bytes(&[0xA9], t);
        assert_eq!(decode_all(&mut decoder), vec![KeyChord::char('é')]);
    }

    #[test]
    fn invalid_utf8_becomes_replacement() {
        let mut decoder = InputDecoder::default();
        decoder.feed_bytes(&[0xFF, b'a'], Instant::now());
        assert_eq!(
            decode_all(&mut decoder),
            vec![KeyChord::char(char::REPLACEMENT_CHARACTER), KeyChord::char('a')]
        );
    }

    #[test]
    fn broken_utf8_keeps_following_byte() {
        let mut decoder = InputDecoder::default();
        decoder.feed_bytes(&[0xC3, b'a'], Instant::now());
        assert_eq!(
            decode_all(&mut decoder),
            vec![KeyChord::char(char::REPLACEMENT_CHARACTER), KeyChord::char('a')]
        );
    }

    #[test]
    fn partial_utf8_expires() {
        let mut decoder = InputDecoder::new(MS_10);
        let t = Instant::now();
        decoder.feed_bytes(&[0xE2, 0x82], t);
        assert!(decoder.is_pending());
        assert!(decoder.flush_expired(t + MS_10));
        assert_eq!(
            decode_all(&mut decoder),
            vec![KeyChord::char(char::REPLACEMENT_CHARACTER)]
        );
        assert!(!decoder.is_pending());
    }

    #[test]
    fn time_until_deadline_tracks_pending() {
        let mut decoder = InputDecoder::new(MS_100);
        let t = Instant::now();
        assert!(decoder.time_until_deadline(t).is_none());
        decoder.feed_bytes(b"\x1b", t);
        assert_eq!(decoder.time_until_deadline(t + MS_10), Some(Duration::from_millis(90)));
    }

    #[test]
    fn reset_discards_everything() {
        let mut decoder = InputDecoder::default();
        let t = Instant::now();
        decoder.feed_bytes(b"a\x1b[", t);
        decoder.reset();
        assert!(!decoder.is_pending());
        assert!(!decoder.has_chord());
    }

    #[test]
    fn debug_format() {
        let decoder = InputDecoder::default();
        assert!(format!("{decoder:?}").contains("InputDecoder"));
    }
}
