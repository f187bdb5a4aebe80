#![forbid(unsafe_code)]

//! Canonical key types.
//!
//! Two levels of key event exist:
//!
//! - [`RawUnit`] is one input unit exactly as the terminal delivered it: a
//!   character (possibly NUL), an optional already-resolved named key, and a
//!   modifier set. Byte-oriented terminals only ever produce characters.
//! - [`KeyChord`] is the normalized event after escape decoding. Bindings,
//!   the resolver and the digit-argument machinery only see chords.
//!
//! # Design Notes
//!
//! - Printable characters never carry `SHIFT`; the shifted character itself
//!   is the key (`'A'`, `'$'`). Named keys and digits keep `SHIFT`.
//! - `Modifiers` use bitflags with the xterm bit order (Shift=1, Alt=2, Ctrl=4)
//!   so CSI modifier parameters decode with a plain mask.

use std::fmt;

use bitflags::bitflags;

/// Key codes for normalized chords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyCode {
    /// A literal character key.
    Char(char),
    /// Enter/Return key.
    Enter,
    /// Escape key.
    Escape,
    /// Backspace key.
    Backspace,
    /// Tab key.
    Tab,
    /// Delete key.
    Delete,
    /// Insert key.
    Insert,
    /// Home key.
    Home,
    /// End key.
    End,
    /// Page Up key.
    PageUp,
    /// Page Down key.
    PageDown,
    /// Up arrow key.
    Up,
    /// Down arrow key.
    Down,
    /// Left arrow key.
    Left,
    /// Right arrow key.
    Right,
    /// Function key (F1-F24).
    F(u8),
}

impl KeyCode {
    /// Whether this code is a printable character (not a control character).
    #[must_use]
    pub fn is_printable(&self) -> bool {
        matches!(self, Self::Char(c) if !c.is_control())
    }

    /// The decimal value when this code is an ASCII digit.
    #[must_use]
    pub fn digit_value(&self) -> Option<u8> {
        match self {
            Self::Char(c) => c.to_digit(10).map(|d| d as u8),
            _ => None,
        }
    }
}

bitflags! {
    /// Modifier keys held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b000;
        /// Shift key.
        const SHIFT = 0b001;
        /// Alt/Option key.
        const ALT   = 0b010;
        /// Control key.
        const CTRL  = 0b100;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

impl Modifiers {
    /// Decode an xterm modifier parameter (`1 + bitmask`).
    ///
    /// A parameter of 0 or 1 means no modifiers.
    #[must_use]
    pub fn from_xterm_param(value: u32) -> Self {
        let bits = value.saturating_sub(1);
        Self::from_bits_truncate((bits & 0b111) as u8)
    }
}

/// A normalized, fully resolved key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyChord {
    /// The key that was pressed.
    pub code: KeyCode,
    /// Modifier keys held during the press.
    pub modifiers: Modifiers,
}

impl KeyChord {
    /// Create a chord with no modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
        }
    }

    /// Create a plain character chord.
    #[must_use]
    pub const fn char(c: char) -> Self {
        Self::new(KeyCode::Char(c))
    }

    /// Replace the modifier set.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Add modifiers to the existing set.
    #[must_use]
    pub fn plus(mut self, modifiers: Modifiers) -> Self {
        self.modifiers |= modifiers;
        self
    }

    /// Check if Ctrl modifier is held.
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }

    /// Check if Alt modifier is held.
    #[must_use]
    pub const fn alt(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    /// Check if Shift modifier is held.
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }

    /// The character this chord inserts when typed, if any.
    ///
    /// Only printable characters without Ctrl or Alt insert text.
    #[must_use]
    pub fn insertable_char(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c) if !c.is_control() && !self.ctrl() && !self.alt() => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl() {
            f.write_str("Ctrl+")?;
        }
        if self.alt() {
            f.write_str("Alt+")?;
        }
        if self.shift() {
            f.write_str("Shift+")?;
        }
        match self.code {
            KeyCode::Char(' ') => f.write_str("Spacebar"),
            KeyCode::Char('-') => f.write_str("Minus"),
            KeyCode::Char('+') => f.write_str("Plus"),
            KeyCode::Char(',') => f.write_str("Comma"),
            KeyCode::Char(c) if c.is_ascii_uppercase() => {
                write!(f, "Shift+{}", c.to_ascii_lowercase())
            }
            KeyCode::Char(c) => write!(f, "{c}"),
            KeyCode::Enter => f.write_str("Enter"),
            KeyCode::Escape => f.write_str("Escape"),
            KeyCode::Backspace => f.write_str("Backspace"),
            KeyCode::Tab => f.write_str("Tab"),
            KeyCode::Delete => f.write_str("Delete"),
            KeyCode::Insert => f.write_str("Insert"),
            KeyCode::Home => f.write_str("Home"),
            KeyCode::End => f.write_str("End"),
            KeyCode::PageUp => f.write_str("PageUp"),
            KeyCode::PageDown => f.write_str("PageDown"),
            KeyCode::Up => f.write_str("UpArrow"),
            KeyCode::Down => f.write_str("DownArrow"),
            KeyCode::Left => f.write_str("LeftArrow"),
            KeyCode::Right => f.write_str("RightArrow"),
            KeyCode::F(n) => write!(f, "F{n}"),
        }
    }
}

/// One input unit as delivered by the terminal.
///
/// Byte-oriented terminals deliver `ch` only (escape bytes included).
/// Terminals with a key API deliver `key` already resolved; such units
/// bypass escape decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawUnit {
    /// Character value; `'\0'` when the unit carries no character.
    pub ch: char,
    /// Named key, when the terminal resolved one.
    pub key: Option<KeyCode>,
    /// Modifiers reported with the unit.
    pub modifiers: Modifiers,
}

impl RawUnit {
    /// A plain character unit with no modifiers.
    #[must_use]
    pub const fn char(ch: char) -> Self {
        Self {
            ch,
            key: None,
            modifiers: Modifiers::NONE,
        }
    }

    /// A unit carrying an already-resolved key.
    #[must_use]
    pub const fn key(key: KeyCode, modifiers: Modifiers) -> Self {
        let ch = match key {
            KeyCode::Char(c) => c,
            _ => '\0',
        };
        Self {
            ch,
            key: Some(key),
            modifiers,
        }
    }

    /// Add modifiers to the unit.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

impl From<KeyChord> for RawUnit {
    fn from(chord: KeyChord) -> Self {
        Self::key(chord.code, chord.modifiers)
    }
}
