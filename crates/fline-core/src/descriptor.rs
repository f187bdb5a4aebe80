#![forbid(unsafe_code)]

//! Chord descriptor parsing.
//!
//! A descriptor names one chord as `Modifier(+Modifier)*+Key` and a
//! multi-chord sequence as chords joined by `,`:
//!
//! ```text
//! Ctrl+Shift+Alt+Home
//! ctrl-x,escape
//! d,0
//! ```
//!
//! Modifier separators `+` and `-` are interchangeable and matching is
//! case-insensitive. A chord that is exactly one character is that character
//! key, so `-` and `+` alone work; inside a modified chord use `Minus`,
//! `Plus` and `Comma` instead.
//!
//! Key names resolve through a fixed table ([`KEY_NAMES`]); nothing is looked
//! up dynamically.

use crate::key::{KeyChord, KeyCode, Modifiers};

/// Malformed descriptor text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    /// The descriptor has no content.
    #[error("empty key descriptor")]
    Empty,
    /// A separator had nothing on one side of it.
    #[error("empty token at position {position} in {descriptor:?}")]
    EmptyToken {
        /// The chord text being parsed.
        descriptor: String,
        /// Zero-based token index within the chord.
        position: usize,
    },
    /// A token is neither a modifier nor a known key.
    #[error("unknown key name {token:?} in {descriptor:?}")]
    UnknownKey {
        /// The chord text being parsed.
        descriptor: String,
        /// The offending token.
        token: String,
    },
    /// The same modifier appears twice in one chord.
    #[error("duplicate modifier {modifier} in {descriptor:?}")]
    DuplicateModifier {
        /// The chord text being parsed.
        descriptor: String,
        /// Canonical modifier name.
        modifier: &'static str,
    },
    /// Only modifiers were given.
    #[error("no key named in {descriptor:?}")]
    MissingKey {
        /// The chord text being parsed.
        descriptor: String,
    },
    /// More than one non-modifier token in one chord.
    #[error("more than one key in {descriptor:?}: {token:?}")]
    MultipleKeys {
        /// The chord text being parsed.
        descriptor: String,
        /// The second key token.
        token: String,
    },
}

/// Symbolic key names, lowercase.
pub const KEY_NAMES: &[(&str, KeyCode)] = &[
    ("enter", KeyCode::Enter),
    ("return", KeyCode::Enter),
    ("escape", KeyCode::Escape),
    ("esc", KeyCode::Escape),
    ("tab", KeyCode::Tab),
    ("backspace", KeyCode::Backspace),
    ("delete", KeyCode::Delete),
    ("del", KeyCode::Delete),
    ("insert", KeyCode::Insert),
    ("ins", KeyCode::Insert),
    ("home", KeyCode::Home),
    ("end", KeyCode::End),
    ("pageup", KeyCode::PageUp),
    ("pgup", KeyCode::PageUp),
    ("pagedown", KeyCode::PageDown),
    ("pgdn", KeyCode::PageDown),
    ("uparrow", KeyCode::Up),
    ("up", KeyCode::Up),
    ("downarrow", KeyCode::Down),
    ("down", KeyCode::Down),
    ("leftarrow", KeyCode::Left),
    ("left", KeyCode::Left),
    ("rightarrow", KeyCode::Right),
    ("right", KeyCode::Right),
    ("spacebar", KeyCode::Char(' ')),
    ("space", KeyCode::Char(' ')),
    ("minus", KeyCode::Char('-')),
    ("plus", KeyCode::Char('+')),
    ("comma", KeyCode::Char(',')),
];

/// Parse a full descriptor (one or more chords separated by `,`).
pub fn parse_sequence(descriptor: &str) -> Result<Vec<KeyChord>, DescriptorError> {
    if descriptor.trim().is_empty() {
        return Err(DescriptorError::Empty);
    }
    descriptor.split(',').map(parse_chord).collect()
}

/// Parse a single chord descriptor.
pub fn parse_chord(text: &str) -> Result<KeyChord, DescriptorError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DescriptorError::EmptyToken {
            descriptor: text.to_string(),
            position: 0,
        });
    }

    let mut chars = trimmed.chars();
    if let (Some(only), None) = (chars.next(), chars.next()) {
        return Ok(finish(KeyCode::Char(only), Modifiers::NONE));
    }

    let mut modifiers = Modifiers::NONE;
    let mut key: Option<KeyCode> = None;

    for (position, raw_token) in trimmed.split(['+', '-']).enumerate() {
        let token = raw_token.trim();
        if token.is_empty() {
            return Err(DescriptorError::EmptyToken {
                descriptor: trimmed.to_string(),
                position,
            });
        }

        if let Some((flag, name)) = modifier_name(token) {
            if modifiers.contains(flag) {
                return Err(DescriptorError::DuplicateModifier {
                    descriptor: trimmed.to_string(),
                    modifier: name,
                });
            }
            modifiers |= flag;
            continue;
        }

        let code = key_name(token).ok_or_else(|| DescriptorError::UnknownKey {
            descriptor: trimmed.to_string(),
            token: token.to_string(),
        })?;
        if key.is_some() {
            return Err(DescriptorError::MultipleKeys {
                descriptor: trimmed.to_string(),
                token: token.to_string(),
            });
        }
        key = Some(code);
    }

    match key {
        Some(code) => Ok(finish(code, modifiers)),
        None => Err(DescriptorError::MissingKey {
            descriptor: trimmed.to_string(),
        }),
    }
}

/// Render chords as canonical descriptor text.
#[must_use]
pub fn describe(chords: &[KeyChord]) -> String {
    chords
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn modifier_name(token: &str) -> Option<(Modifiers, &'static str)> {
    match token.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Some((Modifiers::CTRL, "Ctrl")),
        "alt" => Some((Modifiers::ALT, "Alt")),
        "shift" => Some((Modifiers::SHIFT, "Shift")),
        _ => None,
    }
}

fn key_name(token: &str) -> Option<KeyCode> {
    let mut chars = token.chars();
    if let (Some(only), None) = (chars.next(), chars.next()) {
        return (!only.is_control()).then_some(KeyCode::Char(only.to_ascii_lowercase()));
    }

    let lower = token.to_ascii_lowercase();
    if let Some(&(_, code)) = KEY_NAMES.iter().find(|(name, _)| *name == lower) {
        return Some(code);
    }

    let number = lower.strip_prefix('f')?;
    match number.parse::<u8>() {
        Ok(n @ 1..=24) if !number.starts_with('0') => Some(KeyCode::F(n)),
        _ => None,
    }
}

/// Apply the printable-character Shift rule.
fn finish(code: KeyCode, mut modifiers: Modifiers) -> KeyChord {
    let code = match code {
        KeyCode::Char(c) if c.is_ascii_alphabetic() => {
            if modifiers.contains(Modifiers::SHIFT) {
                modifiers.remove(Modifiers::SHIFT);
                KeyCode::Char(c.to_ascii_uppercase())
            } else {
                KeyCode::Char(c)
            }
        }
        KeyCode::Char(c) if !c.is_ascii_digit() => {
            modifiers.remove(Modifiers::SHIFT);
            KeyCode::Char(c)
        }
        other => other,
    };
    KeyChord::new(code).with_modifiers(modifiers)
}
