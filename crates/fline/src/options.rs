#![forbid(unsafe_code)]

//! Session options.
//!
//! [`EditOptions`] is a plain value: defaults, `with_*` builders, and
//! optional overrides from the environment. The session reads it once at
//! construction; nothing else consults it.
//!
//! | Variable                    | Field                 | Format                     |
//! |-----------------------------|-----------------------|----------------------------|
//! | `FLINE_EDIT_MODE`           | `edit_mode`           | `cmd`, `emacs`, `vi`       |
//! | `FLINE_ESCAPE_TIMEOUT_MS`   | `escape_timeout`      | integer milliseconds       |
//! | `FLINE_CONTINUATION_PROMPT` | `continuation_prompt` | any text                   |
//! | `FLINE_BELL_STYLE`          | `bell_style`          | `audible`, `visual`, `none` |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use fline_core::decoder::DEFAULT_ESCAPE_TIMEOUT;
use fline_core::digit_argument::DigitArgumentKeys;
use fline_text::buffer::{DEFAULT_KILL_RING_SIZE, DEFAULT_WORD_DELIMITERS};
use tracing::warn;

use crate::keymap::KeyMapKind;

/// Environment variable selecting the edit mode.
pub const ENV_EDIT_MODE: &str = "FLINE_EDIT_MODE";
/// Environment variable for the escape timeout in milliseconds.
pub const ENV_ESCAPE_TIMEOUT_MS: &str = "FLINE_ESCAPE_TIMEOUT_MS";
/// Environment variable for the continuation prompt.
pub const ENV_CONTINUATION_PROMPT: &str = "FLINE_CONTINUATION_PROMPT";
/// Environment variable selecting the bell style.
pub const ENV_BELL_STYLE: &str = "FLINE_BELL_STYLE";

/// Keyboard layout family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EditMode {
    /// Windows-console style.
    #[default]
    Cmd,
    /// Emacs style.
    Emacs,
    /// Vi style, starting in insert mode.
    Vi,
}

impl FromStr for EditMode {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cmd" | "windows" => Ok(Self::Cmd),
            "emacs" => Ok(Self::Emacs),
            "vi" => Ok(Self::Vi),
            _ => Err(ParseOptionError::new("edit mode", s)),
        }
    }
}

/// How a ding is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BellStyle {
    /// Ring the terminal bell.
    #[default]
    Audible,
    /// Flash instead of ringing.
    Visual,
    /// Stay silent.
    None,
}

impl FromStr for BellStyle {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audible" => Ok(Self::Audible),
            "visual" => Ok(Self::Visual),
            "none" => Ok(Self::None),
            _ => Err(ParseOptionError::new("bell style", s)),
        }
    }
}

/// An option value that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {option}: {value:?}")]
pub struct ParseOptionError {
    /// Which option was being parsed.
    pub option: &'static str,
    /// The rejected text.
    pub value: String,
}

impl ParseOptionError {
    fn new(option: &'static str, value: &str) -> Self {
        Self {
            option,
            value: value.to_string(),
        }
    }
}

/// Digit argument chords for each key map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitArgumentKeySets {
    /// Cmd map.
    pub cmd: DigitArgumentKeys,
    /// Emacs map.
    pub emacs: DigitArgumentKeys,
    /// Vi insert map.
    pub vi_insert: DigitArgumentKeys,
    /// Vi command map.
    pub vi_command: DigitArgumentKeys,
}

impl Default for DigitArgumentKeySets {
    fn default() -> Self {
        Self {
            cmd: DigitArgumentKeys::alt_digits(),
            emacs: DigitArgumentKeys::alt_digits(),
            vi_insert: DigitArgumentKeys::none(),
            vi_command: DigitArgumentKeys::plain_digits(),
        }
    }
}

impl DigitArgumentKeySets {
    /// The set used by `kind`.
    #[must_use]
    pub fn get(&self, kind: KeyMapKind) -> &DigitArgumentKeys {
        match kind {
            KeyMapKind::Cmd => &self.cmd,
            KeyMapKind::Emacs => &self.emacs,
            KeyMapKind::ViInsert => &self.vi_insert,
            KeyMapKind::ViCommand => &self.vi_command,
        }
    }
}

/// Options for one edit session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOptions {
    /// Keyboard layout family.
    pub edit_mode: EditMode,
    /// Wait for the rest of an escape sequence.
    pub escape_timeout: Duration,
    /// Prompt written before the first line.
    pub prompt: String,
    /// Prompt written before every continuation line.
    pub continuation_prompt: String,
    /// How dings are delivered.
    pub bell_style: BellStyle,
    /// Kill ring capacity.
    pub max_kill_ring: usize,
    /// Word separators besides whitespace.
    pub word_delimiters: String,
    /// Digit argument chords per key map.
    pub digit_argument_keys: DigitArgumentKeySets,
    /// Ask the predictor for suggestions.
    pub prediction: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            edit_mode: EditMode::Cmd,
            escape_timeout: DEFAULT_ESCAPE_TIMEOUT,
            prompt: "> ".to_string(),
            continuation_prompt: ">> ".to_string(),
            bell_style: BellStyle::Audible,
            max_kill_ring: DEFAULT_KILL_RING_SIZE,
            word_delimiters: DEFAULT_WORD_DELIMITERS.to_string(),
            digit_argument_keys: DigitArgumentKeySets::default(),
            prediction: true,
        }
    }
}

impl EditOptions {
    /// Defaults with overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides from a custom lookup (for tests).
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(value) = get_env(ENV_EDIT_MODE) {
            match value.parse() {
                Ok(mode) => options.edit_mode = mode,
                Err(err) => warn!(variable = ENV_EDIT_MODE, error = %err, "ignoring option"),
            }
        }
        if let Some(value) = get_env(ENV_ESCAPE_TIMEOUT_MS) {
            match value.trim().parse::<u64>() {
                Ok(ms) => options.escape_timeout = Duration::from_millis(ms),
                Err(_) => warn!(
                    variable = ENV_ESCAPE_TIMEOUT_MS,
                    value = %value,
                    "ignoring option"
                ),
            }
        }
        if let Some(value) = get_env(ENV_CONTINUATION_PROMPT) {
            options.continuation_prompt = value;
        }
        if let Some(value) = get_env(ENV_BELL_STYLE) {
            match value.parse() {
                Ok(style) => options.bell_style = style,
                Err(err) => warn!(variable = ENV_BELL_STYLE, error = %err, "ignoring option"),
            }
        }

        options
    }

    /// Set the edit mode.
    #[must_use]
    pub fn with_edit_mode(mut self, mode: EditMode) -> Self {
        self.edit_mode = mode;
        self
    }

    /// Set the escape timeout.
    #[must_use]
    pub fn with_escape_timeout(mut self, timeout: Duration) -> Self {
        self.escape_timeout = timeout;
        self
    }

    /// Set the prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the continuation prompt.
    #[must_use]
    pub fn with_continuation_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.continuation_prompt = prompt.into();
        self
    }

    /// Set the bell style.
    #[must_use]
    pub fn with_bell_style(mut self, style: BellStyle) -> Self {
        self.bell_style = style;
        self
    }

    /// Set the kill ring capacity.
    #[must_use]
    pub fn with_max_kill_ring(mut self, size: usize) -> Self {
        self.max_kill_ring = size;
        self
    }

    /// Set the word delimiters.
    #[must_use]
    pub fn with_word_delimiters(mut self, delimiters: impl Into<String>) -> Self {
        self.word_delimiters = delimiters.into();
        self
    }

    /// Set the digit argument chords for every key map.
    #[must_use]
    pub fn with_digit_argument_keys(mut self, keys: DigitArgumentKeySets) -> Self {
        self.digit_argument_keys = keys;
        self
    }

    /// Enable or disable prediction requests.
    #[must_use]
    pub fn with_prediction(mut self, enabled: bool) -> Self {
        self.prediction = enabled;
        self
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cmd => "cmd",
            Self::Emacs => "emacs",
            Self::Vi => "vi",
        })
    }
}
