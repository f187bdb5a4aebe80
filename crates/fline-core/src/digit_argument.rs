#![forbid(unsafe_code)]

//! Digit-argument accumulator.
//!
//! Tracks the optional signed numeric prefix that modifies the next
//! dispatched action.
//!
//! # State Machine
//!
//! ```text
//!            digit              digit
//!   Absent ────────► Value ◄──────────┐
//!     │                │ negate        │
//!     │ negate         ▼               │
//!     └──────────► Empty(sign) ────────┘
//!                   │   ▲   negate toggles the sign
//!                   └───┘
//! ```
//!
//! `take` consumes the argument and returns it to `Absent`. An empty
//! argument counts as `1` with its sign, so a bare negate means `-1`.
//! Repeated negates toggle: an odd count is negative, an even count positive.

use crate::key::{KeyChord, KeyCode, Modifiers};

/// Upper bound on the accumulated magnitude.
pub const MAX_ARGUMENT: i64 = 1_000_000;

/// Accumulator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ArgState {
    #[default]
    Absent,
    /// Sign collected, no digits yet.
    Empty { negative: bool },
    /// At least one digit collected.
    Value { negative: bool, magnitude: i64 },
}

/// An optional signed numeric prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DigitArgument {
    state: ArgState,
}

impl DigitArgument {
    /// Create an absent argument.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ArgState::Absent,
        }
    }

    /// Whether an argument (possibly empty) is being collected.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != ArgState::Absent
    }

    /// Whether only a sign has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self.state, ArgState::Empty { .. })
    }

    /// Append a decimal digit.
    pub fn push_digit(&mut self, digit: u8) {
        let digit = i64::from(digit.min(9));
        self.state = match self.state {
            ArgState::Absent => ArgState::Value {
                negative: false,
                magnitude: digit,
            },
            ArgState::Empty { negative } => ArgState::Value {
                negative,
                magnitude: digit,
            },
            ArgState::Value {
                negative,
                magnitude,
            } => ArgState::Value {
                negative,
                magnitude: (magnitude * 10 + digit).min(MAX_ARGUMENT),
            },
        };
    }

    /// Apply the negate key.
    ///
    /// Absent starts an empty negative argument, an empty argument toggles its
    /// sign, and an argument with digits restarts as empty negative.
    pub fn negate(&mut self) {
        self.state = match self.state {
            ArgState::Absent | ArgState::Value { .. } => ArgState::Empty { negative: true },
            ArgState::Empty { negative } => ArgState::Empty {
                negative: !negative,
            },
        };
    }

    /// Remove the last digit.
    ///
    /// Returns `false` when there was no digit to remove; the argument is left
    /// untouched in that case.
    pub fn backspace(&mut self) -> bool {
        match self.state {
            ArgState::Value {
                negative,
                magnitude,
            } => {
                self.state = if magnitude >= 10 {
                    ArgState::Value {
                        negative,
                        magnitude: magnitude / 10,
                    }
                } else {
                    ArgState::Empty { negative }
                };
                true
            }
            ArgState::Absent | ArgState::Empty { .. } => false,
        }
    }

    /// Clear without producing a value.
    pub fn abort(&mut self) {
        self.state = ArgState::Absent;
    }

    /// The current value without consuming it.
    #[must_use]
    pub fn value(&self) -> Option<i64> {
        match self.state {
            ArgState::Absent => None,
            ArgState::Empty { negative } => Some(if negative { -1 } else { 1 }),
            ArgState::Value {
                negative,
                magnitude,
            } => Some(if negative { -magnitude } else { magnitude }),
        }
    }

    /// Consume the argument, leaving it absent.
    pub fn take(&mut self) -> Option<i64> {
        let value = self.value();
        self.state = ArgState::Absent;
        value
    }
}

/// How a chord feeds the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKey {
    /// A decimal digit.
    Digit(u8),
    /// The sign key.
    Negate,
}

/// The chords a key map uses to start and extend a digit argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitArgumentKeys {
    /// Digit arguments are recognized at all.
    pub enabled: bool,
    /// Modifiers a digit must carry to start an argument.
    pub start_modifiers: Modifiers,
    /// Smallest digit that can start an argument.
    pub first_digit_min: u8,
    /// Dedicated negate chord, if the key map has one.
    pub negate: Option<KeyChord>,
    /// While active, unmodified digits (and `-` when negation exists) extend.
    pub extend_plain: bool,
}

impl DigitArgumentKeys {
    /// Alt+0..Alt+9 with Alt+Minus, extended by plain digits and `-`.
    #[must_use]
    pub fn alt_digits() -> Self {
        Self {
            enabled: true,
            start_modifiers: Modifiers::ALT,
            first_digit_min: 0,
            negate: Some(KeyChord::char('-').with_modifiers(Modifiers::ALT)),
            extend_plain: true,
        }
    }

    /// Plain 1..9 to start, 0..9 to extend, no negation.
    #[must_use]
    pub fn plain_digits() -> Self {
        Self {
            enabled: true,
            start_modifiers: Modifiers::NONE,
            first_digit_min: 1,
            negate: None,
            extend_plain: true,
        }
    }

    /// No digit arguments.
    #[must_use]
    pub fn none() -> Self {
        Self {
            enabled: false,
            start_modifiers: Modifiers::NONE,
            first_digit_min: 0,
            negate: None,
            extend_plain: false,
        }
    }

    /// Classify `chord` given whether an argument is already active.
    #[must_use]
    pub fn classify(&self, chord: &KeyChord, active: bool) -> Option<ArgumentKey> {
        if !self.enabled {
            return None;
        }

        if let Some(digit) = chord.code.digit_value() {
            let starts = chord.modifiers == self.start_modifiers
                && (active || digit >= self.first_digit_min);
            let extends = active && self.extend_plain && chord.modifiers.is_empty();
            return (starts || extends).then_some(ArgumentKey::Digit(digit));
        }

        let negate = self.negate?;
        let plain_minus = active
            && self.extend_plain
            && chord.code == KeyCode::Char('-')
            && chord.modifiers.is_empty();
        (*chord == negate || plain_minus).then_some(ArgumentKey::Negate)
    }
}

impl Default for DigitArgumentKeys {
    fn default() -> Self {
        Self::alt_digits()
    }
}
