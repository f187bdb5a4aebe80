#![forbid(unsafe_code)]

//! fline: an interactive line editor for terminal shells.
//!
//! This crate wires the key model from `fline-core` and the text model from
//! `fline-text` into an [`EditSession`]: key maps, digit arguments, history,
//! completion, predictions and a crossterm console.
//!
//! # Example
//!
//! ```
//! use fline::prelude::*;
//!
//! let mut session = EditSession::new(MemoryConsole::new(40), EditOptions::default());
//! let mut input = ScriptedInput::new().text("echo hi\r");
//! let outcome = session.read_line(&mut input)?;
//! assert_eq!(outcome, Outcome::Accepted("echo hi".into()));
//! # Ok::<(), fline::SessionError>(())
//! ```

pub mod action;
pub mod input;
pub mod keymap;
pub mod options;
pub mod ports;
pub mod prediction;
pub mod session;
#[cfg(not(target_arch = "wasm32"))]
pub mod terminal;

// --- Core re-exports -------------------------------------------------------

pub use fline_core::{
    BindingTable, ChordResolver, DescriptorError, DigitArgument, DigitArgumentKeys, InputDecoder,
    KeyChord, KeyCode, Modifiers, RawUnit, Resolution,
};

// --- Text re-exports -------------------------------------------------------

pub use fline_text::{
    EditBuffer, GeometryError, PromptSpan, RangeError, RenderData, RenderOffset, ScreenPoint,
    Selection,
};

// --- Session re-exports ----------------------------------------------------

pub use action::EditAction;
pub use input::{ChannelSource, InputEvent, InputPoll, InputSource, ScriptedInput};
pub use keymap::{KeyMap, KeyMapKind, KeyMaps};
pub use options::{BellStyle, EditMode, EditOptions};
pub use ports::{
    Classifier, Clipboard, Completer, Completions, Console, History, HistoryPredictor,
    MemoryClipboard, MemoryConsole, MemoryHistory, Predictor, RenderFrame, StyledSpan,
    TokenCategory, WordListCompleter,
};
pub use prediction::{PredictionCoordinator, PredictionReply, PredictionToken};
pub use session::{EditSession, Outcome, Ports, SessionState};

// --- Errors ---------------------------------------------------------------

/// Errors surfaced by an edit session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Console or input I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A key descriptor did not parse.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    /// An edit range was out of bounds.
    #[error(transparent)]
    Range(#[from] RangeError),
    /// A screen point or render offset was out of bounds.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// The input ended before a line was accepted or cancelled.
    #[error("input closed before the line was finished")]
    InputClosed,
}

/// Standard result type for fline APIs.
pub type Result<T> = std::result::Result<T, SessionError>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        EditAction, EditMode, EditOptions, EditSession, InputSource, KeyChord, KeyCode,
        KeyMapKind, MemoryConsole, Modifiers, Outcome, Ports, Result, ScriptedInput,
        SessionError,
    };

    pub use crate::{core, text};
}

pub use fline_core as core;
pub use fline_text as text;
