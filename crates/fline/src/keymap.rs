#![forbid(unsafe_code)]

//! Key maps: one binding table per editing mode.
//!
//! Four maps ship with the editor: `Cmd`, `Emacs`, `ViInsert` and
//! `ViCommand`. `EditMode::Vi` switches between the two vi maps at run
//! time; the other modes use one map for the whole session.
//!
//! Besides its table, a map decides:
//!
//! - which chords start and extend a digit argument
//! - which chord aborts an argument in progress
//! - whether unbound printable chords insert themselves

use fline_core::binding::BindingTable;
use fline_core::descriptor::{self, DescriptorError};
use fline_core::digit_argument::DigitArgumentKeys;
use fline_core::key::{KeyChord, KeyCode, Modifiers};
use tracing::warn;

use crate::action::EditAction;
use crate::options::EditMode;

/// Which binding table is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyMapKind {
    /// Windows-console style editing.
    Cmd,
    /// Emacs style editing.
    Emacs,
    /// Vi insert mode.
    ViInsert,
    /// Vi command mode.
    ViCommand,
}

impl KeyMapKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 4] = [Self::Cmd, Self::Emacs, Self::ViInsert, Self::ViCommand];

    /// The map a session in `mode` starts with.
    #[must_use]
    pub fn initial(mode: EditMode) -> Self {
        match mode {
            EditMode::Cmd => Self::Cmd,
            EditMode::Emacs => Self::Emacs,
            EditMode::Vi => Self::ViInsert,
        }
    }
}

// ---------------------------------------------------------------------------
// Default tables
// ---------------------------------------------------------------------------

const CMD_BINDINGS: &[(&str, EditAction)] = &[
    ("Enter", EditAction::AcceptLine),
    ("Shift+Enter", EditAction::AddLine),
    ("Ctrl+Enter", EditAction::InsertLineAbove),
    ("Ctrl+Shift+Enter", EditAction::InsertLineBelow),
    ("Escape", EditAction::RevertLine),
    ("LeftArrow", EditAction::BackwardChar),
    ("RightArrow", EditAction::ForwardChar),
    ("Ctrl+LeftArrow", EditAction::BackwardWord),
    ("Ctrl+RightArrow", EditAction::NextWord),
    ("Alt+RightArrow", EditAction::AcceptSuggestion),
    ("Home", EditAction::BeginningOfLine),
    ("End", EditAction::EndOfLine),
    ("Shift+LeftArrow", EditAction::SelectBackwardChar),
    ("Shift+RightArrow", EditAction::SelectForwardChar),
    ("Ctrl+Shift+LeftArrow", EditAction::SelectBackwardWord),
    ("Ctrl+Shift+RightArrow", EditAction::SelectNextWord),
    ("Ctrl+a", EditAction::SelectAll),
    ("Backspace", EditAction::BackwardDeleteChar),
    ("Delete", EditAction::DeleteChar),
    ("Ctrl+Backspace", EditAction::BackwardDeleteWord),
    ("Ctrl+Delete", EditAction::KillWord),
    ("Ctrl+End", EditAction::KillLine),
    ("Ctrl+Home", EditAction::BackwardKillLine),
    ("Ctrl+z", EditAction::Undo),
    ("Ctrl+y", EditAction::Redo),
    ("Ctrl+c", EditAction::CopyOrCancelLine),
    ("Ctrl+Shift+c", EditAction::Copy),
    ("Ctrl+x", EditAction::Cut),
    ("Ctrl+v", EditAction::Paste),
    ("UpArrow", EditAction::PreviousHistory),
    ("DownArrow", EditAction::NextHistory),
    ("PageUp", EditAction::BeginningOfHistory),
    ("PageDown", EditAction::EndOfHistory),
    ("Tab", EditAction::TabCompleteNext),
    ("Shift+Tab", EditAction::TabCompletePrevious),
];

const EMACS_BINDINGS: &[(&str, EditAction)] = &[
    ("Enter", EditAction::AcceptLine),
    ("Shift+Enter", EditAction::AddLine),
    ("Ctrl+a", EditAction::BeginningOfLine),
    ("Ctrl+e", EditAction::EndOfLine),
    ("Home", EditAction::BeginningOfLine),
    ("End", EditAction::EndOfLine),
    ("Ctrl+b", EditAction::BackwardChar),
    ("Ctrl+f", EditAction::ForwardChar),
    ("LeftArrow", EditAction::BackwardChar),
    ("RightArrow", EditAction::ForwardChar),
    ("Alt+b", EditAction::BackwardWord),
    ("Alt+f", EditAction::ForwardWord),
    ("Ctrl+LeftArrow", EditAction::BackwardWord),
    ("Ctrl+RightArrow", EditAction::ForwardWord),
    ("Alt+RightArrow", EditAction::AcceptSuggestion),
    ("Backspace", EditAction::BackwardDeleteChar),
    ("Delete", EditAction::DeleteChar),
    ("Ctrl+d", EditAction::DeleteCharOrCancel),
    ("Alt+d", EditAction::KillWord),
    ("Alt+Backspace", EditAction::BackwardKillWord),
    ("Ctrl+w", EditAction::UnixWordRubout),
    ("Ctrl+k", EditAction::KillLine),
    ("Ctrl+u", EditAction::BackwardKillLine),
    ("Ctrl+y", EditAction::Yank),
    ("Alt+y", EditAction::YankPop),
    ("Ctrl+x,Ctrl+u", EditAction::Undo),
    ("Alt+r", EditAction::RevertLine),
    ("Ctrl+t", EditAction::TransposeChars),
    ("Alt+u", EditAction::UpcaseWord),
    ("Alt+l", EditAction::DowncaseWord),
    ("Alt+c", EditAction::CapitalizeWord),
    ("Ctrl+p", EditAction::PreviousHistory),
    ("Ctrl+n", EditAction::NextHistory),
    ("UpArrow", EditAction::PreviousHistory),
    ("DownArrow", EditAction::NextHistory),
    ("Tab", EditAction::TabCompleteNext),
    ("Shift+Tab", EditAction::TabCompletePrevious),
    ("Ctrl+g", EditAction::Abort),
    ("Ctrl+c", EditAction::CancelLine),
];

const VI_INSERT_BINDINGS: &[(&str, EditAction)] = &[
    ("Enter", EditAction::AcceptLine),
    ("Escape", EditAction::ViCommandMode),
    ("Backspace", EditAction::BackwardDeleteChar),
    ("Delete", EditAction::DeleteChar),
    ("LeftArrow", EditAction::BackwardChar),
    ("RightArrow", EditAction::ForwardChar),
    ("Home", EditAction::BeginningOfLine),
    ("End", EditAction::EndOfLine),
    ("UpArrow", EditAction::PreviousHistory),
    ("DownArrow", EditAction::NextHistory),
    ("Ctrl+w", EditAction::UnixWordRubout),
    ("Ctrl+u", EditAction::BackwardKillLine),
    ("Tab", EditAction::TabCompleteNext),
    ("Shift+Tab", EditAction::TabCompletePrevious),
    ("Ctrl+d", EditAction::DeleteCharOrCancel),
    ("Ctrl+c", EditAction::CancelLine),
];

const VI_COMMAND_BINDINGS: &[(&str, EditAction)] = &[
    ("Enter", EditAction::AcceptLine),
    ("Escape", EditAction::Abort),
    ("h", EditAction::BackwardChar),
    ("l", EditAction::ForwardChar),
    ("LeftArrow", EditAction::BackwardChar),
    ("RightArrow", EditAction::ForwardChar),
    ("w", EditAction::NextWord),
    ("b", EditAction::BackwardWord),
    ("e", EditAction::ForwardWord),
    ("0", EditAction::BeginningOfLine),
    ("$", EditAction::EndOfLine),
    ("Home", EditAction::BeginningOfLine),
    ("End", EditAction::EndOfLine),
    ("i", EditAction::ViInsertMode),
    ("a", EditAction::ViAppend),
    ("I", EditAction::ViInsertAtStart),
    ("A", EditAction::ViInsertAtEnd),
    ("x", EditAction::DeleteChar),
    ("X", EditAction::BackwardDeleteChar),
    ("D", EditAction::ViDeleteToEnd),
    ("d,d", EditAction::ViDeleteLine),
    ("d,0", EditAction::ViDeleteToLineStart),
    ("d,w", EditAction::ViDeleteWord),
    ("d,$", EditAction::ViDeleteToEnd),
    ("c,c", EditAction::ViChangeLine),
    ("c,w", EditAction::ViChangeWord),
    ("p", EditAction::ViPasteAfter),
    ("P", EditAction::ViPasteBefore),
    ("u", EditAction::Undo),
    ("Ctrl+r", EditAction::Redo),
    ("k", EditAction::PreviousHistory),
    ("j", EditAction::NextHistory),
    ("UpArrow", EditAction::PreviousHistory),
    ("DownArrow", EditAction::NextHistory),
    ("Ctrl+c", EditAction::CancelLine),
];

// ---------------------------------------------------------------------------
// KeyMap
// ---------------------------------------------------------------------------

/// A binding table plus the per-map input rules around it.
#[derive(Debug, Clone)]
pub struct KeyMap {
    kind: KeyMapKind,
    table: BindingTable<EditAction>,
    digit_keys: DigitArgumentKeys,
    abort: Option<KeyChord>,
    self_insert: bool,
}

impl KeyMap {
    /// An empty map of the given kind, with that kind's input rules.
    #[must_use]
    pub fn empty(kind: KeyMapKind) -> Self {
        let (digit_keys, abort, self_insert) = match kind {
            KeyMapKind::Cmd => (
                DigitArgumentKeys::alt_digits(),
                Some(KeyChord::new(KeyCode::Escape)),
                true,
            ),
            KeyMapKind::Emacs => (
                DigitArgumentKeys::alt_digits(),
                Some(KeyChord::char('g').with_modifiers(Modifiers::CTRL)),
                true,
            ),
            KeyMapKind::ViInsert => (DigitArgumentKeys::none(), None, true),
            KeyMapKind::ViCommand => (
                DigitArgumentKeys::plain_digits(),
                Some(KeyChord::new(KeyCode::Escape)),
                false,
            ),
        };
        Self {
            kind,
            table: BindingTable::new(),
            digit_keys,
            abort,
            self_insert,
        }
    }

    /// The built-in map of the given kind.
    #[must_use]
    pub fn builtin(kind: KeyMapKind) -> Self {
        let bindings = match kind {
            KeyMapKind::Cmd => CMD_BINDINGS,
            KeyMapKind::Emacs => EMACS_BINDINGS,
            KeyMapKind::ViInsert => VI_INSERT_BINDINGS,
            KeyMapKind::ViCommand => VI_COMMAND_BINDINGS,
        };
        let mut map = Self::empty(kind);
        for &(descriptor, action) in bindings {
            if let Err(err) = map.table.bind(descriptor, action) {
                warn!(descriptor, error = %err, "skipping malformed built-in binding");
            }
        }
        map
    }

    /// Which map this is.
    #[must_use]
    pub fn kind(&self) -> KeyMapKind {
        self.kind
    }

    /// The binding table.
    #[must_use]
    pub fn table(&self) -> &BindingTable<EditAction> {
        &self.table
    }

    /// Bind a descriptor such as `"Ctrl+x,Ctrl+u"`, returning the action it
    /// replaced.
    pub fn bind(
        &mut self,
        descriptor: &str,
        action: EditAction,
    ) -> Result<Option<EditAction>, DescriptorError> {
        self.table.bind(descriptor, action)
    }

    /// Remove a binding, returning its action.
    pub fn unbind(&mut self, descriptor: &str) -> Result<Option<EditAction>, DescriptorError> {
        self.table.unbind(descriptor)
    }

    /// The action bound to exactly this descriptor.
    pub fn action_for(&self, descriptor: &str) -> Result<Option<EditAction>, DescriptorError> {
        let sequence = descriptor::parse_sequence(descriptor)?;
        Ok(self.table.get(&sequence).copied())
    }

    /// Chords that start and extend a digit argument.
    #[must_use]
    pub fn digit_keys(&self) -> &DigitArgumentKeys {
        &self.digit_keys
    }

    /// Replace the digit argument chords.
    pub fn set_digit_keys(&mut self, keys: DigitArgumentKeys) {
        self.digit_keys = keys;
    }

    /// The chord that aborts a digit argument in progress.
    #[must_use]
    pub fn abort_chord(&self) -> Option<KeyChord> {
        self.abort
    }

    /// Whether unbound printable chords insert themselves.
    #[must_use]
    pub fn self_insert(&self) -> bool {
        self.self_insert
    }
}

// ---------------------------------------------------------------------------
// KeyMaps
// ---------------------------------------------------------------------------

/// The four maps a session can switch between.
#[derive(Debug, Clone)]
pub struct KeyMaps {
    cmd: KeyMap,
    emacs: KeyMap,
    vi_insert: KeyMap,
    vi_command: KeyMap,
}

impl Default for KeyMaps {
    fn default() -> Self {
        Self {
            cmd: KeyMap::builtin(KeyMapKind::Cmd),
            emacs: KeyMap::builtin(KeyMapKind::Emacs),
            vi_insert: KeyMap::builtin(KeyMapKind::ViInsert),
            vi_command: KeyMap::builtin(KeyMapKind::ViCommand),
        }
    }
}

impl KeyMaps {
    /// The map for `kind`.
    #[must_use]
    pub fn get(&self, kind: KeyMapKind) -> &KeyMap {
        match kind {
            KeyMapKind::Cmd => &self.cmd,
            KeyMapKind::Emacs => &self.emacs,
            KeyMapKind::ViInsert => &self.vi_insert,
            KeyMapKind::ViCommand => &self.vi_command,
        }
    }

    /// Mutable access to the map for `kind`.
    pub fn get_mut(&mut self, kind: KeyMapKind) -> &mut KeyMap {
        match kind {
            KeyMapKind::Cmd => &mut self.cmd,
            KeyMapKind::Emacs => &mut self.emacs,
            KeyMapKind::ViInsert => &mut self.vi_insert,
            KeyMapKind::ViCommand => &mut self.vi_command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fline_core::binding::Lookup;
    use fline_core::descriptor::parse_sequence;

    #[test]
    fn every_builtin_descriptor_parses() {
        for table in [CMD_BINDINGS, EMACS_BINDINGS, VI_INSERT_BINDINGS, VI_COMMAND_BINDINGS] {
            for (descriptor, _) in table {
                assert!(parse_sequence(descriptor).is_ok(), "bad descriptor {descriptor:?}");
            }
        }
    }

    #[test]
    fn builtin_tables_have_no_collisions() {
        for (kind, table) in [
            (KeyMapKind::Cmd, CMD_BINDINGS),
            (KeyMapKind::Emacs, EMACS_BINDINGS),
            (KeyMapKind::ViInsert, VI_INSERT_BINDINGS),
            (KeyMapKind::ViCommand, VI_COMMAND_BINDINGS),
        ] {
            assert_eq!(KeyMap::builtin(kind).table().len(), table.len(), "{kind:?}");
        }
    }

    #[test]
    fn emacs_undo_is_a_two_chord_sequence() {
        let map = KeyMap::builtin(KeyMapKind::Emacs);
        let ctrl_x = parse_sequence("Ctrl+x").unwrap();
        assert!(matches!(map.table().lookup(&ctrl_x), Lookup::Prefix));
        assert_eq!(map.action_for("Ctrl+x,Ctrl+u"), Ok(Some(EditAction::Undo)));
    }

    #[test]
    fn vi_command_operators() {
        let map = KeyMap::builtin(KeyMapKind::ViCommand);
        assert_eq!(map.action_for("d,d"), Ok(Some(EditAction::ViDeleteLine)));
        assert_eq!(map.action_for("d,0"), Ok(Some(EditAction::ViDeleteToLineStart)));
        assert_eq!(map.action_for("d,w"), Ok(Some(EditAction::ViDeleteWord)));
        assert_eq!(map.action_for("d,$"), Ok(Some(EditAction::ViDeleteToEnd)));
        assert_eq!(map.action_for("c,c"), Ok(Some(EditAction::ViChangeLine)));
        assert_eq!(map.action_for("c,w"), Ok(Some(EditAction::ViChangeWord)));
        assert_eq!(map.action_for("d"), Ok(None));
        assert!(!map.self_insert());
    }

    #[test]
    fn rebinding_returns_previous_action() {
        let mut map = KeyMap::builtin(KeyMapKind::Cmd);
        assert_eq!(map.bind("Ctrl+z", EditAction::Redo), Ok(Some(EditAction::Undo)));
        assert_eq!(map.unbind("Ctrl+z"), Ok(Some(EditAction::Redo)));
        assert_eq!(map.action_for("Ctrl+z"), Ok(None));
        assert!(map.bind("Ctrl+Bogus", EditAction::Undo).is_err());
    }

    #[test]
    fn input_rules_per_kind() {
        assert_eq!(
            KeyMap::empty(KeyMapKind::Emacs).abort_chord(),
            Some(KeyChord::char('g').with_modifiers(Modifiers::CTRL))
        );
        assert!(!KeyMap::empty(KeyMapKind::ViInsert).digit_keys().enabled);
        assert_eq!(KeyMapKind::initial(EditMode::Vi), KeyMapKind::ViInsert);
    }
}
