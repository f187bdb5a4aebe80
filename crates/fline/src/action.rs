#![forbid(unsafe_code)]

//! Editing actions that key bindings dispatch to.

/// Everything a binding can ask the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditAction {
    // ---------------------------------------------------------------------
    // Text entry
    // ---------------------------------------------------------------------
    /// Insert a character. Used for unbound printable keys.
    SelfInsert(char),
    /// Insert a newline at the cursor.
    AddLine,
    /// Open an empty line above the current logical line.
    InsertLineAbove,
    /// Open an empty line below the current logical line.
    InsertLineBelow,

    // ---------------------------------------------------------------------
    // Movement
    // ---------------------------------------------------------------------
    /// One grapheme left.
    BackwardChar,
    /// One grapheme right; at the end, accept the suggestion.
    ForwardChar,
    /// Start of the previous word.
    BackwardWord,
    /// End of the next word.
    ForwardWord,
    /// Start of the next word.
    NextWord,
    /// Start of the logical line.
    BeginningOfLine,
    /// End of the logical line; at the end of the buffer, accept the suggestion.
    EndOfLine,

    // ---------------------------------------------------------------------
    // Deletion and the kill ring
    // ---------------------------------------------------------------------
    /// Delete the grapheme before the cursor, or the selection.
    BackwardDeleteChar,
    /// Delete the grapheme under the cursor, or the selection.
    DeleteChar,
    /// Like `DeleteChar`, but cancel the line when the buffer is empty.
    DeleteCharOrCancel,
    /// Delete to the start of the previous word, without killing.
    BackwardDeleteWord,
    /// Kill to the end of the next word.
    KillWord,
    /// Kill to the start of the previous word.
    BackwardKillWord,
    /// Kill the whitespace-delimited token before the cursor.
    UnixWordRubout,
    /// Kill to the end of the logical line.
    KillLine,
    /// Kill to the start of the logical line.
    BackwardKillLine,
    /// Insert the newest kill.
    Yank,
    /// Replace the last yank with the next older kill.
    YankPop,

    // ---------------------------------------------------------------------
    // Changes
    // ---------------------------------------------------------------------
    /// Undo the last action.
    Undo,
    /// Redo the last undone action.
    Redo,
    /// Undo everything.
    RevertLine,
    /// Swap the characters around the cursor.
    TransposeChars,
    /// Upper-case to the end of the word.
    UpcaseWord,
    /// Lower-case to the end of the word.
    DowncaseWord,
    /// Capitalize to the end of the word.
    CapitalizeWord,

    // ---------------------------------------------------------------------
    // Selection and clipboard
    // ---------------------------------------------------------------------
    /// Extend the selection one grapheme left.
    SelectBackwardChar,
    /// Extend the selection one grapheme right.
    SelectForwardChar,
    /// Extend the selection to the previous word start.
    SelectBackwardWord,
    /// Extend the selection to the next word start.
    SelectNextWord,
    /// Select the whole buffer.
    SelectAll,
    /// Copy the selection to the clipboard.
    Copy,
    /// Copy the selection, or cancel the line when nothing is selected.
    CopyOrCancelLine,
    /// Move the selection to the clipboard.
    Cut,
    /// Insert the clipboard text.
    Paste,

    // ---------------------------------------------------------------------
    // History, completion and prediction
    // ---------------------------------------------------------------------
    /// Older history entry.
    PreviousHistory,
    /// Newer history entry, then the in-progress line.
    NextHistory,
    /// Oldest history entry.
    BeginningOfHistory,
    /// Back to the in-progress line.
    EndOfHistory,
    /// Complete, or cycle to the next candidate.
    TabCompleteNext,
    /// Cycle to the previous candidate.
    TabCompletePrevious,
    /// Insert the rest of the current suggestion.
    AcceptSuggestion,

    // ---------------------------------------------------------------------
    // Line control
    // ---------------------------------------------------------------------
    /// Finish with the current text.
    AcceptLine,
    /// Finish without a line.
    CancelLine,
    /// Drop any digit argument, pending chords, selection and completion.
    Abort,

    // ---------------------------------------------------------------------
    // Vi
    // ---------------------------------------------------------------------
    /// Leave insert mode.
    ViCommandMode,
    /// Insert before the cursor.
    ViInsertMode,
    /// Insert after the cursor.
    ViAppend,
    /// Insert at the start of the line.
    ViInsertAtStart,
    /// Insert at the end of the line.
    ViInsertAtEnd,
    /// `d,d`: kill the whole logical line.
    ViDeleteLine,
    /// `d,0`: kill to the start of the line.
    ViDeleteToLineStart,
    /// `d,w`: kill to the start of the next word.
    ViDeleteWord,
    /// `d,$` / `D`: kill to the end of the line.
    ViDeleteToEnd,
    /// `c,c`: clear the line and insert.
    ViChangeLine,
    /// `c,w`: kill to the end of the word and insert.
    ViChangeWord,
    /// `p`: put after the cursor.
    ViPasteAfter,
    /// `P`: put before the cursor.
    ViPasteBefore,
}

impl EditAction {
    /// The action a negative digit argument turns this one into.
    #[must_use]
    pub fn opposite(self) -> Option<Self> {
        use EditAction::*;
        let opposite = match self {
            BackwardChar => ForwardChar,
            ForwardChar => BackwardChar,
            BackwardWord => NextWord,
            NextWord | ForwardWord => BackwardWord,
            BackwardDeleteChar => DeleteChar,
            DeleteChar | DeleteCharOrCancel => BackwardDeleteChar,
            KillWord => BackwardKillWord,
            BackwardKillWord => KillWord,
            KillLine => BackwardKillLine,
            BackwardKillLine => KillLine,
            SelectBackwardChar => SelectForwardChar,
            SelectForwardChar => SelectBackwardChar,
            SelectBackwardWord => SelectNextWord,
            SelectNextWord => SelectBackwardWord,
            PreviousHistory => NextHistory,
            NextHistory => PreviousHistory,
            Undo => Redo,
            Redo => Undo,
            TabCompleteNext => TabCompletePrevious,
            TabCompletePrevious => TabCompleteNext,
            _ => return None,
        };
        Some(opposite)
    }

    /// Whether a digit argument repeats this action.
    #[must_use]
    pub fn repeats(self) -> bool {
        use EditAction::*;
        !matches!(
            self,
            AcceptLine
                | CancelLine
                | Abort
                | RevertLine
                | SelectAll
                | Copy
                | CopyOrCancelLine
                | Cut
                | BeginningOfLine
                | EndOfLine
                | BeginningOfHistory
                | EndOfHistory
                | AcceptSuggestion
                | TabCompleteNext
                | TabCompletePrevious
                | ViCommandMode
                | ViInsertMode
                | ViAppend
                | ViInsertAtStart
                | ViInsertAtEnd
                | ViChangeLine
        )
    }

    /// Whether the action adds to the kill ring.
    #[must_use]
    pub fn kills(self) -> bool {
        use EditAction::*;
        matches!(
            self,
            KillWord
                | BackwardKillWord
                | UnixWordRubout
                | KillLine
                | BackwardKillLine
                | ViDeleteLine
                | ViDeleteToLineStart
                | ViDeleteWord
                | ViDeleteToEnd
                | ViChangeLine
                | ViChangeWord
        )
    }

    /// Whether the action continues a yank.
    #[must_use]
    pub fn yanks(self) -> bool {
        matches!(self, Self::Yank | Self::YankPop | Self::ViPasteAfter | Self::ViPasteBefore)
    }

    /// Whether the action keeps an active selection.
    #[must_use]
    pub fn keeps_selection(self) -> bool {
        use EditAction::*;
        matches!(
            self,
            SelectBackwardChar | SelectForwardChar | SelectBackwardWord | SelectNextWord | SelectAll | Copy
        )
    }

    /// Whether the action continues a completion cycle.
    #[must_use]
    pub fn cycles_completion(self) -> bool {
        matches!(self, Self::TabCompleteNext | Self::TabCompletePrevious)
    }
}
