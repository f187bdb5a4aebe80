//! Property-based invariant tests for the edit session.
//!
//! 1. The drawn cursor point always matches the geometry of the buffer cursor.
//! 2. Resizing never moves the buffer cursor.
//! 3. Resizing away and back restores the cursor point.
//! 4. Any chord sequence leaves the buffer cursor within bounds.

use fline::prelude::*;
use fline::text::geometry::{RenderData, offset_to_point};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Step {
    Type(char),
    NewLine,
    Left,
    Right,
    Home,
    End,
    Backspace,
}

impl Step {
    fn chord(self) -> KeyChord {
        match self {
            Self::Type(c) => KeyChord::char(c),
            Self::NewLine => KeyChord::new(KeyCode::Enter).with_modifiers(Modifiers::SHIFT),
            Self::Left => KeyChord::new(KeyCode::Left),
            Self::Right => KeyChord::new(KeyCode::Right),
            Self::Home => KeyChord::new(KeyCode::Home),
            Self::End => KeyChord::new(KeyCode::End),
            Self::Backspace => KeyChord::new(KeyCode::Backspace),
        }
    }
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        6 => proptest::char::range('a', 'z').prop_map(Step::Type),
        1 => Just(Step::Type(' ')),
        1 => Just(Step::NewLine),
        1 => Just(Step::Left),
        1 => Just(Step::Right),
        1 => Just(Step::Home),
        1 => Just(Step::End),
        1 => Just(Step::Backspace),
    ]
}

fn session_after(width: usize, steps: &[Step]) -> EditSession<MemoryConsole> {
    let mut session = EditSession::new(MemoryConsole::new(width), EditOptions::default());
    session.begin().unwrap();
    for step in steps {
        session.handle_chord(step.chord()).unwrap();
    }
    session
}

fn expected_point(session: &EditSession<MemoryConsole>, width: usize) -> fline::ScreenPoint {
    let continuation = fline::text::geometry::display_width(&session.options().continuation_prompt);
    let render = RenderData::from_text(session.buffer().text(), width, continuation);
    let offset = render.offset_for_char(session.buffer().cursor());
    offset_to_point(session.anchor(), width, &render, offset).unwrap()
}

// ═════════════════════════════════════════════════════════════════════════
// 1, 4. Cursor consistency
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn drawn_cursor_matches_geometry(
        width in 1usize..30,
        steps in proptest::collection::vec(step_strategy(), 0..60),
    ) {
        let session = session_after(width, &steps);
        let buffer = session.buffer();
        prop_assert!(buffer.cursor() <= buffer.len());
        prop_assert_eq!(session.cursor_point(), expected_point(&session, width));
        prop_assert_eq!(session.console().cursor, Some(session.cursor_point()));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2-3. Resize
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn resize_keeps_buffer_cursor(
        width in 1usize..30,
        other in 1usize..30,
        steps in proptest::collection::vec(step_strategy(), 0..60),
    ) {
        let mut session = session_after(width, &steps);
        let cursor = session.buffer().cursor();
        session.handle_resize(other).unwrap();
        prop_assert_eq!(session.buffer().cursor(), cursor);
        prop_assert_eq!(session.render_data().buffer_width, other);
    }

    #[test]
    fn resize_round_trip_restores_point(
        width in 3usize..30,
        other in 3usize..30,
        steps in proptest::collection::vec(step_strategy(), 0..60),
    ) {
        // A prompt narrower than both widths keeps the anchor on row 0.
        let mut session = session_after(width, &steps);
        let before = session.cursor_point();
        session.handle_resize(other).unwrap();
        session.handle_resize(width).unwrap();
        prop_assert_eq!(session.cursor_point(), before);
        prop_assert_eq!(session.anchor(), fline::ScreenPoint::new(2, 0));
    }
}
