//! Property-based invariant tests for the raw input decoder and descriptors.
//!
//! 1. Decoding never panics on arbitrary bytes.
//! 2. After the deadline nothing is pending.
//! 3. Non-empty input always yields at least one chord.
//! 4. Plain printable ASCII decodes one chord per byte.
//! 5. Split feeding gives the same chords as one-shot feeding.
//! 6. Descriptor text produced by `describe` parses back to the same chords.

use std::time::{Duration, Instant};

use fline_core::decoder::InputDecoder;
use fline_core::descriptor::{describe, parse_sequence};
use fline_core::key::{KeyChord, KeyCode, Modifiers};
use proptest::prelude::*;

const TIMEOUT: Duration = Duration::from_millis(50);

// ── Helpers ─────────────────────────────────────────────────────────────

fn decode_at_once(bytes: &[u8]) -> (Vec<KeyChord>, bool) {
    let mut decoder = InputDecoder::new(TIMEOUT);
    let t = Instant::now();
    decoder.feed_bytes(bytes, t);
    decoder.flush_expired(t + TIMEOUT);
    let pending = decoder.is_pending();
    (decoder.drain().collect(), pending)
}

/// Bytes biased toward escape-sequence material.
fn terminal_bytes() -> impl Strategy<Value = Vec<u8>> {
    let byte = prop_oneof![
        3 => Just(0x1bu8),
        2 => Just(b'['),
        2 => Just(b'O'),
        2 => Just(b';'),
        3 => (b'0'..=b'9'),
        3 => (b'A'..=b'Z'),
        1 => Just(b'~'),
        2 => any::<u8>(),
    ];
    proptest::collection::vec(byte, 0..48)
}

fn chord_strategy() -> impl Strategy<Value = KeyChord> {
    let code = prop_oneof![
        (b'a'..=b'z').prop_map(|b| KeyCode::Char(char::from(b))),
        (b'A'..=b'Z').prop_map(|b| KeyCode::Char(char::from(b))),
        (b'0'..=b'9').prop_map(|b| KeyCode::Char(char::from(b))),
        Just(KeyCode::Char('-')),
        Just(KeyCode::Char(',')),
        Just(KeyCode::Char(' ')),
        Just(KeyCode::Enter),
        Just(KeyCode::Home),
        Just(KeyCode::PageDown),
        Just(KeyCode::Left),
        (1u8..=24).prop_map(KeyCode::F),
    ];
    (code, 0u8..8).prop_map(|(code, bits)| {
        let mut modifiers = Modifiers::from_bits_truncate(bits);
        if let KeyCode::Char(c) = code {
            if !c.is_ascii_digit() {
                modifiers.remove(Modifiers::SHIFT);
            }
        }
        KeyChord::new(code).with_modifiers(modifiers)
    })
}

// ═════════════════════════════════════════════════════════════════════════
// 1-3. Totality
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn decoding_is_total(bytes in terminal_bytes()) {
        let (chords, pending) = decode_at_once(&bytes);
        prop_assert!(!pending, "still pending after deadline for {:?}", bytes);
        if !bytes.is_empty() {
            prop_assert!(!chords.is_empty(), "no output for {:?}", bytes);
        }
        prop_assert!(chords.len() <= bytes.len());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Printable ASCII passes through
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn printable_ascii_is_one_to_one(text in "[ -~]{0,40}") {
        let (chords, _) = decode_at_once(text.as_bytes());
        let expected: Vec<KeyChord> = text.chars().map(KeyChord::char).collect();
        prop_assert_eq!(chords, expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Feeding in pieces within the timeout changes nothing
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn split_feeding_matches(bytes in terminal_bytes(), split in 0usize..48) {
        let split = split.min(bytes.len());
        let (expected, _) = decode_at_once(&bytes);

        let mut decoder = InputDecoder::new(TIMEOUT);
        let t = Instant::now();
        decoder.feed_bytes(&bytes[..split], t);
        decoder.feed_bytes(&bytes[split..], t + Duration::from_millis(10));
        decoder.flush_expired(t + Duration::from_millis(10) + TIMEOUT);
        let actual: Vec<KeyChord> = decoder.drain().collect();
        prop_assert_eq!(actual, expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Descriptor text round-trips
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn describe_then_parse(chords in proptest::collection::vec(chord_strategy(), 1..4)) {
        let text = describe(&chords);
        let parsed = parse_sequence(&text);
        prop_assert_eq!(parsed, Ok(chords), "descriptor {:?}", text);
    }
}
