//! Property-based invariant tests for the command buffer.
//!
//! 1. Inserting keeps the caret in front of the same trailing text, and
//!    stepping left then right over the inserted run returns it there.
//! 2. History navigation is a no-op at both boundaries.
//! 3. k × HistoryBack then k × HistoryForward restores the live command.
//! 4. No operation sequence panics or rewrites the transcript.
//! 5. The projection always reassembles to transcript + cmd.

use proptest::prelude::*;
use replterm_core::key::EditorIntent;
use replterm_core::line_editor::{CommandBuffer, EditOutcome};

// ── Strategies ──────────────────────────────────────────────────────────

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop_oneof![Just('a'), Just('z'), Just(' '), Just('é'), Just('中')], 0..12)
        .prop_map(|chars| chars.into_iter().collect())
}

fn intent_strategy() -> impl Strategy<Value = EditorIntent> {
    prop_oneof![
        prop_oneof![Just('x'), Just('ß'), Just('🙂')].prop_map(EditorIntent::Insert),
        Just(EditorIntent::Backspace),
        Just(EditorIntent::Delete),
        Just(EditorIntent::CaretLeft),
        Just(EditorIntent::CaretRight),
        Just(EditorIntent::CaretHome),
        Just(EditorIntent::CaretEnd),
        Just(EditorIntent::HistoryBack),
        Just(EditorIntent::HistoryForward),
        Just(EditorIntent::Commit),
    ]
}

fn buffer_with(transcript: &str, cmd: &str) -> CommandBuffer {
    let mut buf = CommandBuffer::new();
    buf.append_transcript(transcript);
    for c in cmd.chars() {
        buf.insert(c);
    }
    buf
}

fn buffer_with_history(history: &[String]) -> CommandBuffer {
    let mut buf = CommandBuffer::new();
    for cmd in history {
        for c in cmd.chars() {
            buf.insert(c);
        }
        buf.commit();
        buf.clear_echo();
    }
    buf
}

// ═══════════════════════════════════════════════════════════════════════
// 1. Insert / CaretRight caret restoration
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn insert_then_right_restores_relative_caret(
        cmd in text_strategy(),
        inserted in text_strategy(),
        left in 0usize..16,
    ) {
        let mut buf = buffer_with("$ ", &cmd);
        for _ in 0..left {
            buf.caret_left();
        }
        let offset = buf.caret_offset();
        let original = buf.cmd().to_string();
        let k = inserted.chars().count();

        for c in inserted.chars() {
            buf.insert(c);
        }
        prop_assert_eq!(buf.caret_offset(), offset);

        // Walk back over the inserted run, then forward again.
        for _ in 0..k {
            prop_assert!(buf.caret_left());
        }
        if let Some(first) = inserted.chars().next() {
            prop_assert_eq!(buf.projection().under_caret, Some(first));
        }
        for _ in 0..k {
            prop_assert!(buf.caret_right());
        }
        prop_assert_eq!(buf.caret_offset(), offset);

        // The caret still precedes the same trailing text it did before.
        let trailing: Vec<char> = original.chars().rev().take(offset).collect();
        let expected: String = trailing.into_iter().rev().collect();
        let projected = buf.projection();
        let tail: String = projected
            .under_caret
            .into_iter()
            .chain(projected.after_caret.chars())
            .collect();
        prop_assert_eq!(tail, expected);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 2. History boundaries
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn history_back_at_oldest_is_noop(history in prop::collection::vec(text_strategy(), 0..6)) {
        let mut buf = buffer_with_history(&history);
        let recorded = buf.history().len();
        for _ in 0..recorded {
            prop_assert!(buf.history_back());
        }
        let cmd = buf.cmd().to_string();
        prop_assert!(!buf.history_back());
        prop_assert_eq!(buf.history_num(), recorded);
        prop_assert_eq!(buf.cmd(), cmd.as_str());
    }

    #[test]
    fn history_forward_when_live_is_noop(
        history in prop::collection::vec(text_strategy(), 0..6),
        draft in text_strategy(),
    ) {
        let mut buf = buffer_with_history(&history);
        for c in draft.chars() {
            buf.insert(c);
        }
        prop_assert!(!buf.history_forward());
        prop_assert_eq!(buf.history_num(), 0);
        prop_assert_eq!(buf.cmd(), draft.as_str());
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. Stash round-trip
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn back_then_forward_restores_draft(
        history in prop::collection::vec(text_strategy(), 1..6),
        draft in text_strategy(),
        steps in 1usize..8,
    ) {
        let mut buf = buffer_with_history(&history);
        for c in draft.chars() {
            buf.insert(c);
        }
        let mut taken = 0;
        for _ in 0..steps {
            if buf.history_back() {
                taken += 1;
            }
        }
        for _ in 0..taken {
            prop_assert!(buf.history_forward());
        }
        prop_assert_eq!(buf.cmd(), draft.as_str());
        prop_assert_eq!(buf.history_num(), 0);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 4 + 5. Arbitrary sequences
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn arbitrary_sequences_never_touch_transcript(
        transcript in text_strategy(),
        intents in prop::collection::vec(intent_strategy(), 0..64),
    ) {
        let mut buf = buffer_with(&transcript, "");
        for intent in intents {
            if let EditOutcome::Commit(_) = buf.apply(intent) {
                buf.clear_echo();
            }
            prop_assert_eq!(buf.transcript(), transcript.as_str());
            prop_assert!(buf.caret_offset() <= buf.cmd().chars().count());
            prop_assert!(buf.history_num() <= buf.history().len());

            let projected = buf.projection();
            let mut full = buf.transcript().to_string();
            full.push_str(buf.cmd());
            prop_assert_eq!(projected.text(), full);
        }
    }
}
