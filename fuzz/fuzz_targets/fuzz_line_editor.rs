#![no_main]

use libfuzzer_sys::fuzz_target;
use replterm_core::key::EditorIntent;
use replterm_core::line_editor::{CommandBuffer, EditOutcome};

fn intent(byte: u8) -> EditorIntent {
    match byte % 12 {
        0 => EditorIntent::Backspace,
        1 => EditorIntent::Delete,
        2 => EditorIntent::CaretLeft,
        3 => EditorIntent::CaretRight,
        4 => EditorIntent::CaretHome,
        5 => EditorIntent::CaretEnd,
        6 => EditorIntent::HistoryBack,
        7 => EditorIntent::HistoryForward,
        8 => EditorIntent::Commit,
        9 => EditorIntent::Insert('é'),
        10 => EditorIntent::Insert('中'),
        _ => EditorIntent::Insert(char::from(b'a' + byte % 26)),
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() > 4096 {
        return;
    }
    let mut buf = CommandBuffer::new();
    buf.append_transcript("$ ");

    for &byte in data {
        if let EditOutcome::Commit(_) = buf.apply(intent(byte)) {
            buf.clear_echo();
        }

        // Post-conditions that must always hold:
        assert_eq!(buf.transcript(), "$ ", "edits never touch the transcript");
        assert!(buf.caret_offset() <= buf.cmd().chars().count(), "caret left the command");
        assert!(buf.history_num() <= buf.history().len(), "history index OOB");
        let mut full = buf.transcript().to_string();
        full.push_str(buf.cmd());
        assert_eq!(buf.projection().text(), full, "projection lost text");
    }
});
