#![forbid(unsafe_code)]

//! Caret-addressable command line layered over an append-only transcript.
//!
//! The terminal shows one string: everything the remote has printed
//! (the *transcript*) followed by the line the user is typing (the
//! *command*). The caret is addressed from the right end of that string, so
//! output arriving asynchronously grows the transcript without moving the
//! caret relative to the command.
//!
//! ```text
//! transcript                     cmd
//! |------------------------------|--------|
//!                                   ^ caret_offset = 5 (chars from the end)
//! ```
//!
//! Edits only ever touch `cmd`. When the caret sits inside the transcript
//! (`caret_offset > len(cmd)`) insert/backspace/delete decline instead of
//! rewriting committed text.
//!
//! All indexes are `char` indexes. Every operation returns whether anything
//! changed; a `false` return is a silent boundary no-op, not an error.

use crate::key::EditorIntent;

/// The display split of `transcript + cmd` at the caret.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayProjection {
    /// Text left of the caret.
    pub before_caret: String,
    /// Character under the caret, `None` when the caret is past the end.
    pub under_caret: Option<char>,
    /// Text right of the caret cell.
    pub after_caret: String,
}

impl DisplayProjection {
    /// Reassemble the full text (without any caret marker).
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(
            self.before_caret.len() + self.after_caret.len() + 4,
        );
        out.push_str(&self.before_caret);
        if let Some(c) = self.under_caret {
            out.push(c);
        }
        out.push_str(&self.after_caret);
        out
    }
}

/// Result of applying one [`EditorIntent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The buffer changed; refresh the display.
    Changed,
    /// Boundary no-op.
    Unchanged,
    /// The command was committed; send this text over the channel.
    Commit(String),
}

/// Per-session editing state: transcript, live command, caret, and history.
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    transcript: String,
    cmd: String,
    caret_offset: usize,
    history: Vec<String>,
    history_num: usize,
    stash: String,
    strip_leading_newline: bool,
}

impl CommandBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    #[must_use]
    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    #[must_use]
    pub fn caret_offset(&self) -> usize {
        self.caret_offset
    }

    /// Committed commands, oldest first.
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// `0` while editing live, `n` while showing the n-th most recent entry.
    #[must_use]
    pub fn history_num(&self) -> usize {
        self.history_num
    }

    #[must_use]
    pub fn stash(&self) -> &str {
        &self.stash
    }

    fn cmd_len(&self) -> usize {
        self.cmd.chars().count()
    }

    /// Char index into `cmd` where the caret sits, if it is inside `cmd`.
    fn insertion_index(&self) -> Option<usize> {
        self.cmd_len().checked_sub(self.caret_offset)
    }

    /// Dispatch one key intent.
    pub fn apply(&mut self, intent: EditorIntent) -> EditOutcome {
        let changed = match intent {
            EditorIntent::Insert(c) => self.insert(c),
            EditorIntent::Backspace => self.backspace(),
            EditorIntent::Delete => self.delete(),
            EditorIntent::CaretLeft => self.caret_left(),
            EditorIntent::CaretRight => self.caret_right(),
            EditorIntent::CaretHome => self.caret_home(),
            EditorIntent::CaretEnd => self.caret_end(),
            EditorIntent::HistoryBack => self.history_back(),
            EditorIntent::HistoryForward => self.history_forward(),
            EditorIntent::Commit => return EditOutcome::Commit(self.commit()),
        };
        if changed {
            EditOutcome::Changed
        } else {
            EditOutcome::Unchanged
        }
    }

    /// Splice `c` into `cmd` at the caret. The caret keeps its offset from
    /// the right, so it stays in front of the same trailing text.
    pub fn insert(&mut self, c: char) -> bool {
        let Some(idx) = self.insertion_index() else {
            return false;
        };
        let at = byte_index(&self.cmd, idx);
        self.cmd.insert(at, c);
        true
    }

    /// Delete the char left of the caret.
    pub fn backspace(&mut self) -> bool {
        match self.insertion_index() {
            Some(idx) if idx > 0 => {
                let at = byte_index(&self.cmd, idx - 1);
                self.cmd.remove(at);
                true
            }
            _ => false,
        }
    }

    /// Delete the char under the caret.
    pub fn delete(&mut self) -> bool {
        if self.caret_offset == 0 {
            return false;
        }
        let Some(idx) = self.insertion_index() else {
            return false;
        };
        let at = byte_index(&self.cmd, idx);
        self.cmd.remove(at);
        self.caret_offset -= 1;
        true
    }

    pub fn caret_left(&mut self) -> bool {
        if self.caret_offset >= self.cmd_len() {
            return false;
        }
        self.caret_offset += 1;
        true
    }

    pub fn caret_right(&mut self) -> bool {
        if self.caret_offset == 0 {
            return false;
        }
        self.caret_offset -= 1;
        true
    }

    /// Move the caret to the start of the command.
    pub fn caret_home(&mut self) -> bool {
        let home = self.cmd_len();
        let moved = self.caret_offset != home;
        self.caret_offset = home;
        moved
    }

    /// Move the caret past the last character.
    pub fn caret_end(&mut self) -> bool {
        let moved = self.caret_offset != 0;
        self.caret_offset = 0;
        moved
    }

    /// Show the next older history entry, stashing the live command on entry.
    pub fn history_back(&mut self) -> bool {
        if self.history_num >= self.history.len() {
            return false;
        }
        if self.history_num == 0 {
            self.stash = self.cmd.clone();
        }
        self.history_num += 1;
        self.cmd = self.history[self.history.len() - self.history_num].clone();
        self.caret_offset = 0;
        true
    }

    /// Show the next newer history entry, restoring the stash at the end.
    pub fn history_forward(&mut self) -> bool {
        if self.history_num == 0 {
            return false;
        }
        self.history_num -= 1;
        self.cmd = if self.history_num == 0 {
            std::mem::take(&mut self.stash)
        } else {
            self.history[self.history.len() - self.history_num].clone()
        };
        self.caret_offset = 0;
        true
    }

    /// Record `cmd` in history and return it for transmission.
    ///
    /// `cmd` itself is left in place as the uncommitted echo; it is removed by
    /// [`clear_echo`](Self::clear_echo) once the remote starts replying.
    /// Empty commands are sent but not recorded.
    pub fn commit(&mut self) -> String {
        let sent = self.cmd.clone();
        if !sent.is_empty() {
            self.history.push(sent.clone());
        }
        self.history_num = 0;
        self.stash.clear();
        self.caret_offset = 0;
        tracing::trace!(
            target: "replterm.editor",
            chars = sent.chars().count(),
            history_len = self.history.len(),
            "command committed"
        );
        sent
    }

    /// Drop the uncommitted echo of the last command.
    pub fn clear_echo(&mut self) {
        self.cmd.clear();
        self.caret_offset = 0;
    }

    /// Wipe transcript and command, then commit the empty command so the
    /// remote reprints its prompt. The newline that precedes that prompt is
    /// stripped from the next transcript append.
    pub fn clear(&mut self) -> String {
        self.transcript.clear();
        self.cmd.clear();
        self.strip_leading_newline = true;
        tracing::debug!(target: "replterm.editor", "buffer cleared");
        self.commit()
    }

    /// Forget the transcript without touching the command line or history.
    pub fn reset_transcript(&mut self) {
        self.transcript.clear();
        self.strip_leading_newline = false;
    }

    /// Append decoded output to the transcript.
    pub fn append_transcript(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let text = if std::mem::take(&mut self.strip_leading_newline) {
            text.strip_prefix("\r\n")
                .or_else(|| text.strip_prefix('\n'))
                .unwrap_or(text)
        } else {
            text
        };
        self.transcript.push_str(text);
    }

    /// Split `transcript + cmd` at the caret.
    #[must_use]
    pub fn projection(&self) -> DisplayProjection {
        let total = self.transcript.chars().count() + self.cmd_len();
        let split = total.saturating_sub(self.caret_offset);
        let mut chars = self.transcript.chars().chain(self.cmd.chars());
        let before_caret: String = chars.by_ref().take(split).collect();
        let under_caret = chars.next();
        let after_caret: String = chars.collect();
        DisplayProjection {
            before_caret,
            under_caret,
            after_caret,
        }
    }
}

/// Byte offset of the `idx`-th char of `s` (or `s.len()` past the end).
fn byte_index(s: &str, idx: usize) -> usize {
    s.char_indices().nth(idx).map_or(s.len(), |(i, _)| i)
}
