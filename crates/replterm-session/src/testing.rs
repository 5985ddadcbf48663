//! In-memory channel and widget doubles.
//!
//! Used by the integration tests and by `replterm-replay`, which runs a
//! recorded trace through a session with no browser or socket attached.

use replterm_core::OutboundFrame;

use crate::channel::Channel;
use crate::error::ChannelError;
use crate::widget::TerminalWidget;

/// A channel that records every frame it is asked to send.
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    frames: Vec<OutboundFrame>,
    closed: bool,
}

impl RecordingChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose every send fails with [`ChannelError::Closed`].
    #[must_use]
    pub fn closed() -> Self {
        Self {
            frames: Vec::new(),
            closed: true,
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    #[must_use]
    pub fn frames(&self) -> &[OutboundFrame] {
        &self.frames
    }

    /// Every recorded frame flattened to wire bytes.
    #[must_use]
    pub fn wire_bytes(&self) -> Vec<u8> {
        self.frames.iter().flat_map(OutboundFrame::to_bytes).collect()
    }
}

impl Channel for RecordingChannel {
    fn send(&mut self, frame: OutboundFrame) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        self.frames.push(frame);
        Ok(())
    }
}

/// A line-oriented terminal that keeps its text in memory.
///
/// CSI escape sequences are swallowed, `\r` is ignored, `\n` starts a new
/// line, and lines wrap at `cols`. The visible window is the last `rows`
/// lines, shifted up by however far the buffer has been scrolled back.
#[derive(Debug, Clone)]
pub struct MemoryTerminal {
    rows: usize,
    cols: usize,
    lines: Vec<String>,
    scrollback: usize,
    selection: Option<String>,
    resets: usize,
    writes: usize,
}

impl MemoryTerminal {
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows: usize::from(rows),
            cols: usize::from(cols),
            lines: Vec::new(),
            scrollback: 0,
            selection: None,
            resets: 0,
            writes: 0,
        }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Everything written since the last reset or clear, escapes removed.
    #[must_use]
    pub fn contents(&self) -> String {
        self.lines.join("\n")
    }

    /// Lines scrolled back from the bottom.
    #[must_use]
    pub fn scrollback(&self) -> usize {
        self.scrollback
    }

    #[must_use]
    pub fn resets(&self) -> usize {
        self.resets
    }

    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Simulate the user selecting text.
    pub fn set_selection(&mut self, selection: Option<String>) {
        self.selection = selection;
    }

    fn window_start(&self) -> usize {
        self.max_scrollback().saturating_sub(self.scrollback)
    }

    fn push_char(&mut self, c: char) {
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        match c {
            '\n' => self.lines.push(String::new()),
            '\r' => {}
            c => {
                let wrap = self
                    .lines
                    .last()
                    .is_some_and(|line| self.cols > 0 && line.chars().count() >= self.cols);
                if wrap {
                    self.lines.push(String::new());
                }
                if let Some(line) = self.lines.last_mut() {
                    line.push(c);
                }
            }
        }
    }
}

impl TerminalWidget for MemoryTerminal {
    fn write(&mut self, text: &str) {
        self.writes += 1;
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\x1b' && chars.peek() == Some(&'[') {
                chars.next();
                // Parameters and intermediates run until a final byte in @..~.
                for next in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&next) {
                        break;
                    }
                }
                continue;
            }
            self.push_char(c);
        }
    }

    fn resize(&mut self, rows: u16, cols: u16) {
        self.rows = usize::from(rows);
        self.cols = usize::from(cols);
        self.scrollback = self.scrollback.min(self.max_scrollback());
    }

    fn scroll_lines(&mut self, lines: i32) {
        let amount = lines.unsigned_abs() as usize;
        if lines < 0 {
            self.scrollback = (self.scrollback + amount).min(self.max_scrollback());
        } else {
            self.scrollback = self.scrollback.saturating_sub(amount);
        }
    }

    fn scroll_to_bottom(&mut self) {
        self.scrollback = 0;
    }

    fn max_scrollback(&self) -> usize {
        self.lines.len().saturating_sub(self.rows)
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.scrollback = 0;
    }

    fn reset(&mut self) {
        self.lines.clear();
        self.scrollback = 0;
        self.selection = None;
        self.resets += 1;
    }

    fn selected_text(&self) -> Option<String> {
        self.selection.clone()
    }

    fn line(&self, row: usize) -> Option<String> {
        if row >= self.rows {
            return None;
        }
        self.lines.get(self.window_start() + row).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn recording_channel_keeps_order() {
        let mut channel = RecordingChannel::new();
        channel.send(OutboundFrame::command("ls", "\n")).expect("send");
        channel.send(OutboundFrame::Interrupt).expect("send");
        assert_eq!(channel.wire_bytes(), b"ls\n\x03".to_vec());
    }

    #[test]
    fn closed_channel_rejects_sends() {
        let mut channel = RecordingChannel::closed();
        assert_eq!(
            channel.send(OutboundFrame::Interrupt),
            Err(ChannelError::Closed)
        );
        assert!(channel.frames().is_empty());
    }

    #[test]
    fn escapes_are_swallowed() {
        let mut term = MemoryTerminal::new(4, 80);
        term.write("$ l\x1b[7ms\x1b[27m\r\nok");
        assert_eq!(term.contents(), "$ ls\nok");
        assert_eq!(term.line(0).as_deref(), Some("$ ls"));
        assert_eq!(term.line(1).as_deref(), Some("ok"));
        assert_eq!(term.line(2), None);
    }

    #[test]
    fn long_lines_wrap_at_cols() {
        let mut term = MemoryTerminal::new(4, 3);
        term.write("abcdefg");
        assert_eq!(term.contents(), "abc\ndef\ng");
    }

    #[test]
    fn visible_window_follows_scrollback() {
        let mut term = MemoryTerminal::new(2, 80);
        term.write("a\nb\nc\nd");
        assert_eq!(term.line(0).as_deref(), Some("c"));
        term.scroll_lines(-1);
        assert_eq!(term.line(0).as_deref(), Some("b"));
        term.scroll_lines(-10);
        assert_eq!(term.max_scrollback(), 2);
        assert_eq!(term.scrollback(), 2);
        assert_eq!(term.line(0).as_deref(), Some("a"));
        term.scroll_to_bottom();
        assert_eq!(term.line(1).as_deref(), Some("d"));
    }

    #[test]
    fn reset_drops_text_and_selection() {
        let mut term = MemoryTerminal::new(2, 80);
        term.write("hello");
        term.set_selection(Some("ell".into()));
        assert_eq!(term.selected_text().as_deref(), Some("ell"));
        term.reset();
        assert_eq!(term.contents(), "");
        assert_eq!(term.selected_text(), None);
        assert_eq!(term.resets(), 1);
    }
}
