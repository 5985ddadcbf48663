//! The terminal emulator the session renders into.

/// Operations the session needs from a terminal emulator widget.
///
/// Rows are addressed in the widget's visible buffer, `0` at the top.
pub trait TerminalWidget {
    /// Write text, including escape sequences.
    fn write(&mut self, text: &str);

    fn resize(&mut self, rows: u16, cols: u16);

    /// Scroll the internal line buffer; negative scrolls back.
    fn scroll_lines(&mut self, lines: i32);

    fn scroll_to_bottom(&mut self);

    /// How many lines the internal buffer can scroll back from the bottom.
    fn max_scrollback(&self) -> usize;

    /// Clear the screen, keeping the widget's modes.
    fn clear(&mut self);

    /// Full reset to the power-on state.
    fn reset(&mut self);

    /// Currently selected text, if any.
    fn selected_text(&self) -> Option<String>;

    /// Read back one visible row.
    fn line(&self, row: usize) -> Option<String>;
}

impl<W: TerminalWidget + ?Sized> TerminalWidget for Box<W> {
    fn write(&mut self, text: &str) {
        (**self).write(text);
    }

    fn resize(&mut self, rows: u16, cols: u16) {
        (**self).resize(rows, cols);
    }

    fn scroll_lines(&mut self, lines: i32) {
        (**self).scroll_lines(lines);
    }

    fn scroll_to_bottom(&mut self) {
        (**self).scroll_to_bottom();
    }

    fn max_scrollback(&self) -> usize {
        (**self).max_scrollback()
    }

    fn clear(&mut self) {
        (**self).clear();
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn selected_text(&self) -> Option<String> {
        (**self).selected_text()
    }

    fn line(&self, row: usize) -> Option<String> {
        (**self).line(row)
    }
}
