#![forbid(unsafe_code)]

//! One terminal session: editor, reassembler, and scroll state bound to a
//! channel and a widget.
//!
//! # Role
//! [`Session`] is the only owner of the session's mutable state. Hosts never
//! poke fields directly; every mutation goes through a method here or through
//! a [`SessionCommand`] passed to [`Session::apply`].
//!
//! # Driving a session
//! The session never sleeps. The host forwards key presses, socket frames,
//! scroll and resize events as they happen, and calls [`Session::poll`] when
//! [`Session::next_deadline`] passes:
//!
//! ```
//! use replterm_core::{InboundFrame, KeyEvent, TerminalConfig};
//! use replterm_core::scroll_sync::ViewportMetrics;
//! use replterm_session::session::Session;
//! use replterm_session::testing::{MemoryTerminal, RecordingChannel};
//! use web_time::{Duration, Instant};
//!
//! let config = TerminalConfig::default();
//! let widget = MemoryTerminal::new(config.rows, config.cols);
//! let viewport = ViewportMetrics::new(300.0, 2000.0);
//! let mut session = Session::new(config, RecordingChannel::new(), widget, viewport);
//!
//! let t0 = Instant::now();
//! session.on_inbound(InboundFrame::Binary(b"$ ".to_vec()), t0);
//! session.poll(t0 + Duration::from_millis(150));
//! assert_eq!(session.buffer().transcript(), "$ ");
//!
//! session.handle_key(&KeyEvent::char('l')).unwrap();
//! assert_eq!(session.buffer().cmd(), "l");
//! ```
//!
//! # Cancellation
//! [`Session::teardown`] cancels the session's token. From then on every
//! entry point logs at `debug` and returns without touching state, and
//! continuations scheduled through [`Session::apply_if_live`] are skipped.

use std::collections::VecDeque;

use replterm_core::scroll_sync::{ScrollEffect, ScrollSnapshot, ViewportMetrics};
use replterm_core::{
    BlobQueue, CancellationSource, CancellationToken, CommandBuffer, DecodeError,
    DisplayProjection, EditOutcome, EditorIntent, FlushOutcome, Inbound, InboundFrame, KeyEvent,
    OutboundFrame, ReassemblyStats, ScrollSynchronizer, Sentinel, TerminalConfig,
};
use web_time::Instant;

use crate::channel::Channel;
use crate::error::Result;
use crate::widget::TerminalWidget;

const INVERSE_ON: &str = "\x1b[7m";
const INVERSE_OFF: &str = "\x1b[27m";

/// Whether the backend is currently executing something the session started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

/// How a run ended, as reported by a control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    TimedOut,
    Canceled,
}

/// Notifications for the host, collected until [`Session::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    RunFinished(RunOutcome),
    /// The backend asked for a terminal reset.
    TerminalReset,
    /// An output batch failed to decode and was dropped.
    OutputDropped(DecodeError),
}

/// Every mutation a host can request, in data form.
///
/// Useful for queuing input while a session is being set up, and for
/// replaying recorded traces.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Key(KeyEvent),
    Inbound(InboundFrame),
    /// The virtual scroll track reported a new position.
    Scroll(i64),
    Resize {
        client_height: f64,
        scroll_height: f64,
    },
    Clear,
    Stop,
    BeginRun,
    JumpToBottom,
    /// Timer tick.
    Poll,
}

/// A live terminal session.
#[derive(Debug)]
pub struct Session<C, W> {
    config: TerminalConfig,
    buffer: CommandBuffer,
    queue: BlobQueue,
    scroll: ScrollSynchronizer,
    channel: C,
    widget: W,
    cancel: CancellationSource,
    run_state: RunState,
    events: VecDeque<SessionEvent>,
}

impl<C: Channel, W: TerminalWidget> Session<C, W> {
    /// Open a session and size the widget to the configured grid.
    pub fn new(config: TerminalConfig, channel: C, mut widget: W, viewport: ViewportMetrics) -> Self {
        widget.resize(config.rows, config.cols);
        tracing::debug!(
            target: "replterm.session",
            rows = config.rows,
            cols = config.cols,
            flush_delay_ms = config.flush_delay_ms,
            "session opened"
        );
        Self {
            buffer: CommandBuffer::new(),
            queue: BlobQueue::new(config.flush_delay()),
            scroll: ScrollSynchronizer::new(config.scroll_config(), viewport),
            channel,
            widget,
            cancel: CancellationSource::new(),
            run_state: RunState::Idle,
            events: VecDeque::new(),
            config,
        }
    }

    // ── accessors ───────────────────────────────────────────────────────

    #[must_use]
    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    #[must_use]
    pub fn buffer(&self) -> &CommandBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    #[must_use]
    pub fn widget(&self) -> &W {
        &self.widget
    }

    /// Mutable widget access for host-side concerns such as selection.
    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    #[must_use]
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    #[must_use]
    pub fn scroll_top(&self) -> f64 {
        self.scroll.scroll_top()
    }

    #[must_use]
    pub fn scroll_snapshot(&self) -> ScrollSnapshot {
        self.scroll.snapshot()
    }

    #[must_use]
    pub fn reassembly_stats(&self) -> ReassemblyStats {
        self.queue.stats()
    }

    /// A token for continuations the host schedules on this session's behalf.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel.token()
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.queue.next_deadline(), self.scroll.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Take the notifications gathered since the last call.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    fn ignored(&self, what: &'static str) -> bool {
        if self.cancel.is_cancelled() {
            tracing::debug!(target: "replterm.session", what, "ignored after teardown");
            true
        } else {
            false
        }
    }

    // ── command dispatch ────────────────────────────────────────────────

    /// Apply one [`SessionCommand`].
    pub fn apply(&mut self, command: SessionCommand, now: Instant) -> Result<()> {
        match command {
            SessionCommand::Key(key) => {
                self.handle_key(&key)?;
            }
            SessionCommand::Inbound(frame) => self.on_inbound(frame, now),
            SessionCommand::Scroll(position) => {
                self.scroll(position);
            }
            SessionCommand::Resize {
                client_height,
                scroll_height,
            } => self.resize(client_height, scroll_height, now),
            SessionCommand::Clear => self.clear()?,
            SessionCommand::Stop => self.stop()?,
            SessionCommand::BeginRun => self.begin_run(),
            SessionCommand::JumpToBottom => self.jump_to_bottom(),
            SessionCommand::Poll => {
                self.poll(now);
            }
        }
        Ok(())
    }

    /// Run `f` against the session unless it has been torn down.
    pub fn apply_if_live<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Option<R> {
        if self.ignored("continuation") {
            return None;
        }
        Some(f(self))
    }

    // ── input ───────────────────────────────────────────────────────────

    /// Feed one key press. Returns `false` for keys the terminal leaves to
    /// the host and for boundary no-ops.
    ///
    /// On Enter the command is sent even if the channel then fails; the
    /// error is returned after history and the display are updated.
    pub fn handle_key(&mut self, key: &KeyEvent) -> Result<bool> {
        if self.ignored("key") {
            return Ok(false);
        }
        let Some(intent) = EditorIntent::from_key(key) else {
            return Ok(false);
        };
        tracing::trace!(target: "replterm.session", ?intent, "key");
        match self.buffer.apply(intent) {
            EditOutcome::Unchanged => Ok(false),
            EditOutcome::Changed => {
                self.refresh();
                Ok(true)
            }
            EditOutcome::Commit(cmd) => {
                let sent = self.send_command(&cmd);
                self.refresh();
                sent.map(|()| true)
            }
        }
    }

    fn send_command(&mut self, cmd: &str) -> Result<()> {
        self.queue.mark_command_sent();
        let frame = OutboundFrame::command(cmd, &self.config.line_terminator);
        self.send(frame)
    }

    fn send(&mut self, frame: OutboundFrame) -> Result<()> {
        self.channel.send(frame).map_err(|err| {
            tracing::warn!(target: "replterm.session", error = %err, "channel send failed");
            err.into()
        })
    }

    /// Feed one frame received from the backend.
    pub fn on_inbound(&mut self, frame: InboundFrame, now: Instant) {
        if self.ignored("inbound frame") {
            return;
        }
        match frame.classify() {
            Inbound::Output(bytes) => {
                if self.queue.push(bytes, now).first_reply {
                    self.buffer.clear_echo();
                }
            }
            Inbound::Control(sentinel) => self.on_sentinel(sentinel),
        }
    }

    fn on_sentinel(&mut self, sentinel: Sentinel) {
        tracing::debug!(
            target: "replterm.session",
            sentinel = sentinel.as_str(),
            run_state = ?self.run_state,
            "control frame"
        );
        self.run_state = RunState::Idle;
        let outcome = match sentinel {
            Sentinel::ResetTerminal => {
                let dropped = self.queue.discard();
                self.buffer.reset_transcript();
                self.widget.reset();
                self.events.push_back(SessionEvent::TerminalReset);
                tracing::debug!(target: "replterm.session", dropped, "terminal reset");
                self.refresh();
                return;
            }
            Sentinel::RunDone => RunOutcome::Completed,
            Sentinel::RunTimeout => RunOutcome::TimedOut,
            Sentinel::CancelRun => RunOutcome::Canceled,
        };
        self.events.push_back(SessionEvent::RunFinished(outcome));
    }

    /// Fire whatever timers are due. Returns `true` if the display changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.ignored("poll") {
            return false;
        }
        let mut changed = false;
        if let Some(outcome) = self.queue.poll(now) {
            changed |= self.on_flush(outcome);
        }
        if let Some(resize) = self.scroll.poll(now) {
            if resize.realigned {
                self.widget.scroll_to_bottom();
            }
            changed |= resize.viewport_delta != 0.0;
        }
        changed
    }

    fn on_flush(&mut self, outcome: FlushOutcome) -> bool {
        match outcome {
            FlushOutcome::Decoded(text) => {
                self.buffer.append_transcript(&text);
                self.refresh();
                true
            }
            FlushOutcome::Dropped(err) => {
                self.events.push_back(SessionEvent::OutputDropped(err));
                false
            }
        }
    }

    // ── viewport ────────────────────────────────────────────────────────

    /// Handle a scroll event from the virtual track.
    pub fn scroll(&mut self, track_position: i64) -> ScrollEffect {
        if self.ignored("scroll") {
            return ScrollEffect::default();
        }
        let effect = self.scroll.on_scroll(track_position);
        if effect.widget_lines != 0 {
            self.widget.scroll_lines(effect.widget_lines);
        }
        effect
    }

    /// Record a viewport size change; applied by [`poll`](Self::poll) once
    /// resizes stop arriving.
    pub fn resize(&mut self, client_height: f64, scroll_height: f64, now: Instant) {
        if self.ignored("resize") {
            return;
        }
        self.scroll.request_resize(client_height, scroll_height, now);
    }

    /// Return to the newest output and follow it again.
    pub fn jump_to_bottom(&mut self) {
        if self.ignored("jump to bottom") {
            return;
        }
        self.scroll.jump_to_bottom();
        self.widget.scroll_to_bottom();
    }

    // ── actions ─────────────────────────────────────────────────────────

    /// Wipe the terminal and send an empty command so the backend prints a
    /// fresh prompt.
    pub fn clear(&mut self) -> Result<()> {
        if self.ignored("clear") {
            return Ok(());
        }
        let cmd = self.buffer.clear();
        self.widget.clear();
        let sent = self.send_command(&cmd);
        self.refresh();
        sent
    }

    /// Send the interrupt byte.
    ///
    /// Sent regardless of [`RunState`]: the backend may be running an
    /// interactive program this session never saw start.
    pub fn stop(&mut self) -> Result<()> {
        if self.ignored("stop") {
            return Ok(());
        }
        tracing::debug!(target: "replterm.session", run_state = ?self.run_state, "interrupt");
        self.send(OutboundFrame::Interrupt)
    }

    /// Note that the host started a run.
    pub fn begin_run(&mut self) {
        if self.ignored("begin run") {
            return;
        }
        self.run_state = RunState::Running;
    }

    /// The widget's current selection.
    #[must_use]
    pub fn copy_selection(&self) -> Option<String> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.widget.selected_text()
    }

    // ── lifecycle ───────────────────────────────────────────────────────

    /// Swap in a new connection, returning the old one.
    ///
    /// Output already queued is flushed first; the queue is then replaced so
    /// nothing from the old connection can mix with the new one.
    pub fn reconnect(&mut self, channel: C) -> Option<C> {
        if self.ignored("reconnect") {
            return None;
        }
        if let Some(outcome) = self.queue.flush_now() {
            self.on_flush(outcome);
        }
        self.queue = BlobQueue::new(self.config.flush_delay());
        tracing::debug!(target: "replterm.session", "channel replaced");
        Some(std::mem::replace(&mut self.channel, channel))
    }

    /// Cancel the session. Pending output is discarded without decoding.
    pub fn teardown(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        let dropped = self.queue.discard();
        tracing::debug!(target: "replterm.session", dropped, "session torn down");
    }

    // ── display ─────────────────────────────────────────────────────────

    /// Redraw the widget from the command buffer and keep new output in view.
    pub fn refresh(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let rendered = render(&self.buffer.projection());
        self.widget.reset();
        self.widget.write(&rendered);
        self.scroll.set_last_line(self.last_non_blank_row());
        self.scroll.set_widget_scrollback(self.widget.max_scrollback());
        if self.scroll.follow_output() {
            self.widget.scroll_to_bottom();
        } else {
            // The reset dropped the widget's own scroll position.
            let offset = self.scroll.widget_offset();
            if offset > 0 {
                self.widget
                    .scroll_lines(-i32::try_from(offset).unwrap_or(i32::MAX));
            }
        }
    }

    fn last_non_blank_row(&self) -> Option<usize> {
        (0..usize::from(self.config.rows))
            .rev()
            .find(|&row| {
                self.widget
                    .line(row)
                    .is_some_and(|line| !line.trim().is_empty())
            })
    }
}

/// Text to write for a projection, with the caret cell in inverse video.
#[must_use]
pub fn render(projection: &DisplayProjection) -> String {
    let mut out = String::with_capacity(
        projection.before_caret.len() + projection.after_caret.len() + 16,
    );
    out.push_str(&projection.before_caret);
    out.push_str(INVERSE_ON);
    match projection.under_caret {
        Some(c @ ('\n' | '\r')) => {
            out.push(' ');
            out.push_str(INVERSE_OFF);
            out.push(c);
        }
        Some(c) => {
            out.push(c);
            out.push_str(INVERSE_OFF);
        }
        None => {
            out.push(' ');
            out.push_str(INVERSE_OFF);
        }
    }
    out.push_str(&projection.after_caret);
    out
}
