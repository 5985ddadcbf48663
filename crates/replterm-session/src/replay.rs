//! Offline replay of recorded session traces.
//!
//! A trace is JSON Lines, one timestamped event per line. Blank lines and
//! lines starting with `#` are skipped.
//!
//! ```text
//! {"at_ms": 0,   "kind": "text", "data": "$ "}
//! {"at_ms": 500, "kind": "type", "text": "ls"}
//! {"at_ms": 520, "kind": "key",  "key": "Enter"}
//! {"at_ms": 560, "kind": "binary", "data": [108, 115]}
//! ```
//!
//! Events are applied to a session wired to [`RecordingChannel`] and
//! [`MemoryTerminal`]. Timers fire at their exact deadlines between events,
//! so the result does not depend on wall-clock speed.

use std::io::BufRead;
use std::path::Path;

use replterm_core::scroll_sync::ViewportMetrics;
use replterm_core::{InboundFrame, KeyEvent, Modifiers, OutboundFrame, TerminalConfig};
use serde::{Deserialize, Serialize};
use web_time::{Duration, Instant};

use crate::error::ReplayError;
use crate::session::{Session, SessionCommand};
use crate::testing::{MemoryTerminal, RecordingChannel};

/// One line of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Milliseconds since the start of the trace.
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: TraceEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A DOM key press.
    Key {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        alt: bool,
        #[serde(default)]
        shift: bool,
        #[serde(default)]
        meta: bool,
    },
    /// Shorthand for one key press per character.
    Type { text: String },
    /// Binary frame from the backend.
    Binary { data: Vec<u8> },
    /// Text frame from the backend.
    Text { data: String },
    Scroll { position: i64 },
    Resize { client_height: f64, scroll_height: f64 },
    Clear,
    Stop,
    BeginRun,
    JumpToBottom,
}

impl TraceEvent {
    /// Session commands this event expands to.
    #[must_use]
    pub fn commands(&self) -> Vec<SessionCommand> {
        match self {
            Self::Key {
                key,
                ctrl,
                alt,
                shift,
                meta,
            } => {
                let mut mods = Modifiers::empty();
                mods.set(Modifiers::CTRL, *ctrl);
                mods.set(Modifiers::ALT, *alt);
                mods.set(Modifiers::SHIFT, *shift);
                mods.set(Modifiers::META, *meta);
                vec![SessionCommand::Key(KeyEvent::from_dom(key, mods))]
            }
            Self::Type { text } => text
                .chars()
                .map(|c| SessionCommand::Key(KeyEvent::char(c)))
                .collect(),
            Self::Binary { data } => vec![SessionCommand::Inbound(InboundFrame::Binary(data.clone()))],
            Self::Text { data } => vec![SessionCommand::Inbound(InboundFrame::Text(data.clone()))],
            Self::Scroll { position } => vec![SessionCommand::Scroll(*position)],
            Self::Resize {
                client_height,
                scroll_height,
            } => vec![SessionCommand::Resize {
                client_height: *client_height,
                scroll_height: *scroll_height,
            }],
            Self::Clear => vec![SessionCommand::Clear],
            Self::Stop => vec![SessionCommand::Stop],
            Self::BeginRun => vec![SessionCommand::BeginRun],
            Self::JumpToBottom => vec![SessionCommand::JumpToBottom],
        }
    }
}

/// Parse a JSONL trace.
pub fn parse_trace(reader: impl BufRead) -> Result<Vec<TraceRecord>, ReplayError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|source| ReplayError::Parse {
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Read and parse a trace file.
pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>, ReplayError> {
    if !path.exists() {
        return Err(ReplayError::MissingTrace {
            path: path.to_path_buf(),
        });
    }
    let file = std::fs::File::open(path)?;
    parse_trace(std::io::BufReader::new(file))
}

/// What a replayed session ended up with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub transcript: String,
    pub cmd: String,
    pub history: Vec<String>,
    pub frames: Vec<OutboundFrame>,
    /// Session events, debug-formatted.
    pub events: Vec<String>,
    /// Channel failures hit during the replay.
    pub errors: Vec<String>,
    pub scroll_top: f64,
    pub flushes: u64,
    pub dropped_batches: u64,
}

/// Viewport assumed for replays unless the trace resizes it.
pub const DEFAULT_VIEWPORT: ViewportMetrics = ViewportMetrics {
    scroll_top: 0.0,
    client_height: 600.0,
    scroll_height: 4000.0,
};

/// Run `records` through a fresh in-memory session.
///
/// Channel errors are recorded in the report rather than aborting the run.
#[must_use]
pub fn replay(config: TerminalConfig, records: &[TraceRecord]) -> ReplayReport {
    let widget = MemoryTerminal::new(config.rows, config.cols);
    let mut session = Session::new(config, RecordingChannel::new(), widget, DEFAULT_VIEWPORT);
    let t0 = Instant::now();
    let mut events = Vec::new();
    let mut errors = Vec::new();

    for record in records {
        let now = t0 + Duration::from_millis(record.at_ms);
        run_timers_until(&mut session, Some(now));
        for command in record.event.commands() {
            if let Err(err) = session.apply(command, now) {
                errors.push(err.to_string());
            }
        }
        events.extend(session.drain_events().iter().map(|e| format!("{e:?}")));
    }
    run_timers_until(&mut session, None);
    events.extend(session.drain_events().iter().map(|e| format!("{e:?}")));

    let stats = session.reassembly_stats();
    let buffer = session.buffer();
    ReplayReport {
        transcript: buffer.transcript().to_string(),
        cmd: buffer.cmd().to_string(),
        history: buffer.history().to_vec(),
        frames: session.channel().frames().to_vec(),
        events,
        errors,
        scroll_top: session.scroll_top(),
        flushes: stats.flushes,
        dropped_batches: stats.dropped_batches,
    }
}

/// Fire every timer due at or before `until` (all of them for `None`), each
/// at its own deadline.
fn run_timers_until(
    session: &mut Session<RecordingChannel, MemoryTerminal>,
    until: Option<Instant>,
) {
    while let Some(deadline) = session.next_deadline() {
        if until.is_some_and(|limit| deadline > limit) {
            break;
        }
        session.poll(deadline);
    }
}
