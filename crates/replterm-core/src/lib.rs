#![forbid(unsafe_code)]

//! Host-agnostic core of the REPL terminal.
//!
//! # Role
//! `replterm-core` holds the three stateful pieces behind the browser
//! terminal, each as a plain owned state machine driven by the host:
//!
//! - [`line_editor`]: the command line layered over the output transcript,
//!   with caret movement and history browsing.
//! - [`reassembler`]: idle-gap batching of byte-sized output chunks into
//!   strictly decoded UTF-8 text.
//! - [`scroll_sync`]: the virtual scroll track that drives both the real
//!   viewport and the widget's internal line buffer.
//!
//! Supporting modules: [`key`] (key normalization and dispatch policy),
//! [`protocol`] (inbound/outbound frames), [`timer`] (host-driven deadlines),
//! [`cancellation`] (per-session teardown signal), and [`config`].
//!
//! # Time
//! No module sleeps or spawns. Anything time-based takes an explicit
//! `web_time::Instant` so the same code runs under wasm and in deterministic
//! tests.

pub mod cancellation;
pub mod config;
pub mod key;
pub mod line_editor;
pub mod protocol;
pub mod reassembler;
pub mod scroll_sync;
pub mod timer;

pub use cancellation::{CancellationSource, CancellationToken};
pub use config::{ConfigError, TerminalConfig};
pub use key::{EditorIntent, KeyCode, KeyEvent, Modifiers};
pub use line_editor::{CommandBuffer, DisplayProjection, EditOutcome};
pub use protocol::{Inbound, InboundFrame, OutboundFrame, Sentinel};
pub use reassembler::{BlobQueue, ChunkArrival, DecodeError, FlushOutcome, ReassemblyStats};
pub use scroll_sync::{
    ResizeOutcome, ScrollConfig, ScrollEffect, ScrollSnapshot, ScrollSynchronizer,
    ViewportMetrics, VirtualTrack,
};
pub use timer::IdleTimer;
