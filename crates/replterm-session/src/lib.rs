#![forbid(unsafe_code)]

//! Session layer of the REPL terminal.
//!
//! Binds the host-agnostic state machines from `replterm-core` to a backend
//! [`Channel`] and a [`TerminalWidget`], and ships the `replterm-replay`
//! tool for running recorded traces offline.

pub mod channel;
pub mod cli;
pub mod error;
pub mod logging;
pub mod replay;
pub mod session;
pub mod testing;
pub mod widget;

pub use channel::Channel;
pub use error::{ChannelError, ReplayError, SessionError};
pub use session::{RunOutcome, RunState, Session, SessionCommand, SessionEvent};
pub use widget::TerminalWidget;
