#![forbid(unsafe_code)]

//! Frames exchanged with the execution backend.
//!
//! The backend's socket carries raw terminal output, usually one byte per
//! frame, with no length prefix or delimiter. A handful of whole text frames
//! are control signals instead of output:
//!
//! | frame            | meaning                                  |
//! |------------------|------------------------------------------|
//! | `RESETTERMINAL`  | wipe the terminal                        |
//! | `RUNDONE`        | the current run finished                 |
//! | `RUNTIMEOUT`     | the current run hit the execution limit  |
//! | `CANCELRUN`      | the current run was cancelled remotely   |
//!
//! Outbound traffic is either a command line or the interrupt byte (`0x03`).

use serde::{Deserialize, Serialize};

/// Byte sent by the stop action (ETX, what Ctrl+C produces in a tty).
pub const INTERRUPT_BYTE: u8 = 0x03;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Control signals recognized on the inbound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentinel {
    ResetTerminal,
    RunTimeout,
    RunDone,
    CancelRun,
}

impl Sentinel {
    pub const ALL: [Self; 4] = [
        Self::ResetTerminal,
        Self::RunTimeout,
        Self::RunDone,
        Self::CancelRun,
    ];

    /// Wire spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResetTerminal => "RESETTERMINAL",
            Self::RunTimeout => "RUNTIMEOUT",
            Self::RunDone => "RUNDONE",
            Self::CancelRun => "CANCELRUN",
        }
    }

    /// Match a whole text frame against the sentinel spellings.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == text)
    }
}

/// A frame as delivered by the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum InboundFrame {
    Binary(Vec<u8>),
    Text(String),
}

/// An inbound frame after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Terminal output bytes for the reassembler.
    Output(Vec<u8>),
    /// Control signal; never reaches the transcript.
    Control(Sentinel),
}

impl InboundFrame {
    /// Split control signals from payload.
    ///
    /// Only a text frame whose entire content is a sentinel spelling is a
    /// control signal; binary frames are always output.
    #[must_use]
    pub fn classify(self) -> Inbound {
        match self {
            Self::Binary(bytes) => Inbound::Output(bytes),
            Self::Text(text) => match Sentinel::parse(&text) {
                Some(sentinel) => Inbound::Control(sentinel),
                None => Inbound::Output(text.into_bytes()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A frame sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// A committed command line, terminator included.
    Command(String),
    /// The interrupt byte.
    Interrupt,
}

impl OutboundFrame {
    /// Command frame with `terminator` appended.
    #[must_use]
    pub fn command(cmd: &str, terminator: &str) -> Self {
        let mut line = String::with_capacity(cmd.len() + terminator.len());
        line.push_str(cmd);
        line.push_str(terminator);
        Self::Command(line)
    }

    /// Raw bytes to put on the wire.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Command(line) => line.as_bytes().to_vec(),
            Self::Interrupt => vec![INTERRUPT_BYTE],
        }
    }
}
