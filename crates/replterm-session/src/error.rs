use std::path::PathBuf;

use thiserror::Error;

use replterm_core::ConfigError;

/// Failure reported by a [`Channel`](crate::channel::Channel) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,

    #[error("send failed: {message}")]
    Send { message: String },
}

impl ChannelError {
    #[must_use]
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Errors from the trace replay tool.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("trace line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("trace file does not exist: {path}")]
    MissingTrace { path: PathBuf },
}

impl ReplayError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingTrace { .. } => 2,
            Self::Parse { .. } | Self::Config(_) => 3,
            _ => 1,
        }
    }
}
