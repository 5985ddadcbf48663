//! Per-session cancellation.
//!
//! A session owns one [`CancellationSource`]. Every continuation the host
//! schedules on the session's behalf (timer callbacks, late responses from
//! room setup, socket callbacks) holds a [`CancellationToken`] and checks it
//! before touching session state, so completions that arrive after teardown
//! are dropped instead of mutating a dead editor.
//!
//! # Example
//!
//! ```
//! use replterm_core::cancellation::CancellationSource;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//! let mut applied = Vec::new();
//!
//! token.run_if_live(|| applied.push("setup reply"));
//! source.cancel();
//! token.run_if_live(|| applied.push("late reply"));
//!
//! assert_eq!(applied, ["setup reply"]);
//! ```

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable view of a session's cancellation state.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<AtomicBool>,
}

/// The control handle that triggers cancellation.
///
/// Dropping the source does **not** cancel its tokens; teardown must call
/// [`cancel`](Self::cancel) explicitly.
#[derive(Debug)]
pub struct CancellationSource {
    inner: Arc<AtomicBool>,
}

impl CancellationSource {
    /// Create a new, uncancelled source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a token observing this source.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Cancel. Idempotent.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }

    /// Run `f` only if the session is still live.
    pub fn run_if_live<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if self.is_cancelled() {
            None
        } else {
            Some(f())
        }
    }
}
