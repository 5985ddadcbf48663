#![forbid(unsafe_code)]

//! Host-driven idle timers.
//!
//! Nothing in this crate sleeps or spawns. A timer is a deadline that the
//! host compares against its clock by calling [`IdleTimer::fire`] from its
//! poll loop (a `setTimeout` callback in the browser, a tick in tests).
//!
//! Each purpose (output flush, resize debounce) owns exactly one
//! [`IdleTimer`], so there is never more than one pending deadline per
//! purpose: re-arming replaces the previous deadline instead of stacking a
//! second one.

use web_time::{Duration, Instant};

/// A restartable one-shot deadline.
#[derive(Debug, Clone)]
pub struct IdleTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl IdleTimer {
    /// Create a disarmed timer that fires `delay` after each [`arm`](Self::arm).
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Idle gap between the last [`arm`](Self::arm) and the fire time.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)start the timer relative to `now`, invalidating any earlier deadline.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Drop the pending deadline, if any.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is pending.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Pending deadline, for hosts that schedule a wake-up.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fire the timer if its deadline has passed.
    ///
    /// Returns `true` exactly once per arming; the timer is disarmed after.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
