#![forbid(unsafe_code)]

//! Idle-gap batching of inbound output chunks into decoded text.
//!
//! The execution backend streams its output with no message boundaries, one
//! byte per frame in practice. Decoding each frame on its own would split
//! every multi-byte code point, so chunks are queued and decoded together once
//! the stream has been quiet for [`BlobQueue::flush_delay`].
//!
//! # Invariants
//!
//! - Chunks are concatenated in arrival order and decoded exactly once.
//! - Decoding happens only when the idle timer fires (or on an explicit
//!   [`BlobQueue::flush_now`]); never partially.
//! - Decoding is strict. A batch that is not valid UTF-8 (typically because a
//!   code point straddled two idle windows) is logged and dropped whole; it is
//!   not carried into the next batch.
//!
//! # Usage
//!
//! ```
//! use replterm_core::reassembler::{BlobQueue, FlushOutcome};
//! use web_time::{Duration, Instant};
//!
//! let mut queue = BlobQueue::new(Duration::from_millis(100));
//! let t0 = Instant::now();
//! for (i, b) in b"Hello".iter().enumerate() {
//!     queue.push(vec![*b], t0 + Duration::from_millis(i as u64 * 10));
//! }
//! assert!(queue.poll(t0 + Duration::from_millis(60)).is_none());
//! let out = queue.poll(t0 + Duration::from_millis(200));
//! assert_eq!(out, Some(FlushOutcome::Decoded("Hello".to_string())));
//! ```

use std::string::FromUtf8Error;

use web_time::{Duration, Instant};

use crate::timer::IdleTimer;

/// Why a batch could not be turned into text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid UTF-8 in {batch_len}-byte batch at byte {valid_up_to}")]
pub struct DecodeError {
    /// Size of the dropped batch.
    pub batch_len: usize,
    /// Length of the valid prefix.
    pub valid_up_to: usize,
}

impl From<FromUtf8Error> for DecodeError {
    fn from(err: FromUtf8Error) -> Self {
        Self {
            batch_len: err.as_bytes().len(),
            valid_up_to: err.utf8_error().valid_up_to(),
        }
    }
}

/// Result of one flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The batch decoded; append this to the transcript.
    Decoded(String),
    /// The batch was malformed and has been discarded.
    Dropped(DecodeError),
}

/// What a chunk arrival implies for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkArrival {
    /// This was the first chunk after a command was sent: the caller should
    /// remove the command's local echo now that the remote is echoing it.
    pub first_reply: bool,
}

/// Counters for logs and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    pub chunks: u64,
    pub bytes: u64,
    pub flushes: u64,
    pub dropped_batches: u64,
    pub dropped_bytes: u64,
}

/// Arrival-ordered queue of raw chunks for one connection.
#[derive(Debug, Clone)]
pub struct BlobQueue {
    pending: Vec<Vec<u8>>,
    flush_timer: IdleTimer,
    awaiting_first_reply: bool,
    stats: ReassemblyStats,
}

impl BlobQueue {
    /// Create an empty queue that flushes after `flush_delay` of silence.
    #[must_use]
    pub fn new(flush_delay: Duration) -> Self {
        Self {
            pending: Vec::new(),
            flush_timer: IdleTimer::new(flush_delay),
            awaiting_first_reply: false,
            stats: ReassemblyStats::default(),
        }
    }

    #[must_use]
    pub fn flush_delay(&self) -> Duration {
        self.flush_timer.delay()
    }

    /// Number of queued, undecoded chunks.
    #[must_use]
    pub fn pending_chunks(&self) -> usize {
        self.pending.len()
    }

    /// Total undecoded bytes.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.pending.iter().map(Vec::len).sum()
    }

    /// When the next flush is due, if anything is queued.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.flush_timer.deadline()
    }

    #[must_use]
    pub fn is_awaiting_first_reply(&self) -> bool {
        self.awaiting_first_reply
    }

    #[must_use]
    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }

    /// Note that a command was just sent; the next chunk is its first reply.
    pub fn mark_command_sent(&mut self) {
        self.awaiting_first_reply = true;
    }

    /// Queue one chunk and restart the idle timer.
    pub fn push(&mut self, chunk: Vec<u8>, now: Instant) -> ChunkArrival {
        let first_reply = std::mem::take(&mut self.awaiting_first_reply);
        self.stats.chunks += 1;
        self.stats.bytes += chunk.len() as u64;
        self.pending.push(chunk);
        self.flush_timer.arm(now);
        tracing::trace!(
            target: "replterm.reassembler",
            pending = self.pending.len(),
            first_reply,
            "chunk queued"
        );
        ChunkArrival { first_reply }
    }

    /// Flush if the idle gap has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<FlushOutcome> {
        if self.flush_timer.fire(now) {
            self.flush_now()
        } else {
            None
        }
    }

    /// Decode everything queued right now, regardless of the timer.
    ///
    /// Returns `None` when the queue is empty.
    pub fn flush_now(&mut self) -> Option<FlushOutcome> {
        self.flush_timer.cancel();
        if self.pending.is_empty() {
            return None;
        }
        let chunks = std::mem::take(&mut self.pending);
        let batch: Vec<u8> = chunks.concat();
        self.stats.flushes += 1;

        match String::from_utf8(batch) {
            Ok(text) => {
                tracing::debug!(
                    target: "replterm.reassembler",
                    chunks = chunks.len(),
                    bytes = text.len(),
                    "batch decoded"
                );
                Some(FlushOutcome::Decoded(text))
            }
            Err(err) => {
                let err = DecodeError::from(err);
                self.stats.dropped_batches += 1;
                self.stats.dropped_bytes += err.batch_len as u64;
                tracing::warn!(
                    target: "replterm.reassembler",
                    chunks = chunks.len(),
                    batch_len = err.batch_len,
                    valid_up_to = err.valid_up_to,
                    "dropping undecodable output batch"
                );
                Some(FlushOutcome::Dropped(err))
            }
        }
    }

    /// Discard everything queued without decoding it.
    pub fn discard(&mut self) -> usize {
        self.flush_timer.cancel();
        let dropped = self.pending_bytes();
        self.pending.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const GAP: Duration = Duration::from_millis(100);

    fn ms(t0: Instant, n: u64) -> Instant {
        t0 + Duration::from_millis(n)
    }

    fn push_bytes(queue: &mut BlobQueue, bytes: &[u8], at: Instant) {
        for b in bytes {
            queue.push(vec![*b], at);
        }
    }

    #[test]
    fn burst_within_gap_flushes_once() {
        let mut q = BlobQueue::new(GAP);
        let t0 = Instant::now();
        for (i, b) in b"Hello".iter().enumerate() {
            q.push(vec![*b], ms(t0, i as u64 * 20));
        }
        assert_eq!(q.poll(ms(t0, 150)), None);
        assert_eq!(
            q.poll(ms(t0, 180)),
            Some(FlushOutcome::Decoded("Hello".into()))
        );
        assert_eq!(q.poll(ms(t0, 500)), None);
        assert_eq!(q.stats().flushes, 1);
    }

    #[test]
    fn long_gap_splits_into_two_flushes() {
        let mut q = BlobQueue::new(GAP);
        let t0 = Instant::now();
        push_bytes(&mut q, b"Hel", t0);
        let first = q.poll(ms(t0, 100));
        push_bytes(&mut q, b"lo", ms(t0, 250));
        let second = q.poll(ms(t0, 350));

        assert_eq!(first, Some(FlushOutcome::Decoded("Hel".into())));
        assert_eq!(second, Some(FlushOutcome::Decoded("lo".into())));
        assert_eq!(q.stats().flushes, 2);
    }

    #[test]
    fn multibyte_within_one_window_decodes() {
        let mut q = BlobQueue::new(GAP);
        let t0 = Instant::now();
        push_bytes(&mut q, "né€🙂".as_bytes(), t0);
        assert_eq!(
            q.poll(ms(t0, 100)),
            Some(FlushOutcome::Decoded("né€🙂".into()))
        );
    }

    #[traced_test]
    #[test]
    fn split_code_point_drops_batch_and_recovers() {
        let mut q = BlobQueue::new(GAP);
        let t0 = Instant::now();
        let e_acute = "é".as_bytes();
        assert_eq!(e_acute.len(), 2);

        push_bytes(&mut q, b"ab", t0);
        q.push(vec![e_acute[0]], t0);
        let first = q.poll(ms(t0, 100));
        assert!(matches!(
            first,
            Some(FlushOutcome::Dropped(DecodeError {
                batch_len: 3,
                valid_up_to: 2
            }))
        ));
        assert!(logs_contain("dropping undecodable output batch"));

        // The orphaned continuation byte poisons the next batch too.
        q.push(vec![e_acute[1]], ms(t0, 200));
        push_bytes(&mut q, b"cd", ms(t0, 200));
        assert!(matches!(
            q.poll(ms(t0, 300)),
            Some(FlushOutcome::Dropped(_))
        ));

        push_bytes(&mut q, b"ok", ms(t0, 400));
        assert_eq!(q.poll(ms(t0, 500)), Some(FlushOutcome::Decoded("ok".into())));

        let stats = q.stats();
        assert_eq!(stats.dropped_batches, 2);
        assert_eq!(stats.dropped_bytes, 6);
    }

    #[test]
    fn first_reply_is_reported_once() {
        let mut q = BlobQueue::new(GAP);
        let t0 = Instant::now();
        assert!(!q.push(b"x".to_vec(), t0).first_reply);
        q.mark_command_sent();
        assert!(q.is_awaiting_first_reply());
        assert!(q.push(b"l".to_vec(), t0).first_reply);
        assert!(!q.push(b"s".to_vec(), t0).first_reply);
        assert!(!q.is_awaiting_first_reply());
    }

    #[test]
    fn chunks_of_any_size_are_accepted() {
        let mut q = BlobQueue::new(GAP);
        let t0 = Instant::now();
        q.push(b"line one\n".to_vec(), t0);
        q.push(Vec::new(), t0);
        q.push(b"line two\n".to_vec(), t0);
        assert_eq!(q.pending_chunks(), 3);
        assert_eq!(
            q.flush_now(),
            Some(FlushOutcome::Decoded("line one\nline two\n".into()))
        );
        assert_eq!(q.next_deadline(), None);
    }

    #[test]
    fn flush_now_on_empty_queue_is_none() {
        let mut q = BlobQueue::new(GAP);
        assert_eq!(q.flush_now(), None);
        assert_eq!(q.stats().flushes, 0);
    }

    #[test]
    fn discard_clears_without_decoding() {
        let mut q = BlobQueue::new(GAP);
        let t0 = Instant::now();
        push_bytes(&mut q, b"abc", t0);
        assert_eq!(q.discard(), 3);
        assert_eq!(q.poll(ms(t0, 1_000)), None);
        assert_eq!(q.stats().flushes, 0);
    }
}
