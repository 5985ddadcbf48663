//! Property-based invariant tests for the output reassembler.
//!
//! 1. Valid UTF-8 split into arbitrary chunks, with arbitrary idle gaps that
//!    never cut a code point, decodes to exactly the original text.
//! 2. Every queued byte is either decoded or counted as dropped, once.
//! 3. Nothing is decoded before the idle deadline.

use proptest::prelude::*;
use replterm_core::reassembler::{BlobQueue, FlushOutcome};
use web_time::{Duration, Instant};

const GAP: Duration = Duration::from_millis(100);

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![Just('a'), Just('\n'), Just('é'), Just('中'), Just('🙂')],
        0..40,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// Split `bytes` into chunks of the given sizes (the last chunk takes the rest).
fn chunked(bytes: &[u8], sizes: &[usize]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut rest = bytes;
    for &size in sizes {
        if rest.is_empty() {
            break;
        }
        let (head, tail) = rest.split_at(size.min(rest.len()));
        chunks.push(head.to_vec());
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest.to_vec());
    }
    chunks
}

proptest! {
    #[test]
    fn flushes_at_char_boundaries_reproduce_text(
        text in text_strategy(),
        breaks in prop::collection::vec(any::<bool>(), 0..40),
    ) {
        let mut queue = BlobQueue::new(GAP);
        let mut now = Instant::now();
        let mut decoded = String::new();

        for (i, c) in text.chars().enumerate() {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                queue.push(vec![b], now);
                now += Duration::from_millis(1);
            }
            if breaks.get(i).copied().unwrap_or(false) {
                now += GAP;
                if let Some(FlushOutcome::Decoded(part)) = queue.poll(now) {
                    decoded.push_str(&part);
                }
            }
        }
        now += GAP;
        if let Some(FlushOutcome::Decoded(part)) = queue.poll(now) {
            decoded.push_str(&part);
        }

        prop_assert_eq!(decoded, text);
        prop_assert_eq!(queue.stats().dropped_batches, 0);
        prop_assert_eq!(queue.pending_chunks(), 0);
    }

    #[test]
    fn every_byte_is_accounted_for_once(
        text in text_strategy(),
        sizes in prop::collection::vec(1usize..5, 0..20),
        flush_after in prop::collection::vec(any::<bool>(), 0..20),
    ) {
        let bytes = text.as_bytes();
        let mut queue = BlobQueue::new(GAP);
        let mut now = Instant::now();
        let mut decoded_bytes = 0u64;

        for (i, chunk) in chunked(bytes, &sizes).into_iter().enumerate() {
            queue.push(chunk, now);
            if flush_after.get(i).copied().unwrap_or(false) {
                now += GAP;
                if let Some(FlushOutcome::Decoded(part)) = queue.poll(now) {
                    decoded_bytes += part.len() as u64;
                }
            }
        }
        if let Some(FlushOutcome::Decoded(part)) = queue.flush_now() {
            decoded_bytes += part.len() as u64;
        }

        let stats = queue.stats();
        prop_assert_eq!(stats.bytes, bytes.len() as u64);
        prop_assert_eq!(decoded_bytes + stats.dropped_bytes, bytes.len() as u64);
        prop_assert!(queue.flush_now().is_none());
    }

    #[test]
    fn nothing_decodes_before_deadline(
        text in text_strategy(),
        spacing_ms in 0u64..99,
    ) {
        prop_assume!(!text.is_empty());
        let mut queue = BlobQueue::new(GAP);
        let t0 = Instant::now();
        let mut now = t0;
        for b in text.bytes() {
            queue.push(vec![b], now);
            prop_assert!(queue.poll(now).is_none());
            now += Duration::from_millis(spacing_ms);
        }
        let deadline = queue.next_deadline();
        prop_assert!(deadline.is_some());
        let deadline = deadline.unwrap_or(now);
        prop_assert!(queue.poll(deadline - Duration::from_millis(1)).is_none());
        prop_assert_eq!(queue.poll(deadline), Some(FlushOutcome::Decoded(text)));
    }
}
