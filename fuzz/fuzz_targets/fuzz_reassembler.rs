#![no_main]

use libfuzzer_sys::fuzz_target;
use replterm_core::reassembler::{BlobQueue, FlushOutcome};
use web_time::{Duration, Instant};

fuzz_target!(|data: &[u8]| {
    // Byte pairs: (control, payload). Control bit 0 flushes after the byte,
    // bits 1..=7 pick the arrival gap in ms.
    if data.len() > 8192 {
        return;
    }
    let mut queue = BlobQueue::new(Duration::from_millis(100));
    let mut now = Instant::now();
    let mut decoded = 0u64;
    let mut pushed = 0u64;

    for pair in data.chunks_exact(2) {
        let (control, byte) = (pair[0], pair[1]);
        now += Duration::from_millis(u64::from(control >> 1));
        queue.push(vec![byte], now);
        pushed += 1;
        if control & 1 == 1 {
            if let Some(FlushOutcome::Decoded(text)) = queue.poll(now + Duration::from_millis(100)) {
                decoded += text.len() as u64;
            }
        }
    }
    if let Some(FlushOutcome::Decoded(text)) = queue.flush_now() {
        decoded += text.len() as u64;
    }

    let stats = queue.stats();
    assert_eq!(stats.bytes, pushed, "every byte counted on arrival");
    assert_eq!(decoded + stats.dropped_bytes, pushed, "every byte decoded or dropped once");
    assert_eq!(queue.pending_chunks(), 0);
});
