//! Collision-resistant identifiers for sessions and messages.
//!
//! Ids are 128 bits drawn from the OS random source, hex encoded. If the
//! random source is unavailable the id falls back to the wall clock mixed
//! with a process-wide counter, which still never repeats within a process.

use std::sync::atomic::{AtomicU64, Ordering};

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn generate() -> String {
    let mut bytes = [0u8; 16];
    if let Err(err) = getrandom::fill(&mut bytes) {
        tracing::debug!("random source unavailable, using counter ids: {err}");
        return fallback();
    }
    encode(&bytes)
}

fn fallback() -> String {
    let count = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default() as u64;
    format!("{nanos:016x}{count:016x}")
}

fn encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
