//! CPU burn primitive shared by the simulators.
//!
//! Work is done in small BLAKE3 batches so callers can check a stop flag or
//! a deadline at a fine granularity without the check itself dominating.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Bytes hashed per batch. Roughly tens of microseconds on a modern core.
const BATCH_BYTES: usize = 16 * 1024;

/// Hash rounds per batch.
const BATCH_ROUNDS: usize = 4;

/// Run one bounded batch of hashing. Returns a digest byte so the optimizer
/// cannot discard the work.
pub(crate) fn burn_batch(seed: &mut [u8; 32]) -> u8 {
    let block = [seed[0]; BATCH_BYTES];
    for _ in 0..BATCH_ROUNDS {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&seed[..]);
        hasher.update(&block);
        *seed = *hasher.finalize().as_bytes();
    }
    seed[0]
}

/// Burn the calling thread until `duration` has elapsed.
pub(crate) fn burn_for(duration: Duration) -> u64 {
    let started = Instant::now();
    let mut seed = [0u8; 32];
    let mut batches = 0u64;
    while started.elapsed() < duration {
        std::hint::black_box(burn_batch(&mut seed));
        batches += 1;
    }
    batches
}

/// Burn the calling thread until `stop` is set.
pub(crate) fn burn_until(stop: &AtomicBool) -> u64 {
    let mut seed = [0u8; 32];
    let mut batches = 0u64;
    while !stop.load(Ordering::Acquire) {
        std::hint::black_box(burn_batch(&mut seed));
        batches += 1;
    }
    batches
}
