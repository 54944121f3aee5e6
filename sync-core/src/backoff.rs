//! Retry backoff with jitter.
//!
//! Used between write retries after a version conflict or a retryable
//! transport failure, so that clients that collided on the same version do
//! not collide again on the next attempt.

use std::time::Duration;

/// Base delay of the first retry.
const BASE_DELAY_MS: u64 = 100;

/// Cap on the exponential part of the delay.
const MAX_DELAY_MS: u64 = 2_000;

/// Upper bound of the random jitter added to every delay.
const MAX_JITTER_MS: u64 = 100;

/// Calculate retry backoff with jitter.
///
/// Formula: min(2s, 100ms * 2^attempt) + random(0..=100ms)
pub fn calculate_backoff(attempt: u32) -> Duration {
    let base_ms = BASE_DELAY_MS
        .saturating_mul(2u64.pow(attempt.min(10)))
        .min(MAX_DELAY_MS);

    Duration::from_millis(base_ms + random_jitter_ms())
}

/// Generate random jitter between 0 and `MAX_JITTER_MS` milliseconds.
///
/// Falls back to no jitter if the OS RNG is unavailable.
fn random_jitter_ms() -> u64 {
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return 0;
    }
    u64::from_le_bytes(bytes) % (MAX_JITTER_MS + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_increases_with_attempt() {
        assert!(calculate_backoff(0) >= Duration::from_millis(100));
        assert!(calculate_backoff(3) >= Duration::from_millis(800));
    }

    #[test]
    fn backoff_capped_plus_jitter() {
        let delay = calculate_backoff(30);
        assert!(
            delay <= Duration::from_millis(MAX_DELAY_MS + MAX_JITTER_MS),
            "backoff must be capped, got {:?}",
            delay
        );
    }

    #[test]
    fn jitter_creates_variance() {
        let delays: Vec<Duration> = (0..32).map(|_| calculate_backoff(2)).collect();
        let min = delays.iter().min().unwrap();
        let max = delays.iter().max().unwrap();
        assert!(max > min, "expected jitter variance, got {:?}", delays);
    }
}
