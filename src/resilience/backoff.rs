//! Exponential backoff with optional jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before retry number `retry` (1-based): `initial_ms * 2^(retry-1)`,
/// capped at `max_ms`. With `jitter`, up to 10% of the delay is added.
pub fn calculate_backoff(retry: u32, initial_ms: u64, max_ms: u64, jitter: bool) -> Duration {
    if retry == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(retry - 1);
    let delay_ms = initial_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let jitter_range = if jitter { capped_delay / 10 } else { 0 };
    let extra = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + extra)
}
