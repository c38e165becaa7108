//! Exponential backoff with jitter for message redelivery.

use std::time::Duration;

use rand::Rng;

/// Redelivery delay for a message on its `attempt`-th delivery.
///
/// Doubles from `base_ms` per attempt with up to 10% jitter; the jittered
/// value never exceeds `max_ms`.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let Some(doublings) = attempt.checked_sub(1) else {
        return Duration::ZERO;
    };

    let factor = 1u64.checked_shl(doublings).unwrap_or(u64::MAX);
    let raw = base_ms.saturating_mul(factor).min(max_ms);
    let jitter = match raw / 10 {
        0 => 0,
        spread => rand::thread_rng().gen_range(0..=spread),
    };

    Duration::from_millis(raw.saturating_add(jitter).min(max_ms))
}
