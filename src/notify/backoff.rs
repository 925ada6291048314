//! Retry delays for the startup announcement.

use std::time::Duration;

/// Maximum backoff duration in seconds
pub const MAX_BACKOFF_SECS: u64 = 8;

/// Delay before gateway read attempt `attempt` (1-based).
///
/// Attempt 1: 0 seconds (immediate)
/// Attempt 2: 1 second
/// Attempt 3: 2 seconds
/// Attempt 4: 4 seconds
/// Attempt 5+: 8 seconds (max)
pub fn calculate_backoff(attempt: u32) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    let exponent = attempt.saturating_sub(2);
    let secs = 2u64
        .checked_pow(exponent)
        .map_or(MAX_BACKOFF_SECS, |secs| secs.min(MAX_BACKOFF_SECS));
    Duration::from_secs(secs)
}

/// No delay at all; lets tests drive the retry loop quickly.
pub fn no_backoff(_attempt: u32) -> Duration {
    Duration::ZERO
}
