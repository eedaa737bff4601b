/// When to redeem next.
///
/// Clients redeem once per interval, but each client draws its next deadline
/// from a geometric (exponential) distribution with the interval as the mean so
/// redemptions spread out over time instead of arriving at the server together.
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

pub const NEXT_TOKEN_REDEMPTION_AFTER: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEBUG_NEXT_TOKEN_REDEMPTION_AFTER: Duration = Duration::from_secs(25 * 60);
pub const EXPIRED_NEXT_TOKEN_REDEMPTION_DELAY: Duration = Duration::from_secs(60);
pub const RETRY_REDEEMING_AFTER: Duration = Duration::from_secs(60);

/// Sample with the given mean, rounded to whole seconds
pub fn geometric_with<R: Rng + ?Sized>(rng: &mut R, mean: Duration) -> Duration {
    // u in [0, 1) so ln(1 - u) is finite
    let u: f64 = rng.gen();
    let seconds = -(-u).ln_1p() * mean.as_secs_f64();
    Duration::from_secs(seconds.round() as u64)
}

pub fn geometric(mean: Duration) -> Duration {
    geometric_with(&mut rand::thread_rng(), mean)
}

pub fn calculate_next_token_redemption_at(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    add_duration(now, geometric(interval))
}

/// How long to wait before redeeming, given the persisted deadline.
/// A deadline at or before `now` (e.g. the client was not running) waits
/// `expired_delay` rather than redeeming immediately at startup.
pub fn calculate_token_redemption_delay(
    now: DateTime<Utc>,
    next_token_redemption_at: DateTime<Utc>,
    expired_delay: Duration,
) -> Duration {
    if now >= next_token_redemption_at {
        return expired_delay;
    }

    (next_token_redemption_at - now)
        .to_std()
        .unwrap_or(expired_delay)
}

pub fn add_duration(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
