//! Per-key rate limiter.
//!
//! Built on `governor` for outbound rate limiting. Each `rate_limit_key`
//! gets its own direct (not-keyed) limiter with a burst of one token,
//! replenished once per `1 / rate_limit` seconds — tasks sharing a key
//! are serialized against the same limiter instance.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use tokio::sync::Mutex;

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Lazily-populated map of rate-limit-key → shared limiter instance.
///
/// One `RateLimiters` is shared across the whole run: tasks sharing a
/// `rate_limit_key` share one limiter. Acquiring is async so the
/// executor can await it before each attempt, including retries.
#[derive(Default)]
pub struct RateLimiters {
    limiters: Mutex<HashMap<String, Arc<DirectLimiter>>>,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until a token for `key` at rate `per_second` is available.
    /// Called once per attempt, including retries.
    pub async fn acquire(&self, key: &str, per_second: f64) {
        let limiter = self.get_or_create(key, per_second).await;
        limiter.until_ready().await;
    }

    async fn get_or_create(&self, key: &str, per_second: f64) -> Arc<DirectLimiter> {
        let mut limiters = self.limiters.lock().await;
        if let Some(limiter) = limiters.get(key) {
            return Arc::clone(limiter);
        }
        let limiter = Arc::new(GovernorRateLimiter::direct(quota_for(per_second)));
        limiters.insert(key.to_string(), Arc::clone(&limiter));
        limiter
    }
}

/// Converts a `rate_limit` (tasks/second, possibly fractional) into a
/// `Quota` with burst 1, replenished every `1 / per_second` seconds.
/// Non-positive or non-finite rates are clamped to one token/second so
/// a malformed value degrades to a sane limit rather than panicking.
fn quota_for(per_second: f64) -> Quota {
    let per_second = if per_second.is_finite() && per_second > 0.0 {
        per_second
    } else {
        1.0
    };
    let period = Duration::from_secs_f64(1.0 / per_second);
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).expect("1 is nonzero")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn acquire_is_immediate_for_the_first_token() {
        let limiters = RateLimiters::new();
        let start = Instant::now();
        limiters.acquire("k", 10.0).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn shared_key_serializes_across_callers() {
        let limiters = RateLimiters::new();
        limiters.acquire("shared", 20.0).await;
        let start = Instant::now();
        limiters.acquire("shared", 20.0).await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn distinct_keys_do_not_share_a_limiter() {
        let limiters = RateLimiters::new();
        limiters.acquire("a", 1.0).await;
        let start = Instant::now();
        limiters.acquire("b", 1.0).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn quota_for_clamps_non_positive_rates() {
        let _ = quota_for(0.0);
        let _ = quota_for(-5.0);
        let _ = quota_for(f64::NAN);
    }
}
