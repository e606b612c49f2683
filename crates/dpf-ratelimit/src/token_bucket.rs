//! Token bucket rate limiter implementation.
//!
//! Classic token bucket with continuous refill: tokens accrue at a fixed
//! rate (possibly fractional) up to the bucket capacity, and each request
//! consumes one whole token. Refill is computed lazily from elapsed time,
//! so an idle bucket costs nothing.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

/// Upper bound on a single wait slice. A waiter re-checks the bucket at
/// least this often so it observes rate changes and concurrent consumers
/// promptly instead of oversleeping on a stale deficit estimate.
const MAX_WAIT_SLICE: Duration = Duration::from_secs(1);

/// Point-in-time view of the bucket, for logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateLimitState {
    /// Bucket capacity.
    pub burst: f64,
    /// Tokens currently available (fractional).
    pub remaining: f64,
    /// Whether an `acquire` right now would have to wait.
    pub is_limited: bool,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter.
///
/// `acquire` suspends until a token is available and never fails; there
/// is no deadline and no error path. The mutex is only held across
/// non-suspending arithmetic, so cancelling a waiting `acquire` future
/// never consumes a token and never poisons the accounting.
#[derive(Debug)]
pub struct TokenBucket {
    /// Tokens added per second.
    rate: f64,

    /// Maximum tokens (bucket capacity), at least 1 and at least `rate`.
    burst: f64,

    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket refilling at `rate` tokens per second.
    ///
    /// Capacity equals the rate (clamped to at least one token), so a
    /// full bucket admits roughly one second of burst.
    #[must_use]
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        Self::with_burst(rate, rate)
    }

    /// Create a bucket with an explicit burst capacity.
    ///
    /// The capacity is clamped so that `burst >= max(rate, 1)`; a bucket
    /// smaller than its own per-second refill cannot hold a steady rate.
    #[must_use]
    pub fn with_burst(rate: f64, burst: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        let burst = if burst.is_finite() { burst } else { rate };
        let burst = burst.max(rate).max(1.0);
        Self {
            rate,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Tokens added per second.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Bucket capacity.
    #[must_use]
    pub const fn burst(&self) -> f64 {
        self.burst
    }

    /// Credit elapsed time to the bucket. Caller holds the lock.
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = self
            .burst
            .min(state.tokens + elapsed.as_secs_f64() * self.rate);
        state.last_refill = now;
    }

    /// Acquire one token, waiting as long as necessary.
    ///
    /// Waiting is a plain `tokio::time::sleep`, so this is cancel-safe:
    /// a dropped future has consumed nothing.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state, Instant::now());
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                // Exact time until the deficit is covered, capped per
                // iteration; the loop re-checks after each slice.
                Duration::from_secs_f64((1.0 - state.tokens) / self.rate)
            };
            sleep(wait.min(MAX_WAIT_SLICE)).await;
        }
    }

    /// Acquire one token only if it is available right now.
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Snapshot current bucket state.
    pub async fn state(&self) -> RateLimitState {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        RateLimitState {
            burst: self.burst,
            remaining: state.tokens,
            is_limited: state.tokens < 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_then_empty() {
        let limiter = TokenBucket::with_burst(1.0, 5.0);

        for _ in 0..5 {
            assert!(limiter.try_acquire().await);
        }
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn refills_continuously() {
        let limiter = TokenBucket::new(4.0);

        for _ in 0..4 {
            assert!(limiter.try_acquire().await);
        }
        assert!(!limiter.try_acquire().await);

        // 250ms at 4/s is exactly one token.
        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_for_deficit() {
        let limiter = TokenBucket::new(2.0);

        limiter.acquire().await;
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        // Third token needs ~500ms at 2/s.
        assert!(start.elapsed() >= Duration::from_millis(490));
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_rate_is_bounded() {
        let limiter = TokenBucket::new(4.0);
        let start = Instant::now();

        // Drain the burst plus eight more; the extras take 2s at 4/s.
        for _ in 0..12 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(1990));
    }

    #[tokio::test]
    async fn refill_never_exceeds_burst() {
        let limiter = TokenBucket::with_burst(100.0, 100.0);
        let state = limiter.state().await;
        assert!(state.remaining <= state.burst);
        assert!(!state.is_limited);
    }

    #[tokio::test]
    async fn degenerate_rate_is_clamped() {
        let limiter = TokenBucket::new(0.0);
        assert!((limiter.rate() - 1.0).abs() < f64::EPSILON);
        assert!(limiter.try_acquire().await);
    }

    #[tokio::test]
    async fn state_reports_limited_when_empty() {
        let limiter = TokenBucket::with_burst(0.5, 1.0);
        assert!(limiter.try_acquire().await);
        let state = limiter.state().await;
        assert!(state.is_limited);
        assert!(state.remaining < 1.0);
    }
}
