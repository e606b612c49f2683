//! Retry policy helpers.

use std::time::Duration;

use rand::Rng;

use crate::error::DpfClientError;

/// Retry decision result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after a delay.
    RetryAfter(Duration),
    /// Do not retry.
    DoNotRetry,
}

/// Retry policy configuration.
///
/// Only transient errors (per [`DpfClientError::is_retryable`]) are ever
/// retried; terminal errors propagate on the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: usize,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum jitter to add to delays.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Decide whether to retry based on the error and attempt count.
    ///
    /// A `Retry-After` supplied with an HTTP 429 takes precedence over
    /// the computed backoff.
    #[must_use]
    pub fn decide(&self, error: &DpfClientError, attempt: usize) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::DoNotRetry;
        }
        if !error.is_retryable() {
            return RetryDecision::DoNotRetry;
        }

        if let DpfClientError::HttpStatus {
            retry_after: Some(delay),
            ..
        } = error
        {
            return RetryDecision::RetryAfter(*delay);
        }

        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let exp =
            2_u64.saturating_pow(u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX));
        let mut delay_ms = base_ms.saturating_mul(exp);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        if delay_ms > max_ms {
            delay_ms = max_ms;
        }
        let jitter_ms = if self.max_jitter.as_millis() > 0 {
            let mut rng = rand::thread_rng();
            let jitter_max = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
            rng.gen_range(0..=jitter_max)
        } else {
            0
        };
        RetryDecision::RetryAfter(Duration::from_millis(delay_ms + jitter_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn transient() -> DpfClientError {
        DpfClientError::HttpStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
            retry_after: None,
        }
    }

    fn jitterless() -> RetryPolicy {
        RetryPolicy {
            max_jitter: Duration::ZERO,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = jitterless();
        let error = transient();

        let mut previous = Duration::ZERO;
        for attempt in 1..policy.max_attempts {
            let RetryDecision::RetryAfter(delay) = policy.decide(&error, attempt) else {
                panic!("attempt {attempt} should retry");
            };
            assert!(delay >= previous, "backoff must be non-decreasing");
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
        assert_eq!(
            policy.decide(&error, 1),
            RetryDecision::RetryAfter(Duration::from_millis(500))
        );
        assert_eq!(
            policy.decide(&error, 2),
            RetryDecision::RetryAfter(Duration::from_millis(1000))
        );
    }

    #[test]
    fn exhaustion_stops_retries() {
        let policy = jitterless();
        assert_eq!(
            policy.decide(&transient(), policy.max_attempts),
            RetryDecision::DoNotRetry
        );
    }

    #[test]
    fn terminal_errors_never_retry() {
        let policy = jitterless();
        let terminal = DpfClientError::HttpStatus {
            status: StatusCode::BAD_REQUEST,
            body: String::new(),
            retry_after: None,
        };
        assert_eq!(policy.decide(&terminal, 1), RetryDecision::DoNotRetry);

        let graphql = DpfClientError::GraphqlErrors { errors: vec![] };
        assert_eq!(policy.decide(&graphql, 1), RetryDecision::DoNotRetry);
    }

    #[test]
    fn retry_after_takes_precedence() {
        let policy = jitterless();
        let limited = DpfClientError::HttpStatus {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(
            policy.decide(&limited, 1),
            RetryDecision::RetryAfter(Duration::from_secs(7))
        );
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy {
            max_jitter: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let RetryDecision::RetryAfter(delay) = policy.decide(&transient(), 1) else {
                panic!("should retry");
            };
            assert!(delay >= policy.base_delay);
            assert!(delay <= policy.base_delay + policy.max_jitter);
        }
    }

    #[test]
    fn no_retries_policy() {
        let policy = RetryPolicy::no_retries();
        assert_eq!(policy.decide(&transient(), 1), RetryDecision::DoNotRetry);
    }
}
