//! Client configuration.

use std::time::Duration;

use crate::error::DpfClientError;
use crate::retry::RetryPolicy;

/// Production GraphQL endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.mlit-data.jp/api/v1/";

/// Default sustained request rate, requests per second.
pub const DEFAULT_RATE: f64 = 4.0;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BODY_LOG_LIMIT: usize = 4000;

/// DPF client configuration.
#[derive(Debug, Clone)]
pub struct DpfConfig {
    /// GraphQL endpoint URL.
    pub base_url: String,
    /// API key, sent as the `apikey` header on every request.
    pub api_key: String,
    /// Sustained request rate, requests per second.
    pub requests_per_second: f64,
    /// Burst capacity of the rate limiter; clamped to at least the rate.
    pub burst: f64,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
    /// Log outgoing query text at debug level.
    pub debug_query: bool,
    /// Log response bodies at debug level.
    pub debug_response: bool,
    /// Truncation limit for logged bodies, in bytes.
    pub body_log_limit: usize,
}

impl DpfConfig {
    /// Configuration with defaults for the production endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            requests_per_second: DEFAULT_RATE,
            burst: DEFAULT_RATE,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            debug_query: false,
            debug_response: false,
            body_log_limit: DEFAULT_BODY_LOG_LIMIT,
        }
    }

    /// Read configuration from the environment.
    ///
    /// `MLIT_API_KEY` is required; `MLIT_BASE_URL`, `MLIT_RPS`,
    /// `MLIT_TIMEOUT_S`, `MLIT_MAX_RETRIES`, `MLIT_DEBUG_QUERY` and
    /// `MLIT_DEBUG_RESP` override their defaults when set.
    pub fn from_env() -> Result<Self, DpfClientError> {
        let api_key = std::env::var("MLIT_API_KEY").map_err(|_| DpfClientError::Config {
            message: "MLIT_API_KEY is not set".to_string(),
        })?;
        let mut config = Self::new(api_key);

        if let Ok(base_url) = std::env::var("MLIT_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(rate) = parse_env("MLIT_RPS")? {
            config.requests_per_second = rate;
            config.burst = config.burst.max(rate);
        }
        if let Some(timeout_s) = parse_env::<f64>("MLIT_TIMEOUT_S")? {
            config.timeout = Duration::from_secs_f64(timeout_s.max(0.0));
        }
        if let Some(max_retries) = parse_env::<usize>("MLIT_MAX_RETRIES")? {
            config.retry.max_attempts = max_retries + 1;
        }
        config.debug_query = env_flag("MLIT_DEBUG_QUERY");
        config.debug_response = env_flag("MLIT_DEBUG_RESP");
        Ok(config)
    }

    /// Override the endpoint (primarily for testing).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the sustained request rate.
    #[must_use]
    pub const fn with_rate(mut self, requests_per_second: f64) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    /// Set the burst capacity.
    #[must_use]
    pub const fn with_burst(mut self, burst: f64) -> Self {
        self.burst = burst;
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Toggle query logging.
    #[must_use]
    pub const fn with_debug_query(mut self, enabled: bool) -> Self {
        self.debug_query = enabled;
        self
    }

    /// Toggle response-body logging.
    #[must_use]
    pub const fn with_debug_response(mut self, enabled: bool) -> Self {
        self.debug_response = enabled;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), DpfClientError> {
        if self.api_key.is_empty() {
            return Err(DpfClientError::Config {
                message: "API key must be non-empty".to_string(),
            });
        }
        if self.base_url.is_empty() {
            return Err(DpfClientError::Config {
                message: "base URL must be non-empty".to_string(),
            });
        }
        if !self.requests_per_second.is_finite() || self.requests_per_second <= 0.0 {
            return Err(DpfClientError::Config {
                message: format!("request rate {} must be positive", self.requests_per_second),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, DpfClientError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| DpfClientError::Config {
            message: format!("{name} has an invalid value: {raw}"),
        }),
        Err(_) => Ok(None),
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map_or(false, |raw| raw == "1")
}
