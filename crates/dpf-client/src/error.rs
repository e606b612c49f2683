//! Error types for the DPF client.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP error information captured from reqwest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorInfo {
    /// Error message.
    pub message: String,
    /// HTTP status code (if available).
    pub status_code: Option<u16>,
    /// Whether the error was a timeout.
    pub is_timeout: bool,
    /// Whether the error was a connection failure.
    pub is_connect: bool,
    /// Whether the error was a request error.
    pub is_request: bool,
}

impl From<reqwest::Error> for HttpErrorInfo {
    fn from(err: reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
            status_code: err.status().map(|status| status.as_u16()),
            is_timeout: err.is_timeout(),
            is_connect: err.is_connect(),
            is_request: err.is_request(),
        }
    }
}

/// GraphQL error location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorLocation {
    /// Line number in the query (1-based).
    pub line: u32,
    /// Column number in the query (1-based).
    pub column: u32,
}

/// GraphQL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphqlPathSegment {
    /// Field name.
    Key(String),
    /// Array index.
    Index(i64),
}

/// GraphQL error (per GraphQL spec).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    /// Human-readable error message.
    pub message: String,
    /// Location(s) within the query.
    #[serde(default)]
    pub locations: Vec<GraphqlErrorLocation>,
    /// Path within the response where the error occurred.
    #[serde(default)]
    pub path: Vec<GraphqlPathSegment>,
    /// Extensions metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

/// Error type for DPF client operations.
///
/// Errors are `Clone` so a single result can be handed to every caller
/// coalesced onto one in-flight fetch.
#[derive(Debug, Clone, Error)]
pub enum DpfClientError {
    /// The request violates a client-side invariant; nothing was sent.
    #[error("malformed request: {message}")]
    MalformedRequest {
        /// What was wrong.
        message: String,
    },

    /// Configuration error (bad endpoint, missing API key, ...).
    #[error("configuration error: {message}")]
    Config {
        /// Details.
        message: String,
    },

    /// HTTP/network error.
    #[error("HTTP error: {0:?}")]
    Http(HttpErrorInfo),

    /// HTTP response status error.
    #[error("HTTP status {status} with body: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: StatusCode,
        /// Response body (truncated if needed).
        body: String,
        /// Retry-After duration when supplied.
        retry_after: Option<Duration>,
    },

    /// JSON parsing error on a 2xx body.
    #[error("JSON error: {0}")]
    Json(String),

    /// GraphQL-level errors returned by the platform. Always terminal.
    #[error("GraphQL errors: {errors:?}")]
    GraphqlErrors {
        /// GraphQL error list.
        errors: Vec<GraphqlError>,
    },

    /// A 2xx response that does not follow the data/errors envelope.
    #[error("envelope error: {message}")]
    Envelope {
        /// Details.
        message: String,
    },

    /// Retry policy exhausted on a transient failure.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempt count (including the initial attempt).
        attempts: usize,
        /// The transient error observed on the final attempt.
        last: Box<DpfClientError>,
    },
}

impl From<reqwest::Error> for DpfClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(HttpErrorInfo::from(err))
    }
}

impl From<serde_json::Error> for DpfClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl DpfClientError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    /// Returns `true` if the error is transient and worth retrying:
    /// timeouts, connection failures, HTTP 429 and any 5xx. GraphQL
    /// errors, other 4xx responses and request-construction failures
    /// are terminal; re-sending an unbuildable request cannot succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(info) => info.is_timeout || info.is_connect,
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// The HTTP status carried by the error, when there is one.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Http(info) => info
                .status_code
                .and_then(|code| StatusCode::from_u16(code).ok()),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: StatusCode) -> DpfClientError {
        DpfClientError::HttpStatus {
            status,
            body: String::new(),
            retry_after: None,
        }
    }

    #[test]
    fn transient_classification() {
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(status_error(StatusCode::INTERNAL_SERVER_ERROR).is_retryable());
        assert!(status_error(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
    }

    #[test]
    fn terminal_classification() {
        assert!(!status_error(StatusCode::BAD_REQUEST).is_retryable());
        assert!(!status_error(StatusCode::UNAUTHORIZED).is_retryable());
        assert!(!status_error(StatusCode::NOT_FOUND).is_retryable());
        assert!(!DpfClientError::GraphqlErrors { errors: vec![] }.is_retryable());
        assert!(!DpfClientError::Json("boom".into()).is_retryable());
        assert!(!DpfClientError::malformed("size").is_retryable());
    }

    #[test]
    fn timeout_is_retryable() {
        let err = DpfClientError::Http(HttpErrorInfo {
            message: "timed out".into(),
            status_code: None,
            is_timeout: true,
            is_connect: false,
            is_request: false,
        });
        assert!(err.is_retryable());
    }

    #[test]
    fn request_construction_errors_are_terminal() {
        // A request that could not be built will not build on retry.
        let err = DpfClientError::Http(HttpErrorInfo {
            message: "builder error".into(),
            status_code: None,
            is_timeout: false,
            is_connect: false,
            is_request: true,
        });
        assert!(!err.is_retryable());
    }

    #[test]
    fn exhausted_exposes_last_status() {
        let err = DpfClientError::RetriesExhausted {
            attempts: 4,
            last: Box::new(status_error(StatusCode::SERVICE_UNAVAILABLE)),
        };
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!err.is_retryable());
    }
}
