//! DPF rate limiting - client-side token bucket.
//!
//! This crate provides:
//! - A suspending token bucket with continuous fractional refill.
//! - Non-blocking probes and state snapshots for observability.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]

mod token_bucket;

pub use token_bucket::{RateLimitState, TokenBucket};
