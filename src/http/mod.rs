//! HTTP client module
//!
//! Provides the HTTP client with retry, rate limiting, and backoff strategies.
//!
//! # Features
//!
//! - **Automatic Retries**: 429, 5xx, timeouts and connection errors, bounded attempts
//! - **Rate Budget**: quota headers parsed after every response and threaded
//!   explicitly through calls, so callers throttle before the server says 429
//! - **Rate Limiting**: Optional token bucket limiter using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff with jitter
//! - **Authentication**: Integration with the auth module

mod budget;
mod client;
mod rate_limit;

pub use budget::RateBudget;
pub use client::{ApiRequest, ApiResponse, HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
