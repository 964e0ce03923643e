//! Rate budget derived from API response headers
//!
//! The budget is a plain value owned by the caller and passed into every
//! `HttpClient::execute` call. It is replaced wholesale from the headers of
//! each response, so it always reflects the most recent server view.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Header carrying the request quota for the current window
pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
/// Header carrying the requests left in the current window
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Header carrying when the current window resets
pub const RESET_HEADER: &str = "x-ratelimit-reset";

// Reset values below this are "seconds from now", above it epoch seconds.
const EPOCH_THRESHOLD: i64 = 1_000_000_000;

/// Remaining-quota counters reported by the upstream API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateBudget {
    /// Requests allowed per window
    pub limit: Option<u64>,
    /// Requests left in the current window
    pub remaining: Option<u64>,
    /// When the window resets
    pub reset_at: Option<DateTime<Utc>>,
    /// Server-requested delay from a `Retry-After` header
    pub retry_after: Option<Duration>,
}

impl RateBudget {
    /// Create an empty budget (nothing known yet)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a budget from response headers
    pub fn from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Self {
        let limit = header_u64(headers, LIMIT_HEADER);
        let remaining = header_u64(headers, REMAINING_HEADER);
        let reset_at = header_str(headers, RESET_HEADER)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|raw| {
                if raw >= EPOCH_THRESHOLD {
                    DateTime::from_timestamp(raw, 0)
                } else {
                    Some(now + chrono::Duration::seconds(raw.max(0)))
                }
            });
        let retry_after =
            header_str(headers, "retry-after").and_then(|v| parse_retry_after(v, now));

        Self {
            limit,
            remaining,
            reset_at,
            retry_after,
        }
    }

    /// Replace this budget with the view from a fresh response
    pub fn update_from_headers(&mut self, headers: &HeaderMap, now: DateTime<Utc>) {
        *self = Self::from_headers(headers, now);
    }

    /// Check whether the quota for the current window is used up
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// How long to wait before the next call, if the quota is used up
    pub fn throttle_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.is_exhausted() {
            return None;
        }
        let reset_at = self.reset_at?;
        (reset_at - now).to_std().ok().filter(|d| !d.is_zero())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name).and_then(|v| v.trim().parse().ok())
}

/// Parse a `Retry-After` value: delta seconds or an HTTP date
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        (at.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}
