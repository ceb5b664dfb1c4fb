//! Response classification by status class
//!
//! The leading digit of the status decides what the client does next:
//! 1xx/2xx succeed unless the body carries a rate-limit advisory, 3xx/4xx
//! are handed back untouched (not transient), 5xx are retried, anything
//! else is unrecognized.

use std::time::Duration;

/// Longest advisory honored; larger hints are clamped to this.
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(3600);

/// What the retry loop should do with a received response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseClass {
    Success,
    /// Server asked us to back off for this long before reissuing
    RateLimited(Duration),
    /// Redirects and client errors, returned to the caller as-is
    PassThrough,
    ServerError,
    Unrecognized,
}

/// Extract the rate-limit advisory from a response body.
///
/// The advisory is the numeric `json.ratelimit` field in seconds (may be
/// fractional). Zero, negative, or non-numeric values are not advisories.
/// Waits beyond `MAX_RATE_LIMIT_WAIT` are clamped.
pub fn rate_limit_advisory(body: &serde_json::Value) -> Option<Duration> {
    let secs = body
        .pointer("/json/ratelimit")
        .and_then(serde_json::Value::as_f64)
        .filter(|secs| secs.is_finite() && *secs > 0.0)?;
    let wait = Duration::try_from_secs_f64(secs).unwrap_or(MAX_RATE_LIMIT_WAIT);
    Some(wait.min(MAX_RATE_LIMIT_WAIT))
}

/// Classify a response by status code and body.
pub fn classify(status: u16, body: &serde_json::Value) -> ResponseClass {
    match status / 100 {
        1 | 2 => match rate_limit_advisory(body) {
            Some(wait) => ResponseClass::RateLimited(wait),
            None => ResponseClass::Success,
        },
        3 | 4 => ResponseClass::PassThrough,
        5 => ResponseClass::ServerError,
        _ => ResponseClass::Unrecognized,
    }
}
