//! `Retry-After` header parsing

use std::time::Duration;

use tracing::warn;

/// Longest hint honoured in either format.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Parses a `Retry-After` header value into a [`Duration`].
///
/// Supports two formats per RFC 7231 Section 7.1.3:
/// - Integer seconds: `"120"`
/// - HTTP-date: `"Fri, 31 Dec 1999 23:59:59 GMT"` (RFC 2822)
///
/// Delays above one hour and HTTP-dates in the past are rejected.
///
/// # Arguments
///
/// * `value` - The raw header value
/// * `default` - Returned when the value cannot be used
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        let wait = Duration::from_secs(seconds);
        if wait <= MAX_RETRY_AFTER {
            return wait;
        }
    } else if let Some(wait) = until_http_date(value) {
        return wait;
    }

    warn!(value, default_secs = default.as_secs(), "Unusable Retry-After header");
    default
}

fn until_http_date(value: &str) -> Option<Duration> {
    let target = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let wait = target
        .with_timezone(&chrono::Utc)
        .signed_duration_since(chrono::Utc::now())
        .to_std()
        .ok()?;
    (wait <= MAX_RETRY_AFTER).then_some(wait)
}
