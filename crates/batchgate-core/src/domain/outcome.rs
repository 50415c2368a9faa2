//! Call outcome taxonomy
//!
//! Every remote call made on behalf of a work item ends in exactly one
//! [`Outcome`]. The scheduling engine only ever looks at the
//! [`OutcomeKind`]; the payloads travel through untouched.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Result of a single remote call attempt
///
/// The mapping from a concrete transport error to one of these variants
/// (for example HTTP 429 to `RateLimited`) belongs to the executor, not to
/// the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<A> {
    /// The call succeeded and produced an artifact
    Success(A),
    /// The remote service asked us to slow down
    RateLimited {
        /// Optional server-provided hint for how long to wait
        retry_after: Option<Duration>,
    },
    /// A failure that is expected to go away on retry (overload, timeout)
    TransientFailure(String),
    /// A failure that will not go away on retry
    PermanentFailure(String),
}

impl<A> Outcome<A> {
    /// Shorthand for a rate-limited outcome without a retry hint
    pub fn rate_limited() -> Self {
        Outcome::RateLimited { retry_after: None }
    }

    /// Returns the payload-free classification of this outcome
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success(_) => OutcomeKind::Success,
            Outcome::RateLimited { .. } => OutcomeKind::RateLimited,
            Outcome::TransientFailure(_) => OutcomeKind::TransientFailure,
            Outcome::PermanentFailure(_) => OutcomeKind::PermanentFailure,
        }
    }

    /// Returns the server-provided retry hint, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Outcome::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Human-readable reason for a non-success outcome
    pub fn reason(&self) -> Option<String> {
        match self {
            Outcome::Success(_) => None,
            Outcome::RateLimited { retry_after: Some(hint) } => {
                Some(format!("rate limited (retry after {}s)", hint.as_secs()))
            }
            Outcome::RateLimited { retry_after: None } => Some("rate limited".to_string()),
            Outcome::TransientFailure(reason) | Outcome::PermanentFailure(reason) => {
                Some(reason.clone())
            }
        }
    }
}

/// Classification of an [`Outcome`] used by the retry policy and the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    RateLimited,
    TransientFailure,
    PermanentFailure,
}

impl OutcomeKind {
    /// Returns true for the kinds that are recovered locally by backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, OutcomeKind::RateLimited | OutcomeKind::TransientFailure)
    }

    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::RateLimited => "rate_limited",
            OutcomeKind::TransientFailure => "transient_failure",
            OutcomeKind::PermanentFailure => "permanent_failure",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
