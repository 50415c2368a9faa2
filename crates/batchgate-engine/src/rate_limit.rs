//! Token bucket rate limiting
//!
//! Throttles the aggregate call rate of a batch to `requests_per_minute`.
//!
//! ## Algorithm
//!
//! The bucket holds up to `capacity` tokens and starts full. Refill is lazy
//! and continuous: every check adds `capacity * elapsed_secs / 60` tokens
//! (capped at `capacity`) and moves the refill timestamp forward. Each call
//! consumes exactly one token.
//!
//! A caller that finds the bucket empty sleeps for the poll interval and
//! checks again. Wake-up latency is therefore bounded by the poll interval
//! rather than exact, and there is no ordering between waiting callers.

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use batchgate_core::{config::RateLimitConfig, domain::BatchError};
use tokio::time::Instant;
use tracing::{debug, trace};

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Internal mutable state for the token bucket, protected by a Mutex.
#[derive(Debug)]
struct TokenBucketInner {
    /// Current number of available tokens (fractional for smooth refill)
    tokens: f64,
    /// Timestamp of the last refill calculation
    last_refill: Instant,
}

/// Requests-per-minute limiter shared by every task of a batch
///
/// Thread safety is provided by an internal `Mutex<TokenBucketInner>`; the
/// refill-then-consume sequence runs under a single lock acquisition.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    /// Maximum tokens, equal to the per-minute rate
    capacity: u32,
    /// Delay between checks while the bucket is empty
    poll_interval: Duration,
    inner: Mutex<TokenBucketInner>,
}

impl TokenBucketLimiter {
    /// Creates a full bucket from its configuration section.
    pub fn new(config: &RateLimitConfig) -> Result<Self, BatchError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(BatchError::InvalidConfig(errors));
        }

        debug!(
            requests_per_minute = config.requests_per_minute,
            poll_ms = config.poll_interval_ms,
            "Creating token bucket limiter"
        );

        Ok(Self {
            capacity: config.requests_per_minute,
            poll_interval: config.poll_interval(),
            inner: Mutex::new(TokenBucketInner {
                tokens: config.requests_per_minute as f64,
                last_refill: Instant::now(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TokenBucketInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refills the bucket based on elapsed time since the last refill.
    fn refill(inner: &mut TokenBucketInner, capacity: u32) {
        let now = Instant::now();
        let elapsed_secs = now.duration_since(inner.last_refill).as_secs_f64();

        if elapsed_secs > 0.0 {
            let capacity = capacity as f64;
            let new_tokens = capacity * elapsed_secs / SECONDS_PER_MINUTE;
            inner.tokens = (inner.tokens + new_tokens).min(capacity);
            inner.last_refill = now;
        }
    }

    /// Attempts to take one token without waiting.
    ///
    /// Refills first, then subtracts 1.0 if at least one whole token is
    /// available.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.lock();
        Self::refill(&mut inner, self.capacity);

        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Waits until a token is available, then consumes it.
    ///
    /// Re-checks on the fixed poll interval while the bucket is empty.
    /// Cancel-safe: a dropped future has consumed nothing.
    pub async fn acquire(&self) {
        let mut polls: u32 = 0;
        while !self.try_acquire() {
            polls += 1;
            trace!(polls, "No tokens available, polling");
            tokio::time::sleep(self.poll_interval).await;
        }

        if polls > 0 {
            debug!(
                polls,
                waited_ms = (self.poll_interval * polls).as_millis() as u64,
                "Rate limit token acquired after waiting"
            );
        }
    }

    /// Returns the current number of available tokens (after refill).
    pub fn available_tokens(&self) -> f64 {
        let mut inner = self.lock();
        Self::refill(&mut inner, self.capacity);
        inner.tokens
    }

    /// Maximum tokens, equal to the configured calls per minute.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Delay between checks while waiting.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
