//! Retry policy
//!
//! Turns the outcome of one attempt into a decision: hand back the
//! artifact, retry after a delay, or give up. The policy is pure; sleeping
//! and gate feedback are the coordinator's job.
//!
//! Retry `n` (1-based) waits `backoff_schedule[n - 1]`. When the schedule
//! is shorter than `max_retries`, its last entry repeats. A rate-limit hint
//! from the executor can only lengthen the wait, never shorten it.

use std::time::Duration;

use batchgate_core::{
    config::RetryConfig,
    domain::{BatchError, ItemError, Outcome, OutcomeKind},
};

/// What to do after an attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision<A> {
    /// The attempt produced an artifact
    Succeed(A),
    /// Try again after `delay`; a zero delay means retry immediately
    Retry {
        /// Time to wait before the next attempt
        delay: Duration,
        /// Classification of the failed attempt
        kind: OutcomeKind,
        /// Reason reported by the failed attempt
        reason: String,
    },
    /// Stop with a terminal error
    Fail(ItemError),
}

/// Backoff schedule and retry ceiling
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    schedule: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            schedule: [2, 4, 8, 16, 32].into_iter().map(Duration::from_secs).collect(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy from its configuration section.
    pub fn new(config: &RetryConfig) -> Result<Self, BatchError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(BatchError::InvalidConfig(errors));
        }

        Ok(Self {
            max_retries: config.max_retries,
            schedule: config.backoff_schedule(),
        })
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts an item may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Scheduled delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let Some(last) = self.schedule.last() else {
            return Duration::ZERO;
        };
        let index = retry.saturating_sub(1) as usize;
        self.schedule.get(index).copied().unwrap_or(*last)
    }

    /// Decides what follows attempt number `attempt` (1-based).
    ///
    /// # Arguments
    ///
    /// * `outcome` - What the executor returned for this attempt
    /// * `attempt` - How many attempts the item has made, including this one
    pub fn decide<A>(&self, outcome: Outcome<A>, attempt: u32) -> RetryDecision<A> {
        let kind = outcome.kind();
        let hint = outcome.retry_after();

        match outcome {
            Outcome::Success(artifact) => RetryDecision::Succeed(artifact),
            Outcome::PermanentFailure(reason) => {
                RetryDecision::Fail(ItemError::PermanentFailure { reason })
            }
            retryable => {
                let reason = retryable.reason().unwrap_or_else(|| kind.to_string());

                if attempt > self.max_retries {
                    return RetryDecision::Fail(ItemError::RetriesExhausted {
                        attempts: attempt,
                        last_reason: reason,
                    });
                }

                let scheduled = self.delay_for(attempt);
                let delay = match hint {
                    Some(hint) => scheduled.max(hint),
                    None => scheduled,
                };

                RetryDecision::Retry {
                    delay,
                    kind,
                    reason,
                }
            }
        }
    }
}
