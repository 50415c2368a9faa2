//! Adaptive concurrency gate
//!
//! Bounds the number of calls in flight and moves that bound with the
//! feedback it receives:
//!
//! - every rate-limit report shrinks the ceiling by `decrease_step`
//!   (floored at `min`) and resets the success streak
//! - every `success_threshold` consecutive successes grow it by one
//!   (capped at `max`)
//!
//! Shrinking never revokes permits that were already handed out. It only
//! lowers the ceiling that new [`acquire`](AdaptiveConcurrencyGate::acquire)
//! calls must respect, so `in_use` may sit above `capacity` until enough
//! permits come back.
//!
//! ## Usage
//!
//! ```rust
//! use batchgate_core::config::ConcurrencyConfig;
//! use batchgate_engine::gate::{AdaptiveConcurrencyGate, GateFeedback};
//!
//! # async fn example() -> Result<(), batchgate_core::domain::BatchError> {
//! let gate = AdaptiveConcurrencyGate::new(&ConcurrencyConfig::default())?;
//! let permit = gate.acquire().await;
//! // ... make the call ...
//! permit.release(GateFeedback::Success);
//! # Ok(())
//! # }
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use batchgate_core::{
    config::ConcurrencyConfig,
    domain::{BatchError, OutcomeKind},
};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Feedback attached to a released permit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateFeedback {
    /// The call succeeded; counts toward the success streak
    Success,
    /// The call was rate limited; shrinks the ceiling
    RateLimited,
    /// Anything else; releases the permit without adapting
    Neutral,
}

impl From<OutcomeKind> for GateFeedback {
    fn from(kind: OutcomeKind) -> Self {
        match kind {
            OutcomeKind::Success => GateFeedback::Success,
            OutcomeKind::RateLimited => GateFeedback::RateLimited,
            OutcomeKind::TransientFailure | OutcomeKind::PermanentFailure => GateFeedback::Neutral,
        }
    }
}

/// Internal mutable state, protected by a Mutex.
#[derive(Debug)]
struct GateState {
    /// Current permit ceiling
    capacity: usize,
    /// Permits currently held
    in_use: usize,
    /// Success reports since the last increase or rate limit
    consecutive_successes: u32,
}

/// Point-in-time view of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSnapshot {
    pub capacity: usize,
    pub in_use: usize,
    pub consecutive_successes: u32,
}

/// Concurrency limiter whose ceiling adapts to rate-limit feedback
///
/// All mutations go through one `Mutex<GateState>`; waiters park on a
/// [`Notify`] and re-check the state whenever a permit is released or the
/// ceiling grows. No FIFO fairness is provided.
pub struct AdaptiveConcurrencyGate {
    min_capacity: usize,
    max_capacity: usize,
    success_threshold: u32,
    decrease_step: usize,
    state: Mutex<GateState>,
    changed: Notify,
}

impl std::fmt::Debug for AdaptiveConcurrencyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveConcurrencyGate")
            .field("min_capacity", &self.min_capacity)
            .field("max_capacity", &self.max_capacity)
            .field("state", &self.snapshot())
            .finish()
    }
}

impl AdaptiveConcurrencyGate {
    /// Creates a gate from its configuration section.
    ///
    /// Fails with [`BatchError::InvalidConfig`] when the bounds are
    /// inconsistent (for example `min > max`).
    pub fn new(config: &ConcurrencyConfig) -> Result<Self, BatchError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(BatchError::InvalidConfig(errors));
        }

        let capacity = config.effective_initial();
        debug!(
            capacity,
            min = config.min,
            max = config.max,
            "Creating adaptive concurrency gate"
        );

        Ok(Self {
            min_capacity: config.min,
            max_capacity: config.max,
            success_threshold: config.success_threshold,
            decrease_step: config.decrease_step,
            state: Mutex::new(GateState {
                capacity,
                in_use: 0,
                consecutive_successes: 0,
            }),
            changed: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Permit acquisition
    // ========================================================================

    /// Takes a permit if one is free under the current ceiling.
    pub fn try_acquire(&self) -> Option<GatePermit<'_>> {
        let mut state = self.lock();
        if state.in_use < state.capacity {
            state.in_use += 1;
            Some(GatePermit { gate: self })
        } else {
            None
        }
    }

    /// Waits until a permit is free, then takes it.
    ///
    /// Never fails. Dropping the returned future while it waits holds no
    /// permit.
    pub async fn acquire(&self) -> GatePermit<'_> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Register before checking so a release between the check and
            // the await is not lost.
            notified.as_mut().enable();

            if let Some(permit) = self.try_acquire() {
                return permit;
            }

            debug!("Concurrency gate full, waiting for a permit");
            notified.await;
        }
    }

    fn release_one(&self) {
        {
            let mut state = self.lock();
            state.in_use = state.in_use.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    // ========================================================================
    // Adaptive feedback
    // ========================================================================

    /// Records a successful call. May grow the ceiling by one.
    pub fn report_success(&self) {
        let grew = {
            let mut state = self.lock();
            state.consecutive_successes += 1;
            if state.consecutive_successes < self.success_threshold {
                false
            } else {
                state.consecutive_successes = 0;
                if state.capacity < self.max_capacity {
                    let old = state.capacity;
                    state.capacity = (old + 1).min(self.max_capacity);
                    info!(
                        old_capacity = old,
                        new_capacity = state.capacity,
                        "Increased concurrency"
                    );
                    true
                } else {
                    false
                }
            }
        };

        if grew {
            self.changed.notify_waiters();
        }
    }

    /// Records a rate-limit event. Shrinks the ceiling and resets the
    /// success streak.
    ///
    /// Applied once per call; never waits for permits to come back.
    pub fn report_rate_limit(&self) {
        let mut state = self.lock();
        let old = state.capacity;
        state.capacity = old
            .saturating_sub(self.decrease_step)
            .max(self.min_capacity);
        state.consecutive_successes = 0;

        if state.capacity != old {
            warn!(
                old_capacity = old,
                new_capacity = state.capacity,
                in_use = state.in_use,
                "Decreased concurrency"
            );
        } else {
            debug!(capacity = old, "Rate limited at minimum concurrency");
        }
    }

    /// Applies feedback without touching `in_use`.
    pub fn report(&self, feedback: GateFeedback) {
        match feedback {
            GateFeedback::Success => self.report_success(),
            GateFeedback::RateLimited => self.report_rate_limit(),
            GateFeedback::Neutral => {}
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Current permit ceiling.
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Permits currently held.
    pub fn in_use(&self) -> usize {
        self.lock().in_use
    }

    /// Success reports accumulated toward the next increase.
    pub fn consecutive_successes(&self) -> u32 {
        self.lock().consecutive_successes
    }

    /// Lower bound of the ceiling.
    pub fn min_capacity(&self) -> usize {
        self.min_capacity
    }

    /// Upper bound of the ceiling.
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Consistent view of capacity, usage and streak.
    pub fn snapshot(&self) -> GateSnapshot {
        let state = self.lock();
        GateSnapshot {
            capacity: state.capacity,
            in_use: state.in_use,
            consecutive_successes: state.consecutive_successes,
        }
    }
}

// ============================================================================
// GatePermit
// ============================================================================

/// A held unit of concurrency
///
/// Dropping the permit returns it to the gate without feedback, which is
/// what happens when a task is cancelled mid-call. Use
/// [`release`](GatePermit::release) to return it with feedback.
#[must_use = "dropping a permit releases it immediately"]
#[derive(Debug)]
pub struct GatePermit<'a> {
    gate: &'a AdaptiveConcurrencyGate,
}

impl GatePermit<'_> {
    /// Returns the permit and adapts the ceiling according to `feedback`.
    pub fn release(self, feedback: GateFeedback) {
        self.gate.report(feedback);
        // Drop performs the actual release.
    }
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.release_one();
    }
}
