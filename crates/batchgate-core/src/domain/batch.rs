//! Batch result types
//!
//! A batch maps an ordered list of inputs to an ordered list of terminal
//! outcomes, one per input, plus aggregate statistics. The batch as a whole
//! only fails for configuration errors or external cancellation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::errors::ItemError;
use crate::config::ValidationError;

/// Terminal outcome of one work item
pub type ItemOutcome<A> = Result<A, ItemError>;

/// Aggregate counters for a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Number of items submitted
    pub total: usize,
    /// Items that ended in `Succeeded`
    pub succeeded: usize,
    /// Items that ended in `Failed`
    pub failed: usize,
    /// Rate-limited outcomes observed across all attempts
    pub rate_limited: u64,
    /// Transient failures observed across all attempts
    pub transient_failures: u64,
    /// Total executor invocations
    pub attempts: u64,
    /// Wall-clock duration of the batch in milliseconds
    pub elapsed_ms: u64,
}

impl BatchStats {
    /// Fraction of items that succeeded, in `[0.0, 1.0]`
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }
}

/// Ordered per-item outcomes of a batch run
///
/// `outcomes[i]` always corresponds to the `i`-th input.
#[derive(Debug, Clone)]
pub struct BatchResult<A> {
    outcomes: Vec<ItemOutcome<A>>,
    stats: BatchStats,
}

impl<A> BatchResult<A> {
    /// Creates a batch result from index-aligned outcomes
    pub fn new(outcomes: Vec<ItemOutcome<A>>, stats: BatchStats) -> Self {
        Self { outcomes, stats }
    }

    /// Number of items in the batch
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true for an empty batch
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcome of the item at `index`
    pub fn get(&self, index: usize) -> Option<&ItemOutcome<A>> {
        self.outcomes.get(index)
    }

    /// Iterates outcomes in input order
    pub fn iter(&self) -> impl Iterator<Item = &ItemOutcome<A>> {
        self.outcomes.iter()
    }

    /// Number of succeeded items
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    /// Number of failed items
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_err()).count()
    }

    /// Aggregate statistics for the run
    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    /// Consumes the result and returns the ordered outcomes
    pub fn into_outcomes(self) -> Vec<ItemOutcome<A>> {
        self.outcomes
    }
}

/// Errors fatal to a whole batch
#[derive(Debug, Error)]
pub enum BatchError {
    /// The supplied configuration is inconsistent
    #[error("Invalid configuration: {}", format_validation_errors(.0))]
    InvalidConfig(Vec<ValidationError>),

    /// The caller cancelled the batch before every item finished
    #[error("Batch cancelled after {completed} of {total} items completed")]
    Cancelled {
        /// Items that had reached a terminal state
        completed: usize,
        /// Items submitted
        total: usize,
    },
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
