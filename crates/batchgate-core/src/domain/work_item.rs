//! WorkItem domain entity
//!
//! A [`WorkItem`] tracks one caller-supplied input through its attempts.
//! Its [`ItemStatus`] follows a small state machine:
//!
//! ```text
//! Pending -> InFlight -> Succeeded
//!               |   \-> Failed
//!               v
//!            Backoff -> InFlight
//!               \-> Failed
//! ```
//!
//! `Succeeded` and `Failed` are terminal.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{DomainError, ItemError};

/// Lifecycle state of a work item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Created, no attempt made yet
    #[default]
    Pending,
    /// An attempt is running against the executor
    InFlight,
    /// Waiting out a backoff delay before the next attempt
    Backoff,
    /// Finished with an artifact
    Succeeded,
    /// Finished with a terminal error
    Failed,
}

impl ItemStatus {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Succeeded | ItemStatus::Failed)
    }

    /// Returns the state name as a string
    pub fn name(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "Pending",
            ItemStatus::InFlight => "InFlight",
            ItemStatus::Backoff => "Backoff",
            ItemStatus::Succeeded => "Succeeded",
            ItemStatus::Failed => "Failed",
        }
    }

    /// Returns true if the state machine allows moving to `target`
    pub fn can_transition_to(&self, target: ItemStatus) -> bool {
        matches!(
            (self, target),
            (ItemStatus::Pending, ItemStatus::InFlight)
                | (ItemStatus::InFlight, ItemStatus::Succeeded)
                | (ItemStatus::InFlight, ItemStatus::Failed)
                | (ItemStatus::InFlight, ItemStatus::Backoff)
                | (ItemStatus::Backoff, ItemStatus::InFlight)
                | (ItemStatus::Backoff, ItemStatus::Failed)
        )
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single unit of work inside a batch
///
/// Owned exclusively by the task driving it; only the final outcome is
/// handed back to the coordinator.
#[derive(Debug, Clone)]
pub struct WorkItem<I, A> {
    index: usize,
    input: I,
    attempt_count: u32,
    status: ItemStatus,
    result: Option<Result<A, ItemError>>,
}

impl<I, A> WorkItem<I, A> {
    /// Creates a pending work item for the input at `index`
    pub fn new(index: usize, input: I) -> Self {
        Self {
            index,
            input,
            attempt_count: 0,
            status: ItemStatus::Pending,
            result: None,
        }
    }

    /// Position of this item in the batch input
    pub fn index(&self) -> usize {
        self.index
    }

    /// The opaque descriptor handed to the executor
    pub fn input(&self) -> &I {
        &self.input
    }

    /// Number of attempts started so far
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Current lifecycle state
    pub fn status(&self) -> ItemStatus {
        self.status
    }

    /// Returns true once the item has succeeded or failed
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The terminal result, if the item has reached one
    pub fn result(&self) -> Option<&Result<A, ItemError>> {
        self.result.as_ref()
    }

    fn transition_to(&mut self, target: ItemStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.status.name().to_string(),
                to: target.name().to_string(),
            });
        }
        self.status = target;
        Ok(())
    }

    /// Marks the start of a new attempt and bumps the attempt counter
    pub fn start_attempt(&mut self) -> Result<u32, DomainError> {
        self.transition_to(ItemStatus::InFlight)?;
        self.attempt_count += 1;
        Ok(self.attempt_count)
    }

    /// Moves an in-flight item into backoff after a retryable failure
    pub fn enter_backoff(&mut self) -> Result<(), DomainError> {
        self.transition_to(ItemStatus::Backoff)
    }

    /// Records the artifact of a successful attempt
    pub fn succeed(&mut self, artifact: A) -> Result<(), DomainError> {
        self.transition_to(ItemStatus::Succeeded)?;
        self.result = Some(Ok(artifact));
        Ok(())
    }

    /// Records a terminal failure
    pub fn fail(&mut self, error: ItemError) -> Result<(), DomainError> {
        self.transition_to(ItemStatus::Failed)?;
        self.result = Some(Err(error));
        Ok(())
    }

    /// Consumes the item and returns its terminal outcome
    ///
    /// Returns `None` if the item never reached a terminal state.
    pub fn into_outcome(self) -> Option<Result<A, ItemError>> {
        if self.status.is_terminal() {
            self.result
        } else {
            None
        }
    }
}
