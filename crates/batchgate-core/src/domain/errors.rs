//! Domain error types
//!
//! This module defines the errors raised by domain operations (invalid
//! state transitions) and the terminal failure reasons attached to work
//! items that did not succeed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },
}

/// Terminal failure of a single work item
///
/// Item failures never abort sibling items; they are surfaced in the
/// item's slot of the batch result.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ItemError {
    /// The executor reported a failure that retrying cannot fix
    #[error("Permanent failure: {reason}")]
    PermanentFailure {
        /// Reason reported by the executor
        reason: String,
    },

    /// Every allowed retry ended in a rate limit or transient failure
    #[error("Retries exhausted after {attempts} attempts: {last_reason}")]
    RetriesExhausted {
        /// Total number of attempts made, including the first
        attempts: u32,
        /// Reason reported by the final attempt
        last_reason: String,
    },
}

impl ItemError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ItemError::PermanentFailure { .. } => "permanent_failure",
            ItemError::RetriesExhausted { .. } => "retries_exhausted",
        }
    }
}
