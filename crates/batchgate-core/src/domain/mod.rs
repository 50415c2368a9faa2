//! Domain entities and business logic
//!
//! This module contains the core domain types for batchgate:
//! - Call outcome taxonomy
//! - Work items and their status state machine
//! - Batch results and statistics
//! - Domain-specific error types

pub mod batch;
pub mod errors;
pub mod outcome;
pub mod work_item;

// Re-export commonly used types
pub use batch::{BatchError, BatchResult, BatchStats, ItemOutcome};
pub use errors::{DomainError, ItemError};
pub use outcome::{Outcome, OutcomeKind};
pub use work_item::{ItemStatus, WorkItem};
