//! Integration tests for batchgate-engine
//!
//! Drives the coordinator against a scripted in-memory executor on paused
//! tokio time, so backoff schedules and rate limits run in virtual time.

mod common;

mod test_cancellation;
mod test_scheduling;
