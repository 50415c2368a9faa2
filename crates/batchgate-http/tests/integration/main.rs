//! Integration tests for batchgate-http
//!
//! Uses wiremock to stand in for the remote service and checks the status
//! mapping of `HttpExecutor`, alone and driven by the batch coordinator.

mod common;

mod test_batch;
mod test_executor;
