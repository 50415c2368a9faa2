//! batchgate Engine - Scheduling for batches of rate-limited remote calls
//!
//! This crate turns a list of work descriptors into a list of outcomes
//! while keeping the remote service healthy:
//! - **gate** - adaptive bound on calls in flight
//! - **rate_limit** - token bucket on calls per minute
//! - **retry** - backoff schedule and retry ceiling
//! - **coordinator** - one task per item, results in input order
//! - **metrics** - Prometheus counters and gauges for batch runs
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use batchgate_core::{config::Config, domain::BatchError, ports::RemoteCallExecutor};
//! use batchgate_engine::BatchCoordinator;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example<E>(executor: E, inputs: Vec<E::Input>) -> Result<(), BatchError>
//! # where
//! #     E: RemoteCallExecutor + 'static,
//! # {
//! let coordinator = BatchCoordinator::new(&Config::default(), Arc::new(executor))?;
//! let result = coordinator.run(inputs, CancellationToken::new()).await?;
//! println!("{} of {} succeeded", result.succeeded(), result.len());
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod gate;
pub mod metrics;
pub mod rate_limit;
pub mod retry;

pub use coordinator::BatchCoordinator;
pub use gate::{AdaptiveConcurrencyGate, GateFeedback, GatePermit, GateSnapshot};
pub use metrics::BatchMetrics;
pub use rate_limit::TokenBucketLimiter;
pub use retry::{RetryDecision, RetryPolicy};
