//! batchgate HTTP - `RemoteCallExecutor` over HTTP
//!
//! Sends each work descriptor as a JSON `POST` to one endpoint and maps the
//! response onto the engine's outcome taxonomy.
//!
//! ## Modules
//!
//! - [`executor`] - the [`HttpExecutor`] adapter and its status mapping
//! - [`retry_after`] - `Retry-After` header parsing

pub mod executor;
pub mod retry_after;

pub use executor::HttpExecutor;
pub use retry_after::parse_retry_after;

use thiserror::Error;

/// Errors raised while building an [`HttpExecutor`]
#[derive(Debug, Error)]
pub enum HttpExecutorError {
    /// No endpoint was configured
    #[error("No executor endpoint configured")]
    MissingEndpoint,

    /// The endpoint is not an absolute http(s) URL
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// The rejected value
        endpoint: String,
        /// Why it was rejected
        reason: String,
    },

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
