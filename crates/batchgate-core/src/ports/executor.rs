//! Remote call executor port (driven/secondary port)
//!
//! The engine never talks to a remote service directly. It hands each work
//! descriptor to a [`RemoteCallExecutor`] and reacts to the returned
//! [`Outcome`].
//!
//! ## Design Notes
//!
//! - Transport details (HTTP status codes, gRPC codes, timeouts) are mapped
//!   to [`Outcome`] variants by the implementation, never by the engine.
//! - Uses `#[async_trait]` for the async trait method.
//! - The executor is shared by every in-flight task, so it must be
//!   `Send + Sync` and `call` takes `&self`.

use std::sync::Arc;

use crate::domain::outcome::Outcome;

/// Port trait for performing a single remote call
///
/// ## Implementation Notes
///
/// - `call` must not retry internally; retries are the engine's job.
/// - Timeouts on the underlying call are the implementation's
///   responsibility and should surface as `TransientFailure`.
#[async_trait::async_trait]
pub trait RemoteCallExecutor: Send + Sync {
    /// Opaque work descriptor
    type Input: Send + Sync + 'static;
    /// Artifact produced by a successful call
    type Artifact: Send + 'static;

    /// Performs one remote call for `input`
    async fn call(&self, input: &Self::Input) -> Outcome<Self::Artifact>;
}

#[async_trait::async_trait]
impl<E: RemoteCallExecutor> RemoteCallExecutor for Arc<E> {
    type Input = E::Input;
    type Artifact = E::Artifact;

    async fn call(&self, input: &Self::Input) -> Outcome<Self::Artifact> {
        (**self).call(input).await
    }
}
