//! Batch coordinator
//!
//! Drives every work item of a batch through
//! gate → limiter → executor → retry policy, one tokio task per item, and
//! collects the terminal outcomes in input order.
//!
//! ## Permit handling
//!
//! Each attempt holds one gate permit from before the rate-limit token is
//! taken until its outcome is known. When the outcome is retryable the gate
//! is informed immediately, and with `hold_permit_during_backoff` (the
//! default) the permit stays held through the backoff sleep. It is then
//! returned and a fresh one acquired for the next attempt, so a concurrent
//! ceiling decrease takes effect between attempts.
//!
//! ## Cancellation
//!
//! Every suspension point races the batch's [`CancellationToken`]. A
//! cancelled task stops where it is and its permit goes back to the gate
//! when the guard drops. [`BatchCoordinator::run`] then reports
//! [`BatchError::Cancelled`].

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use batchgate_core::{
    config::Config,
    domain::{
        BatchError, BatchResult, BatchStats, DomainError, ItemError, ItemOutcome, ItemStatus,
        OutcomeKind, WorkItem,
    },
    ports::RemoteCallExecutor,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    gate::{AdaptiveConcurrencyGate, GateFeedback},
    metrics::BatchMetrics,
    rate_limit::TokenBucketLimiter,
    retry::{RetryDecision, RetryPolicy},
};

/// Runs batches of independent remote calls under shared limits
///
/// The gate and limiter live as long as the coordinator, so consecutive
/// [`run`](Self::run) calls share the adapted ceiling and token balance.
pub struct BatchCoordinator<E: RemoteCallExecutor> {
    executor: Arc<E>,
    gate: Arc<AdaptiveConcurrencyGate>,
    limiter: Arc<TokenBucketLimiter>,
    policy: Arc<RetryPolicy>,
    hold_permit_during_backoff: bool,
    metrics: Option<Arc<BatchMetrics>>,
}

impl<E> BatchCoordinator<E>
where
    E: RemoteCallExecutor + 'static,
{
    /// Builds the gate, limiter and retry policy from `config`.
    ///
    /// Every problem in the scheduling sections is reported at once in
    /// [`BatchError::InvalidConfig`].
    pub fn new(config: &Config, executor: Arc<E>) -> Result<Self, BatchError> {
        let mut errors = config.concurrency.validate();
        errors.extend(config.rate_limit.validate());
        errors.extend(config.retry.validate());
        if !errors.is_empty() {
            return Err(BatchError::InvalidConfig(errors));
        }

        let gate = AdaptiveConcurrencyGate::new(&config.concurrency)?;
        let limiter = TokenBucketLimiter::new(&config.rate_limit)?;
        let policy = RetryPolicy::new(&config.retry)?;

        Ok(Self::from_parts(
            executor,
            Arc::new(gate),
            Arc::new(limiter),
            policy,
        )
        .hold_permit_during_backoff(config.concurrency.hold_permit_during_backoff))
    }

    /// Assembles a coordinator from components the caller already owns.
    pub fn from_parts(
        executor: Arc<E>,
        gate: Arc<AdaptiveConcurrencyGate>,
        limiter: Arc<TokenBucketLimiter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            executor,
            gate,
            limiter,
            policy: Arc::new(policy),
            hold_permit_during_backoff: true,
            metrics: None,
        }
    }

    /// Records attempts, items, backoff and gate state into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<BatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether a retrying item keeps its permit while it sleeps.
    pub fn hold_permit_during_backoff(mut self, hold: bool) -> Self {
        self.hold_permit_during_backoff = hold;
        self
    }

    pub fn gate(&self) -> &Arc<AdaptiveConcurrencyGate> {
        &self.gate
    }

    pub fn limiter(&self) -> &Arc<TokenBucketLimiter> {
        &self.limiter
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs every input to a terminal outcome.
    ///
    /// Item failures never abort the batch; they occupy the item's slot in
    /// the result. The only errors are cancellation through `cancel` and
    /// configuration problems caught at construction.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Work descriptors, in the order results are returned
    /// * `cancel` - Stops all waiting and in-flight work when triggered
    pub async fn run(
        &self,
        inputs: Vec<E::Input>,
        cancel: CancellationToken,
    ) -> Result<BatchResult<E::Artifact>, BatchError> {
        let total = inputs.len();
        if cancel.is_cancelled() {
            return Err(BatchError::Cancelled {
                completed: 0,
                total,
            });
        }

        // Tasks stop if this future is dropped before they finish.
        let run_token = cancel.child_token();
        let _abort_on_drop = run_token.clone().drop_guard();

        info!(
            total,
            capacity = self.gate.capacity(),
            requests_per_minute = self.limiter.capacity(),
            max_retries = self.policy.max_retries(),
            "Starting batch"
        );
        let started = Instant::now();
        let counters = Arc::new(RunCounters::default());

        let handles: Vec<_> = inputs
            .into_iter()
            .enumerate()
            .map(|(index, input)| {
                let worker = ItemWorker {
                    executor: Arc::clone(&self.executor),
                    gate: Arc::clone(&self.gate),
                    limiter: Arc::clone(&self.limiter),
                    policy: Arc::clone(&self.policy),
                    hold_permit_during_backoff: self.hold_permit_during_backoff,
                    metrics: self.metrics.clone(),
                    counters: Arc::clone(&counters),
                    cancel: run_token.clone(),
                };
                tokio::spawn(worker.drive(WorkItem::new(index, input)))
            })
            .collect();

        let mut outcomes: Vec<Option<ItemOutcome<E::Artifact>>> = Vec::with_capacity(total);
        for (index, handle) in handles.into_iter().enumerate() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(index, error = %e, "Work item task aborted");
                    Some(Err(ItemError::PermanentFailure {
                        reason: format!("task aborted: {}", e),
                    }))
                }
            };
            outcomes.push(outcome);
        }

        let completed = outcomes.iter().filter(|o| o.is_some()).count();
        if completed < total {
            warn!(completed, total, "Batch cancelled");
            return Err(BatchError::Cancelled { completed, total });
        }

        let outcomes: Vec<ItemOutcome<E::Artifact>> = outcomes.into_iter().flatten().collect();
        let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
        let stats = BatchStats {
            total,
            succeeded,
            failed: total - succeeded,
            rate_limited: counters.rate_limited.load(Ordering::Relaxed),
            transient_failures: counters.transient_failures.load(Ordering::Relaxed),
            attempts: counters.attempts.load(Ordering::Relaxed),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            total = stats.total,
            succeeded = stats.succeeded,
            failed = stats.failed,
            attempts = stats.attempts,
            rate_limited = stats.rate_limited,
            elapsed_ms = stats.elapsed_ms,
            capacity = self.gate.capacity(),
            "Batch finished"
        );

        Ok(BatchResult::new(outcomes, stats))
    }
}

impl<E: RemoteCallExecutor> std::fmt::Debug for BatchCoordinator<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("gate", &self.gate)
            .field("limiter", &self.limiter)
            .field("policy", &self.policy)
            .field("hold_permit_during_backoff", &self.hold_permit_during_backoff)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Per-item task
// ============================================================================

/// Counters shared by every task of one run
#[derive(Debug, Default)]
struct RunCounters {
    attempts: AtomicU64,
    rate_limited: AtomicU64,
    transient_failures: AtomicU64,
}

/// How an item's task ended
enum Drive {
    Finished,
    Cancelled,
}

struct ItemWorker<E: RemoteCallExecutor> {
    executor: Arc<E>,
    gate: Arc<AdaptiveConcurrencyGate>,
    limiter: Arc<TokenBucketLimiter>,
    policy: Arc<RetryPolicy>,
    hold_permit_during_backoff: bool,
    metrics: Option<Arc<BatchMetrics>>,
    counters: Arc<RunCounters>,
    cancel: CancellationToken,
}

impl<E: RemoteCallExecutor> ItemWorker<E> {
    /// Returns `None` when cancelled before reaching a terminal state.
    async fn drive(
        self,
        mut item: WorkItem<E::Input, E::Artifact>,
    ) -> Option<ItemOutcome<E::Artifact>> {
        match self.process(&mut item).await {
            Ok(Drive::Finished) => item.into_outcome(),
            Ok(Drive::Cancelled) => {
                debug!(
                    index = item.index(),
                    status = %item.status(),
                    "Work item cancelled"
                );
                None
            }
            Err(e) => {
                error!(index = item.index(), error = %e, "Work item left its state machine");
                Some(Err(ItemError::PermanentFailure {
                    reason: e.to_string(),
                }))
            }
        }
    }

    async fn process(
        &self,
        item: &mut WorkItem<E::Input, E::Artifact>,
    ) -> Result<Drive, DomainError> {
        let index = item.index();

        loop {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(Drive::Cancelled),
                permit = self.gate.acquire() => permit,
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(Drive::Cancelled),
                _ = self.limiter.acquire() => {}
            }

            let attempt = item.start_attempt()?;
            debug!(index, attempt, "Starting attempt");

            let call_started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(Drive::Cancelled),
                outcome = self.executor.call(item.input()) => outcome,
            };
            let kind = outcome.kind();
            self.record_attempt(kind, call_started.elapsed());

            match self.policy.decide(outcome, attempt) {
                RetryDecision::Succeed(artifact) => {
                    permit.release(GateFeedback::Success);
                    self.observe_gate();
                    item.succeed(artifact)?;
                    debug!(index, attempt, "Work item succeeded");
                    self.record_item(ItemStatus::Succeeded);
                    return Ok(Drive::Finished);
                }
                RetryDecision::Fail(err) => {
                    permit.release(GateFeedback::from(kind));
                    self.observe_gate();
                    error!(
                        index,
                        attempt,
                        code = err.code(),
                        error = %err,
                        "Work item failed"
                    );
                    item.fail(err)?;
                    self.record_item(ItemStatus::Failed);
                    return Ok(Drive::Finished);
                }
                RetryDecision::Retry {
                    delay,
                    kind,
                    reason,
                } => {
                    self.gate.report(GateFeedback::from(kind));
                    item.enter_backoff()?;
                    warn!(
                        index,
                        attempt,
                        outcome = %kind,
                        reason = %reason,
                        delay_ms = delay.as_millis() as u64,
                        "Attempt failed, backing off"
                    );

                    let held = if self.hold_permit_during_backoff {
                        Some(permit)
                    } else {
                        drop(permit);
                        None
                    };
                    self.observe_gate();

                    if !self.backoff(delay).await {
                        return Ok(Drive::Cancelled);
                    }
                    drop(held);
                }
            }
        }
    }

    /// Sleeps out a backoff delay. Returns false if cancelled first.
    async fn backoff(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_backoff(delay.as_secs_f64());
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn record_attempt(&self, kind: OutcomeKind, elapsed: Duration) {
        self.counters.attempts.fetch_add(1, Ordering::Relaxed);
        match kind {
            OutcomeKind::RateLimited => {
                self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeKind::TransientFailure => {
                self.counters
                    .transient_failures
                    .fetch_add(1, Ordering::Relaxed);
            }
            OutcomeKind::Success | OutcomeKind::PermanentFailure => {}
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt(kind.as_str(), elapsed.as_secs_f64());
        }
    }

    fn record_item(&self, status: ItemStatus) {
        if let Some(metrics) = &self.metrics {
            metrics.record_item(&status.to_string().to_lowercase());
        }
    }

    fn observe_gate(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_gate(self.gate.snapshot());
        }
    }
}
