//! Shared test helpers for engine integration tests
//!
//! Provides a scripted in-memory executor. Each input is an item id; the
//! executor replays the outcomes queued for that id and succeeds with
//! `artifact-<id>` once the queue is empty.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use batchgate_core::{
    config::{Config, ConfigBuilder},
    domain::Outcome,
    ports::RemoteCallExecutor,
};
use batchgate_engine::BatchCoordinator;
use tokio::time::Instant;

#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<usize, VecDeque<Outcome<String>>>>,
    always: Mutex<HashMap<usize, Outcome<String>>>,
    calls: Mutex<Vec<(usize, Instant)>>,
    latency: Duration,
    latency_overrides: HashMap<usize, Duration>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call takes `latency` of (virtual) time.
    #[allow(dead_code)]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Calls for `id` take `latency` instead of the default.
    #[allow(dead_code)]
    pub fn with_latency_for(mut self, id: usize, latency: Duration) -> Self {
        self.latency_overrides.insert(id, latency);
        self
    }

    /// Queues outcomes for `id`; calls after the queue drains succeed.
    pub fn script(self, id: usize, outcomes: Vec<Outcome<String>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(id, outcomes.into_iter().collect());
        self
    }

    /// Makes every call for `id` return `outcome`.
    pub fn always(self, id: usize, outcome: Outcome<String>) -> Self {
        self.always.lock().unwrap().insert(id, outcome);
        self
    }

    /// Times at which `id` was called, relative to `start`.
    pub fn call_offsets(&self, id: usize, start: Instant) -> Vec<Duration> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(call_id, _)| *call_id == id)
            .map(|(_, at)| at.duration_since(start))
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl RemoteCallExecutor for ScriptedExecutor {
    type Input = usize;
    type Artifact = String;

    async fn call(&self, input: &usize) -> Outcome<String> {
        self.calls.lock().unwrap().push((*input, Instant::now()));
        let latency = self
            .latency_overrides
            .get(input)
            .copied()
            .unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(outcome) = self.always.lock().unwrap().get(input) {
            return outcome.clone();
        }
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(input)
            .and_then(|queue| queue.pop_front());
        next.unwrap_or_else(|| Outcome::Success(format!("artifact-{}", input)))
    }
}

/// Default scheduling limits with a fast bucket so rate limiting stays out
/// of the way unless a test wants it.
pub fn config() -> Config {
    ConfigBuilder::new()
        .rate_limit_requests_per_minute(6000)
        .build()
}

pub fn coordinator(
    config: &Config,
    executor: ScriptedExecutor,
) -> (BatchCoordinator<ScriptedExecutor>, Arc<ScriptedExecutor>) {
    let executor = Arc::new(executor);
    let coordinator =
        BatchCoordinator::new(config, Arc::clone(&executor)).expect("valid test config");
    (coordinator, executor)
}
