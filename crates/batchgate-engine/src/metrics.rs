//! Prometheus metrics for batch runs
//!
//! Counts attempts and terminal items, tracks the gate's ceiling and usage,
//! and accumulates time spent in backoff.

use prometheus::{
    Counter, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::gate::GateSnapshot;

/// Registry holding every batchgate metric.
pub struct BatchMetrics {
    registry: Registry,
    /// Counter: executor invocations by outcome kind
    pub attempts_total: IntCounterVec,
    /// Counter: items that reached a terminal state, by status
    pub items_total: IntCounterVec,
    /// Gauge: current concurrency ceiling
    pub gate_capacity: IntGauge,
    /// Gauge: permits currently held
    pub gate_in_use: IntGauge,
    /// Counter: seconds spent sleeping between attempts
    pub backoff_seconds_total: Counter,
    /// Histogram: executor call duration in seconds
    pub attempt_duration_seconds: HistogramVec,
}

impl BatchMetrics {
    /// Creates a new `BatchMetrics` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("batchgate".to_string()), None)?;

        let attempts_total = IntCounterVec::new(
            Opts::new("attempts_total", "Executor invocations by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(attempts_total.clone()))?;

        let items_total = IntCounterVec::new(
            Opts::new("items_total", "Work items finished by status"),
            &["status"],
        )?;
        registry.register(Box::new(items_total.clone()))?;

        let gate_capacity = IntGauge::new("gate_capacity", "Current concurrency ceiling")?;
        registry.register(Box::new(gate_capacity.clone()))?;

        let gate_in_use = IntGauge::new("gate_in_use", "Concurrency permits currently held")?;
        registry.register(Box::new(gate_in_use.clone()))?;

        let backoff_seconds_total =
            Counter::new("backoff_seconds_total", "Seconds spent in retry backoff")?;
        registry.register(Box::new(backoff_seconds_total.clone()))?;

        let attempt_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "attempt_duration_seconds",
                "Executor call duration in seconds",
            )
            .buckets(vec![0.1, 1.0, 5.0, 30.0, 120.0, f64::INFINITY]),
            &["outcome"],
        )?;
        registry.register(Box::new(attempt_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            attempts_total,
            items_total,
            gate_capacity,
            gate_in_use,
            backoff_seconds_total,
            attempt_duration_seconds,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Record one executor invocation and how long it took.
    pub fn record_attempt(&self, outcome: &str, duration_secs: f64) {
        self.attempts_total.with_label_values(&[outcome]).inc();
        self.attempt_duration_seconds
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }

    /// Record an item reaching a terminal status.
    pub fn record_item(&self, status: &str) {
        self.items_total.with_label_values(&[status]).inc();
    }

    /// Add time spent in backoff.
    pub fn record_backoff(&self, seconds: f64) {
        self.backoff_seconds_total.inc_by(seconds);
    }

    /// Mirror the gate's current state into the gauges.
    pub fn observe_gate(&self, snapshot: GateSnapshot) {
        self.gate_capacity.set(snapshot.capacity as i64);
        self.gate_in_use.set(snapshot.in_use as i64);
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for BatchMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchMetrics").finish_non_exhaustive()
    }
}
