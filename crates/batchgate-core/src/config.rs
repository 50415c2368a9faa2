//! Configuration module for batchgate.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, environment overrides and a builder
//! pattern for programmatic use.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Environment variable overriding `concurrency.max`.
pub const ENV_MAX_CONCURRENT: &str = "BATCHGATE_MAX_CONCURRENT";
/// Environment variable overriding `rate_limit.requests_per_minute`.
pub const ENV_RPM_LIMIT: &str = "BATCHGATE_RPM_LIMIT";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for batchgate.
///
/// Every section is optional in the YAML file; missing sections take their
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub concurrency: ConcurrencyConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub executor: ExecutorConfig,
    pub logging: LoggingConfig,
}

/// Adaptive concurrency gate settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Starting permit ceiling (clamped into `[min, max]`).
    pub initial: usize,
    /// Lowest ceiling a rate-limit report can push the gate to.
    pub min: usize,
    /// Highest ceiling success reports can grow the gate to.
    pub max: usize,
    /// Consecutive successes needed for a one-permit increase.
    pub success_threshold: u32,
    /// Permits removed from the ceiling per rate-limit report.
    pub decrease_step: usize,
    /// Keep the permit while sleeping out a backoff delay.
    pub hold_permit_during_backoff: bool,
}

/// Token bucket settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Bucket capacity and refill rate, in calls per minute.
    pub requests_per_minute: u32,
    /// How often a waiting caller re-checks the bucket (milliseconds).
    pub poll_interval_ms: u64,
}

/// Retry and backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before retry `n` is entry `n - 1`; the last entry repeats.
    pub backoff_schedule_secs: Vec<u64>,
}

/// Settings for the bundled HTTP executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Endpoint that receives one POST per work descriptor.
    pub endpoint: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Fallback when a 429 response carries an unusable `Retry-After`.
    pub default_retry_after_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Using default configuration");
                Config::default()
            }
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/batchgate/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("batchgate")
            .join("config.yaml")
    }

    /// Apply `BATCHGATE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` as the variable source.
    ///
    /// Values that do not parse are ignored with a warning.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_CONCURRENT) {
            match raw.trim().parse::<usize>() {
                Ok(max) => self.concurrency.max = max,
                Err(_) => warn!(var = ENV_MAX_CONCURRENT, value = %raw, "Ignoring unparsable override"),
            }
        }
        if let Some(raw) = lookup(ENV_RPM_LIMIT) {
            match raw.trim().parse::<u32>() {
                Ok(rpm) => self.rate_limit.requests_per_minute = rpm,
                Err(_) => warn!(var = ENV_RPM_LIMIT, value = %raw, "Ignoring unparsable override"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            initial: 8,
            min: 2,
            max: 20,
            success_threshold: 10,
            decrease_step: 2,
            hold_permit_during_backoff: true,
        }
    }
}

impl ConcurrencyConfig {
    /// Initial ceiling after clamping into `[min, max]`.
    pub fn effective_initial(&self) -> usize {
        self.initial.min(self.max).max(self.min)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 50,
            poll_interval_ms: 100,
        }
    }
}

impl RateLimitConfig {
    /// Polling interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_schedule_secs: vec![2, 4, 8, 16, 32],
        }
    }
}

impl RetryConfig {
    /// Backoff schedule as [`Duration`]s.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        self.backoff_schedule_secs
            .iter()
            .map(|secs| Duration::from_secs(*secs))
            .collect()
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 120,
            default_retry_after_secs: 30,
        }
    }
}

impl ExecutorConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fallback retry hint as a [`Duration`].
    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"concurrency.min"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl ConcurrencyConfig {
    /// Validate this section; field names are prefixed with `concurrency.`.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        positive(&mut errors, "concurrency.min", self.min as u64);
        positive(&mut errors, "concurrency.max", self.max as u64);
        positive(
            &mut errors,
            "concurrency.success_threshold",
            self.success_threshold as u64,
        );
        positive(
            &mut errors,
            "concurrency.decrease_step",
            self.decrease_step as u64,
        );

        if self.min > self.max {
            errors.push(ValidationError {
                field: "concurrency.min".into(),
                message: format!(
                    "min ({}) must not exceed max ({})",
                    self.min, self.max
                ),
            });
        }

        errors
    }
}

impl RateLimitConfig {
    /// Validate this section; field names are prefixed with `rate_limit.`.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        positive(
            &mut errors,
            "rate_limit.requests_per_minute",
            self.requests_per_minute as u64,
        );
        positive(&mut errors, "rate_limit.poll_interval_ms", self.poll_interval_ms);
        errors
    }
}

impl RetryConfig {
    /// Validate this section; field names are prefixed with `retry.`.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.max_retries > 0 && self.backoff_schedule_secs.is_empty() {
            errors.push(ValidationError {
                field: "retry.backoff_schedule_secs".into(),
                message: "must not be empty when max_retries > 0".into(),
            });
        }
        errors
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        errors.extend(self.concurrency.validate());
        errors.extend(self.rate_limit.validate());
        errors.extend(self.retry.validate());

        // --- executor ---
        positive(&mut errors, "executor.timeout_secs", self.executor.timeout_secs);
        if let Some(endpoint) = &self.executor.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                errors.push(ValidationError {
                    field: "executor.endpoint".into(),
                    message: format!("'{}' is not an http(s) URL", endpoint),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use batchgate_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .concurrency_max(10)
///     .rate_limit_requests_per_minute(30)
///     .build();
/// assert_eq!(config.concurrency.max, 10);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- concurrency ---

    pub fn concurrency_initial(mut self, n: usize) -> Self {
        self.config.concurrency.initial = n;
        self
    }

    pub fn concurrency_min(mut self, n: usize) -> Self {
        self.config.concurrency.min = n;
        self
    }

    pub fn concurrency_max(mut self, n: usize) -> Self {
        self.config.concurrency.max = n;
        self
    }

    pub fn concurrency_success_threshold(mut self, n: u32) -> Self {
        self.config.concurrency.success_threshold = n;
        self
    }

    pub fn concurrency_decrease_step(mut self, n: usize) -> Self {
        self.config.concurrency.decrease_step = n;
        self
    }

    pub fn concurrency_hold_permit_during_backoff(mut self, hold: bool) -> Self {
        self.config.concurrency.hold_permit_during_backoff = hold;
        self
    }

    // --- rate_limit ---

    pub fn rate_limit_requests_per_minute(mut self, n: u32) -> Self {
        self.config.rate_limit.requests_per_minute = n;
        self
    }

    pub fn rate_limit_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.rate_limit.poll_interval_ms = ms;
        self
    }

    // --- retry ---

    pub fn retry_max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn retry_backoff_schedule_secs(mut self, schedule: Vec<u64>) -> Self {
        self.config.retry.backoff_schedule_secs = schedule;
        self
    }

    // --- executor ---

    pub fn executor_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.executor.endpoint = Some(endpoint.into());
        self
    }

    pub fn executor_timeout_secs(mut self, secs: u64) -> Self {
        self.config.executor.timeout_secs = secs;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
