//! HTTP executor
//!
//! One attempt is one `POST <endpoint>` with the descriptor as JSON body.
//! No retries happen here; the engine owns them.
//!
//! | Response | Outcome |
//! |---|---|
//! | 2xx with JSON body | `Success(body)` |
//! | 2xx with empty body | `Success(Null)` |
//! | 2xx with non-JSON body | `PermanentFailure` |
//! | 429 | `RateLimited` with the parsed `Retry-After` hint |
//! | 503 | `TransientFailure` |
//! | timeout or connection failure | `TransientFailure` |
//! | anything else | `PermanentFailure` |

use std::time::Duration;

use batchgate_core::{config::ExecutorConfig, domain::Outcome, ports::RemoteCallExecutor};
use reqwest::{header::RETRY_AFTER, Client, Response, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{retry_after::parse_retry_after, HttpExecutorError};

/// Fallback used when a 429 carries a `Retry-After` we cannot use.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Longest response excerpt kept in a failure reason.
const REASON_BODY_LIMIT: usize = 200;

/// Posts JSON work descriptors to a single endpoint
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    endpoint: Url,
    default_retry_after: Duration,
}

impl HttpExecutor {
    /// Creates an executor with its own client and request timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, HttpExecutorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, endpoint)
    }

    /// Creates an executor on a caller-supplied client.
    pub fn with_client(client: Client, endpoint: &str) -> Result<Self, HttpExecutorError> {
        Ok(Self {
            client,
            endpoint: parse_endpoint(endpoint)?,
            default_retry_after: DEFAULT_RETRY_AFTER,
        })
    }

    /// Creates an executor from the `executor` configuration section.
    pub fn from_config(config: &ExecutorConfig) -> Result<Self, HttpExecutorError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or(HttpExecutorError::MissingEndpoint)?;
        Ok(Self::new(endpoint, config.timeout())?
            .with_default_retry_after(config.default_retry_after()))
    }

    /// Overrides the fallback for unusable `Retry-After` values.
    pub fn with_default_retry_after(mut self, default: Duration) -> Self {
        self.default_retry_after = default;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn classify(&self, response: Response) -> Outcome<Value> {
        let status = response.status();

        if status.is_success() {
            return match response.bytes().await {
                Ok(body) if body.is_empty() => Outcome::Success(Value::Null),
                Ok(body) => match serde_json::from_slice(&body) {
                    Ok(value) => Outcome::Success(value),
                    Err(e) => Outcome::PermanentFailure(format!(
                        "HTTP {}: undecodable response body: {}",
                        status.as_u16(),
                        e
                    )),
                },
                Err(e) => transport_failure(e),
            };
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .map(|value| match value.to_str() {
                    Ok(value) => parse_retry_after(value, self.default_retry_after),
                    Err(_) => self.default_retry_after,
                });
            warn!(
                endpoint = %self.endpoint,
                retry_after_secs = retry_after.map(|d| d.as_secs()),
                "Received 429 Too Many Requests"
            );
            return Outcome::RateLimited { retry_after };
        }

        let body = response.text().await.unwrap_or_default();
        let reason = failure_reason(status, &body);
        if status == StatusCode::SERVICE_UNAVAILABLE {
            Outcome::TransientFailure(reason)
        } else {
            Outcome::PermanentFailure(reason)
        }
    }
}

#[async_trait::async_trait]
impl RemoteCallExecutor for HttpExecutor {
    type Input = Value;
    type Artifact = Value;

    async fn call(&self, input: &Value) -> Outcome<Value> {
        debug!(endpoint = %self.endpoint, "Sending work descriptor");

        match self
            .client
            .post(self.endpoint.clone())
            .json(input)
            .send()
            .await
        {
            Ok(response) => self.classify(response).await,
            Err(e) => transport_failure(e),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_endpoint(endpoint: &str) -> Result<Url, HttpExecutorError> {
    let invalid = |reason: String| HttpExecutorError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

fn transport_failure(error: reqwest::Error) -> Outcome<Value> {
    if error.is_timeout() {
        Outcome::TransientFailure(format!("request timed out: {}", error))
    } else if error.is_connect() {
        Outcome::TransientFailure(format!("connection failed: {}", error))
    } else {
        Outcome::PermanentFailure(format!("request failed: {}", error))
    }
}

fn failure_reason(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {}", status.as_u16());
    }

    let excerpt: String = body.chars().take(REASON_BODY_LIMIT).collect();
    format!("HTTP {}: {}", status.as_u16(), excerpt)
}
