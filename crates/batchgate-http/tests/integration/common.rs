//! Shared helpers for HTTP executor integration tests

use std::time::Duration;

use batchgate_http::HttpExecutor;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const GENERATE_PATH: &str = "/v1/generate";

/// Starts a mock server and an executor pointed at its generate endpoint.
pub async fn setup() -> (MockServer, HttpExecutor) {
    let server = MockServer::start().await;
    let executor = executor_for(&server, Duration::from_secs(5));
    (server, executor)
}

pub fn executor_for(server: &MockServer, timeout: Duration) -> HttpExecutor {
    HttpExecutor::new(&format!("{}{}", server.uri(), GENERATE_PATH), timeout)
        .expect("mock server uri is a valid endpoint")
}

/// Mounts a single response for every POST to the generate endpoint.
pub async fn mount_response(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(response)
        .mount(server)
        .await;
}
