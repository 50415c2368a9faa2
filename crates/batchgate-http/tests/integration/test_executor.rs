//! Status code mapping of a single call

use std::time::Duration;

use batchgate_core::{domain::Outcome, ports::RemoteCallExecutor};
use batchgate_http::HttpExecutor;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{executor_for, mount_response, setup, GENERATE_PATH};

#[tokio::test]
async fn test_success_returns_json_body() {
    let (server, executor) = setup().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"prompt": "a red fox"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"image": "fox.png"})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = executor.call(&json!({"prompt": "a red fox"})).await;
    assert_eq!(outcome, Outcome::Success(json!({"image": "fox.png"})));
}

#[tokio::test]
async fn test_empty_success_body_is_null() {
    let (server, executor) = setup().await;
    mount_response(&server, ResponseTemplate::new(204)).await;

    let outcome = executor.call(&json!({})).await;
    assert_eq!(outcome, Outcome::Success(serde_json::Value::Null));
}

#[tokio::test]
async fn test_non_json_success_body_is_permanent() {
    let (server, executor) = setup().await;
    mount_response(&server, ResponseTemplate::new(200).set_body_string("<html>")).await;

    match executor.call(&json!({})).await {
        Outcome::PermanentFailure(reason) => assert!(reason.contains("undecodable")),
        other => panic!("expected permanent failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_429_with_seconds_hint() {
    let (server, executor) = setup().await;
    mount_response(
        &server,
        ResponseTemplate::new(429).insert_header("Retry-After", "7"),
    )
    .await;

    let outcome = executor.call(&json!({})).await;
    assert_eq!(
        outcome,
        Outcome::RateLimited {
            retry_after: Some(Duration::from_secs(7))
        }
    );
}

#[tokio::test]
async fn test_429_without_hint() {
    let (server, executor) = setup().await;
    mount_response(&server, ResponseTemplate::new(429)).await;

    assert_eq!(executor.call(&json!({})).await, Outcome::rate_limited());
}

#[tokio::test]
async fn test_429_with_unusable_hint_uses_default() {
    let (server, executor) = setup().await;
    let executor = executor.with_default_retry_after(Duration::from_secs(11));
    mount_response(
        &server,
        ResponseTemplate::new(429).insert_header("Retry-After", "later"),
    )
    .await;

    assert_eq!(
        executor.call(&json!({})).await,
        Outcome::RateLimited {
            retry_after: Some(Duration::from_secs(11))
        }
    );
}

#[tokio::test]
async fn test_429_with_day_long_hint_uses_default() {
    let (server, executor) = setup().await;
    let executor = executor.with_default_retry_after(Duration::from_secs(11));
    mount_response(
        &server,
        ResponseTemplate::new(429).insert_header("Retry-After", "86400"),
    )
    .await;

    assert_eq!(
        executor.call(&json!({})).await,
        Outcome::RateLimited {
            retry_after: Some(Duration::from_secs(11))
        }
    );
}

#[tokio::test]
async fn test_503_is_transient() {
    let (server, executor) = setup().await;
    mount_response(
        &server,
        ResponseTemplate::new(503).set_body_string("model overloaded"),
    )
    .await;

    assert_eq!(
        executor.call(&json!({})).await,
        Outcome::TransientFailure("HTTP 503: model overloaded".into())
    );
}

#[tokio::test]
async fn test_other_errors_are_permanent() {
    for status in [400u16, 401, 404, 500] {
        let (server, executor) = setup().await;
        mount_response(&server, ResponseTemplate::new(status)).await;

        assert_eq!(
            executor.call(&json!({})).await,
            Outcome::PermanentFailure(format!("HTTP {}", status)),
            "status {}",
            status
        );
    }
}

#[tokio::test]
async fn test_timeout_is_transient() {
    let (server, _) = setup().await;
    mount_response(
        &server,
        ResponseTemplate::new(200).set_delay(Duration::from_secs(2)),
    )
    .await;
    let executor = executor_for(&server, Duration::from_millis(200));

    match executor.call(&json!({})).await {
        Outcome::TransientFailure(reason) => assert!(reason.contains("timed out")),
        other => panic!("expected transient failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    // Bind then drop a listener so the port is known to be closed
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let executor = HttpExecutor::new(
        &format!("http://127.0.0.1:{}/v1/generate", port),
        Duration::from_secs(2),
    )
    .unwrap();

    assert!(matches!(
        executor.call(&json!({})).await,
        Outcome::TransientFailure(_)
    ));
}
