//! HTTP executor driven by the batch coordinator

use std::sync::Arc;

use batchgate_core::{config::ConfigBuilder, domain::ItemError};
use batchgate_engine::BatchCoordinator;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{setup, GENERATE_PATH};

#[tokio::test]
async fn test_batch_over_http() {
    let (server, executor) = setup().await;

    // Item 1 is throttled once, item 2 is rejected, everything else works
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({"id": 1})))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({"id": 2})))
        .respond_with(ResponseTemplate::new(422).set_body_string("prompt rejected"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    // Zero backoff keeps the test on real time without sleeping
    let config = ConfigBuilder::new()
        .retry_backoff_schedule_secs(vec![0])
        .rate_limit_requests_per_minute(6000)
        .build();
    let coordinator = BatchCoordinator::new(&config, Arc::new(executor)).unwrap();

    let inputs = (0..4).map(|id| json!({"id": id})).collect();
    let result = coordinator
        .run(inputs, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.succeeded(), 3);
    assert_eq!(result.get(1), Some(&Ok(json!({"ok": true}))));
    assert_eq!(
        result.get(2),
        Some(&Err(ItemError::PermanentFailure {
            reason: "HTTP 422: prompt rejected".into()
        }))
    );

    let stats = result.stats();
    assert_eq!(stats.attempts, 5);
    assert_eq!(stats.rate_limited, 1);
    assert_eq!(coordinator.gate().capacity(), 6);
}
