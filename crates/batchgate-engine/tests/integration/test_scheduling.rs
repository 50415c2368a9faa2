//! Interaction of the gate, the limiter and backoff

use std::time::Duration;

use batchgate_core::{config::ConfigBuilder, domain::Outcome};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::common::{coordinator, ScriptedExecutor};

fn single_permit(hold_permit_during_backoff: bool) -> batchgate_core::config::Config {
    ConfigBuilder::new()
        .concurrency_initial(1)
        .concurrency_min(1)
        .concurrency_max(1)
        .concurrency_hold_permit_during_backoff(hold_permit_during_backoff)
        .rate_limit_requests_per_minute(6000)
        .build()
}

#[tokio::test(start_paused = true)]
async fn test_permit_held_through_backoff() {
    let executor =
        ScriptedExecutor::new().script(0, vec![Outcome::TransientFailure("HTTP 503".into())]);
    let (coordinator, executor) = coordinator(&single_permit(true), executor);

    let start = Instant::now();
    coordinator
        .run(vec![0, 1], CancellationToken::new())
        .await
        .unwrap();

    // Item 1 cannot start while item 0 sleeps on the only permit
    let second = executor.call_offsets(1, start);
    assert_eq!(second.len(), 1);
    assert!(second[0] >= Duration::from_secs(2), "started at {:?}", second[0]);
}

#[tokio::test(start_paused = true)]
async fn test_permit_released_during_backoff_when_configured() {
    let executor =
        ScriptedExecutor::new().script(0, vec![Outcome::TransientFailure("HTTP 503".into())]);
    let (coordinator, executor) = coordinator(&single_permit(false), executor);

    let start = Instant::now();
    coordinator
        .run(vec![0, 1], CancellationToken::new())
        .await
        .unwrap();

    let second = executor.call_offsets(1, start);
    assert_eq!(second.len(), 1);
    assert!(second[0] < Duration::from_secs(1), "started at {:?}", second[0]);
}

#[tokio::test(start_paused = true)]
async fn test_limiter_throttles_batch() {
    let config = ConfigBuilder::new()
        .rate_limit_requests_per_minute(2)
        .rate_limit_poll_interval_ms(100)
        .build();
    let (coordinator, executor) = coordinator(&config, ScriptedExecutor::new());

    let start = Instant::now();
    let result = coordinator
        .run((0..4).collect(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.succeeded(), 4);

    let mut offsets: Vec<Duration> = (0..4)
        .flat_map(|id| executor.call_offsets(id, start))
        .collect();
    offsets.sort();

    // Two tokens up front, then one every 30s
    assert!(offsets[1] < Duration::from_secs(1));
    assert!(offsets[2] >= Duration::from_secs(30), "third at {:?}", offsets[2]);
    assert!(offsets[3] >= Duration::from_secs(60), "fourth at {:?}", offsets[3]);
    assert!(offsets[3] <= Duration::from_millis(60_500));
}

#[tokio::test(start_paused = true)]
async fn test_gate_bounds_in_flight_calls() {
    let config = ConfigBuilder::new()
        .concurrency_initial(4)
        .concurrency_min(1)
        .concurrency_max(4)
        .rate_limit_requests_per_minute(6000)
        .build();
    let executor = ScriptedExecutor::new().with_latency(Duration::from_secs(1));
    let (coordinator, executor) = coordinator(&config, executor);

    let start = Instant::now();
    coordinator
        .run((0..8).collect(), CancellationToken::new())
        .await
        .unwrap();

    // Four start immediately, four more once the first wave finishes
    let mut offsets: Vec<Duration> = (0..8)
        .flat_map(|id| executor.call_offsets(id, start))
        .collect();
    offsets.sort();
    assert!(offsets[3] < Duration::from_millis(100));
    assert!(offsets[4] >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_shrunk_gate_admits_fewer_new_calls() {
    let config = ConfigBuilder::new()
        .concurrency_initial(4)
        .concurrency_min(1)
        .concurrency_max(4)
        .rate_limit_requests_per_minute(6000)
        .build();
    // Item 0 is rate limited after 10ms, once all four permits are taken,
    // cutting the ceiling from 4 to 2 while items 1-3 still hold theirs
    let executor = ScriptedExecutor::new()
        .script(0, vec![Outcome::rate_limited()])
        .with_latency(Duration::from_secs(1))
        .with_latency_for(0, Duration::from_millis(10));
    let (coordinator, executor) = coordinator(&config, executor);

    let start = Instant::now();
    let run = coordinator.run((0..8).collect(), CancellationToken::new());
    tokio::pin!(run);
    let _ = tokio::time::timeout(Duration::from_millis(500), &mut run).await;
    assert_eq!(coordinator.gate().capacity(), 2);
    assert_eq!(coordinator.gate().in_use(), 4);
    run.await.unwrap();

    // The first wave finishes at 1s; only two slots exist afterwards, and
    // item 0 still holds one of them through its backoff.
    let mut second_wave: Vec<Duration> = (1..8)
        .flat_map(|id| executor.call_offsets(id, start))
        .filter(|offset| *offset >= Duration::from_millis(900))
        .collect();
    second_wave.sort();
    assert!(second_wave.len() >= 4);
    assert_eq!(
        second_wave
            .iter()
            .filter(|o| **o < Duration::from_millis(1100))
            .count(),
        1
    );
}
