//! External cancellation of a running batch

use std::time::Duration;

use batchgate_core::domain::{BatchError, Outcome};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::common::{config, coordinator, ScriptedExecutor};

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start_makes_no_calls() {
    let (coordinator, executor) = coordinator(&config(), ScriptedExecutor::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = coordinator.run((0..5).collect(), cancel).await.unwrap_err();
    assert!(matches!(
        err,
        BatchError::Cancelled {
            completed: 0,
            total: 5
        }
    ));
    assert_eq!(executor.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_backoff() {
    let executor = ScriptedExecutor::new().always(0, Outcome::rate_limited());
    let (coordinator, executor) = coordinator(&config(), executor);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = coordinator.run(vec![0, 1], cancel).await.unwrap_err();

    // Item 0 was sleeping toward its third attempt at 6s
    assert!(start.elapsed() < Duration::from_secs(6));
    assert_eq!(executor.call_offsets(0, start).len(), 2);
    match err {
        BatchError::Cancelled { completed, total } => {
            assert_eq!(completed, 1);
            assert_eq!(total, 2);
        }
        other => panic!("expected cancellation, got {:?}", other),
    }
    assert_eq!(coordinator.gate().in_use(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_in_flight_calls() {
    let executor = ScriptedExecutor::new().with_latency(Duration::from_secs(60));
    let (coordinator, _) = coordinator(&config(), executor);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = coordinator.run((0..3).collect(), cancel).await.unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(matches!(err, BatchError::Cancelled { completed: 0, total: 3 }));
    assert_eq!(coordinator.gate().in_use(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_completion_keeps_result() {
    let (coordinator, _) = coordinator(&config(), ScriptedExecutor::new());
    let cancel = CancellationToken::new();

    let result = coordinator.run(vec![0, 1], cancel.clone()).await.unwrap();
    cancel.cancel();

    assert_eq!(result.succeeded(), 2);
}
