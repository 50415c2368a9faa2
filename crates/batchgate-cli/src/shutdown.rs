//! Ctrl+C / SIGTERM handling

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Waits for SIGINT or SIGTERM and cancels `token`.
///
/// If a handler cannot be installed that signal is simply never observed.
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), cancelling batch");
        }
        _ = terminate => {
            info!("Received SIGTERM, cancelling batch");
        }
        _ = token.cancelled() => return,
    }

    token.cancel();
}
