use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// How long a service waits for its tasks after the cancel signal fires.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Resolve when SIGINT or SIGTERM is delivered.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Cancel `token` once a shutdown signal arrives, then give `tasks` up to
/// [`SHUTDOWN_GRACE`] to drain before returning. Partial batches are not
/// rolled back; whatever a worker already popped it finishes or loses.
pub async fn run_until_shutdown(
    token: CancellationToken,
    tasks: tokio::task::JoinSet<()>,
) {
    shutdown_signal().await;
    info!("shutdown signal received, stopping");
    token.cancel();

    let mut tasks = tasks;
    let drain = async {
        while tasks.join_next().await.is_some() {}
    };

    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        info!(grace_secs = SHUTDOWN_GRACE.as_secs(), "shutdown timeout, forcing exit");
    } else {
        info!("graceful shutdown complete");
    }
}
