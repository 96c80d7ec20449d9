use futures::FutureExt;
use tokio::signal;
use tracing::{event, Level};

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        event!(Level::ERROR, error=%e, "Failed to listen for ctrl+c");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(e) => {
            event!(Level::ERROR, error=%e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}

/// Create a future which will resolve when receiving SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::task::spawn(async move {
        tokio::select! {
            _ = ctrl_c() => {},
            _ = terminate() => {},
        }

        event!(Level::INFO, "Received shutdown signal");
        shutdown_tx.send(()).ok();
    });

    shutdown_rx.map(|_| ()).await
}
