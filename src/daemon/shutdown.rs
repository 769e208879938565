use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Detects signals sent to the process and cancels `cancelation` once one arrives. Ctrl-C
/// everywhere, SIGTERM on unix.
///
/// On Windows detached processes can't detect signals sent to them, so `keytrail stop` ends
/// them forcefully and the last persisted counters are what survives.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt");
        },
        _ = terminate() => {
            info!("Received termination request");
        },
        _ = cancelation.cancelled() => {},
    };
    cancelation.cancel();
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::error;

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            terminate.recv().await;
        }
        Err(e) => {
            error!("Failed to listen for SIGTERM {e:?}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
