use log::error;
use tokio::signal;

pub mod config;
pub mod db;
pub mod record;

/// Resolves on Ctrl-C, or on SIGTERM on Unix.
pub async fn shutdown_signal() {
    const FN_NAME: &'static str = "shutdown_signal";

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("[{}] listen Ctrl-C error: {}", FN_NAME, e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Err(e) => {
                error!("[{}] listen SIGTERM error: {}", FN_NAME, e);
                std::future::pending::<()>().await;
            }
            Ok(mut sig) => {
                sig.recv().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => (),
        _ = terminate => (),
    }
}
