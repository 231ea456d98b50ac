//! Process signals that stop the HTTP listener.

use tokio::signal;
use tracing::{error, info};

/// Signal that ended the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

impl StopSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopSignal::Interrupt => "SIGINT",
            StopSignal::Terminate => "SIGTERM",
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires; the other
/// one still can. Captures already stored stay stored, forward tasks still
/// in flight are dropped with the runtime.
pub async fn wait_for_stop_signal() -> StopSignal {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "signal_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "signal_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => StopSignal::Interrupt,
        _ = terminate => StopSignal::Terminate,
    }
}

/// Graceful-shutdown trigger for `axum::serve`.
pub async fn shutdown_signal() {
    let stop = wait_for_stop_signal().await;
    info!(signal = stop.as_str(), "server_shutting_down");
}
