// Signal handling module
//
// Supported signals:
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)

use std::sync::Arc;

use crate::config::AppState;
use crate::logger;

/// Start signal handlers (Unix)
///
/// Spawns a background task that turns the first SIGTERM or SIGINT into
/// `AppState::request_shutdown`.
#[cfg(unix)]
pub fn start_signal_handler(state: Arc<AppState>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    logger::log_error(&format!("Failed to register signal handlers: {e}"));
                    return;
                }
            };

        logger::log_debug(&format!(
            "[SIGNAL] Handlers registered for SIGTERM and SIGINT (pid {})",
            std::process::id()
        ));

        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };

        logger::log_info(&format!("[SIGNAL] {name} received, shutting down gracefully"));
        state.request_shutdown();
    });
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(state: Arc<AppState>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                logger::log_info("[SIGNAL] Ctrl+C received, shutting down gracefully");
                state.request_shutdown();
            }
            Err(e) => logger::log_error(&format!("Failed to listen for Ctrl+C: {e}")),
        }
    });
}
