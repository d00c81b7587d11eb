// Server loop module
// Accepts connections until shutdown, then drains the active ones

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::{accept_connection, shutdown_grace};
use crate::config::AppState;
use crate::logger;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Pause after a failed accept, so a persistent error such as EMFILE cannot spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Run the accept loop until `AppState::request_shutdown` is called
///
/// The listener is closed as soon as shutdown starts. Idle connections are
/// closed too; in-flight responses get the shutdown grace period to finish.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state);
                    }
                    Err(e) => accept_failed(&e).await,
                }
            }

            () = state.shutdown_requested() => break,
        }
    }

    drop(listener);
    let active = state.active_connections.load(Ordering::SeqCst);
    logger::log_shutdown_started(active);

    let remaining = drain_connections(&state, shutdown_grace(&state)).await;
    logger::log_shutdown_complete(remaining);
}

async fn accept_failed(error: &std::io::Error) {
    logger::log_error(&format!("Failed to accept connection: {error}"));
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

/// Wait until no connection is active or `grace` elapses; returns the count still open
async fn drain_connections(state: &AppState, grace: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + grace;

    loop {
        let active = state.active_connections.load(Ordering::SeqCst);
        if active == 0 || tokio::time::Instant::now() >= deadline {
            return active;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_accept_error_backs_off() {
        let started = Instant::now();
        accept_failed(&std::io::Error::from_raw_os_error(24)).await;
        assert!(started.elapsed() >= ACCEPT_ERROR_BACKOFF);
    }
}
