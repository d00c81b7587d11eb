// Connection handling module
// Accepts a single TCP connection and serves it with hyper

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use super::io::WriteTimeout;
use crate::config::{AppState, PerformanceConfig};
use crate::handler;
use crate::logger;

/// Holds one slot of the active connection counter until dropped
struct ConnectionSlot(Arc<AppState>);

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.active_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accept and process a connection, checking limits and logging.
///
/// Returns `false` when the connection was rejected, either by
/// `max_connections` or because shutdown has started.
pub fn accept_connection(stream: TcpStream, peer_addr: SocketAddr, state: &Arc<AppState>) -> bool {
    if state.is_shutting_down() {
        return false;
    }

    // Increment counter first, then check limit (prevents race condition)
    let prev_count = state.active_connections.fetch_add(1, Ordering::SeqCst);
    let slot = ConnectionSlot(Arc::clone(state));

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(slot);
            drop(stream);
            return false;
        }
    }

    logger::log_connection_accepted(&peer_addr);
    tokio::spawn(serve_connection(stream, peer_addr, slot));
    true
}

/// Serve every request on one connection until the peer leaves or shutdown closes it
async fn serve_connection(stream: TcpStream, peer_addr: SocketAddr, slot: ConnectionSlot) {
    let state = Arc::clone(&slot.0);
    let perf = &state.config.performance;
    let io = TokioIo::new(WriteTimeout::new(stream, seconds(perf.write_timeout)));

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .keep_alive(perf.keep_alive_timeout > 0);
    if let Some(wait) = header_wait(perf) {
        builder.header_read_timeout(wait);
    }

    let service_state = Arc::clone(&state);
    let mut conn = std::pin::pin!(builder.serve_connection(
        io,
        service_fn(move |req| handler::handle_request(req, Arc::clone(&service_state), peer_addr)),
    ));

    // An in-flight response still completes after shutdown; idle keep-alive closes at once
    let result = tokio::select! {
        result = conn.as_mut() => result,
        () = state.shutdown_requested() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(err) = result {
        logger::log_connection_error(&err);
    }

    drop(slot);
}

/// Longest wait for request headers, which also bounds idle keep-alive time
fn header_wait(perf: &PerformanceConfig) -> Option<Duration> {
    let secs = if perf.keep_alive_timeout > 0 {
        perf.read_timeout.min(perf.keep_alive_timeout)
    } else {
        perf.read_timeout
    };
    seconds(secs)
}

/// Zero means no explicit timeout
const fn seconds(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

/// How long shutdown waits for in-flight responses
pub fn shutdown_grace(state: &AppState) -> Duration {
    let perf = &state.config.performance;
    Duration::from_secs(perf.read_timeout.max(perf.write_timeout))
}
