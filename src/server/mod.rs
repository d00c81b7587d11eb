// Server module entry point
// Listener creation, connection serving and graceful shutdown

pub mod connection;
pub mod io;
pub mod listener;
pub mod serve;
pub mod signal;

// Re-export commonly used items
pub use listener::create_listener;
pub use serve::serve;
pub use signal::start_signal_handler;
