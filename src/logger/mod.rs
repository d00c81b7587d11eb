//! Logger module
//!
//! Provides logging utilities for the image server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Level-filtered error, warning, info and debug lines
//! - File-based logging support

mod format;
pub mod writer;

pub use format::{AccessLogEntry, AccessLogFormat};

use crate::config::{Config, ImageSource};
use std::net::SocketAddr;
use std::str::FromStr;

/// Log severity, ordered from most to least severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    /// Whether a writer configured at `self` emits a `line` level message
    pub fn enables(self, line: Self) -> bool {
        line <= self
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            other => Err(format!(
                "unknown log level '{other}' (expected error, warn, info or debug)"
            )),
        }
    }
}

/// Initialize the logger with configuration
///
/// Should be called once at application startup. The config has already been
/// validated, so level and format parse.
pub fn init(config: &Config) -> std::io::Result<()> {
    let level = config.logging.level.parse().unwrap_or(Level::Info);
    let format = config
        .logging
        .access_log_format
        .parse()
        .unwrap_or(AccessLogFormat::Combined);
    writer::init(
        level,
        format,
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

fn write(level: Level, message: &str) {
    match writer::get() {
        Some(w) => w.write(level, message),
        None if Level::Info.enables(level) => match level {
            Level::Error | Level::Warn => eprintln!("{message}"),
            Level::Info | Level::Debug => println!("{message}"),
        },
        None => {}
    }
}

pub fn log_error(message: &str) {
    write(Level::Error, &format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write(Level::Warn, &format!("[WARN] {message}"));
}

pub fn log_info(message: &str) {
    write(Level::Info, &format!("[INFO] {message}"));
}

pub fn log_debug(message: &str) {
    write(Level::Debug, &format!("[DEBUG] {message}"));
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, image: &ImageSource) {
    write(Level::Info, "======================================");
    write(Level::Info, "OTA image server started");
    write(Level::Info, &format!("Listening on: http://{addr}"));
    write(
        Level::Info,
        &format!("Serving: {} -> {}", image.route, image.path.display()),
    );
    if !image.path.is_file() {
        log_warning(&format!(
            "Image file does not exist yet: {}",
            image.path.display()
        ));
    }
    write(Level::Info, &format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write(Level::Info, &format!("Worker threads: {workers}"));
    }
    if let Some(max_conn) = config.performance.max_connections {
        write(Level::Info, &format!("Max connections: {max_conn}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write(Level::Info, &format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write(Level::Info, &format!("Error log: {path}"));
    }
    write(Level::Info, "======================================\n");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    log_debug(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Display) {
    log_error(&format!("Failed to serve connection: {err}"));
}

/// Log formatted access log entry in the configured format
pub fn log_access(entry: &AccessLogEntry) {
    match writer::get() {
        Some(w) => w.write_access(&entry.format(w.access_format())),
        None => println!("{}", entry.format(AccessLogFormat::Combined)),
    }
}

pub fn log_shutdown_started(active: usize) {
    log_info(&format!(
        "[Shutdown] Listener closed, waiting for {active} active connection(s)"
    ));
}

pub fn log_shutdown_complete(remaining: usize) {
    if remaining == 0 {
        log_info("[Shutdown] All connections closed");
    } else {
        log_warning(&format!(
            "[Shutdown] Grace period elapsed with {remaining} connection(s) still open"
        ));
    }
}
