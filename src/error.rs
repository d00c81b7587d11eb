//! Error types
//!
//! Image loading errors map onto HTTP statuses; server errors abort startup.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to load the firmware image from disk
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("image path is not a regular file: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("failed to read image file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ImageError {
    /// Classify an I/O error raised while opening or reading `path`
    pub fn from_io(path: PathBuf, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Read { path, source },
        }
    }

    /// HTTP status code the handler answers with
    pub const fn status(&self) -> u16 {
        match self {
            Self::NotFound { .. } | Self::NotAFile { .. } => 404,
            Self::Read { .. } => 500,
        }
    }
}

/// Fatal startup errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid listen address '{addr}': {source}")]
    Address {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to open log files: {0}")]
    Logger(#[source] io::Error),

    #[error("cannot determine application directory: {0}")]
    AppDir(#[source] io::Error),
}
