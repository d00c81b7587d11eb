//! OTA firmware image server
//!
//! Serves one firmware image file on one HTTP route so devices can download
//! updates over the air.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
