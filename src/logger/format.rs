//! Access log format module
//!
//! Supported formats:
//! - `combined` (Apache/Nginx combined format)
//! - `common` (Common Log Format - CLF)
//! - `json` (one JSON object per line)

use chrono::{DateTime, Local};
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;

/// Access log line layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLogFormat {
    Combined,
    Common,
    Json,
}

impl FromStr for AccessLogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "combined" => Ok(Self::Combined),
            "common" => Ok(Self::Common),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown access log format '{other}' (expected combined, common or json)"
            )),
        }
    }
}

/// One served request
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub remote_addr: String,
    pub time: DateTime<Local>,
    pub method: String,
    /// Request path including the query string, if any
    pub uri: String,
    /// HTTP version (1.0, 1.1, 2)
    pub http_version: String,
    pub status: u16,
    /// Response body size in bytes
    pub body_bytes: usize,
    pub user_agent: Option<String>,
    pub elapsed: Duration,
}

impl AccessLogEntry {
    /// Render the entry as a single line
    pub fn format(&self, format: AccessLogFormat) -> String {
        match format {
            AccessLogFormat::Combined => format!(
                "{} \"-\" \"{}\"",
                self.common_line(),
                self.user_agent.as_deref().unwrap_or("-"),
            ),
            AccessLogFormat::Common => self.common_line(),
            AccessLogFormat::Json => self.json_line(),
        }
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent`
    fn common_line(&self) -> String {
        format!(
            "{} - - [{}] \"{} {} HTTP/{}\" {} {}",
            self.remote_addr,
            self.time.format("%d/%b/%Y:%H:%M:%S %z"),
            self.method,
            self.uri,
            self.http_version,
            self.status,
            self.body_bytes,
        )
    }

    fn json_line(&self) -> String {
        json!({
            "remote_addr": self.remote_addr,
            "time": self.time.to_rfc3339(),
            "method": self.method,
            "uri": self.uri,
            "http_version": self.http_version,
            "status": self.status,
            "body_bytes": self.body_bytes,
            "user_agent": self.user_agent,
            "request_time_us": u64::try_from(self.elapsed.as_micros()).unwrap_or(u64::MAX),
        })
        .to_string()
    }
}
