//! Web server configuration.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Configuration for the reading server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Host to bind the server to
    pub host: String,
    /// Port to bind the server to
    pub port: u16,
    /// Pending-connection queue length handed to `listen`
    pub backlog: u32,
    /// Maximum request bytes read before responding
    pub request_buffer_size: usize,
    /// Client-side page reload interval in milliseconds
    pub refresh_ms: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            backlog: crate::DEFAULT_BACKLOG,
            request_buffer_size: crate::DEFAULT_REQUEST_BUFFER_SIZE,
            refresh_ms: crate::DEFAULT_REFRESH_MS,
        }
    }
}

impl WebConfig {
    /// Create a new web configuration with custom host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the host for the web server.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port for the web server.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the listen backlog.
    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Set the request buffer size.
    pub fn with_request_buffer_size(mut self, size: usize) -> Self {
        self.request_buffer_size = size;
        self
    }

    /// Set the page refresh interval.
    pub fn with_refresh_ms(mut self, refresh_ms: u64) -> Self {
        self.refresh_ms = refresh_ms;
        self
    }

    /// Get the full bind address. IPv6 hosts are bracketed.
    pub fn bind_address(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{}]:{}", self.host, self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }
}
