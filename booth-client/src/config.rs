//! Client configuration

use std::time::Duration;

/// Client configuration for connecting to the remote authority
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL (e.g., "https://authority.example.gov/api")
    pub base_url: String,

    /// Ceiling for data calls (login, refresh, push, pull) in milliseconds
    pub request_timeout_ms: u64,

    /// Ceiling for the reachability probe in milliseconds
    pub probe_timeout_ms: u64,
}

impl ClientConfig {
    /// Create a new client configuration with default timeouts
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_ms: 30_000,
            probe_timeout_ms: 5_000,
        }
    }

    /// Set the data-call timeout
    pub fn with_request_timeout_ms(mut self, millis: u64) -> Self {
        self.request_timeout_ms = millis;
        self
    }

    /// Set the probe timeout
    pub fn with_probe_timeout_ms(mut self, millis: u64) -> Self {
        self.probe_timeout_ms = millis;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Create an HTTP client from this configuration
    pub fn build_http_client(&self) -> crate::ClientResult<crate::HttpRemoteClient> {
        crate::HttpRemoteClient::new(self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080/api")
    }
}
