//! Transport configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-attempt timeout (30 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default backoff unit; attempt `n` waits `n` units before retrying
pub const DEFAULT_BACKOFF_MS: u64 = 1_000;

/// Default retry budget for calls that do not specify one
pub const DEFAULT_RETRIES: u32 = 3;

/// Action used as the liveness probe
pub const PING_ACTION: &str = "testAPI";

/// Broker and channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Remote endpoint the channel injects requests against
    pub endpoint: String,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Linear backoff unit in milliseconds
    pub backoff_ms: u64,
    /// Retries used by `send_default`
    pub default_retries: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/exec".to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            backoff_ms: DEFAULT_BACKOFF_MS,
            default_retries: DEFAULT_RETRIES,
        }
    }
}

impl TransportConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With endpoint
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// With per-attempt timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With default retry budget
    #[inline]
    #[must_use]
    pub fn with_default_retries(mut self, retries: u32) -> Self {
        self.default_retries = retries;
        self
    }

    /// Per-attempt timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Backoff unit
    #[inline]
    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("endpoint cannot be empty".to_string());
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err("endpoint must start with http:// or https://".to_string());
        }

        if self.timeout_ms == 0 {
            return Err("timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}
