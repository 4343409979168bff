//! Error types for the transport layer
//!
//! Separates failures of a single attempt (channel error, timeout) from the
//! terminal outcome of a logical request (retries exhausted).

use std::time::Duration;

/// Errors produced while sending one logical request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Caller input rejected before any attempt was made
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transport could not be constructed
    #[error("transport configuration error: {0}")]
    Configuration(String),

    /// The channel itself failed to deliver (load failure, HTTP error, bad body)
    #[error("channel error for '{action}': {reason}")]
    Channel {
        /// Action of the failed attempt
        action: String,
        /// What the channel reported
        reason: String,
    },

    /// No response arrived within the timeout window
    #[error("request '{action}' timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Action of the failed attempt
        action: String,
        /// Timeout that elapsed
        after: Duration,
    },

    /// Every attempt failed; `last` is the failure of the final attempt
    #[error("request '{action}' failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Action of the logical request
        action: String,
        /// Attempts made, initial one included
        attempts: u32,
        /// Failure of the final attempt
        last: Box<TransportError>,
    },
}

impl TransportError {
    /// Create channel error
    pub fn channel(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Channel {
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// Create timeout error
    pub fn timeout(action: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            action: action.into(),
            after,
        }
    }

    /// Check if a single attempt failing this way may be retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Channel { .. } | Self::Timeout { .. })
    }

    /// Check if the final attempt ended by timing out
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Exhausted { last, .. } => last.is_timeout(),
            _ => false,
        }
    }

    /// Number of attempts made, when known
    #[must_use]
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Exhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_distinguish_failure_modes() {
        let timeout = TransportError::timeout("getTopics", Duration::from_secs(30));
        let channel = TransportError::channel("getTopics", "load failed");
        let exhausted = TransportError::Exhausted {
            action: "getTopics".to_string(),
            attempts: 2,
            last: Box::new(timeout.clone()),
        };

        assert_eq!(timeout.to_string(), "request 'getTopics' timed out after 30000ms");
        assert_eq!(channel.to_string(), "channel error for 'getTopics': load failed");
        assert!(exhausted.to_string().starts_with("request 'getTopics' failed after 2 attempts"));
        assert!(exhausted.to_string().contains("timed out"));
    }

    #[test]
    fn retry_classification() {
        assert!(TransportError::channel("a", "b").is_retryable());
        assert!(TransportError::timeout("a", Duration::from_secs(1)).is_retryable());
        assert!(!TransportError::InvalidRequest("empty".into()).is_retryable());

        let exhausted = TransportError::Exhausted {
            action: "a".into(),
            attempts: 1,
            last: Box::new(TransportError::timeout("a", Duration::from_secs(1))),
        };
        assert!(!exhausted.is_retryable());
        assert!(exhausted.is_timeout());
        assert_eq!(exhausted.attempts(), Some(1));
    }
}
