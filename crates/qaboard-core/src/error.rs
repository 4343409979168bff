//! Error types for qaboard Core
//!
//! Every failure handed to the collaborator layer is a [`ClientError`] with a
//! stable [`ErrorKind`] and human-readable text:
//! - caller input rejected before any transport call
//! - transport exhausted its retries
//! - the far side answered with an error
//! - durable storage or session problems

use qaboard_transport::normalize::GENERIC_FAILURE;
use qaboard_transport::TransportError;
use std::fmt;
use std::path::PathBuf;

/// Main client error type
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Malformed caller input; no transport call was made
    #[error("validation failed: {0}")]
    Validation(String),

    /// Transport gave up
    #[error(transparent)]
    Network(#[from] TransportError),

    /// Well-formed error answer from the far side
    #[error("{message}")]
    Remote {
        /// Server-provided or domain fallback text
        message: String,
    },

    /// Durable storage failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Session missing, expired or incomplete
    #[error("session error: {0}")]
    Session(String),

    /// Success payload did not have the expected shape
    #[error("unexpected response shape: {0}")]
    Decode(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Create validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create remote error
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Remote error, substituting `fallback` when the far side gave no reason
    pub fn remote_or(message: impl Into<String>, fallback: &str) -> Self {
        let message = message.into();
        if message.is_empty() || message == GENERIC_FAILURE {
            Self::remote(fallback)
        } else {
            Self::Remote { message }
        }
    }

    /// Stable classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Network(err) => match err {
                TransportError::InvalidRequest(_) => ErrorKind::Validation,
                TransportError::Configuration(_) => ErrorKind::Config,
                TransportError::Channel { .. } => ErrorKind::ChannelError,
                TransportError::Timeout { .. } => ErrorKind::TimeoutError,
                TransportError::Exhausted { .. } => ErrorKind::NetworkExhausted,
            },
            Self::Remote { .. } => ErrorKind::RemoteError,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Session(_) => ErrorKind::Session,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Check if a stale-cache fallback may stand in for this failure
    #[inline]
    #[must_use]
    pub fn allows_stale_fallback(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NetworkExhausted | ErrorKind::ChannelError | ErrorKind::TimeoutError
        )
    }
}

/// Stable error classification for collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed caller input
    Validation,
    /// Channel failed to deliver
    ChannelError,
    /// No response in time
    TimeoutError,
    /// Retries exhausted
    NetworkExhausted,
    /// Far side reported an error
    RemoteError,
    /// Durable storage failure
    Storage,
    /// Session problem
    Session,
    /// Unexpected payload shape
    Decode,
    /// Bad configuration
    Config,
}

impl ErrorKind {
    /// Stable name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::ChannelError => "channel_error",
            Self::TimeoutError => "timeout_error",
            Self::NetworkExhausted => "network_exhausted",
            Self::RemoteError => "remote_error",
            Self::Storage => "storage",
            Self::Session => "session",
            Self::Decode => "decode",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// IO error on the backing file
    #[error("io error on {path}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying IO failure
        #[source]
        source: std::io::Error,
    },

    /// Backing document is not valid JSON
    #[error("corrupt store {path}: {reason}")]
    Corrupt {
        /// Backing file
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Record could not be encoded
    #[error("cannot encode record '{record}': {reason}")]
    Encode {
        /// Record name
        record: String,
        /// Serializer message
        reason: String,
    },
}

impl StorageError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
