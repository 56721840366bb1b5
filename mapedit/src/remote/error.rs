//! Remote failure taxonomy.

use thiserror::Error;

/// Failures from the remote feature service.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Transport-level failure. Transient variants are retried with backoff.
    #[error("network error: {message}")]
    Network {
        /// Human-readable cause.
        message: String,
        /// Whether retrying can reasonably succeed.
        transient: bool,
    },

    /// The service rejected a commit because of concurrent modification.
    /// Surfaced to the caller without retry; local state stays dirty.
    #[error("commit conflict: {0}")]
    Conflict(String),

    /// The service rejected malformed payload. Not retried.
    #[error("validation rejected: {0}")]
    Validation(String),

    /// A resolved fetch belonged to a superseded provider epoch. Never
    /// surfaced to callers; the result is silently discarded.
    #[error("stale epoch")]
    Cancelled,
}

impl RemoteError {
    /// Creates a transient network error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            transient: true,
        }
    }

    /// Creates a permanent network error.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            transient: false,
        }
    }

    /// Returns true if a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network {
                transient: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RemoteError::transient("timeout").is_transient());
        assert!(!RemoteError::permanent("dns").is_transient());
        assert!(!RemoteError::Conflict("version".into()).is_transient());
        assert!(!RemoteError::Validation("bad geometry".into()).is_transient());
        assert!(!RemoteError::Cancelled.is_transient());
    }

    #[test]
    fn test_display() {
        let err = RemoteError::transient("connection reset");
        assert!(err.to_string().contains("connection reset"));
    }
}
