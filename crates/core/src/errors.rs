//! Error types shared across the liveness subsystem.

use thiserror::Error;

/// Result type alias for liveness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the liveness subsystem.
///
/// The taxonomy matters more than the payload: transport errors are retried
/// by the next poll cycle, auth errors are surfaced as configuration
/// problems, and presentation errors never abort a state update.
#[derive(Debug, Error)]
pub enum Error {
    /// Local persistence failure
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network unreachable, timeout, connection reset
    #[error("transport error: {0}")]
    Transport(String),

    /// Missing or rejected API key
    #[error("authentication error: {0}")]
    Auth(String),

    /// Non-success response from the check-in server
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Request could not be built or validated locally
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// OS notification/sound subsystem failure
    #[error("presentation error: {0}")]
    Presentation(String),
}

impl Error {
    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a presentation error
    pub fn presentation(message: impl Into<String>) -> Self {
        Self::Presentation(message.into())
    }

    /// True for failures the next poll cycle is expected to absorb.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_)) || matches!(self, Self::Api { status, .. } if matches!(status, 408 | 429 | 500..=599))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_transient() {
        assert!(Error::transport("connection refused").is_transient());
        assert!(Error::api(503, "unavailable").is_transient());
    }

    #[test]
    fn auth_errors_are_not_transient() {
        assert!(!Error::auth("bad key").is_transient());
        assert!(!Error::api(404, "unknown checker").is_transient());
    }
}
