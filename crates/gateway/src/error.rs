//! Error types for the gateway crate.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Retry policy class for API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Errors that can occur talking to the check-in server.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error response from the server
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (missing required data, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication error (missing or invalid API key)
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl GatewayError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> ApiRetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => ApiRetryClass::ReauthRequired,
                408 | 429 => ApiRetryClass::Retryable,
                500..=599 => ApiRetryClass::Retryable,
                _ => ApiRetryClass::Permanent,
            },
            Self::Http(_) => ApiRetryClass::Retryable,
            Self::Json(_) => ApiRetryClass::Permanent,
            Self::InvalidRequest(_) => ApiRetryClass::Permanent,
            Self::Auth(_) => ApiRetryClass::ReauthRequired,
        }
    }
}

impl From<GatewayError> for vigil_core::errors::Error {
    fn from(err: GatewayError) -> Self {
        use vigil_core::errors::Error;
        match err {
            GatewayError::Api { status: 401, message } | GatewayError::Api { status: 403, message } => {
                Error::auth(message)
            }
            GatewayError::Api { status, message } => Error::api(status, message),
            GatewayError::Http(e) => Error::transport(e.to_string()),
            GatewayError::Json(e) => Error::Json(e),
            GatewayError::InvalidRequest(message) => Error::InvalidRequest(message),
            GatewayError::Auth(message) => Error::auth(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_class_for_auth_status_is_reauth() {
        assert_eq!(
            GatewayError::api(401, "unauthorized").retry_class(),
            ApiRetryClass::ReauthRequired
        );
        assert_eq!(
            GatewayError::api(403, "forbidden").retry_class(),
            ApiRetryClass::ReauthRequired
        );
    }

    #[test]
    fn retry_class_for_server_errors_is_retryable() {
        assert_eq!(
            GatewayError::api(503, "unavailable").retry_class(),
            ApiRetryClass::Retryable
        );
        assert_eq!(
            GatewayError::api(429, "slow down").retry_class(),
            ApiRetryClass::Retryable
        );
    }

    #[test]
    fn retry_class_for_client_errors_is_permanent() {
        assert_eq!(
            GatewayError::api(404, "unknown checker").retry_class(),
            ApiRetryClass::Permanent
        );
        assert_eq!(
            GatewayError::invalid_request("empty checker id").retry_class(),
            ApiRetryClass::Permanent
        );
    }

    #[test]
    fn auth_statuses_convert_to_core_auth_errors() {
        let core: vigil_core::errors::Error = GatewayError::api(401, "bad key").into();
        assert!(matches!(core, vigil_core::errors::Error::Auth(_)));

        let core: vigil_core::errors::Error = GatewayError::api(500, "boom").into();
        assert!(core.is_transient());
    }
}
