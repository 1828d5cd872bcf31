//! Client error types

use serde::Deserialize;
use thiserror::Error;

/// Why a session could not be refreshed
///
/// Cloneable so every caller waiting on the same in-flight refresh receives
/// its own copy of the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    /// No refresh credential was stored
    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// The refresh endpoint answered with a non-success status
    #[error("refresh rejected with status {0}")]
    Rejected(u16),

    /// The refresh endpoint answered without a usable access token
    #[error("refresh response carried no access token")]
    MissingAccessToken,

    /// The refresh call never completed
    #[error("refresh request failed: {0}")]
    Transport(String),

    /// The refreshed token could not be persisted
    #[error("failed to store refreshed token: {0}")]
    Storage(String),
}

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The session ended because its credentials could not be refreshed
    #[error("Session expired: {0}")]
    SessionExpired(RefreshFailure),

    /// Login was refused by the token endpoint
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Server returned a non-success status; body is passed through verbatim
    #[error("Server error {status}: {message}")]
    Api {
        status: u16,
        message: String,
        body: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Token storage could not be read or written
    #[error("Token storage error: {0}")]
    Storage(String),
}

#[derive(Deserialize)]
struct DetailBody {
    #[serde(alias = "msg")]
    detail: String,
}

impl ClientError {
    /// Create error from HTTP status code and the raw response body
    ///
    /// The message prefers a DRF-style `detail` field, then the raw body, then
    /// the status reason.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        let message = error_detail(&body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.clone()
            }
        });

        Self::Api {
            status: status.as_u16(),
            message,
            body,
        }
    }

    /// Whether the caller has to log in again
    pub const fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::SessionExpired(_) | Self::Api { status: 401, .. }
        )
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Extract the `detail` (or `msg`) field from a JSON error payload
pub(crate) fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<DetailBody>(body)
        .ok()
        .map(|d| d.detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_prefers_detail() {
        let err = ClientError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"detail":"Project name is required"}"#.to_string(),
        );
        match err {
            ClientError::Api {
                status,
                message,
                body,
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Project name is required");
                assert!(body.contains("detail"));
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_status_falls_back_to_body_then_reason() {
        let err = ClientError::from_status(StatusCode::FORBIDDEN, "nope".to_string());
        assert!(matches!(err, ClientError::Api { ref message, .. } if message == "nope"));

        let err = ClientError::from_status(StatusCode::NOT_FOUND, String::new());
        assert!(matches!(err, ClientError::Api { ref message, .. } if message == "404 Not Found"));
    }

    #[test]
    fn test_is_auth_expired() {
        assert!(ClientError::SessionExpired(RefreshFailure::MissingRefreshToken).is_auth_expired());
        assert!(ClientError::from_status(StatusCode::UNAUTHORIZED, String::new()).is_auth_expired());
        assert!(!ClientError::from_status(StatusCode::BAD_REQUEST, String::new()).is_auth_expired());
        assert!(!ClientError::Configuration("x".into()).is_auth_expired());
    }
}
