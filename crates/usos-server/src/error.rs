//! Error types for the HTTP server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use usos_oauth::{OAuthError, TransportError};
use usos_store::StoreError;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ServerError {
    /// No valid session identity.
    #[error("Authentication required")]
    Unauthenticated,

    /// Authenticated but lacking the admin role.
    #[error("Admin access required")]
    Forbidden,

    /// Requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request parameters are invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// USOS answered but the answer could not be used.
    #[error("USOS request failed: {0}")]
    BadGateway(String),

    /// USOS could not be reached.
    #[error("USOS unreachable: {0}")]
    UpstreamUnreachable(String),

    /// USOS did not answer in time.
    #[error("USOS request timed out")]
    UpstreamTimeout,

    /// Unexpected local failure; details are logged, not returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TransportError> for ServerError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::UpstreamTimeout,
            TransportError::Unreachable(message) => Self::UpstreamUnreachable(message),
        }
    }
}

impl From<OAuthError> for ServerError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::Transport(e) => e.into(),
            other => Self::BadGateway(other.to_string()),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                json!({"error": "Authentication required"}),
            ),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({"error": "Admin access required"}),
            ),
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({"error": "Not found", "details": what}),
            ),
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Bad request", "details": message}),
            ),
            Self::BadGateway(message) => (
                StatusCode::BAD_GATEWAY,
                json!({"error": "USOS request failed", "details": message}),
            ),
            Self::UpstreamUnreachable(message) => (
                StatusCode::BAD_GATEWAY,
                json!({"error": "USOS unreachable", "details": message}),
            ),
            Self::UpstreamTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                json!({"error": "USOS request timed out"}),
            ),
            Self::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Internal server error"}),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_mapping() {
        assert!(matches!(
            ServerError::from(TransportError::Timeout),
            ServerError::UpstreamTimeout
        ));
        assert!(matches!(
            ServerError::from(OAuthError::Transport(TransportError::Unreachable(
                "dns".to_owned()
            ))),
            ServerError::UpstreamUnreachable(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ServerError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (ServerError::Forbidden, StatusCode::FORBIDDEN),
            (ServerError::NotFound("x".to_owned()), StatusCode::NOT_FOUND),
            (
                ServerError::BadRequest("x".to_owned()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServerError::UpstreamUnreachable("x".to_owned()),
                StatusCode::BAD_GATEWAY,
            ),
            (ServerError::UpstreamTimeout, StatusCode::GATEWAY_TIMEOUT),
            (
                ServerError::Internal("x".to_owned()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
