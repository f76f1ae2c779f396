//! Proxy error handling with Sentry integration.
//!
//! Handlers return `Result<Response, ProxyError>`. Errors become JSON bodies
//! of the form `{"error": "..."}`; the CORS layer wraps them like any other
//! response so browsers can read them.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Errors produced while forwarding a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The upstream could not be reached or its body could not be read.
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// `/api/forward` was called without a `path` parameter.
    #[error("Missing required query parameter: path")]
    MissingPath,

    /// The requested path cannot be joined onto the upstream base URL.
    #[error("Invalid upstream path: {0}")]
    InvalidPath(String),

    /// No webhook backend is configured.
    #[error("Webhook forwarding is not configured")]
    WebhookNotConfigured,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::MissingPath | Self::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Self::WebhookNotConfigured => StatusCode::NOT_FOUND,
        };

        if matches!(self, Self::Upstream(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Upstream unreachable"
            );
        } else {
            tracing::warn!(error = %self, "Rejected proxy request");
        }

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Result type alias for `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_error_display() {
        assert_eq!(
            ProxyError::MissingPath.to_string(),
            "Missing required query parameter: path"
        );
        assert_eq!(
            ProxyError::InvalidPath("//x".to_string()).to_string(),
            "Invalid upstream path: //x"
        );
    }

    #[test]
    fn test_proxy_error_status_codes() {
        fn get_status(err: ProxyError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(get_status(ProxyError::MissingPath), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(ProxyError::InvalidPath(String::new())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(ProxyError::WebhookNotConfigured),
            StatusCode::NOT_FOUND
        );
    }
}
