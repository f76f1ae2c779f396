//! Request client errors.
//!
//! Every client operation catches failures at its own boundary and returns one
//! of these. The type is `Clone` because a coalesced request hands the same
//! result to every subscriber.

use thiserror::Error;

/// Message shown when an error carries nothing better.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors that can occur when talking to the commerce platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response was received from any channel (connection refused, DNS,
    /// TLS, or a browser-side CORS rejection).
    #[error(
        "Network error: {message}. The storefront API could not be reached; check the proxy and CORS configuration for this environment"
    )]
    Network {
        /// Transport error description.
        message: String,
    },

    /// The platform answered with a non-success HTTP status.
    #[error("Upstream returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body text (truncated).
        body: String,
    },

    /// The platform answered 2xx but flagged the request as failed in its
    /// envelope (`status_code` other than `"0"`).
    #[error("Request rejected ({code}): {message}")]
    Rejected {
        /// Envelope status code.
        code: String,
        /// Envelope message.
        message: String,
    },

    /// The response did not match any known envelope shape.
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// The operation needs a cart, and no cart identity is stored.
    #[error("No cart: add an item before checking out")]
    MissingCart,

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Text suitable for showing to a shopper.
    ///
    /// Prefers the platform's own message (envelope `message`, or a `message`
    /// field in an error body) and falls back to a generic sentence.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Status { body, .. } => body_message(body)
                .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string()),
            Self::Network { .. } => {
                "Could not reach the store. Check your connection and try again.".to_string()
            }
            Self::MissingCart => "Your cart is empty.".to_string(),
            Self::Rejected { .. } | Self::UnexpectedShape(_) | Self::InvalidRequest(_) => {
                GENERIC_ERROR_MESSAGE.to_string()
            }
        }
    }

    /// Whether this error came from a response the platform actually sent.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::Rejected { .. })
    }
}

/// Pull a `message` (or `error`) string out of a JSON error body.
fn body_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error", "msg"]
        .iter()
        .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        .filter(|m| !m.trim().is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display_keeps_code_and_body() {
        let err = ApiError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Upstream returned HTTP 500: boom");
        assert!(err.is_upstream());
    }

    #[test]
    fn test_network_error_hints_at_configuration() {
        let err = ApiError::Network {
            message: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("CORS configuration"));
        assert!(!err.is_upstream());
    }

    #[test]
    fn test_user_message_prefers_upstream_text() {
        let rejected = ApiError::Rejected {
            code: "1002".to_string(),
            message: "Postal code is invalid".to_string(),
        };
        assert_eq!(rejected.user_message(), "Postal code is invalid");

        let status = ApiError::Status {
            status: 422,
            body: r#"{"message":"Out of stock"}"#.to_string(),
        };
        assert_eq!(status.user_message(), "Out of stock");
    }

    #[test]
    fn test_user_message_falls_back_to_generic() {
        let status = ApiError::Status {
            status: 502,
            body: "<html>Bad Gateway</html>".to_string(),
        };
        assert_eq!(status.user_message(), GENERIC_ERROR_MESSAGE);

        let rejected = ApiError::Rejected {
            code: "9".to_string(),
            message: String::new(),
        };
        assert_eq!(rejected.user_message(), GENERIC_ERROR_MESSAGE);
    }
}
