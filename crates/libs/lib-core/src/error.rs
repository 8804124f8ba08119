//! # Centralized Error Handling
//!
//! This module defines the application-wide error type [`AppError`] used consistently
//! across the gateway, the collection cache, the trending aggregator, the search
//! controller, and the proxy server. It follows the `thiserror` pattern.
//!
//! ## Design Philosophy
//!
//! - **Single Error Type**: All crates use `AppError` for consistency
//! - **Cloneable**: A single in-flight request hands the *same* error to every waiter
//! - **HTTP Mapping**: Errors map naturally to HTTP status codes
//!
//! ## Error Categories
//!
//! 1. **Client Errors** (4xx)
//!    - [`InvalidInput`](AppError::InvalidInput) → 400 Bad Request
//!    - [`NotFound`](AppError::NotFound) → 404 Not Found
//!    - [`MethodNotAllowed`](AppError::MethodNotAllowed) → 405 Method Not Allowed
//!
//! 2. **Upstream Errors** - the marketplace API or search backend answered non-2xx
//!    - [`Upstream`](AppError::Upstream) → the upstream status, preserved verbatim
//!
//! 3. **Transient Errors** - retried close to their source
//!    - [`Network`](AppError::Network) → 502 Bad Gateway
//!    - [`Timeout`](AppError::Timeout) → 504 Gateway Timeout
//!
//! 4. **Terminal Errors**
//!    - [`Unavailable`](AppError::Unavailable) → 503 after retries are exhausted
//!    - [`Decoding`](AppError::Decoding) → 502 (malformed upstream payload)
//!    - [`Config`](AppError::Config) / [`Internal`](AppError::Internal) → 500
//!
//! 5. **Cancellation**
//!    - [`Cancelled`](AppError::Cancelled) is never shown to a user.
//!
//! ## Usage Example
//!
//! ```rust
//! use lib_core::error::{AppError, Result};
//!
//! fn parse_page(raw: &str) -> Result<u32> {
//!     raw.parse()
//!         .map_err(|_| AppError::InvalidInput(format!("page must be a number, got '{}'", raw)))
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::dto::ErrorResponse;

/// Convenience type alias for `Result<T, AppError>`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application-wide error type covering all error scenarios.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AppError {
    /// Configuration error during startup or environment loading.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Only read-only (GET) requests are forwarded upstream.
    #[error("Method not supported: {0}")]
    MethodNotAllowed(String),

    /// Upstream answered with a non-2xx status.
    ///
    /// `message` is a one-line summary, `details` carries the upstream body verbatim.
    #[error("{message}")]
    Upstream {
        status: u16,
        message: String,
        details: String,
    },

    /// Connection-level failure (DNS, refused, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Response body could not be decoded into the expected shape.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// The caller cancelled the operation.
    #[error("Request cancelled")]
    Cancelled,

    /// Retries exhausted against a transiently failing upstream.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal error (unexpected failures).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build an [`AppError::Upstream`] from a status code and raw response body.
    pub fn upstream(service: &str, status: StatusCode, body: impl Into<String>) -> Self {
        AppError::Upstream {
            status: status.as_u16(),
            message: format!(
                "{} API error: {} {}",
                service,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ),
            details: body.into(),
        }
    }

    /// Upstream HTTP status carried by this error, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_)) || self.upstream_status() == Some(404)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.upstream_status() == Some(429)
    }

    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// 429, 5xx, network failures and timeouts are transient; everything else
    /// (404, other 4xx, decode errors, cancellation) is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Upstream { status, .. } => *status == 429 || *status >= 500,
            AppError::Network(_) | AppError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Network(_) | AppError::Decoding(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            // nginx's "client closed request"
            AppError::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message.
    ///
    /// For internal errors, returns a generic message to avoid exposing implementation details.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidInput(msg) | AppError::NotFound(msg) => msg.clone(),
            AppError::MethodNotAllowed(_) => "Method not allowed".to_string(),
            AppError::Upstream { message, .. } => message.clone(),
            AppError::Network(_) => {
                "Unable to reach the server. Please check your connection.".to_string()
            }
            AppError::Timeout(_) => "The request timed out. Please try again.".to_string(),
            AppError::Decoding(_) => "Received an unexpected response from the server".to_string(),
            AppError::Unavailable(_) => "Service temporarily unavailable".to_string(),
            AppError::Cancelled => "Request cancelled".to_string(),
            AppError::Config(_) | AppError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    /// The `{error, details}` body sent to HTTP clients.
    pub fn to_error_response(&self) -> ErrorResponse {
        let details = match self {
            AppError::Upstream { details, .. } => details.clone(),
            other => other.to_string(),
        };
        ErrorResponse {
            error: self.user_message(),
            details: Some(details),
        }
    }
}

/// Implement Axum's `IntoResponse` for automatic error handling.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Server error: {}", self);
        } else {
            tracing::debug!("Client error: {}", self);
        }

        (status, Json(self.to_error_response())).into_response()
    }
}

/// Convert `reqwest::Error` to `AppError`.
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else if err.is_decode() {
            AppError::Decoding(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

/// Convert `serde_json::Error` to `AppError`.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decoding(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_preserves_status_and_body() {
        let err = AppError::upstream("Magic Eden", StatusCode::NOT_FOUND, "{\"msg\":\"nope\"}");
        assert_eq!(err.upstream_status(), Some(404));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Magic Eden API error: 404 Not Found");
        assert!(err.is_not_found());

        let body = err.to_error_response();
        assert_eq!(body.error, "Magic Eden API error: 404 Not Found");
        assert_eq!(body.details.as_deref(), Some("{\"msg\":\"nope\"}"));
    }

    #[test]
    fn test_retry_classification() {
        assert!(AppError::upstream("x", StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(AppError::upstream("x", StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(AppError::Network("reset".into()).is_retryable());
        assert!(AppError::Timeout("10s".into()).is_retryable());

        assert!(!AppError::upstream("x", StatusCode::NOT_FOUND, "").is_retryable());
        assert!(!AppError::upstream("x", StatusCode::BAD_REQUEST, "").is_retryable());
        assert!(!AppError::Cancelled.is_retryable());
        assert!(!AppError::Decoding("bad json".into()).is_retryable());
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = AppError::Internal("mutex poisoned at foo.rs:12".into());
        assert_eq!(err.user_message(), "An internal error occurred");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_method_not_allowed_maps_to_405() {
        let err = AppError::MethodNotAllowed("POST".into());
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.to_error_response().error, "Method not allowed");
    }

    #[test]
    fn test_serde_json_error_converts_to_decoding() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Decoding(_)));
    }
}
