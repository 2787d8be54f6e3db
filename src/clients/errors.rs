//! HTTP-specific error types.
//!
//! This module contains error types for HTTP operations, including response
//! errors, retry exhaustion, and request validation failures.
//!
//! All variants are `Clone`: a single in-flight request may be awaited by
//! several callers through a shared future, and each waiter receives the
//! same error value. Non-clonable sources (`reqwest::Error`) are held
//! behind an `Arc`.
//!
//! # Example
//!
//! ```rust,ignore
//! use specimen_api::clients::{HttpClient, HttpRequest, HttpMethod, HttpError};
//!
//! match client.request(request).await {
//!     Ok(response) => println!("Success: {}", response.body),
//!     Err(HttpError::Response(e)) => {
//!         println!("API error {}: {}", e.code, e.message);
//!     }
//!     Err(HttpError::MaxRetries(e)) => {
//!         println!("Retries exhausted after {} tries", e.tries);
//!     }
//!     Err(HttpError::InvalidRequest(e)) => {
//!         println!("Invalid request: {}", e);
//!     }
//!     Err(HttpError::Network(e)) => {
//!         println!("Network error: {}", e);
//!     }
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

/// Error returned when an HTTP request receives a non-successful response.
///
/// The message field carries the serialized error body returned by the
/// server, when one was present.
#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct HttpResponseError {
    /// The HTTP status code of the response.
    pub code: u16,
    /// Serialized error message from the response body.
    pub message: String,
}

/// Error returned when maximum retry attempts have been exhausted.
///
/// Raised when a request continues to fail with 429 or 500 responses after
/// all configured retry attempts have been made.
#[derive(Debug, Error, Clone)]
#[error("Exceeded maximum retry count of {tries}. Last message: {message}")]
pub struct MaxHttpRetriesExceededError {
    /// The HTTP status code of the last response.
    pub code: u16,
    /// The number of tries that were attempted.
    pub tries: u32,
    /// Serialized error message from the last response.
    pub message: String,
}

/// Error returned when an HTTP request fails validation before sending.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidHttpRequestError {
    /// A body was provided without a body type.
    #[error("Request body provided without a body type")]
    MissingBodyType,

    /// A POST or PUT request was built without a body.
    #[error("HTTP method {method} requires a request body")]
    MissingBody {
        /// The method that required a body.
        method: String,
    },
}

/// Unified error type for HTTP operations.
#[derive(Debug, Error, Clone)]
pub enum HttpError {
    /// A non-2xx response was received.
    #[error(transparent)]
    Response(#[from] HttpResponseError),

    /// Retry attempts were exhausted.
    #[error(transparent)]
    MaxRetries(#[from] MaxHttpRetriesExceededError),

    /// The request failed validation before being sent.
    #[error(transparent)]
    InvalidRequest(#[from] InvalidHttpRequestError),

    /// A network-level error occurred (connection, TLS, timeout).
    #[error("network error: {0}")]
    Network(#[source] Arc<reqwest::Error>),
}

impl From<reqwest::Error> for HttpError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(Arc::new(error))
    }
}

// Verify HttpError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HttpError>();
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_error_displays_message() {
        let error = HttpResponseError {
            code: 404,
            message: r#"{"error":"Not found"}"#.to_string(),
        };
        assert!(error.to_string().contains("Not found"));
    }

    #[test]
    fn test_max_retries_error_includes_tries() {
        let error = MaxHttpRetriesExceededError {
            code: 429,
            tries: 3,
            message: "rate limited".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains('3'));
        assert!(message.contains("rate limited"));
    }

    #[test]
    fn test_invalid_request_missing_body_names_method() {
        let error = InvalidHttpRequestError::MissingBody {
            method: "post".to_string(),
        };
        assert!(error.to_string().contains("post"));
    }

    #[test]
    fn test_http_error_is_cloneable() {
        let error = HttpError::Response(HttpResponseError {
            code: 500,
            message: "boom".to_string(),
        });
        let cloned = error.clone();
        assert!(matches!(cloned, HttpError::Response(e) if e.code == 500));
    }

    #[test]
    fn test_all_variants_implement_std_error() {
        let response: &dyn std::error::Error = &HttpError::Response(HttpResponseError {
            code: 400,
            message: "test".to_string(),
        });
        let _ = response;

        let invalid: &dyn std::error::Error =
            &HttpError::InvalidRequest(InvalidHttpRequestError::MissingBodyType);
        let _ = invalid;
    }
}
