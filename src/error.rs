//! Error types for client configuration.
//!
//! This module contains error types used for configuration and validation
//! errors raised while constructing an [`ApiConfig`](crate::config::ApiConfig).
//!
//! # Error Handling
//!
//! All configuration constructors return `Result<T, ConfigError>` to enable
//! fail-fast validation. Error messages are designed to be clear and actionable.
//!
//! # Example
//!
//! ```rust
//! use specimen_api::{ConfigError, HostUrl};
//!
//! let result = HostUrl::new("not-a-url");
//! assert!(matches!(result, Err(ConfigError::InvalidHostUrl { .. })));
//! ```

use thiserror::Error;

/// Errors that can occur during client configuration.
///
/// This enum represents all possible errors that can occur when creating
/// or validating configuration types. Each variant provides a clear,
/// actionable error message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Host URL is missing or malformed.
    #[error("Invalid host URL '{url}'. Expected an absolute http:// or https:// URL.")]
    InvalidHostUrl {
        /// The invalid URL that was provided.
        url: String,
    },

    /// The API root path is malformed.
    #[error("Invalid API root '{root}'. Expected an absolute path such as '/api/records'.")]
    InvalidApiRoot {
        /// The invalid root that was provided.
        root: String,
    },

    /// A required configuration field was not provided to the builder.
    #[error("Missing required configuration field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_host_url_includes_value() {
        let error = ConfigError::InvalidHostUrl {
            url: "ftp://example.com".to_string(),
        };
        assert!(error.to_string().contains("ftp://example.com"));
    }

    #[test]
    fn test_missing_field_names_the_field() {
        let error = ConfigError::MissingField { field: "host" };
        assert!(error.to_string().contains("host"));
    }
}
