//! Validated newtype wrappers for configuration values.
//!
//! This module provides type-safe wrappers around string values that validate
//! their contents on construction. Invalid values are rejected with clear
//! error messages.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated server host URL.
///
/// The URL must be absolute (`http://` or `https://`). Any trailing slash is
/// stripped so the value can be concatenated with request paths directly.
///
/// # Example
///
/// ```rust
/// use specimen_api::HostUrl;
///
/// let host = HostUrl::new("https://collections.example.org/").unwrap();
/// assert_eq!(host.as_ref(), "https://collections.example.org");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostUrl(String);

impl HostUrl {
    /// Creates a new validated host URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHostUrl`] if the value is empty or is
    /// not an absolute http(s) URL.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        let trimmed = url.trim_end_matches('/');
        if trimmed.is_empty()
            || !(trimmed.starts_with("http://") || trimmed.starts_with("https://"))
        {
            return Err(ConfigError::InvalidHostUrl { url });
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl AsRef<str> for HostUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for HostUrl {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<HostUrl> for String {
    fn from(value: HostUrl) -> Self {
        value.0
    }
}

/// A validated API root path.
///
/// This is the path prefix under which all record endpoints live, e.g.
/// `/api/records` for URLs of the shape `/api/records/collectionobject/17/`.
/// The value is normalized to start with `/` and carry no trailing slash.
///
/// # Example
///
/// ```rust
/// use specimen_api::ApiRoot;
///
/// let root = ApiRoot::new("/api/records/").unwrap();
/// assert_eq!(root.as_ref(), "/api/records");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiRoot(String);

impl ApiRoot {
    /// Creates a new validated API root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidApiRoot`] if the value does not start
    /// with `/` or is only slashes.
    pub fn new(root: impl Into<String>) -> Result<Self, ConfigError> {
        let root = root.into();
        let trimmed = root.trim_end_matches('/');
        if trimmed.is_empty() || !trimmed.starts_with('/') {
            return Err(ConfigError::InvalidApiRoot { root });
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl AsRef<str> for ApiRoot {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApiRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ApiRoot {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiRoot> for String {
    fn from(value: ApiRoot) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_url_accepts_https() {
        let host = HostUrl::new("https://db.example.org").unwrap();
        assert_eq!(host.as_ref(), "https://db.example.org");
    }

    #[test]
    fn test_host_url_strips_trailing_slash() {
        let host = HostUrl::new("http://localhost:8000/").unwrap();
        assert_eq!(host.as_ref(), "http://localhost:8000");
    }

    #[test]
    fn test_host_url_rejects_relative() {
        assert!(matches!(
            HostUrl::new("db.example.org"),
            Err(ConfigError::InvalidHostUrl { .. })
        ));
    }

    #[test]
    fn test_host_url_rejects_empty() {
        assert!(HostUrl::new("").is_err());
        assert!(HostUrl::new("/").is_err());
    }

    #[test]
    fn test_api_root_normalizes_trailing_slash() {
        let root = ApiRoot::new("/api/records/").unwrap();
        assert_eq!(root.as_ref(), "/api/records");
    }

    #[test]
    fn test_api_root_rejects_relative() {
        assert!(matches!(
            ApiRoot::new("api/records"),
            Err(ConfigError::InvalidApiRoot { .. })
        ));
    }

    #[test]
    fn test_api_root_rejects_bare_slash() {
        assert!(ApiRoot::new("/").is_err());
        assert!(ApiRoot::new("///").is_err());
    }

    #[test]
    fn test_host_url_serde_round_trip() {
        let host = HostUrl::new("https://db.example.org").unwrap();
        let json = serde_json::to_string(&host).unwrap();
        let back: HostUrl = serde_json::from_str(&json).unwrap();
        assert_eq!(host, back);
    }
}
