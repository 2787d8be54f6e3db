//! Configuration types for the client.
//!
//! This module provides the core configuration types used to initialize
//! the client for communication with a collection-management server.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`ApiConfig`]: The main configuration struct holding all client settings
//! - [`ApiConfigBuilder`]: A builder for constructing [`ApiConfig`] instances
//! - [`HostUrl`]: A validated server host URL
//! - [`ApiRoot`]: A validated API root path
//!
//! # Example
//!
//! ```rust
//! use specimen_api::{ApiConfig, HostUrl};
//!
//! let config = ApiConfig::builder()
//!     .host(HostUrl::new("https://collections.example.org").unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.api_root().as_ref(), "/api/records");
//! ```

mod newtypes;

pub use newtypes::{ApiRoot, HostUrl};

use crate::error::ConfigError;

/// Default API root used when the builder is not given one explicitly.
pub const DEFAULT_API_ROOT: &str = "/api/records";

/// Configuration for the client.
///
/// This struct holds everything needed to reach the server: the host URL,
/// the API root under which record endpoints live, and an optional
/// user-agent prefix for identifying the embedding application.
///
/// # Thread Safety
///
/// `ApiConfig` is `Clone`, `Send`, and `Sync`, making it safe to share
/// across threads and async tasks.
///
/// # Example
///
/// ```rust
/// use specimen_api::{ApiConfig, ApiRoot, HostUrl};
///
/// let config = ApiConfig::builder()
///     .host(HostUrl::new("https://collections.example.org").unwrap())
///     .api_root(ApiRoot::new("/api/v2").unwrap())
///     .user_agent_prefix("herbarium-frontend")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct ApiConfig {
    host: HostUrl,
    api_root: ApiRoot,
    user_agent_prefix: Option<String>,
}

// Verify ApiConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ApiConfig>();
};

impl ApiConfig {
    /// Creates a new builder for constructing an `ApiConfig`.
    #[must_use]
    pub fn builder() -> ApiConfigBuilder {
        ApiConfigBuilder::new()
    }

    /// Returns the server host URL.
    #[must_use]
    pub const fn host(&self) -> &HostUrl {
        &self.host
    }

    /// Returns the API root path.
    #[must_use]
    pub const fn api_root(&self) -> &ApiRoot {
        &self.api_root
    }

    /// Returns the user-agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }
}

/// Builder for constructing [`ApiConfig`] instances.
///
/// Provides a fluent API for building configurations with optional settings.
#[derive(Debug, Default)]
pub struct ApiConfigBuilder {
    host: Option<HostUrl>,
    api_root: Option<ApiRoot>,
    user_agent_prefix: Option<String>,
}

impl ApiConfigBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Sets the server host URL. Required.
    #[must_use]
    pub fn host(mut self, host: HostUrl) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the API root path.
    ///
    /// Defaults to [`DEFAULT_API_ROOT`] when not provided.
    #[must_use]
    pub fn api_root(mut self, api_root: ApiRoot) -> Self {
        self.api_root = Some(api_root);
        self
    }

    /// Sets a user-agent prefix identifying the embedding application.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Builds the [`ApiConfig`], validating required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] if no host was provided.
    pub fn build(self) -> Result<ApiConfig, ConfigError> {
        let host = self.host.ok_or(ConfigError::MissingField { field: "host" })?;
        let api_root = match self.api_root {
            Some(root) => root,
            None => ApiRoot::new(DEFAULT_API_ROOT)?,
        };
        Ok(ApiConfig {
            host,
            api_root,
            user_agent_prefix: self.user_agent_prefix,
        })
    }
}
