//! Application context: schema registry plus transport.
//!
//! The [`Context`] is the explicit registry object of this client: it owns
//! the [`HttpClient`] and the [`SchemaRegistry`], and every
//! [`Resource`](crate::records::Resource) and
//! [`Collection`](crate::records::Collection) holds an `Arc` to it. Build
//! one per process at startup and pass it to the factory methods below;
//! there is no module-level state.
//!
//! # Example
//!
//! ```rust,no_run
//! use specimen_api::{ApiConfig, HostUrl};
//! use specimen_api::records::Context;
//! use specimen_api::schema::{EntityType, Field, SchemaRegistry};
//!
//! let config = ApiConfig::builder()
//!     .host(HostUrl::new("https://collections.example.org").unwrap())
//!     .build()
//!     .unwrap();
//!
//! let schema = SchemaRegistry::builder()
//!     .entity(EntityType::new("Agent", 5).field(Field::scalar("LastName")))
//!     .build();
//!
//! let context = Context::new(&config, schema);
//! let agent = context.new_record("Agent").unwrap();
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::clients::HttpClient;
use crate::config::ApiConfig;
use crate::records::collection::Collection;
use crate::records::errors::RecordError;
use crate::records::resource::Resource;
use crate::records::uri::parse_resource_uri;
use crate::schema::{EntityType, SchemaRegistry};

/// The shared application context.
///
/// Owns the HTTP transport and the schema registry. Construct once per
/// process; `Context::new` returns an `Arc` ready to be cloned into every
/// record handle.
#[derive(Debug)]
pub struct Context {
    http: HttpClient,
    schema: SchemaRegistry,
    api_root: String,
}

// Verify Context is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Context>();
};

impl Context {
    /// Creates the context from a configuration and a schema registry.
    #[must_use]
    pub fn new(config: &ApiConfig, schema: SchemaRegistry) -> Arc<Self> {
        Arc::new(Self {
            http: HttpClient::new(config),
            schema,
            api_root: config.api_root().as_ref().to_string(),
        })
    }

    /// Returns the schema registry.
    #[must_use]
    pub const fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Returns the API root path.
    #[must_use]
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    pub(crate) const fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Looks up an entity type, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownEntity`] when the name is not in the
    /// registry.
    pub fn entity(&self, name: &str) -> Result<Arc<EntityType>, RecordError> {
        self.schema
            .get(name)
            .cloned()
            .ok_or_else(|| RecordError::UnknownEntity {
                name: name.to_string(),
            })
    }

    /// Creates a new, unsaved record of the given entity type.
    ///
    /// The record has no id, is unpopulated, and is marked as needing a
    /// save.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownEntity`] for an unregistered name.
    pub fn new_record(self: &Arc<Self>, entity: &str) -> Result<Resource, RecordError> {
        let entity = self.entity(entity)?;
        Ok(Resource::new_record(Arc::clone(self), entity))
    }

    /// Creates a record from an attribute payload.
    ///
    /// If the payload carries an id (directly or via a `resource_uri`
    /// field), the record is considered populated and clean; otherwise it
    /// is a new record needing a save. Inline relationship data in the
    /// payload is intercepted into the relationship cache.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownEntity`] for an unregistered name, or
    /// [`RecordError::BadPayload`] when `data` is not a JSON object.
    pub fn from_data(self: &Arc<Self>, entity: &str, data: Value) -> Result<Resource, RecordError> {
        let entity = self.entity(entity)?;
        Resource::from_data(Arc::clone(self), entity, data)
    }

    /// Creates an unpopulated record handle from a resource URI.
    ///
    /// The id is taken from the URI; the fields stay empty until the first
    /// fetch.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::BadUri`] when the URI does not end in an
    /// entity/id pair, or [`RecordError::UnknownEntity`] when the entity
    /// segment is not registered.
    pub fn from_uri(self: &Arc<Self>, uri: &str) -> Result<Resource, RecordError> {
        let (entity_name, id) =
            parse_resource_uri(uri).ok_or_else(|| RecordError::BadUri {
                uri: uri.to_string(),
            })?;
        let entity = self.entity(&entity_name)?;
        Ok(Resource::from_id(Arc::clone(self), entity, id))
    }

    /// Creates a standalone filtered collection of the given entity type.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownEntity`] for an unregistered name.
    pub fn query(
        self: &Arc<Self>,
        entity: &str,
        filters: HashMap<String, String>,
    ) -> Result<Collection, RecordError> {
        let entity = self.entity(entity)?;
        Ok(Collection::filtered(Arc::clone(self), entity, filters))
    }
}
