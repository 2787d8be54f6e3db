//! # Specimen API Client
//!
//! A Rust client for museum collection-management REST APIs: records are
//! modeled as lazily populated, dependency-aware objects with relationship
//! traversal, caching, typed change events, and cascading save semantics
//! mirroring server-side business rules.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`ApiConfig`] and its builder
//! - A schema registry describing entity types and their relationships
//! - [`records::Resource`]: a single record with case-insensitive attribute
//!   access, single-flight fetch/save, and dotted-path relationship
//!   traversal (`rget`)
//! - [`records::Collection`]: paginated, optionally windowed groups of
//!   records
//! - Cascading saves (`rsave`) that persist a related-object graph in
//!   dependency order, inlining dependent data into one request
//! - Typed change events bubbling through the relation graph
//! - An async HTTP client with opt-in retry handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use specimen_api::{ApiConfig, HostUrl};
//! use specimen_api::records::Context;
//! use specimen_api::schema::{EntityType, Field, Relationship, RelationshipKind, SchemaRegistry};
//!
//! // Configuration via the builder pattern
//! let config = ApiConfig::builder()
//!     .host(HostUrl::new("https://collections.example.org").unwrap())
//!     .build()
//!     .unwrap();
//!
//! // The schema registry is external metadata describing the data model
//! let schema = SchemaRegistry::builder()
//!     .entity(
//!         EntityType::new("CollectionObject", 1)
//!             .field(Field::scalar("CatalogNumber"))
//!             .field(Field::related(
//!                 "Cataloger",
//!                 Relationship::new(RelationshipKind::ManyToOne, "Agent"),
//!             )),
//!     )
//!     .entity(EntityType::new("Agent", 5).field(Field::scalar("LastName")))
//!     .build();
//!
//! // One context per process; every record handle shares it
//! let context = Context::new(&config, schema);
//! ```
//!
//! ## Working with Records
//!
//! ```rust,ignore
//! // An unpopulated handle: id known, fields loaded on first use
//! let object = context.from_uri("/api/records/collectionobject/100/")?;
//!
//! // Dotted-path traversal fetches lazily, one request per uncached hop
//! let cataloger = object.rget_record("cataloger").await?;
//! let last_name = object.rget_value("cataloger.lastname").await?;
//!
//! // Edits mark the record dirty and emit typed change events
//! object.set("catalognumber", "1887-0042")?;
//! assert!(object.needs_saved());
//!
//! // rsave persists the graph: independent to-one relations first, then
//! // this record (dependent data inlined), then to-many relations
//! object.rsave().await?;
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: the schema registry and transport live in an
//!   explicit [`records::Context`] constructed once per process
//! - **Fail-fast validation**: configuration newtypes validate on
//!   construction; state-contract violations reject immediately
//! - **Single-flight**: at most one outstanding fetch and one outstanding
//!   save per record: concurrent fetches share one request, concurrent
//!   saves are a caller error
//! - **Thread-safe**: all handles are `Send + Sync`
//! - **Async-first**: designed for use with the Tokio runtime

pub mod clients;
pub mod config;
pub mod error;
pub mod records;
pub mod schema;

// Re-export public types at crate root for convenience
pub use config::{ApiConfig, ApiConfigBuilder, ApiRoot, HostUrl};
pub use error::ConfigError;

// Re-export HTTP client types
pub use clients::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpRequestBuilder, HttpResponse,
    HttpResponseError, InvalidHttpRequestError, MaxHttpRetriesExceededError,
};

// Re-export the record binding core
pub use records::{Collection, Context, FetchOptions, RecordError, RecordEvent, Resource};
