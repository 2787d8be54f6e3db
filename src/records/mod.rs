//! Record and collection binding for the record API.
//!
//! This module is the heart of the crate: a client-side binding layer that
//! models server records as lazily populated, dependency-aware objects.
//!
//! - **[`Context`]**: the explicit application registry (schema plus
//!   transport), constructed once per process and shared by every handle.
//! - **[`Resource`]**: one record; case-insensitive attribute access,
//!   relationship caching with back-references, single-flight fetch/save,
//!   dotted-path traversal (`rget`), and the three-stage cascading save
//!   (`rsave`).
//! - **[`Collection`]**: an ordered, optionally windowed group of records,
//!   standalone or bound to a parent's relationship field.
//! - **[`RecordEvent`]**: typed change events with dotted-path payloads
//!   bubbling through the relation graph.
//!
//! # Example
//!
//! ```rust,ignore
//! use specimen_api::records::Context;
//!
//! let context = Context::new(&config, schema);
//!
//! // traverse relationships by dotted path
//! let record = context.from_uri("/api/records/collectionobject/100/")?;
//! let last_name = record.rget_value("cataloger.lastname").await?;
//!
//! // build a graph locally and save it in one cascade
//! let object = context.new_record("CollectionObject")?;
//! let determination = context.new_record("Determination")?;
//! object.rget_collection("determinations").await?.add(&determination);
//! determination.set("remarks", "cf. Quercus alba")?;
//! object.rsave().await?;
//! ```

mod collection;
mod context;
mod errors;
mod events;
mod resource;
pub mod uri;

pub use collection::{Collection, FetchOptions, DEFAULT_PAGE_SIZE};
pub use context::Context;
pub use errors::RecordError;
pub use events::RecordEvent;
pub use resource::{RelatedValue, Resource};
