//! A single record and its relationship cache.
//!
//! [`Resource`] is a cheaply clonable handle to one record of a named
//! entity type. It mediates all reads and writes to the record, tracks
//! population and dirty state, caches related records and collections by
//! relationship field name, and enforces the single-flight discipline on
//! fetch and save.
//!
//! # Field access
//!
//! Field names are case-insensitive; all reads and writes lowercase the
//! name. [`Resource::get`] returns the raw stored attribute (a scalar, a
//! foreign-key URI string, or nothing); use [`Resource::rget`] to resolve
//! relationships.
//!
//! # Relationship interception
//!
//! [`Resource::set`] inspects the schema descriptor of the field being
//! written. Inline relationship data (an embedded object or array) is never
//! stored in the attribute map; it is materialized into cached
//! [`Resource`]s/[`Collection`]s instead, with the attribute slot holding
//! the foreign-key URI where the schema puts one on this side.
//!
//! # Saving
//!
//! [`Resource::save`] persists this record alone. [`Resource::rsave`]
//! cascades over the cached relation graph in three stages: independent
//! to-one relations first (so their URIs can be embedded), then this record
//! with all dependent data gathered inline into its payload, then
//! independent collection-backed relations (which need this record's id).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, NaiveDateTime, Utc};
use futures::future::{try_join_all, BoxFuture, Shared};
use futures::FutureExt;
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;

use crate::clients::{DataType, HttpError, HttpMethod, HttpRequest};
use crate::records::collection::Collection;
use crate::records::context::Context;
use crate::records::errors::RecordError;
use crate::records::events::RecordEvent;
use crate::records::uri::{collection_uri, parse_resource_uri, resource_uri};
use crate::schema::{EntityType, Relationship, RelationshipKind};

/// Capacity of the per-record event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Attribute names the API layer writes on every record; not part of any
/// schema but never worth a warning.
const META_FIELDS: &[&str] = &["resource_uri", "version"];

type SharedFetch = Shared<BoxFuture<'static, Result<(), RecordError>>>;

/// A resolved value from a dotted-path traversal.
#[derive(Clone)]
pub enum RelatedValue {
    /// A scalar (or otherwise raw) attribute value.
    Data(Value),
    /// A single related record.
    Record(Resource),
    /// A related collection.
    Records(Collection),
}

impl RelatedValue {
    /// Returns the related record, if this value is one.
    #[must_use]
    pub fn into_record(self) -> Option<Resource> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Returns the related collection, if this value is one.
    #[must_use]
    pub fn into_records(self) -> Option<Collection> {
        match self {
            Self::Records(records) => Some(records),
            _ => None,
        }
    }

    /// Returns the raw attribute value, if this value is one.
    #[must_use]
    pub fn into_data(self) -> Option<Value> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }
}

/// A cached related object.
#[derive(Clone)]
pub(crate) enum Related {
    Record(Resource),
    Records(Collection),
}

/// Non-owning pointer from a cached related record back to its owner.
///
/// Used only for event bubbling and foreign-key bookkeeping; the owner's
/// cache map is the sole owning edge.
#[derive(Clone)]
pub(crate) struct Backref {
    pub(crate) owner: Weak<ResourceCell>,
    pub(crate) field: String,
    pub(crate) dependent: bool,
}

pub(crate) struct ResourceState {
    pub(crate) id: Option<i64>,
    pub(crate) attributes: Map<String, Value>,
    pub(crate) populated: bool,
    pub(crate) needs_saved: bool,
    pub(crate) recordset_id: Option<i64>,
    pub(crate) related_cache: HashMap<String, Related>,
    pub(crate) backref: Option<Backref>,
    fetch_in_flight: Option<SharedFetch>,
    save_in_flight: bool,
    rsave_guard: bool,
}

pub(crate) struct ResourceCell {
    pub(crate) context: Arc<Context>,
    pub(crate) entity: Arc<EntityType>,
    pub(crate) state: Mutex<ResourceState>,
    pub(crate) events: broadcast::Sender<RecordEvent>,
}

/// A handle to one record.
///
/// `Resource` is `Clone`; clones share the same underlying record state.
/// All methods take `&self`; interior state is guarded by a mutex that is
/// never held across an await point.
#[derive(Clone)]
pub struct Resource {
    pub(crate) cell: Arc<ResourceCell>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state();
        f.debug_struct("Resource")
            .field("entity", &self.cell.entity.name())
            .field("id", &st.id)
            .field("populated", &st.populated)
            .field("needs_saved", &st.needs_saved)
            .finish_non_exhaustive()
    }
}

// Verify Resource is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Resource>();
};

impl Resource {
    fn bare(context: Arc<Context>, entity: Arc<EntityType>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            cell: Arc::new(ResourceCell {
                context,
                entity,
                state: Mutex::new(ResourceState {
                    id: None,
                    attributes: Map::new(),
                    populated: false,
                    needs_saved: false,
                    recordset_id: None,
                    related_cache: HashMap::new(),
                    backref: None,
                    fetch_in_flight: None,
                    save_in_flight: false,
                    rsave_guard: false,
                }),
                events,
            }),
        }
    }

    /// Creates a new, unsaved record. Called via
    /// [`Context::new_record`](crate::records::Context::new_record).
    pub(crate) fn new_record(context: Arc<Context>, entity: Arc<EntityType>) -> Self {
        let resource = Self::bare(context, entity);
        resource.state().needs_saved = true;
        resource
    }

    /// Creates an unpopulated handle to a persisted record.
    pub(crate) fn from_id(context: Arc<Context>, entity: Arc<EntityType>, id: i64) -> Self {
        let resource = Self::bare(context, entity);
        {
            let mut st = resource.state();
            st.id = Some(id);
            st.attributes.insert("id".to_string(), json!(id));
        }
        resource
    }

    /// Creates a record from an attribute payload, intercepting inline
    /// relationship data into the cache.
    pub(crate) fn from_data(
        context: Arc<Context>,
        entity: Arc<EntityType>,
        data: Value,
    ) -> Result<Self, RecordError> {
        let resource = Self::bare(context, entity);
        resource.apply_payload(data)?;
        {
            let mut st = resource.state();
            let persisted = st.id.is_some();
            st.populated = persisted;
            st.needs_saved = !persisted;
        }
        Ok(resource)
    }

    fn state(&self) -> MutexGuard<'_, ResourceState> {
        self.cell.state.lock().expect("record state lock poisoned")
    }

    /// Returns the canonical entity type name.
    #[must_use]
    pub fn entity_name(&self) -> &str {
        self.cell.entity.name()
    }

    /// Returns the application context this record is bound to.
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.cell.context
    }

    /// Returns the record id, or `None` for a record not yet persisted.
    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.state().id
    }

    /// Returns `true` if the record has not been persisted yet.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.state().id.is_none()
    }

    /// Returns `true` once the full field set has been loaded from the
    /// server (or the record was constructed from full data). Never reset.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.state().populated
    }

    /// Returns `true` if an attribute changed since the last fetch or save.
    #[must_use]
    pub fn needs_saved(&self) -> bool {
        self.state().needs_saved
    }

    /// Returns the record-set id attached to this record, if any.
    #[must_use]
    pub fn recordset_id(&self) -> Option<i64> {
        self.state().recordset_id
    }

    /// Attaches a record-set id.
    ///
    /// [`Resource::url`] carries it as a `recordsetid` query parameter and
    /// the create request attaches it so the server registers membership as
    /// a side effect.
    pub fn set_recordset_id(&self, recordset_id: Option<i64>) {
        self.state().recordset_id = recordset_id;
    }

    /// Subscribes to this record's events.
    ///
    /// Events from cached related records bubble here with their paths
    /// prefixed by the relationship field name.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.cell.events.subscribe()
    }

    /// Returns `true` if both handles refer to the same record state.
    #[must_use]
    pub fn same_record(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    // === Attribute access ===================================================

    /// Returns the raw stored attribute value, case-insensitively.
    ///
    /// Relationship fields hold their foreign-key URI (or nothing); use
    /// [`Resource::rget`] to resolve related objects.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        self.state().attributes.get(&field.to_lowercase()).cloned()
    }

    /// Returns a string attribute.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<String> {
        match self.get(field) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns an integer attribute.
    #[must_use]
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).as_ref().and_then(Value::as_i64)
    }

    /// Returns a boolean attribute.
    #[must_use]
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).as_ref().and_then(Value::as_bool)
    }

    /// Returns a timestamp attribute parsed as UTC.
    ///
    /// Accepts RFC 3339 and the bare `YYYY-MM-DDTHH:MM:SS` form the server
    /// uses for audit fields.
    #[must_use]
    pub fn get_datetime(&self, field: &str) -> Option<DateTime<Utc>> {
        let raw = self.get_str(field)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Sets one field.
    ///
    /// The name is lowercased. For relationship fields the value is
    /// intercepted per the schema: URI strings are stored as the foreign
    /// key, inline objects/arrays are materialized into the relationship
    /// cache. Triggers a [`RecordEvent::Changed`] and marks the record as
    /// needing a save.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnhandledRelationship`] when a relationship
    /// field receives a value whose shape does not match its declared kind.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<(), RecordError> {
        self.set_value(field, value.into(), false)
    }

    /// Sets several fields from a map, applying `id` first.
    ///
    /// `id` is applied before any other key because relationship URL
    /// bookkeeping during the rest of the batch depends on the id being
    /// current.
    ///
    /// # Errors
    ///
    /// Propagates the first [`RecordError`] from the individual sets.
    pub fn set_all(&self, values: Map<String, Value>) -> Result<(), RecordError> {
        let mut rest: Vec<(String, Value)> = Vec::with_capacity(values.len());
        let mut id_value = None;
        for (key, value) in values {
            if key.eq_ignore_ascii_case("id") {
                id_value = Some(value);
            } else {
                rest.push((key, value));
            }
        }
        if let Some(value) = id_value {
            self.set_value("id", value, false)?;
        }
        for (key, value) in rest {
            self.set_value(&key, value, false)?;
        }
        Ok(())
    }

    /// Caches `related` as the value of a to-one relationship field.
    ///
    /// For foreign-key-bearing kinds the FK attribute is stored when the
    /// related record already has a URL; for a still-new related record the
    /// FK is back-patched once it acquires an id.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::NotARelationship`] for scalar fields and
    /// [`RecordError::UnhandledRelationship`] for one-to-many fields (use
    /// the collection's `add` instead).
    pub fn set_related_record(&self, field: &str, related: &Self) -> Result<(), RecordError> {
        let key = field.to_lowercase();
        let rel = self
            .cell
            .entity
            .get_field(&key)
            .and_then(|f| f.relationship())
            .cloned()
            .ok_or_else(|| RecordError::NotARelationship {
                entity: self.entity_name().to_string(),
                field: key.clone(),
            })?;
        match rel.kind {
            RelationshipKind::ManyToOne | RelationshipKind::OneToOne => {
                self.cache_to_one(&key, &rel, related.clone(), false);
                Ok(())
            }
            RelationshipKind::ZeroToOne => {
                self.cache_far_side(&key, &rel, related.clone(), false);
                Ok(())
            }
            RelationshipKind::OneToMany => Err(RecordError::UnhandledRelationship {
                entity: self.entity_name().to_string(),
                field: key,
                kind: rel.kind,
            }),
        }
    }

    // === URLs ===============================================================

    /// Returns this record's URL: the resource URI when persisted, the
    /// entity's collection URI otherwise. Either form carries the
    /// `recordsetid` query parameter when one is attached.
    #[must_use]
    pub fn url(&self) -> String {
        let st = self.state();
        let api_root = self.cell.context.api_root();
        let entity = self.cell.entity.lowercase_name();
        let base = match st.id {
            Some(id) => resource_uri(api_root, &entity, id),
            None => collection_uri(api_root, &entity),
        };
        match st.recordset_id {
            Some(recordset_id) => format!("{base}?recordsetid={recordset_id}"),
            None => base,
        }
    }

    /// Returns the plain resource URI, without query parameters, if the
    /// record is persisted. This is the form stored in foreign-key
    /// attributes.
    pub(crate) fn record_uri(&self) -> Option<String> {
        let id = self.state().id?;
        Some(resource_uri(
            self.cell.context.api_root(),
            &self.cell.entity.lowercase_name(),
            id,
        ))
    }

    // === Internal write path ================================================

    fn set_value(&self, field: &str, value: Value, quiet: bool) -> Result<(), RecordError> {
        let key = field.to_lowercase();

        if key == "id" {
            self.apply_id(&value, quiet);
            return Ok(());
        }

        let relationship = self
            .cell
            .entity
            .get_field(&key)
            .and_then(|f| f.relationship())
            .cloned();

        match relationship {
            Some(rel) => self.set_relationship_value(&key, &rel, value, quiet),
            None => {
                if self.cell.entity.get_field(&key).is_none() && !META_FIELDS.contains(&key.as_str())
                {
                    tracing::warn!(
                        entity = %self.entity_name(),
                        field = %key,
                        "setting a field not in the schema"
                    );
                }
                self.store_attribute(&key, value, quiet);
                Ok(())
            }
        }
    }

    fn store_attribute(&self, key: &str, value: Value, quiet: bool) {
        {
            let mut st = self.state();
            if st.attributes.get(key) == Some(&value) {
                return;
            }
            st.attributes.insert(key.to_string(), value);
        }
        self.after_change(key, quiet);
    }

    fn after_change(&self, path: &str, quiet: bool) {
        emit_changed(&self.cell, path);
        if !quiet {
            self.state().needs_saved = true;
            emit_save_required(&self.cell, path);
        }
    }

    pub(crate) fn mark_save_required(&self, path: &str) {
        self.state().needs_saved = true;
        emit_save_required(&self.cell, path);
    }

    fn unhandled(&self, field: &str, kind: RelationshipKind) -> RecordError {
        RecordError::UnhandledRelationship {
            entity: self.entity_name().to_string(),
            field: field.to_string(),
            kind,
        }
    }

    fn set_relationship_value(
        &self,
        key: &str,
        rel: &Relationship,
        value: Value,
        quiet: bool,
    ) -> Result<(), RecordError> {
        match rel.kind {
            RelationshipKind::ManyToOne | RelationshipKind::OneToOne => match value {
                Value::String(uri) => {
                    self.evict_related(key);
                    self.store_attribute(key, Value::String(uri), quiet);
                    Ok(())
                }
                Value::Null => {
                    self.evict_related(key);
                    self.store_attribute(key, Value::Null, quiet);
                    Ok(())
                }
                data @ Value::Object(_) => {
                    let related = Resource::from_data(
                        Arc::clone(&self.cell.context),
                        self.cell.context.entity(&rel.related)?,
                        data,
                    )?;
                    self.cache_to_one(key, rel, related, quiet);
                    Ok(())
                }
                _ => Err(self.unhandled(key, rel.kind)),
            },
            RelationshipKind::OneToMany => match value {
                Value::Array(items) => {
                    let collection = Collection::of_related_inline(self, key, rel, items)?;
                    self.replace_cache(key, Related::Records(collection));
                    self.after_change(key, quiet);
                    Ok(())
                }
                Value::String(_) => {
                    if rel.dependent {
                        tracing::warn!(
                            entity = %self.entity_name(),
                            field = %key,
                            "expected inline data for dependent field, got a URI"
                        );
                    }
                    let collection = Collection::of_related(self, key, rel);
                    self.replace_cache(key, Related::Records(collection));
                    self.after_change(key, quiet);
                    Ok(())
                }
                Value::Null => {
                    self.evict_related(key);
                    self.after_change(key, quiet);
                    Ok(())
                }
                _ => Err(self.unhandled(key, rel.kind)),
            },
            RelationshipKind::ZeroToOne => match value {
                Value::Array(items) => match items.into_iter().next() {
                    Some(item @ Value::Object(_)) => {
                        let related = Resource::from_data(
                            Arc::clone(&self.cell.context),
                            self.cell.context.entity(&rel.related)?,
                            item,
                        )?;
                        self.cache_far_side(key, rel, related, quiet);
                        Ok(())
                    }
                    _ => {
                        self.evict_related(key);
                        self.after_change(key, quiet);
                        Ok(())
                    }
                },
                data @ Value::Object(_) => {
                    let related = Resource::from_data(
                        Arc::clone(&self.cell.context),
                        self.cell.context.entity(&rel.related)?,
                        data,
                    )?;
                    self.cache_far_side(key, rel, related, quiet);
                    Ok(())
                }
                Value::String(_) => {
                    // resolved lazily through rget
                    self.after_change(key, quiet);
                    Ok(())
                }
                Value::Null => {
                    self.evict_related(key);
                    self.after_change(key, quiet);
                    Ok(())
                }
                _ => Err(self.unhandled(key, rel.kind)),
            },
        }
    }

    /// Caches a related record under a foreign-key-bearing field and stores
    /// the FK attribute when the related record has a URL.
    fn cache_to_one(&self, key: &str, rel: &Relationship, related: Self, quiet: bool) {
        wire_backref(&related, self, key, rel.dependent);
        let uri = related.record_uri();
        self.replace_cache(key, Related::Record(related));
        match uri {
            Some(uri) => self.store_attribute(key, Value::String(uri), quiet),
            None => {
                // FK unknown until the related record acquires an id
                self.state().attributes.remove(key);
                self.after_change(key, quiet);
            }
        }
    }

    /// Caches a related record under a zero-to-one field; the foreign key
    /// lives on the far side.
    fn cache_far_side(&self, key: &str, rel: &Relationship, related: Self, quiet: bool) {
        wire_backref(&related, self, key, rel.dependent);
        if let (Some(uri), Some(other_side)) = (self.record_uri(), rel.other_side.as_ref()) {
            let _ = related.set_value(other_side, Value::String(uri), quiet);
        }
        self.replace_cache(key, Related::Record(related));
        self.after_change(key, quiet);
    }

    fn replace_cache(&self, key: &str, related: Related) {
        let old = self.state().related_cache.insert(key.to_string(), related);
        if let Some(old) = old {
            detach(&old);
        }
    }

    fn evict_related(&self, key: &str) {
        let old = self.state().related_cache.remove(key);
        if let Some(old) = old {
            detach(&old);
        }
    }

    pub(crate) fn cached_related(&self, key: &str) -> Option<Related> {
        self.state().related_cache.get(key).cloned()
    }

    fn apply_id(&self, value: &Value, quiet: bool) {
        let parsed = match value {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.parse::<i64>().ok(),
            _ => None,
        };
        let Some(id) = parsed else {
            tracing::warn!(entity = %self.entity_name(), ?value, "ignoring non-numeric id");
            return;
        };
        let (was_new, changed) = {
            let mut st = self.state();
            let was_new = st.id.is_none();
            let changed = st.id != Some(id);
            st.id = Some(id);
            st.attributes.insert("id".to_string(), json!(id));
            (was_new, changed)
        };
        if changed {
            self.after_change("id", quiet);
        }
        if was_new {
            let _ = self.cell.events.send(RecordEvent::IdAssigned { id });
            self.back_patch_foreign_keys();
        }
    }

    /// After the id becomes known: write this record's URL into the reverse
    /// foreign keys of cached collection members, and into the owner's FK
    /// attribute when this record is cached under a to-one field.
    ///
    /// These writes are quiet: whichever side needed saving was already
    /// marked when the edge was created.
    fn back_patch_foreign_keys(&self) {
        let Some(uri) = self.record_uri() else { return };

        let cache: Vec<(String, Related)> = {
            let st = self.state();
            st.related_cache
                .iter()
                .map(|(key, related)| (key.clone(), related.clone()))
                .collect()
        };
        for (field, related) in cache {
            let Some(rel) = self
                .cell
                .entity
                .get_field(&field)
                .and_then(|f| f.relationship())
                .cloned()
            else {
                continue;
            };
            let Some(other_side) = rel.other_side.as_ref() else {
                continue;
            };
            if !rel.kind.is_collection_backed() {
                continue;
            }
            match related {
                Related::Records(collection) => {
                    for member in collection.members() {
                        let _ = member.set_value(other_side, Value::String(uri.clone()), true);
                    }
                }
                Related::Record(record) => {
                    let _ = record.set_value(other_side, Value::String(uri.clone()), true);
                }
            }
        }

        let backref = self.state().backref.clone();
        if let Some(backref) = backref {
            if let Some(owner_cell) = backref.owner.upgrade() {
                let owner = Self { cell: owner_cell };
                let stores_fk = owner
                    .cell
                    .entity
                    .get_field(&backref.field)
                    .and_then(|f| f.relationship())
                    .is_some_and(|rel| rel.kind.stores_foreign_key());
                if stores_fk {
                    owner.store_attribute(&backref.field, Value::String(uri), true);
                }
            }
        }
    }

    // === Fetch ==============================================================

    /// Loads the full field set from the server.
    ///
    /// Idempotent while in flight: a second call before completion awaits
    /// the same pending request, so exactly one request is issued. On
    /// success the record is marked populated and numeric-looking `id`
    /// payload values are parsed into integers.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::FetchWithoutId`] for a record with no id, or
    /// the transport error for a failed request.
    pub async fn fetch(&self) -> Result<(), RecordError> {
        let shared = {
            let mut st = self.state();
            if st.id.is_none() {
                return Err(RecordError::FetchWithoutId {
                    entity: self.entity_name().to_string(),
                });
            }
            if let Some(pending) = &st.fetch_in_flight {
                pending.clone()
            } else {
                let this = self.clone();
                let fut: SharedFetch = async move { this.run_fetch().await }.boxed().shared();
                st.fetch_in_flight = Some(fut.clone());
                fut
            }
        };
        shared.await
    }

    async fn run_fetch(self) -> Result<(), RecordError> {
        let outcome = match self.request_record().await {
            Ok(payload) => self.apply_payload(payload).map(|()| {
                self.state().populated = true;
            }),
            Err(error) => Err(error),
        };
        self.state().fetch_in_flight = None;
        outcome
    }

    async fn request_record(&self) -> Result<Value, RecordError> {
        let path = {
            let st = self.state();
            let id = st.id.ok_or_else(|| RecordError::FetchWithoutId {
                entity: self.entity_name().to_string(),
            })?;
            resource_uri(
                self.cell.context.api_root(),
                &self.cell.entity.lowercase_name(),
                id,
            )
        };
        let request = HttpRequest::builder(HttpMethod::Get, path)
            .build()
            .map_err(HttpError::from)?;
        let response = self.cell.context.http().request(request).await?;
        Ok(response.body)
    }

    /// Short-circuits when the record is already populated or has no id to
    /// fetch with.
    ///
    /// # Errors
    ///
    /// Propagates [`Resource::fetch`] errors.
    pub async fn fetch_if_not_populated(&self) -> Result<(), RecordError> {
        let needs_fetch = {
            let st = self.state();
            !st.populated && st.id.is_some()
        };
        if needs_fetch {
            self.fetch().await
        } else {
            Ok(())
        }
    }

    /// Applies a server payload: `id` first (resolved from `resource_uri`
    /// when absent), then every other attribute through the normal write
    /// path with dirty-tracking suppressed.
    pub(crate) fn apply_payload(&self, payload: Value) -> Result<(), RecordError> {
        let Value::Object(map) = payload else {
            return Err(RecordError::BadPayload {
                entity: self.entity_name().to_string(),
                message: "expected a JSON object".to_string(),
            });
        };

        let mut id_value = None;
        let mut uri_value = None;
        let mut rest: Vec<(String, Value)> = Vec::with_capacity(map.len());
        for (key, value) in map {
            if key.eq_ignore_ascii_case("id") {
                id_value = Some(value);
            } else {
                if key.eq_ignore_ascii_case("resource_uri") {
                    uri_value = value.as_str().map(ToString::to_string);
                }
                rest.push((key, value));
            }
        }

        if let Some(value) = id_value {
            self.set_value("id", value, true)?;
        } else if let Some(uri) = uri_value {
            if let Some((_, id)) = parse_resource_uri(&uri) {
                self.set_value("id", json!(id), true)?;
            }
        }
        for (key, value) in rest {
            self.set_value(&key, value, true)?;
        }
        Ok(())
    }

    // === Save ===============================================================

    /// Persists this record's own fields: POST when new, PUT when
    /// persisted. Does not recurse into related objects; see
    /// [`Resource::rsave`].
    ///
    /// `needs_saved` is captured and cleared optimistically before the
    /// request; a failure restores it and re-emits
    /// [`RecordEvent::SaveRequired`].
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::SaveInProgress`] immediately, without
    /// issuing a request, when a previous save is still outstanding, or
    /// the transport error for a failed request.
    pub async fn save(&self) -> Result<(), RecordError> {
        let was_needed = {
            let mut st = self.state();
            if st.save_in_flight {
                return Err(RecordError::SaveInProgress {
                    entity: self.entity_name().to_string(),
                });
            }
            st.save_in_flight = true;
            std::mem::replace(&mut st.needs_saved, false)
        };

        let result = self.run_save().await;

        {
            let mut st = self.state();
            st.save_in_flight = false;
            if result.is_err() && was_needed {
                st.needs_saved = true;
            }
        }
        if result.is_err() && was_needed {
            emit_save_required(&self.cell, "");
        }
        result
    }

    async fn run_save(&self) -> Result<(), RecordError> {
        let (body, existing_id, recordset_id) = {
            let st = self.state();
            (Value::Object(st.attributes.clone()), st.id, st.recordset_id)
        };
        let api_root = self.cell.context.api_root();
        let entity = self.cell.entity.lowercase_name();

        let request = match existing_id {
            None => {
                let mut builder =
                    HttpRequest::builder(HttpMethod::Post, collection_uri(api_root, &entity))
                        .body(body)
                        .body_type(DataType::Json);
                if let Some(recordset_id) = recordset_id {
                    builder = builder.query_param("recordsetid", recordset_id.to_string());
                }
                builder.build().map_err(HttpError::from)?
            }
            Some(id) => HttpRequest::builder(HttpMethod::Put, resource_uri(api_root, &entity, id))
                .body(body)
                .body_type(DataType::Json)
                .build()
                .map_err(HttpError::from)?,
        };

        let response = self.cell.context.http().request(request).await?;
        self.apply_payload(response.body)?;
        self.state().populated = true;
        Ok(())
    }

    /// Cascading save over the cached relation graph.
    ///
    /// Stage 1 saves all cached independent to-one relations (recursively,
    /// in parallel) so their URIs exist for this record's foreign keys.
    /// Stage 2 gathers dependent data inline into this record's payload and
    /// saves this record if and only if it needs saving. Stage 3 saves all
    /// cached independent collection-backed relations in parallel, now that
    /// this record's id is known.
    ///
    /// A failure at any stage aborts the remaining stages and propagates;
    /// already-completed sibling saves are not rolled back.
    ///
    /// # Errors
    ///
    /// Propagates the first failure from any stage.
    pub async fn rsave(&self) -> Result<(), RecordError> {
        self.rsave_inner().await
    }

    fn rsave_inner(&self) -> BoxFuture<'static, Result<(), RecordError>> {
        let this = self.clone();
        async move {
            // re-entry through a cycle in the cached graph is a no-op; the
            // outer call owns the cascade
            {
                let mut st = this.state();
                if st.rsave_guard {
                    return Ok(());
                }
                st.rsave_guard = true;
            }
            let result = this.run_rsave().await;
            this.state().rsave_guard = false;
            result
        }
        .boxed()
    }

    async fn run_rsave(&self) -> Result<(), RecordError> {
        let stage_one = self.related_matching(|rel| rel.kind.stores_foreign_key() && !rel.dependent);
        let mut saves = Vec::new();
        for related in stage_one {
            if let Related::Record(record) = related {
                saves.push(record.rsave_inner());
            }
        }
        try_join_all(saves).await?;

        self.gather_dependent_fields()?;
        if self.needs_saved() {
            self.save().await?;
        }

        let stage_three =
            self.related_matching(|rel| rel.kind.is_collection_backed() && !rel.dependent);
        let mut saves = Vec::new();
        for related in stage_three {
            match related {
                Related::Record(record) => saves.push(record.rsave_inner()),
                Related::Records(collection) => {
                    for member in collection.members() {
                        saves.push(member.rsave_inner());
                    }
                }
            }
        }
        try_join_all(saves).await?;
        Ok(())
    }

    fn related_matching(&self, predicate: impl Fn(&Relationship) -> bool) -> Vec<Related> {
        let st = self.state();
        st.related_cache
            .iter()
            .filter_map(|(field, related)| {
                let rel = self.cell.entity.get_field(field)?.relationship()?;
                predicate(rel).then(|| related.clone())
            })
            .collect()
    }

    /// Serializes every cached dependent related object into this record's
    /// outgoing attributes: a plain object for to-one, an array for
    /// one-to-many, a one-element array for zero-to-one. Each dependent
    /// gathers its own dependents first, so nested graphs travel in one
    /// request.
    ///
    /// # Errors
    ///
    /// Propagates failures from gathering nested dependents.
    pub fn gather_dependent_fields(&self) -> Result<(), RecordError> {
        let dependents: Vec<(String, Relationship, Related)> = {
            let st = self.state();
            st.related_cache
                .iter()
                .filter_map(|(field, related)| {
                    let rel = self.cell.entity.get_field(field)?.relationship()?;
                    rel.dependent
                        .then(|| (field.clone(), rel.clone(), related.clone()))
                })
                .collect()
        };

        for (field, rel, related) in dependents {
            let value = match (&related, rel.kind) {
                (
                    Related::Record(record),
                    RelationshipKind::ManyToOne | RelationshipKind::OneToOne,
                ) => {
                    record.gather_dependent_fields()?;
                    record.to_payload()
                }
                (Related::Record(record), _) => {
                    record.gather_dependent_fields()?;
                    Value::Array(vec![record.to_payload()])
                }
                (Related::Records(collection), _) => {
                    let mut items = Vec::new();
                    for member in collection.members() {
                        member.gather_dependent_fields()?;
                        items.push(member.to_payload());
                    }
                    Value::Array(items)
                }
            };
            // serialization bookkeeping, not a user edit: no events
            self.state().attributes.insert(field, value);
        }
        Ok(())
    }

    pub(crate) fn to_payload(&self) -> Value {
        Value::Object(self.state().attributes.clone())
    }

    // === Delete =============================================================

    /// Deletes the record on the server.
    ///
    /// The request carries an `If-Match` header from the record's `version`
    /// attribute for optimistic concurrency; a missing version is logged
    /// and the header omitted.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::DeleteWithoutId`] for a record with no id, or
    /// the transport error for a failed request.
    pub async fn destroy(&self) -> Result<(), RecordError> {
        let (id, version) = {
            let st = self.state();
            (st.id, st.attributes.get("version").cloned())
        };
        let Some(id) = id else {
            return Err(RecordError::DeleteWithoutId {
                entity: self.entity_name().to_string(),
            });
        };

        let path = resource_uri(
            self.cell.context.api_root(),
            &self.cell.entity.lowercase_name(),
            id,
        );
        let mut builder = HttpRequest::builder(HttpMethod::Delete, path);
        match version {
            Some(Value::Number(number)) => builder = builder.header("If-Match", number.to_string()),
            Some(Value::String(text)) => builder = builder.header("If-Match", text),
            _ => {
                tracing::warn!(
                    entity = %self.entity_name(),
                    id,
                    "deleting without a version attribute"
                );
            }
        }
        let request = builder.build().map_err(HttpError::from)?;
        self.cell.context.http().request(request).await?;
        let _ = self.cell.events.send(RecordEvent::Destroyed);
        Ok(())
    }

    // === Traversal ==========================================================

    /// Resolves a dot-separated path that may traverse relationships.
    ///
    /// The record is fetched first when unpopulated. Each hop resolves per
    /// the schema: to-one hops return (and cache) the related record,
    /// to-many hops return the cached or lazily created collection,
    /// zero-to-one hops collapse the implied collection to its first member.
    /// Traversal is left to right with at most one fetch per uncached hop.
    ///
    /// Returns `None` for an absent foreign key, an empty zero-to-one, a
    /// path continuing past a to-many field, or an absent scalar.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::ExpectedRelatedField`] when the path tries to
    /// traverse through a scalar field, plus any fetch errors.
    pub async fn rget(&self, path: &str) -> Result<Option<RelatedValue>, RecordError> {
        self.rget_inner(path.to_string(), false).await
    }

    /// Like [`Resource::rget`], but also fetches the resolved record or
    /// collection when it supports population.
    ///
    /// # Errors
    ///
    /// Same as [`Resource::rget`].
    pub async fn rget_populated(&self, path: &str) -> Result<Option<RelatedValue>, RecordError> {
        self.rget_inner(path.to_string(), true).await
    }

    /// Resolves a path expected to end at a single related record.
    ///
    /// # Errors
    ///
    /// Same as [`Resource::rget`].
    pub async fn rget_record(&self, path: &str) -> Result<Option<Resource>, RecordError> {
        Ok(self.rget(path).await?.and_then(RelatedValue::into_record))
    }

    /// Resolves a path expected to end at a related collection.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::NotToMany`] when the path resolves to
    /// something other than a collection, plus [`Resource::rget`] errors.
    pub async fn rget_collection(&self, path: &str) -> Result<Collection, RecordError> {
        self.rget(path)
            .await?
            .and_then(RelatedValue::into_records)
            .ok_or_else(|| RecordError::NotToMany {
                entity: self.entity_name().to_string(),
                field: path.to_string(),
            })
    }

    /// Resolves a path expected to end at a scalar value.
    ///
    /// # Errors
    ///
    /// Same as [`Resource::rget`].
    pub async fn rget_value(&self, path: &str) -> Result<Option<Value>, RecordError> {
        Ok(self.rget(path).await?.and_then(RelatedValue::into_data))
    }

    fn rget_inner(
        &self,
        path: String,
        pre_populate: bool,
    ) -> BoxFuture<'static, Result<Option<RelatedValue>, RecordError>> {
        let this = self.clone();
        async move {
            this.fetch_if_not_populated().await?;

            let (first, rest) = match path.split_once('.') {
                Some((first, rest)) => (first.to_lowercase(), Some(rest.to_string())),
                None => (path.to_lowercase(), None),
            };

            let relationship = this
                .cell
                .entity
                .get_field(&first)
                .and_then(|f| f.relationship())
                .cloned();

            let Some(rel) = relationship else {
                return match rest {
                    Some(rest) => Err(RecordError::ExpectedRelatedField {
                        entity: this.entity_name().to_string(),
                        field: first,
                        rest,
                    }),
                    None => Ok(this.get(&first).map(RelatedValue::Data)),
                };
            };

            match rel.kind {
                RelationshipKind::ManyToOne | RelationshipKind::OneToOne => {
                    let Some(related) = this.resolve_to_one(&first, &rel)? else {
                        return Ok(None);
                    };
                    match rest {
                        Some(rest) => related.rget_inner(rest, pre_populate).await,
                        None => {
                            if pre_populate {
                                related.fetch_if_not_populated().await?;
                            }
                            Ok(Some(RelatedValue::Record(related)))
                        }
                    }
                }
                RelationshipKind::OneToMany => {
                    if rest.is_some() {
                        // cannot traverse past a to-many field
                        return Ok(None);
                    }
                    let collection = this.resolve_to_many(&first, &rel);
                    if pre_populate {
                        collection.fetch_if_not_populated().await?;
                    }
                    Ok(Some(RelatedValue::Records(collection)))
                }
                RelationshipKind::ZeroToOne => {
                    if this.is_new() {
                        // a record with no id cannot be the target of a reverse FK
                        return Ok(None);
                    }
                    let Some(related) = this.resolve_zero_to_one(&first, &rel).await? else {
                        return Ok(None);
                    };
                    match rest {
                        Some(rest) => related.rget_inner(rest, pre_populate).await,
                        None => Ok(Some(RelatedValue::Record(related))),
                    }
                }
            }
        }
        .boxed()
    }

    fn resolve_to_one(
        &self,
        field: &str,
        rel: &Relationship,
    ) -> Result<Option<Resource>, RecordError> {
        if let Some(Related::Record(record)) = self.cached_related(field) {
            return Ok(Some(record));
        }
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(uri)) => {
                let related = self.cell.context.from_uri(&uri)?;
                wire_backref(&related, self, field, rel.dependent);
                self.state()
                    .related_cache
                    .insert(field.to_string(), Related::Record(related.clone()));
                Ok(Some(related))
            }
            Some(data @ Value::Object(_)) => {
                // inline data is normally intercepted at set; materialize anyway
                let related = Resource::from_data(
                    Arc::clone(&self.cell.context),
                    self.cell.context.entity(&rel.related)?,
                    data,
                )?;
                wire_backref(&related, self, field, rel.dependent);
                self.state()
                    .related_cache
                    .insert(field.to_string(), Related::Record(related.clone()));
                Ok(Some(related))
            }
            Some(_) => Err(self.unhandled(field, rel.kind)),
        }
    }

    fn resolve_to_many(&self, field: &str, rel: &Relationship) -> Collection {
        if let Some(Related::Records(collection)) = self.cached_related(field) {
            return collection;
        }
        let collection = Collection::of_related(self, field, rel);
        self.state()
            .related_cache
            .insert(field.to_string(), Related::Records(collection.clone()));
        collection
    }

    async fn resolve_zero_to_one(
        &self,
        field: &str,
        rel: &Relationship,
    ) -> Result<Option<Resource>, RecordError> {
        if let Some(Related::Record(record)) = self.cached_related(field) {
            return Ok(Some(record));
        }
        let collection = Collection::of_related(self, field, rel);
        collection
            .fetch(crate::records::collection::FetchOptions {
                at: None,
                limit: Some(1),
            })
            .await?;
        match collection.at(0) {
            Some(related) => {
                self.state()
                    .related_cache
                    .insert(field.to_string(), Related::Record(related.clone()));
                Ok(Some(related))
            }
            None => Ok(None),
        }
    }

    /// Returns the number of related objects behind a one-to-many field
    /// without fetching the whole collection.
    ///
    /// Uses the cached collection's count when known, otherwise performs a
    /// minimal count-only query. A new record has no persisted relations
    /// and reports the locally added count.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::NotToMany`] when the field is not a
    /// one-to-many relationship.
    pub async fn related_object_count(&self, field: &str) -> Result<u64, RecordError> {
        let key = field.to_lowercase();
        let rel = self
            .cell
            .entity
            .get_field(&key)
            .and_then(|f| f.relationship())
            .filter(|rel| rel.kind == RelationshipKind::OneToMany)
            .cloned()
            .ok_or_else(|| RecordError::NotToMany {
                entity: self.entity_name().to_string(),
                field: key.clone(),
            })?;

        let collection = self.resolve_to_many(&key, &rel);
        collection.get_total_count().await
    }
}

pub(crate) fn wire_backref(child: &Resource, owner: &Resource, field: &str, dependent: bool) {
    child.state().backref = Some(Backref {
        owner: Arc::downgrade(&owner.cell),
        field: field.to_string(),
        dependent,
    });
}

fn detach(related: &Related) {
    match related {
        Related::Record(record) => {
            record.state().backref = None;
        }
        Related::Records(collection) => collection.detach_members(),
    }
}

/// Emits `Changed` on the record and re-emits on every live ancestor with
/// the relationship field name prefixed per hop.
pub(crate) fn emit_changed(cell: &Arc<ResourceCell>, path: &str) {
    let mut event = RecordEvent::Changed {
        path: path.to_string(),
    };
    let mut current = Arc::clone(cell);
    loop {
        let _ = current.events.send(event.clone());
        let backref = current
            .state
            .lock()
            .expect("record state lock poisoned")
            .backref
            .clone();
        let Some(backref) = backref else { break };
        let Some(owner) = backref.owner.upgrade() else {
            break;
        };
        event = event.prefixed(&backref.field);
        current = owner;
    }
}

/// Emits `SaveRequired` on the record and re-emits on every live ancestor.
/// Bubbling through a dependent edge marks the owner as needing a save;
/// its payload embeds the changed data.
pub(crate) fn emit_save_required(cell: &Arc<ResourceCell>, path: &str) {
    let mut event = RecordEvent::SaveRequired {
        path: path.to_string(),
    };
    let mut current = Arc::clone(cell);
    loop {
        let _ = current.events.send(event.clone());
        let backref = current
            .state
            .lock()
            .expect("record state lock poisoned")
            .backref
            .clone();
        let Some(backref) = backref else { break };
        let Some(owner) = backref.owner.upgrade() else {
            break;
        };
        if backref.dependent {
            owner
                .state
                .lock()
                .expect("record state lock poisoned")
                .needs_saved = true;
        }
        event = event.prefixed(&backref.field);
        current = owner;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, HostUrl};
    use crate::schema::{EntityType, Field, SchemaRegistry};

    fn test_context() -> Arc<Context> {
        let config = ApiConfig::builder()
            .host(HostUrl::new("http://localhost:8000").unwrap())
            .build()
            .unwrap();
        let schema = SchemaRegistry::builder()
            .entity(
                EntityType::new("CollectionObject", 1)
                    .field(Field::scalar("CatalogNumber"))
                    .field(Field::scalar("Remarks"))
                    .field(Field::related(
                        "Cataloger",
                        Relationship::new(RelationshipKind::ManyToOne, "Agent"),
                    ))
                    .field(Field::related(
                        "CollectingEvent",
                        Relationship::new(RelationshipKind::ManyToOne, "CollectingEvent"),
                    ))
                    .field(Field::related(
                        "Determinations",
                        Relationship::new(RelationshipKind::OneToMany, "Determination")
                            .other_side("collectionobject")
                            .dependent(),
                    )),
            )
            .entity(EntityType::new("Agent", 5).field(Field::scalar("LastName")))
            .entity(EntityType::new("CollectingEvent", 10).field(Field::scalar("StationFieldNumber")))
            .entity(
                EntityType::new("Determination", 9)
                    .field(Field::scalar("Remarks"))
                    .field(Field::related(
                        "CollectionObject",
                        Relationship::new(RelationshipKind::ManyToOne, "CollectionObject"),
                    )),
            )
            .build();
        Context::new(&config, schema)
    }

    #[test]
    fn test_set_then_get_is_case_insensitive() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();

        record.set("CATALOGNUMBER", "X-17").unwrap();
        assert_eq!(record.get_str("catalognumber").as_deref(), Some("X-17"));
        assert_eq!(record.get_str("CatalogNumber").as_deref(), Some("X-17"));
    }

    #[test]
    fn test_set_marks_needs_saved_and_emits_events() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();
        // a fresh record is dirty; clear for the assertion below
        record.state().needs_saved = false;
        let mut events = record.subscribe();

        record.set("remarks", "in a jar").unwrap();

        assert!(record.needs_saved());
        assert_eq!(
            events.try_recv().unwrap(),
            RecordEvent::Changed {
                path: "remarks".to_string()
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            RecordEvent::SaveRequired {
                path: "remarks".to_string()
            }
        );
    }

    #[test]
    fn test_set_same_value_is_a_no_op() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();
        record.set("remarks", "same").unwrap();
        let mut events = record.subscribe();

        record.set("remarks", "same").unwrap();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_many_to_one_uri_is_stored_raw() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();

        record.set("cataloger", "/api/records/agent/5/").unwrap();
        assert_eq!(
            record.get_str("cataloger").as_deref(),
            Some("/api/records/agent/5/")
        );
    }

    #[test]
    fn test_many_to_one_inline_object_is_intercepted() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();

        record
            .set(
                "cataloger",
                json!({"id": 5, "resource_uri": "/api/records/agent/5/", "lastname": "Dana"}),
            )
            .unwrap();

        // the attribute slot holds the FK URI, not the raw object
        assert_eq!(
            record.get_str("cataloger").as_deref(),
            Some("/api/records/agent/5/")
        );
        let cached = record.cached_related("cataloger");
        assert!(matches!(cached, Some(Related::Record(_))));
    }

    #[test]
    fn test_many_to_one_rejects_mismatched_shape() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();

        let result = record.set("cataloger", json!(42));
        assert!(matches!(
            result,
            Err(RecordError::UnhandledRelationship { field, .. }) if field == "cataloger"
        ));
    }

    #[test]
    fn test_one_to_many_inline_array_builds_collection() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();

        record
            .set("determinations", json!([{"remarks": "first"}, {"remarks": "second"}]))
            .unwrap();

        // the raw attribute slot is not used for to-many fields
        assert!(record.get("determinations").is_none());
        let Some(Related::Records(collection)) = record.cached_related("determinations") else {
            panic!("expected a cached collection");
        };
        assert_eq!(collection.members().len(), 2);
    }

    #[test]
    fn test_replacing_relationship_detaches_old_cache() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();

        record
            .set("cataloger", json!({"id": 5, "lastname": "Dana"}))
            .unwrap();
        let Some(Related::Record(old)) = record.cached_related("cataloger") else {
            panic!("expected a cached record");
        };

        record.set("cataloger", "/api/records/agent/8/").unwrap();
        // old related record no longer bubbles to this owner
        assert!(old.state().backref.is_none());
    }

    #[test]
    fn test_child_change_bubbles_with_prefixed_path() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();
        record
            .set("determinations", json!([{"remarks": "initial"}]))
            .unwrap();
        let Some(Related::Records(collection)) = record.cached_related("determinations") else {
            panic!("expected a cached collection");
        };
        let member = collection.at(0).unwrap();

        let mut events = record.subscribe();
        member.set("remarks", "revised").unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            RecordEvent::Changed {
                path: "determinations.remarks".to_string()
            }
        );
    }

    #[test]
    fn test_dependent_child_change_marks_owner() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();
        record
            .set("determinations", json!([{"remarks": "initial"}]))
            .unwrap();
        record.state().needs_saved = false;

        let Some(Related::Records(collection)) = record.cached_related("determinations") else {
            panic!("expected a cached collection");
        };
        collection.at(0).unwrap().set("remarks", "revised").unwrap();

        assert!(record.needs_saved());
    }

    #[test]
    fn test_url_for_new_and_persisted_records() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();
        assert_eq!(record.url(), "/api/records/collectionobject/");

        record.set("id", 100).unwrap();
        assert_eq!(record.url(), "/api/records/collectionobject/100/");

        record.set_recordset_id(Some(12));
        assert_eq!(
            record.url(),
            "/api/records/collectionobject/100/?recordsetid=12"
        );
    }

    #[test]
    fn test_id_assignment_back_patches_collection_members() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();
        record
            .set("determinations", json!([{"remarks": "new det"}]))
            .unwrap();
        let Some(Related::Records(collection)) = record.cached_related("determinations") else {
            panic!("expected a cached collection");
        };
        let member = collection.at(0).unwrap();
        assert!(member.get("collectionobject").is_none());

        record.set("id", 100).unwrap();

        assert_eq!(
            member.get_str("collectionobject").as_deref(),
            Some("/api/records/collectionobject/100/")
        );
    }

    #[test]
    fn test_gather_dependent_fields_inlines_members() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();
        record
            .set("determinations", json!([{"remarks": "a"}, {"remarks": "b"}]))
            .unwrap();

        record.gather_dependent_fields().unwrap();

        let gathered = record.get("determinations").unwrap();
        let items = gathered.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get("remarks"), Some(&json!("a")));
        assert_eq!(items[1].get("remarks"), Some(&json!("b")));
    }

    #[test]
    fn test_from_data_with_uri_is_populated_and_clean() {
        let context = test_context();
        let record = context
            .from_data(
                "Agent",
                json!({"resource_uri": "/api/records/agent/5/", "lastname": "Dana"}),
            )
            .unwrap();

        assert_eq!(record.id(), Some(5));
        assert!(record.is_populated());
        assert!(!record.needs_saved());
    }

    #[test]
    fn test_from_data_without_id_is_a_new_record() {
        let context = test_context();
        let record = context
            .from_data("Agent", json!({"lastname": "Gray"}))
            .unwrap();

        assert!(record.is_new());
        assert!(!record.is_populated());
        assert!(record.needs_saved());
    }

    #[test]
    fn test_get_datetime_parses_server_timestamps() {
        let context = test_context();
        let record = context.new_record("CollectionObject").unwrap();
        record
            .set("timestampmodified", "2024-03-01T10:15:00")
            .unwrap();

        let parsed = record.get_datetime("timestampmodified").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T10:15:00+00:00");
    }
}
