//! An ordered, paginated group of records of one entity type.
//!
//! A [`Collection`] is either standalone (fetched via filter query) or tied
//! to a parent [`Resource`] through a relationship field. Large server-side
//! result sets are supported through *windowed* fetching: a page fetched at
//! an offset lands at its real indices and every other slot stays a
//! placeholder, while `total_count` reflects the server's full count.
//!
//! A collection whose parent record has no id yet (`is_new`) cannot be
//! filtered server-side; it represents purely local additions, and the
//! members' reverse foreign keys are filled in once the parent acquires an
//! id.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;

use crate::clients::{HttpError, HttpMethod, HttpRequest};
use crate::records::context::Context;
use crate::records::errors::RecordError;
use crate::records::resource::{wire_backref, Resource, ResourceCell};
use crate::records::uri::collection_uri;
use crate::schema::{EntityType, Relationship};

/// Page size used when a fetch does not specify a limit.
pub const DEFAULT_PAGE_SIZE: usize = 20;

type SharedFetch = Shared<BoxFuture<'static, Result<(), RecordError>>>;

/// Pagination options for [`Collection::fetch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Index at which to place the fetched page (windowed mode). The page
    /// is requested at this offset and written to these indices; slots
    /// outside the window are left untouched.
    pub at: Option<usize>,
    /// Page size; defaults to [`DEFAULT_PAGE_SIZE`].
    pub limit: Option<usize>,
}

/// The list envelope returned by collection endpoints.
///
/// This is the one place the `{meta, objects}` wire shape is known; the
/// rest of the crate sees parsed pages.
#[derive(Debug, Deserialize)]
struct ListMeta {
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    offset: Option<u64>,
    total_count: u64,
}

struct ListPage {
    total_count: u64,
    objects: Vec<Value>,
}

fn parse_list_envelope(entity: &str, body: Value) -> Result<ListPage, RecordError> {
    let bad = |message: &str| RecordError::BadPayload {
        entity: entity.to_string(),
        message: message.to_string(),
    };
    let Value::Object(mut map) = body else {
        return Err(bad("expected a JSON object"));
    };
    let meta_value = map.remove("meta").ok_or_else(|| bad("missing 'meta'"))?;
    let meta: ListMeta = serde_json::from_value(meta_value)
        .map_err(|e| bad(&format!("unreadable 'meta': {e}")))?;
    tracing::debug!(
        entity,
        limit = ?meta.limit,
        offset = ?meta.offset,
        total = meta.total_count,
        "parsed list page"
    );
    let objects = match map.remove("objects") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(bad("'objects' is not an array")),
        None => return Err(bad("missing 'objects'")),
    };
    Ok(ListPage {
        total_count: meta.total_count,
        objects,
    })
}

/// Link back to the resource owning this collection through a relationship
/// field. Non-owning: the owner's cache map holds the owning edge.
pub(crate) struct CollectionOwner {
    resource: Weak<ResourceCell>,
    field: String,
    other_side: Option<String>,
    dependent: bool,
}

pub(crate) struct CollectionState {
    /// Sparse member sequence; `None` marks a slot not yet fetched.
    models: Vec<Option<Resource>>,
    /// Server-reported total matching count, once known.
    total_count: Option<u64>,
    /// Caller-supplied filter parameters.
    query_params: HashMap<String, String>,
    fetch_in_flight: Option<SharedFetch>,
}

pub(crate) struct CollectionCell {
    context: Arc<Context>,
    entity: Arc<EntityType>,
    owner: Option<CollectionOwner>,
    state: Mutex<CollectionState>,
}

/// A handle to an ordered group of records.
///
/// `Collection` is `Clone`; clones share the same underlying state.
#[derive(Clone)]
pub struct Collection {
    cell: Arc<CollectionCell>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state();
        f.debug_struct("Collection")
            .field("entity", &self.cell.entity.name())
            .field("fetched", &st.models.len())
            .field("total_count", &st.total_count)
            .finish_non_exhaustive()
    }
}

// Verify Collection is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Collection>();
};

impl Collection {
    fn bare(
        context: Arc<Context>,
        entity: Arc<EntityType>,
        owner: Option<CollectionOwner>,
        query_params: HashMap<String, String>,
    ) -> Self {
        Self {
            cell: Arc::new(CollectionCell {
                context,
                entity,
                owner,
                state: Mutex::new(CollectionState {
                    models: Vec::new(),
                    total_count: None,
                    query_params,
                    fetch_in_flight: None,
                }),
            }),
        }
    }

    /// Creates a standalone filtered collection. Called via
    /// [`Context::query`](crate::records::Context::query).
    pub(crate) fn filtered(
        context: Arc<Context>,
        entity: Arc<EntityType>,
        filters: HashMap<String, String>,
    ) -> Self {
        Self::bare(context, entity, None, filters)
    }

    /// Creates the lazy collection behind a to-many relationship field of
    /// `parent`.
    pub(crate) fn of_related(parent: &Resource, field: &str, rel: &Relationship) -> Self {
        let context = Arc::clone(parent.context());
        let entity = context.schema().get(&rel.related).cloned().unwrap_or_else(|| {
            tracing::warn!(
                related = %rel.related,
                "related entity type not in schema registry; using the owner's"
            );
            Arc::clone(&parent.cell.entity)
        });
        Self::bare(
            context,
            entity,
            Some(CollectionOwner {
                resource: Arc::downgrade(&parent.cell),
                field: field.to_string(),
                other_side: rel.other_side.clone(),
                dependent: rel.dependent,
            }),
            HashMap::new(),
        )
    }

    /// Creates the collection behind a to-many relationship field from
    /// inline array data, materializing and wiring each member.
    ///
    /// # Errors
    ///
    /// Propagates member materialization failures.
    pub(crate) fn of_related_inline(
        parent: &Resource,
        field: &str,
        rel: &Relationship,
        items: Vec<Value>,
    ) -> Result<Self, RecordError> {
        let collection = Self::of_related(parent, field, rel);
        let mut members = Vec::with_capacity(items.len());
        for item in items {
            let member = parent.context().from_data(&rel.related, item)?;
            wire_backref(&member, parent, field, rel.dependent);
            members.push(Some(member));
        }
        {
            let mut st = collection.state();
            st.total_count = Some(members.len() as u64);
            st.models = members;
        }
        Ok(collection)
    }

    fn state(&self) -> MutexGuard<'_, CollectionState> {
        self.cell
            .state
            .lock()
            .expect("collection state lock poisoned")
    }

    /// Returns the canonical entity type name of the members.
    #[must_use]
    pub fn entity_name(&self) -> &str {
        self.cell.entity.name()
    }

    /// Returns `true` when this collection belongs to a parent record that
    /// has no id yet. Such a collection cannot be filtered server-side and
    /// holds purely local additions.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.cell.owner.as_ref().is_some_and(|owner| {
            owner.resource.upgrade().is_some_and(|cell| {
                cell.state
                    .lock()
                    .expect("record state lock poisoned")
                    .id
                    .is_none()
            })
        })
    }

    /// Returns `true` when this collection backs a dependent relationship.
    #[must_use]
    pub fn is_dependent(&self) -> bool {
        self.cell.owner.as_ref().is_some_and(|owner| owner.dependent)
    }

    /// Returns the number of slots materialized so far (fetched windows
    /// plus placeholders before them), not the server total.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().models.len()
    }

    /// Returns `true` when no slots are materialized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state().models.is_empty()
    }

    /// Returns the server-reported total matching count, if known from a
    /// prior fetch.
    #[must_use]
    pub fn total_count(&self) -> Option<u64> {
        self.state().total_count
    }

    /// Returns the member at `index`, or `None` when the index falls in an
    /// unfetched window.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<Resource> {
        self.state().models.get(index).and_then(Clone::clone)
    }

    /// Returns all present members, skipping unfetched placeholders.
    #[must_use]
    pub fn members(&self) -> Vec<Resource> {
        self.state().models.iter().flatten().cloned().collect()
    }

    /// Returns the effective filter parameters: the caller-supplied filters
    /// plus the reverse foreign-key filter injected when this collection
    /// belongs to a persisted parent.
    #[must_use]
    pub fn query_params(&self) -> HashMap<String, String> {
        let mut params = self.state().query_params.clone();
        if let Some(owner) = &self.cell.owner {
            if let (Some(other_side), Some(cell)) = (&owner.other_side, owner.resource.upgrade()) {
                let id = cell.state.lock().expect("record state lock poisoned").id;
                if let Some(id) = id {
                    params.insert(other_side.clone(), id.to_string());
                }
            }
        }
        params
    }

    fn owner_resource(&self) -> Option<Resource> {
        self.cell
            .owner
            .as_ref()
            .and_then(|owner| owner.resource.upgrade())
            .map(|cell| Resource { cell })
    }

    // === Fetch ==============================================================

    /// Fetches a page of members.
    ///
    /// With `at`, the page is requested at that offset and written to
    /// indices `at..at + page_len`; other indices keep their previous value
    /// (placeholder or earlier window). Without `at`, the first page is
    /// (re)fetched; previously fetched windows at other offsets are
    /// preserved. `total_count` is updated from the envelope on every page.
    ///
    /// Concurrent calls reuse the in-flight request. A collection whose
    /// parent is new has nothing on the server and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns the transport error or [`RecordError::BadPayload`] for a
    /// malformed envelope.
    pub async fn fetch(&self, options: FetchOptions) -> Result<(), RecordError> {
        if self.is_new() {
            return Ok(());
        }
        let shared = {
            let mut st = self.state();
            if let Some(pending) = &st.fetch_in_flight {
                pending.clone()
            } else {
                let this = self.clone();
                let fut: SharedFetch = async move { this.run_fetch(options).await }.boxed().shared();
                st.fetch_in_flight = Some(fut.clone());
                fut
            }
        };
        shared.await
    }

    async fn run_fetch(self, options: FetchOptions) -> Result<(), RecordError> {
        let outcome = self.request_page(options).await;
        self.state().fetch_in_flight = None;
        outcome
    }

    async fn request_page(&self, options: FetchOptions) -> Result<(), RecordError> {
        let offset = options.at.unwrap_or(0);
        let limit = options.limit.unwrap_or(DEFAULT_PAGE_SIZE);

        let mut query = self.query_params();
        query.insert("limit".to_string(), limit.to_string());
        query.insert("offset".to_string(), offset.to_string());

        let page = self.request_envelope(query).await?;

        let mut members = Vec::with_capacity(page.objects.len());
        for object in page.objects {
            let member = self
                .cell
                .context
                .from_data(&self.cell.entity.lowercase_name(), object)?;
            if let (Some(owner), Some(meta)) = (self.owner_resource(), self.cell.owner.as_ref()) {
                wire_backref(&member, &owner, &meta.field, meta.dependent);
            }
            members.push(member);
        }

        {
            let mut st = self.state();
            st.total_count = Some(page.total_count);
            let needed = offset + members.len();
            if st.models.len() < needed {
                st.models.resize_with(needed, || None);
            }
            for (index, member) in members.into_iter().enumerate() {
                st.models[offset + index] = Some(member);
            }
        }
        Ok(())
    }

    async fn request_envelope(
        &self,
        query: HashMap<String, String>,
    ) -> Result<ListPage, RecordError> {
        let path = collection_uri(
            self.cell.context.api_root(),
            &self.cell.entity.lowercase_name(),
        );
        let request = HttpRequest::builder(HttpMethod::Get, path)
            .query(query)
            .build()
            .map_err(HttpError::from)?;
        let response = self.cell.context.http().request(request).await?;
        parse_list_envelope(self.cell.entity.name(), response.body)
    }

    /// Short-circuits when every slot up to the known total is present, or
    /// when the parent record is new.
    ///
    /// # Errors
    ///
    /// Propagates [`Collection::fetch`] errors.
    pub async fn fetch_if_not_populated(&self) -> Result<(), RecordError> {
        if self.is_new() {
            return Ok(());
        }
        let populated = {
            let st = self.state();
            st.total_count.is_some_and(|total| {
                st.models.len() as u64 >= total && st.models.iter().all(Option::is_some)
            })
        };
        if populated {
            Ok(())
        } else {
            self.fetch(FetchOptions::default()).await
        }
    }

    /// Returns the total matching count, performing a minimal count-only
    /// query (`limit=0`) when it is not yet known. A collection of a new
    /// parent reports its local member count.
    ///
    /// # Errors
    ///
    /// Propagates transport and envelope errors.
    pub async fn get_total_count(&self) -> Result<u64, RecordError> {
        if let Some(total) = self.state().total_count {
            return Ok(total);
        }
        if self.is_new() {
            return Ok(self.len() as u64);
        }

        let mut query = self.query_params();
        query.insert("limit".to_string(), "0".to_string());
        query.insert("offset".to_string(), "0".to_string());

        let page = self.request_envelope(query).await?;
        self.state().total_count = Some(page.total_count);
        Ok(page.total_count)
    }

    // === Local mutation =====================================================

    /// Appends a record, wiring its back-reference to the parent.
    ///
    /// When the parent is persisted the member's reverse foreign key is set
    /// immediately (marking the member as needing a save); for a new parent
    /// the assignment is deferred until the parent acquires an id. Adding
    /// to a dependent collection marks the parent as needing a save, since its
    /// payload now embeds the new member.
    pub fn add(&self, record: &Resource) {
        {
            let mut st = self.state();
            st.models.push(Some(record.clone()));
            if let Some(total) = st.total_count.as_mut() {
                *total += 1;
            }
        }
        let Some(meta) = self.cell.owner.as_ref() else {
            return;
        };
        let Some(owner) = self.owner_resource() else {
            return;
        };
        wire_backref(record, &owner, &meta.field, meta.dependent);
        if let (Some(uri), Some(other_side)) = (owner.record_uri(), meta.other_side.as_ref()) {
            let _ = record.set(other_side, uri);
        }
        if meta.dependent {
            owner.mark_save_required(&meta.field);
        }
    }

    /// Removes a record, detaching its back-reference.
    ///
    /// For dependent collections this is the sole deletion path: no server
    /// delete is issued here; deletion semantics belong to the caller.
    /// Returns `false` when the record was not a member.
    pub fn remove(&self, record: &Resource) -> bool {
        let removed = {
            let mut st = self.state();
            let position = st.models.iter().position(|slot| {
                slot.as_ref().is_some_and(|member| member.same_record(record))
            });
            match position {
                Some(index) => {
                    st.models.remove(index);
                    if let Some(total) = st.total_count.as_mut() {
                        *total = total.saturating_sub(1);
                    }
                    true
                }
                None => false,
            }
        };
        if removed {
            record
                .cell
                .state
                .lock()
                .expect("record state lock poisoned")
                .backref = None;
            if let Some(meta) = self.cell.owner.as_ref() {
                if meta.dependent {
                    if let Some(owner) = self.owner_resource() {
                        owner.mark_save_required(&meta.field);
                    }
                }
            }
        }
        removed
    }

    /// Clears the back-references of all present members. Called when this
    /// collection's cache slot on the owner is replaced, so stale event
    /// bubbling stops.
    pub(crate) fn detach_members(&self) {
        for member in self.members() {
            member
                .cell
                .state
                .lock()
                .expect("record state lock poisoned")
                .backref = None;
        }
    }
}
