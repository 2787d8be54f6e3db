//! Schema metadata for entity types.
//!
//! The server's data model is described by a [`SchemaRegistry`]: one
//! [`EntityType`] per table, each holding [`Field`] descriptors that mark a
//! field as scalar or as a [`Relationship`] to another entity type. The
//! registry is the read-only contract the record binding layer consumes;
//! it decides how `set` intercepts relationship values, how `rget` walks
//! dotted paths, and in which cascade stage a related record is saved.
//!
//! Field names are case-insensitive throughout: every lookup and every
//! stored name is lowercased.
//!
//! # Example
//!
//! ```rust
//! use specimen_api::schema::{EntityType, Field, Relationship, RelationshipKind, SchemaRegistry};
//!
//! let registry = SchemaRegistry::builder()
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
//! let entity = registry.get("collectionobject").unwrap();
//! assert!(entity.get_field("CATALOGNUMBER").is_some());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The kind of a relationship field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    /// A scalar foreign-key field on this entity pointing at one related entity.
    ManyToOne,
    /// A collection of related entities whose foreign key points back at this entity.
    OneToMany,
    /// A single related entity with the foreign key on this side.
    OneToOne,
    /// A one-to-many relationship constrained to at most one member, exposed
    /// as a single optional record.
    ZeroToOne,
}

impl RelationshipKind {
    /// Returns `true` for kinds whose value is a collection on the wire
    /// (the foreign key lives on the far side).
    #[must_use]
    pub const fn is_collection_backed(self) -> bool {
        matches!(self, Self::OneToMany | Self::ZeroToOne)
    }

    /// Returns `true` for kinds whose foreign key is stored on this entity.
    #[must_use]
    pub const fn stores_foreign_key(self) -> bool {
        matches!(self, Self::ManyToOne | Self::OneToOne)
    }
}

/// Metadata for a relationship field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// The relationship kind.
    pub kind: RelationshipKind,
    /// The related entity type name, lowercased.
    pub related: String,
    /// The reciprocal field name on the related type, lowercased, if any.
    pub other_side: Option<String>,
    /// Whether the related object's lifecycle is owned by the referencing
    /// record. Dependent data is serialized inline into the owner's save
    /// payload and never saved independently.
    pub dependent: bool,
}

impl Relationship {
    /// Creates a new independent relationship with no reciprocal field.
    #[must_use]
    pub fn new(kind: RelationshipKind, related: impl Into<String>) -> Self {
        let related: String = related.into();
        Self {
            kind,
            related: related.to_lowercase(),
            other_side: None,
            dependent: false,
        }
    }

    /// Sets the reciprocal field name on the related entity type.
    #[must_use]
    pub fn other_side(mut self, field: impl Into<String>) -> Self {
        let field: String = field.into();
        self.other_side = Some(field.to_lowercase());
        self
    }

    /// Marks the relationship as dependent.
    #[must_use]
    pub const fn dependent(mut self) -> Self {
        self.dependent = true;
        self
    }
}

/// A field descriptor: either a scalar value or a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    relationship: Option<Relationship>,
}

impl Field {
    /// Creates a scalar field descriptor.
    #[must_use]
    pub fn scalar(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            name: name.to_lowercase(),
            relationship: None,
        }
    }

    /// Creates a relationship field descriptor.
    #[must_use]
    pub fn related(name: impl Into<String>, relationship: Relationship) -> Self {
        let name: String = name.into();
        Self {
            name: name.to_lowercase(),
            relationship: Some(relationship),
        }
    }

    /// Returns the lowercased field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if this field is a relationship.
    #[must_use]
    pub const fn is_relationship(&self) -> bool {
        self.relationship.is_some()
    }

    /// Returns the relationship metadata, if this field is one.
    #[must_use]
    pub const fn relationship(&self) -> Option<&Relationship> {
        self.relationship.as_ref()
    }
}

/// Metadata for one entity type (one server table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityType {
    name: String,
    table_id: u32,
    fields: HashMap<String, Field>,
}

impl EntityType {
    /// Creates an entity type with the given canonical name and table id.
    ///
    /// The canonical name keeps its casing for display; all lookups are
    /// case-insensitive.
    #[must_use]
    pub fn new(name: impl Into<String>, table_id: u32) -> Self {
        Self {
            name: name.into(),
            table_id,
            fields: HashMap::new(),
        }
    }

    /// Adds a field descriptor, replacing any previous one of the same name.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Returns the canonical entity name (original casing).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the lowercased entity name as used in URLs.
    #[must_use]
    pub fn lowercase_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Returns the numeric table id.
    #[must_use]
    pub const fn table_id(&self) -> u32 {
        self.table_id
    }

    /// Looks up a field descriptor, case-insensitively.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.get(&name.to_lowercase())
    }

    /// Iterates over all field descriptors (unordered).
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }
}

/// Registry of all entity types known to the client.
///
/// The registry is an explicit object owned by the application
/// [`Context`](crate::records::Context); it is built once per process and
/// never mutated afterwards. Entity types are shared as `Arc`s with every
/// record bound to them.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    by_name: HashMap<String, Arc<EntityType>>,
    by_table_id: HashMap<u32, Arc<EntityType>>,
}

impl SchemaRegistry {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Looks up an entity type by name, case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.by_name.get(&name.to_lowercase())
    }

    /// Looks up an entity type by its numeric table id.
    ///
    /// Used when resolving resource URIs that carry table identifiers.
    #[must_use]
    pub fn get_by_table_id(&self, table_id: u32) -> Option<&Arc<EntityType>> {
        self.by_table_id.get(&table_id)
    }

    /// Returns the number of registered entity types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if no entity types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Builder for [`SchemaRegistry`].
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    entities: Vec<EntityType>,
}

impl SchemaRegistryBuilder {
    /// Adds an entity type to the registry.
    #[must_use]
    pub fn entity(mut self, entity: EntityType) -> Self {
        self.entities.push(entity);
        self
    }

    /// Builds the registry.
    ///
    /// A duplicate entity name or table id replaces the earlier entry with a
    /// warning rather than failing; the schema is external data and the
    /// client degrades gracefully.
    #[must_use]
    pub fn build(self) -> SchemaRegistry {
        let mut registry = SchemaRegistry::default();
        for entity in self.entities {
            let key = entity.lowercase_name();
            let entity = Arc::new(entity);
            if registry.by_name.insert(key.clone(), entity.clone()).is_some() {
                tracing::warn!(entity = %key, "duplicate entity type in schema registry");
            }
            if registry
                .by_table_id
                .insert(entity.table_id(), entity)
                .is_some()
            {
                tracing::warn!(entity = %key, "duplicate table id in schema registry");
            }
        }
        registry
    }
}

// Verify registry types are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SchemaRegistry>();
    assert_send_sync::<EntityType>();
};
