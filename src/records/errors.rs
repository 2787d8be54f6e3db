//! Record-specific error types.
//!
//! This module contains the error taxonomy for record operations, extending
//! the transport-level [`HttpError`](crate::clients::HttpError) with
//! binding-layer semantics.
//!
//! Three families of failure are distinguished:
//!
//! - **State-contract violations**: programmer errors in the caller:
//!   saving while a save is outstanding, traversing through a scalar field,
//!   handing a relationship field a value of the wrong shape, counting a
//!   field that is not to-many. These fail fast and are never retried.
//! - **Network/save failures**: surfaced as the wrapped [`HttpError`];
//!   the record's dirty bookkeeping is rolled back so the caller can retry.
//! - **Data problems**: unknown entity names, unparseable URIs, payloads
//!   of the wrong shape.
//!
//! All variants are `Clone` so a shared in-flight fetch can deliver the
//! same failure to every waiter.

use thiserror::Error;

use crate::clients::HttpError;
use crate::schema::RelationshipKind;

/// Error type for record operations.
#[derive(Debug, Error, Clone)]
pub enum RecordError {
    /// `save` was called while a previous save was still outstanding.
    ///
    /// At most one save per record may be in flight; a second call is a
    /// programmer error and fails immediately without issuing a request.
    #[error("{entity} already has a save in flight")]
    SaveInProgress {
        /// The entity type name of the record.
        entity: String,
    },

    /// `fetch` was called on a record that has no id yet.
    #[error("cannot fetch a new {entity} record (no id)")]
    FetchWithoutId {
        /// The entity type name of the record.
        entity: String,
    },

    /// `destroy` was called on a record that has no id yet.
    #[error("cannot delete a new {entity} record (no id)")]
    DeleteWithoutId {
        /// The entity type name of the record.
        entity: String,
    },

    /// The named entity type is not in the schema registry.
    #[error("unknown entity type '{name}'")]
    UnknownEntity {
        /// The name that failed to resolve.
        name: String,
    },

    /// A dotted path tried to traverse through a non-relationship field.
    #[error("{entity}.{field} is not a relationship field but the path continues with '{rest}'")]
    ExpectedRelatedField {
        /// The entity type name.
        entity: String,
        /// The scalar field the path tried to traverse through.
        field: String,
        /// The remaining path segments.
        rest: String,
    },

    /// A relationship field was given a value whose shape does not match
    /// the declared relationship kind.
    #[error("unhandled value for {kind:?} relationship {entity}.{field}")]
    UnhandledRelationship {
        /// The entity type name.
        entity: String,
        /// The relationship field name.
        field: String,
        /// The declared relationship kind.
        kind: RelationshipKind,
    },

    /// A to-many operation was invoked on a field that is not one-to-many.
    #[error("{entity}.{field} is not a one-to-many relationship")]
    NotToMany {
        /// The entity type name.
        entity: String,
        /// The offending field name.
        field: String,
    },

    /// A relationship operation was invoked on a scalar field.
    #[error("{entity}.{field} is not a relationship field")]
    NotARelationship {
        /// The entity type name.
        entity: String,
        /// The offending field name.
        field: String,
    },

    /// A string could not be parsed as a resource URI.
    #[error("'{uri}' is not a resource URI")]
    BadUri {
        /// The string that failed to parse.
        uri: String,
    },

    /// A server payload did not have the expected shape.
    #[error("unexpected {entity} payload: {message}")]
    BadPayload {
        /// The entity type name.
        entity: String,
        /// What was wrong with the payload.
        message: String,
    },

    /// A transport-level error occurred.
    #[error(transparent)]
    Http(#[from] HttpError),
}

// Verify RecordError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RecordError>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::HttpResponseError;

    #[test]
    fn test_save_in_progress_names_entity() {
        let error = RecordError::SaveInProgress {
            entity: "CollectionObject".to_string(),
        };
        assert!(error.to_string().contains("CollectionObject"));
    }

    #[test]
    fn test_expected_related_field_includes_remaining_path() {
        let error = RecordError::ExpectedRelatedField {
            entity: "CollectionObject".to_string(),
            field: "catalognumber".to_string(),
            rest: "extra".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("catalognumber"));
        assert!(message.contains("extra"));
    }

    #[test]
    fn test_unhandled_relationship_includes_kind() {
        let error = RecordError::UnhandledRelationship {
            entity: "CollectionObject".to_string(),
            field: "cataloger".to_string(),
            kind: RelationshipKind::ManyToOne,
        };
        assert!(error.to_string().contains("ManyToOne"));
    }

    #[test]
    fn test_http_error_wraps_transparently() {
        let error: RecordError = HttpError::Response(HttpResponseError {
            code: 500,
            message: "server fell over".to_string(),
        })
        .into();
        assert!(error.to_string().contains("server fell over"));
    }

    #[test]
    fn test_record_error_is_cloneable() {
        let error = RecordError::BadUri {
            uri: "nonsense".to_string(),
        };
        let cloned = error.clone();
        assert!(matches!(cloned, RecordError::BadUri { uri } if uri == "nonsense"));
    }
}
