//! Typed change events for records.
//!
//! A [`Resource`](crate::records::Resource) emits [`RecordEvent`]s on a
//! broadcast channel. Events carry an explicit dotted `path` payload rather
//! than encoding the path into an event name: when a change on a cached
//! related record bubbles to its owner, the owner re-emits the same event
//! with the relationship field name prefixed onto the path. An observer
//! subscribed at any level therefore sees paths relative to the record it
//! subscribed to: `"remarks"` on the determination itself,
//! `"determinations.remarks"` on the collection object that owns it.

/// An event observed on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEvent {
    /// A field changed. `path` is the dot-separated field path relative to
    /// the record the event was observed on. Fired for every attribute
    /// write, including ones applied from server payloads.
    Changed {
        /// Dotted field path, e.g. `"catalognumber"` or
        /// `"determinations.remarks"`.
        path: String,
    },

    /// Unsaved changes exist at or below `path`. Not fired for writes
    /// applied from server payloads. An empty path refers to the record
    /// itself (used when a failed save restores its dirty state).
    SaveRequired {
        /// Dotted field path of the originating change.
        path: String,
    },

    /// The record's id became known, typically right after its first save.
    IdAssigned {
        /// The newly assigned id.
        id: i64,
    },

    /// The record was deleted on the server.
    Destroyed,
}

impl RecordEvent {
    /// Returns the event with `field` prefixed onto its path, as emitted by
    /// an owner one hop up the bubbling chain. `IdAssigned` and `Destroyed`
    /// do not bubble and are returned unchanged.
    #[must_use]
    pub fn prefixed(&self, field: &str) -> Self {
        match self {
            Self::Changed { path } => Self::Changed {
                path: prefix_path(field, path),
            },
            Self::SaveRequired { path } => Self::SaveRequired {
                path: prefix_path(field, path),
            },
            other => other.clone(),
        }
    }
}

fn prefix_path(field: &str, path: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{field}.{path}")
    }
}
