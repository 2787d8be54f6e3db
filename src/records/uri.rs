//! Resource URI construction and parsing.
//!
//! Record endpoints follow the shape `/<api-root>/<entity>/<id>/` for a
//! single record and `/<api-root>/<entity>/` for the collection. These
//! helpers build both forms and parse a resource URI back into its entity
//! name and numeric id (the `from_uri` contract).

/// Builds the URI for a persisted record.
///
/// # Example
///
/// ```rust
/// use specimen_api::records::uri::resource_uri;
///
/// assert_eq!(
///     resource_uri("/api/records", "collectionobject", 100),
///     "/api/records/collectionobject/100/"
/// );
/// ```
#[must_use]
pub fn resource_uri(api_root: &str, entity: &str, id: i64) -> String {
    format!("{api_root}/{entity}/{id}/")
}

/// Builds the URI for an entity type's collection endpoint.
#[must_use]
pub fn collection_uri(api_root: &str, entity: &str) -> String {
    format!("{api_root}/{entity}/")
}

/// Parses a resource URI of the shape `.../<entity>/<id>/` into the
/// lowercased entity name and numeric id.
///
/// Any query string is ignored. Returns `None` when the trailing segments
/// do not look like an entity/id pair.
///
/// # Example
///
/// ```rust
/// use specimen_api::records::uri::parse_resource_uri;
///
/// let (entity, id) = parse_resource_uri("/api/records/Agent/42/").unwrap();
/// assert_eq!(entity, "agent");
/// assert_eq!(id, 42);
/// ```
#[must_use]
pub fn parse_resource_uri(uri: &str) -> Option<(String, i64)> {
    let path = uri.split('?').next().unwrap_or(uri);
    let mut segments = path.trim_end_matches('/').rsplit('/');

    let id: i64 = segments.next()?.parse().ok()?;
    let entity = segments.next()?;
    if entity.is_empty() {
        return None;
    }

    Some((entity.to_lowercase(), id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_uri_shape() {
        assert_eq!(
            resource_uri("/api/records", "determination", 7),
            "/api/records/determination/7/"
        );
    }

    #[test]
    fn test_collection_uri_shape() {
        assert_eq!(
            collection_uri("/api/records", "agent"),
            "/api/records/agent/"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let uri = resource_uri("/api/records", "collectionobject", 100);
        let (entity, id) = parse_resource_uri(&uri).unwrap();
        assert_eq!(entity, "collectionobject");
        assert_eq!(id, 100);
    }

    #[test]
    fn test_parse_lowercases_entity() {
        let (entity, id) = parse_resource_uri("/api/records/CollectionObject/3/").unwrap();
        assert_eq!(entity, "collectionobject");
        assert_eq!(id, 3);
    }

    #[test]
    fn test_parse_without_trailing_slash() {
        let (entity, id) = parse_resource_uri("/api/records/agent/12").unwrap();
        assert_eq!(entity, "agent");
        assert_eq!(id, 12);
    }

    #[test]
    fn test_parse_ignores_query_string() {
        let (entity, id) =
            parse_resource_uri("/api/records/agent/12/?recordsetid=4").unwrap();
        assert_eq!(entity, "agent");
        assert_eq!(id, 12);
    }

    #[test]
    fn test_parse_rejects_non_numeric_id() {
        assert!(parse_resource_uri("/api/records/agent/new/").is_none());
        assert!(parse_resource_uri("/api/records/agent/").is_none());
        assert!(parse_resource_uri("").is_none());
    }
}
