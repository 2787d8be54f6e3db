//! Integration tests for the cascading save: stage ordering, dependent
//! inlining, and reverse foreign-key back-patching.
//!
//! Note on dependent to-many data: this crate always serializes dependent
//! related objects inline into the owner's payload; they are never the
//! subject of their own request (see DESIGN.md). The scenarios below assert
//! that path.

use std::sync::Arc;

use serde_json::{json, Value};
use specimen_api::records::Context;
use specimen_api::schema::{EntityType, Field, Relationship, RelationshipKind, SchemaRegistry};
use specimen_api::{ApiConfig, HostUrl};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_context(host: &str) -> Arc<Context> {
    let config = ApiConfig::builder()
        .host(HostUrl::new(host).unwrap())
        .build()
        .unwrap();
    let schema = SchemaRegistry::builder()
        .entity(
            EntityType::new("CollectionObject", 1)
                .field(Field::scalar("CatalogNumber"))
                .field(Field::related(
                    "CollectingEvent",
                    Relationship::new(RelationshipKind::ManyToOne, "CollectingEvent"),
                ))
                .field(Field::related(
                    "Determinations",
                    Relationship::new(RelationshipKind::OneToMany, "Determination")
                        .other_side("collectionobject")
                        .dependent(),
                ))
                .field(Field::related(
                    "Preparations",
                    Relationship::new(RelationshipKind::OneToMany, "Preparation")
                        .other_side("collectionobject"),
                )),
        )
        .entity(EntityType::new("CollectingEvent", 10).field(Field::scalar("StationFieldNumber")))
        .entity(
            EntityType::new("Determination", 9)
                .field(Field::scalar("Remarks"))
                .field(Field::related(
                    "CollectionObject",
                    Relationship::new(RelationshipKind::ManyToOne, "CollectionObject"),
                )),
        )
        .entity(
            EntityType::new("Preparation", 63)
                .field(Field::scalar("CountAmt"))
                .field(Field::related(
                    "CollectionObject",
                    Relationship::new(RelationshipKind::ManyToOne, "CollectionObject"),
                )),
        )
        .build();
    Context::new(&config, schema)
}

fn request_body(request: &wiremock::Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or(Value::Null)
}

// ============================================================================
// Stage ordering
// ============================================================================

#[tokio::test]
async fn test_rsave_orders_to_one_then_self_then_to_many() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/records/collectingevent/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 9,
            "resource_uri": "/api/records/collectingevent/9/"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/records/collectionobject/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 100,
            "resource_uri": "/api/records/collectionobject/100/"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/records/preparation/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 55,
            "resource_uri": "/api/records/preparation/55/"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let context = test_context(&server.uri());
    let object = context.new_record("CollectionObject").unwrap();
    object.set("catalognumber", "1887-0042").unwrap();

    let event = context.new_record("CollectingEvent").unwrap();
    event.set("stationfieldnumber", "SF-9").unwrap();
    object.set_related_record("collectingevent", &event).unwrap();

    let preparations = object.rget_collection("preparations").await.unwrap();
    let preparation = context.new_record("Preparation").unwrap();
    preparation.set("countamt", 2).unwrap();
    preparations.add(&preparation);

    object.rsave().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<String> = requests.iter().map(|r| r.url.path().to_string()).collect();
    assert_eq!(
        paths,
        vec![
            "/api/records/collectingevent/",
            "/api/records/collectionobject/",
            "/api/records/preparation/",
        ]
    );

    // the owner embeds the collecting event's URI, known from stage 1
    let object_body = request_body(&requests[1]);
    assert_eq!(
        object_body.get("collectingevent"),
        Some(&json!("/api/records/collectingevent/9/"))
    );

    // the preparation references the owner's id, known from stage 2
    let preparation_body = request_body(&requests[2]);
    assert_eq!(
        preparation_body.get("collectionobject"),
        Some(&json!("/api/records/collectionobject/100/"))
    );
    assert_eq!(preparation_body.get("countamt"), Some(&json!(2)));
}

#[tokio::test]
async fn test_rsave_stage_failure_aborts_remaining_stages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/records/collectingevent/"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/records/collectionobject/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 100})))
        .expect(0)
        .mount(&server)
        .await;

    let context = test_context(&server.uri());
    let object = context.new_record("CollectionObject").unwrap();
    let event = context.new_record("CollectingEvent").unwrap();
    object.set_related_record("collectingevent", &event).unwrap();

    let result = object.rsave().await;
    assert!(result.is_err());
    // the owner was never saved and still needs saving
    assert!(object.is_new());
    assert!(object.needs_saved());
}

// ============================================================================
// Dependent inlining
// ============================================================================

#[tokio::test]
async fn test_dependent_members_are_inlined_not_saved_separately() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/records/collectionobject/100/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 100,
            "resource_uri": "/api/records/collectionobject/100/"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let context = test_context(&server.uri());
    let object = context
        .from_data(
            "CollectionObject",
            json!({
                "id": 100,
                "resource_uri": "/api/records/collectionobject/100/"
            }),
        )
        .unwrap();

    let determinations = object.rget_collection("determinations").await.unwrap();
    let first = context.new_record("Determination").unwrap();
    first.set("remarks", "cf. Quercus alba").unwrap();
    determinations.add(&first);
    let second = context.new_record("Determination").unwrap();
    second.set("remarks", "juvenile").unwrap();
    determinations.add(&second);

    object.rsave().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "dependent members must not be saved separately");

    let body = request_body(&requests[0]);
    let inlined = body.get("determinations").and_then(Value::as_array).unwrap();
    assert_eq!(inlined.len(), 2);
    assert_eq!(inlined[0].get("remarks"), Some(&json!("cf. Quercus alba")));
    assert_eq!(inlined[1].get("remarks"), Some(&json!("juvenile")));
    // members of a persisted owner carry its URI
    assert_eq!(
        inlined[0].get("collectionobject"),
        Some(&json!("/api/records/collectionobject/100/"))
    );
}

#[tokio::test]
async fn test_new_graph_saves_in_one_request_and_back_patches_children() {
    // A new owner and a new dependent child wired together before either
    // has an id: one POST whose body embeds the child, and the child's
    // reverse FK equals the owner's persisted URL afterwards.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/records/collectionobject/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 100,
            "resource_uri": "/api/records/collectionobject/100/"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let context = test_context(&server.uri());
    let object = context.new_record("CollectionObject").unwrap();
    let determinations = object.rget_collection("determinations").await.unwrap();

    let determination = context.new_record("Determination").unwrap();
    determinations.add(&determination);
    determination.set("remarks", "x").unwrap();

    object.rsave().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let body = request_body(&requests[0]);
    let inlined = body.get("determinations").and_then(Value::as_array).unwrap();
    assert_eq!(inlined[0].get("remarks"), Some(&json!("x")));
    // before the save the FK was unknowable
    assert!(inlined[0].get("collectionobject").is_none());

    // id back-patch: the child now references the owner's URL
    assert_eq!(object.id(), Some(100));
    assert_eq!(
        determination.get_str("collectionobject").as_deref(),
        Some("/api/records/collectionobject/100/")
    );
}

#[tokio::test]
async fn test_rsave_skips_clean_records() {
    // a populated, unmodified record issues no request at all
    let context = test_context("http://localhost:1");
    let object = context
        .from_data(
            "CollectionObject",
            json!({
                "id": 100,
                "resource_uri": "/api/records/collectionobject/100/",
                "catalognumber": "1887-0042"
            }),
        )
        .unwrap();

    assert!(!object.needs_saved());
    object.rsave().await.unwrap();
}

#[tokio::test]
async fn test_dependent_edit_marks_owner_and_travels_inline() {
    // editing a member of a cached dependent collection dirties the owner;
    // the next rsave re-sends the owner's payload with the edit inline
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/records/collectionobject/100/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 100,
            "resource_uri": "/api/records/collectionobject/100/"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let context = test_context(&server.uri());
    let object = context
        .from_data(
            "CollectionObject",
            json!({
                "id": 100,
                "resource_uri": "/api/records/collectionobject/100/",
                "determinations": [{
                    "id": 7,
                    "resource_uri": "/api/records/determination/7/",
                    "remarks": "original",
                    "collectionobject": "/api/records/collectionobject/100/"
                }]
            }),
        )
        .unwrap();
    assert!(!object.needs_saved());

    let determinations = object.rget_collection("determinations").await.unwrap();
    determinations.at(0).unwrap().set("remarks", "revised").unwrap();
    assert!(object.needs_saved());

    object.rsave().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body = request_body(&requests[0]);
    let inlined = body.get("determinations").and_then(Value::as_array).unwrap();
    assert_eq!(inlined[0].get("remarks"), Some(&json!("revised")));
    assert_eq!(inlined[0].get("id"), Some(&json!(7)));
}
