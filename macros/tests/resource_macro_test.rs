//! Tests for #[derive(Resource)] macro

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Utc};
use nomadhub_core::resource::{Join, Patch, Resource, Row, Scope};
use nomadhub_core::schema::{parse_insert, parse_update, Issues, Validate};
use nomadhub_macros::Resource;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(plural = "regions")]
pub struct Region {
    pub id: String,
    pub name: String,
}

impl Validate for Region {}

#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(
    plural = "events",
    owner = "user_id",
    parent = Region,
    foreign_key = "region_id"
)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub region_id: String,
    pub capacity: i32,
    pub notes: Option<String>,
    #[resource(default)]
    pub published: bool,
    #[resource(generated)]
    pub created_at: Option<DateTime<Utc>>,
    pub user_id: String,
}

impl Validate for Event {
    fn validate(&self, issues: &mut Issues) {
        issues.non_empty("title", &self.title);
        issues.in_range("capacity", &self.capacity, 1, 500);
    }
}

#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(plural = "visa_applications", table = "visa_apps", owner = "owner_id")]
pub struct VisaApplication {
    pub id: String,
    pub country: String,
    pub owner_id: String,
}

#[test]
fn test_metadata_for_shared_resource() {
    assert_eq!(Region::PLURAL, "regions");
    assert_eq!(Region::SINGULAR, "region");
    assert_eq!(Region::TABLE, "regions");
    assert_eq!(Region::SCOPE, Scope::Shared);
    assert_eq!(Region::COLUMNS, &["id", "name"]);
    assert_eq!(Region::REQUIRED, &["name"]);
    assert!(Region::GENERATED.is_empty());
    assert_eq!(Region::JOIN, None);
}

#[test]
fn test_metadata_for_owned_resource_with_join() {
    assert_eq!(Event::SINGULAR, "event");
    assert_eq!(Event::SCOPE, Scope::Owned { column: "user_id" });
    assert_eq!(Event::REQUIRED, &["title", "region_id", "capacity"]);
    assert_eq!(Event::GENERATED, &["created_at", "user_id"]);
    assert_eq!(
        Event::JOIN,
        Some(Join {
            table: "regions",
            foreign_key: "region_id",
            field: "region",
        })
    );
}

#[test]
fn test_singular_and_table_overrides() {
    assert_eq!(VisaApplication::SINGULAR, "visa_application");
    assert_eq!(VisaApplication::TABLE, "visa_apps");
    assert_eq!(VisaApplication::SCOPE, Scope::Owned { column: "owner_id" });
}

#[test]
fn test_patch_serializes_only_present_fields() {
    let patch = RegionPatch {
        name: Some("Andes".to_string()),
        ..RegionPatch::default()
    };
    assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "name": "Andes" }));
    assert_eq!(patch.present_fields(), vec!["name"]);
}

#[test]
fn test_patch_merge_and_into_record() {
    let mut region = Region {
        id: "r1".to_string(),
        name: "Andes".to_string(),
    };
    RegionPatch {
        name: Some("Patagonia".to_string()),
        ..RegionPatch::default()
    }
    .merge_into(&mut region);
    assert_eq!(region.id, "r1");
    assert_eq!(region.name, "Patagonia");

    let roundtrip = RegionPatch::from_record(&region).into_record();
    assert_eq!(roundtrip, region);
}

#[test]
fn test_from_json_reports_each_bad_field() {
    let err = EventPatch::from_json(&json!({ "title": 1, "capacity": "many" })).unwrap_err();
    assert_eq!(err.fields(), vec!["title", "capacity"]);
    assert!(err.first_message().starts_with("Invalid title: "));
}

#[test]
fn test_from_json_ignores_generated_fields() {
    let patch = EventPatch::from_json(&json!({
        "user_id": "intruder",
        "created_at": "2024-01-01T00:00:00Z"
    }))
    .unwrap();
    assert_eq!(patch.user_id, None);
    assert_eq!(patch.created_at, None);
}

#[test]
fn test_from_json_null_clears_optional_field_only() {
    let patch = EventPatch::from_json(&json!({ "notes": null, "title": null })).unwrap();
    assert_eq!(patch.notes, Some(None));
    assert_eq!(patch.title, None);
}

#[test]
fn test_same_content_ignores_id_and_generated_fields() {
    let a = Event {
        id: "optimistic".to_string(),
        title: "Meetup".to_string(),
        region_id: "r1".to_string(),
        capacity: 20,
        ..Event::default()
    };
    let b = Event {
        id: "e-42".to_string(),
        user_id: "u1".to_string(),
        created_at: Some(Utc::now()),
        ..a.clone()
    };
    assert!(a.same_content(&b));
    assert!(!a.same_content(&Event {
        capacity: 21,
        ..b.clone()
    }));
    assert_eq!(b.owner(), Some("u1"));
    assert_eq!(Region::default().owner(), None);
}

#[test]
fn test_parse_insert_uses_generated_metadata() {
    let err = parse_insert::<Event>(&json!({ "title": "Meetup" })).unwrap_err();
    assert_eq!(err.fields(), vec!["region_id", "capacity"]);

    let err = parse_insert::<Event>(&json!({ "title": "Meetup", "region_id": "r1", "capacity": 0 }))
        .unwrap_err();
    assert_eq!(err.to_string(), "capacity must be between 1 and 500");

    let event: Event =
        parse_insert(&json!({ "title": "Meetup", "region_id": "r1", "capacity": 30 })).unwrap();
    assert!(!event.published);
    assert_eq!(event.id, "");
}

#[test]
fn test_parse_update_requires_id() {
    let err = parse_update::<Region>(&json!({ "name": "Andes" })).unwrap_err();
    assert_eq!(err.to_string(), "id is required");
}

#[test]
fn test_row_renders_parent_under_join_field() {
    let row = Row::with_parent(
        Event {
            id: "e1".to_string(),
            title: "Meetup".to_string(),
            region_id: "r1".to_string(),
            capacity: 10,
            ..Event::default()
        },
        Some(Region {
            id: "r1".to_string(),
            name: "Andes".to_string(),
        }),
    );
    let value = serde_json::to_value(&row).unwrap();
    assert_eq!(value["region"]["name"], "Andes");
}
