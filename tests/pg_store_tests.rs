//! PgCropStore against a real Postgres. Every test returns early when
//! TEST_DATABASE_URL is unset.

mod common;

use agronet_backend::models::crop::{CropListing, CropPatch, Interest, InterestStatus, Owner};
use agronet_backend::services::crop_store::CropStore;
use agronet_backend::services::pg_crop_store::PgCropStore;
use chrono::{DateTime, Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::common::setup_test_db;

fn listing(owner_email: &str, created_at: DateTime<Utc>, attributes: Value) -> CropListing {
    let attributes: Map<String, Value> = match attributes {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    CropListing {
        id: Uuid::new_v4(),
        name: Some("Sorghum".to_string()),
        description: None,
        quantity: dec!(10),
        created_at,
        owner: Some(Owner {
            owner_email: owner_email.to_string(),
            owner_name: "Ama".to_string(),
        }),
        interests: Vec::new(),
        version: 0,
        attributes,
    }
}

fn interest(email: &str, quantity: rust_decimal::Decimal) -> Interest {
    Interest {
        id: Uuid::new_v4(),
        user_email: Some(email.to_string()),
        quantity,
        message: None,
        status: InterestStatus::Pending,
    }
}

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4())
}

fn attribute_patch(attributes: Value) -> CropPatch {
    let Value::Object(attributes) = attributes else {
        panic!("attribute patch must be an object");
    };
    CropPatch {
        attributes,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_narrowing_attribute_updates_are_modifications() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let store = PgCropStore::new(db);
    let id = store
        .insert(listing(
            &unique_email("owner"),
            Utc::now(),
            json!({ "tags": ["organic", "bulk"], "grade": { "size": "L", "colour": "red" } }),
        ))
        .await
        .unwrap();

    // Array narrowed to a prefix
    let outcome = store
        .update_fields(id, &attribute_patch(json!({ "tags": ["organic"] })))
        .await
        .unwrap();
    assert_eq!((outcome.matched, outcome.modified), (1, 1));

    // Nested object narrowed to a subset of its keys
    let outcome = store
        .update_fields(id, &attribute_patch(json!({ "grade": { "size": "L" } })))
        .await
        .unwrap();
    assert_eq!((outcome.matched, outcome.modified), (1, 1));

    // Array emptied
    let outcome = store
        .update_fields(id, &attribute_patch(json!({ "tags": [] })))
        .await
        .unwrap();
    assert_eq!((outcome.matched, outcome.modified), (1, 1));

    let stored = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.attributes.get("tags"), Some(&json!([])));
    assert_eq!(stored.attributes.get("grade"), Some(&json!({ "size": "L" })));
    assert_eq!(stored.version, 3);

    store.delete(id).await.unwrap();
}

#[tokio::test]
async fn test_update_fields_reports_matched_and_modified() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let store = PgCropStore::new(db);
    let id = store
        .insert(listing(&unique_email("owner"), Utc::now(), json!({ "unit": "kg" })))
        .await
        .unwrap();

    let same = CropPatch {
        name: Some("Sorghum".to_string()),
        quantity: Some(dec!(10)),
        ..attribute_patch(json!({ "unit": "kg" }))
    };
    let outcome = store.update_fields(id, &same).await.unwrap();
    assert_eq!((outcome.matched, outcome.modified), (1, 0));

    let change = CropPatch {
        description: Some("Red sorghum".to_string()),
        quantity: Some(dec!(8)),
        ..Default::default()
    };
    let outcome = store.update_fields(id, &change).await.unwrap();
    assert_eq!((outcome.matched, outcome.modified), (1, 1));

    let stored = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.description.as_deref(), Some("Red sorghum"));
    assert_eq!(stored.quantity, dec!(8));
    assert_eq!(stored.attributes.get("unit"), Some(&json!("kg")));

    let outcome = store.update_fields(Uuid::new_v4(), &change).await.unwrap();
    assert_eq!((outcome.matched, outcome.modified), (0, 0));

    store.delete(id).await.unwrap();
}

#[tokio::test]
async fn test_append_interest_and_lookup_by_requester() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let store = PgCropStore::new(db);
    let buyer = unique_email("buyer");
    let id = store
        .insert(listing(&unique_email("owner"), Utc::now(), json!({})))
        .await
        .unwrap();

    let first = interest(&buyer, dec!(2));
    let second = interest(&unique_email("other"), dec!(3));
    store.append_interest(id, &first).await.unwrap().unwrap();
    let updated = store.append_interest(id, &second).await.unwrap().unwrap();
    assert_eq!(updated.interests, vec![first.clone(), second]);
    assert_eq!(updated.version, 2);

    assert!(
        store
            .append_interest(Uuid::new_v4(), &first)
            .await
            .unwrap()
            .is_none()
    );

    let found = store.find_with_interests_from(&buyer).await.unwrap();
    assert_eq!(found.iter().map(|l| l.id).collect::<Vec<_>>(), vec![id]);

    store.delete(id).await.unwrap();
}

#[tokio::test]
async fn test_write_decision_requires_current_version() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let store = PgCropStore::new(db);
    let id = store
        .insert(listing(&unique_email("owner"), Utc::now(), json!({})))
        .await
        .unwrap();
    let read = store
        .append_interest(id, &interest(&unique_email("buyer"), dec!(4)))
        .await
        .unwrap()
        .unwrap();

    let mut interests = read.interests.clone();
    interests[0].status = InterestStatus::Accepted;
    let written = store
        .write_decision(id, read.version, &interests, dec!(6))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(written.quantity, dec!(6));
    assert_eq!(written.interests[0].status, InterestStatus::Accepted);
    assert_eq!(written.version, read.version + 1);

    // Same read version again: the row has moved on
    let stale = store
        .write_decision(id, read.version, &read.interests, dec!(1))
        .await
        .unwrap();
    assert!(stale.is_none());

    let stored = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, dec!(6));

    store.delete(id).await.unwrap();
}

#[tokio::test]
async fn test_latest_owner_filter_and_delete() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let store = PgCropStore::new(db);
    let owner = unique_email("owner");

    // Far enough ahead that rows from other tests sort after these
    let ahead = Utc::now() + Duration::days(365 * 100);
    let older = store.insert(listing(&owner, ahead, json!({}))).await.unwrap();
    let newer = store
        .insert(listing(&owner, ahead + Duration::seconds(1), json!({})))
        .await
        .unwrap();

    let latest = store.find_latest(2).await.unwrap();
    assert_eq!(
        latest.iter().map(|l| l.id).collect::<Vec<_>>(),
        vec![newer, older]
    );

    let mine = store.find_by_owner(Some(&owner)).await.unwrap();
    assert_eq!(mine.iter().map(|l| l.id).collect::<Vec<_>>(), vec![older, newer]);

    assert_eq!(store.delete(older).await.unwrap(), 1);
    assert_eq!(store.delete(older).await.unwrap(), 0);
    assert!(store.find_by_id(older).await.unwrap().is_none());

    store.delete(newer).await.unwrap();
}
