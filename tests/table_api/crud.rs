//! Create, read, overwrite and delete.

use crate::common::*;
use chrono::Duration;

// ============================================================================
// add / get / find
// ============================================================================

#[tokio::test]
async fn add_then_get_returns_first_revision() {
    let (db, _) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    let created = items.add(attrs(json!({"name": "x"}))).await.unwrap();
    assert_eq!(created.id, "rec-1");
    assert_eq!(created.revision, 1);
    assert_eq!(created.created_at, epoch());
    assert!(created.updated_at.is_none());

    let fetched = items.get(&created.id).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.get("name"), Some(&json!("x")));
}

#[tokio::test]
async fn add_ignores_reserved_attributes() {
    let (db, _) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    let created = items
        .add(attrs(json!({
            "id": "forged",
            "revision": 42,
            "createdAt": "1999-01-01T00:00:00Z",
            "name": "x"
        })))
        .await
        .unwrap();
    assert_eq!(created.id, "rec-1");
    assert_eq!(created.revision, 1);
    assert_eq!(created.created_at, epoch());
    assert!(items.find("forged").await.unwrap().is_none());
}

#[tokio::test]
async fn missing_record() {
    let (db, _) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    assert!(items.find("nope").await.unwrap().is_none());
    let err = items.get("nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err, Error::not_found("items", "nope"));
}

#[tokio::test]
async fn record_serializes_to_persisted_shape() {
    let (db, clock) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    let created = items.add(attrs(json!({"name": "x"}))).await.unwrap();
    clock.advance(Duration::seconds(5));
    let updated = items
        .update(&created.id, 1, attrs(json!({"name": "y"})))
        .await
        .unwrap();

    assert_eq!(
        updated.to_json(),
        json!({
            "id": "rec-1",
            "revision": 2,
            "createdAt": "2024-01-01T00:00:00+00:00",
            "updatedAt": "2024-01-01T00:00:05+00:00",
            "name": "y"
        })
    );
}

// ============================================================================
// count / put / delete / clear
// ============================================================================

#[tokio::test]
async fn count_tracks_adds_and_deletes() {
    let (db, _) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    assert_eq!(items.count().await.unwrap(), 0);
    let a = items.add(Attributes::new()).await.unwrap();
    items.add(Attributes::new()).await.unwrap();
    assert_eq!(items.count().await.unwrap(), 2);

    items.delete(&a.id).await.unwrap();
    assert_eq!(items.count().await.unwrap(), 1);
}

#[tokio::test]
async fn put_overwrites_without_revision_check() {
    let (db, _) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    let created = items.add(attrs(json!({"name": "x"}))).await.unwrap();
    let mut replacement = created.clone();
    replacement.revision = 7;
    replacement.fields = attrs(json!({"name": "replaced"}));

    items.put(replacement.clone()).await.unwrap();
    assert_eq!(items.get(&created.id).await.unwrap(), replacement);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (db, _) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    let created = items.add(Attributes::new()).await.unwrap();
    assert!(items.delete(&created.id).await.unwrap());
    assert!(items.delete(&created.id).await.unwrap());
    assert!(items.delete("never-existed").await.unwrap());
    assert!(items.find(&created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn clear_removes_everything() {
    let (db, _) = open_db(&["items", "other"]);
    let items = db.table("items").unwrap();
    let other = db.table("other").unwrap();

    for _ in 0..3 {
        items.add(Attributes::new()).await.unwrap();
    }
    other.add(Attributes::new()).await.unwrap();

    items.clear().await.unwrap();
    assert_eq!(items.count().await.unwrap(), 0);
    assert_eq!(other.count().await.unwrap(), 1);
}

#[tokio::test]
async fn tables_are_isolated() {
    let (db, _) = open_db(&["a", "b"]);
    let created = db.table("a").unwrap().add(Attributes::new()).await.unwrap();
    assert!(db.table("b").unwrap().find(&created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn unregistered_table_is_usage_error() {
    let (db, _) = open_db(&["items"]);
    assert!(matches!(db.table("orders"), Err(Error::Usage(_))));
}
