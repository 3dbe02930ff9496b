//! Optimistic-concurrency updates.

use crate::common::*;
use chrono::Duration;
use seqdb::Clock;

#[tokio::test]
async fn chained_updates_bump_revision_by_one() {
    let (db, clock) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    let mut record = items.add(attrs(json!({"n": 0}))).await.unwrap();
    for n in 1..=5u64 {
        clock.advance(Duration::seconds(1));
        let next = items
            .update(&record.id, record.revision, attrs(json!({"n": n})))
            .await
            .unwrap();
        assert_eq!(next.revision, record.revision + 1);
        assert_eq!(next.updated_at, Some(clock.now()));
        assert_eq!(next.created_at, record.created_at);
        assert_eq!(next.get("n"), Some(&json!(n)));
        record = next;
    }
    assert_eq!(items.get(&record.id).await.unwrap(), record);
}

#[tokio::test]
async fn update_merges_over_existing_fields() {
    let (db, _) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    let created = items
        .add(attrs(json!({"name": "x", "size": 3})))
        .await
        .unwrap();
    let updated = items
        .update(&created.id, 1, attrs(json!({"name": "y", "revision": 99, "id": "other"})))
        .await
        .unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.revision, 2);
    assert_eq!(updated.get("name"), Some(&json!("y")));
    assert_eq!(updated.get("size"), Some(&json!(3)));
}

#[tokio::test]
async fn update_missing_record_is_not_found() {
    let (db, _) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    let err = items
        .update("ghost", 1, attrs(json!({"name": "y"})))
        .await
        .unwrap_err();
    assert_eq!(err, Error::not_found("items", "ghost"));
    assert_eq!(items.count().await.unwrap(), 0);
}

#[tokio::test]
async fn stale_update_writes_nothing() {
    let (db, _) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    let created = items.add(attrs(json!({"name": "x"}))).await.unwrap();
    let err = items
        .update(&created.id, 5, attrs(json!({"name": "stale"})))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        Error::RevisionMismatch {
            expected: 5,
            actual: 1
        }
    );
    assert!(err.is_retryable());
    assert_eq!(items.get(&created.id).await.unwrap(), created);
}

#[tokio::test]
async fn concurrent_updates_exactly_one_wins() {
    let (db, _) = open_db(&["items"]);
    let items = db.table("items").unwrap();
    let created = items.add(attrs(json!({"name": "x"}))).await.unwrap();

    let (first, second) = tokio::join!(
        items.update(&created.id, 1, attrs(json!({"name": "first"}))),
        items.update(&created.id, 1, attrs(json!({"name": "second"}))),
    );

    let (winner, loser) = match (first, second) {
        (Ok(winner), Err(loser)) => (winner, loser),
        (Err(loser), Ok(winner)) => (winner, loser),
        other => panic!("expected exactly one winner, got {:?}", other),
    };
    assert_eq!(winner.revision, 2);
    assert_eq!(
        loser,
        Error::RevisionMismatch {
            expected: 1,
            actual: winner.revision
        }
    );

    let stored = items.get(&created.id).await.unwrap();
    assert_eq!(stored, winner);
}

#[tokio::test]
async fn concurrent_updates_across_tasks() {
    let (db, _) = open_db(&["items"]);
    let items = db.table("items").unwrap().clone();
    let created = items.add(Attributes::new()).await.unwrap();

    let mut handles = Vec::new();
    for n in 0..8 {
        let items = items.clone();
        let id = created.id.clone();
        handles.push(tokio::spawn(async move {
            items.update(&id, 1, attrs(json!({ "writer": n }))).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(record) => {
                wins += 1;
                assert_eq!(record.revision, 2);
            }
            Err(err) => assert!(err.is_conflict(), "unexpected error: {err}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(items.get(&created.id).await.unwrap().revision, 2);
}

#[tokio::test]
async fn add_update_stale_update_scenario() {
    let (db, clock) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    let created = items.add(attrs(json!({"name": "x"}))).await.unwrap();
    assert_eq!(created.revision, 1);

    clock.advance(Duration::minutes(1));
    let updated = items
        .update(&created.id, 1, attrs(json!({"name": "y"})))
        .await
        .unwrap();
    assert_eq!(updated.revision, 2);
    assert_eq!(updated.updated_at, Some(epoch() + Duration::minutes(1)));

    let err = items
        .update(&created.id, 1, attrs(json!({"name": "z"})))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        Error::RevisionMismatch {
            expected: 1,
            actual: 2
        }
    );
    assert_eq!(
        items.get(&created.id).await.unwrap().get("name"),
        Some(&json!("y"))
    );
}

#[tokio::test]
async fn update_at_last_revision_is_rejected() {
    let (db, _) = open_db(&["items"]);
    let items = db.table("items").unwrap();

    let created = items.add(attrs(json!({"name": "x"}))).await.unwrap();
    let exhausted = items
        .put(Record {
            revision: u64::MAX,
            ..created
        })
        .await
        .unwrap();

    let err = items
        .update(&exhausted.id, u64::MAX, attrs(json!({"name": "y"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Usage(_)), "unexpected error: {err}");
    assert_eq!(items.get(&exhausted.id).await.unwrap(), exhausted);

    // The store keeps serving requests
    let later = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        items.add(attrs(json!({"name": "later"}))),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(later.revision, 1);
    assert_eq!(items.count().await.unwrap(), 2);
}
