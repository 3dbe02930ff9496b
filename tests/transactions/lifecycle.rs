//! Commit, abort and settlement.

use crate::common::*;
use seqdb::{StorageError, TransactionStatus};
use std::future::IntoFuture;
use std::time::Duration;

#[tokio::test]
async fn explicit_commit_publishes_writes() {
    let (db, _) = open_db(&["items"]);
    let tx = db.transaction(&["items"], Mode::ReadWrite).unwrap();
    assert!(tx.is_active());

    let record = Record::create("k", epoch(), Attributes::new());
    tx.table("items").unwrap().put(record.clone()).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(tx.status(), TransactionStatus::Committed);
    assert_eq!(db.table("items").unwrap().get("k").await.unwrap(), record);
}

#[tokio::test]
async fn settled_transaction_rejects_operations() {
    let (db, _) = open_db(&["items"]);
    let tx = db.transaction(&["items"], Mode::ReadWrite).unwrap();
    tx.abort();
    tx.done().await.unwrap_err();

    let err = tx.table("items").unwrap().count().await.unwrap_err();
    assert_eq!(err, Error::TransactionClosed { txn_id: tx.id() });
}

#[tokio::test]
async fn abort_after_commit_is_noop() {
    let (db, _) = open_db(&["items"]);
    let tx = db.transaction(&["items"], Mode::ReadWrite).unwrap();
    tx.commit().await.unwrap();

    tx.abort();
    tx.abort();
    assert_eq!(tx.status(), TransactionStatus::Committed);
    assert_eq!(tx.done().await, Ok(()));
}

#[tokio::test]
async fn abort_discards_writes() {
    let (db, _) = open_db(&["items"]);
    let tx = db.transaction(&["items"], Mode::ReadWrite).unwrap();
    tx.table("items")
        .unwrap()
        .put(Record::create("k", epoch(), Attributes::new()))
        .await
        .unwrap();

    tx.abort();
    assert_eq!(
        tx.done().await,
        Err(Error::Storage(StorageError::Aborted { txn_id: tx.id() }))
    );
    assert_eq!(db.table("items").unwrap().count().await.unwrap(), 0);
}

#[tokio::test]
async fn caller_side_timeout_then_abort() {
    let (db, _) = open_db(&["items"]);
    let holder = db.transaction(&["items"], Mode::ReadWrite).unwrap();
    let waiting = db.transaction(&["items"], Mode::ReadOnly).unwrap();

    // Blocked behind `holder`, so its request never completes on its own
    let pending = waiting.table("items").unwrap().count().into_future();
    let timed_out = tokio::time::timeout(Duration::from_millis(25), waiting.done()).await;
    assert!(timed_out.is_err());

    waiting.abort();
    assert_eq!(
        pending.await,
        Err(Error::Storage(StorageError::Aborted {
            txn_id: waiting.id()
        }))
    );
    assert_eq!(waiting.status(), TransactionStatus::Aborted);
    holder.commit().await.unwrap();
}

#[tokio::test]
async fn read_only_transaction_rejects_writes() {
    let (db, _) = open_db(&["items"]);
    let tx = db.transaction(&["items"], Mode::ReadOnly).unwrap();
    let err = tx
        .table("items")
        .unwrap()
        .put(Record::create("k", epoch(), Attributes::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::ReadOnly { .. })));
}

#[tokio::test]
async fn unknown_scope_rejected_at_open() {
    let (db, _) = open_db(&["items"]);
    let err = db.transaction(&["missing"], Mode::ReadOnly).unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::TableNotFound(_))));
}

#[tokio::test]
async fn abort_between_steps_fails_the_run_with_abort_error() {
    let (db, _) = open_db(&["items"]);
    let tx = db.transaction(&["items"], Mode::ReadWrite).unwrap();

    let mut stage = 0;
    let err = tx
        .run(from_fn(move |tx, _| -> Result<Step<()>> {
            stage += 1;
            let items = tx.table("items")?;
            match stage {
                1 => Ok(Step::Await(
                    items.put(Record::create("k", epoch(), Attributes::new())),
                )),
                2 => {
                    tx.abort();
                    Ok(Step::Await(items.count()))
                }
                _ => Ok(Step::Done(())),
            }
        }))
        .await
        .unwrap_err();
    assert_eq!(err, Error::Storage(StorageError::Aborted { txn_id: tx.id() }));
    assert_eq!(tx.status(), TransactionStatus::Aborted);
    assert!(db.table("items").unwrap().find("k").await.unwrap().is_none());
}
