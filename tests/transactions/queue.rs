//! Queue planning, ordering and atomicity.

use crate::common::*;
use parking_lot::Mutex;
use seqdb::{Record, StorageError, TransactionFactory, TransactionStatus};

fn record(id: &str, name: &str) -> Record {
    Record::create(id, epoch(), attrs(json!({ "name": name })))
}

/// Opens transactions on a database and keeps a handle to each.
struct Recording<'a> {
    db: &'a Database,
    opened: Mutex<Vec<Transaction>>,
}

impl<'a> Recording<'a> {
    fn new(db: &'a Database) -> Self {
        Recording {
            db,
            opened: Mutex::new(Vec::new()),
        }
    }

    fn single(&self) -> Transaction {
        let opened = self.opened.lock();
        assert_eq!(opened.len(), 1, "expected exactly one transaction");
        opened[0].clone()
    }
}

impl TransactionFactory for Recording<'_> {
    fn open_transaction(&self, tables: &[String], mode: Mode) -> Result<Transaction> {
        let tx = self.db.open_transaction(tables, mode)?;
        self.opened.lock().push(tx.clone());
        Ok(tx)
    }
}

// ============================================================================
// Mode elevation
// ============================================================================

#[tokio::test]
async fn all_reads_open_read_only() {
    let (db, _) = open_db(&["a", "b"]);
    let queue = TransactionQueue::new()
        .with(QueueItem::read("a", "a", |t, _| Ok(t.count())))
        .with(QueueItem::read("b", "b", |t, _| Ok(t.count())));

    let plan = queue.plan().unwrap();
    assert_eq!(plan.mode, Mode::ReadOnly);
    assert_eq!(plan.tables, vec!["a", "b"]);

    let factory = Recording::new(&db);
    let results = queue.run(&factory).await.unwrap();
    assert_eq!(results.len(), 2);

    let tx = factory.single();
    assert_eq!(tx.mode(), Mode::ReadOnly);
    assert_eq!(tx.table_names(), vec!["a", "b"]);
    assert_eq!(tx.status(), TransactionStatus::Committed);
}

#[tokio::test]
async fn one_trailing_write_opens_read_write() {
    let (db, _) = open_db(&["a", "b"]);
    let queue = TransactionQueue::new()
        .with(QueueItem::read("a", "a", |t, _| Ok(t.count())))
        .with(QueueItem::read("b", "b", |t, _| Ok(t.count())))
        .with(QueueItem::write("w", "b", |t, _| Ok(t.put(record("k", "v")))));

    assert_eq!(queue.plan().unwrap().mode, Mode::ReadWrite);
    let factory = Recording::new(&db);
    queue.run(&factory).await.unwrap();
    assert_eq!(factory.single().mode(), Mode::ReadWrite);
    assert_eq!(db.table("b").unwrap().count().await.unwrap(), 1);
}

#[tokio::test]
async fn empty_queue_is_usage_error() {
    let (db, _) = open_db(&["a"]);
    let err = TransactionQueue::new().run(&db).await.unwrap_err();
    assert!(matches!(err, Error::Usage(_)));
}

// ============================================================================
// Atomicity
// ============================================================================

#[tokio::test]
async fn failing_step_rolls_back_earlier_writes() {
    let (db, _) = open_db(&["a", "b"]);
    let queue = TransactionQueue::new()
        .with(QueueItem::write("write a", "a", |t, _| Ok(t.put(record("x", "a")))))
        .with(QueueItem::write("write b", "b", |t, _| Ok(t.put(record("y", "b")))))
        .with(
            QueueItem::read("verify", "a", |t, _| Ok(t.count()))
                .then(|_| Err(Error::usage("verification failed"))),
        );

    let err = queue.run(&db).await.unwrap_err();
    assert_eq!(err, Error::usage("verification failed"));
    assert!(db.table("a").unwrap().find("x").await.unwrap().is_none());
    assert!(db.table("b").unwrap().find("y").await.unwrap().is_none());
}

#[tokio::test]
async fn failing_factory_rolls_back() {
    let (db, _) = open_db(&["a"]);
    let queue = TransactionQueue::new()
        .with(QueueItem::write("write", "a", |t, _| Ok(t.put(record("x", "a")))))
        .with(QueueItem::read("bad", "a", |_, _| Err(Error::usage("no request"))));

    assert_eq!(queue.run(&db).await.unwrap_err(), Error::usage("no request"));
    assert_eq!(db.table("a").unwrap().count().await.unwrap(), 0);
}

#[tokio::test]
async fn constraint_violation_surfaces_as_storage_error() {
    let (db, _) = open_db(&["a"]);
    db.table("a").unwrap().put(record("x", "old")).await.unwrap();

    let queue = TransactionQueue::new()
        .with(QueueItem::write("overwrite", "a", |t, _| Ok(t.put(record("x", "new")))))
        .with(QueueItem::write("dup", "a", |t, _| Ok(t.add(record("x", "dup")))));
    let err = queue.run(&db).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Storage(StorageError::ConstraintViolation(_))
    ));

    let stored = db.table("a").unwrap().get("x").await.unwrap();
    assert_eq!(stored.get("name"), Some(&json!("old")));
}

// ============================================================================
// Ordering and threading
// ============================================================================

#[tokio::test]
async fn items_run_in_order_and_thread_values() {
    let (db, _) = open_db(&["a", "b"]);
    let queue = TransactionQueue::new()
        .with(QueueItem::write("add", "a", |t, _| Ok(t.add(record("x", "a")))))
        .with(
            QueueItem::read("read back", "a", |t, previous| {
                Ok(t.get(&previous.clone().into_key()?))
            })
            .then(|response| {
                let record = response
                    .into_record()?
                    .ok_or_else(|| Error::usage("missing"))?;
                Ok(Response::Record(Some(Record::create(
                    format!("{}-copy", record.id),
                    record.created_at,
                    record.fields,
                ))))
            })
            .then(|response| Ok(response)),
        )
        .with(QueueItem::write("copy", "b", |t, previous| {
            let copy = previous
                .clone()
                .into_record()?
                .ok_or_else(|| Error::usage("missing"))?;
            Ok(t.add(copy))
        }));

    let results = queue.run(&db).await.unwrap();
    let names: Vec<&str> = results.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["add", "read back", "copy"]);
    assert_eq!(results.last(), Some(&Response::Key("x-copy".into())));

    let copy = db.table("b").unwrap().get("x-copy").await.unwrap();
    assert_eq!(copy.get("name"), Some(&json!("a")));
}

#[tokio::test]
async fn post_steps_apply_in_registration_order() {
    let (db, _) = open_db(&["a"]);
    let a = db.table("a").unwrap();
    for name in ["x", "y", "z"] {
        a.add(attrs(json!({ "name": name }))).await.unwrap();
    }

    let double = |response: Response| -> Result<Response> {
        Ok(Response::Count(response.into_count()? * 2))
    };
    let increment = |response: Response| -> Result<Response> {
        Ok(Response::Count(response.into_count()? + 1))
    };
    let queue = TransactionQueue::new()
        .with(
            QueueItem::read("double then increment", "a", |t, _| Ok(t.count()))
                .then(double)
                .then(increment),
        )
        .with(
            QueueItem::read("increment then double", "a", |t, _| Ok(t.count()))
                .then(increment)
                .then(double),
        );

    let results = queue.run(&db).await.unwrap();
    assert_eq!(
        results.get("double then increment"),
        Some(&Response::Count(7))
    );
    assert_eq!(
        results.get("increment then double"),
        Some(&Response::Count(8))
    );
}
