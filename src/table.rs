//! Record API for one table
//!
//! Every call runs in its own transaction, built as a
//! [`TransactionQueue`]. Identity and timestamps come from the database's
//! injected services.
//!
//! # Example
//!
//! ```ignore
//! let items = db.table("items")?;
//!
//! let created = items.add(attrs(json!({"name": "x"}))).await?;
//! let updated = items
//!     .update(&created.id, created.revision, attrs(json!({"name": "y"})))
//!     .await?;
//! assert_eq!(updated.revision, 2);
//! ```

use crate::database::Context;
use seqdb_concurrency::{QueueItem, TransactionQueue};
use seqdb_core::{Attributes, Error, Record, Response, Result};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Record operations on one table.
///
/// Cheap to clone; holds no per-operation state.
#[derive(Clone)]
pub struct Table {
    name: String,
    context: Arc<Context>,
}

impl Table {
    pub(crate) fn new(name: String, context: Arc<Context>) -> Self {
        Table { name, context }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a record.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if no record has this id.
    pub async fn get(&self, id: &str) -> Result<Record> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::not_found(&self.name, id))
    }

    /// Get a record, or `None` if no record has this id.
    pub async fn find(&self, id: &str) -> Result<Option<Record>> {
        let id = id.to_string();
        let queue = TransactionQueue::new()
            .with(QueueItem::read("get", &self.name, move |t, _| Ok(t.get(&id))));
        self.run(queue).await?.into_record()
    }

    /// Number of records.
    pub async fn count(&self) -> Result<u64> {
        let queue = TransactionQueue::new()
            .with(QueueItem::read("count", &self.name, |t, _| Ok(t.count())));
        self.run(queue).await?.into_count()
    }

    /// Create a record from `attributes`.
    ///
    /// The record gets a fresh id, revision 1 and `createdAt = now`;
    /// attributes named like those fields are ignored.
    pub async fn add(&self, attributes: Attributes) -> Result<Record> {
        let record = Record::create(
            self.context.ids.generate(),
            self.context.clock.now(),
            attributes,
        );
        let stored = record.clone();
        let queue = TransactionQueue::new()
            .with(QueueItem::write("add", &self.name, move |t, _| Ok(t.add(record))));
        self.run(queue).await?;
        Ok(stored)
    }

    /// Update a record under optimistic concurrency control.
    ///
    /// Reads the record, checks that its revision is `current_revision`,
    /// merges `attributes` over it, bumps the revision and refreshes
    /// `updatedAt`. Read, check and write run in one read-write
    /// transaction.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if no record has this id
    /// - `Error::RevisionMismatch` if the record moved past
    ///   `current_revision`; nothing is written
    pub async fn update(
        &self,
        id: &str,
        current_revision: u64,
        attributes: Attributes,
    ) -> Result<Record> {
        let table = self.name.clone();
        let key = id.to_string();
        let target = id.to_string();
        let clock = self.context.clock.clone();

        let queue = TransactionQueue::new()
            .with(
                QueueItem::read("current", &self.name, move |t, _| Ok(t.get(&key))).then(
                    move |response| {
                        let current = response
                            .into_record()?
                            .ok_or_else(|| Error::not_found(&table, &target))?;
                        if current.revision != current_revision {
                            debug!(
                                table = %table,
                                id = %target,
                                expected = current_revision,
                                actual = current.revision,
                                "stale update rejected"
                            );
                            return Err(Error::RevisionMismatch {
                                expected: current_revision,
                                actual: current.revision,
                            });
                        }
                        let next = current_revision.checked_add(1).ok_or_else(|| {
                            Error::usage(format!(
                                "record '{}' in '{}' is at the last revision",
                                target, table
                            ))
                        })?;
                        let merged = current.merged(attributes, next, clock.now());
                        Ok(Response::Record(Some(merged)))
                    },
                ),
            )
            .with(QueueItem::write("merged", &self.name, |t, previous| {
                let merged = previous
                    .clone()
                    .into_record()?
                    .ok_or_else(|| Error::usage("no merged record to write"))?;
                Ok(t.put(merged))
            }));

        let mut results = self.run_queue(queue).await?;
        results
            .take("current")
            .ok_or_else(|| Error::usage("update finished without a merged record"))?
            .into_record()?
            .ok_or_else(|| Error::not_found(&self.name, id))
    }

    /// Store `record` as is, overwriting any existing record with its id.
    ///
    /// No revision check.
    pub async fn put(&self, record: Record) -> Result<Record> {
        let stored = record.clone();
        let queue = TransactionQueue::new()
            .with(QueueItem::write("put", &self.name, move |t, _| Ok(t.put(record))));
        self.run(queue).await?;
        Ok(stored)
    }

    /// Delete a record. Resolves `true` whether or not it existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let queue = TransactionQueue::new()
            .with(QueueItem::write("delete", &self.name, move |t, _| Ok(t.delete(&id))));
        self.run(queue).await?;
        Ok(true)
    }

    /// Delete every record.
    pub async fn clear(&self) -> Result<()> {
        let queue = TransactionQueue::new()
            .with(QueueItem::write("clear", &self.name, |t, _| Ok(t.clear())));
        self.run(queue).await?;
        Ok(())
    }

    /// Run a queue and return its last value.
    async fn run(&self, queue: TransactionQueue) -> Result<Response> {
        self.run_queue(queue)
            .await?
            .into_last()
            .ok_or_else(|| Error::usage("transaction queue produced no result"))
    }

    async fn run_queue(&self, queue: TransactionQueue) -> Result<seqdb_concurrency::QueueResults> {
        queue.run(self.context.connection.as_ref()).await
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table").field("name", &self.name).finish()
    }
}
