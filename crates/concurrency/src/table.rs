//! Per-transaction table handle

use crate::lifecycle::Lifecycle;
use crate::request::AsyncRequest;
use seqdb_core::{Record, StorageError};
use seqdb_storage::{NativeRequest, ObjectStore};
use std::fmt;
use std::sync::Arc;

/// One table as seen from inside a transaction.
///
/// Each method returns an [`AsyncRequest`] bound to the enclosing
/// transaction; nothing starts until the request is run. Requests started
/// after the transaction stopped being active fail with
/// `Error::TransactionClosed`.
pub struct TransactingTable {
    name: String,
    txn_id: u64,
    store: Arc<dyn ObjectStore>,
    lifecycle: Arc<Lifecycle>,
}

impl TransactingTable {
    pub(crate) fn new(
        name: String,
        txn_id: u64,
        store: Arc<dyn ObjectStore>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        TransactingTable {
            name,
            txn_id,
            store,
            lifecycle,
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the owning transaction.
    pub fn transaction_id(&self) -> u64 {
        self.txn_id
    }

    /// Look up a record. Settles with `Response::Record(None)` if absent.
    pub fn get(&self, id: &str) -> AsyncRequest {
        let id = id.to_string();
        self.request("get", move |store| store.get(&id))
    }

    /// Count the records of the table.
    pub fn count(&self) -> AsyncRequest {
        self.request("count", |store| store.count())
    }

    /// Insert a record; fails if its id already exists.
    pub fn add(&self, record: Record) -> AsyncRequest {
        self.request("add", move |store| store.add(record))
    }

    /// Insert or overwrite a record.
    pub fn put(&self, record: Record) -> AsyncRequest {
        self.request("put", move |store| store.put(record))
    }

    /// Remove a record, whether or not it exists.
    pub fn delete(&self, id: &str) -> AsyncRequest {
        let id = id.to_string();
        self.request("delete", move |store| store.delete(&id))
    }

    /// Remove every record of the table.
    pub fn clear(&self) -> AsyncRequest {
        self.request("clear", |store| store.clear())
    }

    fn request(
        &self,
        op: &str,
        start: impl FnOnce(&dyn ObjectStore) -> Result<NativeRequest, StorageError> + Send + 'static,
    ) -> AsyncRequest {
        let store = self.store.clone();
        let lifecycle = self.lifecycle.clone();
        AsyncRequest::new(self.txn_id, format!("{}.{}", self.name, op), move || {
            lifecycle.ensure_active()?;
            Ok(start(store.as_ref())?)
        })
    }
}

impl fmt::Debug for TransactingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactingTable")
            .field("name", &self.name)
            .field("txn_id", &self.txn_id)
            .finish()
    }
}
