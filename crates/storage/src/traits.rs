//! Native storage engine traits
//!
//! The engine is asynchronous and callback based: a transaction spans
//! several table operations and commits or aborts atomically, and every
//! operation reports its result through a notification on the returned
//! [`NativeRequest`] rather than a return value.
//!
//! Engines must guarantee:
//! - each request settles exactly once (success or error)
//! - each transaction settles exactly once ([`Settlement`])
//! - read-write transactions with overlapping scopes never interleave

use crate::request::NativeRequest;
use seqdb_core::{Mode, Record, StorageError};
use std::sync::Arc;

/// How a native transaction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// All operations are durable
    Committed,
    /// A request failed and the engine aborted the transaction
    Errored(StorageError),
    /// The transaction was aborted on request
    Aborted,
}

/// Callback fired once when a native transaction settles.
pub type SettleListener = Box<dyn FnOnce(Settlement) + Send>;

/// An open connection to a named, versioned store.
pub trait Connection: Send + Sync {
    /// Store name.
    fn name(&self) -> &str;

    /// Schema version the store was opened at.
    fn version(&self) -> u32;

    /// Tables present in the schema.
    fn table_names(&self) -> Vec<String>;

    /// Open a transaction over `tables`.
    fn transaction(
        &self,
        tables: &[String],
        mode: Mode,
    ) -> Result<Box<dyn NativeTransaction>, StorageError>;
}

/// One native atomic commit scope.
pub trait NativeTransaction: Send + Sync {
    /// Engine-assigned transaction id.
    fn id(&self) -> u64;

    /// Access mode.
    fn mode(&self) -> Mode;

    /// Handle to one table in scope.
    fn object_store(&self, table: &str) -> Result<Arc<dyn ObjectStore>, StorageError>;

    /// Register a settlement listener.
    ///
    /// Fires immediately if the transaction already settled.
    fn on_settled(&self, listener: SettleListener);

    /// Request commit once outstanding requests have completed.
    fn commit(&self) -> Result<(), StorageError>;

    /// Abort, discarding all writes. No-op once settled.
    fn abort(&self);
}

/// Per-transaction handle to one table.
///
/// Every method starts one native operation. An `Err` return means the
/// operation was rejected synchronously and never started.
pub trait ObjectStore: Send + Sync {
    /// Table name.
    fn name(&self) -> &str;

    /// Look up a record; settles with `Response::Record(None)` if absent.
    fn get(&self, id: &str) -> Result<NativeRequest, StorageError>;

    /// Count records; settles with `Response::Count`.
    fn count(&self) -> Result<NativeRequest, StorageError>;

    /// Insert a record; fails if the id already exists.
    fn add(&self, record: Record) -> Result<NativeRequest, StorageError>;

    /// Insert or overwrite a record.
    fn put(&self, record: Record) -> Result<NativeRequest, StorageError>;

    /// Remove a record; succeeds whether or not it existed.
    fn delete(&self, id: &str) -> Result<NativeRequest, StorageError>;

    /// Remove every record of the table.
    fn clear(&self) -> Result<NativeRequest, StorageError>;
}
