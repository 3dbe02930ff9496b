//! Public types for the seqdb API.
//!
//! This module re-exports types from internal crates with a clean public interface.

// Records
pub use seqdb_core::{Attributes, Record, RESERVED_FIELDS};

// Native operation results and access modes
pub use seqdb_core::{Mode, Response};

// Injected services
pub use seqdb_core::{Clock, IdGenerator, ManualClock, SystemClock, UuidGenerator};

// Errors
pub use seqdb_core::{Error, Result, StorageError};

// Transactions and sequencing
pub use seqdb_concurrency::{
    from_fn, AsyncRequest, Outcome, QueueItem, QueuePlan, QueueResults, Sequence, Step,
    TransactingTable, Transaction, TransactionFactory, TransactionQueue, TransactionStatus,
};

// Native engine boundary
pub use seqdb_storage::{Connection, MemoryEngine, NativeTransaction, ObjectStore, Schema, Settlement};

/// Build [`Attributes`] from a JSON object.
///
/// Non-object values yield empty attributes.
///
/// # Example
///
/// ```
/// use seqdb::attributes;
/// use serde_json::json;
///
/// let attrs = attributes(json!({"name": "x"}));
/// assert_eq!(attrs.get("name"), Some(&json!("x")));
/// assert!(attributes(json!(3)).is_empty());
/// ```
pub fn attributes(value: serde_json::Value) -> Attributes {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Attributes::new(),
    }
}
