//! Per-transaction state of the in-memory engine
//!
//! A [`TxnContext`] buffers every write of its transaction:
//! - `write_set`: records put or added (latest value wins)
//! - `delete_set`: ids deleted or cleared
//!
//! The two sets are kept disjoint. Reads go through the context first
//! (read-your-writes, read-your-deletes) and fall back to committed data.
//! At commit the sets are applied to the [`TableStore`] in one batch; on
//! abort they are simply dropped, so an aborted transaction writes nothing.

use super::store::TableStore;
use crate::request::Completer;
use crate::traits::{SettleListener, Settlement};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use seqdb_core::{Mode, Record, Response, StorageError};
use std::collections::VecDeque;
use std::sync::Arc;

/// Buffered key: table plus record id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Key {
    pub table: String,
    pub id: String,
}

impl Key {
    pub fn new(table: &str, id: &str) -> Self {
        Key {
            table: table.to_string(),
            id: id.to_string(),
        }
    }
}

/// A native operation waiting for its transaction to run it.
#[derive(Debug)]
pub(crate) enum Op {
    Get(String),
    Count,
    Add(Record),
    Put(Record),
    Delete(String),
    Clear,
}

impl Op {
    pub fn is_write(&self) -> bool {
        matches!(self, Op::Add(_) | Op::Put(_) | Op::Delete(_) | Op::Clear)
    }
}

pub(crate) struct PendingOp {
    pub table: String,
    pub op: Op,
    pub completer: Completer,
}

/// Scheduling state.
///
/// State transitions:
/// - `Waiting` → `Running` (no earlier conflicting transaction is live)
///
/// Finishing removes the context from the engine, so there is no terminal
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxnStatus {
    /// Queued behind an earlier transaction with an overlapping scope
    Waiting,
    /// Executing requests
    Running,
}

pub(crate) struct TxnContext {
    pub txn_id: u64,
    pub scope: Vec<String>,
    pub mode: Mode,
    pub status: TxnStatus,

    /// Commit requested; applied once `queue` drains
    pub commit_requested: bool,

    /// Set when the transaction must end without committing
    pub termination: Option<Settlement>,

    /// Requests in issue order
    pub queue: VecDeque<PendingOp>,

    /// Shared with the native handle so late listeners can read it
    pub outcome: Arc<Mutex<Option<Settlement>>>,

    pub listeners: Vec<SettleListener>,

    write_set: FxHashMap<Key, Record>,
    delete_set: FxHashSet<Key>,
}

impl TxnContext {
    pub fn new(txn_id: u64, scope: Vec<String>, mode: Mode) -> Self {
        TxnContext {
            txn_id,
            scope,
            mode,
            status: TxnStatus::Waiting,
            commit_requested: false,
            termination: None,
            queue: VecDeque::new(),
            outcome: Arc::new(Mutex::new(None)),
            listeners: Vec::new(),
            write_set: FxHashMap::default(),
            delete_set: FxHashSet::default(),
        }
    }

    /// Check if new requests may be issued.
    pub fn accepts_requests(&self) -> bool {
        !self.commit_requested && self.termination.is_none()
    }

    pub fn in_scope(&self, table: &str) -> bool {
        self.scope.iter().any(|t| t == table)
    }

    /// Two transactions conflict when their scopes overlap and at least
    /// one of them writes.
    pub fn conflicts_with(&self, other: &TxnContext) -> bool {
        let overlaps = self.scope.iter().any(|t| other.in_scope(t));
        overlaps && (self.mode.allows_writes() || other.mode.allows_writes())
    }

    /// Run one operation against the buffered view.
    pub fn execute(
        &mut self,
        store: &TableStore,
        table: &str,
        op: Op,
    ) -> Result<Response, StorageError> {
        match op {
            Op::Get(id) => Ok(Response::Record(self.get(store, table, &id))),
            Op::Count => Ok(Response::Count(self.count(store, table))),
            Op::Add(record) => {
                if self.get(store, table, &record.id).is_some() {
                    return Err(StorageError::ConstraintViolation(format!(
                        "key '{}' already exists in table '{}'",
                        record.id, table
                    )));
                }
                Ok(Response::Key(self.put(table, record)))
            }
            Op::Put(record) => Ok(Response::Key(self.put(table, record))),
            Op::Delete(id) => {
                let key = Key::new(table, &id);
                self.write_set.remove(&key);
                self.delete_set.insert(key);
                Ok(Response::Empty)
            }
            Op::Clear => {
                self.write_set.retain(|key, _| key.table != table);
                for id in store.ids(table) {
                    self.delete_set.insert(Key::new(table, &id));
                }
                Ok(Response::Empty)
            }
        }
    }

    /// Implements read-your-writes:
    /// 1. Check write_set (uncommitted writes from this txn)
    /// 2. Check delete_set (uncommitted deletes from this txn)
    /// 3. Read committed data
    fn get(&self, store: &TableStore, table: &str, id: &str) -> Option<Record> {
        let key = Key::new(table, id);
        if let Some(record) = self.write_set.get(&key) {
            return Some(record.clone());
        }
        if self.delete_set.contains(&key) {
            return None;
        }
        store.get(table, id).cloned()
    }

    fn count(&self, store: &TableStore, table: &str) -> u64 {
        let committed = store.len(table);
        let removed = self
            .delete_set
            .iter()
            .filter(|key| key.table == table && store.contains(table, &key.id))
            .count();
        let added = self
            .write_set
            .keys()
            .filter(|key| key.table == table && !store.contains(table, &key.id))
            .count();
        (committed - removed + added) as u64
    }

    fn put(&mut self, table: &str, record: Record) -> String {
        let key = Key::new(table, &record.id);
        let id = record.id.clone();
        self.delete_set.remove(&key);
        self.write_set.insert(key, record);
        id
    }

    /// Apply buffered writes to committed storage.
    pub fn apply(&mut self, store: &mut TableStore) {
        for key in self.delete_set.drain() {
            store.delete(&key.table, &key.id);
        }
        for (key, record) in self.write_set.drain() {
            store.put(&key.table, record);
        }
    }

    /// Number of buffered writes and deletes.
    pub fn pending_writes(&self) -> usize {
        self.write_set.len() + self.delete_set.len()
    }
}
