//! Engine state and the scheduling loop body
//!
//! Everything here runs under the engine lock. Callbacks never do: each
//! call to [`EngineState::next_work`] takes one step and hands back a
//! [`Work`] item that the dispatcher delivers after releasing the lock, so
//! callbacks are free to issue new requests.
//!
//! ## Scheduling
//!
//! Transactions are ordered by id (creation order). A waiting transaction
//! starts once no earlier live transaction conflicts with it, i.e. shares
//! a table while either side is read-write. Read-only transactions over
//! the same tables run side by side.

use super::context::{Op, PendingOp, TxnContext, TxnStatus};
use super::store::TableStore;
use crate::request::{request, Completer, NativeRequest};
use crate::schema::Schema;
use crate::traits::{SettleListener, Settlement};
use parking_lot::Mutex;
use seqdb_core::{Mode, Response, StorageError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// One deliverable unit of work.
pub(crate) enum Work {
    /// A request finished
    Complete {
        completer: Completer,
        result: Result<Response, StorageError>,
    },
    /// A transaction finished
    Settle {
        txn_id: u64,
        settlement: Settlement,
        listeners: Vec<SettleListener>,
        orphaned: Vec<Completer>,
    },
}

impl Work {
    /// Run the callbacks. Must be called without the engine lock held.
    pub fn deliver(self) {
        match self {
            Work::Complete { completer, result } => completer.settle(result),
            Work::Settle {
                txn_id,
                settlement,
                listeners,
                orphaned,
            } => {
                for completer in orphaned {
                    completer.fail(StorageError::Aborted { txn_id });
                }
                for listener in listeners {
                    listener(settlement.clone());
                }
            }
        }
    }
}

pub(crate) struct EngineState {
    pub schema: Schema,
    store: TableStore,
    live: BTreeMap<u64, TxnContext>,
    next_txn_id: u64,
}

impl EngineState {
    pub fn new(schema: Schema) -> Self {
        let store = TableStore::with_tables(schema.table_names());
        EngineState {
            schema,
            store,
            live: BTreeMap::new(),
            next_txn_id: 1,
        }
    }

    /// Register a new transaction.
    ///
    /// Returns its id and the outcome cell it will publish its settlement to.
    pub fn begin(
        &mut self,
        tables: &[String],
        mode: Mode,
    ) -> Result<(u64, Arc<Mutex<Option<Settlement>>>), StorageError> {
        if tables.is_empty() {
            return Err(StorageError::InvalidScope(
                "a transaction needs at least one table".to_string(),
            ));
        }
        let mut scope: Vec<String> = Vec::with_capacity(tables.len());
        for table in tables {
            if !self.schema.has_table(table) {
                return Err(StorageError::TableNotFound(table.clone()));
            }
            if !scope.contains(table) {
                scope.push(table.clone());
            }
        }

        let txn_id = self.next_txn_id;
        self.next_txn_id += 1;
        let ctx = TxnContext::new(txn_id, scope, mode);
        let outcome = ctx.outcome.clone();
        self.live.insert(txn_id, ctx);
        Ok((txn_id, outcome))
    }

    /// Check that `table` is usable from `txn_id`.
    pub fn check_scope(&self, txn_id: u64, table: &str) -> Result<(), StorageError> {
        let ctx = self
            .live
            .get(&txn_id)
            .ok_or(StorageError::Inactive { txn_id })?;
        if ctx.in_scope(table) {
            Ok(())
        } else {
            Err(StorageError::TableNotFound(table.to_string()))
        }
    }

    /// Queue an operation; it runs once the transaction is started and
    /// every earlier request of the same transaction has completed.
    pub fn enqueue(
        &mut self,
        txn_id: u64,
        table: &str,
        op: Op,
    ) -> Result<NativeRequest, StorageError> {
        let ctx = self
            .live
            .get_mut(&txn_id)
            .ok_or(StorageError::Inactive { txn_id })?;
        if !ctx.accepts_requests() {
            return Err(StorageError::Inactive { txn_id });
        }
        if !ctx.in_scope(table) {
            return Err(StorageError::TableNotFound(table.to_string()));
        }
        if op.is_write() && !ctx.mode.allows_writes() {
            return Err(StorageError::ReadOnly {
                txn_id,
                table: table.to_string(),
            });
        }

        let (req, completer) = request();
        ctx.queue.push_back(PendingOp {
            table: table.to_string(),
            op,
            completer,
        });
        Ok(req)
    }

    pub fn request_commit(&mut self, txn_id: u64) -> Result<(), StorageError> {
        let ctx = self
            .live
            .get_mut(&txn_id)
            .ok_or(StorageError::Inactive { txn_id })?;
        if !ctx.accepts_requests() {
            return Err(StorageError::Inactive { txn_id });
        }
        ctx.commit_requested = true;
        Ok(())
    }

    /// Mark a transaction for abort. No-op if it already finished or is
    /// already terminating.
    pub fn request_abort(&mut self, txn_id: u64) -> bool {
        match self.live.get_mut(&txn_id) {
            Some(ctx) if ctx.termination.is_none() => {
                ctx.termination = Some(Settlement::Aborted);
                true
            }
            _ => false,
        }
    }

    /// Abort a transaction whose owner went away without committing.
    pub fn abandon(&mut self, txn_id: u64) -> bool {
        match self.live.get(&txn_id) {
            Some(ctx) if !ctx.commit_requested => self.request_abort(txn_id),
            _ => false,
        }
    }

    /// Register a settlement listener.
    ///
    /// Hands the listener back if the transaction already finished.
    pub fn add_listener(&mut self, txn_id: u64, listener: SettleListener) -> Option<SettleListener> {
        match self.live.get_mut(&txn_id) {
            Some(ctx) => {
                ctx.listeners.push(listener);
                None
            }
            None => Some(listener),
        }
    }

    /// Take one scheduling step.
    pub fn next_work(&mut self) -> Option<Work> {
        self.start_eligible();

        let mut finish = None;
        for (&txn_id, ctx) in self.live.iter_mut() {
            if let Some(settlement) = ctx.termination.clone() {
                finish = Some((txn_id, settlement));
                break;
            }
            if ctx.status != TxnStatus::Running {
                continue;
            }
            if let Some(pending) = ctx.queue.pop_front() {
                let result = ctx.execute(&self.store, &pending.table, pending.op);
                if let Err(error) = &result {
                    trace!(txn_id, %error, "request failed, transaction will abort");
                    ctx.termination = Some(Settlement::Errored(error.clone()));
                }
                return Some(Work::Complete {
                    completer: pending.completer,
                    result,
                });
            }
            if ctx.commit_requested {
                finish = Some((txn_id, Settlement::Committed));
                break;
            }
        }

        let (txn_id, settlement) = finish?;
        self.finish(txn_id, settlement)
    }

    fn start_eligible(&mut self) {
        let startable: Vec<u64> = self
            .live
            .iter()
            .filter(|(txn_id, ctx)| {
                ctx.status == TxnStatus::Waiting
                    && !self
                        .live
                        .range(..**txn_id)
                        .any(|(_, earlier)| earlier.conflicts_with(ctx))
            })
            .map(|(txn_id, _)| *txn_id)
            .collect();

        for txn_id in startable {
            if let Some(ctx) = self.live.get_mut(&txn_id) {
                trace!(txn_id, mode = %ctx.mode, "transaction started");
                ctx.status = TxnStatus::Running;
            }
        }
    }

    fn finish(&mut self, txn_id: u64, settlement: Settlement) -> Option<Work> {
        let mut ctx = self.live.remove(&txn_id)?;
        if settlement == Settlement::Committed {
            trace!(txn_id, writes = ctx.pending_writes(), "applying commit");
            ctx.apply(&mut self.store);
        }
        *ctx.outcome.lock() = Some(settlement.clone());

        Some(Work::Settle {
            txn_id,
            settlement,
            listeners: std::mem::take(&mut ctx.listeners),
            orphaned: ctx.queue.drain(..).map(|pending| pending.completer).collect(),
        })
    }

    /// Number of live transactions.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
