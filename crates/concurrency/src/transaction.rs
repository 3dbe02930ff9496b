//! Transactions and the sequencing engine
//!
//! A [`Transaction`] wraps one native transaction, owns one
//! [`TransactingTable`] per table in scope, and drives [`Sequence`]s.
//!
//! ## Driving a sequence
//!
//! [`Transaction::run`] starts the sequence immediately. Each awaited
//! request is run with a continuation that resumes the sequence from
//! inside the request's completion callback, so operation N+1 is issued
//! only after operation N settled. When the sequence is done the engine
//! requests commit and resolves once the native commit notification fires.
//!
//! Any failure (an `Err` or a panic from the sequence, a failed request, or
//! a request that belongs to another transaction) aborts the native
//! transaction. The run resolves with the first error once the abort has
//! settled. A transaction aborted by its owner between steps issues
//! nothing further and resolves with the abort error.
//!
//! Requests that complete before `run` returns (an engine settling them
//! synchronously) are resumed in a loop on the issuing thread rather than
//! by recursion.

use crate::lifecycle::{Lifecycle, TransactionStatus};
use crate::request::Outcome;
use crate::sequence::{Sequence, Step};
use crate::table::TransactingTable;
use seqdb_core::{Error, Mode, Response, Result};
use parking_lot::Mutex;
use seqdb_storage::{Connection, MemoryEngine, NativeTransaction};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Opens transactions.
///
/// Implemented for every connection and for the database handle, so
/// queues can run against either.
pub trait TransactionFactory {
    /// Open a transaction over `tables` in `mode`.
    fn open_transaction(&self, tables: &[String], mode: Mode) -> Result<Transaction>;
}

impl TransactionFactory for dyn Connection {
    fn open_transaction(&self, tables: &[String], mode: Mode) -> Result<Transaction> {
        Transaction::begin(self, tables, mode)
    }
}

impl TransactionFactory for MemoryEngine {
    fn open_transaction(&self, tables: &[String], mode: Mode) -> Result<Transaction> {
        Transaction::begin(self, tables, mode)
    }
}

/// A handle to one atomic commit scope. Clones share the transaction.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

struct TransactionInner {
    id: u64,
    mode: Mode,
    native: Box<dyn NativeTransaction>,
    tables: Vec<TransactingTable>,
    lifecycle: Arc<Lifecycle>,
}

impl Drop for TransactionInner {
    fn drop(&mut self) {
        if self.lifecycle.abandon() {
            debug!(txn_id = self.id, "transaction dropped while active, aborting");
            self.native.abort();
        }
    }
}

impl Transaction {
    /// Open a transaction on `connection`.
    pub fn begin<C>(connection: &C, tables: &[String], mode: Mode) -> Result<Self>
    where
        C: Connection + ?Sized,
    {
        let native = connection.transaction(tables, mode)?;
        debug!(txn_id = native.id(), ?tables, %mode, "transaction opened");
        Self::new(native, tables)
    }

    /// Wrap a native transaction, opening a table handle per name.
    pub fn new(native: Box<dyn NativeTransaction>, tables: &[String]) -> Result<Self> {
        let id = native.id();
        let lifecycle = Arc::new(Lifecycle::new(id));
        let listener = lifecycle.clone();
        native.on_settled(Box::new(move |settlement| listener.settle(settlement)));

        let mut handles: Vec<TransactingTable> = Vec::with_capacity(tables.len());
        for name in tables {
            if handles.iter().any(|t| t.name() == name) {
                continue;
            }
            match native.object_store(name) {
                Ok(store) => handles.push(TransactingTable::new(
                    name.clone(),
                    id,
                    store,
                    lifecycle.clone(),
                )),
                Err(e) => {
                    lifecycle.abandon();
                    native.abort();
                    return Err(e.into());
                }
            }
        }

        Ok(Transaction {
            inner: Arc::new(TransactionInner {
                id,
                mode: native.mode(),
                native,
                tables: handles,
                lifecycle,
            }),
        })
    }

    /// Native transaction id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Access mode.
    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    /// Names of the tables in scope.
    pub fn table_names(&self) -> Vec<&str> {
        self.inner.tables.iter().map(TransactingTable::name).collect()
    }

    /// Handle to a table in scope.
    ///
    /// # Errors
    ///
    /// `Error::Usage` if the table is not part of this transaction.
    pub fn table(&self, name: &str) -> Result<&TransactingTable> {
        self.inner
            .tables
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| {
                Error::usage(format!(
                    "table '{}' is not in the scope of transaction {}",
                    name, self.inner.id
                ))
            })
    }

    /// Current status.
    pub fn status(&self) -> TransactionStatus {
        self.inner.lifecycle.status()
    }

    /// Check if the transaction still accepts operations.
    pub fn is_active(&self) -> bool {
        self.status() == TransactionStatus::Active
    }

    /// Drive `sequence` to completion inside this transaction.
    ///
    /// Resolves with the sequence's value after the commit, or with the
    /// first error after the abort.
    pub fn run<T, S>(&self, sequence: S) -> Outcome<T>
    where
        T: Send + 'static,
        S: Sequence<T> + Send + 'static,
    {
        let (reply, outcome) = Outcome::channel();
        Driver {
            transaction: self.clone(),
            sequence,
            reply,
        }
        .advance(None);
        outcome
    }

    /// Request commit and wait for the native outcome.
    pub fn commit(&self) -> Outcome<()> {
        let done = self.done();
        match self.request_commit() {
            Ok(()) => done,
            Err(e) => Outcome::ready(Err(e)),
        }
    }

    /// Abort the transaction, discarding its writes.
    ///
    /// Acts once; a no-op after commit or abort.
    pub fn abort(&self) {
        if self.inner.lifecycle.abort(None) {
            debug!(txn_id = self.inner.id, "transaction aborted");
            self.inner.native.abort();
        }
    }

    /// Wait for the transaction to settle, without driving anything.
    ///
    /// Resolves `Ok(())` on commit, or with the abort reason.
    pub fn done(&self) -> Outcome<()> {
        let (reply, outcome) = Outcome::channel();
        self.inner.lifecycle.on_settled(Box::new(move |settled| {
            let _ = reply.send(settled);
        }));
        outcome
    }

    fn request_commit(&self) -> Result<()> {
        self.inner.lifecycle.begin_commit()?;
        debug!(txn_id = self.inner.id, "commit requested");
        if let Err(e) = self.inner.native.commit() {
            warn!(txn_id = self.inner.id, error = %e, "native commit rejected");
            let error = Error::from(e);
            self.fail(error.clone());
            return Err(error);
        }
        Ok(())
    }

    fn fail(&self, error: Error) {
        if self.inner.lifecycle.abort(Some(error)) {
            self.inner.native.abort();
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("mode", &self.inner.mode)
            .field("status", &self.status())
            .field("tables", &self.table_names())
            .finish()
    }
}

/// Runs a sequence one step per request completion.
struct Driver<T, S> {
    transaction: Transaction,
    sequence: S,
    reply: oneshot::Sender<Result<T>>,
}

/// Where an awaited request's completion went.
enum Handoff<D> {
    /// `run` has not returned yet
    Issuing,
    /// Completed before `run` returned; the issuing loop continues
    Inline(D, Result<Response>),
    /// `run` returned first; the completion resumes on its own thread
    Detached,
}

impl<T, S> Driver<T, S>
where
    T: Send + 'static,
    S: Sequence<T> + Send + 'static,
{
    /// Resume the sequence, looping while requests complete inline.
    fn advance(self, input: Option<Response>) {
        let mut next = Some((self, input));
        while let Some((driver, input)) = next.take() {
            next = match driver.step(input) {
                Some((driver, Ok(response))) => Some((driver, Some(response))),
                Some((driver, Err(error))) => {
                    driver.fail(error);
                    None
                }
                None => None,
            };
        }
    }

    /// Take one step. Hands the driver back if the awaited request
    /// completed before it was done being issued.
    fn step(mut self, input: Option<Response>) -> Option<(Self, Result<Response>)> {
        let resumed = panic::catch_unwind(AssertUnwindSafe(|| {
            self.sequence.resume(&self.transaction, input)
        }))
        .unwrap_or_else(|payload| Err(panic_error(payload.as_ref())));

        let request = match resumed {
            Ok(Step::Await(request)) => request,
            Ok(Step::Done(value)) => {
                self.finish(value);
                return None;
            }
            Err(error) => {
                self.fail(error);
                return None;
            }
        };

        if self.transaction.status() == TransactionStatus::Aborted {
            self.reply_on_abort();
            return None;
        }
        let txn_id = self.transaction.id();
        if request.transaction_id() != txn_id {
            let error = Error::usage(format!(
                "step awaited '{}' from transaction {} inside transaction {}",
                request.label(),
                request.transaction_id(),
                txn_id
            ));
            self.fail(error);
            return None;
        }

        let handoff = Arc::new(Mutex::new(Handoff::Issuing));
        let slot = handoff.clone();
        request.run(move |result| {
            let mut state = slot.lock();
            if matches!(*state, Handoff::Issuing) {
                *state = Handoff::Inline(self, result);
                return;
            }
            drop(state);
            match result {
                Ok(response) => self.advance(Some(response)),
                Err(error) => self.fail(error),
            }
        });

        let handed = std::mem::replace(&mut *handoff.lock(), Handoff::Detached);
        match handed {
            Handoff::Inline(driver, result) => Some((driver, result)),
            Handoff::Issuing | Handoff::Detached => None,
        }
    }

    fn finish(self, value: T) {
        if self.transaction.status() == TransactionStatus::Aborted {
            return self.reply_on_abort();
        }
        let Driver {
            transaction, reply, ..
        } = self;
        match transaction.request_commit() {
            Ok(()) => transaction.inner.lifecycle.on_settled(Box::new(move |outcome| {
                let _ = reply.send(outcome.map(|()| value));
            })),
            Err(error) => {
                let _ = reply.send(Err(error));
            }
        }
    }

    fn fail(self, error: Error) {
        let Driver {
            transaction, reply, ..
        } = self;
        debug!(txn_id = transaction.id(), %error, "sequence failed, aborting");
        transaction.fail(error.clone());
        transaction.inner.lifecycle.on_settled(Box::new(move |_| {
            let _ = reply.send(Err(error));
        }));
    }

    /// The transaction was aborted from outside the sequence; resolve with
    /// the abort outcome once it settles.
    fn reply_on_abort(self) {
        let Driver {
            transaction, reply, ..
        } = self;
        let txn_id = transaction.id();
        debug!(txn_id, "transaction aborted between steps");
        transaction.inner.lifecycle.on_settled(Box::new(move |outcome| {
            let _ = reply.send(outcome.and_then(|()| Err(Error::TransactionClosed { txn_id })));
        }));
    }
}

fn panic_error(payload: &(dyn Any + Send)) -> Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    Error::usage(format!("transaction step panicked: {}", message))
}
