//! Transaction lifecycle shared by a transaction and its tables
//!
//! State transitions:
//! - `Active` → `Committing` (commit requested)
//! - `Committing` → `Committed` (native commit notification)
//! - `Active | Committing` → `Aborted` (abort, failure, or native error)
//!
//! The native settlement is the final word: whatever it reports is the
//! status once the transaction has settled.

use parking_lot::Mutex;
use seqdb_core::{Error, Result, StorageError};
use seqdb_storage::Settlement;
use std::fmt;

/// Transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    /// Accepting operations
    Active,
    /// Commit requested, waiting for the native notification
    Committing,
    /// Committed; all writes are visible
    Committed,
    /// Aborted; no writes are visible
    Aborted,
}

impl TransactionStatus {
    /// Check if the transaction can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Committed | TransactionStatus::Aborted)
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Active => "active",
            TransactionStatus::Committing => "committing",
            TransactionStatus::Committed => "committed",
            TransactionStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) type SettledCallback = Box<dyn FnOnce(Result<()>) + Send>;

struct State {
    status: TransactionStatus,
    /// First error observed by the sequencing engine
    failure: Option<Error>,
    outcome: Option<Result<()>>,
    callbacks: Vec<SettledCallback>,
}

pub(crate) struct Lifecycle {
    txn_id: u64,
    state: Mutex<State>,
}

impl Lifecycle {
    pub fn new(txn_id: u64) -> Self {
        Lifecycle {
            txn_id,
            state: Mutex::new(State {
                status: TransactionStatus::Active,
                failure: None,
                outcome: None,
                callbacks: Vec::new(),
            }),
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.state.lock().status
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.status() == TransactionStatus::Active {
            Ok(())
        } else {
            Err(Error::TransactionClosed {
                txn_id: self.txn_id,
            })
        }
    }

    pub fn begin_commit(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.status != TransactionStatus::Active {
            return Err(Error::TransactionClosed {
                txn_id: self.txn_id,
            });
        }
        state.status = TransactionStatus::Committing;
        Ok(())
    }

    /// Move to `Aborted`, remembering `failure` as the reason if it is the
    /// first one.
    ///
    /// Returns `true` if this call performed the transition, i.e. the
    /// native transaction still has to be told.
    pub fn abort(&self, failure: Option<Error>) -> bool {
        let mut state = self.state.lock();
        if state.failure.is_none() && state.outcome.is_none() {
            state.failure = failure;
        }
        match state.status {
            TransactionStatus::Active | TransactionStatus::Committing => {
                state.status = TransactionStatus::Aborted;
                true
            }
            TransactionStatus::Committed | TransactionStatus::Aborted => false,
        }
    }

    /// Abort only if nobody asked to commit.
    pub fn abandon(&self) -> bool {
        let mut state = self.state.lock();
        if state.status == TransactionStatus::Active {
            state.status = TransactionStatus::Aborted;
            true
        } else {
            false
        }
    }

    /// Record the native settlement and notify waiters.
    pub fn settle(&self, settlement: Settlement) {
        let (outcome, callbacks) = {
            let mut state = self.state.lock();
            if state.outcome.is_some() {
                return;
            }
            let outcome = match settlement {
                Settlement::Committed => {
                    state.status = TransactionStatus::Committed;
                    Ok(())
                }
                Settlement::Errored(error) => {
                    state.status = TransactionStatus::Aborted;
                    Err(state.failure.take().unwrap_or_else(|| error.into()))
                }
                Settlement::Aborted => {
                    state.status = TransactionStatus::Aborted;
                    Err(state.failure.take().unwrap_or(Error::Storage(
                        StorageError::Aborted {
                            txn_id: self.txn_id,
                        },
                    )))
                }
            };
            state.outcome = Some(outcome.clone());
            (outcome, std::mem::take(&mut state.callbacks))
        };

        for callback in callbacks {
            callback(outcome.clone());
        }
    }

    /// Call `callback` with the outcome once settled, or right away if
    /// already settled.
    pub fn on_settled(&self, callback: SettledCallback) {
        let mut state = self.state.lock();
        match state.outcome.clone() {
            Some(outcome) => {
                drop(state);
                callback(outcome);
            }
            None => state.callbacks.push(callback),
        }
    }
}
