//! Error taxonomy
//!
//! Two levels:
//! - [`StorageError`]: what the native storage engine reports
//! - [`Error`]: what every seqdb operation returns
//!
//! A failure at any step of a transaction aborts the whole transaction and
//! the caller sees the first error only. Nothing in seqdb retries on its own;
//! [`Error::is_retryable`] tells the caller when re-reading and retrying is
//! meaningful.

use thiserror::Error;

/// Errors reported by the native storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The transaction was aborted before it could commit
    #[error("transaction {txn_id} aborted")]
    Aborted {
        /// Native transaction id
        txn_id: u64,
    },

    /// A write violated a store constraint (e.g. `add` on an existing id)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The table does not exist, or is not part of the transaction scope
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A write was issued inside a read-only transaction
    #[error("table '{table}' is read-only in transaction {txn_id}")]
    ReadOnly {
        /// Native transaction id
        txn_id: u64,
        /// Table the write targeted
        table: String,
    },

    /// The transaction no longer accepts requests
    #[error("transaction {txn_id} is not active")]
    Inactive {
        /// Native transaction id
        txn_id: u64,
    },

    /// The request was dropped before it settled
    #[error("request dropped before completion")]
    RequestDropped,

    /// The requested transaction scope is invalid (e.g. empty)
    #[error("invalid transaction scope: {0}")]
    InvalidScope(String),

    /// The store could not be opened
    #[error("failed to open store: {0}")]
    Open(String),
}

/// All seqdb errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Programming error: a step sequence or API was used incorrectly
    #[error("usage error: {0}")]
    Usage(String),

    /// The target record does not exist
    #[error("not found: '{id}' in table '{table}'")]
    NotFound {
        /// Table that was searched
        table: String,
        /// Record id that was not found
        id: String,
    },

    /// Optimistic concurrency check failed
    #[error("revision mismatch: expected revision {expected}, revision on disk is {actual}")]
    RevisionMismatch {
        /// Revision the caller based its write on
        expected: u64,
        /// Revision currently stored
        actual: u64,
    },

    /// The native engine reported an error or aborted the transaction
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// An operation was attempted against a settled transaction
    #[error("transaction {txn_id} is closed")]
    TransactionClosed {
        /// Transaction id
        txn_id: u64,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for seqdb operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Construct a [`Error::NotFound`].
    pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    /// Construct a [`Error::Usage`].
    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage(message.into())
    }

    /// Check if this error is retryable.
    ///
    /// Only revision mismatches qualify, and only after the caller has
    /// re-read the record and re-applied its own merge decision.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RevisionMismatch { .. })
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Check if this is a revision conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::RevisionMismatch { .. })
    }

    /// Check if this error came from the storage engine.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Inactive { txn_id } => Error::TransactionClosed { txn_id },
            other => Error::Storage(other),
        }
    }
}
