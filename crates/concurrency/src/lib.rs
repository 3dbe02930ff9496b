//! Transaction sequencing for seqdb
//!
//! This crate turns the callback-based native engine into straight-line
//! transactional logic:
//! - [`AsyncRequest`]: one native operation, started on demand, settled once
//! - [`TransactingTable`]: per-transaction table handle producing requests
//! - [`Transaction`]: one atomic scope and the sequencing engine
//!   ([`Transaction::run`]) driving a [`Sequence`] of [`Step`]s
//! - [`TransactionQueue`]: ordered named requests with automatic mode
//!   elevation and result threading

#![warn(missing_docs)]
#![warn(clippy::all)]

mod lifecycle;
pub mod queue;
pub mod request;
pub mod sequence;
pub mod table;
pub mod transaction;

pub use lifecycle::TransactionStatus;
pub use queue::{QueueItem, QueuePlan, QueueResults, TransactionQueue};
pub use request::{AsyncRequest, Outcome};
pub use sequence::{from_fn, FnSequence, Sequence, Step};
pub use table::TransactingTable;
pub use transaction::{Transaction, TransactionFactory};
