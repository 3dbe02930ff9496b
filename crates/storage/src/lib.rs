//! Storage layer for seqdb
//!
//! This crate defines the boundary to the native storage engine and ships
//! an in-memory implementation of it:
//! - [`Connection`] / [`NativeTransaction`] / [`ObjectStore`]: what an
//!   engine must provide
//! - [`NativeRequest`] / [`Completer`]: one pending native operation and
//!   the engine-side handle that settles it
//! - [`Schema`]: the upgrade hook's view of the store
//! - [`MemoryEngine`]: scope-scheduled, buffered-write in-memory engine

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod request;
pub mod schema;
pub mod traits;

pub use memory::MemoryEngine;
pub use request::{request, Completer, Completion, NativeRequest};
pub use schema::Schema;
pub use traits::{Connection, NativeTransaction, ObjectStore, SettleListener, Settlement};
