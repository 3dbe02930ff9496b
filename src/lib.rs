//! # seqdb
//!
//! Sequenced, revision-checked transactions over asynchronous,
//! callback-based object stores.
//!
//! seqdb lets calling code express dependent storage steps (read a record,
//! decide, write a derived record) as straight-line logic while
//! guaranteeing that the steps run in one atomic transaction, that any
//! failing step aborts the whole transaction, and that concurrent writers
//! cannot lose each other's updates.
//!
//! ## Quick Start
//!
//! ```ignore
//! use seqdb::prelude::*;
//!
//! let db = Database::builder().name("inventory").table("items").open()?;
//! let items = db.table("items")?;
//!
//! let created = items.add(attributes(json!({"name": "x"}))).await?;
//! let updated = items
//!     .update(&created.id, created.revision, attributes(json!({"name": "y"})))
//!     .await?;
//! assert_eq!(updated.revision, 2);
//!
//! // A stale revision is rejected and nothing is written
//! let stale = items
//!     .update(&created.id, 1, attributes(json!({"name": "z"})))
//!     .await;
//! assert!(stale.unwrap_err().is_conflict());
//! ```
//!
//! ## Layers
//!
//! - [`Table`] - record API with revision stamping and checked updates
//! - [`TransactionQueue`] - ordered named requests in one transaction
//! - [`Transaction`] - one atomic scope driving a [`Sequence`] of [`Step`]s
//! - [`AsyncRequest`] - one native operation, settled exactly once
//! - [`Connection`] - the native engine boundary ([`MemoryEngine`] built in)

#![warn(missing_docs)]

mod config;
mod database;
mod table;
mod types;

pub mod prelude;

// Re-export main entry points
pub use config::DatabaseConfig;
pub use database::{Database, DatabaseBuilder};
pub use table::Table;

// Re-export types
pub use types::*;
