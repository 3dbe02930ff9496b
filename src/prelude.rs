//! Convenient imports for seqdb.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```ignore
//! use seqdb::prelude::*;
//!
//! let db = Database::builder().table("items").open()?;
//! let record = db.table("items")?.add(attributes(json!({"name": "x"}))).await?;
//! ```

// Main entry point
pub use crate::config::DatabaseConfig;
pub use crate::database::{Database, DatabaseBuilder};
pub use crate::table::Table;

// Error handling
pub use crate::types::{Error, Result};

// Core types
pub use crate::types::{attributes, Attributes, Mode, Record, Response};

// Transactions
pub use crate::types::{from_fn, QueueItem, Step, Transaction, TransactionQueue};

// Re-export serde_json for convenience
pub use serde_json::json;
