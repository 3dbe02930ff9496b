//! Core types for seqdb
//!
//! This crate defines the vocabulary shared by every layer:
//! - [`Record`]: the persisted record shape (id, revision, timestamps, fields)
//! - [`Response`]: the value a native storage operation settles with
//! - [`Mode`]: transaction access mode
//! - [`Error`] / [`StorageError`]: the error taxonomy
//! - [`IdGenerator`] / [`Clock`]: injected identity and time services

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod record;
pub mod services;
pub mod types;

pub use error::{Error, Result, StorageError};
pub use record::{Attributes, Record, RESERVED_FIELDS};
pub use services::{Clock, IdGenerator, ManualClock, SystemClock, UuidGenerator};
pub use types::{Mode, Response};
