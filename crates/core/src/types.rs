//! Transaction mode and native operation results

use crate::error::{Error, Result};
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Transaction access mode
///
/// Modes are ordered: `ReadOnly < ReadWrite`. Combining the modes of
/// several operations with [`Mode::union`] yields the weakest mode that
/// still satisfies all of them.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Reads only
    #[default]
    #[serde(alias = "r")]
    ReadOnly,
    /// Reads and writes
    #[serde(alias = "rw")]
    ReadWrite,
}

impl Mode {
    /// Weakest mode sufficient for both `self` and `other`.
    pub fn union(self, other: Mode) -> Mode {
        self.max(other)
    }

    /// Check if writes are permitted.
    pub fn allows_writes(&self) -> bool {
        matches!(self, Mode::ReadWrite)
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::ReadOnly => "readonly",
            Mode::ReadWrite => "readwrite",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" | "readonly" => Ok(Mode::ReadOnly),
            "rw" | "readwrite" => Ok(Mode::ReadWrite),
            other => Err(Error::Config(format!("unknown transaction mode '{}'", other))),
        }
    }
}

/// Value a native storage operation settles with.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Response {
    /// No value (`delete`, `clear`, or nothing threaded yet)
    #[default]
    Empty,
    /// Result of `get`; `None` when the id does not exist
    Record(Option<Record>),
    /// Result of `count`
    Count(u64),
    /// Key written by `add` / `put`
    Key(String),
}

impl Response {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Empty => "empty",
            Response::Record(_) => "record",
            Response::Count(_) => "count",
            Response::Key(_) => "key",
        }
    }

    /// Expect a `get` result.
    pub fn into_record(self) -> Result<Option<Record>> {
        match self {
            Response::Record(record) => Ok(record),
            other => Err(Error::Usage(format!(
                "expected a record response, got {}",
                other.kind()
            ))),
        }
    }

    /// Expect a `count` result.
    pub fn into_count(self) -> Result<u64> {
        match self {
            Response::Count(n) => Ok(n),
            other => Err(Error::Usage(format!(
                "expected a count response, got {}",
                other.kind()
            ))),
        }
    }

    /// Expect an `add` / `put` result.
    pub fn into_key(self) -> Result<String> {
        match self {
            Response::Key(key) => Ok(key),
            other => Err(Error::Usage(format!(
                "expected a key response, got {}",
                other.kind()
            ))),
        }
    }
}
