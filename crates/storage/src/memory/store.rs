//! Committed table data
//!
//! # Design
//!
//! - One [`Shard`] per table, created by the upgrade hook
//! - FxHashMap: O(1) lookups, fast non-crypto hash
//! - Only committed state lives here; in-flight writes are buffered in the
//!   transaction context and applied in one batch at commit

use rustc_hash::FxHashMap;
use seqdb_core::Record;

/// Per-table shard keyed by record id.
#[derive(Debug, Default)]
pub struct Shard {
    pub(crate) data: FxHashMap<String, Record>,
}

impl Shard {
    /// Create a new empty shard
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of records in this shard
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if shard is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Committed records of every table.
#[derive(Debug, Default)]
pub struct TableStore {
    shards: FxHashMap<String, Shard>,
}

impl TableStore {
    /// Create a store with one empty shard per table.
    pub fn with_tables<'a>(tables: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            shards: tables
                .into_iter()
                .map(|name| (name.to_string(), Shard::new()))
                .collect(),
        }
    }

    /// Get a committed record.
    #[inline]
    pub fn get(&self, table: &str, id: &str) -> Option<&Record> {
        self.shards.get(table).and_then(|shard| shard.data.get(id))
    }

    /// Check if a committed record exists.
    #[inline]
    pub fn contains(&self, table: &str, id: &str) -> bool {
        self.get(table, id).is_some()
    }

    /// Number of committed records in a table.
    pub fn len(&self, table: &str) -> usize {
        self.shards.get(table).map(Shard::len).unwrap_or(0)
    }

    /// Committed ids of a table.
    pub fn ids(&self, table: &str) -> Vec<String> {
        self.shards
            .get(table)
            .map(|shard| shard.data.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Insert or overwrite a record.
    pub fn put(&mut self, table: &str, record: Record) {
        self.shards
            .entry(table.to_string())
            .or_default()
            .data
            .insert(record.id.clone(), record);
    }

    /// Remove a record, returning it if it existed.
    pub fn delete(&mut self, table: &str, id: &str) -> Option<Record> {
        self.shards
            .get_mut(table)
            .and_then(|shard| shard.data.remove(id))
    }

    /// Total number of records across all tables.
    pub fn total_records(&self) -> usize {
        self.shards.values().map(Shard::len).sum()
    }
}
