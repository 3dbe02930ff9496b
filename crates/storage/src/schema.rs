//! Store schema as seen by the upgrade hook

use std::collections::BTreeSet;

/// Tables of a store.
///
/// Handed to the upgrade hook when a store is opened. All operations are
/// idempotent so the hook can run against a store that is already up to
/// date.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: BTreeSet<String>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `name` exists.
    ///
    /// Returns `true` if the table was created by this call.
    pub fn ensure_table(&mut self, name: impl Into<String>) -> bool {
        self.tables.insert(name.into())
    }

    /// Check if a table exists.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains(name)
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if the schema has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
