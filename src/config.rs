//! Database configuration
//!
//! # Example Configuration
//!
//! ```toml
//! name = "inventory"
//! version = 2
//! tables = ["items", "orders"]
//! ```

use seqdb_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Store name, schema version and tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Store name
    pub name: String,

    /// Schema version, at least 1
    pub version: u32,

    /// Tables to ensure at open, in registration order
    pub tables: Vec<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            name: "seqdb".to_string(),
            version: 1,
            tables: Vec::new(),
        }
    }
}

impl DatabaseConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: DatabaseConfig =
            toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("name must not be empty".to_string()));
        }
        if self.version == 0 {
            return Err(Error::Config("version must be at least 1".to_string()));
        }
        for (i, table) in self.tables.iter().enumerate() {
            if table.is_empty() {
                return Err(Error::Config("table names must not be empty".to_string()));
            }
            if self.tables[..i].contains(table) {
                return Err(Error::Config(format!("table '{}' listed twice", table)));
            }
        }
        Ok(())
    }
}
