//! Main database entry point for seqdb.
//!
//! This module provides [`Database`], the registry of [`Table`]s over one
//! native connection, and [`DatabaseBuilder`] for opening one.

use crate::config::DatabaseConfig;
use crate::table::Table;
use seqdb_concurrency::{Transaction, TransactionFactory};
use seqdb_core::{Clock, Error, IdGenerator, Mode, Result, SystemClock, UuidGenerator};
use seqdb_storage::{Connection, MemoryEngine};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Services shared by every table of a database.
pub(crate) struct Context {
    pub connection: Arc<dyn Connection>,
    pub ids: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
}

/// The seqdb database.
///
/// Constructed once per native connection and immutable afterwards. Create
/// one with [`Database::builder`] or wrap an existing connection with
/// [`Database::new`].
///
/// # Example
///
/// ```ignore
/// use seqdb::prelude::*;
///
/// let db = Database::builder()
///     .name("inventory")
///     .table("items")
///     .open()?;
///
/// let items = db.table("items")?;
/// let record = items.add(Attributes::new()).await?;
/// ```
pub struct Database {
    context: Arc<Context>,
    tables: BTreeMap<String, Table>,
}

impl Database {
    /// Wrap `connection`, registering one table per name.
    ///
    /// Uses UUID v4 ids and the system clock.
    pub fn new<I, S>(connection: Arc<dyn Connection>, table_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_services(
            connection,
            table_names,
            Arc::new(UuidGenerator),
            Arc::new(SystemClock),
        )
    }

    fn with_services<I, S>(
        connection: Arc<dyn Connection>,
        table_names: I,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let context = Arc::new(Context {
            connection,
            ids,
            clock,
        });
        let tables = table_names
            .into_iter()
            .map(|name| {
                let name = name.into();
                (name.clone(), Table::new(name, context.clone()))
            })
            .collect();
        Database { context, tables }
    }

    /// Create a builder for database configuration.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Store name.
    pub fn name(&self) -> &str {
        self.context.connection.name()
    }

    /// Schema version of the store.
    pub fn version(&self) -> u32 {
        self.context.connection.version()
    }

    /// Look up a table.
    ///
    /// # Errors
    ///
    /// `Error::Usage` if no table with this name was registered.
    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::usage(format!("unknown table '{}'", name)))
    }

    /// Registered table names, sorted.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Open a transaction over `tables`.
    pub fn transaction(&self, tables: &[&str], mode: Mode) -> Result<Transaction> {
        let tables: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
        self.open_transaction(&tables, mode)
    }

    /// The native connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.context.connection
    }
}

impl TransactionFactory for Database {
    fn open_transaction(&self, tables: &[String], mode: Mode) -> Result<Transaction> {
        Transaction::begin(self.context.connection.as_ref(), tables, mode)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("tables", &self.table_names())
            .finish()
    }
}

/// Builder for database configuration.
///
/// # Example
///
/// ```ignore
/// // In-memory store with injected services for deterministic tests
/// let db = Database::builder()
///     .name("test")
///     .tables(["items", "orders"])
///     .clock(Arc::new(ManualClock::new(start)))
///     .open()?;
///
/// // Configuration file
/// let config = DatabaseConfig::from_toml_str(&text)?;
/// let db = Database::builder().from_config(config).open()?;
/// ```
pub struct DatabaseBuilder {
    config: DatabaseConfig,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl DatabaseBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: DatabaseConfig::default(),
            ids: Arc::new(UuidGenerator),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace name, version and tables with `config`.
    pub fn from_config(mut self, config: DatabaseConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the store name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the schema version.
    pub fn version(mut self, version: u32) -> Self {
        self.config.version = version;
        self
    }

    /// Register a table.
    pub fn table(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.config.tables.contains(&name) {
            self.config.tables.push(name);
        }
        self
    }

    /// Register several tables.
    pub fn tables<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(self, |builder, name| builder.table(name))
    }

    /// Use a custom id generator.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Use a custom clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Open an in-memory store and build the database over it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(self) -> Result<Database> {
        self.config.validate()?;
        let tables = self.config.tables.clone();
        let engine = MemoryEngine::open(&self.config.name, self.config.version, |schema, _| {
            for table in &tables {
                if schema.ensure_table(table.as_str()) {
                    info!(table = %table, "created table");
                }
            }
        })?;
        Ok(self.connect(Arc::new(engine)))
    }

    /// Build the database over an existing connection.
    pub fn connect(self, connection: Arc<dyn Connection>) -> Database {
        info!(
            name = connection.name(),
            version = connection.version(),
            tables = self.config.tables.len(),
            "database ready"
        );
        Database::with_services(connection, self.config.tables, self.ids, self.clock)
    }
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
