//! In-memory native engine
//!
//! [`MemoryEngine`] implements the native traits entirely in memory. It
//! behaves like a real asynchronous engine:
//! - every operation completes later, on a dispatcher task, never inline
//! - transactions with overlapping scopes are serialized when either side
//!   writes
//! - writes are buffered per transaction and applied atomically at commit
//! - a failed operation aborts its transaction
//! - dropping an uncommitted transaction aborts it
//!
//! The dispatcher is a tokio task, so [`MemoryEngine::open`] must be called
//! from within a tokio runtime.

mod context;
mod state;
mod store;

use crate::request::NativeRequest;
use crate::schema::Schema;
use crate::traits::{Connection, NativeTransaction, ObjectStore, SettleListener, Settlement};
use context::Op;
use parking_lot::Mutex;
use seqdb_core::{Mode, Record, StorageError};
use state::EngineState;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

struct Shared {
    name: String,
    version: u32,
    state: Mutex<EngineState>,
    notify: Arc<Notify>,
}

impl Shared {
    /// Mutate engine state, then wake the dispatcher.
    fn with_state<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
        let result = f(&mut self.state.lock());
        self.notify.notify_one();
        result
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Lets the dispatcher observe that the engine is gone
        self.notify.notify_one();
    }
}

/// In-memory engine handle. Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct MemoryEngine {
    shared: Arc<Shared>,
}

impl MemoryEngine {
    /// Open a store.
    ///
    /// `upgrade` receives the schema and the previously stored version and
    /// declares the tables. A fresh in-memory store always starts at
    /// version 0.
    ///
    /// # Errors
    ///
    /// `StorageError::Open` if `version` is 0 or no tokio runtime is
    /// running.
    pub fn open(
        name: impl Into<String>,
        version: u32,
        upgrade: impl FnOnce(&mut Schema, u32),
    ) -> Result<Self, StorageError> {
        let name = name.into();
        if version == 0 {
            return Err(StorageError::Open(format!(
                "store '{}': version must be at least 1",
                name
            )));
        }
        let handle = Handle::try_current().map_err(|_| {
            StorageError::Open(format!("store '{}': no tokio runtime is running", name))
        })?;

        let mut schema = Schema::new();
        upgrade(&mut schema, 0);
        info!(store = %name, version, tables = schema.len(), "opened in-memory store");

        let notify = Arc::new(Notify::new());
        let shared = Arc::new(Shared {
            name,
            version,
            state: Mutex::new(EngineState::new(schema)),
            notify: notify.clone(),
        });
        handle.spawn(dispatch(Arc::downgrade(&shared), notify));
        Ok(MemoryEngine { shared })
    }

    /// Number of transactions not yet settled.
    pub fn live_transactions(&self) -> usize {
        self.shared.state.lock().live_count()
    }
}

/// Deliver work until the engine is dropped.
async fn dispatch(shared: Weak<Shared>, notify: Arc<Notify>) {
    loop {
        let Some(engine) = shared.upgrade() else {
            break;
        };
        loop {
            // The guard is released before delivering
            let work = engine.state.lock().next_work();
            let Some(work) = work else {
                break;
            };
            if panic::catch_unwind(AssertUnwindSafe(|| work.deliver())).is_err() {
                warn!("notification callback panicked");
            }
        }
        drop(engine);
        notify.notified().await;
    }
    debug!("in-memory store dispatcher stopped");
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("name", &self.shared.name)
            .field("version", &self.shared.version)
            .finish()
    }
}

impl Connection for MemoryEngine {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn version(&self) -> u32 {
        self.shared.version
    }

    fn table_names(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .schema
            .table_names()
            .map(str::to_string)
            .collect()
    }

    fn transaction(
        &self,
        tables: &[String],
        mode: Mode,
    ) -> Result<Box<dyn NativeTransaction>, StorageError> {
        let (id, outcome) = self.shared.with_state(|st| st.begin(tables, mode))?;
        debug!(txn_id = id, ?tables, %mode, "native transaction created");
        Ok(Box::new(MemoryTransaction {
            id,
            mode,
            shared: self.shared.clone(),
            outcome,
        }))
    }
}

struct MemoryTransaction {
    id: u64,
    mode: Mode,
    shared: Arc<Shared>,
    outcome: Arc<Mutex<Option<Settlement>>>,
}

impl NativeTransaction for MemoryTransaction {
    fn id(&self) -> u64 {
        self.id
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn object_store(&self, table: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        self.shared.state.lock().check_scope(self.id, table)?;
        Ok(Arc::new(MemoryObjectStore {
            txn_id: self.id,
            table: table.to_string(),
            shared: self.shared.clone(),
        }))
    }

    fn on_settled(&self, listener: SettleListener) {
        let rejected = self.shared.state.lock().add_listener(self.id, listener);
        if let Some(listener) = rejected {
            let settlement = self.outcome.lock().clone().unwrap_or(Settlement::Aborted);
            listener(settlement);
        }
    }

    fn commit(&self) -> Result<(), StorageError> {
        self.shared.with_state(|st| st.request_commit(self.id))
    }

    fn abort(&self) {
        if self.shared.with_state(|st| st.request_abort(self.id)) {
            debug!(txn_id = self.id, "native transaction abort requested");
        }
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        let id = self.id;
        if self.shared.with_state(|st| st.abandon(id)) {
            debug!(txn_id = id, "uncommitted native transaction dropped, aborting");
        }
    }
}

struct MemoryObjectStore {
    txn_id: u64,
    table: String,
    shared: Arc<Shared>,
}

impl MemoryObjectStore {
    fn submit(&self, op: Op) -> Result<NativeRequest, StorageError> {
        self.shared
            .with_state(|st| st.enqueue(self.txn_id, &self.table, op))
    }
}

impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &str {
        &self.table
    }

    fn get(&self, id: &str) -> Result<NativeRequest, StorageError> {
        self.submit(Op::Get(id.to_string()))
    }

    fn count(&self) -> Result<NativeRequest, StorageError> {
        self.submit(Op::Count)
    }

    fn add(&self, record: Record) -> Result<NativeRequest, StorageError> {
        self.submit(Op::Add(record))
    }

    fn put(&self, record: Record) -> Result<NativeRequest, StorageError> {
        self.submit(Op::Put(record))
    }

    fn delete(&self, id: &str) -> Result<NativeRequest, StorageError> {
        self.submit(Op::Delete(id.to_string()))
    }

    fn clear(&self) -> Result<NativeRequest, StorageError> {
        self.submit(Op::Clear)
    }
}
