//! Shared helpers for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use seqdb::{IdGenerator, ManualClock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};

pub use seqdb::prelude::*;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Deterministic ids: `rec-1`, `rec-2`, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> String {
        format!("rec-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// In-memory database with sequential ids and a manual clock.
pub fn open_db(tables: &[&str]) -> (Database, Arc<ManualClock>) {
    init_tracing();
    let clock = Arc::new(ManualClock::new(epoch()));
    let db = Database::builder()
        .name("it")
        .tables(tables.iter().copied())
        .id_generator(Arc::new(SequentialIds::default()))
        .clock(clock.clone())
        .open()
        .unwrap();
    (db, clock)
}

/// Shorthand for `attributes(json!(...))`.
pub fn attrs(value: serde_json::Value) -> Attributes {
    seqdb::attributes(value)
}
