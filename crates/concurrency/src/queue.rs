//! Ordered multi-operation queue
//!
//! A [`TransactionQueue`] collects named [`QueueItem`]s over possibly
//! several tables and runs them in one transaction:
//!
//! 1. [`TransactionQueue::plan`] computes, in one pass, the tables the
//!    items touch (first-use order) and the weakest mode that covers them
//!    (read-only unless some item writes)
//! 2. one transaction is opened with that plan
//! 3. items run strictly in registration order; each item's native result
//!    goes through its post-processing steps, and the processed value is
//!    handed to the next item's factory
//!
//! Any failing factory, request or post-processing step aborts the whole
//! queue.

use crate::request::AsyncRequest;
use crate::sequence::{Sequence, Step};
use crate::table::TransactingTable;
use crate::transaction::{Transaction, TransactionFactory};
use seqdb_core::{Error, Mode, Response, Result};
use std::fmt;
use tracing::debug;

type ItemFactory = Box<dyn FnOnce(&TransactingTable, &Response) -> Result<AsyncRequest> + Send>;
type PostStep = Box<dyn FnOnce(Response) -> Result<Response> + Send>;

/// One named request of a queue.
pub struct QueueItem {
    name: String,
    table: String,
    mode: Mode,
    factory: ItemFactory,
    post: Vec<PostStep>,
}

impl QueueItem {
    /// Create an item.
    ///
    /// `factory` receives the item's table and the processed value of the
    /// previous item (`Response::Empty` for the first one).
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        mode: Mode,
        factory: impl FnOnce(&TransactingTable, &Response) -> Result<AsyncRequest> + Send + 'static,
    ) -> Self {
        QueueItem {
            name: name.into(),
            table: table.into(),
            mode,
            factory: Box::new(factory),
            post: Vec::new(),
        }
    }

    /// Create a read-only item.
    pub fn read(
        name: impl Into<String>,
        table: impl Into<String>,
        factory: impl FnOnce(&TransactingTable, &Response) -> Result<AsyncRequest> + Send + 'static,
    ) -> Self {
        Self::new(name, table, Mode::ReadOnly, factory)
    }

    /// Create a read-write item.
    pub fn write(
        name: impl Into<String>,
        table: impl Into<String>,
        factory: impl FnOnce(&TransactingTable, &Response) -> Result<AsyncRequest> + Send + 'static,
    ) -> Self {
        Self::new(name, table, Mode::ReadWrite, factory)
    }

    /// Append a post-processing step. Steps run in the order added.
    pub fn then(
        mut self,
        step: impl FnOnce(Response) -> Result<Response> + Send + 'static,
    ) -> Self {
        self.post.push(Box::new(step));
        self
    }

    /// Item name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table the item runs against.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Mode the item needs.
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl fmt::Debug for QueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueItem")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("mode", &self.mode)
            .field("post_steps", &self.post.len())
            .finish()
    }
}

/// Tables and mode a queue will open its transaction with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePlan {
    /// Participating tables, in order of first use
    pub tables: Vec<String>,
    /// Weakest mode sufficient for every item
    pub mode: Mode,
}

/// Processed value of every item, by name, in run order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueResults {
    entries: Vec<(String, Response)>,
}

impl QueueResults {
    fn push(&mut self, name: String, value: Response) {
        self.entries.push((name, value));
    }

    /// Value of the first item named `name`.
    pub fn get(&self, name: &str) -> Option<&Response> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Remove and return the value of the first item named `name`.
    pub fn take(&mut self, name: &str) -> Option<Response> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Value of the last item.
    pub fn last(&self) -> Option<&Response> {
        self.entries.last().map(|(_, value)| value)
    }

    /// Consume, keeping only the last item's value.
    pub fn into_last(mut self) -> Option<Response> {
        self.entries.pop().map(|(_, value)| value)
    }

    /// Iterate over `(name, value)` pairs in run order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Response)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no values.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An ordered list of requests run in one transaction.
///
/// Built incrementally, run once.
///
/// # Examples
///
/// ```no_run
/// use seqdb_concurrency::{QueueItem, TransactionQueue};
/// use seqdb_core::Mode;
///
/// let mut queue = TransactionQueue::new();
/// queue
///     .push(QueueItem::read("count", "items", |table, _| Ok(table.count())))
///     .push(QueueItem::read("logs", "logs", |table, _| Ok(table.count())));
///
/// let plan = queue.plan().unwrap();
/// assert_eq!(plan.tables, vec!["items", "logs"]);
/// assert_eq!(plan.mode, Mode::ReadOnly);
/// ```
#[derive(Debug, Default)]
pub struct TransactionQueue {
    items: Vec<QueueItem>,
}

impl TransactionQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item.
    pub fn push(&mut self, item: QueueItem) -> &mut Self {
        self.items.push(item);
        self
    }

    /// Append an item, builder style.
    pub fn with(mut self, item: QueueItem) -> Self {
        self.items.push(item);
        self
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the queue has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Compute the transaction scope and mode.
    ///
    /// # Errors
    ///
    /// `Error::Usage` if the queue is empty.
    pub fn plan(&self) -> Result<QueuePlan> {
        if self.items.is_empty() {
            return Err(Error::usage("cannot run an empty transaction queue"));
        }
        let mut tables: Vec<String> = Vec::new();
        let mut mode = Mode::ReadOnly;
        for item in &self.items {
            if !tables.contains(&item.table) {
                tables.push(item.table.clone());
            }
            mode = mode.union(item.mode);
        }
        Ok(QueuePlan { tables, mode })
    }

    /// Open one transaction from `factory` and run every item in it.
    pub async fn run<F>(self, factory: &F) -> Result<QueueResults>
    where
        F: TransactionFactory + ?Sized,
    {
        let plan = self.plan()?;
        let tx = factory.open_transaction(&plan.tables, plan.mode)?;
        debug!(
            txn_id = tx.id(),
            items = self.items.len(),
            tables = ?plan.tables,
            mode = %plan.mode,
            "running transaction queue"
        );
        tx.run(QueueSequence::new(self.items)).await
    }
}

/// Runs queue items one per step.
struct QueueSequence {
    items: std::vec::IntoIter<QueueItem>,
    current: Option<(String, Vec<PostStep>)>,
    previous: Response,
    results: QueueResults,
}

impl QueueSequence {
    fn new(items: Vec<QueueItem>) -> Self {
        QueueSequence {
            items: items.into_iter(),
            current: None,
            previous: Response::Empty,
            results: QueueResults::default(),
        }
    }
}

impl Sequence<QueueResults> for QueueSequence {
    fn resume(&mut self, tx: &Transaction, input: Option<Response>) -> Result<Step<QueueResults>> {
        if let Some((name, post)) = self.current.take() {
            let raw = input
                .ok_or_else(|| Error::usage(format!("queue item '{}' resumed without a result", name)))?;
            let processed = post.into_iter().try_fold(raw, |value, step| step(value))?;
            self.results.push(name, processed.clone());
            self.previous = processed;
        }

        match self.items.next() {
            Some(item) => {
                let table = tx.table(&item.table)?;
                let request = (item.factory)(table, &self.previous)?;
                self.current = Some((item.name, item.post));
                Ok(Step::Await(request))
            }
            None => Ok(Step::Done(std::mem::take(&mut self.results))),
        }
    }
}
