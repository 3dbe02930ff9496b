//! Suspendable unit of storage work
//!
//! An [`AsyncRequest`] wraps one native operation that has not started
//! yet. Running it starts the operation and settles exactly once, either
//! through a continuation callback ([`AsyncRequest::run`], used by the
//! sequencing engine) or by awaiting it.

use seqdb_core::{Error, Response, Result, StorageError};
use seqdb_storage::NativeRequest;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

type Factory = Box<dyn FnOnce() -> Result<NativeRequest> + Send>;

/// One pending storage operation bound to a transaction.
///
/// Consumed by running it; a request cannot be run twice.
pub struct AsyncRequest {
    txn_id: u64,
    label: String,
    factory: Factory,
}

impl AsyncRequest {
    /// Wrap a factory that starts one native operation.
    ///
    /// The factory runs when the request is run, not before. An `Err` from
    /// the factory fails the request without starting anything.
    pub fn new(
        txn_id: u64,
        label: impl Into<String>,
        factory: impl FnOnce() -> Result<NativeRequest> + Send + 'static,
    ) -> Self {
        AsyncRequest {
            txn_id,
            label: label.into(),
            factory: Box::new(factory),
        }
    }

    /// Id of the transaction the operation runs in.
    pub fn transaction_id(&self) -> u64 {
        self.txn_id
    }

    /// Short description, e.g. `items.get`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Start the operation and call `callback` with its outcome.
    ///
    /// The callback runs on whichever thread delivers the native
    /// notification, or inline if the factory fails.
    pub fn run(self, callback: impl FnOnce(Result<Response>) + Send + 'static) {
        match (self.factory)() {
            Ok(native) => native.subscribe(Box::new(move |result| {
                callback(result.map_err(Error::from))
            })),
            Err(e) => callback(Err(e)),
        }
    }
}

impl fmt::Debug for AsyncRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRequest")
            .field("txn_id", &self.txn_id)
            .field("label", &self.label)
            .finish()
    }
}

impl IntoFuture for AsyncRequest {
    type Output = Result<Response>;
    type IntoFuture = Outcome<Response>;

    fn into_future(self) -> Self::IntoFuture {
        let (tx, rx) = oneshot::channel();
        self.run(move |result| {
            let _ = tx.send(result);
        });
        Outcome { rx }
    }
}

/// A result that is delivered by callback and awaited by the caller.
///
/// Returned by [`AsyncRequest::into_future`], `Transaction::run`,
/// `Transaction::commit` and `Transaction::done`. The work it waits for is
/// already under way; dropping the `Outcome` does not cancel it.
#[must_use = "an Outcome does nothing unless awaited"]
pub struct Outcome<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Outcome<T> {
    pub(crate) fn channel() -> (oneshot::Sender<Result<T>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Outcome { rx })
    }

    pub(crate) fn ready(result: Result<T>) -> Self {
        let (tx, outcome) = Self::channel();
        let _ = tx.send(result);
        outcome
    }
}

impl<T> Future for Outcome<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::Storage(StorageError::RequestDropped))))
    }
}

impl<T> fmt::Debug for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome").finish_non_exhaustive()
    }
}
