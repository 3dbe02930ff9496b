//! One pending native operation
//!
//! A native operation is represented by two halves created together by
//! [`request`]:
//! - [`NativeRequest`]: held by the caller, which subscribes one
//!   [`Completion`] callback
//! - [`Completer`]: held by the engine, which settles the operation
//!
//! The two halves may race: if the engine settles before the caller
//! subscribes, the result is parked and the callback fires on subscribe.
//! A `Completer` dropped without settling fails the request with
//! [`StorageError::RequestDropped`].

use parking_lot::Mutex;
use seqdb_core::{Response, StorageError};
use std::sync::Arc;

/// Callback receiving a request's single outcome.
pub type Completion = Box<dyn FnOnce(Result<Response, StorageError>) + Send>;

enum Slot {
    Pending,
    Subscribed(Completion),
    Ready(Result<Response, StorageError>),
    Done,
}

/// Caller half of a native operation.
pub struct NativeRequest {
    slot: Arc<Mutex<Slot>>,
}

/// Engine half of a native operation.
pub struct Completer {
    slot: Option<Arc<Mutex<Slot>>>,
}

/// Create a linked request/completer pair.
///
/// # Examples
///
/// ```
/// use seqdb_core::Response;
/// use seqdb_storage::request;
/// use std::sync::mpsc;
///
/// let (req, completer) = request();
/// let (tx, rx) = mpsc::channel();
/// req.subscribe(Box::new(move |result| tx.send(result).unwrap()));
/// completer.succeed(Response::Count(3));
/// assert_eq!(rx.recv().unwrap(), Ok(Response::Count(3)));
/// ```
pub fn request() -> (NativeRequest, Completer) {
    let slot = Arc::new(Mutex::new(Slot::Pending));
    (
        NativeRequest { slot: slot.clone() },
        Completer { slot: Some(slot) },
    )
}

impl NativeRequest {
    /// A request that has already settled.
    pub fn settled(result: Result<Response, StorageError>) -> Self {
        NativeRequest {
            slot: Arc::new(Mutex::new(Slot::Ready(result))),
        }
    }

    /// Register the completion callback.
    ///
    /// If the request already settled the callback runs immediately on the
    /// calling thread.
    pub fn subscribe(self, completion: Completion) {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Done) {
            Slot::Pending => *slot = Slot::Subscribed(completion),
            Slot::Ready(result) => {
                drop(slot);
                completion(result);
            }
            // Subscribing consumes the request, so a second subscriber
            // cannot exist
            Slot::Subscribed(_) | Slot::Done => {}
        }
    }
}

impl Completer {
    /// Settle with a value.
    pub fn succeed(self, response: Response) {
        self.settle(Ok(response));
    }

    /// Settle with an error.
    pub fn fail(self, error: StorageError) {
        self.settle(Err(error));
    }

    /// Settle with either outcome.
    pub fn settle(mut self, result: Result<Response, StorageError>) {
        if let Some(slot) = self.slot.take() {
            deliver(&slot, result);
        }
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            deliver(&slot, Err(StorageError::RequestDropped));
        }
    }
}

fn deliver(slot: &Mutex<Slot>, result: Result<Response, StorageError>) {
    let mut guard = slot.lock();
    match std::mem::replace(&mut *guard, Slot::Done) {
        Slot::Subscribed(completion) => {
            drop(guard);
            completion(result);
        }
        Slot::Pending => *guard = Slot::Ready(result),
        Slot::Ready(_) | Slot::Done => {}
    }
}

impl std::fmt::Debug for NativeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.slot.lock() {
            Slot::Pending => "pending",
            Slot::Subscribed(_) => "subscribed",
            Slot::Ready(_) => "ready",
            Slot::Done => "done",
        };
        f.debug_struct("NativeRequest").field("state", &state).finish()
    }
}
