//! Step sequences driven by a transaction
//!
//! A [`Sequence`] is a resumable state machine. The engine calls
//! [`Sequence::resume`] with `None` first, then once per awaited request
//! with that request's result, until the sequence returns [`Step::Done`].
//!
//! ```text
//! resume(None)        -> Await(get)
//! resume(Some(rec))   -> Await(put)      decision based on rec
//! resume(Some(key))   -> Done(value)     engine commits, then resolves
//! ```
//!
//! Returning `Err` from `resume` aborts the transaction with that error.

use crate::request::AsyncRequest;
use crate::transaction::Transaction;
use seqdb_core::{Response, Result};

/// What a sequence wants next.
#[derive(Debug)]
pub enum Step<T> {
    /// Run this request and resume with its result
    Await(AsyncRequest),
    /// The sequence is finished; commit and resolve with this value
    Done(T),
}

/// A sequence of dependent storage steps.
pub trait Sequence<T> {
    /// Produce the next step.
    ///
    /// `input` is `None` on the first call and the previous request's
    /// result afterwards.
    fn resume(&mut self, tx: &Transaction, input: Option<Response>) -> Result<Step<T>>;
}

/// Sequence backed by a closure.
///
/// Created by [`from_fn`].
pub struct FnSequence<F>(F);

/// Build a [`Sequence`] from a closure.
///
/// State that must survive between steps lives in the closure's captures.
pub fn from_fn<T, F>(f: F) -> FnSequence<F>
where
    F: FnMut(&Transaction, Option<Response>) -> Result<Step<T>>,
{
    FnSequence(f)
}

impl<T, F> Sequence<T> for FnSequence<F>
where
    F: FnMut(&Transaction, Option<Response>) -> Result<Step<T>>,
{
    fn resume(&mut self, tx: &Transaction, input: Option<Response>) -> Result<Step<T>> {
        (self.0)(tx, input)
    }
}

impl<T, S: Sequence<T> + ?Sized> Sequence<T> for Box<S> {
    fn resume(&mut self, tx: &Transaction, input: Option<Response>) -> Result<Step<T>> {
        (**self).resume(tx, input)
    }
}
