//! Request handle and callback contracts.
//!
//! # Design
//! `Call<T>` is the one capability the shim needs from an HTTP client: a
//! single-shot handle that can be enqueued with a callback, queried for
//! cancellation and cloned into a fresh handle for the same request.
//!
//! `Callback<T>` methods take `self: Box<Self>`, so a registration can fire
//! at most once and only one of its two paths can run. Implementations of
//! `Call` are expected to invoke exactly one of them per enqueue, or to drop
//! the callback unfired once the call can no longer complete (for example
//! when every handle able to complete or observe it is gone). Dropping is
//! how a waiting continuation learns it was abandoned.

use crate::error::{CallError, EnqueueError};
use crate::http::{HttpRequest, Response};

/// One in-flight or re-issuable network operation producing a `T`.
pub trait Call<T>: Send + Sync {
    /// Start the call and deliver its outcome to `callback`.
    ///
    /// Fails synchronously with `EnqueueError::AlreadyExecuted` if this
    /// instance was already enqueued or executed; use `clone_call` to retry.
    fn enqueue(&self, callback: Box<dyn Callback<T>>) -> Result<(), EnqueueError>;

    /// Perform the call on the current thread.
    fn execute(&self) -> Result<Response<T>, CallError>;

    fn is_executed(&self) -> bool;

    fn cancel(&self);

    fn is_canceled(&self) -> bool;

    /// A new, unexecuted handle with the same configuration as this one.
    fn clone_call(&self) -> Box<dyn Call<T>>;

    fn request(&self) -> HttpRequest;
}

/// Success and failure handlers attached to a `Call`.
pub trait Callback<T>: Send {
    fn on_response(self: Box<Self>, call: &dyn Call<T>, response: Response<T>);

    fn on_failure(self: Box<Self>, call: &dyn Call<T>, error: CallError);
}

/// Build a callback from a closure receiving the call of record and the outcome.
pub fn from_fn<T, F>(f: F) -> Box<dyn Callback<T>>
where
    T: 'static,
    F: FnOnce(&dyn Call<T>, Result<Response<T>, CallError>) + Send + 'static,
{
    Box::new(FnCallback(f))
}

struct FnCallback<F>(F);

impl<T, F> Callback<T> for FnCallback<F>
where
    F: FnOnce(&dyn Call<T>, Result<Response<T>, CallError>) + Send,
{
    fn on_response(self: Box<Self>, call: &dyn Call<T>, response: Response<T>) {
        (self.0)(call, Ok(response))
    }

    fn on_failure(self: Box<Self>, call: &dyn Call<T>, error: CallError) {
        (self.0)(call, Err(error))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::calls;

    #[test]
    fn from_fn_receives_response() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let call = calls::response(Response::success(200, Vec::new(), 7u32));
        call.enqueue(from_fn(move |_, outcome: Result<Response<u32>, CallError>| {
            *sink.lock().unwrap() = Some(outcome.map(|r| r.into_body()).ok().flatten());
        }))
        .unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(Some(7)));
    }

    #[test]
    fn from_fn_receives_failure() {
        let seen = Arc::new(Mutex::new(false));
        let sink = Arc::clone(&seen);
        let call = calls::failure::<u32>(CallError::Canceled);
        call.enqueue(from_fn(move |_, outcome: Result<Response<u32>, CallError>| {
            *sink.lock().unwrap() = matches!(outcome, Err(CallError::Canceled));
        }))
        .unwrap();
        assert!(*seen.lock().unwrap());
    }
}
