//! Call decorator that delivers callbacks through an executor.
//!
//! # Design
//! `DispatchingCall` forwards everything to the wrapped handle except
//! `enqueue` and `clone_call`. Its `enqueue` registers an internal callback
//! on the delegate; when the delegate fires (typically on an HTTP client
//! worker thread) the internal callback submits the real delivery to the
//! executor instead of running it inline.
//!
//! Cancellation is checked when the delivery runs, not when the delegate
//! fires. A call canceled after its exchange completed still reports
//! `CallError::Canceled` rather than a success.
//!
//! The internal callback only holds a `Weak` reference to the wrapper. A
//! delegate that stores its callback until completion owns that callback,
//! and a strong reference back would keep the delegate alive forever. Once
//! the wrapper and every `CancelHandle` taken from it are gone, nobody can
//! observe the outcome and the caller's callback is dropped unfired.

use std::sync::{Arc, Weak};

use crate::call::{Call, Callback};
use crate::error::{CallError, EnqueueError};
use crate::executor::Executor;
use crate::http::{HttpRequest, Response};

struct Shared<T> {
    executor: Arc<dyn Executor>,
    delegate: Box<dyn Call<T>>,
}

/// A `Call` whose callbacks run on a configured executor.
pub struct DispatchingCall<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> DispatchingCall<T> {
    pub fn new(executor: Arc<dyn Executor>, delegate: Box<dyn Call<T>>) -> Self {
        Self {
            shared: Arc::new(Shared { executor, delegate }),
        }
    }

    /// A handle that cancels the wrapped call, usable after this wrapper is gone.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            target: Arc::clone(&self.shared) as Arc<dyn Cancel>,
        }
    }
}

impl<T: Send + 'static> Call<T> for DispatchingCall<T> {
    fn enqueue(&self, callback: Box<dyn Callback<T>>) -> Result<(), EnqueueError> {
        let request = self.shared.delegate.request();
        tracing::debug!(method = ?request.method, path = %request.path, "enqueue");
        self.shared.delegate.enqueue(Box::new(Redispatch {
            shared: Arc::downgrade(&self.shared),
            callback,
        }))
    }

    fn execute(&self) -> Result<Response<T>, CallError> {
        self.shared.delegate.execute()
    }

    fn is_executed(&self) -> bool {
        self.shared.delegate.is_executed()
    }

    fn cancel(&self) {
        self.shared.delegate.cancel()
    }

    fn is_canceled(&self) -> bool {
        self.shared.delegate.is_canceled()
    }

    fn clone_call(&self) -> Box<dyn Call<T>> {
        Box::new(DispatchingCall::new(
            Arc::clone(&self.shared.executor),
            self.shared.delegate.clone_call(),
        ))
    }

    fn request(&self) -> HttpRequest {
        self.shared.delegate.request()
    }
}

/// Internal callback registered on the delegate.
struct Redispatch<T> {
    shared: Weak<Shared<T>>,
    callback: Box<dyn Callback<T>>,
}

impl<T: Send + 'static> Redispatch<T> {
    fn deliver(self: Box<Self>, outcome: Result<Response<T>, CallError>) {
        let Redispatch { shared, callback } = *self;
        let Some(executor) = shared.upgrade().map(|shared| Arc::clone(&shared.executor)) else {
            tracing::debug!("call released before delivery, dropping callback");
            return;
        };
        executor.execute(Box::new(move || {
            let Some(shared) = shared.upgrade() else {
                tracing::debug!("call released before delivery, dropping callback");
                return;
            };
            let call = DispatchingCall { shared };
            match outcome {
                Ok(_) if call.is_canceled() => {
                    tracing::debug!(path = %call.request().path, "call canceled before delivery");
                    callback.on_failure(&call, CallError::Canceled);
                }
                Ok(response) => callback.on_response(&call, response),
                Err(error) => callback.on_failure(&call, error),
            }
        }));
    }
}

impl<T: Send + 'static> Callback<T> for Redispatch<T> {
    fn on_response(self: Box<Self>, _call: &dyn Call<T>, response: Response<T>) {
        self.deliver(Ok(response))
    }

    fn on_failure(self: Box<Self>, _call: &dyn Call<T>, error: CallError) {
        self.deliver(Err(error))
    }
}

trait Cancel: Send + Sync {
    fn cancel(&self);

    fn is_canceled(&self) -> bool;
}

impl<T> Cancel for Shared<T> {
    fn cancel(&self) {
        self.delegate.cancel()
    }

    fn is_canceled(&self) -> bool {
        self.delegate.is_canceled()
    }
}

/// Type-erased cancellation of one in-flight call.
#[derive(Clone)]
pub struct CancelHandle {
    target: Arc<dyn Cancel>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.target.cancel()
    }

    pub fn is_canceled(&self) -> bool {
        self.target.is_canceled()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("canceled", &self.is_canceled())
            .finish()
    }
}
