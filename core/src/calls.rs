//! Ready-made `Call` implementations that need no HTTP client.
//!
//! # Design
//! `CompletedCall` delivers a fixed outcome on the enqueuing thread, which
//! makes adapter behavior fully deterministic when paired with
//! `InlineExecutor`. `PendingCall` holds its callback until a `Completer`
//! fires it, from any thread, which is how an HTTP client's worker pool
//! delivers results. Both honour the single-enqueue contract and report the
//! raw outcome even after `cancel`: deciding what a canceled delivery means
//! is the dispatching wrapper's job.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::call::{Call, Callback};
use crate::error::{CallError, EnqueueError};
use crate::http::{HttpRequest, Response};

const PLACEHOLDER_PATH: &str = "call://completed";

/// A call that completes with `response` as soon as it is enqueued.
pub fn response<T>(response: Response<T>) -> CompletedCall<T>
where
    T: Clone + Send + Sync + 'static,
{
    CompletedCall::new(HttpRequest::get(PLACEHOLDER_PATH), Ok(response))
}

/// A call that fails with `error` as soon as it is enqueued.
pub fn failure<T>(error: CallError) -> CompletedCall<T>
where
    T: Clone + Send + Sync + 'static,
{
    CompletedCall::new(HttpRequest::get(PLACEHOLDER_PATH), Err(error))
}

/// A call for `request` whose outcome is supplied later through the `Completer`.
pub fn pending<T>(request: HttpRequest) -> (PendingCall<T>, Completer<T>)
where
    T: Send + 'static,
{
    let call = PendingCall::new(request);
    let completer = call.completer();
    (call, completer)
}

/// A `Call` with a predetermined outcome.
pub struct CompletedCall<T> {
    request: HttpRequest,
    outcome: Result<Response<T>, CallError>,
    executed: AtomicBool,
    canceled: AtomicBool,
}

impl<T: Clone> CompletedCall<T> {
    pub fn new(request: HttpRequest, outcome: Result<Response<T>, CallError>) -> Self {
        Self {
            request,
            outcome,
            executed: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
        }
    }

    fn start(&self) -> Result<(), EnqueueError> {
        if self.executed.swap(true, Ordering::AcqRel) {
            return Err(EnqueueError::AlreadyExecuted);
        }
        Ok(())
    }
}

impl<T> Call<T> for CompletedCall<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn enqueue(&self, callback: Box<dyn Callback<T>>) -> Result<(), EnqueueError> {
        self.start()?;
        match self.outcome.clone() {
            Ok(response) => callback.on_response(self, response),
            Err(error) => callback.on_failure(self, error),
        }
        Ok(())
    }

    fn execute(&self) -> Result<Response<T>, CallError> {
        self.start()?;
        self.outcome.clone()
    }

    fn is_executed(&self) -> bool {
        self.executed.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    fn clone_call(&self) -> Box<dyn Call<T>> {
        Box::new(CompletedCall::new(self.request.clone(), self.outcome.clone()))
    }

    fn request(&self) -> HttpRequest {
        self.request.clone()
    }
}

enum PendingState<T> {
    Idle,
    Ready(Result<Response<T>, CallError>),
    Waiting(Box<dyn Callback<T>>),
    Executing,
    Done,
}

struct PendingShared<T> {
    request: HttpRequest,
    executed: AtomicBool,
    canceled: AtomicBool,
    completers: AtomicUsize,
    state: Mutex<PendingState<T>>,
    ready: Condvar,
}

/// A `Call` completed from outside, possibly from another thread.
///
/// A handle produced by `clone_call` is independent of the original and of
/// the original's `Completer`; get its own completer from `completer()` on a
/// concrete `PendingCall`.
///
/// Once the last `Completer` is dropped without completing, the call can no
/// longer finish: a waiting callback is dropped unfired and a blocked
/// `execute` returns an I/O error.
pub struct PendingCall<T> {
    shared: Arc<PendingShared<T>>,
}

impl<T: Send + 'static> PendingCall<T> {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            shared: Arc::new(PendingShared {
                request,
                executed: AtomicBool::new(false),
                canceled: AtomicBool::new(false),
                completers: AtomicUsize::new(0),
                state: Mutex::new(PendingState::Idle),
                ready: Condvar::new(),
            }),
        }
    }

    pub fn completer(&self) -> Completer<T> {
        self.shared.completers.fetch_add(1, Ordering::AcqRel);
        Completer {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> Call<T> for PendingCall<T> {
    fn enqueue(&self, callback: Box<dyn Callback<T>>) -> Result<(), EnqueueError> {
        if self.shared.executed.swap(true, Ordering::AcqRel) {
            return Err(EnqueueError::AlreadyExecuted);
        }
        let mut state = self.shared.state.lock();
        let previous = std::mem::replace(&mut *state, PendingState::Done);
        match previous {
            PendingState::Ready(outcome) => {
                drop(state);
                deliver(self, callback, outcome);
            }
            PendingState::Idle => *state = PendingState::Waiting(callback),
            other => {
                *state = other;
                drop(state);
                tracing::debug!(path = %self.shared.request.path, "pending call released, dropping callback");
            }
        }
        Ok(())
    }

    /// Block until a `Completer` supplies the outcome.
    fn execute(&self) -> Result<Response<T>, CallError> {
        if self.shared.executed.swap(true, Ordering::AcqRel) {
            return Err(EnqueueError::AlreadyExecuted.into());
        }
        let mut state = self.shared.state.lock();
        loop {
            let previous = std::mem::replace(&mut *state, PendingState::Done);
            match previous {
                PendingState::Ready(outcome) => return outcome,
                PendingState::Idle | PendingState::Executing
                    if self.shared.completers.load(Ordering::Acquire) > 0 =>
                {
                    *state = PendingState::Executing;
                    self.shared.ready.wait(&mut state);
                }
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "pending call released without an outcome",
                    )
                    .into())
                }
            }
        }
    }

    fn is_executed(&self) -> bool {
        self.shared.executed.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.shared.canceled.store(true, Ordering::Release);
    }

    fn is_canceled(&self) -> bool {
        self.shared.canceled.load(Ordering::Acquire)
    }

    fn clone_call(&self) -> Box<dyn Call<T>> {
        Box::new(PendingCall::new(self.shared.request.clone()))
    }

    fn request(&self) -> HttpRequest {
        self.shared.request.clone()
    }
}

/// Supplies the outcome of one `PendingCall`.
pub struct Completer<T> {
    shared: Arc<PendingShared<T>>,
}

impl<T: Send + 'static> Completer<T> {
    /// Deliver `outcome` on the current thread.
    ///
    /// If the call has not been enqueued yet the outcome is kept and handed
    /// over at enqueue time. Returns `true` if a waiting callback or a
    /// blocked `execute` received it.
    pub fn complete(self, outcome: Result<Response<T>, CallError>) -> bool {
        let mut state = self.shared.state.lock();
        let previous = std::mem::replace(&mut *state, PendingState::Done);
        match previous {
            PendingState::Waiting(callback) => {
                drop(state);
                let call = PendingCall {
                    shared: Arc::clone(&self.shared),
                };
                deliver(&call, callback, outcome);
                true
            }
            PendingState::Executing => {
                *state = PendingState::Ready(outcome);
                self.shared.ready.notify_all();
                true
            }
            PendingState::Idle => {
                *state = PendingState::Ready(outcome);
                false
            }
            other => {
                *state = other;
                false
            }
        }
    }

    /// Whether the call this completer belongs to was canceled.
    pub fn is_canceled(&self) -> bool {
        self.shared.canceled.load(Ordering::Acquire)
    }

    pub fn respond(self, response: Response<T>) -> bool {
        self.complete(Ok(response))
    }

    pub fn fail(self, error: CallError) -> bool {
        self.complete(Err(error))
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if self.shared.completers.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let mut state = self.shared.state.lock();
        let previous = std::mem::replace(&mut *state, PendingState::Done);
        match previous {
            PendingState::Waiting(callback) => {
                drop(state);
                tracing::debug!(path = %self.shared.request.path, "last completer dropped, releasing callback");
                drop(callback);
            }
            PendingState::Idle | PendingState::Executing => {
                self.shared.ready.notify_all();
            }
            other => *state = other,
        }
    }
}

fn deliver<T>(call: &dyn Call<T>, callback: Box<dyn Callback<T>>, outcome: Result<Response<T>, CallError>) {
    match outcome {
        Ok(response) => callback.on_response(call, response),
        Err(error) => callback.on_failure(call, error),
    }
}
