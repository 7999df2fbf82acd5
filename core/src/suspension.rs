//! One-shot hand-off between a delivered result and a suspended caller.
//!
//! # Design
//! `suspension()` returns the two halves of a single-assignment cell backed
//! by a `futures` one-shot channel. `Continuation` is the writing half. Its
//! resume methods consume it, so a second resumption does not compile.
//! A continuation dropped without resuming wakes the waiting side with
//! `SuspendError::Abandoned` instead of leaving it parked forever.
//!
//! `Suspension` is the waiting half and a `Future`. When it is bound to an
//! in-flight call, dropping it before it completes cancels that call.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::dispatch::CancelHandle;
use crate::error::SuspendError;

/// Create a connected `Continuation` / `Suspension` pair.
pub fn suspension<T>() -> (Continuation<T>, Suspension<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Continuation { tx: Some(tx) },
        Suspension {
            rx,
            call: None,
            done: false,
        },
    )
}

/// The token used to resume a suspended caller, exactly once.
pub struct Continuation<T> {
    tx: Option<oneshot::Sender<Result<T, SuspendError>>>,
}

impl<T> Continuation<T> {
    pub fn resume(mut self, value: T) {
        self.complete(Ok(value));
    }

    pub fn resume_with_error(mut self, error: SuspendError) {
        self.complete(Err(error));
    }

    pub fn resume_with(mut self, result: Result<T, SuspendError>) {
        self.complete(result);
    }

    /// `true` once the waiting side is gone and nobody will observe a result.
    pub fn is_canceled(&self) -> bool {
        self.tx.as_ref().map_or(true, oneshot::Sender::is_canceled)
    }

    fn complete(&mut self, result: Result<T, SuspendError>) {
        if let Some(tx) = self.tx.take() {
            tracing::trace!(ok = result.is_ok(), "resume");
            if tx.send(result).is_err() {
                tracing::trace!("suspension dropped before resumption");
            }
        }
    }
}

impl<T> Drop for Continuation<T> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!("continuation dropped without being resumed");
        }
    }
}

impl<T> std::fmt::Debug for Continuation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Continuation")
            .field("resumed", &self.tx.is_none())
            .finish()
    }
}

/// The waiting side of a suspension; resolves to the resumed result.
#[must_use = "a suspension does nothing unless awaited or polled"]
pub struct Suspension<T> {
    rx: oneshot::Receiver<Result<T, SuspendError>>,
    call: Option<CancelHandle>,
    done: bool,
}

impl<T> Suspension<T> {
    /// Tie this suspension to the call that will resume it.
    pub(crate) fn bind(&mut self, call: CancelHandle) {
        self.call = Some(call);
    }

    /// Take the result if the continuation was already resumed.
    ///
    /// Returns `None` while pending and after the result has been taken.
    pub fn try_take(&mut self) -> Option<Result<T, SuspendError>> {
        if self.done {
            return None;
        }
        let result = match self.rx.try_recv() {
            Ok(None) => return None,
            Ok(Some(result)) => result,
            Err(oneshot::Canceled) => Err(SuspendError::Abandoned),
        };
        self.done = true;
        Some(result)
    }

    /// Cancel the call this suspension is waiting on, if it is bound to one.
    ///
    /// The suspension still completes, with `CallError::Canceled` unless the
    /// result was already delivered.
    pub fn cancel(&self) {
        if let Some(call) = &self.call {
            call.cancel();
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

impl<T> Future for Suspension<T> {
    type Output = Result<T, SuspendError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(Err(SuspendError::Abandoned));
        }
        let result = match Pin::new(&mut this.rx).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(result)) => result,
            Poll::Ready(Err(oneshot::Canceled)) => Err(SuspendError::Abandoned),
        };
        this.done = true;
        Poll::Ready(result)
    }
}

impl<T> Drop for Suspension<T> {
    fn drop(&mut self) {
        if !self.done {
            if let Some(call) = &self.call {
                tracing::debug!("suspension dropped while pending, canceling call");
                call.cancel();
            }
        }
    }
}

impl<T> std::fmt::Debug for Suspension<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suspension")
            .field("done", &self.done)
            .field("call", &self.call)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::error::CallError;

    #[test]
    fn resume_delivers_value() {
        let (continuation, suspension) = suspension();
        continuation.resume(11);
        assert_eq!(block_on(suspension).unwrap(), 11);
    }

    #[test]
    fn resume_with_error_delivers_failure() {
        let (continuation, suspension) = suspension::<u8>();
        let origin = std::panic::Location::caller();
        continuation.resume_with_error(SuspendError::failed(origin, CallError::Canceled));
        let err = block_on(suspension).unwrap_err();
        assert!(err.call_error().unwrap().is_canceled());
    }

    #[test]
    fn dropped_continuation_abandons() {
        let (continuation, suspension) = suspension::<u8>();
        drop(continuation);
        assert!(matches!(block_on(suspension), Err(SuspendError::Abandoned)));
    }

    #[test]
    fn try_take_yields_once() {
        let (continuation, mut suspension) = suspension();
        assert!(suspension.try_take().is_none());
        continuation.resume("done");
        assert_eq!(suspension.try_take().unwrap().unwrap(), "done");
        assert!(suspension.try_take().is_none());
        assert!(suspension.is_done());
    }

    #[test]
    fn continuation_sees_dropped_suspension() {
        let (continuation, suspension) = suspension::<u8>();
        assert!(!continuation.is_canceled());
        drop(suspension);
        assert!(continuation.is_canceled());
        continuation.resume(1);
    }
}
