//! Adapters that turn a callback-delivered outcome into a resumed suspension.
//!
//! # Design
//! Both adapters wrap the incoming call in a `DispatchingCall`, enqueue it
//! with a callback owning the `Continuation`, and return `Suspended`. The
//! continuation is the only channel through which a result reaches the
//! caller.
//!
//! - `BodyAdapter<T>` resumes with the body of a successful response and
//!   turns an unsuccessful status into `CallError::Http`.
//! - `EnvelopeAdapter<T>` resumes with the `Response<T>` itself, whatever
//!   its status.
//!
//! `adapt` is `#[track_caller]`: the location of the adapting call is
//! captured up front and attached to any failure, so the error points at
//! the code that suspended rather than at the delivery machinery.

use std::marker::PhantomData;
use std::panic::Location;
use std::sync::Arc;

use crate::call::{Call, Callback};
use crate::dispatch::{CancelHandle, DispatchingCall};
use crate::error::{CallError, EnqueueError, HttpError, SuspendError};
use crate::executor::Executor;
use crate::factory::TypeDesc;
use crate::http::Response;
use crate::suspension::{suspension, Continuation, Suspension};

/// Marker returned by `CallAdapter::adapt`: the result will arrive through
/// the continuation.
///
/// It owns the in-flight call. Dropping it (and its `CancelHandle`) before
/// delivery releases the call, and the continuation resolves as
/// `SuspendError::Abandoned`.
#[derive(Debug, Clone)]
#[must_use = "dropping `Suspended` releases the in-flight call"]
pub struct Suspended {
    call: CancelHandle,
}

impl Suspended {
    /// Cancellation for the call now in flight.
    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.call
    }

    pub fn into_cancel_handle(self) -> CancelHandle {
        self.call
    }
}

/// Adapts a `Call<T>` into a suspension resolving to `Self::Output`.
pub trait CallAdapter<T: Send + 'static> {
    type Output: Send + 'static;

    /// The body type this adapter was built for.
    fn response_type(&self) -> &TypeDesc;

    /// Enqueue `call` and resume `continuation` exactly once with its outcome.
    #[track_caller]
    fn adapt(
        &self,
        call: Box<dyn Call<T>>,
        continuation: Continuation<Self::Output>,
    ) -> Result<Suspended, EnqueueError>;

    /// Enqueue `call` and return a future for its adapted outcome.
    ///
    /// Dropping the returned `Suspension` before it resolves cancels `call`.
    #[track_caller]
    fn suspend(&self, call: Box<dyn Call<T>>) -> Result<Suspension<Self::Output>, EnqueueError> {
        let (continuation, mut suspension) = suspension();
        let suspended = self.adapt(call, continuation)?;
        suspension.bind(suspended.into_cancel_handle());
        Ok(suspension)
    }
}

fn dispatch<T: Send + 'static>(
    executor: &Arc<dyn Executor>,
    call: Box<dyn Call<T>>,
    callback: Box<dyn Callback<T>>,
) -> Result<Suspended, EnqueueError> {
    let call = DispatchingCall::new(Arc::clone(executor), call);
    let handle = call.cancel_handle();
    call.enqueue(callback)?;
    Ok(Suspended { call: handle })
}

/// Resumes with the unwrapped body of a successful response.
pub struct BodyAdapter<T> {
    response_type: TypeDesc,
    executor: Arc<dyn Executor>,
    _body: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> BodyAdapter<T> {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            response_type: TypeDesc::of::<T>(),
            executor,
            _body: PhantomData,
        }
    }
}

impl<T: Send + 'static> CallAdapter<T> for BodyAdapter<T> {
    type Output = T;

    fn response_type(&self) -> &TypeDesc {
        &self.response_type
    }

    #[track_caller]
    fn adapt(&self, call: Box<dyn Call<T>>, continuation: Continuation<T>) -> Result<Suspended, EnqueueError> {
        let origin = Location::caller();
        dispatch(
            &self.executor,
            call,
            Box::new(BodyDelivery {
                continuation,
                origin,
            }),
        )
    }
}

struct BodyDelivery<T> {
    continuation: Continuation<T>,
    origin: &'static Location<'static>,
}

impl<T: Send> Callback<T> for BodyDelivery<T> {
    fn on_response(self: Box<Self>, _call: &dyn Call<T>, response: Response<T>) {
        if !response.is_successful() {
            let error = HttpError::from_response(&response);
            return self.fail(error.into());
        }
        let status = response.status();
        match response.into_body() {
            Some(body) => self.continuation.resume(body),
            None => self.fail(CallError::EmptyBody { status }),
        }
    }

    fn on_failure(self: Box<Self>, _call: &dyn Call<T>, error: CallError) {
        self.fail(error)
    }
}

impl<T> BodyDelivery<T> {
    fn fail(self: Box<Self>, error: CallError) {
        let BodyDelivery {
            continuation,
            origin,
        } = *self;
        continuation.resume_with_error(SuspendError::failed(origin, error));
    }
}

/// Resumes with the whole response envelope, successful or not.
pub struct EnvelopeAdapter<T> {
    response_type: TypeDesc,
    executor: Arc<dyn Executor>,
    _body: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> EnvelopeAdapter<T> {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            response_type: TypeDesc::of::<T>(),
            executor,
            _body: PhantomData,
        }
    }
}

impl<T: Send + 'static> CallAdapter<T> for EnvelopeAdapter<T> {
    type Output = Response<T>;

    fn response_type(&self) -> &TypeDesc {
        &self.response_type
    }

    #[track_caller]
    fn adapt(
        &self,
        call: Box<dyn Call<T>>,
        continuation: Continuation<Response<T>>,
    ) -> Result<Suspended, EnqueueError> {
        let origin = Location::caller();
        dispatch(
            &self.executor,
            call,
            Box::new(EnvelopeDelivery {
                continuation,
                origin,
            }),
        )
    }
}

struct EnvelopeDelivery<T> {
    continuation: Continuation<Response<T>>,
    origin: &'static Location<'static>,
}

impl<T: Send> Callback<T> for EnvelopeDelivery<T> {
    fn on_response(self: Box<Self>, _call: &dyn Call<T>, response: Response<T>) {
        self.continuation.resume(response)
    }

    fn on_failure(self: Box<Self>, _call: &dyn Call<T>, error: CallError) {
        let EnvelopeDelivery {
            continuation,
            origin,
        } = *self;
        continuation.resume_with_error(SuspendError::failed(origin, error));
    }
}
