//! Suspension adapters for a callback-based HTTP call API.
//!
//! # Overview
//! An HTTP client exposes each request as a `Call` that reports its outcome
//! to a `Callback`. This crate lets a caller await that outcome instead:
//! an adapter enqueues the call, the callback is re-dispatched onto a
//! caller-chosen `Executor`, and the result resumes a one-shot
//! `Continuation` whose other half, `Suspension`, is a `Future`.
//!
//! # Design
//! - The crate performs no I/O. Executing requests, serialization, retries
//!   and connection handling stay with whatever implements `Call`.
//! - `CoroutineAdapterFactory` picks an adapter once per call site from a
//!   `CallSite` description: `Continuation<Foo>` gets a `BodyAdapter`,
//!   `Continuation<Response<Foo>>` gets an `EnvelopeAdapter`.
//! - `DispatchingCall` moves delivery onto the executor and turns a late
//!   cancellation into `CallError::Canceled`.
//! - Failures carry the location of the suspending call as a cause chain
//!   (`SuspendError::Failed`).

pub mod adapter;
pub mod call;
pub mod calls;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod factory;
pub mod http;
pub mod suspension;

pub use adapter::{BodyAdapter, CallAdapter, EnvelopeAdapter, Suspended};
pub use call::{Call, Callback};
pub use dispatch::{CancelHandle, DispatchingCall};
pub use error::{CallError, ConfigError, EnqueueError, HttpError, SuspendError};
pub use executor::{Executor, InlineExecutor, Task, TokioExecutor};
pub use factory::{
    AdapterFactory, AdapterPlan, AdapterRegistry, Annotation, CallSite, CoroutineAdapterFactory, RawType,
    ResultShape, TypeDesc,
};
pub use http::{HttpMethod, HttpRequest, Response};
pub use suspension::{suspension, Continuation, Suspension};
