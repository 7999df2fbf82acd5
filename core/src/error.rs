//! Error types for the shim.
//!
//! # Design
//! Errors are split by when they surface:
//! - `ConfigError` is raised once, while a call site is being registered,
//!   and means the declaration itself is malformed.
//! - `EnqueueError` is returned synchronously when a caller breaks the
//!   single-shot contract of a request handle.
//! - `CallError` is the per-call failure delivered through a callback. It is
//!   `Clone` so completed handles can be re-issued with the same outcome.
//! - `SuspendError` is what a suspended caller observes. It wraps a
//!   `CallError` together with the place the suspending call was made.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::panic::Location;
use std::sync::Arc;

use crate::http::Response;

/// Malformed call-site declaration, detected at registration time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("continuation type must be parameterized, found `{found}`")]
    UnparameterizedContinuation { found: String },

    #[error("response must be parameterized as Response<Foo>, found `{found}`")]
    UnparameterizedResponse { found: String },

    #[error("adapter plan delivers {planned}, but {requested} was requested")]
    ShapeMismatch {
        planned: &'static str,
        requested: &'static str,
    },

    #[error("adapter plan was built for `{declared}`, but `{requested}` was requested")]
    TypeMismatch { declared: String, requested: String },

    #[error("no adapter accepts parameter `{parameter}` returning `{return_type}`")]
    NoAdapter {
        parameter: String,
        return_type: String,
    },
}

/// Caller-contract violation reported synchronously by `Call::enqueue`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    #[error("already executed")]
    AlreadyExecuted,
}

/// A per-call failure delivered through `Callback::on_failure`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    /// The call was canceled. Reported even when the exchange itself
    /// completed, so a canceled call never delivers a success.
    #[error("Canceled")]
    Canceled,

    /// I/O failure raised by the HTTP client before a response existed.
    #[error(transparent)]
    Io(Arc<io::Error>),

    /// Any other failure raised before a response existed.
    #[error("transport failure: {0}")]
    Transport(Arc<dyn StdError + Send + Sync>),

    /// A response arrived but its status is not successful.
    #[error(transparent)]
    Http(HttpError),

    /// A successful response arrived without the body the caller asked for.
    #[error("HTTP {status} response had no body")]
    EmptyBody { status: u16 },

    /// `Call::execute` on a handle that already ran.
    #[error(transparent)]
    Contract(#[from] EnqueueError),
}

impl CallError {
    pub fn transport(error: impl StdError + Send + Sync + 'static) -> Self {
        CallError::Transport(Arc::new(error))
    }

    /// `true` for failures of I/O kind, cancellation included.
    pub fn is_io(&self) -> bool {
        matches!(self, CallError::Canceled | CallError::Io(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, CallError::Canceled)
    }
}

impl From<io::Error> for CallError {
    fn from(error: io::Error) -> Self {
        CallError::Io(Arc::new(error))
    }
}

impl From<HttpError> for CallError {
    fn from(error: HttpError) -> Self {
        CallError::Http(error)
    }
}

/// Unsuccessful HTTP outcome: status, headers and raw payload of the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl HttpError {
    /// Capture status, headers and `error_body` of an unsuccessful response.
    ///
    /// A typed body on an unsuccessful response is not carried over: the
    /// failure only holds the raw payload, which is `error_body`.
    pub fn from_response<T>(response: &Response<T>) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().to_vec(),
            body: response.error_body().map(str::to_string),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Some(body) if !body.is_empty() => write!(f, "HTTP {}: {body}", self.status),
            _ => write!(f, "HTTP {}", self.status),
        }
    }
}

impl StdError for HttpError {}

/// Failure observed by a suspended caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SuspendError {
    /// The call failed. `origin` is where the suspending call was made,
    /// `source` is the failure as the callback delivered it.
    #[error("call suspended at {origin} failed: {source}")]
    Failed {
        origin: &'static Location<'static>,
        #[source]
        source: CallError,
    },

    /// The continuation was dropped without ever being resumed.
    #[error("continuation dropped without a result")]
    Abandoned,
}

impl SuspendError {
    pub fn failed(origin: &'static Location<'static>, source: CallError) -> Self {
        SuspendError::Failed { origin, source }
    }

    pub fn call_error(&self) -> Option<&CallError> {
        match self {
            SuspendError::Failed { source, .. } => Some(source),
            SuspendError::Abandoned => None,
        }
    }

    pub fn origin(&self) -> Option<&'static Location<'static>> {
        match self {
            SuspendError::Failed { origin, .. } => Some(*origin),
            SuspendError::Abandoned => None,
        }
    }

    pub fn into_call_error(self) -> Option<CallError> {
        match self {
            SuspendError::Failed { source, .. } => Some(source),
            SuspendError::Abandoned => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canceled_is_io_kind_with_fixed_message() {
        let err = CallError::Canceled;
        assert!(err.is_io());
        assert_eq!(err.to_string(), "Canceled");
    }

    #[test]
    fn io_error_converts_and_keeps_kind() {
        let err: CallError = io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(err.is_io());
        match err {
            CallError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::ConnectionRefused),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn http_error_display_includes_body() {
        let response = Response::<()>::error(503, Vec::new(), "try later");
        let err = HttpError::from_response(&response);
        assert_eq!(err.to_string(), "HTTP 503: try later");
        assert_eq!(err.status(), 503);
    }

    #[test]
    fn suspend_error_chains_call_error_as_source() {
        let origin = Location::caller();
        let err = SuspendError::failed(origin, CallError::EmptyBody { status: 204 });
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "HTTP 204 response had no body");
        assert!(err.to_string().contains(origin.file()));
        assert_eq!(err.origin(), Some(origin));
    }
}
