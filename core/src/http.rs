//! HTTP plain-data types shared by request handles and adapters.
//!
//! # Design
//! The shim never performs I/O. A `Call` describes what it will send as an
//! `HttpRequest`, and whatever HTTP client backs the call reports the outcome
//! as a `Response<T>` envelope. Both are plain data with owned fields so
//! they can move freely between the client's worker threads and the
//! executor that delivers results.

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// An HTTP request described as plain data.
///
/// Returned by `Call::request` so callers can see what an in-flight or
/// re-issuable handle targets without reaching into the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// A POST carrying a JSON `body`.
    pub fn post(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body.into()),
        }
    }
}

/// The response envelope produced by a completed call.
///
/// A successful outcome (any 2xx status) carries the converted `body`. An
/// unsuccessful outcome carries the raw payload in `error_body` instead, so
/// callers can inspect what the server said without the client having to
/// convert it into `T`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<T> {
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<T>,
    error_body: Option<String>,
}

impl<T> Response<T> {
    /// A response carrying a converted body.
    pub fn success(status: u16, headers: Vec<(String, String)>, body: T) -> Self {
        Self::from_parts(status, headers, Some(body), None)
    }

    /// A response whose body could not be treated as a `T`.
    pub fn error(status: u16, headers: Vec<(String, String)>, error_body: impl Into<String>) -> Self {
        Self::from_parts(status, headers, None, Some(error_body.into()))
    }

    /// A response from its raw parts.
    ///
    /// Nothing ties `body` to successful statuses, but an unsuccessful
    /// response should report its payload through `error_body`: that is the
    /// only part a `BodyAdapter` failure keeps.
    pub fn from_parts(
        status: u16,
        headers: Vec<(String, String)>,
        body: Option<T>,
        error_body: Option<String>,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            error_body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// `true` for 2xx statuses.
    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> Option<&T> {
        self.body.as_ref()
    }

    pub fn into_body(self) -> Option<T> {
        self.body
    }

    pub fn error_body(&self) -> Option<&str> {
        self.error_body.as_deref()
    }
}
