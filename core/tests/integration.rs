//! Adapters driving real HTTP calls against the fixture server.
//!
//! # Design
//! Starts the mock server on a random port and implements `Call` on top of
//! ureq. Each enqueue performs the blocking request on its own thread, the
//! way a client's worker pool would, and results are delivered through a
//! `TokioExecutor` bound to the test runtime.

use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use call_suspend::{
    AdapterRegistry, Call, CallAdapter, CallError, CallSite, Callback, CoroutineAdapterFactory, EnqueueError,
    HttpMethod, HttpRequest, Response, TokioExecutor, TypeDesc,
};
use mock_server::{Item, FIXTURE_HEADER};
use serde::de::DeserializeOwned;

struct Inner {
    agent: ureq::Agent,
    request: HttpRequest,
    executed: AtomicBool,
    canceled: AtomicBool,
}

/// A `Call` executed with ureq, decoding JSON bodies into `T`.
struct HttpCall<T> {
    inner: Arc<Inner>,
    _body: PhantomData<fn() -> T>,
}

impl<T> HttpCall<T> {
    fn new(request: HttpRequest) -> Self {
        // Status codes are data here; the adapters decide what they mean.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            inner: Arc::new(Inner {
                agent,
                request,
                executed: AtomicBool::new(false),
                canceled: AtomicBool::new(false),
            }),
            _body: PhantomData,
        }
    }
}

fn perform<T: DeserializeOwned>(agent: &ureq::Agent, req: &HttpRequest) -> Result<Response<T>, CallError> {
    let result = match (req.method, req.body.as_deref()) {
        (HttpMethod::Get, _) => agent.get(&req.path).call(),
        (HttpMethod::Delete, _) => agent.delete(&req.path).call(),
        (HttpMethod::Post, Some(body)) => agent.post(&req.path).content_type("application/json").send(body.as_bytes()),
        (HttpMethod::Post, None) => agent.post(&req.path).send_empty(),
        (HttpMethod::Put, Some(body)) => agent.put(&req.path).content_type("application/json").send(body.as_bytes()),
        (HttpMethod::Put, None) => agent.put(&req.path).send_empty(),
    };
    let mut response = result.map_err(transport)?;

    let status = response.status().as_u16();
    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();
    let text = response.body_mut().read_to_string().map_err(transport)?;

    if !(200..300).contains(&status) {
        return Ok(Response::error(status, headers, text));
    }
    if text.is_empty() {
        return Ok(Response::from_parts(status, headers, None, None));
    }
    let body = serde_json::from_str(&text).map_err(CallError::transport)?;
    Ok(Response::success(status, headers, body))
}

fn transport(error: ureq::Error) -> CallError {
    match error {
        ureq::Error::Io(io) => io.into(),
        other => CallError::transport(other),
    }
}

impl<T: DeserializeOwned + Send + 'static> Call<T> for HttpCall<T> {
    fn enqueue(&self, callback: Box<dyn Callback<T>>) -> Result<(), EnqueueError> {
        if self.inner.executed.swap(true, Ordering::AcqRel) {
            return Err(EnqueueError::AlreadyExecuted);
        }
        let call = HttpCall::<T> {
            inner: Arc::clone(&self.inner),
            _body: PhantomData,
        };
        std::thread::spawn(move || match perform(&call.inner.agent, &call.inner.request) {
            Ok(response) => callback.on_response(&call, response),
            Err(error) => callback.on_failure(&call, error),
        });
        Ok(())
    }

    fn execute(&self) -> Result<Response<T>, CallError> {
        if self.inner.executed.swap(true, Ordering::AcqRel) {
            return Err(EnqueueError::AlreadyExecuted.into());
        }
        perform(&self.inner.agent, &self.inner.request)
    }

    fn is_executed(&self) -> bool {
        self.inner.executed.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        // ureq cannot abort a request in flight; the flag is read at delivery.
        self.inner.canceled.store(true, Ordering::Release);
    }

    fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::Acquire)
    }

    fn clone_call(&self) -> Box<dyn Call<T>> {
        Box::new(HttpCall::<T>::new(self.inner.request.clone()))
    }

    fn request(&self) -> HttpRequest {
        self.inner.request.clone()
    }
}

/// Start the fixture server on a random port, on its own runtime thread.
fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    addr
}

fn get<T: DeserializeOwned + Send + 'static>(addr: SocketAddr, path: &str) -> Box<dyn Call<T>> {
    Box::new(HttpCall::<T>::new(HttpRequest::get(format!("http://{addr}{path}"))))
}

fn factory() -> CoroutineAdapterFactory {
    CoroutineAdapterFactory::new(Arc::new(TokioExecutor::current().unwrap()))
}

#[tokio::test(flavor = "multi_thread")]
async fn body_adapter_from_call_site_fetches_item() {
    let addr = start_server();
    let registry = AdapterRegistry::new().with_factory(factory());
    let site = CallSite::new(TypeDesc::continuation(TypeDesc::of::<Item>()), TypeDesc::any());
    let adapter = registry.resolve(&site).unwrap().bind_body::<Item>().unwrap();

    let item = adapter.suspend(get(addr, "/items/1")).unwrap().await.unwrap();
    assert_eq!(
        item,
        Item {
            id: 1,
            name: "anvil".to_string()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn body_adapter_surfaces_404_as_http_error() {
    let addr = start_server();
    let adapter = factory().body::<Item>();

    let err = adapter.suspend(get(addr, "/items/99")).unwrap().await.unwrap_err();
    match err.call_error() {
        Some(CallError::Http(http)) => {
            assert_eq!(http.status(), 404);
            assert!(http.body().unwrap().contains("item 99 not found"));
        }
        other => panic!("expected HTTP failure, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn envelope_adapter_exposes_status_and_headers() {
    let addr = start_server();
    let adapter = factory().envelope::<Item>();

    let ok = adapter.suspend(get(addr, "/items/3")).unwrap().await.unwrap();
    assert_eq!(ok.status(), 200);
    assert_eq!(ok.header(FIXTURE_HEADER), Some("mock-server"));
    assert_eq!(ok.body().map(|item| item.name.as_str()), Some("chisel"));

    let failed = adapter.suspend(get(addr, "/status/503")).unwrap().await.unwrap();
    assert_eq!(failed.status(), 503);
    assert_eq!(failed.error_body(), Some("status 503"));
    assert_eq!(failed.header(FIXTURE_HEADER), Some("mock-server"));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_success_body() {
    let addr = start_server();

    let err = factory()
        .body::<Item>()
        .suspend(get(addr, "/empty"))
        .unwrap()
        .await
        .unwrap_err();
    assert!(matches!(err.call_error(), Some(CallError::EmptyBody { status: 204 })));

    let response = factory()
        .envelope::<Item>()
        .suspend(get(addr, "/empty"))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
    assert!(response.body().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_during_flight_reports_canceled() {
    let addr = start_server();
    let suspension = factory().body::<Item>().suspend(get(addr, "/delay/200")).unwrap();
    suspension.cancel();

    let err = suspension.await.unwrap_err();
    let call_error = err.call_error().unwrap();
    assert!(call_error.is_canceled());
    assert!(call_error.is_io());
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_failure_keeps_its_kind() {
    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let expected = HttpCall::<Item>::new(HttpRequest::get(format!("http://{closed}/items/1")))
        .execute()
        .unwrap_err();
    let err = factory()
        .body::<Item>()
        .suspend(get(closed, "/items/1"))
        .unwrap()
        .await
        .unwrap_err();
    let actual = err.call_error().unwrap();
    assert!(matches!(actual, CallError::Io(_) | CallError::Transport(_)));
    assert_eq!(std::mem::discriminant(actual), std::mem::discriminant(&expected));
    assert_eq!(actual.to_string(), expected.to_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn clone_reissues_request() {
    let addr = start_server();
    let call = get::<Item>(addr, "/items/2");
    let retry = call.clone_call();
    let adapter = factory().body::<Item>();

    let first = adapter.suspend(call).unwrap().await.unwrap();
    let second = adapter.suspend(retry).unwrap().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.name, "bellows");
}

#[tokio::test(flavor = "multi_thread")]
async fn created_item_appears_in_listing() {
    let addr = start_server();
    let create: Box<dyn Call<Item>> = Box::new(HttpCall::<Item>::new(HttpRequest::post(
        format!("http://{addr}/items"),
        r#"{"name":"drill"}"#,
    )));

    let created = factory().envelope::<Item>().suspend(create).unwrap().await.unwrap();
    assert_eq!(created.status(), 201);
    let created = created.into_body().unwrap();
    assert_eq!(created.name, "drill");

    let items = factory()
        .body::<Vec<Item>>()
        .suspend(get(addr, "/items"))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(items.len(), 4);
    assert_eq!(items.last(), Some(&created));
}
