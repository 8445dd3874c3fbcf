//! Scripted transports for testing
//!
//! [`MockTransport`] stands in for a whole [`HttpTransport`] and lets tests decide the
//! response to every request, while recording what the pipelines sent. [`MockPlatform`]
//! sits one level lower and replaces the platform primitive underneath a
//! [`PlatformTransport`](super::PlatformTransport), so the adapter itself is exercised.

use super::error::TransportError;
use super::platform::{PlatformClient, PlatformRequest, PlatformResponse, PlatformResult};
use super::{ByteStream, CompletionMode, Content, HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A request as seen by [`MockTransport`], with its body already drained
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub content_headers: HeaderMap,
    pub body: Bytes,
    pub completion: CompletionMode,
}

impl RecordedRequest {
    /// Look up a header in either the message or the content header set
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| self.content_headers.get(name))
            .and_then(|v| v.to_str().ok())
    }

    /// Body as UTF-8 text (lossy)
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Builder for responses handed back by a [`MockTransport`] responder
pub struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    content_headers: HeaderMap,
    body: Option<ByteStream>,
}

impl MockResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            content_headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Add a message-level header
    pub fn header(mut self, name: &str, value: &str) -> Self {
        append(&mut self.headers, name, value);
        self
    }

    /// Add a content header (`Content-*`)
    pub fn content_header(mut self, name: &str, value: &str) -> Self {
        append(&mut self.content_headers, name, value);
        self
    }

    pub fn body(mut self, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        self.body = Some(Content::from_bytes(bytes).body);
        self
    }

    /// Use an arbitrary chunk stream as the body (e.g. one that never finishes)
    pub fn stream(mut self, body: ByteStream) -> Self {
        self.body = Some(body);
        self
    }

    pub fn build(self) -> HttpResponse {
        let content = match self.body {
            Some(body) => Content::from_stream(self.content_headers, body),
            None => Content::with_headers(self.content_headers, Bytes::new()),
        };
        HttpResponse {
            status: self.status,
            headers: self.headers,
            content: Some(content),
        }
    }
}

fn append(map: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            map.append(name, value);
        }
        _ => tracing::warn!(header = %name, "Ignoring invalid mock header"),
    }
}

type Responder = dyn Fn(&RecordedRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

/// Scripted [`HttpTransport`]
///
/// Every request is drained, recorded, and handed to the responder closure. An optional
/// latency is applied before responding; cancellation during that latency (or before the
/// call) yields [`TransportError::Cancelled`], matching the real adapter.
///
/// # Example
///
/// ```rust
/// use s3_transit::transport::mock::{MockResponse, MockTransport};
///
/// let transport = MockTransport::new(|_request| {
///     Ok(MockResponse::ok().header("etag", "\"abc\"").build())
/// });
/// assert_eq!(transport.call_count(), 0);
/// ```
#[derive(Clone)]
pub struct MockTransport {
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    latency: Option<Duration>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            requests: Arc::new(Mutex::new(Vec::new())),
            latency: None,
        }
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of recorded requests using `method`
    pub fn calls_with_method(&self, method: &Method) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.method == *method)
            .count()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("calls", &self.call_count())
            .field("latency", &self.latency)
            .finish()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(
        &self,
        request: HttpRequest,
        completion: CompletionMode,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let (content_headers, body) = match request.content {
            Some(content) => {
                let headers = content.headers.clone();
                let body = content
                    .collect()
                    .await
                    .map_err(|e| TransportError::failed(e.to_string()))?;
                (headers, body)
            }
            None => (HeaderMap::new(), Bytes::new()),
        };

        let recorded = RecordedRequest {
            method: request.method,
            url: request.url,
            headers: request.headers,
            content_headers,
            body,
            completion,
        };
        lock(&self.requests).push(recorded.clone());

        if let Some(latency) = self.latency {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                _ = tokio::time::sleep(latency) => {}
            }
        }

        (self.responder)(&recorded)
    }
}

#[derive(Default)]
struct PlatformState {
    responses: VecDeque<PlatformResponse>,
    requests: Vec<PlatformRequest>,
    threads: Vec<Option<String>>,
    active: usize,
    peak_active: usize,
}

/// Scripted platform primitive
///
/// Responses are served from a queue in order; once the queue is empty every request
/// fails with a `ConnectionError`. The mock tracks how many requests were in flight at
/// once and which thread each one ran on.
#[derive(Clone, Default)]
pub struct MockPlatform {
    state: Arc<Mutex<PlatformState>>,
    delay: Option<Duration>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every request for `delay` before completing it
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue the completion record for the next request
    pub fn push_response(&self, response: PlatformResponse) {
        lock(&self.state).responses.push_back(response);
    }

    pub fn requests(&self) -> Vec<PlatformRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.state).requests.len()
    }

    /// Highest number of requests that were in flight at the same time
    pub fn peak_active(&self) -> usize {
        lock(&self.state).peak_active
    }

    /// Names of the threads each request was executed on
    pub fn dispatch_threads(&self) -> Vec<Option<String>> {
        lock(&self.state).threads.clone()
    }
}

impl std::fmt::Debug for MockPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPlatform")
            .field("calls", &self.call_count())
            .field("delay", &self.delay)
            .finish()
    }
}

/// Decrements the in-flight counter even when the request future is dropped
struct ActiveGuard<'a>(&'a Mutex<PlatformState>);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        lock(self.0).active -= 1;
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn send(&self, request: PlatformRequest) -> PlatformResponse {
        {
            let mut state = lock(&self.state);
            state.requests.push(request);
            state
                .threads
                .push(std::thread::current().name().map(str::to_string));
            state.active += 1;
            state.peak_active = state.peak_active.max(state.active);
        }
        let _guard = ActiveGuard(&self.state);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = lock(&self.state).responses.pop_front();
        response.unwrap_or_else(|| {
            PlatformResponse::failure(PlatformResult::ConnectionError, 0, "no scripted response")
        })
    }
}
