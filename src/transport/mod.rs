//! Generic HTTP exchange model and the transports that carry it
//!
//! The S3 pipelines speak in terms of [`HttpRequest`] / [`HttpResponse`] and an
//! [`HttpTransport`]. The only production transport is [`PlatformTransport`], which adapts
//! that uniform model onto a constrained platform networking primitive
//! ([`PlatformClient`]): a restricted method set, one active request at a time, fully
//! buffered responses, and failures reported as result codes instead of errors.
//!
//! # Layout
//!
//! - [`platform`] - the constrained primitive and its request/response records
//! - [`context`] - the owning execution context platform calls must run on
//! - [`adapter`] - request translation, header reclassification, error mapping
//! - [`mock`] - scripted transports for tests

pub mod adapter;
pub mod context;
pub mod error;
pub mod mock;
pub mod platform;

#[cfg(feature = "reqwest-platform")]
mod reqwest_platform;

pub use adapter::PlatformTransport;
pub use context::TransportContext;
pub use error::TransportError;
pub use platform::{PlatformClient, PlatformMethod, PlatformRequest, PlatformResponse, PlatformResult};

#[cfg(feature = "reqwest-platform")]
pub use reqwest_platform::ReqwestPlatform;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use http::{HeaderMap, Method, StatusCode};
use std::fmt;
use std::io;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Body of a request or response, delivered as a stream of chunks
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// How much of the response the caller wants before `send` resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Resolve once the full body has been read
    #[default]
    ContentRead,

    /// Resolve as soon as headers are available
    HeadersRead,
}

/// Message content: a body plus the headers that describe it (`Content-*`)
pub struct Content {
    /// Content headers (`Content-Type`, `Content-Length`, `Content-MD5`, ...)
    pub headers: HeaderMap,

    /// Body bytes
    pub body: ByteStream,
}

impl Content {
    /// Content backed by an in-memory buffer
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::with_headers(HeaderMap::new(), bytes)
    }

    /// In-memory content with the given content headers
    pub fn with_headers(headers: HeaderMap, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let body = if bytes.is_empty() {
            stream::empty().boxed()
        } else {
            stream::once(async move { Ok(bytes) }).boxed()
        };
        Self { headers, body }
    }

    /// Content backed by an arbitrary chunk stream
    pub fn from_stream(headers: HeaderMap, body: ByteStream) -> Self {
        Self { headers, body }
    }

    /// Drain the body into a single buffer
    pub async fn collect(self) -> io::Result<Bytes> {
        let mut body = self.body;
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Content")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// A request in the uniform HTTP model
#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub content: Option<Content>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            content: None,
        }
    }

    /// Attach content to the request
    pub fn with_content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }
}

/// A response in the uniform HTTP model
///
/// Dropping the response releases the underlying body.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,

    /// Message-level headers (everything that is not a `Content-*` header)
    pub headers: HeaderMap,

    pub content: Option<Content>,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            content: None,
        }
    }

    /// Content headers, if the response carries content
    pub fn content_headers(&self) -> Option<&HeaderMap> {
        self.content.as_ref().map(|c| &c.headers)
    }

    /// Take the body stream out of the response, leaving it without content
    pub fn take_body(&mut self) -> ByteStream {
        match self.content.take() {
            Some(content) => content.body,
            None => stream::empty().boxed(),
        }
    }

    /// Drain the body into a single buffer
    pub async fn bytes(mut self) -> io::Result<Bytes> {
        match self.content.take() {
            Some(content) => content.collect().await,
            None => Ok(Bytes::new()),
        }
    }
}

/// Uniform transport interface the S3 pipelines are written against
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and wait for its response
    ///
    /// Cancelling `cancel` aborts the in-flight call and yields
    /// [`TransportError::Cancelled`].
    async fn send(
        &self,
        request: HttpRequest,
        completion: CompletionMode,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_content_collect() {
        let chunks = vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))];
        let content = Content::from_stream(HeaderMap::new(), stream::iter(chunks).boxed());
        assert_eq!(content.collect().await.unwrap(), Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn test_response_without_content_yields_empty_body() {
        let response = HttpResponse::new(StatusCode::NO_CONTENT);
        assert!(response.content_headers().is_none());
        assert!(response.bytes().await.unwrap().is_empty());
    }
}
