//! S3 client implementation

use super::args::StatObjectArgs;
use super::config::ClientConfig;
use super::error::{S3Error, S3Result};
use super::types::ObjectStat;
use super::xml::parse_error_body;
use crate::transport::{CompletionMode, HttpRequest, HttpResponse, HttpTransport};
use http::header::{HeaderValue, USER_AGENT};
use http::{HeaderMap, Method, StatusCode};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Signs outgoing requests
///
/// Credentials and signature schemes live outside this crate; implementations receive
/// the fully built request right before it is handed to the transport.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, request: &mut HttpRequest) -> S3Result<()>;
}

/// Signer for anonymous access and pre-signed endpoints
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsignedRequests;

impl RequestSigner for UnsignedRequests {
    fn sign(&self, _request: &mut HttpRequest) -> S3Result<()> {
        Ok(())
    }
}

/// Turns a non-success response into an error
///
/// Handlers run in registration order; the first one returning `Some` decides the error.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Option<S3Error>;
}

/// S3 client for interacting with S3-compatible storage
pub struct S3Client<T: HttpTransport> {
    transport: Arc<T>,

    /// Client configuration
    config: ClientConfig,

    /// Parsed `config.endpoint`
    endpoint: Url,

    signer: Arc<dyn RequestSigner>,
    error_handlers: Vec<Arc<dyn ErrorHandler>>,
}

impl<T: HttpTransport> Clone for S3Client<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            endpoint: self.endpoint.clone(),
            signer: Arc::clone(&self.signer),
            error_handlers: self.error_handlers.clone(),
        }
    }
}

impl<T: HttpTransport> S3Client<T> {
    /// Create a new S3 client with the given transport and configuration
    ///
    /// # Example
    ///
    /// ```rust
    /// use s3_transit::transport::mock::{MockResponse, MockTransport};
    /// use s3_transit::{ClientConfig, S3Client};
    ///
    /// let transport = MockTransport::new(|_| Ok(MockResponse::ok().build()));
    /// let client = S3Client::new(transport, ClientConfig::new("http://localhost:9000")).unwrap();
    /// assert_eq!(client.endpoint().as_str(), "http://localhost:9000/");
    /// ```
    pub fn new(transport: T, config: ClientConfig) -> S3Result<Self> {
        Self::with_shared_transport(Arc::new(transport), config)
    }

    /// Create a client on a transport shared with other clients
    pub fn with_shared_transport(transport: Arc<T>, config: ClientConfig) -> S3Result<Self> {
        // Validate configuration
        config.validate()?;
        let endpoint = config.endpoint_url()?;

        Ok(Self {
            transport,
            config,
            endpoint,
            signer: Arc::new(UnsignedRequests),
            error_handlers: Vec::new(),
        })
    }

    /// Replace the request signer
    pub fn with_signer(mut self, signer: impl RequestSigner + 'static) -> Self {
        self.signer = Arc::new(signer);
        self
    }

    /// Append an error handler to the chain
    pub fn with_error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handlers.push(Arc::new(handler));
        self
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sign and send a request, mapping non-success responses to errors
    pub async fn execute(
        &self,
        mut request: HttpRequest,
        completion: CompletionMode,
        cancel: &CancellationToken,
    ) -> S3Result<HttpResponse> {
        if let Some(user_agent) = &self.config.user_agent {
            if !request.headers.contains_key(USER_AGENT) {
                if let Ok(value) = HeaderValue::from_str(user_agent) {
                    request.headers.insert(USER_AGENT, value);
                }
            }
        }
        self.signer.sign(&mut request)?;

        let method = request.method.clone();
        let url = request.url.clone();
        let response = self.transport.send(request, completion, cancel).await?;

        if response.status.is_success() {
            tracing::trace!(%method, %url, status = response.status.as_u16(), "Request succeeded");
            return Ok(response);
        }

        let status = response.status;
        let headers = response.headers.clone();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(%method, %url, error = %e, "Failed to read error body");
                Default::default()
            }
        };

        tracing::debug!(%method, %url, status = status.as_u16(), "Request failed");

        for handler in &self.error_handlers {
            if let Some(err) = handler.handle(status, &headers, &body) {
                return Err(err);
            }
        }

        Err(service_error(status, &body))
    }

    /// Get metadata for an object (the metadata probe)
    ///
    /// Sends a HEAD request with the conditions, range, encryption and extra headers of
    /// `args`. Fails if the object does not exist or a precondition does not hold.
    #[tracing::instrument(
        skip(self, args, cancel),
        fields(bucket = %args.identity.bucket, key = %args.identity.key)
    )]
    pub async fn stat_object(
        &self,
        args: &StatObjectArgs,
        cancel: &CancellationToken,
    ) -> S3Result<ObjectStat> {
        let request = args.build_request(Method::HEAD, &self.endpoint)?;
        let response = self
            .execute(request, CompletionMode::HeadersRead, cancel)
            .await?;

        let stat = ObjectStat::from_response(
            args.identity.clone(),
            &response,
            args.conditions.clone(),
            args.range,
        );
        tracing::debug!(size = stat.size, etag = %stat.etag, "Object stat");
        Ok(stat)
    }
}

/// Default mapping of a failed response
fn service_error(status: StatusCode, body: &[u8]) -> S3Error {
    match parse_error_body(body) {
        Some((code, message)) => S3Error::Service {
            status,
            code,
            message,
        },
        None => S3Error::Service {
            status,
            code: status
                .canonical_reason()
                .map(|reason| reason.replace(' ', ""))
                .unwrap_or_else(|| "Unknown".to_string()),
            message: format!("HTTP {} with no S3 error body", status.as_u16()),
        },
    }
}
