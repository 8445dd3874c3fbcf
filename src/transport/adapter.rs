//! Adapter from the uniform HTTP model onto the platform primitive

use super::context::TransportContext;
use super::error::TransportError;
use super::platform::{PlatformClient, PlatformMethod, PlatformRequest, PlatformResponse, PlatformResult};
use super::{CompletionMode, Content, HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, ETAG};
use http::{HeaderMap, StatusCode};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Prefix (case-insensitive) that marks a response header as a content header
const CONTENT_HEADER_PREFIX: &str = "content-";

/// [`HttpTransport`] that executes requests through a [`PlatformClient`]
///
/// Every call is handed to the owning [`TransportContext`] before it reaches the
/// platform, and the caller is resumed with the reconstructed response.
pub struct PlatformTransport<P: PlatformClient> {
    platform: Arc<P>,
    context: TransportContext,
}

impl<P: PlatformClient> PlatformTransport<P> {
    pub fn new(platform: P, context: TransportContext) -> Self {
        Self {
            platform: Arc::new(platform),
            context,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn context(&self) -> &TransportContext {
        &self.context
    }
}

#[async_trait]
impl<P: PlatformClient> HttpTransport for PlatformTransport<P> {
    async fn send(
        &self,
        request: HttpRequest,
        completion: CompletionMode,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError> {
        let platform_request = build_platform_request(request, completion).await?;
        let method = platform_request.method;
        let url = platform_request.url.clone();

        tracing::debug!(%method, %url, context = self.context.name(), "Dispatching platform request");

        let platform = Arc::clone(&self.platform);
        let outcome = self
            .context
            .run(cancel, async move { platform.send(platform_request).await })
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                if e.is_cancelled() {
                    tracing::debug!(%method, %url, "Platform request cancelled");
                }
                return Err(e);
            }
        };

        into_http_response(response)
    }
}

/// Translate a uniform request into the platform's request record
///
/// Fails fast on methods the platform cannot express, before the body is touched.
pub async fn build_platform_request(
    request: HttpRequest,
    completion: CompletionMode,
) -> Result<PlatformRequest, TransportError> {
    let method = PlatformMethod::from_http(&request.method)
        .ok_or_else(|| TransportError::UnsupportedMethod(request.method.to_string()))?;

    let mut platform_request = PlatformRequest::new(method, request.url.as_str());
    platform_request.headers_only = completion == CompletionMode::HeadersRead;
    copy_headers(&request.headers, &mut platform_request);

    if let Some(content) = request.content {
        copy_headers(&content.headers, &mut platform_request);
        let bytes = content.collect().await.map_err(|e| {
            TransportError::failed(format!("Failed to read request body: {}", e))
        })?;
        platform_request.upload = Some(bytes);
    }

    Ok(platform_request)
}

/// Copy headers one name at a time, joining repeated values with commas in insertion order
fn copy_headers(headers: &HeaderMap, target: &mut PlatformRequest) {
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        target.set_request_header(name.as_str(), &joined);
    }
}

/// Rebuild a uniform response from a platform completion record
pub fn into_http_response(response: PlatformResponse) -> Result<HttpResponse, TransportError> {
    let status = if response.response_code == 0 {
        None
    } else {
        StatusCode::from_u16(response.response_code).ok()
    };

    match response.result {
        PlatformResult::Success => {}
        PlatformResult::ConnectionError
        | PlatformResult::ProtocolError
        | PlatformResult::DataProcessingError => {
            let reason = response
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| response.result.as_str().to_string());
            tracing::debug!(result = response.result.as_str(), code = response.response_code, %reason, "Platform request failed");
            return Err(TransportError::Failed { status, reason });
        }
    }

    let status = status.ok_or_else(|| {
        TransportError::failed(format!(
            "Platform reported invalid status code {}",
            response.response_code
        ))
    })?;

    let mut headers = HeaderMap::new();
    let mut content_headers = HeaderMap::new();

    for (name, value) in response.headers {
        let header_name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(header = %name, "Skipping response header with invalid name");
                continue;
            }
        };

        let value = if header_name == ETAG {
            strip_weak_prefix(&value).to_string()
        } else {
            value
        };

        let header_value = match HeaderValue::from_str(&value) {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(header = %name, "Skipping response header with invalid value");
                continue;
            }
        };

        if is_content_header(header_name.as_str()) {
            content_headers.append(header_name, header_value);
        } else {
            headers.append(header_name, header_value);
        }
    }

    let body = response.data.unwrap_or_else(Bytes::new);

    Ok(HttpResponse {
        status,
        headers,
        content: Some(Content::with_headers(content_headers, body)),
    })
}

/// Whether a response header belongs to the content rather than the message
pub fn is_content_header(name: &str) -> bool {
    name.get(..CONTENT_HEADER_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(CONTENT_HEADER_PREFIX))
}

fn strip_weak_prefix(etag: &str) -> &str {
    etag.strip_prefix("W/").unwrap_or(etag)
}
