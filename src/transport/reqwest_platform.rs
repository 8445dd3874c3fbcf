//! reqwest-backed platform primitive

use super::platform::{PlatformClient, PlatformMethod, PlatformRequest, PlatformResponse, PlatformResult};
use async_trait::async_trait;
use std::time::Duration;

/// Platform primitive implemented on top of `reqwest`
///
/// Behaves like the constrained platform the adapter is written for: it only accepts
/// [`PlatformMethod`]s, always buffers the whole response body, and reports every
/// failure (including HTTP error statuses) as a [`PlatformResult`] with a diagnostic
/// string.
#[derive(Debug, Clone)]
pub struct ReqwestPlatform {
    client: reqwest::Client,
}

impl ReqwestPlatform {
    /// Create a platform with default client settings
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    /// Create a platform whose requests time out after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PlatformClient for ReqwestPlatform {
    async fn send(&self, request: PlatformRequest) -> PlatformResponse {
        let method = match request.method {
            PlatformMethod::Get => http::Method::GET,
            PlatformMethod::Head => http::Method::HEAD,
            PlatformMethod::Put => http::Method::PUT,
            PlatformMethod::Post => http::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(upload) = request.upload {
            builder = builder.body(upload);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let code = e.status().map(|s| s.as_u16()).unwrap_or(0);
                return PlatformResponse::failure(classify(&e), code, e.to_string());
            }
        };

        let status = response.status();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        if status.is_client_error() || status.is_server_error() {
            let mut failed = PlatformResponse::failure(
                PlatformResult::ProtocolError,
                status.as_u16(),
                format!("HTTP/1.1 {}", status),
            );
            failed.headers = headers;
            return failed;
        }

        match response.bytes().await {
            Ok(data) => PlatformResponse {
                result: PlatformResult::Success,
                response_code: status.as_u16(),
                error: None,
                data: Some(data),
                headers,
            },
            Err(e) => {
                let mut failed = PlatformResponse::failure(
                    PlatformResult::DataProcessingError,
                    status.as_u16(),
                    e.to_string(),
                );
                failed.headers = headers;
                failed
            }
        }
    }
}

fn classify(error: &reqwest::Error) -> PlatformResult {
    if error.is_builder() || error.is_body() || error.is_decode() {
        PlatformResult::DataProcessingError
    } else {
        PlatformResult::ConnectionError
    }
}
