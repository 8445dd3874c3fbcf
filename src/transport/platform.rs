//! The constrained platform networking primitive
//!
//! This is the shape of the networking API the library has to live with: a request
//! object that only knows four methods, headers set one name at a time, a single
//! buffered upload, and a completion record that reports failures as a result kind
//! plus a diagnostic string rather than as an error value.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

/// Methods the platform primitive can express
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformMethod {
    Get,
    Head,
    Put,
    Post,
}

impl PlatformMethod {
    /// Map a generic HTTP method onto the platform's method set
    pub fn from_http(method: &http::Method) -> Option<Self> {
        match *method {
            http::Method::GET => Some(PlatformMethod::Get),
            http::Method::HEAD => Some(PlatformMethod::Head),
            http::Method::PUT => Some(PlatformMethod::Put),
            http::Method::POST => Some(PlatformMethod::Post),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformMethod::Get => "GET",
            PlatformMethod::Head => "HEAD",
            PlatformMethod::Put => "PUT",
            PlatformMethod::Post => "POST",
        }
    }
}

impl fmt::Display for PlatformMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request as the platform primitive understands it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformRequest {
    pub method: PlatformMethod,
    pub url: String,

    /// Request headers in the order they were first set
    pub headers: Vec<(String, String)>,

    /// Upload payload, sent as-is
    pub upload: Option<Bytes>,

    /// Whether the caller only needs headers before resolving (advisory)
    pub headers_only: bool,
}

impl PlatformRequest {
    pub fn new(method: PlatformMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            upload: None,
            headers_only: false,
        }
    }

    /// Set a request header, replacing an earlier value of the same name
    pub fn set_request_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Look up a request header by name (case-insensitive)
    pub fn request_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Outcome kind reported by the platform primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformResult {
    Success,
    ConnectionError,
    ProtocolError,
    DataProcessingError,
}

impl PlatformResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformResult::Success => "Success",
            PlatformResult::ConnectionError => "ConnectionError",
            PlatformResult::ProtocolError => "ProtocolError",
            PlatformResult::DataProcessingError => "DataProcessingError",
        }
    }
}

/// Completion record of a platform request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformResponse {
    pub result: PlatformResult,

    /// HTTP status code, 0 when no response was received
    pub response_code: u16,

    /// Diagnostic string for failed requests
    pub error: Option<String>,

    /// Downloaded body, if any
    pub data: Option<Bytes>,

    /// Response headers as received
    pub headers: Vec<(String, String)>,
}

impl PlatformResponse {
    /// A successful completion
    pub fn success(response_code: u16) -> Self {
        Self {
            result: PlatformResult::Success,
            response_code,
            error: None,
            data: None,
            headers: Vec::new(),
        }
    }

    /// A failed completion with a diagnostic string
    pub fn failure(result: PlatformResult, response_code: u16, error: impl Into<String>) -> Self {
        Self {
            result,
            response_code,
            error: Some(error.into()),
            data: None,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// The platform networking primitive
///
/// Implementations never fail with a Rust error: every failure is reported through
/// [`PlatformResponse::result`] and [`PlatformResponse::error`].
#[async_trait]
pub trait PlatformClient: Send + Sync + 'static {
    async fn send(&self, request: PlatformRequest) -> PlatformResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_subset() {
        assert_eq!(PlatformMethod::from_http(&http::Method::GET), Some(PlatformMethod::Get));
        assert_eq!(PlatformMethod::from_http(&http::Method::HEAD), Some(PlatformMethod::Head));
        assert_eq!(PlatformMethod::from_http(&http::Method::PUT), Some(PlatformMethod::Put));
        assert_eq!(PlatformMethod::from_http(&http::Method::POST), Some(PlatformMethod::Post));
        assert_eq!(PlatformMethod::from_http(&http::Method::DELETE), None);
        assert_eq!(PlatformMethod::from_http(&http::Method::PATCH), None);
        assert_eq!(PlatformMethod::from_http(&http::Method::OPTIONS), None);
    }

    #[test]
    fn test_set_request_header_replaces_case_insensitively() {
        let mut request = PlatformRequest::new(PlatformMethod::Get, "http://localhost:9000/b/k");
        request.set_request_header("X-Amz-Date", "20240101T000000Z");
        request.set_request_header("Range", "bytes=0-9");
        request.set_request_header("x-amz-date", "20250101T000000Z");

        assert_eq!(request.headers.len(), 2);
        assert_eq!(request.headers[0].0, "X-Amz-Date");
        assert_eq!(request.request_header("X-AMZ-DATE"), Some("20250101T000000Z"));
    }
}
