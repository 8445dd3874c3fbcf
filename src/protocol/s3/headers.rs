//! Header classification for request builders
//!
//! Callers may attach arbitrary extra headers to object requests. Only the ones S3
//! recognizes on object requests are forwarded; everything else is dropped.

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;

/// Standard headers S3 accepts from callers on object requests
pub const SUPPORTED_HEADERS: &[&str] = &[
    "cache-control",
    "content-encoding",
    "content-type",
    "x-amz-acl",
    "content-disposition",
    "x-minio-extract",
];

/// Server-side encryption headers
pub const SSE_HEADERS: &[&str] = &[
    "X-Amz-Server-Side-Encryption-Customer-Algorithm",
    "X-Amz-Server-Side-Encryption-Customer-Key",
    "X-Amz-Server-Side-Encryption-Customer-Key-Md5",
    "X-Amz-Server-Side-Encryption",
    "X-Amz-Server-Side-Encryption-Aws-Kms-Key-Id",
    "X-Amz-Server-Side-Encryption-Context",
];

const AMZ_PREFIX: &str = "x-amz-";

/// Whether `name` is one of [`SUPPORTED_HEADERS`] (case-insensitive)
pub fn is_supported_header(name: &str) -> bool {
    SUPPORTED_HEADERS
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(name))
}

/// Whether `name` is one of [`SSE_HEADERS`] (case-insensitive)
pub fn is_sse_header(name: &str) -> bool {
    SSE_HEADERS.iter().any(|sse| sse.eq_ignore_ascii_case(name))
}

fn is_amz_header(name: &str) -> bool {
    name.get(..AMZ_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(AMZ_PREFIX))
}

/// Keep the caller-supplied headers that may be forwarded to S3
///
/// Supported, SSE and other `x-amz-*` headers are kept in order. Anything else, and any
/// pair that is not a valid HTTP header, is dropped.
pub fn filter_extra_headers<'a, I>(pairs: I) -> HeaderMap
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut headers = HeaderMap::new();

    for (name, value) in pairs {
        if !(is_supported_header(name) || is_sse_header(name) || is_amz_header(name)) {
            tracing::debug!(header = %name, "Dropping unsupported extra header");
            continue;
        }

        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(header = %name, "Dropping malformed extra header"),
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_headers_case_insensitive() {
        assert!(is_supported_header("Content-Type"));
        assert!(is_supported_header("CACHE-CONTROL"));
        assert!(is_supported_header("x-minio-extract"));
        assert!(!is_supported_header("content-length"));
        assert!(!is_supported_header("x-amz-server-side-encryption"));
    }

    #[test]
    fn test_sse_headers_case_insensitive() {
        assert!(is_sse_header("x-amz-server-side-encryption"));
        assert!(is_sse_header("X-AMZ-SERVER-SIDE-ENCRYPTION-CUSTOMER-KEY-MD5"));
        assert!(is_sse_header("x-amz-server-side-encryption-aws-kms-key-id"));
        assert!(!is_sse_header("x-amz-acl"));
        assert!(!is_sse_header("content-type"));
    }

    #[test]
    fn test_filter_extra_headers() {
        let headers = filter_extra_headers([
            ("Content-Type", "text/plain"),
            ("X-Amz-Server-Side-Encryption", "AES256"),
            ("x-amz-request-payer", "requester"),
            ("Authorization", "secret"),
            ("Host", "example.com"),
            ("x-amz-meta-bad", "line\nbreak"),
        ]);

        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("content-type").unwrap(), "text/plain");
        assert_eq!(headers.get("x-amz-server-side-encryption").unwrap(), "AES256");
        assert_eq!(headers.get("x-amz-request-payer").unwrap(), "requester");
        assert!(headers.get("authorization").is_none());
    }
}
