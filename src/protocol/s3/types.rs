//! Type definitions for S3 operations

use super::error::{S3Error, S3Result};
use crate::transport::HttpResponse;
use base64::Engine;
use chrono::{DateTime, Utc};
use http::header::{
    HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, LAST_MODIFIED,
};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Longest object key S3 accepts, in bytes
pub const MAX_OBJECT_NAME_LEN: usize = 1024;

/// Prefix of user-defined metadata headers
const USER_METADATA_PREFIX: &str = "x-amz-meta-";

/// Bucket, key and optional version of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
}

impl ObjectIdentity {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            version_id: None,
        }
    }

    /// Address a specific version of the object
    pub fn with_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }
}

/// Conditional request fields sent with the probe and the data call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadConditions {
    /// `If-Match`
    pub match_etag: Option<String>,

    /// `If-None-Match`
    pub not_match_etag: Option<String>,

    /// `If-Modified-Since`
    pub modified_since: Option<DateTime<Utc>>,

    /// `If-Unmodified-Since`
    pub unmodified_since: Option<DateTime<Utc>>,
}

impl ReadConditions {
    /// Write the conditional headers into `headers`
    pub fn apply(&self, headers: &mut HeaderMap) -> S3Result<()> {
        if let Some(etag) = &self.match_etag {
            insert(headers, http::header::IF_MATCH, etag)?;
        }
        if let Some(etag) = &self.not_match_etag {
            insert(headers, http::header::IF_NONE_MATCH, etag)?;
        }
        if let Some(since) = &self.modified_since {
            insert(headers, http::header::IF_MODIFIED_SINCE, &http_date(since))?;
        }
        if let Some(since) = &self.unmodified_since {
            insert(headers, http::header::IF_UNMODIFIED_SINCE, &http_date(since))?;
        }
        Ok(())
    }
}

/// Render a timestamp as an RFC 7231 HTTP date
pub fn http_date(time: &DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// A byte range of an object
///
/// A `length` of 0 means "from `offset` to the end of the object".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Value of the `Range` header
    pub fn header_value(&self) -> String {
        if self.length == 0 {
            format!("bytes={}-", self.offset)
        } else {
            format!(
                "bytes={}-{}",
                self.offset,
                self.offset.saturating_add(self.length - 1)
            )
        }
    }
}

/// Server-side encryption settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerSideEncryption {
    /// SSE-C: the caller supplies the 256-bit key with every request
    CustomerKey([u8; 32]),

    /// SSE-S3: S3-managed keys (upload only)
    S3,

    /// SSE-KMS (upload only)
    Kms {
        key_id: String,
        context: Option<String>,
    },
}

impl ServerSideEncryption {
    /// Write the headers needed to read an object encrypted with these settings
    ///
    /// Only customer keys have to be presented on reads; S3- and KMS-managed
    /// encryption is transparent to HEAD and GET.
    pub fn apply_read_headers(&self, headers: &mut HeaderMap) -> S3Result<()> {
        let ServerSideEncryption::CustomerKey(key) = self else {
            return Ok(());
        };

        let engine = base64::engine::general_purpose::STANDARD;
        let key_md5 = md5::compute(key);

        insert(
            headers,
            HeaderName::from_static("x-amz-server-side-encryption-customer-algorithm"),
            "AES256",
        )?;
        insert(
            headers,
            HeaderName::from_static("x-amz-server-side-encryption-customer-key"),
            &engine.encode(key),
        )?;
        insert(
            headers,
            HeaderName::from_static("x-amz-server-side-encryption-customer-key-md5"),
            &engine.encode(key_md5.0),
        )?;
        Ok(())
    }
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) -> S3Result<()> {
    let value = HeaderValue::from_str(value).map_err(|_| {
        S3Error::InvalidArgument(format!("Invalid value for header {}: {:?}", name, value))
    })?;
    headers.insert(name, value);
    Ok(())
}

/// Metadata of an object, as returned by the metadata probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectStat {
    pub identity: ObjectIdentity,

    /// Object size in bytes (of the whole object, not of a requested range)
    pub size: u64,

    /// Entity tag without surrounding quotes
    pub etag: String,

    /// Version ID (if versioning is enabled)
    pub version_id: Option<String>,

    pub last_modified: Option<DateTime<Utc>>,

    pub content_type: Option<String>,

    /// User-defined metadata with the `x-amz-meta-` prefix stripped
    pub metadata: HashMap<String, String>,

    /// Conditions the probe was issued with
    pub conditions: ReadConditions,

    /// Range the probe was issued with
    pub range: Option<ByteRange>,
}

impl ObjectStat {
    /// Build the stat from a probe response
    ///
    /// Length and content type are read from the content headers, falling back to the
    /// message headers; entity tag, version and modification time from the message
    /// headers. A ranged HEAD answers with the range length in `Content-Length`, so the
    /// total from `Content-Range` takes precedence when present.
    pub fn from_response(
        identity: ObjectIdentity,
        response: &HttpResponse,
        conditions: ReadConditions,
        range: Option<ByteRange>,
    ) -> Self {
        let empty = HeaderMap::new();
        let content_headers = response.content_headers().unwrap_or(&empty);
        let headers = &response.headers;

        let lookup = |name: &HeaderName| {
            content_headers
                .get(name)
                .or_else(|| headers.get(name))
                .and_then(|v| v.to_str().ok())
        };

        let size = match lookup(&CONTENT_RANGE).and_then(content_range_total) {
            Some(total) => total,
            None => match lookup(&CONTENT_LENGTH).map(str::parse::<u64>) {
                Some(Ok(size)) => size,
                Some(Err(_)) => {
                    tracing::warn!(key = %identity.key, "Unparseable Content-Length on probe response");
                    0
                }
                None => 0,
            },
        };

        let etag = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string())
            .unwrap_or_default();

        let version_id = headers
            .get("x-amz-version-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| identity.version_id.clone());

        let last_modified = headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let content_type = lookup(&CONTENT_TYPE).map(str::to_string);

        let metadata = headers
            .iter()
            .filter_map(|(name, value)| {
                let key = name.as_str().strip_prefix(USER_METADATA_PREFIX)?;
                Some((key.to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();

        Self {
            identity,
            size,
            etag,
            version_id,
            last_modified,
            content_type,
            metadata,
            conditions,
            range,
        }
    }

    /// Number of bytes the data call is expected to deliver
    pub fn expected_len(&self) -> u64 {
        match self.range {
            Some(range) => {
                let available = self.size.saturating_sub(range.offset);
                if range.length == 0 {
                    available
                } else {
                    range.length.min(available)
                }
            }
            None => self.size,
        }
    }
}

/// Complete length from `Content-Range: bytes <first>-<last>/<total>`
///
/// `None` when the total is unknown (`*`) or the value is malformed.
fn content_range_total(value: &str) -> Option<u64> {
    let (unit, rest) = value.trim().split_once(' ')?;
    if !unit.eq_ignore_ascii_case("bytes") {
        return None;
    }
    let (_, total) = rest.split_once('/')?;
    total.trim().parse().ok()
}

/// Per-object failure reported by a multi-object delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteError {
    pub key: String,
    pub version_id: Option<String>,
    pub code: String,
    pub message: String,
}

/// Objects to delete: plain keys or key/version pairs, never both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteBatch {
    Keys(Vec<String>),
    Versions(Vec<(String, String)>),
}

impl DeleteBatch {
    pub fn len(&self) -> usize {
        match self {
            DeleteBatch::Keys(keys) => keys.len(),
            DeleteBatch::Versions(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries `start..end` as (key, version) pairs
    pub(crate) fn page(&self, start: usize, end: usize) -> Vec<(&str, Option<&str>)> {
        match self {
            DeleteBatch::Keys(keys) => keys[start..end]
                .iter()
                .map(|key| (key.as_str(), None))
                .collect(),
            DeleteBatch::Versions(pairs) => pairs[start..end]
                .iter()
                .map(|(key, version)| (key.as_str(), Some(version.as_str())))
                .collect(),
        }
    }
}

/// Validate an object key
pub fn validate_object_name(key: &str) -> S3Result<()> {
    if key.trim().is_empty() {
        return Err(S3Error::InvalidObjectName(
            "Object name cannot be empty".to_string(),
        ));
    }
    if key.len() > MAX_OBJECT_NAME_LEN {
        return Err(S3Error::InvalidObjectName(format!(
            "Object name cannot be longer than {} bytes",
            MAX_OBJECT_NAME_LEN
        )));
    }
    Ok(())
}
