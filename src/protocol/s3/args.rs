//! Argument objects for object operations
//!
//! Arguments are plain builders; validation happens when a pipeline consumes them, before
//! any request is sent.

use super::error::{S3Error, S3Result};
use super::headers::filter_extra_headers;
use super::types::{
    validate_object_name, ByteRange, DeleteBatch, ObjectIdentity, ReadConditions,
    ServerSideEncryption,
};
use crate::transport::HttpRequest;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use http::header::{HeaderValue, RANGE};
use http::Method;
use std::fmt;
use std::future::Future;
use std::io::{self, Read};
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Live object body handed to an async callback
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Blocking consumer of an object body, run on the blocking thread pool
pub type SyncCallback = Box<dyn FnOnce(&mut dyn Read) -> io::Result<()> + Send>;

/// Async consumer of an object body
pub type AsyncCallback =
    Box<dyn FnOnce(ObjectReader, CancellationToken) -> BoxFuture<'static, io::Result<()>> + Send>;

/// Where the bytes of a fetched object go
pub enum ObjectDestination {
    /// Materialize into a local file (temp file, then atomic rename)
    File(PathBuf),

    /// Hand the live stream to a blocking callback
    Callback(SyncCallback),

    /// Hand the live stream to an async callback
    AsyncCallback(AsyncCallback),
}

impl fmt::Debug for ObjectDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectDestination::File(path) => f.debug_tuple("File").field(path).finish(),
            ObjectDestination::Callback(_) => f.write_str("Callback(..)"),
            ObjectDestination::AsyncCallback(_) => f.write_str("AsyncCallback(..)"),
        }
    }
}

/// Arguments for the metadata probe
#[derive(Debug, Clone)]
pub struct StatObjectArgs {
    pub identity: ObjectIdentity,
    pub conditions: ReadConditions,
    pub range: Option<ByteRange>,
    pub sse: Option<ServerSideEncryption>,
    pub extra_headers: Vec<(String, String)>,
}

impl StatObjectArgs {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            identity: ObjectIdentity::new(bucket, key),
            conditions: ReadConditions::default(),
            range: None,
            sse: None,
            extra_headers: Vec::new(),
        }
    }

    pub fn version_id(mut self, version_id: impl Into<String>) -> Self {
        self.identity.version_id = Some(version_id.into());
        self
    }

    pub fn match_etag(mut self, etag: impl Into<String>) -> Self {
        self.conditions.match_etag = Some(etag.into());
        self
    }

    pub fn not_match_etag(mut self, etag: impl Into<String>) -> Self {
        self.conditions.not_match_etag = Some(etag.into());
        self
    }

    pub fn modified_since(mut self, since: DateTime<Utc>) -> Self {
        self.conditions.modified_since = Some(since);
        self
    }

    pub fn unmodified_since(mut self, since: DateTime<Utc>) -> Self {
        self.conditions.unmodified_since = Some(since);
        self
    }

    /// Restrict the request to `length` bytes from `offset` (0 = to the end)
    pub fn range(mut self, offset: u64, length: u64) -> Self {
        self.range = Some(ByteRange::new(offset, length));
        self
    }

    pub fn server_side_encryption(mut self, sse: ServerSideEncryption) -> Self {
        self.sse = Some(sse);
        self
    }

    /// Add a caller-supplied header; unsupported names are dropped when the request is built
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Check bucket and key before anything is sent
    pub fn validate(&self) -> S3Result<()> {
        if self.identity.bucket.is_empty() {
            return Err(S3Error::InvalidArgument(
                "Bucket name cannot be empty".to_string(),
            ));
        }
        validate_object_name(&self.identity.key)?;
        check_path_segments(&self.identity.key)
    }

    /// Build the HEAD (probe) or GET (data) request for this object
    pub fn build_request(&self, method: Method, endpoint: &Url) -> S3Result<HttpRequest> {
        self.validate()?;

        let mut url = object_url(endpoint, &self.identity.bucket, &self.identity.key)?;
        if let Some(version_id) = &self.identity.version_id {
            url.query_pairs_mut().append_pair("versionId", version_id);
        }

        let mut request = HttpRequest::new(method, url);
        request.headers = filter_extra_headers(
            self.extra_headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );

        self.conditions.apply(&mut request.headers)?;
        if let Some(range) = &self.range {
            let value = HeaderValue::from_str(&range.header_value())
                .map_err(|e| S3Error::InvalidArgument(format!("Invalid range: {}", e)))?;
            request.headers.insert(RANGE, value);
        }
        if let Some(sse) = &self.sse {
            sse.apply_read_headers(&mut request.headers)?;
        }

        Ok(request)
    }
}

/// Arguments for the object fetch pipeline
///
/// Exactly one of [`file`](Self::file), [`callback`](Self::callback) and
/// [`async_callback`](Self::async_callback) must be chosen.
pub struct GetObjectArgs {
    stat: StatObjectArgs,
    file: Option<PathBuf>,
    callback: Option<SyncCallback>,
    async_callback: Option<AsyncCallback>,
}

impl GetObjectArgs {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::from_stat(StatObjectArgs::new(bucket, key))
    }

    /// Reuse probe arguments built elsewhere
    pub fn from_stat(stat: StatObjectArgs) -> Self {
        Self {
            stat,
            file: None,
            callback: None,
            async_callback: None,
        }
    }

    pub fn version_id(mut self, version_id: impl Into<String>) -> Self {
        self.stat = self.stat.version_id(version_id);
        self
    }

    pub fn conditions(mut self, conditions: ReadConditions) -> Self {
        self.stat.conditions = conditions;
        self
    }

    pub fn range(mut self, offset: u64, length: u64) -> Self {
        self.stat = self.stat.range(offset, length);
        self
    }

    pub fn server_side_encryption(mut self, sse: ServerSideEncryption) -> Self {
        self.stat = self.stat.server_side_encryption(sse);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.stat = self.stat.header(name, value);
        self
    }

    /// Write the object to `path`
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Stream the object into a blocking callback
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&mut dyn Read) -> io::Result<()> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Stream the object into an async callback
    pub fn async_callback<F, Fut>(mut self, callback: F) -> Self
    where
        F: FnOnce(ObjectReader, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = io::Result<()>> + Send + 'static,
    {
        self.async_callback = Some(Box::new(move |reader, cancel| {
            Box::pin(callback(reader, cancel))
        }));
        self
    }

    pub fn stat_args(&self) -> &StatObjectArgs {
        &self.stat
    }

    /// Split into probe arguments and the single chosen destination
    pub fn into_parts(self) -> S3Result<(StatObjectArgs, ObjectDestination)> {
        let chosen = [
            self.file.is_some(),
            self.callback.is_some(),
            self.async_callback.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if chosen > 1 {
            return Err(S3Error::InvalidArgument(
                "Only one of file, callback or async_callback may be set".to_string(),
            ));
        }

        let destination = match (self.file, self.callback, self.async_callback) {
            (Some(path), _, _) => {
                if path.as_os_str().is_empty() {
                    return Err(S3Error::InvalidArgument(
                        "Destination file name cannot be empty".to_string(),
                    ));
                }
                ObjectDestination::File(path)
            }
            (_, Some(callback), _) => ObjectDestination::Callback(callback),
            (_, _, Some(callback)) => ObjectDestination::AsyncCallback(callback),
            (None, None, None) => {
                return Err(S3Error::InvalidArgument(
                    "One of file, callback or async_callback must be set".to_string(),
                ))
            }
        };

        Ok((self.stat, destination))
    }
}

impl fmt::Debug for GetObjectArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetObjectArgs")
            .field("stat", &self.stat)
            .field("file", &self.file)
            .field("callback", &self.callback.is_some())
            .field("async_callback", &self.async_callback.is_some())
            .finish()
    }
}

/// Arguments for the bulk delete pipeline
#[derive(Debug, Clone, Default)]
pub struct RemoveObjectsArgs {
    pub bucket: String,
    objects: Option<Vec<String>>,
    versions: Option<Vec<(String, String)>>,
}

impl RemoveObjectsArgs {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: None,
            versions: None,
        }
    }

    /// Delete the latest version of each key
    pub fn objects<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.objects = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Delete specific (key, version) pairs
    pub fn object_versions<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.versions = Some(
            pairs
                .into_iter()
                .map(|(key, version)| (key.into(), version.into()))
                .collect(),
        );
        self
    }

    /// Resolve the bucket and the selected list
    pub fn into_batch(self) -> S3Result<(String, DeleteBatch)> {
        if self.bucket.is_empty() {
            return Err(S3Error::InvalidArgument(
                "Bucket name cannot be empty".to_string(),
            ));
        }

        let batch = match (self.objects, self.versions) {
            (Some(keys), None) => DeleteBatch::Keys(keys),
            (None, Some(pairs)) => DeleteBatch::Versions(pairs),
            (Some(_), Some(_)) => {
                return Err(S3Error::InvalidArgument(
                    "Objects and object versions cannot both be set".to_string(),
                ))
            }
            (None, None) => {
                return Err(S3Error::InvalidArgument(
                    "Either objects or object versions must be set".to_string(),
                ))
            }
        };

        Ok((self.bucket, batch))
    }
}

/// Reject keys with `.` or `..` segments
///
/// URL parsing resolves dot segments (including `%2E` forms), so such a key would
/// address a different object, or the bucket itself.
fn check_path_segments(key: &str) -> S3Result<()> {
    if key.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(S3Error::InvalidObjectName(format!(
            "Object name cannot contain '.' or '..' path segments: {:?}",
            key
        )));
    }
    Ok(())
}

/// Path-style URL of an object: `<endpoint>/<bucket>/<key>`
pub(crate) fn object_url(endpoint: &Url, bucket: &str, key: &str) -> S3Result<Url> {
    check_path_segments(key)?;
    let mut url = bucket_url(endpoint, bucket)?;
    url.path_segments_mut()
        .map_err(|_| S3Error::InvalidConfig(format!("Endpoint cannot be a base: {}", endpoint)))?
        .extend(key.split('/'));
    Ok(url)
}

/// Path-style URL of a bucket: `<endpoint>/<bucket>`
pub(crate) fn bucket_url(endpoint: &Url, bucket: &str) -> S3Result<Url> {
    let mut url = endpoint.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| S3Error::InvalidConfig(format!("Endpoint cannot be a base: {}", endpoint)))?
        .pop_if_empty()
        .push(bucket);
    Ok(url)
}
