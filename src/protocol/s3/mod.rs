//! S3 object operations over a pluggable HTTP transport
//!
//! This module implements the object read and bulk delete paths of an S3-compatible client.
//! Requests are built in terms of the uniform [`HttpRequest`](crate::transport::HttpRequest)
//! model and sent through any [`HttpTransport`](crate::transport::HttpTransport), which is
//! usually a [`PlatformTransport`](crate::transport::PlatformTransport).
//!
//! # Features
//!
//! - Metadata probe (`HEAD`) with ETag / date preconditions, ranges and SSE-C
//! - Object fetch into a file (temporary file plus atomic rename, bounded by a deadline)
//! - Object fetch into a blocking or async callback
//! - Bulk delete of any number of keys or key/version pairs, paged at 1000 entries
//! - Filtering of caller supplied headers
//!
//! # Examples
//!
//! ## Download to a file
//!
//! ```ignore
//! use s3_transit::protocol::s3::{ClientConfig, GetObjectArgs, S3Client};
//! use s3_transit::transport::{PlatformTransport, ReqwestPlatform, TransportContext};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = PlatformTransport::new(ReqwestPlatform::new()?, TransportContext::dedicated("s3-io")?);
//!     let client = S3Client::new(transport, ClientConfig::new("http://localhost:9000"))?;
//!
//!     let args = GetObjectArgs::new("my-bucket", "reports/2024.csv").file("local/2024.csv");
//!     let stat = client.get_object(args, &CancellationToken::new()).await?;
//!     println!("downloaded {} bytes", stat.size);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Bulk delete
//!
//! ```ignore
//! use s3_transit::protocol::s3::RemoveObjectsArgs;
//!
//! let keys: Vec<String> = (0..5000).map(|i| format!("logs/{i}.json")).collect();
//! let failures = client
//!     .remove_objects(RemoveObjectsArgs::new("my-bucket").objects(keys), &cancel)
//!     .await?;
//! for failure in failures {
//!     eprintln!("{}: {} {}", failure.key, failure.code, failure.message);
//! }
//! ```

pub mod args;
pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod headers;
pub mod types;
pub mod xml;

pub use args::{
    AsyncCallback, GetObjectArgs, ObjectDestination, ObjectReader, RemoveObjectsArgs,
    StatObjectArgs, SyncCallback,
};
pub use client::{ErrorHandler, RequestSigner, S3Client, UnsignedRequests};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{S3Error, S3Result};
pub use fetch::temp_file_path;
pub use headers::{filter_extra_headers, is_sse_header, is_supported_header};
pub use types::{
    validate_object_name, ByteRange, DeleteBatch, DeleteError, ObjectIdentity, ObjectStat,
    ReadConditions, ServerSideEncryption,
};
pub use xml::XmlError;

/// Maximum number of entries in one multi-object delete call
pub const MAX_DELETE_OBJECTS: usize = 1000;

/// Default deadline for materializing an object into a file, in seconds
pub const DEFAULT_TRANSFER_DEADLINE_SECS: u64 = 15;

/// Default suffix of temporary download files
pub const DEFAULT_PART_SUFFIX: &str = "transit";

/// Endpoint used by `ClientConfig::default()`
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9000";
