//! Object fetch pipeline
//!
//! `get_object` probes the object with a HEAD request, then issues exactly one GET and
//! delivers the body to the chosen destination:
//!
//! - **File**: the body is written to a temporary file next to the destination and
//!   renamed over it only once every byte is on disk. The data call and the copy share
//!   one deadline ([`ClientConfig::transfer_deadline`](super::ClientConfig::transfer_deadline)).
//! - **Callback**: a blocking reader over the live body, driven on the blocking pool.
//! - **Async callback**: an [`ObjectReader`] over the live body.
//!
//! The temporary file is named after the destination, the entity tag and the version the
//! caller asked for (`<file>.<etag>[.<version>].part.<suffix>`). Retried downloads of the
//! same object version therefore reuse the same name. Two concurrent downloads of the same version
//! to the same destination write to the same temporary file and the last writer wins;
//! no locking is done.

use super::args::{
    AsyncCallback, GetObjectArgs, ObjectDestination, ObjectReader, StatObjectArgs, SyncCallback,
};
use super::client::S3Client;
use super::error::{S3Error, S3Result};
use super::types::ObjectStat;
use crate::transport::{ByteStream, CompletionMode, HttpResponse, HttpTransport};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use http::Method;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tokio_util::sync::CancellationToken;

impl<T: HttpTransport> S3Client<T> {
    /// Fetch an object into the destination chosen in `args`
    ///
    /// Returns the metadata obtained by the probe, whichever destination was used.
    /// Argument errors are reported before any request is sent.
    #[tracing::instrument(
        skip(self, args, cancel),
        fields(
            bucket = %args.stat_args().identity.bucket,
            key = %args.stat_args().identity.key
        )
    )]
    pub async fn get_object(
        &self,
        args: GetObjectArgs,
        cancel: &CancellationToken,
    ) -> S3Result<ObjectStat> {
        let (stat_args, destination) = args.into_parts()?;
        stat_args.validate()?;

        let stat = self.stat_object(&stat_args, cancel).await?;

        match destination {
            ObjectDestination::File(path) => {
                self.fetch_to_file(&stat_args, &stat, &path, cancel).await?;
            }
            ObjectDestination::Callback(callback) => {
                let response = self.open_object(&stat_args, cancel).await?;
                deliver_blocking(response, callback, cancel).await?;
            }
            ObjectDestination::AsyncCallback(callback) => {
                let response = self.open_object(&stat_args, cancel).await?;
                deliver_async(response, callback, cancel).await?;
            }
        }

        Ok(stat)
    }

    /// The data call
    async fn open_object(
        &self,
        args: &StatObjectArgs,
        cancel: &CancellationToken,
    ) -> S3Result<HttpResponse> {
        let request = args.build_request(Method::GET, self.endpoint())?;
        self.execute(request, CompletionMode::HeadersRead, cancel)
            .await
    }

    async fn fetch_to_file(
        &self,
        args: &StatObjectArgs,
        stat: &ObjectStat,
        path: &Path,
        cancel: &CancellationToken,
    ) -> S3Result<()> {
        let temp_path = temp_file_path(
            path,
            &stat.etag,
            args.identity.version_id.as_deref(),
            &self.config().part_suffix,
        );

        if let Some(parent) = temp_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        remove_if_exists(path).await?;
        remove_if_exists(&temp_path).await?;

        let deadline = self.config().transfer_deadline();
        let written = match tokio::time::timeout(
            deadline,
            self.download_to(args, &temp_path, cancel),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    path = %path.display(),
                    temp = %temp_path.display(),
                    "Transfer did not complete within {}s",
                    deadline.as_secs()
                );
                return Err(S3Error::TransferTimeout {
                    path: path.to_path_buf(),
                    deadline_secs: deadline.as_secs(),
                });
            }
        };

        let expected = stat.expected_len();
        if written != expected {
            tracing::warn!(written, expected, path = %path.display(), "Downloaded size differs from object size");
        }

        fs::rename(&temp_path, path).await?;
        tracing::debug!(bytes = written, path = %path.display(), "Object materialized");
        Ok(())
    }

    /// Issue the data call and copy the body into `temp_path`
    async fn download_to(
        &self,
        args: &StatObjectArgs,
        temp_path: &Path,
        cancel: &CancellationToken,
    ) -> S3Result<u64> {
        let mut response = self.open_object(args, cancel).await?;
        let mut body = response.take_body();
        drop(response);

        let mut file = fs::File::create(temp_path).await?;
        let mut written = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(S3Error::Cancelled),
                next = body.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    file.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

/// Temporary file used while materializing `final_path`
///
/// `<final_path>.<etag>.part.<suffix>`, or `<final_path>.<etag>.<version_id>.part.<suffix>`
/// for versioned reads.
pub fn temp_file_path(
    final_path: &Path,
    etag: &str,
    version_id: Option<&str>,
    suffix: &str,
) -> PathBuf {
    let mut name = OsString::from(final_path.as_os_str());
    name.push(".");
    name.push(etag);
    if let Some(version_id) = version_id {
        name.push(".");
        name.push(version_id);
    }
    name.push(".part.");
    name.push(suffix);
    PathBuf::from(name)
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Body stream that fails with `Interrupted` once `cancel` fires
fn abort_on_cancel(body: ByteStream, cancel: &CancellationToken) -> ByteStream {
    let token = cancel.clone();
    let interrupted = stream::once(async move { token.is_cancelled() }).filter_map(|cancelled| async move {
        cancelled.then(|| {
            Err::<Bytes, _>(io::Error::new(io::ErrorKind::Interrupted, "transfer cancelled"))
        })
    });

    body.take_until(cancel.clone().cancelled_owned())
        .chain(interrupted)
        .boxed()
}

fn reader_for(mut response: HttpResponse, cancel: &CancellationToken) -> StreamReader<ByteStream, Bytes> {
    StreamReader::new(abort_on_cancel(response.take_body(), cancel))
}

async fn deliver_blocking(
    response: HttpResponse,
    callback: SyncCallback,
    cancel: &CancellationToken,
) -> S3Result<()> {
    let mut bridge = SyncIoBridge::new(reader_for(response, cancel));
    let task = tokio::task::spawn_blocking(move || callback(&mut bridge));

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(S3Error::Cancelled),
        joined = task => match joined {
            Ok(result) => result.map_err(S3Error::from),
            Err(e) => Err(S3Error::Io(format!("Object callback failed: {}", e))),
        },
    }
}

async fn deliver_async(
    response: HttpResponse,
    callback: AsyncCallback,
    cancel: &CancellationToken,
) -> S3Result<()> {
    let reader: ObjectReader = Box::pin(reader_for(response, cancel));
    let delivery = callback(reader, cancel.clone());

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(S3Error::Cancelled),
        result = delivery => result.map_err(S3Error::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::s3::ClientConfig;
    use crate::transport::mock::{MockResponse, MockTransport};
    use std::io::Read;
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncReadExt;

    const BODY: &[u8] = b"hello object";

    fn object_transport() -> MockTransport {
        MockTransport::new(|request| {
            let response = MockResponse::ok()
                .header("etag", "\"e7f1\"")
                .content_header("content-length", &BODY.len().to_string());
            if request.method == Method::HEAD {
                Ok(response.build())
            } else {
                Ok(response.body(BODY).build())
            }
        })
    }

    fn client(transport: MockTransport) -> S3Client<MockTransport> {
        S3Client::new(transport, ClientConfig::new("http://localhost:9000")).unwrap()
    }

    #[test]
    fn test_temp_file_path() {
        let path = Path::new("/data/report.csv");
        assert_eq!(
            temp_file_path(path, "abc123", None, "transit"),
            PathBuf::from("/data/report.csv.abc123.part.transit")
        );
        assert_eq!(
            temp_file_path(path, "abc123", Some("v2"), "transit"),
            PathBuf::from("/data/report.csv.abc123.v2.part.transit")
        );
    }

    #[tokio::test]
    async fn test_blocking_callback_receives_body() {
        let transport = object_transport();
        let client = client(transport.clone());
        let cancel = CancellationToken::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();

        let args = GetObjectArgs::new("bucket", "key").callback(move |reader| {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            *sink.lock().unwrap() = buf;
            Ok(())
        });
        let stat = client.get_object(args, &cancel).await.unwrap();

        assert_eq!(stat.etag, "e7f1");
        assert_eq!(received.lock().unwrap().as_slice(), BODY);
        assert_eq!(transport.calls_with_method(&Method::HEAD), 1);
        assert_eq!(transport.calls_with_method(&Method::GET), 1);
    }

    #[tokio::test]
    async fn test_async_callback_receives_body() {
        let transport = object_transport();
        let client = client(transport);
        let cancel = CancellationToken::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();

        let args = GetObjectArgs::new("bucket", "key").async_callback(move |mut reader, _cancel| async move {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).await?;
            *sink.lock().unwrap() = buf;
            Ok(())
        });
        client.get_object(args, &cancel).await.unwrap();

        assert_eq!(received.lock().unwrap().as_slice(), BODY);
    }

    #[tokio::test]
    async fn test_probe_failure_skips_data_call() {
        let transport = MockTransport::new(|_| {
            Ok(MockResponse::new(http::StatusCode::PRECONDITION_FAILED).build())
        });
        let client = client(transport.clone());
        let cancel = CancellationToken::new();

        let args = GetObjectArgs::new("bucket", "key")
            .conditions(crate::protocol::s3::ReadConditions {
                match_etag: Some("stale".to_string()),
                ..Default::default()
            })
            .callback(|_| Ok(()));
        let err = client.get_object(args, &cancel).await.unwrap_err();

        assert!(matches!(err, S3Error::Service { .. }));
        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.requests()[0].header("if-match"), Some("stale"));
    }

    #[tokio::test]
    async fn test_cancelled_body_interrupts_reader() {
        let cancel = CancellationToken::new();
        let body: ByteStream = stream::pending().boxed();
        let mut reader = StreamReader::new(abort_on_cancel(body, &cancel));

        cancel.cancel();
        let mut buf = Vec::new();
        let err = reader.read_to_end(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }
}
