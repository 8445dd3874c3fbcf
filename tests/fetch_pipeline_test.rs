use futures::stream::{self, StreamExt};
use http::{Method, StatusCode};
use s3_transit::logging::init_test_logging;
use s3_transit::protocol::s3::{temp_file_path, ClientConfig, GetObjectArgs, S3Client, S3Error};
use s3_transit::transport::mock::{MockPlatform, MockResponse, MockTransport};
use s3_transit::transport::{ByteStream, PlatformResponse, PlatformTransport, TransportContext};
use std::fs;
use std::io::Read;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const OBJECT: &[u8] = b"0123456789abcdefghij";
const ETAG: &str = "9e107d9d372bb6826bd81d3542a419d6";

/// Serves a HEAD and a GET for a single object; the GET body comes from `body`
fn object_transport<F>(body: F) -> MockTransport
where
    F: Fn() -> ByteStream + Send + Sync + 'static,
{
    MockTransport::new(move |request| {
        let response = MockResponse::ok()
            .header("etag", &format!("\"{ETAG}\""))
            .header("x-amz-version-id", "v3")
            .content_header("content-length", &OBJECT.len().to_string())
            .content_header("content-type", "application/octet-stream");
        if request.method == Method::HEAD {
            Ok(response.build())
        } else {
            Ok(response.stream(body()).build())
        }
    })
}

fn chunked_object() -> ByteStream {
    stream::iter(
        OBJECT
            .chunks(7)
            .map(|chunk| Ok(bytes::Bytes::copy_from_slice(chunk))),
    )
    .boxed()
}

fn client(transport: MockTransport, deadline_secs: u64) -> S3Client<MockTransport> {
    let mut config = ClientConfig::new("http://localhost:9000");
    config.transfer_deadline_secs = deadline_secs;
    S3Client::new(transport, config).unwrap()
}

#[tokio::test]
async fn test_file_materialization() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("nested").join("object.bin");

    let transport = object_transport(chunked_object);
    let client = client(transport.clone(), 15);
    let cancel = CancellationToken::new();

    let stat = client
        .get_object(GetObjectArgs::new("bucket", "object.bin").file(&dest), &cancel)
        .await
        .unwrap();

    assert_eq!(stat.size, OBJECT.len() as u64);
    assert_eq!(stat.etag, ETAG);
    assert_eq!(fs::read(&dest).unwrap(), OBJECT);

    let temp = temp_file_path(&dest, ETAG, None, "transit");
    assert!(!temp.exists(), "temporary file should be renamed away");

    assert_eq!(transport.calls_with_method(&Method::HEAD), 1);
    assert_eq!(transport.calls_with_method(&Method::GET), 1);
}

#[tokio::test]
async fn test_file_materialization_replaces_existing_file() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("object.bin");
    fs::write(&dest, b"stale contents that are longer than the object itself").unwrap();

    let client = client(object_transport(chunked_object), 15);
    let cancel = CancellationToken::new();

    client
        .get_object(GetObjectArgs::new("bucket", "object.bin").file(&dest), &cancel)
        .await
        .unwrap();

    assert_eq!(fs::read(&dest).unwrap(), OBJECT);
}

#[tokio::test]
async fn test_file_deadline_leaves_temp_file() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("slow.bin");

    // Headers arrive, the body never does
    let client = client(object_transport(|| stream::pending().boxed()), 1);
    let cancel = CancellationToken::new();

    let err = client
        .get_object(GetObjectArgs::new("bucket", "slow.bin").file(&dest), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    match err {
        S3Error::TransferTimeout {
            path,
            deadline_secs,
        } => {
            assert_eq!(path, dest);
            assert_eq!(deadline_secs, 1);
        }
        other => panic!("expected TransferTimeout, got {other:?}"),
    }
    assert!(!dest.exists(), "final path must not appear after a timeout");
    assert!(temp_file_path(&dest, ETAG, None, "transit").exists());
}

#[tokio::test]
async fn test_temp_name_uses_requested_version() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("versioned.bin");

    // The service reports v3 as current; the caller asked for v1
    let client = client(object_transport(|| stream::pending().boxed()), 1);
    let cancel = CancellationToken::new();

    let err = client
        .get_object(
            GetObjectArgs::new("bucket", "versioned.bin")
                .version_id("v1")
                .file(&dest),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, S3Error::TransferTimeout { .. }));
    assert!(temp_file_path(&dest, ETAG, Some("v1"), "transit").exists());
    assert!(!temp_file_path(&dest, ETAG, Some("v3"), "transit").exists());
}

#[tokio::test]
async fn test_ranged_download_reports_whole_object_size() {
    let transport = MockTransport::new(|request| {
        let response = MockResponse::new(StatusCode::PARTIAL_CONTENT)
            .header("etag", &format!("\"{ETAG}\""))
            .content_header("content-length", "10")
            .content_header("content-range", "bytes 5-14/20");
        if request.method == Method::HEAD {
            Ok(response.build())
        } else {
            Ok(response.body(&OBJECT[5..15]).build())
        }
    });
    let client = client(transport, 15);
    let cancel = CancellationToken::new();
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("ranged.bin");

    let stat = client
        .get_object(GetObjectArgs::new("bucket", "object.bin").range(5, 10).file(&dest), &cancel)
        .await
        .unwrap();

    assert_eq!(stat.size, OBJECT.len() as u64);
    assert_eq!(stat.expected_len(), 10);
    assert_eq!(fs::read(&dest).unwrap(), &OBJECT[5..15]);
}

#[tokio::test]
async fn test_dot_segment_key_rejected_before_any_call() {
    let transport = object_transport(chunked_object);
    let client = client(transport.clone(), 15);
    let cancel = CancellationToken::new();
    let dir = TempDir::new().unwrap();

    for key in ["a/../secret.txt", ".", ".."] {
        let err = client
            .get_object(
                GetObjectArgs::new("bucket", key).file(dir.path().join("out.bin")),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, S3Error::InvalidObjectName(_)), "{key:?}");
    }
    assert_eq!(transport.call_count(), 0);
    assert!(!dir.path().join("out.bin").exists());
}

#[tokio::test]
async fn test_two_destinations_rejected_before_any_call() {
    let transport = object_transport(chunked_object);
    let client = client(transport.clone(), 15);
    let cancel = CancellationToken::new();

    let args = GetObjectArgs::new("bucket", "object.bin")
        .file("/tmp/unused.bin")
        .callback(|_| Ok(()));
    let err = client.get_object(args, &cancel).await.unwrap_err();

    assert!(matches!(err, S3Error::InvalidArgument(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_missing_destination_rejected() {
    let transport = object_transport(chunked_object);
    let client = client(transport.clone(), 15);
    let cancel = CancellationToken::new();

    let err = client
        .get_object(GetObjectArgs::new("bucket", "object.bin"), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, S3Error::InvalidArgument(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_key_rejected_before_probe() {
    let transport = object_transport(chunked_object);
    let client = client(transport.clone(), 15);
    let cancel = CancellationToken::new();

    let err = client
        .get_object(GetObjectArgs::new("bucket", "").callback(|_| Ok(())), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, S3Error::InvalidObjectName(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_missing_object_fails_at_probe() {
    let transport = MockTransport::new(|_| {
        Ok(MockResponse::new(StatusCode::NOT_FOUND).build())
    });
    let client = client(transport.clone(), 15);
    let cancel = CancellationToken::new();
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("missing.bin");

    let err = client
        .get_object(GetObjectArgs::new("bucket", "missing.bin").file(&dest), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, S3Error::Service { status: StatusCode::NOT_FOUND, .. }));
    assert_eq!(transport.calls_with_method(&Method::GET), 0);
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_blocking_callback_streams_chunks() {
    let client = client(object_transport(chunked_object), 15);
    let cancel = CancellationToken::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);

    let args = GetObjectArgs::new("bucket", "object.bin").callback(move |reader| {
        let mut buf = [0u8; 4];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                return Ok(());
            }
            sink.lock().unwrap().extend_from_slice(&buf[..n]);
        }
    });
    client.get_object(args, &cancel).await.unwrap();

    assert_eq!(received.lock().unwrap().as_slice(), OBJECT);
}

#[tokio::test]
async fn test_callback_error_propagates() {
    let client = client(object_transport(chunked_object), 15);
    let cancel = CancellationToken::new();

    let args = GetObjectArgs::new("bucket", "object.bin").callback(|_| {
        Err(std::io::Error::other("disk full"))
    });
    let err = client.get_object(args, &cancel).await.unwrap_err();

    assert!(matches!(err, S3Error::Io(ref msg) if msg.contains("disk full")));
}

#[tokio::test]
async fn test_cancel_during_async_callback() {
    let client = client(object_transport(|| stream::pending().boxed()), 15);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let args = GetObjectArgs::new("bucket", "object.bin").async_callback(move |mut reader, _| async move {
        use tokio::io::AsyncReadExt;
        trigger.cancel();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.map(|_| ())
    });
    let err = client.get_object(args, &cancel).await.unwrap_err();

    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_range_and_version_reach_both_calls() {
    let transport = object_transport(chunked_object);
    let client = client(transport.clone(), 15);
    let cancel = CancellationToken::new();

    let args = GetObjectArgs::new("bucket", "object.bin")
        .version_id("v3")
        .range(5, 10)
        .callback(|_| Ok(()));
    client.get_object(args, &cancel).await.unwrap();

    for request in transport.requests() {
        assert_eq!(request.header("range"), Some("bytes=5-14"));
        assert_eq!(request.url.query(), Some("versionId=v3"));
    }
}

#[tokio::test]
async fn test_fetch_through_platform_transport() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("via-platform.bin");

    let platform = MockPlatform::new();
    platform.push_response(
        PlatformResponse::success(200)
            .with_header("ETag", &format!("W/\"{ETAG}\""))
            .with_header("Content-Length", &OBJECT.len().to_string()),
    );
    platform.push_response(
        PlatformResponse::success(200)
            .with_header("Content-Length", &OBJECT.len().to_string())
            .with_data(OBJECT),
    );

    let context = TransportContext::dedicated("s3-io-fetch").unwrap();
    let transport = PlatformTransport::new(platform.clone(), context);
    let client = S3Client::new(transport, ClientConfig::new("http://localhost:9000")).unwrap();
    let cancel = CancellationToken::new();

    let stat = client
        .get_object(GetObjectArgs::new("bucket", "object.bin").file(&dest), &cancel)
        .await
        .unwrap();

    assert_eq!(stat.etag, ETAG);
    assert_eq!(fs::read(&dest).unwrap(), OBJECT);
    assert!(!temp_file_path(&dest, ETAG, None, "transit").exists());

    let requests = platform.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].headers_only);
    assert!(requests.iter().all(|r| r.url == "http://localhost:9000/bucket/object.bin"));
}
