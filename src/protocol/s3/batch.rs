//! Bulk delete pipeline
//!
//! S3 accepts at most 1000 entries per multi-object delete call. `remove_objects` takes an
//! unbounded list, splits it into pages of
//! [`max_delete_objects`](super::ClientConfig::max_delete_objects) entries, submits the
//! pages one after another and returns the per-object failures of all pages in submission
//! order (then in the order the service reported them within a page).
//!
//! # Cancellation
//!
//! If the token fires while a page is in flight or between pages, the operation fails with
//! [`S3Error::DeleteCancelled`], which carries the failures already reported by the pages
//! that completed. Any other error aborts the operation and discards those results.

use super::args::{bucket_url, RemoveObjectsArgs};
use super::client::S3Client;
use super::error::{S3Error, S3Result};
use super::types::{validate_object_name, DeleteBatch, DeleteError};
use super::xml::{delete_request_body, parse_delete_result};
use crate::transport::{CompletionMode, Content, HttpRequest, HttpTransport};
use base64::Engine;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use tokio_util::sync::CancellationToken;

impl<T: HttpTransport> S3Client<T> {
    /// Delete many objects, returning the entries the service failed to delete
    ///
    /// Flat keys are validated up front: one invalid key fails the whole operation before
    /// any page is sent. An empty list sends nothing.
    #[tracing::instrument(skip(self, args, cancel), fields(bucket = %args.bucket))]
    pub async fn remove_objects(
        &self,
        args: RemoveObjectsArgs,
        cancel: &CancellationToken,
    ) -> S3Result<Vec<DeleteError>> {
        let (bucket, batch) = args.into_batch()?;

        if let DeleteBatch::Keys(keys) = &batch {
            for key in keys {
                validate_object_name(key)?;
            }
        }

        let total = batch.len();
        if total == 0 {
            tracing::debug!("Nothing to delete");
            return Ok(Vec::new());
        }

        let page_size = self.config().max_delete_objects;
        let page_count = total.div_ceil(page_size);
        let mut errors = Vec::new();
        let mut pages_completed = 0;

        for start in (0..total).step_by(page_size) {
            if cancel.is_cancelled() {
                return Err(cancelled(pages_completed, errors));
            }

            let end = (start + page_size).min(total);
            tracing::debug!(
                page = pages_completed + 1,
                pages = page_count,
                entries = end - start,
                "Submitting delete page"
            );

            match self.delete_page(&bucket, &batch, start, end, cancel).await {
                Ok(page_errors) => {
                    if !page_errors.is_empty() {
                        tracing::debug!(failed = page_errors.len(), "Delete page reported failures");
                    }
                    errors.extend(page_errors);
                    pages_completed += 1;
                }
                Err(S3Error::Cancelled) => return Err(cancelled(pages_completed, errors)),
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(total, failed = errors.len(), pages = pages_completed, "Bulk delete finished");
        Ok(errors)
    }

    /// Submit entries `start..end` as one multi-object delete call
    async fn delete_page(
        &self,
        bucket: &str,
        batch: &DeleteBatch,
        start: usize,
        end: usize,
        cancel: &CancellationToken,
    ) -> S3Result<Vec<DeleteError>> {
        let body = delete_request_body(&batch.page(start, end), true)?;

        let mut url = bucket_url(self.endpoint(), bucket)?;
        url.set_query(Some("delete"));

        let content_md5 = base64::engine::general_purpose::STANDARD.encode(md5::compute(&body).0);
        let mut content_headers = HeaderMap::new();
        content_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
        content_headers.insert(
            HeaderName::from_static("content-md5"),
            HeaderValue::from_str(&content_md5)
                .map_err(|e| S3Error::InvalidArgument(format!("Invalid Content-MD5: {}", e)))?,
        );

        let request = HttpRequest::new(Method::POST, url)
            .with_content(Content::with_headers(content_headers, body));
        let response = self
            .execute(request, CompletionMode::ContentRead, cancel)
            .await?;

        let body = response.bytes().await?;
        Ok(parse_delete_result(&body)?)
    }
}

fn cancelled(pages_completed: usize, errors: Vec<DeleteError>) -> S3Error {
    tracing::debug!(pages_completed, failed = errors.len(), "Bulk delete cancelled");
    S3Error::DeleteCancelled {
        pages_completed,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::s3::ClientConfig;
    use crate::transport::mock::{MockResponse, MockTransport};

    fn client(transport: MockTransport, page_size: usize) -> S3Client<MockTransport> {
        let mut config = ClientConfig::new("http://localhost:9000");
        config.max_delete_objects = page_size;
        S3Client::new(transport, config).unwrap()
    }

    fn empty_result() -> MockTransport {
        MockTransport::new(|_| Ok(MockResponse::ok().body("<DeleteResult/>").build()))
    }

    #[tokio::test]
    async fn test_page_request_shape() {
        let transport = empty_result();
        let client = client(transport.clone(), 1000);
        let cancel = CancellationToken::new();

        let errors = client
            .remove_objects(RemoveObjectsArgs::new("logs").object_versions([("a", "v1")]), &cancel)
            .await
            .unwrap();
        assert!(errors.is_empty());

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url.as_str(), "http://localhost:9000/logs?delete");
        assert_eq!(request.header("content-type"), Some("application/xml"));

        let expected_md5 =
            base64::engine::general_purpose::STANDARD.encode(md5::compute(&request.body).0);
        assert_eq!(request.header("content-md5"), Some(expected_md5.as_str()));
        assert!(request
            .body_text()
            .contains("<Object><Key>a</Key><VersionId>v1</VersionId></Object>"));
    }

    #[tokio::test]
    async fn test_small_page_size_splits_batch() {
        let transport = empty_result();
        let client = client(transport.clone(), 2);
        let cancel = CancellationToken::new();

        client
            .remove_objects(RemoveObjectsArgs::new("b").objects(["k1", "k2", "k3", "k4", "k5"]), &cancel)
            .await
            .unwrap();

        let bodies: Vec<usize> = transport
            .requests()
            .iter()
            .map(|r| r.body_text().matches("<Object>").count())
            .collect();
        assert_eq!(bodies, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let transport = empty_result();
        let client = client(transport.clone(), 1000);
        let cancel = CancellationToken::new();

        let errors = client
            .remove_objects(RemoveObjectsArgs::new("b").objects(Vec::<String>::new()), &cancel)
            .await
            .unwrap();
        assert!(errors.is_empty());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_service_error_discards_partial_results() {
        let transport = MockTransport::new(|request| {
            if request.body_text().contains("<Key>k1</Key>") {
                Ok(MockResponse::ok()
                    .body("<DeleteResult><Error><Key>k1</Key><Code>AccessDenied</Code><Message>denied</Message></Error></DeleteResult>")
                    .build())
            } else {
                Ok(MockResponse::new(http::StatusCode::SERVICE_UNAVAILABLE)
                    .body("<Error><Code>SlowDown</Code><Message>Reduce your request rate</Message></Error>")
                    .build())
            }
        });
        let client = client(transport.clone(), 1);
        let cancel = CancellationToken::new();

        let err = client
            .remove_objects(RemoveObjectsArgs::new("b").objects(["k1", "k2", "k3"]), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, S3Error::Service { ref code, .. } if code == "SlowDown"));
        assert!(err.is_retryable());
        assert_eq!(transport.call_count(), 2);
    }
}
