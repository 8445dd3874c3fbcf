//! Error types for S3 operations

use super::types::DeleteError;
use super::xml::XmlError;
use crate::transport::TransportError;
use http::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for S3 operations
pub type S3Result<T> = Result<T, S3Error>;

/// Errors that can occur during S3 operations
#[derive(Error, Debug, Clone)]
pub enum S3Error {
    /// The underlying network call failed (connection, protocol or data processing)
    #[error("Transport error{}: {reason}", status_suffix(.status))]
    Transport {
        status: Option<StatusCode>,
        reason: String,
    },

    /// The transport cannot express the requested HTTP method
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// File materialization did not finish within its deadline
    #[error("Transfer to {} did not complete within {deadline_secs}s", .path.display())]
    TransferTimeout { path: PathBuf, deadline_secs: u64 },

    /// Mutually exclusive or missing arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Object key failed name validation
    #[error("Invalid object name: {0}")]
    InvalidObjectName(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// S3 service error with specific error code
    #[error("S3 service error ({code}, HTTP {}): {message}", .status.as_u16())]
    Service {
        status: StatusCode,
        code: String,
        message: String,
    },

    /// Malformed XML in a request or response body
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// Bulk delete was cancelled after some pages had completed
    ///
    /// `errors` holds the per-object failures reported by the completed pages.
    #[error("Bulk delete cancelled after {pages_completed} page(s)")]
    DeleteCancelled {
        pages_completed: usize,
        errors: Vec<DeleteError>,
    },
}

impl S3Error {
    /// Check if error is retryable
    ///
    /// This is a hint for callers; nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            S3Error::Transport { status: None, .. } => true,
            S3Error::Transport {
                status: Some(status),
                ..
            } => status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS,
            S3Error::TransferTimeout { .. } => true,
            S3Error::Io(_) => true,
            S3Error::Service { status, code, .. } => {
                is_retryable_code(code) || status.is_server_error()
            }
            _ => false,
        }
    }

    /// Whether this error is a cancellation outcome
    pub fn is_cancelled(&self) -> bool {
        matches!(self, S3Error::Cancelled | S3Error::DeleteCancelled { .. })
    }
}

fn status_suffix(status: &Option<StatusCode>) -> String {
    match status {
        Some(code) => format!(" ({})", code.as_u16()),
        None => String::new(),
    }
}

impl From<TransportError> for S3Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Failed { status, reason } => S3Error::Transport { status, reason },
            TransportError::UnsupportedMethod(method) => S3Error::UnsupportedMethod(method),
            TransportError::Cancelled => S3Error::Cancelled,
            closed @ TransportError::ContextClosed => S3Error::Transport {
                status: None,
                reason: closed.to_string(),
            },
        }
    }
}

// Convert io::Error to S3Error
impl From<io::Error> for S3Error {
    fn from(err: io::Error) -> Self {
        S3Error::Io(err.to_string())
    }
}

impl From<XmlError> for S3Error {
    fn from(err: XmlError) -> Self {
        S3Error::Xml(err.to_string())
    }
}

/// Check if an S3 error code is retryable
pub(crate) fn is_retryable_code(code: &str) -> bool {
    matches!(
        code,
        "RequestTimeout"
            | "ServiceUnavailable"
            | "InternalError"
            | "SlowDown"
            | "RequestTimeTooSkewed"
    )
}
