//! Error types for the transport layer

use http::StatusCode;
use thiserror::Error;

/// Errors surfaced by an [`HttpTransport`](super::HttpTransport)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The underlying call reported a connection, protocol or data-processing failure
    #[error("Transport failure{}: {reason}", status_suffix(.status))]
    Failed {
        status: Option<StatusCode>,
        reason: String,
    },

    /// The platform primitive cannot express this method
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// The caller's cancellation token fired before the call completed
    #[error("Request cancelled")]
    Cancelled,

    /// The owning transport context has shut down
    #[error("Transport context is no longer running")]
    ContextClosed,
}

impl TransportError {
    /// Create a failure without a status code
    pub fn failed<S: Into<String>>(reason: S) -> Self {
        TransportError::Failed {
            status: None,
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

fn status_suffix(status: &Option<StatusCode>) -> String {
    match status {
        Some(code) => format!(" ({})", code.as_u16()),
        None => String::new(),
    }
}
