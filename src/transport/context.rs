//! Owning execution context for platform calls
//!
//! The platform primitive must be driven from the context that owns it and can only
//! have one request in flight. [`TransportContext`] makes that an explicit handoff:
//! callers submit a job, the owning executor runs jobs one at a time in submission
//! order, and the result comes back to the caller's task over a oneshot channel.

use super::error::TransportError;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handle to an executor that owns the platform networking primitive
///
/// Cloning the handle shares the same executor. The executor stops once every handle
/// has been dropped.
#[derive(Clone)]
pub struct TransportContext {
    jobs: mpsc::UnboundedSender<Job>,
    name: Arc<str>,
}

impl TransportContext {
    /// Start an owning OS thread with its own current-thread runtime
    pub fn dedicated(name: impl Into<String>) -> io::Result<Self> {
        let name: String = name.into();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || runtime.block_on(drive(rx)))?;

        tracing::debug!(context = %name, "Started dedicated transport context");

        Ok(Self {
            jobs: tx,
            name: name.into(),
        })
    }

    /// Run the owning loop as a task on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn current() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drive(rx));
        Self {
            jobs: tx,
            name: "current".into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `job` on the owning executor and resume the caller with its output
    ///
    /// If the job has completed, its output is returned even when `cancel` fires at
    /// the same time. If `cancel` fires first, the caller gets
    /// [`TransportError::Cancelled`] and the job stops at its next suspension point
    /// (or never starts, if it was still queued).
    pub async fn run<F, T>(&self, cancel: &CancellationToken, job: F) -> Result<T, TransportError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let (done_tx, done_rx) = oneshot::channel();
        let token = cancel.clone();
        let wrapped: Job = Box::pin(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                value = job => Some(value),
            };
            // The caller may already have given up on a cancelled job
            let _ = done_tx.send(outcome);
        });

        self.jobs
            .send(wrapped)
            .map_err(|_| TransportError::ContextClosed)?;

        tokio::select! {
            biased;
            outcome = done_rx => match outcome {
                Ok(Some(value)) => Ok(value),
                Ok(None) => Err(TransportError::Cancelled),
                Err(_) => Err(TransportError::ContextClosed),
            },
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
        }
    }
}

impl fmt::Debug for TransportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportContext")
            .field("name", &self.name)
            .field("closed", &self.jobs.is_closed())
            .finish()
    }
}

async fn drive(mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = jobs.recv().await {
        job.await;
    }
    tracing::trace!("Transport context drained");
}
