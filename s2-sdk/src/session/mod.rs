//! Streaming append and read sessions.
//!
//! Each session runs as a single task that owns the transport handle and all
//! mutable state. Callers interact with it only through channels, semaphores
//! and one-shot futures.
//!
//! ```text
//! caller ──submit──> [input channel] ──> session task ──> transport
//!   ^                                       |
//!   └──── ack future / callback <───────────┘ <── responses
//! ```

mod append;
mod managed_append;
mod managed_read;
mod read;

pub use append::{AppendErrorHandler, AppendResponseHandler, AppendSession};
pub use managed_append::{AppendAck, ManagedAppendSession};
pub use managed_read::ManagedReadSession;
pub use read::{ReadErrorHandler, ReadResponseHandler, ReadSession, HEARTBEAT_THRESHOLD};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::StreamService;
use crate::types::{AppendInput, AppendOutput};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Shared completion signal of a session task.
pub type Completion = Shared<BoxFuture<'static, Result<(), ClientError>>>;

/// Everything a session needs to reach one stream.
#[derive(Clone)]
pub struct SessionContext {
    pub(crate) service: Arc<dyn StreamService>,
    pub(crate) stream: String,
    pub(crate) config: ClientConfig,
    pub(crate) runtime: Handle,
}

impl SessionContext {
    /// Context spawning onto the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(
        service: Arc<dyn StreamService>,
        stream: impl Into<String>,
        config: ClientConfig,
    ) -> Self {
        Self {
            service,
            stream: stream.into(),
            config,
            runtime: Handle::current(),
        }
    }

    /// Spawn session tasks onto `runtime` instead.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = runtime;
        self
    }

    #[must_use]
    pub fn stream(&self) -> &str {
        &self.stream
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

/// Turn a task handle into a cloneable completion future.
pub(crate) fn completion_of(task: JoinHandle<Result<(), ClientError>>) -> Completion {
    async move {
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Ok(()),
            Err(err) => Err(ClientError::protocol(format!("session task failed: {err}"))),
        }
    }
    .boxed()
    .shared()
}

/// Check that an ack covers exactly the records of the input it answers.
pub(crate) fn validate_ack(output: &AppendOutput, input: &AppendInput) -> Result<(), ClientError> {
    let expected = input.records().len() as u64;
    if output.end.seq_num < output.start.seq_num || output.record_count() != expected {
        return Err(ClientError::protocol(format!(
            "ack spans [{}, {}) but the input had {expected} records",
            output.start.seq_num, output.end.seq_num
        )));
    }
    Ok(())
}

/// Open a streaming call, giving up with [`ClientError::LocalTimeout`] if the
/// service has not answered within `timeout`.
pub(crate) async fn open_within<T>(
    timeout: Duration,
    open: impl Future<Output = Result<T, tonic::Status>>,
) -> Result<T, ClientError> {
    tokio::time::timeout(timeout, open)
        .await
        .map_err(|_| ClientError::LocalTimeout(timeout))?
        .map_err(ClientError::from)
}

/// Resolve at `deadline`, or never when there is none.
pub(crate) async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AppendRecord, StreamPosition};

    fn output(start: u64, end: u64) -> AppendOutput {
        AppendOutput {
            start: StreamPosition::new(start, 0),
            end: StreamPosition::new(end, 0),
            next: StreamPosition::new(end, 0),
        }
    }

    #[test]
    fn test_validate_ack_span() {
        let input = AppendInput::new(vec![
            AppendRecord::new("a").unwrap(),
            AppendRecord::new("b").unwrap(),
        ])
        .unwrap();

        assert!(validate_ack(&output(4, 6), &input).is_ok());
        assert!(matches!(
            validate_ack(&output(4, 5), &input),
            Err(ClientError::Protocol(_))
        ));
        assert!(matches!(
            validate_ack(&output(6, 4), &input),
            Err(ClientError::Protocol(_))
        ));
    }
}
