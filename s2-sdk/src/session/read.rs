//! Resumable streaming read with retry and heartbeat liveness.

use super::{completion_of, open_within, Completion, SessionContext};
use crate::error::ClientError;
use crate::transport::ResponseStream;
use crate::types::{ReadOutput, ReadSessionRequest, Start};
use futures::future::BoxFuture;
use futures::StreamExt;
use s2_proto as proto;
use std::future::Future;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Silence after which a session that asked for heartbeats is considered dead.
pub const HEARTBEAT_THRESHOLD: Duration = Duration::from_secs(20);

/// Invoked with each output in stream order. The session does not read
/// further until the returned future completes.
pub type ReadResponseHandler = Box<dyn FnMut(ReadOutput) -> BoxFuture<'static, ()> + Send>;

/// Invoked at most once, with the error that ended the session.
pub type ReadErrorHandler = Box<dyn FnOnce(ClientError) + Send>;

/// A streaming read that resumes where it left off after transient failures.
pub struct ReadSession {
    abort: AbortHandle,
    completion: Completion,
}

impl ReadSession {
    pub fn spawn(
        ctx: SessionContext,
        request: ReadSessionRequest,
        on_response: impl FnMut(ReadOutput) -> BoxFuture<'static, ()> + Send + 'static,
        on_error: impl FnOnce(ClientError) + Send + 'static,
    ) -> Self {
        let reader = Reader {
            remaining_attempts: ctx.config.max_retries,
            cursor: request.start,
            consumed_records: 0,
            consumed_bytes: 0,
            last_heard: Instant::now(),
            ctx: ctx.clone(),
            request,
            on_response: Box::new(on_response),
        };
        let on_error: ReadErrorHandler = Box::new(on_error);

        let task = ctx.runtime.spawn(async move {
            let result = reader.run().await;
            if let Err(err) = &result {
                on_error(err.clone());
            }
            result
        });

        Self {
            abort: task.abort_handle(),
            completion: completion_of(task),
        }
    }

    /// Resolves when the session ends: the stream completed, the limit was
    /// reached, it was closed, or it failed with the returned error.
    pub fn completion(&self) -> impl Future<Output = Result<(), ClientError>> + Send + 'static {
        self.completion.clone()
    }

    /// Stop reading and wait for the session task to exit.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the session, if it failed before closing.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.abort();
        self.completion.clone().await
    }

    pub(crate) fn abort(&self) {
        self.abort.abort();
    }
}

struct Reader {
    ctx: SessionContext,
    request: ReadSessionRequest,
    on_response: ReadResponseHandler,
    cursor: Start,
    consumed_records: u64,
    consumed_bytes: u64,
    remaining_attempts: u32,
    /// Last time the service showed signs of life, across attempts.
    last_heard: Instant,
}

impl Reader {
    async fn run(mut self) -> Result<(), ClientError> {
        self.last_heard = Instant::now();
        loop {
            let request = self
                .request
                .resume(self.cursor, self.consumed_records, self.consumed_bytes);
            // An exhausted bound on the wire may read as "no bound".
            if request.limit.is_exhausted() {
                debug!(stream = %self.ctx.stream, "read limit reached");
                return Ok(());
            }

            let error = match self.attempt(request).await {
                Ok(()) => return Ok(()),
                Err(error) => error,
            };
            if !error.is_retryable() || self.remaining_attempts == 0 {
                warn!(stream = %self.ctx.stream, error = %error, "read session failed");
                return Err(error);
            }

            let attempt = self.ctx.config.max_retries - self.remaining_attempts + 1;
            self.remaining_attempts -= 1;
            let delay = self.ctx.config.retry_backoff.delay(attempt);
            warn!(
                stream = %self.ctx.stream,
                attempt,
                ?delay,
                cursor = ?self.cursor,
                error = %error,
                "read session attempt failed, resuming"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&mut self, request: ReadSessionRequest) -> Result<(), ClientError> {
        debug!(
            stream = %self.ctx.stream,
            start = ?request.start,
            limit = ?request.limit,
            "opening read session"
        );
        let mut responses = self.open(&request).await?;
        self.last_heard = Instant::now();

        loop {
            let next = if request.heartbeats {
                tokio::time::timeout_at(self.liveness_deadline(), responses.next())
                    .await
                    .map_err(|_| ClientError::HeartbeatTimeout(HEARTBEAT_THRESHOLD))?
            } else {
                responses.next().await
            };

            let response = match next {
                Some(Ok(response)) => {
                    self.last_heard = Instant::now();
                    response
                }
                Some(Err(status)) => return Err(status.into()),
                None => {
                    info!(stream = %self.ctx.stream, "read session completed by service");
                    return Ok(());
                }
            };
            let Some(output) = response.output else {
                trace!(stream = %self.ctx.stream, "heartbeat");
                continue;
            };
            let output = ReadOutput::try_from(output).map_err(ClientError::Protocol)?;

            if let ReadOutput::Batch(batch) = &output {
                if let Some(last) = batch.last_seq_num() {
                    self.cursor = Start::SeqNum(last + 1);
                }
                self.consumed_records += batch.len() as u64;
                self.consumed_bytes += batch.metered_bytes();
                trace!(
                    stream = %self.ctx.stream,
                    records = batch.len(),
                    cursor = ?self.cursor,
                    "batch received"
                );
            }
            self.remaining_attempts = self.ctx.config.max_retries;
            (self.on_response)(output).await;
            // Time spent blocked on the consumer is not silence.
            self.last_heard = Instant::now();

            if self
                .request
                .limit
                .remaining(self.consumed_records, self.consumed_bytes)
                .is_exhausted()
            {
                return Ok(());
            }
        }
    }

    /// Open the call within the request timeout. With heartbeats the open
    /// also counts against the liveness window, whichever ends first.
    async fn open(
        &mut self,
        request: &ReadSessionRequest,
    ) -> Result<ResponseStream<proto::ReadSessionResponse>, ClientError> {
        let timeout = self.ctx.config.request_timeout;
        let open = self.ctx.service.read_session(request.to_proto(&self.ctx.stream));
        let liveness = self.liveness_deadline();
        if request.heartbeats && liveness <= Instant::now() + timeout {
            return tokio::time::timeout_at(liveness, open)
                .await
                .map_err(|_| ClientError::HeartbeatTimeout(HEARTBEAT_THRESHOLD))?
                .map_err(ClientError::from);
        }
        open_within(timeout, open).await
    }

    fn liveness_deadline(&self) -> Instant {
        self.last_heard + HEARTBEAT_THRESHOLD
    }
}
