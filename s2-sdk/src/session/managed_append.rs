//! Managed append session: byte-budgeted backpressure, bounded retry and
//! retransmission of unacknowledged appends after a transport failure.
//!
//! ## Lifecycle
//!
//! ```text
//! submit ──permits──> [notifications] ──> supervisor ──> attempt 1 ──x
//!                                              |   backoff
//!                                              └──> attempt 2: retransmit inflight,
//!                                                   drain acks, resume intake
//! ```
//!
//! The supervisor owns the inflight queue across attempts, so each
//! submission's ack sender survives reconnects. Acks are matched FIFO.

use super::{
    completion_of, open_within, sleep_until, validate_ack, Completion, SessionContext,
};
use crate::config::AppendRetryPolicy;
use crate::error::{ClientError, ValidationError};
use crate::transport::ResponseStream;
use crate::types::{AppendInput, AppendOutput};
use futures::StreamExt;
use s2_proto as proto;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Granularity at which a blocked submit re-checks its deadline and the
/// session state.
const PERMIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Smallest possible metered size of an input: one empty record.
const MIN_INPUT_BYTES: u64 = 8;

/// Resolves once the submitted input is acknowledged or the session gives up
/// on it.
///
/// Resolves to [`ClientError::Abandoned`] if the session was closed
/// immediately while the input was still outstanding.
#[must_use = "an append ack does nothing unless awaited"]
#[derive(Debug)]
pub struct AppendAck {
    rx: oneshot::Receiver<Result<AppendOutput, ClientError>>,
}

impl Future for AppendAck {
    type Output = Result<AppendOutput, ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ClientError::Abandoned)))
    }
}

struct InflightAppend {
    input: AppendInput,
    ack: oneshot::Sender<Result<AppendOutput, ClientError>>,
    submitted_at: Instant,
    sent_at: Instant,
}

impl InflightAppend {
    fn resolve(self, result: Result<AppendOutput, ClientError>) {
        // The caller may have dropped its ack future.
        let _ = self.ack.send(result);
    }
}

enum Notification {
    Submit(InflightAppend),
    Close,
}

struct Budget {
    permits: Semaphore,
    total: u64,
    accepting: AtomicBool,
}

impl Budget {
    fn release(&self, bytes: u64) {
        self.permits.add_permits(bytes as usize);
    }

    fn stop(&self) {
        self.accepting.store(false, Ordering::Release);
        self.permits.close();
    }

    fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }
}

/// Append session that retries transient failures without losing or
/// reordering submissions.
pub struct ManagedAppendSession {
    notifications: mpsc::UnboundedSender<Notification>,
    budget: Arc<Budget>,
    abort: AbortHandle,
    completion: Completion,
}

impl ManagedAppendSession {
    pub fn spawn(ctx: SessionContext) -> Self {
        let total = ctx.config.max_append_inflight_bytes;
        let budget = Arc::new(Budget {
            permits: Semaphore::new(total as usize),
            total,
            accepting: AtomicBool::new(true),
        });
        let (notifications, notification_rx) = mpsc::unbounded_channel();

        let supervisor = Supervisor {
            remaining_attempts: ctx.config.max_retries,
            ctx: ctx.clone(),
            budget: Arc::clone(&budget),
            notifications: notification_rx,
            inflight: VecDeque::new(),
            intake_open: true,
        };
        let task = ctx.runtime.spawn(supervisor.run());

        Self {
            notifications,
            budget,
            abort: task.abort_handle(),
            completion: completion_of(task),
        }
    }

    /// Reserve capacity for `input` and queue it.
    ///
    /// Waits up to `max_wait` for enough of the inflight byte budget to free
    /// up. The returned [`AppendAck`] resolves when the service acknowledges
    /// the input.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::TooLarge`] if the input exceeds the whole budget
    /// - [`ClientError::CapacityTimeout`] if capacity did not free up in time
    /// - [`ClientError::SessionClosed`] once the session stopped accepting
    pub async fn submit(
        &self,
        input: AppendInput,
        max_wait: Duration,
    ) -> Result<AppendAck, ClientError> {
        let bytes = input.metered_bytes();
        if bytes > self.budget.total {
            return Err(ValidationError::TooLarge {
                what: "append input",
                size: bytes,
                max: self.budget.total,
            }
            .into());
        }
        self.acquire(bytes, max_wait).await?;

        let (ack, rx) = oneshot::channel();
        let now = Instant::now();
        let entry = InflightAppend {
            input,
            ack,
            submitted_at: now,
            sent_at: now,
        };
        if self.notifications.send(Notification::Submit(entry)).is_err() {
            self.budget.release(bytes);
            return Err(ClientError::SessionClosed);
        }
        Ok(AppendAck { rx })
    }

    async fn acquire(&self, bytes: u64, max_wait: Duration) -> Result<(), ClientError> {
        // Bounded by the budget, which fits in a u32.
        let wanted = u32::try_from(bytes)
            .map_err(|_| ClientError::InvalidConfig("append budget exceeds u32::MAX".into()))?;
        let started = Instant::now();
        loop {
            if !self.budget.is_accepting() {
                return Err(ClientError::SessionClosed);
            }
            let remaining = max_wait.saturating_sub(started.elapsed());
            let quantum = remaining.min(PERMIT_POLL_INTERVAL);
            match tokio::time::timeout(quantum, self.budget.permits.acquire_many(wanted)).await {
                Ok(Ok(permit)) => {
                    permit.forget();
                    if !self.budget.is_accepting() {
                        self.budget.release(bytes);
                        return Err(ClientError::SessionClosed);
                    }
                    return Ok(());
                }
                Ok(Err(_closed)) => return Err(ClientError::SessionClosed),
                Err(_elapsed) if started.elapsed() >= max_wait => {
                    return Err(ClientError::CapacityTimeout {
                        requested: bytes,
                        waited: max_wait,
                    });
                }
                Err(_elapsed) => {}
            }
        }
    }

    /// Bytes of the inflight budget currently free.
    #[must_use]
    pub fn remaining_capacity_bytes(&self) -> u64 {
        self.budget.permits.available_permits() as u64
    }

    /// Whether new submissions are still accepted.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.budget.is_accepting()
    }

    /// Stop intake and wait until everything submitted so far is acked.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the session, if any.
    pub async fn close_gracefully(&self) -> Result<(), ClientError> {
        self.budget.accepting.store(false, Ordering::Release);
        let _ = self.notifications.send(Notification::Close);
        self.completion.clone().await
    }

    /// Stop intake and tear the session down without waiting for acks.
    /// Outstanding [`AppendAck`]s resolve to [`ClientError::Abandoned`].
    ///
    /// # Errors
    ///
    /// Returns the error that ended the session, if it failed first.
    pub async fn close_immediately(&self) -> Result<(), ClientError> {
        self.budget.stop();
        self.abort.abort();
        self.completion.clone().await
    }

    /// Resolves when the session ends, with the error that ended it if any.
    pub fn completion(&self) -> impl Future<Output = Result<(), ClientError>> + Send + 'static {
        self.completion.clone()
    }
}

/// Outcome of one connection attempt.
struct AttemptFailure {
    error: ClientError,
    during_recovery: bool,
}

struct Supervisor {
    ctx: SessionContext,
    budget: Arc<Budget>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    inflight: VecDeque<InflightAppend>,
    remaining_attempts: u32,
    intake_open: bool,
}

impl Supervisor {
    async fn run(mut self) -> Result<(), ClientError> {
        let result = loop {
            let failure = match self.attempt().await {
                Ok(()) => break Ok(()),
                Err(failure) => failure,
            };
            if !self.should_retry(&failure) {
                break Err(failure.error);
            }

            let attempt = self.ctx.config.max_retries - self.remaining_attempts + 1;
            self.remaining_attempts -= 1;
            let delay = self.ctx.config.retry_backoff.delay(attempt);
            warn!(
                stream = %self.ctx.stream,
                attempt,
                ?delay,
                inflight = self.inflight.len(),
                error = %failure.error,
                "append session attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        };

        self.shutdown(&result);
        result
    }

    fn should_retry(&self, failure: &AttemptFailure) -> bool {
        self.ctx.config.append_retry_policy == AppendRetryPolicy::All
            && failure.error.is_retryable()
            && self.remaining_attempts > 0
            && !failure.during_recovery
    }

    async fn attempt(&mut self) -> Result<(), AttemptFailure> {
        let timeout = self.ctx.config.request_timeout;
        let mut recovering = !self.inflight.is_empty();
        let fail = |error: ClientError, during_recovery: bool| AttemptFailure {
            error,
            during_recovery,
        };

        // Every unacked input occupies one slot, so sends never find it full.
        let capacity = usize::try_from(self.budget.total / MIN_INPUT_BYTES)
            .unwrap_or(usize::MAX)
            .max(1);
        let (requests, request_rx) = mpsc::channel(capacity);
        let open = self
            .ctx
            .service
            .append_session(ReceiverStream::new(request_rx));
        let mut responses: ResponseStream<proto::AppendSessionResponse> =
            open_within(timeout, open).await.map_err(|e| fail(e, recovering))?;

        if recovering {
            info!(
                stream = %self.ctx.stream,
                inflight = self.inflight.len(),
                "retransmitting unacknowledged appends"
            );
            let now = Instant::now();
            for entry in &mut self.inflight {
                send(&requests, &self.ctx.stream, &entry.input).map_err(|e| fail(e, true))?;
                entry.sent_at = now;
            }
        }

        loop {
            if !self.intake_open && self.inflight.is_empty() {
                return Ok(());
            }
            let deadline = self.inflight.front().map(|entry| entry.sent_at + timeout);
            let intake = self.intake_open && !recovering;

            tokio::select! {
                biased;

                response = responses.next() => match response {
                    Some(Ok(response)) => {
                        self.on_ack(response).map_err(|e| fail(e, recovering))?;
                        if recovering && self.inflight.is_empty() {
                            recovering = false;
                            info!(stream = %self.ctx.stream, "append session recovered");
                        }
                    }
                    Some(Err(status)) => return Err(fail(status.into(), recovering)),
                    None => {
                        let error = ClientError::protocol(if self.intake_open {
                            "service ended the append session while it was accepting"
                        } else {
                            "service ended the append session with appends outstanding"
                        });
                        return Err(fail(error, recovering));
                    }
                },

                notification = self.notifications.recv(), if intake => match notification {
                    Some(Notification::Submit(mut entry)) => {
                        send(&requests, &self.ctx.stream, &entry.input)
                            .map_err(|e| fail(e, false))?;
                        entry.sent_at = Instant::now();
                        debug!(
                            stream = %self.ctx.stream,
                            bytes = entry.input.metered_bytes(),
                            queued_for = ?entry.sent_at.duration_since(entry.submitted_at),
                            inflight = self.inflight.len() + 1,
                            "append sent"
                        );
                        self.inflight.push_back(entry);
                    }
                    Some(Notification::Close) | None => {
                        debug!(
                            stream = %self.ctx.stream,
                            inflight = self.inflight.len(),
                            "append intake closed"
                        );
                        self.intake_open = false;
                        self.budget.accepting.store(false, Ordering::Release);
                    }
                },

                () = sleep_until(deadline) => {
                    return Err(fail(ClientError::LocalTimeout(timeout), recovering));
                }
            }
        }
    }

    fn on_ack(&mut self, response: proto::AppendSessionResponse) -> Result<(), ClientError> {
        let output: AppendOutput = response
            .output
            .ok_or_else(|| ClientError::protocol("append response without output"))?
            .into();
        let Some(entry) = self.inflight.pop_front() else {
            return Err(ClientError::protocol("ack received with nothing inflight"));
        };
        if let Err(err) = validate_ack(&output, &entry.input) {
            // Keep the entry so shutdown fails it with the terminal cause.
            self.inflight.push_front(entry);
            return Err(err);
        }

        self.remaining_attempts = self.ctx.config.max_retries;
        self.budget.release(entry.input.metered_bytes());
        debug!(
            stream = %self.ctx.stream,
            start = output.start.seq_num,
            end = output.end.seq_num,
            latency = ?entry.submitted_at.elapsed(),
            inflight = self.inflight.len(),
            "append acked"
        );
        entry.resolve(Ok(output));
        Ok(())
    }

    /// Fail everything still pending once the session has ended.
    fn shutdown(&mut self, result: &Result<(), ClientError>) {
        self.intake_open = false;
        self.budget.stop();

        let cause = match result {
            Ok(()) => ClientError::SessionClosed,
            Err(err) => {
                warn!(
                    stream = %self.ctx.stream,
                    inflight = self.inflight.len(),
                    error = %err,
                    "append session failed"
                );
                err.clone()
            }
        };
        for entry in self.inflight.drain(..) {
            entry.resolve(Err(cause.clone()));
        }

        // Closing first means no submission can slip in after the drain.
        self.notifications.close();
        while let Ok(notification) = self.notifications.try_recv() {
            if let Notification::Submit(entry) = notification {
                entry.resolve(Err(cause.clone()));
            }
        }
    }
}

fn send(
    requests: &mpsc::Sender<proto::AppendSessionRequest>,
    stream: &str,
    input: &AppendInput,
) -> Result<(), ClientError> {
    requests
        .try_send(proto::AppendSessionRequest::new(input.to_proto(stream)))
        .map_err(|_| tonic::Status::unavailable("append request stream closed").into())
}
