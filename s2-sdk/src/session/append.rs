//! Unmanaged append session: ordered streaming appends, no retry and no
//! backpressure beyond the bounded input channel.

use super::{open_within, sleep_until, validate_ack, SessionContext};
use crate::error::ClientError;
use crate::types::{AppendInput, AppendOutput};
use futures::StreamExt;
use s2_proto as proto;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Submissions buffered ahead of the session task.
const INPUT_CAPACITY: usize = 10;

/// Inputs awaiting acknowledgement before intake pauses.
const MAX_INFLIGHT: usize = 1000;

/// Invoked with each acknowledgement, in submission order.
pub type AppendResponseHandler = Box<dyn FnMut(AppendOutput) + Send>;

/// Invoked at most once, with the error that ended the session.
pub type AppendErrorHandler = Box<dyn FnOnce(ClientError) + Send>;

struct Inflight {
    input: AppendInput,
    sent_at: Instant,
}

/// Streams appends over one connection and reports acks through callbacks.
pub struct AppendSession {
    inputs: mpsc::Sender<AppendInput>,
    task: JoinHandle<()>,
}

impl AppendSession {
    pub fn spawn(
        ctx: SessionContext,
        on_response: impl FnMut(AppendOutput) + Send + 'static,
        on_error: impl FnOnce(ClientError) + Send + 'static,
    ) -> Self {
        let (inputs, input_rx) = mpsc::channel(INPUT_CAPACITY);
        let runtime = ctx.runtime.clone();
        let task = runtime.spawn(run(ctx, input_rx, Box::new(on_response), Box::new(on_error)));
        Self { inputs, task }
    }

    /// Queue `input` for transmission. Waits while the input buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] once the session has failed.
    pub async fn submit(&self, input: AppendInput) -> Result<(), ClientError> {
        self.inputs
            .send(input)
            .await
            .map_err(|_| ClientError::SessionClosed)
    }

    /// Stop intake and wait until every queued and inflight input is acked,
    /// or the session fails.
    pub async fn close(self) {
        drop(self.inputs);
        if let Err(err) = self.task.await {
            warn!(error = %err, "append session task did not finish cleanly");
        }
    }
}

async fn run(
    ctx: SessionContext,
    inputs: mpsc::Receiver<AppendInput>,
    mut on_response: AppendResponseHandler,
    on_error: AppendErrorHandler,
) {
    if let Err(err) = drive(&ctx, inputs, &mut on_response).await {
        warn!(stream = %ctx.stream, error = %err, "append session failed");
        on_error(err);
    }
}

async fn drive(
    ctx: &SessionContext,
    mut inputs: mpsc::Receiver<AppendInput>,
    on_response: &mut AppendResponseHandler,
) -> Result<(), ClientError> {
    let timeout = ctx.config.request_timeout;
    // Every unacked input occupies one slot, so sends never find it full.
    let (requests, request_rx) = mpsc::channel(MAX_INFLIGHT);
    let open = ctx.service.append_session(ReceiverStream::new(request_rx));
    let mut responses = open_within(timeout, open).await?;

    let mut inflight: VecDeque<Inflight> = VecDeque::new();
    let mut accepting = true;

    loop {
        let deadline = inflight.front().map(|entry| entry.sent_at + timeout);

        tokio::select! {
            biased;

            response = responses.next() => match response {
                Some(Ok(response)) => {
                    let output: AppendOutput = response
                        .output
                        .ok_or_else(|| ClientError::protocol("append response without output"))?
                        .into();
                    let entry = inflight.pop_front().ok_or_else(|| {
                        ClientError::protocol("ack received with nothing inflight")
                    })?;
                    validate_ack(&output, &entry.input)?;
                    debug!(
                        stream = %ctx.stream,
                        start = output.start.seq_num,
                        end = output.end.seq_num,
                        inflight = inflight.len(),
                        "append acked"
                    );
                    on_response(output);
                    if !accepting && inflight.is_empty() {
                        return Ok(());
                    }
                }
                Some(Err(status)) => return Err(status.into()),
                None => {
                    return Err(ClientError::protocol(if accepting {
                        "service ended the append session while it was open"
                    } else {
                        "service ended the append session with appends outstanding"
                    }));
                }
            },

            input = inputs.recv(), if accepting && inflight.len() < MAX_INFLIGHT => match input {
                Some(input) => {
                    let request = proto::AppendSessionRequest::new(input.to_proto(&ctx.stream));
                    requests.try_send(request).map_err(|_| {
                        ClientError::Transport("append request stream closed".into())
                    })?;
                    inflight.push_back(Inflight {
                        input,
                        sent_at: Instant::now(),
                    });
                }
                None => {
                    accepting = false;
                    if inflight.is_empty() {
                        return Ok(());
                    }
                }
            },

            () = sleep_until(deadline) => {
                return Err(ClientError::LocalTimeout(timeout));
            }
        }
    }
}
