//! Pull-based read session with a byte-bounded buffer.

use super::read::ReadSession;
use super::SessionContext;
use crate::error::ClientError;
use crate::types::{ReadOutput, ReadSessionRequest};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Outputs buffered regardless of their size.
const BUFFER_ITEMS: usize = 128;

enum Item {
    Output(ReadOutput, OwnedSemaphorePermit),
    Error(ClientError),
    End,
}

/// Wraps a [`ReadSession`] and buffers its output for the caller to pull.
///
/// The session stops receiving while `max_buffered_bytes` worth of batches
/// are waiting to be taken. A batch larger than the whole buffer is admitted
/// alone once the buffer is empty.
pub struct ManagedReadSession {
    session: ReadSession,
    items: mpsc::Receiver<Item>,
    peeked: Option<Item>,
    closed: bool,
}

impl ManagedReadSession {
    pub fn spawn(
        ctx: SessionContext,
        request: ReadSessionRequest,
        max_buffered_bytes: u32,
    ) -> Self {
        let (tx, items) = mpsc::channel(BUFFER_ITEMS);
        let permits = Arc::new(Semaphore::new(max_buffered_bytes as usize));
        let runtime = ctx.runtime.clone();

        let outputs = tx.clone();
        let session = ReadSession::spawn(
            ctx,
            request,
            move |output: ReadOutput| {
                let permits = Arc::clone(&permits);
                let outputs = outputs.clone();
                async move {
                    let bytes = match &output {
                        ReadOutput::Batch(batch) => batch.metered_bytes(),
                        _ => 0,
                    };
                    let wanted = u32::try_from(bytes)
                        .unwrap_or(u32::MAX)
                        .min(max_buffered_bytes);
                    let Ok(permit) = permits.acquire_many_owned(wanted).await else {
                        return;
                    };
                    // A closed receiver means the caller is gone.
                    let _ = outputs.send(Item::Output(output, permit)).await;
                }
                .boxed()
            },
            |_| {},
        );

        let completion = session.completion();
        runtime.spawn(async move {
            if let Err(err) = completion.await {
                let _ = tx.send(Item::Error(err)).await;
            }
            let _ = tx.send(Item::End).await;
        });

        Self {
            session,
            items,
            peeked: None,
            closed: false,
        }
    }

    /// Take the next output if one is already buffered.
    pub fn get(&mut self) -> Option<Result<ReadOutput, ClientError>> {
        if let Some(item) = self.peeked.take() {
            return self.deliver(item);
        }
        if self.closed {
            return None;
        }
        match self.items.try_recv() {
            Ok(item) => self.deliver(item),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    /// Wait up to `timeout` for the next output.
    pub async fn get_timeout(
        &mut self,
        timeout: Duration,
    ) -> Option<Result<ReadOutput, ClientError>> {
        if let Some(item) = self.peeked.take() {
            return self.deliver(item);
        }
        if self.closed {
            return None;
        }
        match tokio::time::timeout(timeout, self.items.recv()).await {
            Ok(Some(item)) => self.deliver(item),
            Ok(None) => {
                self.closed = true;
                None
            }
            Err(_elapsed) => None,
        }
    }

    /// Wait for the next output. `None` once the session has ended and the
    /// buffer is drained. An error is returned once, before the end.
    pub async fn next(&mut self) -> Option<Result<ReadOutput, ClientError>> {
        if let Some(item) = self.peeked.take() {
            return self.deliver(item);
        }
        if self.closed {
            return None;
        }
        match self.items.recv().await {
            Some(item) => self.deliver(item),
            None => {
                self.closed = true;
                None
            }
        }
    }

    /// Wait until an output or error is available, or the session ends.
    pub async fn has_next(&mut self) -> bool {
        if let Some(item) = &self.peeked {
            return !matches!(item, Item::End);
        }
        if self.closed {
            return false;
        }
        match self.items.recv().await {
            Some(Item::End) | None => {
                self.closed = true;
                false
            }
            Some(item) => {
                self.peeked = Some(item);
                true
            }
        }
    }

    /// Whether the session has ended and everything buffered was taken.
    /// Does not wait; an output or error found in the buffer stays there.
    pub fn is_closed(&mut self) -> bool {
        if self.peeked.is_none() && !self.closed {
            match self.items.try_recv() {
                Ok(Item::End) | Err(TryRecvError::Disconnected) => self.closed = true,
                Ok(item) => self.peeked = Some(item),
                Err(TryRecvError::Empty) => {}
            }
        }
        self.closed && self.peeked.is_none()
    }

    /// Stop the underlying session. Already buffered outputs stay available.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the session, if it failed before closing.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.session.close().await
    }

    fn deliver(&mut self, item: Item) -> Option<Result<ReadOutput, ClientError>> {
        match item {
            Item::Output(output, permit) => {
                drop(permit);
                Some(Ok(output))
            }
            Item::Error(err) => {
                debug!(error = %err, "read session ended with error");
                Some(Err(err))
            }
            Item::End => {
                self.closed = true;
                None
            }
        }
    }
}

impl Drop for ManagedReadSession {
    fn drop(&mut self) {
        // Nobody is left to drain the buffer.
        self.session.abort();
    }
}
