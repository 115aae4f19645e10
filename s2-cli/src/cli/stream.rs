//! Data-plane commands: tail, append and read.

use super::commands::StartArgs;
use crate::config::CliConfig;
use anyhow::{Context, Result};
use s2_sdk::types::{MAX_BATCH_BYTES, MAX_BATCH_RECORDS};
use futures::FutureExt;
use s2_sdk::{
    AppendAck, AppendInput, AppendOutput, AppendRecord, ClientError, ManagedAppendSession,
    ReadLimit, ReadOutput, ReadSessionRequest, Start, StreamClient,
};
use std::collections::VecDeque;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info};

impl StartArgs {
    #[must_use]
    pub fn to_start(&self) -> Start {
        match (self.seq_num, self.timestamp, self.tail_offset) {
            (_, Some(timestamp), _) => Start::Timestamp(timestamp),
            (_, _, Some(offset)) => Start::TailOffset(offset),
            (seq_num, _, _) => Start::SeqNum(seq_num.unwrap_or(0)),
        }
    }
}

pub async fn check_tail(client: &StreamClient) -> Result<()> {
    let tail = client
        .check_tail()
        .await
        .with_context(|| format!("failed to check tail of '{}'", client.name()))?;
    println!("{}\t{}", tail.seq_num, tail.timestamp);
    Ok(())
}

/// Groups lines into inputs that stay within the batch limits.
#[derive(Default)]
pub struct Batcher {
    records: Vec<AppendRecord>,
    bytes: u64,
    fencing_token: Option<String>,
    match_seq_num: Option<u64>,
}

impl Batcher {
    #[must_use]
    pub fn new(fencing_token: Option<String>, match_seq_num: Option<u64>) -> Self {
        Self {
            fencing_token,
            match_seq_num,
            ..Self::default()
        }
    }

    /// Add one record, returning the batch it closed if it did not fit.
    pub fn push(&mut self, record: AppendRecord) -> Result<Option<AppendInput>> {
        let full = self.records.len() == MAX_BATCH_RECORDS
            || self.bytes + record.metered_bytes() > MAX_BATCH_BYTES;
        let closed = if full { self.flush()? } else { None };
        self.bytes += record.metered_bytes();
        self.records.push(record);
        Ok(closed)
    }

    /// Close the pending batch, if any.
    pub fn flush(&mut self) -> Result<Option<AppendInput>> {
        if self.records.is_empty() {
            return Ok(None);
        }
        let records = std::mem::take(&mut self.records);
        let count = records.len() as u64;
        self.bytes = 0;

        let mut builder = AppendInput::builder().records(records);
        if let Some(token) = &self.fencing_token {
            builder = builder.fencing_token(token.clone());
        }
        if let Some(seq_num) = self.match_seq_num {
            builder = builder.match_seq_num(seq_num);
            self.match_seq_num = Some(seq_num + count);
        }
        Ok(Some(builder.build()?))
    }
}

/// Acks outstanding before reading more input waits on the oldest.
pub const MAX_PENDING_ACKS: usize = 64;

/// Acks of submitted batches, resolved in submission order.
#[derive(Default)]
struct PendingAcks {
    acks: VecDeque<AppendAck>,
    range: Option<(u64, u64)>,
}

impl PendingAcks {
    fn record(&mut self, output: Result<AppendOutput, ClientError>) -> Result<()> {
        let output = output.context("append failed")?;
        let start = self.range.map_or(output.start.seq_num, |(start, _)| start);
        self.range = Some((start, output.end.seq_num));
        Ok(())
    }

    /// Take acks that already resolved, then wait on the oldest until at
    /// most `cap` remain.
    async fn settle(&mut self, cap: usize) -> Result<()> {
        while let Some(ack) = self.acks.front_mut() {
            let Some(output) = ack.now_or_never() else {
                break;
            };
            self.acks.pop_front();
            self.record(output)?;
        }
        while self.acks.len() > cap {
            if let Some(ack) = self.acks.pop_front() {
                self.record(ack.await)?;
            }
        }
        Ok(())
    }
}

async fn submit(
    session: &ManagedAppendSession,
    batch: AppendInput,
    wait: Duration,
) -> Result<AppendAck> {
    match session.submit(batch, wait).await {
        Ok(ack) => Ok(ack),
        Err(ClientError::SessionClosed) => {
            let cause = session
                .completion()
                .await
                .err()
                .unwrap_or(ClientError::SessionClosed);
            Err(anyhow::Error::new(cause).context("append session ended"))
        }
        Err(err) => Err(err).context("failed to submit batch"),
    }
}

/// Append each line of `input` as one record through a managed session.
pub async fn append<R: AsyncRead + Unpin>(
    client: &StreamClient,
    settings: &CliConfig,
    input: R,
    fencing_token: Option<String>,
    match_seq_num: Option<u64>,
) -> Result<()> {
    let session = client.managed_append_session();
    let wait = settings.append.capacity_wait();
    let mut batcher = Batcher::new(fencing_token, match_seq_num);
    let mut pending = PendingAcks::default();
    let mut lines = BufReader::new(input).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if let Some(batch) = batcher.push(AppendRecord::new(line)?)? {
            debug!(records = batch.records().len(), "submitting batch");
            pending.acks.push_back(submit(&session, batch, wait).await?);
            pending.settle(MAX_PENDING_ACKS).await?;
        }
    }
    if let Some(batch) = batcher.flush()? {
        pending.acks.push_back(submit(&session, batch, wait).await?);
    }
    pending.settle(0).await?;
    session.close_gracefully().await?;

    match pending.range {
        Some((start, end)) => {
            info!(start, end, "append complete");
            eprintln!("Appended records [{start}, {end})");
        }
        None => eprintln!("Nothing to append"),
    }
    Ok(())
}

/// Stream records to stdout until the limit is reached, the session ends,
/// or the user interrupts.
pub async fn read(
    client: &StreamClient,
    settings: &CliConfig,
    start: Start,
    limit: ReadLimit,
) -> Result<()> {
    let request = ReadSessionRequest::new(start)
        .with_limit(limit)
        .with_heartbeats(settings.read.heartbeats);
    let mut session = client.managed_read_session(request, settings.read.max_buffered_bytes);
    let stdout = std::io::stdout();

    loop {
        let output = tokio::select! {
            output = session.next() => output,
            _ = tokio::signal::ctrl_c() => {
                session.close().await?;
                return Ok(());
            }
        };
        let Some(output) = output else {
            return Ok(());
        };
        match output.context("read failed")? {
            ReadOutput::Batch(batch) => {
                let mut out = stdout.lock();
                for record in &batch.records {
                    out.write_all(&record.body)?;
                    out.write_all(b"\n")?;
                }
                out.flush()?;
            }
            ReadOutput::FirstSeqNum(position) => {
                eprintln!("Start is before the first retained record {}", position.seq_num);
            }
            ReadOutput::NextSeqNum(position) => {
                eprintln!("Start is past the tail {}", position.seq_num);
            }
        }
    }
}
