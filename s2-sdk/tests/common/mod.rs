//! In-memory transports for driving clients and sessions in tests.
//!
//! Each streaming call pops the next script from the mock; once the scripts
//! run out the mock behaves like a healthy service.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use futures::StreamExt;
use parking_lot::Mutex;
use s2_proto as proto;
use s2_sdk::transport::{AccountService, BasinService, ResponseStream, StreamService};
use s2_sdk::{AppendInput, AppendRecord, ClientConfig, FixedDelay, SessionContext};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use tonic::Status;

pub const STREAM: &str = "test-stream";

/// Route session logs to the test output; set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config with short, fixed retry delays.
pub fn config() -> ClientConfig {
    config_with(|builder| builder)
}

pub fn config_with(
    f: impl FnOnce(s2_sdk::ClientConfigBuilder) -> s2_sdk::ClientConfigBuilder,
) -> ClientConfig {
    f(ClientConfig::builder("test-token")
        .max_retries(3)
        .request_timeout(Duration::from_secs(5))
        .retry_backoff(Arc::new(FixedDelay(Duration::from_millis(10)))))
    .build()
    .unwrap()
}

pub fn context(mock: &MockStream, config: ClientConfig) -> SessionContext {
    SessionContext::new(Arc::new(mock.clone()), STREAM, config)
}

/// Input of one record whose body takes `body_len` bytes.
pub fn input(body_len: usize) -> AppendInput {
    AppendInput::new(vec![AppendRecord::new(vec![b'x'; body_len]).unwrap()]).unwrap()
}

/// Input with one record per body.
pub fn records(bodies: &[&str]) -> AppendInput {
    AppendInput::new(
        bodies
            .iter()
            .map(|body| AppendRecord::new(body.to_string()).unwrap())
            .collect(),
    )
    .unwrap()
}

/// Behaviour of one append session call.
#[derive(Clone)]
pub enum AppendScript {
    /// Ack every input.
    Ack,
    /// Ack one input per permit added to the gate.
    Gated(Arc<Semaphore>),
    /// Ack `acks` inputs, then fail with `status` on the next one.
    FailAfter { acks: usize, status: Status },
    /// Refuse to open.
    FailOpen(Status),
    /// Never finish opening.
    HangOpen,
    /// Accept inputs without acking any, then fail with `status` once a
    /// permit is added to the gate.
    HoldThenFail { gate: Arc<Semaphore>, status: Status },
    /// Accept inputs and never answer.
    Silent,
    /// Ack `acks` inputs, then end the response stream.
    CloseAfter { acks: usize },
    /// Ack every input with one record too many.
    BadAck,
}

/// Behaviour of one read session call.
#[derive(Clone)]
pub enum ReadScript {
    /// Serve records numbered from the requested start, honoring the count
    /// limit, then fail with `then` or end.
    Serve {
        batch_size: u64,
        batches: usize,
        then: Option<Status>,
    },
    /// Refuse to open.
    FailOpen(Status),
    /// Never finish opening.
    HangOpen,
    /// Open and never answer.
    Silent,
    /// Send each response after its delay, then end.
    Timed(Vec<(Duration, proto::ReadSessionResponse)>),
}

#[derive(Default)]
struct StreamState {
    tail: u64,
    append_scripts: VecDeque<AppendScript>,
    read_scripts: VecDeque<ReadScript>,
    received: Vec<proto::AppendInput>,
    append_sessions: usize,
    read_requests: Vec<proto::ReadSessionRequest>,
    unary_appends: usize,
    unary_append_failures: VecDeque<Status>,
}

/// Stream service that sequences records in memory.
#[derive(Clone, Default)]
pub struct MockStream {
    state: Arc<Mutex<StreamState>>,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_append_scripts(self, scripts: impl IntoIterator<Item = AppendScript>) -> Self {
        self.state.lock().append_scripts.extend(scripts);
        self
    }

    pub fn with_read_scripts(self, scripts: impl IntoIterator<Item = ReadScript>) -> Self {
        self.state.lock().read_scripts.extend(scripts);
        self
    }

    pub fn with_unary_append_failures(self, failures: impl IntoIterator<Item = Status>) -> Self {
        self.state.lock().unary_append_failures.extend(failures);
        self
    }

    /// Every input received over append sessions, retransmissions included.
    pub fn received(&self) -> Vec<proto::AppendInput> {
        self.state.lock().received.clone()
    }

    pub fn append_sessions(&self) -> usize {
        self.state.lock().append_sessions
    }

    pub fn read_requests(&self) -> Vec<proto::ReadSessionRequest> {
        self.state.lock().read_requests.clone()
    }

    pub fn unary_appends(&self) -> usize {
        self.state.lock().unary_appends
    }

    fn sequence(&self, input: &proto::AppendInput) -> proto::AppendOutput {
        let mut state = self.state.lock();
        let start = state.tail;
        state.tail += input.records.len() as u64;
        proto::AppendOutput {
            start_seq_num: start,
            start_timestamp: start,
            end_seq_num: state.tail,
            end_timestamp: state.tail,
            next_seq_num: state.tail,
            last_timestamp: state.tail,
        }
    }
}

/// Synthetic record at `seq_num`.
pub fn record(seq_num: u64) -> proto::SequencedRecord {
    proto::SequencedRecord {
        seq_num,
        timestamp: seq_num,
        headers: Vec::new(),
        body: format!("record-{seq_num}").into(),
    }
}

pub fn batch(seq_nums: std::ops::Range<u64>) -> proto::ReadSessionResponse {
    proto::ReadSessionResponse::with_output(proto::ReadOutput::batch(
        seq_nums.map(record).collect(),
    ))
}

#[tonic::async_trait]
impl StreamService for MockStream {
    async fn check_tail(
        &self,
        _request: proto::CheckTailRequest,
    ) -> Result<proto::CheckTailResponse, Status> {
        let tail = self.state.lock().tail;
        Ok(proto::CheckTailResponse {
            next_seq_num: tail,
            last_timestamp: tail,
        })
    }

    async fn append(&self, request: proto::AppendRequest) -> Result<proto::AppendResponse, Status> {
        let failure = {
            let mut state = self.state.lock();
            state.unary_appends += 1;
            state.unary_append_failures.pop_front()
        };
        if let Some(status) = failure {
            return Err(status);
        }
        let input = request
            .input
            .ok_or_else(|| Status::invalid_argument("missing input"))?;
        Ok(proto::AppendResponse {
            output: Some(self.sequence(&input)),
        })
    }

    async fn append_session(
        &self,
        requests: ReceiverStream<proto::AppendSessionRequest>,
    ) -> Result<ResponseStream<proto::AppendSessionResponse>, Status> {
        let script = {
            let mut state = self.state.lock();
            state.append_sessions += 1;
            state.append_scripts.pop_front().unwrap_or(AppendScript::Ack)
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let mock = self.clone();
        match &script {
            AppendScript::FailOpen(status) => return Err(status.clone()),
            AppendScript::HangOpen => futures::future::pending().await,
            AppendScript::HoldThenFail { gate, status } => {
                let (gate, status) = (Arc::clone(gate), status.clone());
                tokio::spawn(async move {
                    let mut requests = requests;
                    loop {
                        tokio::select! {
                            request = requests.next() => match request {
                                Some(request) => {
                                    if let Some(input) = request.input {
                                        mock.state.lock().received.push(input);
                                    }
                                }
                                None => return,
                            },
                            permit = gate.acquire() => {
                                if let Ok(permit) = permit {
                                    permit.forget();
                                    let _ = tx.send(Err(status));
                                }
                                return;
                            }
                        }
                    }
                });
                return Ok(Box::pin(UnboundedReceiverStream::new(rx)));
            }
            _ => {}
        }

        tokio::spawn(async move {
            let mut requests = requests;
            let mut acked = 0usize;
            while let Some(request) = requests.next().await {
                let Some(input) = request.input else { continue };
                mock.state.lock().received.push(input.clone());
                let response = match &script {
                    AppendScript::Ack => Ok(mock.sequence(&input)),
                    AppendScript::Gated(gate) => {
                        let Ok(permit) = gate.acquire().await else { return };
                        permit.forget();
                        Ok(mock.sequence(&input))
                    }
                    AppendScript::FailAfter { acks, status } if acked == *acks => {
                        Err(status.clone())
                    }
                    AppendScript::FailAfter { .. } => Ok(mock.sequence(&input)),
                    AppendScript::CloseAfter { acks } if acked == *acks => return,
                    AppendScript::CloseAfter { .. } => Ok(mock.sequence(&input)),
                    AppendScript::BadAck => {
                        let mut output = mock.sequence(&input);
                        output.end_seq_num += 1;
                        Ok(output)
                    }
                    AppendScript::Silent => continue,
                    AppendScript::FailOpen(_)
                    | AppendScript::HangOpen
                    | AppendScript::HoldThenFail { .. } => unreachable!(),
                };
                let failed = response.is_err();
                if tx
                    .send(response.map(proto::AppendSessionResponse::new))
                    .is_err()
                    || failed
                {
                    return;
                }
                acked += 1;
            }
            if matches!(script, AppendScript::Silent) {
                // Hold the response stream open.
                tx.closed().await;
            }
        });
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn read(&self, request: proto::ReadRequest) -> Result<proto::ReadResponse, Status> {
        let start = match request.start {
            Some(proto::read_start::Start::SeqNum(n)) => n,
            _ => 0,
        };
        let count = request.limit.and_then(|l| l.count).unwrap_or(10);
        Ok(proto::ReadResponse {
            output: Some(proto::ReadOutput::batch(
                (start..start + count).map(record).collect(),
            )),
        })
    }

    async fn read_session(
        &self,
        request: proto::ReadSessionRequest,
    ) -> Result<ResponseStream<proto::ReadSessionResponse>, Status> {
        let script = {
            let mut state = self.state.lock();
            state.read_requests.push(request.clone());
            state.read_scripts.pop_front().unwrap_or(ReadScript::Serve {
                batch_size: 10,
                batches: 3,
                then: None,
            })
        };

        let (tx, rx) = mpsc::unbounded_channel();
        match script {
            ReadScript::FailOpen(status) => return Err(status),
            ReadScript::HangOpen => futures::future::pending().await,
            ReadScript::Silent => {
                tokio::spawn(async move { tx.closed().await });
            }
            ReadScript::Timed(responses) => {
                tokio::spawn(async move {
                    for (delay, response) in responses {
                        tokio::time::sleep(delay).await;
                        if tx.send(Ok(response)).is_err() {
                            return;
                        }
                    }
                });
            }
            ReadScript::Serve {
                batch_size,
                batches,
                then,
            } => {
                let mut next = match request.start {
                    Some(proto::read_start::Start::SeqNum(n)) => n,
                    _ => 0,
                };
                let mut remaining = request.limit.and_then(|l| l.count).unwrap_or(u64::MAX);
                let mut sent = 0;
                while sent < batches && remaining > 0 {
                    let size = batch_size.min(remaining);
                    if tx.send(Ok(batch(next..next + size))).is_err() {
                        break;
                    }
                    next += size;
                    remaining -= size;
                    sent += 1;
                }
                if let Some(status) = then {
                    let _ = tx.send(Err(status));
                }
            }
        }
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

#[derive(Default)]
struct AccountState {
    basins: Vec<String>,
    create_tokens: Vec<String>,
    failures: VecDeque<Status>,
}

/// Account service keeping basin names in memory.
#[derive(Clone, Default)]
pub struct MockAccount {
    state: Arc<Mutex<AccountState>>,
}

impl MockAccount {
    /// Fail the next calls with these statuses, in order.
    pub fn failing(failures: impl IntoIterator<Item = Status>) -> Self {
        let mock = Self::default();
        mock.state.lock().failures.extend(failures);
        mock
    }

    pub fn create_tokens(&self) -> Vec<String> {
        self.state.lock().create_tokens.clone()
    }

    fn next_failure(&self) -> Result<(), Status> {
        self.state.lock().failures.pop_front().map_or(Ok(()), Err)
    }
}

#[tonic::async_trait]
impl AccountService for MockAccount {
    async fn list_basins(
        &self,
        request: proto::ListBasinsRequest,
    ) -> Result<proto::ListBasinsResponse, Status> {
        self.next_failure()?;
        let basins = self
            .state
            .lock()
            .basins
            .iter()
            .filter(|name| name.starts_with(&request.prefix))
            .map(|name| proto::BasinInfo {
                name: name.clone(),
                state: proto::BasinState::Active as i32,
            })
            .collect();
        Ok(proto::ListBasinsResponse {
            basins,
            has_more: false,
        })
    }

    async fn create_basin(
        &self,
        request: proto::CreateBasinRequest,
        request_token: &str,
    ) -> Result<proto::CreateBasinResponse, Status> {
        let mut state = self.state.lock();
        state.create_tokens.push(request_token.to_owned());
        if let Some(status) = state.failures.pop_front() {
            return Err(status);
        }
        state.basins.push(request.basin.clone());
        Ok(proto::CreateBasinResponse {
            info: Some(proto::BasinInfo {
                name: request.basin,
                state: proto::BasinState::Creating as i32,
            }),
        })
    }

    async fn delete_basin(
        &self,
        request: proto::DeleteBasinRequest,
    ) -> Result<proto::DeleteBasinResponse, Status> {
        self.next_failure()?;
        let mut state = self.state.lock();
        let before = state.basins.len();
        state.basins.retain(|name| *name != request.basin);
        if state.basins.len() == before {
            return Err(Status::not_found("basin not found"));
        }
        Ok(proto::DeleteBasinResponse {})
    }

    async fn get_basin_config(
        &self,
        _request: proto::GetBasinConfigRequest,
    ) -> Result<proto::GetBasinConfigResponse, Status> {
        self.next_failure()?;
        Ok(proto::GetBasinConfigResponse {
            config: Some(proto::BasinConfig {
                default_stream_config: None,
                create_stream_on_append: true,
            }),
        })
    }

    async fn reconfigure_basin(
        &self,
        request: proto::ReconfigureBasinRequest,
    ) -> Result<proto::ReconfigureBasinResponse, Status> {
        self.next_failure()?;
        Ok(proto::ReconfigureBasinResponse {
            config: request.config,
        })
    }
}

#[derive(Default)]
struct BasinState {
    streams: Vec<String>,
    page_size: usize,
    list_requests: Vec<proto::ListStreamsRequest>,
}

/// Basin service keeping stream names in memory, listed in pages.
#[derive(Clone, Default)]
pub struct MockBasin {
    state: Arc<Mutex<BasinState>>,
}

impl MockBasin {
    pub fn with_streams(names: &[&str], page_size: usize) -> Self {
        let mock = Self::default();
        {
            let mut state = mock.state.lock();
            state.streams = names.iter().map(|name| (*name).to_owned()).collect();
            state.streams.sort();
            state.page_size = page_size;
        }
        mock
    }

    pub fn list_requests(&self) -> Vec<proto::ListStreamsRequest> {
        self.state.lock().list_requests.clone()
    }
}

#[tonic::async_trait]
impl BasinService for MockBasin {
    async fn list_streams(
        &self,
        request: proto::ListStreamsRequest,
    ) -> Result<proto::ListStreamsResponse, Status> {
        let mut state = self.state.lock();
        state.list_requests.push(request.clone());
        let matching: Vec<_> = state
            .streams
            .iter()
            .filter(|name| name.starts_with(&request.prefix))
            .filter(|name| request.start_after.is_empty() || **name > request.start_after)
            .cloned()
            .collect();
        let page_size = state.page_size.max(1);
        let has_more = matching.len() > page_size;
        Ok(proto::ListStreamsResponse {
            streams: matching
                .into_iter()
                .take(page_size)
                .map(|name| proto::StreamInfo {
                    name,
                    created_at: 1,
                    deleted_at: None,
                })
                .collect(),
            has_more,
        })
    }

    async fn create_stream(
        &self,
        request: proto::CreateStreamRequest,
        _request_token: &str,
    ) -> Result<proto::CreateStreamResponse, Status> {
        let mut state = self.state.lock();
        if state.streams.contains(&request.stream) {
            return Err(Status::already_exists("stream exists"));
        }
        state.streams.push(request.stream.clone());
        state.streams.sort();
        Ok(proto::CreateStreamResponse {
            info: Some(proto::StreamInfo {
                name: request.stream,
                created_at: 1,
                deleted_at: None,
            }),
        })
    }

    async fn delete_stream(
        &self,
        request: proto::DeleteStreamRequest,
    ) -> Result<proto::DeleteStreamResponse, Status> {
        self.state.lock().streams.retain(|name| *name != request.stream);
        Ok(proto::DeleteStreamResponse {})
    }

    async fn get_stream_config(
        &self,
        _request: proto::GetStreamConfigRequest,
    ) -> Result<proto::GetStreamConfigResponse, Status> {
        Ok(proto::GetStreamConfigResponse {
            config: Some(proto::StreamConfig {
                storage_class: proto::StorageClass::Express as i32,
                retention_policy: Some(proto::stream_config::RetentionPolicy::Age(3600)),
            }),
        })
    }

    async fn reconfigure_stream(
        &self,
        request: proto::ReconfigureStreamRequest,
    ) -> Result<proto::ReconfigureStreamResponse, Status> {
        Ok(proto::ReconfigureStreamResponse {
            config: request.config,
        })
    }
}
