//! Account, basin and stream clients.
//!
//! Every unary call runs through a [`RetryTimeoutExecutor`]. Streams hand out
//! the session types from [`crate::session`].

use crate::config::{AppendRetryPolicy, ClientConfig};
use crate::error::{ClientError, Result};
use crate::retry::RetryTimeoutExecutor;
use crate::session::{
    AppendSession, ManagedAppendSession, ManagedReadSession, ReadSession, SessionContext,
};
use crate::transport::{
    connect_lazy, AccountService, BasinService, GrpcAccountService, GrpcBasinService,
    GrpcStreamService, StreamService,
};
use crate::types::{
    AppendInput, AppendOutput, BasinConfig, BasinInfo, ListBasinsRequest, ListStreamsRequest,
    Page, ReadOutput, ReadRequest, ReadSessionRequest, StreamConfig, StreamInfo, StreamPosition,
};
use futures::future::BoxFuture;
use s2_proto as proto;
use std::sync::Arc;
use tokio::runtime::Handle;
use tonic::transport::Channel;
use tracing::{debug, info};
use uuid::Uuid;

fn missing(field: &str) -> ClientError {
    ClientError::protocol(format!("response is missing {field}"))
}

fn field_mask(paths: Vec<String>) -> Option<prost_types::FieldMask> {
    (!paths.is_empty()).then_some(prost_types::FieldMask { paths })
}

/// Account-level client: basin lifecycle.
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    account: Arc<dyn AccountService>,
    channel: Option<Channel>,
    executor: RetryTimeoutExecutor,
}

impl Client {
    /// Client talking gRPC to the configured account endpoint. Must be called
    /// within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel or credentials cannot be set up.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let channel = connect_lazy(&config.endpoints.account.to_string(), &config)?;
        let account = Arc::new(GrpcAccountService::new(channel.clone(), &config)?);
        Ok(Self {
            executor: RetryTimeoutExecutor::from_config(&config),
            config,
            account,
            channel: Some(channel),
        })
    }

    /// Client over an arbitrary transport.
    #[must_use]
    pub fn with_service(config: ClientConfig, account: Arc<dyn AccountService>) -> Self {
        Self {
            executor: RetryTimeoutExecutor::from_config(&config),
            config,
            account,
            channel: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// # Errors
    ///
    /// Returns the service error once retries are exhausted.
    pub async fn list_basins(&self, request: ListBasinsRequest) -> Result<Page<BasinInfo>> {
        let request: proto::ListBasinsRequest = request.into();
        let request = &request;
        let response = self
            .executor
            .execute("list_basins", move || async move {
                self.account
                    .list_basins(request.clone())
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        Ok(Page {
            items: response.basins.into_iter().map(Into::into).collect(),
            has_more: response.has_more,
        })
    }

    /// Create a basin. Retries reuse one request token, so a creation that
    /// reached the service before failing is not repeated.
    ///
    /// # Errors
    ///
    /// Returns the service error once retries are exhausted.
    pub async fn create_basin(
        &self,
        basin: &str,
        config: Option<BasinConfig>,
    ) -> Result<BasinInfo> {
        let request = proto::CreateBasinRequest {
            basin: basin.to_owned(),
            config: config.map(Into::into),
        };
        let token = Uuid::new_v4().to_string();
        let token = token.as_str();
        let request = &request;
        let response = self
            .executor
            .execute("create_basin", move || async move {
                self.account
                    .create_basin(request.clone(), token)
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        info!(basin, "basin created");
        response.info.map(Into::into).ok_or_else(|| missing("basin info"))
    }

    /// # Errors
    ///
    /// Returns the service error once retries are exhausted.
    pub async fn delete_basin(&self, basin: &str) -> Result<()> {
        let request = proto::DeleteBasinRequest {
            basin: basin.to_owned(),
        };
        let request = &request;
        self.executor
            .execute("delete_basin", move || async move {
                self.account
                    .delete_basin(request.clone())
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        info!(basin, "basin deletion requested");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the service error once retries are exhausted.
    pub async fn get_basin_config(&self, basin: &str) -> Result<BasinConfig> {
        let request = proto::GetBasinConfigRequest {
            basin: basin.to_owned(),
        };
        let request = &request;
        let response = self
            .executor
            .execute("get_basin_config", move || async move {
                self.account
                    .get_basin_config(request.clone())
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        response.config.map(Into::into).ok_or_else(|| missing("basin config"))
    }

    /// Apply the fields of `config` named in `mask`, or all of them when
    /// `mask` is empty.
    ///
    /// # Errors
    ///
    /// Returns the service error once retries are exhausted.
    pub async fn reconfigure_basin(
        &self,
        basin: &str,
        config: BasinConfig,
        mask: Vec<String>,
    ) -> Result<BasinConfig> {
        let request = proto::ReconfigureBasinRequest {
            basin: basin.to_owned(),
            config: Some(config.into()),
            mask: field_mask(mask),
        };
        let request = &request;
        let response = self
            .executor
            .execute("reconfigure_basin", move || async move {
                self.account
                    .reconfigure_basin(request.clone())
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        response.config.map(Into::into).ok_or_else(|| missing("basin config"))
    }

    /// Client for one basin. Shares this client's channel when account and
    /// basin calls go to the same endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the basin channel cannot be set up, or this client
    /// was built over a custom transport.
    pub fn basin_client(&self, basin: &str) -> Result<BasinClient> {
        let channel = match &self.channel {
            Some(channel) if self.config.endpoints.single_endpoint() => channel.clone(),
            Some(_) => connect_lazy(&self.config.endpoints.basin.target(basin), &self.config)?,
            None => {
                return Err(ClientError::InvalidConfig(
                    "basin clients need a gRPC account client".into(),
                ))
            }
        };
        BasinClient::with_channel(self.config.clone(), basin, channel)
    }
}

/// Basin-level client: stream lifecycle.
#[derive(Clone)]
pub struct BasinClient {
    basin: String,
    config: ClientConfig,
    service: Arc<dyn BasinService>,
    streams: Arc<dyn StreamService>,
    executor: RetryTimeoutExecutor,
    runtime: Option<Handle>,
}

impl BasinClient {
    /// Client talking gRPC to the endpoint serving `basin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel or credentials cannot be set up.
    pub fn new(config: ClientConfig, basin: &str) -> Result<Self> {
        let channel = connect_lazy(&config.endpoints.basin.target(basin), &config)?;
        Self::with_channel(config, basin, channel)
    }

    fn with_channel(config: ClientConfig, basin: &str, channel: Channel) -> Result<Self> {
        let service = Arc::new(GrpcBasinService::new(channel.clone(), &config, basin)?);
        let streams = Arc::new(GrpcStreamService::new(channel, &config, basin)?);
        Ok(Self::with_services(config, basin, service, streams))
    }

    /// Client over arbitrary transports.
    #[must_use]
    pub fn with_services(
        config: ClientConfig,
        basin: &str,
        service: Arc<dyn BasinService>,
        streams: Arc<dyn StreamService>,
    ) -> Self {
        Self {
            basin: basin.to_owned(),
            executor: RetryTimeoutExecutor::from_config(&config),
            config,
            service,
            streams,
            runtime: None,
        }
    }

    /// Spawn sessions of streams in this basin onto `runtime`.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.basin
    }

    /// # Errors
    ///
    /// Returns the service error once retries are exhausted.
    pub async fn list_streams(&self, request: ListStreamsRequest) -> Result<Page<StreamInfo>> {
        let request: proto::ListStreamsRequest = request.into();
        let request = &request;
        let response = self
            .executor
            .execute("list_streams", move || async move {
                self.service
                    .list_streams(request.clone())
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        Ok(Page {
            items: response.streams.into_iter().map(Into::into).collect(),
            has_more: response.has_more,
        })
    }

    /// List every stream matching `prefix`, following pagination.
    ///
    /// # Errors
    ///
    /// Returns the first page request that fails.
    pub async fn list_all_streams(&self, prefix: &str) -> Result<Vec<StreamInfo>> {
        let mut request = ListStreamsRequest::with_prefix(prefix);
        let mut streams = Vec::new();
        loop {
            let page = self.list_streams(request.clone()).await?;
            streams.extend(page.items);
            match streams.last() {
                Some(last) if page.has_more => request.start_after = last.name.clone(),
                _ => break,
            }
            debug!(basin = %self.basin, fetched = streams.len(), "fetching next stream page");
        }
        Ok(streams)
    }

    /// # Errors
    ///
    /// Returns the service error once retries are exhausted.
    pub async fn create_stream(
        &self,
        stream: &str,
        config: Option<StreamConfig>,
    ) -> Result<StreamInfo> {
        let request = proto::CreateStreamRequest {
            stream: stream.to_owned(),
            config: config.map(Into::into),
        };
        let token = Uuid::new_v4().to_string();
        let token = token.as_str();
        let request = &request;
        let response = self
            .executor
            .execute("create_stream", move || async move {
                self.service
                    .create_stream(request.clone(), token)
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        info!(basin = %self.basin, stream, "stream created");
        response.info.map(Into::into).ok_or_else(|| missing("stream info"))
    }

    /// # Errors
    ///
    /// Returns the service error once retries are exhausted.
    pub async fn delete_stream(&self, stream: &str) -> Result<()> {
        let request = proto::DeleteStreamRequest {
            stream: stream.to_owned(),
        };
        let request = &request;
        self.executor
            .execute("delete_stream", move || async move {
                self.service
                    .delete_stream(request.clone())
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        info!(basin = %self.basin, stream, "stream deletion requested");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the service error once retries are exhausted.
    pub async fn get_stream_config(&self, stream: &str) -> Result<StreamConfig> {
        let request = proto::GetStreamConfigRequest {
            stream: stream.to_owned(),
        };
        let request = &request;
        let response = self
            .executor
            .execute("get_stream_config", move || async move {
                self.service
                    .get_stream_config(request.clone())
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        response.config.map(Into::into).ok_or_else(|| missing("stream config"))
    }

    /// # Errors
    ///
    /// Returns the service error once retries are exhausted.
    pub async fn reconfigure_stream(
        &self,
        stream: &str,
        config: StreamConfig,
        mask: Vec<String>,
    ) -> Result<StreamConfig> {
        let request = proto::ReconfigureStreamRequest {
            stream: stream.to_owned(),
            config: Some(config.into()),
            mask: field_mask(mask),
        };
        let request = &request;
        let response = self
            .executor
            .execute("reconfigure_stream", move || async move {
                self.service
                    .reconfigure_stream(request.clone())
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        response.config.map(Into::into).ok_or_else(|| missing("stream config"))
    }

    #[must_use]
    pub fn stream_client(&self, stream: &str) -> StreamClient {
        StreamClient {
            stream: stream.to_owned(),
            config: self.config.clone(),
            service: Arc::clone(&self.streams),
            executor: self.executor.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

/// Stream-level client: appends, reads and sessions.
#[derive(Clone)]
pub struct StreamClient {
    stream: String,
    config: ClientConfig,
    service: Arc<dyn StreamService>,
    executor: RetryTimeoutExecutor,
    runtime: Option<Handle>,
}

impl StreamClient {
    /// Client over an arbitrary transport.
    #[must_use]
    pub fn with_service(
        config: ClientConfig,
        stream: &str,
        service: Arc<dyn StreamService>,
    ) -> Self {
        Self {
            stream: stream.to_owned(),
            executor: RetryTimeoutExecutor::from_config(&config),
            config,
            service,
            runtime: None,
        }
    }

    /// Spawn this stream's sessions onto `runtime`.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.stream
    }

    /// Position the next appended record will get, and the last timestamp.
    ///
    /// # Errors
    ///
    /// Returns the service error once retries are exhausted.
    pub async fn check_tail(&self) -> Result<StreamPosition> {
        let request = proto::CheckTailRequest {
            stream: self.stream.clone(),
        };
        let request = &request;
        let response = self
            .executor
            .execute("check_tail", move || async move {
                self.service
                    .check_tail(request.clone())
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        Ok(StreamPosition::new(response.next_seq_num, response.last_timestamp))
    }

    /// Read a single batch.
    ///
    /// # Errors
    ///
    /// Returns the service error once retries are exhausted.
    pub async fn read(&self, request: ReadRequest) -> Result<ReadOutput> {
        request.limit.validate_unary()?;
        let request = request.to_proto(&self.stream);
        let request = &request;
        let response = self
            .executor
            .execute("read", move || async move {
                self.service
                    .read(request.clone())
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        let output = response.output.ok_or_else(|| missing("read output"))?;
        ReadOutput::try_from(output).map_err(ClientError::Protocol)
    }

    /// Append a batch. Retried only under [`AppendRetryPolicy::All`].
    ///
    /// # Errors
    ///
    /// Returns the service error, after retries where the policy allows them.
    pub async fn append(&self, input: AppendInput) -> Result<AppendOutput> {
        let request = proto::AppendRequest {
            input: Some(input.to_proto(&self.stream)),
        };
        let executor = match self.config.append_retry_policy {
            AppendRetryPolicy::All => self.executor.clone(),
            AppendRetryPolicy::NoSideEffects => self.executor.without_retries(),
        };
        let request = &request;
        let response = executor
            .execute("append", move || async move {
                self.service
                    .append(request.clone())
                    .await
                    .map_err(ClientError::from)
            })
            .await?;
        response.output.map(Into::into).ok_or_else(|| missing("append output"))
    }

    fn session_context(&self) -> SessionContext {
        SessionContext {
            service: Arc::clone(&self.service),
            stream: self.stream.clone(),
            config: self.config.clone(),
            runtime: self.runtime.clone().unwrap_or_else(Handle::current),
        }
    }

    /// Unmanaged append session reporting acks and failure through callbacks.
    pub fn append_session(
        &self,
        on_response: impl FnMut(AppendOutput) + Send + 'static,
        on_error: impl FnOnce(ClientError) + Send + 'static,
    ) -> AppendSession {
        AppendSession::spawn(self.session_context(), on_response, on_error)
    }

    /// Append session with backpressure, retry and per-submission acks.
    #[must_use]
    pub fn managed_append_session(&self) -> ManagedAppendSession {
        ManagedAppendSession::spawn(self.session_context())
    }

    /// Read session pushing outputs into `on_response`.
    pub fn read_session(
        &self,
        request: ReadSessionRequest,
        on_response: impl FnMut(ReadOutput) -> BoxFuture<'static, ()> + Send + 'static,
        on_error: impl FnOnce(ClientError) + Send + 'static,
    ) -> ReadSession {
        ReadSession::spawn(self.session_context(), request, on_response, on_error)
    }

    /// Read session buffering up to `max_buffered_bytes` for the caller to pull.
    #[must_use]
    pub fn managed_read_session(
        &self,
        request: ReadSessionRequest,
        max_buffered_bytes: u32,
    ) -> ManagedReadSession {
        ManagedReadSession::spawn(self.session_context(), request, max_buffered_bytes)
    }
}
