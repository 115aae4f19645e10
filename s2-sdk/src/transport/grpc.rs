//! gRPC implementations of the transport traits.

use super::{AccountService, BasinService, ResponseStream, StreamService};
use crate::config::ClientConfig;
use crate::error::ClientError;
use s2_proto as proto;
use s2_proto::account_service_client::AccountServiceClient;
use s2_proto::basin_service_client::BasinServiceClient;
use s2_proto::stream_service_client::StreamServiceClient;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::CompressionEncoding;
use tonic::metadata::{AsciiMetadataValue, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};
use tracing::debug;

const AUTHORIZATION: &str = "authorization";
const BASIN_HEADER: &str = "s2-basin";
const REQUEST_TOKEN_HEADER: &str = "s2-request-token";

/// Build a TLS channel to `target` (`host:port`) that connects on first use.
///
/// # Errors
///
/// Returns [`ClientError::Transport`] if the target or user agent is not a
/// valid URI component, or TLS cannot be configured.
pub fn connect_lazy(target: &str, config: &ClientConfig) -> Result<Channel, ClientError> {
    debug!(target, "creating channel");
    let endpoint = Endpoint::from_shared(format!("https://{target}"))?
        .user_agent(config.user_agent.clone())?
        .connect_timeout(config.request_timeout)
        .tcp_nodelay(true)
        .http2_adaptive_window(true)
        .tls_config(ClientTlsConfig::new().with_native_roots())?;
    Ok(endpoint.connect_lazy())
}

/// Attaches the bearer token, and the basin name for basin-scoped calls.
#[derive(Clone)]
pub struct BearerInterceptor {
    authorization: AsciiMetadataValue,
    basin: Option<AsciiMetadataValue>,
}

impl BearerInterceptor {
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] if the token or basin contains
    /// characters not allowed in a header.
    pub fn new(token: &str, basin: Option<&str>) -> Result<Self, ClientError> {
        let authorization = format!("Bearer {token}")
            .parse()
            .map_err(|_| ClientError::InvalidConfig("token is not a valid header value".into()))?;
        let basin = basin
            .map(|b| {
                b.parse().map_err(|_| {
                    ClientError::InvalidConfig(format!("basin '{b}' is not a valid header value"))
                })
            })
            .transpose()?;
        Ok(Self {
            authorization,
            basin,
        })
    }
}

impl Interceptor for BearerInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let metadata = request.metadata_mut();
        metadata.insert(AUTHORIZATION, self.authorization.clone());
        if let Some(basin) = &self.basin {
            metadata.insert(BASIN_HEADER, basin.clone());
        }
        Ok(request)
    }
}

type Intercepted = InterceptedService<Channel, BearerInterceptor>;

fn with_request_token<T>(message: T, token: &str) -> Result<Request<T>, Status> {
    let mut request = Request::new(message);
    let value: AsciiMetadataValue = MetadataValue::try_from(token)
        .map_err(|_| Status::invalid_argument("request token is not a valid header value"))?;
    request.metadata_mut().insert(REQUEST_TOKEN_HEADER, value);
    Ok(request)
}

macro_rules! compressed {
    ($client:expr, $enabled:expr) => {{
        let client = $client;
        if $enabled {
            client
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip)
        } else {
            client
        }
    }};
}

#[derive(Clone)]
pub struct GrpcAccountService {
    client: AccountServiceClient<Intercepted>,
}

impl GrpcAccountService {
    /// # Errors
    ///
    /// See [`BearerInterceptor::new`].
    pub fn new(channel: Channel, config: &ClientConfig) -> Result<Self, ClientError> {
        let interceptor = BearerInterceptor::new(&config.token, None)?;
        let client = compressed!(
            AccountServiceClient::with_interceptor(channel, interceptor),
            config.compression
        );
        Ok(Self { client })
    }
}

#[tonic::async_trait]
impl AccountService for GrpcAccountService {
    async fn list_basins(
        &self,
        request: proto::ListBasinsRequest,
    ) -> Result<proto::ListBasinsResponse, Status> {
        Ok(self.client.clone().list_basins(request).await?.into_inner())
    }

    async fn create_basin(
        &self,
        request: proto::CreateBasinRequest,
        request_token: &str,
    ) -> Result<proto::CreateBasinResponse, Status> {
        let request = with_request_token(request, request_token)?;
        Ok(self.client.clone().create_basin(request).await?.into_inner())
    }

    async fn delete_basin(
        &self,
        request: proto::DeleteBasinRequest,
    ) -> Result<proto::DeleteBasinResponse, Status> {
        Ok(self.client.clone().delete_basin(request).await?.into_inner())
    }

    async fn get_basin_config(
        &self,
        request: proto::GetBasinConfigRequest,
    ) -> Result<proto::GetBasinConfigResponse, Status> {
        Ok(self.client.clone().get_basin_config(request).await?.into_inner())
    }

    async fn reconfigure_basin(
        &self,
        request: proto::ReconfigureBasinRequest,
    ) -> Result<proto::ReconfigureBasinResponse, Status> {
        Ok(self.client.clone().reconfigure_basin(request).await?.into_inner())
    }
}

#[derive(Clone)]
pub struct GrpcBasinService {
    client: BasinServiceClient<Intercepted>,
}

impl GrpcBasinService {
    /// # Errors
    ///
    /// See [`BearerInterceptor::new`].
    pub fn new(channel: Channel, config: &ClientConfig, basin: &str) -> Result<Self, ClientError> {
        let interceptor = BearerInterceptor::new(&config.token, Some(basin))?;
        let client = compressed!(
            BasinServiceClient::with_interceptor(channel, interceptor),
            config.compression
        );
        Ok(Self { client })
    }
}

#[tonic::async_trait]
impl BasinService for GrpcBasinService {
    async fn list_streams(
        &self,
        request: proto::ListStreamsRequest,
    ) -> Result<proto::ListStreamsResponse, Status> {
        Ok(self.client.clone().list_streams(request).await?.into_inner())
    }

    async fn create_stream(
        &self,
        request: proto::CreateStreamRequest,
        request_token: &str,
    ) -> Result<proto::CreateStreamResponse, Status> {
        let request = with_request_token(request, request_token)?;
        Ok(self.client.clone().create_stream(request).await?.into_inner())
    }

    async fn delete_stream(
        &self,
        request: proto::DeleteStreamRequest,
    ) -> Result<proto::DeleteStreamResponse, Status> {
        Ok(self.client.clone().delete_stream(request).await?.into_inner())
    }

    async fn get_stream_config(
        &self,
        request: proto::GetStreamConfigRequest,
    ) -> Result<proto::GetStreamConfigResponse, Status> {
        Ok(self.client.clone().get_stream_config(request).await?.into_inner())
    }

    async fn reconfigure_stream(
        &self,
        request: proto::ReconfigureStreamRequest,
    ) -> Result<proto::ReconfigureStreamResponse, Status> {
        Ok(self.client.clone().reconfigure_stream(request).await?.into_inner())
    }
}

#[derive(Clone)]
pub struct GrpcStreamService {
    client: StreamServiceClient<Intercepted>,
}

impl GrpcStreamService {
    /// # Errors
    ///
    /// See [`BearerInterceptor::new`].
    pub fn new(channel: Channel, config: &ClientConfig, basin: &str) -> Result<Self, ClientError> {
        let interceptor = BearerInterceptor::new(&config.token, Some(basin))?;
        let client = compressed!(
            StreamServiceClient::with_interceptor(channel, interceptor),
            config.compression
        );
        Ok(Self { client })
    }
}

#[tonic::async_trait]
impl StreamService for GrpcStreamService {
    async fn check_tail(
        &self,
        request: proto::CheckTailRequest,
    ) -> Result<proto::CheckTailResponse, Status> {
        Ok(self.client.clone().check_tail(request).await?.into_inner())
    }

    async fn append(
        &self,
        request: proto::AppendRequest,
    ) -> Result<proto::AppendResponse, Status> {
        Ok(self.client.clone().append(request).await?.into_inner())
    }

    async fn append_session(
        &self,
        requests: ReceiverStream<proto::AppendSessionRequest>,
    ) -> Result<ResponseStream<proto::AppendSessionResponse>, Status> {
        let responses = self.client.clone().append_session(requests).await?;
        Ok(Box::pin(responses.into_inner()))
    }

    async fn read(&self, request: proto::ReadRequest) -> Result<proto::ReadResponse, Status> {
        Ok(self.client.clone().read(request).await?.into_inner())
    }

    async fn read_session(
        &self,
        request: proto::ReadSessionRequest,
    ) -> Result<ResponseStream<proto::ReadSessionResponse>, Status> {
        let responses = self.client.clone().read_session(request).await?;
        Ok(Box::pin(responses.into_inner()))
    }
}
