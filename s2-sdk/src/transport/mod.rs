//! Transport seam between the SDK and the wire.
//!
//! Clients and sessions talk to the service only through these traits, so
//! tests can substitute in-memory implementations for the gRPC ones.

mod grpc;

pub use grpc::{
    connect_lazy, BearerInterceptor, GrpcAccountService, GrpcBasinService, GrpcStreamService,
};

use futures::Stream;
use s2_proto as proto;
use std::pin::Pin;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;

/// Server-to-client half of a streaming call.
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Account-scoped operations.
#[tonic::async_trait]
pub trait AccountService: Send + Sync + 'static {
    async fn list_basins(
        &self,
        request: proto::ListBasinsRequest,
    ) -> Result<proto::ListBasinsResponse, Status>;

    /// `request_token` makes retries of the same creation idempotent.
    async fn create_basin(
        &self,
        request: proto::CreateBasinRequest,
        request_token: &str,
    ) -> Result<proto::CreateBasinResponse, Status>;

    async fn delete_basin(
        &self,
        request: proto::DeleteBasinRequest,
    ) -> Result<proto::DeleteBasinResponse, Status>;

    async fn get_basin_config(
        &self,
        request: proto::GetBasinConfigRequest,
    ) -> Result<proto::GetBasinConfigResponse, Status>;

    async fn reconfigure_basin(
        &self,
        request: proto::ReconfigureBasinRequest,
    ) -> Result<proto::ReconfigureBasinResponse, Status>;
}

/// Basin-scoped operations.
#[tonic::async_trait]
pub trait BasinService: Send + Sync + 'static {
    async fn list_streams(
        &self,
        request: proto::ListStreamsRequest,
    ) -> Result<proto::ListStreamsResponse, Status>;

    async fn create_stream(
        &self,
        request: proto::CreateStreamRequest,
        request_token: &str,
    ) -> Result<proto::CreateStreamResponse, Status>;

    async fn delete_stream(
        &self,
        request: proto::DeleteStreamRequest,
    ) -> Result<proto::DeleteStreamResponse, Status>;

    async fn get_stream_config(
        &self,
        request: proto::GetStreamConfigRequest,
    ) -> Result<proto::GetStreamConfigResponse, Status>;

    async fn reconfigure_stream(
        &self,
        request: proto::ReconfigureStreamRequest,
    ) -> Result<proto::ReconfigureStreamResponse, Status>;
}

/// Stream data-plane operations.
#[tonic::async_trait]
pub trait StreamService: Send + Sync + 'static {
    async fn check_tail(
        &self,
        request: proto::CheckTailRequest,
    ) -> Result<proto::CheckTailResponse, Status>;

    async fn append(&self, request: proto::AppendRequest)
        -> Result<proto::AppendResponse, Status>;

    /// Open a bidirectional append stream. Dropping the sender behind
    /// `requests` half-closes the call.
    async fn append_session(
        &self,
        requests: ReceiverStream<proto::AppendSessionRequest>,
    ) -> Result<ResponseStream<proto::AppendSessionResponse>, Status>;

    async fn read(&self, request: proto::ReadRequest) -> Result<proto::ReadResponse, Status>;

    async fn read_session(
        &self,
        request: proto::ReadSessionRequest,
    ) -> Result<ResponseStream<proto::ReadSessionResponse>, Status>;
}
