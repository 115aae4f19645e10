//! Build script for generating the S2 gRPC client stubs.
//!
//! Message types are declared directly in `src/lib.rs` with prost derives, so
//! only the service clients are generated here. The manual builder keeps the
//! build free of a `protoc` dependency.

use tonic_build::manual::{Builder, Method, Service};

const PACKAGE: &str = "s2.v1alpha";
const CODEC: &str = "tonic::codec::ProstCodec";

struct Rpc {
    name: &'static str,
    route: &'static str,
    input: &'static str,
    output: &'static str,
    client_streaming: bool,
    server_streaming: bool,
}

const fn unary(
    name: &'static str,
    route: &'static str,
    input: &'static str,
    output: &'static str,
) -> Rpc {
    Rpc {
        name,
        route,
        input,
        output,
        client_streaming: false,
        server_streaming: false,
    }
}

fn service(name: &str, rpcs: &[Rpc]) -> Service {
    let mut builder = Service::builder().name(name).package(PACKAGE);
    for rpc in rpcs {
        let mut method = Method::builder()
            .name(rpc.name)
            .route_name(rpc.route)
            .input_type(rpc.input)
            .output_type(rpc.output)
            .codec_path(CODEC);
        if rpc.client_streaming {
            method = method.client_streaming();
        }
        if rpc.server_streaming {
            method = method.server_streaming();
        }
        builder = builder.method(method.build());
    }
    builder.build()
}

fn main() {
    let account = service(
        "AccountService",
        &[
            unary(
                "list_basins",
                "ListBasins",
                "crate::ListBasinsRequest",
                "crate::ListBasinsResponse",
            ),
            unary(
                "create_basin",
                "CreateBasin",
                "crate::CreateBasinRequest",
                "crate::CreateBasinResponse",
            ),
            unary(
                "delete_basin",
                "DeleteBasin",
                "crate::DeleteBasinRequest",
                "crate::DeleteBasinResponse",
            ),
            unary(
                "reconfigure_basin",
                "ReconfigureBasin",
                "crate::ReconfigureBasinRequest",
                "crate::ReconfigureBasinResponse",
            ),
            unary(
                "get_basin_config",
                "GetBasinConfig",
                "crate::GetBasinConfigRequest",
                "crate::GetBasinConfigResponse",
            ),
        ],
    );

    let basin = service(
        "BasinService",
        &[
            unary(
                "list_streams",
                "ListStreams",
                "crate::ListStreamsRequest",
                "crate::ListStreamsResponse",
            ),
            unary(
                "create_stream",
                "CreateStream",
                "crate::CreateStreamRequest",
                "crate::CreateStreamResponse",
            ),
            unary(
                "delete_stream",
                "DeleteStream",
                "crate::DeleteStreamRequest",
                "crate::DeleteStreamResponse",
            ),
            unary(
                "get_stream_config",
                "GetStreamConfig",
                "crate::GetStreamConfigRequest",
                "crate::GetStreamConfigResponse",
            ),
            unary(
                "reconfigure_stream",
                "ReconfigureStream",
                "crate::ReconfigureStreamRequest",
                "crate::ReconfigureStreamResponse",
            ),
        ],
    );

    let stream = service(
        "StreamService",
        &[
            unary(
                "check_tail",
                "CheckTail",
                "crate::CheckTailRequest",
                "crate::CheckTailResponse",
            ),
            unary(
                "append",
                "Append",
                "crate::AppendRequest",
                "crate::AppendResponse",
            ),
            Rpc {
                client_streaming: true,
                server_streaming: true,
                ..unary(
                    "append_session",
                    "AppendSession",
                    "crate::AppendSessionRequest",
                    "crate::AppendSessionResponse",
                )
            },
            unary("read", "Read", "crate::ReadRequest", "crate::ReadResponse"),
            Rpc {
                server_streaming: true,
                ..unary(
                    "read_session",
                    "ReadSession",
                    "crate::ReadSessionRequest",
                    "crate::ReadSessionResponse",
                )
            },
        ],
    );

    Builder::new()
        .build_server(false)
        .compile(&[account, basin, stream]);
}
