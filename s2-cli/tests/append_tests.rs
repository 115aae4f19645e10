#![allow(missing_docs)]
use futures::StreamExt;
use s2_cli::cli::stream::append;
use s2_cli::config::CliConfig;
use s2_sdk::proto;
use s2_sdk::transport::{ResponseStream, StreamService};
use s2_sdk::types::MAX_BATCH_RECORDS;
use s2_sdk::StreamClient;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use tonic::Status;

/// Append sessions that sequence every input, or reject every input with
/// `reject`.
#[derive(Clone, Default)]
struct Sequencer {
    tail: Arc<AtomicU64>,
    reject: Option<Status>,
}

#[tonic::async_trait]
impl StreamService for Sequencer {
    async fn check_tail(
        &self,
        _request: proto::CheckTailRequest,
    ) -> Result<proto::CheckTailResponse, Status> {
        Err(Status::unimplemented("check_tail"))
    }

    async fn append(
        &self,
        _request: proto::AppendRequest,
    ) -> Result<proto::AppendResponse, Status> {
        Err(Status::unimplemented("append"))
    }

    async fn append_session(
        &self,
        requests: ReceiverStream<proto::AppendSessionRequest>,
    ) -> Result<ResponseStream<proto::AppendSessionResponse>, Status> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sequencer = self.clone();
        tokio::spawn(async move {
            let mut requests = requests;
            while let Some(request) = requests.next().await {
                let Some(input) = request.input else { continue };
                if let Some(status) = &sequencer.reject {
                    let _ = tx.send(Err(status.clone()));
                    return;
                }
                let count = input.records.len() as u64;
                let start = sequencer.tail.fetch_add(count, Ordering::SeqCst);
                let end = start + count;
                let output = proto::AppendOutput {
                    start_seq_num: start,
                    start_timestamp: start,
                    end_seq_num: end,
                    end_timestamp: end,
                    next_seq_num: end,
                    last_timestamp: end,
                };
                if tx.send(Ok(proto::AppendSessionResponse::new(output))).is_err() {
                    return;
                }
            }
        });
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn read(&self, _request: proto::ReadRequest) -> Result<proto::ReadResponse, Status> {
        Err(Status::unimplemented("read"))
    }

    async fn read_session(
        &self,
        _request: proto::ReadSessionRequest,
    ) -> Result<ResponseStream<proto::ReadSessionResponse>, Status> {
        Err(Status::unimplemented("read_session"))
    }
}

fn client(service: &Sequencer) -> (StreamClient, CliConfig) {
    let settings = CliConfig::default();
    let config = settings.client_config(Some("test-token")).expect("client config");
    let client = StreamClient::with_service(config, "logs", Arc::new(service.clone()));
    (client, settings)
}

fn lines(count: usize) -> Vec<u8> {
    (0..count)
        .map(|i| format!("line-{i}\n"))
        .collect::<String>()
        .into_bytes()
}

#[tokio::test]
async fn appends_every_line_across_many_batches() {
    let service = Sequencer::default();
    let (client, settings) = client(&service);
    // More batches than acks allowed to be pending at once.
    let total = MAX_BATCH_RECORDS * 70 + 3;

    append(&client, &settings, lines(total).as_slice(), None, None)
        .await
        .expect("append");

    assert_eq!(service.tail.load(Ordering::SeqCst), total as u64);
}

#[tokio::test]
async fn empty_input_appends_nothing() {
    let service = Sequencer::default();
    let (client, settings) = client(&service);

    append(&client, &settings, &b""[..], None, None)
        .await
        .expect("append");

    assert_eq!(service.tail.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejected_append_reports_the_service_error() {
    let service = Sequencer {
        reject: Some(Status::failed_precondition("fencing token mismatch")),
        ..Sequencer::default()
    };
    let (client, settings) = client(&service);

    let err = append(
        &client,
        &settings,
        lines(MAX_BATCH_RECORDS * 3).as_slice(),
        Some("writer-1".to_string()),
        None,
    )
    .await
    .expect_err("append should fail");

    assert!(
        format!("{err:#}").contains("fencing token mismatch"),
        "unexpected error: {err:#}"
    );
    assert_eq!(service.tail.load(Ordering::SeqCst), 0);
}
