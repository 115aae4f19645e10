//! Managed read session: pull interface over the bounded buffer.

#![allow(clippy::unwrap_used)]

mod common;

use common::{config, context, MockStream, ReadScript};
use s2_sdk::{ClientError, ManagedReadSession, ReadLimit, ReadOutput, ReadSessionRequest, Start};
use std::time::Duration;
use tonic::{Code, Status};

fn seq_nums(output: &ReadOutput) -> Vec<u64> {
    match output {
        ReadOutput::Batch(batch) => batch.records.iter().map(|r| r.seq_num).collect(),
        _ => Vec::new(),
    }
}

fn spawn(
    mock: &MockStream,
    request: ReadSessionRequest,
    max_buffered_bytes: u32,
) -> ManagedReadSession {
    ManagedReadSession::spawn(context(mock, config()), request, max_buffered_bytes)
}

#[tokio::test]
async fn test_next_yields_batches_in_order_then_ends() {
    let mock = MockStream::new();
    let request = ReadSessionRequest::new(Start::SeqNum(0)).with_limit(ReadLimit::count(25));
    let mut session = spawn(&mock, request, 1024 * 1024);

    let mut seen = Vec::new();
    while let Some(output) = session.next().await {
        seen.extend(seq_nums(&output.unwrap()));
    }
    assert_eq!(seen, (0..25).collect::<Vec<_>>());
    assert!(session.is_closed());
    assert!(session.next().await.is_none());
}

#[tokio::test]
async fn test_error_is_delivered_once_before_the_end() {
    let mock = MockStream::new().with_read_scripts([ReadScript::Serve {
        batch_size: 10,
        batches: 2,
        then: Some(Status::invalid_argument("stream deleted")),
    }]);
    let mut session = spawn(&mock, ReadSessionRequest::new(Start::SeqNum(0)), 1024 * 1024);

    assert_eq!(seq_nums(&session.next().await.unwrap().unwrap()), (0..10).collect::<Vec<_>>());
    assert_eq!(seq_nums(&session.next().await.unwrap().unwrap()), (10..20).collect::<Vec<_>>());

    let err = session.next().await.unwrap().unwrap_err();
    assert_eq!(err.code(), Some(Code::InvalidArgument));
    assert!(session.next().await.is_none());
    assert!(session.next().await.is_none());
}

#[tokio::test]
async fn test_has_next_peeks_without_consuming() {
    let mock = MockStream::new();
    let request = ReadSessionRequest::new(Start::SeqNum(5)).with_limit(ReadLimit::count(10));
    let mut session = spawn(&mock, request, 1024 * 1024);

    assert!(session.has_next().await);
    assert!(session.has_next().await);
    let output = session.get().unwrap().unwrap();
    assert_eq!(seq_nums(&output), (5..15).collect::<Vec<_>>());

    assert!(!session.has_next().await);
    assert!(session.get().is_none());
    assert!(session.is_closed());
}

#[tokio::test]
async fn test_is_closed_without_pulling_the_end() {
    let mock = MockStream::new();
    let request = ReadSessionRequest::new(Start::SeqNum(0)).with_limit(ReadLimit::count(20));
    let mut session = spawn(&mock, request, 1024 * 1024);

    assert_eq!(seq_nums(&session.next().await.unwrap().unwrap()), (0..10).collect::<Vec<_>>());
    assert!(!session.is_closed());
    assert_eq!(seq_nums(&session.next().await.unwrap().unwrap()), (10..20).collect::<Vec<_>>());

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while !session.is_closed() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(closed.is_ok());
    assert!(session.next().await.is_none());
}

#[tokio::test]
async fn test_batches_larger_than_the_buffer_still_flow() {
    let mock = MockStream::new();
    let request = ReadSessionRequest::new(Start::SeqNum(0)).with_limit(ReadLimit::count(30));
    let mut session = spawn(&mock, request, 1);

    let mut seen = Vec::new();
    while let Some(output) = session.next().await {
        seen.extend(seq_nums(&output.unwrap()));
    }
    assert_eq!(seen.len(), 30);
}

#[tokio::test(start_paused = true)]
async fn test_get_timeout_returns_none_while_idle() {
    let mock = MockStream::new().with_read_scripts([ReadScript::Silent]);
    let mut session = spawn(&mock, ReadSessionRequest::new(Start::SeqNum(0)), 1024);

    assert!(session.get().is_none());
    assert!(session.get_timeout(Duration::from_secs(5)).await.is_none());
    assert!(!session.is_closed());

    session.close().await.unwrap();
    assert!(session.next().await.is_none());
    assert!(session.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_retried_failures_are_invisible_to_the_consumer() {
    let mock = MockStream::new().with_read_scripts([ReadScript::Serve {
        batch_size: 10,
        batches: 1,
        then: Some(Status::unavailable("node restarting")),
    }]);
    let request = ReadSessionRequest::new(Start::SeqNum(0)).with_limit(ReadLimit::count(20));
    let mut session = spawn(&mock, request, 1024 * 1024);

    let mut outputs = Vec::new();
    while let Some(output) = session.next().await {
        outputs.push(output);
    }
    assert!(outputs.iter().all(Result::is_ok));
    let seen: Vec<u64> = outputs.iter().flat_map(|o| seq_nums(o.as_ref().unwrap())).collect();
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
    assert!(!outputs.iter().any(|o| matches!(o, Err(ClientError::Service(_)))));
}
