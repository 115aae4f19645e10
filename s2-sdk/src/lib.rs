//! Client SDK for the S2 stream store.
//!
//! [`Client`] manages basins, [`BasinClient`] manages streams and
//! [`StreamClient`] appends to and reads from one stream, either with single
//! calls or through the sessions in [`session`]:
//!
//! - [`AppendSession`]: ordered streaming appends with callbacks, no retry
//! - [`ManagedAppendSession`]: byte-budgeted appends with per-submission acks
//!   and transparent retransmission after transient failures
//! - [`ReadSession`]: streaming reads that resume from the last delivered
//!   record, with optional heartbeat liveness
//! - [`ManagedReadSession`]: a pull interface over a byte-bounded buffer

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo
)]
#![deny(clippy::unwrap_in_result, clippy::panic_in_result_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod session;
pub mod transport;
pub mod types;

pub use client::{BasinClient, Client, StreamClient};
pub use config::{AppendRetryPolicy, ClientConfig, ClientConfigBuilder, Endpoints};
pub use error::{ClientError, Result, ValidationError};
pub use retry::{ExponentialBackoff, FixedDelay, RetryBackoff, RetryTimeoutExecutor};
pub use session::{
    AppendAck, AppendSession, ManagedAppendSession, ManagedReadSession, ReadSession,
    SessionContext,
};
pub use types::{
    AppendInput, AppendOutput, AppendRecord, Header, ReadLimit, ReadOutput, ReadRequest,
    ReadSessionRequest, SequencedRecord, SequencedRecordBatch, Start, StreamPosition,
};

/// Wire types, for implementing [`transport`] traits outside this crate.
pub use s2_proto as proto;
