//! Protocol buffer definitions for the S2 stream store (`s2.v1alpha`).
//!
//! Messages are declared with prost derives and mirror the service's wire
//! schema field for field. The gRPC client stubs for `AccountService`,
//! `BasinService` and `StreamService` are generated by the build script.

#![allow(clippy::derive_partial_eq_without_eq)]

use prost::bytes::Bytes;

include!(concat!(env!("OUT_DIR"), "/s2.v1alpha.AccountService.rs"));
include!(concat!(env!("OUT_DIR"), "/s2.v1alpha.BasinService.rs"));
include!(concat!(env!("OUT_DIR"), "/s2.v1alpha.StreamService.rs"));

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A name/value header attached to a record.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    #[prost(bytes = "bytes", tag = "1")]
    pub name: ::prost::bytes::Bytes,
    #[prost(bytes = "bytes", tag = "2")]
    pub value: ::prost::bytes::Bytes,
}

/// Record to be appended to a stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendRecord {
    #[prost(message, repeated, tag = "1")]
    pub headers: ::prost::alloc::vec::Vec<Header>,
    #[prost(bytes = "bytes", tag = "2")]
    pub body: ::prost::bytes::Bytes,
}

/// Record read from a stream, with the position assigned on append.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SequencedRecord {
    #[prost(uint64, tag = "1")]
    pub seq_num: u64,
    #[prost(uint64, tag = "2")]
    pub timestamp: u64,
    #[prost(message, repeated, tag = "3")]
    pub headers: ::prost::alloc::vec::Vec<Header>,
    #[prost(bytes = "bytes", tag = "4")]
    pub body: ::prost::bytes::Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SequencedRecordBatch {
    #[prost(message, repeated, tag = "1")]
    pub records: ::prost::alloc::vec::Vec<SequencedRecord>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamPosition {
    #[prost(uint64, tag = "1")]
    pub seq_num: u64,
    #[prost(uint64, tag = "2")]
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Append
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendInput {
    #[prost(string, tag = "1")]
    pub stream: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub records: ::prost::alloc::vec::Vec<AppendRecord>,
    /// Enforce that the sequence number issued to the first record matches.
    #[prost(uint64, optional, tag = "3")]
    pub match_seq_num: ::core::option::Option<u64>,
    /// Enforce a fencing token which must have been set with a command record.
    #[prost(string, optional, tag = "4")]
    pub fencing_token: ::core::option::Option<::prost::alloc::string::String>,
}

/// Acknowledgement of an append. `end_seq_num` is exclusive.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendOutput {
    #[prost(uint64, tag = "1")]
    pub start_seq_num: u64,
    #[prost(uint64, tag = "2")]
    pub start_timestamp: u64,
    #[prost(uint64, tag = "3")]
    pub end_seq_num: u64,
    #[prost(uint64, tag = "4")]
    pub end_timestamp: u64,
    #[prost(uint64, tag = "5")]
    pub next_seq_num: u64,
    #[prost(uint64, tag = "6")]
    pub last_timestamp: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendRequest {
    #[prost(message, optional, tag = "1")]
    pub input: ::core::option::Option<AppendInput>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendResponse {
    #[prost(message, optional, tag = "1")]
    pub output: ::core::option::Option<AppendOutput>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendSessionRequest {
    #[prost(message, optional, tag = "1")]
    pub input: ::core::option::Option<AppendInput>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendSessionResponse {
    #[prost(message, optional, tag = "1")]
    pub output: ::core::option::Option<AppendOutput>,
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadOutput {
    #[prost(oneof = "read_output::Output", tags = "1, 2, 3")]
    pub output: ::core::option::Option<read_output::Output>,
}

/// Nested message and enum types in `ReadOutput`.
pub mod read_output {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Output {
        /// Batch of records in sequence order.
        #[prost(message, tag = "1")]
        Batch(super::SequencedRecordBatch),
        /// The requested start is before the first retained record.
        #[prost(message, tag = "2")]
        FirstSeqNum(super::StreamPosition),
        /// The requested start is beyond the tail.
        #[prost(message, tag = "3")]
        NextSeqNum(super::StreamPosition),
    }
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ReadLimit {
    #[prost(uint64, optional, tag = "1")]
    pub count: ::core::option::Option<u64>,
    #[prost(uint64, optional, tag = "2")]
    pub bytes: ::core::option::Option<u64>,
}

/// Where a read begins. Shared by unary and session reads.
pub mod read_start {
    #[derive(Clone, Copy, PartialEq, ::prost::Oneof)]
    pub enum Start {
        #[prost(uint64, tag = "2")]
        SeqNum(u64),
        #[prost(uint64, tag = "3")]
        Timestamp(u64),
        #[prost(uint64, tag = "4")]
        TailOffset(u64),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadRequest {
    #[prost(string, tag = "1")]
    pub stream: ::prost::alloc::string::String,
    #[prost(oneof = "read_start::Start", tags = "2, 3, 4")]
    pub start: ::core::option::Option<read_start::Start>,
    #[prost(message, optional, tag = "5")]
    pub limit: ::core::option::Option<ReadLimit>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadResponse {
    #[prost(message, optional, tag = "1")]
    pub output: ::core::option::Option<ReadOutput>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadSessionRequest {
    #[prost(string, tag = "1")]
    pub stream: ::prost::alloc::string::String,
    #[prost(oneof = "read_start::Start", tags = "2, 3, 4")]
    pub start: ::core::option::Option<read_start::Start>,
    #[prost(message, optional, tag = "5")]
    pub limit: ::core::option::Option<ReadLimit>,
    /// Ask the service to send empty responses while the session is idle.
    #[prost(bool, tag = "6")]
    pub heartbeats: bool,
}

/// A response without `output` is a heartbeat.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadSessionResponse {
    #[prost(message, optional, tag = "1")]
    pub output: ::core::option::Option<ReadOutput>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckTailRequest {
    #[prost(string, tag = "1")]
    pub stream: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckTailResponse {
    #[prost(uint64, tag = "1")]
    pub next_seq_num: u64,
    #[prost(uint64, tag = "2")]
    pub last_timestamp: u64,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum StorageClass {
    Unspecified = 0,
    Standard = 1,
    Express = 2,
}

impl StorageClass {
    /// String value of the enum field names used in the ProtoBuf definition.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Self::Unspecified => "STORAGE_CLASS_UNSPECIFIED",
            Self::Standard => "STORAGE_CLASS_STANDARD",
            Self::Express => "STORAGE_CLASS_EXPRESS",
        }
    }
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct StreamConfig {
    #[prost(enumeration = "StorageClass", tag = "1")]
    pub storage_class: i32,
    #[prost(oneof = "stream_config::RetentionPolicy", tags = "2")]
    pub retention_policy: ::core::option::Option<stream_config::RetentionPolicy>,
}

/// Nested message and enum types in `StreamConfig`.
pub mod stream_config {
    #[derive(Clone, Copy, PartialEq, ::prost::Oneof)]
    pub enum RetentionPolicy {
        /// Age in seconds after which records are trimmed.
        #[prost(uint64, tag = "2")]
        Age(u64),
    }
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct BasinConfig {
    #[prost(message, optional, tag = "1")]
    pub default_stream_config: ::core::option::Option<StreamConfig>,
    #[prost(bool, tag = "2")]
    pub create_stream_on_append: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BasinState {
    Unspecified = 0,
    Active = 1,
    Creating = 2,
    Deleting = 3,
}

impl BasinState {
    /// String value of the enum field names used in the ProtoBuf definition.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Self::Unspecified => "BASIN_STATE_UNSPECIFIED",
            Self::Active => "BASIN_STATE_ACTIVE",
            Self::Creating => "BASIN_STATE_CREATING",
            Self::Deleting => "BASIN_STATE_DELETING",
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BasinInfo {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(enumeration = "BasinState", tag = "2")]
    pub state: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamInfo {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// Creation time in seconds since the Unix epoch.
    #[prost(uint32, tag = "2")]
    pub created_at: u32,
    #[prost(uint32, optional, tag = "3")]
    pub deleted_at: ::core::option::Option<u32>,
}

// ---------------------------------------------------------------------------
// Account service
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListBasinsRequest {
    #[prost(string, tag = "1")]
    pub prefix: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub start_after: ::prost::alloc::string::String,
    #[prost(uint64, optional, tag = "3")]
    pub limit: ::core::option::Option<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListBasinsResponse {
    #[prost(message, repeated, tag = "1")]
    pub basins: ::prost::alloc::vec::Vec<BasinInfo>,
    #[prost(bool, tag = "2")]
    pub has_more: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateBasinRequest {
    #[prost(string, tag = "1")]
    pub basin: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<BasinConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateBasinResponse {
    #[prost(message, optional, tag = "1")]
    pub info: ::core::option::Option<BasinInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteBasinRequest {
    #[prost(string, tag = "1")]
    pub basin: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct DeleteBasinResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetBasinConfigRequest {
    #[prost(string, tag = "1")]
    pub basin: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct GetBasinConfigResponse {
    #[prost(message, optional, tag = "1")]
    pub config: ::core::option::Option<BasinConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReconfigureBasinRequest {
    #[prost(string, tag = "1")]
    pub basin: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<BasinConfig>,
    /// Paths of `config` to apply; unlisted fields are left untouched.
    #[prost(message, optional, tag = "3")]
    pub mask: ::core::option::Option<::prost_types::FieldMask>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ReconfigureBasinResponse {
    #[prost(message, optional, tag = "1")]
    pub config: ::core::option::Option<BasinConfig>,
}

// ---------------------------------------------------------------------------
// Basin service
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListStreamsRequest {
    #[prost(string, tag = "1")]
    pub prefix: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub start_after: ::prost::alloc::string::String,
    #[prost(uint64, optional, tag = "3")]
    pub limit: ::core::option::Option<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListStreamsResponse {
    #[prost(message, repeated, tag = "1")]
    pub streams: ::prost::alloc::vec::Vec<StreamInfo>,
    #[prost(bool, tag = "2")]
    pub has_more: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateStreamRequest {
    #[prost(string, tag = "1")]
    pub stream: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<StreamConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateStreamResponse {
    #[prost(message, optional, tag = "1")]
    pub info: ::core::option::Option<StreamInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteStreamRequest {
    #[prost(string, tag = "1")]
    pub stream: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct DeleteStreamResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetStreamConfigRequest {
    #[prost(string, tag = "1")]
    pub stream: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct GetStreamConfigResponse {
    #[prost(message, optional, tag = "1")]
    pub config: ::core::option::Option<StreamConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReconfigureStreamRequest {
    #[prost(string, tag = "1")]
    pub stream: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<StreamConfig>,
    #[prost(message, optional, tag = "3")]
    pub mask: ::core::option::Option<::prost_types::FieldMask>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ReconfigureStreamResponse {
    #[prost(message, optional, tag = "1")]
    pub config: ::core::option::Option<StreamConfig>,
}

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

impl Header {
    /// Create a header from anything convertible into bytes
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl AppendRecord {
    /// Create a header-less record
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Attach a header
    pub fn with_header(mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }
}

impl StreamPosition {
    pub const fn new(seq_num: u64, timestamp: u64) -> Self {
        Self { seq_num, timestamp }
    }
}

impl AppendSessionRequest {
    pub fn new(input: AppendInput) -> Self {
        Self { input: Some(input) }
    }
}

impl AppendSessionResponse {
    pub fn new(output: AppendOutput) -> Self {
        Self {
            output: Some(output),
        }
    }
}

impl ReadOutput {
    /// Wrap a batch of records
    pub fn batch(records: Vec<SequencedRecord>) -> Self {
        Self {
            output: Some(read_output::Output::Batch(SequencedRecordBatch { records })),
        }
    }
}

impl ReadSessionResponse {
    /// An empty response sent while the session is idle
    pub fn heartbeat() -> Self {
        Self { output: None }
    }

    /// Response carrying `output`
    pub fn with_output(output: ReadOutput) -> Self {
        Self {
            output: Some(output),
        }
    }

    /// Whether this response only proves liveness
    pub fn is_heartbeat(&self) -> bool {
        self.output.is_none()
    }
}
