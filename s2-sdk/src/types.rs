//! Data model shared by clients and sessions.
//!
//! Value objects are immutable once built. Builders validate the service's
//! limits up front so a malformed request never reaches the wire.

use crate::error::ValidationError;
use bytes::Bytes;
use s2_proto as proto;
use std::time::Duration;

/// Maximum metered size of a single record or append batch.
pub const MAX_BATCH_BYTES: u64 = 1024 * 1024;

/// Maximum number of records in one append or unary read.
pub const MAX_BATCH_RECORDS: usize = 1000;

/// Maximum length of a fencing token in bytes.
pub const MAX_FENCING_TOKEN_BYTES: usize = 36;

fn metered_size(headers: &[Header], body: &Bytes) -> u64 {
    let header_bytes: usize = headers.iter().map(|h| h.name.len() + h.value.len()).sum();
    (8 + 2 * headers.len() + header_bytes + body.len()) as u64
}

// ============================================================================
// Positions and records
// ============================================================================

/// Position of a record in a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamPosition {
    pub seq_num: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl StreamPosition {
    #[must_use]
    pub const fn new(seq_num: u64, timestamp: u64) -> Self {
        Self { seq_num, timestamp }
    }
}

impl From<proto::StreamPosition> for StreamPosition {
    fn from(p: proto::StreamPosition) -> Self {
        Self::new(p.seq_num, p.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: Bytes,
    pub value: Bytes,
}

impl Header {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl From<Header> for proto::Header {
    fn from(h: Header) -> Self {
        Self {
            name: h.name,
            value: h.value,
        }
    }
}

impl From<proto::Header> for Header {
    fn from(h: proto::Header) -> Self {
        Self {
            name: h.name,
            value: h.value,
        }
    }
}

/// A record to append. Metered size never exceeds [`MAX_BATCH_BYTES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRecord {
    headers: Vec<Header>,
    body: Bytes,
    metered_bytes: u64,
}

impl AppendRecord {
    /// Record with a body and no headers.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TooLarge`] if the record would exceed 1 MiB.
    pub fn new(body: impl Into<Bytes>) -> Result<Self, ValidationError> {
        Self::with_headers(Vec::new(), body)
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::TooLarge`] if the record would exceed 1 MiB.
    pub fn with_headers(
        headers: Vec<Header>,
        body: impl Into<Bytes>,
    ) -> Result<Self, ValidationError> {
        let body = body.into();
        let metered_bytes = metered_size(&headers, &body);
        if metered_bytes > MAX_BATCH_BYTES {
            return Err(ValidationError::TooLarge {
                what: "record",
                size: metered_bytes,
                max: MAX_BATCH_BYTES,
            });
        }
        Ok(Self {
            headers,
            body,
            metered_bytes,
        })
    }

    #[must_use]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Size counted against batch limits: 8 bytes of overhead, 2 per header,
    /// plus every header name and value and the body.
    #[must_use]
    pub const fn metered_bytes(&self) -> u64 {
        self.metered_bytes
    }

    fn to_proto(&self) -> proto::AppendRecord {
        proto::AppendRecord {
            headers: self.headers.iter().cloned().map(Into::into).collect(),
            body: self.body.clone(),
        }
    }
}

/// A batch of records appended atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendInput {
    records: Vec<AppendRecord>,
    match_seq_num: Option<u64>,
    fencing_token: Option<String>,
    metered_bytes: u64,
}

impl AppendInput {
    /// # Errors
    ///
    /// See [`AppendInputBuilder::build`].
    pub fn new(records: Vec<AppendRecord>) -> Result<Self, ValidationError> {
        Self::builder().records(records).build()
    }

    #[must_use]
    pub fn builder() -> AppendInputBuilder {
        AppendInputBuilder::default()
    }

    #[must_use]
    pub fn records(&self) -> &[AppendRecord] {
        &self.records
    }

    #[must_use]
    pub const fn match_seq_num(&self) -> Option<u64> {
        self.match_seq_num
    }

    #[must_use]
    pub fn fencing_token(&self) -> Option<&str> {
        self.fencing_token.as_deref()
    }

    #[must_use]
    pub const fn metered_bytes(&self) -> u64 {
        self.metered_bytes
    }

    /// Wire form for `stream`. Record bodies are shared, not copied.
    #[must_use]
    pub fn to_proto(&self, stream: &str) -> proto::AppendInput {
        proto::AppendInput {
            stream: stream.to_owned(),
            records: self.records.iter().map(AppendRecord::to_proto).collect(),
            match_seq_num: self.match_seq_num,
            fencing_token: self.fencing_token.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct AppendInputBuilder {
    records: Vec<AppendRecord>,
    match_seq_num: Option<u64>,
    fencing_token: Option<String>,
}

impl AppendInputBuilder {
    #[must_use]
    pub fn records(mut self, records: Vec<AppendRecord>) -> Self {
        self.records = records;
        self
    }

    #[must_use]
    pub fn record(mut self, record: AppendRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Require the first record to be assigned this sequence number.
    #[must_use]
    pub const fn match_seq_num(mut self, seq_num: u64) -> Self {
        self.match_seq_num = Some(seq_num);
        self
    }

    #[must_use]
    pub fn fencing_token(mut self, token: impl Into<String>) -> Self {
        self.fencing_token = Some(token.into());
        self
    }

    /// # Errors
    ///
    /// Fails if there are no records, more than [`MAX_BATCH_RECORDS`], a
    /// metered total above [`MAX_BATCH_BYTES`], or a fencing token longer
    /// than [`MAX_FENCING_TOKEN_BYTES`].
    pub fn build(self) -> Result<AppendInput, ValidationError> {
        if self.records.is_empty() {
            return Err(ValidationError::EmptyInput);
        }
        if self.records.len() > MAX_BATCH_RECORDS {
            return Err(ValidationError::TooManyRecords {
                count: self.records.len(),
                max: MAX_BATCH_RECORDS,
            });
        }
        if let Some(token) = &self.fencing_token {
            if token.len() > MAX_FENCING_TOKEN_BYTES {
                return Err(ValidationError::FencingTokenTooLong {
                    len: token.len(),
                    max: MAX_FENCING_TOKEN_BYTES,
                });
            }
        }
        let metered_bytes = self.records.iter().map(AppendRecord::metered_bytes).sum();
        if metered_bytes > MAX_BATCH_BYTES {
            return Err(ValidationError::TooLarge {
                what: "append input",
                size: metered_bytes,
                max: MAX_BATCH_BYTES,
            });
        }
        Ok(AppendInput {
            records: self.records,
            match_seq_num: self.match_seq_num,
            fencing_token: self.fencing_token,
            metered_bytes,
        })
    }
}

/// Acknowledgement of an appended batch. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutput {
    pub start: StreamPosition,
    pub end: StreamPosition,
    /// Tail of the stream after this append.
    pub next: StreamPosition,
}

impl AppendOutput {
    /// Number of records covered by this acknowledgement.
    #[must_use]
    pub const fn record_count(&self) -> u64 {
        self.end.seq_num.saturating_sub(self.start.seq_num)
    }
}

impl From<proto::AppendOutput> for AppendOutput {
    fn from(o: proto::AppendOutput) -> Self {
        Self {
            start: StreamPosition::new(o.start_seq_num, o.start_timestamp),
            end: StreamPosition::new(o.end_seq_num, o.end_timestamp),
            next: StreamPosition::new(o.next_seq_num, o.last_timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedRecord {
    pub seq_num: u64,
    pub timestamp: u64,
    pub headers: Vec<Header>,
    pub body: Bytes,
}

impl SequencedRecord {
    #[must_use]
    pub fn metered_bytes(&self) -> u64 {
        metered_size(&self.headers, &self.body)
    }
}

impl From<proto::SequencedRecord> for SequencedRecord {
    fn from(r: proto::SequencedRecord) -> Self {
        Self {
            seq_num: r.seq_num,
            timestamp: r.timestamp,
            headers: r.headers.into_iter().map(Into::into).collect(),
            body: r.body,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencedRecordBatch {
    pub records: Vec<SequencedRecord>,
}

impl SequencedRecordBatch {
    #[must_use]
    pub fn metered_bytes(&self) -> u64 {
        self.records.iter().map(SequencedRecord::metered_bytes).sum()
    }

    #[must_use]
    pub fn last_seq_num(&self) -> Option<u64> {
        self.records.last().map(|r| r.seq_num)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<proto::SequencedRecordBatch> for SequencedRecordBatch {
    fn from(b: proto::SequencedRecordBatch) -> Self {
        Self {
            records: b.records.into_iter().map(Into::into).collect(),
        }
    }
}

/// One unit of read output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutput {
    Batch(SequencedRecordBatch),
    /// The requested start precedes the first retained record.
    FirstSeqNum(StreamPosition),
    /// The requested start is past the tail.
    NextSeqNum(StreamPosition),
}

impl TryFrom<proto::ReadOutput> for ReadOutput {
    type Error = String;

    fn try_from(o: proto::ReadOutput) -> Result<Self, Self::Error> {
        use proto::read_output::Output;
        match o.output {
            Some(Output::Batch(b)) => Ok(Self::Batch(b.into())),
            Some(Output::FirstSeqNum(p)) => Ok(Self::FirstSeqNum(p.into())),
            Some(Output::NextSeqNum(p)) => Ok(Self::NextSeqNum(p.into())),
            None => Err("read output carried no variant".to_owned()),
        }
    }
}

// ============================================================================
// Read requests
// ============================================================================

/// Where a read begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Start {
    SeqNum(u64),
    /// Milliseconds since the Unix epoch.
    Timestamp(u64),
    /// Number of records before the tail.
    TailOffset(u64),
}

impl Default for Start {
    fn default() -> Self {
        Self::SeqNum(0)
    }
}

impl From<Start> for proto::read_start::Start {
    fn from(s: Start) -> Self {
        match s {
            Start::SeqNum(n) => Self::SeqNum(n),
            Start::Timestamp(t) => Self::Timestamp(t),
            Start::TailOffset(o) => Self::TailOffset(o),
        }
    }
}

/// Bounds on how much a read returns. Absent bounds are unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadLimit {
    pub count: Option<u64>,
    pub bytes: Option<u64>,
}

impl ReadLimit {
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            count: None,
            bytes: None,
        }
    }

    #[must_use]
    pub const fn count(count: u64) -> Self {
        Self {
            count: Some(count),
            bytes: None,
        }
    }

    #[must_use]
    pub const fn bytes(bytes: u64) -> Self {
        Self {
            count: None,
            bytes: Some(bytes),
        }
    }

    #[must_use]
    pub const fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = Some(bytes);
        self
    }

    /// Limit left after consuming the given amounts. Each present bound
    /// decreases and saturates at zero.
    #[must_use]
    pub fn remaining(&self, consumed_records: u64, consumed_bytes: u64) -> Self {
        Self {
            count: self.count.map(|c| c.saturating_sub(consumed_records)),
            bytes: self.bytes.map(|b| b.saturating_sub(consumed_bytes)),
        }
    }

    /// Whether any present bound has reached zero.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.count == Some(0) || self.bytes == Some(0)
    }

    /// Unary reads are capped at one batch worth of records and bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ReadLimitExceeded`] naming the first bound
    /// over its cap.
    pub fn validate_unary(&self) -> Result<(), ValidationError> {
        if let Some(count) = self.count {
            if count > MAX_BATCH_RECORDS as u64 {
                return Err(ValidationError::ReadLimitExceeded {
                    field: "count",
                    value: count,
                    max: MAX_BATCH_RECORDS as u64,
                });
            }
        }
        if let Some(bytes) = self.bytes {
            if bytes > MAX_BATCH_BYTES {
                return Err(ValidationError::ReadLimitExceeded {
                    field: "bytes",
                    value: bytes,
                    max: MAX_BATCH_BYTES,
                });
            }
        }
        Ok(())
    }

    fn to_proto(self) -> Option<proto::ReadLimit> {
        if self.count.is_none() && self.bytes.is_none() {
            return None;
        }
        Some(proto::ReadLimit {
            count: self.count,
            bytes: self.bytes,
        })
    }
}

/// A single-batch read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadRequest {
    pub start: Start,
    pub limit: ReadLimit,
}

impl ReadRequest {
    /// # Errors
    ///
    /// See [`ReadLimit::validate_unary`].
    pub fn new(start: Start, limit: ReadLimit) -> Result<Self, ValidationError> {
        limit.validate_unary()?;
        Ok(Self { start, limit })
    }

    #[must_use]
    pub fn to_proto(&self, stream: &str) -> proto::ReadRequest {
        proto::ReadRequest {
            stream: stream.to_owned(),
            start: Some(self.start.into()),
            limit: self.limit.to_proto(),
        }
    }
}

/// A streaming read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSessionRequest {
    pub start: Start,
    pub limit: ReadLimit,
    /// Ask the service for heartbeats while idle, and watch for them.
    pub heartbeats: bool,
}

impl ReadSessionRequest {
    #[must_use]
    pub const fn new(start: Start) -> Self {
        Self {
            start,
            limit: ReadLimit::unbounded(),
            heartbeats: false,
        }
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: ReadLimit) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub const fn with_heartbeats(mut self, heartbeats: bool) -> Self {
        self.heartbeats = heartbeats;
        self
    }

    /// Request used to resume from `start` after consuming the given amounts
    /// under the original limit.
    #[must_use]
    pub fn resume(&self, start: Start, consumed_records: u64, consumed_bytes: u64) -> Self {
        Self {
            start,
            limit: self.limit.remaining(consumed_records, consumed_bytes),
            heartbeats: self.heartbeats,
        }
    }

    #[must_use]
    pub fn to_proto(&self, stream: &str) -> proto::ReadSessionRequest {
        proto::ReadSessionRequest {
            stream: stream.to_owned(),
            start: Some(self.start.into()),
            limit: self.limit.to_proto(),
            heartbeats: self.heartbeats,
        }
    }
}

// ============================================================================
// Control plane
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasinState {
    Unspecified,
    Active,
    Creating,
    Deleting,
}

impl From<i32> for BasinState {
    fn from(raw: i32) -> Self {
        match proto::BasinState::try_from(raw) {
            Ok(proto::BasinState::Active) => Self::Active,
            Ok(proto::BasinState::Creating) => Self::Creating,
            Ok(proto::BasinState::Deleting) => Self::Deleting,
            Ok(proto::BasinState::Unspecified) | Err(_) => Self::Unspecified,
        }
    }
}

impl std::fmt::Display for BasinState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unspecified => "unspecified",
            Self::Active => "active",
            Self::Creating => "creating",
            Self::Deleting => "deleting",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasinInfo {
    pub name: String,
    pub state: BasinState,
}

impl From<proto::BasinInfo> for BasinInfo {
    fn from(b: proto::BasinInfo) -> Self {
        Self {
            name: b.name,
            state: b.state.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Standard,
    Express,
}

impl std::str::FromStr for StorageClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "express" => Ok(Self::Express),
            other => Err(ValidationError::Invalid {
                field: "storage class",
                reason: format!("unknown value '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Records older than this are trimmed.
    Age(Duration),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamConfig {
    pub storage_class: Option<StorageClass>,
    pub retention_policy: Option<RetentionPolicy>,
}

impl From<StreamConfig> for proto::StreamConfig {
    fn from(c: StreamConfig) -> Self {
        let storage_class = match c.storage_class {
            None => proto::StorageClass::Unspecified,
            Some(StorageClass::Standard) => proto::StorageClass::Standard,
            Some(StorageClass::Express) => proto::StorageClass::Express,
        };
        Self {
            storage_class: storage_class as i32,
            retention_policy: c.retention_policy.map(|RetentionPolicy::Age(age)| {
                proto::stream_config::RetentionPolicy::Age(age.as_secs())
            }),
        }
    }
}

impl From<proto::StreamConfig> for StreamConfig {
    fn from(c: proto::StreamConfig) -> Self {
        let storage_class = match proto::StorageClass::try_from(c.storage_class) {
            Ok(proto::StorageClass::Standard) => Some(StorageClass::Standard),
            Ok(proto::StorageClass::Express) => Some(StorageClass::Express),
            Ok(proto::StorageClass::Unspecified) | Err(_) => None,
        };
        Self {
            storage_class,
            retention_policy: c.retention_policy.map(
                |proto::stream_config::RetentionPolicy::Age(secs)| {
                    RetentionPolicy::Age(Duration::from_secs(secs))
                },
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasinConfig {
    pub default_stream_config: Option<StreamConfig>,
    pub create_stream_on_append: bool,
}

impl From<BasinConfig> for proto::BasinConfig {
    fn from(c: BasinConfig) -> Self {
        Self {
            default_stream_config: c.default_stream_config.map(Into::into),
            create_stream_on_append: c.create_stream_on_append,
        }
    }
}

impl From<proto::BasinConfig> for BasinConfig {
    fn from(c: proto::BasinConfig) -> Self {
        Self {
            default_stream_config: c.default_stream_config.map(Into::into),
            create_stream_on_append: c.create_stream_on_append,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub name: String,
    /// Seconds since the Unix epoch.
    pub created_at: u32,
    pub deleted_at: Option<u32>,
}

impl From<proto::StreamInfo> for StreamInfo {
    fn from(s: proto::StreamInfo) -> Self {
        Self {
            name: s.name,
            created_at: s.created_at,
            deleted_at: s.deleted_at,
        }
    }
}

/// Filter and cursor for listing basins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBasinsRequest {
    pub prefix: String,
    pub start_after: String,
    pub limit: Option<u64>,
}

impl From<ListBasinsRequest> for proto::ListBasinsRequest {
    fn from(r: ListBasinsRequest) -> Self {
        Self {
            prefix: r.prefix,
            start_after: r.start_after,
            limit: r.limit,
        }
    }
}

/// Filter and cursor for listing streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListStreamsRequest {
    pub prefix: String,
    pub start_after: String,
    pub limit: Option<u64>,
}

impl ListStreamsRequest {
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }
}

impl From<ListStreamsRequest> for proto::ListStreamsRequest {
    fn from(r: ListStreamsRequest) -> Self {
        Self {
            prefix: r.prefix,
            start_after: r.start_after,
            limit: r.limit,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metered_bytes_formula() {
        let record = AppendRecord::with_headers(
            vec![Header::new("ab", "cde"), Header::new("", "f")],
            "0123456789",
        )
        .unwrap();
        // 8 + 2*2 + (2+3) + (0+1) + 10
        assert_eq!(record.metered_bytes(), 30);

        let plain = AppendRecord::new(vec![0u8; 100]).unwrap();
        assert_eq!(plain.metered_bytes(), 108);
    }

    #[test]
    fn test_record_size_limit() {
        let max_body = (MAX_BATCH_BYTES - 8) as usize;
        assert!(AppendRecord::new(vec![0u8; max_body]).is_ok());
        assert!(matches!(
            AppendRecord::new(vec![0u8; max_body + 1]),
            Err(ValidationError::TooLarge { what: "record", .. })
        ));
    }

    #[test]
    fn test_append_input_validation() {
        assert_eq!(
            AppendInput::new(vec![]).unwrap_err(),
            ValidationError::EmptyInput
        );

        let records = vec![AppendRecord::new("x").unwrap(); MAX_BATCH_RECORDS + 1];
        assert!(matches!(
            AppendInput::new(records),
            Err(ValidationError::TooManyRecords { count: 1001, .. })
        ));

        let half = AppendRecord::new(vec![0u8; 600 * 1024]).unwrap();
        assert!(matches!(
            AppendInput::new(vec![half.clone(), half]),
            Err(ValidationError::TooLarge { what: "append input", .. })
        ));

        let err = AppendInput::builder()
            .record(AppendRecord::new("x").unwrap())
            .fencing_token("t".repeat(37))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::FencingTokenTooLong { len: 37, max: 36 }
        );

        let input = AppendInput::builder()
            .record(AppendRecord::new("x").unwrap())
            .record(AppendRecord::new("yy").unwrap())
            .match_seq_num(5)
            .fencing_token("t".repeat(36))
            .build()
            .unwrap();
        assert_eq!(input.metered_bytes(), 9 + 10);
        assert_eq!(input.match_seq_num(), Some(5));

        let wire = input.to_proto("orders");
        assert_eq!(wire.stream, "orders");
        assert_eq!(wire.records.len(), 2);
        assert_eq!(wire.match_seq_num, Some(5));
    }

    #[test]
    fn test_read_limit_remaining() {
        let limit = ReadLimit::count(25).with_bytes(1000);
        assert_eq!(
            limit.remaining(10, 400),
            ReadLimit {
                count: Some(15),
                bytes: Some(600)
            }
        );
        assert!(limit.remaining(30, 0).is_exhausted());
        assert!(!ReadLimit::unbounded().remaining(u64::MAX, u64::MAX).is_exhausted());
    }

    #[test]
    fn test_read_limit_unary_validation() {
        assert!(ReadRequest::new(Start::SeqNum(0), ReadLimit::count(1000)).is_ok());
        assert!(matches!(
            ReadRequest::new(Start::SeqNum(0), ReadLimit::count(1001)),
            Err(ValidationError::ReadLimitExceeded { field: "count", .. })
        ));
        assert!(matches!(
            ReadRequest::new(Start::SeqNum(0), ReadLimit::bytes(MAX_BATCH_BYTES + 1)),
            Err(ValidationError::ReadLimitExceeded { field: "bytes", .. })
        ));
    }

    #[test]
    fn test_resume_request() {
        let request = ReadSessionRequest::new(Start::SeqNum(10))
            .with_limit(ReadLimit::count(25))
            .with_heartbeats(true);
        let resumed = request.resume(Start::SeqNum(20), 10, 512);
        assert_eq!(resumed.start, Start::SeqNum(20));
        assert_eq!(resumed.limit, ReadLimit::count(15));
        assert!(resumed.heartbeats);

        let wire = resumed.to_proto("s");
        assert_eq!(wire.start, Some(proto::read_start::Start::SeqNum(20)));
        assert_eq!(wire.limit.and_then(|l| l.count), Some(15));

        let unlimited = ReadSessionRequest::new(Start::TailOffset(0)).to_proto("s");
        assert!(unlimited.limit.is_none());
    }

    #[test]
    fn test_append_output_from_proto() {
        let output = AppendOutput::from(proto::AppendOutput {
            start_seq_num: 3,
            start_timestamp: 100,
            end_seq_num: 5,
            end_timestamp: 101,
            next_seq_num: 5,
            last_timestamp: 101,
        });
        assert_eq!(output.record_count(), 2);
        assert_eq!(output.next, StreamPosition::new(5, 101));
    }

    #[test]
    fn test_stream_config_conversion() {
        let config = StreamConfig {
            storage_class: Some(StorageClass::Express),
            retention_policy: Some(RetentionPolicy::Age(Duration::from_secs(3600))),
        };
        let wire: proto::StreamConfig = config.into();
        assert_eq!(wire.storage_class, proto::StorageClass::Express as i32);
        assert_eq!(StreamConfig::from(wire), config);
        assert_eq!(
            "STANDARD".parse::<StorageClass>().unwrap(),
            StorageClass::Standard
        );
        assert!("glacier".parse::<StorageClass>().is_err());
    }
}
