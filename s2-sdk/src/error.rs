//! Error types for the S2 client.
//!
//! Every failure a caller can observe is a [`ClientError`]. Builders fail
//! synchronously with a [`ValidationError`]; everything else surfaces through
//! the returned futures and session callbacks.

use std::time::Duration;
use thiserror::Error;
use tonic::Code;

/// Convenience alias used throughout the SDK.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// A value object was rejected by its builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("append input must contain at least one record")]
    EmptyInput,

    #[error("append input has {count} records, at most {max} are allowed")]
    TooManyRecords { count: usize, max: usize },

    #[error("{what} is {size} metered bytes, at most {max} are allowed")]
    TooLarge {
        what: &'static str,
        size: u64,
        max: u64,
    },

    #[error("fencing token is {len} bytes, at most {max} are allowed")]
    FencingTokenTooLong { len: usize, max: usize },

    #[error("read limit {field} of {value} exceeds the maximum of {max}")]
    ReadLimitExceeded {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors surfaced by clients and sessions.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Status reported by the service or by the gRPC stack.
    #[error("service error ({}): {}", .0.code(), .0.message())]
    Service(#[from] tonic::Status),

    /// No response arrived within the per-request deadline.
    #[error("request did not complete within {0:?}")]
    LocalTimeout(Duration),

    /// A read session asked for heartbeats and heard nothing.
    #[error("no data or heartbeat received within {0:?}")]
    HeartbeatTimeout(Duration),

    /// The service broke the session protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("could not acquire {requested} bytes of append capacity within {waited:?}")]
    CapacityTimeout { requested: u64, waited: Duration },

    /// The session was closed before this request was resolved.
    #[error("session closed before the request was acknowledged")]
    Abandoned,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Whether a fresh attempt may succeed where this one failed.
    ///
    /// Only transient transport conditions qualify: `UNKNOWN`,
    /// `DEADLINE_EXCEEDED` and `UNAVAILABLE` statuses plus local deadline
    /// expiry. Heartbeat loss is terminal.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service(status) => matches!(
                status.code(),
                Code::Unknown | Code::DeadlineExceeded | Code::Unavailable
            ),
            Self::LocalTimeout(_) => true,
            _ => false,
        }
    }

    /// gRPC status code, when the error came from the service.
    #[must_use]
    pub fn code(&self) -> Option<Code> {
        match self {
            Self::Service(status) => Some(status.code()),
            _ => None,
        }
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

impl From<tonic::transport::Error> for ClientError {
    fn from(err: tonic::transport::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
