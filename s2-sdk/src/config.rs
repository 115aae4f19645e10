//! Client configuration and service endpoints.

use crate::error::ClientError;
use crate::retry::{FixedDelay, RetryBackoff};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default port for every S2 endpoint.
pub const DEFAULT_PORT: u16 = 443;

const BASIN_PLACEHOLDER: &str = "{basin}.";

/// Whether appends may be retried after a transient failure.
///
/// A retried append can be applied twice if the first attempt reached the
/// service before failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppendRetryPolicy {
    /// Retry every append, accepting possible duplicates.
    #[default]
    All,
    /// Never retry appends.
    NoSideEffects,
}

impl FromStr for AppendRetryPolicy {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "all" => Ok(Self::All),
            "no_side_effects" => Ok(Self::NoSideEffects),
            other => Err(ClientError::InvalidConfig(format!(
                "unknown append retry policy '{other}'"
            ))),
        }
    }
}

/// Cloud hosting the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Cloud {
    #[default]
    Aws,
}

impl fmt::Display for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aws => f.write_str("aws"),
        }
    }
}

impl FromStr for Cloud {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            other => Err(ClientError::InvalidConfig(format!("unknown cloud '{other}'"))),
        }
    }
}

/// Host and port of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host[:port]`, defaulting the port to 443.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] for an empty host or a port
    /// that is not a number.
    pub fn parse(s: &str) -> Result<Self, ClientError> {
        let s = s.trim();
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    ClientError::InvalidConfig(format!("invalid port in address '{s}'"))
                })?;
                (host, port)
            }
            None => (s, DEFAULT_PORT),
        };
        if host.is_empty() || host.contains('/') {
            return Err(ClientError::InvalidConfig(format!(
                "unable to parse host from '{s}'"
            )));
        }
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// How basin-scoped requests are routed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BasinEndpoint {
    /// Every basin is a subdomain of this zone.
    ParentZone(Address),
    /// Every basin is served from this address.
    Direct(Address),
}

impl BasinEndpoint {
    /// `host:port` that serves `basin`.
    #[must_use]
    pub fn target(&self, basin: &str) -> String {
        match self {
            Self::ParentZone(zone) => format!("{basin}.{}:{}", zone.host, zone.port),
            Self::Direct(addr) => addr.to_string(),
        }
    }

    #[must_use]
    pub fn address(&self) -> &Address {
        match self {
            Self::ParentZone(addr) | Self::Direct(addr) => addr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub account: Address,
    pub basin: BasinEndpoint,
}

impl Endpoints {
    #[must_use]
    pub fn for_cloud(cloud: Cloud) -> Self {
        Self {
            account: Address::new(format!("{cloud}.s2.dev"), DEFAULT_PORT),
            basin: BasinEndpoint::ParentZone(Address::new(
                format!("b.{cloud}.s2.dev"),
                DEFAULT_PORT,
            )),
        }
    }

    /// Endpoints of a single cell, serving both account and basin calls.
    #[must_use]
    pub fn for_cell(cloud: Cloud, cell: &str) -> Self {
        let addr = Address::new(format!("{cloud}.o.{cell}.s2.dev"), DEFAULT_PORT);
        Self {
            account: addr.clone(),
            basin: BasinEndpoint::Direct(addr),
        }
    }

    /// Read `S2_CLOUD`, `S2_ACCOUNT_ENDPOINT` and `S2_BASIN_ENDPOINT`.
    ///
    /// A basin endpoint starting with `{basin}.` names a parent zone.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] when a variable does not parse.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`Endpoints::from_env`] over an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] when a variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let cloud = lookup("S2_CLOUD")
            .map(|c| c.parse::<Cloud>())
            .transpose()?
            .unwrap_or_default();
        let mut endpoints = Self::for_cloud(cloud);

        if let Some(account) = lookup("S2_ACCOUNT_ENDPOINT") {
            endpoints.account = Address::parse(&account)?;
        }
        if let Some(basin) = lookup("S2_BASIN_ENDPOINT") {
            endpoints.basin = match basin.strip_prefix(BASIN_PLACEHOLDER) {
                Some(zone) => BasinEndpoint::ParentZone(Address::parse(zone)?),
                None => BasinEndpoint::Direct(Address::parse(&basin)?),
            };
        }
        Ok(endpoints)
    }

    /// Whether account and basin calls share one address, and so one channel.
    #[must_use]
    pub fn single_endpoint(&self) -> bool {
        matches!(&self.basin, BasinEndpoint::Direct(addr) if *addr == self.account)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::for_cloud(Cloud::default())
    }
}

/// Settings shared by every client and session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bearer token attached to every request.
    pub token: String,
    pub endpoints: Endpoints,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Local deadline per unary call, and per outstanding append ack.
    pub request_timeout: Duration,
    pub retry_backoff: Arc<dyn RetryBackoff>,
    /// Byte budget of unacknowledged appends in a managed session.
    pub max_append_inflight_bytes: u64,
    pub append_retry_policy: AppendRetryPolicy,
    pub user_agent: String,
    /// Gzip request and response payloads.
    pub compression: bool,
}

impl ClientConfig {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);
    pub const DEFAULT_MAX_APPEND_INFLIGHT_BYTES: u64 = 5 * 1024 * 1024;

    pub fn builder(token: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(token.into())
    }
}

#[derive(Debug)]
pub struct ClientConfigBuilder {
    token: String,
    endpoints: Option<Endpoints>,
    max_retries: Option<u32>,
    request_timeout: Option<Duration>,
    retry_backoff: Option<Arc<dyn RetryBackoff>>,
    max_append_inflight_bytes: Option<u64>,
    append_retry_policy: Option<AppendRetryPolicy>,
    user_agent: Option<String>,
    compression: bool,
}

impl ClientConfigBuilder {
    fn new(token: String) -> Self {
        Self {
            token,
            endpoints: None,
            max_retries: None,
            request_timeout: None,
            retry_backoff: None,
            max_append_inflight_bytes: None,
            append_retry_policy: None,
            user_agent: None,
            compression: false,
        }
    }

    #[must_use]
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Shorthand for a [`FixedDelay`] backoff.
    #[must_use]
    pub fn retry_delay(self, delay: Duration) -> Self {
        self.retry_backoff(Arc::new(FixedDelay(delay)))
    }

    #[must_use]
    pub fn retry_backoff(mut self, backoff: Arc<dyn RetryBackoff>) -> Self {
        self.retry_backoff = Some(backoff);
        self
    }

    #[must_use]
    pub const fn max_append_inflight_bytes(mut self, bytes: u64) -> Self {
        self.max_append_inflight_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub const fn append_retry_policy(mut self, policy: AppendRetryPolicy) -> Self {
        self.append_retry_policy = Some(policy);
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub const fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] for a zero request timeout, a
    /// zero append budget, or a budget too large for a semaphore.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let request_timeout = self
            .request_timeout
            .unwrap_or(ClientConfig::DEFAULT_REQUEST_TIMEOUT);
        if request_timeout.is_zero() {
            return Err(ClientError::InvalidConfig(
                "request timeout must be positive".into(),
            ));
        }

        let max_append_inflight_bytes = self
            .max_append_inflight_bytes
            .unwrap_or(ClientConfig::DEFAULT_MAX_APPEND_INFLIGHT_BYTES);
        if max_append_inflight_bytes == 0 {
            return Err(ClientError::InvalidConfig(
                "max append inflight bytes must be positive".into(),
            ));
        }
        if max_append_inflight_bytes > u32::MAX as u64 {
            return Err(ClientError::InvalidConfig(format!(
                "max append inflight bytes must not exceed {}",
                u32::MAX
            )));
        }

        Ok(ClientConfig {
            token: self.token,
            endpoints: self.endpoints.unwrap_or_default(),
            max_retries: self.max_retries.unwrap_or(ClientConfig::DEFAULT_MAX_RETRIES),
            request_timeout,
            retry_backoff: self
                .retry_backoff
                .unwrap_or_else(|| Arc::new(FixedDelay(ClientConfig::DEFAULT_RETRY_DELAY))),
            max_append_inflight_bytes,
            append_retry_policy: self.append_retry_policy.unwrap_or_default(),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| format!("s2-sdk-rust/{}", env!("CARGO_PKG_VERSION"))),
            compression: self.compression,
        })
    }
}
