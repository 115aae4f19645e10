use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use s2_sdk::config::{AppendRetryPolicy, ClientConfig, Endpoints};
use serde::{Deserialize, Serialize};

const MISSING_TOKEN: &str = "no access token: pass --access-token, set S2_ACCESS_TOKEN \
    or run 's2 config set connection.access_token <token>'";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub append: AppendConfig,
    #[serde(default)]
    pub read: ReadConfig,
}

impl CliConfig {
    pub fn merge(&mut self, other: &Self) {
        self.connection.merge(&other.connection);
        self.append.merge(&other.append);
        self.read.merge(&other.read);
    }

    /// SDK configuration for these settings. Environment variables override
    /// the endpoint settings, and `token` overrides the stored token.
    pub fn client_config(&self, token: Option<&str>) -> Result<ClientConfig> {
        let token = token
            .filter(|t| !t.is_empty())
            .or_else(|| non_empty(&self.connection.access_token))
            .ok_or_else(|| anyhow!(MISSING_TOKEN))?;

        let endpoints = Endpoints::from_lookup(|key| {
            std::env::var(key).ok().or_else(|| {
                let stored = match key {
                    "S2_CLOUD" => &self.connection.cloud,
                    "S2_ACCOUNT_ENDPOINT" => &self.connection.account_endpoint,
                    "S2_BASIN_ENDPOINT" => &self.connection.basin_endpoint,
                    _ => return None,
                };
                non_empty(stored).map(str::to_owned)
            })
        })?;

        let retry_policy: AppendRetryPolicy = self.append.retry_policy.parse()?;
        let config = ClientConfig::builder(token)
            .endpoints(endpoints)
            .request_timeout(Duration::from_secs(self.connection.request_timeout_secs))
            .max_retries(self.connection.max_retries)
            .compression(self.connection.compression)
            .max_append_inflight_bytes(self.append.max_inflight_bytes)
            .append_retry_policy(retry_policy)
            .user_agent(format!("s2-cli/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(config)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub access_token: String,
    pub cloud: String,
    pub account_endpoint: String,
    pub basin_endpoint: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub compression: bool,
}

impl ConnectionConfig {
    fn merge(&mut self, other: &Self) {
        if !other.access_token.is_empty() {
            self.access_token.clone_from(&other.access_token);
        }
        if !other.cloud.is_empty() {
            self.cloud.clone_from(&other.cloud);
        }
        if !other.account_endpoint.is_empty() {
            self.account_endpoint.clone_from(&other.account_endpoint);
        }
        if !other.basin_endpoint.is_empty() {
            self.basin_endpoint.clone_from(&other.basin_endpoint);
        }
        if other.request_timeout_secs > 0 {
            self.request_timeout_secs = other.request_timeout_secs;
        }
        self.max_retries = other.max_retries;
        self.compression = other.compression;
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            cloud: "aws".to_string(),
            account_endpoint: String::new(),
            basin_endpoint: String::new(),
            request_timeout_secs: 10,
            max_retries: 3,
            compression: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppendConfig {
    pub max_inflight_bytes: u64,
    pub retry_policy: String,
    pub capacity_wait_ms: u64,
}

impl AppendConfig {
    fn merge(&mut self, other: &Self) {
        if other.max_inflight_bytes > 0 {
            self.max_inflight_bytes = other.max_inflight_bytes;
        }
        if !other.retry_policy.is_empty() {
            self.retry_policy.clone_from(&other.retry_policy);
        }
        if other.capacity_wait_ms > 0 {
            self.capacity_wait_ms = other.capacity_wait_ms;
        }
    }

    #[must_use]
    pub const fn capacity_wait(&self) -> Duration {
        Duration::from_millis(self.capacity_wait_ms)
    }
}

impl Default for AppendConfig {
    fn default() -> Self {
        Self {
            max_inflight_bytes: ClientConfig::DEFAULT_MAX_APPEND_INFLIGHT_BYTES,
            retry_policy: "all".to_string(),
            capacity_wait_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    pub max_buffered_bytes: u32,
    pub heartbeats: bool,
}

impl ReadConfig {
    fn merge(&mut self, other: &Self) {
        if other.max_buffered_bytes > 0 {
            self.max_buffered_bytes = other.max_buffered_bytes;
        }
        self.heartbeats = other.heartbeats;
    }
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            max_buffered_bytes: 4 * 1024 * 1024,
            heartbeats: true,
        }
    }
}

pub struct ConfigManager {
    path: PathBuf,
    config: CliConfig,
}

impl ConfigManager {
    pub fn load() -> Result<Self> {
        let path = default_config_path()?;
        Self::load_with_path(path)
    }

    pub fn load_with_path<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let mut config = CliConfig::default();

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config at {}", path.display()))?;
            let user_config: CliConfig = toml::from_str(&contents)
                .with_context(|| format!("invalid config at {}", path.display()))?;
            config.merge(&user_config);
        }

        Ok(Self { path, config })
    }

    #[must_use]
    pub const fn config(&self) -> &CliConfig {
        &self.config
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }
        let toml = toml::to_string_pretty(&self.config)?;
        fs::write(&self.path, toml)
            .with_context(|| format!("failed to write config to {}", self.path.display()))?;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let c = &self.config;
        let value = match key {
            "connection.access_token" => redact(&c.connection.access_token),
            "connection.cloud" => c.connection.cloud.clone(),
            "connection.account_endpoint" => c.connection.account_endpoint.clone(),
            "connection.basin_endpoint" => c.connection.basin_endpoint.clone(),
            "connection.request_timeout_secs" => c.connection.request_timeout_secs.to_string(),
            "connection.max_retries" => c.connection.max_retries.to_string(),
            "connection.compression" => c.connection.compression.to_string(),
            "append.max_inflight_bytes" => c.append.max_inflight_bytes.to_string(),
            "append.retry_policy" => c.append.retry_policy.clone(),
            "append.capacity_wait_ms" => c.append.capacity_wait_ms.to_string(),
            "read.max_buffered_bytes" => c.read.max_buffered_bytes.to_string(),
            "read.heartbeats" => c.read.heartbeats.to_string(),
            _ => return None,
        };
        Some(value)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let c = &mut self.config;
        match key {
            "connection.access_token" => c.connection.access_token = value.to_string(),
            "connection.cloud" => {
                value.parse::<s2_sdk::config::Cloud>()?;
                c.connection.cloud = value.to_string();
            }
            "connection.account_endpoint" => c.connection.account_endpoint = value.to_string(),
            "connection.basin_endpoint" => c.connection.basin_endpoint = value.to_string(),
            "connection.request_timeout_secs" => {
                c.connection.request_timeout_secs = parse_number(key, value)?;
            }
            "connection.max_retries" => c.connection.max_retries = parse_number(key, value)?,
            "connection.compression" => c.connection.compression = parse_bool(value)?,
            "append.max_inflight_bytes" => c.append.max_inflight_bytes = parse_number(key, value)?,
            "append.retry_policy" => {
                value.parse::<AppendRetryPolicy>()?;
                c.append.retry_policy = value.to_string();
            }
            "append.capacity_wait_ms" => c.append.capacity_wait_ms = parse_number(key, value)?,
            "read.max_buffered_bytes" => c.read.max_buffered_bytes = parse_number(key, value)?,
            "read.heartbeats" => c.read.heartbeats = parse_bool(value)?,
            _ => return Err(anyhow!("unknown configuration key: {key}")),
        }
        Ok(())
    }
}

fn redact(token: &str) -> String {
    if token.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("expected a non-negative number for {key}, received '{value}'"))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("expected boolean value, received '{value}'")),
    }
}

fn default_config_path() -> Result<PathBuf> {
    let base =
        dirs::config_dir().ok_or_else(|| anyhow!("unable to determine configuration directory"))?;
    Ok(base.join("s2").join("config.toml"))
}

#[must_use]
pub fn format_sections(manager: &ConfigManager) -> Vec<String> {
    let sections: [(&str, &[&str]); 3] = [
        (
            "connection",
            &[
                "access_token",
                "cloud",
                "account_endpoint",
                "basin_endpoint",
                "request_timeout_secs",
                "max_retries",
                "compression",
            ],
        ),
        ("append", &["max_inflight_bytes", "retry_policy", "capacity_wait_ms"]),
        ("read", &["max_buffered_bytes", "heartbeats"]),
    ];

    let mut lines = Vec::new();
    for (section, keys) in sections {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format!("[{section}]"));
        for key in keys {
            let value = manager.get(&format!("{section}.{key}")).unwrap_or_default();
            lines.push(format!("{key}={value}"));
        }
    }
    lines
}
