//! Basin and stream management commands.

use super::commands::{StorageClassArg, StreamConfigArgs};
use anyhow::{Context, Result};
use s2_sdk::types::{
    BasinConfig, ListBasinsRequest, RetentionPolicy, StorageClass, StreamConfig,
};
use s2_sdk::{BasinClient, Client};
use std::time::Duration;
use tracing::info;

impl StreamConfigArgs {
    /// `None` when no setting was given, so the basin default applies.
    #[must_use]
    pub fn to_config(&self) -> Option<StreamConfig> {
        if self.storage_class.is_none() && self.retention_secs.is_none() {
            return None;
        }
        Some(StreamConfig {
            storage_class: self.storage_class.map(|class| match class {
                StorageClassArg::Standard => StorageClass::Standard,
                StorageClassArg::Express => StorageClass::Express,
            }),
            retention_policy: self
                .retention_secs
                .map(|secs| RetentionPolicy::Age(Duration::from_secs(secs))),
        })
    }
}

fn describe_stream_config(config: &StreamConfig) -> Vec<String> {
    let storage_class = config
        .storage_class
        .map_or("default", |class| match class {
            StorageClass::Standard => "standard",
            StorageClass::Express => "express",
        });
    let retention = match config.retention_policy {
        Some(RetentionPolicy::Age(age)) => format!("{}s", age.as_secs()),
        None => "default".to_string(),
    };
    vec![
        format!("storage_class={storage_class}"),
        format!("retention_age={retention}"),
    ]
}

/// Print every basin matching `prefix`.
pub async fn list_basins(client: &Client, prefix: String) -> Result<()> {
    let mut request = ListBasinsRequest {
        prefix,
        ..ListBasinsRequest::default()
    };
    let mut printed = 0usize;
    loop {
        let page = client
            .list_basins(request.clone())
            .await
            .context("failed to list basins")?;
        for basin in &page.items {
            println!("{:<48}  {}", basin.name, basin.state);
        }
        printed += page.items.len();
        match page.items.last() {
            Some(last) if page.has_more => request.start_after = last.name.clone(),
            _ => break,
        }
    }
    if printed == 0 {
        println!("No basins found.");
    }
    Ok(())
}

pub async fn create_basin(
    client: &Client,
    basin: &str,
    stream_config: &StreamConfigArgs,
    create_stream_on_append: bool,
) -> Result<()> {
    let config = BasinConfig {
        default_stream_config: stream_config.to_config(),
        create_stream_on_append,
    };
    let info = client
        .create_basin(basin, Some(config))
        .await
        .with_context(|| format!("failed to create basin '{basin}'"))?;
    info!(basin = %info.name, state = %info.state, "basin created");
    println!("Created basin {} ({})", info.name, info.state);
    Ok(())
}

pub async fn delete_basin(client: &Client, basin: &str) -> Result<()> {
    client
        .delete_basin(basin)
        .await
        .with_context(|| format!("failed to delete basin '{basin}'"))?;
    println!("Deletion of basin {basin} requested");
    Ok(())
}

pub async fn get_basin_config(client: &Client, basin: &str) -> Result<()> {
    let config = client
        .get_basin_config(basin)
        .await
        .with_context(|| format!("failed to fetch config of basin '{basin}'"))?;
    println!("create_stream_on_append={}", config.create_stream_on_append);
    for line in describe_stream_config(&config.default_stream_config.unwrap_or_default()) {
        println!("default_stream_config.{line}");
    }
    Ok(())
}

pub async fn list_streams(client: &BasinClient, prefix: &str) -> Result<()> {
    let streams = client
        .list_all_streams(prefix)
        .await
        .with_context(|| format!("failed to list streams of basin '{}'", client.name()))?;
    if streams.is_empty() {
        println!("No streams found.");
        return Ok(());
    }
    for stream in streams {
        let deleting = if stream.deleted_at.is_some() { "  (deleting)" } else { "" };
        println!("{}{deleting}", stream.name);
    }
    Ok(())
}

pub async fn create_stream(
    client: &BasinClient,
    stream: &str,
    config: &StreamConfigArgs,
) -> Result<()> {
    let info = client
        .create_stream(stream, config.to_config())
        .await
        .with_context(|| format!("failed to create stream '{stream}'"))?;
    println!("Created stream {}/{}", client.name(), info.name);
    Ok(())
}

pub async fn delete_stream(client: &BasinClient, stream: &str) -> Result<()> {
    client
        .delete_stream(stream)
        .await
        .with_context(|| format!("failed to delete stream '{stream}'"))?;
    println!("Deletion of stream {}/{stream} requested", client.name());
    Ok(())
}

pub async fn get_stream_config(client: &BasinClient, stream: &str) -> Result<()> {
    let config = client
        .get_stream_config(stream)
        .await
        .with_context(|| format!("failed to fetch config of stream '{stream}'"))?;
    for line in describe_stream_config(&config) {
        println!("{line}");
    }
    Ok(())
}
