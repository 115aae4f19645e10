//! S2 command-line client

use anyhow::{Context, Result};
use clap::Parser;
use s2_cli::cli::{basin, stream, Cli, Commands, ConfigAction};
use s2_cli::config::{format_sections, ConfigManager};
use s2_sdk::{Client, ReadLimit};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut manager = match &cli.config {
        Some(path) => ConfigManager::load_with_path(path)?,
        None => ConfigManager::load()?,
    };
    debug!(path = %manager.path().display(), "configuration loaded");

    if let Commands::Config { action } = &cli.command {
        return run_config(&mut manager, action);
    }

    let settings = manager.config().clone();
    let client_config = settings.client_config(cli.access_token.as_deref())?;
    let client = Client::new(client_config).context("failed to create client")?;

    match cli.command {
        Commands::ListBasins { prefix } => basin::list_basins(&client, prefix).await,
        Commands::CreateBasin {
            basin,
            stream_config,
            create_stream_on_append,
        } => basin::create_basin(&client, &basin, &stream_config, create_stream_on_append).await,
        Commands::DeleteBasin { basin } => basin::delete_basin(&client, &basin).await,
        Commands::GetBasinConfig { basin } => basin::get_basin_config(&client, &basin).await,
        Commands::ListStreams { basin, prefix } => {
            basin::list_streams(&client.basin_client(&basin)?, &prefix).await
        }
        Commands::CreateStream {
            basin,
            stream,
            config,
        } => basin::create_stream(&client.basin_client(&basin)?, &stream, &config).await,
        Commands::DeleteStream { basin, stream } => {
            basin::delete_stream(&client.basin_client(&basin)?, &stream).await
        }
        Commands::GetStreamConfig { basin, stream } => {
            basin::get_stream_config(&client.basin_client(&basin)?, &stream).await
        }
        Commands::CheckTail { basin, stream } => {
            let client = client.basin_client(&basin)?.stream_client(&stream);
            stream::check_tail(&client).await
        }
        Commands::Append {
            basin,
            stream,
            fencing_token,
            match_seq_num,
        } => {
            let client = client.basin_client(&basin)?.stream_client(&stream);
            stream::append(
                &client,
                &settings,
                tokio::io::stdin(),
                fencing_token,
                match_seq_num,
            )
            .await
        }
        Commands::Read {
            basin,
            stream,
            start,
            count,
            bytes,
        } => {
            let client = client.basin_client(&basin)?.stream_client(&stream);
            let limit = ReadLimit { count, bytes };
            stream::read(&client, &settings, start.to_start(), limit).await
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn run_config(manager: &mut ConfigManager, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            for line in format_sections(manager) {
                println!("{line}");
            }
        }
        ConfigAction::Get { key } => match manager.get(key) {
            Some(value) => println!("{value}"),
            None => anyhow::bail!("unknown configuration key: {key}"),
        },
        ConfigAction::Set { key, value } => {
            manager.set(key, value)?;
            manager.save()?;
            println!("Updated {key}");
        }
        ConfigAction::Path => println!("{}", manager.path().display()),
    }
    Ok(())
}
