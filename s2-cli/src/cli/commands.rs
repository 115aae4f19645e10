//! CLI command definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line client for the S2 stream store
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the log level
    #[arg(short, long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Access token, overriding the configured one
    #[arg(long, env = "S2_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub access_token: Option<String>,

    /// Main command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List basins
    ListBasins {
        /// Only basins whose name starts with this prefix
        #[arg(short, long, default_value = "")]
        prefix: String,
    },

    /// Create a basin
    CreateBasin {
        basin: String,

        #[command(flatten)]
        stream_config: StreamConfigArgs,

        /// Create streams on first append
        #[arg(long)]
        create_stream_on_append: bool,
    },

    /// Delete a basin
    DeleteBasin { basin: String },

    /// Show a basin's configuration
    GetBasinConfig { basin: String },

    /// List streams in a basin
    ListStreams {
        basin: String,

        /// Only streams whose name starts with this prefix
        #[arg(short, long, default_value = "")]
        prefix: String,
    },

    /// Create a stream
    CreateStream {
        basin: String,
        stream: String,

        #[command(flatten)]
        config: StreamConfigArgs,
    },

    /// Delete a stream
    DeleteStream { basin: String, stream: String },

    /// Show a stream's configuration
    GetStreamConfig { basin: String, stream: String },

    /// Show the next sequence number of a stream
    CheckTail { basin: String, stream: String },

    /// Append lines from stdin, one record per line
    Append {
        basin: String,
        stream: String,

        /// Fencing token required by the stream
        #[arg(long)]
        fencing_token: Option<String>,

        /// Expected sequence number of the first appended record
        #[arg(long)]
        match_seq_num: Option<u64>,
    },

    /// Read records to stdout, one line per record
    Read {
        basin: String,
        stream: String,

        #[command(flatten)]
        start: StartArgs,

        /// Stop after this many records
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Stop after this many metered bytes
        #[arg(short, long)]
        bytes: Option<u64>,
    },

    /// Configuration management
    Config {
        /// Configuration action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Stream settings accepted on creation
#[derive(Args, Clone, Debug, Default)]
pub struct StreamConfigArgs {
    /// Storage class of the stream
    #[arg(long, value_enum)]
    pub storage_class: Option<StorageClassArg>,

    /// Trim records older than this many seconds
    #[arg(long)]
    pub retention_secs: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageClassArg {
    Standard,
    Express,
}

/// Where a read begins; the stream's first record by default
#[derive(Args, Clone, Debug, Default)]
#[group(multiple = false)]
pub struct StartArgs {
    /// Start at this sequence number
    #[arg(short, long)]
    pub seq_num: Option<u64>,

    /// Start at the first record at or after this timestamp, in milliseconds
    #[arg(long)]
    pub timestamp: Option<u64>,

    /// Start this many records before the tail
    #[arg(long)]
    pub tail_offset: Option<u64>,
}

/// Configuration actions
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print one configuration value
    Get { key: String },

    /// Set and persist one configuration value
    Set { key: String, value: String },

    /// Print the configuration file location
    Path,
}
