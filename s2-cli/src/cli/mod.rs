//! CLI module organization

pub mod basin;
pub mod commands;
pub mod stream;

pub use commands::{Cli, Commands, ConfigAction, StartArgs, StreamConfigArgs};
