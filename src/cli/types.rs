//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::config::ConfigArgs;
use super::commands::run::RunArgs;

/// Command line of the `cats` binary.
#[derive(Parser, Debug)]
#[command(name = "cats")]
#[command(about = "CATS - cloud asset tracking node", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file, replacing the `.cats/` lookup
    #[arg(short, long, global = true, env = "CATS_CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a caching node against fixture providers
    Run(RunArgs),

    /// Inspect and validate configuration
    Config(ConfigArgs),
}
