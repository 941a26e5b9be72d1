//! `cats config`: show or validate configuration.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

/// Arguments of `cats config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config action to run.
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// `cats config` actions.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Validate a configuration file, or the effective configuration
    Validate {
        /// File to validate instead of the effective configuration
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct ConfigOutput {
    config: Config,
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_default()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
struct ValidationOutput {
    valid: bool,
    source: String,
}

impl CommandOutput for ValidationOutput {
    fn to_human(&self) -> String {
        format!("Configuration from {} is valid", self.source)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(args: ConfigArgs, config: Config, json_mode: bool) -> Result<()> {
    match args.command {
        ConfigCommand::Show => {
            output(&ConfigOutput { config }, json_mode);
            Ok(())
        }
        ConfigCommand::Validate { file } => {
            let source = match file {
                Some(path) => {
                    ConfigLoader::load_from_file(&path)?;
                    path.display().to_string()
                }
                None => {
                    ConfigLoader::validate(&config).context("Effective configuration is invalid")?;
                    "effective configuration".to_string()
                }
            };
            output(&ValidationOutput { valid: true, source }, json_mode);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_accepts_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.yaml");
        std::fs::write(&path, "scheduler:\n  pool_size: 4\n").unwrap();

        let args = ConfigArgs {
            command: ConfigCommand::Validate { file: Some(path) },
        };
        assert!(execute(args, Config::default(), true).is_ok());
    }

    #[test]
    fn test_validate_file_rejects_bad_lease_timing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.yaml");
        std::fs::write(&path, "lease:\n  ttl_ms: 1000\n  renewal_interval_ms: 1000\n").unwrap();

        let args = ConfigArgs {
            command: ConfigCommand::Validate { file: Some(path) },
        };
        assert!(execute(args, Config::default(), false).is_err());
    }

    #[test]
    fn test_config_output_is_yaml() {
        let human = ConfigOutput { config: Config::default() }.to_human();
        assert!(human.contains("scheduler:"));
        assert!(human.contains("lease:"));
    }
}
