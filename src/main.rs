//! CATS node entry point.

use clap::Parser;

use cats::application::NamedThreadFactory;
use cats::cli::{self, commands, Cli, Commands};
use cats::infrastructure::logging::{LogConfig, LoggerImpl};

fn main() {
    let cli = Cli::parse();

    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => cli::handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => cli::handle_error(err, cli.json),
    };

    let runtime = match NamedThreadFactory::new("cats-worker").build_runtime(config.scheduler.pool_size) {
        Ok(runtime) => runtime,
        Err(err) => cli::handle_error(err.into(), cli.json),
    };

    let json = cli.json;
    let result = runtime.block_on(async move {
        match cli.command {
            Commands::Run(args) => commands::run::execute(args, config, json).await,
            Commands::Config(args) => commands::config::execute(args, config, json),
        }
    });

    if let Err(err) = result {
        cli::handle_error(err, json);
    }
}
