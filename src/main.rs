//! notion-issues CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use notion_issues::cli::{self, Cli, CliError};
use notion_issues::infrastructure::config::ConfigLoader;
use notion_issues::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match ConfigLoader::load(cli.global.config.as_deref()) {
        Ok(config) => config,
        Err(err) => return cli::handle_error(&CliError::invalid([format!("{err:#}")])),
    };
    cli.global.apply(&mut config);
    if let Some(command) = &cli.command {
        command.apply(&mut config);
    }

    let logger = LogConfig::from_settings(&config.logging, cli.global.verbose, cli.global.log_format)
        .and_then(|log_config| LoggerImpl::init(&log_config));
    let _logger = match logger {
        Ok(logger) => logger,
        Err(err) => return cli::handle_error(&CliError::invalid([format!("{err:#}")])),
    };
    tracing::debug!(command = ?cli.command.as_ref().map(|c| c.target()), "starting");

    match cli::commands::execute(&cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => cli::handle_error(&err),
    }
}
