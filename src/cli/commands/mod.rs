//! CLI command implementations.

pub mod notion;
pub mod sync;

use crate::domain::models::Config;

use super::types::{Cli, Commands};
use super::CliError;

/// Run the selected subcommand against the merged configuration.
pub async fn execute(cli: &Cli, config: &Config) -> Result<(), CliError> {
    match &cli.command {
        None => Err(CliError::invalid([
            "no source selected: choose one of github, jira, bitbucket or notion",
        ])),
        Some(Commands::Notion(args)) => notion::execute(args, config, cli.global.json).await,
        Some(command) => sync::execute(command.target(), config, &cli.global).await,
    }
}
