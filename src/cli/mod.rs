//! Command-line interface.

pub mod commands;
pub mod output;
pub mod since;
pub mod types;

use std::process::ExitCode;

use thiserror::Error;

use crate::infrastructure::config::ConfigError;

pub use types::{Cli, Commands, GlobalArgs};

/// Failure of a command, split by the exit code it maps to.
#[derive(Debug, Error)]
pub enum CliError {
    /// Problems found before any network call
    #[error("invalid configuration:\n{}", bullet_list(.0))]
    Invalid(Vec<String>),

    /// Failure while talking to a tracker
    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

impl CliError {
    pub fn invalid<I, E>(errors: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: ToString,
    {
        Self::Invalid(errors.into_iter().map(|err| err.to_string()).collect())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Invalid(_) => 1,
            Self::Runtime(_) => 2,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::invalid([err])
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("  - {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Report `err` and turn it into the process exit code.
pub fn handle_error(err: &CliError) -> ExitCode {
    match err {
        CliError::Invalid(_) => eprintln!("{err}"),
        CliError::Runtime(source) => {
            tracing::error!(error = ?source, "run failed");
            eprintln!("Error: {source:#}");
        }
    }
    ExitCode::from(err.exit_code())
}
