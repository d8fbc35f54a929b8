//! `notion`: board maintenance without an external tracker.

use anyhow::Context;
use serde::Serialize;

use crate::adapters::plugins::notion::NotionSource;
use crate::cli::output::{output, CommandOutput};
use crate::cli::types::NotionArgs;
use crate::cli::CliError;
use crate::domain::models::Config;
use crate::infrastructure::config::{ConfigLoader, Target};

#[derive(Debug, Serialize)]
pub struct DeleteOutput {
    pub database: String,
    pub pattern: String,
    pub prefix_match: bool,
    pub archived: usize,
}

impl CommandOutput for DeleteOutput {
    fn to_human(&self) -> String {
        let what = if self.prefix_match {
            format!("keys starting with '{}'", self.pattern)
        } else {
            format!("key '{}'", self.pattern)
        };
        format!(
            "Archived {} page(s) for {what} in {}",
            self.archived, self.database
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: &NotionArgs, config: &Config, json: bool) -> Result<(), CliError> {
    let errors = ConfigLoader::validate_for(config, Target::Notion);
    if !errors.is_empty() {
        return Err(CliError::invalid(errors));
    }
    ConfigLoader::validate(config)?;

    let board = NotionSource::new(&config.notion, &config.fetch, config.retry.clone())
        .context("Failed to set up the Notion board")?;

    let result = match (&args.delete_key, &args.delete_matching_keys) {
        (Some(key), _) => DeleteOutput {
            database: config.notion.database.clone(),
            pattern: key.clone(),
            prefix_match: false,
            archived: board.delete_key(key).await.context("Failed to delete key")?,
        },
        (None, Some(prefix)) => {
            if prefix.is_empty() {
                return Err(CliError::invalid(["--delete-matching-keys needs a non-empty prefix"]));
            }
            DeleteOutput {
                database: config.notion.database.clone(),
                pattern: prefix.clone(),
                prefix_match: true,
                archived: board
                    .delete_matching_keys(prefix)
                    .await
                    .context("Failed to delete matching keys")?,
            }
        }
        (None, None) => {
            return Err(CliError::invalid([
                "notion needs --delete-key or --delete-matching-keys",
            ]))
        }
    };

    tracing::info!(archived = result.archived, pattern = %result.pattern, "board maintenance finished");
    output(&result, json);
    Ok(())
}
