//! `github`, `jira` and `bitbucket`: reconcile the board with one tracker.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::plugins::{create_external_source, create_record_source};
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::since::{read_since_file, write_since_file};
use crate::cli::types::GlobalArgs;
use crate::cli::CliError;
use crate::domain::models::{Config, SyncPolicy, SyncReport};
use crate::domain::ports::IssueSource;
use crate::infrastructure::config::{ConfigLoader, Target};
use crate::services::ReconciliationEngine;

#[derive(Debug, Serialize)]
pub struct SyncOutput {
    pub record_source: String,
    pub external_source: String,
    pub since: Option<DateTime<Utc>>,
    pub report: SyncReport,
}

impl SyncOutput {
    /// One-line summary of the run.
    pub fn summary(&self) -> String {
        let report = &self.report;
        format!(
            "{} <-> {}: {} board / {} external issues, {} created, {} updated, {} archived, {} in sync, {} failed",
            self.record_source,
            self.external_source,
            report.record_count,
            report.external_count,
            report.created,
            report.updated_record + report.updated_external,
            report.archived,
            report.in_sync,
            report.failures(),
        )
    }
}

impl CommandOutput for SyncOutput {
    fn to_human(&self) -> String {
        format!(
            "{}\n{}",
            self.summary(),
            TableFormatter::new().format_report(&self.report)
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Policy for one run from the merged settings.
pub fn build_policy(config: &Config, since: Option<DateTime<Utc>>, key_prefix: Option<String>) -> SyncPolicy {
    let policy = SyncPolicy::default()
        .with_since(since)
        .with_create_closed(config.sync.create_closed)
        .with_create_assignee(config.sync.create_assignee.clone())
        .with_archive_after_days(config.sync.archive_after_days);
    match key_prefix {
        Some(prefix) => policy.with_key_prefix(prefix),
        None => policy,
    }
}

pub async fn execute(target: Target, config: &Config, global: &GlobalArgs) -> Result<(), CliError> {
    let errors = ConfigLoader::validate_for(config, target);
    if !errors.is_empty() {
        return Err(CliError::invalid(errors));
    }
    ConfigLoader::validate(config)?;

    let started = Utc::now();
    let since = match (global.since, &config.sync.since_file) {
        (Some(since), _) => Some(since),
        (None, Some(path)) => read_since_file(path).await?,
        (None, None) => None,
    };

    let record = create_record_source(config).context("Failed to set up the Notion board")?;
    let external =
        create_external_source(target, config).context("Failed to set up the external tracker")?;
    let policy = build_policy(config, since, external.key_prefix());

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; stopping after the current mutation");
                cancel.cancel();
            }
        }
    });

    let engine = ReconciliationEngine::new(policy)
        .with_cancellation(cancel)
        .with_backfill_workers(config.fetch.page_workers);
    let result = engine.run(&record, &external).await;
    ctrl_c.abort();
    let report = result.context("Sync failed")?;

    let result = SyncOutput {
        record_source: record.describe(),
        external_source: external.describe(),
        since,
        report,
    };
    info!(
        created = result.report.created,
        updated_record = result.report.updated_record,
        updated_external = result.report.updated_external,
        archived = result.report.archived,
        in_sync = result.report.in_sync,
        failures = result.report.failures(),
        "{}",
        result.summary()
    );
    output(&result, global.json);

    if let Some(path) = &config.sync.since_file {
        advance_since_file(path, started, &result.report).await?;
    }
    Ok(())
}

/// Move the since-file to `started` when the run left nothing behind.
///
/// Any failed write, unreadable record or unresolved key keeps the old
/// bound so the next run looks at those records again. Returns whether the
/// file was written.
pub async fn advance_since_file(path: &Path, started: DateTime<Utc>, report: &SyncReport) -> anyhow::Result<bool> {
    if report.failures() > 0 {
        warn!(
            path = %path.display(),
            failures = report.failures(),
            unreadable = report.unreadable,
            unresolved = report.unresolved,
            "since-file left unchanged because some records failed"
        );
        return Ok(false);
    }
    write_since_file(path, started).await?;
    Ok(true)
}
