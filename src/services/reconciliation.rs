//! Two-way reconciliation between a record-of-truth source and an
//! external tracker.
//!
//! One pass:
//!
//! 1. Enumerate both sources (independently, concurrently).
//! 2. Backfill keys seen on only one side by direct lookup on the other
//!    side, because a `since`-bounded scan omits unchanged records.
//! 3. For every external key: create it on the record side when it is
//!    genuinely new and passes the creation filters; otherwise push the
//!    newer side's fields onto the older side (strictly newer wins, ties
//!    write nothing); then apply the archival policy.
//!
//! Keys known only to the record side are never deleted and never
//! written to the external side. A key whose backfill lookup failed is
//! left untouched for the run and counted as unresolved.

use std::collections::BTreeSet;
use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{IssueMap, NormalizedIssue, SyncPolicy, SyncReport};
use crate::domain::ports::{IssueQuery, IssueSource};
use crate::services::concurrent_fetcher::{ConcurrentFetcher, FetchJob};

/// Which side of a pair a record lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Record,
    External,
}

/// Decision for a key present on both sides with differing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDirection {
    /// Push the external record onto the record-of-truth source.
    ToRecord,
    /// Push the record-of-truth record onto the external source.
    ToExternal,
    /// Equal timestamps: leave both alone.
    None,
}

/// Strictly newer wins; equal (or both empty) timestamps write nothing.
pub fn update_direction(record: &NormalizedIssue, external: &NormalizedIssue) -> UpdateDirection {
    if external.updated_on > record.updated_on {
        UpdateDirection::ToRecord
    } else if record.updated_on > external.updated_on {
        UpdateDirection::ToExternal
    } else {
        UpdateDirection::None
    }
}

/// Whether a closed record last touched at `updated_on` is old enough to
/// archive. Records with no timestamp are never archived.
pub fn is_aged(updated_on: Option<DateTime<Utc>>, now: DateTime<Utc>, days: u32) -> bool {
    if days == 0 {
        return false;
    }
    updated_on.is_some_and(|updated| now - updated > Duration::days(i64::from(days)))
}

/// Result of backfilling one side.
#[derive(Debug, Default)]
struct Backfill {
    found: usize,
    unresolved: BTreeSet<String>,
}

/// Drives one reconciliation pass between two sources.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    policy: SyncPolicy,
    backfill: ConcurrentFetcher,
    cancel: CancellationToken,
}

impl ReconciliationEngine {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            policy,
            backfill: ConcurrentFetcher::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Observe `token` at every suspension point between mutations.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Number of concurrent single-record lookups during backfill.
    pub fn with_backfill_workers(mut self, workers: usize) -> Self {
        self.backfill = ConcurrentFetcher::new(workers);
        self
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// Reconcile `record` (the record of truth) with `external`.
    pub async fn run<R, E>(&self, record: &R, external: &E) -> DomainResult<SyncReport>
    where
        R: IssueSource + ?Sized,
        E: IssueSource + ?Sized,
    {
        self.run_at(record, external, Utc::now()).await
    }

    /// [`run`](Self::run) with a fixed clock for the archival policy.
    #[tracing::instrument(
        name = "sync",
        skip_all,
        fields(record_source = %record.describe(), external_source = %external.describe())
    )]
    pub async fn run_at<R, E>(
        &self,
        record: &R,
        external: &E,
        now: DateTime<Utc>,
    ) -> DomainResult<SyncReport>
    where
        R: IssueSource + ?Sized,
        E: IssueSource + ?Sized,
    {
        let record_query = IssueQuery::new()
            .with_key_prefix(self.policy.key_prefix.clone())
            .with_since(self.policy.since);
        let external_query = IssueQuery::new().with_since(self.policy.since);

        let (mut external_issues, mut record_issues) = self
            .cancellable(async {
                tokio::try_join!(
                    external.get_issues(&external_query),
                    record.get_issues(&record_query)
                )
            })
            .await?;

        tracing::info!(
            record = record_issues.len(),
            external = external_issues.len(),
            prefix = ?self.policy.key_prefix,
            since = ?self.policy.since,
            "enumerated sources"
        );

        let mut report = SyncReport {
            unreadable: record.unreadable_records() + external.unreadable_records(),
            ..SyncReport::default()
        };
        if report.unreadable > 0 {
            tracing::warn!(unreadable = report.unreadable, "some records could not be read during enumeration");
        }

        let missing_in_record = key_difference(&external_issues, &record_issues);
        let missing_in_external = key_difference(&record_issues, &external_issues);
        let record_backfill = self
            .backfill(record, Side::Record, missing_in_record, &mut record_issues)
            .await?;
        let external_backfill = self
            .backfill(external, Side::External, missing_in_external, &mut external_issues)
            .await?;
        report.backfilled = record_backfill.found + external_backfill.found;
        report.unresolved = record_backfill.unresolved.len() + external_backfill.unresolved.len();

        report.record_count = record_issues.len();
        report.external_count = external_issues.len();

        for (key, external_issue) in &external_issues {
            if self.cancel.is_cancelled() {
                tracing::warn!(key = %key, "cancelled before processing key");
                return Err(DomainError::Cancelled);
            }

            if record_backfill.unresolved.contains(key) {
                tracing::warn!(key = %key, "unresolved on record source; leaving untouched this run");
                continue;
            }

            match record_issues.get(key) {
                None => self.create(record, external, key, external_issue, &mut report).await,
                Some(record_issue) => {
                    self.update(record, external, key, record_issue, external_issue, &mut report)
                        .await;
                    self.archive_if_aged(record, external, key, record_issue, external_issue, now, &mut report)
                        .await?;
                }
            }
        }

        tracing::info!(
            created = report.created,
            updated_record = report.updated_record,
            updated_external = report.updated_external,
            archived = report.archived,
            in_sync = report.in_sync,
            unresolved = report.unresolved,
            unreadable = report.unreadable,
            failures = report.failures(),
            "sync complete"
        );
        Ok(report)
    }

    /// Race `fut` against run cancellation.
    async fn cancellable<T, F>(&self, fut: F) -> DomainResult<T>
    where
        F: Future<Output = DomainResult<T>>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(DomainError::Cancelled),
            result = fut => result,
        }
    }

    /// Resolve `keys` on `source` one by one and merge hits into `issues`.
    ///
    /// Keys whose lookup failed come back as unresolved; a key the source
    /// reports as not found is simply absent.
    async fn backfill<S>(
        &self,
        source: &S,
        side: Side,
        keys: Vec<String>,
        issues: &mut IssueMap,
    ) -> DomainResult<Backfill>
    where
        S: IssueSource + ?Sized,
    {
        if keys.is_empty() {
            return Ok(Backfill::default());
        }
        tracing::debug!(side = ?side, count = keys.len(), "backfilling keys missing from enumeration");

        let jobs = keys
            .into_iter()
            .map(|key| FetchJob::new(source.describe(), key.clone(), key))
            .collect();
        let outcome = self
            .cancellable(async {
                Ok(self
                    .backfill
                    .run(jobs, |job| async move {
                        let found = match source.key_to_id(&job.resource_id).await {
                            Ok(Some(id)) => source.get_issue(&id).await.map(Some),
                            other => other.map(|_| None),
                        };
                        match found {
                            Err(DomainError::IssueNotFound(id)) => {
                                tracing::debug!(key = %job.resource_id, id = %id, "lookup id no longer resolves");
                                Ok(None)
                            }
                            other => other,
                        }
                    })
                    .await)
            })
            .await?;

        let mut backfill = Backfill {
            found: 0,
            unresolved: outcome.failed.into_keys().collect(),
        };
        for key in &backfill.unresolved {
            tracing::warn!(side = ?side, key = %key, "backfill lookup failed; key unresolved");
        }
        for (key, issue) in outcome.resolved {
            let Some(mut issue) = issue else {
                tracing::debug!(side = ?side, key = %key, "key not found by direct lookup");
                continue;
            };
            if issue.key != key {
                tracing::debug!(key = %key, fetched_key = %issue.key, "normalizing backfilled key");
                issue.key.clone_from(&key);
            }
            tracing::debug!(side = ?side, key = %key, "backfilled");
            issues.insert(key, issue);
            backfill.found += 1;
        }
        Ok(backfill)
    }

    async fn create<R, E>(
        &self,
        record: &R,
        external: &E,
        key: &str,
        issue: &NormalizedIssue,
        report: &mut SyncReport,
    ) where
        R: IssueSource + ?Sized,
        E: IssueSource + ?Sized,
    {
        if !self.policy.create_closed && external.is_closed(&issue.status) {
            tracing::debug!(key = %key, status = %issue.status, "not creating closed issue");
            report.skipped_closed += 1;
            return;
        }
        if !self.policy.create_assignee.is_empty() && issue.assignee != self.policy.create_assignee {
            tracing::debug!(
                key = %key,
                assignee = %issue.assignee,
                wanted = %self.policy.create_assignee,
                "not creating issue for another assignee"
            );
            report.skipped_assignee += 1;
            return;
        }

        let result = record.create_issue(key, issue).await;
        if result.success {
            tracing::info!(key = %key, "created in record source");
            report.created += 1;
        } else {
            tracing::error!(
                key = %key,
                error = result.error.as_deref().unwrap_or("unknown error"),
                payload = ?issue,
                "failed to create issue"
            );
            report.create_failed += 1;
        }
    }

    async fn update<R, E>(
        &self,
        record: &R,
        external: &E,
        key: &str,
        record_issue: &NormalizedIssue,
        external_issue: &NormalizedIssue,
        report: &mut SyncReport,
    ) where
        R: IssueSource + ?Sized,
        E: IssueSource + ?Sized,
    {
        if record_issue.content_eq(external_issue) {
            tracing::debug!(key = %key, "in sync");
            report.in_sync += 1;
            return;
        }

        let (result, payload, target) = match update_direction(record_issue, external_issue) {
            UpdateDirection::ToRecord => {
                tracing::debug!(key = %key, "external source is newer");
                (record.update_issue(key, external_issue).await, external_issue, Side::Record)
            }
            UpdateDirection::ToExternal => {
                tracing::debug!(key = %key, "record source is newer");
                (external.update_issue(key, record_issue).await, record_issue, Side::External)
            }
            UpdateDirection::None => {
                tracing::debug!(key = %key, "content differs but timestamps tie; leaving both sides");
                report.in_sync += 1;
                return;
            }
        };

        if result.success {
            tracing::info!(key = %key, target = ?target, "updated");
            match target {
                Side::Record => report.updated_record += 1,
                Side::External => report.updated_external += 1,
            }
        } else {
            tracing::error!(
                key = %key,
                target = ?target,
                error = result.error.as_deref().unwrap_or("unknown error"),
                payload = ?payload,
                "failed to update issue"
            );
            report.update_failed += 1;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn archive_if_aged<R, E>(
        &self,
        record: &R,
        external: &E,
        key: &str,
        record_issue: &NormalizedIssue,
        external_issue: &NormalizedIssue,
        now: DateTime<Utc>,
        report: &mut SyncReport,
    ) -> DomainResult<()>
    where
        R: IssueSource + ?Sized,
        E: IssueSource + ?Sized,
    {
        let days = self.policy.archive_after_days;
        if days == 0 || !external.is_closed(&external_issue.status) {
            return Ok(());
        }
        if !is_aged(record_issue.updated_on, now, days) {
            return Ok(());
        }
        if self.cancel.is_cancelled() {
            return Err(DomainError::Cancelled);
        }

        tracing::info!(key = %key, days, "archiving aged issue");
        let result = record.archive_issue(key).await;
        if result.success {
            report.archived += 1;
        } else {
            tracing::error!(
                key = %key,
                error = result.error.as_deref().unwrap_or("unknown error"),
                "failed to archive issue"
            );
            report.archive_failed += 1;
        }
        Ok(())
    }
}

/// Keys of `left` absent from `right`, in key order.
fn key_difference(left: &IssueMap, right: &IssueMap) -> Vec<String> {
    let right_keys: BTreeSet<&String> = right.keys().collect();
    left.keys()
        .filter(|key| !right_keys.contains(key))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_newer_external_wins() {
        let r = NormalizedIssue::new("K#1").with_updated_on(at(1));
        let e = NormalizedIssue::new("K#1").with_updated_on(at(2));
        assert_eq!(update_direction(&r, &e), UpdateDirection::ToRecord);
        assert_eq!(update_direction(&e, &r), UpdateDirection::ToExternal);
    }

    #[test]
    fn test_tie_writes_nothing() {
        let r = NormalizedIssue::new("K#1").with_updated_on(at(1));
        let e = NormalizedIssue::new("K#1").with_updated_on(at(1));
        assert_eq!(update_direction(&r, &e), UpdateDirection::None);

        let empty = NormalizedIssue::new("K#1");
        assert_eq!(update_direction(&empty, &empty), UpdateDirection::None);
    }

    #[test]
    fn test_missing_timestamp_loses() {
        let r = NormalizedIssue::new("K#1");
        let e = NormalizedIssue::new("K#1").with_updated_on(at(1));
        assert_eq!(update_direction(&r, &e), UpdateDirection::ToRecord);
    }

    #[test]
    fn test_is_aged_threshold() {
        let now = at(20);
        assert!(is_aged(Some(at(12)), now, 7));
        assert!(!is_aged(Some(at(14)), now, 7));
        assert!(!is_aged(Some(at(13)), now, 7), "exactly 7 days is not older than 7 days");
        assert!(!is_aged(None, now, 7));
        assert!(!is_aged(Some(at(1)), now, 0));
    }

    #[test]
    fn test_key_difference() {
        let mut a = IssueMap::new();
        let mut b = IssueMap::new();
        for key in ["A#1", "A#2", "A#3"] {
            a.insert(key.to_string(), NormalizedIssue::new(key));
        }
        for key in ["A#2", "A#4"] {
            b.insert(key.to_string(), NormalizedIssue::new(key));
        }
        assert_eq!(key_difference(&a, &b), vec!["A#1", "A#3"]);
        assert_eq!(key_difference(&b, &a), vec!["A#4"]);
    }
}
