//! Reconciliation policy and run report.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Policy knobs for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Restrict the record-of-truth enumeration to keys with this prefix.
    pub key_prefix: Option<String>,
    /// Only enumerate records touched after this bound.
    pub since: Option<DateTime<Utc>>,
    /// Create records whose external status is closed.
    pub create_closed: bool,
    /// Only create records assigned to this user (empty disables).
    pub create_assignee: String,
    /// Archive closed records older than this many days (0 disables).
    pub archive_after_days: u32,
}

impl SyncPolicy {
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.key_prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    pub fn with_since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self
    }

    pub fn with_create_closed(mut self, create_closed: bool) -> Self {
        self.create_closed = create_closed;
        self
    }

    pub fn with_create_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.create_assignee = assignee.into();
        self
    }

    pub fn with_archive_after_days(mut self, days: u32) -> Self {
        self.archive_after_days = days;
        self
    }
}

/// Counters describing what a reconciliation run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub record_count: usize,
    pub external_count: usize,
    pub backfilled: usize,
    pub created: usize,
    pub create_failed: usize,
    pub skipped_closed: usize,
    pub skipped_assignee: usize,
    pub updated_record: usize,
    pub updated_external: usize,
    pub update_failed: usize,
    pub in_sync: usize,
    pub archived: usize,
    pub archive_failed: usize,
    /// Records a source enumerated but could not read.
    pub unreadable: usize,
    /// Keys whose backfill lookup failed; left untouched this run.
    pub unresolved: usize,
}

impl SyncReport {
    /// Number of successful writes across both sources.
    pub fn writes(&self) -> usize {
        self.created + self.updated_record + self.updated_external + self.archived
    }

    /// Number of failed writes and failed reads across both sources.
    pub fn failures(&self) -> usize {
        self.create_failed
            + self.update_failed
            + self.archive_failed
            + self.unreadable
            + self.unresolved
    }
}
