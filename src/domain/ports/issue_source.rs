//! Issue source port.
//!
//! Every tracker adapter, including the record-of-truth board, implements
//! [`IssueSource`]. The reconciliation engine talks to trackers only
//! through this trait.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
#[cfg(doc)]
use crate::domain::errors::DomainError;
use crate::domain::models::{IssueMap, MutationResult, NormalizedIssue};

/// Filters for [`IssueSource::get_issues`].
///
/// Sources apply the filters they can express natively and ignore the
/// rest; a source that cannot filter by key prefix returns all keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueQuery {
    /// Only keys starting with this prefix.
    pub key_prefix: Option<String>,
    /// Only records touched after this bound.
    pub since: Option<DateTime<Utc>>,
    /// Only records assigned to this user.
    pub assignee: Option<String>,
}

impl IssueQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_prefix(mut self, prefix: Option<String>) -> Self {
        self.key_prefix = prefix;
        self
    }

    pub fn with_since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self
    }

    pub fn with_assignee(mut self, assignee: Option<String>) -> Self {
        self.assignee = assignee;
        self
    }
}

/// Uniform read/write contract of an issue tracker.
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Human-readable description used in logs, e.g. `GitHub: org/repo`.
    fn describe(&self) -> String;

    /// Statuses this source considers terminal.
    fn closed_statuses(&self) -> &HashSet<String>;

    /// Whether `status` belongs to the closed vocabulary.
    fn is_closed(&self, status: &str) -> bool {
        self.closed_statuses().contains(status)
    }

    /// Enumerate issues matching `query`, keyed by normalized key.
    async fn get_issues(&self, query: &IssueQuery) -> DomainResult<IssueMap>;

    /// Records the most recent [`get_issues`](Self::get_issues) call
    /// skipped because they could not be read.
    fn unreadable_records(&self) -> usize {
        0
    }

    /// Fetch one issue by native id.
    ///
    /// A record that does not exist is [`DomainError::IssueNotFound`].
    async fn get_issue(&self, id: &str) -> DomainResult<NormalizedIssue>;

    /// Resolve a normalized key to this source's native id.
    ///
    /// Consults the source's key/id cache first and falls back to a
    /// targeted remote query. `Ok(None)` means the key does not exist.
    async fn key_to_id(&self, key: &str) -> DomainResult<Option<String>>;

    /// Overwrite the record for `key` with `issue`'s fields.
    async fn update_issue(&self, key: &str, issue: &NormalizedIssue) -> MutationResult;

    /// Create a record for `key`.
    async fn create_issue(&self, key: &str, issue: &NormalizedIssue) -> MutationResult;

    /// Archive the record for `key`.
    async fn archive_issue(&self, key: &str) -> MutationResult;
}

/// Build a closed-status vocabulary from string literals.
pub fn status_set<I, S>(statuses: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    statuses.into_iter().map(Into::into).collect()
}
