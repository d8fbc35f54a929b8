//! Normalized issue model.
//!
//! [`NormalizedIssue`] is the canonical record exchanged between every
//! [`IssueSource`](crate::domain::ports::IssueSource) and the
//! reconciliation engine. String fields are never optional: absence is an
//! empty string. Timestamps are UTC and truncated to the precision the
//! owning source can represent.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel assignee for records nobody is assigned to.
pub const UNASSIGNED_USER: &str = "unassigned";

/// Wire format used when a timestamp is written back to a source.
pub const ISO_UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Issues keyed by their normalized key.
///
/// Ordered so that a reconciliation pass visits keys deterministically.
pub type IssueMap = BTreeMap<String, NormalizedIssue>;

/// Precision a source stores timestamps with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    #[default]
    Seconds,
    Minutes,
}

/// The cross-tracker issue shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedIssue {
    /// Stable source-namespaced key, e.g. `REPO#42`.
    pub key: String,
    pub title: String,
    pub status: String,
    /// Assignee login, or [`UNASSIGNED_USER`].
    pub assignee: String,
    pub reporter: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, with = "timestamp_or_empty")]
    pub due_on: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp_or_empty")]
    pub opened_on: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp_or_empty")]
    pub closed_on: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp_or_empty")]
    pub updated_on: Option<DateTime<Utc>>,
    pub link: String,
}

impl NormalizedIssue {
    /// Create an empty issue with the given key and the unassigned sentinel.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            assignee: UNASSIGNED_USER.to_string(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = assignee.into();
        self
    }

    pub fn with_reporter(mut self, reporter: impl Into<String>) -> Self {
        self.reporter = reporter.into();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_updated_on(mut self, updated_on: DateTime<Utc>) -> Self {
        self.updated_on = Some(updated_on);
        self
    }

    pub fn with_opened_on(mut self, opened_on: DateTime<Utc>) -> Self {
        self.opened_on = Some(opened_on);
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    /// Field-by-field equality ignoring volatile fields.
    ///
    /// `updated_on`, `opened_on`, `reporter` and `link` are either derived
    /// by the source or not independently editable, so differences there
    /// never justify a write.
    pub fn content_eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.title == other.title
            && self.status == other.status
            && self.assignee == other.assignee
            && self.labels == other.labels
            && self.due_on == other.due_on
            && self.closed_on == other.closed_on
    }

    /// Whether nobody is assigned.
    pub fn is_unassigned(&self) -> bool {
        self.assignee.is_empty() || self.assignee == UNASSIGNED_USER
    }
}

/// Parse a timestamp in any of the formats the supported trackers emit.
///
/// Accepts RFC 3339, ISO 8601 with a compact offset (`+0000`), naive
/// date-times (assumed UTC) and bare dates (midnight UTC). Returns `None`
/// for empty or unparseable input.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Truncate a timestamp to the given granularity.
pub fn truncate(dt: DateTime<Utc>, granularity: Granularity) -> DateTime<Utc> {
    let dt = dt.trunc_subsecs(0);
    match granularity {
        Granularity::Seconds => dt,
        Granularity::Minutes => dt.with_second(0).unwrap_or(dt),
    }
}

/// Parse and truncate in one step; empty input stays empty.
pub fn normalize_timestamp(raw: &str, granularity: Granularity) -> Option<DateTime<Utc>> {
    parse_timestamp(raw).map(|dt| truncate(dt, granularity))
}

/// Render an optional timestamp in the wire format, empty when absent.
pub fn format_timestamp(dt: Option<DateTime<Utc>>) -> String {
    dt.map(|dt| dt.format(ISO_UTC_FORMAT).to_string())
        .unwrap_or_default()
}

/// Serde adapter representing an absent timestamp as `""`.
mod timestamp_or_empty {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.is_empty() {
            return Ok(None);
        }
        super::parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}
