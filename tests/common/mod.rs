//! Common test utilities for integration tests
//!
//! Provides an in-memory [`IssueSource`] that records every mutation, and
//! fixtures shared across test files.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use notion_issues::domain::ports::status_set;
use notion_issues::{
    DomainError, DomainResult, IssueMap, IssueQuery, IssueSource, MutationResult, NormalizedIssue,
};

/// A mutation a [`FakeSource`] received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String, NormalizedIssue),
    Update(String, NormalizedIssue),
    Archive(String),
}

impl Call {
    pub fn key(&self) -> &str {
        match self {
            Self::Create(key, _) | Self::Update(key, _) | Self::Archive(key) => key,
        }
    }
}

/// In-memory tracker.
///
/// `get_issues` honours the key prefix and `since` filters the way the
/// real adapters do, so a `since`-bounded scan omits untouched records and
/// the engine has to backfill them through `key_to_id` / `get_issue`.
/// Native ids are the keys themselves.
///
/// Read failures can be injected per key: an unreadable record is dropped
/// from `get_issues` and counted, a failing lookup makes `key_to_id` answer
/// 503 and a dangling lookup hands out an id `get_issue` cannot find.
pub struct FakeSource {
    name: String,
    closed: HashSet<String>,
    store: Mutex<BTreeMap<String, NormalizedIssue>>,
    calls: Mutex<Vec<Call>>,
    lookups: Mutex<Vec<String>>,
    failing: HashSet<String>,
    failing_lookups: HashSet<String>,
    dangling_lookups: HashSet<String>,
    unreadable: HashSet<String>,
    dropped: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl FakeSource {
    pub fn new(name: &str, closed: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            closed: status_set(closed.iter().copied()),
            store: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            failing_lookups: HashSet::new(),
            dangling_lookups: HashSet::new(),
            unreadable: HashSet::new(),
            dropped: AtomicUsize::new(0),
            cancel_after: None,
        }
    }

    /// Record-of-truth flavoured fake.
    pub fn board() -> Self {
        Self::new("board", &["closed", "resolved"])
    }

    /// External-tracker flavoured fake.
    pub fn tracker() -> Self {
        Self::new("tracker", &["closed"])
    }

    pub fn with_issue(self, issue: NormalizedIssue) -> Self {
        self.store
            .lock()
            .unwrap()
            .insert(issue.key.clone(), issue);
        self
    }

    /// Mutations for `key` report failure.
    pub fn failing_on(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    /// `key_to_id` for `key` fails with a 503.
    pub fn failing_lookup(mut self, key: &str) -> Self {
        self.failing_lookups.insert(key.to_string());
        self
    }

    /// `key_to_id` for `key` returns an id whether or not it exists.
    pub fn dangling_lookup(mut self, key: &str) -> Self {
        self.dangling_lookups.insert(key.to_string());
        self
    }

    /// `get_issues` drops the stored `key` as if it could not be read.
    pub fn unreadable_record(mut self, key: &str) -> Self {
        self.unreadable.insert(key.to_string());
        self
    }

    /// Cancel `token` once `mutations` mutations have been applied.
    pub fn cancelling_after(mut self, mutations: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((mutations, token));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creates(&self) -> Vec<String> {
        self.keys_of(|call| matches!(call, Call::Create(..)))
    }

    pub fn updates(&self) -> Vec<String> {
        self.keys_of(|call| matches!(call, Call::Update(..)))
    }

    pub fn archives(&self) -> Vec<String> {
        self.keys_of(|call| matches!(call, Call::Archive(..)))
    }

    /// Keys resolved through `key_to_id`.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn issue(&self, key: &str) -> Option<NormalizedIssue> {
        self.store.lock().unwrap().get(key).cloned()
    }

    fn keys_of(&self, pick: impl Fn(&Call) -> bool) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| pick(call))
            .map(|call| call.key().to_string())
            .collect()
    }

    fn mutate(&self, call: Call) -> MutationResult {
        let key = call.key().to_string();
        let applied = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call.clone());
            calls.len()
        };
        if let Some((after, token)) = &self.cancel_after {
            if applied >= *after {
                token.cancel();
            }
        }
        if self.failing.contains(&key) {
            return MutationResult::fail(format!("{} rejected {key}", self.name));
        }

        let mut store = self.store.lock().unwrap();
        match call {
            Call::Create(_, issue) | Call::Update(_, issue) => {
                store.insert(
                    key.clone(),
                    NormalizedIssue {
                        key: key.clone(),
                        ..issue
                    },
                );
            }
            Call::Archive(_) => {
                store.remove(&key);
            }
        }
        MutationResult::ok_with_id(key)
    }
}

#[async_trait]
impl IssueSource for FakeSource {
    fn describe(&self) -> String {
        format!("Fake: {}", self.name)
    }

    fn closed_statuses(&self) -> &HashSet<String> {
        &self.closed
    }

    fn unreadable_records(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    async fn get_issues(&self, query: &IssueQuery) -> DomainResult<IssueMap> {
        let store = self.store.lock().unwrap();
        let matching: IssueMap = store
            .iter()
            .filter(|(key, _)| {
                query
                    .key_prefix
                    .as_deref()
                    .is_none_or(|prefix| key.starts_with(prefix))
            })
            .filter(|(_, issue)| {
                query
                    .since
                    .is_none_or(|since| issue.updated_on.is_some_and(|updated| updated > since))
            })
            .map(|(key, issue)| (key.clone(), issue.clone()))
            .collect();
        let (dropped, readable): (IssueMap, IssueMap) = matching
            .into_iter()
            .partition(|(key, _)| self.unreadable.contains(key));
        self.dropped.store(dropped.len(), Ordering::SeqCst);
        Ok(readable)
    }

    async fn get_issue(&self, id: &str) -> DomainResult<NormalizedIssue> {
        self.issue(id)
            .ok_or_else(|| DomainError::IssueNotFound(id.to_string()))
    }

    async fn key_to_id(&self, key: &str) -> DomainResult<Option<String>> {
        self.lookups.lock().unwrap().push(key.to_string());
        if self.failing_lookups.contains(key) {
            return Err(DomainError::RemoteStatus {
                method: "GET".to_string(),
                url: format!("fake://{}/{key}", self.name),
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        if self.dangling_lookups.contains(key) {
            return Ok(Some(key.to_string()));
        }
        let known = self.store.lock().unwrap().contains_key(key);
        Ok(known.then(|| key.to_string()))
    }

    async fn update_issue(&self, key: &str, issue: &NormalizedIssue) -> MutationResult {
        self.mutate(Call::Update(key.to_string(), issue.clone()))
    }

    async fn create_issue(&self, key: &str, issue: &NormalizedIssue) -> MutationResult {
        self.mutate(Call::Create(key.to_string(), issue.clone()))
    }

    async fn archive_issue(&self, key: &str) -> MutationResult {
        self.mutate(Call::Archive(key.to_string()))
    }
}

/// Noon UTC on the given day of March 2024.
pub fn day(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

/// An open issue with a title, last touched at `updated_on`.
pub fn issue(key: &str, updated_on: DateTime<Utc>) -> NormalizedIssue {
    NormalizedIssue::new(key)
        .with_title(format!("Issue {key}"))
        .with_status("open")
        .with_updated_on(updated_on)
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
