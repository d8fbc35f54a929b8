//! The Notion board as the record-of-truth [`IssueSource`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{OnceCell, RwLock};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::issue::format_timestamp;
use crate::domain::models::{
    FetchConfig, IssueMap, KeyIdMap, MutationResult, NormalizedIssue, NotionConfig, RetryConfig,
};
use crate::domain::ports::{status_set, IssueQuery, IssueSource};
use crate::services::concurrent_fetcher::{ConcurrentFetcher, FetchJob};

use super::client::NotionClient;
use super::models::{columns, flatten_property, issue_properties, NotionPage, PageProperties};

/// Issue board stored as a Notion database.
#[derive(Debug)]
pub struct NotionSource {
    client: NotionClient,
    database: String,
    database_id: OnceCell<String>,
    keys: KeyIdMap,
    page_workers: ConcurrentFetcher,
    fetch_comments: bool,
    comments: RwLock<HashMap<String, Vec<String>>>,
    closed: HashSet<String>,
    unreadable: AtomicUsize,
}

impl NotionSource {
    pub fn new(config: &NotionConfig, fetch: &FetchConfig, retry: RetryConfig) -> DomainResult<Self> {
        Ok(Self {
            client: NotionClient::new(config, retry, fetch.page_size)?,
            database: config.database.clone(),
            database_id: OnceCell::new(),
            keys: KeyIdMap::new(),
            page_workers: ConcurrentFetcher::new(fetch.page_workers),
            fetch_comments: fetch.fetch_comments,
            comments: RwLock::new(HashMap::new()),
            closed: status_set(["closed", "resolved"]),
            unreadable: AtomicUsize::new(0),
        })
    }

    /// Database id, resolved by title on first use.
    async fn database_id(&self) -> DomainResult<&str> {
        let id = self
            .database_id
            .get_or_try_init(|| async {
                let id = self
                    .client
                    .database_id_for_name(&self.database)
                    .await?
                    .ok_or_else(|| {
                        DomainError::ValidationFailed(format!(
                            "no Notion database named '{}' is shared with this integration",
                            self.database
                        ))
                    })?;
                tracing::debug!(database = %self.database, id = %id, "resolved database id");
                Ok::<_, DomainError>(id)
            })
            .await?;
        Ok(id.as_str())
    }

    /// Comment texts fetched for `key` during the last enumeration.
    pub async fn comments(&self, key: &str) -> Vec<String> {
        self.comments.read().await.get(key).cloned().unwrap_or_default()
    }

    /// Archive the page holding `key`. Returns how many pages were archived.
    pub async fn delete_key(&self, key: &str) -> DomainResult<usize> {
        let Some(page_id) = self.key_to_id(key).await? else {
            tracing::warn!(key = %key, "no board page for key");
            return Ok(0);
        };
        self.client.archive_page(&page_id).await?;
        self.keys.remove(key).await;
        tracing::info!(key = %key, page_id = %page_id, "archived page");
        Ok(1)
    }

    /// Archive every page whose key starts with `prefix`. Returns how many
    /// pages were archived; failures are logged and skipped.
    pub async fn delete_matching_keys(&self, prefix: &str) -> DomainResult<usize> {
        if prefix.is_empty() {
            return Err(DomainError::ValidationFailed(
                "refusing to delete with an empty key prefix".to_string(),
            ));
        }
        let database_id = self.database_id().await?;
        let filter = key_filter("starts_with", prefix);
        let pages = self
            .client
            .query_database(database_id, Some(filter))
            .collect_all()
            .await?;

        let mut archived = 0;
        for page in pages {
            match self.client.archive_page(&page.id).await {
                Ok(_) => {
                    if let Some(key) = self.keys.key_for_id(&page.id).await {
                        self.keys.remove(&key).await;
                    }
                    tracing::info!(page_id = %page.id, "archived page");
                    archived += 1;
                }
                Err(err) => {
                    tracing::error!(page_id = %page.id, error = %err, "failed to archive page");
                }
            }
        }
        Ok(archived)
    }

    /// Resolve every property of `page` and map it to an issue.
    ///
    /// A page with any unresolved property is rejected as a whole so a
    /// partial read can never be written back as blanks. A page without an
    /// issue key comes back with an empty key.
    async fn resolve_page(&self, page: &NotionPage) -> DomainResult<NormalizedIssue> {
        let jobs = page
            .property_refs()
            .into_iter()
            .map(|(name, reference)| FetchJob::new(page.id.clone(), name, reference.id))
            .collect();
        let outcome = ConcurrentFetcher::per_job()
            .run(jobs, |job| async move {
                self.client
                    .get_property(&job.parent_id, &job.resource_id)
                    .await
                    .map(|value| flatten_property(&value))
            })
            .await;

        if !outcome.is_complete() {
            let mut failed: Vec<_> = outcome.failed.into_keys().collect();
            failed.sort();
            return Err(DomainError::Decode(format!(
                "page {}: unresolved properties {}",
                page.id,
                failed.join(", ")
            )));
        }

        let issue = PageProperties(outcome.resolved).to_issue(page);
        if self.fetch_comments && !issue.key.is_empty() {
            match self.client.get_comments(&page.id).await {
                Ok(comments) => {
                    let texts = comments.iter().map(|c| c.plain_text()).collect::<Vec<_>>();
                    tracing::debug!(key = %issue.key, count = texts.len(), "fetched comments");
                    self.comments.write().await.insert(issue.key.clone(), texts);
                }
                Err(err) => {
                    tracing::warn!(key = %issue.key, error = %err, "failed to fetch comments");
                }
            }
        }

        Ok(issue)
    }

    /// Resolve one page of query results with the page-level worker pool.
    ///
    /// Returns how many pages could not be read.
    async fn resolve_batch(&self, database_id: &str, batch: Vec<NotionPage>, issues: &mut IssueMap) -> usize {
        let by_id: HashMap<String, NotionPage> =
            batch.into_iter().map(|page| (page.id.clone(), page)).collect();
        let jobs = by_id
            .keys()
            .map(|id| FetchJob::new(database_id, id.clone(), id.clone()))
            .collect();

        let by_id = &by_id;
        let outcome = self
            .page_workers
            .run(jobs, |job| async move {
                match by_id.get(&job.resource_id) {
                    Some(page) => self.resolve_page(page).await,
                    None => Err(DomainError::IssueNotFound(job.resource_id)),
                }
            })
            .await;

        for (page_id, issue) in outcome.resolved {
            if issue.key.is_empty() {
                tracing::debug!(page = %page_id, "skipping page without {}", columns::ISSUE_KEY);
                continue;
            }
            self.keys.insert(issue.key.clone(), page_id).await;
            if let Some(previous) = issues.insert(issue.key.clone(), issue) {
                tracing::warn!(key = %previous.key, "duplicate issue key on board");
            }
        }
        outcome.failed.len()
    }
}

fn key_filter(operator: &str, value: &str) -> Value {
    json!({
        "property": columns::ISSUE_KEY,
        "rich_text": { operator: value }
    })
}

/// Compound query filter for `query`, `None` when unfiltered.
pub fn query_filter(query: &IssueQuery) -> Option<Value> {
    let mut filters = Vec::new();
    if let Some(prefix) = query.key_prefix.as_deref().filter(|p| !p.is_empty()) {
        filters.push(key_filter("starts_with", prefix));
    }
    if let Some(since) = query.since {
        filters.push(json!({
            "timestamp": "last_edited_time",
            "last_edited_time": { "after": format_timestamp(Some(since)) }
        }));
    }
    if let Some(assignee) = query.assignee.as_deref().filter(|a| !a.is_empty()) {
        filters.push(json!({
            "property": columns::ASSIGNEE,
            "select": { "equals": assignee }
        }));
    }

    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(json!({ "and": filters })),
    }
}

#[async_trait]
impl IssueSource for NotionSource {
    fn describe(&self) -> String {
        format!("Notion: {}", self.database)
    }

    fn closed_statuses(&self) -> &HashSet<String> {
        &self.closed
    }

    async fn get_issues(&self, query: &IssueQuery) -> DomainResult<IssueMap> {
        let database_id = self.database_id().await?;
        let filter = query_filter(query);
        tracing::debug!(filter = ?filter, "querying board");

        let mut pages = self.client.query_database(database_id, filter);
        let mut issues = IssueMap::new();
        let mut unreadable = 0;
        self.unreadable.store(0, Ordering::Relaxed);
        loop {
            let batch = pages.fetch_next().await?.to_vec();
            unreadable += self.resolve_batch(database_id, batch, &mut issues).await;
            if pages.is_exhausted() {
                break;
            }
        }
        self.unreadable.store(unreadable, Ordering::Relaxed);

        if unreadable > 0 {
            tracing::warn!(unreadable, "some board pages could not be read");
        }
        tracing::debug!(count = issues.len(), pages = pages.pages_fetched(), "board enumerated");
        Ok(issues)
    }

    fn unreadable_records(&self) -> usize {
        self.unreadable.load(Ordering::Relaxed)
    }

    async fn get_issue(&self, id: &str) -> DomainResult<NormalizedIssue> {
        let page = self.client.get_page(id).await.map_err(|err| err.not_found_for(id))?;
        let issue = self.resolve_page(&page).await?;
        if issue.key.is_empty() {
            return Err(DomainError::Decode(format!(
                "page {} has no {}",
                page.id,
                columns::ISSUE_KEY
            )));
        }
        self.keys.insert(issue.key.clone(), page.id).await;
        Ok(issue)
    }

    async fn key_to_id(&self, key: &str) -> DomainResult<Option<String>> {
        if let Some(id) = self.keys.get(key).await {
            return Ok(Some(id));
        }
        let database_id = self.database_id().await?;
        let mut pages = self
            .client
            .query_database(database_id, Some(key_filter("equals", key)));
        let Some(page) = pages.next().await? else {
            return Ok(None);
        };
        self.keys.insert(key, page.id.clone()).await;
        Ok(Some(page.id))
    }

    async fn update_issue(&self, key: &str, issue: &NormalizedIssue) -> MutationResult {
        let page_id = match self.key_to_id(key).await {
            Ok(Some(id)) => id,
            Ok(None) => return MutationResult::fail(format!("no board page for {key}")),
            Err(err) => return err.into(),
        };
        match self.client.update_page(&page_id, issue_properties(key, issue)).await {
            Ok(page) => MutationResult::ok_with_id(page.id),
            Err(err) => err.into(),
        }
    }

    async fn create_issue(&self, key: &str, issue: &NormalizedIssue) -> MutationResult {
        let database_id = match self.database_id().await {
            Ok(id) => id,
            Err(err) => return err.into(),
        };
        match self.client.create_page(database_id, issue_properties(key, issue)).await {
            Ok(page) => {
                self.keys.insert(key, page.id.clone()).await;
                MutationResult::ok_with_id(page.id)
            }
            Err(err) => err.into(),
        }
    }

    async fn archive_issue(&self, key: &str) -> MutationResult {
        let page_id = match self.key_to_id(key).await {
            Ok(Some(id)) => id,
            Ok(None) => return MutationResult::fail(format!("no board page for {key}")),
            Err(err) => return err.into(),
        };
        match self.client.archive_page(&page_id).await {
            Ok(_) => {
                self.keys.remove(key).await;
                MutationResult::ok_with_id(page_id)
            }
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_single_filter_is_not_wrapped() {
        let query = IssueQuery::new().with_key_prefix(Some("widgets".to_string()));
        let filter = query_filter(&query).unwrap();
        assert_eq!(filter["property"], "Issue Key");
        assert_eq!(filter["rich_text"]["starts_with"], "widgets");
    }

    #[test]
    fn test_multiple_filters_are_anded() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let query = IssueQuery::new()
            .with_key_prefix(Some("widgets".to_string()))
            .with_since(Some(since))
            .with_assignee(Some("ada".to_string()));
        let filter = query_filter(&query).unwrap();
        let clauses = filter["and"].as_array().unwrap();
        assert_eq!(clauses.len(), 3);
        assert_eq!(clauses[1]["last_edited_time"]["after"], "2024-03-01T08:00:00Z");
        assert_eq!(clauses[2]["select"]["equals"], "ada");
    }

    #[test]
    fn test_empty_query_has_no_filter() {
        assert!(query_filter(&IssueQuery::new()).is_none());
        let blank = IssueQuery::new().with_key_prefix(Some(String::new()));
        assert!(query_filter(&blank).is_none());
    }
}
