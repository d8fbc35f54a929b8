//! Bitbucket Cloud REST client (API 2.0).

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BitbucketConfig, RetryConfig};
use crate::domain::ports::{Page, PageRequest, PageSource};
use crate::infrastructure::http::{Auth, RestClient};
use crate::services::paginated::PaginatedSequence;

use super::models::{BitbucketIssue, WorkspaceMembership};

/// Largest page the issues endpoint serves.
const MAX_PAGELEN: u32 = 50;

/// HTTP client for one Bitbucket repository.
#[derive(Debug, Clone)]
pub struct BitbucketClient {
    rest: RestClient,
    workspace: String,
    repo: String,
    page_size: u32,
}

impl BitbucketClient {
    pub fn new(config: &BitbucketConfig, retry: RetryConfig, page_size: u32) -> DomainResult<Self> {
        let (workspace, repo) = config.repo.split_once('/').ok_or_else(|| {
            DomainError::ValidationFailed(format!(
                "Bitbucket repo must be workspace/name, got: '{}'",
                config.repo
            ))
        })?;
        let rest = RestClient::new(
            "bitbucket",
            config.server.clone(),
            Auth::Basic {
                user: config.user.clone(),
                password: config.app_password.clone(),
            },
            &[("accept", "application/json")],
            &config.rate_limit,
            retry,
        )?;
        Ok(Self {
            rest,
            workspace: workspace.to_string(),
            repo: repo.to_string(),
            page_size,
        })
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn issues_path(&self) -> String {
        format!("/2.0/repositories/{}/{}/issues", self.workspace, self.repo)
    }

    /// Lazy sequence of issues, filtered by a Bitbucket query when given.
    pub fn list_issues(&self, q: Option<String>) -> PaginatedSequence<'_, Self, BitbucketIssue> {
        let mut request = PageRequest::get(self.issues_path());
        if let Some(q) = q {
            request = request.with_query("q", q);
        }
        PaginatedSequence::new(self, request)
    }

    pub async fn get_issue(&self, id: u64) -> DomainResult<BitbucketIssue> {
        self.rest
            .get(&format!("{}/{id}", self.issues_path()), &[])
            .await?
            .json()
    }

    pub async fn update_issue(&self, id: u64, body: &Value) -> DomainResult<BitbucketIssue> {
        self.rest
            .put(&format!("{}/{id}", self.issues_path()), body)
            .await?
            .json()
    }

    pub async fn create_issue(&self, body: &Value) -> DomainResult<BitbucketIssue> {
        self.rest.post(&self.issues_path(), body).await?.json()
    }

    pub async fn workspace_members(&self) -> DomainResult<Vec<WorkspaceMembership>> {
        PaginatedSequence::new(
            self,
            PageRequest::get(format!("/2.0/workspaces/{}/members", self.workspace)),
        )
        .collect_all()
        .await
    }
}

/// The cursor is the absolute `next` URL of the previous page.
#[async_trait]
impl PageSource for BitbucketClient {
    async fn fetch_page(&self, request: &PageRequest, cursor: Option<&str>) -> DomainResult<Page> {
        let body = match cursor {
            Some(next) => self.rest.get(next, &[]).await?.body,
            None => {
                let mut query = request.query.clone();
                query.push(("pagelen".to_string(), self.page_size.min(MAX_PAGELEN).to_string()));
                self.rest.get(&request.path, &query).await?.body
            }
        };

        let results = body
            .get("values")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let next_cursor = body.get("next").and_then(Value::as_str).map(str::to_string);
        Ok(Page {
            results,
            has_more: next_cursor.is_some(),
            next_cursor,
        })
    }
}
