//! GitHub HTTP client.
//!
//! Wraps the GitHub REST API v3 through a rate-limited [`RestClient`].
//! List endpoints page through the `Link: <...>; rel="next"` header.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::issue::format_timestamp;
use crate::domain::models::{GithubConfig, RetryConfig};
use crate::domain::ports::{Page, PageRequest, PageSource};
use crate::infrastructure::http::{Auth, RestClient};
use crate::services::paginated::PaginatedSequence;

use super::models::{GitHubCreateIssueRequest, GitHubIssue, GitHubIssueRef, GitHubIssueUpdateRequest};

/// HTTP client for one GitHub repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    rest: RestClient,
    owner: String,
    repo: String,
    page_size: u32,
}

impl GitHubClient {
    pub fn new(config: &GithubConfig, retry: RetryConfig, page_size: u32) -> DomainResult<Self> {
        let (owner, repo) = config.repo.split_once('/').ok_or_else(|| {
            DomainError::ValidationFailed(format!(
                "GitHub repo must be owner/name, got: '{}'",
                config.repo
            ))
        })?;
        let rest = RestClient::new(
            "github",
            config.base_url.clone(),
            Auth::Bearer(config.token.clone()),
            &[
                ("accept", "application/vnd.github+json"),
                ("x-github-api-version", "2022-11-28"),
            ],
            &config.rate_limit,
            retry,
        )?;
        Ok(Self {
            rest,
            owner: owner.to_string(),
            repo: repo.to_string(),
            page_size,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn issues_path(&self) -> String {
        format!("/repos/{}/{}/issues", self.owner, self.repo)
    }

    /// Lazy sequence of every issue (and pull request) in the repository,
    /// optionally only those updated at or after `since`.
    pub fn list_issues(
        &self,
        since: Option<DateTime<Utc>>,
        assignee: Option<&str>,
    ) -> PaginatedSequence<'_, Self, GitHubIssue> {
        let mut request = PageRequest::get(self.issues_path()).with_query("state", "all");
        if since.is_some() {
            request = request.with_query("since", format_timestamp(since));
        }
        if let Some(assignee) = assignee {
            request = request.with_query("assignee", assignee);
        }
        PaginatedSequence::new(self, request)
    }

    pub async fn get_issue(&self, number: u64) -> DomainResult<GitHubIssue> {
        self.rest
            .get(&format!("{}/{number}", self.issues_path()), &[])
            .await?
            .json()
    }

    pub async fn update_issue(
        &self,
        number: u64,
        update: &GitHubIssueUpdateRequest,
    ) -> DomainResult<GitHubIssueRef> {
        let body = serde_json::to_value(update)?;
        self.rest
            .patch(&format!("{}/{number}", self.issues_path()), &body)
            .await?
            .json()
    }

    pub async fn create_issue(&self, create: &GitHubCreateIssueRequest) -> DomainResult<GitHubIssueRef> {
        let body = serde_json::to_value(create)?;
        self.rest.post(&self.issues_path(), &body).await?.json()
    }
}

/// Target of the `rel="next"` entry of a `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| param.trim() == "rel=\"next\"");
        if is_next {
            target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .map(str::to_string)
        } else {
            None
        }
    })
}

#[async_trait]
impl PageSource for GitHubClient {
    async fn fetch_page(&self, request: &PageRequest, cursor: Option<&str>) -> DomainResult<Page> {
        let response = match cursor {
            // The next link already carries every query parameter.
            Some(next) => self.rest.get(next, &[]).await?,
            None => {
                let mut query = request.query.clone();
                query.push(("per_page".to_string(), self.page_size.to_string()));
                self.rest.get(&request.path, &query).await?
            }
        };

        let next_cursor = response.header("link").and_then(next_link);
        let results = match response.body {
            Value::Array(items) => items,
            other => {
                return Err(DomainError::Decode(format!(
                    "expected a JSON array from {}, got {other}",
                    request.path
                )))
            }
        };
        Ok(Page {
            results,
            has_more: next_cursor.is_some(),
            next_cursor,
        })
    }
}
