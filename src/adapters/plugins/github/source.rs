//! GitHub repository issues as an external [`IssueSource`].

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::issue::{normalize_timestamp, Granularity};
use crate::domain::models::{
    FetchConfig, GithubConfig, IssueMap, MutationResult, NormalizedIssue, RetryConfig,
    UNASSIGNED_USER,
};
use crate::domain::ports::{status_set, IssueQuery, IssueSource};

use super::client::GitHubClient;
use super::models::{GitHubCreateIssueRequest, GitHubIssue, GitHubIssueUpdateRequest};

/// Issues of one GitHub repository, keyed `{repo}#{number}` (or
/// `{owner}/{repo}#{number}` when keyed by path).
#[derive(Debug)]
pub struct GithubSource {
    client: GitHubClient,
    key_prefix: String,
    closed: HashSet<String>,
}

impl GithubSource {
    pub fn new(config: &GithubConfig, fetch: &FetchConfig, retry: RetryConfig) -> DomainResult<Self> {
        let client = GitHubClient::new(config, retry, fetch.page_size)?;
        let key_prefix = if config.use_path {
            format!("{}/{}", client.owner(), client.repo())
        } else {
            client.repo().to_string()
        };
        Ok(Self {
            client,
            key_prefix,
            closed: status_set(["closed"]),
        })
    }

    /// Prefix shared by every key of this repository (without the `#`).
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn key_for(&self, number: u64) -> String {
        format!("{}#{number}", self.key_prefix)
    }

    fn number_for(&self, key: &str) -> Option<u64> {
        key.strip_prefix(&self.key_prefix)?
            .strip_prefix('#')?
            .parse()
            .ok()
    }

    fn to_issue(&self, issue: GitHubIssue) -> NormalizedIssue {
        NormalizedIssue {
            key: self.key_for(issue.number),
            title: issue.title,
            status: issue.state,
            assignee: issue
                .assignee
                .map_or_else(|| UNASSIGNED_USER.to_string(), |user| user.login),
            reporter: issue.user.map(|user| user.login).unwrap_or_default(),
            labels: issue.labels.into_iter().map(|label| label.name).collect(),
            due_on: issue
                .milestone
                .and_then(|milestone| milestone.due_on)
                .and_then(|due| normalize_timestamp(&due, Granularity::Minutes)),
            opened_on: normalize_timestamp(&issue.created_at, Granularity::Minutes),
            closed_on: issue
                .closed_at
                .and_then(|closed| normalize_timestamp(&closed, Granularity::Minutes)),
            updated_on: normalize_timestamp(&issue.updated_at, Granularity::Seconds),
            link: issue.html_url,
        }
    }

    fn state_for(&self, status: &str) -> &'static str {
        if self.is_closed(&status.to_lowercase()) {
            "closed"
        } else {
            "open"
        }
    }

    fn assignees_for(issue: &NormalizedIssue) -> Vec<String> {
        if issue.is_unassigned() {
            Vec::new()
        } else {
            vec![issue.assignee.clone()]
        }
    }
}

#[async_trait]
impl IssueSource for GithubSource {
    fn describe(&self) -> String {
        format!("GitHub: {}/{}", self.client.owner(), self.client.repo())
    }

    fn closed_statuses(&self) -> &HashSet<String> {
        &self.closed
    }

    async fn get_issues(&self, query: &IssueQuery) -> DomainResult<IssueMap> {
        let issues = self
            .client
            .list_issues(query.since, query.assignee.as_deref())
            .collect_all()
            .await?;

        let mut output = IssueMap::new();
        let mut pull_requests = 0;
        for issue in issues {
            if issue.is_pull_request() {
                pull_requests += 1;
                continue;
            }
            let issue = self.to_issue(issue);
            output.insert(issue.key.clone(), issue);
        }
        tracing::debug!(count = output.len(), skipped_pull_requests = pull_requests, "GitHub issues enumerated");
        Ok(output)
    }

    async fn get_issue(&self, id: &str) -> DomainResult<NormalizedIssue> {
        let number = id
            .parse()
            .map_err(|_| DomainError::ValidationFailed(format!("not a GitHub issue number: '{id}'")))?;
        let issue = self
            .client
            .get_issue(number)
            .await
            .map_err(|err| err.not_found_for(id))?;
        Ok(self.to_issue(issue))
    }

    async fn key_to_id(&self, key: &str) -> DomainResult<Option<String>> {
        Ok(self.number_for(key).map(|number| number.to_string()))
    }

    async fn update_issue(&self, key: &str, issue: &NormalizedIssue) -> MutationResult {
        let Some(number) = self.number_for(key) else {
            return MutationResult::fail(format!("{key} is not a key of {}", self.describe()));
        };
        let update = GitHubIssueUpdateRequest {
            title: issue.title.clone(),
            state: self.state_for(&issue.status).to_string(),
            assignees: Self::assignees_for(issue),
        };
        match self.client.update_issue(number, &update).await {
            Ok(updated) => MutationResult::ok_with_id(updated.number.to_string()),
            Err(err) => err.into(),
        }
    }

    async fn create_issue(&self, _key: &str, issue: &NormalizedIssue) -> MutationResult {
        let create = GitHubCreateIssueRequest {
            title: issue.title.clone(),
            labels: issue.labels.clone(),
            assignees: Self::assignees_for(issue),
        };
        match self.client.create_issue(&create).await {
            Ok(created) => MutationResult::ok_with_id(created.number.to_string()),
            Err(err) => err.into(),
        }
    }

    async fn archive_issue(&self, _key: &str) -> MutationResult {
        DomainError::unsupported("archive_issue", self.describe()).into()
    }
}
