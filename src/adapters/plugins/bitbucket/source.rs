//! Bitbucket Cloud repository issues as an external [`IssueSource`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::issue::{normalize_timestamp, Granularity};
use crate::domain::models::{
    BitbucketConfig, FetchConfig, IssueMap, MutationResult, NormalizedIssue, RetryConfig,
    UNASSIGNED_USER,
};
use crate::domain::ports::{status_set, IssueQuery, IssueSource};

use super::client::BitbucketClient;
use super::models::{BitbucketIssue, KINDS, PRIORITIES};

/// Issues of one Bitbucket repository, keyed `{repo}#{id}`.
#[derive(Debug)]
pub struct BitbucketSource {
    client: BitbucketClient,
    /// Nickname to account id, loaded on the first assignee change.
    members: OnceCell<HashMap<String, String>>,
    closed: HashSet<String>,
}

impl BitbucketSource {
    pub fn new(config: &BitbucketConfig, fetch: &FetchConfig, retry: RetryConfig) -> DomainResult<Self> {
        Ok(Self {
            client: BitbucketClient::new(config, retry, fetch.page_size)?,
            members: OnceCell::new(),
            closed: status_set(["closed", "resolved"]),
        })
    }

    /// Prefix shared by every key of this repository (without the `#`).
    pub fn key_prefix(&self) -> &str {
        self.client.repo()
    }

    fn key_for(&self, id: u64) -> String {
        format!("{}#{id}", self.client.repo())
    }

    fn id_for(&self, key: &str) -> Option<u64> {
        key.strip_prefix(self.client.repo())?
            .strip_prefix('#')?
            .parse()
            .ok()
    }

    fn to_issue(&self, issue: BitbucketIssue) -> NormalizedIssue {
        let labels = [issue.priority, issue.kind]
            .into_iter()
            .filter(|label| !label.is_empty())
            .collect();
        NormalizedIssue {
            key: self.key_for(issue.id),
            title: issue.title,
            status: issue.state,
            assignee: issue
                .assignee
                .and_then(|user| user.nickname)
                .unwrap_or_else(|| UNASSIGNED_USER.to_string()),
            reporter: issue.reporter.and_then(|user| user.nickname).unwrap_or_default(),
            labels,
            due_on: None,
            opened_on: issue
                .created_on
                .and_then(|raw| normalize_timestamp(&raw, Granularity::Minutes)),
            closed_on: None,
            updated_on: issue
                .updated_on
                .and_then(|raw| normalize_timestamp(&raw, Granularity::Seconds)),
            link: issue.links.html.map(|html| html.href).unwrap_or_default(),
        }
    }

    async fn account_id(&self, nickname: &str) -> DomainResult<Option<String>> {
        let members = self
            .members
            .get_or_try_init(|| async {
                let members = self.client.workspace_members().await?;
                Ok::<_, DomainError>(
                    members
                        .into_iter()
                        .filter_map(|member| Some((member.user.nickname?, member.user.account_id?)))
                        .collect::<HashMap<_, _>>(),
                )
            })
            .await?;
        Ok(members.get(nickname).cloned())
    }
}

/// Bitbucket query language filter for `query`.
pub fn build_query(query: &IssueQuery) -> Option<String> {
    query
        .since
        .map(|since| format!("updated_on > {}", since.format("%Y-%m-%dT%H:%M:%S")))
}

/// Pick the first label that is a valid value of `allowed`.
fn pick<'a>(labels: &'a [String], allowed: &[&str], default: &'a str) -> &'a str {
    labels
        .iter()
        .map(String::as_str)
        .find(|label| allowed.contains(&label.to_lowercase().as_str()))
        .unwrap_or(default)
}

#[async_trait]
impl IssueSource for BitbucketSource {
    fn describe(&self) -> String {
        format!("Bitbucket: {}/{}", self.client.workspace(), self.client.repo())
    }

    fn closed_statuses(&self) -> &HashSet<String> {
        &self.closed
    }

    async fn get_issues(&self, query: &IssueQuery) -> DomainResult<IssueMap> {
        let issues = self.client.list_issues(build_query(query)).collect_all().await?;
        let output: IssueMap = issues
            .into_iter()
            .map(|issue| {
                let issue = self.to_issue(issue);
                (issue.key.clone(), issue)
            })
            .collect();
        tracing::debug!(count = output.len(), "Bitbucket issues enumerated");
        Ok(output)
    }

    async fn get_issue(&self, id: &str) -> DomainResult<NormalizedIssue> {
        let number = id
            .parse()
            .map_err(|_| DomainError::ValidationFailed(format!("not a Bitbucket issue id: '{id}'")))?;
        let issue = self
            .client
            .get_issue(number)
            .await
            .map_err(|err| err.not_found_for(id))?;
        Ok(self.to_issue(issue))
    }

    async fn key_to_id(&self, key: &str) -> DomainResult<Option<String>> {
        Ok(self.id_for(key).map(|id| id.to_string()))
    }

    async fn update_issue(&self, key: &str, issue: &NormalizedIssue) -> MutationResult {
        let Some(id) = self.id_for(key) else {
            return MutationResult::fail(format!("{key} is not a key of {}", self.describe()));
        };
        let mut body = json!({
            "title": issue.title,
            "state": issue.status,
        });
        if !issue.is_unassigned() {
            match self.account_id(&issue.assignee).await {
                Ok(Some(account_id)) => {
                    body["assignee"] = json!({ "account_id": account_id });
                }
                Ok(None) => {
                    tracing::warn!(key = %key, assignee = %issue.assignee, "assignee is not a workspace member");
                }
                Err(err) => return err.into(),
            }
        }
        match self.client.update_issue(id, &body).await {
            Ok(updated) => MutationResult::ok_with_id(updated.id.to_string()),
            Err(err) => err.into(),
        }
    }

    async fn create_issue(&self, _key: &str, issue: &NormalizedIssue) -> MutationResult {
        let body: Value = json!({
            "title": issue.title,
            "state": if issue.status.is_empty() { "new" } else { issue.status.as_str() },
            "kind": pick(&issue.labels, &KINDS, "task"),
            "priority": pick(&issue.labels, &PRIORITIES, "major"),
        });
        match self.client.create_issue(&body).await {
            Ok(created) => MutationResult::ok_with_id(created.id.to_string()),
            Err(err) => err.into(),
        }
    }

    async fn archive_issue(&self, _key: &str) -> MutationResult {
        DomainError::unsupported("archive_issue", self.describe()).into()
    }
}
