//! Jira project issues as an external [`IssueSource`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::issue::{normalize_timestamp, Granularity};
use crate::domain::models::{
    FetchConfig, IssueMap, JiraConfig, MutationResult, NormalizedIssue, RetryConfig,
    UNASSIGNED_USER,
};
use crate::domain::ports::{status_set, IssueQuery, IssueSource};

use super::client::JiraClient;
use super::models::JiraIssue;

const JQL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Issues of one Jira project, keyed by their native issue keys.
#[derive(Debug)]
pub struct JiraSource {
    client: JiraClient,
    project: String,
    /// Lowercased status name to the server's spelling.
    statuses: OnceCell<HashMap<String, String>>,
    closed: HashSet<String>,
}

impl JiraSource {
    pub fn new(config: &JiraConfig, fetch: &FetchConfig, retry: RetryConfig) -> DomainResult<Self> {
        Ok(Self {
            client: JiraClient::new(config, retry, fetch.page_size)?,
            project: config.project.clone(),
            statuses: OnceCell::new(),
            closed: status_set(["closed", "resolved"]),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    async fn status_map(&self) -> DomainResult<&HashMap<String, String>> {
        self.statuses
            .get_or_try_init(|| async {
                let statuses = self.client.statuses().await?;
                tracing::debug!(count = statuses.len(), "loaded Jira statuses");
                Ok::<_, DomainError>(
                    statuses
                        .into_iter()
                        .map(|status| (status.name.to_lowercase(), status.name))
                        .collect(),
                )
            })
            .await
    }

    fn owns(&self, key: &str) -> bool {
        key.strip_prefix(&self.project)
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|number| !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()))
    }

    fn to_issue(&self, issue: JiraIssue) -> NormalizedIssue {
        let fields = issue.fields;
        let timestamp = |raw: Option<String>, granularity| {
            raw.and_then(|raw| normalize_timestamp(&raw, granularity))
        };
        let labels = [fields.priority, fields.issuetype]
            .into_iter()
            .flatten()
            .map(|named| named.name)
            .filter(|name| !name.is_empty())
            .collect();

        NormalizedIssue {
            link: format!("{}/browse/{}", self.client.server(), issue.key),
            key: issue.key,
            title: fields.summary,
            status: fields
                .status
                .map(|status| status.name.to_lowercase())
                .unwrap_or_default(),
            assignee: fields
                .assignee
                .map(|user| user.login())
                .filter(|login| !login.is_empty())
                .unwrap_or_else(|| UNASSIGNED_USER.to_string()),
            reporter: fields.creator.map(|user| user.login()).unwrap_or_default(),
            labels,
            due_on: timestamp(fields.duedate, Granularity::Minutes),
            opened_on: timestamp(fields.created, Granularity::Minutes),
            closed_on: timestamp(fields.resolutiondate, Granularity::Minutes),
            updated_on: timestamp(fields.updated, Granularity::Seconds),
        }
    }

    fn writable_fields(issue: &NormalizedIssue) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("summary".into(), json!(issue.title));
        fields.insert(
            "assignee".into(),
            if issue.is_unassigned() {
                Value::Null
            } else {
                json!({ "name": issue.assignee })
            },
        );
        fields.insert(
            "duedate".into(),
            issue
                .due_on
                .map_or(Value::Null, |due| json!(due.format("%Y-%m-%d").to_string())),
        );
        fields
    }

    /// Move `key` to `status` through the first matching workflow transition.
    async fn transition_to(&self, key: &str, status: &str) -> DomainResult<()> {
        let target = self
            .status_map()
            .await?
            .get(&status.to_lowercase())
            .cloned()
            .unwrap_or_else(|| status.to_string());
        let transitions = self.client.transitions(key).await?;
        match transitions
            .transitions
            .iter()
            .find(|transition| transition.to.name.eq_ignore_ascii_case(&target))
        {
            Some(transition) => {
                tracing::debug!(key = %key, transition = %transition.name, to = %target, "transitioning");
                self.client.transition(key, &transition.id).await
            }
            None => {
                tracing::debug!(key = %key, to = %target, "no transition to status available");
                Ok(())
            }
        }
    }
}

/// JQL for `project` restricted by `query`.
pub fn build_jql(project: &str, query: &IssueQuery) -> String {
    let mut jql = format!("project={project}");
    if let Some(since) = query.since {
        let since = format_jql_time(since);
        jql.push_str(&format!(" and (updated > \"{since}\" or created > \"{since}\")"));
    }
    if let Some(assignee) = query.assignee.as_deref().filter(|a| !a.is_empty()) {
        jql.push_str(&format!(" and assignee = \"{assignee}\""));
    }
    jql
}

fn format_jql_time(dt: DateTime<Utc>) -> String {
    dt.format(JQL_TIME_FORMAT).to_string()
}

#[async_trait]
impl IssueSource for JiraSource {
    fn describe(&self) -> String {
        format!("Jira: {}", self.project)
    }

    fn closed_statuses(&self) -> &HashSet<String> {
        &self.closed
    }

    async fn get_issues(&self, query: &IssueQuery) -> DomainResult<IssueMap> {
        let jql = build_jql(&self.project, query);
        tracing::debug!(jql = %jql, "searching Jira");
        let issues = self.client.search(&jql).collect_all().await?;
        Ok(issues
            .into_iter()
            .map(|issue| {
                let issue = self.to_issue(issue);
                (issue.key.clone(), issue)
            })
            .collect())
    }

    async fn get_issue(&self, id: &str) -> DomainResult<NormalizedIssue> {
        let issue = self.client.get_issue(id).await.map_err(|err| err.not_found_for(id))?;
        Ok(self.to_issue(issue))
    }

    async fn key_to_id(&self, key: &str) -> DomainResult<Option<String>> {
        Ok(self.owns(key).then(|| key.to_string()))
    }

    async fn update_issue(&self, key: &str, issue: &NormalizedIssue) -> MutationResult {
        if !self.owns(key) {
            return MutationResult::fail(format!("{key} is not a key of {}", self.describe()));
        }
        if let Err(err) = self
            .client
            .update_fields(key, Value::Object(Self::writable_fields(issue)))
            .await
        {
            return err.into();
        }
        if !issue.status.is_empty() {
            if let Err(err) = self.transition_to(key, &issue.status).await {
                return err.into();
            }
        }
        MutationResult::ok_with_id(key)
    }

    async fn create_issue(&self, _key: &str, issue: &NormalizedIssue) -> MutationResult {
        let mut fields = Self::writable_fields(issue);
        fields.insert("project".into(), json!({ "key": self.project }));
        fields.insert("issuetype".into(), json!({ "name": "Task" }));
        match self.client.create_issue(Value::Object(fields)).await {
            Ok(created) => MutationResult::ok_with_id(created.key),
            Err(err) => err.into(),
        }
    }

    async fn archive_issue(&self, _key: &str) -> MutationResult {
        DomainError::unsupported("archive_issue", self.describe()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source() -> JiraSource {
        let config = JiraConfig {
            token: "t".to_string(),
            server: "https://jira.example.test".to_string(),
            project: "OPS".to_string(),
            ..JiraConfig::default()
        };
        JiraSource::new(&config, &FetchConfig::default(), RetryConfig::disabled()).unwrap()
    }

    #[test]
    fn test_jql_without_filters() {
        assert_eq!(build_jql("OPS", &IssueQuery::new()), "project=OPS");
    }

    #[test]
    fn test_jql_with_since_and_assignee() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 8, 5, 59).unwrap();
        let query = IssueQuery::new()
            .with_since(Some(since))
            .with_assignee(Some("ada".to_string()));
        assert_eq!(
            build_jql("OPS", &query),
            "project=OPS and (updated > \"2024-03-01 08:05\" or created > \"2024-03-01 08:05\") and assignee = \"ada\""
        );
    }

    #[tokio::test]
    async fn test_key_to_id_is_identity_for_project_keys() {
        let jira = source();
        assert_eq!(jira.key_to_id("OPS-12").await.unwrap().as_deref(), Some("OPS-12"));
        assert_eq!(jira.key_to_id("OPSX-12").await.unwrap(), None);
        assert_eq!(jira.key_to_id("widgets#12").await.unwrap(), None);
    }

    #[test]
    fn test_mapping_lowercases_status_and_builds_link() {
        let raw: JiraIssue = serde_json::from_value(json!({
            "key": "OPS-3",
            "fields": {
                "summary": "Rotate keys",
                "status": { "name": "In Progress" },
                "assignee": { "name": "ada" },
                "priority": { "name": "High" },
                "issuetype": { "name": "Bug" },
                "duedate": "2024-04-01",
                "created": "2024-03-01T09:30:12.000+0000",
                "updated": "2024-03-02T11:00:45.000+0000"
            }
        }))
        .unwrap();
        let issue = source().to_issue(raw);

        assert_eq!(issue.status, "in progress");
        assert_eq!(issue.assignee, "ada");
        assert_eq!(issue.labels, vec!["High", "Bug"]);
        assert_eq!(issue.link, "https://jira.example.test/browse/OPS-3");
        assert_eq!(issue.opened_on, Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()));
        assert_eq!(issue.updated_on, Some(Utc.with_ymd_and_hms(2024, 3, 2, 11, 0, 45).unwrap()));
        assert_eq!(issue.due_on, Some(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_writable_fields_unassign() {
        let issue = NormalizedIssue::new("OPS-1").with_title("t");
        let fields = JiraSource::writable_fields(&issue);
        assert!(fields["assignee"].is_null());
        assert!(fields["duedate"].is_null());
        assert_eq!(fields["summary"], "t");
    }
}
