//! Jira Server/Data Center REST client (API v2).

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{JiraConfig, RetryConfig};
use crate::domain::ports::{Page, PageRequest, PageSource};
use crate::infrastructure::http::{Auth, RestClient};
use crate::services::paginated::PaginatedSequence;

use super::models::{JiraCreated, JiraIssue, JiraNamed, JiraTransitions};

const SEARCH_FIELDS: &str =
    "summary,status,assignee,creator,priority,issuetype,duedate,created,updated,resolutiondate";

/// HTTP client for a Jira server.
#[derive(Debug, Clone)]
pub struct JiraClient {
    rest: RestClient,
    page_size: u32,
}

impl JiraClient {
    pub fn new(config: &JiraConfig, retry: RetryConfig, page_size: u32) -> DomainResult<Self> {
        let rest = RestClient::new(
            "jira",
            config.server.clone(),
            Auth::Bearer(config.token.clone()),
            &[("accept", "application/json")],
            &config.rate_limit,
            retry,
        )?;
        Ok(Self { rest, page_size })
    }

    pub fn server(&self) -> &str {
        self.rest.base_url()
    }

    /// Lazy sequence over the issues matching `jql`.
    pub fn search(&self, jql: &str) -> PaginatedSequence<'_, Self, JiraIssue> {
        PaginatedSequence::new(
            self,
            PageRequest::get("/rest/api/2/search")
                .with_query("jql", jql)
                .with_query("fields", SEARCH_FIELDS),
        )
    }

    pub async fn get_issue(&self, key: &str) -> DomainResult<JiraIssue> {
        self.rest
            .get(
                &format!("/rest/api/2/issue/{key}"),
                &[("fields".to_string(), SEARCH_FIELDS.to_string())],
            )
            .await?
            .json()
    }

    /// Every status defined on the server.
    pub async fn statuses(&self) -> DomainResult<Vec<JiraNamed>> {
        self.rest.get("/rest/api/2/status", &[]).await?.json()
    }

    pub async fn update_fields(&self, key: &str, fields: Value) -> DomainResult<()> {
        self.rest
            .put(&format!("/rest/api/2/issue/{key}"), &json!({ "fields": fields }))
            .await?;
        Ok(())
    }

    pub async fn transitions(&self, key: &str) -> DomainResult<JiraTransitions> {
        self.rest
            .get(&format!("/rest/api/2/issue/{key}/transitions"), &[])
            .await?
            .json()
    }

    pub async fn transition(&self, key: &str, transition_id: &str) -> DomainResult<()> {
        self.rest
            .post(
                &format!("/rest/api/2/issue/{key}/transitions"),
                &json!({ "transition": { "id": transition_id } }),
            )
            .await?;
        Ok(())
    }

    pub async fn create_issue(&self, fields: Value) -> DomainResult<JiraCreated> {
        self.rest
            .post("/rest/api/2/issue", &json!({ "fields": fields }))
            .await?
            .json()
    }
}

/// Offset paging: the cursor is the next `startAt`.
#[async_trait]
impl PageSource for JiraClient {
    async fn fetch_page(&self, request: &PageRequest, cursor: Option<&str>) -> DomainResult<Page> {
        let start_at: u64 = match cursor {
            Some(cursor) => cursor
                .parse()
                .map_err(|_| DomainError::Decode(format!("invalid startAt cursor: {cursor}")))?,
            None => 0,
        };
        let mut query = request.query.clone();
        query.push(("startAt".to_string(), start_at.to_string()));
        query.push(("maxResults".to_string(), self.page_size.to_string()));

        let body = self.rest.get(&request.path, &query).await?.body;
        let results = body
            .get("issues")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let total = body.get("total").and_then(Value::as_u64).unwrap_or(0);
        let next = start_at + results.len() as u64;
        let has_more = !results.is_empty() && next < total;

        Ok(Page {
            results,
            has_more,
            next_cursor: has_more.then(|| next.to_string()),
        })
    }
}
