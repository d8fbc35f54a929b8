//! Notion REST client.
//!
//! Thin typed wrapper over [`RestClient`] for the handful of endpoints
//! the board adapter needs. List endpoints are exposed as
//! [`PaginatedSequence`]s driven by this client's [`PageSource`] impl.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::errors::DomainResult;
use crate::domain::models::{NotionConfig, RetryConfig};
use crate::domain::ports::{Page, PageMethod, PageRequest, PageSource};
use crate::infrastructure::http::{Auth, RestClient, NOTION_VERSION};
use crate::services::paginated::PaginatedSequence;

use super::models::{NotionComment, NotionPage};

/// HTTP client for the Notion API.
#[derive(Debug, Clone)]
pub struct NotionClient {
    rest: RestClient,
    page_size: u32,
}

impl NotionClient {
    pub fn new(config: &NotionConfig, retry: RetryConfig, page_size: u32) -> DomainResult<Self> {
        let rest = RestClient::new(
            "notion",
            config.base_url.clone(),
            Auth::Bearer(config.token.clone()),
            &[("notion-version", NOTION_VERSION), ("accept", "application/json")],
            &config.rate_limit,
            retry,
        )?;
        Ok(Self { rest, page_size })
    }

    /// Id of the first database whose title matches `name`
    /// (case-insensitive), searching every result page.
    pub async fn database_id_for_name(&self, name: &str) -> DomainResult<Option<String>> {
        let request = PageRequest::post(
            "/v1/search",
            json!({
                "query": name,
                "filter": { "property": "object", "value": "database" }
            }),
        );
        let mut results = PaginatedSequence::<_, Value>::new(self, request);
        while let Some(database) = results.next().await? {
            let title = database
                .pointer("/title/0/plain_text")
                .and_then(Value::as_str)
                .unwrap_or("");
            if title.eq_ignore_ascii_case(name) {
                return Ok(database.get("id").and_then(Value::as_str).map(str::to_string));
            }
        }
        Ok(None)
    }

    /// Lazy sequence of the pages matching `filter`.
    pub fn query_database(&self, database_id: &str, filter: Option<Value>) -> PaginatedSequence<'_, Self, NotionPage> {
        let body = match filter {
            Some(filter) => json!({ "filter": filter }),
            None => json!({}),
        };
        PaginatedSequence::new(
            self,
            PageRequest::post(format!("/v1/databases/{database_id}/query"), body),
        )
    }

    pub async fn get_page(&self, page_id: &str) -> DomainResult<NotionPage> {
        self.rest.get(&format!("/v1/pages/{page_id}"), &[]).await?.json()
    }

    /// One property of a page. List-valued properties are drained page by
    /// page and returned as a single list with every item in `results`.
    pub async fn get_property(&self, page_id: &str, property_id: &str) -> DomainResult<Value> {
        let path = format!("/v1/pages/{page_id}/properties/{property_id}");
        let query = [("page_size".to_string(), self.page_size.to_string())];
        let body = self.rest.get(&path, &query).await?.body;
        if body.get("object").and_then(Value::as_str) != Some("list") {
            return Ok(body);
        }

        let property_item = body.get("property_item").cloned().unwrap_or(Value::Null);
        let first = Page::from_envelope(&body);
        let items = PaginatedSequence::<_, Value>::with_first_page(self, PageRequest::get(path), first)?
            .collect_all()
            .await?;
        Ok(json!({
            "object": "list",
            "property_item": property_item,
            "results": items,
            "has_more": false
        }))
    }

    pub async fn get_comments(&self, block_id: &str) -> DomainResult<Vec<NotionComment>> {
        PaginatedSequence::new(
            self,
            PageRequest::get("/v1/comments").with_query("block_id", block_id),
        )
        .collect_all()
        .await
    }

    pub async fn create_page(&self, database_id: &str, properties: Value) -> DomainResult<NotionPage> {
        let body = json!({
            "parent": { "type": "database_id", "database_id": database_id },
            "properties": properties
        });
        self.rest.post("/v1/pages", &body).await?.json()
    }

    pub async fn update_page(&self, page_id: &str, properties: Value) -> DomainResult<NotionPage> {
        let body = json!({ "properties": properties });
        self.rest.patch(&format!("/v1/pages/{page_id}"), &body).await?.json()
    }

    pub async fn archive_page(&self, page_id: &str) -> DomainResult<NotionPage> {
        let body = json!({ "archived": true });
        self.rest.patch(&format!("/v1/pages/{page_id}"), &body).await?.json()
    }
}

#[async_trait]
impl PageSource for NotionClient {
    async fn fetch_page(&self, request: &PageRequest, cursor: Option<&str>) -> DomainResult<Page> {
        let response = match request.method {
            PageMethod::Post => {
                let mut body = match &request.body {
                    Value::Object(_) => request.body.clone(),
                    _ => json!({}),
                };
                body["page_size"] = json!(self.page_size);
                if let Some(cursor) = cursor {
                    body["start_cursor"] = json!(cursor);
                }
                self.rest.post_query(&request.path, &body).await?
            }
            PageMethod::Get => {
                let mut query = request.query.clone();
                query.push(("page_size".to_string(), self.page_size.to_string()));
                if let Some(cursor) = cursor {
                    query.push(("start_cursor".to_string(), cursor.to_string()));
                }
                self.rest.get(&request.path, &query).await?
            }
        };

        Ok(Page::from_envelope(&response.body))
    }
}
