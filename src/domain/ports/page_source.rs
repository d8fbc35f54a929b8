//! Paginated remote-list port.
//!
//! A [`PageSource`] issues one page request of a cursor-paginated list
//! endpoint. Clients implement it for their own transport; the
//! [`PaginatedSequence`](crate::services::paginated::PaginatedSequence)
//! drives it.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::DomainResult;

/// HTTP method of a paginated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMethod {
    /// Cursor travels as a query parameter.
    Get,
    /// Cursor travels in the JSON body.
    Post,
}

/// The call a paginated sequence re-issues for every page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub method: PageMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Value,
}

impl PageRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: PageMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: Value::Null,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: PageMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

/// One page of a paginated list response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub results: Vec<Value>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl Page {
    /// Decode the standard `{results, has_more, next_cursor}` envelope.
    pub fn from_envelope(body: &Value) -> Self {
        let results = body
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let has_more = body.get("has_more").and_then(Value::as_bool).unwrap_or(false);
        let next_cursor = body
            .get("next_cursor")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            results,
            has_more,
            next_cursor,
        }
    }

    /// A last page holding `results`.
    pub fn last(results: Vec<Value>) -> Self {
        Self {
            results,
            has_more: false,
            next_cursor: None,
        }
    }
}

/// Transport for one page of a cursor-paginated endpoint.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Issue `request`, continuing from `cursor` when given.
    async fn fetch_page(&self, request: &PageRequest, cursor: Option<&str>) -> DomainResult<Page>;
}
