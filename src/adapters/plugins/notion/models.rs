//! Notion API payloads and property flattening.
//!
//! Property values come back from `GET /v1/pages/{id}/properties/{prop}`
//! either as a single `property_item` or, for list-valued properties
//! (title, rich text, people, relations), as a paginated `list` of
//! items. Both shapes are flattened to plain strings or name lists here.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::domain::models::issue::{format_timestamp, Granularity};
use crate::domain::models::{issue, NormalizedIssue, UNASSIGNED_USER};

/// Board column names.
pub mod columns {
    pub const TITLE: &str = "Title";
    pub const STATUS: &str = "Status";
    pub const ASSIGNEE: &str = "Assignee";
    pub const REPORTER: &str = "Reporter";
    pub const LABELS: &str = "Labels";
    pub const DUE_DATE: &str = "Due Date";
    pub const OPENED_ON: &str = "Opened On";
    pub const CLOSED_ON: &str = "Closed On";
    pub const UPDATED_ON: &str = "Updated On";
    pub const LINK: &str = "Link";
    pub const ISSUE_KEY: &str = "Issue Key";
}

/// Property reference on a page object: `{"id": "...", "type": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRef {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// A page as returned by query, retrieve and create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub last_edited_time: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl NotionPage {
    /// Property name to property id, for every property carrying an id.
    pub fn property_refs(&self) -> Vec<(String, PropertyRef)> {
        self.properties
            .iter()
            .filter_map(|(name, value)| {
                serde_json::from_value::<PropertyRef>(value.clone())
                    .ok()
                    .map(|reference| (name.clone(), reference))
            })
            .collect()
    }
}

/// A comment on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionComment {
    pub id: String,
    #[serde(default)]
    pub rich_text: Vec<Value>,
}

impl NotionComment {
    pub fn plain_text(&self) -> String {
        join_plain_text(self.rich_text.iter())
    }
}

/// A flattened property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Names(Vec<String>),
}

impl PropertyValue {
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Names(_) => "",
        }
    }

    pub fn names(&self) -> Vec<String> {
        match self {
            Self::Names(names) => names.clone(),
            Self::Text(text) if text.is_empty() => Vec::new(),
            Self::Text(text) => vec![text.clone()],
        }
    }
}

fn join_plain_text<'a>(items: impl Iterator<Item = &'a Value>) -> String {
    items
        .filter_map(|item| item.get("plain_text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

/// Flatten one property response (single item or fully drained list).
pub fn flatten_property(response: &Value) -> PropertyValue {
    match response.get("object").and_then(Value::as_str) {
        Some("property_item") => flatten_item(response),
        Some("list") => {
            let kind = str_at(response, "/property_item/type");
            let results = response
                .get("results")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            match kind {
                "title" | "rich_text" => PropertyValue::Text(join_plain_text(
                    results.iter().filter_map(|item| item.get(kind)),
                )),
                "people" => PropertyValue::Text(
                    results
                        .first()
                        .map(|item| str_at(item, "/people/name").to_string())
                        .unwrap_or_default(),
                ),
                _ => PropertyValue::empty(),
            }
        }
        _ => PropertyValue::empty(),
    }
}

fn flatten_item(item: &Value) -> PropertyValue {
    let kind = item.get("type").and_then(Value::as_str).unwrap_or("");
    match kind {
        "multi_select" => PropertyValue::Names(
            item.get("multi_select")
                .and_then(Value::as_array)
                .map(|options| {
                    options
                        .iter()
                        .filter_map(|option| option.get("name").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        ),
        "select" => PropertyValue::Text(str_at(item, "/select/name").to_string()),
        "date" => PropertyValue::Text(str_at(item, "/date/start").to_string()),
        "url" => PropertyValue::Text(str_at(item, "/url").to_string()),
        "people" => PropertyValue::Text(str_at(item, "/people/name").to_string()),
        "title" | "rich_text" => PropertyValue::Text(str_at(item, &format!("/{kind}/plain_text")).to_string()),
        "number" => PropertyValue::Text(match item.get("number") {
            Some(Value::Number(number)) => number.to_string(),
            _ => String::new(),
        }),
        _ => PropertyValue::empty(),
    }
}

/// Flattened properties of one page, by column name.
#[derive(Debug, Clone, Default)]
pub struct PageProperties(pub std::collections::HashMap<String, PropertyValue>);

impl PageProperties {
    pub fn text(&self, column: &str) -> &str {
        self.0.get(column).map_or("", PropertyValue::as_text)
    }

    pub fn names(&self, column: &str) -> Vec<String> {
        self.0.get(column).map(PropertyValue::names).unwrap_or_default()
    }

    /// Map a page and its flattened properties to the normalized shape.
    pub fn to_issue(&self, page: &NotionPage) -> NormalizedIssue {
        let assignee = match self.text(columns::ASSIGNEE) {
            "" => UNASSIGNED_USER,
            name => name,
        };
        NormalizedIssue {
            key: self.text(columns::ISSUE_KEY).to_string(),
            title: self.text(columns::TITLE).to_string(),
            status: self.text(columns::STATUS).to_string(),
            assignee: assignee.to_string(),
            reporter: self.text(columns::REPORTER).to_string(),
            labels: self.names(columns::LABELS),
            due_on: issue::normalize_timestamp(self.text(columns::DUE_DATE), Granularity::Seconds),
            opened_on: issue::normalize_timestamp(self.text(columns::OPENED_ON), Granularity::Seconds),
            closed_on: issue::normalize_timestamp(self.text(columns::CLOSED_ON), Granularity::Seconds),
            updated_on: issue::normalize_timestamp(&page.last_edited_time, Granularity::Seconds),
            link: self.text(columns::LINK).to_string(),
        }
    }
}

fn date_property(value: Option<chrono::DateTime<chrono::Utc>>) -> Value {
    json!({ "date": { "start": format_timestamp(value) } })
}

/// Property payload for creating or overwriting the page of `key`.
///
/// Optional dates and the reporter are left out when empty so an update
/// never clears them on the board.
pub fn issue_properties(key: &str, issue: &NormalizedIssue) -> Value {
    let link = if issue.link.is_empty() {
        Value::Null
    } else {
        Value::String(issue.link.clone())
    };
    let mut title = json!({ "text": { "content": issue.title } });
    if !issue.link.is_empty() {
        title["text"]["link"] = json!({ "url": issue.link });
    }
    let assignee = if issue.assignee.is_empty() {
        UNASSIGNED_USER
    } else {
        issue.assignee.as_str()
    };

    let mut properties = Map::new();
    properties.insert(columns::TITLE.into(), json!({ "title": [title] }));
    properties.insert(columns::ASSIGNEE.into(), json!({ "select": { "name": assignee } }));
    properties.insert(
        columns::LABELS.into(),
        json!({ "multi_select": issue.labels.iter().map(|name| json!({ "name": name })).collect::<Vec<_>>() }),
    );
    properties.insert(columns::STATUS.into(), json!({ "select": { "name": issue.status } }));
    properties.insert(
        columns::ISSUE_KEY.into(),
        json!({ "rich_text": [{ "type": "text", "text": { "content": key } }] }),
    );
    properties.insert(columns::LINK.into(), json!({ "url": link }));

    if issue.opened_on.is_some() {
        properties.insert(columns::OPENED_ON.into(), date_property(issue.opened_on));
    }
    if issue.updated_on.is_some() {
        properties.insert(columns::UPDATED_ON.into(), date_property(issue.updated_on));
    }
    if issue.due_on.is_some() {
        properties.insert(columns::DUE_DATE.into(), date_property(issue.due_on));
    }
    if issue.closed_on.is_some() {
        properties.insert(columns::CLOSED_ON.into(), date_property(issue.closed_on));
    }
    if !issue.reporter.is_empty() {
        properties.insert(
            columns::REPORTER.into(),
            json!({ "select": { "name": issue.reporter } }),
        );
    }

    Value::Object(properties)
}
