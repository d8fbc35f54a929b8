//! GitHub Issues API response and request models.
//!
//! These structs map to the GitHub REST API v3 JSON payloads and are not
//! part of the public domain model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An issue returned by the GitHub API.
///
/// Issues and pull requests share the same endpoint. Pull requests carry
/// a non-null `pull_request` field and are skipped during enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssue {
    /// Sequential number within the repository (e.g., 42 for "#42").
    pub number: u64,
    pub title: String,
    /// "open" or "closed".
    pub state: String,
    #[serde(default)]
    pub assignee: Option<GitHubUser>,
    /// The author.
    #[serde(default)]
    pub user: Option<GitHubUser>,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
    #[serde(default)]
    pub milestone: Option<GitHubMilestone>,
    #[serde(default)]
    pub pull_request: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub closed_at: Option<String>,
    pub html_url: String,
}

impl GitHubIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.as_ref().is_some_and(|pr| !pr.is_null())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubLabel {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubMilestone {
    #[serde(default)]
    pub due_on: Option<String>,
}

/// Request body for patching an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssueUpdateRequest {
    pub title: String,
    /// "open" or "closed".
    pub state: String,
    /// Empty to unassign.
    pub assignees: Vec<String>,
}

/// Request body for creating a new GitHub issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCreateIssueRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
}

/// Response from the create-issue and update-issue endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssueRef {
    pub number: u64,
    pub html_url: String,
}
