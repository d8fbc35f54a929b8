//! Bitbucket Cloud API 2.0 payloads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketIssue {
    pub id: u64,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub assignee: Option<BitbucketUser>,
    #[serde(default)]
    pub reporter: Option<BitbucketUser>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub updated_on: Option<String>,
    #[serde(default)]
    pub links: BitbucketLinks,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BitbucketUser {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BitbucketLinks {
    #[serde(default)]
    pub html: Option<BitbucketHref>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketHref {
    pub href: String,
}

/// One entry of `/2.0/workspaces/{ws}/members`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMembership {
    pub user: BitbucketUser,
}

/// Issue priorities Bitbucket accepts.
pub const PRIORITIES: [&str; 5] = ["trivial", "minor", "major", "critical", "blocker"];

/// Issue kinds Bitbucket accepts.
pub const KINDS: [&str; 4] = ["bug", "enhancement", "proposal", "task"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_deserialization() {
        let json = r#"{
            "id": 9,
            "title": "Broken link",
            "state": "new",
            "priority": "major",
            "kind": "bug",
            "assignee": null,
            "reporter": { "nickname": "ada", "account_id": "557058:1" },
            "created_on": "2024-03-01T09:30:12.123456+00:00",
            "updated_on": "2024-03-02T11:00:00.000000+00:00",
            "links": { "html": { "href": "https://bitbucket.org/ws/site/issues/9" } }
        }"#;
        let issue: BitbucketIssue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.id, 9);
        assert!(issue.assignee.is_none());
        assert_eq!(issue.reporter.unwrap().nickname.as_deref(), Some("ada"));
        assert_eq!(
            issue.links.html.unwrap().href,
            "https://bitbucket.org/ws/site/issues/9"
        );
    }
}
