//! Jira REST API v2 payloads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    pub fields: JiraFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraFields {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub status: Option<JiraNamed>,
    #[serde(default)]
    pub assignee: Option<JiraUser>,
    #[serde(default)]
    pub creator: Option<JiraUser>,
    #[serde(default)]
    pub priority: Option<JiraNamed>,
    #[serde(default)]
    pub issuetype: Option<JiraNamed>,
    #[serde(default)]
    pub duedate: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub resolutiondate: Option<String>,
}

/// Any `{"name": ...}` object: status, priority, issue type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraNamed {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl JiraUser {
    /// Login name, falling back to the user key and display name.
    pub fn login(&self) -> String {
        self.name
            .as_deref()
            .or(self.key.as_deref())
            .or(self.display_name.as_deref())
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraTransition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub to: JiraNamed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraTransitions {
    #[serde(default)]
    pub transitions: Vec<JiraTransition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraCreated {
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_deserialization_with_nulls() {
        let json = r#"{
            "key": "OPS-12",
            "fields": {
                "summary": "Rotate keys",
                "status": { "name": "In Progress" },
                "assignee": null,
                "creator": { "name": "ada", "key": "JIRAUSER1" },
                "priority": { "name": "High" },
                "issuetype": { "name": "Task" },
                "duedate": null,
                "created": "2024-03-01T09:30:12.000+0000",
                "updated": "2024-03-02T11:00:00.000+0000"
            }
        }"#;
        let issue: JiraIssue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.key, "OPS-12");
        assert!(issue.fields.assignee.is_none());
        assert_eq!(issue.fields.creator.unwrap().login(), "ada");
        assert!(issue.fields.resolutiondate.is_none());
    }

    #[test]
    fn test_user_login_fallbacks() {
        let user = JiraUser {
            display_name: Some("Ada L".to_string()),
            ..JiraUser::default()
        };
        assert_eq!(user.login(), "Ada L");
        assert_eq!(JiraUser::default().login(), "");
    }
}
