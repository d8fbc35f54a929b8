//! Native tracker plugins.
//!
//! Each sub-module corresponds to one tracker and provides a REST client,
//! its wire payloads, and an [`IssueSource`] implementation. The Notion
//! plugin is the record of truth; the rest are external sources.

pub mod bitbucket;
pub mod github;
pub mod jira;
pub mod notion;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Config, IssueMap, MutationResult, NormalizedIssue};
use crate::domain::ports::{IssueQuery, IssueSource};
use crate::infrastructure::config::Target;

use self::bitbucket::BitbucketSource;
use self::github::GithubSource;
use self::jira::JiraSource;
use self::notion::NotionSource;

/// Any of the supported trackers, selected at runtime.
#[derive(Debug)]
pub enum AnySource {
    RecordOfTruth(NotionSource),
    Github(GithubSource),
    Jira(JiraSource),
    Bitbucket(BitbucketSource),
}

impl AnySource {
    /// Board keys owned by this tracker start with this prefix; the board
    /// itself owns every key.
    pub fn key_prefix(&self) -> Option<String> {
        match self {
            Self::RecordOfTruth(_) => None,
            Self::Github(source) => Some(format!("{}#", source.key_prefix())),
            Self::Jira(source) => Some(format!("{}-", source.project())),
            Self::Bitbucket(source) => Some(format!("{}#", source.key_prefix())),
        }
    }

    fn inner(&self) -> &dyn IssueSource {
        match self {
            Self::RecordOfTruth(source) => source,
            Self::Github(source) => source,
            Self::Jira(source) => source,
            Self::Bitbucket(source) => source,
        }
    }
}

/// Create the record-of-truth board from the merged configuration.
pub fn create_record_source(config: &Config) -> DomainResult<AnySource> {
    Ok(AnySource::RecordOfTruth(NotionSource::new(
        &config.notion,
        &config.fetch,
        config.retry.clone(),
    )?))
}

/// Create the external source for `target` from the merged configuration.
///
/// # Errors
///
/// Returns `Err` for [`Target::Notion`], which has no external side, or
/// when the target's settings cannot build a client.
pub fn create_external_source(target: Target, config: &Config) -> DomainResult<AnySource> {
    let retry = config.retry.clone();
    match target {
        Target::Github => Ok(AnySource::Github(GithubSource::new(
            &config.github,
            &config.fetch,
            retry,
        )?)),
        Target::Jira => Ok(AnySource::Jira(JiraSource::new(
            &config.jira,
            &config.fetch,
            retry,
        )?)),
        Target::Bitbucket => Ok(AnySource::Bitbucket(BitbucketSource::new(
            &config.bitbucket,
            &config.fetch,
            retry,
        )?)),
        Target::Notion => Err(DomainError::ValidationFailed(
            "notion is the record of truth, not an external source".to_string(),
        )),
    }
}

#[async_trait]
impl IssueSource for AnySource {
    fn describe(&self) -> String {
        self.inner().describe()
    }

    fn closed_statuses(&self) -> &HashSet<String> {
        self.inner().closed_statuses()
    }

    async fn get_issues(&self, query: &IssueQuery) -> DomainResult<IssueMap> {
        self.inner().get_issues(query).await
    }

    fn unreadable_records(&self) -> usize {
        self.inner().unreadable_records()
    }

    async fn get_issue(&self, id: &str) -> DomainResult<NormalizedIssue> {
        self.inner().get_issue(id).await
    }

    async fn key_to_id(&self, key: &str) -> DomainResult<Option<String>> {
        self.inner().key_to_id(key).await
    }

    async fn update_issue(&self, key: &str, issue: &NormalizedIssue) -> MutationResult {
        self.inner().update_issue(key, issue).await
    }

    async fn create_issue(&self, key: &str, issue: &NormalizedIssue) -> MutationResult {
        self.inner().create_issue(key, issue).await
    }

    async fn archive_issue(&self, key: &str) -> MutationResult {
        self.inner().archive_issue(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = Config::default();
        config.github.token = "ghp_test".to_string();
        config.github.repo = "acme/widgets".to_string();
        config.jira.token = "jira".to_string();
        config.jira.server = "https://jira.example.com".to_string();
        config.jira.project = "OPS".to_string();
        config.bitbucket.user = "me".to_string();
        config.bitbucket.app_password = "pw".to_string();
        config.bitbucket.repo = "ws/site".to_string();
        config
    }

    #[test]
    fn test_key_prefix_per_tracker() {
        let config = config();
        let github = create_external_source(Target::Github, &config).unwrap();
        assert_eq!(github.key_prefix().as_deref(), Some("widgets#"));
        assert_eq!(github.describe(), "GitHub: acme/widgets");

        let jira = create_external_source(Target::Jira, &config).unwrap();
        assert_eq!(jira.key_prefix().as_deref(), Some("OPS-"));

        let bitbucket = create_external_source(Target::Bitbucket, &config).unwrap();
        assert_eq!(bitbucket.key_prefix().as_deref(), Some("site#"));
        assert!(bitbucket.is_closed("resolved"));
    }

    #[test]
    fn test_board_owns_every_key() {
        let mut config = config();
        config.notion.token = "secret".to_string();
        let board = create_record_source(&config).unwrap();
        assert!(board.key_prefix().is_none());
        assert!(board.describe().starts_with("Notion: "));
    }

    #[test]
    fn test_notion_is_not_external() {
        let result = create_external_source(Target::Notion, &config());
        assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
    }
}
