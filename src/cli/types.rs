//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::domain::models::Config;
use crate::infrastructure::config::Target;
use crate::infrastructure::logging::LogFormat;

use super::since::parse_since;

#[derive(Parser, Debug)]
#[command(name = "notion-issues")]
#[command(about = "Keep a Notion issue board in sync with GitHub, Jira and Bitbucket", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Flags shared by every subcommand
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Configuration file (defaults to ./notion-issues.yaml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Console log format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Turn on verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the sync report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Only consider issues touched after this time (RFC 3339 or YYYY-MM-DD)
    #[arg(long, global = true, value_parser = parse_since)]
    pub since: Option<DateTime<Utc>>,

    /// Read the lower bound from this file and record the run's start time in it
    #[arg(long, global = true, value_name = "PATH")]
    pub since_file: Option<PathBuf>,

    /// Create board entries for closed issues
    #[arg(long, global = true)]
    pub create_closed: bool,

    /// Only create board entries for issues assigned to ASSIGNEE
    #[arg(long, global = true, value_name = "ASSIGNEE")]
    pub create_assignee: Option<String>,

    /// Archive board entries closed and untouched for more than DAYS (0 disables)
    #[arg(long, global = true, value_name = "DAYS")]
    pub archive_aged: Option<u32>,

    /// Notion integration token
    #[arg(long = "notion-token", short = 'n', global = true, env = "NOTION_TOKEN", hide_env_values = true)]
    pub notion_token: Option<String>,

    /// Name of the Notion issue database
    #[arg(long = "notion-database", short = 'd', global = true)]
    pub notion_database: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync GitHub issues
    Github(GithubArgs),

    /// Sync Jira issues
    Jira(JiraArgs),

    /// Sync Bitbucket issues
    Bitbucket(BitbucketArgs),

    /// Maintain the Notion board
    Notion(NotionArgs),
}

#[derive(Args, Debug, Default)]
pub struct GithubArgs {
    /// GitHub token
    #[arg(long = "github-token", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Repository as owner/name
    #[arg(long, short = 'r')]
    pub repo: Option<String>,

    /// Key issues by owner/name instead of the repository name
    #[arg(long)]
    pub use_path: bool,
}

#[derive(Args, Debug, Default)]
pub struct JiraArgs {
    /// Jira token
    #[arg(long = "jira-token", env = "JIRA_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Jira server address
    #[arg(long, short = 's')]
    pub server: Option<String>,

    /// Jira project key
    #[arg(long, short = 'p')]
    pub project: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct BitbucketArgs {
    /// Bitbucket user name
    #[arg(long, env = "BITBUCKET_USER")]
    pub user: Option<String>,

    /// Bitbucket app password
    #[arg(long, env = "BITBUCKET_APP_PASSWORD", hide_env_values = true)]
    pub app_password: Option<String>,

    /// Repository as workspace/name
    #[arg(long, short = 'r')]
    pub repo: Option<String>,

    /// API root
    #[arg(long)]
    pub server: Option<String>,
}

#[derive(Args, Debug, Default)]
#[group(required = true, multiple = false)]
pub struct NotionArgs {
    /// Archive the board entry with this key
    #[arg(long, value_name = "KEY")]
    pub delete_key: Option<String>,

    /// Archive every board entry whose key starts with PREFIX
    #[arg(long, value_name = "PREFIX")]
    pub delete_matching_keys: Option<String>,
}

impl Commands {
    pub fn target(&self) -> Target {
        match self {
            Self::Github(_) => Target::Github,
            Self::Jira(_) => Target::Jira,
            Self::Bitbucket(_) => Target::Bitbucket,
            Self::Notion(_) => Target::Notion,
        }
    }

    /// Overlay this subcommand's flags on `config`.
    pub fn apply(&self, config: &mut Config) {
        match self {
            Self::Github(args) => {
                overlay(&mut config.github.token, args.token.as_ref());
                overlay(&mut config.github.repo, args.repo.as_ref());
                config.github.use_path |= args.use_path;
            }
            Self::Jira(args) => {
                overlay(&mut config.jira.token, args.token.as_ref());
                overlay(&mut config.jira.server, args.server.as_ref());
                overlay(&mut config.jira.project, args.project.as_ref());
            }
            Self::Bitbucket(args) => {
                overlay(&mut config.bitbucket.user, args.user.as_ref());
                overlay(&mut config.bitbucket.app_password, args.app_password.as_ref());
                overlay(&mut config.bitbucket.repo, args.repo.as_ref());
                overlay(&mut config.bitbucket.server, args.server.as_ref());
            }
            Self::Notion(_) => {}
        }
    }
}

impl GlobalArgs {
    /// Overlay the global flags on `config`.
    pub fn apply(&self, config: &mut Config) {
        overlay(&mut config.notion.token, self.notion_token.as_ref());
        overlay(&mut config.notion.database, self.notion_database.as_ref());
        overlay(&mut config.sync.create_assignee, self.create_assignee.as_ref());
        config.sync.create_closed |= self.create_closed;
        if let Some(days) = self.archive_aged {
            config.sync.archive_after_days = days;
        }
        if let Some(path) = &self.since_file {
            config.sync.since_file = Some(path.clone());
        }
    }
}

fn overlay(setting: &mut String, flag: Option<&String>) {
    if let Some(value) = flag {
        setting.clone_from(value);
    }
}
