use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for notion-issues
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Reconciliation policy defaults
    #[serde(default)]
    pub sync: SyncConfig,

    /// Fetch-layer concurrency settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retry policy for transient remote failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Record-of-truth board settings
    #[serde(default)]
    pub notion: NotionConfig,

    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub jira: JiraConfig,

    #[serde(default)]
    pub bitbucket: BitbucketConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: compact, pretty or json
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Reconciliation policy defaults, overridable from the command line
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Create records for issues that are already closed
    #[serde(default)]
    pub create_closed: bool,

    /// Only create records assigned to this user
    #[serde(default)]
    pub create_assignee: String,

    /// Archive closed records untouched for this many days (0 disables)
    #[serde(default)]
    pub archive_after_days: u32,

    /// File holding the previous run's start time
    #[serde(default)]
    pub since_file: Option<PathBuf>,
}

/// Fetch-layer concurrency settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FetchConfig {
    /// Records resolved concurrently per page of results
    #[serde(default = "default_page_workers")]
    pub page_workers: usize,

    /// Page size requested from paginated endpoints
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Also fetch each record's comment thread
    #[serde(default)]
    pub fetch_comments: bool,
}

const fn default_page_workers() -> usize {
    10
}

const fn default_page_size() -> u32 {
    100
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_workers: default_page_workers(),
            page_size: default_page_size(),
            fetch_comments: false,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Tokens refilled per second
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Bucket capacity
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_requests_per_second() -> f64 {
    10.0
}

const fn default_burst_size() -> u32 {
    20
}

impl RateLimitConfig {
    pub const fn new(requests_per_second: f64, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(default_requests_per_second(), default_burst_size())
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Give up after retrying for this long (0 disables retries)
    #[serde(default = "default_max_elapsed_ms")]
    pub max_elapsed_ms: u64,
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

const fn default_max_elapsed_ms() -> u64 {
    60_000
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_elapsed_ms: 0,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_elapsed_ms: default_max_elapsed_ms(),
        }
    }
}

/// Notion board (record of truth)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NotionConfig {
    #[serde(default)]
    pub token: String,

    /// Database title, resolved to an id through search
    #[serde(default = "default_notion_database")]
    pub database: String,

    #[serde(default = "default_notion_base_url")]
    pub base_url: String,

    #[serde(default = "default_notion_rate_limit")]
    pub rate_limit: RateLimitConfig,
}

fn default_notion_database() -> String {
    "Issues".to_string()
}

fn default_notion_base_url() -> String {
    "https://api.notion.com".to_string()
}

// Notion averages three requests per second and tolerates short bursts.
const fn default_notion_rate_limit() -> RateLimitConfig {
    RateLimitConfig::new(5.0, 35)
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            database: default_notion_database(),
            base_url: default_notion_base_url(),
            rate_limit: default_notion_rate_limit(),
        }
    }
}

/// GitHub repository issues
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GithubConfig {
    #[serde(default)]
    pub token: String,

    /// Repository as `owner/name`
    #[serde(default)]
    pub repo: String,

    /// Key issues by the full `owner/name` path instead of the name
    #[serde(default)]
    pub use_path: bool,

    #[serde(default = "default_github_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_github_base_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            repo: String::new(),
            use_path: false,
            base_url: default_github_base_url(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Jira project issues
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JiraConfig {
    #[serde(default)]
    pub token: String,

    /// Server root, e.g. `https://jira.example.com`
    #[serde(default)]
    pub server: String,

    /// Project key
    #[serde(default)]
    pub project: String,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Bitbucket Cloud repository issues
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BitbucketConfig {
    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub app_password: String,

    /// Repository as `workspace/name`
    #[serde(default)]
    pub repo: String,

    #[serde(default = "default_bitbucket_server")]
    pub server: String,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_bitbucket_server() -> String {
    "https://api.bitbucket.org".to_string()
}

impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            app_password: String::new(),
            repo: String::new(),
            server: default_bitbucket_server(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
