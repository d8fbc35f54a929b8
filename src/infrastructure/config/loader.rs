use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{Config, RateLimitConfig};

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "notion-issues.yaml";

/// Prefix for environment overrides (`NOTION_ISSUES_NOTION__DATABASE=...`)
pub const ENV_PREFIX: &str = "NOTION_ISSUES_";

/// Configuration error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid rate limit for {0}: {1}. Must be positive")]
    InvalidRateLimit(&'static str, f64),

    #[error("Invalid burst_size for {0}: {1}. Must be at least 1")]
    InvalidBurstSize(&'static str, u32),

    #[error("Invalid page_workers: {0}. Must be at least 1")]
    InvalidPageWorkers(usize),

    #[error("Invalid page_size: {0}. Must be between 1 and 100")]
    InvalidPageSize(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: compact, pretty, json")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Missing {setting} (set it in the config file or with {hint})")]
    Missing {
        setting: &'static str,
        hint: &'static str,
    },

    #[error("Invalid {setting}: '{value}'. Expected {expected}")]
    Malformed {
        setting: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Which subcommand a configuration is about to serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Github,
    Jira,
    Bitbucket,
    /// Maintenance against the board only
    Notion,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `path`, or `notion-issues.yaml` in the working directory
    /// 3. Environment variables (`NOTION_ISSUES_*`, `__` separates sections)
    ///
    /// Command-line flags are applied on top by the caller.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let file = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);
        if path.is_some() && !file.exists() {
            anyhow::bail!("Config file {} does not exist", file.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration (file: {})", file.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate structural values after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["compact", "pretty", "json"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.fetch.page_workers == 0 {
            return Err(ConfigError::InvalidPageWorkers(config.fetch.page_workers));
        }

        if config.fetch.page_size == 0 || config.fetch.page_size > 100 {
            return Err(ConfigError::InvalidPageSize(config.fetch.page_size));
        }

        for (name, rate_limit) in [
            ("notion", &config.notion.rate_limit),
            ("github", &config.github.rate_limit),
            ("jira", &config.jira.rate_limit),
            ("bitbucket", &config.bitbucket.rate_limit),
        ] {
            Self::validate_rate_limit(name, rate_limit)?;
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        Ok(())
    }

    fn validate_rate_limit(name: &'static str, rate_limit: &RateLimitConfig) -> Result<(), ConfigError> {
        if rate_limit.requests_per_second <= 0.0 || !rate_limit.requests_per_second.is_finite() {
            return Err(ConfigError::InvalidRateLimit(name, rate_limit.requests_per_second));
        }
        if rate_limit.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(name, rate_limit.burst_size));
        }
        Ok(())
    }

    /// Pre-flight check of the credentials and identifiers `target` needs.
    ///
    /// Returns every problem found, empty when the run can start.
    pub fn validate_for(config: &Config, target: Target) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut require = |value: &str, setting: &'static str, hint: &'static str| {
            if value.trim().is_empty() {
                errors.push(ConfigError::Missing { setting, hint });
            }
        };

        require(&config.notion.token, "notion.token", "--notion-token or NOTION_TOKEN");
        require(&config.notion.database, "notion.database", "--notion-database");

        match target {
            Target::Notion => {}
            Target::Github => {
                require(&config.github.token, "github.token", "--github-token or GITHUB_TOKEN");
                require(&config.github.repo, "github.repo", "--repo");
            }
            Target::Jira => {
                require(&config.jira.token, "jira.token", "--jira-token or JIRA_TOKEN");
                require(&config.jira.server, "jira.server", "--server");
                require(&config.jira.project, "jira.project", "--project");
            }
            Target::Bitbucket => {
                require(&config.bitbucket.user, "bitbucket.user", "--user or BITBUCKET_USER");
                require(
                    &config.bitbucket.app_password,
                    "bitbucket.app_password",
                    "--app-password or BITBUCKET_APP_PASSWORD",
                );
                require(&config.bitbucket.repo, "bitbucket.repo", "--repo");
            }
        }

        let slash_path = |value: &str| {
            let mut parts = value.split('/');
            matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(a), Some(b), None) if !a.is_empty() && !b.is_empty()
            )
        };
        match target {
            Target::Github if !config.github.repo.is_empty() && !slash_path(&config.github.repo) => {
                errors.push(ConfigError::Malformed {
                    setting: "github.repo",
                    value: config.github.repo.clone(),
                    expected: "owner/name",
                });
            }
            Target::Bitbucket
                if !config.bitbucket.repo.is_empty() && !slash_path(&config.bitbucket.repo) =>
            {
                errors.push(ConfigError::Malformed {
                    setting: "bitbucket.repo",
                    value: config.bitbucket.repo.clone(),
                    expected: "workspace/name",
                });
            }
            Target::Jira
                if !config.jira.server.is_empty()
                    && !(config.jira.server.starts_with("http://")
                        || config.jira.server.starts_with("https://")) =>
            {
                errors.push(ConfigError::Malformed {
                    setting: "jira.server",
                    value: config.jira.server.clone(),
                    expected: "an http(s) URL",
                });
            }
            _ => {}
        }

        errors
    }
}
