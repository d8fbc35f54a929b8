use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::models::LoggingConfig;

/// Resolved logging configuration for [`LoggerImpl`](super::LoggerImpl)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format on stderr
    pub format: LogFormat,

    /// Directory for rolling JSON log files (optional)
    pub log_dir: Option<PathBuf>,

    /// Log rotation policy
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!("Invalid log format: {s}"),
        }
    }
}

impl FromStr for RotationPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "hourly" => Ok(Self::Hourly),
            "never" => Ok(Self::Never),
            _ => anyhow::bail!("Invalid log rotation: {s}"),
        }
    }
}

impl LogConfig {
    /// Build from loaded settings. `verbose` forces the level to debug and
    /// `format` overrides the configured format.
    pub fn from_settings(
        settings: &LoggingConfig,
        verbose: bool,
        format: Option<LogFormat>,
    ) -> anyhow::Result<Self> {
        let format = match format {
            Some(format) => format,
            None => settings.format.parse()?,
        };
        Ok(Self {
            level: if verbose {
                "debug".to_string()
            } else {
                settings.level.clone()
            },
            format,
            log_dir: settings.log_dir.clone(),
            rotation: settings.rotation.parse()?,
        })
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_forces_debug() {
        let settings = LoggingConfig::default();
        let config = LogConfig::from_settings(&settings, true, None).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.rotation, RotationPolicy::Daily);
    }

    #[test]
    fn test_cli_format_overrides_settings() {
        let settings = LoggingConfig {
            format: "pretty".to_string(),
            ..LoggingConfig::default()
        };
        let config = LogConfig::from_settings(&settings, false, Some(LogFormat::Json)).unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_rejects_unknown_rotation() {
        let settings = LoggingConfig {
            rotation: "weekly".to_string(),
            ..LoggingConfig::default()
        };
        assert!(LogConfig::from_settings(&settings, false, None).is_err());
    }
}
