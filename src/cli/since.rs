//! Lower time bound of a run, given on the command line or persisted
//! between runs in a since-file.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tokio::fs;

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date (midnight UTC).
pub fn parse_since(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("'{raw}' is neither an RFC 3339 timestamp nor a YYYY-MM-DD date"))
}

/// Read the bound stored in `path`. A missing or empty file means no bound.
pub async fn read_since_file(path: &Path) -> Result<Option<DateTime<Utc>>> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read since-file {}", path.display()))
        }
    };
    if contents.trim().is_empty() {
        return Ok(None);
    }
    parse_since(&contents)
        .map(Some)
        .map_err(|err| anyhow::anyhow!("Invalid since-file {}: {err}", path.display()))
}

/// Record `started` in `path` so the next run only looks at newer changes.
pub async fn write_since_file(path: &Path, started: DateTime<Utc>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = format!("{}\n", started.to_rfc3339_opts(SecondsFormat::Secs, true));
    fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write since-file {}", path.display()))
}
