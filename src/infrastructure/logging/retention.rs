//! Removal of rolled log files past their retention period.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use tracing::{debug, warn};

/// Delete files in `log_dir` whose name starts with `prefix` and that were
/// last modified more than `retention_days` ago. Returns how many were removed.
pub async fn cleanup_old_logs(
    log_dir: impl AsRef<Path>,
    prefix: &str,
    retention_days: u32,
) -> Result<usize> {
    let log_dir = log_dir.as_ref();
    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
    let mut entries = tokio::fs::read_dir(log_dir)
        .await
        .context("failed to read log directory")?;

    let mut deleted = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .context("failed to read log directory entry")?
    {
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(prefix));
        if !is_log {
            continue;
        }

        let modified: DateTime<Utc> = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => modified.into(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read log file age");
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "removed expired log file");
                deleted += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove log file"),
        }
    }
    Ok(deleted)
}
