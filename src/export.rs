//! The JSON snapshot of everything tracked, and the files it is saved to.

use crate::model::{Amount, Initiative};
use crate::store::LocalStore;
use crate::{utils, Config, Result};
use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix of snapshot file names.
pub const EXPORT_PREFIX: &str = "fundraising-tracker";

/// A point-in-time copy of the initiatives with their totals.
///
/// ```json
/// {
///   "initiatives": [ ... ],
///   "summary": { "totalTarget": 1500, "totalCurrent": 750, "overallProgress": "50.00" },
///   "exportDate": "2024-03-01T10:00:00Z",
///   "lastSync": null
/// }
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub initiatives: Vec<Initiative>,
    pub summary: SnapshotSummary,
    pub export_date: DateTime<Utc>,
    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub total_target: Amount,
    pub total_current: Amount,
    /// Percentage with exactly two decimals, e.g. `"50.00"`.
    pub overall_progress: String,
}

/// Builds the snapshot of `store` as of `now`.
pub fn snapshot(store: &LocalStore, last_sync: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Snapshot {
    let summary = store.summary();
    Snapshot {
        initiatives: store.initiatives().to_vec(),
        summary: SnapshotSummary {
            total_target: summary.total_target,
            total_current: summary.total_current,
            overall_progress: summary.progress_text(2),
        },
        export_date: now,
        last_sync,
    }
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize the snapshot to JSON")
    }
}

/// Writes snapshots into the exports directory.
///
/// File names are `fundraising-tracker-YYYY-MM-DD.json`, using the local date of the export. When
/// that name is taken, a sequence number is added: `fundraising-tracker-YYYY-MM-DD-002.json`.
#[derive(Debug, Clone)]
pub struct Exports {
    dir: PathBuf,
}

impl Exports {
    pub fn new(config: &Config) -> Self {
        Self::in_dir(config.exports())
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Saves `snapshot` in the exports directory and returns the path of the new file.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let date = snapshot
            .export_date
            .with_timezone(&Local)
            .format("%Y-%m-%d")
            .to_string();
        let path = self.next_path(&date).await?;
        write_snapshot(&path, snapshot).await?;
        Ok(path)
    }

    async fn next_path(&self, date: &str) -> Result<PathBuf> {
        let stem = format!("{EXPORT_PREFIX}-{date}");
        let first = self.dir.join(format!("{stem}.json"));
        if !exists(&first).await? {
            return Ok(first);
        }

        // The unsuffixed file counts as number 1.
        let mut max_seq: u32 = 1;
        let mut dir = utils::read_dir(&self.dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let file_name = entry.file_name();
            if let Some(seq) = parse_sequence_number(&file_name.to_string_lossy(), &stem) {
                max_seq = max_seq.max(seq);
            }
        }
        Ok(self.dir.join(format!("{stem}-{:03}.json", max_seq + 1)))
    }
}

/// Saves `snapshot` to exactly `path`, replacing any file there.
pub async fn save_to(path: &Path, snapshot: &Snapshot) -> Result<PathBuf> {
    write_snapshot(path, snapshot).await?;
    Ok(path.to_path_buf())
}

async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let json = snapshot.to_json()?;
    utils::write(path, json).await?;
    debug!("Wrote snapshot to {}", path.display());
    Ok(())
}

async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .with_context(|| format!("Unable to check for {}", path.display()))
}

/// Parses `NNN` out of `{stem}-NNN.json`.
fn parse_sequence_number(filename: &str, stem: &str) -> Option<u32> {
    filename
        .strip_prefix(stem)?
        .strip_prefix('-')?
        .strip_suffix(".json")?
        .parse()
        .ok()
}
