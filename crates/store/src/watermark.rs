//! Durable per-cadence watermarks.
//!
//! Each cadence remembers the timestamp of its last digest read. The marks
//! live in a small JSON key-value file so a restart does not silently drop
//! the unsummarized backlog; the file is replaced atomically (write to a
//! `.tmp` sibling, fsync, rename) so a crash mid-write leaves the previous
//! marks intact.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct WatermarkTracker {
    path: PathBuf,
    marks: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl WatermarkTracker {
    /// Load marks from `path`, filling any label missing from the file with
    /// `default` (process-start time in the service). A missing file means
    /// a first run; every label starts at `default`.
    pub fn load(
        path: impl Into<PathBuf>,
        labels: &[&str],
        default: DateTime<Utc>,
    ) -> Result<Self> {
        let path = path.into();
        let mut marks: HashMap<String, DateTime<Utc>> = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            HashMap::new()
        };
        for label in labels {
            marks.entry((*label).to_string()).or_insert(default);
        }
        Ok(Self {
            path,
            marks: Mutex::new(marks),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, label: &str) -> Option<DateTime<Utc>> {
        self.marks.lock().await.get(label).copied()
    }

    /// Move `label` to `at` and persist the whole map atomically.
    pub async fn advance(&self, label: &str, at: DateTime<Utc>) -> Result<()> {
        let snapshot = {
            let mut marks = self.marks.lock().await;
            marks.insert(label.to_string(), at);
            marks.clone()
        };
        self.persist(&snapshot).await
    }

    async fn persist(&self, marks: &HashMap<String, DateTime<Utc>>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = {
            let filename = self
                .path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "watermarks.json".to_string());
            self.path.with_file_name(format!("{filename}.tmp"))
        };

        let write_result: Result<()> = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .await?;
            let body = serde_json::to_vec_pretty(marks)?;
            file.write_all(&body).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
