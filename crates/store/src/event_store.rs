//! Append-only CSV store for normalized activity records.
//!
//! Layout: a fixed header row `timestamp,user_name,event_type,content`
//! followed by one record per line, UTF-8, append-only. The file is the
//! single durable owner of event records; it is never rewritten in place.
//!
//! Concurrency discipline: the ingress side appends, the digest side
//! full-scans. Each append serializes the whole row first and hands it to
//! the kernel as a single `write` on an `O_APPEND` handle, so a concurrent
//! reader may miss the newest row but never observes a torn one.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use feedpulse_event::ActivityRecord;

const HEADER: &str = "timestamp,user_name,event_type,content\n";

#[derive(Debug, Clone)]
pub struct EventStore {
    path: PathBuf,
}

impl EventStore {
    /// Open the store, creating the file with its header row (and any
    /// missing parent directories) when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let mut file = fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            file.write_all(HEADER.as_bytes())?;
            file.sync_all()?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. The row is flushed and fsynced before returning
    /// so an acknowledged webhook survives a crash immediately after.
    pub async fn append(&self, record: &ActivityRecord) -> Result<()> {
        let row = serialize_row(record)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening {} for append", self.path.display()))?;
        file.write_all(&row).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Read every record ever appended, in append order. Rows that fail to
    /// parse are skipped with a warning rather than aborting the scan.
    pub fn read_all(&self) -> Result<Vec<ActivityRecord>> {
        let file = fs::File::open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(file);

        let mut records = Vec::new();
        let mut corrupt_count = 0usize;
        for (row_idx, row) in reader.deserialize::<ActivityRecord>().enumerate() {
            match row {
                Ok(record) => records.push(record),
                Err(err) => {
                    corrupt_count += 1;
                    tracing::warn!(
                        row = row_idx + 1,
                        error = %err,
                        path = %self.path.display(),
                        "skipping unparseable store row"
                    );
                }
            }
        }
        if corrupt_count > 0 {
            tracing::warn!(
                corrupt_rows = corrupt_count,
                path = %self.path.display(),
                "activity store scanned with skipped rows"
            );
        }
        Ok(records)
    }

    /// Records with a timestamp strictly greater than `since`, append order.
    pub fn read_since(&self, since: DateTime<Utc>) -> Result<Vec<ActivityRecord>> {
        let mut records = self.read_all()?;
        records.retain(|r| r.timestamp > since);
        Ok(records)
    }
}

fn serialize_row(record: &ActivityRecord) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.serialize(record)?;
    writer.flush()?;
    Ok(writer.into_inner()?)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn record(offset_secs: i64, user: &str, content: &str) -> ActivityRecord {
        ActivityRecord {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
                + chrono::Duration::seconds(offset_secs),
            user_name: user.to_string(),
            event_type: "new_tweet".to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn open_creates_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/activity.csv");
        let store = EventStore::open(&path).unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, HEADER);
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn reopen_does_not_duplicate_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.csv");
        EventStore::open(&path).unwrap();
        EventStore::open(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), HEADER);
    }

    #[tokio::test]
    async fn append_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path().join("a.csv")).unwrap();
        let rec = record(0, "bob", "hello, world");
        store.append(&rec).await.unwrap();
        let all = store.read_all().unwrap();
        assert_eq!(all, vec![rec]);
    }

    #[tokio::test]
    async fn append_is_monotonic_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path().join("a.csv")).unwrap();
        for i in 0..5 {
            store.append(&record(i, "u", &format!("event-{i}"))).await.unwrap();
        }
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 5);
        for (i, rec) in all.iter().enumerate() {
            assert_eq!(rec.content, format!("event-{i}"));
        }
    }

    #[tokio::test]
    async fn read_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path().join("a.csv")).unwrap();
        store.append(&record(0, "u", "x")).await.unwrap();
        store.append(&record(1, "u", "y")).await.unwrap();
        assert_eq!(store.read_all().unwrap(), store.read_all().unwrap());
    }

    #[tokio::test]
    async fn read_since_is_strictly_greater() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path().join("a.csv")).unwrap();
        let boundary = record(60, "u", "at boundary");
        store.append(&record(0, "u", "old")).await.unwrap();
        store.append(&boundary).await.unwrap();
        store.append(&record(120, "u", "new")).await.unwrap();
        let since = boundary.timestamp;
        let newer = store.read_since(since).unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].content, "new");
    }

    #[tokio::test]
    async fn fields_with_commas_and_newlines_survive() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path().join("a.csv")).unwrap();
        let rec = record(0, "a, b", "line one\nline two, with comma");
        store.append(&rec).await.unwrap();
        assert_eq!(store.read_all().unwrap(), vec![rec]);
    }

    #[tokio::test]
    async fn corrupt_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        let store = EventStore::open(&path).unwrap();
        store.append(&record(0, "u", "valid")).await.unwrap();
        // Inject a row with a garbage timestamp directly.
        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "not-a-timestamp,u,new_tweet,broken").unwrap();
        store.append(&record(1, "u", "also valid")).await.unwrap();
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content, "valid");
        assert_eq!(all[1].content, "also valid");
    }

    #[tokio::test]
    async fn concurrent_appends_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(EventStore::open(dir.path().join("a.csv")).unwrap());
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(&record(i, "u", &format!("c-{i}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.read_all().unwrap().len(), 20);
    }
}
