//! Durable result history.
//!
//! Records live in memory behind a reader-writer lock and are mirrored to
//! `<data_dir>/ocr_results.json` on every mutation. The file is replaced by
//! writing a sibling temp file and renaming it over the old one, so a crash
//! mid-write can never leave a truncated history behind. Ids are assigned
//! monotonically for the lifetime of the store and are not reused after a
//! clear.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{LecternError, Result};
use crate::models::{OcrRecord, RecordDraft};

const HISTORY_FILE: &str = "ocr_results.json";

pub struct ResultStore {
    path: PathBuf,
    records: RwLock<Vec<OcrRecord>>,
    next_id: AtomicU64,
}

impl ResultStore {
    /// Open the history under `data_dir`, creating the directory if needed.
    /// A history file that fails to parse is logged and treated as empty
    /// rather than refusing to start.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .await
            .map_err(|e| LecternError::Persistence(format!("Failed to create data dir: {e}")))?;

        let path = data_dir.join(HISTORY_FILE);
        let records: Vec<OcrRecord> = if path.exists() {
            let contents = fs::read_to_string(&path)
                .await
                .map_err(|e| LecternError::Persistence(format!("Failed to read history: {e}")))?;
            match serde_json::from_str(&contents) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "History file unreadable, starting empty");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let next_id = records.iter().map(|r| r.id).max().map_or(1, |max| max + 1);
        info!(count = records.len(), path = %path.display(), "Result history loaded");

        Ok(Self {
            path,
            records: RwLock::new(records),
            next_id: AtomicU64::new(next_id),
        })
    }

    /// Append one outcome, assigning the next id. The in-memory insert is
    /// rolled back if the disk write fails, so memory and disk never
    /// disagree.
    pub async fn append(&self, draft: RecordDraft) -> Result<OcrRecord> {
        let mut records = self.records.write().await;

        let record = OcrRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            status: draft.status,
            text: draft.text,
            error: draft.error,
            skip_reason: draft.skip_reason,
            image_path: draft.image_path,
            created_at: Utc::now(),
        };

        // Newest first.
        records.insert(0, record.clone());

        if let Err(e) = self.persist(&records).await {
            records.remove(0);
            return Err(e);
        }

        Ok(record)
    }

    /// All records, newest first.
    pub async fn list(&self) -> Vec<OcrRecord> {
        self.records.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Remove every record and report how many were removed. Holds the write
    /// lock across the disk write, so a concurrent `list` sees either the
    /// full pre-clear history or nothing. A failed disk write restores the
    /// previous records.
    pub async fn clear(&self) -> Result<usize> {
        let mut records = self.records.write().await;
        let drained = std::mem::take(&mut *records);
        let count = drained.len();

        if let Err(e) = self.persist(&records).await {
            *records = drained;
            return Err(e);
        }

        Ok(count)
    }

    async fn persist(&self, records: &[OcrRecord]) -> Result<()> {
        let serialized = serde_json::to_string_pretty(records)
            .map_err(|e| LecternError::Persistence(format!("Failed to serialize history: {e}")))?;

        // Write to a temp file, then rename for atomicity.
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized.as_bytes())
            .await
            .map_err(|e| LecternError::Persistence(format!("Failed to write history: {e}")))?;

        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| LecternError::Persistence(format!("Failed to replace history: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordStatus;

    async fn open_store(dir: &Path) -> ResultStore {
        ResultStore::open(dir).await.unwrap()
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;

        let first = store.append(RecordDraft::completed("one")).await.unwrap();
        let second = store.append(RecordDraft::completed("two")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;

        store.append(RecordDraft::completed("one")).await.unwrap();
        store.append(RecordDraft::completed("two")).await.unwrap();
        store.append(RecordDraft::completed("three")).await.unwrap();

        let records = store.list().await;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].text.as_deref(), Some("three"));
        assert_eq!(records[2].text.as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn test_clear_reports_count_and_empties() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;

        for i in 0..5 {
            store
                .append(RecordDraft::completed(format!("text {i}")))
                .await
                .unwrap();
        }

        assert_eq!(store.clear().await.unwrap(), 5);
        assert!(store.list().await.is_empty());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;

        store.append(RecordDraft::completed("only")).await.unwrap();
        assert_eq!(store.clear().await.unwrap(), 1);
        assert_eq!(store.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_store(dir.path()).await;
            store.append(RecordDraft::completed("kept")).await.unwrap();
            store
                .append(RecordDraft::error("device unavailable"))
                .await
                .unwrap();
        }

        let store = open_store(dir.path()).await;
        let records = store.list().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, RecordStatus::Error);
        assert_eq!(records[1].text.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_ids_continue_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_store(dir.path()).await;
            store.append(RecordDraft::completed("one")).await.unwrap();
            store.append(RecordDraft::completed("two")).await.unwrap();
        }

        let store = open_store(dir.path()).await;
        let next = store.append(RecordDraft::completed("three")).await.unwrap();
        assert_eq!(next.id, 3);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;

        let before = store.append(RecordDraft::completed("one")).await.unwrap();
        store.clear().await.unwrap();
        let after = store.append(RecordDraft::completed("two")).await.unwrap();

        assert!(after.id > before.id);
    }

    #[tokio::test]
    async fn test_corrupt_history_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HISTORY_FILE), "not json at all").unwrap();

        let store = open_store(dir.path()).await;
        assert!(store.list().await.is_empty());

        // The store still works after tolerating the corrupt file.
        let record = store.append(RecordDraft::completed("fresh")).await.unwrap();
        assert_eq!(record.id, 1);
    }

    #[tokio::test]
    async fn test_persist_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        store.append(RecordDraft::completed("one")).await.unwrap();

        assert!(dir.path().join(HISTORY_FILE).exists());
        assert!(!dir.path().join("ocr_results.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_skipped_record_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_store(dir.path()).await;
            store
                .append(RecordDraft::skipped("frame contains no text"))
                .await
                .unwrap();
        }

        let store = open_store(dir.path()).await;
        let records = store.list().await;
        assert_eq!(records[0].status, RecordStatus::Skipped);
        assert_eq!(
            records[0].skip_reason.as_deref(),
            Some("frame contains no text")
        );
        assert!(records[0].text.is_none());
    }
}
