//! Append-only JSONL log store
//!
//! Each entry is one JSON line, written and flushed in a single append.
//! Deletion rewrites the file atomically with the surviving entries.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::audit::LogEntry;
use crate::error::{TrackError, TrackResult};
use crate::models::LogEntryId;

use super::file_io::write_jsonl_atomic;
use super::{LogFilter, LogStore};

/// Stores entries in a line-delimited JSON file
///
/// Writers within the process are serialized so a rewrite never races an
/// append.
#[derive(Debug)]
pub struct JsonlStore {
    log_path: PathBuf,
    writer: Mutex<()>,
}

impl JsonlStore {
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    pub fn exists(&self) -> bool {
        self.log_path.exists()
    }

    fn lock(&self) -> TrackResult<MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|e| TrackError::Storage(format!("Failed to acquire log lock: {}", e)))
    }

    /// Read all entries, oldest first
    fn read_all(&self) -> TrackResult<Vec<LogEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| TrackError::Io(format!("Failed to open change log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                TrackError::Io(format!("Failed to read change log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: LogEntry = serde_json::from_str(&line).map_err(|e| {
                TrackError::Json(format!(
                    "Failed to parse log entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            entries.push(entry);
        }

        Ok(entries)
    }

    /// The most recent `count` entries, oldest first
    pub fn read_recent(&self, count: usize) -> TrackResult<Vec<LogEntry>> {
        let all_entries = self.read_all()?;
        let start = all_entries.len().saturating_sub(count);
        Ok(all_entries[start..].to_vec())
    }

    pub fn entry_count(&self) -> TrackResult<usize> {
        Ok(self.read_all()?.len())
    }
}

impl LogStore for JsonlStore {
    fn append(&self, entry: &LogEntry) -> TrackResult<LogEntryId> {
        let json = serde_json::to_string(entry)
            .map_err(|e| TrackError::Persistence(format!("Failed to serialize log entry: {}", e)))?;

        let _writer = self
            .writer
            .lock()
            .map_err(|e| TrackError::Persistence(format!("Failed to acquire log lock: {}", e)))?;

        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrackError::Persistence(format!("Failed to create log directory: {}", e))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| TrackError::Persistence(format!("Failed to open change log: {}", e)))?;

        // One write per entry so a concurrent reader never sees half a line
        file.write_all(format!("{}\n", json).as_bytes())
            .map_err(|e| TrackError::Persistence(format!("Failed to write log entry: {}", e)))?;

        file.flush()
            .map_err(|e| TrackError::Persistence(format!("Failed to flush change log: {}", e)))?;

        Ok(entry.id())
    }

    fn query(&self, filter: &LogFilter) -> TrackResult<Vec<LogEntry>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect())
    }

    fn delete_matching(&self, filter: &LogFilter) -> TrackResult<usize> {
        let _writer = self.lock()?;
        let entries = self.read_all()?;
        let before = entries.len();
        let kept: Vec<_> = entries.into_iter().filter(|e| !filter.matches(e)).collect();
        let removed = before - kept.len();

        if removed > 0 {
            write_jsonl_atomic(&self.log_path, &kept)?;
        }
        tracing::info!(removed, path = %self.log_path.display(), "deleted log entries");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{Action, ChangePayload, ChangeValue};
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn create_test_store() -> (JsonlStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlStore::new(temp_dir.path().join("changes.log"));
        (store, temp_dir)
    }

    fn create_test_entry(pk: &str) -> LogEntry {
        let mut changes = ChangePayload::new();
        changes.insert("title", ChangeValue::Field(json!("A"), json!("B")));
        LogEntry::builder("blog.Article", pk, Action::Update)
            .repr("Article")
            .changes(changes)
            .build()
    }

    #[test]
    fn test_append_and_read() {
        let (store, _temp) = create_test_store();
        let entry = create_test_entry("1");

        store.append(&entry).unwrap();

        let entries = store.all().unwrap();
        assert_eq!(entries, vec![entry]);
    }

    #[test]
    fn test_read_recent() {
        let (store, _temp) = create_test_store();
        for i in 0..10 {
            store.append(&create_test_entry(&i.to_string())).unwrap();
        }

        let recent = store.read_recent(3).unwrap();
        let pks: Vec<_> = recent.iter().map(|e| e.object_pk()).collect();
        assert_eq!(pks, ["7", "8", "9"]);
    }

    #[test]
    fn test_empty_log() {
        let (store, _temp) = create_test_store();
        assert!(!store.exists());
        assert_eq!(store.entry_count().unwrap(), 0);
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_delete_matching_rewrites() {
        let (store, temp) = create_test_store();
        store.append(&create_test_entry("1")).unwrap();
        store.append(&create_test_entry("2")).unwrap();
        store.append(&create_test_entry("1")).unwrap();

        let filter = LogFilter::for_entity("blog.Article".into(), "1");
        assert_eq!(store.delete_matching(&filter).unwrap(), 2);

        // Survives reopening
        let reopened = JsonlStore::new(temp.path().join("changes.log"));
        let entries = reopened.all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].object_pk(), "2");
    }

    #[test]
    fn test_get_by_id() {
        let (store, _temp) = create_test_store();
        let entry = create_test_entry("1");
        let id = store.append(&entry).unwrap();
        store.append(&create_test_entry("2")).unwrap();

        assert_eq!(store.get(id).unwrap().unwrap().object_pk(), "1");
        assert!(store.get(LogEntryId::new()).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_line_reported() {
        let (store, _temp) = create_test_store();
        store.append(&create_test_entry("1")).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(store.path())
            .unwrap()
            .write_all(b"{not json\n")
            .unwrap();

        let err = store.all().unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_concurrent_appends() {
        let (store, _temp) = create_test_store();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..25 {
                        store
                            .append(&create_test_entry(&format!("{}-{}", t, i)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.entry_count().unwrap(), 100);
    }
}
