//! In-memory log store

use std::sync::RwLock;

use crate::audit::LogEntry;
use crate::error::{TrackError, TrackResult};
use crate::models::LogEntryId;

use super::{LogFilter, LogStore};

/// Keeps entries in append order; for tests and short-lived processes
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<Vec<LogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogStore for MemoryStore {
    fn append(&self, entry: &LogEntry) -> TrackResult<LogEntryId> {
        let mut entries = self.entries.write().map_err(|e| {
            TrackError::Persistence(format!("Failed to acquire write lock: {}", e))
        })?;
        entries.push(entry.clone());
        Ok(entry.id())
    }

    fn query(&self, filter: &LogFilter) -> TrackResult<Vec<LogEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| TrackError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(entries.iter().filter(|e| filter.matches(e)).cloned().collect())
    }

    fn delete_matching(&self, filter: &LogFilter) -> TrackResult<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| TrackError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let before = entries.len();
        entries.retain(|e| !filter.matches(e));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Action;
    use chrono::{Duration, Utc};

    fn entry(ty: &str, pk: &str, days_ago: i64) -> LogEntry {
        LogEntry::builder(ty, pk, Action::Update)
            .timestamp(Utc::now() - Duration::days(days_ago))
            .build()
    }

    #[test]
    fn test_append_and_get() {
        let store = MemoryStore::new();
        let e = entry("blog.Article", "1", 0);
        let id = store.append(&e).unwrap();
        assert_eq!(store.get(id).unwrap(), Some(e));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_query_by_entity() {
        let store = MemoryStore::new();
        store.append(&entry("blog.Article", "1", 2)).unwrap();
        store.append(&entry("blog.Article", "2", 1)).unwrap();
        store.append(&entry("blog.Article", "1", 0)).unwrap();

        let found = store
            .query_by_entity(&"blog.Article".into(), "1")
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].timestamp() < found[1].timestamp());
    }

    #[test]
    fn test_time_range_and_delete_before() {
        let store = MemoryStore::new();
        store.append(&entry("blog.Article", "1", 10)).unwrap();
        store.append(&entry("blog.Article", "2", 5)).unwrap();
        store.append(&entry("blog.Article", "3", 0)).unwrap();

        let now = Utc::now();
        let recent = store
            .query_by_time_range(now - Duration::days(7), now + Duration::days(1))
            .unwrap();
        assert_eq!(recent.len(), 2);

        let removed = store.delete_before(now - Duration::days(3)).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.all().unwrap()[0].object_pk(), "3");
    }
}
