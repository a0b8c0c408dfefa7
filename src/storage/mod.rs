//! Storage layer for log entries
//!
//! `LogStore` is the seam between the dispatcher and wherever entries end
//! up. Appends must be atomic per entry; queries return entries oldest
//! first.

pub mod file_io;
pub mod jsonl;
pub mod memory;

pub use file_io::{read_json, write_json_atomic, write_jsonl_atomic};
pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::audit::{Action, LogEntry};
use crate::error::TrackResult;
use crate::models::{EntityType, LogEntryId};

/// Selects log entries; empty criteria match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
    pub entity_type: Option<EntityType>,
    pub object_pk: Option<String>,
    pub action: Option<Action>,
    pub actor_id: Option<String>,
    pub cid: Option<String>,
    /// Inclusive lower bound
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub before: Option<DateTime<Utc>>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_entity(entity_type: EntityType, pk: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type),
            object_pk: Some(pk.into()),
            ..Self::default()
        }
    }

    pub fn entity_type(mut self, entity_type: impl Into<EntityType>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.entity_type
            .as_ref()
            .map_or(true, |ty| entry.entity_type() == ty)
            && self
                .object_pk
                .as_deref()
                .map_or(true, |pk| entry.object_pk() == pk)
            && self.action.map_or(true, |a| entry.action() == a)
            && self
                .actor_id
                .as_deref()
                .map_or(true, |id| entry.actor().is_some_and(|a| a.id == id))
            && self
                .cid
                .as_deref()
                .map_or(true, |cid| entry.cid() == Some(cid))
            && self.since.map_or(true, |t| entry.timestamp() >= t)
            && self.before.map_or(true, |t| entry.timestamp() < t)
    }
}

/// Durable destination for log entries
pub trait LogStore: Send + Sync {
    /// Append one entry; either the whole entry is stored or none of it
    fn append(&self, entry: &LogEntry) -> TrackResult<LogEntryId>;

    /// Entries matching the filter, oldest first
    fn query(&self, filter: &LogFilter) -> TrackResult<Vec<LogEntry>>;

    /// Remove matching entries, returning how many were removed
    fn delete_matching(&self, filter: &LogFilter) -> TrackResult<usize>;

    fn get(&self, id: LogEntryId) -> TrackResult<Option<LogEntry>> {
        Ok(self.all()?.into_iter().find(|e| e.id() == id))
    }

    fn all(&self) -> TrackResult<Vec<LogEntry>> {
        self.query(&LogFilter::new())
    }

    fn query_by_entity(&self, entity_type: &EntityType, pk: &str) -> TrackResult<Vec<LogEntry>> {
        self.query(&LogFilter::for_entity(entity_type.clone(), pk))
    }

    fn query_by_time_range(
        &self,
        since: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> TrackResult<Vec<LogEntry>> {
        self.query(&LogFilter::new().since(since).before(before))
    }

    fn delete_before(&self, before: DateTime<Utc>) -> TrackResult<usize> {
        self.delete_matching(&LogFilter::new().before(before))
    }
}
