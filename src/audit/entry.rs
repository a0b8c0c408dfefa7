//! Log entry data structures
//!
//! A `LogEntry` is immutable once built. Actor, address and correlation id
//! are copied in at creation time, so later changes to the actor or the
//! tracked record never alter an existing entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::changes::{ChangePayload, ChangeValue, RelationOperation, StateSnapshot};
use crate::models::{Actor, EntityType, LogEntryId, RemoteAddr};

/// Representation stored when the record cannot be described
pub const DEFAULT_OBJECT_REPR: &str = "<error forming object repr>";

/// What happened to the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Delete,
    Access,
    RelationAdd,
    RelationRemove,
}

impl Action {
    pub fn is_relation(self) -> bool {
        matches!(self, Action::RelationAdd | Action::RelationRemove)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Access => "access",
            Action::RelationAdd => "relation_add",
            Action::RelationRemove => "relation_remove",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "CREATE"),
            Action::Update => write!(f, "UPDATE"),
            Action::Delete => write!(f, "DELETE"),
            Action::Access => write!(f, "ACCESS"),
            Action::RelationAdd => write!(f, "RELATION_ADD"),
            Action::RelationRemove => write!(f, "RELATION_REMOVE"),
        }
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            "access" => Ok(Action::Access),
            "relation_add" => Ok(Action::RelationAdd),
            "relation_remove" => Ok(Action::RelationRemove),
            other => Err(format!("unknown action: {}", other)),
        }
    }
}

impl From<RelationOperation> for Action {
    fn from(operation: RelationOperation) -> Self {
        match operation {
            RelationOperation::Add => Action::RelationAdd,
            RelationOperation::Remove => Action::RelationRemove,
        }
    }
}

/// A single persisted change record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    id: LogEntryId,

    entity_type: EntityType,

    /// Primary key of the tracked record, as text
    object_pk: String,

    /// Integer form of the primary key, when it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    object_id: Option<i64>,

    object_repr: String,

    action: Action,

    #[serde(default)]
    changes: ChangePayload,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    serialized_data: Option<StateSnapshot>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    actor: Option<Actor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_addr: Option<RemoteAddr>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    cid: Option<String>,

    /// When the change happened (UTC)
    timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    additional_data: Option<Value>,
}

impl LogEntry {
    pub fn builder(
        entity_type: impl Into<EntityType>,
        object_pk: impl Into<String>,
        action: Action,
    ) -> LogEntryBuilder {
        LogEntryBuilder::new(entity_type.into(), object_pk.into(), action)
    }

    pub fn id(&self) -> LogEntryId {
        self.id
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn object_pk(&self) -> &str {
        &self.object_pk
    }

    pub fn object_id(&self) -> Option<i64> {
        self.object_id
    }

    pub fn object_repr(&self) -> &str {
        &self.object_repr
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn changes(&self) -> &ChangePayload {
        &self.changes
    }

    pub fn serialized_data(&self) -> Option<&StateSnapshot> {
        self.serialized_data.as_ref()
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn remote_addr(&self) -> Option<&RemoteAddr> {
        self.remote_addr.as_ref()
    }

    pub fn cid(&self) -> Option<&str> {
        self.cid.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn additional_data(&self) -> Option<&Value> {
        self.additional_data.as_ref()
    }

    /// One-line description of what happened
    pub fn summary(&self) -> String {
        match self.action {
            Action::Create => format!("Created {}", self.object_repr),
            Action::Update => format!("Updated {}", self.object_repr),
            Action::Delete => format!("Deleted {}", self.object_repr),
            Action::Access => format!("Accessed {}", self.object_repr),
            Action::RelationAdd => format!("Added related objects to {}", self.object_repr),
            Action::RelationRemove => {
                format!("Removed related objects from {}", self.object_repr)
            }
        }
    }

    /// Render the change payload as text, one field per item
    pub fn changes_str(&self, colon: &str, arrow: &str, separator: &str) -> String {
        self.changes
            .iter()
            .map(|(field, change)| match change {
                ChangeValue::Field(old, new) => format!(
                    "{}{}{}{}{}",
                    field,
                    colon,
                    format_value(old),
                    arrow,
                    format_value(new)
                ),
                ChangeValue::Relation(relation) => format!(
                    "{}{}{} {}",
                    field,
                    colon,
                    relation.operation,
                    relation.objects.join(", ")
                ),
            })
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.action,
            self.entity_type,
            self.object_pk
        );

        if self.object_repr != self.object_pk {
            output.push_str(&format!(" ({})", self.object_repr));
        }

        if let Some(actor) = &self.actor {
            output.push_str(&format!(" by {}", actor));
        }

        if !self.changes.is_empty() {
            output.push_str(&format!(
                "\n  Changes: {}",
                self.changes_str(": ", " -> ", ", ")
            ));
        }

        output
    }
}

/// Format a normalized value for display
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builder for [`LogEntry`]
#[derive(Debug, Clone)]
pub struct LogEntryBuilder {
    entry: LogEntry,
}

impl LogEntryBuilder {
    fn new(entity_type: EntityType, object_pk: String, action: Action) -> Self {
        let object_id = object_pk.trim().parse::<i64>().ok();
        Self {
            entry: LogEntry {
                id: LogEntryId::new(),
                entity_type,
                object_pk,
                object_id,
                object_repr: DEFAULT_OBJECT_REPR.to_string(),
                action,
                changes: ChangePayload::new(),
                serialized_data: None,
                actor: None,
                remote_addr: None,
                cid: None,
                timestamp: Utc::now(),
                additional_data: None,
            },
        }
    }

    pub fn repr(mut self, repr: impl Into<String>) -> Self {
        self.entry.object_repr = repr.into();
        self
    }

    pub fn changes(mut self, changes: ChangePayload) -> Self {
        self.entry.changes = changes;
        self
    }

    pub fn serialized_data(mut self, state: Option<StateSnapshot>) -> Self {
        self.entry.serialized_data = state;
        self
    }

    pub fn actor(mut self, actor: Option<Actor>) -> Self {
        self.entry.actor = actor;
        self
    }

    pub fn remote_addr(mut self, addr: Option<RemoteAddr>) -> Self {
        self.entry.remote_addr = addr;
        self
    }

    pub fn cid(mut self, cid: Option<String>) -> Self {
        self.entry.cid = cid;
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.entry.timestamp = timestamp;
        self
    }

    pub fn additional_data(mut self, data: Option<Value>) -> Self {
        self.entry.additional_data = data;
        self
    }

    pub fn build(self) -> LogEntry {
        self.entry
    }
}
