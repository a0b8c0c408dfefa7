//! Lifecycle events reported by the host's persistence layer

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::audit::{Action, RelationOperation};
use crate::models::{EntityType, RelatedRecord, Snapshot};

/// Record states carried by an event
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Create {
        new: Snapshot,
    },
    Update {
        old: Snapshot,
        new: Snapshot,
        /// Fields written by a partial save; `None` means all fields
        update_fields: Option<Vec<String>>,
    },
    Delete {
        old: Snapshot,
    },
    Access {
        current: Option<Snapshot>,
    },
    Relation {
        field: String,
        operation: RelationOperation,
        related: Vec<RelatedRecord>,
    },
}

/// One change to one record
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub entity_type: EntityType,
    pub pk: String,
    pub payload: EventPayload,
    /// Representation supplied by the host; the catalog is asked otherwise
    pub repr: Option<String>,
    /// Bulk or fixture load rather than an interactive save
    pub raw: bool,
    pub timestamp: Option<DateTime<Utc>>,
    pub additional_data: Option<Value>,
}

impl LifecycleEvent {
    fn new(entity_type: impl Into<EntityType>, pk: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            entity_type: entity_type.into(),
            pk: pk.into(),
            payload,
            repr: None,
            raw: false,
            timestamp: None,
            additional_data: None,
        }
    }

    pub fn create(entity_type: impl Into<EntityType>, pk: impl Into<String>, new: Snapshot) -> Self {
        Self::new(entity_type, pk, EventPayload::Create { new })
    }

    pub fn update(
        entity_type: impl Into<EntityType>,
        pk: impl Into<String>,
        old: Snapshot,
        new: Snapshot,
    ) -> Self {
        Self::new(
            entity_type,
            pk,
            EventPayload::Update {
                old,
                new,
                update_fields: None,
            },
        )
    }

    pub fn delete(entity_type: impl Into<EntityType>, pk: impl Into<String>, old: Snapshot) -> Self {
        Self::new(entity_type, pk, EventPayload::Delete { old })
    }

    pub fn access(
        entity_type: impl Into<EntityType>,
        pk: impl Into<String>,
        current: Option<Snapshot>,
    ) -> Self {
        Self::new(entity_type, pk, EventPayload::Access { current })
    }

    pub fn relation_added(
        entity_type: impl Into<EntityType>,
        pk: impl Into<String>,
        field: impl Into<String>,
        related: Vec<RelatedRecord>,
    ) -> Self {
        Self::relation(entity_type, pk, field, RelationOperation::Add, related)
    }

    pub fn relation_removed(
        entity_type: impl Into<EntityType>,
        pk: impl Into<String>,
        field: impl Into<String>,
        related: Vec<RelatedRecord>,
    ) -> Self {
        Self::relation(entity_type, pk, field, RelationOperation::Remove, related)
    }

    fn relation(
        entity_type: impl Into<EntityType>,
        pk: impl Into<String>,
        field: impl Into<String>,
        operation: RelationOperation,
        related: Vec<RelatedRecord>,
    ) -> Self {
        Self::new(
            entity_type,
            pk,
            EventPayload::Relation {
                field: field.into(),
                operation,
                related,
            },
        )
    }

    /// Restrict an update to the fields a partial save wrote
    pub fn only_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let EventPayload::Update { update_fields, .. } = &mut self.payload {
            *update_fields = Some(fields.into_iter().map(Into::into).collect());
        }
        self
    }

    pub fn with_repr(mut self, repr: impl Into<String>) -> Self {
        self.repr = Some(repr.into());
        self
    }

    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_additional_data(mut self, data: Value) -> Self {
        self.additional_data = Some(data);
        self
    }

    pub fn action(&self) -> Action {
        match &self.payload {
            EventPayload::Create { .. } => Action::Create,
            EventPayload::Update { .. } => Action::Update,
            EventPayload::Delete { .. } => Action::Delete,
            EventPayload::Access { .. } => Action::Access,
            EventPayload::Relation { operation, .. } => Action::from(*operation),
        }
    }

    /// The record state to describe the record by
    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        match &self.payload {
            EventPayload::Create { new } | EventPayload::Update { new, .. } => Some(new),
            EventPayload::Delete { old } => Some(old),
            EventPayload::Access { current } => current.as_ref(),
            EventPayload::Relation { .. } => None,
        }
    }
}
