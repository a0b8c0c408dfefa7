//! Field catalog capability
//!
//! The host application owns its schema. tracklog only asks three things of
//! it: which entity types exist, which fields each one declares (in order),
//! and how to render a record for humans.

use std::collections::HashMap;
use std::sync::Arc;

use super::entity::{EntityType, FieldMeta};
use super::value::{FieldValue, Snapshot};

/// Schema introspection supplied by the host application
pub trait FieldCatalog: Send + Sync {
    /// All entity types known to the host, used by the track-all policy
    fn entity_types(&self) -> Vec<EntityType>;

    /// Fields of an entity type in stable declaration order
    fn fields(&self, entity_type: &EntityType) -> Option<Arc<[FieldMeta]>>;

    /// Human-readable representation of a record. Must tolerate records that
    /// were just deleted; `None` makes the dispatcher use a placeholder.
    fn describe(
        &self,
        _entity_type: &EntityType,
        _pk: &str,
        _snapshot: Option<&Snapshot>,
    ) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
struct EntityDescriptor {
    fields: Arc<[FieldMeta]>,
    repr_field: Option<String>,
}

/// In-memory catalog built up front, for hosts with a static schema and
/// for tests
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entities: HashMap<EntityType, EntityDescriptor>,
    order: Vec<EntityType>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entity type and its fields
    pub fn entity(
        mut self,
        entity_type: impl Into<EntityType>,
        fields: impl IntoIterator<Item = FieldMeta>,
    ) -> Self {
        let entity_type = entity_type.into();
        let descriptor = EntityDescriptor {
            fields: fields.into_iter().collect(),
            repr_field: None,
        };
        if self.entities.insert(entity_type.clone(), descriptor).is_none() {
            self.order.push(entity_type);
        }
        self
    }

    /// Use a field's text value as the record representation
    pub fn repr_field(mut self, entity_type: impl Into<EntityType>, field: impl Into<String>) -> Self {
        if let Some(descriptor) = self.entities.get_mut(&entity_type.into()) {
            descriptor.repr_field = Some(field.into());
        }
        self
    }
}

impl FieldCatalog for StaticCatalog {
    fn entity_types(&self) -> Vec<EntityType> {
        self.order.clone()
    }

    fn fields(&self, entity_type: &EntityType) -> Option<Arc<[FieldMeta]>> {
        self.entities
            .get(entity_type)
            .map(|descriptor| Arc::clone(&descriptor.fields))
    }

    fn describe(
        &self,
        entity_type: &EntityType,
        pk: &str,
        snapshot: Option<&Snapshot>,
    ) -> Option<String> {
        let descriptor = self.entities.get(entity_type)?;
        let repr = descriptor
            .repr_field
            .as_deref()
            .and_then(|field| snapshot?.get(field))
            .and_then(|value| match value {
                FieldValue::Text(text) => Some(text.clone()),
                FieldValue::Int(i) => Some(i.to_string()),
                _ => None,
            });
        Some(repr.unwrap_or_else(|| format!("{} object ({})", entity_type, pk)))
    }
}
