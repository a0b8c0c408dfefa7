//! Per-entity tracking configuration

use std::collections::{BTreeMap, BTreeSet};

use crate::audit::Masker;
use crate::error::ConfigError;
use crate::models::EntityType;

/// How an entity type is tracked
///
/// Configurations are immutable once built; the registry shares them
/// behind `Arc` so readers never observe a half-applied change.
#[derive(Debug, Clone, Default)]
pub struct TrackedEntityConfig {
    include_fields: BTreeSet<String>,
    exclude_fields: BTreeSet<String>,
    mapping_fields: BTreeMap<String, String>,
    mask_fields: BTreeSet<String>,
    mask_callable: Option<Masker>,
    multi_valued_fields: BTreeSet<String>,
    serialize_full_state: bool,
    serialize_field_filter: Option<BTreeSet<String>>,
    serialize_tracked_only: bool,
}

impl TrackedEntityConfig {
    pub fn builder() -> TrackedEntityConfigBuilder {
        TrackedEntityConfigBuilder::default()
    }

    /// Whether a scalar field is part of the change set. Exclusion always
    /// wins, and multi-valued relations are never diffed as scalars.
    pub fn tracks_field(&self, field: &str) -> bool {
        (self.include_fields.is_empty() || self.include_fields.contains(field))
            && !self.exclude_fields.contains(field)
            && !self.multi_valued_fields.contains(field)
    }

    pub fn tracks_relation(&self, field: &str) -> bool {
        self.multi_valued_fields.contains(field)
    }

    pub fn is_excluded(&self, field: &str) -> bool {
        self.exclude_fields.contains(field)
    }

    pub fn is_masked(&self, field: &str) -> bool {
        self.mask_fields.contains(field)
    }

    /// Display label override for a field
    pub fn label_for(&self, field: &str) -> Option<&str> {
        self.mapping_fields.get(field).map(String::as_str)
    }

    pub fn include_fields(&self) -> &BTreeSet<String> {
        &self.include_fields
    }

    pub fn exclude_fields(&self) -> &BTreeSet<String> {
        &self.exclude_fields
    }

    pub fn mapping_fields(&self) -> &BTreeMap<String, String> {
        &self.mapping_fields
    }

    pub fn mask_fields(&self) -> &BTreeSet<String> {
        &self.mask_fields
    }

    pub fn mask_callable(&self) -> Option<&Masker> {
        self.mask_callable.as_ref()
    }

    pub fn multi_valued_fields(&self) -> &BTreeSet<String> {
        &self.multi_valued_fields
    }

    pub fn serializes_full_state(&self) -> bool {
        self.serialize_full_state
    }

    /// Whether a field belongs in the full-state snapshot
    pub fn snapshot_includes(&self, field: &str) -> bool {
        if self.exclude_fields.contains(field) {
            return false;
        }
        match &self.serialize_field_filter {
            Some(filter) => filter.contains(field),
            None if self.serialize_tracked_only => self.tracks_field(field),
            None => true,
        }
    }

    /// Check that the rules can all be honored together
    pub fn validate(&self, entity_type: &EntityType) -> Result<(), ConfigError> {
        let conflict = |reason: String| ConfigError::ConflictingFieldRules {
            entity_type: entity_type.to_string(),
            reason,
        };

        let named = self
            .include_fields
            .iter()
            .chain(&self.exclude_fields)
            .chain(&self.mask_fields)
            .chain(&self.multi_valued_fields)
            .chain(self.mapping_fields.keys());
        for name in named {
            if name.trim().is_empty() {
                return Err(conflict("empty field name".to_string()));
            }
        }

        if let Some(field) = self
            .multi_valued_fields
            .iter()
            .find(|f| self.include_fields.contains(*f))
        {
            return Err(conflict(format!(
                "'{}' is tracked both as a scalar and as a multi-valued relation",
                field
            )));
        }

        if let Some(field) = self
            .multi_valued_fields
            .iter()
            .find(|f| self.mask_fields.contains(*f))
        {
            return Err(conflict(format!(
                "multi-valued relation '{}' cannot be masked",
                field
            )));
        }

        Ok(())
    }
}

/// Builder for [`TrackedEntityConfig`]
#[derive(Debug, Clone, Default)]
pub struct TrackedEntityConfigBuilder {
    config: TrackedEntityConfig,
}

fn names<I, S>(fields: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fields.into_iter().map(Into::into)
}

impl TrackedEntityConfigBuilder {
    pub fn include<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.include_fields.extend(names(fields));
        self
    }

    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.exclude_fields.extend(names(fields));
        self
    }

    pub fn map_field(mut self, field: impl Into<String>, label: impl Into<String>) -> Self {
        self.config
            .mapping_fields
            .insert(field.into(), label.into());
        self
    }

    pub fn mask<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.mask_fields.extend(names(fields));
        self
    }

    pub fn mask_with(mut self, masker: Masker) -> Self {
        self.config.mask_callable = Some(masker);
        self
    }

    pub fn multi_valued<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.multi_valued_fields.extend(names(fields));
        self
    }

    pub fn serialize_full_state(mut self, enabled: bool) -> Self {
        self.config.serialize_full_state = enabled;
        self
    }

    /// Restrict the full-state snapshot to these fields
    pub fn serialize_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.serialize_field_filter = Some(names(fields).collect());
        self
    }

    /// Restrict the full-state snapshot to tracked fields
    pub fn serialize_tracked_only(mut self, enabled: bool) -> Self {
        self.config.serialize_tracked_only = enabled;
        self
    }

    pub fn build(self) -> TrackedEntityConfig {
        self.config
    }
}
