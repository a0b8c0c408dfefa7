//! Diff engine
//!
//! Compares two snapshots of one record field by field, in catalog order,
//! and produces the change set stored on a log entry. Normalization happens
//! before comparison and masking after it, so a masked field is recorded
//! whenever its underlying value changed.

use std::collections::{BTreeSet, HashSet};

use serde_json::Value;

use super::changes::{ChangeSet, FieldChange, RelationChange, RelationOperation, StateSnapshot};
use super::mask::{resolve_masker, Masker};
use super::normalize::{raw_json, Normalizer, NormalizerOptions};
use crate::error::{TrackError, TrackResult};
use crate::models::{FieldMeta, FieldValue, RelatedRecord, Snapshot};
use crate::registry::TrackedEntityConfig;

static NULL: FieldValue = FieldValue::Null;

/// Computes change sets under a tracking configuration
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    normalizer: Normalizer,
    global_exclude: BTreeSet<String>,
    global_masker: Option<Masker>,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_normalizer(mut self, options: NormalizerOptions) -> Self {
        self.normalizer = Normalizer::new(options);
        self
    }

    /// Fields never tracked on any entity type
    pub fn with_global_exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_exclude = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Masker used when an entity has no callable of its own
    pub fn with_global_masker(mut self, masker: Masker) -> Self {
        self.global_masker = Some(masker);
        self
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Diff two states of a record
    ///
    /// `None` on one side means the record does not exist there (create or
    /// delete) and every field is null on that side. With both sides
    /// present, fields missing from either snapshot are skipped.
    pub fn diff(
        &self,
        config: &TrackedEntityConfig,
        old: Option<&Snapshot>,
        new: Option<&Snapshot>,
        fields: &[FieldMeta],
    ) -> TrackResult<ChangeSet> {
        self.diff_fields(config, old, new, fields, None)
    }

    /// Diff restricted to an explicit list of fields, as for partial saves
    pub fn diff_fields(
        &self,
        config: &TrackedEntityConfig,
        old: Option<&Snapshot>,
        new: Option<&Snapshot>,
        fields: &[FieldMeta],
        only: Option<&[String]>,
    ) -> TrackResult<ChangeSet> {
        check_catalog(fields)?;

        let mut set = ChangeSet::new();
        if old.is_none() && new.is_none() {
            return Ok(set);
        }

        let masker = resolve_masker(config, self.global_masker.as_ref());

        for field in fields {
            let name = field.name.as_str();
            if !self.tracks(config, name) {
                continue;
            }
            if only.is_some_and(|only| !only.iter().any(|f| f == name)) {
                continue;
            }

            let (old_raw, new_raw) = match (old, new) {
                (Some(o), Some(n)) => match (o.get(name), n.get(name)) {
                    (Some(a), Some(b)) => (a, b),
                    _ => continue,
                },
                (Some(o), None) => match o.get(name) {
                    Some(a) => (a, &NULL),
                    None => continue,
                },
                (None, Some(n)) => match n.get(name) {
                    Some(b) => (&NULL, b),
                    None => continue,
                },
                (None, None) => continue,
            };

            let old_norm = self.normalizer.normalize(old_raw, field);
            let new_norm = self.normalizer.normalize(new_raw, field);
            let (old_value, new_value) = match (old_norm, new_norm) {
                (Ok(a), Ok(b)) => {
                    if a == b {
                        continue;
                    }
                    (a, b)
                }
                (a, b) => {
                    if old_raw == new_raw {
                        continue;
                    }
                    tracing::warn!(field = name, kind = %field.kind, "keeping stored value for field");
                    let a = a.unwrap_or_else(|_| fallback(old_raw, field));
                    let b = b.unwrap_or_else(|_| fallback(new_raw, field));
                    if a == b {
                        continue;
                    }
                    (a, b)
                }
            };

            let (old_value, new_value) = if config.is_masked(name) {
                (masker.mask_value(&old_value), masker.mask_value(&new_value))
            } else {
                (old_value, new_value)
            };

            set.push(FieldChange {
                field: name.to_string(),
                label: label_for(config, field),
                old: old_value,
                new: new_value,
            });
        }

        if config.serializes_full_state() {
            if let Some(current) = new.or(old) {
                set.set_full_state(self.full_state(config, current, fields, &masker));
            }
        }

        Ok(set)
    }

    /// Change set with no field changes, carrying only the full-state
    /// snapshot when the configuration asks for one
    pub fn state_only(
        &self,
        config: &TrackedEntityConfig,
        current: Option<&Snapshot>,
        fields: &[FieldMeta],
    ) -> TrackResult<ChangeSet> {
        check_catalog(fields)?;
        let mut set = ChangeSet::new();
        if let (true, Some(current)) = (config.serializes_full_state(), current) {
            let masker = resolve_masker(config, self.global_masker.as_ref());
            set.set_full_state(self.full_state(config, current, fields, &masker));
        }
        Ok(set)
    }

    /// Describe members added to or removed from a multi-valued relation.
    /// Returns `None` when the field is not tracked as one.
    pub fn relation_change(
        &self,
        config: &TrackedEntityConfig,
        field: &str,
        operation: RelationOperation,
        related: &[RelatedRecord],
        fields: &[FieldMeta],
    ) -> Option<RelationChange> {
        if !config.tracks_relation(field) || self.global_exclude.contains(field) {
            return None;
        }

        let label = config
            .label_for(field)
            .map(str::to_string)
            .or_else(|| {
                fields
                    .iter()
                    .find(|meta| meta.name == field)
                    .map(|meta| meta.label.clone())
            })
            .unwrap_or_else(|| field.replace('_', " "));

        Some(RelationChange {
            field: field.to_string(),
            label,
            operation,
            objects: related.iter().map(|r| r.display().to_string()).collect(),
            pks: related.iter().map(|r| r.pk.clone()).collect(),
        })
    }

    fn tracks(&self, config: &TrackedEntityConfig, field: &str) -> bool {
        config.tracks_field(field) && !self.global_exclude.contains(field)
    }

    fn full_state(
        &self,
        config: &TrackedEntityConfig,
        current: &Snapshot,
        fields: &[FieldMeta],
        masker: &Masker,
    ) -> StateSnapshot {
        let mut state = StateSnapshot::new();
        for field in fields {
            let name = field.name.as_str();
            if !config.snapshot_includes(name) || self.global_exclude.contains(name) {
                continue;
            }
            let Some(raw) = current.get(name) else {
                continue;
            };
            let value = self
                .normalizer
                .normalize(raw, field)
                .unwrap_or_else(|_| fallback(raw, field));
            let value = if config.is_masked(name) {
                masker.mask_value(&value)
            } else {
                value
            };
            state.insert(name, value);
        }
        state
    }
}

fn label_for(config: &TrackedEntityConfig, field: &FieldMeta) -> String {
    config
        .label_for(&field.name)
        .unwrap_or(&field.label)
        .to_string()
}

/// Stored form of a value the normalizer could not interpret, or a
/// placeholder when it has no JSON form at all
fn fallback(raw: &FieldValue, field: &FieldMeta) -> Value {
    raw_json(raw).unwrap_or_else(|| Value::String(format!("<unrenderable {}>", field.kind)))
}

fn check_catalog(fields: &[FieldMeta]) -> TrackResult<()> {
    let mut seen = HashSet::new();
    for field in fields {
        if field.name.is_empty() {
            return Err(TrackError::DiffComputation(
                "field metadata with an empty name".to_string(),
            ));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(TrackError::DiffComputation(format!(
                "field '{}' declared twice",
                field.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Choice, FieldKind};
    use serde_json::json;

    fn fields() -> Vec<FieldMeta> {
        vec![
            FieldMeta::new("title", FieldKind::Text),
            FieldMeta::new("status", FieldKind::Choice)
                .choices([Choice::new("d", "Draft"), Choice::new("p", "Published")]),
            FieldMeta::new("ssn", FieldKind::Text),
            FieldMeta::new("author", FieldKind::Relation),
            FieldMeta::new("views", FieldKind::Integer),
            FieldMeta::new("tags", FieldKind::Relation),
        ]
    }

    fn before() -> Snapshot {
        Snapshot::new()
            .with("title", "Draft title")
            .with("status", "d")
            .with("ssn", "123-45-6789")
            .with("author", RelatedRecord::new("1"))
            .with("views", 10)
    }

    #[test]
    fn test_update_records_only_changed_fields() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::default();
        let after = before().with("title", "Final title").with("views", 11);

        let set = engine
            .diff(&config, Some(&before()), Some(&after), &fields())
            .unwrap();

        assert_eq!(set.fields().collect::<Vec<_>>(), ["title", "views"]);
        let title = set.get("title").unwrap();
        assert_eq!(title.old, json!("Draft title"));
        assert_eq!(title.new, json!("Final title"));
    }

    #[test]
    fn test_create_has_null_old_side() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::builder().include(["title", "views"]).build();

        let set = engine.diff(&config, None, Some(&before()), &fields()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("views").unwrap().old, Value::Null);
        assert_eq!(set.get("views").unwrap().new, json!(10));
    }

    #[test]
    fn test_delete_has_null_new_side() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::builder().include(["title"]).build();

        let set = engine.diff(&config, Some(&before()), None, &fields()).unwrap();
        assert_eq!(set.get("title").unwrap().new, Value::Null);
    }

    #[test]
    fn test_create_skips_null_fields() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::default();
        let new = Snapshot::new().with("title", Option::<&str>::None).with("views", 1);

        let set = engine.diff(&config, None, Some(&new), &fields()).unwrap();
        assert_eq!(set.fields().collect::<Vec<_>>(), ["views"]);
    }

    #[test]
    fn test_exclusion_and_global_exclusion() {
        let engine = DiffEngine::new().with_global_exclude(["views"]);
        let config = TrackedEntityConfig::builder().exclude(["title"]).build();
        let after = before().with("title", "x").with("views", 99);

        let set = engine
            .diff(&config, Some(&before()), Some(&after), &fields())
            .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_masking_applies_after_comparison() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::builder().mask(["ssn"]).build();
        let after = before().with("ssn", "987-65-4321");

        let set = engine
            .diff(&config, Some(&before()), Some(&after), &fields())
            .unwrap();
        let ssn = set.get("ssn").unwrap();
        assert_eq!(ssn.old, json!("*****5-6789"));
        assert_eq!(ssn.new, json!("*****5-4321"));
    }

    #[test]
    fn test_masked_and_excluded_never_appears() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::builder()
            .mask(["ssn"])
            .exclude(["ssn"])
            .serialize_full_state(true)
            .build();
        let after = before().with("ssn", "000-00-0000");

        let set = engine
            .diff(&config, Some(&before()), Some(&after), &fields())
            .unwrap();
        assert!(set.get("ssn").is_none());
        assert!(!set.full_state().unwrap().contains_key("ssn"));
    }

    #[test]
    fn test_choice_change_uses_labels() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::default();
        let after = before().with("status", "p");

        let set = engine
            .diff(&config, Some(&before()), Some(&after), &fields())
            .unwrap();
        let status = set.get("status").unwrap();
        assert_eq!(status.old, json!("Draft"));
        assert_eq!(status.new, json!("Published"));
    }

    #[test]
    fn test_relation_compares_by_key() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::default();
        let after = before().with("author", RelatedRecord::new("1").with_repr("Ada"));

        let set = engine
            .diff(&config, Some(&before()), Some(&after), &fields())
            .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_mapping_label() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::builder()
            .map_field("title", "Headline")
            .build();
        let after = before().with("title", "x");

        let set = engine
            .diff(&config, Some(&before()), Some(&after), &fields())
            .unwrap();
        assert_eq!(set.get("title").unwrap().label, "Headline");
        assert_eq!(set.get("title").map(|c| c.field.as_str()), Some("title"));
    }

    #[test]
    fn test_only_fields_restricts_diff() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::default();
        let after = before().with("title", "x").with("views", 50);
        let only = vec!["views".to_string()];

        let set = engine
            .diff_fields(&config, Some(&before()), Some(&after), &fields(), Some(&only))
            .unwrap();
        assert_eq!(set.fields().collect::<Vec<_>>(), ["views"]);
    }

    #[test]
    fn test_missing_field_skipped_when_both_sides_present() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::default();
        let old = Snapshot::new().with("title", "a");
        let new = Snapshot::new().with("title", "a").with("views", 3);

        let set = engine.diff(&config, Some(&old), Some(&new), &fields()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_unrenderable_value_uses_placeholder() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::default();
        let meta = vec![FieldMeta::new("ratio", FieldKind::Float)];
        let old = Snapshot::new().with("ratio", 1.5);
        let new = Snapshot::new().with("ratio", f64::NAN);

        let set = engine.diff(&config, Some(&old), Some(&new), &meta).unwrap();
        let ratio = set.get("ratio").unwrap();
        assert_eq!(ratio.old, json!(1.5));
        assert_eq!(ratio.new, json!("<unrenderable float>"));
    }

    #[test]
    fn test_uninterpretable_value_keeps_stored_form() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::default();
        let meta = vec![FieldMeta::new("published", FieldKind::Date)];
        let old = Snapshot::new().with("published", "sometime in May");
        let new = Snapshot::new().with("published", "next week");

        let set = engine.diff(&config, Some(&old), Some(&new), &meta).unwrap();
        let published = set.get("published").unwrap();
        assert_eq!(published.old, json!("sometime in May"));
        assert_eq!(published.new, json!("next week"));

        let parsed = Snapshot::new().with("published", "2024-05-01");
        let set = engine.diff(&config, Some(&old), Some(&parsed), &meta).unwrap();
        let published = set.get("published").unwrap();
        assert_eq!(published.old, json!("sometime in May"));
        assert_eq!(published.new, json!("2024-05-01"));
    }

    #[test]
    fn test_large_integer_change_recorded() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::default();
        let meta = vec![FieldMeta::new("balance", FieldKind::Integer)];
        let old = Snapshot::new().with("balance", 1e19);
        let new = Snapshot::new().with("balance", 3e19);

        let set = engine.diff(&config, Some(&old), Some(&new), &meta).unwrap();
        let balance = set.get("balance").unwrap();
        assert_eq!(balance.old, json!(1e19));
        assert_eq!(balance.new, json!(3e19));
    }

    #[test]
    fn test_malformed_catalog_is_error() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::default();
        let meta = vec![
            FieldMeta::new("title", FieldKind::Text),
            FieldMeta::new("title", FieldKind::Integer),
        ];
        let err = engine
            .diff(&config, None, Some(&before()), &meta)
            .unwrap_err();
        assert!(err.is_diff());
    }

    #[test]
    fn test_full_state_independent_of_changes() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::builder()
            .mask(["ssn"])
            .serialize_full_state(true)
            .build();

        let set = engine
            .diff(&config, Some(&before()), Some(&before()), &fields())
            .unwrap();
        assert!(set.is_empty());
        let state = set.full_state().unwrap();
        assert_eq!(state.get("ssn"), Some(&json!("*****5-6789")));
        assert_eq!(state.get("status"), Some(&json!("Draft")));
        assert_eq!(
            state.keys().collect::<Vec<_>>(),
            ["title", "status", "ssn", "author", "views"]
        );
    }

    #[test]
    fn test_relation_change() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::builder()
            .multi_valued(["tags"])
            .map_field("tags", "Tags")
            .build();
        let related = [RelatedRecord::new("3").with_repr("rust"), RelatedRecord::new("4")];

        let change = engine
            .relation_change(&config, "tags", RelationOperation::Add, &related, &fields())
            .unwrap();
        assert_eq!(change.label, "Tags");
        assert_eq!(change.objects, ["rust", "4"]);
        assert_eq!(change.pks, ["3", "4"]);

        assert!(engine
            .relation_change(&config, "author", RelationOperation::Add, &related, &fields())
            .is_none());
    }

    #[test]
    fn test_multi_valued_field_not_in_scalar_diff() {
        let engine = DiffEngine::new();
        let config = TrackedEntityConfig::builder().multi_valued(["tags"]).build();
        let old = before().with("tags", "1");
        let new = before().with("tags", "2");

        let set = engine.diff(&config, Some(&old), Some(&new), &fields()).unwrap();
        assert!(set.get("tags").is_none());
    }
}
