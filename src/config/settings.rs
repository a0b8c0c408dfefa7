//! Tracker settings
//!
//! Settings are stored as pretty JSON in `config.json`. Every field has a
//! default, so a partial or empty file loads cleanly.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::paths::TrackerPaths;
use crate::audit::{DiffEngine, MaskStyle, NormalizerOptions};
use crate::context::{CidResolver, DEFAULT_CID_HEADER};
use crate::dispatch::ChangeTracker;
use crate::error::{TrackError, TrackResult};
use crate::models::{EntityType, FieldCatalog};
use crate::registry::{GlobalPolicy, Registry, TrackedEntityConfig};
use crate::storage::{write_json_atomic, LogStore};

/// Explicit registration of one entity type
///
/// Carries every `TrackedEntityConfig` knob except code-only maskers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityRegistration {
    pub entity_type: String,
    pub include_fields: Vec<String>,
    pub exclude_fields: Vec<String>,
    pub mapping_fields: BTreeMap<String, String>,
    pub mask_fields: Vec<String>,
    #[serde(alias = "m2m_fields")]
    pub multi_valued_fields: Vec<String>,
    pub serialize_full_state: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serialize_fields: Option<Vec<String>>,
    pub serialize_tracked_only: bool,
}

impl EntityRegistration {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            ..Self::default()
        }
    }

    /// Build the registry configuration, adding the global mask fields
    pub fn to_config(&self, global_mask_fields: &[String]) -> TrackedEntityConfig {
        let global_masks = global_mask_fields
            .iter()
            .filter(|field| !self.multi_valued_fields.contains(field))
            .cloned();

        let mut builder = TrackedEntityConfig::builder()
            .include(self.include_fields.iter().cloned())
            .exclude(self.exclude_fields.iter().cloned())
            .mask(self.mask_fields.iter().cloned().chain(global_masks))
            .multi_valued(self.multi_valued_fields.iter().cloned())
            .serialize_full_state(self.serialize_full_state)
            .serialize_tracked_only(self.serialize_tracked_only);

        for (field, label) in &self.mapping_fields {
            builder = builder.map_field(field.clone(), label.clone());
        }
        if let Some(fields) = &self.serialize_fields {
            builder = builder.serialize_fields(fields.iter().cloned());
        }
        builder.build()
    }
}

/// Correlation id handling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CidSettings {
    /// Attach correlation ids to entries at all
    pub store_cid: bool,
    /// Inbound header carrying the correlation id; `None` ignores headers
    pub header: Option<String>,
    /// Generate a UUID when no id is supplied
    pub generate: bool,
}

impl Default for CidSettings {
    fn default() -> Self {
        Self {
            store_cid: true,
            header: Some(DEFAULT_CID_HEADER.to_string()),
            generate: false,
        }
    }
}

/// Settings for tracklog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Track every catalog entity type not on the deny list
    pub include_all_entities: bool,

    /// Entity types (`app.Model`) or application labels (`app`) never
    /// tracked by `include_all_entities`
    pub exclude_tracking_entities: Vec<String>,

    /// Explicit registrations
    pub include_tracking_entities: Vec<EntityRegistration>,

    /// Fields never diffed on any entity type
    pub global_exclude_fields: Vec<String>,

    /// Fields masked on every entity type
    pub global_mask_fields: Vec<String>,

    /// Skip events tagged as raw loads (fixtures, imports)
    pub disable_on_raw_save: bool,

    /// Default masker when an entity type has none of its own
    pub masker: MaskStyle,

    pub cid: CidSettings,

    pub normalizer: NormalizerOptions,

    /// Default tracing filter for the binary, overridden by `RUST_LOG`
    pub log_level: String,

    /// Maximum characters of a rendered value before it is cut off
    pub change_display_truncate_length: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            include_all_entities: false,
            exclude_tracking_entities: Vec::new(),
            include_tracking_entities: Vec::new(),
            global_exclude_fields: Vec::new(),
            global_mask_fields: Vec::new(),
            disable_on_raw_save: false,
            masker: MaskStyle::default(),
            cid: CidSettings::default(),
            normalizer: NormalizerOptions::default(),
            log_level: "warn".to_string(),
            change_display_truncate_length: 140,
        }
    }
}

impl TrackerSettings {
    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_or_create(paths: &TrackerPaths) -> TrackResult<Self> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            // Don't save yet - let caller decide when to persist
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| TrackError::Io(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| TrackError::Settings(format!("Failed to parse settings file: {}", e)))
    }

    pub fn save(&self, paths: &TrackerPaths) -> TrackResult<()> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }

    pub fn global_policy(&self) -> GlobalPolicy {
        GlobalPolicy {
            include_all: self.include_all_entities,
            deny_list: self.exclude_tracking_entities.clone(),
            global_exclude_fields: self.global_exclude_fields.clone(),
            global_mask_fields: self.global_mask_fields.clone(),
        }
    }

    /// Explicit registrations as registry inputs
    pub fn registrations(&self) -> TrackResult<Vec<(EntityType, TrackedEntityConfig)>> {
        self.include_tracking_entities
            .iter()
            .map(|registration| {
                if registration.entity_type.trim().is_empty() {
                    return Err(TrackError::Settings(
                        "include_tracking_entities entry without entity_type".into(),
                    ));
                }
                Ok((
                    EntityType::new(registration.entity_type.as_str()),
                    registration.to_config(&self.global_mask_fields),
                ))
            })
            .collect()
    }

    pub fn engine(&self) -> DiffEngine {
        DiffEngine::new()
            .with_normalizer(self.normalizer.clone())
            .with_global_exclude(self.global_exclude_fields.iter().cloned())
            .with_global_masker(self.masker.masker())
    }

    pub fn cid_resolver(&self) -> CidResolver {
        let resolver = CidResolver::new()
            .store(self.cid.store_cid)
            .header(self.cid.header.clone());
        if self.cid.generate {
            resolver.uuid_generator()
        } else {
            resolver
        }
    }

    /// Register explicit entity types, then apply the track-all policy.
    /// Returns how many entity types were added.
    pub fn configure_registry(
        &self,
        registry: &Registry,
        catalog: &dyn FieldCatalog,
    ) -> TrackResult<usize> {
        let registrations = self.registrations()?;
        let explicit = registrations.len();
        for (entity_type, config) in registrations {
            registry.register(entity_type, config)?;
        }
        let derived = registry.apply_global_policy(catalog, &self.global_policy());
        tracing::info!(explicit, derived, "registry configured from settings");
        Ok(explicit + derived)
    }

    /// Tracker wired with these settings
    pub fn build_tracker(
        &self,
        registry: Arc<Registry>,
        catalog: Arc<dyn FieldCatalog>,
        store: Arc<dyn LogStore>,
    ) -> ChangeTracker {
        ChangeTracker::builder(registry, catalog, store)
            .engine(self.engine())
            .cid(self.cid_resolver())
            .disable_on_raw_save(self.disable_on_raw_save)
            .build()
    }
}
